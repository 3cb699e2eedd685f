use bon::Builder;
use nalgebra::{Isometry3, Matrix4, Orthographic3, Perspective3, Point3, Translation3, UnitQuaternion, Vector3};

/// Anything that can hand the renderer a projection and a world-to-camera matrix.
pub trait CameraView {
    fn projection(&self) -> Matrix4<f32>;
    fn view(&self) -> Matrix4<f32>;
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Projection {
    /// Vertical field of view in radians.
    Perspective { fov_y: f32 },
    /// Height of the visible volume in world units.
    Orthographic { height: f32 },
}

#[derive(Debug, Clone, PartialEq, Builder)]
pub struct Camera {
    #[builder(default = Vector3::zeros())]
    pub position: Vector3<f32>,
    #[builder(default = UnitQuaternion::identity())]
    pub orientation: UnitQuaternion<f32>,
    #[builder(default = Projection::Perspective { fov_y: 60f32.to_radians() })]
    pub projection: Projection,
    #[builder(default = 16.0 / 9.0)]
    pub aspect: f32,
    #[builder(default = 0.1)]
    pub near: f32,
    #[builder(default = 1000.0)]
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Camera::builder().build()
    }
}

impl Camera {
    pub fn set_resolution(&mut self, width: f32, height: f32) {
        if height > 0.0 {
            self.aspect = width / height;
        }
    }

    /// Turns the camera so it faces `target`, keeping +Y up.
    pub fn look_at(&mut self, target: Point3<f32>) {
        let eye = Point3::from(self.position);
        let view = Isometry3::look_at_rh(&eye, &target, &Vector3::y());
        self.orientation = view.rotation.inverse();
    }

    fn camera_to_world(&self) -> Isometry3<f32> {
        Isometry3::from_parts(Translation3::from(self.position), self.orientation)
    }
}

impl CameraView for Camera {
    fn projection(&self) -> Matrix4<f32> {
        match self.projection {
            Projection::Perspective { fov_y } => {
                Perspective3::new(self.aspect, fov_y, self.near, self.far).to_homogeneous()
            }
            Projection::Orthographic { height } => {
                let half_h = height / 2.0;
                let half_w = half_h * self.aspect;
                Orthographic3::new(-half_w, half_w, -half_h, half_h, self.near, self.far).to_homogeneous()
            }
        }
    }

    fn view(&self) -> Matrix4<f32> {
        self.camera_to_world().inverse().to_homogeneous()
    }
}

/// Pixel space camera for overlay models: (0, 0) is the top left corner and
/// one unit is one pixel.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ScreenCamera {
    pub width: f32,
    pub height: f32,
}

impl ScreenCamera {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

impl CameraView for ScreenCamera {
    fn projection(&self) -> Matrix4<f32> {
        Orthographic3::new(0.0, self.width, self.height, 0.0, -1.0, 1.0).to_homogeneous()
    }

    fn view(&self) -> Matrix4<f32> {
        Matrix4::identity()
    }
}
