use nalgebra::{Isometry3, Matrix4, Scale3, Translation3, UnitQuaternion, Vector3};

/// Placement of a model in world space.
///
/// Frames can be chained: [`Frame::child_matrix`] composes a parent world
/// matrix with the local placement.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    position: Vector3<f32>,
    orientation: UnitQuaternion<f32>,
    scale: Vector3<f32>,
}

impl Default for Frame {
    fn default() -> Self {
        Self::identity()
    }
}

impl Frame {
    pub fn identity() -> Self {
        Frame {
            position: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn at(position: Vector3<f32>) -> Self {
        Frame {
            position,
            ..Self::identity()
        }
    }

    pub fn position(&self) -> &Vector3<f32> {
        &self.position
    }

    pub fn set_position(&mut self, x: f32, y: f32, z: f32) {
        self.position = Vector3::new(x, y, z);
    }

    pub fn set_position_vec(&mut self, position: Vector3<f32>) {
        self.position = position;
    }

    pub fn translate(&mut self, delta: Vector3<f32>) {
        self.position += delta;
    }

    pub fn orientation(&self) -> &UnitQuaternion<f32> {
        &self.orientation
    }

    pub fn set_orientation(&mut self, orientation: UnitQuaternion<f32>) {
        self.orientation = orientation;
    }

    /// Rotates around the local axes in radians.
    pub fn rotate(&mut self, roll: f32, pitch: f32, yaw: f32) {
        self.orientation *= UnitQuaternion::from_euler_angles(roll, pitch, yaw);
    }

    pub fn scale(&self) -> &Vector3<f32> {
        &self.scale
    }

    pub fn set_scale(&mut self, scale: Vector3<f32>) {
        self.scale = scale;
    }

    pub fn isometry(&self) -> Isometry3<f32> {
        Isometry3::from_parts(Translation3::from(self.position), self.orientation)
    }

    /// The world matrix: translation * rotation * scale.
    pub fn matrix(&self) -> Matrix4<f32> {
        self.isometry().to_homogeneous() * Scale3::from(self.scale).to_homogeneous()
    }

    pub fn child_matrix(&self, parent: &Matrix4<f32>) -> Matrix4<f32> {
        parent * self.matrix()
    }
}
