use log::warn;
use nalgebra::{Matrix4, Point3, Vector3};
use smallvec::SmallVec;

/// Number of point lights a lit shader accumulates.
pub const MAX_LIGHTS: usize = 4;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Light {
    pub position: Vector3<f32>,
    color: Vector3<f32>,
}

impl Light {
    pub fn new(position: Vector3<f32>, color: Vector3<f32>) -> Self {
        let mut light = Light {
            position,
            color: Vector3::zeros(),
        };
        light.set_color_vec(&color);
        light
    }

    pub fn color(&self) -> &Vector3<f32> {
        &self.color
    }

    pub fn set_color(&mut self, r: f32, g: f32, b: f32) {
        self.color.x = r.clamp(0., 1.);
        self.color.y = g.clamp(0., 1.);
        self.color.z = b.clamp(0., 1.);
    }

    pub fn set_color_vec(&mut self, color: &Vector3<f32>) {
        self.set_color(color.x, color.y, color.z);
    }
}

/// The point lights active for one frame, in world space.
#[derive(Debug, Clone, Default)]
pub struct LightSet {
    lights: SmallVec<[Light; MAX_LIGHTS]>,
}

/// Light uniform arrays ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct LightArrays {
    pub positions: [Vector3<f32>; MAX_LIGHTS],
    pub colors: [Vector3<f32>; MAX_LIGHTS],
}

impl LightSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a light. Lights past [`MAX_LIGHTS`] are dropped.
    pub fn push(&mut self, light: Light) -> bool {
        if self.lights.len() >= MAX_LIGHTS {
            warn!("[Lights] Ignoring light at {:?}, only {MAX_LIGHTS} are supported", light.position);
            return false;
        }
        self.lights.push(light);
        true
    }

    pub fn clear(&mut self) {
        self.lights.clear();
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Light> {
        self.lights.iter()
    }

    /// Positions moved into camera space by `view`. Unused slots are black
    /// so they never contribute.
    pub fn to_arrays(&self, view: &Matrix4<f32>) -> LightArrays {
        let mut arrays = LightArrays {
            positions: [Vector3::zeros(); MAX_LIGHTS],
            colors: [Vector3::zeros(); MAX_LIGHTS],
        };

        for (i, light) in self.lights.iter().enumerate() {
            arrays.positions[i] = view.transform_point(&Point3::from(light.position)).coords;
            arrays.colors[i] = light.color;
        }

        arrays
    }
}

impl FromIterator<Light> for LightSet {
    fn from_iter<I: IntoIterator<Item = Light>>(iter: I) -> Self {
        let mut set = LightSet::new();
        for light in iter {
            set.push(light);
        }
        set
    }
}
