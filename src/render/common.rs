use glam::{Mat4, Vec3};

use crate::camera::CameraPose;
use crate::scene::Fog;

/// Vertical field of view shared by every renderer, in degrees.
pub const FIELD_OF_VIEW: f32 = 50.0;

/// Light added to every surface regardless of orientation.
pub const AMBIENT: f32 = 0.25;

/// Camera parameters consumed by the renderer's uniform buffer.
#[derive(Clone, Debug)]
pub struct CameraParams {
    pub view_proj: Mat4,
    pub position: Vec3,
}

impl CameraParams {
    pub fn from_pose(pose: &CameraPose, width: u32, height: u32) -> Self {
        let aspect = width.max(1) as f32 / height.max(1) as f32;
        Self {
            view_proj: pose.view_projection(aspect, FIELD_OF_VIEW),
            position: pose.position,
        }
    }
}

/// Lighting state consumed by the renderer's uniform buffer.
#[derive(Clone, Debug)]
pub struct LightParams {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

impl Default for LightParams {
    fn default() -> Self {
        Self {
            position: Vec3::new(5.0, 8.0, 5.0),
            color: Vec3::ONE,
            intensity: 1.0,
        }
    }
}

impl LightParams {
    /// Lambert shading of `base` at `point`, with the normal flipped toward the viewer.
    pub fn shade(&self, base: Vec3, point: Vec3, normal: Vec3, eye: Vec3) -> Vec3 {
        let normal = if normal.dot(eye - point) < 0.0 {
            -normal
        } else {
            normal
        };
        let light_dir = (self.position - point).normalize_or_zero();
        let diffuse = normal.dot(light_dir).max(0.0) * self.intensity;
        (AMBIENT + diffuse) * base * self.color
    }
}

/// Blends `color` toward the fog color for a surface `distance` away.
pub fn apply_fog(color: Vec3, fog: &Fog, distance: f32) -> Vec3 {
    color.lerp(fog.color.to_srgb(), fog.factor(distance))
}
