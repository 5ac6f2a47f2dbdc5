use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::camera::CameraPose;
use crate::color::Color;
use crate::configuration::ConfigurationState;
use crate::particles::{ParticleField, RotationAngles};

/// Surface description of one material slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub color: Color,
    pub metalness: f32,
    pub roughness: f32,
    pub opacity: f32,
}

/// Material slots exposed by the vehicle model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaterialSlot {
    Body,
    Rims,
    Glass,
    Tyres,
}

/// Box-shaped part of a model in model space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelPart {
    pub name: &'static str,
    pub slot: MaterialSlot,
    pub center: Vec3,
    pub size: Vec3,
}

/// Parameterized model placed in the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelNode {
    pub position: Vec3,
    pub rotation_y: f32,
    pub scale: f32,
    pub parts: Arc<[ModelPart]>,
    pub body: Material,
    pub rims: Material,
    pub glass: Material,
    pub tyres: Material,
}

impl ModelNode {
    pub fn material(&self, slot: MaterialSlot) -> &Material {
        match slot {
            MaterialSlot::Body => &self.body,
            MaterialSlot::Rims => &self.rims,
            MaterialSlot::Glass => &self.glass,
            MaterialSlot::Tyres => &self.tyres,
        }
    }

    pub fn transform(&self) -> Mat4 {
        Mat4::from_translation(self.position)
            * Mat4::from_rotation_y(self.rotation_y)
            * Mat4::from_scale(Vec3::splat(self.scale))
    }

    /// Model matrix of one part, unit cube to world space.
    pub fn part_transform(&self, part: &ModelPart) -> Mat4 {
        self.transform() * Mat4::from_translation(part.center) * Mat4::from_scale(part.size)
    }
}

/// Rotating point cloud in the background.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleNode {
    pub points: Arc<[Vec3]>,
    pub rotation: RotationAngles,
    pub color: Color,
    pub point_size: f32,
}

impl ParticleNode {
    pub fn transform(&self) -> Mat4 {
        Mat4::from_rotation_x(self.rotation.x) * Mat4::from_rotation_y(self.rotation.y)
    }
}

/// Static mirror-like ground plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloorNode {
    pub height: f32,
    pub extent: f32,
    pub color: Color,
    /// 0 is matte. The software renderer shows a mirrored model through the
    /// floor in proportion; the window renderer lowers roughness instead.
    pub reflectivity: f32,
}

/// Linear distance fog.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fog {
    pub color: Color,
    pub near: f32,
    pub far: f32,
}

impl Fog {
    /// Fog weight in `0.0..=1.0` at `distance` from the camera.
    pub fn factor(&self, distance: f32) -> f32 {
        if self.far <= self.near {
            return 0.0;
        }
        ((distance - self.near) / (self.far - self.near)).clamp(0.0, 1.0)
    }
}

/// One drawable node of the scene graph.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneNode {
    Particles(ParticleNode),
    Model(ModelNode),
    Floor(FloorNode),
}

/// Everything the renderer needs for one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneGraph {
    pub background: Color,
    pub fog: Fog,
    pub camera: CameraPose,
    pub nodes: Vec<SceneNode>,
}

impl SceneGraph {
    pub fn model(&self) -> Option<&ModelNode> {
        self.nodes.iter().find_map(|node| match node {
            SceneNode::Model(model) => Some(model),
            _ => None,
        })
    }

    pub fn particles(&self) -> Option<&ParticleNode> {
        self.nodes.iter().find_map(|node| match node {
            SceneNode::Particles(particles) => Some(particles),
            _ => None,
        })
    }

    pub fn floor(&self) -> Option<&FloorNode> {
        self.nodes.iter().find_map(|node| match node {
            SceneNode::Floor(floor) => Some(floor),
            _ => None,
        })
    }
}

/// Source of the drawable vehicle, parameterized by the selected colors.
///
/// Implementations must be pure in their inputs; unset colors select the
/// model's built-in materials.
pub trait ModelFactory {
    fn create_model_node(
        &self,
        body: Color,
        rim: Option<Color>,
        glass: Option<Color>,
    ) -> ModelNode;
}

/// Blocky stand-in for the vehicle asset with body, rim, glass and tyre slots.
#[derive(Debug, Clone)]
pub struct VehicleModel {
    parts: Arc<[ModelPart]>,
    default_rims: Material,
    default_glass: Material,
}

impl VehicleModel {
    pub fn new() -> Self {
        Self {
            parts: vehicle_parts().into(),
            default_rims: Material {
                color: Color::rgb(0x8A, 0x8D, 0x91),
                metalness: 0.9,
                roughness: 0.25,
                opacity: 1.0,
            },
            default_glass: Material {
                color: Color::rgb(0x1A, 0x1F, 0x24),
                metalness: 0.0,
                roughness: 0.05,
                opacity: 0.55,
            },
        }
    }

    pub fn parts(&self) -> &[ModelPart] {
        &self.parts
    }

    pub fn default_rims(&self) -> Material {
        self.default_rims
    }

    pub fn default_glass(&self) -> Material {
        self.default_glass
    }
}

impl Default for VehicleModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelFactory for VehicleModel {
    fn create_model_node(
        &self,
        body: Color,
        rim: Option<Color>,
        glass: Option<Color>,
    ) -> ModelNode {
        ModelNode {
            position: Vec3::ZERO,
            rotation_y: 0.0,
            scale: 1.0,
            parts: Arc::clone(&self.parts),
            body: Material {
                color: body,
                metalness: 0.6,
                roughness: 0.3,
                opacity: 1.0,
            },
            rims: rim.map_or(self.default_rims, |color| Material {
                color,
                ..self.default_rims
            }),
            glass: glass.map_or(self.default_glass, |color| Material {
                color,
                ..self.default_glass
            }),
            tyres: Material {
                color: Color::rgb(0x14, 0x14, 0x14),
                metalness: 0.0,
                roughness: 0.9,
                opacity: 1.0,
            },
        }
    }
}

fn vehicle_parts() -> Vec<ModelPart> {
    let mut parts = vec![
        ModelPart {
            name: "chassis",
            slot: MaterialSlot::Body,
            center: Vec3::new(0.0, 0.05, 0.0),
            size: Vec3::new(1.8, 0.45, 4.2),
        },
        ModelPart {
            name: "cabin",
            slot: MaterialSlot::Glass,
            center: Vec3::new(0.0, 0.5, -0.2),
            size: Vec3::new(1.5, 0.45, 2.0),
        },
        ModelPart {
            name: "roof",
            slot: MaterialSlot::Body,
            center: Vec3::new(0.0, 0.75, -0.3),
            size: Vec3::new(1.4, 0.06, 1.5),
        },
    ];
    for (name, x, z) in [
        ("wheel-front-left", -0.9, 1.35),
        ("wheel-front-right", 0.9, 1.35),
        ("wheel-rear-left", -0.9, -1.35),
        ("wheel-rear-right", 0.9, -1.35),
    ] {
        parts.push(ModelPart {
            name,
            slot: MaterialSlot::Tyres,
            center: Vec3::new(x, -0.2, z),
            size: Vec3::new(0.28, 0.64, 0.64),
        });
        parts.push(ModelPart {
            name,
            slot: MaterialSlot::Rims,
            center: Vec3::new(x * 1.02, -0.2, z),
            size: Vec3::new(0.26, 0.4, 0.4),
        });
    }
    parts
}

/// Look of the stage around the model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageSettings {
    pub background: Color,
    pub fog_near: f32,
    pub fog_far: f32,
    pub floor: FloorNode,
    pub particle_color: Color,
    pub point_size: f32,
}

impl Default for StageSettings {
    fn default() -> Self {
        Self {
            background: Color::rgb(0x10, 0x10, 0x12),
            fog_near: 10.0,
            fog_far: 20.0,
            floor: FloorNode {
                height: -0.52,
                extent: 20.0,
                color: Color::rgb(0x05, 0x05, 0x06),
                reflectivity: 0.8,
            },
            particle_color: Color::rgb(0xF2, 0xC9, 0x4C),
            point_size: 0.005,
        }
    }
}

/// Rebuilds the scene description from the current animated values.
#[derive(Debug, Clone)]
pub struct SceneAssembly<M> {
    model: M,
    stage: StageSettings,
}

impl<M: ModelFactory> SceneAssembly<M> {
    pub fn new(model: M, stage: StageSettings) -> Self {
        Self { model, stage }
    }

    pub fn stage(&self) -> &StageSettings {
        &self.stage
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn render(
        &self,
        state: &ConfigurationState,
        camera: CameraPose,
        rotation_y: f32,
        particles: &ParticleField,
        particle_rotation: RotationAngles,
    ) -> SceneGraph {
        let mut model =
            self.model
                .create_model_node(state.body_color, state.rim_color, state.glass_tint);
        model.rotation_y = rotation_y;

        SceneGraph {
            background: self.stage.background,
            fog: Fog {
                color: self.stage.background,
                near: self.stage.fog_near,
                far: self.stage.fog_far,
            },
            camera,
            nodes: vec![
                SceneNode::Particles(ParticleNode {
                    points: particles.shared_points(),
                    rotation: particle_rotation,
                    color: self.stage.particle_color,
                    point_size: self.stage.point_size,
                }),
                SceneNode::Model(model),
                SceneNode::Floor(self.stage.floor),
            ],
        }
    }
}

/// Screen-space extent of a projected point, used by CPU renderers.
pub fn project(view_proj: Mat4, point: Vec3, width: u32, height: u32) -> Option<(Vec2, f32)> {
    let clip = view_proj * point.extend(1.0);
    if clip.w <= 1e-4 {
        return None;
    }
    let ndc = clip.truncate() / clip.w;
    if !(-1.0..=1.0).contains(&ndc.z) {
        return None;
    }
    let x = (ndc.x * 0.5 + 0.5) * width as f32;
    let y = (1.0 - (ndc.y * 0.5 + 0.5)) * height as f32;
    Some((Vec2::new(x, y), clip.w))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::UiEvent;

    fn assembly() -> SceneAssembly<VehicleModel> {
        SceneAssembly::new(VehicleModel::new(), StageSettings::default())
    }

    #[test]
    fn unset_colors_use_model_defaults() {
        let model = VehicleModel::new();
        let node = model.create_model_node(Color::rgb(255, 0, 0), None, None);
        assert_eq!(node.rims, model.default_rims());
        assert_eq!(node.glass, model.default_glass());
        assert_eq!(node.body.color, Color::rgb(255, 0, 0));
    }

    #[test]
    fn model_parameterization_is_pure() {
        let model = VehicleModel::new();
        let red = Color::rgb(255, 0, 0);
        assert_eq!(
            model.create_model_node(red, None, None),
            model.create_model_node(red, None, None)
        );
    }

    #[test]
    fn picked_colors_keep_slot_finish() {
        let model = VehicleModel::new();
        let gold = Color::rgb(0xD4, 0xAF, 0x37);
        let node = model.create_model_node(Color::WHITE, Some(gold), None);
        assert_eq!(node.rims.color, gold);
        assert_eq!(node.rims.metalness, model.default_rims().metalness);
    }

    #[test]
    fn assembles_particles_model_and_floor() {
        let mut state = ConfigurationState::new(Color::rgb(0, 0, 128));
        state.apply(UiEvent::SelectGlassTint(Color::rgb(51, 51, 51)));
        let field = ParticleField::generate(32, 1.5, 3);
        let camera = CameraPose::looking_at_origin(Vec3::new(-4.0, 1.0, 5.0));

        let scene = assembly().render(&state, camera, 1.25, &field, Vec2::new(0.1, 0.2));

        assert_eq!(scene.nodes.len(), 3);
        assert_eq!(scene.camera, camera);
        let model = scene.model().unwrap();
        assert_eq!(model.rotation_y, 1.25);
        assert_eq!(model.body.color, Color::rgb(0, 0, 128));
        assert_eq!(model.glass.color, Color::rgb(51, 51, 51));
        let particles = scene.particles().unwrap();
        assert_eq!(particles.points.len(), 32);
        assert_eq!(particles.rotation, Vec2::new(0.1, 0.2));
        assert_eq!(scene.floor(), Some(&StageSettings::default().floor));
    }

    #[test]
    fn fog_ramps_between_near_and_far() {
        let fog = Fog {
            color: Color::BLACK,
            near: 10.0,
            far: 20.0,
        };
        assert_eq!(fog.factor(5.0), 0.0);
        assert_eq!(fog.factor(15.0), 0.5);
        assert_eq!(fog.factor(25.0), 1.0);
    }

    #[test]
    fn origin_projects_to_screen_center() {
        let camera = CameraPose::looking_at_origin(Vec3::new(0.0, 0.0, 5.0));
        let (screen, depth) = project(camera.view_projection(1.0, 50.0), Vec3::ZERO, 100, 100)
            .unwrap();
        assert!((screen - Vec2::new(50.0, 50.0)).length() < 1e-3);
        assert!((depth - 5.0).abs() < 1e-4);
        assert!(project(camera.view_projection(1.0, 50.0), Vec3::new(0.0, 0.0, 10.0), 100, 100)
            .is_none());
    }
}
