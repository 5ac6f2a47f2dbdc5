use glam::{Vec2, Vec3};
use log::trace;

use super::common::{apply_fog, CameraParams, LightParams};
use super::shared::{floor_transform, part_triangles};
use super::{FrameCapture, Renderer};
use crate::error::RenderError;
use crate::scene::{project, FloorNode, Fog, ModelNode, ParticleNode, SceneGraph};

/// Tiles per side used to split the floor so partially visible tiles still draw.
const FLOOR_TILES: u32 = 16;

/// How much of the mirrored model a fully reflective floor lets through.
const REFLECTION_STRENGTH: f32 = 0.35;

/// How a fragment combines with the pixel already in the target.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Blend {
    Opaque,
    /// Mixes over the pixel and keeps the stored depth.
    Glass(f32),
    /// Mixes over the pixel and stores its own depth.
    Coat(f32),
}

/// Work done by the most recent frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frames: u64,
    pub triangles: usize,
    pub points: usize,
}

/// Software rasterizer used when no GPU surface is available.
#[derive(Debug, Clone)]
pub struct HeadlessRenderer {
    width: u32,
    height: u32,
    color: Vec<u8>,
    depth: Vec<f32>,
    light: LightParams,
    drawn: bool,
    stats: FrameStats,
}

struct Target<'a> {
    width: u32,
    height: u32,
    color: &'a mut [u8],
    depth: &'a mut [f32],
    camera: CameraParams,
    fog: Fog,
}

impl HeadlessRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let pixels = width as usize * height as usize;
        Self {
            width,
            height,
            color: vec![0; pixels * 4],
            depth: vec![f32::INFINITY; pixels],
            light: LightParams::default(),
            drawn: false,
            stats: FrameStats::default(),
        }
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }
}

impl Renderer for HeadlessRenderer {
    fn draw(&mut self, scene: &SceneGraph) -> Result<(), RenderError> {
        let background = scene.background;
        for pixel in self.color.chunks_exact_mut(4) {
            pixel.copy_from_slice(&[background.r, background.g, background.b, 255]);
        }
        self.depth.fill(f32::INFINITY);

        let mut target = Target {
            width: self.width,
            height: self.height,
            color: &mut self.color,
            depth: &mut self.depth,
            camera: CameraParams::from_pose(&scene.camera, self.width, self.height),
            fog: scene.fog,
        };
        let mut stats = FrameStats {
            frames: self.stats.frames + 1,
            ..FrameStats::default()
        };

        if let Some(floor) = scene.floor() {
            if let Some(model) = scene.model().filter(|_| floor.reflectivity > 0.0) {
                stats.triangles += draw_reflection(&mut target, &self.light, model, floor.height);
            }
            stats.triangles += draw_floor(&mut target, &self.light, floor);
        }
        if let Some(model) = scene.model() {
            stats.triangles += draw_model(&mut target, &self.light, model, false);
        }
        if let Some(particles) = scene.particles() {
            stats.points += draw_particles(&mut target, particles);
        }
        if let Some(model) = scene.model() {
            stats.triangles += draw_model(&mut target, &self.light, model, true);
        }

        trace!(
            "software frame {}: {} triangles, {} points",
            stats.frames,
            stats.triangles,
            stats.points
        );
        self.stats = stats;
        self.drawn = true;
        Ok(())
    }

    fn capture(&mut self) -> Result<FrameCapture, RenderError> {
        if !self.drawn {
            return Err(RenderError::NothingDrawn);
        }
        Ok(FrameCapture {
            width: self.width,
            height: self.height,
            rgba: self.color.clone(),
        })
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 || (width, height) == (self.width, self.height) {
            return;
        }
        *self = Self {
            light: self.light.clone(),
            stats: self.stats,
            ..Self::new(width, height)
        };
    }
}

fn draw_floor(target: &mut Target<'_>, light: &LightParams, floor: &FloorNode) -> usize {
    let base = floor.color.to_srgb();
    let transform = floor_transform(floor);
    let top = |u: f32, v: f32| transform.transform_point3(Vec3::new(u - 0.5, 0.5, v - 0.5));
    let step = 1.0 / FLOOR_TILES as f32;
    let blend = match floor.reflectivity.clamp(0.0, 1.0) {
        r if r > 0.0 => Blend::Coat(1.0 - r * REFLECTION_STRENGTH),
        _ => Blend::Opaque,
    };
    let mut drawn = 0;
    for i in 0..FLOOR_TILES {
        for j in 0..FLOOR_TILES {
            let (u, v) = (i as f32 * step, j as f32 * step);
            let corners = [top(u, v), top(u + step, v), top(u + step, v + step), top(u, v + step)];
            for tri in [[corners[0], corners[1], corners[2]], [corners[0], corners[2], corners[3]]] {
                if rasterize(target, light, tri, base, blend) {
                    drawn += 1;
                }
            }
        }
    }
    drawn
}

/// Draws the opaque parts mirrored below the floor plane at `height`.
fn draw_reflection(
    target: &mut Target<'_>,
    light: &LightParams,
    model: &ModelNode,
    height: f32,
) -> usize {
    let mut drawn = 0;
    for part in model.parts.iter() {
        let material = model.material(part.slot);
        if material.opacity < 1.0 {
            continue;
        }
        let base = material.color.to_srgb();
        for tri in part_triangles(model, part) {
            if rasterize(target, light, mirror(tri, height), base, Blend::Opaque) {
                drawn += 1;
            }
        }
    }
    drawn
}

fn mirror(tri: [Vec3; 3], height: f32) -> [Vec3; 3] {
    tri.map(|v| Vec3::new(v.x, 2.0 * height - v.y, v.z))
}

fn draw_model(
    target: &mut Target<'_>,
    light: &LightParams,
    model: &ModelNode,
    translucent: bool,
) -> usize {
    let mut drawn = 0;
    for part in model.parts.iter() {
        let material = model.material(part.slot);
        if (material.opacity < 1.0) != translucent {
            continue;
        }
        let base = material.color.to_srgb();
        let blend = if translucent {
            Blend::Glass(material.opacity)
        } else {
            Blend::Opaque
        };
        for tri in part_triangles(model, part) {
            if rasterize(target, light, tri, base, blend) {
                drawn += 1;
            }
        }
    }
    drawn
}

fn draw_particles(target: &mut Target<'_>, particles: &ParticleNode) -> usize {
    let transform = particles.transform();
    let base = particles.color.to_srgb();
    let mut drawn = 0;
    for point in particles.points.iter() {
        let world = transform.transform_point3(*point);
        let Some((screen, depth)) = project(
            target.camera.view_proj,
            world,
            target.width,
            target.height,
        ) else {
            continue;
        };
        if screen.x < 0.0 || screen.y < 0.0 {
            continue;
        }
        let (x, y) = (screen.x as u32, screen.y as u32);
        if x >= target.width || y >= target.height {
            continue;
        }
        let color = apply_fog(base, &target.fog, depth);
        if target.write(x, y, depth, color, Blend::Opaque) {
            drawn += 1;
        }
    }
    drawn
}

/// Fills one flat-shaded triangle. Returns `false` when it is clipped or degenerate.
fn rasterize(
    target: &mut Target<'_>,
    light: &LightParams,
    tri: [Vec3; 3],
    base: Vec3,
    blend: Blend,
) -> bool {
    let view_proj = target.camera.view_proj;
    let mut screen = [Vec2::ZERO; 3];
    let mut depth = [0.0f32; 3];
    for (i, vertex) in tri.iter().enumerate() {
        let Some((point, w)) = project(view_proj, *vertex, target.width, target.height) else {
            return false;
        };
        screen[i] = point;
        depth[i] = w;
    }

    let area = edge(screen[0], screen[1], screen[2]);
    if area.abs() < 1e-6 {
        return false;
    }

    let centroid = (tri[0] + tri[1] + tri[2]) / 3.0;
    let normal = (tri[1] - tri[0]).cross(tri[2] - tri[0]).normalize_or_zero();
    let eye = target.camera.position;
    let lit = light.shade(base, centroid, normal, eye);
    let color = apply_fog(lit, &target.fog, centroid.distance(eye));

    let min = screen[0].min(screen[1]).min(screen[2]).max(Vec2::ZERO);
    let max = screen[0]
        .max(screen[1])
        .max(screen[2])
        .min(Vec2::new(target.width as f32 - 1.0, target.height as f32 - 1.0));
    if min.x > max.x || min.y > max.y {
        return false;
    }

    for y in min.y.floor() as u32..=max.y.ceil() as u32 {
        for x in min.x.floor() as u32..=max.x.ceil() as u32 {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let w0 = edge(screen[1], screen[2], p) / area;
            let w1 = edge(screen[2], screen[0], p) / area;
            let w2 = edge(screen[0], screen[1], p) / area;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }
            let z = w0 * depth[0] + w1 * depth[1] + w2 * depth[2];
            target.write(x, y, z, color, blend);
        }
    }
    true
}

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

impl Target<'_> {
    /// Depth-tested write.
    fn write(&mut self, x: u32, y: u32, depth: f32, color: Vec3, blend: Blend) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let index = y as usize * self.width as usize + x as usize;
        if depth >= self.depth[index] {
            return false;
        }
        let pixel = &mut self.color[index * 4..index * 4 + 4];
        let existing = Vec3::new(pixel[0] as f32, pixel[1] as f32, pixel[2] as f32) / 255.0;
        let color = match blend {
            Blend::Opaque => {
                self.depth[index] = depth;
                color
            }
            Blend::Glass(opacity) => existing.lerp(color, opacity.clamp(0.0, 1.0)),
            Blend::Coat(opacity) => {
                self.depth[index] = depth;
                existing.lerp(color, opacity.clamp(0.0, 1.0))
            }
        };
        let to_byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        pixel.copy_from_slice(&[to_byte(color.x), to_byte(color.y), to_byte(color.z), 255]);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraPose;
    use crate::color::Color;
    use crate::configuration::{ConfigurationState, UiEvent};
    use crate::particles::ParticleField;
    use crate::scene::{SceneAssembly, StageSettings, VehicleModel};

    const WIDTH: u32 = 64;
    const HEIGHT: u32 = 48;

    fn scene(body: Color) -> SceneGraph {
        scene_on(body, StageSettings::default())
    }

    fn scene_on(body: Color, stage: StageSettings) -> SceneGraph {
        let mut state = ConfigurationState::new(body);
        state.apply(UiEvent::SelectRimColor(Color::rgb(0xD4, 0xAF, 0x37)));
        let assembly = SceneAssembly::new(VehicleModel::new(), stage);
        let field = ParticleField::generate(500, 1.5, 9);
        assembly.render(
            &state,
            CameraPose::looking_at_origin(Vec3::new(-4.0, 1.0, 5.0)),
            0.0,
            &field,
            Vec2::ZERO,
        )
    }

    #[test]
    fn capture_requires_a_drawn_frame() {
        let mut renderer = HeadlessRenderer::new(WIDTH, HEIGHT);
        assert!(matches!(renderer.capture(), Err(RenderError::NothingDrawn)));
    }

    #[test]
    fn draws_model_over_background() {
        let mut renderer = HeadlessRenderer::new(WIDTH, HEIGHT);
        let scene = scene(Color::rgb(255, 0, 0));
        renderer.draw(&scene).unwrap();
        let frame = renderer.capture().unwrap();
        assert_eq!(frame.rgba.len(), frame.expected_len());

        let background = StageSettings::default().background;
        assert_eq!(
            frame.pixel(0, 0),
            Some([background.r, background.g, background.b, 255])
        );
        let center = frame.pixel(WIDTH / 2, HEIGHT / 2).unwrap();
        assert_ne!(center, [background.r, background.g, background.b, 255]);
        assert!(renderer.stats().triangles > 0);
        assert!(renderer.stats().points > 0);
    }

    #[test]
    fn identical_scenes_produce_identical_frames() {
        let mut renderer = HeadlessRenderer::new(WIDTH, HEIGHT);
        let scene = scene(Color::rgb(0, 0, 128));
        renderer.draw(&scene).unwrap();
        let first = renderer.capture().unwrap();
        renderer.draw(&scene).unwrap();
        assert_eq!(renderer.capture().unwrap(), first);
        assert_eq!(renderer.stats().frames, 2);
    }

    #[test]
    fn body_color_reaches_the_frame() {
        let mut renderer = HeadlessRenderer::new(WIDTH, HEIGHT);
        renderer.draw(&scene(Color::rgb(255, 0, 0))).unwrap();
        let red = renderer.capture().unwrap();
        renderer.draw(&scene(Color::rgb(0, 0, 255))).unwrap();
        let blue = renderer.capture().unwrap();
        assert_ne!(
            red.pixel(WIDTH / 2, HEIGHT / 2),
            blue.pixel(WIDTH / 2, HEIGHT / 2)
        );
    }

    #[test]
    fn reflective_floor_shows_the_mirrored_model() {
        let mut matte = StageSettings::default();
        matte.floor.reflectivity = 0.0;
        let mut renderer = HeadlessRenderer::new(WIDTH, HEIGHT);
        renderer.draw(&scene_on(Color::WHITE, matte)).unwrap();
        let matte_frame = renderer.capture().unwrap();
        let matte_triangles = renderer.stats().triangles;

        renderer.draw(&scene(Color::WHITE)).unwrap();
        assert_ne!(renderer.capture().unwrap(), matte_frame);
        assert!(renderer.stats().triangles > matte_triangles);
    }

    #[test]
    fn mirror_flips_height_about_the_floor() {
        let tri = [
            Vec3::new(1.0, 0.5, 2.0),
            Vec3::new(0.0, -0.5, 0.0),
            Vec3::new(-1.0, 1.5, 3.0),
        ];
        let mirrored = mirror(tri, -0.5);
        assert_eq!(mirrored[0], Vec3::new(1.0, -1.5, 2.0));
        assert_eq!(mirrored[1], Vec3::new(0.0, -0.5, 0.0));
        assert_eq!(mirrored[2], Vec3::new(-1.0, -2.5, 3.0));
        assert_eq!(mirror(mirrored, -0.5), tri);
    }

    #[test]
    fn glass_blends_without_taking_depth() {
        let mut color = vec![0u8; 4];
        let mut depth = vec![f32::INFINITY];
        let mut target = Target {
            width: 1,
            height: 1,
            color: &mut color,
            depth: &mut depth,
            camera: CameraParams::from_pose(
                &CameraPose::looking_at_origin(Vec3::new(0.0, 0.0, 5.0)),
                1,
                1,
            ),
            fog: Fog {
                color: Color::BLACK,
                near: 10.0,
                far: 20.0,
            },
        };
        assert!(target.write(0, 0, 3.0, Vec3::ONE, Blend::Glass(0.5)));
        assert_eq!(target.depth[0], f32::INFINITY);
        assert!(target.write(0, 0, 4.0, Vec3::ZERO, Blend::Coat(1.0)));
        assert_eq!(target.depth[0], 4.0);
        assert!(!target.write(0, 0, 5.0, Vec3::ONE, Blend::Opaque));
        assert_eq!(&target.color[..3], &[0, 0, 0]);
    }

    #[test]
    fn resize_discards_the_previous_frame() {
        let mut renderer = HeadlessRenderer::new(WIDTH, HEIGHT);
        renderer.draw(&scene(Color::WHITE)).unwrap();
        renderer.resize(32, 32);
        assert_eq!(renderer.surface_size(), (32, 32));
        assert!(renderer.capture().is_err());
        renderer.resize(0, 10);
        assert_eq!(renderer.surface_size(), (32, 32));
    }
}
