use glam::{Mat3, Mat4, Vec3};

use crate::scene::{FloorNode, ModelNode, ModelPart};

pub(crate) const SHADER: &str = r#"
const AMBIENT: f32 = 0.25;

struct GlobalUniform {
    view_proj: mat4x4<f32>,
    camera_position: vec4<f32>,
    light_position: vec4<f32>,
    light_color: vec4<f32>,
    fog_color: vec4<f32>,
    fog_range: vec4<f32>,
}

struct ObjectConstants {
    model: mat4x4<f32>,
    normal: mat3x4<f32>,
    color: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> globals: GlobalUniform;

@group(1) @binding(0)
var<uniform> object: ObjectConstants;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

fn fogged(color: vec3<f32>, world_pos: vec3<f32>) -> vec3<f32> {
    let distance = length(world_pos - globals.camera_position.xyz);
    let span = max(globals.fog_range.y - globals.fog_range.x, 0.0001);
    let amount = clamp((distance - globals.fog_range.x) / span, 0.0, 1.0);
    return mix(color, globals.fog_color.rgb, amount);
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world_position = object.model * vec4<f32>(input.position, 1.0);
    out.position = globals.view_proj * world_position;
    out.world_pos = world_position.xyz;

    let world_normal = mat3x3<f32>(
        object.normal[0].xyz,
        object.normal[1].xyz,
        object.normal[2].xyz
    ) * input.normal;

    out.normal = normalize(world_normal);
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    var normal = normalize(input.normal);
    if (dot(normal, globals.camera_position.xyz - input.world_pos) < 0.0) {
        normal = -normal;
    }
    let light_dir = normalize(globals.light_position.xyz - input.world_pos);
    let diffuse = max(dot(normal, light_dir), 0.0);
    let intensity = globals.light_color.w;
    let lit = (AMBIENT + diffuse * intensity) * object.color.rgb * globals.light_color.xyz;
    return vec4<f32>(fogged(lit, input.world_pos), object.color.a);
}

struct PointOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
}

@vertex
fn vs_points(@location(0) position: vec3<f32>) -> PointOutput {
    var out: PointOutput;
    let world_position = object.model * vec4<f32>(position, 1.0);
    out.position = globals.view_proj * world_position;
    out.world_pos = world_position.xyz;
    return out;
}

@fragment
fn fs_points(input: PointOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(fogged(object.color.rgb, input.world_pos), object.color.a);
}
"#;

pub(crate) const CUBE_VERTICES: &[f32] = &[
    // positions        // normals
    -0.5, -0.5, 0.5, 0.0, 0.0, 1.0, 0.5, -0.5, 0.5, 0.0, 0.0, 1.0, 0.5, 0.5, 0.5, 0.0, 0.0, 1.0,
    -0.5, 0.5, 0.5, 0.0, 0.0, 1.0, -0.5, -0.5, -0.5, 0.0, 0.0, -1.0, 0.5, -0.5, -0.5, 0.0, 0.0,
    -1.0, 0.5, 0.5, -0.5, 0.0, 0.0, -1.0, -0.5, 0.5, -0.5, 0.0, 0.0, -1.0, -0.5, -0.5, -0.5, -1.0,
    0.0, 0.0, -0.5, -0.5, 0.5, -1.0, 0.0, 0.0, -0.5, 0.5, 0.5, -1.0, 0.0, 0.0, -0.5, 0.5, -0.5,
    -1.0, 0.0, 0.0, 0.5, -0.5, -0.5, 1.0, 0.0, 0.0, 0.5, -0.5, 0.5, 1.0, 0.0, 0.0, 0.5, 0.5, 0.5,
    1.0, 0.0, 0.0, 0.5, 0.5, -0.5, 1.0, 0.0, 0.0, -0.5, -0.5, -0.5, 0.0, -1.0, 0.0, 0.5, -0.5,
    -0.5, 0.0, -1.0, 0.0, 0.5, -0.5, 0.5, 0.0, -1.0, 0.0, -0.5, -0.5, 0.5, 0.0, -1.0, 0.0, -0.5,
    0.5, -0.5, 0.0, 1.0, 0.0, 0.5, 0.5, -0.5, 0.0, 1.0, 0.0, 0.5, 0.5, 0.5, 0.0, 1.0, 0.0, -0.5,
    0.5, 0.5, 0.0, 1.0, 0.0,
];

pub(crate) const CUBE_INDICES: &[u32] = &[
    0, 1, 2, 0, 2, 3, // front
    4, 6, 5, 4, 7, 6, // back
    8, 9, 10, 8, 10, 11, // left
    12, 14, 13, 12, 15, 14, // right
    16, 18, 17, 16, 19, 18, // bottom
    20, 21, 22, 20, 22, 23, // top
];

/// Stride of one interleaved cube vertex, in floats.
pub(crate) const CUBE_STRIDE: usize = 6;

/// Thickness of the floor slab drawn with the cube mesh.
pub(crate) const FLOOR_THICKNESS: f32 = 0.02;

/// Position of cube vertex `index` in model space.
pub(crate) fn cube_vertex(index: u32) -> Vec3 {
    let base = index as usize * CUBE_STRIDE;
    Vec3::new(
        CUBE_VERTICES[base],
        CUBE_VERTICES[base + 1],
        CUBE_VERTICES[base + 2],
    )
}

/// World-space triangles of one model part.
pub(crate) fn part_triangles(
    model: &ModelNode,
    part: &ModelPart,
) -> impl Iterator<Item = [Vec3; 3]> {
    let transform = model.part_transform(part);
    CUBE_INDICES.chunks_exact(3).map(move |tri| {
        [
            transform.transform_point3(cube_vertex(tri[0])),
            transform.transform_point3(cube_vertex(tri[1])),
            transform.transform_point3(cube_vertex(tri[2])),
        ]
    })
}

/// Model matrix of the floor slab, with its top face at the floor height.
pub(crate) fn floor_transform(floor: &FloorNode) -> Mat4 {
    Mat4::from_translation(Vec3::new(0.0, floor.height - FLOOR_THICKNESS / 2.0, 0.0))
        * Mat4::from_scale(Vec3::new(
            floor.extent * 2.0,
            FLOOR_THICKNESS,
            floor.extent * 2.0,
        ))
}

pub(crate) fn mat3_to_3x4(matrix: Mat3) -> [[f32; 4]; 3] {
    let cols = matrix.to_cols_array();
    [
        [cols[0], cols[1], cols[2], 0.0],
        [cols[3], cols[4], cols[5], 0.0],
        [cols[6], cols[7], cols[8], 0.0],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::scene::{ModelFactory, VehicleModel};

    #[test]
    fn cube_mesh_is_a_closed_unit_box() {
        assert_eq!(CUBE_VERTICES.len(), 24 * CUBE_STRIDE);
        assert_eq!(CUBE_INDICES.len(), 36);
        assert!(CUBE_INDICES.iter().all(|&i| i < 24));
        for i in 0..24 {
            let v = cube_vertex(i);
            assert_eq!(v.abs(), Vec3::splat(0.5));
        }
    }

    #[test]
    fn part_triangles_follow_the_model_transform() {
        let model = VehicleModel::new();
        let mut node = model.create_model_node(Color::WHITE, None, None);
        node.position = Vec3::new(10.0, 0.0, 0.0);
        let part = node.parts[0];
        let triangles: Vec<_> = part_triangles(&node, &part).collect();
        assert_eq!(triangles.len(), 12);
        let half = part.size.x / 2.0;
        for vertex in triangles.iter().flatten() {
            assert!((vertex.x - 10.0 - part.center.x).abs() <= half + 1e-4);
        }
    }
}
