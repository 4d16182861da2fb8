//! Projects a generated view-space albedo back into an object's UV space.

use glam::{Mat4, Vec2, Vec3, Vec4Swizzles};
use image::{Rgba, RgbaImage};

use crate::capture::{CaptureBand, SceneCamera, SceneMesh};

/// One triangle in world space with its UVs and per-corner normals.
struct Triangle {
    uv: [Vec2; 3],
    world: [Vec3; 3],
    normal: [Vec3; 3],
}

/// Rasterises each triangle of `mesh` in UV space and copies the albedo texel
/// the capture camera saw at that surface point.
///
/// Texels that are not covered, face away from the camera, or fall outside
/// the capture stay transparent.
pub fn project_albedo(
    albedo: &RgbaImage,
    camera: &SceneCamera,
    band: CaptureBand,
    mesh: &SceneMesh,
    texture_size: u32,
) -> RgbaImage {
    let size = texture_size.max(1);
    let mut texture = RgbaImage::from_pixel(size, size, Rgba([0, 0, 0, 0]));
    let view_projection = camera.view_projection();

    for triangle in world_triangles(mesh) {
        let clip_behind = triangle
            .world
            .iter()
            .any(|p| view_projection.mul_vec4(p.extend(1.0)).w <= 0.0);
        if clip_behind {
            continue;
        }
        rasterize(
            &triangle,
            albedo,
            camera,
            &view_projection,
            band,
            &mut texture,
        );
    }

    texture
}

fn world_triangles(mesh: &SceneMesh) -> Vec<Triangle> {
    let local_to_world = mesh.local_to_world;
    let normal_matrix = local_to_world.inverse().transpose();
    let has_normals = mesh.normals.len() == mesh.positions.len();

    mesh.indices
        .chunks_exact(3)
        .filter_map(|corners| {
            let idx = [
                corners[0] as usize,
                corners[1] as usize,
                corners[2] as usize,
            ];
            let uv = [
                *mesh.uvs.get(idx[0])?,
                *mesh.uvs.get(idx[1])?,
                *mesh.uvs.get(idx[2])?,
            ];
            let world = [
                local_to_world.transform_point3(*mesh.positions.get(idx[0])?),
                local_to_world.transform_point3(*mesh.positions.get(idx[1])?),
                local_to_world.transform_point3(*mesh.positions.get(idx[2])?),
            ];
            let normal = if has_normals {
                idx.map(|i| normal_matrix.transform_vector3(mesh.normals[i]).normalize_or_zero())
            } else {
                let face = (world[1] - world[0])
                    .cross(world[2] - world[0])
                    .normalize_or_zero();
                [face; 3]
            };
            Some(Triangle { uv, world, normal })
        })
        .collect()
}

fn rasterize(
    triangle: &Triangle,
    albedo: &RgbaImage,
    camera: &SceneCamera,
    view_projection: &Mat4,
    band: CaptureBand,
    texture: &mut RgbaImage,
) {
    let size = texture.width();
    let scale = size as f32;
    let [uv0, uv1, uv2] = triangle.uv;
    let min = uv0.min(uv1).min(uv2);
    let max = uv0.max(uv1).max(uv2);

    let last = i64::from(size) - 1;
    let start_x = ((min.x * scale).floor() as i64).max(0);
    let end_x = ((max.x * scale).ceil() as i64).min(last);
    let start_y = ((min.y * scale).floor() as i64).max(0);
    let end_y = ((max.y * scale).ceil() as i64).min(last);

    for y in start_y..=end_y {
        for x in start_x..=end_x {
            let uv = Vec2::new(x as f32 / scale, y as f32 / scale);
            let Some(weights) = barycentric(uv, uv0, uv1, uv2) else {
                continue;
            };
            if let Some(color) = sample(triangle, weights, albedo, camera, view_projection, band)
            {
                // UV v grows upwards; image rows grow downwards.
                texture.put_pixel(x as u32, (last - y) as u32, color);
            }
        }
    }
}

fn sample(
    triangle: &Triangle,
    weights: Vec3,
    albedo: &RgbaImage,
    camera: &SceneCamera,
    view_projection: &Mat4,
    band: CaptureBand,
) -> Option<Rgba<u8>> {
    let [p0, p1, p2] = triangle.world;
    let [n0, n1, n2] = triangle.normal;
    let world = p0 * weights.x + p1 * weights.y + p2 * weights.z;
    let normal = (n0 * weights.x + n1 * weights.y + n2 * weights.z).normalize_or_zero();

    let to_camera = (camera.position - world).normalize_or_zero();
    if normal.dot(to_camera) <= 0.0 {
        return None;
    }

    let clip = view_projection.mul_vec4(world.extend(1.0));
    if clip.w <= 0.0 {
        return None;
    }
    let screen = (clip.xy() / clip.w + Vec2::ONE) * 0.5;

    let width = albedo.width() as f32;
    let height = albedo.height() as f32;
    let ax = lerp(band.x * width, (band.x + band.width) * width, screen.x).floor();
    let ay = lerp(band.y * height, (band.y + band.height) * height, screen.y).floor();
    if ax < 0.0 || ay < 0.0 || ax >= width || ay >= height {
        return None;
    }

    let row = albedo.height() - 1 - ay as u32;
    Some(*albedo.get_pixel(ax as u32, row))
}

/// Barycentric weights of `p` in triangle `abc`, if it lies inside.
fn barycentric(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> Option<Vec3> {
    let v0 = b - a;
    let v1 = c - a;
    let v2 = p - a;

    let d00 = v0.dot(v0);
    let d01 = v0.dot(v1);
    let d11 = v1.dot(v1);
    let d20 = v2.dot(v0);
    let d21 = v2.dot(v1);

    let denom = d00 * d11 - d01 * d01;
    if denom.abs() <= f32::EPSILON {
        return None;
    }

    let v = (d11 * d20 - d01 * d21) / denom;
    let w = (d00 * d21 - d01 * d20) / denom;
    let inside = v >= 0.0 && w >= 0.0 && v + w <= 1.0;
    inside.then(|| Vec3::new(1.0 - v - w, v, w))
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::tests::QuadHost;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);
    const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);

    fn split_albedo() -> RgbaImage {
        RgbaImage::from_fn(4, 4, |x, _| if x < 2 { RED } else { BLUE })
    }

    #[test]
    fn test_projects_visible_quad() {
        let texture = project_albedo(
            &split_albedo(),
            &QuadHost::ortho_camera(),
            CaptureBand::FULL,
            &QuadHost::quad(),
            8,
        );

        assert_eq!(texture.get_pixel(2, 3), &RED);
        assert_eq!(texture.get_pixel(6, 3), &BLUE);
    }

    #[test]
    fn test_back_faces_stay_transparent() {
        let mut quad = QuadHost::quad();
        quad.normals = vec![-Vec3::Z; 4];

        let texture = project_albedo(
            &split_albedo(),
            &QuadHost::ortho_camera(),
            CaptureBand::FULL,
            &quad,
            8,
        );

        assert!(texture.pixels().all(|p| *p == CLEAR));
    }

    #[test]
    fn test_face_normals_when_mesh_has_none() {
        let mut quad = QuadHost::quad();
        quad.normals.clear();

        let texture = project_albedo(
            &split_albedo(),
            &QuadHost::ortho_camera(),
            CaptureBand::FULL,
            &quad,
            8,
        );

        assert_eq!(texture.get_pixel(2, 3), &RED);
    }

    #[test]
    fn test_barycentric_outside() {
        let a = Vec2::ZERO;
        let b = Vec2::X;
        let c = Vec2::Y;
        assert!(barycentric(Vec2::new(0.25, 0.25), a, b, c).is_some());
        assert!(barycentric(Vec2::new(0.9, 0.9), a, b, c).is_none());
        assert!(barycentric(Vec2::new(0.5, 0.5), a, a, a).is_none());
    }
}
