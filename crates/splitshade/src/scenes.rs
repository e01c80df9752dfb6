//! Built-in demo content: one cube described twice.
//!
//! The albedo scene carries the surface colors, the shading scene carries a
//! grayscale per-face light term; multiplying the two reconstructs a lit
//! cube. The single-scene path just shows the albedo cube.

use glam::Vec3;
use renderer::{Camera, Color, Mesh, Scene};

const HALF: f32 = 0.5;

fn quad(mesh: &mut Mesh, corners: [[f32; 3]; 4], color: [f32; 4]) {
    mesh.push_triangle([corners[0], corners[1], corners[2]], color);
    mesh.push_triangle([corners[0], corners[2], corners[3]], color);
}

/// Unit cube centered at the origin; `face_colors` in +X, -X, +Y, -Y, +Z, -Z
/// order.
fn cube(face_colors: [[f32; 4]; 6]) -> Mesh {
    let mut mesh = Mesh::default();
    // +X
    quad(
        &mut mesh,
        [
            [HALF, -HALF, -HALF],
            [HALF, HALF, -HALF],
            [HALF, HALF, HALF],
            [HALF, -HALF, HALF],
        ],
        face_colors[0],
    );
    // -X
    quad(
        &mut mesh,
        [
            [-HALF, -HALF, HALF],
            [-HALF, HALF, HALF],
            [-HALF, HALF, -HALF],
            [-HALF, -HALF, -HALF],
        ],
        face_colors[1],
    );
    // +Y
    quad(
        &mut mesh,
        [
            [-HALF, HALF, -HALF],
            [-HALF, HALF, HALF],
            [HALF, HALF, HALF],
            [HALF, HALF, -HALF],
        ],
        face_colors[2],
    );
    // -Y
    quad(
        &mut mesh,
        [
            [-HALF, -HALF, HALF],
            [-HALF, -HALF, -HALF],
            [HALF, -HALF, -HALF],
            [HALF, -HALF, HALF],
        ],
        face_colors[3],
    );
    // +Z
    quad(
        &mut mesh,
        [
            [-HALF, -HALF, HALF],
            [HALF, -HALF, HALF],
            [HALF, HALF, HALF],
            [-HALF, HALF, HALF],
        ],
        face_colors[4],
    );
    // -Z
    quad(
        &mut mesh,
        [
            [HALF, -HALF, -HALF],
            [-HALF, -HALF, -HALF],
            [-HALF, HALF, -HALF],
            [HALF, HALF, -HALF],
        ],
        face_colors[5],
    );
    mesh
}

pub fn albedo_scene() -> Scene {
    let mut scene = Scene::new();
    scene.push_mesh(cube([
        [0.86, 0.20, 0.18, 1.0],
        [0.95, 0.56, 0.13, 1.0],
        [0.93, 0.86, 0.25, 1.0],
        [0.22, 0.65, 0.32, 1.0],
        [0.21, 0.45, 0.85, 1.0],
        [0.58, 0.28, 0.74, 1.0],
    ]));
    scene
}

pub fn shading_scene() -> Scene {
    let gray = |value: f32| [value, value, value, 1.0];
    // White background keeps the composited backdrop untouched.
    let mut scene = Scene::with_background(Color::WHITE);
    scene.push_mesh(cube([
        gray(0.62),
        gray(0.46),
        gray(0.95),
        gray(0.22),
        gray(0.78),
        gray(0.34),
    ]));
    scene
}

pub fn orbit_camera(elapsed_secs: f32, aspect: f32) -> Camera {
    let angle = elapsed_secs * 0.5;
    let eye = Vec3::new(2.2 * angle.cos(), 1.4, 2.2 * angle.sin());
    Camera::perspective(eye, Vec3::ZERO, 60f32.to_radians(), aspect)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_cubes_have_matching_triangle_counts() {
        let albedo = albedo_scene();
        let shading = shading_scene();
        let count = |scene: &Scene| -> usize {
            scene.meshes.iter().map(|mesh| mesh.vertices.len()).sum()
        };
        assert_eq!(count(&albedo), 36);
        assert_eq!(count(&albedo), count(&shading));
    }

    #[test]
    fn shading_scene_keeps_the_backdrop_white() {
        assert_eq!(shading_scene().background, Some(Color::WHITE));
        assert_eq!(albedo_scene().background, None);
    }
}
