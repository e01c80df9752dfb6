//! Scene and camera collaborator types.
//!
//! The pipeline core treats both as opaque: the orchestrator passes them
//! through unexamined, and only rasterizer stages look inside. Keeping the
//! types here (rather than behind a trait) matches how the rest of the crate
//! consumes them — a flat triangle list plus a view-projection matrix is all
//! the rasterizer needs.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::color::Color;

/// One rasterizer vertex: object-space position plus straight-alpha color.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

impl MeshVertex {
    pub fn new(position: [f32; 3], color: [f32; 4]) -> Self {
        Self { position, color }
    }
}

/// A triangle-list mesh. Vertices are consumed three at a time.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub vertices: Vec<MeshVertex>,
}

impl Mesh {
    pub fn new(vertices: Vec<MeshVertex>) -> Self {
        Self { vertices }
    }

    /// Appends one triangle with a shared flat color.
    pub fn push_triangle(&mut self, corners: [[f32; 3]; 3], color: [f32; 4]) {
        for corner in corners {
            self.vertices.push(MeshVertex::new(corner, color));
        }
    }
}

/// The drawable content handed to a rasterizer stage each frame.
///
/// `background` overrides the orchestrator background for this scene's clear
/// color; intrinsic rendering relies on the albedo and shading scenes having
/// independent backgrounds.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    pub background: Option<Color>,
    pub meshes: Vec<Mesh>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_background(background: Color) -> Self {
        Self {
            background: Some(background),
            meshes: Vec::new(),
        }
    }

    pub fn push_mesh(&mut self, mesh: Mesh) {
        self.meshes.push(mesh);
    }

    /// Flattens every mesh into one triangle list for vertex upload.
    pub(crate) fn collect_vertices(&self) -> Vec<MeshVertex> {
        let total = self.meshes.iter().map(|mesh| mesh.vertices.len()).sum();
        let mut vertices = Vec::with_capacity(total);
        for mesh in &self.meshes {
            vertices.extend_from_slice(&mesh.vertices);
        }
        vertices
    }
}

/// View and projection transforms for a rasterizer stage.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub view: Mat4,
    pub projection: Mat4,
}

impl Camera {
    /// Pass-through camera: positions arrive already in clip space.
    pub fn identity() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        }
    }

    /// Right-handed perspective camera looking from `eye` toward `target`.
    pub fn perspective(eye: Vec3, target: Vec3, fov_y_radians: f32, aspect: f32) -> Self {
        Self {
            view: Mat4::look_at_rh(eye, target, Vec3::Y),
            projection: Mat4::perspective_rh(fov_y_radians, aspect.max(f32::EPSILON), 0.1, 100.0),
        }
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection * self.view
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_vertices_preserves_mesh_order() {
        let mut scene = Scene::new();
        let mut first = Mesh::default();
        first.push_triangle([[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]], [1.0; 4]);
        let mut second = Mesh::default();
        second.push_triangle([[0.0; 3], [2.0, 0.0, 0.0], [0.0, 2.0, 0.0]], [0.5; 4]);
        scene.push_mesh(first);
        scene.push_mesh(second);

        let vertices = scene.collect_vertices();
        assert_eq!(vertices.len(), 6);
        assert_eq!(vertices[0].color, [1.0; 4]);
        assert_eq!(vertices[5].color, [0.5; 4]);
        assert_eq!(vertices[4].position, [2.0, 0.0, 0.0]);
    }

    #[test]
    fn identity_camera_is_a_pass_through() {
        let camera = Camera::identity();
        assert_eq!(camera.view_proj(), Mat4::IDENTITY);
    }
}
