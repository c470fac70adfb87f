//! Generated primitives: spheres, capped cylinders and planes.
//!
//! Triangles are wound counter-clockwise seen from outside. Texture
//! coordinates have v pointing down, matching how images are uploaded.

use std::f32::consts::{PI, TAU};

use cgmath::InnerSpace;

use crate::{data_structures::model::ModelVertex, resources::mesh::MeshData};

fn vertex(position: [f32; 3], normal: [f32; 3], tex_coords: [f32; 2]) -> ModelVertex {
    ModelVertex {
        position,
        tex_coords,
        normal,
        ..Default::default()
    }
}

/// UV sphere centred on the origin.
pub fn sphere(radius: f32, width_segments: u32, height_segments: u32) -> MeshData {
    let width_segments = width_segments.max(3);
    let height_segments = height_segments.max(2);
    let mut vertices = Vec::new();
    let mut grid = Vec::new();

    for iy in 0..=height_segments {
        let v = iy as f32 / height_segments as f32;
        let theta = v * PI;
        let mut row = Vec::new();
        for ix in 0..=width_segments {
            let u = ix as f32 / width_segments as f32;
            let phi = u * TAU;
            let normal = [
                -phi.cos() * theta.sin(),
                theta.cos(),
                phi.sin() * theta.sin(),
            ];
            let position = normal.map(|n| n * radius);
            row.push(vertices.len() as u32);
            vertices.push(vertex(position, normal, [u, v]));
        }
        grid.push(row);
    }

    let mut indices = Vec::new();
    for iy in 0..height_segments as usize {
        for ix in 0..width_segments as usize {
            let a = grid[iy][ix + 1];
            let b = grid[iy][ix];
            let c = grid[iy + 1][ix];
            let d = grid[iy + 1][ix + 1];
            // the poles collapse one triangle of the quad
            if iy != 0 {
                indices.extend([a, b, d]);
            }
            if iy != height_segments as usize - 1 {
                indices.extend([b, c, d]);
            }
        }
    }

    finish("sphere", vertices, indices)
}

/// Cylinder (or truncated cone) along y, centred on the origin, with caps.
pub fn cylinder(radius_top: f32, radius_bottom: f32, height: f32, radial_segments: u32) -> MeshData {
    let radial_segments = radial_segments.max(3);
    let half_height = height / 2.0;
    let slope = (radius_bottom - radius_top) / height;
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    let mut rows: Vec<Vec<u32>> = Vec::new();
    for y in 0..=1u32 {
        let v = y as f32;
        let radius = v * (radius_bottom - radius_top) + radius_top;
        let mut row = Vec::new();
        for x in 0..=radial_segments {
            let u = x as f32 / radial_segments as f32;
            let (sin, cos) = (u * TAU).sin_cos();
            let normal = cgmath::Vector3::new(sin, slope, cos).normalize();
            row.push(vertices.len() as u32);
            vertices.push(vertex(
                [radius * sin, -v * height + half_height, radius * cos],
                normal.into(),
                [u, v],
            ));
        }
        rows.push(row);
    }
    for x in 0..radial_segments as usize {
        let a = rows[0][x];
        let b = rows[1][x];
        let c = rows[1][x + 1];
        let d = rows[0][x + 1];
        indices.extend([a, b, d, b, c, d]);
    }

    for top in [true, false] {
        let sign = if top { 1.0 } else { -1.0 };
        let radius = if top { radius_top } else { radius_bottom };
        let center_start = vertices.len() as u32;
        for _ in 0..radial_segments {
            vertices.push(vertex(
                [0.0, half_height * sign, 0.0],
                [0.0, sign, 0.0],
                [0.5, 0.5],
            ));
        }
        let ring_start = vertices.len() as u32;
        for x in 0..=radial_segments {
            let u = x as f32 / radial_segments as f32;
            let (sin, cos) = (u * TAU).sin_cos();
            vertices.push(vertex(
                [radius * sin, half_height * sign, radius * cos],
                [0.0, sign, 0.0],
                [cos * 0.5 + 0.5, sin * 0.5 * sign + 0.5],
            ));
        }
        for x in 0..radial_segments {
            let c = center_start + x;
            let i = ring_start + x;
            if top {
                indices.extend([i, i + 1, c]);
            } else {
                indices.extend([i + 1, i, c]);
            }
        }
    }

    finish("cylinder", vertices, indices)
}

/// Rectangle in the xy plane facing +z.
pub fn plane(width: f32, height: f32) -> MeshData {
    let (w, h) = (width / 2.0, height / 2.0);
    let normal = [0.0, 0.0, 1.0];
    let vertices = vec![
        vertex([-w, h, 0.0], normal, [0.0, 0.0]),
        vertex([w, h, 0.0], normal, [1.0, 0.0]),
        vertex([-w, -h, 0.0], normal, [0.0, 1.0]),
        vertex([w, -h, 0.0], normal, [1.0, 1.0]),
    ];
    finish("plane", vertices, vec![0, 2, 1, 2, 3, 1])
}

fn finish(name: &str, vertices: Vec<ModelVertex>, indices: Vec<u32>) -> MeshData {
    let mut mesh = MeshData::new(name, vertices, indices);
    mesh.compute_tangents();
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Vector3;

    fn assert_outward(mesh: &MeshData) {
        for tri in mesh.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| Vector3::from(mesh.vertices[i as usize].position));
            let face = (b - a).cross(c - a);
            if face.magnitude2() < 1e-10 {
                continue;
            }
            let n = Vector3::from(mesh.vertices[tri[0] as usize].normal);
            assert!(face.dot(n) > 0.0, "{} has an inward face", mesh.name);
        }
    }

    #[test]
    fn sphere_vertices_lie_on_the_radius() {
        let mesh = sphere(61.0, 16, 12);
        assert!(mesh.is_valid());
        for v in &mesh.vertices {
            assert!((Vector3::from(v.position).magnitude() - 61.0).abs() < 1e-3);
        }
        assert_outward(&mesh);
    }

    #[test]
    fn ground_cylinder_is_closed_and_outward() {
        let mesh = cylinder(47.0, 42.0, 11.0, 64);
        assert!(mesh.is_valid());
        assert_eq!(mesh.indices.len(), 64 * 6 + 2 * 64 * 3);
        let top = mesh.vertices.iter().map(|v| v.position[1]).fold(f32::MIN, f32::max);
        assert_eq!(top, 5.5);
        assert_outward(&mesh);
    }

    #[test]
    fn plane_faces_forward() {
        let mesh = plane(5.0, 3.75);
        assert_outward(&mesh);
        assert_eq!(mesh.vertices[3].position, [2.5, -1.875, 0.0]);
    }
}
