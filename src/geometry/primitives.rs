// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometric primitives generator
//!
//! All primitives are centered on the origin with outward facing, counter-clockwise triangles.

use super::{Mesh, Triangle, Vertex};
use nalgebra::{Point3, Vector3};
use std::f64::consts::PI;

/// Default number of segments for curved primitives
pub const DEFAULT_SEGMENTS: u32 = 24;

/// Geometric primitives
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Cuboid { size: Vector3<f64> },
    Sphere { r: f64, segments: u32 },
    Cylinder { r: f64, h: f64, segments: u32 },
}

impl Primitive {
    pub fn cuboid(size: Vector3<f64>) -> Self {
        Self::Cuboid { size }
    }

    pub fn sphere(r: f64, segments: u32) -> Self {
        let segments = if segments > 2 { segments } else { DEFAULT_SEGMENTS };
        Self::Sphere { r, segments }
    }

    pub fn cylinder(r: f64, h: f64, segments: u32) -> Self {
        let segments = if segments > 2 { segments } else { DEFAULT_SEGMENTS };
        Self::Cylinder { r, h, segments }
    }

    pub fn to_mesh(&self) -> Mesh {
        match self {
            Self::Cuboid { size } => generate_cuboid_mesh(*size),
            Self::Sphere { r, segments } => generate_sphere_mesh(*r, *segments),
            Self::Cylinder { r, h, segments } => generate_cylinder_mesh(*r, *h, *segments),
        }
    }
}

fn generate_cuboid_mesh(size: Vector3<f64>) -> Mesh {
    let mut mesh = Mesh::with_capacity(36, 12);
    let half = size / 2.0;

    let positions = [
        Point3::new(-half.x, -half.y, -half.z),
        Point3::new(half.x, -half.y, -half.z),
        Point3::new(half.x, half.y, -half.z),
        Point3::new(-half.x, half.y, -half.z),
        Point3::new(-half.x, -half.y, half.z),
        Point3::new(half.x, -half.y, half.z),
        Point3::new(half.x, half.y, half.z),
        Point3::new(-half.x, half.y, half.z),
    ];

    // 6 faces, each with its normal
    let faces = [
        // Top (z+)
        ([4, 5, 6], Vector3::new(0.0, 0.0, 1.0)),
        ([4, 6, 7], Vector3::new(0.0, 0.0, 1.0)),
        // Bottom (z-)
        ([1, 0, 3], Vector3::new(0.0, 0.0, -1.0)),
        ([1, 3, 2], Vector3::new(0.0, 0.0, -1.0)),
        // Right (x+)
        ([5, 1, 2], Vector3::new(1.0, 0.0, 0.0)),
        ([5, 2, 6], Vector3::new(1.0, 0.0, 0.0)),
        // Left (x-)
        ([0, 4, 7], Vector3::new(-1.0, 0.0, 0.0)),
        ([0, 7, 3], Vector3::new(-1.0, 0.0, 0.0)),
        // Back (y+)
        ([7, 6, 2], Vector3::new(0.0, 1.0, 0.0)),
        ([7, 2, 3], Vector3::new(0.0, 1.0, 0.0)),
        // Front (y-)
        ([0, 1, 5], Vector3::new(0.0, -1.0, 0.0)),
        ([0, 5, 4], Vector3::new(0.0, -1.0, 0.0)),
    ];

    for (indices, normal) in faces {
        let v0 = mesh.add_vertex(Vertex::new(positions[indices[0]], normal));
        let v1 = mesh.add_vertex(Vertex::new(positions[indices[1]], normal));
        let v2 = mesh.add_vertex(Vertex::new(positions[indices[2]], normal));
        mesh.add_triangle(Triangle::new([v0, v1, v2]));
    }

    mesh
}

fn generate_sphere_mesh(radius: f64, segments: u32) -> Mesh {
    let mut mesh = Mesh::new();
    let stacks = (segments / 2).max(2) as usize;
    let slices = segments as usize;

    // Poles on the z axis
    for i in 0..=stacks {
        let phi = PI * i as f64 / stacks as f64;
        for j in 0..=slices {
            let theta = 2.0 * PI * j as f64 / slices as f64;
            let normal = Vector3::new(phi.sin() * theta.cos(), phi.sin() * theta.sin(), phi.cos());
            mesh.add_vertex(Vertex::new(Point3::from(normal * radius), normal));
        }
    }

    for i in 0..stacks {
        for j in 0..slices {
            let first = i * (slices + 1) + j;
            let second = first + slices + 1;

            // Skip the degenerate halves of the pole quads
            if i != 0 {
                mesh.add_triangle(Triangle::new([first, second, first + 1]));
            }
            if i != stacks - 1 {
                mesh.add_triangle(Triangle::new([second, second + 1, first + 1]));
            }
        }
    }

    mesh
}

fn generate_cylinder_mesh(radius: f64, height: f64, segments: u32) -> Mesh {
    let mut mesh = Mesh::new();
    let half = height / 2.0;

    let bottom_center = mesh.add_vertex(Vertex::new(
        Point3::new(0.0, 0.0, -half),
        Vector3::new(0.0, 0.0, -1.0),
    ));
    let top_center = mesh.add_vertex(Vertex::new(
        Point3::new(0.0, 0.0, half),
        Vector3::new(0.0, 0.0, 1.0),
    ));

    let mut bottom = Vec::with_capacity(segments as usize);
    let mut top = Vec::with_capacity(segments as usize);

    for i in 0..segments {
        let angle = 2.0 * PI * i as f64 / segments as f64;
        let (sin, cos) = angle.sin_cos();
        let radial = Vector3::new(cos, sin, 0.0);
        bottom.push(mesh.add_vertex(Vertex::new(
            Point3::new(radius * cos, radius * sin, -half),
            radial,
        )));
        top.push(mesh.add_vertex(Vertex::new(
            Point3::new(radius * cos, radius * sin, half),
            radial,
        )));
    }

    let n = segments as usize;
    for i in 0..n {
        let next = (i + 1) % n;
        mesh.add_triangle(Triangle::new([bottom_center, bottom[next], bottom[i]]));
        mesh.add_triangle(Triangle::new([top_center, top[i], top[next]]));
        mesh.add_triangle(Triangle::new([bottom[i], bottom[next], top[i]]));
        mesh.add_triangle(Triangle::new([top[i], bottom[next], top[next]]));
    }

    mesh.recompute_normals();
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn all_faces_point_outward(mesh: &Mesh) -> bool {
        let center = mesh.bounding_box().center();
        mesh.triangles.iter().all(|triangle| {
            let [a, b, c] = mesh.triangle_positions(triangle);
            let centroid = Point3::from((a.coords + b.coords + c.coords) / 3.0);
            mesh.face_normal(triangle).dot(&(centroid - center)) > 0.0
        })
    }

    #[test]
    fn test_cuboid_is_centered() {
        let mesh = Primitive::cuboid(Vector3::new(4.0, 2.0, 6.0)).to_mesh();
        let bbox = mesh.bounding_box();
        assert_eq!(mesh.triangle_count(), 12);
        assert_relative_eq!(bbox.min.z, -3.0);
        assert_relative_eq!(bbox.max.x, 2.0);
        assert!(all_faces_point_outward(&mesh));
    }

    #[test]
    fn test_sphere_orientation() {
        let mesh = Primitive::sphere(5.0, 16).to_mesh();
        assert!(all_faces_point_outward(&mesh));
        assert_relative_eq!(mesh.bounding_box().max.z, 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_cylinder_volume_approaches_analytic() {
        let mesh = Primitive::cylinder(5.0, 10.0, 64).to_mesh();
        assert!(all_faces_point_outward(&mesh));
        let analytic = PI * 25.0 * 10.0;
        assert!((mesh.volume() - analytic).abs() / analytic < 0.01);
    }
}
