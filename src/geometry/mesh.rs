// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh representation and utilities

use super::BoundingBox;
use nalgebra::{Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Vertex with position and normal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub position: Point3<f64>,
    pub normal: Vector3<f64>,
}

impl Vertex {
    pub fn new(position: Point3<f64>, normal: Vector3<f64>) -> Self {
        Self { position, normal }
    }

    pub fn transform(&mut self, matrix: &Matrix4<f64>) {
        self.position = matrix.transform_point(&self.position);
        // Normals use the inverse transpose
        let normal_matrix = matrix
            .try_inverse()
            .map(|m| m.transpose())
            .unwrap_or(*matrix);
        let normal = normal_matrix.transform_vector(&self.normal);
        if normal.norm() > f64::EPSILON {
            self.normal = normal.normalize();
        }
    }

    /// Linear interpolation between two vertices
    pub fn lerp(&self, other: &Vertex, t: f64) -> Vertex {
        Vertex {
            position: self.position + (other.position - self.position) * t,
            normal: self.normal + (other.normal - self.normal) * t,
        }
    }
}

/// Triangle defined by three vertex indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triangle {
    pub indices: [usize; 3],
}

impl Triangle {
    pub fn new(indices: [usize; 3]) -> Self {
        Self { indices }
    }
}

/// Triangular mesh
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            triangles: Vec::new(),
        }
    }

    pub fn with_capacity(vertex_count: usize, triangle_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            triangles: Vec::with_capacity(triangle_count),
        }
    }

    /// Add a vertex and return its index
    pub fn add_vertex(&mut self, vertex: Vertex) -> usize {
        let index = self.vertices.len();
        self.vertices.push(vertex);
        index
    }

    pub fn add_triangle(&mut self, triangle: Triangle) {
        self.triangles.push(triangle);
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Transform all vertices by a matrix
    pub fn transform(&mut self, matrix: &Matrix4<f64>) {
        for vertex in &mut self.vertices {
            vertex.transform(matrix);
        }
    }

    pub fn translate(&mut self, offset: Vector3<f64>) {
        self.transform(&Matrix4::new_translation(&offset));
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_vertices(&self.vertices)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Corner positions of one triangle
    pub fn triangle_positions(&self, triangle: &Triangle) -> [Point3<f64>; 3] {
        [
            self.vertices[triangle.indices[0]].position,
            self.vertices[triangle.indices[1]].position,
            self.vertices[triangle.indices[2]].position,
        ]
    }

    /// Face normal of one triangle, zero for degenerate faces
    pub fn face_normal(&self, triangle: &Triangle) -> Vector3<f64> {
        let [a, b, c] = self.triangle_positions(triangle);
        let normal = (b - a).cross(&(c - a));
        if normal.norm() > f64::EPSILON {
            normal.normalize()
        } else {
            Vector3::zeros()
        }
    }

    /// Average face normals into shared vertices
    pub fn recompute_normals(&mut self) {
        let mut accumulated = vec![Vector3::zeros(); self.vertices.len()];
        for triangle in &self.triangles {
            let [a, b, c] = self.triangle_positions(triangle);
            let weighted = (b - a).cross(&(c - a));
            for &index in &triangle.indices {
                accumulated[index] += weighted;
            }
        }
        for (vertex, normal) in self.vertices.iter_mut().zip(accumulated) {
            if normal.norm() > f64::EPSILON {
                vertex.normal = normal.normalize();
            }
        }
    }

    /// Enclosed volume using the divergence theorem; only meaningful for closed meshes
    pub fn volume(&self) -> f64 {
        self.triangles
            .iter()
            .map(|triangle| {
                let [a, b, c] = self.triangle_positions(triangle);
                a.coords.dot(&b.coords.cross(&c.coords)) / 6.0
            })
            .sum::<f64>()
            .abs()
    }
}
