// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! CSG (Constructive Solid Geometry) operations using BSP trees

use super::{Mesh, Triangle, Vertex};
use nalgebra::{Point3, Vector3};

const EPSILON: f64 = 1e-7;

const COPLANAR: u8 = 0;
const FRONT: u8 = 1;
const BACK: u8 = 2;
const SPANNING: u8 = 3;

/// Boolean operation applied to two solids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOp {
    Union,
    Difference,
    Intersection,
}

#[derive(Debug, Clone)]
struct Plane {
    normal: Vector3<f64>,
    w: f64,
}

#[derive(Debug, Clone)]
struct Polygon {
    vertices: Vec<Vertex>,
    plane: Plane,
}

/// BSP tree node for CSG operations
#[derive(Debug, Clone, Default)]
struct BspNode {
    plane: Option<Plane>,
    front: Option<Box<BspNode>>,
    back: Option<Box<BspNode>>,
    polygons: Vec<Polygon>,
}

impl Plane {
    fn from_points(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> Option<Self> {
        let normal = (b - a).cross(&(c - a));
        if normal.norm() < 1e-12 {
            return None;
        }
        let normal = normal.normalize();
        Some(Self {
            w: normal.dot(&a.coords),
            normal,
        })
    }

    fn flip(&mut self) {
        self.normal = -self.normal;
        self.w = -self.w;
    }

    /// Sort `polygon` into the four buckets, splitting it when it spans the plane
    fn split_polygon(
        &self,
        polygon: &Polygon,
        coplanar_front: &mut Vec<Polygon>,
        coplanar_back: &mut Vec<Polygon>,
        front: &mut Vec<Polygon>,
        back: &mut Vec<Polygon>,
    ) {
        let mut polygon_type = COPLANAR;
        let types: Vec<u8> = polygon
            .vertices
            .iter()
            .map(|v| {
                let t = self.normal.dot(&v.position.coords) - self.w;
                let kind = if t < -EPSILON {
                    BACK
                } else if t > EPSILON {
                    FRONT
                } else {
                    COPLANAR
                };
                polygon_type |= kind;
                kind
            })
            .collect();

        match polygon_type {
            COPLANAR => {
                if self.normal.dot(&polygon.plane.normal) > 0.0 {
                    coplanar_front.push(polygon.clone());
                } else {
                    coplanar_back.push(polygon.clone());
                }
            }
            FRONT => front.push(polygon.clone()),
            BACK => back.push(polygon.clone()),
            _ => {
                let mut f = Vec::new();
                let mut b = Vec::new();
                let count = polygon.vertices.len();
                for i in 0..count {
                    let j = (i + 1) % count;
                    let (ti, tj) = (types[i], types[j]);
                    let (vi, vj) = (&polygon.vertices[i], &polygon.vertices[j]);
                    if ti != BACK {
                        f.push(*vi);
                    }
                    if ti != FRONT {
                        b.push(*vi);
                    }
                    if (ti | tj) == SPANNING {
                        let t = (self.w - self.normal.dot(&vi.position.coords))
                            / self.normal.dot(&(vj.position - vi.position));
                        let v = vi.lerp(vj, t);
                        f.push(v);
                        b.push(v);
                    }
                }
                if f.len() >= 3 {
                    front.push(Polygon {
                        vertices: f,
                        plane: polygon.plane.clone(),
                    });
                }
                if b.len() >= 3 {
                    back.push(Polygon {
                        vertices: b,
                        plane: polygon.plane.clone(),
                    });
                }
            }
        }
    }
}

impl Polygon {
    fn flip(&mut self) {
        self.vertices.reverse();
        for v in &mut self.vertices {
            v.normal = -v.normal;
        }
        self.plane.flip();
    }
}

impl BspNode {
    fn new(polygons: Vec<Polygon>) -> Self {
        let mut node = Self::default();
        node.build(polygons);
        node
    }

    fn build(&mut self, polygons: Vec<Polygon>) {
        let Some(first) = polygons.first() else {
            return;
        };
        let plane = self.plane.get_or_insert_with(|| first.plane.clone()).clone();

        let mut coplanar_front = Vec::new();
        let mut coplanar_back = Vec::new();
        let mut front = Vec::new();
        let mut back = Vec::new();
        for polygon in &polygons {
            plane.split_polygon(
                polygon,
                &mut coplanar_front,
                &mut coplanar_back,
                &mut front,
                &mut back,
            );
        }
        self.polygons.append(&mut coplanar_front);
        self.polygons.append(&mut coplanar_back);

        if !front.is_empty() {
            self.front.get_or_insert_with(Box::default).build(front);
        }
        if !back.is_empty() {
            self.back.get_or_insert_with(Box::default).build(back);
        }
    }

    fn all_polygons(&self) -> Vec<Polygon> {
        let mut result = self.polygons.clone();
        if let Some(ref front) = self.front {
            result.extend(front.all_polygons());
        }
        if let Some(ref back) = self.back {
            result.extend(back.all_polygons());
        }
        result
    }

    fn clip_to(&mut self, bsp: &BspNode) {
        self.polygons = bsp.clip_polygons(&self.polygons);
        if let Some(ref mut front) = self.front {
            front.clip_to(bsp);
        }
        if let Some(ref mut back) = self.back {
            back.clip_to(bsp);
        }
    }

    /// Remove every polygon inside this tree
    fn clip_polygons(&self, polygons: &[Polygon]) -> Vec<Polygon> {
        let Some(ref plane) = self.plane else {
            return polygons.to_vec();
        };

        let mut front = Vec::new();
        let mut back = Vec::new();
        for polygon in polygons {
            let mut coplanar_front = Vec::new();
            let mut coplanar_back = Vec::new();
            plane.split_polygon(
                polygon,
                &mut coplanar_front,
                &mut coplanar_back,
                &mut front,
                &mut back,
            );
            front.append(&mut coplanar_front);
            back.append(&mut coplanar_back);
        }

        let mut result = match self.front {
            Some(ref node) => node.clip_polygons(&front),
            None => front,
        };
        if let Some(ref node) = self.back {
            result.extend(node.clip_polygons(&back));
        }
        result
    }

    fn invert(&mut self) {
        for polygon in &mut self.polygons {
            polygon.flip();
        }
        if let Some(ref mut plane) = self.plane {
            plane.flip();
        }
        if let Some(ref mut front) = self.front {
            front.invert();
        }
        if let Some(ref mut back) = self.back {
            back.invert();
        }
        std::mem::swap(&mut self.front, &mut self.back);
    }
}

fn mesh_to_polygons(mesh: &Mesh) -> Vec<Polygon> {
    mesh.triangles
        .iter()
        .filter_map(|tri| {
            let vertices = vec![
                mesh.vertices[tri.indices[0]],
                mesh.vertices[tri.indices[1]],
                mesh.vertices[tri.indices[2]],
            ];
            let plane =
                Plane::from_points(&vertices[0].position, &vertices[1].position, &vertices[2].position)?;
            Some(Polygon { vertices, plane })
        })
        .collect()
}

/// Fan-triangulate convex polygons back into a flat shaded mesh
fn polygons_to_mesh(polygons: &[Polygon]) -> Mesh {
    let mut mesh = Mesh::new();
    for polygon in polygons {
        let normal = polygon.plane.normal;
        let indices: Vec<usize> = polygon
            .vertices
            .iter()
            .map(|v| mesh.add_vertex(Vertex::new(v.position, normal)))
            .collect();
        for i in 1..indices.len().saturating_sub(1) {
            mesh.add_triangle(Triangle::new([indices[0], indices[i], indices[i + 1]]));
        }
    }
    mesh
}

/// Apply a boolean operation to two closed meshes
pub fn boolean(a: &Mesh, b: &Mesh, op: BooleanOp) -> Mesh {
    match op {
        BooleanOp::Union => csg_union(a, b),
        BooleanOp::Difference => csg_difference(a, b),
        BooleanOp::Intersection => csg_intersection(a, b),
    }
}

pub fn csg_union(a: &Mesh, b: &Mesh) -> Mesh {
    if a.is_empty() {
        return b.clone();
    }
    if b.is_empty() {
        return a.clone();
    }
    let mut tree_a = BspNode::new(mesh_to_polygons(a));
    let mut tree_b = BspNode::new(mesh_to_polygons(b));

    tree_a.clip_to(&tree_b);
    tree_b.clip_to(&tree_a);
    tree_b.invert();
    tree_b.clip_to(&tree_a);
    tree_b.invert();
    tree_a.build(tree_b.all_polygons());

    polygons_to_mesh(&tree_a.all_polygons())
}

pub fn csg_difference(a: &Mesh, b: &Mesh) -> Mesh {
    if a.is_empty() || b.is_empty() {
        return a.clone();
    }
    let mut tree_a = BspNode::new(mesh_to_polygons(a));
    let mut tree_b = BspNode::new(mesh_to_polygons(b));

    tree_a.invert();
    tree_a.clip_to(&tree_b);
    tree_b.clip_to(&tree_a);
    tree_b.invert();
    tree_b.clip_to(&tree_a);
    tree_b.invert();
    tree_a.build(tree_b.all_polygons());
    tree_a.invert();

    polygons_to_mesh(&tree_a.all_polygons())
}

pub fn csg_intersection(a: &Mesh, b: &Mesh) -> Mesh {
    if a.is_empty() || b.is_empty() {
        return Mesh::new();
    }
    let mut tree_a = BspNode::new(mesh_to_polygons(a));
    let mut tree_b = BspNode::new(mesh_to_polygons(b));

    tree_a.invert();
    tree_b.clip_to(&tree_a);
    tree_b.invert();
    tree_a.clip_to(&tree_b);
    tree_b.clip_to(&tree_a);
    tree_a.build(tree_b.all_polygons());
    tree_a.invert();

    polygons_to_mesh(&tree_a.all_polygons())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use approx::assert_relative_eq;

    fn cube(size: f64, offset: Vector3<f64>) -> Mesh {
        let mut mesh = Primitive::cuboid(Vector3::new(size, size, size)).to_mesh();
        mesh.translate(offset);
        mesh
    }

    #[test]
    fn test_difference_of_overlapping_cubes() {
        let a = cube(2.0, Vector3::zeros());
        let b = cube(2.0, Vector3::new(1.0, 0.0, 0.0));
        let result = csg_difference(&a, &b);
        assert_relative_eq!(result.volume(), 4.0, epsilon = 1e-6);
        assert_relative_eq!(result.bounding_box().max.x, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_union_and_intersection_volumes() {
        let a = cube(2.0, Vector3::zeros());
        let b = cube(2.0, Vector3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(csg_union(&a, &b).volume(), 12.0, epsilon = 1e-6);
        assert_relative_eq!(csg_intersection(&a, &b).volume(), 4.0, epsilon = 1e-6);
    }

    #[test]
    fn test_empty_operands() {
        let a = cube(1.0, Vector3::zeros());
        let empty = Mesh::new();
        assert_eq!(boolean(&a, &empty, BooleanOp::Difference), a);
        assert!(boolean(&empty, &a, BooleanOp::Intersection).is_empty());
        assert_eq!(boolean(&empty, &a, BooleanOp::Union), a);
    }
}
