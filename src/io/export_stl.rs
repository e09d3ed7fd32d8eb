// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Binary STL encoder

use crate::error::{Result, ScriptError};
use crate::geometry::Mesh;
use std::io::Cursor;
use stl_io::{Normal, Triangle as StlTriangle, Vertex as StlVertex};

fn vector(x: f64, y: f64, z: f64) -> [f32; 3] {
    [x as f32, y as f32, z as f32]
}

/// Encode meshes as one binary STL solid
///
/// Facet normals come from the triangle geometry, not the vertex normals.
pub fn to_stl<'a>(meshes: impl IntoIterator<Item = &'a Mesh>) -> Result<Vec<u8>> {
    let mut triangles = Vec::new();
    for mesh in meshes {
        for triangle in &mesh.triangles {
            let [v0, v1, v2] = mesh.triangle_positions(triangle);
            let normal = mesh.face_normal(triangle);
            triangles.push(StlTriangle {
                normal: Normal::new(vector(normal.x, normal.y, normal.z)),
                vertices: [
                    StlVertex::new(vector(v0.x, v0.y, v0.z)),
                    StlVertex::new(vector(v1.x, v1.y, v1.z)),
                    StlVertex::new(vector(v2.x, v2.y, v2.z)),
                ],
            });
        }
    }

    let mut cursor = Cursor::new(Vec::new());
    stl_io::write_stl(&mut cursor, triangles.iter())
        .map_err(|e| ScriptError::runtime(format!("STL export error: {e}")))?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use nalgebra::Vector3;

    #[test]
    fn test_stl_roundtrip_triangle_count() -> anyhow::Result<()> {
        let a = Primitive::cuboid(Vector3::new(2.0, 2.0, 2.0)).to_mesh();
        let b = Primitive::cuboid(Vector3::new(1.0, 1.0, 1.0)).to_mesh();
        let bytes = to_stl([&a, &b])?;

        // 80 byte header, u32 count, 50 bytes per facet
        assert_eq!(bytes.len(), 84 + 50 * (a.triangle_count() + b.triangle_count()));

        let mut reader = Cursor::new(bytes);
        let indexed = stl_io::read_stl(&mut reader)?;
        assert_eq!(indexed.faces.len(), 24);
        Ok(())
    }
}
