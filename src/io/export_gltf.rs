// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! glTF 2.0 encoders
//!
//! Every mesh becomes one node with its own primitive. All meshes share a
//! single buffer laid out as positions, normals and indices per mesh.

use crate::error::{Result, ScriptError};
use crate::geometry::Mesh;
use base64::Engine;
use serde_json::{json, Value as Json};

const GLB_MAGIC: u32 = 0x4654_6C67; // "glTF"
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A; // "JSON"
const CHUNK_BIN: u32 = 0x004E_4942; // "BIN\0"

const COMPONENT_FLOAT: u32 = 5126;
const COMPONENT_UNSIGNED_INT: u32 = 5125;
const TARGET_ARRAY_BUFFER: u32 = 34962;
const TARGET_ELEMENT_ARRAY_BUFFER: u32 = 34963;

/// Named mesh handed to the encoders
#[derive(Debug, Clone, Copy)]
pub struct MeshNode<'a> {
    pub name: &'a str,
    pub mesh: &'a Mesh,
    /// Free-form metadata written to the node's `extras`
    pub extras: Option<&'a Json>,
}

/// Encode meshes as a binary `.glb`
pub fn to_glb(nodes: &[MeshNode<'_>]) -> Result<Vec<u8>> {
    let (document, buffer) = document(nodes, false)?;
    let json_text = serde_json::to_string(&document).map_err(encode_error)?;

    let json_length = align_to_multiple_of_four(json_text.len());
    let bin_length = align_to_multiple_of_four(buffer.len());
    let total_length = 12 + 8 + json_length + 8 + bin_length;

    let mut out = Vec::with_capacity(total_length);
    out.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    out.extend_from_slice(&GLB_VERSION.to_le_bytes());
    out.extend_from_slice(&(total_length as u32).to_le_bytes());

    out.extend_from_slice(&(json_length as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(json_text.as_bytes());
    out.resize(out.len() + json_length - json_text.len(), b' ');

    out.extend_from_slice(&(bin_length as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
    out.extend_from_slice(&buffer);
    out.resize(out.len() + bin_length - buffer.len(), 0);

    Ok(out)
}

/// Encode meshes as a self-contained glTF document with an embedded buffer
pub fn to_gltf(nodes: &[MeshNode<'_>]) -> Result<Json> {
    let (document, _) = document(nodes, true)?;
    Ok(document)
}

fn encode_error(e: serde_json::Error) -> ScriptError {
    ScriptError::runtime(format!("glTF encoding failed: {e}"))
}

fn document(nodes: &[MeshNode<'_>], embed: bool) -> Result<(Json, Vec<u8>)> {
    let mut buffer: Vec<u8> = Vec::new();
    let mut accessors = Vec::new();
    let mut views = Vec::new();
    let mut meshes = Vec::new();
    let mut scene_nodes = Vec::new();

    for (index, node) in nodes.iter().enumerate() {
        let mesh = node.mesh;
        if mesh.is_empty() {
            continue;
        }
        let vertex_count = mesh.vertices.len();
        if vertex_count > u32::MAX as usize {
            return Err(ScriptError::runtime(format!(
                "mesh '{}' has too many vertices for glTF",
                node.name
            )));
        }

        let (min, max) = calculate_bounds(mesh);

        let position_offset = buffer.len();
        for vertex in &mesh.vertices {
            for c in [vertex.position.x, vertex.position.y, vertex.position.z] {
                buffer.extend_from_slice(&(c as f32).to_le_bytes());
            }
        }
        views.push(view(position_offset, buffer.len() - position_offset, TARGET_ARRAY_BUFFER));

        let normal_offset = buffer.len();
        for vertex in &mesh.vertices {
            for c in [vertex.normal.x, vertex.normal.y, vertex.normal.z] {
                buffer.extend_from_slice(&(c as f32).to_le_bytes());
            }
        }
        views.push(view(normal_offset, buffer.len() - normal_offset, TARGET_ARRAY_BUFFER));

        let indices_offset = buffer.len();
        for triangle in &mesh.triangles {
            for i in triangle.indices {
                buffer.extend_from_slice(&(i as u32).to_le_bytes());
            }
        }
        views.push(view(
            indices_offset,
            buffer.len() - indices_offset,
            TARGET_ELEMENT_ARRAY_BUFFER,
        ));

        let first_view = views.len() - 3;
        let first_accessor = accessors.len();
        accessors.push(json!({
            "bufferView": first_view,
            "componentType": COMPONENT_FLOAT,
            "count": vertex_count,
            "type": "VEC3",
            "min": min,
            "max": max,
        }));
        accessors.push(json!({
            "bufferView": first_view + 1,
            "componentType": COMPONENT_FLOAT,
            "count": vertex_count,
            "type": "VEC3",
        }));
        accessors.push(json!({
            "bufferView": first_view + 2,
            "componentType": COMPONENT_UNSIGNED_INT,
            "count": mesh.triangles.len() * 3,
            "type": "SCALAR",
        }));

        meshes.push(json!({
            "name": node.name,
            "primitives": [{
                "attributes": { "POSITION": first_accessor, "NORMAL": first_accessor + 1 },
                "indices": first_accessor + 2,
                "mode": 4,
            }],
        }));

        let mut gltf_node = json!({ "name": node.name, "mesh": meshes.len() - 1 });
        if let (Some(extras), Json::Object(map)) = (node.extras, &mut gltf_node) {
            map.insert("extras".into(), extras.clone());
        }
        scene_nodes.push(gltf_node);
        tracing::trace!(node = index, vertices = vertex_count, "encoded mesh");
    }

    let mut buffer_entry = json!({ "byteLength": buffer.len() });
    if embed {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&buffer);
        buffer_entry["uri"] = Json::String(format!("data:application/octet-stream;base64,{encoded}"));
    }

    let mut document = json!({
        "asset": { "generator": "Polyframe Script", "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": (0..scene_nodes.len()).collect::<Vec<_>>() }],
        "nodes": scene_nodes,
        "meshes": meshes,
        "accessors": accessors,
        "bufferViews": views,
    });
    if !buffer.is_empty() {
        document["buffers"] = json!([buffer_entry]);
    }
    Ok((document, buffer))
}

fn view(offset: usize, length: usize, target: u32) -> Json {
    json!({ "buffer": 0, "byteOffset": offset, "byteLength": length, "target": target })
}

fn calculate_bounds(mesh: &Mesh) -> ([f32; 3], [f32; 3]) {
    let mut min = [f32::MAX; 3];
    let mut max = [f32::MIN; 3];

    for vertex in &mesh.vertices {
        let p = [vertex.position.x as f32, vertex.position.y as f32, vertex.position.z as f32];
        for axis in 0..3 {
            min[axis] = min[axis].min(p[axis]);
            max[axis] = max[axis].max(p[axis]);
        }
    }

    (min, max)
}

fn align_to_multiple_of_four(n: usize) -> usize {
    (n + 3) & !3
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use nalgebra::Vector3;

    fn cube() -> Mesh {
        Primitive::cuboid(Vector3::new(10.0, 10.0, 10.0)).to_mesh()
    }

    #[test]
    fn test_glb_layout() -> Result<()> {
        let mesh = cube();
        let bytes = to_glb(&[MeshNode { name: "cube", mesh: &mesh, extras: None }])?;

        assert_eq!(&bytes[0..4], b"glTF");
        assert_eq!(u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]), 2);
        let total = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        assert_eq!(total, bytes.len());
        assert_eq!(bytes.len() % 4, 0);
        assert_eq!(&bytes[16..20], b"JSON");
        Ok(())
    }

    #[test]
    fn test_gltf_embeds_buffer_and_one_node_per_mesh() -> Result<()> {
        let a = cube();
        let b = Primitive::sphere(5.0, 12).to_mesh();
        let extras = json!({"color": "red"});
        let document = to_gltf(&[
            MeshNode { name: "a", mesh: &a, extras: Some(&extras) },
            MeshNode { name: "b", mesh: &b, extras: None },
        ])?;

        assert_eq!(document["nodes"].as_array().map(Vec::len), Some(2));
        assert_eq!(document["nodes"][0]["extras"]["color"], "red");
        assert_eq!(document["accessors"][3]["bufferView"], 3);
        let uri = document["buffers"][0]["uri"].as_str().unwrap_or_default();
        assert!(uri.starts_with("data:application/octet-stream;base64,"));

        // positions are f32: 12 bytes per vertex
        assert_eq!(document["bufferViews"][0]["byteLength"], a.vertices.len() * 12);
        Ok(())
    }

    #[test]
    fn test_empty_scene_is_still_valid() -> Result<()> {
        let document = to_gltf(&[])?;
        assert_eq!(document["asset"]["version"], "2.0");
        assert!(document.get("buffers").is_none());
        assert!(!to_glb(&[])?.is_empty());
        Ok(())
    }
}
