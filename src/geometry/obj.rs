// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Scene graph containers

use super::{BoundingBox, ShapeId, ShapeRef};
use parking_lot::RwLock;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::sync::Arc;

pub type ObjRef = Arc<RwLock<Obj>>;

/// Named scene node holding shapes and child nodes
#[derive(Debug)]
pub struct Obj {
    pub name: String,
    pub visible: bool,
    shapes: Vec<ShapeRef>,
    children: Vec<ObjRef>,
}

impl Obj {
    pub fn new(name: impl Into<String>) -> ObjRef {
        Arc::new(RwLock::new(Self {
            name: name.into(),
            visible: true,
            shapes: Vec::new(),
            children: Vec::new(),
        }))
    }

    pub fn add_shape(&mut self, shape: ShapeRef) {
        if !self.shapes.iter().any(|s| Arc::ptr_eq(s, &shape)) {
            self.shapes.push(shape);
        }
    }

    pub fn add_child(&mut self, child: ObjRef) {
        self.children.push(child);
    }

    pub fn shapes(&self) -> &[ShapeRef] {
        &self.shapes
    }

    pub fn children(&self) -> &[ObjRef] {
        &self.children
    }

    /// Shapes of this node and all descendants, depth first
    pub fn all_shapes(&self) -> Vec<ShapeRef> {
        let mut shapes = self.shapes.clone();
        for child in &self.children {
            shapes.extend(child.read().all_shapes());
        }
        shapes
    }

    /// Detach a shape from this subtree; returns whether it was found
    pub fn remove_shape(&mut self, id: ShapeId) -> bool {
        let before = self.shapes.len();
        self.shapes.retain(|s| s.read().id() != id);
        let mut removed = self.shapes.len() != before;
        for child in &self.children {
            removed |= child.write().remove_shape(id);
        }
        removed
    }

    pub fn bbox(&self) -> BoundingBox {
        self.all_shapes()
            .iter()
            .fold(BoundingBox::empty(), |acc, s| acc.union(&s.read().bbox()))
    }

    /// Snapshot of this subtree; shape handles stay shared
    pub fn to_tree(&self) -> ObjTree {
        ObjTree {
            name: self.name.clone(),
            shapes: self.shapes.clone(),
            children: self.children.iter().map(|c| c.read().to_tree()).collect(),
        }
    }
}

/// Detached object tree exchanged between runs
#[derive(Debug, Clone, Default)]
pub struct ObjTree {
    pub name: String,
    pub shapes: Vec<ShapeRef>,
    pub children: Vec<ObjTree>,
}

impl ObjTree {
    pub fn all_shapes(&self) -> Vec<ShapeRef> {
        let mut shapes = self.shapes.clone();
        for child in &self.children {
            shapes.extend(child.all_shapes());
        }
        shapes
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len() + self.children.iter().map(ObjTree::shape_count).sum::<usize>()
    }

    pub fn bbox(&self) -> BoundingBox {
        self.all_shapes()
            .iter()
            .fold(BoundingBox::empty(), |acc, s| acc.union(&s.read().bbox()))
    }
}

impl Serialize for ObjTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let shapes: Vec<serde_json::Value> = self
            .shapes
            .iter()
            .map(|s| {
                let shape = s.read();
                serde_json::json!({
                    "id": shape.id(),
                    "name": shape.name,
                    "color": shape.color,
                    "visible": shape.visible,
                    "triangles": shape.mesh.triangle_count(),
                })
            })
            .collect();

        let mut state = serializer.serialize_struct("ObjTree", 3)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("shapes", &shapes)?;
        state.serialize_field("children", &self.children)?;
        state.end()
    }
}
