// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometry context of one script run
//!
//! A `Geom` owns a scene root, a stack of active layer groups and every shape
//! it creates. Shapes created while a layer group is open land in that group.

use super::{BooleanOp, GeometryKernel, GeomId, Obj, ObjRef, ObjTree, Shape, ShapeCollection, ShapeRef};
use crate::error::Result;
use nalgebra::Vector3;
use std::sync::Arc;
use tracing::debug;

pub const SCENE_NAME: &str = "scene";

#[derive(Debug)]
pub struct Geom {
    id: GeomId,
    kernel: Arc<dyn GeometryKernel>,
    scene: ObjRef,
    layers: Vec<ObjRef>,
}

impl Geom {
    pub fn new(kernel: Arc<dyn GeometryKernel>) -> Self {
        Self {
            id: GeomId::next(),
            kernel,
            scene: Obj::new(SCENE_NAME),
            layers: Vec::new(),
        }
    }

    pub fn id(&self) -> GeomId {
        self.id
    }

    pub fn kernel(&self) -> &Arc<dyn GeometryKernel> {
        &self.kernel
    }

    pub fn scene(&self) -> &ObjRef {
        &self.scene
    }

    /// Innermost open layer group, or the scene root
    pub fn active_layer(&self) -> ObjRef {
        self.layers.last().unwrap_or(&self.scene).clone()
    }

    /// Wrap a mesh in a shape owned by this context and place it in the active layer
    pub fn add_mesh(&mut self, mesh: super::Mesh) -> ShapeRef {
        let shape = Shape::new(self.id, mesh).into_ref();
        self.active_layer().write().add_shape(shape.clone());
        shape
    }

    pub fn make_box(&mut self, width: f64, depth: f64, height: f64) -> Result<ShapeRef> {
        let mesh = self.kernel.cuboid(Vector3::new(width, depth, height))?;
        Ok(self.add_mesh(mesh))
    }

    pub fn make_sphere(&mut self, radius: f64) -> Result<ShapeRef> {
        let mesh = self.kernel.sphere(radius)?;
        Ok(self.add_mesh(mesh))
    }

    pub fn make_cylinder(&mut self, radius: f64, height: f64) -> Result<ShapeRef> {
        let mesh = self.kernel.cylinder(radius, height)?;
        Ok(self.add_mesh(mesh))
    }

    /// Combine `tool` into `target` in place; the tool leaves the scene
    pub fn boolean(&mut self, target: &ShapeRef, tool: &ShapeRef, op: BooleanOp) -> Result<()> {
        if Arc::ptr_eq(target, tool) {
            return Ok(());
        }
        let result = {
            let target_shape = target.read();
            let tool_shape = tool.read();
            self.kernel.boolean(&target_shape.mesh, &tool_shape.mesh, op)?
        };
        target.write().mesh = result;
        let tool_id = tool.read().id();
        self.scene.write().remove_shape(tool_id);
        for layer in &self.layers {
            layer.write().remove_shape(tool_id);
        }
        Ok(())
    }

    /// Open a named layer group under the active layer
    pub fn layer_group(&mut self, name: &str) -> ObjRef {
        let group = Obj::new(name);
        self.active_layer().write().add_child(group.clone());
        self.layers.push(group.clone());
        group
    }

    /// Open a layer group that is not part of the scene
    ///
    /// Shapes created until it is closed belong to the group only.
    pub fn isolated_group(&mut self, name: &str) -> ObjRef {
        let group = Obj::new(name);
        self.layers.push(group.clone());
        group
    }

    /// Close the innermost layer group; returns false when none is open
    pub fn end_layer_group(&mut self) -> bool {
        self.layers.pop().is_some()
    }

    pub fn reset_layers(&mut self) {
        self.layers.clear();
    }

    pub fn remove_shape(&mut self, shape: &ShapeRef) -> bool {
        let id = shape.read().id();
        self.scene.write().remove_shape(id)
    }

    pub fn all_shapes(&self) -> ShapeCollection {
        ShapeCollection::from_shapes(self.scene.read().all_shapes())
    }

    pub fn scene_tree(&self) -> ObjTree {
        self.scene.read().to_tree()
    }

    /// New handle owned by this context for a shape of any context
    pub fn adopt(&self, shape: &ShapeRef) -> ShapeRef {
        shape.read().reowned(self.id).into_ref()
    }

    /// Rebuild a foreign object tree inside this scene
    ///
    /// Every node becomes a fresh container and every shape is re-owned by this
    /// context. The root attaches to the active layer.
    pub fn rehost(&mut self, tree: &ObjTree, root_name: Option<&str>) -> ObjRef {
        let root = self.rehost_node(tree, root_name);
        self.active_layer().write().add_child(root.clone());
        debug!(
            geom = ?self.id,
            root = %root.read().name,
            shapes = tree.shape_count(),
            "rehosted object tree"
        );
        root
    }

    fn rehost_node(&self, tree: &ObjTree, name: Option<&str>) -> ObjRef {
        let node = Obj::new(name.unwrap_or(&tree.name));
        {
            let mut guard = node.write();
            for shape in &tree.shapes {
                guard.add_shape(self.adopt(shape));
            }
            for child in &tree.children {
                guard.add_child(self.rehost_node(child, None));
            }
        }
        node
    }
}
