// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Shape handles and ordered shape collections

use super::{BoundingBox, Mesh};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_GEOM_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_SHAPE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one geometry context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GeomId(u64);

impl GeomId {
    pub(crate) fn next() -> Self {
        Self(NEXT_GEOM_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Identity of one shape handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ShapeId(u64);

impl ShapeId {
    fn next() -> Self {
        Self(NEXT_SHAPE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Shared handle to a shape; mutations are visible to every holder
pub type ShapeRef = Arc<RwLock<Shape>>;

/// A solid owned by exactly one geometry context
#[derive(Debug, Clone)]
pub struct Shape {
    id: ShapeId,
    owner: GeomId,
    pub mesh: Mesh,
    pub name: Option<String>,
    pub color: Option<String>,
    pub visible: bool,
}

impl Shape {
    pub fn new(owner: GeomId, mesh: Mesh) -> Self {
        Self {
            id: ShapeId::next(),
            owner,
            mesh,
            name: None,
            color: None,
            visible: true,
        }
    }

    pub fn id(&self) -> ShapeId {
        self.id
    }

    pub fn owner(&self) -> GeomId {
        self.owner
    }

    pub fn bbox(&self) -> BoundingBox {
        self.mesh.bounding_box()
    }

    /// Copy of this shape owned by another context, with a fresh identity
    pub fn reowned(&self, owner: GeomId) -> Shape {
        Shape {
            id: ShapeId::next(),
            owner,
            ..self.clone()
        }
    }

    pub fn into_ref(self) -> ShapeRef {
        Arc::new(RwLock::new(self))
    }
}

/// Ordered shape collection with named sub-groups
///
/// Elements are reachable by position and iteration; groups map a name to a
/// subset of positions.
#[derive(Debug, Clone, Default)]
pub struct ShapeCollection {
    shapes: Vec<ShapeRef>,
    groups: IndexMap<String, Vec<usize>>,
}

impl ShapeCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_shapes(shapes: Vec<ShapeRef>) -> Self {
        Self {
            shapes,
            groups: IndexMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ShapeRef> {
        self.shapes.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ShapeRef> {
        self.shapes.iter()
    }

    pub fn shapes(&self) -> &[ShapeRef] {
        &self.shapes
    }

    fn position_of(&self, shape: &ShapeRef) -> Option<usize> {
        self.shapes.iter().position(|s| Arc::ptr_eq(s, shape))
    }

    /// Append a shape unless it is already present; returns its position
    pub fn push(&mut self, shape: ShapeRef) -> usize {
        match self.position_of(&shape) {
            Some(index) => index,
            None => {
                self.shapes.push(shape);
                self.shapes.len() - 1
            }
        }
    }

    pub fn extend(&mut self, shapes: impl IntoIterator<Item = ShapeRef>) {
        for shape in shapes {
            self.push(shape);
        }
    }

    /// Add shapes under a group name, appending any that are not yet in the collection
    pub fn add_group(&mut self, name: impl Into<String>, shapes: impl IntoIterator<Item = ShapeRef>) {
        let indices: Vec<usize> = shapes.into_iter().map(|s| self.push(s)).collect();
        let entry = self.groups.entry(name.into()).or_default();
        for index in indices {
            if !entry.contains(&index) {
                entry.push(index);
            }
        }
    }

    pub fn group(&self, name: &str) -> Option<ShapeCollection> {
        self.groups.get(name).map(|indices| {
            ShapeCollection::from_shapes(
                indices
                    .iter()
                    .filter_map(|&i| self.shapes.get(i).cloned())
                    .collect(),
            )
        })
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn bbox(&self) -> BoundingBox {
        self.shapes
            .iter()
            .fold(BoundingBox::empty(), |acc, s| acc.union(&s.read().bbox()))
    }
}

impl IntoIterator for ShapeCollection {
    type Item = ShapeRef;
    type IntoIter = std::vec::IntoIter<ShapeRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.shapes.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use nalgebra::Vector3;

    fn shape(owner: GeomId) -> ShapeRef {
        Shape::new(owner, Primitive::cuboid(Vector3::new(1.0, 1.0, 1.0)).to_mesh()).into_ref()
    }

    #[test]
    fn test_reowned_gets_new_identity() {
        let a = GeomId::next();
        let b = GeomId::next();
        let original = Shape::new(a, Mesh::new());
        let copy = original.reowned(b);
        assert_ne!(copy.id(), original.id());
        assert_eq!(copy.owner(), b);
    }

    #[test]
    fn test_collection_groups() {
        let owner = GeomId::next();
        let (s1, s2, s3) = (shape(owner), shape(owner), shape(owner));

        let mut collection = ShapeCollection::from_shapes(vec![s1.clone(), s2.clone()]);
        collection.add_group("doors", vec![s2.clone(), s3.clone()]);

        assert_eq!(collection.len(), 3);
        let doors = collection.group("doors").map(|g| g.len());
        assert_eq!(doors, Some(2));
        assert!(collection.group("windows").is_none());
        assert!(Arc::ptr_eq(collection.get(2).unwrap_or(&s1), &s3));
        assert_eq!(collection.push(s1), 0);
    }
}
