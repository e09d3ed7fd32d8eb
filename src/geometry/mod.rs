// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometry module - mesh kernel, shapes and scene graph

mod bbox;
mod csg;
mod geom;
mod kernel;
mod mesh;
mod obj;
mod primitives;
mod shape;

pub use bbox::BoundingBox;
pub use csg::{boolean, BooleanOp};
pub use geom::{Geom, SCENE_NAME};
pub use kernel::{GeometryKernel, MeshKernel};
pub use mesh::{Mesh, Triangle, Vertex};
pub use obj::{Obj, ObjRef, ObjTree};
pub use primitives::{Primitive, DEFAULT_SEGMENTS};
pub use shape::{GeomId, Shape, ShapeCollection, ShapeId, ShapeRef};
