// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometry engine seam
//!
//! Scripts never touch meshes directly; every solid is produced or combined
//! through a [`GeometryKernel`].

use super::csg::{self, BooleanOp};
use super::primitives::{Primitive, DEFAULT_SEGMENTS};
use super::Mesh;
use crate::error::{Result, ScriptError};
use nalgebra::Vector3;
use std::fmt::Debug;

pub trait GeometryKernel: Send + Sync + Debug {
    fn cuboid(&self, size: Vector3<f64>) -> Result<Mesh>;
    fn sphere(&self, radius: f64) -> Result<Mesh>;
    fn cylinder(&self, radius: f64, height: f64) -> Result<Mesh>;
    fn boolean(&self, a: &Mesh, b: &Mesh, op: BooleanOp) -> Result<Mesh>;
}

/// Triangle mesh kernel backed by BSP CSG
#[derive(Debug, Clone)]
pub struct MeshKernel {
    pub segments: u32,
}

impl MeshKernel {
    pub fn new() -> Self {
        Self {
            segments: DEFAULT_SEGMENTS,
        }
    }
}

impl Default for MeshKernel {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_positive(what: &str, values: &[f64]) -> Result<()> {
    if values.iter().all(|v| v.is_finite() && *v > 0.0) {
        Ok(())
    } else {
        Err(ScriptError::runtime(format!(
            "{what} dimensions must be positive numbers, got {values:?}"
        )))
    }
}

impl GeometryKernel for MeshKernel {
    fn cuboid(&self, size: Vector3<f64>) -> Result<Mesh> {
        ensure_positive("box", size.as_slice())?;
        Ok(Primitive::cuboid(size).to_mesh())
    }

    fn sphere(&self, radius: f64) -> Result<Mesh> {
        ensure_positive("sphere", &[radius])?;
        Ok(Primitive::sphere(radius, self.segments).to_mesh())
    }

    fn cylinder(&self, radius: f64, height: f64) -> Result<Mesh> {
        ensure_positive("cylinder", &[radius, height])?;
        Ok(Primitive::cylinder(radius, height, self.segments).to_mesh())
    }

    fn boolean(&self, a: &Mesh, b: &Mesh, op: BooleanOp) -> Result<Mesh> {
        Ok(csg::boolean(a, b, op))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_positive_sizes() {
        let kernel = MeshKernel::new();
        assert!(kernel.cuboid(Vector3::new(1.0, 0.0, 1.0)).is_err());
        assert!(kernel.sphere(f64::NAN).is_err());
        assert!(kernel.cylinder(2.0, 4.0).is_ok());
    }
}
