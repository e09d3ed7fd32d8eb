// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Script-facing geometry objects
//!
//! Shapes, collections, scene nodes and bounding boxes exposed to scripts.
//! Transform and boolean methods mutate the receiver and return it, so calls
//! chain: `box(10, 10, 10).move(0, 0, 5).subtract(hole)`.

use super::component::ImportComponentResult;
use crate::ast::{HostObject, Interpreter, Value};
use crate::error::{Result, ScriptError};
use crate::geometry::{BooleanOp, BoundingBox, ObjRef, ShapeCollection, ShapeRef};
use nalgebra::{Matrix4, Rotation3, Vector3};
use serde_json::{json, Value as Json};
use std::any::Any;
use std::sync::Arc;

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

/// Number argument, `default` when missing
fn num_or(args: &[Value], index: usize, default: f64) -> f64 {
    match args.get(index) {
        None | Some(Value::Undefined) => default,
        Some(value) => value.to_number(),
    }
}

/// Read `(x, y, z)` from three numbers or an `[x, y, z]` array
fn vector_arg(args: &[Value], default: f64) -> Vector3<f64> {
    if let Some(Value::Array(items)) = args.first() {
        let items = items.read();
        let at = |i: usize| items.get(i).map_or(default, Value::to_number);
        return Vector3::new(at(0), at(1), at(2));
    }
    Vector3::new(num_or(args, 0, default), num_or(args, 1, default), num_or(args, 2, default))
}

fn finite(vector: Vector3<f64>, what: &str) -> Result<Vector3<f64>> {
    if vector.iter().all(|c| c.is_finite()) {
        Ok(vector)
    } else {
        Err(ScriptError::runtime(format!("{what}: expected numbers, got {vector:?}")))
    }
}

/// Shapes carried by any geometric script value
pub fn shapes_of(value: &Value) -> Option<Vec<ShapeRef>> {
    if let Some(shape) = value.as_host::<ShapeObject>() {
        return Some(vec![shape.shape.clone()]);
    }
    if let Some(collection) = value.as_host::<CollectionObject>() {
        return Some(collection.shapes.shapes().to_vec());
    }
    if let Some(obj) = value.as_host::<SceneObject>() {
        return Some(obj.node.read().all_shapes());
    }
    if let Some(component) = value.as_host::<ImportComponentResult>() {
        return Some(component.shapes());
    }
    match value {
        Value::Array(items) => {
            let mut shapes = Vec::new();
            for item in items.read().iter() {
                shapes.extend(shapes_of(item)?);
            }
            Some(shapes)
        }
        _ => None,
    }
}

fn expect_shapes(value: &Value, method: &str) -> Result<Vec<ShapeRef>> {
    shapes_of(value).ok_or_else(|| {
        ScriptError::runtime(format!("{method}: expected a shape or shape collection, got {}", value.inspect()))
    })
}

fn bbox_of(shapes: &[ShapeRef]) -> BoundingBox {
    shapes.iter().fold(BoundingBox::empty(), |acc, s| acc.union(&s.read().bbox()))
}

fn transform_all(shapes: &[ShapeRef], matrix: &Matrix4<f64>) {
    for shape in shapes {
        shape.write().mesh.transform(matrix);
    }
}

/// Transform methods shared by every geometric object; `None` for other names
///
/// Rotation angles are degrees about the x, y and z axes; scaling is about the
/// origin.
fn transform_method(shapes: &[ShapeRef], name: &str, args: &[Value]) -> Option<Result<()>> {
    let matrix = match name {
        "move" | "translate" => finite(vector_arg(args, 0.0), name).map(|v| Matrix4::new_translation(&v)),
        "rotate" => finite(vector_arg(args, 0.0), name).map(|v| {
            Rotation3::from_euler_angles(v.x.to_radians(), v.y.to_radians(), v.z.to_radians()).to_homogeneous()
        }),
        "scale" => {
            let factors = match args {
                [single] if !matches!(single, Value::Array(_)) => {
                    let s = single.to_number();
                    Vector3::new(s, s, s)
                }
                _ => vector_arg(args, 1.0),
            };
            finite(factors, name).map(|v| Matrix4::new_nonuniform_scaling(&v))
        }
        _ => return None,
    };
    Some(matrix.map(|m| transform_all(shapes, &m)))
}

fn bbox_value(shapes: &[ShapeRef]) -> Value {
    Value::host(BboxObject { bbox: bbox_of(shapes) })
}

/// Handle to one shape
#[derive(Debug, Clone)]
pub struct ShapeObject {
    pub shape: ShapeRef,
}

impl ShapeObject {
    pub fn value(shape: ShapeRef) -> Value {
        Value::host(Self { shape })
    }

    fn boolean(&self, interp: &mut Interpreter, op: BooleanOp, args: &[Value], method: &str) -> Result<()> {
        for value in args {
            for tool in expect_shapes(value, method)? {
                interp.ctx.geom.boolean(&self.shape, &tool, op)?;
            }
        }
        Ok(())
    }
}

impl HostObject for ShapeObject {
    fn type_name(&self) -> &'static str {
        "Shape"
    }

    fn get(&self, _interp: &mut Interpreter, key: &str) -> Result<Value> {
        let shape = self.shape.read();
        Ok(match key {
            "name" => shape.name.clone().map(Value::from).unwrap_or_default(),
            "color" => shape.color.clone().map(Value::from).unwrap_or_default(),
            "visible" => Value::Bool(shape.visible),
            "volume" => Value::Number(shape.mesh.volume()),
            "type" => Value::from("Solid"),
            _ => Value::Undefined,
        })
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut shape = self.shape.write();
        match key {
            "name" => shape.name = Some(value.to_display()),
            "color" => shape.color = Some(value.to_display()),
            "visible" => shape.visible = value.truthy(),
            _ => return Err(ScriptError::runtime(format!("Cannot set property '{key}' of Shape"))),
        }
        Ok(())
    }

    fn call_method(self: Arc<Self>, interp: &mut Interpreter, name: &str, args: Vec<Value>) -> Result<Value> {
        let shapes = [self.shape.clone()];
        if let Some(outcome) = transform_method(&shapes, name, &args) {
            outcome?;
            return Ok(Value::Host(self));
        }
        match name {
            "subtract" => self.boolean(interp, BooleanOp::Difference, &args, "subtract")?,
            "union" => self.boolean(interp, BooleanOp::Union, &args, "union")?,
            "intersect" | "intersection" => self.boolean(interp, BooleanOp::Intersection, &args, "intersect")?,
            "bbox" => return Ok(bbox_value(&shapes)),
            "copy" | "clone" => {
                let mesh = self.shape.read().mesh.clone();
                return Ok(ShapeObject::value(interp.ctx.geom.add_mesh(mesh)));
            }
            "color" => self.shape.write().color = Some(arg(&args, 0).to_display()),
            "name" => self.shape.write().name = Some(arg(&args, 0).to_display()),
            "hide" => self.shape.write().visible = false,
            "show" => self.shape.write().visible = true,
            "remove" => {
                interp.ctx.geom.remove_shape(&self.shape);
            }
            "volume" => return Ok(Value::Number(self.shape.read().mesh.volume())),
            _ => return Err(ScriptError::runtime(format!("Shape.{name} is not a function"))),
        }
        Ok(Value::Host(self))
    }

    fn to_json(&self) -> Json {
        let shape = self.shape.read();
        json!({
            "type": "Shape",
            "id": shape.id(),
            "name": shape.name,
            "bbox": shape.bbox(),
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Ordered shapes with named groups
#[derive(Debug, Clone)]
pub struct CollectionObject {
    pub shapes: ShapeCollection,
}

impl CollectionObject {
    pub fn value(shapes: ShapeCollection) -> Value {
        Value::host(Self { shapes })
    }
}

impl HostObject for CollectionObject {
    fn type_name(&self) -> &'static str {
        "ShapeCollection"
    }

    fn get(&self, _interp: &mut Interpreter, key: &str) -> Result<Value> {
        Ok(match key {
            "length" => Value::Number(self.shapes.len() as f64),
            _ => Value::Undefined,
        })
    }

    fn index(&self, _interp: &mut Interpreter, index: usize) -> Result<Value> {
        Ok(self
            .shapes
            .get(index)
            .cloned()
            .map(ShapeObject::value)
            .unwrap_or_default())
    }

    fn call_method(self: Arc<Self>, interp: &mut Interpreter, name: &str, args: Vec<Value>) -> Result<Value> {
        let shapes = self.shapes.shapes().to_vec();
        if let Some(outcome) = transform_method(&shapes, name, &args) {
            outcome?;
            return Ok(Value::Host(self));
        }
        match name {
            "bbox" => Ok(bbox_value(&shapes)),
            "count" => Ok(Value::Number(shapes.len() as f64)),
            "first" => self.index(interp, 0),
            "last" => self.index(interp, shapes.len().saturating_sub(1)),
            "toArray" => Ok(Value::array(shapes.into_iter().map(ShapeObject::value).collect())),
            "group" => {
                let group = arg(&args, 0).to_display();
                Ok(self.shapes.group(&group).map(CollectionObject::value).unwrap_or_default())
            }
            "groups" => Ok(Value::array(self.shapes.group_names().map(Value::from).collect())),
            "addGroup" => {
                let group = arg(&args, 0).to_display();
                let members = expect_shapes(&arg(&args, 1), "addGroup")?;
                let mut shapes = self.shapes.clone();
                shapes.add_group(group, members);
                Ok(CollectionObject::value(shapes))
            }
            "union" => {
                let mut members = shapes.into_iter();
                let Some(first) = members.next() else {
                    return Ok(Value::Undefined);
                };
                for tool in members {
                    interp.ctx.geom.boolean(&first, &tool, BooleanOp::Union)?;
                }
                Ok(ShapeObject::value(first))
            }
            "hide" | "show" => {
                for shape in &shapes {
                    shape.write().visible = name == "show";
                }
                Ok(Value::Host(self))
            }
            _ => Err(ScriptError::runtime(format!("ShapeCollection.{name} is not a function"))),
        }
    }

    fn iter_values(&self) -> Option<Vec<Value>> {
        Some(self.shapes.iter().cloned().map(ShapeObject::value).collect())
    }

    fn to_json(&self) -> Json {
        json!({
            "type": "ShapeCollection",
            "length": self.shapes.len(),
            "groups": self.shapes.group_names().collect::<Vec<_>>(),
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Scene graph node, as returned by `geom.layerGroup()`
#[derive(Debug, Clone)]
pub struct SceneObject {
    pub node: ObjRef,
}

impl SceneObject {
    pub fn value(node: ObjRef) -> Value {
        Value::host(Self { node })
    }
}

impl HostObject for SceneObject {
    fn type_name(&self) -> &'static str {
        "Obj"
    }

    fn get(&self, _interp: &mut Interpreter, key: &str) -> Result<Value> {
        let node = self.node.read();
        Ok(match key {
            "name" => Value::from(node.name.as_str()),
            "visible" => Value::Bool(node.visible),
            "children" => Value::array(node.children().iter().cloned().map(SceneObject::value).collect()),
            _ => Value::Undefined,
        })
    }

    fn call_method(self: Arc<Self>, _interp: &mut Interpreter, name: &str, args: Vec<Value>) -> Result<Value> {
        let shapes = self.node.read().all_shapes();
        if let Some(outcome) = transform_method(&shapes, name, &args) {
            outcome?;
            return Ok(Value::Host(self));
        }
        match name {
            "allShapesCollection" | "all" => Ok(CollectionObject::value(ShapeCollection::from_shapes(shapes))),
            "shapes" => Ok(CollectionObject::value(ShapeCollection::from_shapes(
                self.node.read().shapes().to_vec(),
            ))),
            "bbox" => Ok(bbox_value(&shapes)),
            "hide" | "show" => {
                self.node.write().visible = name == "show";
                for shape in &shapes {
                    shape.write().visible = name == "show";
                }
                Ok(Value::Host(self))
            }
            _ => Err(ScriptError::runtime(format!("Obj.{name} is not a function"))),
        }
    }

    fn to_json(&self) -> Json {
        serde_json::to_value(self.node.read().to_tree()).unwrap_or(Json::Null)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy)]
pub struct BboxObject {
    pub bbox: BoundingBox,
}

impl BboxObject {
    fn point(p: nalgebra::Point3<f64>) -> Value {
        Value::array(vec![p.x.into(), p.y.into(), p.z.into()])
    }
}

impl HostObject for BboxObject {
    fn type_name(&self) -> &'static str {
        "Bbox"
    }

    fn get(&self, _interp: &mut Interpreter, key: &str) -> Result<Value> {
        if self.bbox.is_empty() {
            return Ok(match key {
                "width" | "depth" | "height" => Value::Number(0.0),
                _ => Value::Undefined,
            });
        }
        Ok(match key {
            "min" => Self::point(self.bbox.min),
            "max" => Self::point(self.bbox.max),
            "center" => Self::point(self.bbox.center()),
            "width" => Value::Number(self.bbox.width()),
            "depth" => Value::Number(self.bbox.depth()),
            "height" => Value::Number(self.bbox.height()),
            _ => Value::Undefined,
        })
    }

    fn call_method(self: Arc<Self>, interp: &mut Interpreter, name: &str, _args: Vec<Value>) -> Result<Value> {
        match name {
            // solid box filling the bounds, owned by the calling context
            "shape" | "box" => {
                if self.bbox.is_empty() {
                    return Err(ScriptError::runtime("Bbox.shape: bounding box is empty"));
                }
                let size = self.bbox.size();
                let shape = interp.ctx.geom.make_box(size.x, size.y, size.z)?;
                shape.write().mesh.translate(self.bbox.center().coords);
                Ok(ShapeObject::value(shape))
            }
            "size" => Ok(Value::array(vec![
                self.bbox.width().into(),
                self.bbox.depth().into(),
                self.bbox.height().into(),
            ])),
            "center" => Ok(Self::point(self.bbox.center())),
            "isEmpty" => Ok(Value::Bool(self.bbox.is_empty())),
            _ => Err(ScriptError::runtime(format!("Bbox.{name} is not a function"))),
        }
    }

    fn to_json(&self) -> Json {
        if self.bbox.is_empty() {
            return Json::Null;
        }
        json!({
            "min": [self.bbox.min.x, self.bbox.min.y, self.bbox.min.z],
            "max": [self.bbox.max.x, self.bbox.max.y, self.bbox.max.z],
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The `geom` module
#[derive(Debug, Clone, Copy, Default)]
pub struct GeomModule;

impl HostObject for GeomModule {
    fn type_name(&self) -> &'static str {
        "Geom"
    }

    fn call_method(self: Arc<Self>, interp: &mut Interpreter, name: &str, args: Vec<Value>) -> Result<Value> {
        let geom = &mut interp.ctx.geom;
        match name {
            "box" => {
                let size = vector_arg(&args, f64::NAN);
                Ok(ShapeObject::value(geom.make_box(size.x, size.y, size.z)?))
            }
            "sphere" => Ok(ShapeObject::value(geom.make_sphere(num_or(&args, 0, f64::NAN))?)),
            "cylinder" => Ok(ShapeObject::value(
                geom.make_cylinder(num_or(&args, 0, f64::NAN), num_or(&args, 1, f64::NAN))?,
            )),
            "layerGroup" => {
                let group = match arg(&args, 0) {
                    Value::Undefined => "layer".to_string(),
                    other => other.to_display(),
                };
                Ok(SceneObject::value(geom.layer_group(&group)))
            }
            "endLayerGroup" => Ok(Value::Bool(geom.end_layer_group())),
            "all" => Ok(CollectionObject::value(geom.all_shapes())),
            "scene" => Ok(SceneObject::value(geom.scene().clone())),
            "remove" => {
                let mut removed = false;
                for shape in expect_shapes(&arg(&args, 0), "remove")? {
                    removed |= geom.remove_shape(&shape);
                }
                Ok(Value::Bool(removed))
            }
            _ => Err(ScriptError::runtime(format!("geom.{name} is not a function"))),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::parse_program;
    use crate::runner::{builtins, RunContext};
    use approx::assert_relative_eq;

    fn run(source: &str) -> Result<(Value, Interpreter)> {
        let program = parse_program(source).map_err(|e| ScriptError::runtime(e.to_string()))?;
        let mut interp = Interpreter::new(RunContext::detached());
        builtins::install(&interp);
        let value = interp.run_program(&program)?;
        Ok((value, interp))
    }

    #[test]
    fn test_transforms_chain_and_move_bbox() -> Result<()> {
        let (value, _) = run("box(10, 20, 30).move(5, 0, 0).bbox()")?;
        let bbox = value.as_host::<BboxObject>().map(|b| b.bbox);
        let bbox = bbox.ok_or_else(|| ScriptError::runtime("expected a bbox"))?;
        assert_relative_eq!(bbox.center().x, 5.0, epsilon = 1e-9);
        assert_relative_eq!(bbox.height(), 30.0, epsilon = 1e-9);

        let (value, _) = run("box(2, 2, 2).scale(2).bbox().width")?;
        assert_relative_eq!(value.to_number(), 4.0, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn test_subtract_removes_tool_and_cuts_volume() -> Result<()> {
        let (value, interp) = run("let w = box(10, 10, 10); w.subtract(box(20, 2, 2)); w.volume")?;
        assert!(value.to_number() < 1000.0);
        assert_eq!(interp.ctx.geom.all_shapes().len(), 1);
        Ok(())
    }

    #[test]
    fn test_collection_indexing_and_groups() -> Result<()> {
        let source = "
            box(1, 1, 1); sphere(2);
            const everything = all();
            let g = everything.addGroup('round', everything[1]);
            let n = 0;
            for (const s of everything) n++;
            [everything.length, n, g.group('round').length, everything[5] === undefined]
        ";
        let (value, _) = run(source)?;
        assert_eq!(value.inspect(), "[2,2,1,true]");
        Ok(())
    }

    #[test]
    fn test_layer_group_collects_shapes() -> Result<()> {
        let source = "
            let group = geom.layerGroup('part')
            box(1, 1, 1); box(2, 2, 2)
            geom.endLayerGroup()
            box(3, 3, 3)
            group.allShapesCollection().length
        ";
        let (value, interp) = run(source)?;
        assert_eq!(value.to_number(), 2.0);
        assert_eq!(interp.ctx.geom.all_shapes().len(), 3);
        Ok(())
    }

    #[test]
    fn test_bbox_shape_fills_bounds() -> Result<()> {
        let (value, _) = run("box(4, 6, 8).move(10, 10, 10).bbox().shape().bbox().center")?;
        assert_eq!(value.inspect(), "[10,10,10]");
        assert!(run("box(1, 1, 1).subtract(5)").is_err());
        Ok(())
    }
}
