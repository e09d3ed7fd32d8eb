// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Parameter manager
//!
//! Holds the parameters of one run keyed by upper-cased name. Scripts reach
//! them as `$NAME` values and through `$PARAMS.NAME` operators; every change a
//! script makes is tracked so the caller can update its parameter menu.

use super::{Param, ParamType};
use crate::error::{Result, ScriptError};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::sync::Arc;
use tracing::{debug, warn};

pub type ParamManagerRef = Arc<RwLock<ParamManager>>;

/// Prefix of parameter bindings in script scope
pub const PARAM_SIGNIFIER: char = '$';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamOperation {
    New,
    Updated,
    Deleted,
}

/// Parameters changed by a run, grouped by operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManagedParams {
    pub new: Vec<Param>,
    pub updated: Vec<Param>,
    pub deleted: Vec<Param>,
}

impl ManagedParams {
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

#[derive(Debug, Clone)]
struct ParamEntry {
    original: Param,
    target: Param,
    operation: Option<ParamOperation>,
}

impl ParamEntry {
    fn new(param: Param) -> Self {
        Self {
            original: param.clone(),
            target: param,
            operation: None,
        }
    }

    /// Updates only count when the definition really differs from the start of the run
    fn changed(&self) -> bool {
        match self.operation {
            Some(ParamOperation::Updated) => self.original != self.target,
            Some(_) => true,
            None => false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParamManager {
    entries: IndexMap<String, ParamEntry>,
}

impl ParamManager {
    pub fn new(params: impl IntoIterator<Item = Param>) -> Self {
        let entries = params
            .into_iter()
            .map(|p| {
                let p = p.validated();
                (p.name.clone(), ParamEntry::new(p))
            })
            .collect();
        Self { entries }
    }

    pub fn into_ref(self) -> ParamManagerRef {
        Arc::new(RwLock::new(self))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_uppercase())
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.entries
            .get(&name.to_uppercase())
            .filter(|e| e.operation != Some(ParamOperation::Deleted))
            .map(|e| &e.target)
    }

    pub fn params(&self) -> impl Iterator<Item = &Param> {
        self.entries
            .values()
            .filter(|e| e.operation != Some(ParamOperation::Deleted))
            .map(|e| &e.target)
    }

    /// Current value of a parameter
    pub fn value(&self, name: &str) -> Option<Json> {
        self.get(name).map(|p| p.current().clone())
    }

    /// Value for a `$NAME` binding
    pub fn binding(&self, identifier: &str) -> Option<Json> {
        identifier
            .strip_prefix(PARAM_SIGNIFIER)
            .filter(|name| !name.is_empty())
            .and_then(|name| self.value(name))
    }

    /// Apply request values; mismatches warn and keep the default
    ///
    /// Values for names without a definition get an inferred definition.
    pub fn apply_request(&mut self, values: &IndexMap<String, Json>) -> Vec<String> {
        let mut warnings = Vec::new();
        for (name, value) in values {
            let key = name.to_uppercase();
            match self.entries.get_mut(&key) {
                Some(entry) if entry.target.accepts(value) => {
                    entry.target.value = value.clone();
                    entry.original.value = value.clone();
                }
                Some(entry) => {
                    let message = format!(
                        "Param '{key}' of type {} does not accept {value}; using default {}",
                        entry.target.param_type, entry.target.default
                    );
                    warn!(param = %key, %value, "rejected request value");
                    warnings.push(message);
                    entry.target.value = Json::Null;
                    entry.original.value = Json::Null;
                }
                None => {
                    let mut param = Param::new(&key, infer_type(value)).with_default(value.clone());
                    param.value = value.clone();
                    self.entries.insert(key, ParamEntry::new(param));
                }
            }
        }
        warnings
    }

    /// Define or update a parameter from script
    ///
    /// Returns the operation performed; `None` when an identical definition
    /// already exists. A current value that still fits the new definition is kept.
    pub fn define(&mut self, param: Param) -> Option<ParamOperation> {
        let mut param = param.validated();
        match self.entries.get_mut(&param.name) {
            Some(entry) => {
                if param.value.is_null() && param.accepts(&entry.target.value) {
                    param.value = entry.target.value.clone();
                }
                if entry.target == param && entry.operation != Some(ParamOperation::Deleted) {
                    debug!(param = %param.name, "param unchanged");
                    return None;
                }
                entry.target = param;
                if entry.operation != Some(ParamOperation::New) {
                    entry.operation = Some(ParamOperation::Updated);
                }
                Some(ParamOperation::Updated)
            }
            None => {
                let name = param.name.clone();
                let mut entry = ParamEntry::new(param);
                entry.operation = Some(ParamOperation::New);
                self.entries.insert(name, entry);
                Some(ParamOperation::New)
            }
        }
    }

    pub fn delete(&mut self, name: &str) -> bool {
        let key = name.to_uppercase();
        let created_this_run = match self.entries.get(&key) {
            Some(entry) => entry.operation == Some(ParamOperation::New),
            None => return false,
        };
        if created_this_run {
            self.entries.shift_remove(&key);
        } else if let Some(entry) = self.entries.get_mut(&key) {
            entry.operation = Some(ParamOperation::Deleted);
        }
        true
    }

    /// Change one parameter through `f` and record an update
    pub fn update(&mut self, name: &str, f: impl FnOnce(&mut Param) -> Result<()>) -> Result<()> {
        let key = name.to_uppercase();
        let entry = self
            .entries
            .get_mut(&key)
            .ok_or_else(|| ScriptError::runtime(format!("ParamManager: no param named '{key}'")))?;
        f(&mut entry.target)?;
        if entry.operation.is_none() {
            entry.operation = Some(ParamOperation::Updated);
        }
        Ok(())
    }

    /// Parameters the run created, changed or deleted
    pub fn managed(&self) -> ManagedParams {
        let mut managed = ManagedParams::default();
        for entry in self.entries.values().filter(|e| e.changed()) {
            let bucket = match entry.operation {
                Some(ParamOperation::New) => &mut managed.new,
                Some(ParamOperation::Updated) => &mut managed.updated,
                Some(ParamOperation::Deleted) => &mut managed.deleted,
                None => continue,
            };
            bucket.push(entry.target.clone());
        }
        managed
    }
}

fn infer_type(value: &Json) -> ParamType {
    match value {
        Json::Bool(_) => ParamType::Boolean,
        Json::String(_) => ParamType::Text,
        Json::Array(_) => ParamType::List,
        Json::Object(_) => ParamType::Object,
        Json::Number(_) | Json::Null => ParamType::Number,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manager() -> ParamManager {
        ParamManager::new(vec![Param::number("width", 10.0, 2000.0, 1000.0)])
    }

    #[test]
    fn test_request_values_are_checked() {
        let mut params = manager();
        let mut request = IndexMap::new();
        request.insert("width".to_string(), json!(5000));
        request.insert("label".to_string(), json!("door"));
        let warnings = params.apply_request(&request);

        assert_eq!(warnings.len(), 1);
        assert_eq!(params.value("WIDTH"), Some(json!(1000.0)));
        assert_eq!(params.binding("$LABEL"), Some(json!("door")));
        assert_eq!(params.get("label").map(|p| p.param_type), Some(ParamType::Text));
        assert!(params.managed().is_empty());
    }

    #[test]
    fn test_define_identical_is_noop() {
        let mut params = manager();
        assert_eq!(params.define(Param::number("width", 10.0, 2000.0, 1000.0)), None);
        assert_eq!(params.define(Param::number("Width", 10.0, 3000.0, 1000.0)), Some(ParamOperation::Updated));
        assert_eq!(params.define(Param::new("depth", ParamType::Number)), Some(ParamOperation::New));

        let managed = params.managed();
        assert_eq!(managed.new.len(), 1);
        assert_eq!(managed.updated.len(), 1);
        assert_eq!(managed.updated[0].end, Some(3000.0));
    }

    #[test]
    fn test_update_back_to_original_is_not_reported() -> Result<()> {
        let mut params = manager();
        params.update("width", |p| {
            p.visible = false;
            Ok(())
        })?;
        assert_eq!(params.managed().updated.len(), 1);
        params.update("width", |p| {
            p.visible = true;
            Ok(())
        })?;
        assert!(params.managed().is_empty());
        assert!(params.update("missing", |_| Ok(())).is_err());
        Ok(())
    }

    #[test]
    fn test_delete() {
        let mut params = manager();
        assert!(params.delete("width"));
        assert!(params.get("width").is_none());
        assert_eq!(params.managed().deleted.len(), 1);
        assert!(!params.delete("nothing"));
    }
}
