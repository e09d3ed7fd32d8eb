// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Output payloads

use crate::geometry::ObjTree;
use base64::Engine;
use serde::{Serialize, Serializer};
use serde_json::Value as Json;

/// Data attached to a resolved output path
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum OutputData {
    /// Encoded file contents, serialized as base64
    #[serde(serialize_with = "base64_bytes")]
    Bytes(Vec<u8>),
    Json(Json),
    /// Live model tree exchanged with component runs
    Model(ObjTree),
}

fn base64_bytes<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
}

impl OutputData {
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            OutputData::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Json> {
        match self {
            OutputData::Json(json) => Some(json),
            _ => None,
        }
    }

    pub fn as_model(&self) -> Option<&ObjTree> {
        match self {
            OutputData::Model(tree) => Some(tree),
            _ => None,
        }
    }

    /// Contents as written to a file; live models have none
    pub fn file_contents(&self) -> Option<Vec<u8>> {
        match self {
            OutputData::Bytes(bytes) => Some(bytes.clone()),
            OutputData::Json(json) => serde_json::to_vec_pretty(json).ok(),
            OutputData::Model(_) => None,
        }
    }
}

/// One produced output: its resolved path and payload
#[derive(Debug, Clone, Serialize)]
pub struct ScriptOutput {
    pub path: String,
    pub data: OutputData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_serialize_as_base64() -> anyhow::Result<()> {
        let output = ScriptOutput {
            path: "default/model/stl".into(),
            data: OutputData::Bytes(vec![1, 2, 3]),
        };
        let json = serde_json::to_value(&output)?;
        assert_eq!(json["path"], "default/model/stl");
        assert_eq!(json["data"]["kind"], "bytes");
        assert_eq!(json["data"]["data"], "AQID");
        assert_eq!(output.data.file_contents(), Some(vec![1, 2, 3]));
        Ok(())
    }
}
