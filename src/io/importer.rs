// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Script file importer

use crate::script::{Statement, StatementParser};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Read a script file from disk
pub fn read_script_file(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    fs::read_to_string(path).with_context(|| format!("Failed to read script file: {}", path.display()))
}

/// Read a script file and split it into statements
pub fn import_script_file(path: impl AsRef<Path>) -> Result<Vec<Statement>> {
    let path = path.as_ref();
    let source = read_script_file(path)?;
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("script");
    StatementParser::new()
        .parse(name, &source)
        .with_context(|| format!("Failed to parse script file: {}", path.display()))
}
