// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! I/O module - parsing, fetching, importing, and exporting

mod export_gltf;
mod export_stl;
mod fetcher;
mod importer;
mod parser;

pub use export_gltf::{to_glb, to_gltf, MeshNode};
pub use export_stl::to_stl;
pub use fetcher::{AssetLoader, DefaultAssetLoader, OfflineFetcher, RegistryFetcher, ScriptFetcher};
pub use importer::{import_script_file, read_script_file};
pub use parser::{line_col, parse_program, unescape};
