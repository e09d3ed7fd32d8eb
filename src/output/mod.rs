// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Output paths, script metadata and format conversion

mod converter;
mod data;
mod manager;
mod meta;
mod path;

pub use converter::{
    ConverterRegistry, GlbConverter, GltfConverter, InternalConverter, JsonConverter, OutputConverter,
    StlConverter,
};
pub use data::{OutputData, ScriptOutput};
pub use manager::ScriptOutputManager;
pub use meta::{PipelineMeta, ScriptMeta};
pub use path::{
    parse_format_options, CachePathPart, Category, Resolution, ScriptOutputPath, Selector,
    INTERNAL_FORMAT, WILDCARD,
};
