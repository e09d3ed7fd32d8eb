// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Script preparation: statement splitting, directives and import resolution

mod cache;
mod dependency_graph;
mod directive;
mod library;
mod resolver;
mod statement;

pub use cache::{FetchCache, FetchResult};
pub use dependency_graph::{DependencyGraph, ScriptId, ROOT};
pub use directive::{
    find_directives, Directive, ScriptAddress, COMPONENT, IMPORT, INERT_IMPORT, LATEST_TAG, LOAD,
};
pub use library::{is_inline_source, load_module, ComponentLibrary, PublishedInfo, ScriptVersion};
pub use resolver::{ImportResolver, ImportStatement, PreloadReport};
pub use statement::{
    strip_declaration, undeclared_assignments, Statement, StatementParser, DEFAULT_EXCLUSIONS,
};
