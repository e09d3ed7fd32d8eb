// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Error taxonomy for script execution
//!
//! | Variant | Policy |
//! |---------|--------|
//! | `DirectiveParse` | contained: the directive's statement becomes inert |
//! | `Fetch` | contained: recorded against the import or component reference |
//! | `ComponentExecution` | fatal to the calling statement |
//! | `InvalidOutputPath` | contained: dropped with a warning |
//! | `ScriptParse` | fatal to the whole run |
//! | `Runtime` | recorded per statement by the runner |

use serde::Serialize;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ScriptError>;

/// Location of a syntax error inside a parsed source buffer
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("line {line}, column {column}: {message}")]
pub struct SyntaxError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

/// Failure to resolve a script, component or asset reference
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("failed to fetch '{target}': {message}")]
pub struct FetchError {
    pub target: String,
    pub message: String,
}

impl FetchError {
    pub fn new(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ScriptError {
    #[error("invalid directive `{directive}`: {message}")]
    DirectiveParse { directive: String, message: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("component '{component}' failed: {}", .errors.join("; "))]
    ComponentExecution {
        component: String,
        errors: Vec<String>,
    },

    #[error("invalid output path '{path}': {message}")]
    InvalidOutputPath { path: String, message: String },

    #[error("failed to parse script '{script}' at {source}")]
    ScriptParse {
        script: String,
        #[source]
        source: SyntaxError,
    },

    #[error("{0}")]
    Runtime(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ScriptError {
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }

    pub fn directive(directive: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DirectiveParse {
            directive: directive.into(),
            message: message.into(),
        }
    }

    /// Errors the runner must stop on rather than record and continue
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ScriptParse { .. } | Self::Config(_))
    }

    /// Short machine-readable kind, used in serialized results
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DirectiveParse { .. } => "directive",
            Self::Fetch(_) => "fetch",
            Self::ComponentExecution { .. } => "component",
            Self::InvalidOutputPath { .. } => "output_path",
            Self::ScriptParse { .. } => "parse",
            Self::Runtime(_) => "runtime",
            Self::Config(_) => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_error_lists_sub_errors() {
        let err = ScriptError::ComponentExecution {
            component: "Frame".into(),
            errors: vec!["shape is not a function".into(), "second".into()],
        };
        let message = err.to_string();
        assert!(message.contains("Frame"));
        assert!(message.contains("shape is not a function; second"));
        assert_eq!(err.kind(), "component");
    }

    #[test]
    fn test_parse_error_is_fatal() {
        let err = ScriptError::ScriptParse {
            script: "main".into(),
            source: SyntaxError {
                line: 2,
                column: 4,
                message: "expected expression".into(),
            },
        };
        assert!(err.is_fatal());
        assert!(err.to_string().contains("line 2, column 4"));
        assert!(!ScriptError::runtime("boom").is_fatal());
    }
}
