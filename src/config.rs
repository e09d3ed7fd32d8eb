// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Runner configuration system

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the configuration file
pub const CONFIG_FILE: &str = "polyframe.toml";

/// Runner configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunnerConfig {
    /// Base URL of the script registry
    pub api_url: String,
    /// Path segment for shared script lookup, joined as `{api_url}/{shared_script_path}/{owner}/{name}:{tag}`
    pub shared_script_path: String,
    /// Directory holding file-based component modules
    pub component_dir: Option<PathBuf>,
    /// Timeout applied to every registry or asset request
    pub fetch_timeout_secs: u64,
    /// Maximum nesting of `$component` runs
    pub max_component_depth: usize,
    /// Stop the statement loop at the first runtime error
    pub halt_on_error: bool,
    /// Output paths used by the CLI when none are given
    pub default_outputs: Vec<String>,
}

impl RunnerConfig {
    pub fn new() -> Self {
        Self {
            api_url: "http://localhost:8090/api".to_string(),
            shared_script_path: "scripts/shared".to_string(),
            component_dir: None,
            fetch_timeout_secs: 30,
            max_component_depth: 8,
            halt_on_error: false,
            default_outputs: vec!["default/model/glb".to_string()],
        }
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: RunnerConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn load() -> Result<Self> {
        let config = if PathBuf::from(CONFIG_FILE).exists() {
            Self::from_file(CONFIG_FILE)?
        } else {
            Self::default()
        };
        Ok(config.with_env_overrides())
    }

    /// Apply `POLYFRAME_*` environment variables on top of this configuration
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("POLYFRAME_API_URL") {
            self.api_url = url;
        }

        if let Ok(path) = std::env::var("POLYFRAME_SHARED_SCRIPT_PATH") {
            self.shared_script_path = path;
        }

        if let Ok(dir) = std::env::var("POLYFRAME_COMPONENT_DIR") {
            self.component_dir = Some(PathBuf::from(dir));
        }

        if let Ok(timeout) = std::env::var("POLYFRAME_FETCH_TIMEOUT") {
            self.fetch_timeout_secs = timeout.parse().unwrap_or(self.fetch_timeout_secs);
        }

        if let Ok(halt) = std::env::var("POLYFRAME_HALT_ON_ERROR") {
            self.halt_on_error = halt.parse().unwrap_or(false);
        }

        self
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))?;
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Registry URL for one shared script
    pub fn shared_script_url(&self, owner: &str, name: &str, tag: &str) -> String {
        format!(
            "{}/{}/{}/{}:{}",
            self.api_url.trim_end_matches('/'),
            self.shared_script_path.trim_matches('/'),
            owner,
            name,
            tag
        )
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::new()
    }
}
