// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Shared helpers for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use polyframe_script::error::FetchError;
use polyframe_script::io::{AssetLoader, ScriptFetcher};
use polyframe_script::script::{ScriptAddress, ScriptVersion};
use polyframe_script::{Runner, RunnerConfig};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Registry stand-in serving scripts from memory and counting fetches
#[derive(Debug, Default)]
pub struct CountingFetcher {
    scripts: HashMap<String, String>,
    calls: AtomicUsize,
}

impl CountingFetcher {
    pub fn new(scripts: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            scripts: scripts.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScriptFetcher for CountingFetcher {
    async fn fetch_script(&self, address: &ScriptAddress) -> Result<ScriptVersion, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        let key = format!("{}/{}", address.owner, address.name);
        self.scripts
            .get(&key)
            .map(|code| ScriptVersion::new(address.name.as_str(), code.as_str()))
            .ok_or_else(|| FetchError::new(key, "404 Not Found"))
    }
}

/// Assets served from memory, counting loads
#[derive(Debug, Default)]
pub struct MemoryAssets {
    files: HashMap<String, String>,
    calls: AtomicUsize,
}

impl MemoryAssets {
    pub fn new(files: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            files: files.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssetLoader for MemoryAssets {
    async fn load(&self, source: &str) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.files
            .get(source)
            .cloned()
            .ok_or_else(|| FetchError::new(source, "no such asset"))
    }
}

pub fn runner_with_assets(
    fetcher: Arc<CountingFetcher>,
    assets: Arc<MemoryAssets>,
    component_dir: Option<PathBuf>,
) -> Runner {
    let config = RunnerConfig {
        component_dir,
        ..RunnerConfig::new()
    };
    Runner::builder(config).fetcher(fetcher).loader(assets).build()
}

pub fn runner_with(fetcher: Arc<CountingFetcher>, component_dir: Option<PathBuf>) -> Runner {
    runner_with_assets(fetcher, MemoryAssets::new(&[]), component_dir)
}
