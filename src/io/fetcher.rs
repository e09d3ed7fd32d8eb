// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Network and disk collaborators used during preload
//!
//! Registry scripts are fetched from
//! `{api_url}/{shared_script_path}/{owner}/{name}:{tag}`; the response is a JSON
//! envelope whose `data` field holds the script.

use crate::config::RunnerConfig;
use crate::error::FetchError;
use crate::script::{ScriptAddress, ScriptVersion};
use async_trait::async_trait;
use std::fmt::Debug;
use std::path::PathBuf;
use tracing::{debug, warn};

#[async_trait]
pub trait ScriptFetcher: Send + Sync + Debug {
    async fn fetch_script(&self, address: &ScriptAddress) -> Result<ScriptVersion, FetchError>;
}

#[async_trait]
pub trait AssetLoader: Send + Sync + Debug {
    /// Load an asset referenced by `$load` as text
    async fn load(&self, source: &str) -> Result<String, FetchError>;
}

fn http_client(config: &RunnerConfig) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(config.fetch_timeout())
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "falling back to default HTTP client");
            reqwest::Client::new()
        })
}

fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Fetches shared scripts from the script registry
#[derive(Debug, Clone)]
pub struct RegistryFetcher {
    client: reqwest::Client,
    config: RunnerConfig,
}

impl RegistryFetcher {
    pub fn new(config: &RunnerConfig) -> Self {
        Self {
            client: http_client(config),
            config: config.clone(),
        }
    }

    pub fn url(&self, address: &ScriptAddress) -> String {
        self.config
            .shared_script_url(&address.owner, &address.name, address.tag_or_latest())
    }
}

#[async_trait]
impl ScriptFetcher for RegistryFetcher {
    async fn fetch_script(&self, address: &ScriptAddress) -> Result<ScriptVersion, FetchError> {
        let target = address.to_string();
        let url = self.url(address);
        debug!(%url, "fetching shared script");

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| FetchError::new(&target, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(&target, format!("registry returned {status} for {url}")));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| FetchError::new(&target, format!("invalid JSON: {e}")))?;
        ScriptVersion::from_registry_envelope(&target, body)
    }
}

/// Loads `$load` assets over http(s) or from disk
#[derive(Debug, Clone)]
pub struct DefaultAssetLoader {
    client: reqwest::Client,
    base_dir: Option<PathBuf>,
}

impl DefaultAssetLoader {
    pub fn new(config: &RunnerConfig) -> Self {
        Self {
            client: http_client(config),
            base_dir: None,
        }
    }

    /// Resolve relative paths against `dir`
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }
}

#[async_trait]
impl AssetLoader for DefaultAssetLoader {
    async fn load(&self, source: &str) -> Result<String, FetchError> {
        if is_url(source) {
            let response = self
                .client
                .get(source)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| FetchError::new(source, e.to_string()))?;
            return response
                .text()
                .await
                .map_err(|e| FetchError::new(source, e.to_string()));
        }

        let path = match &self.base_dir {
            Some(dir) => dir.join(source),
            None => PathBuf::from(source),
        };
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| FetchError::new(source, format!("{}: {e}", path.display())))
    }
}

/// Fetcher for runners without a registry; every lookup fails
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineFetcher;

#[async_trait]
impl ScriptFetcher for OfflineFetcher {
    async fn fetch_script(&self, address: &ScriptAddress) -> Result<ScriptVersion, FetchError> {
        Err(FetchError::new(address.to_string(), "no script registry configured"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_url() -> crate::error::Result<()> {
        let config = RunnerConfig {
            api_url: "https://registry.example.com/api".into(),
            ..RunnerConfig::default()
        };
        let fetcher = RegistryFetcher::new(&config);
        let address = ScriptAddress::parse("acme/Frame")?;
        assert_eq!(
            fetcher.url(&address),
            "https://registry.example.com/api/scripts/shared/acme/Frame:latest"
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_disk_asset_relative_to_base_dir() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("parts.csv"), "a,b\n1,2\n")?;
        let loader = DefaultAssetLoader::new(&RunnerConfig::default()).with_base_dir(dir.path());

        assert_eq!(loader.load("parts.csv").await?, "a,b\n1,2\n");
        assert!(loader.load("missing.csv").await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_offline_fetcher_fails() -> crate::error::Result<()> {
        let address = ScriptAddress::parse("acme/Frame:1")?;
        assert!(OfflineFetcher.fetch_script(&address).await.is_err());
        Ok(())
    }
}
