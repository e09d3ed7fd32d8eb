// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Import preload through a full runner

mod common;

use anyhow::Result;
use common::{runner_with, runner_with_assets, CountingFetcher, MemoryAssets};
use polyframe_script::script::StatementParser;
use polyframe_script::ExecutionRequest;

const POST: &str = "post = box(50, 50, $HEIGHT)";

#[tokio::test]
async fn test_same_import_is_fetched_once() -> Result<()> {
    let fetcher = CountingFetcher::new(&[("acme/Post", POST)]);
    let runner = runner_with(fetcher.clone(), None);

    let mut statements = StatementParser::new().parse(
        "main",
        "a = $import('acme/Post', { height: 100 })\nb = $import('acme/Post:latest', { height: 200 })",
    )?;
    let report = runner.resolver().preload(&mut statements).await;

    assert_eq!(fetcher.calls(), 1);
    assert_eq!(report.imports.len(), 2);
    assert!(report.imports.iter().all(|i| i.resolved));
    Ok(())
}

#[tokio::test]
async fn test_cache_survives_runs_until_reset() -> Result<()> {
    let fetcher = CountingFetcher::new(&[("acme/Post", POST)]);
    let runner = runner_with(fetcher.clone(), None);
    let request = || {
        ExecutionRequest::new("p = $import('acme/Post', { height: 10 })").with_outputs(["default/model/glb"])
    };

    assert!(runner.execute(request()).await.is_success());
    assert!(runner.execute(request()).await.is_success());
    assert_eq!(fetcher.calls(), 1);

    runner.reset_caches();
    assert!(runner.execute(request()).await.is_success());
    assert_eq!(fetcher.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn test_failed_import_does_not_block_sibling() -> Result<()> {
    let fetcher = CountingFetcher::new(&[("acme/Post", POST)]);
    let runner = runner_with(fetcher.clone(), None);
    let request = ExecutionRequest::new(
        "good = $import('acme/Post', { height: 300 })\nbad = $import('acme/Missing')\nprint(good.length, bad.length)",
    )
    .with_outputs(["default/model/stl"]);
    let result = runner.execute(request).await;

    assert!(result.is_success(), "{:?}", result.errors);
    assert_eq!(result.imports.len(), 2);
    assert!(result.imports[0].resolved);
    assert!(!result.imports[1].resolved);
    assert!(result.warnings.iter().any(|w| w.contains("acme/Missing")));
    assert_eq!(result.messages, vec!["1 0"]);
    assert_eq!(result.info.shape_count, 1);
    assert!(result.output("default/model/stl").is_some());
    Ok(())
}

#[tokio::test]
async fn test_import_params_reach_the_imported_code() -> Result<()> {
    let fetcher = CountingFetcher::new(&[("acme/Post", POST)]);
    let runner = runner_with(fetcher, None);
    let request = ExecutionRequest::new("p = $import('acme/Post', { height: 300 })\nprint(p.bbox().height)")
        .with_outputs(["default/model/glb"]);
    let result = runner.execute(request).await;
    assert_eq!(result.messages, vec!["300"]);
    Ok(())
}

#[tokio::test]
async fn test_nested_imports_are_preloaded_transitively() -> Result<()> {
    let fetcher = CountingFetcher::new(&[
        ("acme/Frame", "const left = $import('acme/Post', { height: 500 })\nleft.move(-500, 0, 0)"),
        ("acme/Post", POST),
    ]);
    let runner = runner_with(fetcher.clone(), None);
    let result = runner
        .execute(ExecutionRequest::new("frame = $import('acme/Frame')\nprint(frame.length)").with_outputs(["default/model/glb"]))
        .await;

    assert!(result.is_success(), "{:?}", result.errors);
    assert_eq!(fetcher.calls(), 2);
    assert_eq!(result.messages, vec!["1"]);
    Ok(())
}

#[tokio::test]
async fn test_load_serves_preloaded_asset_text() -> Result<()> {
    let assets = MemoryAssets::new(&[("a.csv", "content of a.csv")]);
    let runner = runner_with_assets(CountingFetcher::new(&[]), assets.clone(), None);

    let code = "print($load('a.csv'))\nrows = io.load('a.csv')\nprint(rows.length)\nprint(typeof $load('missing.csv'))";
    let result = runner.execute(ExecutionRequest::new(code)).await;

    assert!(result.is_success(), "{:?}", result.errors);
    assert_eq!(result.messages, vec!["content of a.csv", "16", "undefined"]);
    // one load for a.csv, one failed load for missing.csv
    assert_eq!(assets.calls(), 2);
    assert!(result.warnings.iter().any(|w| w.contains("missing.csv")));
    Ok(())
}
