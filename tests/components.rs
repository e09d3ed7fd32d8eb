// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! `$component` execution against module files and registered scripts

mod common;

use anyhow::Result;
use common::{runner_with, CountingFetcher};
use polyframe_script::script::ScriptVersion;
use polyframe_script::{ExecutionRequest, Runner, RunnerConfig};
use std::sync::Arc;

const FRAME: &str = r#"{
    "name": "Frame",
    "params": {
        "width": {"type": "number", "default": 800},
        "height": {"type": "number", "default": 2000},
        "depth": {"type": "number", "default": 100}
    },
    "code": "print('frame ' + $WIDTH); frame = box($WIDTH, $DEPTH, $HEIGHT)"
}"#;

fn component_dir() -> Result<tempfile::TempDir> {
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("Frame.json"), FRAME)?;
    Ok(dir)
}

#[tokio::test]
async fn test_frame_component_cuts_wall_opening() -> Result<()> {
    let dir = component_dir()?;
    let runner = runner_with(CountingFetcher::new(&[]), Some(dir.path().to_path_buf()));

    let code = "print('start'); wall = box(4000,200,3000); \
                frame = $component('Frame').params({width:1000,height:500,depth:300}).model(); \
                wall.subtract(frame.bbox().shape()); print('done')";
    let result = runner
        .execute(ExecutionRequest::new(code).with_outputs(["default/model/glb"]))
        .await;

    assert!(result.is_success(), "{:?}", result.errors);
    assert_eq!(result.messages, vec!["start", "frame 1000", "done"]);
    let glb = result
        .output("default/model/glb")
        .and_then(|output| output.data.as_bytes())
        .map(<[u8]>::to_vec)
        .unwrap_or_default();
    assert!(glb.starts_with(b"glTF"));
    Ok(())
}

#[tokio::test]
async fn test_component_defaults_apply_without_params() -> Result<()> {
    let dir = component_dir()?;
    let runner = runner_with(CountingFetcher::new(&[]), Some(dir.path().to_path_buf()));

    let code = "f = $component('Frame').model(); b = f.bbox(); print(b.width)";
    let result = runner.execute(ExecutionRequest::new(code)).await;

    assert!(result.is_success(), "{:?}", result.errors);
    assert_eq!(result.messages, vec!["frame 800", "800"]);
    Ok(())
}

#[tokio::test]
async fn test_registered_component_tables_by_output_path() -> Result<()> {
    let runner = runner_with(CountingFetcher::new(&[]), None);
    runner.register_component(
        "Parts",
        ScriptVersion::new(
            "Parts",
            "box(1, 1, 1); calc.table('parts', [{name: 'leg', qty: 4}])",
        ),
    );

    let code = "p = $component('Parts').get(['default/tables']); print(p.tables.parts[0].qty)";
    let result = runner.execute(ExecutionRequest::new(code)).await;

    assert!(result.is_success(), "{:?}", result.errors);
    assert_eq!(result.messages, vec!["4"]);
    Ok(())
}

#[tokio::test]
async fn test_component_get_accepts_category_shorthand() -> Result<()> {
    let runner = runner_with(CountingFetcher::new(&[]), None);
    runner.register_component(
        "Parts",
        ScriptVersion::new(
            "Parts",
            "box(1, 1, 1); calc.table('parts', [{name: 'leg', qty: 4}]); doc.create('datasheet', {title: 'Leg'})",
        ),
    );

    let code = "a = $component('Parts').get('tables'); print(a.tables.parts[0].name)\n\
                b = $component('Parts').get('tables/parts'); print(b.tables.parts[0].qty)\n\
                c = $component('Parts').get(['model', 'docs/datasheet']); print(c.docs.datasheet.title + ' ' + c.shapes().length)";
    let result = runner.execute(ExecutionRequest::new(code)).await;

    assert!(result.is_success(), "{:?}", result.errors);
    assert_eq!(result.messages, vec!["leg", "4", "Leg 1"]);
    assert!(
        !result.warnings.iter().any(|w| w.contains("invalid output path")),
        "{:?}",
        result.warnings
    );
    Ok(())
}

#[tokio::test]
async fn test_inline_component_runs_its_own_code() -> Result<()> {
    let runner = runner_with(CountingFetcher::new(&[]), None);
    let code = "c = $component(\"box(2, 3, 4)\").model(); print(c.shapes().length)";
    let result = runner.execute(ExecutionRequest::new(code)).await;

    assert!(result.is_success(), "{:?}", result.errors);
    assert_eq!(result.messages, vec!["1"]);
    Ok(())
}

#[tokio::test]
async fn test_failing_component_fails_calling_statement() -> Result<()> {
    let runner = runner_with(CountingFetcher::new(&[]), None);
    runner.register_component("Broken", ScriptVersion::new("Broken", "missingFunction()"));

    let code = "print('before')\nb = $component('Broken').model()\nprint('after')";
    let result = runner.execute(ExecutionRequest::new(code)).await;

    assert!(!result.is_success());
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].line, Some(2));
    assert!(result.errors[0].message.contains("Broken"));
    assert!(result.errors[0].message.contains("missingFunction"));
    // statement mode keeps going after a runtime failure
    assert_eq!(result.messages, vec!["before", "after"]);
    Ok(())
}

#[tokio::test]
async fn test_component_depth_is_limited() -> Result<()> {
    let config = RunnerConfig {
        max_component_depth: 1,
        ..RunnerConfig::new()
    };
    let runner = Runner::builder(config).fetcher(CountingFetcher::new(&[])).build();
    runner.register_component("Leaf", ScriptVersion::new("Leaf", "box(1, 1, 1)"));
    runner.register_component("Outer", ScriptVersion::new("Outer", "$component('Leaf').model()"));

    let ok = runner
        .execute(ExecutionRequest::new("$component('Leaf').model()"))
        .await;
    assert!(ok.is_success(), "{:?}", ok.errors);

    let nested = runner
        .execute(ExecutionRequest::new("$component('Outer').model()"))
        .await;
    assert!(!nested.is_success());
    assert!(nested.errors[0].message.contains("maximum component depth"));
    Ok(())
}

#[tokio::test]
async fn test_component_module_is_loaded_once() -> Result<()> {
    let dir = component_dir()?;
    let fetcher: Arc<CountingFetcher> = CountingFetcher::new(&[]);
    let runner = runner_with(fetcher.clone(), Some(dir.path().to_path_buf()));

    let code = "a = $component('Frame').model(); b = $component('Frame').params({width: 500}).model()";
    let result = runner.execute(ExecutionRequest::new(code)).await;

    assert!(result.is_success(), "{:?}", result.errors);
    assert_eq!(result.messages, vec!["frame 800", "frame 500"]);
    // module files never reach the registry
    assert_eq!(fetcher.calls(), 0);
    Ok(())
}
