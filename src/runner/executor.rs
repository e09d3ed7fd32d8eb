// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Script execution orchestration
//!
//! A [`Runner`] owns the import resolver, the converters and the geometry
//! kernel. Each call to [`Runner::execute`] parses the script, preloads every
//! directive, runs the statements and exports the requested outputs.
//! Component runs re-enter through [`Runner::execute_nested`], which is
//! synchronous and served from the caches the top-level preload filled.

use super::builtins;
use super::context::{EntityOutputs, RunContext};
use super::request::{ExecutionMode, ExecutionRequest};
use super::result::{ExecutionResult, PipelineResult, RunError, RunInfo};
use super::bindings::shapes_of;
use super::DEFAULT_PIPELINE;
use crate::ast::Interpreter;
use crate::config::RunnerConfig;
use crate::error::ScriptError;
use crate::geometry::{GeometryKernel, MeshKernel, ObjTree};
use crate::io::{parse_program, AssetLoader, DefaultAssetLoader, RegistryFetcher, ScriptFetcher};
use crate::output::{ConverterRegistry, OutputConverter, PipelineMeta, ScriptMeta, ScriptOutput, ScriptOutputManager, ScriptOutputPath};
use crate::params::ParamManager;
use crate::script::{ComponentLibrary, ImportResolver, PreloadReport, ScriptVersion, Statement, StatementParser};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct Runner {
    config: Arc<RunnerConfig>,
    resolver: Arc<ImportResolver>,
    converters: Arc<ConverterRegistry>,
    kernel: Arc<dyn GeometryKernel>,
    parser: StatementParser,
}

/// Swaps out the collaborators of a [`Runner`]
pub struct RunnerBuilder {
    config: RunnerConfig,
    fetcher: Option<Arc<dyn ScriptFetcher>>,
    loader: Option<Arc<dyn AssetLoader>>,
    kernel: Option<Arc<dyn GeometryKernel>>,
    converters: ConverterRegistry,
}

impl RunnerBuilder {
    pub fn fetcher(mut self, fetcher: Arc<dyn ScriptFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn loader(mut self, loader: Arc<dyn AssetLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn kernel(mut self, kernel: Arc<dyn GeometryKernel>) -> Self {
        self.kernel = Some(kernel);
        self
    }

    pub fn converter(mut self, converter: Arc<dyn OutputConverter>) -> Self {
        self.converters.register(converter);
        self
    }

    pub fn build(self) -> Runner {
        let config = self.config;
        let fetcher = self
            .fetcher
            .unwrap_or_else(|| Arc::new(RegistryFetcher::new(&config)));
        let loader = self
            .loader
            .unwrap_or_else(|| Arc::new(DefaultAssetLoader::new(&config)));
        let library = ComponentLibrary::new(config.component_dir.clone());
        Runner {
            resolver: Arc::new(ImportResolver::new(fetcher, loader, library)),
            converters: Arc::new(self.converters),
            kernel: self.kernel.unwrap_or_else(|| Arc::new(MeshKernel::new())),
            config: Arc::new(config),
            parser: StatementParser::new(),
        }
    }
}

impl Runner {
    pub fn new(config: RunnerConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: RunnerConfig) -> RunnerBuilder {
        RunnerBuilder {
            config,
            fetcher: None,
            loader: None,
            kernel: None,
            converters: ConverterRegistry::new(),
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn resolver(&self) -> &ImportResolver {
        &self.resolver
    }

    pub fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }

    /// Make a component available to `$component(name)` without a fetch
    pub fn register_component(&self, name: &str, script: ScriptVersion) {
        self.resolver.register_component(name, script);
    }

    pub fn reset_caches(&self) {
        self.resolver.reset_caches();
    }

    /// Parse, preload and run a top-level request
    pub async fn execute(&self, request: ExecutionRequest) -> ExecutionResult {
        let started = Instant::now();
        let mut statements = match self.parser.parse(&request.script_name, &request.code) {
            Ok(statements) => statements,
            Err(e) => return parse_failure(&request, &e, started),
        };
        let report = self.resolver.preload(&mut statements).await;
        self.run(request, statements, report, 0, started)
    }

    /// Run a component request from inside another run
    ///
    /// Only cached scripts and assets are used; nothing is fetched.
    pub fn execute_nested(&self, request: ExecutionRequest, depth: usize) -> ExecutionResult {
        let started = Instant::now();
        let mut statements = match self.parser.parse(&request.script_name, &request.code) {
            Ok(statements) => statements,
            Err(e) => return parse_failure(&request, &e, started),
        };
        let report = self.resolver.resolve_cached(&mut statements);
        self.run(request, statements, report, depth, started)
    }

    fn run(
        &self,
        request: ExecutionRequest,
        statements: Vec<Statement>,
        report: PreloadReport,
        depth: usize,
        started: Instant,
    ) -> ExecutionResult {
        let mut result = ExecutionResult {
            component: request.component.clone(),
            warnings: report.warnings,
            imports: report.imports,
            ..ExecutionResult::default()
        };
        info!(
            script = %request.script_name,
            statements = statements.len(),
            depth,
            "running script"
        );

        let mut params = ParamManager::new(request.param_definitions.clone());
        result.warnings.extend(params.apply_request(&request.params));

        let ctx = RunContext::new(self.kernel.clone(), params).with_runner(
            self.clone(),
            depth,
            request.component.clone(),
        );
        let mut interp = Interpreter::new(ctx);
        builtins::install(&interp);

        match request.mode {
            ExecutionMode::Statements => self.run_statements(&mut interp, &statements, &mut result),
            ExecutionMode::Script => run_script(&mut interp, &request, &statements, &mut result),
        }

        interp.ctx.geom.reset_layers();
        let scene = interp.ctx.geom.scene_tree();
        let bbox = scene.bbox();
        result.info = RunInfo {
            shape_count: scene.shape_count(),
            bbox: (!bbox.is_empty()).then_some(bbox),
        };
        let entities = std::mem::take(&mut interp.ctx.entities);
        result
            .pipelines
            .insert(DEFAULT_PIPELINE.to_string(), pipeline_result(scene, entities));

        if result.is_success() {
            run_named_pipelines(&mut interp, &request.outputs, &mut result);
        }

        result.meta = script_meta(&interp, &result);
        result.managed_params = interp.ctx.params.read().managed();

        if result.is_success() {
            self.export(&request.outputs, &mut result);
        } else {
            debug!(errors = result.errors.len(), "skipping output export after errors");
        }

        interp.shutdown();
        result.messages.append(&mut interp.ctx.messages);
        result.warnings.append(&mut interp.ctx.warnings);
        result.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            script = %request.script_name,
            status = ?result.status,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            outputs = result.outputs.len(),
            duration_ms = result.duration_ms,
            "run finished"
        );
        result
    }

    /// Each statement as its own program in the shared global scope
    fn run_statements(&self, interp: &mut Interpreter, statements: &[Statement], result: &mut ExecutionResult) {
        for statement in statements {
            let outcome = parse_program(&statement.code)
                .map_err(|source| ScriptError::ScriptParse {
                    script: format!("statement at line {}", statement.start_line),
                    source,
                })
                .and_then(|program| interp.run_program(&program));
            let Err(e) = outcome else {
                continue;
            };
            warn!(line = statement.start_line, error = %e, "statement failed");
            result.push_error(RunError::new(&e).at(statement.start_line, &statement.code));
            if self.config.halt_on_error || e.is_fatal() {
                break;
            }
        }
    }

    fn export(&self, outputs: &[String], result: &mut ExecutionResult) {
        let mut manager = ScriptOutputManager::new();
        manager.load_request(outputs, Some(&mut *result), true);
        let mut warnings = Vec::new();
        for path in manager.paths() {
            for mut produced in self.converters.export(path, &result.pipelines, &mut warnings) {
                if let Some(data) = produced.take_output() {
                    result.outputs.push(ScriptOutput {
                        path: produced.to_string(),
                        data,
                    });
                }
            }
        }
        result.warnings.extend(warnings);
    }
}

fn parse_failure(request: &ExecutionRequest, e: &ScriptError, started: Instant) -> ExecutionResult {
    error!(script = %request.script_name, error = %e, "script does not parse");
    let mut run_error = RunError::new(e);
    if let ScriptError::ScriptParse { source, .. } = e {
        run_error.line = Some(source.line);
    }
    let mut result = ExecutionResult {
        component: request.component.clone(),
        ..ExecutionResult::default()
    };
    result.push_error(run_error);
    result.duration_ms = started.elapsed().as_millis() as u64;
    result
}

/// The whole script as one program; the first error ends it
fn run_script(
    interp: &mut Interpreter,
    request: &ExecutionRequest,
    statements: &[Statement],
    result: &mut ExecutionResult,
) {
    let code = statements
        .iter()
        .map(|s| s.code.as_str())
        .collect::<Vec<_>>()
        .join(";\n");
    let outcome = parse_program(&code)
        .map_err(|source| ScriptError::ScriptParse {
            script: request.script_name.clone(),
            source,
        })
        .and_then(|program| interp.run_program(&program));
    if let Err(e) = outcome {
        warn!(script = %request.script_name, error = %e, "script failed");
        result.push_error(RunError::new(&e));
    }
}

fn pipeline_result(model: ObjTree, entities: EntityOutputs) -> PipelineResult {
    PipelineResult {
        model,
        metrics: entities.metrics,
        tables: entities.tables,
        docs: entities.docs,
    }
}

/// Names of declared pipelines that the requested outputs refer to
fn requested_pipelines(interp: &Interpreter, outputs: &[String]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for raw in outputs {
        let path = ScriptOutputPath::parse(raw);
        if !path.valid {
            continue;
        }
        let wanted: Vec<&String> = match path.pipeline.exact() {
            Some(name) => interp.ctx.pipelines.keys().filter(|k| *k == name).collect(),
            None => interp.ctx.pipelines.keys().collect(),
        };
        for name in wanted {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
    }
    names
}

/// Run the named pipelines that were asked for, each in its own layer
///
/// A pipeline's model is what its function returns when that is geometric,
/// otherwise every shape it created.
fn run_named_pipelines(interp: &mut Interpreter, outputs: &[String], result: &mut ExecutionResult) {
    for name in requested_pipelines(interp, outputs) {
        let Some(body) = interp.ctx.pipelines.get(&name).cloned() else {
            continue;
        };
        info!(pipeline = %name, "running pipeline");
        let saved = std::mem::take(&mut interp.ctx.entities);
        let group = interp.ctx.geom.isolated_group(&name);
        let outcome = interp.call(&body, Vec::new());
        interp.ctx.geom.reset_layers();
        let entities = std::mem::replace(&mut interp.ctx.entities, saved);

        let returned = match outcome {
            Ok(value) => value,
            Err(e) => {
                warn!(pipeline = %name, error = %e, "pipeline failed");
                let mut run_error = RunError::new(&e);
                run_error.message = format!("pipeline '{name}': {}", run_error.message);
                result.push_error(run_error);
                continue;
            }
        };
        let model = match shapes_of(&returned) {
            Some(shapes) => ObjTree {
                name: name.clone(),
                shapes,
                children: Vec::new(),
            },
            _ => {
                let mut tree = group.read().to_tree();
                tree.name = name.clone();
                tree
            }
        };
        result.pipelines.insert(name, pipeline_result(model, entities));
    }
}

/// Pipelines and entity names known after the run
fn script_meta(interp: &Interpreter, result: &ExecutionResult) -> ScriptMeta {
    let mut meta = ScriptMeta::default();
    for (name, pipeline) in &result.pipelines {
        meta.add_pipeline(name, pipeline.meta());
    }
    for name in interp.ctx.pipelines.keys() {
        if !meta.has_pipeline(name) {
            meta.add_pipeline(name, PipelineMeta::default());
        }
    }
    meta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::OfflineFetcher;
    use crate::output::OutputData;

    fn runner() -> Runner {
        Runner::builder(RunnerConfig::new()).fetcher(Arc::new(OfflineFetcher)).build()
    }

    #[tokio::test]
    async fn test_runtime_error_is_recorded_and_run_continues() {
        let request = ExecutionRequest::new("box(1, 1, 1)\nnope()\nprint('after')")
            .with_outputs(["default/model/glb"]);
        let result = runner().execute(request).await;
        assert!(!result.is_success());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].line, Some(2));
        assert_eq!(result.messages, vec!["after"]);
        assert!(result.outputs.is_empty());
        assert_eq!(result.info.shape_count, 1);
    }

    #[tokio::test]
    async fn test_oversized_writes_are_statement_errors() {
        let code = "let a = []\na[1e300] = 1\nprint('x'.repeat(1e300))\na[2] = 5\nprint('after ' + a.length)";
        let result = runner().execute(ExecutionRequest::new(code)).await;
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.errors[0].line, Some(2));
        assert_eq!(result.errors[1].line, Some(3));
        assert!(result.errors[1].message.contains("Invalid count value"));
        assert_eq!(result.messages, vec!["after 3"]);
    }

    #[tokio::test]
    async fn test_halt_on_error_stops_the_loop() {
        let config = RunnerConfig {
            halt_on_error: true,
            ..RunnerConfig::new()
        };
        let runner = Runner::builder(config).fetcher(Arc::new(OfflineFetcher)).build();
        let result = runner
            .execute(ExecutionRequest::new("nope()\nprint('after')").with_outputs(["default/model/glb"]))
            .await;
        assert!(result.messages.is_empty());
    }

    #[tokio::test]
    async fn test_parse_error_is_fatal() {
        let result = runner().execute(ExecutionRequest::new("let = (")).await;
        assert!(!result.is_success());
        assert_eq!(result.errors[0].kind, "parse");
        assert_eq!(result.errors[0].line, Some(1));
    }

    #[tokio::test]
    async fn test_script_mode_stops_at_first_error() {
        let request = ExecutionRequest::new("print('a')\nnope()\nprint('b')")
            .with_mode(ExecutionMode::Script)
            .with_outputs(["default/model/glb"]);
        let result = runner().execute(request).await;
        assert_eq!(result.messages, vec!["a"]);
        assert_eq!(result.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_exports_model_and_tables() {
        let request = ExecutionRequest::new(
            "let w = box(10, 10, 10)\ncalc.table('parts', [{part: 'wall', qty: 1}])\ncalc.metric('volume', w.volume)",
        )
        .with_outputs(["default/model/glb", "default/tables/*/json", "default/metrics/internal"]);
        let result = runner().execute(request).await;
        assert!(result.is_success(), "{:?}", result.errors);
        let glb = result.output("default/model/glb").and_then(|o| o.data.as_bytes());
        assert!(glb.is_some_and(|b| b.starts_with(b"glTF")));
        assert!(result.output("default/tables/parts/json").is_some());
        let volume = result.output("default/metrics/volume/internal").and_then(|o| o.data.as_json());
        assert_eq!(volume.and_then(|v| v.as_f64()).map(f64::round), Some(1000.0));
        assert_eq!(result.meta.entities("default", crate::output::Category::Tables), ["parts".to_string()]);
    }

    #[tokio::test]
    async fn test_named_pipeline_runs_only_when_requested() {
        let code = "box(1, 1, 1)\npipeline('cnc', () => { calc.table('cuts', [1]); return box(5, 5, 5) })";
        let skipped = runner()
            .execute(ExecutionRequest::new(code).with_outputs(["default/model/glb"]))
            .await;
        assert!(!skipped.pipelines.contains_key("cnc"));
        assert!(skipped.meta.has_pipeline("cnc"));

        let ran = runner()
            .execute(ExecutionRequest::new(code).with_outputs(["cnc/model/stl", "cnc/tables/*/json"]))
            .await;
        assert!(ran.is_success(), "{:?}", ran.errors);
        let cnc = &ran.pipelines["cnc"];
        assert_eq!(cnc.model.shape_count(), 1);
        assert!(cnc.tables.contains_key("cuts"));
        assert!(ran.pipelines["default"].tables.is_empty());
        assert!(matches!(ran.output("cnc/model/stl").map(|o| &o.data), Some(OutputData::Bytes(_))));
        assert_eq!(ran.info.shape_count, 1);
    }

    #[tokio::test]
    async fn test_params_bind_as_dollar_names() {
        let request = ExecutionRequest::new("print($WIDTH * 2)")
            .param("width", 21)
            .with_outputs(["default/model/glb"]);
        let result = runner().execute(request).await;
        assert_eq!(result.messages, vec!["42"]);
    }

    #[tokio::test]
    async fn test_missing_outputs_warn() {
        let result = runner().execute(ExecutionRequest::new("box(1, 1, 1)")).await;
        assert!(result.is_success());
        assert!(result.warnings.iter().any(|w| w == "No output paths requested"));
    }
}
