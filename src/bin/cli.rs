// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Polyframe script runner CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use polyframe_script::cli::{meta_from_lists, parse_param, write_outputs, Reporter};
use polyframe_script::io::{import_script_file, read_script_file, DefaultAssetLoader};
use polyframe_script::{ExecutionMode, ExecutionRequest, Runner, RunnerConfig, ScriptOutputPath};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "polyframe-script")]
#[command(about = "Polyframe script runner - parametric CAD scripts with imports, components and output paths", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a script and write its outputs
    Run {
        /// Input script file
        input: PathBuf,

        /// Output path to produce (repeatable), e.g. default/model/glb
        #[arg(short, long = "output")]
        outputs: Vec<String>,

        /// Parameter value NAME=value (repeatable)
        #[arg(short, long = "param")]
        params: Vec<String>,

        /// Configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory outputs are written to
        #[arg(long, default_value = "out")]
        out_dir: PathBuf,

        /// Directory holding component modules
        #[arg(long)]
        component_dir: Option<PathBuf>,

        /// Run the whole script at once and stop at the first error
        #[arg(long)]
        whole: bool,
    },

    /// Split a script into statements and print them as JSON
    Parse {
        /// Input script file
        input: PathBuf,

        /// Output JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Resolve output paths against pipeline and entity names
    Resolve {
        /// Output paths to resolve
        #[arg(required = true)]
        paths: Vec<String>,

        /// Pipelines besides default
        #[arg(long, value_delimiter = ',')]
        pipelines: Vec<String>,

        /// Metric names
        #[arg(long, value_delimiter = ',')]
        metrics: Vec<String>,

        /// Table names
        #[arg(long, value_delimiter = ',')]
        tables: Vec<String>,

        /// Doc names
        #[arg(long, value_delimiter = ',')]
        docs: Vec<String>,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            input,
            outputs,
            params,
            config,
            out_dir,
            component_dir,
            whole,
        } => {
            let mode = if whole { ExecutionMode::Script } else { ExecutionMode::Statements };
            let ok = run_command(&input, outputs, &params, config.as_deref(), &out_dir, component_dir, mode).await?;
            if !ok {
                std::process::exit(1);
            }
        }
        Commands::Parse { input, output } => parse_command(&input, output.as_deref())?,
        Commands::Resolve {
            paths,
            pipelines,
            metrics,
            tables,
            docs,
        } => resolve_command(&paths, &pipelines, &metrics, &tables, &docs),
        Commands::Version => {
            println!("Polyframe Script v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

async fn run_command(
    input: &Path,
    outputs: Vec<String>,
    params: &[String],
    config: Option<&Path>,
    out_dir: &Path,
    component_dir: Option<PathBuf>,
    mode: ExecutionMode,
) -> Result<bool> {
    let mut config = match config {
        Some(path) => RunnerConfig::from_file(path)?.with_env_overrides(),
        None => RunnerConfig::load()?,
    };
    if component_dir.is_some() {
        config.component_dir = component_dir;
    }
    let outputs = if outputs.is_empty() { config.default_outputs.clone() } else { outputs };

    let code = read_script_file(input)?;
    let mut request = ExecutionRequest::new(code)
        .named(input.display().to_string())
        .with_outputs(outputs)
        .with_mode(mode);
    for param in params {
        let (name, value) = parse_param(param)?;
        request = request.param(name, value);
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!("Running {}", input.display()));

    let base_dir = input.parent().map(Path::to_path_buf).unwrap_or_default();
    let loader = DefaultAssetLoader::new(&config).with_base_dir(base_dir);
    let runner = Runner::builder(config).loader(Arc::new(loader)).build();
    let result = runner.execute(request).await;
    spinner.finish_and_clear();

    Reporter::report_run(&input.display().to_string(), &result);
    let written = write_outputs(&result, out_dir)
        .with_context(|| format!("Failed to write outputs to {}", out_dir.display()))?;
    if !written.is_empty() {
        Reporter::report_info(&format!("Wrote {} file(s) to {}", written.len(), out_dir.display()));
        Reporter::report_written(&written);
    }
    Ok(result.is_success())
}

fn parse_command(input: &Path, output: Option<&Path>) -> Result<()> {
    let statements = match import_script_file(input) {
        Ok(statements) => statements,
        Err(e) => {
            Reporter::report_error(&format!("{e:#}"));
            std::process::exit(1);
        }
    };
    let json = serde_json::to_string_pretty(&statements)?;

    if let Some(output_path) = output {
        std::fs::write(output_path, json)
            .with_context(|| format!("Failed to write {}", output_path.display()))?;
        Reporter::report_info(&format!("{} statements written to {}", statements.len(), output_path.display()));
    } else {
        println!("{json}");
    }
    Ok(())
}

fn resolve_command(paths: &[String], pipelines: &[String], metrics: &[String], tables: &[String], docs: &[String]) {
    let meta = meta_from_lists(pipelines, metrics, tables, docs);
    for raw in paths {
        let resolution = ScriptOutputPath::parse(raw).resolve_verbose(&meta);
        Reporter::report_resolution(raw, &resolution.resolved, &resolution.warnings);
    }
}
