// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Import, load and component resolution
//!
//! Preload runs in two phases. Discovery walks the statements and every
//! script they reference, fetching each wave of new targets concurrently.
//! Application then rewrites `$import` statements in source order using only
//! cached scripts, so nested component runs can reuse it synchronously.

use super::cache::{FetchCache, FetchResult};
use super::dependency_graph::{DependencyGraph, ROOT};
use super::directive::{find_directives, Directive, ScriptAddress, IMPORT, INERT_IMPORT};
use super::library::{is_inline_source, load_module, ComponentLibrary, ScriptVersion};
use super::statement::{strip_declaration, undeclared_assignments, Statement, StatementParser};
use crate::ast::{Program, Stmt, StmtKind};
use crate::error::{FetchError, Result, ScriptError};
use crate::io::{parse_program, AssetLoader, ScriptFetcher};
use futures_util::future::join_all;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value as Json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Metadata of one `$import` statement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportStatement {
    pub owner: String,
    pub name: String,
    pub version_tag: String,
    pub param_values: IndexMap<String, Json>,
    /// Position of the owning statement
    pub statement: usize,
    pub resolved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PreloadReport {
    pub imports: Vec<ImportStatement>,
    pub warnings: Vec<String>,
    /// Distinct targets requested during discovery
    pub fetched: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Target {
    Import(ScriptAddress),
    Component(String),
    Asset(String),
}

impl Target {
    fn key(&self) -> String {
        match self {
            Target::Import(address) => address.cache_key(),
            Target::Component(name) => format!("component:{name}"),
            Target::Asset(source) => format!("asset:{source}"),
        }
    }

    /// Graph node of targets that carry code of their own
    fn node_id(&self) -> Option<String> {
        match self {
            Target::Asset(_) => None,
            other => Some(other.key()),
        }
    }
}

fn targets_in(code: &str) -> Vec<Target> {
    let Ok(program) = parse_program(code) else {
        return Vec::new();
    };
    find_directives(&program)
        .into_iter()
        .filter_map(|d| match d {
            Ok(Directive::Import { address, .. }) => Some(Target::Import(address)),
            Ok(Directive::Component { target }) => Some(Target::Component(target)),
            Ok(Directive::Load { source }) => Some(Target::Asset(source)),
            Err(_) => None,
        })
        .collect()
}

fn first_import(stmt: &Stmt) -> Option<Result<Directive>> {
    let program = Program {
        body: vec![stmt.clone()],
    };
    find_directives(&program).into_iter().find(|d| match d {
        Ok(directive) => directive.is_import(),
        Err(ScriptError::DirectiveParse { directive, .. }) => directive == IMPORT,
        Err(_) => false,
    })
}

/// Name declared by a single-declarator `let`/`var`/`const` statement
fn declared_name(stmt: &Stmt) -> Option<String> {
    match &stmt.kind {
        StmtKind::Declaration { declarators, .. } if declarators.len() == 1 => {
            Some(declarators[0].name.clone())
        }
        _ => None,
    }
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Resolves directives for one runner; caches live as long as the resolver
#[derive(Debug)]
pub struct ImportResolver {
    fetcher: Arc<dyn ScriptFetcher>,
    loader: Arc<dyn AssetLoader>,
    library: ComponentLibrary,
    imports: FetchCache<ScriptVersion>,
    components: FetchCache<ScriptVersion>,
    assets: FetchCache<String>,
    parser: StatementParser,
}

impl ImportResolver {
    pub fn new(fetcher: Arc<dyn ScriptFetcher>, loader: Arc<dyn AssetLoader>, library: ComponentLibrary) -> Self {
        Self {
            fetcher,
            loader,
            library,
            imports: FetchCache::new(),
            components: FetchCache::new(),
            assets: FetchCache::new(),
            parser: StatementParser::new(),
        }
    }

    pub fn library(&self) -> &ComponentLibrary {
        &self.library
    }

    pub fn register_component(&self, name: &str, script: ScriptVersion) {
        self.components.insert(name, script.clone());
        self.library.register(name, script);
    }

    pub fn reset_caches(&self) {
        self.imports.clear();
        self.components.clear();
        self.assets.clear();
        info!("cleared import, component and asset caches");
    }

    /// Cached import script
    pub fn import_script(&self, address: &ScriptAddress) -> Option<FetchResult<ScriptVersion>> {
        self.imports.get(&address.cache_key())
    }

    /// Cached asset text
    pub fn asset(&self, source: &str) -> Option<FetchResult<String>> {
        self.assets.get(source)
    }

    /// Component script without fetching
    ///
    /// Falls back to registered and inline scripts for targets that were not
    /// visible during preload, such as computed names.
    pub fn component_script(&self, target: &str) -> FetchResult<ScriptVersion> {
        if let Some(result) = self.components.get(target) {
            return result;
        }
        if let Some(script) = self.library.registered(target) {
            return Ok(script);
        }
        if is_inline_source(target) {
            return Ok(Arc::new(ScriptVersion::inline(target)));
        }
        Err(FetchError::new(
            target,
            "component script is not loaded; reference it with a literal name so it is preloaded",
        ))
    }

    async fn fetch_import(&self, address: &ScriptAddress) -> FetchResult<ScriptVersion> {
        self.imports
            .get_or_fetch(&address.cache_key(), || self.fetcher.fetch_script(address))
            .await
    }

    async fn fetch_component(&self, target: &str) -> FetchResult<ScriptVersion> {
        self.components
            .get_or_fetch(target, || async move {
                if let Some(script) = self.library.registered(target) {
                    return Ok(script.as_ref().clone());
                }
                if let Some(path) = self.library.find_module(target) {
                    return load_module(&path).await;
                }
                if is_inline_source(target) {
                    return Ok(ScriptVersion::inline(target));
                }
                match ScriptAddress::parse(target) {
                    Ok(address) => self.fetch_import(&address).await.map(|s| s.as_ref().clone()),
                    Err(_) => Err(FetchError::new(
                        target,
                        "component is not registered, not in the component directory and not a registry address",
                    )),
                }
            })
            .await
    }

    /// Fetch one target; yields the code of script targets
    async fn fetch_target(&self, target: &Target) -> Option<String> {
        let result = match target {
            Target::Import(address) => self.fetch_import(address).await,
            Target::Component(name) => self.fetch_component(name).await,
            Target::Asset(source) => {
                if let Err(e) = self
                    .assets
                    .get_or_fetch(source, || self.loader.load(source))
                    .await
                {
                    warn!(error = %e, "asset fetch failed");
                }
                return None;
            }
        };
        match result {
            Ok(script) => Some(script.code.clone()),
            Err(e) => {
                warn!(error = %e, "script fetch failed");
                None
            }
        }
    }

    /// Fetch everything the statements reference, then rewrite imports
    ///
    /// Never fails: fetch and directive problems end up as warnings.
    pub async fn preload(&self, statements: &mut [Statement]) -> PreloadReport {
        let mut report = PreloadReport::default();
        let mut graph = DependencyGraph::new();
        let mut seen: HashSet<String> = HashSet::new();

        let mut wave: Vec<(String, Target)> = statements
            .iter()
            .flat_map(|s| targets_in(&s.code))
            .map(|t| (ROOT.to_string(), t))
            .collect();

        while !wave.is_empty() {
            let mut batch = Vec::new();
            for (parent, target) in std::mem::take(&mut wave) {
                if let Some(id) = target.node_id() {
                    if let Err(cycle) = graph.add_edge(&parent, &id) {
                        debug!(cycle = %cycle.join(" -> "), "skipping cyclic reference");
                        continue;
                    }
                }
                if seen.insert(target.key()) {
                    batch.push(target);
                }
            }
            report.fetched += batch.len();

            let codes = join_all(batch.iter().map(|t| self.fetch_target(t))).await;
            for (target, code) in batch.iter().zip(codes) {
                if let (Some(code), Some(id)) = (code, target.node_id()) {
                    wave.extend(targets_in(&code).into_iter().map(|t| (id.clone(), t)));
                }
            }
        }

        info!(
            targets = report.fetched,
            scripts = graph.len().saturating_sub(1),
            "preload fetched all references"
        );
        self.apply(statements, &mut report);
        report
    }

    /// Rewrite import statements from cache only
    pub fn resolve_cached(&self, statements: &mut [Statement]) -> PreloadReport {
        let mut report = PreloadReport::default();
        self.apply(statements, &mut report);
        report
    }

    fn apply(&self, statements: &mut [Statement], report: &mut PreloadReport) {
        for (index, statement) in statements.iter_mut().enumerate() {
            let Ok(program) = parse_program(&statement.code) else {
                continue;
            };

            let mut import = None;
            for directive in find_directives(&program) {
                match directive {
                    Ok(Directive::Import {
                        address,
                        params,
                        params_warning,
                    }) => {
                        if import.is_some() {
                            report.warnings.push(format!(
                                "line {}: only the first $import of a statement is resolved; '{address}' is ignored",
                                statement.start_line
                            ));
                            continue;
                        }
                        report.warnings.extend(params_warning);
                        import = Some((address, params));
                    }
                    Ok(Directive::Load { source }) => {
                        if let Some(Err(e)) = self.assets.get(&source) {
                            report.warnings.push(e.to_string());
                        }
                    }
                    Ok(Directive::Component { .. }) => {}
                    Err(e) => report
                        .warnings
                        .push(format!("line {}: {e}", statement.start_line)),
                }
            }

            let Some((address, params)) = import else {
                continue;
            };
            let mut stack = vec![ROOT.to_string()];
            let outcome = self.rewrite(&statement.code, &address, &params, &mut stack, &mut report.warnings);
            let error = match outcome {
                Ok(code) => {
                    statement.code = code;
                    None
                }
                Err(e) => {
                    warn!(import = %address, error = %e, "import left unresolved");
                    report.warnings.push(format!("line {}: {e}", statement.start_line));
                    Some(e.to_string())
                }
            };
            report.imports.push(ImportStatement {
                owner: address.owner.clone(),
                name: address.name.clone(),
                version_tag: address.tag_or_latest().to_string(),
                param_values: params,
                statement: index,
                resolved: error.is_none(),
                error,
            });
        }
    }

    /// Wrap `code` with a generated `$import` function holding the imported script
    fn rewrite(
        &self,
        code: &str,
        address: &ScriptAddress,
        params: &IndexMap<String, Json>,
        stack: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) -> Result<String> {
        let key = address.cache_key();
        if stack.contains(&key) {
            return Err(ScriptError::directive(
                IMPORT,
                format!("import cycle {} -> {key}", stack.join(" -> ")),
            ));
        }
        let script = match self.imports.get(&key) {
            Some(Ok(script)) => script,
            Some(Err(e)) => return Err(e.into()),
            None => return Err(FetchError::new(address.to_string(), "script was not preloaded").into()),
        };

        stack.push(key);
        let body = self.hygienic_body(&script, stack, warnings);
        stack.pop();
        let (body, has_unresolved) = body?;

        let mut out = String::with_capacity(code.len() + body.len() + 256);
        out.push_str("{\nfunction $import() {\n");
        if has_unresolved {
            out.push_str(&format!("let $import = {INERT_IMPORT};\n"));
        }
        let group = serde_json::to_string(&format!("{}/{}", address.owner, address.name))
            .unwrap_or_else(|_| "\"import\"".into());
        out.push_str(&format!("let layerGroup = geom.layerGroup({group});\n"));
        for (key, value) in params {
            if !is_identifier(key) {
                warnings.push(format!("import '{address}': parameter '{key}' is not a valid name and was skipped"));
                continue;
            }
            out.push_str(&format!("let ${key} = {value};\n"));
            let upper = key.to_uppercase();
            if upper != *key {
                out.push_str(&format!("let ${upper} = {value};\n"));
            }
        }
        out.push_str(&body);
        out.push_str("\ngeom.endLayerGroup();\n");
        out.push_str("let importedShapes = layerGroup.allShapesCollection();\n");
        out.push_str("return importedShapes;\n}\n");
        out.push_str(code);
        out.push_str("\n}");
        debug!(import = %address, bytes = out.len(), "rewrote import statement");
        Ok(out)
    }

    /// Imported code with every accidental outer-scope assignment made local
    ///
    /// Returns the code and whether a nested import was left unresolved.
    fn hygienic_body(
        &self,
        script: &ScriptVersion,
        stack: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) -> Result<(String, bool)> {
        let source = &script.code;
        let program = parse_program(source).map_err(|e| ScriptError::ScriptParse {
            script: script.display_name().to_string(),
            source: e,
        })?;
        let undeclared = undeclared_assignments(&program);

        let mut pieces = Vec::with_capacity(program.body.len());
        let mut has_unresolved = false;
        for (stmt, target) in program.body.iter().zip(undeclared) {
            if stmt.is_empty() {
                continue;
            }
            let Some(code) = source.get(stmt.span.start..stmt.span.end) else {
                continue;
            };
            if self.parser.is_excluded(code) {
                continue;
            }

            let nested = match first_import(stmt) {
                Some(Ok(Directive::Import { address, params, params_warning })) => {
                    warnings.extend(params_warning);
                    Some(self.rewrite(&strip_declaration(code), &address, &params, stack, warnings))
                }
                Some(Err(e)) => Some(Err(e)),
                _ => None,
            };

            let local = declared_name(stmt).or(target.clone());
            let piece = match nested {
                Some(Ok(block)) => match local {
                    Some(name) => format!("let {name};\n{block}"),
                    None => block,
                },
                Some(Err(e)) => {
                    warnings.push(format!("import '{}': {e}", script.display_name()));
                    has_unresolved = true;
                    local_code(code, target.as_deref())
                }
                None => local_code(code, target.as_deref()),
            };
            pieces.push(piece);
        }
        Ok((pieces.join("\n"), has_unresolved))
    }
}

fn local_code(code: &str, undeclared: Option<&str>) -> String {
    match undeclared {
        Some(_) => format!("let {code}"),
        None => code.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{AssetLoader, ScriptFetcher};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct MapFetcher {
        scripts: IndexMap<String, String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ScriptFetcher for MapFetcher {
        async fn fetch_script(&self, address: &ScriptAddress) -> std::result::Result<ScriptVersion, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let path = format!("{}/{}", address.owner, address.name);
            self.scripts
                .get(&path)
                .map(|code| ScriptVersion::new(&address.name, code.as_str()))
                .ok_or_else(|| FetchError::new(path, "404"))
        }
    }

    #[derive(Debug)]
    struct NoAssets;

    #[async_trait]
    impl AssetLoader for NoAssets {
        async fn load(&self, source: &str) -> std::result::Result<String, FetchError> {
            Err(FetchError::new(source, "missing"))
        }
    }

    fn resolver(scripts: &[(&str, &str)]) -> (ImportResolver, Arc<MapFetcher>) {
        let fetcher = Arc::new(MapFetcher {
            scripts: scripts.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            calls: AtomicUsize::new(0),
        });
        let resolver = ImportResolver::new(fetcher.clone(), Arc::new(NoAssets), ComponentLibrary::default());
        (resolver, fetcher)
    }

    fn statements(source: &str) -> Result<Vec<Statement>> {
        StatementParser::new().parse("test", source)
    }

    #[tokio::test]
    async fn test_rewrite_declares_params_and_wraps_code() -> Result<()> {
        let (resolver, _) = resolver(&[("acme/Post", "post = box($height, 10, 10)")]);
        let mut stmts = statements("let p = $import('acme/Post', { height: 300 })")?;
        let report = resolver.preload(&mut stmts).await;

        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
        let code = &stmts[0].code;
        assert!(code.starts_with("{\nfunction $import() {"));
        assert!(code.contains("geom.layerGroup(\"acme/Post\")"));
        assert!(code.contains("let $height = 300;"));
        assert!(code.contains("let $HEIGHT = 300;"));
        assert!(code.contains("let post = box($height, 10, 10)"));
        assert!(code.ends_with("p = $import('acme/Post', { height: 300 })\n}"));
        assert!(parse_program(code).is_ok());
        assert_eq!(report.imports.len(), 1);
        assert!(report.imports[0].resolved);
        Ok(())
    }

    #[tokio::test]
    async fn test_nested_import_gets_local_binding() -> Result<()> {
        let (resolver, fetcher) = resolver(&[
            ("acme/Frame", "const beam = $import('acme/Beam')\nbeam.move(0, 0, 10)"),
            ("acme/Beam", "b = box(10, 10, 100)"),
        ]);
        let mut stmts = statements("frame = $import('acme/Frame')")?;
        let report = resolver.preload(&mut stmts).await;

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(report.fetched, 2);
        let code = &stmts[0].code;
        assert!(code.contains("let beam;\n{\nfunction $import() {"));
        assert!(code.contains("geom.layerGroup(\"acme/Beam\")"));
        assert!(code.contains("let b = box(10, 10, 100)"));
        assert!(parse_program(code).is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn test_cycle_is_reported_not_followed() -> Result<()> {
        let (resolver, _) = resolver(&[
            ("acme/A", "x = $import('acme/B')"),
            ("acme/B", "y = $import('acme/A')"),
        ]);
        let mut stmts = statements("a = $import('acme/A')")?;
        let report = resolver.preload(&mut stmts).await;

        assert!(report.imports[0].resolved);
        assert!(report.warnings.iter().any(|w| w.contains("import cycle")));
        assert!(stmts[0].code.contains(&format!("let $import = {INERT_IMPORT};")));
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_statement_untouched() -> Result<()> {
        let (resolver, fetcher) = resolver(&[("acme/Ok", "ok = box(1, 1, 1)")]);
        let source = "a = $import('acme/Missing')\nb = $import('acme/Ok')\nc = $import('acme/Ok')";
        let mut stmts = statements(source)?;
        let report = resolver.preload(&mut stmts).await;

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(stmts[0].code, "a = $import('acme/Missing')");
        assert!(stmts[1].code.contains("function $import()"));
        assert!(stmts[2].code.contains("function $import()"));
        assert!(!report.imports[0].resolved);
        assert_eq!(report.warnings.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_inline_component_and_cached_lookup() -> Result<()> {
        let (resolver, _) = resolver(&[]);
        let mut stmts = statements("c = $component('b = box(1, 2, 3)').model()\nd = $load('data.csv')")?;
        let report = resolver.preload(&mut stmts).await;

        assert_eq!(report.fetched, 2);
        let script = resolver.component_script("b = box(1, 2, 3)");
        assert!(matches!(script, Ok(s) if s.code == "b = box(1, 2, 3)"));
        assert!(resolver.component_script("Unknown").is_err());
        assert!(matches!(resolver.asset("data.csv"), Some(Err(_))));
        assert_eq!(report.warnings.len(), 1);
        Ok(())
    }
}
