//! Ties the lexer/parser/graph/plan/scheduler components together into a
//! single entry point: `run_engine` parses a makefile, builds and plans
//! the target graph, and drives the scheduler to completion.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::ast::EnginePolicy;
use crate::error::{EngineError, Result};
use crate::graph::build_graph;
use crate::parser::{parse_makefile, ParseContext};
use crate::plan::plan_targets;
use crate::scheduler::{self, EngineContext, RunSummary};

/// Layered configuration surface the CLI assembles and the engine
/// consumes; no hidden global statics, mirroring the teacher's
/// `BashOptions`/`ExecOptions` split between whole-run options and
/// per-execution options.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub makefile: PathBuf,
    pub working_dir: Option<PathBuf>,
    pub max_workers: usize,
    pub keep_going: bool,
    pub silent_command_launching: bool,
    pub dry_run: bool,
    pub overrides: HashMap<String, String>,
    pub targets: Vec<String>,
}

pub async fn run_engine(options: EngineOptions) -> Result<RunSummary> {
    let base_dir = options.working_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    let makefile_path = if options.makefile.is_absolute() {
        options.makefile.clone()
    } else {
        base_dir.join(&options.makefile)
    };

    let env: HashMap<String, String> = std::env::vars().collect();
    let ctx = ParseContext {
        overrides: &options.overrides,
        env: &env,
    };
    let parsed = parse_makefile(&makefile_path, ctx)?;
    let build = build_graph(&parsed)?;
    let mut graph = build.graph;

    let root_dir = parsed.scopes.directory(parsed.root_scope).to_path_buf();
    let root_ids = resolve_roots(&graph, &options.targets, &parsed.default_target, &root_dir)?;

    for id in &root_ids {
        graph.mark_rebuild_required(*id)?;
    }
    let (waiting, ready) = graph.seed_ready(&root_ids);

    let all_ids: Vec<_> = graph.ids().collect();
    plan_targets(&mut graph, &parsed.scopes, &build.raw_recipes, &all_ids, &options.overrides, &env)?;

    let policy = EnginePolicy::new(options.max_workers, options.keep_going, options.silent_command_launching, options.dry_run);
    let mut engine_ctx = EngineContext::new(
        graph,
        parsed.scopes,
        policy,
        std::env::temp_dir(),
        options.overrides,
        env,
    );

    let interrupted = engine_ctx.interrupt_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupted.store(true, std::sync::atomic::Ordering::Relaxed);
        }
    });

    scheduler::run(&mut engine_ctx, waiting, ready).await
}

fn resolve_roots(
    graph: &crate::graph::TargetGraph,
    requested: &[String],
    default_target: &Option<String>,
    base_dir: &Path,
) -> Result<Vec<crate::ast::TargetId>> {
    let names: Vec<&String> = if !requested.is_empty() {
        requested.iter().collect()
    } else if let Some(name) = default_target {
        vec![name]
    } else {
        return Err(EngineError::UnknownTarget { target: "<no default target>".to_string() });
    };

    let mut ids = Vec::with_capacity(names.len());
    for name in names {
        let (_, canonical) = crate::graph::canonicalize(name, base_dir);
        let id = graph
            .find(&canonical)
            .ok_or_else(|| EngineError::UnknownTarget { target: name.clone() })?;
        ids.push(id);
    }
    Ok(ids)
}
