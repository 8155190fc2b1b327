//! The scheduler's main loop: pump-ready, wait, completion, target
//! completion, ready-with-no-recipe sweep, terminate - driven by an async
//! event loop over an mpsc channel of command-completion events, in the
//! style of the `razel` scheduler's `run()`/`start_ready_commands()`/
//! `on_command_finished()` split. Only this task ever mutates the target
//! graph, readiness lists, or either bitmask; each spawned per-job future
//! touches only its own command list and the channel.

use std::collections::HashMap;
use std::path::PathBuf;

use log::{debug, error, info};
use tokio::sync::mpsc;

use crate::ast::{CommandToExecute, TargetId, VarFlavor};
use crate::dispatch::dispatch;
use crate::error::{EngineError, Result};

use super::context::EngineContext;

/// One finished job's outcome, reported back from its spawned task. Only
/// `ChildNonZeroExit`/`SpawnFailure`/`IoError` style failures collapse
/// into `succeeded = false` here - per §7's fatal/per-command split,
/// nothing propagates as a Rust `Err` out of a job task.
struct JobCompletion {
    job_id: u8,
    target: TargetId,
    succeeded: bool,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub succeeded: Vec<TargetId>,
    pub failed: Vec<TargetId>,
    /// Targets left in `Waiting` forever because a parent failed under
    /// `KeepGoing` (or because the run halted before they were reached).
    pub never_started: Vec<TargetId>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Drive `waiting`/`ready` to completion against `ctx`. Assumes the
/// caller has already run `TargetGraph::mark_rebuild_required` and
/// `TargetGraph::seed_ready` for every requested root, and
/// `crate::plan::plan_targets` for every rebuild-required target reachable
/// from those roots.
pub async fn run(ctx: &mut EngineContext, mut waiting: Vec<TargetId>, mut ready: Vec<TargetId>) -> Result<RunSummary> {
    let (tx, mut rx) = mpsc::unbounded_channel::<JobCompletion>();
    let mut running_targets: HashMap<u8, TargetId> = HashMap::new();
    let mut summary = RunSummary::default();
    let mut halt = false;
    let mut warned_interrupt = false;

    loop {
        if ctx.interrupted.load(std::sync::atomic::Ordering::Relaxed) && !halt {
            if !warned_interrupt {
                log::warn!("interrupt received, draining in-flight jobs and stopping new dispatch");
                warned_interrupt = true;
            }
            halt = true;
        }

        sweep_recipeless_ready(ctx, &mut ready, &mut waiting, &mut summary);

        if !halt {
            while !ready.is_empty() && ctx.jobs.in_use() < ctx.policy.max_workers {
                let id = ready.remove(0);
                dispatch_one(ctx, id, tx.clone(), &mut running_targets)?;
            }
        }

        if ctx.jobs.in_use() == 0 {
            break;
        }

        let event = match rx.recv().await {
            Some(event) => event,
            None => break,
        };
        running_targets.remove(&event.job_id);
        ctx.temp_dirs.teardown(event.job_id)?;
        ctx.jobs.release(event.job_id);

        let display = ctx.graph.get(event.target).display_path.clone();
        if event.succeeded {
            info!("finished {display} (job {})", event.job_id);
            summary.succeeded.push(event.target);
            propagate_completion(ctx, event.target, true, &mut waiting, &mut ready);
        } else {
            error!("failed {display} (job {})", event.job_id);
            summary.failed.push(event.target);
            if !ctx.policy.keep_going {
                halt = true;
            }
            propagate_completion(ctx, event.target, false, &mut waiting, &mut ready);
        }
    }

    summary.never_started.extend(waiting);
    summary.never_started.extend(ready);

    if ctx.interrupted.load(std::sync::atomic::Ordering::Relaxed) {
        return Err(EngineError::Aborted);
    }
    Ok(summary)
}

/// Targets with an empty command list complete the instant they are
/// dispatched; sweeping them here (rather than allocating a job and
/// round-tripping through the channel) keeps `Ready` from stalling on
/// work that has nothing to run.
fn sweep_recipeless_ready(
    ctx: &mut EngineContext,
    ready: &mut Vec<TargetId>,
    waiting: &mut Vec<TargetId>,
    summary: &mut RunSummary,
) {
    let mut i = 0;
    while i < ready.len() {
        if ctx.graph.get(ready[i]).commands.is_empty() {
            let id = ready.remove(i);
            info!("{} has no recipe, marking finished", ctx.graph.get(id).display_path);
            summary.succeeded.push(id);
            propagate_completion(ctx, id, true, waiting, ready);
        } else {
            i += 1;
        }
    }
}

/// On a target's completion, decrement `parents_to_build` on every
/// waiting child. A failed target's children are left in `Waiting`
/// forever (never_started), per the keep-going design note.
fn propagate_completion(
    ctx: &mut EngineContext,
    id: TargetId,
    succeeded: bool,
    waiting: &mut Vec<TargetId>,
    ready: &mut Vec<TargetId>,
) {
    if !succeeded {
        return;
    }
    let children = ctx.graph.get(id).children.clone();
    for child in children {
        let Some(pos) = waiting.iter().position(|w| *w == child) else { continue };
        let target = ctx.graph.get_mut(child);
        target.parents_to_build = target.parents_to_build.saturating_sub(1);
        if target.parents_to_build == 0 {
            waiting.remove(pos);
            ready.push(child);
        }
    }
}

fn dispatch_one(
    ctx: &mut EngineContext,
    id: TargetId,
    tx: mpsc::UnboundedSender<JobCompletion>,
    running_targets: &mut HashMap<u8, TargetId>,
) -> Result<()> {
    let job_id = match ctx.jobs.allocate() {
        Some(id) => id,
        None => unreachable!("dispatch_one called without a free worker slot"),
    };
    let temp_dir = ctx.temp_dirs.dir_for(job_id)?;

    let target = ctx.graph.get(id);
    let commands = target.commands.clone();
    let scope = target.scope;
    let display = target.display_path.clone();
    let cwd = ctx.scopes.directory(scope).to_path_buf();
    let scope_vars = ctx.scopes.get(scope).variables.clone();

    let mut env = ctx.env.clone();
    env.insert("TEMP".to_string(), temp_dir.display().to_string());
    env.insert("TMP".to_string(), temp_dir.display().to_string());

    let silent_launch = ctx.policy.silent_command_launching;
    let dry_run = ctx.policy.dry_run;

    info!("dispatching {display} (job {job_id})");
    running_targets.insert(job_id, id);
    tokio::spawn(run_job(job_id, id, cwd, env, scope_vars, commands, silent_launch, dry_run, tx));
    Ok(())
}

/// Runs one target's recipe to completion, commands in source order. A
/// command that fails and is not marked `ignore_errors` stops the recipe;
/// the whole job is reported as failed.
#[allow(clippy::too_many_arguments)]
async fn run_job(
    job_id: u8,
    target_id: TargetId,
    mut cwd: PathBuf,
    env: HashMap<String, String>,
    scope_vars: indexmap::IndexMap<String, (String, VarFlavor)>,
    commands: Vec<CommandToExecute>,
    silent_launch: bool,
    dry_run: bool,
    tx: mpsc::UnboundedSender<JobCompletion>,
) {
    let mut succeeded = true;
    for command in &commands {
        if !silent_launch && !command.modifiers.silent {
            println!("{}", command.text);
        }
        debug!("job {job_id} command: {}", command.text);
        if dry_run {
            continue;
        }
        let outcome = dispatch(&command.text, &mut cwd, &env, &scope_vars, command.modifiers.force_subshell).await;
        match outcome {
            Ok(result) => {
                if !result.output.is_empty() {
                    use std::io::Write;
                    let _ = std::io::stdout().write_all(&result.output);
                }
                if !result.success() && !command.modifiers.ignore_errors {
                    let failure = EngineError::ChildNonZeroExit {
                        command: command.text.clone(),
                        code: result.exit_code,
                    };
                    error!("job {job_id}: {failure}");
                    succeeded = false;
                    break;
                }
            }
            Err(e) => {
                error!("job {job_id} command error: {e}");
                if !command.modifiers.ignore_errors {
                    succeeded = false;
                    break;
                }
            }
        }
    }
    let _ = tx.send(JobCompletion { job_id, target: target_id, succeeded });
}
