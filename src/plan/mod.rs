//! Execution Plan Builder: turns a target's raw, unexpanded recipe lines
//! into an ordered [`CommandToExecute`] sequence, resolving `$@`/`$**`/`$<`
//! and scope variables per-target at the point each target is about to be
//! dispatched rather than once for the whole graph, since pseudo-variables
//! differ per target.

use std::collections::HashMap;

use crate::ast::{CommandToExecute, RawRecipeLine, ScopeId, Target, TargetId};
use crate::error::{Result, SourceLocation};
use crate::graph::TargetGraph;
use crate::lexer::{PseudoVar, PseudoVarSource, VariableResolver};
use crate::parser::ScopeArena;

/// Supplies `$@`/`$**`/`$<` for the one target currently being planned.
struct TargetPseudoVars {
    target_path: String,
    all_parent_paths: String,
    first_parent_path: Option<String>,
}

impl TargetPseudoVars {
    fn for_target(graph: &TargetGraph, target_id: TargetId) -> Self {
        let target = graph.get(target_id);
        let parent_paths: Vec<&str> = target
            .parents
            .iter()
            .map(|p| graph.get(*p).display_path.as_str())
            .collect();
        TargetPseudoVars {
            target_path: target.display_path.clone(),
            all_parent_paths: parent_paths.join(" "),
            first_parent_path: parent_paths.first().map(|s| s.to_string()),
        }
    }
}

impl PseudoVarSource for TargetPseudoVars {
    fn resolve(&self, var: PseudoVar) -> Option<String> {
        match var {
            PseudoVar::Target => Some(self.target_path.clone()),
            PseudoVar::AllParents => Some(self.all_parent_paths.clone()),
            PseudoVar::FirstParent => self.first_parent_path.clone(),
        }
    }
}

/// Builds the resolver for `scope`, walking its ancestor chain nearest
/// first, the same precedence the parser uses for assignments.
fn resolver_for_scope<'a>(
    scopes: &'a ScopeArena,
    scope: ScopeId,
    overrides: &'a HashMap<String, String>,
    env: &'a HashMap<String, String>,
) -> VariableResolver<'a> {
    VariableResolver {
        overrides,
        scope_chain: scopes.variable_chain(scope),
        env,
    }
}

/// Expand one target's raw recipe into `Target::commands`, in source
/// order. A target with no raw recipe is left with an empty command list
/// (it completes immediately once dispatched, per the graph's contract).
pub fn plan_target(
    graph: &mut TargetGraph,
    scopes: &ScopeArena,
    raw_recipes: &HashMap<TargetId, Vec<RawRecipeLine>>,
    target_id: TargetId,
    overrides: &HashMap<String, String>,
    env: &HashMap<String, String>,
) -> Result<()> {
    let Some(lines) = raw_recipes.get(&target_id) else {
        return Ok(());
    };
    let pseudo = TargetPseudoVars::for_target(graph, target_id);
    let scope = graph.get(target_id).scope;
    let resolver = resolver_for_scope(scopes, scope, overrides, env);
    let location = SourceLocation {
        file: scopes.directory(scope).to_path_buf(),
        line: 0,
        column: 0,
    };

    let mut commands = Vec::with_capacity(lines.len());
    for line in lines {
        let outcome = resolver.expand(&line.text, &pseudo, &location)?;
        commands.push(CommandToExecute {
            text: outcome.text,
            modifiers: line.modifiers,
        });
    }
    graph.get_mut(target_id).commands = commands;
    Ok(())
}

/// Plan every target in `ids`, short-circuiting on the first expansion
/// failure (`VariableExpansionTooDeep` is the only error this can raise;
/// it is fatal per the ambient error design).
pub fn plan_targets(
    graph: &mut TargetGraph,
    scopes: &ScopeArena,
    raw_recipes: &HashMap<TargetId, Vec<RawRecipeLine>>,
    ids: &[TargetId],
    overrides: &HashMap<String, String>,
    env: &HashMap<String, String>,
) -> Result<()> {
    for id in ids {
        plan_target(graph, scopes, raw_recipes, *id, overrides, env)?;
    }
    Ok(())
}

/// A target with zero commands and `RebuildRequired` is immediately
/// completable: the graph's `SeedReady` contract expects the scheduler to
/// sweep these straight to `Finished` rather than dispatch a no-op job.
pub fn has_no_commands(target: &Target) -> bool {
    target.commands.is_empty()
}
