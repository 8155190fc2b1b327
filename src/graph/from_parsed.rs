//! Converts a [`ParsedMakefile`] into a [`TargetGraph`], merging
//! duplicate rule declarations, wiring dependency edges, applying
//! `.PHONY` hints, and synthesizing inference-rule targets.

use std::collections::HashMap;
use std::path::Path;

use crate::ast::{RawRecipeLine, ScopeId, TargetId};
use crate::error::EngineError;
use crate::parser::{ParsedMakefile, ScopeArena};

use super::build::TargetGraph;
use super::path::canonicalize;

/// Result of graph construction: the graph itself, plus each target's
/// unexpanded recipe (sigils already stripped at parse time; variable
/// expansion happens later in the plan builder, per-target, so that
/// `$@`/`$**`/`$<` resolve correctly).
pub struct GraphBuildResult {
    pub graph: TargetGraph,
    pub raw_recipes: HashMap<TargetId, Vec<RawRecipeLine>>,
}

pub fn build_graph(parsed: &ParsedMakefile) -> Result<GraphBuildResult, EngineError> {
    let mut graph = TargetGraph::new();
    let mut raw_recipes: HashMap<TargetId, Vec<RawRecipeLine>> = HashMap::new();

    for rule in &parsed.rules {
        let base_dir = parsed.scopes.directory(rule.scope).to_path_buf();
        let target_id = graph.resolve(&rule.target_name, &base_dir, rule.scope);
        graph.get_mut(target_id).explicit_recipe = true;

        for dep in &rule.deps {
            let dep_id = graph.resolve(dep, &base_dir, rule.scope);
            graph.add_dependency(dep_id, target_id)?;
        }

        if let Some(recipe) = &rule.recipe {
            if let Some(_existing) = raw_recipes.get(&target_id) {
                return Err(EngineError::ParseError {
                    message: format!(
                        "multiple recipes for target '{}'",
                        graph.get(target_id).display_path
                    ),
                    location: rule.location.clone(),
                });
            }
            raw_recipes.insert(target_id, recipe.clone());
        }
    }

    apply_phony(&mut graph, &parsed.rules, &parsed.scopes, &parsed.phony_names);
    apply_inference_rules(&mut graph, &mut raw_recipes, &parsed.scopes);

    Ok(GraphBuildResult { graph, raw_recipes })
}

fn apply_phony(
    graph: &mut super::build::TargetGraph,
    rules: &[crate::parser::ExplicitRuleDecl],
    scopes: &ScopeArena,
    phony_names: &[String],
) {
    for name in phony_names {
        // Phony names are resolved against every scope a rule appeared in,
        // since `.PHONY` commonly follows the rule it annotates within the
        // same scope. This is best-effort: a name that never resolves to
        // an existing target is simply never marked.
        for rule in rules {
            let base_dir = scopes.directory(rule.scope).to_path_buf();
            let (_, canonical) = canonicalize(name, &base_dir);
            if let Some(id) = graph.find(&canonical) {
                graph.get_mut(id).phony = true;
            }
        }
    }
}

/// For every target with no recipe and no explicit rule, search inference
/// rules visible from its owning scope (nearest scope first) for one
/// whose `to_ext` matches the target's extension and whose corresponding
/// `stem.from_ext` sibling is itself a resolvable target. When found,
/// synthesize the dependency edge and attach the inference recipe.
fn apply_inference_rules(
    graph: &mut TargetGraph,
    raw_recipes: &mut HashMap<TargetId, Vec<RawRecipeLine>>,
    scopes: &ScopeArena,
) {
    let candidates: Vec<TargetId> = graph
        .ids()
        .filter(|id| !graph.get(*id).explicit_recipe && !raw_recipes.contains_key(id))
        .collect();

    for target_id in candidates {
        let target = graph.get(target_id);
        let display = target.display_path.clone();
        let scope = target.scope;
        let Some(dot) = display.rfind('.') else { continue };
        let to_ext = &display[dot + 1..];
        let stem = &display[..dot];

        let Some(rule) = find_inference_rule(scopes, scope, to_ext) else { continue };
        let from_path = format!("{}.{}", stem, rule.from_ext);
        let base_dir = Path::new(&from_path)
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_default();
        let dep_id = graph.resolve(&from_path, &base_dir, scope);
        if graph.add_dependency(dep_id, target_id).is_ok() {
            raw_recipes.insert(target_id, rule.recipe.clone());
        }
    }
}

fn find_inference_rule<'a>(
    scopes: &'a ScopeArena,
    scope: ScopeId,
    to_ext: &str,
) -> Option<&'a crate::ast::InferenceRule> {
    for sid in scopes.ancestor_chain(scope) {
        if let Some(rule) = scopes
            .get(sid)
            .inference_rules
            .iter()
            .find(|r| r.to_ext.eq_ignore_ascii_case(to_ext))
        {
            return Some(rule);
        }
    }
    None
}
