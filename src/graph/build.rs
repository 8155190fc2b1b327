//! Target Graph: stores targets and edges, computes `RebuildRequired`
//! and initial readiness.

use std::collections::HashSet;
use std::path::Path;
use std::time::SystemTime;

use indexmap::IndexMap;

use crate::ast::{ScopeId, Target, TargetId};
use crate::error::EngineError;

use super::path::canonicalize;

#[derive(Debug, Default)]
pub struct TargetGraph {
    targets: Vec<Target>,
    path_to_id: IndexMap<String, TargetId>,
}

impl TargetGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn get(&self, id: TargetId) -> &Target {
        &self.targets[id.0]
    }

    pub fn get_mut(&mut self, id: TargetId) -> &mut Target {
        &mut self.targets[id.0]
    }

    pub fn find(&self, canonical_path: &str) -> Option<TargetId> {
        self.path_to_id.get(canonical_path).copied()
    }

    pub fn ids(&self) -> impl Iterator<Item = TargetId> + '_ {
        (0..self.targets.len()).map(TargetId)
    }

    /// Lookup or create the target named by `text` as referenced from
    /// `scope`'s directory.
    pub fn resolve(&mut self, text: &str, base_dir: &Path, scope: ScopeId) -> TargetId {
        let (display, canonical) = canonicalize(text, base_dir);
        if let Some(id) = self.path_to_id.get(&canonical) {
            return *id;
        }
        let id = TargetId(self.targets.len());
        self.targets.push(Target::new(id, canonical.clone(), display, scope));
        self.path_to_id.insert(canonical, id);
        id
    }

    /// Add a `parent -> child` dependency edge: `parent` must finish
    /// before `child` can be dispatched. Idempotent; rejects cycles.
    pub fn add_dependency(&mut self, parent: TargetId, child: TargetId) -> Result<(), EngineError> {
        if parent == child {
            return Err(EngineError::DependencyCycle {
                cycle: format!(
                    "{} depends on itself",
                    self.targets[parent.0].display_path
                ),
            });
        }
        if self.targets[child.0].parents.contains(&parent) {
            return Ok(());
        }
        if self.reachable_via_parents(parent, child) {
            return Err(EngineError::DependencyCycle {
                cycle: format!(
                    "{} -> {} would close a cycle",
                    self.targets[parent.0].display_path, self.targets[child.0].display_path
                ),
            });
        }
        self.targets[child.0].parents.push(parent);
        self.targets[parent.0].children.push(child);
        Ok(())
    }

    /// TRUE if `target` is reachable from `start` by following parent
    /// edges (i.e. `start` already transitively depends on `target`).
    fn reachable_via_parents(&self, start: TargetId, target: TargetId) -> bool {
        let mut stack = vec![start];
        let mut seen = HashSet::new();
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            stack.extend(self.targets[id.0].parents.iter().copied());
        }
        false
    }

    /// Post-order DFS from `root`: marks `RebuildRequired` per the
    /// distilled spec's four criteria (missing output, a parent with a
    /// newer timestamp, a parent itself rebuild-required, or no output
    /// file at all i.e. phony), then sets `parents_to_build` to the
    /// number of rebuild-required parents. Memoized so shared
    /// dependencies in a diamond graph are only evaluated once.
    pub fn mark_rebuild_required(&mut self, root: TargetId) -> Result<(), EngineError> {
        let mut visited = HashSet::new();
        self.mark_rebuild_required_inner(root, &mut visited)
    }

    fn mark_rebuild_required_inner(
        &mut self,
        id: TargetId,
        visited: &mut HashSet<TargetId>,
    ) -> Result<(), EngineError> {
        if visited.contains(&id) {
            return Ok(());
        }
        visited.insert(id);

        let parents = self.targets[id.0].parents.clone();
        for p in &parents {
            self.mark_rebuild_required_inner(*p, visited)?;
        }

        let phony = self.targets[id.0].phony || !has_output_file(&self.targets[id.0]);
        let self_mtime = file_mtime(&self.targets[id.0].display_path);
        let missing = self_mtime.is_none();

        let mut any_parent_rebuild = false;
        let mut any_parent_newer = false;
        for p in &parents {
            let parent = &self.targets[p.0];
            if parent.rebuild_required {
                any_parent_rebuild = true;
            }
            if let (Some(parent_mtime), Some(self_mtime)) = (file_mtime(&parent.display_path), self_mtime) {
                if parent_mtime > self_mtime {
                    any_parent_newer = true;
                }
            }
        }

        let rebuild_required = phony || missing || any_parent_rebuild || any_parent_newer;
        let parents_to_build = parents
            .iter()
            .filter(|p| self.targets[p.0].rebuild_required)
            .count();

        let target = &mut self.targets[id.0];
        target.rebuild_required = rebuild_required;
        target.parents_to_build = parents_to_build;
        Ok(())
    }

    /// Split every target reachable via `mark_rebuild_required` roots
    /// into `Waiting` (parents_to_build > 0) and `Ready` (== 0), skipping
    /// targets that do not need rebuilding at all.
    pub fn seed_ready(&self, roots: &[TargetId]) -> (Vec<TargetId>, Vec<TargetId>) {
        let mut waiting = Vec::new();
        let mut ready = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = roots.to_vec();
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let target = &self.targets[id.0];
            if !target.rebuild_required {
                continue;
            }
            if target.parents_to_build == 0 {
                ready.push(id);
            } else {
                waiting.push(id);
            }
            stack.extend(target.parents.iter().copied());
        }
        (waiting, ready)
    }
}

fn has_output_file(target: &Target) -> bool {
    // A target is treated as having a real output file unless declared
    // phony; existence is checked separately via `file_mtime`.
    !target.phony
}

fn file_mtime(path: &str) -> Option<SystemTime> {
    std::fs::metadata(path).ok()?.modified().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn resolve_is_idempotent_by_canonical_path() {
        let mut graph = TargetGraph::new();
        let a = graph.resolve("out.o", Path::new("/proj"), ScopeId(0));
        let b = graph.resolve("OUT.O", Path::new("/proj"), ScopeId(0));
        assert_eq!(a, b);
    }

    #[test]
    fn add_dependency_rejects_direct_cycle() {
        let mut graph = TargetGraph::new();
        let a = graph.resolve("a", Path::new("/proj"), ScopeId(0));
        let b = graph.resolve("b", Path::new("/proj"), ScopeId(0));
        graph.add_dependency(a, b).unwrap();
        let err = graph.add_dependency(b, a);
        assert!(err.is_err());
    }

    #[test]
    fn add_dependency_rejects_transitive_cycle() {
        let mut graph = TargetGraph::new();
        let a = graph.resolve("a", Path::new("/proj"), ScopeId(0));
        let b = graph.resolve("b", Path::new("/proj"), ScopeId(0));
        let c = graph.resolve("c", Path::new("/proj"), ScopeId(0));
        graph.add_dependency(a, b).unwrap(); // b depends on a
        graph.add_dependency(b, c).unwrap(); // c depends on b
        let err = graph.add_dependency(c, a); // a depends on c -> cycle
        assert!(err.is_err());
    }

    #[test]
    fn add_dependency_self_loop_rejected() {
        let mut graph = TargetGraph::new();
        let a = graph.resolve("a", Path::new("/proj"), ScopeId(0));
        assert!(graph.add_dependency(a, a).is_err());
    }

    #[test]
    fn phony_targets_always_rebuild() {
        let mut graph = TargetGraph::new();
        let a = graph.resolve("clean", Path::new("/proj"), ScopeId(0));
        graph.get_mut(a).phony = true;
        graph.mark_rebuild_required(a).unwrap();
        assert!(graph.get(a).rebuild_required);
        assert_eq!(graph.get(a).parents_to_build, 0);
    }

    #[test]
    fn diamond_seed_ready_has_single_ready_root() {
        // A -> B, A -> C, B -> D, C -> D (A is built first, D last).
        let mut graph = TargetGraph::new();
        let a = graph.resolve("a", Path::new("/proj"), ScopeId(0));
        let b = graph.resolve("b", Path::new("/proj"), ScopeId(0));
        let c = graph.resolve("c", Path::new("/proj"), ScopeId(0));
        let d = graph.resolve("d", Path::new("/proj"), ScopeId(0));
        for t in [a, b, c, d] {
            graph.get_mut(t).phony = true;
        }
        graph.add_dependency(a, b).unwrap();
        graph.add_dependency(a, c).unwrap();
        graph.add_dependency(b, d).unwrap();
        graph.add_dependency(c, d).unwrap();
        graph.mark_rebuild_required(d).unwrap();
        let (waiting, ready) = graph.seed_ready(&[d]);
        assert_eq!(ready, vec![a]);
        assert_eq!(waiting.len(), 3);
    }
}
