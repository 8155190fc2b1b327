//! Scope arena: materializes the tree of per-directory parsing contexts
//! that `!include` produces, and assembles the nearest-first ancestor
//! chain the variable-expansion layer needs for lookups.

use crate::ast::{Scope, ScopeId, VarFlavor};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
}

impl ScopeArena {
    pub fn new() -> Self {
        Self { scopes: Vec::new() }
    }

    pub fn create(&mut self, directory: PathBuf, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope::new(id, directory, parent));
        id
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    pub fn get_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0]
    }

    pub fn set_variable(&mut self, id: ScopeId, name: &str, value: String, flavor: VarFlavor) {
        self.scopes[id.0].variables.insert(name.to_string(), (value, flavor));
    }

    pub fn directory(&self, id: ScopeId) -> &Path {
        &self.scopes[id.0].directory
    }

    /// Nearest-first chain of variable maps: `id`'s own map, then its
    /// parent's, and so on to the root.
    pub fn variable_chain(&self, id: ScopeId) -> Vec<&IndexMap<String, (String, VarFlavor)>> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(sid) = current {
            let scope = &self.scopes[sid.0];
            chain.push(&scope.variables);
            current = scope.parent;
        }
        chain
    }

    /// Nearest-first chain of scope ids, used to search inference rules
    /// the same way variables are searched (current scope, then
    /// ancestors).
    pub fn ancestor_chain(&self, id: ScopeId) -> Vec<ScopeId> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(sid) = current {
            chain.push(sid);
            current = self.scopes[sid.0].parent;
        }
        chain
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ancestor_chain_is_nearest_first() {
        let mut arena = ScopeArena::new();
        let root = arena.create(PathBuf::from("/root"), None);
        let child = arena.create(PathBuf::from("/root/sub"), Some(root));
        let grandchild = arena.create(PathBuf::from("/root/sub/sub2"), Some(child));

        let chain = arena.ancestor_chain(grandchild);
        assert_eq!(chain, vec![grandchild, child, root]);
    }

    #[test]
    fn variable_precedence_prefers_nearest_scope() {
        let mut arena = ScopeArena::new();
        let root = arena.create(PathBuf::from("/root"), None);
        let child = arena.create(PathBuf::from("/root/sub"), Some(root));
        arena.set_variable(root, "CC", "gcc".into(), VarFlavor::Eager);
        arena.set_variable(child, "CC", "clang".into(), VarFlavor::Eager);

        let chain = arena.variable_chain(child);
        let (value, _) = chain[0].get("CC").unwrap();
        assert_eq!(value, "clang");
    }
}
