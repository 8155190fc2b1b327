//! `$(name)` / `$NAME$` variable expansion against a multi-scope store.
//!
//! This module only knows about flat string maps; it is deliberately
//! ignorant of the [`crate::ast::Scope`] tree so the lexical layer stays a
//! leaf dependency. Callers (the parser, the plan builder) assemble a
//! [`VariableResolver`] by walking the scope chain nearest-first and pass
//! it down for each line that needs expansion.

use crate::error::{EngineError, SourceLocation};
use std::collections::HashMap;

/// Maximum re-entrant expansion depth before `VariableExpansionTooDeep`.
pub const MAX_EXPANSION_DEPTH: usize = 64;

/// One of the automatic, per-command pseudo-variables (`$@`, `$**`, `$<`).
/// Resolved from the command/target currently being built rather than
/// from the variable store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoVar {
    /// `$@` - canonical path of the target currently being built.
    Target,
    /// `$**` - space-joined list of all parent paths.
    AllParents,
    /// `$<` - first parent path.
    FirstParent,
}

/// Supplies values for `$@`/`$**`/`$<` when expanding a recipe line. Plain
/// variable/assignment expansion (outside a recipe body) has no pseudo
/// vars in scope and uses [`NoPseudoVars`].
pub trait PseudoVarSource {
    fn resolve(&self, var: PseudoVar) -> Option<String>;
}

pub struct NoPseudoVars;
impl PseudoVarSource for NoPseudoVars {
    fn resolve(&self, _var: PseudoVar) -> Option<String> {
        None
    }
}

/// Ordered lookup chain: command-line overrides, then the current scope
/// and its ancestors (nearest first), then the process environment.
pub struct VariableResolver<'a> {
    pub overrides: &'a HashMap<String, String>,
    /// Nearest-first chain of scope-local variable maps.
    pub scope_chain: Vec<&'a indexmap::IndexMap<String, (String, crate::ast::VarFlavor)>>,
    pub env: &'a HashMap<String, String>,
}

/// Outcome of expanding one line: the expanded text plus whether any
/// referenced name was undefined (expanded to empty string).
#[derive(Debug, Clone)]
pub struct ExpansionOutcome {
    pub text: String,
    pub had_undefined: bool,
}

impl<'a> VariableResolver<'a> {
    fn lookup(&self, name: &str) -> Option<String> {
        let upper = name.to_ascii_uppercase();
        if let Some(v) = self.overrides.iter().find(|(k, _)| k.to_ascii_uppercase() == upper) {
            return Some(v.1.clone());
        }
        for scope in &self.scope_chain {
            if let Some((value, _flavor)) = scope
                .iter()
                .find(|(k, _)| k.to_ascii_uppercase() == upper)
                .map(|(_, v)| v)
            {
                return Some(value.clone());
            }
        }
        if let Some(v) = self.env.iter().find(|(k, _)| k.to_ascii_uppercase() == upper) {
            return Some(v.1.clone());
        }
        None
    }

    /// Expand all `$(name)`, `$NAME$`, and pseudo-variable references in
    /// `line`, re-entrantly expanding looked-up values as well.
    pub fn expand(
        &self,
        line: &str,
        pseudo: &dyn PseudoVarSource,
        location: &SourceLocation,
    ) -> Result<ExpansionOutcome, EngineError> {
        let mut had_undefined = false;
        let text = self.expand_depth(line, pseudo, location, 0, &mut had_undefined)?;
        Ok(ExpansionOutcome { text, had_undefined })
    }

    fn expand_depth(
        &self,
        line: &str,
        pseudo: &dyn PseudoVarSource,
        location: &SourceLocation,
        depth: usize,
        had_undefined: &mut bool,
    ) -> Result<String, EngineError> {
        if depth > MAX_EXPANSION_DEPTH {
            return Err(EngineError::VariableExpansionTooDeep {
                location: location.clone(),
                limit: MAX_EXPANSION_DEPTH,
            });
        }

        let chars: Vec<char> = line.chars().collect();
        let mut out = String::with_capacity(line.len());
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if c != '$' {
                out.push(c);
                i += 1;
                continue;
            }
            // Pseudo-vars: $@, $**, $<
            if let Some((consumed, var)) = match_pseudo(&chars, i) {
                if let Some(value) = pseudo.resolve(var) {
                    out.push_str(&value);
                } else {
                    *had_undefined = true;
                }
                i += consumed;
                continue;
            }
            // $(name) form, allows nested $(...) in the name text.
            if i + 1 < chars.len() && chars[i + 1] == '(' {
                if let Some((inner, consumed)) = extract_balanced(&chars, i + 2) {
                    let expanded_name =
                        self.expand_depth(&inner, pseudo, location, depth + 1, had_undefined)?;
                    out.push_str(&self.resolve_and_expand(
                        &expanded_name,
                        pseudo,
                        location,
                        depth,
                        had_undefined,
                    )?);
                    i += consumed;
                    continue;
                }
            }
            // $NAME$ form.
            if let Some((name, consumed)) = extract_dollar_name(&chars, i + 1) {
                out.push_str(&self.resolve_and_expand(
                    &name,
                    pseudo,
                    location,
                    depth,
                    had_undefined,
                )?);
                i += 1 + consumed;
                continue;
            }
            out.push(c);
            i += 1;
        }
        Ok(out)
    }

    fn resolve_and_expand(
        &self,
        name: &str,
        pseudo: &dyn PseudoVarSource,
        location: &SourceLocation,
        depth: usize,
        had_undefined: &mut bool,
    ) -> Result<String, EngineError> {
        match self.lookup(name) {
            Some(value) => self.expand_depth(&value, pseudo, location, depth + 1, had_undefined),
            None => {
                *had_undefined = true;
                Ok(String::new())
            }
        }
    }
}

fn match_pseudo(chars: &[char], i: usize) -> Option<(usize, PseudoVar)> {
    if chars.get(i) != Some(&'$') {
        return None;
    }
    if chars.get(i + 1) == Some(&'*') && chars.get(i + 2) == Some(&'*') {
        return Some((3, PseudoVar::AllParents));
    }
    match chars.get(i + 1) {
        Some('@') => Some((2, PseudoVar::Target)),
        Some('<') => Some((2, PseudoVar::FirstParent)),
        _ => None,
    }
}

/// Extract the text between a balanced pair of parens starting right
/// after the opening `(` (whose index is `start`). Returns the inner text
/// and the number of characters consumed counting from the `$` itself
/// (i.e. including `$(` and the closing `)`).
fn extract_balanced(chars: &[char], start: usize) -> Option<(String, usize)> {
    let mut depth = 1usize;
    let mut j = start;
    while j < chars.len() {
        match chars[j] {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    let inner: String = chars[start..j].iter().collect();
                    // consumed = "$(" (2) + inner + ")" (1), measured from '$'
                    return Some((inner, (j - (start - 2)) + 1));
                }
            }
            _ => {}
        }
        j += 1;
    }
    None
}

/// Extract a case-insensitive ASCII variable name terminated by a closing
/// `$`, starting at `start` (just after the opening `$`). Names are
/// `[A-Za-z0-9_]+`.
fn extract_dollar_name(chars: &[char], start: usize) -> Option<(String, usize)> {
    let mut j = start;
    while j < chars.len() && (chars[j].is_ascii_alphanumeric() || chars[j] == '_') {
        j += 1;
    }
    if j == start || chars.get(j) != Some(&'$') {
        return None;
    }
    let name: String = chars[start..j].iter().collect();
    Some((name, (j - start) + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::VarFlavor;
    use indexmap::IndexMap;

    fn loc() -> SourceLocation {
        SourceLocation::default()
    }

    #[test]
    fn expands_paren_form_with_precedence() {
        let overrides = HashMap::new();
        let mut scope: IndexMap<String, (String, VarFlavor)> = IndexMap::new();
        scope.insert("CC".into(), ("gcc".into(), VarFlavor::Eager));
        let env = HashMap::new();
        let resolver = VariableResolver {
            overrides: &overrides,
            scope_chain: vec![&scope],
            env: &env,
        };
        let out = resolver.expand("$(CC) -c", &NoPseudoVars, &loc()).unwrap();
        assert_eq!(out.text, "gcc -c");
        assert!(!out.had_undefined);
    }

    #[test]
    fn overrides_beat_scope_which_beats_env() {
        let mut overrides = HashMap::new();
        overrides.insert("CC".to_string(), "clang".to_string());
        let mut scope: IndexMap<String, (String, VarFlavor)> = IndexMap::new();
        scope.insert("CC".into(), ("gcc".into(), VarFlavor::Eager));
        let mut env = HashMap::new();
        env.insert("CC".to_string(), "cc".to_string());
        let resolver = VariableResolver {
            overrides: &overrides,
            scope_chain: vec![&scope],
            env: &env,
        };
        let out = resolver.expand("$(CC)", &NoPseudoVars, &loc()).unwrap();
        assert_eq!(out.text, "clang");
    }

    #[test]
    fn undefined_variable_expands_empty_and_flags() {
        let overrides = HashMap::new();
        let env = HashMap::new();
        let resolver = VariableResolver {
            overrides: &overrides,
            scope_chain: vec![],
            env: &env,
        };
        let out = resolver.expand("[$(MISSING)]", &NoPseudoVars, &loc()).unwrap();
        assert_eq!(out.text, "[]");
        assert!(out.had_undefined);
    }

    #[test]
    fn dollar_name_form_expands() {
        let overrides = HashMap::new();
        let mut scope: IndexMap<String, (String, VarFlavor)> = IndexMap::new();
        scope.insert("OUT".into(), ("build".into(), VarFlavor::Eager));
        let env = HashMap::new();
        let resolver = VariableResolver {
            overrides: &overrides,
            scope_chain: vec![&scope],
            env: &env,
        };
        let out = resolver.expand("$OUT$/main.o", &NoPseudoVars, &loc()).unwrap();
        assert_eq!(out.text, "build/main.o");
    }

    #[test]
    fn too_deep_recursion_is_fatal() {
        let overrides = HashMap::new();
        let mut scope: IndexMap<String, (String, VarFlavor)> = IndexMap::new();
        // A references itself, forcing unbounded recursion.
        scope.insert("A".into(), ("$(A)".into(), VarFlavor::Eager));
        let env = HashMap::new();
        let resolver = VariableResolver {
            overrides: &overrides,
            scope_chain: vec![&scope],
            env: &env,
        };
        let result = resolver.expand("$(A)", &NoPseudoVars, &loc());
        assert!(matches!(result, Err(EngineError::VariableExpansionTooDeep { .. })));
    }

    struct FixedPseudo;
    impl PseudoVarSource for FixedPseudo {
        fn resolve(&self, var: PseudoVar) -> Option<String> {
            match var {
                PseudoVar::Target => Some("out.o".to_string()),
                PseudoVar::AllParents => Some("a.c b.c".to_string()),
                PseudoVar::FirstParent => Some("a.c".to_string()),
            }
        }
    }

    #[test]
    fn pseudo_vars_resolve_from_command_context() {
        let overrides = HashMap::new();
        let env = HashMap::new();
        let resolver = VariableResolver {
            overrides: &overrides,
            scope_chain: vec![],
            env: &env,
        };
        let out = resolver.expand("cc -o $@ $**", &FixedPseudo, &loc()).unwrap();
        assert_eq!(out.text, "cc -o out.o a.c b.c");
    }
}
