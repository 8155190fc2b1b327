//! `!if` / `!ifdef` / `!ifndef` / `!elseif*` / `!else` / `!endif`
//! conditional evaluation, plus the `!error`/`!message` authoring aids.

use crate::lexer::{NoPseudoVars, VariableResolver};

/// One frame of the conditional stack. `taken` records whether this
/// frame (or an earlier sibling branch of the same `!if`/`!endif` chain)
/// has already been satisfied, so a later `!elseif` that would otherwise
/// evaluate true is correctly skipped once a prior branch matched.
#[derive(Debug, Clone, Copy)]
struct ConditionalFrame {
    /// Is the *current* branch's text honored?
    active: bool,
    /// Has any branch in this chain already been taken?
    taken: bool,
}

#[derive(Debug, Default)]
pub struct ConditionalStack {
    frames: Vec<ConditionalFrame>,
}

impl ConditionalStack {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// TRUE if lines should currently be honored (all enclosing frames
    /// are active).
    pub fn honoring(&self) -> bool {
        self.frames.iter().all(|f| f.active)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push_if(&mut self, condition: bool) {
        let enclosing_active = self.honoring();
        let active = enclosing_active && condition;
        self.frames.push(ConditionalFrame {
            active,
            taken: active,
        });
    }

    pub fn else_branch(&mut self) -> Option<()> {
        let frame = self.frames.last_mut()?;
        let enclosing_active = self
            .frames
            .len()
            .checked_sub(1)
            .map(|n| self.frames[..n].iter().all(|f| f.active))
            .unwrap_or(true);
        frame.active = enclosing_active && !frame.taken;
        frame.taken = frame.taken || frame.active;
        Some(())
    }

    pub fn elseif_branch(&mut self, condition: bool) -> Option<()> {
        let frame = self.frames.last_mut()?;
        let enclosing_active = self
            .frames
            .len()
            .checked_sub(1)
            .map(|n| self.frames[..n].iter().all(|f| f.active))
            .unwrap_or(true);
        let active = enclosing_active && !frame.taken && condition;
        frame.active = active;
        frame.taken = frame.taken || active;
        Some(())
    }

    pub fn pop_endif(&mut self) -> Option<()> {
        self.frames.pop().map(|_| ())
    }
}

/// Evaluate a `!if <expr>` expression after variable expansion has
/// already been applied to `expr`. Supports `A==B`, `A!=B` (optionally
/// prefixed with whitespace-separated operands that were themselves
/// variable references), and bare truthiness (non-empty and not "0").
/// This is a deliberately small subset: the distilled spec names
/// `if [/i] A==B` for recipe-level conditions; the makefile-preprocessor
/// `!if` reuses the same comparison grammar.
pub fn eval_if_expr(expr: &str) -> bool {
    let expr = expr.trim();
    if let Some(idx) = expr.find("==") {
        let (lhs, rhs) = (expr[..idx].trim(), expr[idx + 2..].trim());
        return lhs == rhs;
    }
    if let Some(idx) = expr.find("!=") {
        let (lhs, rhs) = (expr[..idx].trim(), expr[idx + 2..].trim());
        return lhs != rhs;
    }
    !expr.is_empty() && expr != "0"
}

/// `!ifdef NAME` / `!ifndef NAME`: TRUE if the given name resolves to a
/// defined variable anywhere in the lookup chain (value may be empty;
/// what matters is that a definition exists).
pub fn is_defined(name: &str, resolver: &VariableResolver<'_>, location: &crate::error::SourceLocation) -> bool {
    let probe = format!("[$({})]", name);
    match resolver.expand(&probe, &NoPseudoVars, location) {
        Ok(outcome) => !outcome.had_undefined,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn if_else_endif_chain() {
        let mut stack = ConditionalStack::new();
        stack.push_if(false);
        assert!(!stack.honoring());
        stack.else_branch();
        assert!(stack.honoring());
        stack.pop_endif();
        assert!(stack.honoring());
    }

    #[test]
    fn elseif_chain_only_takes_first_true_branch() {
        let mut stack = ConditionalStack::new();
        stack.push_if(false);
        stack.elseif_branch(true);
        assert!(stack.honoring());
        stack.elseif_branch(true);
        assert!(!stack.honoring(), "second true elseif must not reactivate after a branch was already taken");
    }

    #[test]
    fn nested_conditional_requires_both_active() {
        let mut stack = ConditionalStack::new();
        stack.push_if(true);
        stack.push_if(false);
        assert!(!stack.honoring());
        stack.else_branch();
        assert!(stack.honoring());
        stack.pop_endif();
        assert!(stack.honoring());
    }

    #[test]
    fn eval_equality_and_truthiness() {
        assert!(eval_if_expr("A==A"));
        assert!(!eval_if_expr("A==B"));
        assert!(eval_if_expr("A!=B"));
        assert!(eval_if_expr("1"));
        assert!(!eval_if_expr("0"));
        assert!(!eval_if_expr(""));
    }
}
