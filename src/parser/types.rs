//! Parse-time products consumed by the graph builder: explicit rule
//! declarations and the finished scope tree. Targets themselves are not
//! materialized here - that is the Target Graph component's job (see
//! `graph::build`), which resolves these declarations against inference
//! rules and canonicalizes paths.

use crate::ast::{RawRecipeLine, ScopeId};
use crate::error::SourceLocation;

/// One `target : dep1 dep2 ...` rule as written, before graph
/// construction. Multiple declarations for the same target name are
/// merged by the graph builder (dependency sets unioned; at most one may
/// carry a recipe).
#[derive(Debug, Clone)]
pub struct ExplicitRuleDecl {
    pub scope: ScopeId,
    pub target_name: String,
    pub deps: Vec<String>,
    pub recipe: Option<Vec<RawRecipeLine>>,
    pub location: SourceLocation,
}

/// Everything the parser produced from one or more makefiles (an
/// `!include` tree walks into nested scopes, all recorded here).
#[derive(Debug)]
pub struct ParsedMakefile {
    pub scopes: crate::parser::scope::ScopeArena,
    pub rules: Vec<ExplicitRuleDecl>,
    pub root_scope: ScopeId,
    /// Name of the first explicitly-defined target with dependencies,
    /// i.e. the root scope's default target, if any rule defined one.
    pub default_target: Option<String>,
    /// Names listed in any `.PHONY : name1 name2 ...` pseudo-target.
    pub phony_names: Vec<String>,
}
