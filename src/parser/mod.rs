//! Parser / Scope Builder: consumes logical lines and produces scopes,
//! variable assignments, inference rules, explicit rule declarations, and
//! recipe bodies.

pub mod directives;
pub mod parser;
pub mod scope;
pub mod types;

pub use parser::{parse_makefile, ParseContext};
pub use scope::ScopeArena;
pub use types::{ExplicitRuleDecl, ParsedMakefile};
