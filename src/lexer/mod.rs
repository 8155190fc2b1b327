//! Lexical and variable-expansion layer: turns raw makefile bytes into
//! logical lines, and expands `$(name)`/`$NAME$` references against a
//! layered variable store.

pub mod tokenizer;
pub mod variables;

pub use tokenizer::{decode_source, logical_lines, LogicalLine};
pub use variables::{ExpansionOutcome, NoPseudoVars, PseudoVar, PseudoVarSource, VariableResolver};
