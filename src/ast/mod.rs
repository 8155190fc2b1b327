//! Shared data model used by the parser, graph, plan builder, dispatcher,
//! and scheduler.

pub mod types;

pub use types::*;
