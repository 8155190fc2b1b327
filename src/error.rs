//! Engine-wide error taxonomy.
//!
//! One variant per closed error kind. Parser and graph-construction code
//! return `Result<T, EngineError>` and propagate fatal errors with `?`.
//! Per-command failures (`SpawnFailure`, `ChildNonZeroExit`, `IoError`) are
//! captured as data on the job record instead of bubbling up through the
//! scheduler loop, since a failing command must still allow drain and
//! keep-going bookkeeping to run.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// File, line, and column of a token or directive in makefile source.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{location}: {message}")]
    ParseError {
        message: String,
        location: SourceLocation,
    },

    #[error("no rule to make target '{target}'")]
    UnknownTarget { target: String },

    #[error("dependency cycle detected: {cycle}")]
    DependencyCycle { cycle: String },

    #[error("{location}: command count limit ({limit}) exceeded, recursion too deep")]
    VariableExpansionTooDeep {
        location: SourceLocation,
        limit: usize,
    },

    #[error("failed to spawn '{command}': {source}")]
    SpawnFailure {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command '{command}' exited with code {code}")]
    ChildNonZeroExit { command: String, code: i32 },

    #[error("i/o error during '{operation}': {source}")]
    IoError {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("build aborted by operator")]
    Aborted,
}

impl EngineError {
    /// Exit code this error should cause the engine process to return.
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::ParseError { .. } | EngineError::DependencyCycle { .. } => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
