//! Core data model: targets, edges, scopes, commands, and runtime job state.
//!
//! Targets and scopes are stored in flat arenas and referenced by stable
//! integer ids rather than embedded in intrusive linked lists, so that the
//! four readiness lists (`Waiting`, `Ready`, `Running`, `Finished`) can hold
//! plain `TargetId`s instead of node pointers.

use std::path::PathBuf;

/// Stable identifier for a [`Target`] within one engine run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub usize);

/// Stable identifier for a [`Scope`] within one engine run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub usize);

/// Per-command modifiers derived from leading recipe-line sigils.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandModifiers {
    /// `@` - do not echo this command before executing.
    pub silent: bool,
    /// `-` - if this command fails, continue the recipe.
    pub ignore_errors: bool,
    /// `+` - force delegation to the sub-shell even if the command would
    /// otherwise classify as in-proc. Reserved slot named by the distilled
    /// spec's "third implementation-chosen flag".
    pub force_subshell: bool,
}

/// One line of a recipe after variable expansion and sigil stripping.
/// Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandToExecute {
    pub text: String,
    pub modifiers: CommandModifiers,
}

/// A resolvable build output identified by a canonical filesystem path.
#[derive(Debug, Clone)]
pub struct Target {
    pub id: TargetId,
    /// Canonical path: case-folded, separators normalized, used as the
    /// dependency-graph identity. Not necessarily a real filesystem path
    /// (phony targets share the namespace).
    pub canonical_path: String,
    /// Path as written in the makefile, used for display and for spawning
    /// children / probing the filesystem.
    pub display_path: String,
    pub scope: ScopeId,
    pub commands: Vec<CommandToExecute>,
    /// Targets this one depends on (parents, in the spec's terminology).
    pub parents: Vec<TargetId>,
    /// Targets that depend on this one (children).
    pub children: Vec<TargetId>,
    pub rebuild_required: bool,
    /// Number of parents that are themselves rebuild-required and not yet
    /// finished. Invariant: kept in sync by the graph and scheduler.
    pub parents_to_build: usize,
    /// TRUE if defined by an explicit rule in source, FALSE if synthesized
    /// by inference.
    pub explicit_recipe: bool,
    /// Hint set by a `.PHONY` declaration. Does not change
    /// `MarkRebuildRequired` semantics (a target with no output file is
    /// already always-rebuild) but is carried for diagnostics and for
    /// distinguishing "no output file" from "declared phony" in output.
    pub phony: bool,
}

impl Target {
    pub fn new(id: TargetId, canonical_path: String, display_path: String, scope: ScopeId) -> Self {
        Self {
            id,
            canonical_path,
            display_path,
            scope,
            commands: Vec::new(),
            parents: Vec::new(),
            children: Vec::new(),
            rebuild_required: false,
            parents_to_build: 0,
            explicit_recipe: false,
            phony: false,
        }
    }
}

/// Variable assignment flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarFlavor {
    /// `=` - lazily expanded on every reference.
    Lazy,
    /// `:=` - eagerly expanded once, at assignment time.
    Eager,
}

/// A context associated with one directory of makefile input. Scopes form
/// a tree mirroring `!include` directives.
#[derive(Debug, Clone)]
pub struct Scope {
    pub id: ScopeId,
    pub directory: PathBuf,
    pub parent: Option<ScopeId>,
    /// Scope-local variables, insertion order preserved for diagnostics.
    pub variables: indexmap::IndexMap<String, (String, VarFlavor)>,
    pub inference_rules: Vec<InferenceRule>,
    pub default_target: Option<TargetId>,
}

impl Scope {
    pub fn new(id: ScopeId, directory: PathBuf, parent: Option<ScopeId>) -> Self {
        Self {
            id,
            directory,
            parent,
            variables: indexmap::IndexMap::new(),
            inference_rules: Vec::new(),
            default_target: None,
        }
    }
}

/// A `.ext1.ext2 :` inference rule that may synthesize a target when a
/// dependency with a matching extension is referenced but has no explicit
/// rule of its own.
#[derive(Debug, Clone)]
pub struct InferenceRule {
    pub from_ext: String,
    pub to_ext: String,
    pub recipe: Vec<RawRecipeLine>,
}

/// A recipe line before variable expansion: leading sigils already
/// identified, text still containing `$(...)`/`$...$` references.
#[derive(Debug, Clone)]
pub struct RawRecipeLine {
    pub modifiers: CommandModifiers,
    pub text: String,
}

/// Runtime state of one concurrently executing job. Reused (reset) when
/// the previous job in the same worker slot completes.
#[derive(Debug)]
pub struct ChildRecipe {
    pub job_id: u8,
    pub target: TargetId,
    /// Index of the next command to run within `target.commands`.
    pub next_command: usize,
    /// Working directory, mutable by an in-proc `cd`. Starts as the
    /// owning scope's directory.
    pub cwd: PathBuf,
}

impl ChildRecipe {
    pub fn new(job_id: u8, target: TargetId, cwd: PathBuf) -> Self {
        Self {
            job_id,
            target,
            next_command: 0,
            cwd,
        }
    }
}

/// Engine-wide policy flags, sourced from CLI flags (`-k`, `-s`, `-n`) plus
/// the worker-count cap.
#[derive(Debug, Clone)]
pub struct EnginePolicy {
    pub max_workers: usize,
    pub keep_going: bool,
    pub silent_command_launching: bool,
    pub dry_run: bool,
}

pub const MAX_WORKERS: usize = 64;

impl EnginePolicy {
    pub fn new(requested_workers: usize, keep_going: bool, silent: bool, dry_run: bool) -> Self {
        Self {
            max_workers: requested_workers.clamp(1, MAX_WORKERS),
            keep_going,
            silent_command_launching: silent,
            dry_run,
        }
    }
}
