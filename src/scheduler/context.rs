//! Engine Context: process-wide scheduler state with explicit init and
//! teardown, per the distilled spec's §3 Engine Context entry.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::ast::EnginePolicy;
use crate::graph::TargetGraph;
use crate::parser::ScopeArena;

use super::jobs::{JobIdAllocator, TempDirs};

pub struct EngineContext {
    pub graph: TargetGraph,
    pub scopes: ScopeArena,
    pub policy: EnginePolicy,
    pub jobs: JobIdAllocator,
    pub temp_dirs: TempDirs,
    /// Command-line `name=value` overrides, highest-precedence variable
    /// source.
    pub overrides: HashMap<String, String>,
    pub env: HashMap<String, String>,
    /// Set by an operator interrupt (Ctrl-C). The scheduler stops pumping
    /// new ready work once this flips but still drains jobs already
    /// running, per §5's no-preemptive-cancellation rule.
    pub interrupted: Arc<AtomicBool>,
}

impl EngineContext {
    pub fn new(
        graph: TargetGraph,
        scopes: ScopeArena,
        policy: EnginePolicy,
        parent_temp: PathBuf,
        overrides: HashMap<String, String>,
        env: HashMap<String, String>,
    ) -> Self {
        Self {
            graph,
            scopes,
            policy,
            jobs: JobIdAllocator::new(),
            temp_dirs: TempDirs::new(parent_temp),
            overrides,
            env,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A clonable handle a signal listener can flip to request drain.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupted.clone()
    }
}
