//! CLI surface, in the teacher's `#[derive(Parser)] struct Cli` idiom.
//! Flags map 1:1 onto [`crate::engine::EngineOptions`]; `args` carries the
//! trailing `name=value` overrides and target names, split apart in
//! [`Cli::split_args`].

use std::collections::HashMap;
use std::path::PathBuf;

use clap::{ArgAction, Parser};

#[derive(Parser, Debug)]
#[command(name = "ymake")]
#[command(about = "Parallel make engine")]
#[command(version)]
pub struct Cli {
    /// Makefile to read (defaults to `makefile` in the working directory).
    #[arg(short = 'f', long = "file")]
    pub makefile: Option<PathBuf>,

    /// Maximum number of concurrent recipe jobs, clamped to [1, 64].
    /// Defaults to the host's CPU count when omitted.
    #[arg(short = 'j', long = "jobs")]
    pub jobs: Option<usize>,

    /// Keep building independent targets after a failure instead of
    /// stopping at the first one.
    #[arg(short = 'k', long = "keep-going")]
    pub keep_going: bool,

    /// Do not echo recipe commands before running them.
    #[arg(short = 's', long = "silent")]
    pub silent: bool,

    /// Print what would run without executing anything.
    #[arg(short = 'n', long = "dry-run")]
    pub dry_run: bool,

    /// Change to this directory before reading the makefile.
    #[arg(short = 'C', long = "directory")]
    pub directory: Option<PathBuf>,

    /// Raise log verbosity; repeatable.
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all logging below `warn`.
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,

    /// `name=value` overrides and target names, in any order.
    #[arg()]
    pub args: Vec<String>,
}

pub struct ParsedArgs {
    pub overrides: HashMap<String, String>,
    pub targets: Vec<String>,
}

impl Cli {
    /// Resolves `-j`'s worker count: the flag's value if given, otherwise
    /// the host's detected CPU count (falling back to 1 if detection
    /// fails). `EnginePolicy::new` clamps the result to `[1, 64]`.
    pub fn worker_count(&self) -> usize {
        self.jobs.unwrap_or_else(|| {
            std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        })
    }

    /// Splits the trailing positional arguments into `name=value`
    /// overrides (an identifier immediately followed by `=`) and target
    /// names.
    pub fn split_args(&self) -> ParsedArgs {
        let mut overrides = HashMap::new();
        let mut targets = Vec::new();
        for arg in &self.args {
            match arg.split_once('=') {
                Some((name, value)) if is_identifier(name) => {
                    overrides.insert(name.to_string(), value.to_string());
                }
                _ => targets.push(arg.clone()),
            }
        }
        ParsedArgs { overrides, targets }
    }
}

fn is_identifier(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_args_separates_overrides_from_targets() {
        let cli = Cli {
            makefile: None,
            jobs: None,
            keep_going: false,
            silent: false,
            dry_run: false,
            directory: None,
            verbose: 0,
            quiet: false,
            args: vec!["CC=clang".to_string(), "all".to_string(), "OUT=build/".to_string()],
        };
        let parsed = cli.split_args();
        assert_eq!(parsed.targets, vec!["all".to_string()]);
        assert_eq!(parsed.overrides.get("CC"), Some(&"clang".to_string()));
        assert_eq!(parsed.overrides.get("OUT"), Some(&"build/".to_string()));
    }

    #[test]
    fn worker_count_prefers_explicit_flag_over_cpu_count() {
        let mut cli = Cli {
            makefile: None,
            jobs: Some(7),
            keep_going: false,
            silent: false,
            dry_run: false,
            directory: None,
            verbose: 0,
            quiet: false,
            args: vec![],
        };
        assert_eq!(cli.worker_count(), 7);

        cli.jobs = None;
        assert!(cli.worker_count() >= 1, "an unset -j must still resolve to at least one worker");
    }
}
