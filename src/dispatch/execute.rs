//! Drives one `CommandToExecute` to completion: re-classifies, evaluates
//! in-proc builtins, or spawns a child process, honoring redirection
//! descriptors. `cd` mutates the caller's working directory in place;
//! `if` re-classifies its remainder, bounded to 8 iterations per the
//! distilled spec's re-entrant-if design note (§9).

use std::path::PathBuf;
use std::process::Stdio;

use indexmap::IndexMap;
use std::collections::HashMap;

use crate::ast::VarFlavor;
use crate::error::{EngineError, Result, SourceLocation};

use super::argv::{parse_command, RedirectTarget};
use super::builtins::{run_echo, run_exit, run_rem, run_set, BuiltinKind};
use super::classify::{classify, Classification};
use super::if_stmt::{evaluate, parse_if};

const MAX_IF_CHAIN: usize = 8;

/// Exit status plus captured output of one executed command.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub exit_code: i32,
    /// stdout+stderr bytes, interleaved in arrival order, when both streams
    /// used the engine's default buffered redirection; empty when a stream
    /// was redirected to a file, inherited, or discarded.
    pub output: Vec<u8>,
}

impl ExecutionOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run `command.text`, mutating `cwd` in place if it turns out to be (or
/// chain into) a `cd`. `scope_variables` backs the bare `set` builtin.
pub async fn dispatch(
    text: &str,
    cwd: &mut PathBuf,
    env: &HashMap<String, String>,
    scope_variables: &IndexMap<String, (String, VarFlavor)>,
    force_subshell: bool,
) -> Result<ExecutionOutcome> {
    let mut current = text.to_string();
    for _ in 0..MAX_IF_CHAIN {
        let parsed = parse_command(&current);
        if parsed.stages.is_empty() || parsed.stages[0].argv.is_empty() {
            return Ok(ExecutionOutcome { exit_code: 0, output: Vec::new() });
        }
        match classify(&parsed, force_subshell) {
            Classification::Cd => {
                let argv = &parsed.stages[0].argv;
                let target = argv.get(1).cloned().unwrap_or_default();
                *cwd = cwd.join(&target);
                return Ok(ExecutionOutcome { exit_code: 0, output: Vec::new() });
            }
            Classification::If => {
                let argv = parsed.stages[0].argv.clone();
                let Some(stmt) = parse_if(&argv) else {
                    return Err(EngineError::ParseError {
                        message: format!("unrecognized if-condition: {}", current),
                        location: SourceLocation::default(),
                    });
                };
                if evaluate(&stmt.condition, cwd) {
                    current = stmt.remainder.join(" ");
                    continue;
                }
                return Ok(ExecutionOutcome { exit_code: 0, output: Vec::new() });
            }
            Classification::Builtin(kind) => {
                let argv = parsed.stages[0].argv.clone();
                let out = match kind {
                    BuiltinKind::Echo => run_echo(&argv),
                    BuiltinKind::Rem => run_rem(),
                    BuiltinKind::Exit => run_exit(&argv),
                    BuiltinKind::Set => run_set(scope_variables),
                };
                return Ok(ExecutionOutcome { exit_code: out.exit_code, output: out.stdout });
            }
            Classification::DelegateSubshell => {
                return spawn_subshell(&current, cwd, env).await;
            }
            Classification::External => {
                let argv = parsed.stages[0].argv.clone();
                let redirection = parsed.stages[0].redirection.clone();
                return spawn_external(&argv, &redirection, cwd, env).await;
            }
        }
    }
    Err(EngineError::VariableExpansionTooDeep {
        location: SourceLocation::default(),
        limit: MAX_IF_CHAIN,
    })
}

/// Delegate `text` verbatim to the host shell: used for multi-stage
/// pipelines, the closed delegate-verb table, and the `+` sigil.
async fn spawn_subshell(text: &str, cwd: &PathBuf, env: &HashMap<String, String>) -> Result<ExecutionOutcome> {
    let shell_program = if cfg!(windows) { "cmd" } else { "/bin/sh" };
    let shell_flag = if cfg!(windows) { "/C" } else { "-c" };
    let mut command = tokio::process::Command::new(shell_program);
    command.arg(shell_flag).arg(text).current_dir(cwd).envs(env);
    command.stdout(Stdio::piped()).stderr(Stdio::piped());
    run_and_capture(command, text).await
}

async fn spawn_external(
    argv: &[String],
    redirection: &super::argv::StageRedirection,
    cwd: &PathBuf,
    env: &HashMap<String, String>,
) -> Result<ExecutionOutcome> {
    let mut command = tokio::process::Command::new(&argv[0]);
    command.args(&argv[1..]).current_dir(cwd).envs(env);
    command.stdin(stdio_for(&redirection.stdin, true)?);

    let both_default_buffer =
        redirection.stdout == RedirectTarget::Default && redirection.stderr == RedirectTarget::Default;
    if both_default_buffer {
        command.stdout(Stdio::piped()).stderr(Stdio::piped());
        return run_and_capture(command, &argv.join(" ")).await;
    }

    command.stdout(stdio_for(&redirection.stdout, false)?);
    command.stderr(stdio_for(&redirection.stderr, false)?);
    let status = command
        .status()
        .await
        .map_err(|source| EngineError::SpawnFailure { command: argv.join(" "), source })?;
    Ok(ExecutionOutcome { exit_code: status.code().unwrap_or(1), output: Vec::new() })
}

fn stdio_for(target: &RedirectTarget, is_stdin: bool) -> Result<Stdio> {
    Ok(match target {
        RedirectTarget::Default => {
            if is_stdin {
                Stdio::null()
            } else {
                Stdio::piped()
            }
        }
        RedirectTarget::Inherit => Stdio::inherit(),
        RedirectTarget::Null => Stdio::null(),
        RedirectTarget::File { path, append } => {
            let file = if is_stdin {
                std::fs::File::open(path)
            } else if *append {
                std::fs::OpenOptions::new().create(true).append(true).open(path)
            } else {
                std::fs::File::create(path)
            }
            .map_err(|source| EngineError::IoError {
                operation: format!("open redirection target {}", path.display()),
                source,
            })?;
            Stdio::from(file)
        }
    })
}

/// Spawns `command` and drains its stdout/stderr pipes concurrently into a
/// shared buffer as bytes arrive, so interleaved writes from the child stay
/// interleaved in `ExecutionOutcome::output` instead of being coalesced as
/// "all stdout, then all stderr" by a sequential `Command::output()` call.
async fn run_and_capture(mut command: tokio::process::Command, display: &str) -> Result<ExecutionOutcome> {
    let mut child = command
        .spawn()
        .map_err(|source| EngineError::SpawnFailure { command: display.to_string(), source })?;
    let stdout = child.stdout.take().expect("stdout piped by caller");
    let stderr = child.stderr.take().expect("stderr piped by caller");

    let buffer = std::sync::Arc::new(tokio::sync::Mutex::new(Vec::new()));
    let drain_stdout = tokio::spawn(drain_into(stdout, buffer.clone()));
    let drain_stderr = tokio::spawn(drain_into(stderr, buffer.clone()));

    let status = child
        .wait()
        .await
        .map_err(|source| EngineError::SpawnFailure { command: display.to_string(), source })?;
    let _ = drain_stdout.await;
    let _ = drain_stderr.await;

    let output = std::sync::Arc::try_unwrap(buffer)
        .expect("both drain tasks joined, no other buffer owners remain")
        .into_inner();
    Ok(ExecutionOutcome {
        exit_code: status.code().unwrap_or(1),
        output,
    })
}

/// Reads `pipe` to EOF, appending each chunk to `buffer` as it arrives so
/// concurrent readers of stdout and stderr interleave by arrival order
/// rather than stream.
async fn drain_into<R>(mut pipe: R, buffer: std::sync::Arc<tokio::sync::Mutex<Vec<u8>>>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    use tokio::io::AsyncReadExt;
    let mut chunk = [0u8; 4096];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buffer.lock().await.extend_from_slice(&chunk[..n]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cd_mutates_cwd_without_touching_process_cwd() {
        let mut cwd = PathBuf::from("/tmp");
        let env = HashMap::new();
        let vars = IndexMap::new();
        let outcome = dispatch("cd sub", &mut cwd, &env, &vars, false).await.unwrap();
        assert!(outcome.success());
        assert_eq!(cwd, PathBuf::from("/tmp/sub"));
    }

    #[tokio::test]
    async fn echo_builtin_captures_stdout() {
        let mut cwd = PathBuf::from(".");
        let env = HashMap::new();
        let vars = IndexMap::new();
        let outcome = dispatch("echo hello", &mut cwd, &env, &vars, false).await.unwrap();
        assert_eq!(outcome.output, b"hello\n");
    }

    #[tokio::test]
    async fn if_false_skips_remainder_and_succeeds() {
        let mut cwd = PathBuf::from(".");
        let env = HashMap::new();
        let vars = IndexMap::new();
        let outcome = dispatch("if exist definitely-missing.txt exit 1", &mut cwd, &env, &vars, false)
            .await
            .unwrap();
        assert!(outcome.success());
    }

    #[tokio::test]
    async fn external_command_runs_and_reports_exit_code() {
        let mut cwd = PathBuf::from(".");
        let env = HashMap::new();
        let vars = IndexMap::new();
        let outcome = dispatch("true", &mut cwd, &env, &vars, false).await.unwrap();
        assert!(outcome.success());
    }

    #[tokio::test]
    async fn ignore_errors_is_left_to_the_caller() {
        // dispatch() reports the raw exit code; honoring `-` (ignore
        // failure) is the scheduler's job once it has both the modifier
        // and the outcome, so a failing command here just reports failure.
        let mut cwd = PathBuf::from(".");
        let env = HashMap::new();
        let vars = IndexMap::new();
        let outcome = dispatch("false", &mut cwd, &env, &vars, false).await.unwrap();
        assert!(!outcome.success());
    }
}
