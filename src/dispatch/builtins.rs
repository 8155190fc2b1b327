//! Registered in-process builtin table: `echo`, `rem`/`:`, `exit`, `set`.
//! `cd` and `if` are classified separately (they mutate dispatcher state
//! or re-classify a remainder command) and are handled in
//! [`super::execute`] and [`super::if_stmt`] respectively.

use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinKind {
    Echo,
    Rem,
    Exit,
    Set,
}

/// Outcome of running one in-proc builtin: its exit code and the bytes it
/// wrote to its stdout destination (captured the same as an external
/// process would be, so the scheduler's output handling does not need a
/// separate code path for builtins).
pub struct BuiltinOutcome {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
}

/// Run `echo`: writes its arguments space-joined, honoring a leading `-n`
/// to suppress the trailing newline (the host-portable spelling of the
/// "no newline" flag, since recipes are written against coreutils-flavored
/// conventions rather than a single native shell).
pub fn run_echo(argv: &[String]) -> BuiltinOutcome {
    let mut args = &argv[1..];
    let mut newline = true;
    if args.first().map(|s| s.as_str()) == Some("-n") {
        newline = false;
        args = &args[1..];
    }
    let mut out = args.join(" ").into_bytes();
    if newline {
        out.push(b'\n');
    }
    BuiltinOutcome { exit_code: 0, stdout: out }
}

/// `rem` / `:` - the comment-as-command idiom. Always succeeds, never
/// produces output.
pub fn run_rem() -> BuiltinOutcome {
    BuiltinOutcome { exit_code: 0, stdout: Vec::new() }
}

/// `exit <code>` - terminates the current recipe (not the engine) with
/// the given code. A missing or non-numeric argument is treated as `0`.
pub fn run_exit(argv: &[String]) -> BuiltinOutcome {
    let code = argv.get(1).and_then(|s| s.parse::<i32>().ok()).unwrap_or(0);
    BuiltinOutcome { exit_code: code, stdout: Vec::new() }
}

/// `set` with no arguments - prints the current scope's variables,
/// `NAME=value` per line, in insertion order.
pub fn run_set(scope_variables: &indexmap::IndexMap<String, (String, crate::ast::VarFlavor)>) -> BuiltinOutcome {
    let mut out = Vec::new();
    for (name, (value, _flavor)) in scope_variables {
        let _ = writeln!(out, "{}={}", name, value);
    }
    BuiltinOutcome { exit_code: 0, stdout: out }
}
