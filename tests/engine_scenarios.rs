//! End-to-end scenarios against real temporary directories and real child
//! processes (`/bin/sh`, `true`/`false`/`touch`/`mkdir` from `$PATH`),
//! exercising the whole pipeline: parse -> graph -> plan -> dispatch ->
//! scheduler.

use std::collections::HashMap;
use std::path::Path;

use yori_make::engine::{run_engine, EngineOptions};

fn options(dir: &Path, targets: Vec<&str>, max_workers: usize, keep_going: bool) -> EngineOptions {
    EngineOptions {
        makefile: "Makefile".into(),
        working_dir: Some(dir.to_path_buf()),
        max_workers,
        keep_going,
        silent_command_launching: true,
        dry_run: false,
        overrides: HashMap::new(),
        targets: targets.into_iter().map(str::to_string).collect(),
    }
}

fn write_makefile(dir: &Path, content: &str) {
    std::fs::write(dir.join("Makefile"), content).unwrap();
}

fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn diamond_graph_respects_dependency_order() {
    let dir = tempfile::tempdir().unwrap();
    write_makefile(
        dir.path(),
        "\
.PHONY : root b c leaf

root : b c
\t+printf 'ROOT\\n' >> log.txt

b : leaf
\t+printf 'B\\n' >> log.txt

c : leaf
\t+printf 'C\\n' >> log.txt

leaf :
\t+printf 'LEAF\\n' >> log.txt
",
    );

    let summary = run_engine(options(dir.path(), vec!["root"], 2, false)).await.unwrap();
    assert!(summary.is_success());
    assert_eq!(summary.succeeded.len(), 4);

    let lines = read_lines(&dir.path().join("log.txt"));
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "LEAF");
    assert_eq!(lines[3], "ROOT");
    let middle: std::collections::HashSet<&String> = lines[1..3].iter().collect();
    assert_eq!(middle, ["B".to_string(), "C".to_string()].iter().collect());
}

#[tokio::test]
async fn ignore_errors_modifier_lets_recipe_continue() {
    let dir = tempfile::tempdir().unwrap();
    write_makefile(
        dir.path(),
        "\
.PHONY : all

all :
\t-false
\t+printf 'ok\\n' >> log.txt
",
    );

    let summary = run_engine(options(dir.path(), vec!["all"], 1, false)).await.unwrap();
    assert!(summary.is_success(), "a `-`-marked failure must not fail the recipe");
    assert_eq!(read_lines(&dir.path().join("log.txt")), vec!["ok".to_string()]);
}

#[tokio::test]
async fn fatal_failure_without_keep_going_leaves_sibling_unstarted() {
    let dir = tempfile::tempdir().unwrap();
    write_makefile(
        dir.path(),
        "\
.PHONY : first second

first :
\tfalse

second :
\tfalse
",
    );

    // A single worker slot: `first` is dispatched, fails, and (without
    // `-k`) the run halts before `second` is ever pulled off the ready
    // queue.
    let summary = run_engine(options(dir.path(), vec!["first", "second"], 1, false))
        .await
        .unwrap();
    assert!(!summary.is_success());
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.never_started.len(), 1);
}

#[tokio::test]
async fn in_proc_if_exist_gates_the_remainder() {
    let dir = tempfile::tempdir().unwrap();
    write_makefile(
        dir.path(),
        "\
.PHONY : probe_absent probe_present

probe_absent :
\tif exist definitely-missing-xyz.txt exit 7

probe_present :
\ttouch present.txt
\tif exist present.txt exit 7
",
    );

    let summary = run_engine(options(dir.path(), vec!["probe_absent"], 1, false))
        .await
        .unwrap();
    assert!(summary.is_success(), "exist-check on a missing file must skip the remainder");

    let summary = run_engine(options(dir.path(), vec!["probe_present"], 1, false))
        .await
        .unwrap();
    assert!(!summary.is_success(), "exist-check on a present file must run the remainder and fail");
}

#[tokio::test]
async fn cd_is_local_to_the_recipe_not_the_process() {
    let dir = tempfile::tempdir().unwrap();
    write_makefile(
        dir.path(),
        "\
.PHONY : cd_test

cd_test :
\tmkdir sub
\tcd sub
\ttouch marker.txt
",
    );

    let process_cwd_before = std::env::current_dir().unwrap();
    let summary = run_engine(options(dir.path(), vec!["cd_test"], 1, false)).await.unwrap();
    assert!(summary.is_success());

    assert!(dir.path().join("sub/marker.txt").exists(), "cd must affect later commands in the same recipe");
    assert_eq!(
        std::env::current_dir().unwrap(),
        process_cwd_before,
        "a recipe's cd must never change the engine process's own working directory"
    );
}

#[tokio::test]
async fn concurrent_jobs_get_isolated_temp_directories() {
    let dir = tempfile::tempdir().unwrap();
    write_makefile(
        dir.path(),
        "\
.PHONY : all t1 t2 t3 t4

all : t1 t2 t3 t4

t1 :
\t+test -d \"$TEMP\" && touch \"$TEMP/marker\"

t2 :
\t+test -d \"$TEMP\" && touch \"$TEMP/marker\"

t3 :
\t+test -d \"$TEMP\" && touch \"$TEMP/marker\"

t4 :
\t+test -d \"$TEMP\" && touch \"$TEMP/marker\"
",
    );

    let summary = run_engine(options(dir.path(), vec!["all"], 4, false)).await.unwrap();
    assert!(summary.is_success(), "independent jobs must each see their own private $TEMP with no collisions");
    assert_eq!(summary.succeeded.len(), 5);
}
