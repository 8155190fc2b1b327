use clap::Parser;

use yori_make::cli::Cli;
use yori_make::engine::{run_engine, EngineOptions};

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let parsed_args = cli.split_args();
    let max_workers = cli.worker_count();
    let options = EngineOptions {
        makefile: cli.makefile.unwrap_or_else(|| "makefile".into()),
        working_dir: cli.directory,
        max_workers,
        keep_going: cli.keep_going,
        silent_command_launching: cli.silent,
        dry_run: cli.dry_run,
        overrides: parsed_args.overrides,
        targets: parsed_args.targets,
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to start async runtime");

    let exit_code = match runtime.block_on(run_engine(options)) {
        Ok(summary) if summary.is_success() => 0,
        Ok(_) => 1,
        Err(err) => {
            log::error!("{err}");
            err.exit_code()
        }
    };
    std::process::exit(exit_code);
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}
