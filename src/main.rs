use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use lifelock::cli;
use lifelock::cli::commands::{Cli, Commands};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lifelock=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli_args = Cli::parse();
    init_tracing();
    let json_output = cli_args.json;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let exit_code = runtime.block_on(async {
        match cli_args.command {
            Commands::Init => cli::init::run(json_output),
            Commands::Task(cmd) => cli::task::run(cmd, json_output).await,
            Commands::Recover => cli::recover::run_recover(json_output).await,
            Commands::Backup => cli::recover::run_backup(json_output).await,
            Commands::Record(cmd) => cli::record::run(cmd, json_output).await,
            Commands::Sync(cmd) => cli::sync::run(cmd, json_output).await,
            Commands::Stats(cmd) => cli::stats::run(cmd, json_output),
            Commands::Watch => cli::watch::run(json_output).await,
        }
    });

    // Drop pending timers before exiting.
    drop(runtime);
    process::exit(exit_code);
}
