mod cli;
mod commands;
mod config;
mod error;


use clap::Parser;
use tracing_subscriber::EnvFilter;

use brewsync_core::SyncOptions;

use crate::cli::{Cli, Commands};
use crate::commands::common::Context;
use crate::commands::completions::run_completions;
use crate::commands::daemon::run_daemon;
use crate::commands::delete::run_delete;
use crate::commands::diff::run_diff;
use crate::commands::dump::run_dump;
use crate::commands::list::run_list;
use crate::commands::logout::run_logout;
use crate::commands::push::run_push;
use crate::config::{Settings, PASSWORD_ENV};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.debug);

    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let file_config = config::load_layered(cli.config.as_deref())?;
    let settings = Settings::resolve(&cli, file_config, std::env::var(PASSWORD_ENV).ok())?;
    tracing::debug!("Running {} with {:?}", cli.command.name(), settings);

    let context = Context {
        settings,
        options: SyncOptions {
            dry_run: cli.dry_run,
            force: cli.force,
        },
        json: cli.json,
    };

    let result = match &cli.command {
        Commands::List { pattern } => run_list(&context, pattern.as_deref()).await,
        Commands::Dump { pattern } => run_dump(&context, pattern.as_deref()).await,
        Commands::Push { pattern } => run_push(&context, pattern.as_deref()).await,
        Commands::Delete { pattern } => run_delete(&context, pattern).await,
        Commands::Diff { pattern } => run_diff(&context, pattern).await,
        Commands::Daemon { pattern } => run_daemon(&context, pattern.as_deref()).await,
        Commands::Logout => return run_logout(&context).await,
        Commands::Completions { .. } => Ok(()),
    };

    if cli.logout {
        return finish_with_logout(result, run_logout(&context).await);
    }
    result
}

/// The command's own error wins; a failed logout only surfaces when the
/// command itself succeeded.
pub fn finish_with_logout(
    result: Result<(), CliError>,
    logout: Result<(), CliError>,
) -> Result<(), CliError> {
    match (result, logout) {
        (Err(error), Err(logout_error)) => {
            tracing::warn!("Logout after failed command also failed: {}", logout_error);
            Err(error)
        }
        (Ok(()), logout) => logout,
        (result, Ok(())) => result,
    }
}

fn init_tracing(verbose: u8, debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_directive(verbose, debug)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// `-d` wins over any number of `-v`.
pub const fn default_log_directive(verbose: u8, debug: bool) -> &'static str {
    if debug {
        return "debug";
    }
    match verbose {
        0 => "brewsync=warn",
        1 => "brewsync=info",
        _ => "brewsync=debug",
    }
}
