//! db-toolkit - Main entry point.
//!
//! Protects and unprotects connection descriptors, and checks that a
//! descriptor resolves and connects. Results go to stdout, logs to stderr.

use clap::Parser;
use db_toolkit::config::{CheckArgs, Cli, Command};
use db_toolkit::db::ConnectionProvider;
use db_toolkit::error::{DbError, DbResult};
use db_toolkit::protect;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

async fn check(args: &CheckArgs) -> DbResult<String> {
    let provider = ConnectionProvider::new(args.key.clone());
    let mut conn = provider.connection(&args.descriptor)?;
    info!(descriptor = %conn.descriptor().masked(), "Checking connection");

    let limit = Duration::from_secs(args.timeout);
    let version = tokio::time::timeout(limit, conn.server_version())
        .await
        .map_err(|_| DbError::timeout("connection check", args.timeout))??;
    let db_type = conn.db_type();
    conn.close().await?;
    Ok(format!("{} {}", db_type, version))
}

async fn run(command: &Command) -> DbResult<String> {
    match command {
        Command::Encrypt(args) => protect::encrypt(&args.text, &args.key),
        Command::Decrypt(args) => protect::decrypt(&args.text, &args.key),
        Command::EncryptPassword(args) => protect::encrypt_password(&args.text, &args.key),
        Command::DecryptPassword(args) => protect::decrypt_password(&args.text, &args.key),
        Command::Check(args) => check(args).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    debug!(command = cli.command.name(), "Running command");
    match run(&cli.command).await {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            debug!(command = cli.command.name(), error = ?e, "Command failed");
            eprintln!("Error: {}", e);
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            ExitCode::FAILURE
        }
    }
}
