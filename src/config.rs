//! Configuration handling for the database toolkit.
//!
//! Library callers pass an explicit [`AccessOptions`] value to every composed
//! operation; nothing is read from process-wide state. The binary's command
//! line is described by [`Cli`].

use crate::db::IsolationLevel;
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_KEY_FIELD: &str = "Id";
pub const DEFAULT_ORDER_BY: &str = DEFAULT_KEY_FIELD;
pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;

/// Environment variable holding the protection key for the CLI.
pub const KEY_ENV_VAR: &str = "DB_TOOLKIT_KEY";

/// Defaults applied by the composed data access operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessOptions {
    /// Field treated as the entity key (default: "Id")
    pub key_field: String,
    /// Records per chunk for chunked bulk operations (default: 1000)
    pub batch_size: usize,
    /// Page size used when a caller asks for less than one row (default: 10)
    pub page_size: u64,
    /// Isolation level for transaction scopes opened by the toolkit
    pub isolation_level: IsolationLevel,
    /// Per-statement timeout in seconds (default: 30)
    pub command_timeout_secs: u64,
}

impl AccessOptions {
    pub fn with_key_field(mut self, key_field: impl Into<String>) -> Self {
        self.key_field = key_field.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = level;
        self
    }

    pub fn with_command_timeout(mut self, timeout_secs: u64) -> Self {
        self.command_timeout_secs = timeout_secs;
        self
    }

    /// Batch size to use for a call; values below 1 fall back to the configured
    /// size, and a configured size below 1 falls back to [`DEFAULT_BATCH_SIZE`].
    pub fn effective_batch_size(&self, requested: Option<usize>) -> usize {
        match requested {
            Some(n) if n >= 1 => n,
            _ if self.batch_size >= 1 => self.batch_size,
            _ => DEFAULT_BATCH_SIZE,
        }
    }

    /// Get the command timeout as a Duration.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

impl Default for AccessOptions {
    fn default() -> Self {
        Self {
            key_field: DEFAULT_KEY_FIELD.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            page_size: DEFAULT_PAGE_SIZE,
            isolation_level: IsolationLevel::default(),
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
        }
    }
}

/// Command line for the `db-toolkit` binary.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "db-toolkit",
    about = "Protect and unprotect database connection secrets",
    version,
    author
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn", env = "DB_TOOLKIT_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, global = true, env = "DB_TOOLKIT_JSON_LOGS")]
    pub json_logs: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Encrypt a whole connection descriptor
    Encrypt(TransformArgs),
    /// Decrypt a whole connection descriptor
    Decrypt(TransformArgs),
    /// Encrypt only the password fields of a connection descriptor
    EncryptPassword(TransformArgs),
    /// Decrypt only the password fields of a connection descriptor
    DecryptPassword(TransformArgs),
    /// Resolve a (possibly protected) descriptor, connect and print the server version
    Check(CheckArgs),
}

impl Command {
    /// Subcommand name as typed on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Encrypt(_) => "encrypt",
            Self::Decrypt(_) => "decrypt",
            Self::EncryptPassword(_) => "encrypt-password",
            Self::DecryptPassword(_) => "decrypt-password",
            Self::Check(_) => "check",
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct TransformArgs {
    /// Text to transform (connection descriptor or envelope)
    #[arg(value_name = "TEXT")]
    pub text: String,

    /// Protection key (any length; hashed before use)
    #[arg(short, long, env = KEY_ENV_VAR, hide_env_values = true)]
    pub key: String,
}

#[derive(Debug, Clone, Args)]
pub struct CheckArgs {
    /// Connection descriptor, plaintext or protected
    #[arg(value_name = "DESCRIPTOR")]
    pub descriptor: String,

    /// Protection key, required when the descriptor is protected
    #[arg(short, long, env = KEY_ENV_VAR, hide_env_values = true)]
    pub key: Option<String>,

    /// Statement timeout in seconds for the version query
    #[arg(long, default_value_t = DEFAULT_COMMAND_TIMEOUT_SECS)]
    pub timeout: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = AccessOptions::default();
        assert_eq!(options.key_field, "Id");
        assert_eq!(options.batch_size, 1000);
        assert_eq!(options.page_size, 10);
        assert_eq!(options.isolation_level, IsolationLevel::ReadCommitted);
        assert_eq!(options.command_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_effective_batch_size() {
        let options = AccessOptions::default().with_batch_size(50);
        assert_eq!(options.effective_batch_size(Some(7)), 7);
        assert_eq!(options.effective_batch_size(Some(0)), 50);
        assert_eq!(options.effective_batch_size(None), 50);

        let broken = AccessOptions::default().with_batch_size(0);
        assert_eq!(broken.effective_batch_size(None), DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: AccessOptions =
            serde_json::from_str(r#"{"key_field": "code", "isolation_level": "serializable"}"#)
                .unwrap();
        assert_eq!(options.key_field, "code");
        assert_eq!(options.isolation_level, IsolationLevel::Serializable);
        assert_eq!(options.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "db-toolkit",
            "encrypt-password",
            "Password=x;Host=h",
            "--key",
            "k",
        ])
        .unwrap();
        assert_eq!(cli.command.name(), "encrypt-password");
        let Command::EncryptPassword(args) = cli.command else {
            panic!("expected encrypt-password");
        };
        assert_eq!(args.text, "Password=x;Host=h");
        assert_eq!(args.key, "k");
    }

    #[test]
    fn test_cli_check_defaults() {
        let cli = Cli::try_parse_from(["db-toolkit", "check", "sqlite::memory:"]).unwrap();
        let Command::Check(args) = cli.command else {
            panic!("expected check");
        };
        assert_eq!(args.descriptor, "sqlite::memory:");
        assert_eq!(args.timeout, DEFAULT_COMMAND_TIMEOUT_SECS);
        assert_eq!(cli.log_level, "warn");
    }
}
