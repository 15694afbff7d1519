//! Error handling and display for the CLI.

use colored::Colorize;
use grayframe_backup::BackupError;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Refusing to {0} without --yes")]
    ConfirmationRequired(&'static str),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {}", "Error:".red().bold(), err);

    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        match cli_err {
            CliError::ConfirmationRequired(_) => {
                eprintln!(
                    "\n{}",
                    "Hint: This deletes all local data. Export a backup first with `gf export --full --out .`."
                        .yellow()
                );
            }
            CliError::NotFound(_) => {
                eprintln!("\n{}", "Hint: List ids with `gf notes list` or `gf tasks list`.".yellow());
            }
            CliError::InvalidArgument(_) => {}
        }
    }

    if let Some(backup_err) = err.downcast_ref::<BackupError>() {
        match backup_err {
            BackupError::InvalidJson(_)
            | BackupError::NotAnObject
            | BackupError::MissingKind
            | BackupError::UnknownKind(_) => {
                eprintln!(
                    "\n{}",
                    "Hint: The file is not a grayframe backup. Nothing was changed.".yellow()
                );
            }
            BackupError::Io(_) => {
                eprintln!("\n{}", "Hint: Check that the path exists and is readable.".yellow());
            }
            _ => {}
        }
    }
}
