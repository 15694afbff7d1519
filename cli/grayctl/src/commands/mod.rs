//! CLI commands.

mod export;
mod import;
mod notes;
mod profile;
mod storage;
mod tasks;
mod theme;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use grayframe_storage::StorageConfig;

use crate::app::App;
use crate::output::OutputFormat;

/// grayframe CLI - back up, restore and inspect local data.
#[derive(Debug, Parser)]
#[command(name = "gf")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format (table or json).
    #[arg(long, global = true, default_value = "table")]
    format: String,

    /// Directory holding local data.
    #[arg(long, global = true, env = "GRAYFRAME_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Export a backup document.
    Export(export::ExportCommand),

    /// Restore from a backup document.
    Import(import::ImportCommand),

    /// Wipe local data or show usage.
    Storage(storage::StorageCommand),

    /// Manage notes.
    Notes(notes::NotesCommand),

    /// Manage tasks.
    Tasks(tasks::TasksCommand),

    /// Show or edit the user profile.
    Profile(profile::ProfileCommand),

    /// Show, switch or share the theme.
    Theme(theme::ThemeCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        let format = match self.format.as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Table,
        };

        let ctx = CommandContext {
            config: crate::config::load(self.data_dir),
            format,
        };

        match self.command {
            Commands::Export(cmd) => cmd.run(ctx).await,
            Commands::Import(cmd) => cmd.run(ctx).await,
            Commands::Storage(cmd) => cmd.run(ctx).await,
            Commands::Notes(cmd) => cmd.run(ctx).await,
            Commands::Tasks(cmd) => cmd.run(ctx).await,
            Commands::Profile(cmd) => cmd.run(ctx).await,
            Commands::Theme(cmd) => cmd.run(ctx).await,
            Commands::Version => {
                println!("gf {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub config: StorageConfig,
    pub format: OutputFormat,
}

impl CommandContext {
    /// Open and hydrate local data.
    pub async fn open(&self) -> Result<App> {
        App::open(self.config.clone()).await
    }
}
