//! Export command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use grayframe_backup::BackupKind;
use serde_json::json;

use crate::output::{print_single, print_success, OutputFormat};

use super::CommandContext;

/// Export a backup document.
///
/// Without `--out` the document is printed to stdout.
#[derive(Debug, Args)]
pub struct ExportCommand {
    /// Include the theme.
    #[arg(long)]
    full: bool,

    /// File or directory to write. A directory gets a timestamped file name.
    #[arg(long, short)]
    out: Option<PathBuf>,
}

impl ExportCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let kind = if self.full {
            BackupKind::Full
        } else {
            BackupKind::Core
        };
        let app = ctx.open().await?;

        match self.out {
            Some(out) => {
                let path = app
                    .backup()
                    .export_to_file(kind, &out)
                    .await
                    .with_context(|| format!("Failed to write backup to {}", out.display()))?;
                match ctx.format {
                    OutputFormat::Json => {
                        print_single(&json!({ "kind": kind, "path": path.display().to_string() }))
                    }
                    OutputFormat::Table => {
                        print_success(&format!("Wrote {kind} backup to {}", path.display()))
                    }
                }
            }
            None => {
                let document = app.backup().export(kind)?;
                println!("{}", document.to_pretty_json()?);
            }
        }

        app.close().await;
        Ok(())
    }
}
