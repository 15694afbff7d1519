//! Import command.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use grayframe_backup::ImportMode;

use crate::output::{print_field, print_info, print_single, print_success, OutputFormat};

use super::CommandContext;

/// Restore from a backup document.
#[derive(Debug, Args)]
pub struct ImportCommand {
    /// Backup file to read.
    path: PathBuf,

    /// Also restore the theme from a full backup.
    #[arg(long)]
    full: bool,
}

impl ImportCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let mode = if self.full {
            ImportMode::Full
        } else {
            ImportMode::Core
        };
        let app = ctx.open().await?;

        let report = app.backup().import_file(&self.path, mode).await;
        // Persist whatever was applied before reporting.
        app.close().await;
        let report = report?;

        match ctx.format {
            OutputFormat::Json => print_single(&report),
            OutputFormat::Table => {
                print_success(&format!("Imported {}", self.path.display()));
                print_field("kind", report.kind.as_str());
                if report.legacy {
                    print_info("Legacy backup format, imported as core");
                }
                if let Some(version) = &report.version {
                    print_field("version", version);
                }
                print_field("profile", if report.user_applied { "restored" } else { "unchanged" });
                print_field("module toggles", &report.settings_applied.to_string());
                print_field("notes", &count_or_unchanged(report.notes_imported));
                print_field("tasks", &count_or_unchanged(report.tasks_imported));
                print_field("theme", if report.theme_applied { "restored" } else { "unchanged" });
                if report.skipped_fields > 0 {
                    print_info(&format!(
                        "{} field(s) had an unexpected shape and were skipped",
                        report.skipped_fields
                    ));
                }
            }
        }
        Ok(())
    }
}

fn count_or_unchanged(count: Option<usize>) -> String {
    count.map_or_else(|| "unchanged".to_string(), |n| n.to_string())
}
