//! Storage maintenance commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use grayframe_storage::UsageEstimate;
use serde::Serialize;

use crate::error::CliError;
use crate::output::{
    display_bytes, display_option, display_time, print_field, print_info, print_single,
    print_success, OutputFormat,
};

use super::CommandContext;

/// Wipe local data or show usage.
#[derive(Debug, Args)]
pub struct StorageCommand {
    #[command(subcommand)]
    command: StorageSubcommand,
}

#[derive(Debug, Subcommand)]
enum StorageSubcommand {
    /// Delete every database, the fallback store and the cache.
    Wipe(WipeArgs),

    /// Show bytes used and the quota.
    Usage,

    /// Show per-module counts.
    Stats,

    /// List persisted keys.
    Keys,
}

#[derive(Debug, Args)]
struct WipeArgs {
    /// Confirm deletion.
    #[arg(long)]
    yes: bool,
}

impl StorageCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            StorageSubcommand::Wipe(args) => wipe(ctx, args).await,
            StorageSubcommand::Usage => usage(ctx).await,
            StorageSubcommand::Stats => stats(ctx).await,
            StorageSubcommand::Keys => keys(ctx).await,
        }
    }
}

async fn wipe(ctx: CommandContext, args: WipeArgs) -> Result<()> {
    if !args.yes {
        return Err(CliError::ConfirmationRequired("wipe all local data").into());
    }

    let app = ctx.open().await?;
    let report = app.wipe().await;

    match ctx.format {
        OutputFormat::Json => print_single(&report),
        OutputFormat::Table => {
            print_success("Local data wiped");
            print_field("databases deleted", &report.databases_deleted.join(", "));
            if !report.databases_failed.is_empty() {
                print_field("databases failed", &report.databases_failed.join(", "));
            }
            if report.used_known_names {
                print_info("Could not list databases, deleted well-known names");
            }
            print_field("fallback cleared", &report.fallback_cleared.to_string());
            print_field("cache entries deleted", &report.cache_entries_deleted.to_string());
        }
    }
    Ok(())
}

async fn usage(ctx: CommandContext) -> Result<()> {
    let app = ctx.open().await?;
    let estimate = app.maintenance().estimate_usage().await;
    app.close().await;

    match ctx.format {
        OutputFormat::Json => print_single(&estimate),
        OutputFormat::Table => match estimate {
            UsageEstimate::Supported { usage, quota } => {
                let percent = if quota == 0 {
                    0.0
                } else {
                    usage as f64 / quota as f64 * 100.0
                };
                print_field(
                    "usage",
                    &format!(
                        "{} of {} ({percent:.1}%)",
                        display_bytes(usage),
                        display_bytes(quota)
                    ),
                );
            }
            UsageEstimate::Unsupported => print_info("Usage estimation is not available"),
        },
    }
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsView {
    notes: grayframe_stores::NotesStats,
    tasks: grayframe_stores::TasksStats,
    degraded: bool,
}

async fn stats(ctx: CommandContext) -> Result<()> {
    let app = ctx.open().await?;
    let view = StatsView {
        notes: app.stores.notes.stats(),
        tasks: app.stores.tasks.stats(),
        degraded: app.store.is_degraded(),
    };
    app.close().await;

    match ctx.format {
        OutputFormat::Json => print_single(&view),
        OutputFormat::Table => {
            print_field("notes", &view.notes.count.to_string());
            print_field(
                "last edited",
                &display_option(view.notes.last_edited.as_ref().map(display_time)),
            );
            print_field(
                "tasks",
                &format!("{} ({} open)", view.tasks.total, view.tasks.open),
            );
            print_field(
                "next due",
                &display_option(view.tasks.next_due.as_ref().map(display_time)),
            );
            if view.degraded {
                print_info("Primary storage unavailable, using the fallback store");
            }
        }
    }
    Ok(())
}

async fn keys(ctx: CommandContext) -> Result<()> {
    let app = ctx.open().await?;
    let keys = app.store.keys().await;
    app.close().await;

    match ctx.format {
        OutputFormat::Json => print_single(&keys),
        OutputFormat::Table => {
            for key in keys {
                println!("{key}");
            }
        }
    }
    Ok(())
}
