//! Note commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use grayframe_stores::Note;
use serde::Serialize;
use tabled::Tabled;

use crate::error::CliError;
use crate::output::{display_ms, print_output, print_single, print_success, OutputFormat};

use super::CommandContext;

/// Manage notes.
#[derive(Debug, Args)]
pub struct NotesCommand {
    #[command(subcommand)]
    command: NotesSubcommand,
}

#[derive(Debug, Subcommand)]
enum NotesSubcommand {
    /// Create a note.
    Add(AddNoteArgs),

    /// List notes, most recently edited first.
    List,

    /// Delete a note.
    Rm(RemoveNoteArgs),

    /// Delete every note.
    Clear,
}

#[derive(Debug, Args)]
struct AddNoteArgs {
    /// Note title.
    title: String,

    /// Note body.
    #[arg(long, default_value = "")]
    body: String,
}

#[derive(Debug, Args)]
struct RemoveNoteArgs {
    /// Note ID.
    id: String,
}

impl NotesCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            NotesSubcommand::Add(args) => add(ctx, args).await,
            NotesSubcommand::List => list(ctx).await,
            NotesSubcommand::Rm(args) => remove(ctx, args).await,
            NotesSubcommand::Clear => clear(ctx).await,
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
struct NoteRow {
    #[tabled(rename = "ID")]
    id: String,

    #[tabled(rename = "Title")]
    title: String,

    #[tabled(rename = "Updated")]
    updated: String,
}

impl From<&Note> for NoteRow {
    fn from(note: &Note) -> Self {
        Self {
            id: note.id.clone(),
            title: note.title.clone(),
            updated: display_ms(note.updated_at),
        }
    }
}

async fn add(ctx: CommandContext, args: AddNoteArgs) -> Result<()> {
    let app = ctx.open().await?;
    let id = app.stores.notes.create(args.title, args.body);
    app.close().await;

    match ctx.format {
        OutputFormat::Json => print_single(&serde_json::json!({ "id": id })),
        OutputFormat::Table => print_success(&format!("Created note {id}")),
    }
    Ok(())
}

async fn list(ctx: CommandContext) -> Result<()> {
    let app = ctx.open().await?;
    let notes = app.stores.notes.by_updated_desc();
    app.close().await;

    match ctx.format {
        OutputFormat::Json => print_single(&notes),
        OutputFormat::Table => {
            let rows: Vec<NoteRow> = notes.iter().map(NoteRow::from).collect();
            print_output(&rows, ctx.format);
        }
    }
    Ok(())
}

async fn remove(ctx: CommandContext, args: RemoveNoteArgs) -> Result<()> {
    let app = ctx.open().await?;
    let removed = app.stores.notes.remove(&args.id);
    app.close().await;

    if !removed {
        return Err(CliError::NotFound(format!("note '{}'", args.id)).into());
    }
    match ctx.format {
        OutputFormat::Json => print_single(&serde_json::json!({ "id": args.id, "deleted": true })),
        OutputFormat::Table => print_success(&format!("Deleted note {}", args.id)),
    }
    Ok(())
}

async fn clear(ctx: CommandContext) -> Result<()> {
    let app = ctx.open().await?;
    let count = app.stores.notes.count();
    app.stores.notes.clear();
    app.close().await;

    match ctx.format {
        OutputFormat::Json => print_single(&serde_json::json!({ "deleted": count })),
        OutputFormat::Table => print_success(&format!("Deleted {count} note(s)")),
    }
    Ok(())
}
