//! Task commands.

use anyhow::Result;
use chrono::{DateTime, NaiveDate};
use clap::{Args, Subcommand};
use grayframe_stores::{NewTask, Task, TaskStatus};
use serde::Serialize;
use tabled::Tabled;

use crate::error::CliError;
use crate::output::{display_ms, print_output, print_single, print_success, OutputFormat};

use super::CommandContext;

/// Manage tasks.
#[derive(Debug, Args)]
pub struct TasksCommand {
    #[command(subcommand)]
    command: TasksSubcommand,
}

#[derive(Debug, Subcommand)]
enum TasksSubcommand {
    /// Create a task.
    Add(AddTaskArgs),

    /// List tasks, most recently updated first.
    List(ListTasksArgs),

    /// Set a task's status.
    Status(StatusArgs),

    /// Delete a task.
    Rm(RemoveTaskArgs),

    /// Delete every task.
    Clear,
}

#[derive(Debug, Args)]
struct AddTaskArgs {
    /// Task title.
    title: String,

    /// Initial status (todo, doing, done).
    #[arg(long)]
    status: Option<String>,

    /// Due date, as YYYY-MM-DD or RFC 3339.
    #[arg(long)]
    due: Option<String>,
}

#[derive(Debug, Args)]
struct ListTasksArgs {
    /// Only show tasks that are not done.
    #[arg(long)]
    open: bool,
}

#[derive(Debug, Args)]
struct StatusArgs {
    /// Task ID.
    id: String,

    /// New status (todo, doing, done).
    status: String,
}

#[derive(Debug, Args)]
struct RemoveTaskArgs {
    /// Task ID.
    id: String,
}

impl TasksCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            TasksSubcommand::Add(args) => add(ctx, args).await,
            TasksSubcommand::List(args) => list(ctx, args).await,
            TasksSubcommand::Status(args) => set_status(ctx, args).await,
            TasksSubcommand::Rm(args) => remove(ctx, args).await,
            TasksSubcommand::Clear => clear(ctx).await,
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
struct TaskRow {
    #[tabled(rename = "ID")]
    id: String,

    #[tabled(rename = "Title")]
    title: String,

    #[tabled(rename = "Status")]
    status: String,

    #[tabled(rename = "Due")]
    due: String,

    #[tabled(rename = "Updated")]
    updated: String,
}

impl From<&Task> for TaskRow {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            status: task.status.to_string(),
            due: task.due_at.map_or_else(|| "-".to_string(), display_ms),
            updated: display_ms(task.updated_at),
        }
    }
}

fn parse_status(raw: &str) -> Result<TaskStatus, CliError> {
    raw.parse().map_err(CliError::InvalidArgument)
}

/// Due date in epoch milliseconds. A bare date means midnight UTC.
fn parse_due(raw: &str) -> Result<i64, CliError> {
    if let Ok(time) = DateTime::parse_from_rfc3339(raw) {
        return Ok(time.timestamp_millis());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|time| time.and_utc().timestamp_millis())
        .ok_or_else(|| CliError::InvalidArgument(format!("bad due date: {raw}")))
}

async fn add(ctx: CommandContext, args: AddTaskArgs) -> Result<()> {
    let status = args.status.as_deref().map(parse_status).transpose()?;
    let due_at = args.due.as_deref().map(parse_due).transpose()?;

    let app = ctx.open().await?;
    let id = app.stores.tasks.create(NewTask {
        title: args.title,
        status,
        due_at,
    });
    app.close().await;

    match ctx.format {
        OutputFormat::Json => print_single(&serde_json::json!({ "id": id })),
        OutputFormat::Table => print_success(&format!("Created task {id}")),
    }
    Ok(())
}

async fn list(ctx: CommandContext, args: ListTasksArgs) -> Result<()> {
    let app = ctx.open().await?;
    let mut tasks = app.stores.tasks.by_updated_desc();
    app.close().await;

    if args.open {
        tasks.retain(|t| t.status != TaskStatus::Done);
    }

    match ctx.format {
        OutputFormat::Json => print_single(&tasks),
        OutputFormat::Table => {
            let rows: Vec<TaskRow> = tasks.iter().map(TaskRow::from).collect();
            print_output(&rows, ctx.format);
        }
    }
    Ok(())
}

async fn set_status(ctx: CommandContext, args: StatusArgs) -> Result<()> {
    let status = parse_status(&args.status)?;

    let app = ctx.open().await?;
    let updated = app.stores.tasks.set_status(&args.id, status);
    app.close().await;

    if !updated {
        return Err(CliError::NotFound(format!("task '{}'", args.id)).into());
    }
    match ctx.format {
        OutputFormat::Json => {
            print_single(&serde_json::json!({ "id": args.id, "status": status }))
        }
        OutputFormat::Table => print_success(&format!("Task {} is now {status}", args.id)),
    }
    Ok(())
}

async fn remove(ctx: CommandContext, args: RemoveTaskArgs) -> Result<()> {
    let app = ctx.open().await?;
    let removed = app.stores.tasks.remove(&args.id);
    app.close().await;

    if !removed {
        return Err(CliError::NotFound(format!("task '{}'", args.id)).into());
    }
    match ctx.format {
        OutputFormat::Json => print_single(&serde_json::json!({ "id": args.id, "deleted": true })),
        OutputFormat::Table => print_success(&format!("Deleted task {}", args.id)),
    }
    Ok(())
}

async fn clear(ctx: CommandContext) -> Result<()> {
    let app = ctx.open().await?;
    let count = app.stores.tasks.count();
    app.stores.tasks.clear();
    app.close().await;

    match ctx.format {
        OutputFormat::Json => print_single(&serde_json::json!({ "deleted": count })),
        OutputFormat::Table => print_success(&format!("Deleted {count} task(s)")),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_due_accepts_date_and_rfc3339() {
        assert_eq!(parse_due("1970-01-02").unwrap(), 86_400_000);
        assert_eq!(parse_due("1970-01-01T00:00:01Z").unwrap(), 1_000);
        assert!(parse_due("next week").is_err());
    }

    #[test]
    fn parse_status_is_strict() {
        assert_eq!(parse_status("done").unwrap(), TaskStatus::Done);
        assert!(parse_status("finished").is_err());
    }
}
