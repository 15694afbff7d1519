//! Theme commands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use grayframe_backup::{parse_theme, serialize_theme, ThemeExport};
use grayframe_stores::{ThemeMode, ThemeState};

use crate::error::CliError;
use crate::output::{print_field, print_single, print_success, OutputFormat};

use super::CommandContext;

/// Show, switch or share the theme.
#[derive(Debug, Args)]
pub struct ThemeCommand {
    #[command(subcommand)]
    command: ThemeSubcommand,
}

#[derive(Debug, Subcommand)]
enum ThemeSubcommand {
    /// Show the mode and every color.
    Show,

    /// Switch between light and dark.
    Mode(ModeArgs),

    /// Set one color variable.
    Set(SetVarArgs),

    /// Restore the stock palette.
    Reset,

    /// Print the theme as shareable JSON.
    Export(ExportThemeArgs),

    /// Load a theme shared as JSON.
    Import(ImportThemeArgs),
}

#[derive(Debug, Args)]
struct ModeArgs {
    /// light or dark.
    mode: String,
}

#[derive(Debug, Args)]
struct SetVarArgs {
    /// Variable name, e.g. accent.
    key: String,

    /// CSS color.
    value: String,
}

#[derive(Debug, Args)]
struct ExportThemeArgs {
    /// Name stored with the theme.
    #[arg(long)]
    name: Option<String>,
}

#[derive(Debug, Args)]
struct ImportThemeArgs {
    /// Theme JSON file.
    path: PathBuf,
}

impl ThemeCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        // Validate input before touching local data.
        let mode = match &self.command {
            ThemeSubcommand::Mode(args) => Some(parse_mode(&args.mode)?),
            _ => None,
        };
        let imported = match &self.command {
            ThemeSubcommand::Import(args) => {
                let json = tokio::fs::read_to_string(&args.path)
                    .await
                    .with_context(|| format!("Failed to read {}", args.path.display()))?;
                let shared = parse_theme(&json)?;
                Some(theme_state(parse_mode(&shared.mode)?, Some(shared)))
            }
            _ => None,
        };

        let app = ctx.open().await?;
        let theme = &app.stores.theme;

        match self.command {
            ThemeSubcommand::Show => {
                let state = theme.get();
                match ctx.format {
                    OutputFormat::Json => print_single(&state),
                    OutputFormat::Table => {
                        print_field("mode", state.mode.as_str());
                        for (key, value) in &state.vars {
                            print_field(key, value);
                        }
                    }
                }
            }
            ThemeSubcommand::Mode(_) => {
                if let Some(mode) = mode {
                    theme.set_mode(mode);
                    match ctx.format {
                        OutputFormat::Json => print_single(&theme.get()),
                        OutputFormat::Table => {
                            print_success(&format!("Theme mode set to {}", mode.as_str()))
                        }
                    }
                }
            }
            ThemeSubcommand::Set(args) => {
                theme.set_var(&args.key, args.value.as_str());
                match ctx.format {
                    OutputFormat::Json => print_single(&theme.get()),
                    OutputFormat::Table => {
                        print_success(&format!("Set {} to {}", args.key, args.value))
                    }
                }
            }
            ThemeSubcommand::Reset => {
                theme.reset(None);
                match ctx.format {
                    OutputFormat::Json => print_single(&theme.get()),
                    OutputFormat::Table => print_success("Theme reset"),
                }
            }
            ThemeSubcommand::Export(args) => {
                let state = theme.get();
                let shared = ThemeExport {
                    name: args.name,
                    mode: state.mode.as_str().to_string(),
                    vars: state.vars,
                };
                println!("{}", serialize_theme(&shared)?);
            }
            ThemeSubcommand::Import(args) => {
                if let Some(state) = imported {
                    theme.import_theme(state);
                    match ctx.format {
                        OutputFormat::Json => print_single(&theme.get()),
                        OutputFormat::Table => {
                            print_success(&format!("Imported theme from {}", args.path.display()))
                        }
                    }
                }
            }
        }

        app.close().await;
        Ok(())
    }
}

fn parse_mode(raw: &str) -> Result<ThemeMode, CliError> {
    ThemeMode::parse(raw)
        .ok_or_else(|| CliError::InvalidArgument(format!("theme mode must be light or dark, got '{raw}'")))
}

/// Stock palette for `mode`, overlaid with a shared theme's colors.
fn theme_state(mode: ThemeMode, shared: Option<ThemeExport>) -> ThemeState {
    let mut state = ThemeState::defaults(mode);
    if let Some(shared) = shared {
        state.vars.extend(shared.vars);
    }
    state
}
