//! Profile commands.

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::output::{print_field, print_single, print_success, OutputFormat};

use super::CommandContext;

/// Show or edit the user profile.
#[derive(Debug, Args)]
pub struct ProfileCommand {
    #[command(subcommand)]
    command: ProfileSubcommand,
}

#[derive(Debug, Subcommand)]
enum ProfileSubcommand {
    /// Show the profile.
    Show,

    /// Set the display name.
    SetName(SetNameArgs),

    /// Remove the avatar image.
    ClearAvatar,
}

#[derive(Debug, Args)]
struct SetNameArgs {
    /// New display name.
    name: String,
}

impl ProfileCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let app = ctx.open().await?;
        let user = &app.stores.user;

        match self.command {
            ProfileSubcommand::Show => {
                let profile = user.get();
                match ctx.format {
                    OutputFormat::Json => print_single(&profile),
                    OutputFormat::Table => {
                        print_field("name", &profile.display_name);
                        print_field(
                            "avatar",
                            if profile.avatar_data_url.is_some() { "set" } else { "-" },
                        );
                    }
                }
            }
            ProfileSubcommand::SetName(args) => {
                user.set_name(args.name.as_str());
                match ctx.format {
                    OutputFormat::Json => print_single(&user.get()),
                    OutputFormat::Table => {
                        print_success(&format!("Display name set to '{}'", args.name))
                    }
                }
            }
            ProfileSubcommand::ClearAvatar => {
                user.clear_avatar();
                match ctx.format {
                    OutputFormat::Json => print_single(&user.get()),
                    OutputFormat::Table => print_success("Avatar removed"),
                }
            }
        }

        app.close().await;
        Ok(())
    }
}
