//! User command - create, inspect, update and delete user records

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;

use super::{get_context, log_event};
use crate::output;
use userbase_core::services::LogEvent;
use userbase_core::{EntryPoint, OperationResult, User, UserPatch};

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create a user
    Create {
        name: String,
        email: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all users
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one user
    Get {
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change a user's name or email
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a user
    Delete {
        id: i64,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
        /// Output as JSON (implies --force)
        #[arg(long)]
        json: bool,
    },
}

fn print_user(user: &User, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(user)?);
        return Ok(());
    }

    let mut table = output::create_table();
    table.add_row(vec!["ID", &user.id.to_string()]);
    table.add_row(vec!["Name", &user.name]);
    table.add_row(vec!["Email", &user.email]);
    table.add_row(vec!["Created", &output::format_time(&user.created)]);
    println!("{}", table);
    Ok(())
}

pub fn run(command: UserCommands) -> Result<()> {
    let ctx = get_context(EntryPoint::Cli)?;
    let logger = ctx.logging_service.as_deref();
    let users = &ctx.user_service;

    match command {
        UserCommands::Create { name, email, json } => {
            log_event(logger, LogEvent::new("command").with_command("user create"));
            let user = users.create_user(&name, &email)?;
            if !json {
                output::success(&format!("Created user {}", user.id));
            }
            print_user(&user, json)?;
        }
        UserCommands::List { json } => {
            let list = users.list_users()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&list)?);
                return Ok(());
            }
            if list.is_empty() {
                println!("No users found.");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["ID", "Name", "Email", "Created"]);
            for user in &list {
                table.add_row(vec![
                    user.id.to_string(),
                    user.name.clone(),
                    user.email.clone(),
                    output::format_time(&user.created),
                ]);
            }
            println!("{}", table);
            println!("{}", format!("{} user(s)", list.len()).dimmed());
        }
        UserCommands::Get { id, json } => {
            let user = users.get_user(id)?;
            print_user(&user, json)?;
        }
        UserCommands::Update { id, name, email, json } => {
            let patch = UserPatch { name, email };
            if patch.is_empty() {
                output::warning("Nothing to update; pass --name and/or --email");
                return Ok(());
            }
            log_event(logger, LogEvent::new("command").with_command("user update"));
            let user = users.update_user(id, &patch)?;
            if !json {
                output::success(&format!("Updated user {}", user.id));
            }
            print_user(&user, json)?;
        }
        UserCommands::Delete { id, json, .. } if json => {
            log_event(logger, LogEvent::new("command").with_command("user delete"));
            let result = OperationResult::from(users.delete_user(id).map(|()| id));
            println!("{}", serde_json::to_string_pretty(&result)?);
            if let Some(error) = result.error {
                anyhow::bail!(error);
            }
        }
        UserCommands::Delete { id, force, .. } => {
            let user = users.get_user(id)?;

            if !force {
                println!("\n{}", format!("This will delete {}.", user.full_name()).yellow());
                if !Confirm::new()
                    .with_prompt("Are you sure?")
                    .default(false)
                    .interact()?
                {
                    println!("{}\n", "Cancelled".dimmed());
                    return Ok(());
                }
            }

            log_event(logger, LogEvent::new("command").with_command("user delete"));
            users.delete_user(id)?;
            println!("{} User {} deleted", "✓".green(), id);
        }
    }

    Ok(())
}
