//! User administration CLI: register portal accounts and inspect sync state.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use maimai_stats_server::crypto::CredentialCipher;
use maimai_stats_server::user_store::{SqliteUserStore, User, UserStore};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser, Debug)]
struct CliArgs {
    /// Directory containing database files (user.db).
    #[clap(long)]
    pub db_dir: PathBuf,

    /// Base64-encoded 32-byte credential key. Falls back to SECRET_KEY.
    #[clap(long)]
    pub key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a user with their portal credentials.
    Add {
        name: String,
        sega_id: String,
        password: String,
    },
    /// Replace the stored credentials of an existing user.
    UpdateCredentials {
        name: String,
        sega_id: String,
        password: String,
    },
    /// List registered users and their sync state.
    List,
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    let key = cli_args
        .key
        .or_else(|| std::env::var("SECRET_KEY").ok())
        .context("credential key must be given via --key or SECRET_KEY")?;
    let cipher = CredentialCipher::from_base64_key(&key)?;

    let store = SqliteUserStore::new(cli_args.db_dir.join("user.db"))?;

    match cli_args.command {
        Command::Add {
            name,
            sega_id,
            password,
        } => {
            if store.get_user_by_name(&name)?.is_some() {
                bail!("User '{}' already exists", name);
            }
            let user = User {
                id: Uuid::new_v4(),
                name: name.clone(),
                encrypted_sega_id: cipher.encrypt(&sega_id)?,
                encrypted_password: cipher.encrypt(&password)?,
                profile_image_url: None,
                last_played_at: None,
                last_scraped_at: None,
                created_at: Utc::now(),
            };
            store.create_user(&user)?;
            println!("Created user '{}' ({})", name, user.id);
        }
        Command::UpdateCredentials {
            name,
            sega_id,
            password,
        } => {
            let mut user = store
                .get_user_by_name(&name)?
                .with_context(|| format!("No user named '{}'", name))?;
            user.encrypted_sega_id = cipher.encrypt(&sega_id)?;
            user.encrypted_password = cipher.encrypt(&password)?;
            store.update_user_credentials(&user)?;
            println!("Updated credentials for '{}'", name);
        }
        Command::List => {
            let users = store.get_all_users()?;
            if users.is_empty() {
                println!("No users registered.");
            }
            for user in users {
                println!(
                    "{}  {}  last played: {}  last scraped: {}",
                    user.id,
                    user.name,
                    user.last_played_at
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "never".to_string()),
                    user.last_scraped_at
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "never".to_string()),
                );
            }
        }
    }
    Ok(())
}
