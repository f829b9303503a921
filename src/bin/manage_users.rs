//! Administrative CLI for the users table: add, list and delete users.
//!
//! ```text
//! manage-users add --username john_doe --password secret123 --email john@example.com
//! manage-users list
//! manage-users delete --username john_doe
//! ```

use std::io::{self, BufRead, Write};

use anyhow::{bail, Result};
use aws_sdk_dynamodb::config::Region;
use bedrock_auth_proxy::{
    auth::{hash_password, hash_password_argon2},
    logging,
    store::{DynamoUserStore, UserStore},
    user::UserRecord,
};
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "manage-users", about = "Manage users in the auth proxy users table")]
struct Cli {
    /// DynamoDB table holding the user records
    #[arg(long, env = "USERS_TABLE", global = true, default_value = "prod-users-table")]
    table_name: String,

    /// AWS region of the table
    #[arg(long, env = "AWS_REGION", global = true, default_value = "eu-west-3")]
    region: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Add a new user
    Add {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        email: Option<String>,
        /// Store an Argon2id hash instead of the legacy SHA-256 digest
        #[arg(long)]
        argon2: bool,
    },
    /// List all users
    List,
    /// Delete a user
    Delete {
        #[arg(long)]
        username: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_compact();
    let cli = Cli::parse();

    let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(cli.region.clone()))
        .load()
        .await;
    let store = DynamoUserStore::new(aws_sdk_dynamodb::Client::new(&config), cli.table_name);
    info!(table = store.table(), region = %cli.region, "using users table");

    match cli.command {
        Command::Add {
            username,
            password,
            email,
            argon2,
        } => add_user(&store, username.trim(), &password, email, argon2).await,
        Command::List => list_users(&store).await,
        Command::Delete { username, yes } => delete_user(&store, &username, yes).await,
    }
}

async fn add_user(
    store: &dyn UserStore,
    username: &str,
    password: &str,
    email: Option<String>,
    argon2: bool,
) -> Result<()> {
    if username.is_empty() || password.is_empty() {
        bail!("username and password must not be empty");
    }
    let password_hash = if argon2 {
        hash_password_argon2(password)?
    } else {
        hash_password(password)
    };
    let record = UserRecord::new(username, password_hash, email);
    let email = record.email.clone();

    if store.create_user(record).await? {
        println!("User '{username}' created");
        println!("   Email: {}", email.as_deref().unwrap_or("N/A"));
    } else {
        println!("User '{username}' already exists");
    }
    Ok(())
}

async fn list_users(store: &dyn UserStore) -> Result<()> {
    let users = store.list_users().await?;
    if users.is_empty() {
        println!("No users found in the table");
        return Ok(());
    }

    println!("\nFound {} user(s):\n", users.len());
    println!("{:<20} {:<30} {:<25}", "Username", "Email", "Created At");
    println!("{}", "-".repeat(75));
    for user in users {
        println!(
            "{:<20} {:<30} {:<25}",
            user.username,
            user.email.as_deref().unwrap_or("N/A"),
            user.created_at
                .map(|ts| ts.format("%Y-%m-%dT%H:%M:%S").to_string())
                .unwrap_or_else(|| "N/A".to_string())
        );
    }
    Ok(())
}

async fn delete_user(store: &dyn UserStore, username: &str, yes: bool) -> Result<()> {
    if store.get_user(username).await?.is_none() {
        println!("User '{username}' not found");
        return Ok(());
    }
    if !yes && !confirm(&format!("Are you sure you want to delete user '{username}'? (yes/no): "))? {
        println!("Deletion cancelled");
        return Ok(());
    }
    if store.delete_user(username).await? {
        println!("User '{username}' deleted");
    } else {
        println!("User '{username}' not found");
    }
    Ok(())
}

fn confirm(prompt: &str) -> io::Result<bool> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}
