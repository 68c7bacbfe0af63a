//! SkinProof CLI - database migrations and operator tools.
//!
//! # Usage
//!
//! ```bash
//! # Run admin database migrations
//! sp-cli migrate
//!
//! # Invite a staff member (no inviting admin recorded)
//! sp-cli admin invite -e ops@skinproof.app -r admin -d Operations
//!
//! # List invites, revoke one, check the bootstrap window
//! sp-cli admin invites
//! sp-cli admin revoke --id 12
//! sp-cli admin bootstrap-status
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

use skinproof_core::Role;

mod commands;

#[derive(Parser)]
#[command(name = "sp-cli")]
#[command(author, version, about = "SkinProof admin CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run admin database migrations
    Migrate,
    /// Manage admin invites
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create an invite and print its signup link
    Invite {
        /// Invitee email address
        #[arg(short, long)]
        email: String,

        /// Role granted on signup (`support`, `admin`, `super_admin`)
        #[arg(short, long, default_value = "admin")]
        role: Role,

        /// Department assigned on signup
        #[arg(short, long)]
        department: String,

        /// Days until the invite expires
        #[arg(long)]
        days: Option<i64>,

        /// Number of signups allowed
        #[arg(long)]
        max_uses: Option<i32>,
    },
    /// List all invites, newest first
    Invites,
    /// Deactivate an invite
    Revoke {
        /// Invite ID
        #[arg(long)]
        id: i32,
    },
    /// Show whether the next signup would bootstrap a super admin
    BootstrapStatus,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::admin().await?,
        Commands::Admin { action } => match action {
            AdminAction::Invite {
                email,
                role,
                department,
                days,
                max_uses,
            } => {
                commands::admin::create_invite(email, role, department, days, max_uses).await?;
            }
            AdminAction::Invites => commands::admin::list_invites().await?,
            AdminAction::Revoke { id } => commands::admin::revoke_invite(id).await?,
            AdminAction::BootstrapStatus => commands::admin::bootstrap_status().await?,
        },
    }
    Ok(())
}
