// Operator tooling: account provisioning happens here, never over the API.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use tipline_crypto::passphrase::generate_passphrase;
use tipline_db::Database;

#[derive(Parser)]
#[command(name = "tipline-admin")]
#[command(about = "Tipline journalist account administration", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a journalist account and print its credentials once
    AddJournalist {
        /// Login name, unique across the instance
        #[arg(short, long)]
        username: String,

        /// Shown to colleagues in reply listings
        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,

        /// Grant admin rights
        #[arg(long)]
        admin: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let db_path: PathBuf = std::env::var("TIPLINE_DB_PATH")
        .unwrap_or_else(|_| "tipline.db".into())
        .into();
    let db = Database::open(&db_path)?;

    match cli.command {
        Commands::AddJournalist {
            username,
            first_name,
            last_name,
            admin,
        } => {
            let passphrase = generate_passphrase();
            let journalist = db.create_journalist(
                &username,
                first_name.as_deref(),
                last_name.as_deref(),
                &passphrase,
                admin,
            )?;

            println!("Created journalist {}", journalist.username);
            println!("  uuid:        {}", journalist.uuid);
            println!("  passphrase:  {passphrase}");
            println!("  totp secret: {}", journalist.otp_secret);
            println!();
            println!("Store the passphrase and TOTP secret now; they are not shown again.");
        }
    }

    Ok(())
}
