//! # EasyServe CLI (`easyserve`)
//!
//! Command-line front end for the support pipeline. Every command reads a
//! TOML config (`--config`, default `./config/easyserve.toml`) and prints
//! its result as JSON on stdout; logs go to stderr.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `easyserve init` | Create the SQLite database and run schema migrations |
//! | `easyserve upload <file> --tenant <id>` | Register a document and ingest it |
//! | `easyserve reingest <id> <file>` | Re-run ingestion for an existing document |
//! | `easyserve status <id>` | Show a document's ingestion status |
//! | `easyserve delete <id>` | Delete a document and its vector records |
//! | `easyserve ask "<question>" --tenant <id>` | Answer from the tenant's knowledge base |
//! | `easyserve triage "<message>" --tenant <id> --email <addr>` | Classify a message and open a ticket |

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;

use easyserve::config;
use easyserve::logging;
use easyserve::service::SupportService;
use easyserve::{db, migrate};
use easyserve_core::models::ContactFields;

/// EasyServe: document ingestion, knowledge-base answers, and ticket triage
/// for customer support.
#[derive(Parser)]
#[command(name = "easyserve", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/easyserve.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Register a file for a tenant and ingest it.
    Upload {
        file: PathBuf,
        #[arg(long)]
        tenant: i64,
        /// MIME type; inferred from the extension when omitted.
        #[arg(long)]
        mime: Option<String>,
        /// Register only; skip ingestion.
        #[arg(long)]
        no_ingest: bool,
    },

    /// Re-run ingestion for an already registered document.
    Reingest { document_id: i64, file: PathBuf },

    /// Show a document's ingestion status.
    Status { document_id: i64 },

    /// Delete a document and its vector records.
    Delete { document_id: i64 },

    /// Ask a question against a tenant's knowledge base.
    Ask {
        query: String,
        #[arg(long)]
        tenant: i64,
    },

    /// Triage a customer message into a ticket.
    Triage {
        message: String,
        #[arg(long)]
        tenant: i64,
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    logging::init(&cfg.logging)?;

    if let Commands::Init = cli.command {
        let pool = db::connect(&cfg).await?;
        migrate::run_migrations(&pool).await?;
        pool.close().await;
        println!("Database initialized successfully.");
        return Ok(());
    }

    let service = SupportService::from_config(&cfg).await?;

    match cli.command {
        Commands::Init => {}
        Commands::Upload {
            file,
            tenant,
            mime,
            no_ingest,
        } => {
            let doc = service
                .register_document(tenant, &file, mime.as_deref())
                .await?;
            if !no_ingest {
                let outcome = service.ingest_now(doc.id, &file).await;
                print_json(&service.document_status(doc.id).await?)?;
                outcome.with_context(|| format!("ingestion of document {} failed", doc.id))?;
            } else {
                print_json(&doc)?;
            }
        }
        Commands::Reingest { document_id, file } => {
            let outcome = service.ingest_now(document_id, &file).await;
            print_json(&service.document_status(document_id).await?)?;
            outcome.with_context(|| format!("ingestion of document {} failed", document_id))?;
        }
        Commands::Status { document_id } => {
            print_json(&service.document_status(document_id).await?)?;
        }
        Commands::Delete { document_id } => {
            let purged = service.delete_document(document_id).await?;
            print_json(&serde_json::json!({
                "document_id": document_id,
                "records_purged": purged,
            }))?;
        }
        Commands::Ask { query, tenant } => {
            print_json(&service.retrieve_and_answer(tenant, &query).await?)?;
        }
        Commands::Triage {
            message,
            tenant,
            email,
            name,
            phone,
        } => {
            let contact = ContactFields { name, email, phone };
            print_json(&service.run_triage(tenant, contact, &message).await?)?;
        }
    }

    Ok(())
}
