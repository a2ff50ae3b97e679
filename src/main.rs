//! # FAQ Relay CLI (`faqr`)
//!
//! The `faqr` binary drives the FAQ answer-resolution service. It
//! provides commands for database initialization, running the HTTP
//! server, administering the search schema, and exercising the
//! resolution pipeline from a terminal.
//!
//! ## Usage
//!
//! ```bash
//! faqr --config ./config/faqr.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `faqr init` | Create the SQLite database and run schema migrations |
//! | `faqr serve` | Start the HTTP server (questions API + live stream) |
//! | `faqr setup <model>` | Rebuild the family's search collections |
//! | `faqr seed <model>` | Re-ingest the hosted FAQ dataset |
//! | `faqr ask "<question>"` | Submit a question and resolve it synchronously |
//! | `faqr submit "<question>"` | Create a question without resolving it |
//! | `faqr recent` | Print the most recent questions |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use faq_relay::backend::WeaviateBackend;
use faq_relay::models::{decode_response, ModelFamily};
use faq_relay::resolve::{self, Outcome};
use faq_relay::store::{QuestionStore, SqliteQuestionStore};
use faq_relay::{config, db, migrate, schema, server};

/// FAQ Relay — a question-answering chatbot service backed by
/// multi-collection semantic search.
///
/// All commands accept a `--config` flag pointing to a TOML
/// configuration file. See `config/faqr.example.toml` for a full
/// example.
#[derive(Parser)]
#[command(
    name = "faqr",
    about = "FAQ Relay — a question-answering chatbot service backed by semantic search",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/faqr.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the questions table. This
    /// command is idempotent — running it multiple times is safe.
    Init,

    /// Start the HTTP server.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// questions API, the SSE live stream, and the admin schema
    /// endpoints.
    Serve,

    /// Rebuild the search collections for a model family.
    ///
    /// Deletes and recreates the family's primary and inverted
    /// collections with family-specific vectorizer configuration.
    Setup {
        /// Model family: `HuggingFace` or `OpenAI`.
        model: ModelFamily,
    },

    /// Seed the search collections from the hosted FAQ dataset.
    ///
    /// Fetches `[seed].faq_url` and batch-inserts every question/answer
    /// pair into both of the family's collections.
    Seed {
        /// Model family: `HuggingFace` or `OpenAI`.
        model: ModelFamily,
    },

    /// Submit a question and resolve it synchronously.
    ///
    /// Runs the full pipeline (retrieval, reconciliation, fallback) and
    /// prints the resolved answer.
    Ask {
        /// The question text.
        question: String,

        /// User id to attribute the question to.
        #[arg(long, default_value = "cli")]
        user: String,
    },

    /// Create a question without resolving it.
    ///
    /// Mirrors the client write path; the question stays pending until a
    /// resolution run picks it up.
    Submit {
        /// The question text.
        question: String,

        /// User id to attribute the question to.
        #[arg(long, default_value = "cli")]
        user: String,
    },

    /// Print the most recent questions in creation order.
    Recent {
        /// Maximum number of questions to print.
        #[arg(long, default_value_t = 25)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Setup { model } => {
            let backend = WeaviateBackend::new(&cfg.search)?;
            match schema::setup_schema(&backend, model).await {
                Ok(description) => {
                    println!("{}", serde_json::to_string_pretty(&description)?);
                }
                Err(failure) => {
                    anyhow::bail!("schema setup failed: {}", failure.reason);
                }
            }
        }
        Commands::Seed { model } => {
            let backend = WeaviateBackend::new(&cfg.search)?;
            match schema::seed_schema(&backend, &cfg, model).await {
                Ok(report) => {
                    println!(
                        "seeded {} objects in {} batches into {}",
                        report.objects,
                        report.batches,
                        report.classes.join(", ")
                    );
                }
                Err(failure) => {
                    anyhow::bail!("seeding failed: {}", failure.reason);
                }
            }
        }
        Commands::Ask { question, user } => {
            let backend = WeaviateBackend::new(&cfg.search)?;
            let pool = db::connect(&cfg).await?;
            let store = SqliteQuestionStore::new(pool);

            let record = store.create_question(&question, &user).await?;
            let outcome =
                resolve::resolve_question(&backend, &store, &cfg.resolver, &record).await?;

            match outcome {
                Outcome::Resolved(answer) => {
                    println!("{}", answer.text);
                    match answer.certainty {
                        Some(certainty) => {
                            println!("  ({} answer, certainty {:.2})", answer.source, certainty)
                        }
                        None => println!("  ({} answer)", answer.source),
                    }
                }
                Outcome::AlreadyResolved => {
                    println!("question was already answered");
                }
            }
        }
        Commands::Submit { question, user } => {
            let pool = db::connect(&cfg).await?;
            let store = SqliteQuestionStore::new(pool);
            let record = store.create_question(&question, &user).await?;
            println!("submitted {}", record.id);
        }
        Commands::Recent { limit } => {
            let pool = db::connect(&cfg).await?;
            let store = SqliteQuestionStore::new(pool);

            let questions = store.recent_questions(limit).await?;
            if questions.is_empty() {
                println!("No questions yet.");
            }
            for question in questions {
                let answer = question
                    .response
                    .as_deref()
                    .and_then(decode_response)
                    .map(|record| record.answer)
                    .unwrap_or_else(|| "(pending)".to_string());
                println!("[{}] {}", question.created_at.format("%Y-%m-%d %H:%M"), question.text);
                println!("    {}", answer);
            }
        }
    }

    Ok(())
}
