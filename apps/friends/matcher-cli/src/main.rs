//! Friend Matcher
//!
//! Operator tool for the friend-candidate recommender: keeps user embeddings
//! in PostgreSQL up to date and answers "who is most similar to this user".
//! Results and failures are printed as JSON on stdout.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::builder::RangedU64ValueParser;
use clap::{Parser, Subcommand};
use core_config::tracing::{default_directives, init_tracing, install_color_eyre};
use database::postgres::DatabaseConnection;
use domain_matching::{
    EmbeddingStore, FriendService, MatchFailure, MatchResult, PostText, PostgresEmbeddingStore,
    ProfileText, build_provider,
};
use eyre::{Result, WrapErr};
use migration::Migrator;
use serde::{Deserialize, Serialize};
use tracing::info;

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "friend-matcher")]
#[command(about = "Embed user text and recommend friend candidates")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,

    /// Embed a user's profile (and optionally a new post) and store it
    Embed {
        #[arg(short, long)]
        user_id: String,

        /// Profile bio
        #[arg(short, long)]
        bio: Option<String>,

        /// Interests, comma separated
        #[arg(short, long, value_delimiter = ',')]
        interests: Vec<String>,

        /// Title of a newly created post
        #[arg(long, requires = "content")]
        title: Option<String>,

        /// Content of a newly created post
        #[arg(long)]
        content: Option<String>,
    },

    /// Recommend the most similar other users
    Candidate {
        #[arg(short, long)]
        user_id: String,

        /// Number of candidates to return
        #[arg(
            short,
            long,
            default_value_t = 1,
            value_parser = RangedU64ValueParser::<usize>::new().range(1..)
        )]
        top: usize,
    },

    /// Embed many profiles from a JSON file in one batch
    ///
    /// The file holds an array of `{"user_id", "bio", "interests"}` objects.
    Import {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Remove a user's embedding (account deletion)
    Delete {
        #[arg(short, long)]
        user_id: String,
    },

    /// Show store size, dimension and database health
    Status,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    install_color_eyre();

    let cli = Cli::parse();

    let config = Config::from_env()?;
    init_tracing(&config.environment, default_directives(&config.environment));

    info!("Connecting to database...");
    let db = database::postgres::connect_from_config_with_retry(config.database.clone(), None)
        .await
        .map_err(|e| eyre::eyre!("Database connection failed: {}", e))?;

    if let Commands::Migrate = cli.command {
        database::postgres::run_migrations::<Migrator>(&db, "friend-matcher").await?;
        return Ok(ExitCode::SUCCESS);
    }

    let provider = build_provider(&config.embedder)?;
    let service = FriendService::new(PostgresEmbeddingStore::new(db.clone()), provider);

    let code = match cli.command {
        Commands::Migrate => ExitCode::SUCCESS,

        Commands::Embed {
            user_id,
            bio,
            interests,
            title,
            content,
        } => {
            let profile = ProfileText::new(bio, interests);
            let outcome = match (title, content) {
                (None, None) => service.on_profile_changed(&user_id, &profile).await,
                (title, content) => {
                    let post =
                        PostText::new(title.unwrap_or_default(), content.unwrap_or_default());
                    service.on_post_created(&user_id, &profile, &post).await
                }
            };
            if let Ok(None) = outcome {
                tracing::warn!(user_id = %user_id, "Embedding skipped, stored vector unchanged");
            }
            report(outcome)?
        }

        Commands::Candidate { user_id, top } => {
            if top == 1 {
                report(service.request_candidate(&user_id).await)?
            } else {
                report(service.request_candidates(&user_id, top).await)?
            }
        }

        Commands::Import { file } => {
            let profiles = read_profiles(&file)?;
            info!(count = profiles.len(), file = %file.display(), "Importing profiles");
            report(service.on_profiles_changed(&profiles).await)?
        }

        Commands::Delete { user_id } => {
            let deleted = service.on_account_deleted(&user_id).await;
            report(deleted.map(|deleted| {
                serde_json::json!({ "user_id": user_id, "deleted": deleted })
            }))?
        }

        Commands::Status => report(status(&service, &db).await)?,
    };

    Ok(code)
}

/// One entry of an import file
#[derive(Debug, Deserialize)]
struct ProfileEntry {
    user_id: String,
    #[serde(flatten)]
    profile: ProfileText,
}

fn read_profiles(path: &Path) -> Result<Vec<(String, ProfileText)>> {
    let raw = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
    parse_profiles(&raw).wrap_err_with(|| format!("Invalid profile file {}", path.display()))
}

fn parse_profiles(raw: &str) -> Result<Vec<(String, ProfileText)>> {
    let entries: Vec<ProfileEntry> = serde_json::from_str(raw)?;
    Ok(entries
        .into_iter()
        .map(|entry| (entry.user_id, entry.profile))
        .collect())
}

async fn status(
    service: &FriendService<PostgresEmbeddingStore>,
    db: &DatabaseConnection,
) -> MatchResult<serde_json::Value> {
    let health = database::postgres::check_health_detailed(db).await;
    let store = service.store();
    let embedder = service.embedding_provider();

    Ok(serde_json::json!({
        "records": store.count().await?,
        "dimension": store.dimension().await?,
        "embedder": {
            "provider": embedder.provider_type(),
            "model": embedder.model(),
            "dimension": embedder.dimension(),
        },
        "database": {
            "healthy": health.healthy,
            "message": health.message,
            "response_time_ms": health.response_time_ms,
        },
    }))
}

/// Print the value, or the structured failure, as JSON
fn report<T: Serialize>(outcome: MatchResult<T>) -> Result<ExitCode> {
    match outcome {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            tracing::debug!(status = %err.status_code(), "Request failed");
            let failure = MatchFailure::from(err);
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({ "error": failure }))?
            );
            Ok(ExitCode::FAILURE)
        }
    }
}
