//! transcript-gate CLI entry point

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::json;

use transcript_gate::backfill::{backfill_transcripts, DEFAULT_BATCH_SIZE};
use transcript_gate::chat::{prepare_chat_turn, ChatTurn};
use transcript_gate::classify::{compute_classification, ClassificationInput};
use transcript_gate::ingest::ingest_transcript;
use transcript_gate::normalize::InternalDomains;
use transcript_gate::sources::{CirclebackSource, TranscriptSource};
use transcript_gate::state::{self, AppState};
use transcript_gate::surfaces::project_overview;
use transcript_gate::visibility::{filter_visible_transcript_ids_for_user, relink_transcript};
use transcript_gate::{GateError, Result, UserIdentity};

/// Meeting transcript privacy gate
#[derive(Parser, Debug)]
#[command(name = "transcript-gate")]
#[command(about = "Classify, route and gate meeting transcripts before they reach a chat model")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest a Circleback webhook payload (JSON file)
    Ingest {
        payload: PathBuf,
    },

    /// Re-classify and re-route every stored transcript
    Backfill {
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },

    /// Classify a title and attendee list without touching the database
    Classify {
        #[arg(long)]
        title: String,
        #[arg(long = "attendee")]
        attendees: Vec<String>,
    },

    /// Print which of the given transcript ids a user may see
    Visible {
        #[arg(long)]
        user: String,
        #[arg(long)]
        email: String,
        ids: Vec<String>,
    },

    /// Assemble the chat prompt for a user and print its provenance
    Prompt {
        #[arg(long)]
        user: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        model: Option<String>,
        #[arg(long = "mention")]
        mentions: Vec<String>,
        /// Project whose overview is included
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        user_context: Option<String>,
    },

    /// Move a non-private transcript to another project (admins only)
    Relink {
        #[arg(long)]
        user: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        transcript: String,
        #[arg(long)]
        project: String,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    match run(Cli::parse()) {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| GateError::InvalidInput(e.to_string()))
}

fn classify(title: &str, attendees: &[String]) -> Result<String> {
    let config = state::load_config()?;
    let domains = InternalDomains::from_config(config.allowed_email_domains.as_deref());
    let decision = compute_classification(ClassificationInput {
        title,
        attendee_emails: attendees,
        internal_domains: &domains,
    });
    to_json(&decision)
}

fn run(cli: Cli) -> Result<String> {
    match cli.command {
        Commands::Classify { title, attendees } => classify(&title, &attendees),
        command => {
            let app = AppState::load()?;
            run_with_state(&app, command)
        }
    }
}

fn run_with_state(app: &AppState, command: Commands) -> Result<String> {
    let db = app.db.lock();

    match command {
        Commands::Ingest { payload } => {
            let raw = fs::read_to_string(&payload)
                .map_err(|e| GateError::InvalidInput(format!("{}: {}", payload.display(), e)))?;
            let transcript = CirclebackSource.transform(CirclebackSource::parse(&raw)?)?;
            let outcome = ingest_transcript(&db, &app.internal_domains, &transcript)?;
            to_json(&outcome)
        }
        Commands::Backfill { batch_size } => {
            let report = backfill_transcripts(&db, &app.internal_domains, batch_size)?;
            to_json(&report)
        }
        Commands::Visible { user, email, ids } => {
            let user = UserIdentity::new(user, email);
            let visible = filter_visible_transcript_ids_for_user(&*db, &user, &ids);
            to_json(&visible)
        }
        Commands::Prompt {
            user,
            email,
            model,
            mentions,
            project,
            user_context,
        } => {
            let user = UserIdentity::new(user, email);
            let overview = match project.as_deref() {
                Some(project_id) => project_overview(&db, &user, project_id)?,
                None => None,
            };
            let model = model.unwrap_or_else(|| app.config.default_model.clone());
            let turn = ChatTurn {
                user: &user,
                model: &model,
                message: "",
                mention_ids: &mentions,
                project_overview_markdown: overview.as_deref(),
                user_context: user_context.as_deref(),
                max_chars_override: app.config.max_chars_override,
                today: Utc::now().date_naive(),
            };
            let (request, context) = prepare_chat_turn(&*db, &turn)?;
            to_json(&json!({
                "providerModel": request.model,
                "totalChars": context.total_chars,
                "maxChars": context.max_chars,
                "sources": context.sources,
                "truncationInfo": context.truncation_info,
            }))
        }
        Commands::Relink {
            user,
            email,
            transcript,
            project,
        } => {
            let actor = UserIdentity::new(user, email);
            let link = relink_transcript(&db, &actor, &transcript, &project, None)?;
            to_json(&link)
        }
        Commands::Classify { title, attendees } => classify(&title, &attendees),
    }
}
