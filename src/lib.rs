//! Privacy gate between a meeting-transcript store and a chat model.
//!
//! Transcripts are classified and routed once at ingestion. Every read path
//! (list, search, detail, source export, mention search, chat turn) asks the
//! visibility gate fresh before any transcript leaves storage. Chat prompts
//! are assembled under a per-model character budget with provenance for each
//! included document.

pub mod acl;
pub mod audit;
pub mod backfill;
pub mod chat;
pub mod classify;
pub mod db;
pub mod error;
pub mod ingest;
pub mod mentions;
mod migrations;
pub mod models;
pub mod normalize;
pub mod prompt_context;
pub mod prompts;
pub mod routing;
pub mod sources;
pub mod state;
pub mod store;
pub mod surfaces;
pub mod types;
pub mod visibility;

pub use error::{GateError, Result};
pub use state::AppState;
pub use types::{Config, UserIdentity};
