//! # lexrag
//!
//! Retrieval-augmented question answering over German statutory text.
//!
//! lexrag ingests a "Gesetze im Internet" law XML corpus (the StGB by
//! default), splits it into per-section records, embeds them via the Azure
//! OpenAI embeddings API, stores the vectors in Postgres with pgvector, and
//! answers questions by retrieving the nearest sections and grounding a
//! chat completion on them, with `(§ Nummer – Titel)` citations.
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌───────────┐   ┌──────────────┐
//! │ law XML  │──▶│  parse   │──▶│  embed    │──▶│   Postgres   │
//! │ (gii)    │   │  NDJSON  │   │  NDJSON   │   │  + pgvector  │
//! └──────────┘   └──────────┘   └───────────┘   └──────┬───────┘
//!                                                      │
//!                                     ┌────────────────┤
//!                                     ▼                ▼
//!                               ┌──────────┐     ┌──────────┐
//!                               │   CLI    │     │   HTTP   │
//!                               │ (lexrag) │     │  (/ask)  │
//!                               └──────────┘     └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! lexrag init                                  # create schema + index
//! lexrag parse --input stgb.xml --output sections.ndjson
//! lexrag embed --input sections.ndjson --output embedded.ndjson
//! lexrag load --input embedded.ndjson
//! lexrag search "Welche Vorschrift regelt Diebstahl?"
//! lexrag ask "Was sind typische Qualifikationen des Diebstahls?"
//! lexrag serve api                             # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`parse`] | Law XML to NDJSON conversion |
//! | [`embedding`] | Azure embeddings client + vector utilities |
//! | [`chat`] | Azure chat completion client |
//! | [`search`] | Nearest-neighbor retrieval |
//! | [`rag`] | Context building and grounded answering |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chat;
pub mod config;
pub mod db;
pub mod embed_cmd;
pub mod embedding;
pub mod load_cmd;
pub mod migrate;
pub mod models;
pub mod ndjson;
pub mod parse;
pub mod progress;
pub mod rag;
pub mod search;
pub mod server;
pub mod stats;
