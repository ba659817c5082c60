//! # EasyServe
//!
//! Customer-support backend pipeline: knowledge-base ingestion, grounded
//! question answering, and AI ticket triage.
//!
//! Domain logic (models, chunking, retrieval, triage, storage traits) lives
//! in [`easyserve_core`]. This crate supplies everything with I/O: text
//! extraction, SQLite storage, HTTP embedding and chat providers, the
//! ingestion pipeline, configuration, logging, and the CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────────────┐   ┌───────────┐
//! │  upload  │──▶│ extract → chunk → embed  │──▶│  SQLite   │
//! └──────────┘   └──────────────────────────┘   │ docs/vecs │
//!                                               └─────┬─────┘
//!             ┌───────────────────────────────────────┤
//!             ▼                                       ▼
//!      ┌─────────────┐                         ┌─────────────┐
//!      │ ask: embed, │                         │  triage:    │
//!      │ query, LLM  │                         │ classify,   │
//!      └─────────────┘                         │ ticket, LLM │
//!                                              └─────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | Tracing subscriber setup |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`extract`] | PDF / Word / plain-text extraction |
//! | [`embedding`] | Embedding providers |
//! | [`completion`] | Chat-completion providers |
//! | [`http`] | Shared HTTP client and JSON transport |
//! | [`sqlite_store`] | SQLite store implementations |
//! | [`ingest`] | Ingestion pipeline |
//! | [`service`] | The `SupportService` facade |

pub mod completion;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod http;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod service;
pub mod sqlite_store;
