//! # EasyServe Core
//!
//! Domain logic for the EasyServe support pipeline: data models, the error
//! taxonomy, chunking, the embedding and completion seams, storage traits
//! with an in-memory backend, retrieval, grounded answers, and ticket
//! triage.
//!
//! This crate performs no network, filesystem, or database I/O. Concrete
//! providers, text extraction, SQLite storage, and the ingestion pipeline
//! live in the `easyserve` app crate and plug in through the traits here.

pub mod answer;
pub mod chunk;
pub mod completion;
pub mod embedding;
pub mod error;
pub mod models;
pub mod retrieval;
pub mod store;
pub mod triage;

pub use error::{Error, Result};
