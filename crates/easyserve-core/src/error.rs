//! Error taxonomy shared by the ingestion pipeline, retrieval, and triage.
//!
//! Every external call site (extraction, embedding, completion, vector
//! index, repositories) maps its failure into one of these variants so the
//! orchestrators can decide what to record, absorb, or surface.

use thiserror::Error;

use crate::models::{DocumentId, TenantId, TicketId};

/// Result alias used across the core crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline and triage errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The declared MIME type matches no supported reader.
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    /// A supported file could not be read or decoded.
    #[error("text extraction failed for {file}: {source}")]
    Extraction {
        file: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Transport, quota, or contract failure from the embedding service.
    #[error("embedding service error: {0}")]
    EmbeddingService(String),

    /// The vector index backend failed.
    #[error("vector index unavailable: {0}")]
    IndexUnavailable(String),

    /// The reasoning model call failed.
    #[error("generation failed: {0}")]
    Generation(String),

    /// A classification response could not be decoded. Recovered locally by
    /// the triage orchestrator and never returned from it.
    #[error("classification response could not be parsed: {0}")]
    ClassificationParse(String),

    /// The document or ticket store failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A write would have moved an embedding record to another tenant.
    #[error("record {record_id} belongs to tenant {existing}, refusing write for tenant {requested}")]
    TenantMismatch {
        record_id: String,
        existing: TenantId,
        requested: TenantId,
    },

    /// Caller-supplied data violates a precondition.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("document {0} not found")]
    DocumentNotFound(DocumentId),

    #[error("ticket {0} not found")]
    TicketNotFound(TicketId),

    /// The ticket was committed but the customer reply could not be drafted.
    #[error("ticket {ticket_id} was created but the reply could not be generated: {source}")]
    ReplyUnavailable {
        ticket_id: TicketId,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn extraction(
        file: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Extraction {
            file: file.into(),
            source: source.into(),
        }
    }

    pub fn embedding(message: impl Into<String>) -> Self {
        Self::EmbeddingService(message.into())
    }

    pub fn index(message: impl Into<String>) -> Self {
        Self::IndexUnavailable(message.into())
    }

    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    /// Short machine-readable code, used in logs and CLI output.
    pub fn code(&self) -> &'static str {
        match self {
            Error::UnsupportedFormat(_) => "unsupported_format",
            Error::Extraction { .. } => "extraction_error",
            Error::EmbeddingService(_) => "embedding_service_error",
            Error::IndexUnavailable(_) => "index_unavailable",
            Error::Generation(_) => "generation_error",
            Error::ClassificationParse(_) => "classification_parse_error",
            Error::Persistence(_) => "persistence_error",
            Error::TenantMismatch { .. } => "tenant_mismatch",
            Error::InvalidInput(_) => "invalid_input",
            Error::DocumentNotFound(_) => "document_not_found",
            Error::TicketNotFound(_) => "ticket_not_found",
            Error::ReplyUnavailable { .. } => "reply_unavailable",
        }
    }
}
