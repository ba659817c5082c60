//! Core data models for documents, chunks, embedding records, and tickets.
//!
//! Identifiers are plain integers because the durable rows (documents,
//! tickets) are owned by the relational store, which assigns them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub type TenantId = i64;
pub type DocumentId = i64;
pub type TicketId = i64;

/// Returned when a string does not name a known enum variant.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Implements `as_str`, `Display`, and case-insensitive `FromStr` for a
/// fieldless enum from a variant/name table.
macro_rules! named_enum {
    ($ty:ident, $kind:literal, [$(($variant:ident, $name:literal)),+ $(,)?]) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s))
                    .ok_or_else(|| ParseEnumError {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }
    };
}

// ============ Documents ============

/// Position of a document in the ingestion state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStage {
    Queued,
    Extracting,
    Chunking,
    Embedding,
    Storing,
    Done,
    Failed,
}

named_enum!(
    IngestStage,
    "ingest stage",
    [
        (Queued, "queued"),
        (Extracting, "extracting"),
        (Chunking, "chunking"),
        (Embedding, "embedding"),
        (Storing, "storing"),
        (Done, "done"),
        (Failed, "failed"),
    ]
);

/// One uploaded file and its ingestion status.
///
/// `processed == true` implies `processing_error.is_none()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: DocumentId,
    pub tenant_id: TenantId,
    pub file_name: String,
    /// MIME type declared at upload.
    pub file_type: String,
    pub file_size: i64,
    pub processed: bool,
    pub processing_error: Option<String>,
    pub chunk_count: i64,
    pub embedding_model: Option<String>,
    pub stage: IngestStage,
    /// SHA-256 (hex) of the text extracted by the last successful run.
    pub text_hash: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

/// Fields supplied when a document is registered.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub tenant_id: TenantId,
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
}

/// Fields written when a run completes successfully.
#[derive(Debug, Clone)]
pub struct IngestSuccess {
    pub chunk_count: i64,
    pub embedding_model: String,
    pub text_hash: String,
}

// ============ Chunks and embedding records ============

/// Builds the composite embedding-record id `{document_id}_{chunk_index}`.
pub fn record_id(document_id: DocumentId, chunk_index: usize) -> String {
    format!("{}_{}", document_id, chunk_index)
}

/// A bounded text segment of one document. Produced fresh on every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub document_id: DocumentId,
    pub tenant_id: TenantId,
    pub chunk_index: usize,
    pub text: String,
}

impl Chunk {
    pub fn record_id(&self) -> String {
        record_id(self.document_id, self.chunk_index)
    }
}

/// The unit stored in the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
    pub id: String,
    pub tenant_id: TenantId,
    pub document_id: DocumentId,
    pub chunk_index: usize,
    pub text: String,
    pub vector: Vec<f32>,
}

/// A query hit: `similarity = 1 - cosine_distance`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub document_id: DocumentId,
    pub chunk_index: usize,
    pub chunk_text: String,
    pub similarity: f32,
}

// ============ Tickets ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketCategory {
    Refund,
    Billing,
    Technical,
    Delivery,
    General,
}

named_enum!(
    TicketCategory,
    "ticket category",
    [
        (Refund, "refund"),
        (Billing, "billing"),
        (Technical, "technical"),
        (Delivery, "delivery"),
        (General, "general"),
    ]
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Urgent,
}

named_enum!(
    TicketPriority,
    "ticket priority",
    [
        (Low, "low"),
        (Medium, "medium"),
        (High, "high"),
        (Urgent, "urgent"),
    ]
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    WaitingOnCustomer,
    Resolved,
    Closed,
}

named_enum!(
    TicketStatus,
    "ticket status",
    [
        (Open, "open"),
        (InProgress, "in_progress"),
        (WaitingOnCustomer, "waiting_on_customer"),
        (Resolved, "resolved"),
        (Closed, "closed"),
    ]
);

/// Customer contact details captured with a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactFields {
    pub name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
}

/// Fields supplied when a ticket is created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTicket {
    pub tenant_id: TenantId,
    pub contact: ContactFields,
    pub subject: String,
    pub description: String,
    pub category: TicketCategory,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub ai_confidence: Option<u8>,
    pub agent_notes: Option<String>,
}

/// Durable support ticket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ticket {
    pub id: TicketId,
    pub tenant_id: TenantId,
    pub contact: ContactFields,
    pub subject: String,
    pub description: String,
    pub category: TicketCategory,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub ai_confidence: Option<u8>,
    pub agent_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_id_is_composite() {
        assert_eq!(record_id(17, 3), "17_3");
        let chunk = Chunk {
            document_id: 5,
            tenant_id: 1,
            chunk_index: 0,
            text: "x".into(),
        };
        assert_eq!(chunk.record_id(), "5_0");
    }

    #[test]
    fn enums_parse_case_insensitively() {
        assert_eq!("Billing".parse::<TicketCategory>(), Ok(TicketCategory::Billing));
        assert_eq!(" URGENT ".parse::<TicketPriority>(), Ok(TicketPriority::Urgent));
        assert_eq!(
            "in_progress".parse::<TicketStatus>(),
            Ok(TicketStatus::InProgress)
        );
        let err = "shipping".parse::<TicketCategory>().unwrap_err();
        assert_eq!(err.kind, "ticket category");
    }

    #[test]
    fn enum_strings_roundtrip() {
        for stage in IngestStage::ALL {
            assert_eq!(stage.as_str().parse::<IngestStage>().unwrap(), *stage);
        }
        for status in TicketStatus::ALL {
            assert_eq!(status.to_string().parse::<TicketStatus>().unwrap(), *status);
        }
    }
}
