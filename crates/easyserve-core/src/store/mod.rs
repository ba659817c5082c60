//! Storage abstractions for documents, tickets, and embedding records.
//!
//! Three traits split the persistence concerns the way the pipeline uses
//! them:
//!
//! | Trait | Used by |
//! |-------|---------|
//! | [`VectorIndex`] | ingestion (upsert/purge), retrieval (query) |
//! | [`DocumentRepository`] | ingestion status tracking, the service layer |
//! | [`TicketRepository`] | the triage orchestrator |
//!
//! Implementations must be `Send + Sync`; the service holds them as
//! `Arc<dyn Trait>`. An in-memory implementation of all three lives in
//! [`memory`]; the SQLite implementations live in the app crate.

pub mod memory;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::{
    Chunk, Document, DocumentId, IngestStage, IngestSuccess, NewDocument, NewTicket, ScoredChunk,
    TenantId, Ticket, TicketId, TicketStatus,
};

/// Tenant-partitioned vector store.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Write one record per chunk with id `{document_id}_{chunk_index}`.
    ///
    /// Existing records with the same id are replaced. A record owned by a
    /// different tenant is never overwritten: the call fails with
    /// [`Error::TenantMismatch`] and writes nothing.
    async fn upsert(
        &self,
        tenant_id: TenantId,
        document_id: DocumentId,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<usize>;

    /// Top-`k` records of `tenant_id` by cosine similarity. Records whose
    /// width differs from `vector` are skipped.
    async fn query(&self, tenant_id: TenantId, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;

    /// Remove every record of one document. Returns the number removed.
    async fn purge_document(&self, tenant_id: TenantId, document_id: DocumentId) -> Result<usize>;

    /// Number of records owned by `tenant_id`.
    async fn count(&self, tenant_id: TenantId) -> Result<usize>;
}

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn insert(&self, doc: &NewDocument) -> Result<Document>;
    async fn get(&self, id: DocumentId) -> Result<Option<Document>>;
    async fn set_stage(&self, id: DocumentId, stage: IngestStage) -> Result<()>;
    /// `processed = false`, stage `queued`; error, chunk count, model and
    /// text hash of the previous run cleared.
    async fn reset_for_ingest(&self, id: DocumentId) -> Result<()>;
    async fn mark_processed(&self, id: DocumentId, outcome: &IngestSuccess) -> Result<()>;
    async fn mark_failed(&self, id: DocumentId, error: &str) -> Result<()>;
    /// Removes the document and its vector records. Returns `false` when
    /// no such document existed.
    async fn delete(&self, id: DocumentId) -> Result<bool>;
}

#[async_trait]
pub trait TicketRepository: Send + Sync {
    async fn create(&self, ticket: &NewTicket) -> Result<Ticket>;
    async fn get(&self, id: TicketId) -> Result<Option<Ticket>>;
    /// Set status and, when given, replace the agent notes.
    async fn update_status(
        &self,
        id: TicketId,
        status: TicketStatus,
        notes: Option<&str>,
    ) -> Result<Ticket>;
}

/// Shared precondition checks for [`VectorIndex::upsert`].
pub fn validate_upsert(
    tenant_id: TenantId,
    document_id: DocumentId,
    chunks: &[Chunk],
    vectors: &[Vec<f32>],
) -> Result<()> {
    if chunks.len() != vectors.len() {
        return Err(Error::InvalidInput(format!(
            "{} chunks but {} vectors",
            chunks.len(),
            vectors.len()
        )));
    }
    if let Some(c) = chunks
        .iter()
        .find(|c| c.tenant_id != tenant_id || c.document_id != document_id)
    {
        return Err(Error::InvalidInput(format!(
            "chunk {} does not belong to document {} of tenant {}",
            c.record_id(),
            document_id,
            tenant_id
        )));
    }
    Ok(())
}

/// Order hits by similarity desc, then `(document_id, chunk_index)` asc,
/// and keep the first `k`.
pub fn rank_hits(mut hits: Vec<ScoredChunk>, k: usize) -> Vec<ScoredChunk> {
    hits.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then(a.document_id.cmp(&b.document_id))
            .then(a.chunk_index.cmp(&b.chunk_index))
    });
    hits.truncate(k);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(doc: DocumentId, idx: usize, sim: f32) -> ScoredChunk {
        ScoredChunk {
            document_id: doc,
            chunk_index: idx,
            chunk_text: String::new(),
            similarity: sim,
        }
    }

    #[test]
    fn rank_breaks_ties_by_position() {
        let ranked = rank_hits(
            vec![hit(2, 0, 0.5), hit(1, 3, 0.5), hit(1, 1, 0.5), hit(9, 9, 0.9)],
            3,
        );
        let keys: Vec<_> = ranked.iter().map(|h| (h.document_id, h.chunk_index)).collect();
        assert_eq!(keys, vec![(9, 9), (1, 1), (1, 3)]);
    }

    #[test]
    fn rank_zero_k_is_empty() {
        assert!(rank_hits(vec![hit(1, 0, 1.0)], 0).is_empty());
    }

    #[test]
    fn validate_rejects_count_mismatch() {
        let chunk = Chunk {
            document_id: 1,
            tenant_id: 1,
            chunk_index: 0,
            text: "a".into(),
        };
        assert!(validate_upsert(1, 1, &[chunk.clone()], &[]).is_err());
        assert!(validate_upsert(2, 1, &[chunk.clone()], &[vec![1.0]]).is_err());
        assert!(validate_upsert(1, 1, &[chunk], &[vec![1.0]]).is_ok());
    }
}
