//! In-memory implementation of every store trait, for tests and offline use.
//!
//! Uses `BTreeMap`s behind `std::sync::RwLock` for thread safety. Vector
//! search is brute-force cosine similarity over the tenant's records.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::embedding::cosine_similarity;
use crate::error::{Error, Result};
use crate::models::{
    Chunk, Document, DocumentId, EmbeddingRecord, IngestStage, IngestSuccess, NewDocument,
    NewTicket, ScoredChunk, TenantId, Ticket, TicketId, TicketStatus,
};

use super::{rank_hits, validate_upsert, DocumentRepository, TicketRepository, VectorIndex};

/// In-memory store backing all three repository traits.
#[derive(Default)]
pub struct InMemoryStore {
    docs: RwLock<BTreeMap<DocumentId, Document>>,
    tickets: RwLock<BTreeMap<TicketId, Ticket>>,
    records: RwLock<BTreeMap<String, EmbeddingRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| Error::persistence("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| Error::persistence("in-memory store lock poisoned"))
}

fn next_id<V>(map: &BTreeMap<i64, V>) -> i64 {
    map.keys().next_back().map_or(1, |last| last + 1)
}

#[async_trait]
impl VectorIndex for InMemoryStore {
    async fn upsert(
        &self,
        tenant_id: TenantId,
        document_id: DocumentId,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<usize> {
        validate_upsert(tenant_id, document_id, chunks, vectors)?;
        let mut records = write(&self.records).map_err(|e| Error::index(e.to_string()))?;

        for chunk in chunks {
            let id = chunk.record_id();
            if let Some(existing) = records.get(&id) {
                if existing.tenant_id != tenant_id {
                    return Err(Error::TenantMismatch {
                        record_id: id,
                        existing: existing.tenant_id,
                        requested: tenant_id,
                    });
                }
            }
        }

        for (chunk, vector) in chunks.iter().zip(vectors) {
            let id = chunk.record_id();
            records.insert(
                id.clone(),
                EmbeddingRecord {
                    id,
                    tenant_id,
                    document_id,
                    chunk_index: chunk.chunk_index,
                    text: chunk.text.clone(),
                    vector: vector.clone(),
                },
            );
        }
        Ok(chunks.len())
    }

    async fn query(&self, tenant_id: TenantId, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let records = read(&self.records).map_err(|e| Error::index(e.to_string()))?;
        let hits = records
            .values()
            .filter(|r| r.tenant_id == tenant_id && r.vector.len() == vector.len())
            .map(|r| ScoredChunk {
                document_id: r.document_id,
                chunk_index: r.chunk_index,
                chunk_text: r.text.clone(),
                similarity: cosine_similarity(vector, &r.vector),
            })
            .collect();
        Ok(rank_hits(hits, k))
    }

    async fn purge_document(&self, tenant_id: TenantId, document_id: DocumentId) -> Result<usize> {
        let mut records = write(&self.records).map_err(|e| Error::index(e.to_string()))?;
        let before = records.len();
        records.retain(|_, r| !(r.tenant_id == tenant_id && r.document_id == document_id));
        Ok(before - records.len())
    }

    async fn count(&self, tenant_id: TenantId) -> Result<usize> {
        let records = read(&self.records).map_err(|e| Error::index(e.to_string()))?;
        Ok(records.values().filter(|r| r.tenant_id == tenant_id).count())
    }
}

#[async_trait]
impl DocumentRepository for InMemoryStore {
    async fn insert(&self, doc: &NewDocument) -> Result<Document> {
        let mut docs = write(&self.docs)?;
        let id = next_id(&docs);
        let stored = Document {
            id,
            tenant_id: doc.tenant_id,
            file_name: doc.file_name.clone(),
            file_type: doc.file_type.clone(),
            file_size: doc.file_size,
            processed: false,
            processing_error: None,
            chunk_count: 0,
            embedding_model: None,
            stage: IngestStage::Queued,
            text_hash: None,
            uploaded_at: Utc::now(),
        };
        docs.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get(&self, id: DocumentId) -> Result<Option<Document>> {
        Ok(read(&self.docs)?.get(&id).cloned())
    }

    async fn set_stage(&self, id: DocumentId, stage: IngestStage) -> Result<()> {
        let mut docs = write(&self.docs)?;
        let doc = docs.get_mut(&id).ok_or(Error::DocumentNotFound(id))?;
        doc.stage = stage;
        Ok(())
    }

    async fn reset_for_ingest(&self, id: DocumentId) -> Result<()> {
        let mut docs = write(&self.docs)?;
        let doc = docs.get_mut(&id).ok_or(Error::DocumentNotFound(id))?;
        doc.processed = false;
        doc.processing_error = None;
        doc.chunk_count = 0;
        doc.embedding_model = None;
        doc.text_hash = None;
        doc.stage = IngestStage::Queued;
        Ok(())
    }

    async fn mark_processed(&self, id: DocumentId, outcome: &IngestSuccess) -> Result<()> {
        let mut docs = write(&self.docs)?;
        let doc = docs.get_mut(&id).ok_or(Error::DocumentNotFound(id))?;
        doc.processed = true;
        doc.processing_error = None;
        doc.chunk_count = outcome.chunk_count;
        doc.embedding_model = Some(outcome.embedding_model.clone());
        doc.text_hash = Some(outcome.text_hash.clone());
        doc.stage = IngestStage::Done;
        Ok(())
    }

    async fn mark_failed(&self, id: DocumentId, error: &str) -> Result<()> {
        let mut docs = write(&self.docs)?;
        let doc = docs.get_mut(&id).ok_or(Error::DocumentNotFound(id))?;
        doc.processed = false;
        doc.processing_error = Some(error.to_string());
        doc.stage = IngestStage::Failed;
        Ok(())
    }

    /// Removes the document and every vector record it owns.
    async fn delete(&self, id: DocumentId) -> Result<bool> {
        let mut docs = write(&self.docs)?;
        let removed = docs.remove(&id).is_some();
        if removed {
            write(&self.records)?.retain(|_, r| r.document_id != id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl TicketRepository for InMemoryStore {
    async fn create(&self, ticket: &NewTicket) -> Result<Ticket> {
        let mut tickets = write(&self.tickets)?;
        let id = next_id(&tickets);
        let now = Utc::now();
        let stored = Ticket {
            id,
            tenant_id: ticket.tenant_id,
            contact: ticket.contact.clone(),
            subject: ticket.subject.clone(),
            description: ticket.description.clone(),
            category: ticket.category,
            priority: ticket.priority,
            status: ticket.status,
            ai_confidence: ticket.ai_confidence,
            agent_notes: ticket.agent_notes.clone(),
            created_at: now,
            updated_at: now,
        };
        tickets.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get(&self, id: TicketId) -> Result<Option<Ticket>> {
        Ok(read(&self.tickets)?.get(&id).cloned())
    }

    async fn update_status(
        &self,
        id: TicketId,
        status: TicketStatus,
        notes: Option<&str>,
    ) -> Result<Ticket> {
        let mut tickets = write(&self.tickets)?;
        let ticket = tickets.get_mut(&id).ok_or(Error::TicketNotFound(id))?;
        ticket.status = status;
        if let Some(notes) = notes {
            ticket.agent_notes = Some(notes.to_string());
        }
        ticket.updated_at = Utc::now();
        Ok(ticket.clone())
    }
}
