//! SQLite-backed implementations of the core store traits.
//!
//! One [`SqliteStore`] wraps a [`SqlitePool`] and implements
//! [`VectorIndex`], [`DocumentRepository`], and [`TicketRepository`] over the
//! schema created by [`crate::migrate`]. Vectors are stored as
//! little-endian f32 BLOBs; similarity search is brute-force cosine over the
//! tenant's rows of the query's width. Vector rows cascade with their
//! document.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use easyserve_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use easyserve_core::models::{
    Chunk, ContactFields, Document, DocumentId, IngestStage, IngestSuccess, NewDocument,
    NewTicket, ScoredChunk, TenantId, Ticket, TicketId, TicketStatus,
};
use easyserve_core::store::{
    rank_hits, validate_upsert, DocumentRepository, TicketRepository, VectorIndex,
};
use easyserve_core::{Error, Result};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn index_err(e: sqlx::Error) -> Error {
    Error::index(e.to_string())
}

fn db_err(e: sqlx::Error) -> Error {
    Error::persistence(e.to_string())
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn parse_column<T: std::str::FromStr>(row: &SqliteRow, column: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    let raw: String = row.try_get(column).map_err(db_err)?;
    raw.parse::<T>()
        .map_err(|e| Error::persistence(format!("bad {} column: {}", column, e)))
}

fn document_from_row(row: &SqliteRow) -> Result<Document> {
    Ok(Document {
        id: row.try_get("id").map_err(db_err)?,
        tenant_id: row.try_get("tenant_id").map_err(db_err)?,
        file_name: row.try_get("file_name").map_err(db_err)?,
        file_type: row.try_get("file_type").map_err(db_err)?,
        file_size: row.try_get("file_size").map_err(db_err)?,
        processed: row.try_get("processed").map_err(db_err)?,
        processing_error: row.try_get("processing_error").map_err(db_err)?,
        chunk_count: row.try_get("chunk_count").map_err(db_err)?,
        embedding_model: row.try_get("embedding_model").map_err(db_err)?,
        stage: parse_column::<IngestStage>(row, "stage")?,
        text_hash: row.try_get("text_hash").map_err(db_err)?,
        uploaded_at: from_millis(row.try_get("uploaded_at").map_err(db_err)?),
    })
}

fn ticket_from_row(row: &SqliteRow) -> Result<Ticket> {
    let confidence: Option<i64> = row.try_get("ai_confidence").map_err(db_err)?;
    Ok(Ticket {
        id: row.try_get("id").map_err(db_err)?,
        tenant_id: row.try_get("tenant_id").map_err(db_err)?,
        contact: ContactFields {
            name: row.try_get("customer_name").map_err(db_err)?,
            email: row.try_get("customer_email").map_err(db_err)?,
            phone: row.try_get("customer_phone").map_err(db_err)?,
        },
        subject: row.try_get("subject").map_err(db_err)?,
        description: row.try_get("description").map_err(db_err)?,
        category: parse_column(row, "category")?,
        priority: parse_column(row, "priority")?,
        status: parse_column(row, "status")?,
        ai_confidence: confidence.map(|c| c.clamp(0, 100) as u8),
        agent_notes: row.try_get("agent_notes").map_err(db_err)?,
        created_at: from_millis(row.try_get("created_at").map_err(db_err)?),
        updated_at: from_millis(row.try_get("updated_at").map_err(db_err)?),
    })
}

#[async_trait]
impl VectorIndex for SqliteStore {
    async fn upsert(
        &self,
        tenant_id: TenantId,
        document_id: DocumentId,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<usize> {
        validate_upsert(tenant_id, document_id, chunks, vectors)?;
        let mut tx = self.pool.begin().await.map_err(index_err)?;

        for (chunk, vector) in chunks.iter().zip(vectors) {
            let id = chunk.record_id();
            let existing: Option<i64> =
                sqlx::query_scalar("SELECT tenant_id FROM embeddings WHERE id = ?")
                    .bind(&id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(index_err)?;
            if let Some(existing) = existing {
                if existing != tenant_id {
                    return Err(Error::TenantMismatch {
                        record_id: id,
                        existing,
                        requested: tenant_id,
                    });
                }
            }

            sqlx::query(
                r#"
                INSERT INTO embeddings (id, tenant_id, document_id, chunk_index, chunk_text, dims, vector)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    chunk_text = excluded.chunk_text,
                    dims = excluded.dims,
                    vector = excluded.vector
                "#,
            )
            .bind(&id)
            .bind(tenant_id)
            .bind(document_id)
            .bind(chunk.chunk_index as i64)
            .bind(&chunk.text)
            .bind(vector.len() as i64)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await
            .map_err(index_err)?;
        }

        tx.commit().await.map_err(index_err)?;
        Ok(chunks.len())
    }

    async fn query(&self, tenant_id: TenantId, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        // Records written by a model of another width are not comparable.
        let rows = sqlx::query(
            r#"
            SELECT document_id, chunk_index, chunk_text, vector FROM embeddings
            WHERE tenant_id = ? AND dims = ?
            "#,
        )
        .bind(tenant_id)
        .bind(vector.len() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(index_err)?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.try_get("vector").map_err(index_err)?;
            let chunk_index: i64 = row.try_get("chunk_index").map_err(index_err)?;
            hits.push(ScoredChunk {
                document_id: row.try_get("document_id").map_err(index_err)?,
                chunk_index: chunk_index as usize,
                chunk_text: row.try_get("chunk_text").map_err(index_err)?,
                similarity: cosine_similarity(vector, &blob_to_vec(&blob)),
            });
        }
        Ok(rank_hits(hits, k))
    }

    async fn purge_document(&self, tenant_id: TenantId, document_id: DocumentId) -> Result<usize> {
        let result = sqlx::query("DELETE FROM embeddings WHERE tenant_id = ? AND document_id = ?")
            .bind(tenant_id)
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(index_err)?;
        Ok(result.rows_affected() as usize)
    }

    async fn count(&self, tenant_id: TenantId) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM embeddings WHERE tenant_id = ?")
            .bind(tenant_id)
            .fetch_one(&self.pool)
            .await
            .map_err(index_err)?;
        Ok(n as usize)
    }
}

#[async_trait]
impl DocumentRepository for SqliteStore {
    async fn insert(&self, doc: &NewDocument) -> Result<Document> {
        let now = Utc::now().timestamp_millis();
        let result = sqlx::query(
            r#"
            INSERT INTO documents (tenant_id, file_name, file_type, file_size, stage, uploaded_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(doc.tenant_id)
        .bind(&doc.file_name)
        .bind(&doc.file_type)
        .bind(doc.file_size)
        .bind(IngestStage::Queued.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        let id = result.last_insert_rowid();
        DocumentRepository::get(self, id)
            .await?
            .ok_or(Error::DocumentNotFound(id))
    }

    async fn get(&self, id: DocumentId) -> Result<Option<Document>> {
        let row = sqlx::query("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(document_from_row).transpose()
    }

    async fn set_stage(&self, id: DocumentId, stage: IngestStage) -> Result<()> {
        let result = sqlx::query("UPDATE documents SET stage = ? WHERE id = ?")
            .bind(stage.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(Error::DocumentNotFound(id));
        }
        Ok(())
    }

    async fn reset_for_ingest(&self, id: DocumentId) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET processed = 0, processing_error = NULL, chunk_count = 0,
                embedding_model = NULL, text_hash = NULL, stage = ?
            WHERE id = ?
            "#,
        )
        .bind(IngestStage::Queued.as_str())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(Error::DocumentNotFound(id));
        }
        Ok(())
    }

    async fn mark_processed(&self, id: DocumentId, outcome: &IngestSuccess) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET processed = 1, processing_error = NULL, chunk_count = ?,
                embedding_model = ?, text_hash = ?, stage = ?
            WHERE id = ?
            "#,
        )
        .bind(outcome.chunk_count)
        .bind(&outcome.embedding_model)
        .bind(&outcome.text_hash)
        .bind(IngestStage::Done.as_str())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(Error::DocumentNotFound(id));
        }
        Ok(())
    }

    async fn mark_failed(&self, id: DocumentId, error: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE documents SET processed = 0, processing_error = ?, stage = ? WHERE id = ?",
        )
        .bind(error)
        .bind(IngestStage::Failed.as_str())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(Error::DocumentNotFound(id));
        }
        Ok(())
    }

    async fn delete(&self, id: DocumentId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TicketRepository for SqliteStore {
    async fn create(&self, ticket: &NewTicket) -> Result<Ticket> {
        let now = Utc::now().timestamp_millis();
        let result = sqlx::query(
            r#"
            INSERT INTO tickets (tenant_id, customer_name, customer_email, customer_phone,
                                 subject, description, category, priority, status,
                                 ai_confidence, agent_notes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(ticket.tenant_id)
        .bind(&ticket.contact.name)
        .bind(&ticket.contact.email)
        .bind(&ticket.contact.phone)
        .bind(&ticket.subject)
        .bind(&ticket.description)
        .bind(ticket.category.as_str())
        .bind(ticket.priority.as_str())
        .bind(ticket.status.as_str())
        .bind(ticket.ai_confidence.map(i64::from))
        .bind(&ticket.agent_notes)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        let id = result.last_insert_rowid();
        TicketRepository::get(self, id)
            .await?
            .ok_or(Error::TicketNotFound(id))
    }

    async fn get(&self, id: TicketId) -> Result<Option<Ticket>> {
        let row = sqlx::query("SELECT * FROM tickets WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(ticket_from_row).transpose()
    }

    async fn update_status(
        &self,
        id: TicketId,
        status: TicketStatus,
        notes: Option<&str>,
    ) -> Result<Ticket> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET status = ?, agent_notes = COALESCE(?, agent_notes), updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(notes)
        .bind(Utc::now().timestamp_millis())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(Error::TicketNotFound(id));
        }
        TicketRepository::get(self, id)
            .await?
            .ok_or(Error::TicketNotFound(id))
    }
}
