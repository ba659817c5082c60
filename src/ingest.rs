//! Document ingestion pipeline.
//!
//! Drives one document through `extract → chunk → embed → store`, recording
//! each stage on the document row. A run either ends `done` with
//! `processed = true` or `failed` with the error text recorded; it never
//! panics the host. Re-running a document first resets its status, then
//! purges every vector record it owns before writing the new ones, so a
//! shorter second version leaves no stale chunks behind. A failed run also
//! purges them: a `failed` document is never searchable.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use easyserve_core::chunk::{content_hash, Chunker};
use easyserve_core::embedding::{check_batch, Embedder};
use easyserve_core::models::{Document, DocumentId, IngestStage, IngestSuccess, TenantId};
use easyserve_core::store::{DocumentRepository, VectorIndex};
use easyserve_core::{Error, Result};

use crate::extract;

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub document_id: DocumentId,
    pub tenant_id: TenantId,
    pub chunk_count: usize,
    pub records_purged: usize,
    pub records_written: usize,
    pub embedding_model: String,
    pub text_hash: String,
}

pub struct IngestionPipeline {
    documents: Arc<dyn DocumentRepository>,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
    batch_size: usize,
}

impl IngestionPipeline {
    pub fn new(
        documents: Arc<dyn DocumentRepository>,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        chunker: Chunker,
        batch_size: usize,
    ) -> Self {
        Self {
            documents,
            index,
            embedder,
            chunker,
            batch_size: batch_size.max(1),
        }
    }

    /// Fire-and-forget: run on the tokio runtime and log the outcome.
    pub fn spawn(self: &Arc<Self>, document_id: DocumentId, file_path: PathBuf) -> JoinHandle<()> {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            match pipeline.run(document_id, &file_path).await {
                Ok(report) => info!(
                    document_id,
                    chunks = report.chunk_count,
                    "background ingestion finished"
                ),
                Err(e) => error!(document_id, code = e.code(), error = %e, "background ingestion failed"),
            }
        })
    }

    /// Run the pipeline to completion and record the outcome on the document.
    #[instrument(skip(self, file_path), fields(file = %file_path.display()))]
    pub async fn run(&self, document_id: DocumentId, file_path: &Path) -> Result<IngestReport> {
        let doc = self
            .documents
            .get(document_id)
            .await?
            .ok_or(Error::DocumentNotFound(document_id))?;
        self.documents.reset_for_ingest(document_id).await?;

        match self.execute(&doc, file_path).await {
            Ok(report) => {
                self.documents
                    .mark_processed(
                        document_id,
                        &IngestSuccess {
                            chunk_count: report.chunk_count as i64,
                            embedding_model: report.embedding_model.clone(),
                            text_hash: report.text_hash.clone(),
                        },
                    )
                    .await?;
                info!(
                    document_id,
                    tenant_id = doc.tenant_id,
                    chunks = report.chunk_count,
                    purged = report.records_purged,
                    "document processed"
                );
                Ok(report)
            }
            Err(e) => {
                warn!(document_id, code = e.code(), error = %e, "ingestion failed");
                if let Err(purge_err) = self.index.purge_document(doc.tenant_id, document_id).await {
                    error!(document_id, error = %purge_err, "could not purge records of failed document");
                }
                if let Err(record_err) = self.documents.mark_failed(document_id, &e.to_string()).await {
                    error!(document_id, error = %record_err, "could not record ingestion failure");
                }
                Err(e)
            }
        }
    }

    async fn execute(&self, doc: &Document, file_path: &Path) -> Result<IngestReport> {
        self.stage(doc.id, IngestStage::Extracting).await?;
        let text = self.extract(doc, file_path).await?;

        self.stage(doc.id, IngestStage::Chunking).await?;
        let chunks = self.chunker.chunk(doc.id, doc.tenant_id, &text);
        let text_hash = content_hash(&text);

        self.stage(doc.id, IngestStage::Embedding).await?;
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let embedded = self.embedder.embed(batch).await?;
            check_batch(batch.len(), self.embedder.dims(), &embedded)?;
            vectors.extend(embedded);
        }

        self.stage(doc.id, IngestStage::Storing).await?;
        let records_purged = self.index.purge_document(doc.tenant_id, doc.id).await?;
        let records_written = if chunks.is_empty() {
            0
        } else {
            self.index
                .upsert(doc.tenant_id, doc.id, &chunks, &vectors)
                .await?
        };

        Ok(IngestReport {
            document_id: doc.id,
            tenant_id: doc.tenant_id,
            chunk_count: chunks.len(),
            records_purged,
            records_written,
            embedding_model: self.embedder.model_name().to_string(),
            text_hash,
        })
    }

    async fn extract(&self, doc: &Document, file_path: &Path) -> Result<String> {
        let path = file_path.to_path_buf();
        let file_type = doc.file_type.clone();
        let file_name = doc.file_name.clone();
        tokio::task::spawn_blocking(move || extract::extract_file(&path, &file_type))
            .await
            .map_err(|e| Error::extraction(file_name, e))?
    }

    async fn stage(&self, id: DocumentId, stage: IngestStage) -> Result<()> {
        self.documents.set_stage(id, stage).await
    }
}
