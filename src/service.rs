//! The support service facade: document registration and ingestion,
//! knowledge-base questions, and ticket triage behind one handle.
//!
//! Every dependency is injected as `Arc<dyn Trait>`; [`SupportService::from_config`]
//! wires the SQLite store and the configured providers, tests wire the
//! in-memory store and deterministic fakes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::info;

use easyserve_core::answer::AnswerGenerator;
use easyserve_core::chunk::Chunker;
use easyserve_core::completion::{CompletionModel, GenerationBudget};
use easyserve_core::embedding::Embedder;
use easyserve_core::models::{
    ContactFields, Document, DocumentId, NewDocument, ScoredChunk, TenantId,
};
use easyserve_core::retrieval::{Retriever, DEFAULT_TOP_K};
use easyserve_core::store::{DocumentRepository, TicketRepository, VectorIndex};
use easyserve_core::triage::{TriageAgent, TriageOutcome, TriageRequest};
use easyserve_core::{Error, Result};

use crate::completion::create_completion_model;
use crate::config::Config;
use crate::embedding::create_embedder;
use crate::extract::{mime_from_path, normalize_mime};
use crate::ingest::{IngestReport, IngestionPipeline};
use crate::sqlite_store::SqliteStore;
use crate::{db, migrate};

/// Backends the service is assembled from.
#[derive(Clone)]
pub struct ServiceParts {
    pub documents: Arc<dyn DocumentRepository>,
    pub index: Arc<dyn VectorIndex>,
    pub tickets: Arc<dyn TicketRepository>,
    pub embedder: Arc<dyn Embedder>,
    pub model: Arc<dyn CompletionModel>,
}

/// Tunables the service applies on every call.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub chunker: Chunker,
    pub embed_batch_size: usize,
    pub top_k: usize,
    pub answer_budget: GenerationBudget,
    pub triage_budget: GenerationBudget,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            chunker: Chunker::default(),
            embed_batch_size: 64,
            top_k: DEFAULT_TOP_K,
            answer_budget: GenerationBudget::default(),
            triage_budget: GenerationBudget::default(),
        }
    }
}

impl ServiceSettings {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            chunker: Chunker::new(config.chunking.max_chars, config.chunking.overlap_chars)?,
            embed_batch_size: config.embedding.batch_size,
            top_k: config.retrieval.top_k,
            answer_budget: config.retrieval.budget(),
            triage_budget: config.triage.budget(),
        })
    }
}

/// Answer plus the chunks it was grounded on, best first.
#[derive(Debug, Clone, Serialize)]
pub struct QueryAnswer {
    pub answer: String,
    pub retrieved: Vec<ScoredChunk>,
}

pub struct SupportService {
    documents: Arc<dyn DocumentRepository>,
    index: Arc<dyn VectorIndex>,
    pipeline: Arc<IngestionPipeline>,
    retriever: Retriever,
    answers: AnswerGenerator,
    triage: TriageAgent,
    top_k: usize,
}

impl SupportService {
    pub fn new(parts: ServiceParts, settings: ServiceSettings) -> Self {
        let pipeline = Arc::new(IngestionPipeline::new(
            parts.documents.clone(),
            parts.index.clone(),
            parts.embedder.clone(),
            settings.chunker,
            settings.embed_batch_size,
        ));
        Self {
            retriever: Retriever::new(parts.embedder, parts.index.clone()),
            answers: AnswerGenerator::new(parts.model.clone(), settings.answer_budget),
            triage: TriageAgent::new(parts.model, parts.tickets, settings.triage_budget),
            documents: parts.documents,
            index: parts.index,
            pipeline,
            top_k: settings.top_k,
        }
    }

    /// Open (and migrate) the configured database and build the providers.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let pool = db::connect(config).await?;
        migrate::run_migrations(&pool).await?;
        let store = Arc::new(SqliteStore::new(pool));
        let parts = ServiceParts {
            documents: store.clone(),
            index: store.clone(),
            tickets: store,
            embedder: create_embedder(&config.embedding)?,
            model: create_completion_model(&config.completion)?,
        };
        Ok(Self::new(parts, ServiceSettings::from_config(config)?))
    }

    /// Record an uploaded file. The MIME type is taken from `mime` when
    /// given, otherwise inferred from the extension.
    pub async fn register_document(
        &self,
        tenant_id: TenantId,
        file_path: &Path,
        mime: Option<&str>,
    ) -> Result<Document> {
        let metadata = tokio::fs::metadata(file_path).await.map_err(|e| {
            Error::InvalidInput(format!("cannot read {}: {}", file_path.display(), e))
        })?;
        if !metadata.is_file() {
            return Err(Error::InvalidInput(format!(
                "{} is not a file",
                file_path.display()
            )));
        }
        let file_type = match mime {
            Some(m) => normalize_mime(m),
            None => mime_from_path(file_path)
                .map(str::to_string)
                .ok_or_else(|| {
                    Error::InvalidInput(format!(
                        "cannot infer a MIME type for {}; pass one explicitly",
                        file_path.display()
                    ))
                })?,
        };
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_path.display().to_string());

        let doc = self
            .documents
            .insert(&NewDocument {
                tenant_id,
                file_name,
                file_type,
                file_size: metadata.len() as i64,
            })
            .await?;
        info!(document_id = doc.id, tenant_id, file = %doc.file_name, "document registered");
        Ok(doc)
    }

    /// Start ingestion in the background.
    pub fn ingest(&self, document_id: DocumentId, file_path: PathBuf) -> JoinHandle<()> {
        self.pipeline.spawn(document_id, file_path)
    }

    /// Run ingestion and wait for it.
    pub async fn ingest_now(&self, document_id: DocumentId, file_path: &Path) -> Result<IngestReport> {
        self.pipeline.run(document_id, file_path).await
    }

    pub async fn document_status(&self, document_id: DocumentId) -> Result<Document> {
        self.documents
            .get(document_id)
            .await?
            .ok_or(Error::DocumentNotFound(document_id))
    }

    /// Remove a document and its vector records. Returns the records purged.
    pub async fn delete_document(&self, document_id: DocumentId) -> Result<usize> {
        let doc = self.document_status(document_id).await?;
        let purged = self.index.purge_document(doc.tenant_id, doc.id).await?;
        self.documents.delete(doc.id).await?;
        info!(document_id, purged, "document deleted");
        Ok(purged)
    }

    pub async fn retrieve_and_answer(&self, tenant_id: TenantId, query: &str) -> Result<QueryAnswer> {
        let retrieved = self.retriever.retrieve(tenant_id, query, self.top_k).await?;
        let answer = self.answers.answer(query, &retrieved).await?;
        Ok(QueryAnswer { answer, retrieved })
    }

    pub async fn run_triage(
        &self,
        tenant_id: TenantId,
        contact: ContactFields,
        message: &str,
    ) -> Result<TriageOutcome> {
        self.triage
            .run(TriageRequest {
                tenant_id,
                contact,
                message: message.to_string(),
            })
            .await
    }
}
