//! SQLite store behavior: vector upsert/query/purge, document status
//! transitions, and ticket persistence.

use easyserve::config::Config;
use easyserve::sqlite_store::SqliteStore;
use easyserve::{db, migrate};
use easyserve_core::models::{
    Chunk, ContactFields, IngestStage, IngestSuccess, NewDocument, NewTicket, TicketCategory,
    TicketPriority, TicketStatus,
};
use easyserve_core::store::{DocumentRepository, TicketRepository, VectorIndex};
use easyserve_core::Error;
use tempfile::TempDir;

async fn open_store(tmp: &TempDir) -> SqliteStore {
    let config: Config = toml::from_str(&format!(
        "[db]\npath = \"{}\"\n",
        tmp.path().join("store.sqlite").display()
    ))
    .unwrap();
    let pool = db::connect(&config).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    SqliteStore::new(pool)
}

async fn new_document(store: &SqliteStore, tenant_id: i64) -> i64 {
    store
        .insert(&NewDocument {
            tenant_id,
            file_name: "faq.txt".into(),
            file_type: "text/plain".into(),
            file_size: 64,
        })
        .await
        .unwrap()
        .id
}

fn chunk(tenant_id: i64, document_id: i64, chunk_index: usize, text: &str) -> Chunk {
    Chunk {
        document_id,
        tenant_id,
        chunk_index,
        text: text.to_string(),
    }
}

fn new_ticket(tenant_id: i64) -> NewTicket {
    NewTicket {
        tenant_id,
        contact: ContactFields {
            name: Some("Ada".into()),
            email: "ada@example.com".into(),
            phone: None,
        },
        subject: "Charged twice".into(),
        description: "I was charged twice!".into(),
        category: TicketCategory::Billing,
        priority: TicketPriority::High,
        status: TicketStatus::Open,
        ai_confidence: Some(92),
        agent_notes: Some("duplicate charge".into()),
    }
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    migrate::run_migrations(store.pool()).await.unwrap();
    assert_eq!(store.count(1).await.unwrap(), 0);
}

#[tokio::test]
async fn query_orders_by_similarity_then_position() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let doc = new_document(&store, 1).await;
    let chunks = vec![
        chunk(1, doc, 0, "north"),
        chunk(1, doc, 1, "east"),
        chunk(1, doc, 2, "north again"),
    ];
    let vectors = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0]];
    assert_eq!(store.upsert(1, doc, &chunks, &vectors).await.unwrap(), 3);

    let hits = store.query(1, &[1.0, 0.0], 5).await.unwrap();
    let order: Vec<usize> = hits.iter().map(|h| h.chunk_index).collect();
    assert_eq!(order, vec![0, 2, 1]);
    assert!((hits[0].similarity - 1.0).abs() < 1e-6);

    assert_eq!(store.query(1, &[1.0, 0.0], 1).await.unwrap().len(), 1);
    assert!(store.query(1, &[1.0, 0.0], 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn upsert_overwrites_same_position() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let doc = new_document(&store, 1).await;
    store
        .upsert(1, doc, &[chunk(1, doc, 0, "old")], &[vec![1.0, 0.0]])
        .await
        .unwrap();
    store
        .upsert(1, doc, &[chunk(1, doc, 0, "new")], &[vec![0.0, 1.0]])
        .await
        .unwrap();

    assert_eq!(store.count(1).await.unwrap(), 1);
    let hits = store.query(1, &[0.0, 1.0], 1).await.unwrap();
    assert_eq!(hits[0].chunk_text, "new");
}

#[tokio::test]
async fn upsert_refuses_foreign_tenant_record() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let doc = new_document(&store, 1).await;
    store
        .upsert(1, doc, &[chunk(1, doc, 0, "mine")], &[vec![1.0]])
        .await
        .unwrap();
    let err = store
        .upsert(2, doc, &[chunk(2, doc, 0, "theirs")], &[vec![1.0]])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::TenantMismatch {
            existing: 1,
            requested: 2,
            ..
        }
    ));
    assert_eq!(store.count(2).await.unwrap(), 0);
}

#[tokio::test]
async fn purge_only_touches_one_document() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let first = new_document(&store, 1).await;
    let second = new_document(&store, 1).await;
    store
        .upsert(
            1,
            first,
            &[chunk(1, first, 0, "a"), chunk(1, first, 1, "b")],
            &[vec![1.0], vec![1.0]],
        )
        .await
        .unwrap();
    store
        .upsert(1, second, &[chunk(1, second, 0, "c")], &[vec![1.0]])
        .await
        .unwrap();

    assert_eq!(store.purge_document(1, first).await.unwrap(), 2);
    assert_eq!(store.purge_document(1, first).await.unwrap(), 0);
    assert_eq!(store.count(1).await.unwrap(), 1);
}

#[tokio::test]
async fn deleting_a_document_drops_its_records() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let doc = new_document(&store, 1).await;
    let other = new_document(&store, 1).await;
    store
        .upsert(
            1,
            doc,
            &[chunk(1, doc, 0, "a"), chunk(1, doc, 1, "b")],
            &[vec![1.0, 0.0], vec![1.0, 0.0]],
        )
        .await
        .unwrap();
    store
        .upsert(1, other, &[chunk(1, other, 0, "c")], &[vec![1.0, 0.0]])
        .await
        .unwrap();

    assert!(store.delete(doc).await.unwrap());
    assert_eq!(store.count(1).await.unwrap(), 1);
    let hits = store.query(1, &[1.0, 0.0], 5).await.unwrap();
    assert!(hits.iter().all(|h| h.document_id == other));
}

#[tokio::test]
async fn upsert_for_deleted_document_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let doc = new_document(&store, 1).await;
    store.delete(doc).await.unwrap();

    let err = store
        .upsert(1, doc, &[chunk(1, doc, 0, "ghost")], &[vec![1.0, 0.0]])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::IndexUnavailable(_)));
    assert!(store.query(1, &[1.0, 0.0], 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn query_skips_records_of_another_width() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let old = new_document(&store, 1).await;
    let new = new_document(&store, 1).await;
    store
        .upsert(1, old, &[chunk(1, old, 0, "old model")], &[vec![1.0, 0.0, 0.0]])
        .await
        .unwrap();
    store
        .upsert(1, new, &[chunk(1, new, 0, "new model")], &[vec![1.0, 0.0]])
        .await
        .unwrap();

    let hits = store.query(1, &[1.0, 0.0], 5).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chunk_text, "new model");
}

#[tokio::test]
async fn document_status_transitions() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let doc = store
        .insert(&NewDocument {
            tenant_id: 3,
            file_name: "manual.pdf".into(),
            file_type: "application/pdf".into(),
            file_size: 2048,
        })
        .await
        .unwrap();
    assert!(!doc.processed);
    assert_eq!(doc.stage, IngestStage::Queued);

    store.set_stage(doc.id, IngestStage::Embedding).await.unwrap();
    store.mark_failed(doc.id, "embedding service down").await.unwrap();
    let failed = DocumentRepository::get(&store, doc.id).await.unwrap().unwrap();
    assert_eq!(failed.stage, IngestStage::Failed);
    assert_eq!(failed.processing_error.as_deref(), Some("embedding service down"));

    store
        .mark_processed(
            doc.id,
            &IngestSuccess {
                chunk_count: 2,
                embedding_model: "hashing-32".into(),
                text_hash: "old".into(),
            },
        )
        .await
        .unwrap();
    store.reset_for_ingest(doc.id).await.unwrap();
    let reset = DocumentRepository::get(&store, doc.id).await.unwrap().unwrap();
    assert_eq!(reset.stage, IngestStage::Queued);
    assert!(!reset.processed);
    assert_eq!(reset.chunk_count, 0);
    assert!(reset.text_hash.is_none());
    assert!(reset.embedding_model.is_none());

    store
        .mark_processed(
            doc.id,
            &IngestSuccess {
                chunk_count: 4,
                embedding_model: "hashing-64".into(),
                text_hash: "abc".into(),
            },
        )
        .await
        .unwrap();
    let done = DocumentRepository::get(&store, doc.id).await.unwrap().unwrap();
    assert!(done.processed);
    assert_eq!(done.stage, IngestStage::Done);
    assert_eq!(done.chunk_count, 4);
    assert!(done.processing_error.is_none());

    assert!(store.delete(doc.id).await.unwrap());
    assert!(!store.delete(doc.id).await.unwrap());
    assert!(matches!(
        store.set_stage(doc.id, IngestStage::Chunking).await,
        Err(Error::DocumentNotFound(_))
    ));
}

#[tokio::test]
async fn ticket_roundtrip_and_status_update() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let ticket = store.create(&new_ticket(4)).await.unwrap();
    assert_eq!(ticket.status, TicketStatus::Open);
    assert_eq!(ticket.category, TicketCategory::Billing);
    assert_eq!(ticket.ai_confidence, Some(92));
    assert_eq!(ticket.contact.name.as_deref(), Some("Ada"));

    let updated = store
        .update_status(ticket.id, TicketStatus::InProgress, None)
        .await
        .unwrap();
    assert_eq!(updated.status, TicketStatus::InProgress);
    assert_eq!(updated.agent_notes.as_deref(), Some("duplicate charge"));
    assert!(updated.updated_at >= ticket.updated_at);

    assert!(matches!(
        store.update_status(9999, TicketStatus::Closed, None).await,
        Err(Error::TicketNotFound(9999))
    ));
}
