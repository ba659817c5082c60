//! Ticket triage through the service facade, persisted in SQLite.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use easyserve::config::Config;
use easyserve::service::{ServiceParts, ServiceSettings, SupportService};
use easyserve::sqlite_store::SqliteStore;
use easyserve::{db, migrate};
use easyserve_core::completion::{CompletionModel, CompletionRequest};
use easyserve_core::embedding::HashingEmbedder;
use easyserve_core::models::{ContactFields, TicketCategory, TicketPriority, TicketStatus};
use easyserve_core::store::TicketRepository;
use easyserve_core::triage::classify::{FALLBACK_CONFIDENCE, FALLBACK_SUBJECT};
use easyserve_core::triage::ESCALATION_MESSAGE;
use easyserve_core::{Error, Result};

/// Replays queued replies in order; `None` simulates a provider failure.
struct ScriptedModel {
    replies: Mutex<VecDeque<Option<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    fn new(replies: &[Option<&str>]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.map(str::to_string)).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.prompts.lock().unwrap().push(request.user.clone());
        match self.replies.lock().unwrap().pop_front().flatten() {
            Some(reply) => Ok(reply),
            None => Err(Error::generation("provider unavailable")),
        }
    }
}

async fn setup(replies: &[Option<&str>]) -> (TempDir, Arc<SqliteStore>, Arc<ScriptedModel>, SupportService) {
    let tmp = TempDir::new().unwrap();
    let config: Config = toml::from_str(&format!(
        "[db]\npath = \"{}\"\n",
        tmp.path().join("triage.sqlite").display()
    ))
    .unwrap();
    let pool = db::connect(&config).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    let store = Arc::new(SqliteStore::new(pool));
    let model = Arc::new(ScriptedModel::new(replies));

    let service = SupportService::new(
        ServiceParts {
            documents: store.clone(),
            index: store.clone(),
            tickets: store.clone(),
            embedder: Arc::new(HashingEmbedder::new(32)),
            model: model.clone(),
        },
        ServiceSettings::default(),
    );
    (tmp, store, model, service)
}

fn contact() -> ContactFields {
    ContactFields {
        name: Some("Sam".into()),
        email: "sam@example.com".into(),
        phone: Some("+1 555 0100".into()),
    }
}

const BILLING_ESCALATION: &str = r#"{"subject":"Duplicate charge","category":"billing","priority":"high","needs_escalation":true,"ai_confidence":88,"agent_notes":"Customer reports a double charge."}"#;

#[tokio::test]
async fn double_charge_is_escalated() {
    let (_tmp, store, model, service) = setup(&[Some(BILLING_ESCALATION)]).await;

    let outcome = service
        .run_triage(2, contact(), "I was charged twice!")
        .await
        .unwrap();

    assert!(outcome.escalated);
    assert_eq!(outcome.response, ESCALATION_MESSAGE);
    assert_eq!(outcome.category, TicketCategory::Billing);
    assert_eq!(outcome.priority, TicketPriority::High);
    assert_eq!(outcome.confidence, 88);
    assert_eq!(model.calls(), 1);

    let ticket = TicketRepository::get(store.as_ref(), outcome.ticket_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ticket.status, TicketStatus::InProgress);
    assert_eq!(ticket.tenant_id, 2);
    assert_eq!(ticket.subject, "Duplicate charge");
    assert_eq!(ticket.description, "I was charged twice!");
    assert_eq!(ticket.contact, contact());
}

#[tokio::test]
async fn routine_question_gets_a_drafted_reply() {
    let classification = r#"Sure! Here you go:
{"subject":"Delivery time","category":"delivery","priority":"low","needs_escalation":false,"ai_confidence":75,"agent_notes":"Asks about shipping {window}."}
Let me know if you need anything else."#;
    let (_tmp, store, model, service) = setup(&[
        Some(classification),
        Some("  Thanks! Your ticket is open and we'll update you soon.  "),
    ])
    .await;

    let outcome = service
        .run_triage(2, contact(), "When will my parcel arrive?")
        .await
        .unwrap();

    assert!(!outcome.escalated);
    assert_eq!(
        outcome.response,
        "Thanks! Your ticket is open and we'll update you soon."
    );
    assert_eq!(outcome.category, TicketCategory::Delivery);
    assert_eq!(model.calls(), 2);

    let ticket = TicketRepository::get(store.as_ref(), outcome.ticket_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ticket.status, TicketStatus::Open);
    assert_eq!(
        ticket.agent_notes.as_deref(),
        Some("Asks about shipping {window}.")
    );
}

#[tokio::test]
async fn unparseable_classification_falls_back_to_escalation() {
    let (_tmp, store, _model, service) = setup(&[Some("I cannot help with that.")]).await;

    let outcome = service
        .run_triage(1, contact(), "Help!!")
        .await
        .unwrap();

    assert!(outcome.escalated);
    assert_eq!(outcome.confidence, FALLBACK_CONFIDENCE);
    let ticket = TicketRepository::get(store.as_ref(), outcome.ticket_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ticket.subject, FALLBACK_SUBJECT);
    assert_eq!(ticket.status, TicketStatus::InProgress);
}

#[tokio::test]
async fn failed_reply_keeps_the_ticket() {
    let classification = r#"{"subject":"Password reset","category":"technical","priority":"medium","needs_escalation":false,"ai_confidence":70,"agent_notes":"Reset link expired."}"#;
    let (_tmp, store, _model, service) = setup(&[Some(classification), None]).await;

    let err = service
        .run_triage(1, contact(), "My reset link expired")
        .await
        .unwrap_err();

    let ticket_id = match err {
        Error::ReplyUnavailable { ticket_id, .. } => ticket_id,
        other => panic!("expected ReplyUnavailable, got {other:?}"),
    };
    let ticket = TicketRepository::get(store.as_ref(), ticket_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ticket.status, TicketStatus::Open);
    assert_eq!(ticket.category, TicketCategory::Technical);
}

#[tokio::test]
async fn classification_outage_creates_no_ticket() {
    let (_tmp, store, _model, service) = setup(&[None]).await;

    let err = service
        .run_triage(1, contact(), "Where is my refund?")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "generation_error");
    assert!(TicketRepository::get(store.as_ref(), 1).await.unwrap().is_none());
}

#[tokio::test]
async fn blank_message_is_rejected_before_the_model() {
    let (_tmp, _store, model, service) = setup(&[Some(BILLING_ESCALATION)]).await;

    let err = service.run_triage(1, contact(), "   ").await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(model.calls(), 0);
}
