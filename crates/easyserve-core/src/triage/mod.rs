//! Ticket triage: classify a customer message, open a ticket, then either
//! hand it to a human or draft an acknowledgement.
//!
//! The flow is a fixed, acyclic sequence of typed stages:
//!
//! ```text
//! TriageRequest ──analyze──▶ Analyzed ──create_ticket──▶ Route
//!                                                        ├─ Escalate(TicketCreated) ──escalate──▶ TriageOutcome
//!                                                        └─ Respond(TicketCreated)  ──respond───▶ TriageOutcome
//! ```
//!
//! Each stage consumes its input, so a ticket can only be escalated or
//! answered after it exists. `create_ticket` is the only place a ticket is
//! inserted; the route is chosen solely from `needs_escalation`.

pub mod classify;

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::completion::{CompletionModel, CompletionRequest, GenerationBudget};
use crate::error::{Error, Result};
use crate::models::{
    ContactFields, NewTicket, TenantId, TicketCategory, TicketId, TicketPriority, TicketStatus,
};
use crate::store::TicketRepository;

pub use classify::{parse_classification, Classification};

/// Fixed reply sent when a ticket is handed to a human.
pub const ESCALATION_MESSAGE: &str = "Thanks for reaching out. Your request has been escalated \
to our support team, and they'll get back to you shortly.";

const RESPOND_SYSTEM_PROMPT: &str = "You are a polite e-commerce support assistant.";

/// Entry stage: who wrote in, and what they said.
#[derive(Debug, Clone)]
pub struct TriageRequest {
    pub tenant_id: TenantId,
    pub contact: ContactFields,
    pub message: String,
}

/// The request plus the model's (or fallback) classification.
#[derive(Debug, Clone)]
pub struct Analyzed {
    pub request: TriageRequest,
    pub classification: Classification,
    /// Set when the reply could not be decoded and the fallback was used.
    pub parse_error: Option<String>,
}

/// A committed ticket awaiting its reply.
#[derive(Debug, Clone)]
pub struct TicketCreated {
    pub analyzed: Analyzed,
    pub ticket_id: TicketId,
}

/// Branch taken after `create_ticket`.
#[derive(Debug, Clone)]
pub enum Route {
    Escalate(TicketCreated),
    Respond(TicketCreated),
}

/// Final result of a triage run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriageOutcome {
    pub ticket_id: TicketId,
    pub response: String,
    pub priority: TicketPriority,
    pub category: TicketCategory,
    pub escalated: bool,
    pub confidence: u8,
}

impl TriageOutcome {
    fn from_ticket(created: &TicketCreated, response: String) -> Self {
        let c = &created.analyzed.classification;
        Self {
            ticket_id: created.ticket_id,
            response,
            priority: c.priority,
            category: c.category,
            escalated: c.needs_escalation,
            confidence: c.ai_confidence,
        }
    }
}

pub struct TriageAgent {
    model: Arc<dyn CompletionModel>,
    tickets: Arc<dyn TicketRepository>,
    budget: GenerationBudget,
}

impl TriageAgent {
    pub fn new(
        model: Arc<dyn CompletionModel>,
        tickets: Arc<dyn TicketRepository>,
        budget: GenerationBudget,
    ) -> Self {
        Self {
            model,
            tickets,
            budget,
        }
    }

    /// Run every stage in order.
    pub async fn run(&self, request: TriageRequest) -> Result<TriageOutcome> {
        let analyzed = self.analyze(request).await?;
        match self.create_ticket(analyzed).await? {
            Route::Escalate(created) => self.escalate(created).await,
            Route::Respond(created) => self.respond(created).await,
        }
    }

    /// One classification call. Undecodable replies fall back to an
    /// escalating default; a failed call is returned as-is.
    pub async fn analyze(&self, request: TriageRequest) -> Result<Analyzed> {
        if request.message.trim().is_empty() {
            return Err(Error::InvalidInput("customer message is empty".into()));
        }
        if request.contact.email.trim().is_empty() {
            return Err(Error::InvalidInput("customer email is empty".into()));
        }

        let prompt = CompletionRequest::new(
            classify::SYSTEM_PROMPT,
            classify::build_prompt(&request.message),
            self.budget,
        );
        let reply = self.model.complete(&prompt).await?;

        let (classification, parse_error) = match parse_classification(&reply) {
            Ok(c) => (c, None),
            Err(e) => {
                let reason = match &e {
                    Error::ClassificationParse(msg) => msg.clone(),
                    other => other.to_string(),
                };
                warn!(tenant_id = request.tenant_id, error = %reason, "classification fallback");
                (Classification::fallback(&reason), Some(reason))
            }
        };

        Ok(Analyzed {
            request,
            classification,
            parse_error,
        })
    }

    /// Persist the ticket with status `open` and pick the branch.
    pub async fn create_ticket(&self, analyzed: Analyzed) -> Result<Route> {
        let c = &analyzed.classification;
        let ticket = self
            .tickets
            .create(&NewTicket {
                tenant_id: analyzed.request.tenant_id,
                contact: analyzed.request.contact.clone(),
                subject: c.subject.clone(),
                description: analyzed.request.message.clone(),
                category: c.category,
                priority: c.priority,
                status: TicketStatus::Open,
                ai_confidence: Some(c.ai_confidence),
                agent_notes: Some(c.agent_notes.clone()),
            })
            .await?;

        info!(
            ticket_id = ticket.id,
            tenant_id = ticket.tenant_id,
            category = %ticket.category,
            priority = %ticket.priority,
            escalate = c.needs_escalation,
            "ticket created"
        );

        let escalate = c.needs_escalation;
        let created = TicketCreated {
            analyzed,
            ticket_id: ticket.id,
        };
        Ok(if escalate {
            Route::Escalate(created)
        } else {
            Route::Respond(created)
        })
    }

    /// Move the ticket to `in_progress` and reply with the fixed message.
    pub async fn escalate(&self, created: TicketCreated) -> Result<TriageOutcome> {
        let notes = created.analyzed.classification.agent_notes.clone();
        self.tickets
            .update_status(created.ticket_id, TicketStatus::InProgress, Some(&notes))
            .await?;
        info!(ticket_id = created.ticket_id, "ticket escalated");
        Ok(TriageOutcome::from_ticket(
            &created,
            ESCALATION_MESSAGE.to_string(),
        ))
    }

    /// Draft a short acknowledgement. On failure the ticket stays committed.
    pub async fn respond(&self, created: TicketCreated) -> Result<TriageOutcome> {
        let prompt = CompletionRequest::new(
            RESPOND_SYSTEM_PROMPT,
            format!(
                "Customer message:\n{}\n\nWrite a short reassuring response confirming ticket creation.",
                created.analyzed.request.message
            ),
            self.budget,
        );
        match self.model.complete(&prompt).await {
            Ok(reply) => Ok(TriageOutcome::from_ticket(&created, reply.trim().to_string())),
            Err(e) => {
                warn!(ticket_id = created.ticket_id, error = %e, "reply generation failed");
                Err(Error::ReplyUnavailable {
                    ticket_id: created.ticket_id,
                    source: Box::new(e),
                })
            }
        }
    }
}
