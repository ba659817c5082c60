//! Classification prompt and tolerant decoding of the model's reply.
//!
//! Models asked for "JSON only" still wrap it in prose or code fences now
//! and then. Decoding tries, in order: the whole reply as JSON, then the
//! first balanced `{...}` object in it. When both fail the caller substitutes
//! [`Classification::fallback`], which always routes to a human.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{TicketCategory, TicketPriority};

pub const SYSTEM_PROMPT: &str = "You are a backend API service.\n\
You must return ONLY valid JSON.\n\
No explanations.\n\
No reasoning.\n\
No markdown.\n\
If unsure, still output valid JSON.";

pub const FALLBACK_SUBJECT: &str = "Customer Support Request";
pub const FALLBACK_CONFIDENCE: u8 = 30;

/// Structured triage decision for one customer message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub subject: String,
    pub category: TicketCategory,
    pub priority: TicketPriority,
    pub needs_escalation: bool,
    /// 0–100.
    pub ai_confidence: u8,
    pub agent_notes: String,
}

impl Classification {
    /// Safe default used when the reply cannot be decoded.
    pub fn fallback(reason: &str) -> Self {
        Self {
            subject: FALLBACK_SUBJECT.to_string(),
            category: TicketCategory::General,
            priority: TicketPriority::High,
            needs_escalation: true,
            ai_confidence: FALLBACK_CONFIDENCE,
            agent_notes: format!("LLM JSON parsing failed: {}", reason),
        }
    }
}

/// User prompt asking for the classification fields.
pub fn build_prompt(message: &str) -> String {
    format!(
        "Analyze the customer message and return ONLY valid JSON.\n\
         \n\
         Required fields:\n\
         - subject\n\
         - category (refund, billing, technical, delivery, general)\n\
         - priority (low, medium, high, urgent)\n\
         - needs_escalation (true or false)\n\
         - ai_confidence (0-100)\n\
         - agent_notes\n\
         \n\
         Customer message:\n\
         {}\n",
        message
    )
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    subject: String,
    category: String,
    priority: String,
    needs_escalation: bool,
    ai_confidence: f64,
    #[serde(default)]
    agent_notes: Option<String>,
}

impl RawClassification {
    fn validate(self) -> Result<Classification> {
        let category = self
            .category
            .parse::<TicketCategory>()
            .map_err(|e| Error::ClassificationParse(e.to_string()))?;
        let priority = self
            .priority
            .parse::<TicketPriority>()
            .map_err(|e| Error::ClassificationParse(e.to_string()))?;
        if !(0.0..=100.0).contains(&self.ai_confidence) {
            return Err(Error::ClassificationParse(format!(
                "ai_confidence {} is outside 0-100",
                self.ai_confidence
            )));
        }
        let subject = self.subject.trim();
        if subject.is_empty() {
            return Err(Error::ClassificationParse("subject is empty".into()));
        }
        Ok(Classification {
            subject: subject.to_string(),
            category,
            priority,
            needs_escalation: self.needs_escalation,
            ai_confidence: self.ai_confidence.round() as u8,
            agent_notes: self.agent_notes.unwrap_or_default(),
        })
    }
}

fn decode(json: &str) -> Result<Classification> {
    serde_json::from_str::<RawClassification>(json)
        .map_err(|e| Error::ClassificationParse(e.to_string()))?
        .validate()
}

/// Decode a model reply into a [`Classification`].
pub fn parse_classification(reply: &str) -> Result<Classification> {
    let reply = reply.trim();
    if reply.is_empty() {
        return Err(Error::ClassificationParse("empty model response".into()));
    }

    match serde_json::from_str::<RawClassification>(reply) {
        Ok(raw) => raw.validate(),
        Err(direct) => match first_json_object(reply) {
            Some(object) => decode(object),
            None => Err(Error::ClassificationParse(format!(
                "no JSON object found ({})",
                direct
            ))),
        },
    }
}

/// First balanced `{...}` span, ignoring braces inside string literals.
pub fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
