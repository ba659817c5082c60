//! Reasoning-model seam.
//!
//! Callers own the generation budget: retrieval answers and triage each pass
//! their own temperature and token cap. Implementations make one request per
//! call and map every failure to [`Error::Generation`](crate::error::Error).

use async_trait::async_trait;

use crate::error::Result;

/// Sampling temperature and output-token cap for one call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationBudget {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationBudget {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 300,
        }
    }
}

/// A system instruction plus user content.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub budget: GenerationBudget,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>, budget: GenerationBudget) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            budget,
        }
    }
}

#[async_trait]
pub trait CompletionModel: Send + Sync {
    fn model_name(&self) -> &str;
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}
