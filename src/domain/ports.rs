use crate::domain::errors::{EvaluationError, ProviderError};
use crate::domain::optimization::Assignment;
use crate::domain::types::{GenerationOptions, ProviderCapabilities};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

// Need async_trait for async functions in traits
#[async_trait]
pub trait StrategyProvider: Send + Sync {
    /// Stable identifier used in requests and failure metadata
    fn id(&self) -> &str;

    fn capabilities(&self) -> ProviderCapabilities;

    /// Generates strategy source code for the prompt. Adapters are stateless
    /// per request; the underlying client handle must be safe to share
    /// across concurrent calls.
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, ProviderError>;
}

/// Optional prompt-seeding collaborator. A missing template never fails
/// generation, it only omits augmentation.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn get_template(&self, id: &str) -> Result<Option<String>>;
}

/// Backtest/metric collaborator invoked exactly once per optimization trial
#[async_trait]
pub trait StrategyEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        strategy_code: &str,
        assignment: &Assignment,
    ) -> Result<f64, EvaluationError>;
}

/// Persistence collaborator for callers. The core never invokes it.
#[async_trait]
pub trait StrategyRepository: Send + Sync {
    async fn store(
        &self,
        strategy_id: &str,
        code: &str,
        metadata: HashMap<String, String>,
    ) -> Result<()>;
}
