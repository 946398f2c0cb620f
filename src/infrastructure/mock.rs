use crate::domain::errors::{EvaluationError, ProviderError};
use crate::domain::optimization::Assignment;
use crate::domain::ports::{StrategyEvaluator, StrategyProvider};
use crate::domain::types::{GenerationOptions, ProviderCapabilities};
use async_trait::async_trait;
use std::time::Duration;

/// Scripted behavior for one mock provider
#[derive(Debug, Clone)]
pub enum MockBehavior {
    Reply { code: String, delay: Duration },
    Fail(ProviderError),
    /// Never completes; exercises timeout and cancellation paths
    Hang,
}

/// Deterministic provider double for exercising fan-out semantics without
/// network access.
pub struct MockProvider {
    id: String,
    behavior: MockBehavior,
}

impl MockProvider {
    pub fn new(id: &str, behavior: MockBehavior) -> Self {
        Self {
            id: id.to_string(),
            behavior,
        }
    }

    pub fn replying(id: &str, code: &str) -> Self {
        Self::new(
            id,
            MockBehavior::Reply {
                code: code.to_string(),
                delay: Duration::ZERO,
            },
        )
    }

    pub fn replying_after(id: &str, code: &str, delay: Duration) -> Self {
        Self::new(
            id,
            MockBehavior::Reply {
                code: code.to_string(),
                delay,
            },
        )
    }

    pub fn failing(id: &str, error: ProviderError) -> Self {
        Self::new(id, MockBehavior::Fail(error))
    }
}

#[async_trait]
impl StrategyProvider for MockProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_batching: false,
            supports_streaming: false,
            max_tokens: 4096,
        }
    }

    async fn generate(
        &self,
        _prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<String, ProviderError> {
        match &self.behavior {
            MockBehavior::Reply { code, delay } => {
                if !delay.is_zero() {
                    tokio::time::sleep(*delay).await;
                }
                Ok(code.clone())
            }
            MockBehavior::Fail(error) => Err(error.clone()),
            MockBehavior::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

/// Deterministic stand-in for a backtest engine: a smooth multimodal
/// function of the parameter values. Lets the optimizer run end to end
/// (demos, integration tests) without market data.
pub struct SyntheticEvaluator;

#[async_trait]
impl StrategyEvaluator for SyntheticEvaluator {
    async fn evaluate(
        &self,
        _strategy_code: &str,
        assignment: &Assignment,
    ) -> Result<f64, EvaluationError> {
        let objective = assignment
            .values
            .iter()
            .enumerate()
            .map(|(i, (_, value))| {
                let x = value.as_f64();
                (x / (3.0 + i as f64)).sin() - (x / 100.0 - 0.5).powi(2)
            })
            .sum();
        Ok(objective)
    }
}
