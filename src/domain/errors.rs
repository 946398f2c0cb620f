use thiserror::Error;

/// Errors reported by a single LLM provider call
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Provider timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    #[error("Provider rejected credentials: {reason}")]
    Auth { reason: String },

    #[error("Rate limit exceeded: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Provider request failed: {reason}")]
    Unknown { reason: String },
}

impl ProviderError {
    /// Whether the caller may retry later (throttling), as opposed to a
    /// failure that will repeat (bad credentials) or already consumed its
    /// deadline (timeout).
    pub fn is_retry_later(&self) -> bool {
        matches!(self, ProviderError::RateLimited { .. })
    }
}

/// One provider's failure, kept as metadata alongside surviving results
#[derive(Debug, Clone)]
pub struct ProviderFailure {
    pub provider: String,
    pub error: ProviderError,
}

/// Errors surfaced by the request coordinator
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Invalid strategy request: {reason}")]
    InvalidRequest { reason: String },

    #[error("All {} requested providers failed", .causes.len())]
    AllProvidersFailed { causes: Vec<ProviderFailure> },
}

/// Errors reported by the external evaluation collaborator (backtest/metric engine)
#[derive(Debug, Clone, Error)]
pub enum EvaluationError {
    #[error("Evaluation failed: {reason}")]
    Failed { reason: String },
}

/// Synchronous failures of the optimization engine.
///
/// Run-level failures (consecutive evaluation errors past the threshold) are
/// not errors: the run terminates as `Failed { cause }` with its partial
/// trial history intact.
#[derive(Debug, Error)]
pub enum OptimizationError {
    #[error("Parameter space is empty")]
    EmptySpace,

    #[error("Invalid parameter space: {reason}")]
    InvalidSpace { reason: String },

    #[error("Invalid optimizer budget: {reason}")]
    InvalidBudget { reason: String },
}
