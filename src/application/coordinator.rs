use crate::application::prompt::PromptBuilder;
use crate::application::scorer::ConfidenceScorer;
use crate::application::validator::CodeValidator;
use crate::domain::errors::{GenerationError, ProviderError, ProviderFailure};
use crate::domain::ports::TemplateStore;
use crate::domain::scoring::ScoreBreakdown;
use crate::domain::types::{GenerationOptions, ProviderResult, StrategyRequest};
use crate::domain::validation::ValidationReport;
use crate::infrastructure::observability::Metrics;
use crate::infrastructure::registry::ProviderRegistry;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_OVERALL_TIMEOUT: Duration = Duration::from_secs(45);

/// One validated, scored generation result
#[derive(Debug, Clone, Serialize)]
pub struct ScoredStrategy {
    pub result: ProviderResult,
    pub report: ValidationReport,
    pub score: ScoreBreakdown,
}

/// What a fan-out produced: ranked survivors plus per-provider failure
/// metadata. Failures are data, not errors, as long as one provider
/// succeeded.
#[derive(Debug)]
pub struct GenerationOutcome {
    pub ranked: Vec<ScoredStrategy>,
    pub failures: Vec<ProviderFailure>,
}

/// Fans a strategy request out to every requested provider concurrently,
/// validates and scores whatever comes back, and ranks the survivors.
///
/// Holds no mutable state across invocations; the registry is read-only and
/// shared, so concurrent `generate_strategies` calls are independent.
pub struct RequestCoordinator {
    registry: Arc<ProviderRegistry>,
    templates: Option<Arc<dyn TemplateStore>>,
    scorer: ConfidenceScorer,
    options: GenerationOptions,
    provider_timeout: Duration,
    overall_timeout: Duration,
    metrics: Metrics,
}

impl RequestCoordinator {
    pub fn new(registry: Arc<ProviderRegistry>, metrics: Metrics) -> Self {
        Self {
            registry,
            templates: None,
            scorer: ConfidenceScorer::default(),
            options: GenerationOptions::default(),
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            overall_timeout: DEFAULT_OVERALL_TIMEOUT,
            metrics,
        }
    }

    pub fn with_templates(mut self, templates: Arc<dyn TemplateStore>) -> Self {
        self.templates = Some(templates);
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// `provider_timeout` bounds each adapter call; `overall_timeout` bounds
    /// the whole fan-out.
    pub fn with_timeouts(mut self, provider_timeout: Duration, overall_timeout: Duration) -> Self {
        self.provider_timeout = provider_timeout;
        self.overall_timeout = overall_timeout;
        self
    }

    /// Generates, validates, scores and ranks strategies for one request.
    ///
    /// A provider failure never aborts its siblings. Only when every
    /// requested provider failed does the call fail, carrying all causes.
    pub async fn generate_strategies(
        &self,
        request: &StrategyRequest,
    ) -> Result<GenerationOutcome, GenerationError> {
        if request.description.trim().is_empty() {
            return Err(GenerationError::InvalidRequest {
                reason: "description is empty".to_string(),
            });
        }
        if request.providers.is_empty() {
            return Err(GenerationError::InvalidRequest {
                reason: "no providers requested".to_string(),
            });
        }

        let template = self.fetch_template(request).await;
        let prompt = PromptBuilder::build(request, template.as_deref());

        info!(
            "Dispatching request {} to {} providers",
            request.id,
            request.providers.len()
        );

        let mut failures: Vec<ProviderFailure> = Vec::new();
        let (tx, mut rx) = mpsc::channel(request.providers.len());
        let mut handles = Vec::new();
        let mut spawned: HashSet<String> = HashSet::new();

        for provider_id in &request.providers {
            let Some(adapter) = self.registry.get(provider_id) else {
                warn!("Unknown provider requested: {}", provider_id);
                failures.push(ProviderFailure {
                    provider: provider_id.clone(),
                    error: ProviderError::Unknown {
                        reason: "provider not registered".to_string(),
                    },
                });
                continue;
            };

            spawned.insert(provider_id.clone());
            let tx = tx.clone();
            let prompt = prompt.clone();
            let options = self.options.clone();
            let timeout = self.provider_timeout;
            let provider_id = provider_id.clone();

            handles.push(tokio::spawn(async move {
                let started = Instant::now();
                let outcome =
                    match tokio::time::timeout(timeout, adapter.generate(&prompt, &options)).await
                    {
                        Ok(result) => result,
                        Err(_) => Err(ProviderError::Timeout {
                            duration_ms: timeout.as_millis() as u64,
                        }),
                    };
                let latency_ms = started.elapsed().as_millis() as u64;
                let _ = tx.send((provider_id, outcome, latency_ms)).await;
            }));
        }
        drop(tx);

        // Collect as providers complete, bounded by the overall deadline.
        // Completion order is irrelevant: ranking below is deterministic.
        let mut completed: Vec<(String, Result<String, ProviderError>, u64)> = Vec::new();
        let deadline = tokio::time::sleep(self.overall_timeout);
        tokio::pin!(deadline);

        let mut outstanding = handles.len();
        while outstanding > 0 {
            tokio::select! {
                received = rx.recv() => {
                    match received {
                        Some(msg) => {
                            outstanding -= 1;
                            completed.push(msg);
                        }
                        None => break,
                    }
                }
                _ = &mut deadline => {
                    warn!(
                        "Coordinator deadline ({}ms) reached with {} providers outstanding",
                        self.overall_timeout.as_millis(),
                        outstanding
                    );
                    for handle in &handles {
                        handle.abort();
                    }
                    break;
                }
            }
        }

        // Providers cancelled by the overall deadline count as timeouts.
        for provider_id in &spawned {
            if !completed.iter().any(|(id, _, _)| id == provider_id) {
                failures.push(ProviderFailure {
                    provider: provider_id.clone(),
                    error: ProviderError::Timeout {
                        duration_ms: self.overall_timeout.as_millis() as u64,
                    },
                });
            }
        }

        let validator = CodeValidator::new(request.dialect);
        let mut ranked: Vec<ScoredStrategy> = Vec::new();

        for (provider, outcome, latency_ms) in completed {
            self.metrics
                .observe_provider_latency(&provider, latency_ms as f64 / 1000.0);
            match outcome {
                Ok(code) => {
                    self.metrics.inc_provider_requests(&provider, "ok");
                    let result = ProviderResult {
                        provider: provider.clone(),
                        code,
                        latency_ms,
                        success: true,
                        created_at: Utc::now(),
                    };
                    let report = validator.validate(&result.code);
                    for finding in &report.findings {
                        self.metrics.inc_validation_finding(
                            &finding.stage.to_string(),
                            &finding.severity.to_string(),
                        );
                    }
                    let score = self.scorer.score(&result, &report);
                    debug!(
                        "Provider {} scored {:.4} ({} findings, {}ms)",
                        provider,
                        score.total,
                        report.findings.len(),
                        latency_ms
                    );
                    ranked.push(ScoredStrategy {
                        result,
                        report,
                        score,
                    });
                }
                Err(error) => {
                    self.metrics.inc_provider_requests(&provider, "error");
                    warn!("Provider {} failed: {}", provider, error);
                    failures.push(ProviderFailure { provider, error });
                }
            }
        }

        if ranked.is_empty() {
            return Err(GenerationError::AllProvidersFailed { causes: failures });
        }

        // Descending by total score; ties broken by lower latency, then
        // lexicographic provider id, so the ordering is reproducible
        // regardless of completion order.
        ranked.sort_by(|a, b| {
            b.score
                .total
                .partial_cmp(&a.score.total)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.result.latency_ms.cmp(&b.result.latency_ms))
                .then_with(|| a.result.provider.cmp(&b.result.provider))
        });

        info!(
            "Request {}: {} ranked results, {} provider failures",
            request.id,
            ranked.len(),
            failures.len()
        );

        Ok(GenerationOutcome { ranked, failures })
    }

    async fn fetch_template(&self, request: &StrategyRequest) -> Option<String> {
        let id = request.template_id.as_deref()?;
        let store = self.templates.as_ref()?;
        match store.get_template(id).await {
            Ok(Some(template)) => {
                debug!("Seeding prompt with template '{}'", id);
                Some(template)
            }
            Ok(None) => {
                debug!("Template '{}' not found, generating without it", id);
                None
            }
            Err(e) => {
                warn!("Template store error for '{}': {:#}", id, e);
                None
            }
        }
    }
}
