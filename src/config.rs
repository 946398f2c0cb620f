use crate::application::optimization::engine::OptimizerBudget;
use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" => Ok(ProviderKind::Anthropic),
            _ => anyhow::bail!(
                "Invalid provider: {}. Must be 'openai' or 'anthropic'",
                s
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub enabled_providers: Vec<ProviderKind>,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_model: String,
    pub anthropic_api_key: String,
    pub anthropic_base_url: String,
    pub anthropic_model: String,
    pub provider_timeout_secs: u64,
    pub overall_timeout_secs: u64,
    pub template_dir: Option<String>,
    pub optimizer_max_iterations: usize,
    pub optimizer_timeout_secs: u64,
    pub optimizer_convergence_epsilon: f64,
    pub optimizer_convergence_patience: usize,
    pub optimizer_max_consecutive_failures: usize,
    pub optimizer_range_steps: usize,
}

impl Config {
    /// Loads configuration from the environment (after `dotenvy`).
    /// API keys are required only for providers that are enabled.
    pub fn from_env() -> Result<Self> {
        let providers_raw = env::var("PROVIDERS").unwrap_or_else(|_| "openai,anthropic".to_string());
        let enabled_providers = parse_providers(&providers_raw)?;

        let openai_api_key = if enabled_providers.contains(&ProviderKind::OpenAi) {
            env::var("OPENAI_API_KEY").context("OPENAI_API_KEY must be set")?
        } else {
            String::new()
        };
        let anthropic_api_key = if enabled_providers.contains(&ProviderKind::Anthropic) {
            env::var("ANTHROPIC_API_KEY").context("ANTHROPIC_API_KEY must be set")?
        } else {
            String::new()
        };

        Ok(Self {
            enabled_providers,
            openai_api_key,
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com".to_string()),
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
            anthropic_api_key,
            anthropic_base_url: env::var("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|_| "https://api.anthropic.com".to_string()),
            anthropic_model: env::var("ANTHROPIC_MODEL")
                .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string()),
            provider_timeout_secs: env_parse("PROVIDER_TIMEOUT_SECS", 30),
            overall_timeout_secs: env_parse("OVERALL_TIMEOUT_SECS", 45),
            template_dir: env::var("TEMPLATE_DIR").ok(),
            optimizer_max_iterations: env_parse("OPTIMIZER_MAX_ITERATIONS", 100),
            optimizer_timeout_secs: env_parse("OPTIMIZER_TIMEOUT_SECS", 300),
            optimizer_convergence_epsilon: env_parse("OPTIMIZER_CONVERGENCE_EPSILON", 1e-4),
            optimizer_convergence_patience: env_parse("OPTIMIZER_CONVERGENCE_PATIENCE", 8),
            optimizer_max_consecutive_failures: env_parse("OPTIMIZER_MAX_CONSECUTIVE_FAILURES", 3),
            optimizer_range_steps: env_parse("OPTIMIZER_RANGE_STEPS", 5),
        })
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn overall_timeout(&self) -> Duration {
        Duration::from_secs(self.overall_timeout_secs)
    }

    pub fn optimizer_budget(&self) -> OptimizerBudget {
        OptimizerBudget {
            max_iterations: self.optimizer_max_iterations,
            timeout: Duration::from_secs(self.optimizer_timeout_secs),
            convergence_epsilon: self.optimizer_convergence_epsilon,
            convergence_patience: self.optimizer_convergence_patience,
            max_consecutive_failures: self.optimizer_max_consecutive_failures,
            range_steps: self.optimizer_range_steps,
        }
    }
}

fn parse_providers(raw: &str) -> Result<Vec<ProviderKind>> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(ProviderKind::from_str)
        .collect()
}

fn env_parse<T: FromStr + Copy>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
