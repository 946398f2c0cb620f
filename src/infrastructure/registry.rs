use crate::config::{Config, ProviderKind};
use crate::domain::ports::StrategyProvider;
use crate::infrastructure::anthropic::AnthropicProvider;
use crate::infrastructure::openai::OpenAiProvider;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Identifier → adapter lookup, built once at startup and shared read-only
/// across concurrent coordinator invocations.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn StrategyProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn StrategyProvider>) {
        self.providers.insert(provider.id().to_string(), provider);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn StrategyProvider>> {
        self.providers.get(id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

pub struct ProviderFactory;

impl ProviderFactory {
    /// Builds the registry for every provider enabled in the configuration.
    pub fn create_registry(config: &Config) -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();

        for kind in &config.enabled_providers {
            match kind {
                ProviderKind::OpenAi => {
                    registry.register(Arc::new(
                        OpenAiProvider::builder()
                            .api_key(config.openai_api_key.clone())
                            .base_url(config.openai_base_url.clone())
                            .model(config.openai_model.clone())
                            .build(),
                    ));
                }
                ProviderKind::Anthropic => {
                    registry.register(Arc::new(
                        AnthropicProvider::builder()
                            .api_key(config.anthropic_api_key.clone())
                            .base_url(config.anthropic_base_url.clone())
                            .model(config.anthropic_model.clone())
                            .build(),
                    ));
                }
            }
        }

        info!("Provider registry initialized: {:?}", registry.ids());
        registry
    }
}
