use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::{AppConfig, LlmConfig, RoleEntry};
use crate::errors::{TapsightError, TapsightResult};
use crate::llm::provider::LlmProvider;
use crate::llm::providers::openai_compatible::OpenAiCompatibleProvider;
use crate::llm::types::CallConfig;

/// What a model is used for. Each role can point at its own provider and model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Screen analysis during goal runs, exploration and `analyze`.
    Vision,
    /// Free-text advice after a low-confidence failure.
    Recovery,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Vision => "vision",
            Role::Recovery => "recovery",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Providers built from `[llm.providers.*]`, keyed by their config identifier.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    active: String,
    llm_config: LlmConfig,
}

impl ProviderRegistry {
    pub fn new(active: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            active: active.into(),
            llm_config: LlmConfig::default(),
        }
    }

    /// Build a registry from the loaded app config.
    /// `TAPSIGHT_<ID>_API_KEY` takes precedence over a key stored in config.toml.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut registry = Self::new(config.llm.active_provider.clone());
        registry.llm_config = config.llm.clone();
        for (id, entry) in &config.llm.providers {
            let api_key = std::env::var(format!("TAPSIGHT_{}_API_KEY", id.to_uppercase()))
                .ok()
                .or_else(|| entry.api_key.clone())
                .unwrap_or_default();
            if api_key.is_empty() {
                tracing::debug!(provider = %id, "no API key configured, sending unauthenticated requests");
            }
            registry.register(Arc::new(OpenAiCompatibleProvider::new(
                id.clone(),
                entry.api_base.clone(),
                api_key,
            )));
        }
        tracing::info!(
            providers = registry.providers.len(),
            active = %registry.active,
            "provider registry ready"
        );
        registry
    }

    pub fn register(&mut self, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    fn provider(&self, id: &str) -> TapsightResult<Arc<dyn LlmProvider>> {
        self.providers
            .get(id)
            .cloned()
            .ok_or_else(|| TapsightError::Config(format!("provider '{id}' is not configured")))
    }

    fn role_entry(&self, role: Role) -> Option<&RoleEntry> {
        match role {
            Role::Vision => self.llm_config.roles.vision.as_ref(),
            Role::Recovery => self.llm_config.roles.recovery.as_ref(),
        }
    }

    fn provider_temperature(&self, id: &str) -> f64 {
        self.llm_config
            .providers
            .get(id)
            .map(|p| p.temperature)
            .unwrap_or(0.1)
    }

    /// Provider and call settings for `role`.
    ///
    /// `[llm.roles.<role>]` wins; otherwise the active provider is used with
    /// its default model, non-streaming.
    pub fn resolve(&self, role: Role) -> TapsightResult<(Arc<dyn LlmProvider>, CallConfig)> {
        let (provider_id, call) = match self.role_entry(role) {
            Some(entry) => (
                entry.provider.as_str(),
                CallConfig {
                    model: entry.model.clone(),
                    stream: entry.stream,
                    temperature: entry
                        .temperature
                        .unwrap_or_else(|| self.provider_temperature(&entry.provider)),
                },
            ),
            None => (
                self.active.as_str(),
                CallConfig {
                    model: self
                        .llm_config
                        .providers
                        .get(&self.active)
                        .map(|p| p.model.clone())
                        .unwrap_or_default(),
                    stream: false,
                    temperature: self.provider_temperature(&self.active),
                },
            ),
        };
        let provider = self.provider(provider_id).map_err(|e| {
            TapsightError::Config(format!("role '{role}' cannot be served: {e}"))
        })?;
        tracing::debug!(
            role = %role,
            provider = provider_id,
            model = %call.model,
            stream = call.stream,
            temperature = call.temperature,
            "resolved role"
        );
        Ok((provider, call))
    }
}
