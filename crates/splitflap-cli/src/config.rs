use std::sync::Arc;

use splitflap_core::provider::anthropic::AnthropicProvider;
use splitflap_core::provider::openai::OpenAiProvider;
use splitflap_core::provider::{AIProvider, ProviderConfig};
use splitflap_core::CoreConfig;

pub fn load_config(path: &str) -> Result<CoreConfig, String> {
    CoreConfig::from_file(path).map_err(|e| e.to_string())
}

/// Builds an `AIProvider` for each configured credential entry. Only
/// `openai` and `anthropic` are wired in as reference adapters; an
/// unrecognized provider name is reported and skipped rather than
/// failing the whole load.
pub fn build_providers(config: &CoreConfig) -> Vec<(String, Arc<dyn AIProvider>)> {
    let mut providers = Vec::new();

    for credentials in &config.available_providers {
        let mut provider_config = ProviderConfig::new(credentials.resolved_api_key());
        if let Some(base_url) = &credentials.base_url {
            provider_config = provider_config.base_url(base_url.clone());
        }

        let provider: Arc<dyn AIProvider> = match credentials.name.as_str() {
            "openai" => Arc::new(OpenAiProvider::new("gpt-4o", provider_config)),
            "anthropic" => Arc::new(AnthropicProvider::new("claude-3-5-sonnet-latest", provider_config)),
            other => {
                eprintln!("warning: unrecognized provider '{other}', skipping");
                continue;
            }
        };

        providers.push((credentials.name.clone(), provider));
    }

    providers
}
