//! Reasoning backend clients for siteforge.

pub mod gemini;

pub use gemini::GeminiProvider;

use siteforge_config::AppConfig;
use siteforge_core::error::ProviderError;
use siteforge_core::provider::Provider;
use std::sync::Arc;

/// Build the configured provider.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_key = config.api_key.as_deref().ok_or_else(|| {
        ProviderError::NotConfigured(
            "no API key — set SITEFORGE_API_KEY or api_key in config.toml".into(),
        )
    })?;
    Ok(Arc::new(GeminiProvider::new(api_key)?))
}
