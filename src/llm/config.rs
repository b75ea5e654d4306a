//! Provider configuration

use super::{GeminiService, LlmError, LlmService, LoggingService};
use std::sync::Arc;

/// Model used when `GEMINI_MODEL` is not set
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Public Gemini endpoint
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Configuration for the completion provider
#[derive(Clone, Default)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    /// Override for the provider endpoint (proxies, tests)
    pub base_url: Option<String>,
}

impl LlmConfig {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            api_key: lookup("GOOGLE_GENERATIVE_AI_API_KEY"),
            model: lookup("GEMINI_MODEL"),
            base_url: lookup("GEMINI_BASE_URL"),
        }
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    /// Build the provider, or `None` when no usable credential is configured.
    pub fn build_service(&self) -> Result<Option<Arc<dyn LlmService>>, LlmError> {
        let Some(api_key) = self.api_key.as_deref().filter(|k| !k.trim().is_empty()) else {
            return Ok(None);
        };
        let service = GeminiService::new(api_key.to_string(), self.model(), self.base_url())?;
        Ok(Some(Arc::new(LoggingService::new(Arc::new(service)))))
    }
}

// Hand-written so the credential never ends up in logs.
impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model())
            .field("base_url", &self.base_url())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn missing_key_builds_no_service() {
        let config = LlmConfig::from_lookup(lookup(&[]));
        assert!(config.build_service().unwrap().is_none());
        assert_eq!(config.model(), DEFAULT_MODEL);
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let config = LlmConfig::from_lookup(lookup(&[("GOOGLE_GENERATIVE_AI_API_KEY", "  ")]));
        assert!(config.build_service().unwrap().is_none());
    }

    #[test]
    fn key_builds_logged_service_for_configured_model() {
        let config = LlmConfig::from_lookup(lookup(&[
            ("GOOGLE_GENERATIVE_AI_API_KEY", "secret"),
            ("GEMINI_MODEL", "gemini-2.0-flash"),
        ]));
        let service = config.build_service().unwrap().unwrap();
        assert_eq!(service.model_id(), "gemini-2.0-flash");
    }

    #[test]
    fn debug_output_redacts_key() {
        let config = LlmConfig::from_lookup(lookup(&[("GOOGLE_GENERATIVE_AI_API_KEY", "secret")]));
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
