//! Runtime configuration read from the environment.
//!
//! Server flags (`--host`, `--port`, `--db`) are parsed by the CLI with the
//! same environment fallbacks; this module covers the settings that the
//! library needs independently of the CLI:
//!
//! - `EDUCONNECT_GENAI_API_KEY` - API key for the generative model (flows are
//!   disabled without it)
//! - `EDUCONNECT_GENAI_MODEL` - model name (default: `gemini-2.0-flash`)
//! - `EDUCONNECT_GENAI_URL` - provider base URL
//! - `EDUCONNECT_GENAI_TIMEOUT_SECS` - request timeout (default: 60)

use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_GENAI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Settings for the hosted generative model behind the quiz and tutor flows.
#[derive(Clone, Debug)]
pub struct ModelConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    /// Sampling temperature sent with every request.
    pub temperature: f32,
}

impl ModelConfig {
    pub fn from_env() -> Self {
        let api_key = std::env::var("EDUCONNECT_GENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let model =
            std::env::var("EDUCONNECT_GENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let base_url = std::env::var("EDUCONNECT_GENAI_URL")
            .unwrap_or_else(|_| DEFAULT_GENAI_URL.to_string());

        let timeout_secs = std::env::var("EDUCONNECT_GENAI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self {
            api_key,
            model,
            base_url,
            timeout: Duration::from_secs(timeout_secs),
            temperature: 0.4,
        }
    }

    /// Config pointing at an explicit endpoint, for tests and local stubs.
    pub fn with_endpoint(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_GENAI_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            temperature: 0.4,
        }
    }
}
