use futures::future::BoxFuture;
use snafu::Snafu;

pub const GEMINI_PROVIDER_ID: &str = "gemini";
pub const OPENAI_PROVIDER_ID: &str = "openai";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub provider_id: String,
    /// Explicit credential. When blank the key is read from `api_key_env`.
    pub api_key: String,
    pub api_key_env: String,
    /// Base URL override; blank keeps the provider default.
    pub endpoint: String,
    pub model_id: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::new(GEMINI_PROVIDER_ID, DEFAULT_GEMINI_MODEL)
    }
}

impl ProviderConfig {
    pub fn new(provider_id: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into().trim().to_string(),
            api_key: String::new(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            endpoint: String::new(),
            model_id: model_id.into().trim().to_string(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into().trim().to_string();
        self
    }

    pub fn with_api_key_env(mut self, api_key_env: impl Into<String>) -> Self {
        self.api_key_env = api_key_env.into().trim().to_string();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim().to_string();
        self
    }

    /// Explicit key first, then the environment. `None` when neither is set.
    pub fn resolve_api_key(&self) -> Option<String> {
        if !self.api_key.is_empty() {
            return Some(self.api_key.clone());
        }
        if self.api_key_env.is_empty() {
            return None;
        }

        std::env::var(&self.api_key_env)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ProviderError {
    #[snafu(display("provider '{provider_id}' is not supported"))]
    UnsupportedProvider {
        stage: &'static str,
        provider_id: String,
    },
    #[snafu(display("http client failed on `{stage}`, {source}"))]
    HttpClient {
        stage: &'static str,
        source: rig::http_client::Error,
    },
    #[snafu(display("completion failed on `{stage}`, {source}"))]
    PromptFailed {
        stage: &'static str,
        source: rig::completion::PromptError,
    },
    #[snafu(display("completion failed on `{stage}`: {message}"))]
    Backend {
        stage: &'static str,
        message: String,
    },
}

/// One-shot text completion against a remote model.
pub trait CompletionBackend: Send + Sync {
    fn provider_id(&self) -> &str;
    fn model_id(&self) -> &str;
    fn complete<'a>(&'a self, prompt: String) -> BoxFuture<'a, ProviderResult<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_key_wins_over_environment() {
        let config = ProviderConfig::default()
            .with_api_key("  secret  ")
            .with_api_key_env("PARLEY_TEST_KEY_NEVER_SET_1F0C");

        assert_eq!(config.resolve_api_key().as_deref(), Some("secret"));
    }

    #[test]
    fn unset_environment_means_no_key() {
        let config = ProviderConfig::default().with_api_key_env("PARLEY_TEST_KEY_NEVER_SET_9A27");
        assert_eq!(config.resolve_api_key(), None);

        let config = ProviderConfig::default().with_api_key_env("");
        assert_eq!(config.resolve_api_key(), None);
    }
}
