use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use rig::completion::Prompt;
use rig::prelude::CompletionClient;
use rig::providers::{gemini, openai};
use snafu::ResultExt;

use super::provider::{
    CompletionBackend, GEMINI_PROVIDER_ID, HttpClientSnafu, OPENAI_PROVIDER_ID, PromptFailedSnafu,
    ProviderConfig, ProviderError, ProviderResult,
};

enum RigClient {
    Gemini(gemini::Client),
    OpenAi(openai::Client),
}

/// Completion backend over Rig's provider clients.
pub struct RigCompletionBackend {
    provider_id: String,
    model_id: String,
    client: RigClient,
}

impl RigCompletionBackend {
    pub fn new(config: &ProviderConfig, api_key: &str) -> ProviderResult<Self> {
        let client = match config.provider_id.as_str() {
            GEMINI_PROVIDER_ID | "google" => RigClient::Gemini(Self::build_gemini(config, api_key)?),
            OPENAI_PROVIDER_ID => RigClient::OpenAi(Self::build_openai(config, api_key)?),
            _ => {
                return Err(ProviderError::UnsupportedProvider {
                    stage: "rig-backend-new",
                    provider_id: config.provider_id.clone(),
                });
            }
        };

        Ok(Self {
            provider_id: config.provider_id.clone(),
            model_id: config.model_id.clone(),
            client,
        })
    }

    fn build_gemini(config: &ProviderConfig, api_key: &str) -> ProviderResult<gemini::Client> {
        let mut builder = gemini::Client::builder().api_key(api_key);
        if !config.endpoint.is_empty() {
            builder = builder.base_url(config.endpoint.as_str());
        }
        builder.build().context(HttpClientSnafu {
            stage: "build-gemini-client",
        })
    }

    fn build_openai(config: &ProviderConfig, api_key: &str) -> ProviderResult<openai::Client> {
        let mut builder = openai::Client::builder().api_key(api_key);
        if !config.endpoint.is_empty() {
            builder = builder.base_url(config.endpoint.as_str());
        }
        builder.build().context(HttpClientSnafu {
            stage: "build-openai-client",
        })
    }

    async fn prompt_once(&self, prompt: String) -> ProviderResult<String> {
        let model_id = self.model_id.as_str();
        match &self.client {
            RigClient::Gemini(client) => client
                .agent(model_id)
                .build()
                .prompt(prompt)
                .await
                .context(PromptFailedSnafu {
                    stage: "gemini-prompt",
                }),
            RigClient::OpenAi(client) => client
                .agent(model_id)
                .build()
                .prompt(prompt)
                .await
                .context(PromptFailedSnafu {
                    stage: "openai-prompt",
                }),
        }
    }
}

impl CompletionBackend for RigCompletionBackend {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn complete<'a>(&'a self, prompt: String) -> BoxFuture<'a, ProviderResult<String>> {
        tracing::debug!(
            provider_id = %self.provider_id,
            model_id = %self.model_id,
            prompt_chars = prompt.chars().count(),
            "sending completion request"
        );
        self.prompt_once(prompt).boxed()
    }
}

/// Builds the Rig backend for `config`. Used as the default backend factory.
pub fn create_backend(
    config: &ProviderConfig,
    api_key: &str,
) -> ProviderResult<Arc<dyn CompletionBackend>> {
    Ok(Arc::new(RigCompletionBackend::new(config, api_key)?))
}
