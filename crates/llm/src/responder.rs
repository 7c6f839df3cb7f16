use std::sync::{Arc, OnceLock};

use futures::FutureExt;
use futures::future::BoxFuture;

use super::prompt::{Persona, TranscriptEntry, build_prompt};
use super::provider::{CompletionBackend, ProviderConfig, ProviderResult};
use super::rig_adapter::create_backend;

pub const MISSING_API_KEY_REPLY: &str = "Error: API Key missing.";
pub const GENERATION_FAILED_REPLY: &str = "Sorry, I can't reply right now (Network Error).";
pub const EMPTY_COMPLETION_REPLY: &str = "...";

/// Produces the contact's next message. Never fails: every problem is folded
/// into ordinary reply text.
pub trait ResponseGenerator: Send + Sync {
    fn generate<'a>(
        &'a self,
        persona: &'a Persona,
        history: &'a [TranscriptEntry],
    ) -> BoxFuture<'a, String>;
}

pub type BackendFactory =
    Arc<dyn Fn(&ProviderConfig, &str) -> ProviderResult<Arc<dyn CompletionBackend>> + Send + Sync>;

enum BackendSlot {
    MissingCredential,
    Ready(Arc<dyn CompletionBackend>),
    Unavailable(String),
}

/// Roleplays a persona through a remote completion backend.
///
/// The credential is resolved on the first `generate` call and the outcome is
/// kept for the life of the responder.
pub struct PersonaResponder {
    config: ProviderConfig,
    factory: BackendFactory,
    backend: OnceLock<BackendSlot>,
}

impl PersonaResponder {
    pub fn new(config: ProviderConfig) -> Self {
        Self::with_factory(config, Arc::new(create_backend))
    }

    pub fn with_factory(config: ProviderConfig, factory: BackendFactory) -> Self {
        Self {
            config,
            factory,
            backend: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn backend(&self) -> &BackendSlot {
        self.backend.get_or_init(|| {
            let Some(api_key) = self.config.resolve_api_key() else {
                return BackendSlot::MissingCredential;
            };

            match (self.factory)(&self.config, &api_key) {
                Ok(backend) => {
                    tracing::info!(
                        provider_id = %backend.provider_id(),
                        model_id = %backend.model_id(),
                        "initialized completion backend"
                    );
                    BackendSlot::Ready(backend)
                }
                Err(error) => BackendSlot::Unavailable(error.to_string()),
            }
        })
    }

    async fn generate_reply(&self, persona: &Persona, history: &[TranscriptEntry]) -> String {
        let backend = match self.backend() {
            BackendSlot::Ready(backend) => backend,
            BackendSlot::MissingCredential => {
                tracing::warn!(
                    provider_id = %self.config.provider_id,
                    api_key_env = %self.config.api_key_env,
                    "API key is missing, replies are disabled"
                );
                return MISSING_API_KEY_REPLY.to_string();
            }
            BackendSlot::Unavailable(error) => {
                tracing::error!(
                    provider_id = %self.config.provider_id,
                    error = %error,
                    "completion backend could not be created"
                );
                return GENERATION_FAILED_REPLY.to_string();
            }
        };

        let prompt = build_prompt(persona, history);
        match backend.complete(prompt).await {
            Ok(text) if text.trim().is_empty() => EMPTY_COMPLETION_REPLY.to_string(),
            Ok(text) => text,
            Err(error) => {
                tracing::error!(
                    provider_id = %backend.provider_id(),
                    persona = %persona.name,
                    error = %error,
                    "reply generation failed"
                );
                GENERATION_FAILED_REPLY.to_string()
            }
        }
    }
}

impl ResponseGenerator for PersonaResponder {
    fn generate<'a>(
        &'a self,
        persona: &'a Persona,
        history: &'a [TranscriptEntry],
    ) -> BoxFuture<'a, String> {
        self.generate_reply(persona, history).boxed()
    }
}
