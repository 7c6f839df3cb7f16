//! Reply generation for simulated contacts.

mod prompt;
mod provider;
mod responder;
mod rig_adapter;

pub use prompt::{
    DEFAULT_PERSONA_INSTRUCTION, HISTORY_WINDOW, Persona, Speaker, TranscriptEntry, build_prompt,
    recent_history,
};
pub use provider::{
    CompletionBackend, DEFAULT_API_KEY_ENV, DEFAULT_GEMINI_MODEL, GEMINI_PROVIDER_ID,
    OPENAI_PROVIDER_ID, ProviderConfig, ProviderError, ProviderResult,
};
pub use responder::{
    BackendFactory, EMPTY_COMPLETION_REPLY, GENERATION_FAILED_REPLY, MISSING_API_KEY_REPLY,
    PersonaResponder, ResponseGenerator,
};
pub use rig_adapter::{RigCompletionBackend, create_backend};
