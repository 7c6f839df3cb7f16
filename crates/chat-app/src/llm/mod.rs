use std::sync::Arc;

use parley_llm::{Persona, PersonaResponder, ResponseGenerator, Speaker, TranscriptEntry};
use parley_storage::{Message, Sender, User};

use crate::settings::AppSettings;

pub fn persona_for(user: &User) -> Persona {
    Persona::new(&user.name, user.system_instruction.clone())
}

/// Maps stored messages to transcript lines: local messages are the user's,
/// remote ones belong to the persona.
pub fn transcript(messages: &[Message]) -> Vec<TranscriptEntry> {
    messages
        .iter()
        .map(|message| {
            let speaker = match message.sender {
                Sender::Local => Speaker::User,
                Sender::Remote => Speaker::Persona,
            };
            TranscriptEntry::new(speaker, &message.text)
        })
        .collect()
}

pub fn create_generator(settings: &AppSettings) -> Arc<dyn ResponseGenerator> {
    let config = settings.to_provider_config();
    tracing::info!(
        provider_id = %config.provider_id,
        model_id = %config.model_id,
        "configured reply generator"
    );
    Arc::new(PersonaResponder::new(config))
}
