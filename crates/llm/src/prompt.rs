/// Maximum number of transcript entries embedded in a prompt.
pub const HISTORY_WINDOW: usize = 10;

pub const DEFAULT_PERSONA_INSTRUCTION: &str = "Be a helpful assistant.";

/// The contact being roleplayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub name: String,
    pub instruction: Option<String>,
}

impl Persona {
    pub fn new(name: impl Into<String>, instruction: Option<String>) -> Self {
        Self {
            name: name.into(),
            instruction,
        }
    }

    pub fn instruction(&self) -> &str {
        self.instruction
            .as_deref()
            .map(str::trim)
            .filter(|instruction| !instruction.is_empty())
            .unwrap_or(DEFAULT_PERSONA_INSTRUCTION)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Speaker {
    User,
    Persona,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
}

impl TranscriptEntry {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
        }
    }

    fn render(&self, persona_name: &str) -> String {
        match self.speaker {
            Speaker::User => format!("User: {}", self.text),
            Speaker::Persona => format!("{persona_name}: {}", self.text),
        }
    }
}

/// Trailing `HISTORY_WINDOW` entries; anything older is dropped.
pub fn recent_history(history: &[TranscriptEntry]) -> &[TranscriptEntry] {
    let start = history.len().saturating_sub(HISTORY_WINDOW);
    &history[start..]
}

/// Renders the single roleplay prompt sent to the model.
pub fn build_prompt(persona: &Persona, history: &[TranscriptEntry]) -> String {
    let name = persona.name.as_str();
    let transcript = recent_history(history)
        .iter()
        .map(|entry| entry.render(name))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are roleplaying as {name}.\n\
         Your persona instructions are: {instruction}\n\
         \n\
         Here is the recent conversation history:\n\
         {transcript}\n\
         \n\
         User just sent the last message. Reply directly as {name}.\n\
         Do not prefix your response with \"Mom:\" or \"{name}:\".\n\
         Keep it relatively short, like a text message.",
        instruction = persona.instruction(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mom() -> Persona {
        Persona::new("Mom", Some("Use too many emojis.".to_string()))
    }

    #[test]
    fn prompt_flattens_transcript_with_speaker_labels() {
        let history = vec![
            TranscriptEntry::new(Speaker::Persona, "Did you eat lunch yet?"),
            TranscriptEntry::new(Speaker::User, "Yes!"),
        ];

        let prompt = build_prompt(&mom(), &history);

        assert!(prompt.starts_with("You are roleplaying as Mom.\n"));
        assert!(prompt.contains("Your persona instructions are: Use too many emojis.\n"));
        assert!(prompt.contains("Mom: Did you eat lunch yet?\nUser: Yes!\n"));
        assert!(prompt.contains("Do not prefix your response with \"Mom:\" or \"Mom:\"."));
    }

    #[test]
    fn prompt_keeps_only_the_latest_ten_entries() {
        let history = (0..15)
            .map(|index| TranscriptEntry::new(Speaker::User, format!("line {index:02}")))
            .collect::<Vec<_>>();

        let prompt = build_prompt(&mom(), &history);

        assert!(!prompt.contains("line 04"));
        assert!(prompt.contains("User: line 05"));
        assert!(prompt.contains("User: line 14"));
        assert_eq!(prompt.matches("User: line").count(), HISTORY_WINDOW);
    }

    #[test]
    fn missing_instruction_uses_the_default() {
        let persona = Persona::new("Stranger", Some("  ".to_string()));
        let prompt = build_prompt(&persona, &[]);

        assert!(prompt.contains(DEFAULT_PERSONA_INSTRUCTION));
        assert!(prompt.contains("Do not prefix your response with \"Mom:\" or \"Stranger:\"."));
        assert_eq!(Persona::new("Stranger", None).instruction(), DEFAULT_PERSONA_INSTRUCTION);
    }
}
