use std::fmt::{Display, Write as _};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use parley_llm::ResponseGenerator;
use parley_storage::{ConversationId, ConversationStore, Sender};

use crate::chat::{ActiveConversation, ChatController, ConversationSummary, format_clock};
use crate::llm::create_generator;
use crate::settings::SettingsStore;

pub const HELP_TEXT: &str = "\
/list          show conversations
/open <id>     open a conversation
/back          close the open conversation
/show          reprint the open conversation
/reload        re-read settings
/quit          exit
anything else  send to the open conversation";

/// One line of terminal input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Open(ConversationId),
    Back,
    Show,
    Reload,
    Help,
    Quit,
    Send(String),
    Unknown(String),
    Empty,
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Self::Send(line.to_string());
        };

        let (name, argument) = match command.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim()),
            None => (command, ""),
        };
        match (name, argument) {
            ("list" | "ls", "") => Self::List,
            ("open", id) if !id.is_empty() => match ConversationId::parse(id) {
                Ok(id) => Self::Open(id),
                Err(_) => Self::Unknown(line.to_string()),
            },
            ("back", "") => Self::Back,
            ("show", "") => Self::Show,
            ("reload", "") => Self::Reload,
            ("help" | "?", "") => Self::Help,
            ("quit" | "exit" | "q", "") => Self::Quit,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

/// Wires settings, the seeded store and the reply generator into one controller.
pub struct ChatApp {
    settings: SettingsStore,
    controller: ChatController,
}

impl ChatApp {
    pub fn new(settings: SettingsStore) -> Self {
        let generator = create_generator(&settings.settings());
        let store = Arc::new(ConversationStore::seeded(Utc::now()));
        Self::with_parts(settings, store, generator)
    }

    pub fn with_parts(
        settings: SettingsStore,
        store: Arc<ConversationStore>,
        generator: Arc<dyn ResponseGenerator>,
    ) -> Self {
        let current = settings.settings();
        let controller = ChatController::new(store, generator)
            .with_reply_delay(current.reply_delay())
            .with_history_window(current.history_window);
        Self {
            settings,
            controller,
        }
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn controller(&self) -> &ChatController {
        &self.controller
    }

    /// Re-reads settings and rebuilds the controller around the same store.
    /// Replies already scheduled keep the generator they started with.
    pub fn reload(&mut self) {
        let settings = self.settings.reload();
        let store = Arc::clone(self.controller.store());
        self.controller = ChatController::new(store, create_generator(&settings))
            .with_reply_delay(settings.reply_delay())
            .with_history_window(settings.history_window);
    }
}

pub fn render_conversation_list<Tz>(rows: &[ConversationSummary], now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut out = String::new();
    for row in rows {
        let unread = if row.unread_count > 0 {
            format!(" ({})", row.unread_count)
        } else {
            String::new()
        };
        let preview = if row.is_typing {
            "typing..."
        } else {
            row.preview()
        };
        let _ = writeln!(
            out,
            "[{}] {}{}  {}\n    {}",
            row.id,
            row.user.name,
            unread,
            row.time_label(now),
            preview
        );
    }
    out
}

pub fn render_conversation<Tz>(active: &ActiveConversation, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut out = String::new();
    let _ = writeln!(
        out,
        "== {} ({}) ==\n{}",
        active.user.name,
        active.user.phone,
        active.header_subtitle()
    );
    for message in &active.conversation.messages {
        let label = format_clock(&message.sent_at, now);
        let _ = match message.sender {
            Sender::Local => writeln!(
                out,
                "  you  [{label}] {} ({})",
                message.text,
                message.status.as_str()
            ),
            Sender::Remote => writeln!(out, "  {}  [{label}] {}", active.user.name, message.text),
        };
    }
    out
}
