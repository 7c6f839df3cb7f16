use chrono::{DateTime, Utc};

use super::ids::{ConversationId, MessageId, UserId};

/// A simulated contact. Loaded once from fixtures and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub avatar: String,
    pub status: String,
    pub phone: String,
    pub system_instruction: Option<String>,
}

impl User {
    pub fn new(id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            avatar: String::new(),
            status: String::new(),
            phone: String::new(),
            system_instruction: None,
        }
    }

    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = avatar.into();
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = phone.into();
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }
}

/// Who authored a message, from the local user's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sender {
    Local,
    Remote,
}

/// Delivery lifecycle. Variant order is the only legal direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Read,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub text: String,
    pub sender: Sender,
    pub sent_at: DateTime<Utc>,
    pub status: DeliveryStatus,
}

impl Message {
    pub fn new(
        id: impl Into<MessageId>,
        text: impl Into<String>,
        sender: Sender,
        sent_at: DateTime<Utc>,
        status: DeliveryStatus,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            sender,
            sent_at,
            status,
        }
    }

    /// A freshly authored local message, not yet delivered.
    pub fn outgoing(text: impl Into<String>, sent_at: DateTime<Utc>) -> Self {
        Self::new(
            MessageId::new_v7(),
            text,
            Sender::Local,
            sent_at,
            DeliveryStatus::Sent,
        )
    }

    /// A simulated reply; the contact has necessarily read everything before it.
    pub fn reply(text: impl Into<String>, sent_at: DateTime<Utc>) -> Self {
        Self::new(
            MessageId::new_v7(),
            text,
            Sender::Remote,
            sent_at,
            DeliveryStatus::Read,
        )
    }

    /// Moves the status forward. Returns false, leaving the status untouched,
    /// when `next` is not ahead of the current status.
    pub fn advance_status(&mut self, next: DeliveryStatus) -> bool {
        if next <= self.status {
            return false;
        }
        self.status = next;
        true
    }
}

/// One contact's message history plus list metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: ConversationId,
    pub user_id: UserId,
    pub messages: Vec<Message>,
    pub unread_count: u32,
    pub last_message_at: DateTime<Utc>,
    /// Simulated replies scheduled but not yet merged.
    pub pending_replies: u32,
}

impl Conversation {
    pub fn new(
        id: impl Into<ConversationId>,
        user_id: impl Into<UserId>,
        last_message_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            messages: Vec::new(),
            unread_count: 0,
            last_message_at,
            pending_replies: 0,
        }
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_unread_count(mut self, unread_count: u32) -> Self {
        self.unread_count = unread_count;
        self
    }

    pub fn is_typing(&self) -> bool {
        self.pending_replies > 0
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn message(&self, message_id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|message| &message.id == message_id)
    }

    /// The trailing `window` messages, oldest first.
    pub fn recent_messages(&self, window: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(window);
        &self.messages[start..]
    }

    /// Appends a message and bumps the list timestamp, which never moves backwards.
    pub fn append_message(&mut self, message: Message) {
        if message.sent_at > self.last_message_at {
            self.last_message_at = message.sent_at;
        }
        self.messages.push(message);
    }

    /// Appends a locally authored message. The list timestamp always takes the
    /// message's own time, even if that is earlier than the current value.
    pub fn append_outgoing(&mut self, message: Message) {
        self.last_message_at = message.sent_at;
        self.messages.push(message);
    }

    /// Returns false when the message is unknown or already at or past `status`.
    pub fn advance_message_status(&mut self, message_id: &MessageId, status: DeliveryStatus) -> bool {
        self.messages
            .iter_mut()
            .find(|message| &message.id == message_id)
            .is_some_and(|message| message.advance_status(status))
    }

    pub fn begin_reply(&mut self) {
        self.pending_replies = self.pending_replies.saturating_add(1);
    }

    pub fn finish_reply(&mut self) {
        self.pending_replies = self.pending_replies.saturating_sub(1);
    }
}
