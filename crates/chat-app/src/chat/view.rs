use std::collections::HashMap;
use std::fmt::Display;

use chrono::{DateTime, TimeZone, Utc};
use parley_storage::{Conversation, ConversationId, Message, StoreSnapshot, User, UserId};

pub const EMPTY_PREVIEW: &str = "Start a conversation";
pub const TYPING_SUBTITLE: &str = "typing...";

/// One row of the conversation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub user: User,
    pub unread_count: u32,
    pub is_typing: bool,
    pub last_message_at: DateTime<Utc>,
    pub last_message: Option<Message>,
}

impl ConversationSummary {
    fn new(conversation: &Conversation, user: &User) -> Self {
        Self {
            id: conversation.id.clone(),
            user: user.clone(),
            unread_count: conversation.unread_count,
            is_typing: conversation.is_typing(),
            last_message_at: conversation.last_message_at,
            last_message: conversation.last_message().cloned(),
        }
    }

    pub fn preview(&self) -> &str {
        self.last_message
            .as_ref()
            .map(|message| message.text.as_str())
            .unwrap_or(EMPTY_PREVIEW)
    }

    /// Label for the last message's own time; empty when there are no messages.
    pub fn time_label<Tz>(&self, now: &DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        self.last_message
            .as_ref()
            .map(|message| format_time_label(&message.sent_at, now))
            .unwrap_or_default()
    }
}

/// The open conversation together with its contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveConversation {
    pub conversation: Conversation,
    pub user: User,
}

impl ActiveConversation {
    /// Shown under the contact's name.
    pub fn header_subtitle(&self) -> &str {
        if self.conversation.is_typing() {
            TYPING_SUBTITLE
        } else {
            &self.user.status
        }
    }
}

/// Conversations joined with their users, most recent activity first.
///
/// Conversations whose user is unknown are left out.
pub fn summaries(
    snapshot: &StoreSnapshot,
    users: &HashMap<UserId, User>,
) -> Vec<ConversationSummary> {
    let mut rows = snapshot
        .conversations
        .iter()
        .filter_map(|conversation| match users.get(&conversation.user_id) {
            Some(user) => Some(ConversationSummary::new(conversation, user)),
            None => {
                tracing::warn!(
                    conversation_id = %conversation.id,
                    user_id = %conversation.user_id,
                    "skipping conversation with unknown user"
                );
                None
            }
        })
        .collect::<Vec<_>>();
    rows.sort_by(|left, right| right.last_message_at.cmp(&left.last_message_at));
    rows
}

pub fn active_conversation(
    snapshot: &StoreSnapshot,
    users: &HashMap<UserId, User>,
) -> Option<ActiveConversation> {
    let conversation = snapshot.conversation(snapshot.active_conversation_id.as_ref()?)?;
    let user = users.get(&conversation.user_id)?;
    Some(ActiveConversation {
        conversation: conversation.clone(),
        user: user.clone(),
    })
}

/// `HH:MM` when `at` falls on the same calendar day as `now`, else `MM/DD/YYYY`,
/// both in `now`'s time zone.
pub fn format_time_label<Tz>(at: &DateTime<Utc>, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let local = at.with_timezone(&now.timezone());
    if local.date_naive() == now.date_naive() {
        local.format("%H:%M").to_string()
    } else {
        local.format("%m/%d/%Y").to_string()
    }
}

/// `HH:MM` in `now`'s time zone, regardless of the day.
pub fn format_clock<Tz>(at: &DateTime<Utc>, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    at.with_timezone(&now.timezone()).format("%H:%M").to_string()
}
