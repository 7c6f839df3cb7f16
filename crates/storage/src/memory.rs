use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::{ArcSwap, Guard};
use chrono::{DateTime, Utc};
use snafu::OptionExt;

use super::error::{ConversationNotFoundSnafu, StorageResult, UserNotFoundSnafu};
use super::fixtures::{seed_conversations, seed_users};
use super::ids::{ConversationId, UserId};
use super::types::{Conversation, User};

/// Immutable view of every conversation plus the active selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub conversations: Vec<Conversation>,
    pub active_conversation_id: Option<ConversationId>,
}

impl StoreSnapshot {
    pub fn conversation(&self, conversation_id: &ConversationId) -> Option<&Conversation> {
        self.conversations
            .iter()
            .find(|conversation| &conversation.id == conversation_id)
    }

    pub fn is_active(&self, conversation_id: &ConversationId) -> bool {
        self.active_conversation_id.as_ref() == Some(conversation_id)
    }

    fn position(&self, conversation_id: &ConversationId) -> Option<usize> {
        self.conversations
            .iter()
            .position(|conversation| &conversation.id == conversation_id)
    }
}

/// Process-lifetime conversation state.
///
/// Users are fixed at construction. Conversations live in one snapshot that is
/// replaced wholesale on every write: writers clone the current snapshot, edit
/// the copy and publish it with compare-and-swap, retrying when another writer
/// got there first. Readers never block and always see a consistent snapshot.
pub struct ConversationStore {
    users: Arc<HashMap<UserId, User>>,
    state: ArcSwap<StoreSnapshot>,
}

impl ConversationStore {
    pub fn new(users: Vec<User>, conversations: Vec<Conversation>) -> Self {
        let users = users
            .into_iter()
            .map(|user| (user.id.clone(), user))
            .collect::<HashMap<_, _>>();

        for conversation in &conversations {
            if !users.contains_key(&conversation.user_id) {
                tracing::warn!(
                    conversation_id = %conversation.id,
                    user_id = %conversation.user_id,
                    "conversation references an unknown user"
                );
            }
        }

        Self {
            users: Arc::new(users),
            state: ArcSwap::from_pointee(StoreSnapshot {
                conversations,
                active_conversation_id: None,
            }),
        }
    }

    /// Store seeded with the built-in contacts, timestamped relative to `now`.
    pub fn seeded(now: DateTime<Utc>) -> Self {
        Self::new(seed_users(), seed_conversations(now))
    }

    pub fn snapshot(&self) -> Arc<StoreSnapshot> {
        self.state.load_full()
    }

    pub fn user(&self, user_id: &UserId) -> StorageResult<User> {
        self.users.get(user_id).cloned().context(UserNotFoundSnafu {
            stage: "load-user",
            id: user_id.to_string(),
        })
    }

    pub fn users(&self) -> Arc<HashMap<UserId, User>> {
        Arc::clone(&self.users)
    }

    pub fn conversation(&self, conversation_id: &ConversationId) -> StorageResult<Conversation> {
        self.state
            .load()
            .conversation(conversation_id)
            .cloned()
            .context(ConversationNotFoundSnafu {
                stage: "load-conversation",
                id: conversation_id.to_string(),
            })
    }

    pub fn active_conversation_id(&self) -> Option<ConversationId> {
        self.state.load().active_conversation_id.clone()
    }

    /// Read-modify-replace of one conversation.
    ///
    /// `update` receives a copy of the record and whether it is the active
    /// selection. It may run more than once under contention, so it must only
    /// touch the record it is given. Returns the record as published.
    pub fn update_conversation<F>(
        &self,
        conversation_id: &ConversationId,
        mut update: F,
    ) -> StorageResult<Conversation>
    where
        F: FnMut(&mut Conversation, bool),
    {
        self.replace_snapshot("update-conversation", |snapshot| {
            let is_active = snapshot.is_active(conversation_id);
            let index = snapshot
                .position(conversation_id)
                .context(ConversationNotFoundSnafu {
                    stage: "update-conversation",
                    id: conversation_id.to_string(),
                })?;
            let conversation = &mut snapshot.conversations[index];
            update(conversation, is_active);
            Ok(conversation.clone())
        })
    }

    /// Makes `conversation_id` the active selection and zeroes its unread counter.
    pub fn select(&self, conversation_id: &ConversationId) -> StorageResult<Conversation> {
        self.replace_snapshot("select-conversation", |snapshot| {
            let index = snapshot
                .position(conversation_id)
                .context(ConversationNotFoundSnafu {
                    stage: "select-conversation",
                    id: conversation_id.to_string(),
                })?;
            snapshot.active_conversation_id = Some(conversation_id.clone());
            let conversation = &mut snapshot.conversations[index];
            conversation.unread_count = 0;
            Ok(conversation.clone())
        })
    }

    pub fn clear_selection(&self) {
        self.state.rcu(|snapshot| StoreSnapshot {
            active_conversation_id: None,
            ..StoreSnapshot::clone(snapshot)
        });
    }

    fn replace_snapshot<R, F>(&self, stage: &'static str, mut edit: F) -> StorageResult<R>
    where
        F: FnMut(&mut StoreSnapshot) -> StorageResult<R>,
    {
        let mut current = self.state.load_full();
        loop {
            let mut next = StoreSnapshot::clone(&current);
            let output = edit(&mut next)?;

            let previous = self.state.compare_and_swap(&current, Arc::new(next));
            if Arc::ptr_eq(&*previous, &current) {
                return Ok(output);
            }

            tracing::trace!(stage, "snapshot changed underneath writer, retrying");
            current = Guard::into_inner(previous);
        }
    }
}
