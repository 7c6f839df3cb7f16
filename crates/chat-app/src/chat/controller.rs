use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parley_llm::{HISTORY_WINDOW, Persona, ResponseGenerator};
use parley_storage::{
    ConversationId, ConversationStore, DeliveryStatus, Message, MessageId, StorageError,
};
use rand::Rng;
use snafu::{ResultExt, Snafu, ensure};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::view::{ActiveConversation, ConversationSummary, active_conversation, summaries};
use crate::llm::{persona_for, transcript};

/// Bounds of the simulated "contact is typing" pause before a reply is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyDelay {
    min: Duration,
    max: Duration,
}

impl Default for ReplyDelay {
    fn default() -> Self {
        Self::new(Duration::from_millis(1_500), Duration::from_millis(2_500))
    }
}

impl ReplyDelay {
    /// Inverted bounds are swapped rather than rejected.
    pub fn new(min: Duration, max: Duration) -> Self {
        if min > max {
            Self { min: max, max: min }
        } else {
            Self { min, max }
        }
    }

    pub fn fixed(delay: Duration) -> Self {
        Self::new(delay, delay)
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Uniform sample in `[min, max]` at millisecond granularity.
    pub fn sample(&self) -> Duration {
        let min_ms = self.min.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        if min_ms >= max_ms {
            return self.min;
        }
        Duration::from_millis(rand::rng().random_range(min_ms..=max_ms))
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ControllerError {
    #[snafu(display("refusing to send an empty message to '{conversation_id}'"))]
    EmptyMessage {
        stage: &'static str,
        conversation_id: String,
    },
    #[snafu(display("storage failed on `{stage}`, {source}"))]
    Storage {
        stage: &'static str,
        source: StorageError,
    },
    #[snafu(display("no Tokio runtime to schedule the reply on `{stage}`, {source}"))]
    NoRuntime {
        stage: &'static str,
        source: tokio::runtime::TryCurrentError,
    },
    #[snafu(display("reply task failed on `{stage}`, {source}"))]
    ReplyTask {
        stage: &'static str,
        source: tokio::task::JoinError,
    },
}

pub type ControllerResult<T> = Result<T, ControllerError>;

/// How a scheduled reply ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    Delivered(Message),
    Cancelled,
    /// The conversation could not be read or written when the reply fired.
    Abandoned,
}

/// Handle to one scheduled reply.
///
/// Dropping the handle detaches it; the reply still lands.
pub struct PendingReply {
    conversation_id: ConversationId,
    message_id: MessageId,
    cancel_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<ReplyOutcome>,
}

impl PendingReply {
    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    /// Id of the local message this reply answers.
    pub fn message_id(&self) -> &MessageId {
        &self.message_id
    }

    /// Asks the reply to stand down. Returns false if it was already cancelled
    /// or has finished; calling it again is harmless.
    pub fn cancel(&mut self) -> bool {
        self.cancel_tx
            .take()
            .map(|tx| tx.send(()).is_ok())
            .unwrap_or(false)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn wait(self) -> ControllerResult<ReplyOutcome> {
        self.task.await.context(ReplyTaskSnafu {
            stage: "wait-reply",
        })
    }
}

struct ReplyJob {
    store: Arc<ConversationStore>,
    generator: Arc<dyn ResponseGenerator>,
    conversation_id: ConversationId,
    sent_message_id: MessageId,
    persona: Persona,
    delay: Duration,
    history_window: usize,
}

impl ReplyJob {
    async fn run(self, cancel_rx: oneshot::Receiver<()>) -> ReplyOutcome {
        // A dropped handle closes the channel; only an explicit send counts as a cancel.
        let cancelled = async move {
            if cancel_rx.await.is_err() {
                std::future::pending::<()>().await;
            }
        };
        tokio::pin!(cancelled);

        tokio::select! {
            _ = &mut cancelled => return self.release(ReplyOutcome::Cancelled),
            _ = tokio::time::sleep(self.delay) => {}
        }

        let history = match self.store.conversation(&self.conversation_id) {
            Ok(conversation) => transcript(conversation.recent_messages(self.history_window)),
            Err(error) => {
                tracing::error!(
                    conversation_id = %self.conversation_id,
                    error = %error,
                    "failed to read history for reply"
                );
                return self.release(ReplyOutcome::Abandoned);
            }
        };

        let generated = tokio::select! {
            _ = &mut cancelled => None,
            text = self.generator.generate(&self.persona, &history) => Some(text),
        };

        match generated {
            Some(text) => self.merge(text),
            None => self.release(ReplyOutcome::Cancelled),
        }
    }

    fn merge(self, text: String) -> ReplyOutcome {
        let reply = Message::reply(text, Utc::now());
        let merged = self
            .store
            .update_conversation(&self.conversation_id, |conversation, is_active| {
                conversation.advance_message_status(&self.sent_message_id, DeliveryStatus::Read);
                conversation.append_message(reply.clone());
                conversation.finish_reply();
                if !is_active {
                    conversation.unread_count = conversation.unread_count.saturating_add(1);
                }
            });

        match merged {
            Ok(conversation) => {
                tracing::debug!(
                    conversation_id = %self.conversation_id,
                    reply_id = %reply.id,
                    unread_count = conversation.unread_count,
                    "merged simulated reply"
                );
                ReplyOutcome::Delivered(reply)
            }
            Err(error) => {
                tracing::error!(
                    conversation_id = %self.conversation_id,
                    error = %error,
                    "failed to merge simulated reply"
                );
                ReplyOutcome::Abandoned
            }
        }
    }

    /// Drops this job's typing contribution without appending anything.
    fn release(self, outcome: ReplyOutcome) -> ReplyOutcome {
        let released = self
            .store
            .update_conversation(&self.conversation_id, |conversation, _| {
                conversation.finish_reply();
            });
        if let Err(error) = released {
            tracing::error!(
                conversation_id = %self.conversation_id,
                error = %error,
                "failed to clear typing state"
            );
        }
        tracing::debug!(conversation_id = %self.conversation_id, ?outcome, "reply stood down");
        outcome
    }
}

/// Orchestrates sends, simulated replies and selection over an injected store.
pub struct ChatController {
    store: Arc<ConversationStore>,
    generator: Arc<dyn ResponseGenerator>,
    reply_delay: ReplyDelay,
    history_window: usize,
}

impl ChatController {
    pub fn new(store: Arc<ConversationStore>, generator: Arc<dyn ResponseGenerator>) -> Self {
        Self {
            store,
            generator,
            reply_delay: ReplyDelay::default(),
            history_window: HISTORY_WINDOW,
        }
    }

    pub fn with_reply_delay(mut self, reply_delay: ReplyDelay) -> Self {
        self.reply_delay = reply_delay;
        self
    }

    /// Clamped to `1..=HISTORY_WINDOW`.
    pub fn with_history_window(mut self, history_window: usize) -> Self {
        self.history_window = history_window.clamp(1, HISTORY_WINDOW);
        self
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    /// Appends a local message and schedules the contact's reply.
    ///
    /// The message, the bumped list time and the typing flag are visible as soon
    /// as this returns. The reply is merged later on the current Tokio runtime.
    pub fn send_message(
        &self,
        conversation_id: &ConversationId,
        text: &str,
    ) -> ControllerResult<PendingReply> {
        ensure!(
            !text.trim().is_empty(),
            EmptyMessageSnafu {
                stage: "send-message",
                conversation_id: conversation_id.to_string(),
            }
        );
        let runtime = Handle::try_current().context(NoRuntimeSnafu {
            stage: "send-message",
        })?;

        let conversation = self
            .store
            .conversation(conversation_id)
            .context(StorageSnafu {
                stage: "load-conversation",
            })?;
        let user = self.store.user(&conversation.user_id).context(StorageSnafu {
            stage: "load-persona",
        })?;

        let message = Message::outgoing(text, Utc::now());
        let message_id = message.id.clone();
        self.store
            .update_conversation(conversation_id, |conversation, _| {
                conversation.append_outgoing(message.clone());
                conversation.begin_reply();
            })
            .context(StorageSnafu {
                stage: "append-message",
            })?;

        let delay = self.reply_delay.sample();
        tracing::debug!(
            conversation_id = %conversation_id,
            message_id = %message_id,
            delay_ms = delay.as_millis() as u64,
            "scheduled simulated reply"
        );

        let job = ReplyJob {
            store: Arc::clone(&self.store),
            generator: Arc::clone(&self.generator),
            conversation_id: conversation_id.clone(),
            sent_message_id: message_id.clone(),
            persona: persona_for(&user),
            delay,
            history_window: self.history_window,
        };
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let task = runtime.spawn(job.run(cancel_rx));

        Ok(PendingReply {
            conversation_id: conversation_id.clone(),
            message_id,
            cancel_tx: Some(cancel_tx),
            task,
        })
    }

    /// Makes `conversation_id` active and marks it read. Idempotent.
    pub fn select_conversation(&self, conversation_id: &ConversationId) -> ControllerResult<()> {
        self.store.select(conversation_id).context(StorageSnafu {
            stage: "select-conversation",
        })?;
        tracing::debug!(conversation_id = %conversation_id, "selected conversation");
        Ok(())
    }

    pub fn clear_selection(&self) {
        self.store.clear_selection();
    }

    /// User-enriched conversation list, most recent first.
    pub fn conversations(&self) -> Vec<ConversationSummary> {
        summaries(&self.store.snapshot(), &self.store.users())
    }

    pub fn active_conversation(&self) -> Option<ActiveConversation> {
        active_conversation(&self.store.snapshot(), &self.store.users())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use futures::FutureExt;
    use futures::future::BoxFuture;
    use parley_llm::{
        BackendFactory, CompletionBackend, GENERATION_FAILED_REPLY, PersonaResponder,
        ProviderConfig, ProviderError, ProviderResult, Speaker, TranscriptEntry,
    };
    use parley_storage::Sender;

    use super::*;

    const DELAY: Duration = Duration::from_millis(2_000);

    /// Generator that records what it was asked and answers with a fixed line.
    struct EchoGenerator {
        reply: String,
        calls: Mutex<Vec<(Persona, Vec<TranscriptEntry>)>>,
    }

    impl EchoGenerator {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(Persona, Vec<TranscriptEntry>)> {
            self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
        }
    }

    impl ResponseGenerator for EchoGenerator {
        fn generate<'a>(
            &'a self,
            persona: &'a Persona,
            history: &'a [TranscriptEntry],
        ) -> BoxFuture<'a, String> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push((persona.clone(), history.to_vec()));
            }
            let reply = self.reply.clone();
            async move { reply }.boxed()
        }
    }

    fn controller(generator: Arc<EchoGenerator>) -> ChatController {
        let store = Arc::new(ConversationStore::seeded(Utc::now()));
        ChatController::new(store, generator).with_reply_delay(ReplyDelay::fixed(DELAY))
    }

    fn conversation(controller: &ChatController, id: &str) -> parley_storage::Conversation {
        match controller.store().conversation(&id.into()) {
            Ok(conversation) => conversation,
            Err(error) => panic!("missing fixture conversation {id}: {error}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn send_appends_synchronously_and_marks_typing() {
        let controller = controller(EchoGenerator::new("hi sweetie"));
        let before = conversation(&controller, "chat-1").messages.len();

        let pending = controller.send_message(&"chat-1".into(), "On my way");
        assert!(pending.is_ok());

        let after = conversation(&controller, "chat-1");
        assert_eq!(after.messages.len(), before + 1);
        let sent = after.last_message().cloned();
        assert_eq!(sent.as_ref().map(|m| m.status), Some(DeliveryStatus::Sent));
        assert_eq!(sent.as_ref().map(|m| m.sender), Some(Sender::Local));
        assert_eq!(sent.as_ref().map(|m| m.sent_at), Some(after.last_message_at));
        assert!(after.is_typing());
    }

    #[tokio::test(start_paused = true)]
    async fn reply_lands_after_the_delay_and_clears_typing() {
        let generator = EchoGenerator::new("Call me!! 📞");
        let controller = controller(Arc::clone(&generator));
        assert!(controller.select_conversation(&"chat-1".into()).is_ok());

        let pending = match controller.send_message(&"chat-1".into(), "Hi mom") {
            Ok(pending) => pending,
            Err(error) => panic!("send failed: {error}"),
        };
        let sent_id = pending.message_id().clone();

        tokio::time::sleep(DELAY / 2).await;
        assert!(generator.calls().is_empty());
        assert!(conversation(&controller, "chat-1").is_typing());

        let outcome = pending.wait().await;
        assert!(matches!(outcome, Ok(ReplyOutcome::Delivered(ref reply)) if reply.text == "Call me!! 📞"));

        let after = conversation(&controller, "chat-1");
        assert!(!after.is_typing());
        assert_eq!(after.unread_count, 0);
        assert_eq!(after.message(&sent_id).map(|m| m.status), Some(DeliveryStatus::Read));
        let reply = after.last_message().cloned();
        assert_eq!(reply.as_ref().map(|m| m.sender), Some(Sender::Remote));
        assert_eq!(reply.as_ref().map(|m| m.status), Some(DeliveryStatus::Read));
        assert_eq!(reply.map(|m| m.sent_at), Some(after.last_message_at));

        let calls = generator.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0.name, "Mom");
        assert_eq!(
            calls[0].1.last(),
            Some(&TranscriptEntry::new(Speaker::User, "Hi mom"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn reply_to_background_conversation_counts_as_unread() {
        let controller = controller(EchoGenerator::new("Still hiring!"));
        assert!(controller.select_conversation(&"chat-1".into()).is_ok());

        let pending = match controller.send_message(&"chat-2".into(), "Any update?") {
            Ok(pending) => pending,
            Err(error) => panic!("send failed: {error}"),
        };
        assert!(matches!(pending.wait().await, Ok(ReplyOutcome::Delivered(_))));

        let chat_2 = conversation(&controller, "chat-2");
        assert_eq!(chat_2.unread_count, 1);
        assert!(!chat_2.is_typing());
        assert_eq!(conversation(&controller, "chat-1").unread_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn generator_sees_at_most_ten_messages() {
        let generator = EchoGenerator::new("ok");
        let controller = controller(Arc::clone(&generator));
        for index in 0..12 {
            let _ = controller.store().update_conversation(&"chat-3".into(), |conversation, _| {
                conversation.append_message(Message::outgoing(format!("pizza {index}"), Utc::now()));
            });
        }

        let pending = controller.send_message(&"chat-3".into(), "one large margherita");
        if let Ok(pending) = pending {
            let _ = pending.wait().await;
        }

        let calls = generator.calls();
        assert_eq!(calls.len(), 1);
        let history = &calls[0].1;
        assert_eq!(history.len(), 10);
        assert_eq!(history[0].text, "pizza 3");
        assert_eq!(history[9].text, "one large margherita");
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_history_window_is_capped() {
        let generator = EchoGenerator::new("ok");
        let controller = controller(Arc::clone(&generator)).with_history_window(25);
        for index in 0..30 {
            let _ = controller.store().update_conversation(&"chat-3".into(), |conversation, _| {
                conversation.append_message(Message::outgoing(format!("pizza {index}"), Utc::now()));
            });
        }

        if let Ok(pending) = controller.send_message(&"chat-3".into(), "pepperoni") {
            let _ = pending.wait().await;
        }

        let calls = generator.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1.len(), HISTORY_WINDOW);
        assert_eq!(calls[0].1.last().map(|entry| entry.text.as_str()), Some("pepperoni"));
    }

    #[tokio::test]
    async fn send_sets_list_time_even_when_it_was_ahead() {
        let now = Utc::now();
        let store = Arc::new(ConversationStore::new(
            parley_storage::seed_users(),
            vec![parley_storage::Conversation::new(
                "chat-1",
                "user-1",
                now + chrono::Duration::minutes(5),
            )],
        ));
        let controller = ChatController::new(store, EchoGenerator::new("x"))
            .with_reply_delay(ReplyDelay::fixed(DELAY));

        let mut pending = match controller.send_message(&"chat-1".into(), "hi") {
            Ok(pending) => pending,
            Err(error) => panic!("send failed: {error}"),
        };
        pending.cancel();

        let after = conversation(&controller, "chat-1");
        let sent = after.message(pending.message_id()).map(|m| m.sent_at);
        assert_eq!(sent, Some(after.last_message_at));
    }

    struct FailingBackend;

    impl CompletionBackend for FailingBackend {
        fn provider_id(&self) -> &str {
            "failing"
        }

        fn model_id(&self) -> &str {
            "failing-1"
        }

        fn complete<'a>(&'a self, _prompt: String) -> BoxFuture<'a, ProviderResult<String>> {
            async {
                Err(ProviderError::Backend {
                    stage: "failing-complete",
                    message: "connection refused".to_string(),
                })
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_generation_still_clears_typing() {
        let factory: BackendFactory = Arc::new(|_: &ProviderConfig, _: &str| {
            Ok(Arc::new(FailingBackend) as Arc<dyn CompletionBackend>)
        });
        let responder =
            PersonaResponder::with_factory(ProviderConfig::default().with_api_key("k"), factory);
        let store = Arc::new(ConversationStore::seeded(Utc::now()));
        let controller = ChatController::new(store, Arc::new(responder))
            .with_reply_delay(ReplyDelay::fixed(DELAY));

        let pending = match controller.send_message(&"chat-2".into(), "Any news?") {
            Ok(pending) => pending,
            Err(error) => panic!("send failed: {error}"),
        };
        let outcome = pending.wait().await;

        assert!(matches!(
            outcome,
            Ok(ReplyOutcome::Delivered(ref reply)) if reply.text == GENERATION_FAILED_REPLY
        ));
        let after = conversation(&controller, "chat-2");
        assert!(!after.is_typing());
        assert_eq!(
            after.last_message().map(|m| m.text.as_str()),
            Some(GENERATION_FAILED_REPLY)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_reply_clears_typing_without_appending() {
        let generator = EchoGenerator::new("never");
        let controller = controller(Arc::clone(&generator));

        let mut pending = match controller.send_message(&"chat-4".into(), "hey") {
            Ok(pending) => pending,
            Err(error) => panic!("send failed: {error}"),
        };
        let len_after_send = conversation(&controller, "chat-4").messages.len();

        assert!(pending.cancel());
        assert!(!pending.cancel());
        assert!(matches!(pending.wait().await, Ok(ReplyOutcome::Cancelled)));

        let after = conversation(&controller, "chat-4");
        assert!(!after.is_typing());
        assert_eq!(after.messages.len(), len_after_send);
        assert!(generator.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_handle_still_delivers() {
        let controller = controller(EchoGenerator::new("fr fr"));
        let before = conversation(&controller, "chat-4").messages.len();

        drop(controller.send_message(&"chat-4".into(), "ngl"));
        tokio::time::sleep(DELAY * 2).await;

        let after = conversation(&controller, "chat-4");
        assert_eq!(after.messages.len(), before + 2);
        assert!(!after.is_typing());
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_sends_keep_typing_until_the_last_reply() {
        let controller = Arc::new(controller(EchoGenerator::new("...")).with_reply_delay(
            ReplyDelay::new(Duration::from_millis(1_000), Duration::from_millis(1_000)),
        ));

        let first = controller.send_message(&"chat-2".into(), "one");
        tokio::time::sleep(Duration::from_millis(600)).await;
        let second = controller.send_message(&"chat-2".into(), "two");

        if let Ok(first) = first {
            let _ = first.wait().await;
        }
        assert!(conversation(&controller, "chat-2").is_typing());

        if let Ok(second) = second {
            let _ = second.wait().await;
        }
        let after = conversation(&controller, "chat-2");
        assert!(!after.is_typing());
        assert_eq!(after.pending_replies, 0);
    }

    #[tokio::test]
    async fn blank_text_and_unknown_conversations_are_rejected() {
        let controller = controller(EchoGenerator::new("x"));

        assert!(matches!(
            controller.send_message(&"chat-1".into(), "  \n\t"),
            Err(ControllerError::EmptyMessage { .. })
        ));
        assert!(matches!(
            controller.send_message(&"chat-99".into(), "hello"),
            Err(ControllerError::Storage {
                source: StorageError::ConversationNotFound { .. },
                ..
            })
        ));
        assert!(matches!(
            controller.select_conversation(&"chat-99".into()),
            Err(ControllerError::Storage { .. })
        ));
    }

    #[test]
    fn send_outside_a_runtime_is_an_error_not_a_panic() {
        let controller = controller(EchoGenerator::new("x"));

        assert!(matches!(
            controller.send_message(&"chat-1".into(), "hello"),
            Err(ControllerError::NoRuntime { .. })
        ));
        assert!(!conversation(&controller, "chat-1").is_typing());
    }

    #[test]
    fn select_zeroes_unread_for_that_conversation_only() {
        let controller = controller(EchoGenerator::new("x"));
        let _ = controller.store().update_conversation(&"chat-3".into(), |conversation, _| {
            conversation.unread_count = 4;
        });

        assert!(controller.select_conversation(&"chat-1".into()).is_ok());
        assert!(controller.select_conversation(&"chat-1".into()).is_ok());

        assert_eq!(conversation(&controller, "chat-1").unread_count, 0);
        assert_eq!(conversation(&controller, "chat-3").unread_count, 4);
        assert_eq!(
            controller.active_conversation().map(|active| active.conversation.id),
            Some("chat-1".into())
        );

        controller.clear_selection();
        assert!(controller.active_conversation().is_none());
    }

    #[test]
    fn reply_delay_samples_within_bounds() {
        let delay = ReplyDelay::new(Duration::from_millis(2_500), Duration::from_millis(1_500));
        assert_eq!(delay.min(), Duration::from_millis(1_500));

        for _ in 0..200 {
            let sample = delay.sample();
            assert!(sample >= delay.min() && sample <= delay.max(), "{sample:?}");
        }
        assert_eq!(ReplyDelay::fixed(DELAY).sample(), DELAY);
    }
}
