pub mod controller;
pub mod view;

pub use controller::{
    ChatController, ControllerError, ControllerResult, PendingReply, ReplyDelay, ReplyOutcome,
};
pub use view::{
    ActiveConversation, ConversationSummary, EMPTY_PREVIEW, TYPING_SUBTITLE, format_clock,
    format_time_label,
};
