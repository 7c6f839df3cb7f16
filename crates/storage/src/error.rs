use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StorageError {
    #[snafu(display("conversation '{id}' was not found on `{stage}`"))]
    ConversationNotFound { stage: &'static str, id: String },
    #[snafu(display("user '{id}' was not found on `{stage}`"))]
    UserNotFound { stage: &'static str, id: String },
    #[snafu(display("message '{message_id}' was not found in conversation '{conversation_id}'"))]
    MessageNotFound {
        stage: &'static str,
        conversation_id: String,
        message_id: String,
    },
    #[snafu(display("storage id '{raw}' is invalid for {id_type}"))]
    InvalidId {
        stage: &'static str,
        id_type: &'static str,
        raw: String,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;
