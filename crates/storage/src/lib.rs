pub mod error;
pub mod fixtures;
pub mod ids;
pub mod memory;
pub mod types;

pub use error::{StorageError, StorageResult};
pub use fixtures::{seed_conversations, seed_users};
pub use ids::{ConversationId, MessageId, UserId};
pub use memory::{ConversationStore, StoreSnapshot};
pub use types::{Conversation, DeliveryStatus, Message, Sender, User};
