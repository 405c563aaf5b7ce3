pub mod presence;
pub mod query;
pub mod receipts;
pub mod session;
pub mod store;

pub use presence::{ConnectionHandle, OutboundFrame, PresenceEntry, PresenceRegistry};
pub use query::ConversationQueryService;
pub use receipts::ReadReceiptCoordinator;
pub use session::ChatSessionService;
pub use store::{ConversationStore, SupabaseConversationStore};
