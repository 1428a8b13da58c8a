// Business logic services sitting between the handlers and the store.

pub mod catalog_sync;
pub mod email;
pub mod outbox;
pub mod recommendation;
pub mod stock;
pub mod tracking;
pub mod upload;

pub use catalog_sync::{CatalogSyncService, SyncOutcome};
pub use email::EmailService;
pub use outbox::{NotificationKind, OutboxDispatcher};
pub use recommendation::RecommendationService;
