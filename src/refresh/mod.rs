//! Single-flight credential refresh and session notifications.

pub mod coordinator;
pub mod events;
pub mod exchange;

pub use coordinator::RefreshCoordinator;
pub use events::{SessionEvent, SessionEvents};
pub use exchange::{HttpRefreshExchange, RefreshExchange};
