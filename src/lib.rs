//! bearer-relay: authenticated HTTP request layer
//!
//! Attaches bearer credentials to outbound calls, refreshes an expired access
//! credential exactly once no matter how many requests hit the expiry at the
//! same time, and replays each rejected request once with the new credential.
//!
//! # Quick Start
//!
//! ```no_run
//! use bearer_relay::prelude::*;
//!
//! # async fn example() -> bearer_relay::error::Result<()> {
//! let client = AuthenticatedClient::from_env()?;
//! client
//!     .login("ada@example.com", "correct horse", StorageScope::Durable)
//!     .await?;
//! let profile: serde_json::Value = client
//!     .execute_json(RequestDescriptor::get("profile/profile"))
//!     .await?;
//! println!("{profile}");
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod prelude;
pub mod refresh;
pub mod session;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
