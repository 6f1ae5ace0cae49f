//! Outbound request description and dispatch.

pub mod dispatcher;
pub mod request;

pub use dispatcher::{build_client, RequestDispatcher};
pub use request::{RequestBody, RequestDescriptor};
