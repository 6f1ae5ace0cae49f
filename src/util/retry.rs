//! Refresh-and-replay on rejected access credentials.

use std::sync::Arc;

use reqwest::StatusCode;

use crate::error::RelayError;
use crate::http::{RequestDescriptor, RequestDispatcher};
use crate::refresh::RefreshCoordinator;

/// Replays a request once after a credential refresh.
///
/// A 401 on a request that has not been replayed yet triggers a refresh
/// through the coordinator and one resubmission with the new credential.
/// Whatever the resubmission returns is final. Every other status, and any
/// transport failure, is passed through untouched.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    dispatcher: RequestDispatcher,
    coordinator: Arc<RefreshCoordinator>,
}

impl RetryPolicy {
    pub fn new(dispatcher: RequestDispatcher, coordinator: Arc<RefreshCoordinator>) -> Self {
        Self {
            dispatcher,
            coordinator,
        }
    }

    pub fn dispatcher(&self) -> &RequestDispatcher {
        &self.dispatcher
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    /// Send a request, recovering once from an expired access credential.
    ///
    /// If the store already holds a different access credential than the one
    /// the rejected request carried, an earlier refresh has replaced it; the
    /// request is replayed with that credential and no new refresh starts.
    pub async fn execute(
        &self,
        mut descriptor: RequestDescriptor,
    ) -> Result<reqwest::Response, RelayError> {
        let (response, sent_with) = self.dispatcher.send_with_credential(&descriptor).await?;
        if response.status() != StatusCode::UNAUTHORIZED || descriptor.retried {
            return Ok(response);
        }

        descriptor.retried = true;
        let access = match self.dispatcher.store().access_token()? {
            Some(current) if sent_with.as_deref() != Some(current.as_str()) => {
                tracing::debug!(
                    method = %descriptor.method,
                    path = %descriptor.path,
                    "credential already replaced, replaying"
                );
                current
            }
            _ => {
                tracing::debug!(
                    method = %descriptor.method,
                    path = %descriptor.path,
                    "access credential rejected, refreshing"
                );
                self.coordinator
                    .request_refresh()
                    .await
                    .map_err(RelayError::Refresh)?
            }
        };
        descriptor.bearer(&access)?;
        self.dispatcher.send(&descriptor).await
    }
}
