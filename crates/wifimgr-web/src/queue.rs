//! Hand-off between async HTTP handlers and the controller loop.
//!
//! Handlers push a [`PendingRequest`] into a bounded channel and await the
//! one-shot reply; the loop thread drains the channel one request per tick.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use wifimgr_core::{PortalRequest, PortalResponse};

/// How long a handler waits for the loop. A connect attempt blocks the loop
/// for up to the connection timeout.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(30);

/// A request waiting for the controller loop.
#[derive(Debug)]
pub struct PendingRequest {
    pub request: PortalRequest,
    pub reply: oneshot::Sender<PortalResponse>,
}

impl PendingRequest {
    /// Send the response back to the waiting handler.
    pub fn respond(self, response: PortalResponse) {
        if self.reply.send(response).is_err() {
            tracing::debug!("Portal client went away before the reply");
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("portal loop is not running")]
    Closed,
    #[error("portal loop did not answer within {0:?}")]
    Timeout(Duration),
}

/// Sending side of the request queue, cloned into the router state.
#[derive(Debug, Clone)]
pub struct PortalHandle {
    sender: mpsc::Sender<PendingRequest>,
    reply_timeout: Duration,
}

impl PortalHandle {
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Queue `request` and wait for the loop's answer.
    pub async fn request(&self, request: PortalRequest) -> Result<PortalResponse, QueueError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(PendingRequest { request, reply })
            .await
            .map_err(|_| QueueError::Closed)?;

        match tokio::time::timeout(self.reply_timeout, response).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(QueueError::Closed),
            Err(_) => Err(QueueError::Timeout(self.reply_timeout)),
        }
    }
}

/// Create a bounded request queue.
pub fn request_queue(capacity: usize) -> (PortalHandle, mpsc::Receiver<PendingRequest>) {
    let (sender, receiver) = mpsc::channel(capacity);
    let handle = PortalHandle {
        sender,
        reply_timeout: DEFAULT_REPLY_TIMEOUT,
    };
    (handle, receiver)
}
