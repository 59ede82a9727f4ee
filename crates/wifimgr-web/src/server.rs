//! [`WebPortal`] implementation that serves the portal with Axum.
//!
//! The HTTP server runs on a tokio runtime while the controller loop stays on
//! its own thread. [`AxumPortal::handle_client`] drains one queued request per
//! call and never blocks.

use std::net::SocketAddr;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use wifimgr_core::{PortalError, PortalRequest, PortalResponse, WebPortal};

use crate::queue::{request_queue, PendingRequest, PortalHandle};
use crate::routes::create_router;

/// Requests that may wait for the loop before handlers start blocking.
pub const QUEUE_CAPACITY: usize = 16;

pub struct AxumPortal {
    addr: SocketAddr,
    runtime: Handle,
    handle: PortalHandle,
    receiver: mpsc::Receiver<PendingRequest>,
    local_addr: Option<SocketAddr>,
    server: Option<JoinHandle<()>>,
}

impl AxumPortal {
    /// Create a portal that will listen on `addr` once started. The server
    /// task is spawned on `runtime`.
    pub fn new(addr: SocketAddr, runtime: Handle) -> Self {
        let (handle, receiver) = request_queue(QUEUE_CAPACITY);
        Self {
            addr,
            runtime,
            handle,
            receiver,
            local_addr: None,
            server: None,
        }
    }

    /// Handle for queueing requests without going through HTTP.
    pub fn handle(&self) -> PortalHandle {
        self.handle.clone()
    }

    /// Address actually bound, available after [`WebPortal::begin`].
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Stop the HTTP server. Queued requests are dropped.
    pub fn shutdown(&mut self) {
        if let Some(server) = self.server.take() {
            server.abort();
            info!("Portal server stopped");
        }
    }
}

impl WebPortal for AxumPortal {
    fn begin(&mut self) -> Result<(), PortalError> {
        if self.is_serving() {
            debug!("Portal server already running");
            return Ok(());
        }

        let listener = std::net::TcpListener::bind(self.addr)
            .map_err(|e| PortalError(format!("failed to bind {}: {}", self.addr, e)))?;
        listener
            .set_nonblocking(true)
            .map_err(|e| PortalError(e.to_string()))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| PortalError(e.to_string()))?;

        let _guard = self.runtime.enter();
        let listener =
            tokio::net::TcpListener::from_std(listener).map_err(|e| PortalError(e.to_string()))?;
        let app = create_router(self.handle.clone());

        self.server = Some(self.runtime.spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Portal server error: {}", e);
            }
        }));
        self.local_addr = Some(local_addr);
        info!("Portal listening on http://{}", local_addr);
        Ok(())
    }

    fn is_serving(&self) -> bool {
        self.server
            .as_ref()
            .is_some_and(|server| !server.is_finished())
    }

    fn handle_client(&mut self, handler: &mut dyn FnMut(PortalRequest) -> PortalResponse) {
        if let Ok(PendingRequest { request, reply }) = self.receiver.try_recv() {
            let response = handler(request);
            if reply.send(response).is_err() {
                debug!("Portal client went away before the reply");
            }
        }
    }
}

impl Drop for AxumPortal {
    fn drop(&mut self) {
        self.shutdown();
    }
}
