//! [`WebPortal`] over `EspHttpServer`.
//!
//! HTTP handlers run on the httpd task. Each request is handed to the loop
//! thread through a bounded channel and the handler waits for the reply, so
//! the controller stays the only owner of the record and the store.

use std::sync::mpsc::{self, Receiver, SyncSender};
use std::time::Duration;

use anyhow::bail;
use esp_idf_svc::http::server::{Configuration, EspHttpConnection, EspHttpServer, Request};
use esp_idf_svc::http::Method;
use esp_idf_svc::io::{Read, Write};
use log::{debug, info, warn};
use wifimgr_core::page::{render_form, SAVED_PAGE};
use wifimgr_core::{FormFields, PortalError, PortalRequest, PortalResponse, WebPortal};

/// Requests that may wait for the loop before handlers block.
pub const QUEUE_CAPACITY: usize = 4;

/// How long a handler waits for the loop. A connect attempt blocks the loop
/// for up to the connection timeout.
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(30);

/// Methods handed to the controller as `Other` requests when no route matches.
const UNROUTED_METHODS: [Method; 6] = [
    Method::Get,
    Method::Head,
    Method::Post,
    Method::Put,
    Method::Delete,
    Method::Patch,
];

/// Largest accepted form body.
const MAX_BODY: usize = 2048;

struct PendingRequest {
    request: PortalRequest,
    reply: SyncSender<PortalResponse>,
}

type HttpRequest<'r, 'c> = Request<&'r mut EspHttpConnection<'c>>;

pub struct EspPortal {
    server: Option<EspHttpServer<'static>>,
    sender: SyncSender<PendingRequest>,
    receiver: Receiver<PendingRequest>,
}

impl EspPortal {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::sync_channel(QUEUE_CAPACITY);
        Self {
            server: None,
            sender,
            receiver,
        }
    }

    fn register(&mut self) -> anyhow::Result<EspHttpServer<'static>> {
        let mut server = EspHttpServer::new(&Configuration {
            uri_match_wildcard: true,
            ..Default::default()
        })?;

        let sender = self.sender.clone();
        server.fn_handler("/", Method::Get, move |req| {
            let response = forward(&sender, PortalRequest::Root);
            send(req, response)
        })?;

        let sender = self.sender.clone();
        server.fn_handler("/save", Method::Post, move |mut req| {
            let body = read_body(&mut req)?;
            let fields: FormFields = serde_urlencoded::from_bytes(&body)?;
            let response = forward(&sender, PortalRequest::Save(fields));
            send(req, response)
        })?;

        // registered last so the routes above win; any method on any other
        // route is answered through the not-found policy
        for method in UNROUTED_METHODS {
            let sender = self.sender.clone();
            server.fn_handler("/*", method, move |req| {
                let path = req.uri().split('?').next().unwrap_or("/").to_string();
                let response = forward(&sender, PortalRequest::Other { path });
                send(req, response)
            })?;
        }

        Ok(server)
    }
}

impl Default for EspPortal {
    fn default() -> Self {
        Self::new()
    }
}

impl WebPortal for EspPortal {
    fn begin(&mut self) -> Result<(), PortalError> {
        if self.server.is_some() {
            debug!("Portal server already running");
            return Ok(());
        }
        let server = self.register().map_err(|e| PortalError(e.to_string()))?;
        self.server = Some(server);
        info!("Portal HTTP server started");
        Ok(())
    }

    fn is_serving(&self) -> bool {
        self.server.is_some()
    }

    fn handle_client(&mut self, handler: &mut dyn FnMut(PortalRequest) -> PortalResponse) {
        if let Ok(PendingRequest { request, reply }) = self.receiver.try_recv() {
            if reply.send(handler(request)).is_err() {
                debug!("Portal client went away before the reply");
            }
        }
    }
}

/// Queue `request` for the loop and wait for its answer.
fn forward(sender: &SyncSender<PendingRequest>, request: PortalRequest) -> PortalResponse {
    let (reply, response) = mpsc::sync_channel(1);
    if sender.send(PendingRequest { request, reply }).is_err() {
        return PortalResponse::text(503, "Portal loop is not running");
    }
    response.recv_timeout(REPLY_TIMEOUT).unwrap_or_else(|_| {
        warn!("Portal loop did not answer within {:?}", REPLY_TIMEOUT);
        PortalResponse::text(503, "Portal loop did not answer")
    })
}

fn read_body(req: &mut HttpRequest<'_, '_>) -> anyhow::Result<Vec<u8>> {
    let mut body = Vec::new();
    let mut buf = [0u8; 256];
    loop {
        let len = req.read(&mut buf)?;
        if len == 0 {
            return Ok(body);
        }
        body.extend_from_slice(&buf[..len]);
        if body.len() > MAX_BODY {
            bail!("form body larger than {} bytes", MAX_BODY);
        }
    }
}

fn send(req: HttpRequest<'_, '_>, response: PortalResponse) -> anyhow::Result<()> {
    match response {
        PortalResponse::Form(view) => write(req, 200, "text/html", render_form(&view).as_bytes()),
        PortalResponse::Saved => write(req, 200, "text/html", SAVED_PAGE.as_bytes()),
        PortalResponse::Text { status, body } => write(req, status, "text/plain", body.as_bytes()),
        PortalResponse::Redirect { location } => {
            req.into_response(
                302,
                None,
                &[("Location", location.as_str()), ("Content-Type", "text/plain")],
            )?;
            Ok(())
        }
    }
}

fn write(
    req: HttpRequest<'_, '_>,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> anyhow::Result<()> {
    let mut response = req.into_response(status, None, &[("Content-Type", content_type)])?;
    response.write_all(body)?;
    Ok(())
}
