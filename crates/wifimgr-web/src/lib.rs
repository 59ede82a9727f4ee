//! # wifimgr-web
//!
//! Configuration portal served over HTTP with Axum.
//!
//! This crate provides:
//! - The portal router (`GET /`, `POST /save`, fallback)
//! - A bounded request queue between HTTP handlers and the controller loop
//! - [`AxumPortal`], the [`wifimgr_core::WebPortal`] used on Linux hosts
//!
//! ## Usage
//!
//! ```rust,ignore
//! use wifimgr_web::AxumPortal;
//!
//! let runtime = tokio::runtime::Runtime::new()?;
//! let portal = AxumPortal::new("0.0.0.0:80".parse()?, runtime.handle().clone());
//! let controller = Controller::new(config, medium, radio, dns, portal, SystemClock::new())?;
//! ```

pub mod queue;
pub mod routes;
pub mod server;

// Re-exports
pub use queue::{request_queue, PendingRequest, PortalHandle, QueueError};
pub use routes::create_router;
pub use server::AxumPortal;
