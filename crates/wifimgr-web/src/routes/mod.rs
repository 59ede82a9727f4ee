//! HTTP routes of the configuration portal.
//!
//! Endpoints:
//! - `GET /` - Configuration form with the current values
//! - `POST /save` - Form submission (`application/x-www-form-urlencoded`)
//! - anything else - Forwarded to the controller's not-found policy

use std::collections::HashMap;

use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Router,
};
use tower_http::trace::TraceLayer;
use wifimgr_core::{page, PortalRequest, PortalResponse};

use crate::queue::PortalHandle;

/// Create the portal router. Every request is answered by the controller
/// loop through `handle`.
pub fn create_router(handle: PortalHandle) -> Router {
    Router::new()
        // other methods on known paths go through the not-found policy too
        .route("/", get(root_handler).fallback(fallback_handler))
        .route("/save", post(save_handler).fallback(fallback_handler))
        .fallback(fallback_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(handle)
}

/// Handler for `GET /`.
async fn root_handler(State(handle): State<PortalHandle>) -> Response {
    forward(&handle, PortalRequest::Root).await
}

/// Handler for `POST /save`.
async fn save_handler(
    State(handle): State<PortalHandle>,
    Form(fields): Form<HashMap<String, String>>,
) -> Response {
    forward(&handle, PortalRequest::Save(fields)).await
}

async fn fallback_handler(State(handle): State<PortalHandle>, uri: Uri) -> Response {
    let path = uri.path().to_string();
    forward(&handle, PortalRequest::Other { path }).await
}

async fn forward(handle: &PortalHandle, request: PortalRequest) -> Response {
    match handle.request(request).await {
        Ok(response) => render(response),
        Err(e) => {
            tracing::warn!("Portal request not answered: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
        }
    }
}

/// Turn a controller response into HTTP.
pub fn render(response: PortalResponse) -> Response {
    match response {
        PortalResponse::Form(view) => Html(page::render_form(&view)).into_response(),
        PortalResponse::Saved => Html(page::SAVED_PAGE).into_response(),
        PortalResponse::Text { status, body } => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, [(header::CONTENT_TYPE, "text/plain")], body).into_response()
        }
        PortalResponse::Redirect { location } => (
            StatusCode::FOUND,
            [
                (header::LOCATION, location),
                (header::CONTENT_TYPE, "text/plain".to_string()),
            ],
        )
            .into_response(),
    }
}
