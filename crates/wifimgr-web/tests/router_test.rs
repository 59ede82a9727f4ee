use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use pretty_assertions::assert_eq;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tower::ServiceExt;
use wifimgr_core::{PortalRequest, PortalResponse, PortalView, WebPortal};
use wifimgr_web::{create_router, request_queue, AxumPortal};

type Seen = Arc<Mutex<Vec<PortalRequest>>>;

/// Router whose requests are answered by `respond` on a background task.
fn router_with(respond: fn(&PortalRequest) -> PortalResponse) -> (Router, Seen) {
    let (handle, mut receiver) = request_queue(8);
    let seen: Seen = Arc::default();

    let log = seen.clone();
    tokio::spawn(async move {
        while let Some(pending) = receiver.recv().await {
            let response = respond(&pending.request);
            log.lock().unwrap().push(pending.request.clone());
            pending.respond(response);
        }
    });

    (create_router(handle), seen)
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn form_view(_: &PortalRequest) -> PortalResponse {
    PortalResponse::Form(PortalView {
        ssid: "home".to_string(),
        udp_enabled: true,
        ..Default::default()
    })
}

#[tokio::test]
async fn test_root_renders_form() {
    let (app, seen) = router_with(form_view);

    let response = app
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains(r#"name="ssid" value="home""#));
    assert!(html.contains("onchange=\"toggle('enableUDP', 'udpConfig')\" checked>"));
    assert_eq!(*seen.lock().unwrap(), vec![PortalRequest::Root]);
}

#[tokio::test]
async fn test_save_forwards_decoded_form() {
    let (app, seen) = router_with(|_| PortalResponse::Saved);

    let response = app
        .oneshot(
            Request::post("/save")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("ssid=My+Net&password=p%26ss&enableMQTT=on"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Configuration Saved"));

    let seen = seen.lock().unwrap();
    let PortalRequest::Save(fields) = &seen[0] else {
        panic!("expected a save request, got {:?}", seen[0]);
    };
    assert_eq!(fields.get("ssid").map(String::as_str), Some("My Net"));
    assert_eq!(fields.get("password").map(String::as_str), Some("p&ss"));
    assert_eq!(fields.get("enableMQTT").map(String::as_str), Some("on"));
    assert_eq!(fields.len(), 3);
}

#[tokio::test]
async fn test_text_response_keeps_status() {
    let (app, _) = router_with(|_| PortalResponse::text(400, "Missing required parameters"));

    let response = app
        .oneshot(
            Request::post("/save")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("ssid=net"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/plain"
    );
    assert_eq!(body_text(response).await, "Missing required parameters");
}

#[tokio::test]
async fn test_unknown_path_goes_to_controller() {
    let (app, seen) = router_with(|_| PortalResponse::Redirect {
        location: "/".to_string(),
    });

    let response = app
        .oneshot(Request::get("/generate_204").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");
    assert_eq!(
        *seen.lock().unwrap(),
        vec![PortalRequest::Other {
            path: "/generate_204".to_string()
        }]
    );
}

#[tokio::test]
async fn test_wrong_method_on_known_path_goes_to_controller() {
    let (app, seen) = router_with(|_| PortalResponse::Redirect {
        location: "/".to_string(),
    });

    let response = app
        .clone()
        .oneshot(Request::get("/save").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);

    let response = app
        .oneshot(Request::delete("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            PortalRequest::Other {
                path: "/save".to_string()
            },
            PortalRequest::Other {
                path: "/".to_string()
            },
        ]
    );
}

#[tokio::test]
async fn test_stopped_loop_is_unavailable() {
    let (handle, receiver) = request_queue(8);
    drop(receiver);

    let response = create_router(handle)
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[test]
fn test_axum_portal_serves_over_tcp() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut portal = AxumPortal::new("127.0.0.1:0".parse().unwrap(), runtime.handle().clone());
    assert!(!portal.is_serving());
    assert_eq!(portal.local_addr(), None);

    portal.begin().unwrap();
    let addr = portal.local_addr().unwrap();
    // a second begin keeps the existing listener
    portal.begin().unwrap();
    assert_eq!(portal.local_addr(), Some(addr));
    assert!(portal.is_serving());

    let client = runtime.spawn(async move {
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /hotspot-detect.html HTTP/1.1\r\nHost: portal\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();
        raw
    });

    let mut seen = Vec::new();
    for _ in 0..2000 {
        if client.is_finished() {
            break;
        }
        portal.handle_client(&mut |request| {
            seen.push(request);
            PortalResponse::Redirect {
                location: "/".to_string(),
            }
        });
        std::thread::sleep(Duration::from_millis(5));
    }

    let raw = runtime.block_on(client).unwrap();
    assert!(raw.starts_with("HTTP/1.1 302"), "unexpected response: {raw}");
    assert!(raw.to_lowercase().contains("location: /\r\n"));
    assert_eq!(
        seen,
        vec![PortalRequest::Other {
            path: "/hotspot-detect.html".to_string()
        }]
    );

    portal.shutdown();
    assert!(!portal.is_serving());
}
