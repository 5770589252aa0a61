use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use cfmg::events::webhook::{sign, SIGNATURE_HEADER};
use cfmg::{CfmgError, Event, Sink, WebhookSink};
use tokio::sync::mpsc;

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn test_webhook_posts_signed_json_body() {
    let (tx, mut rx) = mpsc::channel::<(Option<String>, Vec<u8>)>(1);
    let app = Router::new().route(
        "/hook",
        post(move |headers: HeaderMap, body: Bytes| {
            let tx = tx.clone();
            async move {
                let sig = headers
                    .get(SIGNATURE_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(String::from);
                let _ = tx.send((sig, body.to_vec())).await;
                StatusCode::OK
            }
        }),
    );
    let addr = serve(app).await;

    let sink = WebhookSink::new(
        format!("http://{}/hook", addr),
        Some("s3cret".to_string()),
        Duration::from_secs(2),
    )
    .unwrap();

    let event = Event::new("cf.field.created", "posts.likes", serde_json::json!({"type": "int"}));
    sink.emit(&event).await.unwrap();

    let (sig, body) = rx.recv().await.unwrap();
    let received: Event = serde_json::from_slice(&body).unwrap();
    assert_eq!(received.name, "cf.field.created");

    // receiver recomputes the HMAC over the raw body it got
    let expected = format!("sha256={}", sign("s3cret", &body));
    assert_eq!(sig.as_deref(), Some(expected.as_str()));
}

#[tokio::test]
async fn test_webhook_without_secret_sends_no_signature() {
    let (tx, mut rx) = mpsc::channel::<Option<String>>(1);
    let app = Router::new().route(
        "/hook",
        post(move |headers: HeaderMap, _body: Bytes| {
            let tx = tx.clone();
            async move {
                let sig = headers
                    .get(SIGNATURE_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(String::from);
                let _ = tx.send(sig).await;
                StatusCode::OK
            }
        }),
    );
    let addr = serve(app).await;

    let sink = WebhookSink::new(
        format!("http://{}/hook", addr),
        None,
        Duration::from_secs(2),
    )
    .unwrap();

    sink.emit(&Event::new("cf.scan", "1", serde_json::Value::Null))
        .await
        .unwrap();

    assert_eq!(rx.recv().await.unwrap(), None);
}

#[tokio::test]
async fn test_non_2xx_response_is_a_delivery_failure() {
    let app = Router::new().route(
        "/hook",
        post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let addr = serve(app).await;

    let sink = WebhookSink::new(
        format!("http://{}/hook", addr),
        None,
        Duration::from_secs(2),
    )
    .unwrap();

    let err = sink
        .emit(&Event::new("cf.scan", "1", serde_json::Value::Null))
        .await
        .unwrap_err();
    assert!(matches!(err, CfmgError::WebhookStatus { status: 500 }));
}

#[tokio::test]
async fn test_redirect_status_counts_as_failure() {
    let app = Router::new().route(
        "/hook",
        post(|| async { StatusCode::FOUND }),
    );
    let addr = serve(app).await;

    let sink = WebhookSink::new(
        format!("http://{}/hook", addr),
        None,
        Duration::from_secs(2),
    )
    .unwrap();

    let err = sink
        .emit(&Event::new("cf.scan", "1", serde_json::Value::Null))
        .await
        .unwrap_err();
    assert!(matches!(err, CfmgError::WebhookStatus { status: 302 }));
}

#[tokio::test]
async fn test_connection_refused_is_a_delivery_failure() {
    let sink = WebhookSink::new(
        "http://127.0.0.1:1/hook",
        None,
        Duration::from_millis(500),
    )
    .unwrap();

    let err = sink
        .emit(&Event::new("cf.scan", "1", serde_json::Value::Null))
        .await
        .unwrap_err();
    assert!(matches!(err, CfmgError::Http(_)));
}
