use std::sync::Arc;

use gatekeeper_admin::GatekeeperMetrics;
use gatekeeper_rate_limit::{RateLimitSettings, RateLimiter};
use gatekeeper_server::{build_router, serve_listener, Message};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

async fn get_ping(addr: std::net::SocketAddr) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /ping HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let text = String::from_utf8(raw).unwrap();

    let status = text
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap();
    let body = text
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.to_string())
        .unwrap_or_default();
    (status, body)
}

#[tokio::test]
async fn test_loopback_client_is_throttled() {
    let settings = RateLimitSettings {
        capacity: 2,
        refill_rate: 0.0,
        ..RateLimitSettings::default()
    };
    let limiter = RateLimiter::new(settings).unwrap();
    let metrics = Arc::new(GatekeeperMetrics::new().unwrap());
    let router = build_router(limiter.clone(), metrics.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(serve_listener(listener, router, async move {
        let _ = stop_rx.await;
    }));

    let (status, body) = get_ping(addr).await;
    assert_eq!(status, 200);
    assert!(body.contains("Successful"));

    let (status, _) = get_ping(addr).await;
    assert_eq!(status, 200);

    let (status, body) = get_ping(addr).await;
    assert_eq!(status, 429);
    let message: Message = serde_json::from_str(body.trim()).unwrap();
    assert_eq!(message, Message::at_capacity());

    // Each connection used a different source port, yet one client was tracked.
    assert_eq!(limiter.registry().len(), 1);
    assert!(limiter.registry().contains("127.0.0.1"));
    assert_eq!(metrics.requests_rate_limited.get(), 1);

    stop_tx.send(()).unwrap();
    server.await.unwrap().unwrap();
}
