//! Local probe targets for tests

use std::net::SocketAddr;
use std::time::Duration;

use axum::{http::StatusCode, response::Redirect, routing::get, Router};
use tokio::net::TcpListener;

/// How long `/slow` takes to answer
pub const SLOW_RESPONSE: Duration = Duration::from_secs(10);

pub struct TestTarget {
    pub addr: SocketAddr,
}

impl TestTarget {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Serve a small set of canned responses on an ephemeral port
pub async fn spawn_target() -> TestTarget {
    let app = Router::new()
        .route("/ok", get(|| async { "ok" }))
        .route("/redirect", get(|| async { Redirect::temporary("/ok") }))
        .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
        .route("/error", get(|| async { StatusCode::SERVICE_UNAVAILABLE }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(SLOW_RESPONSE).await;
                "late"
            }),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestTarget { addr }
}

/// URL of a local port with nothing listening
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/", addr)
}
