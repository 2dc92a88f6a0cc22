//! # Request ID レイヤーのテスト
//!
//! `build_app` が組み立てたレイヤー構成で、Request ID がレスポンスと
//! 外部サービスへのリクエストの両方に伝播することを検証する。

mod common;

use std::sync::{Arc, Mutex};

use axum::{Router, body::Body, http::HeaderMap, routing::get};
use common::{build_test_app, spawn_server};
use http::{Request, StatusCode};
use pretty_assertions::assert_eq;
use tower::ServiceExt;

async fn send(app: Router, request_id: Option<&str>) -> axum::response::Response {
    let mut builder = Request::builder().uri("/health");
    if let Some(id) = request_id {
        builder = builder.header("x-request-id", id);
    }
    app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap()
}

#[tokio::test]
async fn test_レスポンスにx_request_idヘッダーが含まれる() {
    let response = send(build_test_app(&[]), None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers().contains_key("x-request-id"),
        "レスポンスに x-request-id ヘッダーが含まれること"
    );
}

#[tokio::test]
async fn test_クライアント提供のx_request_idがそのまま返される() {
    let custom_id = "client-provided-request-id-123";

    let response = send(build_test_app(&[]), Some(custom_id)).await;

    assert_eq!(
        response.headers().get("x-request-id").unwrap().to_str().unwrap(),
        custom_id,
        "クライアント提供の Request ID がそのまま返されること"
    );
}

#[tokio::test]
async fn test_自動生成のx_request_idがuuid_v7形式である() {
    let response = send(build_test_app(&[]), None).await;

    let request_id = response
        .headers()
        .get("x-request-id")
        .unwrap()
        .to_str()
        .unwrap();
    let uuid = uuid::Uuid::parse_str(request_id)
        .unwrap_or_else(|_| panic!("有効な UUID であること: {request_id}"));
    assert_eq!(
        uuid.get_version(),
        Some(uuid::Version::SortRand),
        "UUID v7（SortRand）であること"
    );
}

#[tokio::test]
async fn test_プロキシ先にx_request_idが伝播する() {
    // Given: 受け取った x-request-id を記録する上流
    let seen: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let recorder = seen.clone();
    let upstream = spawn_server(Router::new().route(
        "/ping",
        get(move |headers: HeaderMap| {
            let recorder = recorder.clone();
            async move {
                *recorder.lock().unwrap() = headers
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                StatusCode::OK
            }
        }),
    ))
    .await;
    let app = build_test_app(&[("BACKEND_URL", &upstream)]);

    // When
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/proxy/ping")
                .header("x-request-id", "trace-me")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // Then
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(seen.lock().unwrap().as_deref(), Some("trace-me"));
}
