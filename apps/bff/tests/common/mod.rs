//! 統合テスト共通のヘルパー
//!
//! 認証サービスとバックエンドを、ローカルポートで動く最小限の axum サーバーで代替する。

#![allow(dead_code)]

use std::{collections::HashMap, sync::Arc};

use axum::{
    Json,
    Router,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use wingman_bff::{
    app_builder::{AppDependencies, build_app},
    config::BffConfig,
};
use wingman_domain::{
    clock::{Clock, SystemClock},
    persona::PersonaCatalog,
};
use wingman_infra::session_store::InMemorySessionStore;

pub const USER_ID: &str = "0b5a7c8e-1111-4a4a-9c9c-123456789abc";
pub const EMAIL: &str = "user@example.com";
pub const PASSWORD: &str = "password123";
pub const ACCESS_TOKEN: &str = "access-token";
pub const ANON_KEY: &str = "anon-key";

/// ルーターを空きポートで起動し、ベース URL を返す
pub async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn has_api_key(headers: &HeaderMap) -> bool {
    headers.get("apikey").and_then(|v| v.to_str().ok()) == Some(ANON_KEY)
}

fn user_json() -> serde_json::Value {
    json!({ "id": USER_ID, "email": EMAIL })
}

/// GoTrue 互換の認証サービス（パスワード認証・トークン検証・サインアウトのみ）
pub fn fake_auth_service() -> Router {
    Router::new()
        .route(
            "/auth/v1/token",
            post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                if !has_api_key(&headers) {
                    return StatusCode::UNAUTHORIZED.into_response();
                }
                if body["email"] == EMAIL && body["password"] == PASSWORD {
                    Json(json!({
                        "access_token": ACCESS_TOKEN,
                        "refresh_token": "refresh-token",
                        "expires_in": 3600,
                        "user": user_json(),
                    }))
                    .into_response()
                } else {
                    (
                        StatusCode::BAD_REQUEST,
                        Json(json!({ "error": "invalid_grant" })),
                    )
                        .into_response()
                }
            }),
        )
        .route(
            "/auth/v1/user",
            get(|headers: HeaderMap| async move {
                match bearer(&headers) {
                    Some(ACCESS_TOKEN) => Json(user_json()).into_response(),
                    _ => StatusCode::UNAUTHORIZED.into_response(),
                }
            }),
        )
        .route("/auth/v1/logout", post(|| async { StatusCode::NO_CONTENT }))
        .route("/auth/v1/health", get(|| async { StatusCode::OK }))
}

/// 外部バックエンド
///
/// `POST /auth/verify` は `verify_status` を返す。
pub fn fake_backend(verify_status: StatusCode) -> Router {
    Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .route(
            "/auth/verify",
            post(move |headers: HeaderMap| async move {
                if bearer(&headers) == Some(ACCESS_TOKEN) {
                    verify_status.into_response()
                } else {
                    StatusCode::UNAUTHORIZED.into_response()
                }
            }),
        )
        .route(
            "/api/chat",
            post(|body: String| async move { Json(json!({ "echo": body })) }),
        )
        .route(
            "/api/crash",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        )
}

/// 環境変数の組からアプリ全体を組み立てる
pub fn build_test_app(vars: &[(&str, &str)]) -> Router {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let config = BffConfig::from_lookup(|key| vars.get(key).cloned()).unwrap();

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let deps = AppDependencies::from_config(
        &config,
        Arc::new(InMemorySessionStore::new(clock.clone())),
        clock,
        Arc::new(PersonaCatalog::bundled().unwrap()),
    );
    build_app(&config, deps)
}

/// 認証サービスとバックエンドを起動し、それらに接続したアプリを返す
pub async fn build_connected_app(verify_status: StatusCode) -> Router {
    let auth_url = spawn_server(fake_auth_service()).await;
    let backend_url = spawn_server(fake_backend(verify_status)).await;
    build_test_app(&[
        ("AUTH_URL", &auth_url),
        ("AUTH_ANON_KEY", ANON_KEY),
        ("BACKEND_URL", &backend_url),
    ])
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Set-Cookie から指定 Cookie の値を取り出す
pub fn cookie_value(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.to_string())
}
