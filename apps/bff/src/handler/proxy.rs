//! # プロキシハンドラ
//!
//! ブラウザから直接呼べない外部サービスへの中継。
//!
//! - `/api/proxy/{*path}` → `${BACKEND_URL}/{path}?{query}`
//! - `/api/auth-proxy/{*path}` → `${AUTH_URL}/{path}?{query}`（`apikey` ヘッダーを付与）
//!
//! 上流のステータスとボディをそのまま返す。リトライはしない。
//! エラー時のボディは Problem Details ではなく `{"error": ...}` 形式。

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use wingman_shared::event_log::error;

use crate::{middleware::request_id::inject_request_id, usecase::handoff::join_url};

/// 上流へ引き継ぐリクエストヘッダー
const FORWARDED_HEADERS: [header::HeaderName; 2] = [header::CONTENT_TYPE, header::AUTHORIZATION];

pub struct ProxyState {
    pub http_client:   reqwest::Client,
    pub backend_url:   Option<String>,
    pub auth_url:      Option<String>,
    pub auth_anon_key: Option<String>,
}

/// 中継先
struct Upstream<'a> {
    base:    &'a str,
    api_key: Option<&'a str>,
}

/// GET | POST | OPTIONS /api/proxy/{*path}
#[tracing::instrument(skip_all, fields(upstream = "backend"))]
pub async fn backend_proxy(
    State(state): State<Arc<ProxyState>>,
    Path(path): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if method == Method::OPTIONS {
        return preflight_response();
    }
    let Some(base) = state.backend_url.as_deref() else {
        return not_configured("BACKEND_URL");
    };

    let upstream = Upstream {
        base,
        api_key: None,
    };
    forward(&state.http_client, &upstream, &path, method, &uri, &headers, body).await
}

/// GET | POST | OPTIONS /api/auth-proxy/{*path}
#[tracing::instrument(skip_all, fields(upstream = "auth"))]
pub async fn auth_proxy(
    State(state): State<Arc<ProxyState>>,
    Path(path): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if method == Method::OPTIONS {
        return preflight_response();
    }
    let Some(base) = state.auth_url.as_deref() else {
        return not_configured("AUTH_URL");
    };
    let Some(api_key) = state.auth_anon_key.as_deref() else {
        return not_configured("AUTH_ANON_KEY");
    };

    let upstream = Upstream {
        base,
        api_key: Some(api_key),
    };
    forward(&state.http_client, &upstream, &path, method, &uri, &headers, body).await
}

async fn forward(
    client: &reqwest::Client,
    upstream: &Upstream<'_>,
    path: &str,
    method: Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Bytes,
) -> Response {
    let mut url = join_url(upstream.base, path);
    if let Some(query) = uri.query() {
        url = format!("{url}?{query}");
    }

    let mut request = client.request(method, &url);
    for name in &FORWARDED_HEADERS {
        if let Some(value) = headers.get(name) {
            request = request.header(name, value.clone());
        }
    }
    if let Some(api_key) = upstream.api_key {
        request = request.header("apikey", api_key);
    }
    if !body.is_empty() {
        request = request.body(body);
    }

    let response = match inject_request_id(request).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(
                error.category = error::category::EXTERNAL_SERVICE,
                error.kind = error::kind::PROXY,
                "上流への中継に失敗: {}",
                e
            );
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "上流に接続できません" }),
            );
        }
    };

    let status = response.status();
    let content_type = response.headers().get(header::CONTENT_TYPE).cloned();
    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(
                error.category = error::category::EXTERNAL_SERVICE,
                error.kind = error::kind::PROXY,
                "上流レスポンスの読み取りに失敗: {}",
                e
            );
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "上流のレスポンスを読み取れません" }),
            );
        }
    };

    if status.is_server_error() {
        tracing::warn!(
            error.category = error::category::EXTERNAL_SERVICE,
            error.kind = error::kind::PROXY,
            upstream_status = status.as_u16(),
            "上流がサーバーエラーを返却"
        );
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": "上流でエラーが発生しました", "upstream_status": status.as_u16() }),
        );
    }

    let mut response = (status, bytes).into_response();
    if let Some(content_type) = content_type {
        response.headers_mut().insert(header::CONTENT_TYPE, content_type);
    }
    with_cors(response)
}

fn not_configured(variable: &str) -> Response {
    tracing::warn!(
        error.category = error::category::CONFIGURATION,
        error.kind = error::kind::MISSING_ENV,
        variable,
        "中継先が未設定"
    );
    error_response(
        StatusCode::SERVICE_UNAVAILABLE,
        json!({ "error": format!("{variable} が設定されていません") }),
    )
}

fn preflight_response() -> Response {
    with_cors(StatusCode::NO_CONTENT.into_response())
}

fn error_response(status: StatusCode, body: serde_json::Value) -> Response {
    with_cors((status, Json(body)).into_response())
}

/// 固定の CORS ヘッダーを付ける
fn with_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    response
}
