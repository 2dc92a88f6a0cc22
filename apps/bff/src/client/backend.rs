//! # 外部 AI バックエンドクライアント
//!
//! iframe で埋め込む外部バックエンドとの通信を担当する。
//!
//! - `GET /health`: 2xx を稼働中とみなす（ボディは読まない）
//! - `POST /auth/verify`: ハンドオフ前の本人確認

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use wingman_domain::session::Session;

use crate::middleware::request_id::inject_request_id;

/// バックエンドクライアントエラー
///
/// 非 2xx 応答はエラーではなく [`VerifyOutcome::Unverified`] として返す。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// 接続失敗・タイムアウト
    #[error("バックエンドに接続できません")]
    ServiceUnavailable,

    /// `BACKEND_URL` が未設定
    #[error("{0} が設定されていません")]
    NotConfigured(&'static str),

    /// その他のネットワークエラー
    #[error("ネットワークエラー: {0}")]
    Network(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            BackendError::ServiceUnavailable
        } else {
            BackendError::Network(err.to_string())
        }
    }
}

/// 本人確認の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// 2xx
    Verified,
    /// 非 2xx（未認証のままフォールバックする）
    Unverified { status: u16 },
}

/// `POST /auth/verify` のリクエストボディ
#[derive(Debug, Serialize)]
pub struct VerifyPayload<'a> {
    pub user_id:       String,
    pub email:         &'a str,
    pub access_token:  &'a str,
    pub refresh_token: Option<&'a str>,
}

impl<'a> VerifyPayload<'a> {
    pub fn from_session(session: &'a Session) -> Self {
        Self {
            user_id:       session.user_id.to_string(),
            email:         session.email.as_str(),
            access_token:  session.access_token.as_str(),
            refresh_token: session.refresh_token.as_ref().map(|t| t.as_str()),
        }
    }
}

#[async_trait]
pub trait BackendClient: Send + Sync {
    /// 稼働確認
    async fn health(&self) -> Result<(), BackendError>;

    /// 本人確認（`Authorization: Bearer <access_token>` + JSON ボディ）
    async fn verify(&self, payload: &VerifyPayload<'_>) -> Result<VerifyOutcome, BackendError>;
}

pub struct BackendClientImpl {
    base_url: String,
    client:   reqwest::Client,
}

impl BackendClientImpl {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client:   reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl BackendClient for BackendClientImpl {
    async fn health(&self) -> Result<(), BackendError> {
        let url = format!("{}/health", self.base_url);
        let response = inject_request_id(self.client.get(&url)).send().await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(BackendError::Network(format!(
                "ヘルスチェックが失敗しました: {}",
                response.status()
            )))
        }
    }

    async fn verify(&self, payload: &VerifyPayload<'_>) -> Result<VerifyOutcome, BackendError> {
        let url = format!("{}/auth/verify", self.base_url);
        let response = inject_request_id(self.client.post(&url))
            .bearer_auth(payload.access_token)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(VerifyOutcome::Verified)
        } else {
            Ok(VerifyOutcome::Unverified {
                status: status.as_u16(),
            })
        }
    }
}

/// `BACKEND_URL` が未設定のときに注入するクライアント
pub struct UnconfiguredBackendClient;

#[async_trait]
impl BackendClient for UnconfiguredBackendClient {
    async fn health(&self) -> Result<(), BackendError> {
        Err(BackendError::NotConfigured("BACKEND_URL"))
    }

    async fn verify(&self, _: &VerifyPayload<'_>) -> Result<VerifyOutcome, BackendError> {
        Err(BackendError::NotConfigured("BACKEND_URL"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Json,
        Router,
        http::{HeaderMap, StatusCode},
        routing::{get, post},
    };
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    use super::*;
    use crate::test_utils::{spawn_server, test_session};

    #[tokio::test]
    async fn test_2xxはverified() {
        let captured = Arc::new(Mutex::new(None::<(Option<String>, Value)>));
        let captured_clone = captured.clone();
        let app = Router::new().route(
            "/auth/verify",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let captured = captured_clone.clone();
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    *captured.lock().unwrap() = Some((auth, body));
                    StatusCode::NO_CONTENT
                }
            }),
        );
        let base_url = spawn_server(app).await;
        let session = test_session();

        let outcome = BackendClientImpl::new(&base_url)
            .verify(&VerifyPayload::from_session(&session))
            .await
            .unwrap();

        assert_eq!(outcome, VerifyOutcome::Verified);
        let (auth, body) = captured.lock().unwrap().clone().unwrap();
        assert_eq!(auth.as_deref(), Some("Bearer access-token"));
        assert_eq!(
            body,
            json!({
                "user_id": session.user_id.to_string(),
                "email": "user@example.com",
                "access_token": "access-token",
                "refresh_token": "refresh-token",
            })
        );
    }

    #[tokio::test]
    async fn test_非2xxはunverified() {
        let app = Router::new().route("/auth/verify", post(|| async { StatusCode::FORBIDDEN }));
        let base_url = spawn_server(app).await;
        let session = test_session();

        let outcome = BackendClientImpl::new(&base_url)
            .verify(&VerifyPayload::from_session(&session))
            .await
            .unwrap();

        assert_eq!(outcome, VerifyOutcome::Unverified { status: 403 });
    }

    #[tokio::test]
    async fn test_接続失敗はハードエラー() {
        let session = test_session();

        let result = BackendClientImpl::new("http://127.0.0.1:9")
            .verify(&VerifyPayload::from_session(&session))
            .await;

        assert_eq!(result, Err(BackendError::ServiceUnavailable));
    }

    #[tokio::test]
    async fn test_ヘルスチェック() {
        let app = Router::new().route("/health", get(|| async { "ok" }));
        let base_url = spawn_server(app).await;

        assert_eq!(BackendClientImpl::new(&base_url).health().await, Ok(()));
        assert_eq!(
            UnconfiguredBackendClient.health().await,
            Err(BackendError::NotConfigured("BACKEND_URL"))
        );
    }
}
