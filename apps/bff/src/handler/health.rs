//! # ヘルスチェックハンドラ
//!
//! - `/health`: Liveness Check（常に `"healthy"` を返す）
//! - `/health/ready`: Readiness Check（外部バックエンド・認証サービス・セッションストア）
//!
//! 未設定の依存先は `not_configured` として報告し、失敗扱いにはしない。

use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use wingman_infra::session_store::SessionStore;
use wingman_shared::{CheckStatus, HealthResponse, ReadinessResponse};

use crate::client::{AuthServiceClient, AuthServiceError, BackendClient, BackendError};

/// 各チェックのタイムアウト
const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[utoipa::path(
   get,
   path = "/health",
   tag = "health",
   responses(
      (status = 200, description = "サーバー稼働中", body = HealthResponse)
   )
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status:  "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness Check 用の State
pub struct ReadinessState {
    pub backend_client: Arc<dyn BackendClient>,
    pub auth_client:    Arc<dyn AuthServiceClient>,
    pub session_store:  Arc<dyn SessionStore>,
}

/// 依存先の接続状態を並行チェックする
///
/// `error` が 1 つでもあれば 503。
#[utoipa::path(
   get,
   path = "/health/ready",
   tag = "health",
   responses(
      (status = 200, description = "依存サービス稼働中", body = ReadinessResponse),
      (status = 503, description = "一部の依存サービスが利用不可", body = ReadinessResponse)
   )
)]
#[tracing::instrument(skip_all)]
pub async fn readiness_check(State(state): State<Arc<ReadinessState>>) -> impl IntoResponse {
    let (backend, auth_service, session_store) = tokio::join!(
        check("backend", async {
            match state.backend_client.health().await {
                Err(BackendError::NotConfigured(_)) => Ok(CheckStatus::NotConfigured),
                result => result.map(|()| CheckStatus::Ok).map_err(|e| e.to_string()),
            }
        }),
        check("auth_service", async {
            match state.auth_client.health().await {
                Err(AuthServiceError::NotConfigured(_)) => Ok(CheckStatus::NotConfigured),
                result => result.map(|()| CheckStatus::Ok).map_err(|e| e.to_string()),
            }
        }),
        check("session_store", async {
            state
                .session_store
                .ping()
                .await
                .map(|()| CheckStatus::Ok)
                .map_err(|e| e.to_string())
        }),
    );

    let checks = HashMap::from([
        ("backend".to_string(), backend),
        ("auth_service".to_string(), auth_service),
        ("session_store".to_string(), session_store),
    ]);
    let response = ReadinessResponse::from_checks(checks);
    let http_status = if response.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (http_status, Json(response))
}

/// タイムアウト付きでチェックを実行し、失敗を警告ログに残す
async fn check(
    name: &str,
    probe: impl Future<Output = Result<CheckStatus, String>>,
) -> CheckStatus {
    match tokio::time::timeout(CHECK_TIMEOUT, probe).await {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => {
            tracing::warn!(check = name, error = %e, "readiness check failed");
            CheckStatus::Error
        }
        Err(_) => {
            tracing::warn!(check = name, "readiness check timed out");
            CheckStatus::Error
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::{Router, body::Body, http::Request, routing::get};
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use wingman_domain::clock::FixedClock;
    use wingman_infra::session_store::InMemorySessionStore;

    use super::*;
    use crate::{
        client::{UnconfiguredAuthServiceClient, UnconfiguredBackendClient},
        test_utils::{FailingSessionStore, StubAuthServiceClient, StubBackendClient, test_now},
    };

    fn create_test_app(state: ReadinessState) -> Router {
        Router::new()
            .route("/health", get(health_check))
            .route("/health/ready", get(readiness_check))
            .with_state(Arc::new(state))
    }

    fn memory_store() -> Arc<dyn SessionStore> {
        Arc::new(InMemorySessionStore::new(Arc::new(FixedClock::new(test_now()))))
    }

    async fn get_json(sut: Router, uri: &str) -> (StatusCode, Value) {
        let response = sut
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_livenessは常にhealthy() {
        let sut = create_test_app(ReadinessState {
            backend_client: Arc::new(UnconfiguredBackendClient),
            auth_client:    Arc::new(UnconfiguredAuthServiceClient::new("AUTH_URL")),
            session_store:  Arc::new(FailingSessionStore),
        });

        let (status, body) = get_json(sut, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_全依存先が稼働していればready() {
        // Given
        let sut = create_test_app(ReadinessState {
            backend_client: Arc::new(StubBackendClient::verified()),
            auth_client:    Arc::new(StubAuthServiceClient::success()),
            session_store:  memory_store(),
        });

        // When
        let (status, body) = get_json(sut, "/health/ready").await;

        // Then
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "status": "ready",
                "checks": {"backend": "ok", "auth_service": "ok", "session_store": "ok"}
            })
        );
    }

    #[tokio::test]
    async fn test_未設定はnot_configuredでreadyのまま() {
        let sut = create_test_app(ReadinessState {
            backend_client: Arc::new(UnconfiguredBackendClient),
            auth_client:    Arc::new(UnconfiguredAuthServiceClient::new("AUTH_URL")),
            session_store:  memory_store(),
        });

        let (status, body) = get_json(sut, "/health/ready").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["backend"], "not_configured");
        assert_eq!(body["checks"]["auth_service"], "not_configured");
    }

    #[tokio::test]
    async fn test_到達できない依存先があれば503() {
        let sut = create_test_app(ReadinessState {
            backend_client: Arc::new(StubBackendClient::unreachable()),
            auth_client:    Arc::new(StubAuthServiceClient::success()),
            session_store:  Arc::new(FailingSessionStore),
        });

        let (status, body) = get_json(sut, "/health/ready").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "not_ready");
        assert_eq!(body["checks"]["backend"], "error");
        assert_eq!(body["checks"]["session_store"], "error");
    }
}
