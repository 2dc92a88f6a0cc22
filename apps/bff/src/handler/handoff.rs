//! # ハンドオフハンドラ
//!
//! 外部バックエンドの画面を iframe に埋め込むための URL を返す。
//!
//! ## エンドポイント
//!
//! - `GET /api/v1/handoff/iframe?target=studio|webcam` - 本人確認済みの iframe URL
//! - `POST /api/v1/handoff/redeem` - ハンドオフコードを身元に引き換える（バックエンド向け）

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use wingman_domain::session::Session;
use wingman_shared::{ApiResponse, ErrorResponse, event_log::error};

use crate::{
    error::{
        internal_error_response,
        log_and_convert_handoff_error,
        not_found_response,
        validation_error_response,
    },
    handler::auth::SESSION_COOKIE_NAME,
    usecase::{HandoffService, IframeTarget, SessionLoader, SessionLookup, Verification},
};

/// ハンドオフハンドラの共有状態
pub struct HandoffState {
    pub session_loader: Arc<SessionLoader>,
    pub handoff:        HandoffService,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct IframeQuery {
    /// 埋め込み先（`studio` または `webcam`）
    pub target: String,
}

/// iframe URL
#[derive(Debug, Serialize, ToSchema)]
pub struct IframeResponseData {
    pub url:             String,
    pub verification:    Verification,
    /// 本人確認を拒否したときのバックエンドのステータス
    pub upstream_status: Option<u16>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RedeemRequest {
    pub code: String,
}

/// 引き換えた身元
#[derive(Debug, Serialize, ToSchema)]
pub struct RedeemResponseData {
    pub user_id:      Uuid,
    pub email:        String,
    pub access_token: String,
}

/// GET /api/v1/handoff/iframe
///
/// セッションがなければ本人確認をせずに未認証の URL を返す。
#[utoipa::path(
   get,
   path = "/api/v1/handoff/iframe",
   tag = "handoff",
   security(("session_auth" = [])),
   params(IframeQuery),
   responses(
      (status = 200, description = "iframe URL", body = ApiResponse<IframeResponseData>),
      (status = 400, description = "不正な埋め込み先", body = ErrorResponse),
      (status = 502, description = "バックエンドに到達できない", body = ErrorResponse),
      (status = 503, description = "BACKEND_URL 未設定", body = ErrorResponse)
   )
)]
#[tracing::instrument(skip_all)]
pub async fn iframe(
    State(state): State<Arc<HandoffState>>,
    jar: CookieJar,
    Query(query): Query<IframeQuery>,
) -> impl IntoResponse {
    let Ok(target) = query.target.parse::<IframeTarget>() else {
        return validation_error_response("target は studio または webcam を指定してください");
    };

    let session = match load_optional_session(&state.session_loader, &jar).await {
        Ok(session) => session,
        Err(response) => return response,
    };

    match state.handoff.prepare_iframe(target, session.as_ref()).await {
        Ok(handoff) => Json(ApiResponse::new(IframeResponseData {
            url:             handoff.url,
            verification:    handoff.verification,
            upstream_status: handoff.upstream_status,
        }))
        .into_response(),
        Err(e) => log_and_convert_handoff_error("iframe URL 生成", e),
    }
}

/// POST /api/v1/handoff/redeem
///
/// コードは 1 回だけ引き換えられる。未知・期限切れ・使用済みは 404。
#[utoipa::path(
   post,
   path = "/api/v1/handoff/redeem",
   tag = "handoff",
   request_body = RedeemRequest,
   responses(
      (status = 200, description = "引き換え成功", body = ApiResponse<RedeemResponseData>),
      (status = 404, description = "無効なコード", body = ErrorResponse)
   )
)]
#[tracing::instrument(skip_all)]
pub async fn redeem(
    State(state): State<Arc<HandoffState>>,
    Json(req): Json<RedeemRequest>,
) -> impl IntoResponse {
    match state.handoff.redeem(&req.code).await {
        Ok(Some(grant)) => Json(ApiResponse::new(RedeemResponseData {
            user_id:      *grant.user_id.as_uuid(),
            email:        grant.email.to_string(),
            access_token: grant.access_token.as_str().to_string(),
        }))
        .into_response(),
        Ok(None) => not_found_response("ハンドオフコードが無効です"),
        Err(e) => log_and_convert_handoff_error("ハンドオフコード引き換え", e),
    }
}

/// Cookie があればセッションを取得する（なければ `None`）
async fn load_optional_session(
    loader: &SessionLoader,
    jar: &CookieJar,
) -> Result<Option<Session>, axum::response::Response> {
    let Some(session_id) = jar
        .get(SESSION_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|id| !id.is_empty())
    else {
        return Ok(None);
    };

    loader.load(&session_id).await.map(SessionLookup::into_session).map_err(|e| {
        tracing::error!(
            error.category = error::category::INFRASTRUCTURE,
            error.kind = error::kind::SESSION,
            "セッション取得で内部エラー: {}",
            e
        );
        internal_error_response()
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, atomic::Ordering};

    use axum::{
        Router,
        body::Body,
        http::{Method, Request, StatusCode},
        routing::{get, post},
    };
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;
    use wingman_domain::clock::FixedClock;
    use wingman_infra::session_store::{InMemorySessionStore, SessionStore};

    use super::*;
    use crate::{
        test_utils::{StubAuthServiceClient, StubBackendClient, TEST_USER_ID, test_now, test_session},
        usecase::HandoffMode,
    };

    const BACKEND: &str = "https://backend.example.com";

    struct TestApp {
        router: Router,
        store:  Arc<InMemorySessionStore>,
    }

    fn create_test_app(backend: StubBackendClient, backend_url: Option<&str>) -> TestApp {
        let clock = Arc::new(FixedClock::new(test_now()));
        let store = Arc::new(InMemorySessionStore::new(clock.clone()));
        let state = Arc::new(HandoffState {
            session_loader: Arc::new(SessionLoader::new(
                Arc::new(StubAuthServiceClient::success()),
                store.clone(),
                clock,
            )),
            handoff:        HandoffService::new(
                Arc::new(backend),
                store.clone(),
                backend_url.map(str::to_string),
                HandoffMode::Exchange,
            ),
        });

        let router = Router::new()
            .route("/api/v1/handoff/iframe", get(iframe))
            .route("/api/v1/handoff/redeem", post(redeem))
            .with_state(state);

        TestApp { router, store }
    }

    fn iframe_request(target: &str, session_id: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(format!("/api/v1/handoff/iframe?target={target}"));
        if let Some(id) = session_id {
            builder = builder.header("Cookie", format!("session_id={id}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_セッションなしは未認証のurlを返す() {
        let backend = StubBackendClient::verified();
        let calls = backend.calls.clone();
        let app = create_test_app(backend, Some(BACKEND));

        let response = app.router.oneshot(iframe_request("studio", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["url"], "https://backend.example.com/studio");
        assert_eq!(json["data"]["verification"], "skipped");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_本人確認に成功するとコード付きurlを返し引き換えられる() {
        // Given
        let app = create_test_app(StubBackendClient::verified(), Some(BACKEND));
        let session_id = app.store.create(&test_session()).await.unwrap();

        // When
        let response = app
            .router
            .clone()
            .oneshot(iframe_request("webcam", Some(&session_id)))
            .await
            .unwrap();

        // Then
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["verification"], "verified");
        let url = json["data"]["url"].as_str().unwrap();
        let (prefix, code) = url.split_once("?handoff_code=").unwrap();
        assert_eq!(prefix, "https://backend.example.com/webcam");
        // トークンは URL に載らない
        assert!(!url.contains("access-token"));

        let redeem_request = |code: &str| {
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/handoff/redeem")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::json!({"code": code}).to_string()))
                .unwrap()
        };
        let redeemed = app
            .router
            .clone()
            .oneshot(redeem_request(code))
            .await
            .unwrap();
        assert_eq!(redeemed.status(), StatusCode::OK);
        let json = body_json(redeemed).await;
        assert_eq!(json["data"]["user_id"], TEST_USER_ID);
        assert_eq!(json["data"]["access_token"], "access-token");

        // 2 回目は 404
        let again = app.router.oneshot(redeem_request(code)).await.unwrap();
        assert_eq!(again.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_本人確認を拒否されたら未認証urlとステータスを返す() {
        let app = create_test_app(StubBackendClient::unverified(401), Some(BACKEND));
        let session_id = app.store.create(&test_session()).await.unwrap();

        let response = app
            .router
            .oneshot(iframe_request("studio", Some(&session_id)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(
            json["data"],
            serde_json::json!({
                "url": "https://backend.example.com/studio",
                "verification": "unverified",
                "upstream_status": 401
            })
        );
    }

    #[tokio::test]
    async fn test_バックエンドに到達できなければ502() {
        let app = create_test_app(StubBackendClient::unreachable(), Some(BACKEND));
        let session_id = app.store.create(&test_session()).await.unwrap();

        let response = app
            .router
            .oneshot(iframe_request("studio", Some(&session_id)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_backend_url未設定は503() {
        let app = create_test_app(StubBackendClient::verified(), None);

        let response = app.router.oneshot(iframe_request("studio", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_不正なtargetは400() {
        let app = create_test_app(StubBackendClient::verified(), Some(BACKEND));

        let response = app.router.oneshot(iframe_request("admin", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
