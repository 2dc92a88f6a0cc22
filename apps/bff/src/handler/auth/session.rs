//! 現在のセッションを返すハンドラ

use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};
use axum_extra::extract::CookieJar;
use wingman_shared::{ApiResponse, event_log::error};

use super::{AuthState, SESSION_COOKIE_NAME, SessionResponseData, build_clear_cookie};
use crate::usecase::SessionLookup;

/// GET /api/v1/auth/session
///
/// 未ログインでもエラーにせず `{"data": null}` を返す。
/// 期限切れのセッションはリフレッシュを 1 回だけ試みる。
#[utoipa::path(
   get,
   path = "/api/v1/auth/session",
   tag = "auth",
   security(("session_auth" = [])),
   responses(
      (status = 200, description = "現在のセッション（未ログインなら null）", body = ApiResponse<Option<SessionResponseData>>)
   )
)]
#[tracing::instrument(skip_all)]
pub async fn session(State(state): State<Arc<AuthState>>, jar: CookieJar) -> impl IntoResponse {
    let Some(session_id) = jar
        .get(SESSION_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|id| !id.is_empty())
    else {
        return Json(ApiResponse::<Option<SessionResponseData>>::none()).into_response();
    };

    match state.session_loader.load(&session_id).await {
        Ok(SessionLookup::Valid(session)) => {
            Json(ApiResponse::new(Some(SessionResponseData::from(&session)))).into_response()
        }
        Ok(lookup) if lookup.should_clear_cookie() => (
            jar.add(build_clear_cookie()),
            Json(ApiResponse::<Option<SessionResponseData>>::none()),
        )
            .into_response(),
        // 認証サービス停止中は Cookie を残し、次のリクエストで再度リフレッシュする
        Ok(_) => Json(ApiResponse::<Option<SessionResponseData>>::none()).into_response(),
        Err(e) => {
            tracing::error!(
                error.category = error::category::INFRASTRUCTURE,
                error.kind = error::kind::SESSION,
                "セッション取得で内部エラー: {}",
                e
            );
            Json(ApiResponse::<Option<SessionResponseData>>::none()).into_response()
        }
    }
}
