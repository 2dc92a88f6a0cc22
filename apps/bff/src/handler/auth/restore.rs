//! クエリパラメータからのセッション復元ハンドラ

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use axum_extra::extract::CookieJar;
use wingman_shared::{ApiResponse, event_log::error};

use super::{AuthState, SessionResponseData, build_session_cookie};
use crate::{error::internal_error_response, usecase::RestoreParams};

/// GET /api/v1/auth/restore
///
/// 外部サービスからリダイレクトで戻ってきたときに、URL のトークンでセッションを作り直す。
/// 条件を満たさない場合はエラーにせず `{"data": null}` を返す。
#[utoipa::path(
   get,
   path = "/api/v1/auth/restore",
   tag = "auth",
   params(
      ("token" = Option<String>, Query, description = "アクセストークン"),
      ("user_id" = Option<String>, Query, description = "ユーザー ID"),
      ("email" = Option<String>, Query, description = "メールアドレス"),
      ("refresh_token" = Option<String>, Query, description = "リフレッシュトークン")
   ),
   responses(
      (status = 200, description = "復元したセッション（復元しなければ null）", body = ApiResponse<Option<SessionResponseData>>),
      (status = 500, description = "セッションの保存に失敗", body = wingman_shared::ErrorResponse)
   )
)]
#[tracing::instrument(skip_all)]
pub async fn restore(
    State(state): State<Arc<AuthState>>,
    jar: CookieJar,
    Query(params): Query<RestoreParams>,
) -> impl IntoResponse {
    match state.restorer.restore(&params).await {
        Ok(Some(restored)) => {
            let jar = jar.add(build_session_cookie(&restored.session_id, state.secure_cookies));
            let data = SessionResponseData::from(&restored.session);
            (jar, Json(ApiResponse::new(Some(data)))).into_response()
        }
        Ok(None) => Json(ApiResponse::<Option<SessionResponseData>>::none()).into_response(),
        Err(e) => {
            tracing::error!(
                error.category = error::category::INFRASTRUCTURE,
                error.kind = error::kind::SESSION,
                "セッション復元で内部エラー: {}",
                e
            );
            internal_error_response()
        }
    }
}
