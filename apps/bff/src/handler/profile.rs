//! # プロフィールハンドラ
//!
//! ログイン中ユーザーの `profiles` 行を読み書きする。
//! 外部データベースへはセッションのアクセストークンで接続するため、
//! 行レベルの権限はデータベース側で判定される。

use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use wingman_domain::user::{Mbti, ProfileUpdate, UserName, UserProfile};
use wingman_shared::{
    ApiResponse,
    ErrorResponse,
    event_log::event,
    log_business_event,
};

use crate::{
    client::ProfileStoreClient,
    error::{authenticate, log_and_convert_profile_error, validation_error_response},
    usecase::SessionLoader,
};

pub struct ProfileState {
    pub session_loader: Arc<SessionLoader>,
    pub profile_client: Arc<dyn ProfileStoreClient>,
}

/// プロフィール
#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileData {
    pub id:              Uuid,
    pub name:            Option<String>,
    pub email:           Option<String>,
    /// MBTI（例: `INTJ`）
    pub mbti:            Option<String>,
    /// `free` / `basic` / `premium`
    pub member_tier:     String,
    /// カメラのキャリブレーション値（形式はクライアントが決める）
    #[schema(value_type = Option<Object>)]
    pub cam_calibration: Option<serde_json::Value>,
}

impl From<UserProfile> for ProfileData {
    fn from(profile: UserProfile) -> Self {
        Self {
            id:              *profile.id.as_uuid(),
            name:            profile.name,
            email:           profile.email,
            mbti:            profile.mbti.map(|m| m.to_string()),
            member_tier:     profile.member_tier.to_string(),
            cam_calibration: profile.cam_calibration,
        }
    }
}

/// プロフィールの部分更新（指定したフィールドのみ更新）
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    /// 1〜50 文字
    pub name:            Option<String>,
    pub mbti:            Option<String>,
    #[schema(value_type = Option<Object>)]
    pub cam_calibration: Option<serde_json::Value>,
}

impl UpdateProfileRequest {
    fn into_update(self) -> Result<ProfileUpdate, String> {
        let name = self
            .name
            .map(UserName::new)
            .transpose()
            .map_err(|e| e.to_string())?;
        let mbti = self
            .mbti
            .map(|m| m.parse::<Mbti>())
            .transpose()
            .map_err(|_| "MBTI の形式が不正です".to_string())?;

        Ok(ProfileUpdate {
            name,
            mbti,
            cam_calibration: self.cam_calibration,
        })
    }
}

/// GET /api/v1/profile
#[utoipa::path(
   get,
   path = "/api/v1/profile",
   tag = "profile",
   security(("session_auth" = [])),
   responses(
      (status = 200, description = "プロフィール", body = ApiResponse<ProfileData>),
      (status = 401, description = "未ログイン", body = ErrorResponse),
      (status = 404, description = "プロフィール未作成", body = ErrorResponse)
   )
)]
#[tracing::instrument(skip_all)]
pub async fn get_profile(State(state): State<Arc<ProfileState>>, jar: CookieJar) -> impl IntoResponse {
    let auth = match authenticate(&state.session_loader, &jar).await {
        Ok(auth) => auth,
        Err(response) => return response,
    };

    match state
        .profile_client
        .get_profile(&auth.session.user_id, &auth.session.access_token)
        .await
    {
        Ok(profile) => Json(ApiResponse::new(ProfileData::from(profile))).into_response(),
        Err(e) => log_and_convert_profile_error("プロフィール取得", e),
    }
}

/// PATCH /api/v1/profile
///
/// 更新後の行をそのまま返す。
#[utoipa::path(
   patch,
   path = "/api/v1/profile",
   tag = "profile",
   security(("session_auth" = [])),
   request_body = UpdateProfileRequest,
   responses(
      (status = 200, description = "更新後のプロフィール", body = ApiResponse<ProfileData>),
      (status = 400, description = "入力不正", body = ErrorResponse),
      (status = 401, description = "未ログイン", body = ErrorResponse)
   )
)]
#[tracing::instrument(skip_all)]
pub async fn update_profile(
    State(state): State<Arc<ProfileState>>,
    jar: CookieJar,
    body: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> impl IntoResponse {
    let auth = match authenticate(&state.session_loader, &jar).await {
        Ok(auth) => auth,
        Err(response) => return response,
    };

    let Json(req) = match body {
        Ok(json) => json,
        Err(rejection) => return validation_error_response(&rejection.body_text()),
    };
    let update = match req.into_update() {
        Ok(update) => update,
        Err(detail) => return validation_error_response(&detail),
    };
    if update.is_empty() {
        return validation_error_response("更新する項目を 1 つ以上指定してください");
    }

    match state
        .profile_client
        .update_profile(&auth.session.user_id, &auth.session.access_token, &update)
        .await
    {
        Ok(profile) => {
            log_business_event!(
                event.category = event::category::PROFILE,
                event.action = event::action::PROFILE_UPDATED,
                event.entity_type = event::entity_type::USER,
                event.entity_id = %auth.session.user_id,
                event.result = event::result::SUCCESS,
                "プロフィールを更新"
            );
            Json(ApiResponse::new(ProfileData::from(profile))).into_response()
        }
        Err(e) => log_and_convert_profile_error("プロフィール更新", e),
    }
}
