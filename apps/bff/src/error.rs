//! # BFF エラーハンドリング
//!
//! クライアント・ユースケースのエラーを axum レスポンス（RFC 9457）に変換する。
//!
//! 内部の詳細はログにだけ残し、レスポンスボディには含めない。

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use wingman_domain::session::Session;
use wingman_shared::{ErrorResponse, event_log::error};

use crate::{
    client::{AuthServiceError, ProfileStoreError},
    handler::auth::SESSION_COOKIE_NAME,
    usecase::{HandoffError, SessionLoader, SessionLookup},
};

/// 認証済みリクエストのセッション
pub struct Authenticated {
    pub session_id: String,
    pub session:    Session,
}

/// Cookie のセッション ID から有効なセッションを取得する
///
/// Cookie がない・セッションが無効なら 401。
/// 認証サービス停止でリフレッシュできなければ 503、ストアのエラーは 500。
pub async fn authenticate(loader: &SessionLoader, jar: &CookieJar) -> Result<Authenticated, Response> {
    let session_id = jar
        .get(SESSION_COOKIE_NAME)
        .map(|cookie| cookie.value().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(unauthorized_response)?;

    match loader.load(&session_id).await {
        Ok(SessionLookup::Valid(session)) => Ok(Authenticated {
            session_id,
            session,
        }),
        Ok(SessionLookup::Unavailable) => Err(service_unavailable_response()),
        Ok(SessionLookup::Absent | SessionLookup::Revoked) => Err(unauthorized_response()),
        Err(e) => {
            tracing::error!(
                error.category = error::category::INFRASTRUCTURE,
                error.kind = error::kind::SESSION,
                "セッション取得で内部エラー: {}",
                e
            );
            Err(internal_error_response())
        }
    }
}

// --- IntoResponse ---

impl IntoResponse for AuthServiceError {
    fn into_response(self) -> Response {
        match self {
            AuthServiceError::InvalidCredentials => authentication_failed_response(),
            AuthServiceError::InvalidToken => unauthorized_response(),
            AuthServiceError::RateLimited => too_many_requests_response(),
            AuthServiceError::ServiceUnavailable => service_unavailable_response(),
            AuthServiceError::NotConfigured(variable) => not_configured_response(variable),
            AuthServiceError::Network(_) | AuthServiceError::Unexpected(_) => {
                internal_error_response()
            }
        }
    }
}

impl IntoResponse for ProfileStoreError {
    fn into_response(self) -> Response {
        match self {
            ProfileStoreError::NotFound => not_found_response("プロフィールが見つかりません"),
            ProfileStoreError::Unauthorized => unauthorized_response(),
            ProfileStoreError::NotConfigured(variable) => not_configured_response(variable),
            ProfileStoreError::ServiceUnavailable => service_unavailable_response(),
            ProfileStoreError::Network(_) | ProfileStoreError::Unexpected(_) => {
                internal_error_response()
            }
        }
    }
}

impl IntoResponse for HandoffError {
    fn into_response(self) -> Response {
        match self {
            HandoffError::BackendUnreachable(_) => (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse::backend_unavailable(
                    "バックエンドに接続できません。しばらくしてから再度お試しください",
                )),
            )
                .into_response(),
            HandoffError::NotConfigured(variable) => not_configured_response(variable),
            HandoffError::Store(_) => internal_error_response(),
        }
    }
}

/// 認証サービスのエラーをログ付きでレスポンスに変換する
///
/// 想定内の拒否（認証情報の不一致など）はログに残さない。
pub fn log_and_convert_auth_error(context: &str, err: AuthServiceError) -> Response {
    match &err {
        AuthServiceError::Network(_) | AuthServiceError::Unexpected(_) => {
            tracing::error!(
                error.category = error::category::EXTERNAL_SERVICE,
                error.kind = error::kind::SIGN_IN,
                "{}で内部エラー: {}",
                context,
                err
            );
        }
        AuthServiceError::ServiceUnavailable => {
            tracing::warn!(
                error.category = error::category::EXTERNAL_SERVICE,
                error.kind = error::kind::SIGN_IN,
                "{}: 認証サービスに接続できません",
                context
            );
        }
        AuthServiceError::NotConfigured(variable) => log_missing_env(variable),
        _ => {}
    }
    err.into_response()
}

/// プロフィールストアのエラーをログ付きでレスポンスに変換する
pub fn log_and_convert_profile_error(context: &str, err: ProfileStoreError) -> Response {
    match &err {
        ProfileStoreError::Network(_)
        | ProfileStoreError::Unexpected(_)
        | ProfileStoreError::ServiceUnavailable => {
            tracing::error!(
                error.category = error::category::EXTERNAL_SERVICE,
                error.kind = error::kind::PROFILE,
                "{}で内部エラー: {}",
                context,
                err
            );
        }
        ProfileStoreError::NotConfigured(variable) => log_missing_env(variable),
        _ => {}
    }
    err.into_response()
}

/// ハンドオフのエラーをログ付きでレスポンスに変換する
pub fn log_and_convert_handoff_error(context: &str, err: HandoffError) -> Response {
    match &err {
        HandoffError::BackendUnreachable(_) => {
            tracing::error!(
                error.category = error::category::EXTERNAL_SERVICE,
                error.kind = error::kind::BACKEND_VERIFY,
                "{}で内部エラー: {}",
                context,
                err
            );
        }
        HandoffError::Store(_) => {
            tracing::error!(
                error.category = error::category::INFRASTRUCTURE,
                error.kind = error::kind::SESSION,
                "{}で内部エラー: {}",
                context,
                err
            );
        }
        HandoffError::NotConfigured(variable) => log_missing_env(variable),
    }
    err.into_response()
}

fn log_missing_env(variable: &str) {
    tracing::warn!(
        error.category = error::category::CONFIGURATION,
        error.kind = error::kind::MISSING_ENV,
        variable,
        "{} が未設定のためリクエストを処理できません",
        variable
    );
}

// --- レスポンスヘルパー ---

/// 認証失敗レスポンス
pub fn authentication_failed_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new(
            "authentication-failed",
            "Authentication Failed",
            401,
            "メールアドレスまたはパスワードが正しくありません",
        )),
    )
        .into_response()
}

/// 未認証レスポンス
pub fn unauthorized_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::unauthorized("認証が必要です")),
    )
        .into_response()
}

pub fn not_found_response(detail: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(ErrorResponse::not_found(detail))).into_response()
}

/// バリデーションエラーレスポンス
pub fn validation_error_response(detail: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::validation_error(detail)),
    )
        .into_response()
}

pub fn too_many_requests_response() -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(ErrorResponse::too_many_requests(
            "リクエストが多すぎます。しばらくしてから再度お試しください",
        )),
    )
        .into_response()
}

/// 内部エラーレスポンス
pub fn internal_error_response() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::internal_error()),
    )
        .into_response()
}

/// 認証サービス利用不可レスポンス
pub fn service_unavailable_response() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse::service_unavailable(
            "認証サービスが一時的に利用できません",
        )),
    )
        .into_response()
}

/// 環境変数未設定レスポンス（503）
pub fn not_configured_response(variable: &str) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse::not_configured(variable)),
    )
        .into_response()
}
