//! サインイン・サインアップ・サインアウトハンドラ

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use serde::Deserialize;
use utoipa::IntoParams;
use wingman_domain::{session::Session, user::Email};
use wingman_shared::{
    ApiResponse,
    ErrorResponse,
    event_log::{error, event},
    log_business_event,
};

use super::{
    AuthState,
    CALLBACK_PATH,
    CredentialsRequest,
    PKCE_COOKIE_NAME,
    SESSION_COOKIE_NAME,
    SessionResponseData,
    SignUpResponseData,
    build_clear_cookie,
    build_clear_pkce_cookie,
    build_pkce_cookie,
    build_session_cookie,
};
use crate::{
    client::{AuthServiceError, SignUpOutcome},
    error::{
        authentication_failed_response,
        internal_error_response,
        log_and_convert_auth_error,
        validation_error_response,
    },
};

/// 既定の OAuth プロバイダ
const DEFAULT_PROVIDER: &str = "google";

/// パスワードの最小文字数（認証サービスの既定値に合わせる）
const MIN_PASSWORD_LENGTH: usize = 6;

/// PKCE の code_verifier のエントロピー（バイト）
const PKCE_VERIFIER_BYTES: usize = 32;

#[derive(Debug, Deserialize, IntoParams)]
pub struct SignInQuery {
    /// OAuth プロバイダ（既定: `google`）
    pub provider:    Option<String>,
    /// サインイン後に戻るパス（`/` で始まる相対パスのみ）
    pub redirect_to: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CallbackQuery {
    /// 認可コード
    pub code: Option<String>,
    /// サインイン後に戻るパス
    pub next: Option<String>,
}

/// GET /api/v1/auth/signin
///
/// 外部プロバイダのサインイン画面へリダイレクトする。
/// PKCE の code_verifier は HttpOnly Cookie に保存し、コールバックで使う。
#[utoipa::path(
   get,
   path = "/api/v1/auth/signin",
   tag = "auth",
   params(SignInQuery),
   responses(
      (status = 302, description = "プロバイダのサインイン画面へリダイレクト"),
      (status = 400, description = "不正なプロバイダ", body = ErrorResponse),
      (status = 503, description = "認証サービス未設定", body = ErrorResponse)
   )
)]
#[tracing::instrument(skip_all)]
pub async fn signin(
    State(state): State<Arc<AuthState>>,
    jar: CookieJar,
    Query(query): Query<SignInQuery>,
) -> impl IntoResponse {
    let provider = query.provider.as_deref().unwrap_or(DEFAULT_PROVIDER);
    if !is_valid_provider(provider) {
        return validation_error_response("プロバイダの指定が不正です");
    }

    let next = safe_next(query.redirect_to.as_deref());
    let callback_url = format!(
        "{}{}?next={}",
        state.public_url,
        CALLBACK_PATH,
        urlencoding::encode(&next)
    );
    let verifier = generate_pkce_verifier();

    let location = match state
        .auth_client
        .sign_in_url(provider, &callback_url, &verifier)
    {
        Ok(url) => url,
        Err(e) => return log_and_convert_auth_error("サインイン URL 生成", e),
    };

    let jar = jar.add(build_pkce_cookie(&verifier, state.secure_cookies));
    (jar, found(&location)).into_response()
}

/// GET /api/v1/auth/callback
///
/// OAuth の認可コードをセッションに交換し、`next` へリダイレクトする。
#[utoipa::path(
   get,
   path = "/api/v1/auth/callback",
   tag = "auth",
   params(CallbackQuery),
   responses(
      (status = 302, description = "サインイン成功。`next` へリダイレクト"),
      (status = 400, description = "認可コードまたは code_verifier がない", body = ErrorResponse),
      (status = 401, description = "認可コードが無効", body = ErrorResponse)
   )
)]
#[tracing::instrument(skip_all)]
pub async fn callback(
    State(state): State<Arc<AuthState>>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> impl IntoResponse {
    let Some(code) = query.code.as_deref().filter(|c| !c.is_empty()) else {
        return validation_error_response("認可コードがありません");
    };
    let Some(verifier) = jar
        .get(PKCE_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
    else {
        return validation_error_response("サインインをやり直してください");
    };

    let session = match state.auth_client.exchange_code(code, &verifier).await {
        Ok(session) => session,
        Err(e) => return log_and_convert_auth_error("認可コード交換", e),
    };

    let jar = match establish_session(&state, jar, &session).await {
        Ok(jar) => jar.add(build_clear_pkce_cookie()),
        Err(response) => return response,
    };

    log_login_success(&session, "oauth");

    (jar, found(&safe_next(query.next.as_deref()))).into_response()
}

/// POST /api/v1/auth/login
///
/// メールアドレス・パスワードでサインインし、セッション Cookie を設定する。
#[utoipa::path(
   post,
   path = "/api/v1/auth/login",
   tag = "auth",
   request_body = CredentialsRequest,
   responses(
      (status = 200, description = "サインイン成功", body = ApiResponse<SessionResponseData>),
      (status = 401, description = "認証失敗", body = ErrorResponse),
      (status = 429, description = "レート制限", body = ErrorResponse),
      (status = 503, description = "認証サービス利用不可", body = ErrorResponse)
   )
)]
#[tracing::instrument(skip_all)]
pub async fn login(
    State(state): State<Arc<AuthState>>,
    jar: CookieJar,
    Json(req): Json<CredentialsRequest>,
) -> impl IntoResponse {
    let session = match state
        .auth_client
        .sign_in_with_password(req.email.trim(), &req.password)
        .await
    {
        Ok(session) => session,
        Err(AuthServiceError::InvalidCredentials) => {
            log_business_event!(
                event.category = event::category::AUTH,
                event.action = event::action::LOGIN_FAILURE,
                event.entity_type = event::entity_type::USER,
                event.result = event::result::FAILURE,
                event.reason = "invalid_credentials",
                "サインイン失敗"
            );
            return authentication_failed_response();
        }
        Err(e) => return log_and_convert_auth_error("サインイン", e),
    };

    let jar = match establish_session(&state, jar, &session).await {
        Ok(jar) => jar,
        Err(response) => return response,
    };

    log_login_success(&session, "password");

    (jar, Json(ApiResponse::new(SessionResponseData::from(&session)))).into_response()
}

/// POST /api/v1/auth/signup
///
/// アカウントを作成する。確認メールが不要な設定ではそのままサインインする。
#[utoipa::path(
   post,
   path = "/api/v1/auth/signup",
   tag = "auth",
   request_body = CredentialsRequest,
   responses(
      (status = 200, description = "登録受付", body = ApiResponse<SignUpResponseData>),
      (status = 400, description = "入力不正または登録拒否", body = ErrorResponse),
      (status = 503, description = "認証サービス利用不可", body = ErrorResponse)
   )
)]
#[tracing::instrument(skip_all)]
pub async fn signup(
    State(state): State<Arc<AuthState>>,
    jar: CookieJar,
    Json(req): Json<CredentialsRequest>,
) -> impl IntoResponse {
    let email = match Email::new(req.email) {
        Ok(email) => email,
        Err(e) => return validation_error_response(&e.to_string()),
    };
    if req.password.chars().count() < MIN_PASSWORD_LENGTH {
        return validation_error_response(&format!(
            "パスワードは {MIN_PASSWORD_LENGTH} 文字以上である必要があります"
        ));
    }

    let outcome = match state.auth_client.sign_up(email.as_str(), &req.password).await {
        Ok(outcome) => outcome,
        Err(AuthServiceError::InvalidCredentials) => {
            return validation_error_response("このメールアドレスでは登録できません");
        }
        Err(e) => return log_and_convert_auth_error("サインアップ", e),
    };

    match outcome {
        SignUpOutcome::Session(session) => {
            let jar = match establish_session(&state, jar, &session).await {
                Ok(jar) => jar,
                Err(response) => return response,
            };
            log_signup(&session.user_id.to_string(), false);
            let data = SignUpResponseData {
                confirmation_required: false,
                session:               Some(SessionResponseData::from(&session)),
            };
            (jar, Json(ApiResponse::new(data))).into_response()
        }
        SignUpOutcome::ConfirmationPending { user_id } => {
            log_signup(&user_id.to_string(), true);
            let data = SignUpResponseData {
                confirmation_required: true,
                session:               None,
            };
            Json(ApiResponse::new(data)).into_response()
        }
    }
}

/// POST /api/v1/auth/logout
///
/// 認証サービス側のセッション失効はベストエフォート。失敗しても Cookie はクリアする。
#[utoipa::path(
   post,
   path = "/api/v1/auth/logout",
   tag = "auth",
   security(("session_auth" = [])),
   responses(
      (status = 204, description = "サインアウト成功")
   )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<Arc<AuthState>>, jar: CookieJar) -> impl IntoResponse {
    if let Some(session_cookie) = jar.get(SESSION_COOKIE_NAME) {
        let session_id = session_cookie.value();

        match state.session_store.get(session_id).await {
            Ok(Some(session)) => {
                if let Err(e) = state.auth_client.sign_out(&session.access_token).await {
                    tracing::warn!(
                        error.category = error::category::EXTERNAL_SERVICE,
                        error.kind = error::kind::SIGN_OUT,
                        "認証サービスのサインアウトに失敗（無視）: {}",
                        e
                    );
                }
                log_business_event!(
                    event.category = event::category::AUTH,
                    event.action = event::action::LOGOUT,
                    event.entity_type = event::entity_type::USER,
                    event.entity_id = %session.user_id,
                    event.result = event::result::SUCCESS,
                    "サインアウト"
                );
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("セッション取得に失敗（無視）: {}", e),
        }

        if let Err(e) = state.session_store.delete(session_id).await {
            tracing::warn!("セッション削除に失敗（無視）: {}", e);
        }
    }

    (jar.add(build_clear_cookie()), StatusCode::NO_CONTENT).into_response()
}

// --- ヘルパー ---

/// セッションをストアに保存し、Cookie を設定する
pub(super) async fn establish_session(
    state: &AuthState,
    jar: CookieJar,
    session: &Session,
) -> Result<CookieJar, Response> {
    match state.session_store.create(session).await {
        Ok(session_id) => Ok(jar.add(build_session_cookie(&session_id, state.secure_cookies))),
        Err(e) => {
            tracing::error!(
                error.category = error::category::INFRASTRUCTURE,
                error.kind = error::kind::SESSION,
                "セッション作成に失敗: {}",
                e
            );
            Err(internal_error_response())
        }
    }
}

fn log_login_success(session: &Session, method: &str) {
    log_business_event!(
        event.category = event::category::AUTH,
        event.action = event::action::LOGIN_SUCCESS,
        event.entity_type = event::entity_type::USER,
        event.entity_id = %session.user_id,
        event.result = event::result::SUCCESS,
        auth.method = method,
        "サインイン成功"
    );
}

fn log_signup(user_id: &str, confirmation_required: bool) {
    log_business_event!(
        event.category = event::category::AUTH,
        event.action = event::action::SIGNUP,
        event.entity_type = event::entity_type::USER,
        event.entity_id = user_id,
        event.result = event::result::SUCCESS,
        confirmation_required,
        "サインアップ"
    );
}

/// 302 Found
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

fn is_valid_provider(provider: &str) -> bool {
    !provider.is_empty()
        && provider
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// リダイレクト先をアプリ内の相対パスに限定する
///
/// `//evil.example.com` のようなスキーム相対 URL や絶対 URL は `/` に置き換える。
fn safe_next(next: Option<&str>) -> String {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path.to_string()
        }
        _ => "/".to_string(),
    }
}

fn generate_pkce_verifier() -> String {
    let mut bytes = [0u8; PKCE_VERIFIER_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
