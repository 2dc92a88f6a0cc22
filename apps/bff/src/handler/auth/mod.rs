//! # 認証ハンドラ
//!
//! ## エンドポイント
//!
//! - `GET /api/v1/auth/signin` - 外部プロバイダのサインイン画面へリダイレクト
//! - `GET /api/v1/auth/callback` - OAuth コールバック（認可コードをセッションに交換）
//! - `POST /api/v1/auth/login` - メールアドレス・パスワードでサインイン
//! - `POST /api/v1/auth/signup` - サインアップ
//! - `POST /api/v1/auth/logout` - サインアウト
//! - `GET /api/v1/auth/session` - 現在のセッション
//! - `GET /api/v1/auth/restore` - URL パラメータからセッションを復元
//!
//! セッションのトークンはサーバー側にだけ保持し、ブラウザには返さない。

mod restore;
mod session;
mod sign_in;

use std::sync::Arc;

use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Utc};
pub use restore::*;
use serde::{Deserialize, Serialize};
pub use session::*;
pub use sign_in::*;
use utoipa::ToSchema;
use uuid::Uuid;
use wingman_domain::session::Session;
use wingman_infra::session_store::{SESSION_TTL_SECONDS, SessionStore};

use crate::{
    client::AuthServiceClient,
    usecase::{SessionLoader, SessionRestorer},
};

/// 認証ハンドラの共有状態
pub struct AuthState {
    pub auth_client:    Arc<dyn AuthServiceClient>,
    pub session_store:  Arc<dyn SessionStore>,
    pub session_loader: Arc<SessionLoader>,
    pub restorer:       SessionRestorer,
    /// OAuth サインイン後に戻る UI のオリジン
    pub public_url:     String,
    /// Cookie に Secure 属性を付けるか
    pub secure_cookies: bool,
}

// --- リクエスト/レスポンス型 ---

/// メールアドレス・パスワード
#[derive(Debug, Deserialize, ToSchema)]
pub struct CredentialsRequest {
    pub email:    String,
    pub password: String,
}

/// セッション情報（トークンは含めない）
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponseData {
    pub user:       SessionUserResponse,
    /// アクセストークンの有効期限
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionUserResponse {
    pub id:    Uuid,
    pub email: String,
}

impl From<&Session> for SessionResponseData {
    fn from(session: &Session) -> Self {
        Self {
            user:       SessionUserResponse {
                id:    *session.user_id.as_uuid(),
                email: session.email.to_string(),
            },
            expires_at: session.expires_at,
        }
    }
}

/// サインアップ結果
#[derive(Debug, Serialize, ToSchema)]
pub struct SignUpResponseData {
    /// 確認メールの承認待ちか
    pub confirmation_required: bool,
    /// 即時にサインインできた場合のセッション
    pub session:               Option<SessionResponseData>,
}

// --- 共有定数 ---

/// セッション Cookie 名
pub(crate) const SESSION_COOKIE_NAME: &str = "session_id";

/// PKCE の code_verifier を保持する Cookie 名
const PKCE_COOKIE_NAME: &str = "pkce_verifier";

/// PKCE Cookie の有効期間（秒）
const PKCE_MAX_AGE: i64 = 600;

/// OAuth コールバックのパス
const CALLBACK_PATH: &str = "/api/v1/auth/callback";

// --- Cookie ヘルパー ---

/// セッション Cookie を構築する
///
/// 有効期間はセッションストアの保持期間に合わせる。
fn build_session_cookie(session_id: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, session_id.to_string()))
        .path("/")
        .max_age(time::Duration::seconds(SESSION_TTL_SECONDS as i64))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

/// セッション Cookie をクリアするための Cookie を構築する
fn build_clear_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, ""))
        .path("/")
        .max_age(time::Duration::seconds(0))
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// PKCE の code_verifier Cookie（コールバックでのみ送信される）
fn build_pkce_cookie(verifier: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((PKCE_COOKIE_NAME, verifier.to_string()))
        .path(CALLBACK_PATH)
        .max_age(time::Duration::seconds(PKCE_MAX_AGE))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

fn build_clear_pkce_cookie() -> Cookie<'static> {
    Cookie::build((PKCE_COOKIE_NAME, ""))
        .path(CALLBACK_PATH)
        .max_age(time::Duration::seconds(0))
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

// --- テストユーティリティ ---
