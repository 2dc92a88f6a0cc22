//! # 認証サービスクライアント
//!
//! GoTrue 互換の認証サービスとの通信を担当する。
//!
//! ## エンドポイント
//!
//! | 操作 | 呼び出し |
//! |------|---------|
//! | サインイン URL 生成 | なし（`/auth/v1/authorize` の URL を組み立てる） |
//! | パスワード認証 | `POST /auth/v1/token?grant_type=password` |
//! | サインアップ | `POST /auth/v1/signup` |
//! | 認可コード交換 | `POST /auth/v1/token?grant_type=pkce` |
//! | リフレッシュ | `POST /auth/v1/token?grant_type=refresh_token` |
//! | トークン検証 | `GET /auth/v1/user` |
//! | サインアウト | `POST /auth/v1/logout` |
//! | 稼働確認 | `GET /auth/v1/health` |
//!
//! 全リクエストに `apikey` ヘッダー（公開キー）を付与する。リトライはしない。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use wingman_domain::{
    clock::Clock,
    session::{AccessToken, RefreshToken, Session},
    user::{Email, UserId},
};

use crate::middleware::request_id::inject_request_id;

/// 認証サービスクライアントエラー
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthServiceError {
    /// メールアドレス・パスワードの不一致、サインアップ拒否
    #[error("認証情報が正しくありません")]
    InvalidCredentials,

    /// トークン・認可コードが無効または期限切れ
    #[error("トークンが無効です")]
    InvalidToken,

    /// レート制限（429）
    #[error("リクエストが多すぎます")]
    RateLimited,

    /// 認証サービスが利用不可（接続失敗・タイムアウト・503）
    #[error("認証サービスが一時的に利用できません")]
    ServiceUnavailable,

    /// 必要な環境変数が未設定
    #[error("{0} が設定されていません")]
    NotConfigured(&'static str),

    /// ネットワークエラー
    #[error("ネットワークエラー: {0}")]
    Network(String),

    /// 予期しないエラー
    #[error("予期しないエラー: {0}")]
    Unexpected(String),
}

impl From<reqwest::Error> for AuthServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            AuthServiceError::ServiceUnavailable
        } else {
            AuthServiceError::Network(err.to_string())
        }
    }
}

// --- ドメイン向けの型 ---

/// トークンから解決したユーザー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id:    UserId,
    pub email: Option<String>,
}

/// サインアップ結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// 即時にセッションが発行された（メール確認不要の設定）
    Session(Session),
    /// 確認メールの送信待ち
    ConfirmationPending { user_id: UserId },
}

// --- ワイヤー型 ---

#[derive(Debug, Deserialize)]
struct UserDto {
    id:    Uuid,
    email: Option<String>,
}

impl From<UserDto> for AuthUser {
    fn from(dto: UserDto) -> Self {
        Self {
            id:    UserId::from_uuid(dto.id),
            email: dto.email,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token:  String,
    refresh_token: Option<String>,
    expires_in:    Option<i64>,
    expires_at:    Option<i64>,
    user:          UserDto,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    User(UserDto),
}

#[derive(Debug, Serialize)]
struct PasswordGrant<'a> {
    email:    &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct PkceGrant<'a> {
    auth_code:     &'a str,
    code_verifier: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

/// 認証サービスクライアントトレイト
#[async_trait]
pub trait AuthServiceClient: Send + Sync {
    /// 外部プロバイダへのサインイン URL を組み立てる（通信なし）
    ///
    /// `code_challenge` は PKCE（`plain` 方式）のチャレンジ値。
    fn sign_in_url(
        &self,
        provider: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> Result<String, AuthServiceError>;

    /// メールアドレスとパスワードでサインインする
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthServiceError>;

    /// サインアップする
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AuthServiceError>;

    /// OAuth の認可コードをセッションに交換する
    async fn exchange_code(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<Session, AuthServiceError>;

    /// リフレッシュトークンで新しいセッションを取得する
    async fn refresh_session(&self, refresh_token: &RefreshToken) -> Result<Session, AuthServiceError>;

    /// アクセストークンを検証し、ユーザーを解決する
    async fn get_user(&self, access_token: &AccessToken) -> Result<AuthUser, AuthServiceError>;

    /// サインアウトする（認証サービス側のリフレッシュトークンを失効させる）
    async fn sign_out(&self, access_token: &AccessToken) -> Result<(), AuthServiceError>;

    /// 稼働確認
    async fn health(&self) -> Result<(), AuthServiceError>;
}

/// 認証サービスクライアント実装
pub struct AuthServiceClientImpl {
    base_url: String,
    anon_key: String,
    client:   reqwest::Client,
    clock:    Arc<dyn Clock>,
}

impl AuthServiceClientImpl {
    /// # 引数
    ///
    /// - `base_url`: 認証サービスのオリジン（例: `https://xyz.example.co`）
    /// - `anon_key`: 公開キー
    pub fn new(base_url: &str, anon_key: &str, clock: Arc<dyn Clock>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            client: reqwest::Client::new(),
            clock,
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", &self.anon_key);
        inject_request_id(builder)
    }

    async fn token_grant<B: Serialize + Sync>(
        &self,
        grant_type: &str,
        body: &B,
        rejected: AuthServiceError,
    ) -> Result<Session, AuthServiceError> {
        let response = self
            .request(Method::POST, "/auth/v1/token")
            .query(&[("grant_type", grant_type)])
            .json(body)
            .send()
            .await?;

        if response.status().is_success() {
            let body = response.json::<TokenResponse>().await?;
            self.to_session(body)
        } else {
            Err(error_from_response(response, rejected).await)
        }
    }

    fn to_session(&self, token: TokenResponse) -> Result<Session, AuthServiceError> {
        let now = self.clock.now();
        let email = token
            .user
            .email
            .ok_or_else(|| AuthServiceError::Unexpected("ユーザーにメールアドレスがありません".to_string()))
            .and_then(|e| Email::new(e).map_err(|e| AuthServiceError::Unexpected(e.to_string())))?;
        let access_token = AccessToken::new(token.access_token)
            .map_err(|e| AuthServiceError::Unexpected(e.to_string()))?;
        let refresh_token = token
            .refresh_token
            .filter(|t| !t.is_empty())
            .map(RefreshToken::new)
            .transpose()
            .map_err(|e| AuthServiceError::Unexpected(e.to_string()))?;

        let expires_at = resolve_expiry(token.expires_at, token.expires_in, &access_token, now);

        Ok(Session::new(
            UserId::from_uuid(token.user.id),
            email,
            access_token,
            refresh_token,
            expires_at,
        ))
    }
}

/// 有効期限を決める
///
/// `expires_at`（UNIX 秒）→ `expires_in`（秒）→ JWT の `exp` クレーム → 既定寿命 の順に採用する。
/// 表現できない値は無視して次の候補に進む。
fn resolve_expiry(
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    access_token: &AccessToken,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    expires_at
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .or_else(|| {
            expires_in
                .and_then(Duration::try_seconds)
                .and_then(|ttl| now.checked_add_signed(ttl))
        })
        .unwrap_or_else(|| access_token.expires_at_or_default(now))
}

/// 非 2xx レスポンスをエラーに変換する
///
/// 400/401/403/422 は呼び出し元が指定した `rejected` にマップする。
async fn error_from_response(
    response: reqwest::Response,
    rejected: AuthServiceError,
) -> AuthServiceError {
    match response.status() {
        StatusCode::BAD_REQUEST
        | StatusCode::UNAUTHORIZED
        | StatusCode::FORBIDDEN
        | StatusCode::UNPROCESSABLE_ENTITY => rejected,
        StatusCode::TOO_MANY_REQUESTS => AuthServiceError::RateLimited,
        StatusCode::SERVICE_UNAVAILABLE => AuthServiceError::ServiceUnavailable,
        status => {
            let body = response.text().await.unwrap_or_default();
            AuthServiceError::Unexpected(format!("予期しないステータス {}: {}", status, body))
        }
    }
}

#[async_trait]
impl AuthServiceClient for AuthServiceClientImpl {
    fn sign_in_url(
        &self,
        provider: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> Result<String, AuthServiceError> {
        let url = url::Url::parse_with_params(
            &format!("{}/auth/v1/authorize", self.base_url),
            &[
                ("provider", provider),
                ("redirect_to", redirect_to),
                ("code_challenge", code_challenge),
                ("code_challenge_method", "plain"),
            ],
        )
        .map_err(|e| AuthServiceError::Unexpected(format!("サインイン URL を組み立てられません: {e}")))?;

        Ok(url.into())
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthServiceError> {
        self.token_grant(
            "password",
            &PasswordGrant { email, password },
            AuthServiceError::InvalidCredentials,
        )
        .await
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AuthServiceError> {
        let response = self
            .request(Method::POST, "/auth/v1/signup")
            .json(&PasswordGrant { email, password })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response, AuthServiceError::InvalidCredentials).await);
        }

        match response.json::<SignUpResponse>().await? {
            SignUpResponse::Session(token) => Ok(SignUpOutcome::Session(self.to_session(token)?)),
            SignUpResponse::User(user) => Ok(SignUpOutcome::ConfirmationPending {
                user_id: UserId::from_uuid(user.id),
            }),
        }
    }

    async fn exchange_code(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<Session, AuthServiceError> {
        self.token_grant(
            "pkce",
            &PkceGrant {
                auth_code,
                code_verifier,
            },
            AuthServiceError::InvalidToken,
        )
        .await
    }

    async fn refresh_session(&self, refresh_token: &RefreshToken) -> Result<Session, AuthServiceError> {
        self.token_grant(
            "refresh_token",
            &RefreshGrant {
                refresh_token: refresh_token.as_str(),
            },
            AuthServiceError::InvalidToken,
        )
        .await
    }

    async fn get_user(&self, access_token: &AccessToken) -> Result<AuthUser, AuthServiceError> {
        let response = self
            .request(Method::GET, "/auth/v1/user")
            .bearer_auth(access_token.as_str())
            .send()
            .await?;

        if response.status().is_success() {
            let user = response.json::<UserDto>().await?;
            Ok(user.into())
        } else {
            Err(error_from_response(response, AuthServiceError::InvalidToken).await)
        }
    }

    async fn sign_out(&self, access_token: &AccessToken) -> Result<(), AuthServiceError> {
        let response = self
            .request(Method::POST, "/auth/v1/logout")
            .bearer_auth(access_token.as_str())
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_from_response(response, AuthServiceError::InvalidToken).await)
        }
    }

    async fn health(&self) -> Result<(), AuthServiceError> {
        let response = self.request(Method::GET, "/auth/v1/health").send().await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_from_response(response, AuthServiceError::ServiceUnavailable).await)
        }
    }
}

/// `AUTH_URL` / `AUTH_ANON_KEY` が未設定のときに注入するクライアント
pub struct UnconfiguredAuthServiceClient {
    variable: &'static str,
}

impl UnconfiguredAuthServiceClient {
    pub fn new(variable: &'static str) -> Self {
        Self { variable }
    }

    fn error(&self) -> AuthServiceError {
        AuthServiceError::NotConfigured(self.variable)
    }
}

#[async_trait]
impl AuthServiceClient for UnconfiguredAuthServiceClient {
    fn sign_in_url(&self, _: &str, _: &str, _: &str) -> Result<String, AuthServiceError> {
        Err(self.error())
    }

    async fn sign_in_with_password(&self, _: &str, _: &str) -> Result<Session, AuthServiceError> {
        Err(self.error())
    }

    async fn sign_up(&self, _: &str, _: &str) -> Result<SignUpOutcome, AuthServiceError> {
        Err(self.error())
    }

    async fn exchange_code(&self, _: &str, _: &str) -> Result<Session, AuthServiceError> {
        Err(self.error())
    }

    async fn refresh_session(&self, _: &RefreshToken) -> Result<Session, AuthServiceError> {
        Err(self.error())
    }

    async fn get_user(&self, _: &AccessToken) -> Result<AuthUser, AuthServiceError> {
        Err(self.error())
    }

    async fn sign_out(&self, _: &AccessToken) -> Result<(), AuthServiceError> {
        Err(self.error())
    }

    async fn health(&self) -> Result<(), AuthServiceError> {
        Err(self.error())
    }
}
