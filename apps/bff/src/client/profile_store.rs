//! # プロフィールストアクライアント
//!
//! データベースサービスのテーブル API（PostgREST 互換）で `profiles` テーブルを読み書きする。
//!
//! 行単位のアクセス制御はデータベース側にあるため、ユーザー自身のアクセストークンで呼び出す。

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;
use wingman_domain::{
    session::AccessToken,
    user::{ProfileUpdate, UserId, UserProfile},
};

use crate::middleware::request_id::inject_request_id;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProfileStoreError {
    /// 行が存在しない（アクセス権がない場合も含む）
    #[error("プロフィールが見つかりません")]
    NotFound,

    /// トークンが拒否された
    #[error("トークンが無効です")]
    Unauthorized,

    #[error("{0} が設定されていません")]
    NotConfigured(&'static str),

    #[error("データベースサービスが一時的に利用できません")]
    ServiceUnavailable,

    #[error("ネットワークエラー: {0}")]
    Network(String),

    #[error("予期しないエラー: {0}")]
    Unexpected(String),
}

impl From<reqwest::Error> for ProfileStoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            ProfileStoreError::ServiceUnavailable
        } else {
            ProfileStoreError::Network(err.to_string())
        }
    }
}

#[async_trait]
pub trait ProfileStoreClient: Send + Sync {
    /// 自分のプロフィールを取得する
    async fn get_profile(
        &self,
        user_id: &UserId,
        access_token: &AccessToken,
    ) -> Result<UserProfile, ProfileStoreError>;

    /// 指定フィールドのみを更新し、更新後の行を返す
    async fn update_profile(
        &self,
        user_id: &UserId,
        access_token: &AccessToken,
        update: &ProfileUpdate,
    ) -> Result<UserProfile, ProfileStoreError>;
}

pub struct ProfileStoreClientImpl {
    base_url: String,
    anon_key: String,
    client:   reqwest::Client,
}

impl ProfileStoreClientImpl {
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            client:   reqwest::Client::new(),
        }
    }

    fn profiles_url(&self) -> String {
        format!("{}/rest/v1/profiles", self.base_url)
    }

    fn authorize(
        &self,
        builder: reqwest::RequestBuilder,
        access_token: &AccessToken,
    ) -> reqwest::RequestBuilder {
        inject_request_id(
            builder
                .header("apikey", &self.anon_key)
                .bearer_auth(access_token.as_str()),
        )
    }

    /// 配列レスポンスの先頭行を取り出す（空なら `NotFound`）
    async fn single_row(response: reqwest::Response) -> Result<UserProfile, ProfileStoreError> {
        match response.status() {
            status if status.is_success() => {
                let rows = response.json::<Vec<UserProfile>>().await?;
                rows.into_iter().next().ok_or(ProfileStoreError::NotFound)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ProfileStoreError::Unauthorized),
            StatusCode::SERVICE_UNAVAILABLE => Err(ProfileStoreError::ServiceUnavailable),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(ProfileStoreError::Unexpected(format!(
                    "予期しないステータス {}: {}",
                    status, body
                )))
            }
        }
    }
}

#[async_trait]
impl ProfileStoreClient for ProfileStoreClientImpl {
    async fn get_profile(
        &self,
        user_id: &UserId,
        access_token: &AccessToken,
    ) -> Result<UserProfile, ProfileStoreError> {
        let filter = format!("eq.{user_id}");
        let response = self
            .authorize(self.client.get(self.profiles_url()), access_token)
            .query(&[("id", filter.as_str()), ("select", "*")])
            .send()
            .await?;

        Self::single_row(response).await
    }

    async fn update_profile(
        &self,
        user_id: &UserId,
        access_token: &AccessToken,
        update: &ProfileUpdate,
    ) -> Result<UserProfile, ProfileStoreError> {
        let filter = format!("eq.{user_id}");
        let response = self
            .authorize(self.client.patch(self.profiles_url()), access_token)
            .query(&[("id", filter.as_str())])
            .header("Prefer", "return=representation")
            .json(update)
            .send()
            .await?;

        Self::single_row(response).await
    }
}

/// `AUTH_URL` / `AUTH_ANON_KEY` が未設定のときに注入するクライアント
pub struct UnconfiguredProfileStoreClient {
    variable: &'static str,
}

impl UnconfiguredProfileStoreClient {
    pub fn new(variable: &'static str) -> Self {
        Self { variable }
    }
}

#[async_trait]
impl ProfileStoreClient for UnconfiguredProfileStoreClient {
    async fn get_profile(
        &self,
        _: &UserId,
        _: &AccessToken,
    ) -> Result<UserProfile, ProfileStoreError> {
        Err(ProfileStoreError::NotConfigured(self.variable))
    }

    async fn update_profile(
        &self,
        _: &UserId,
        _: &AccessToken,
        _: &ProfileUpdate,
    ) -> Result<UserProfile, ProfileStoreError> {
        Err(ProfileStoreError::NotConfigured(self.variable))
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };

    use axum::{
        Json,
        Router,
        extract::Query,
        http::{HeaderMap, StatusCode as AxumStatus},
        routing::get,
    };
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use wingman_domain::user::{Mbti, MemberTier, UserName};

    use super::*;

    use crate::test_utils::spawn_server;

    const USER_ID: &str = "0b5a7c8e-1111-4a4a-9c9c-123456789abc";

    fn row() -> Value {
        json!({
            "id": USER_ID,
            "name": "Taro",
            "email": "user@example.com",
            "mbti": "INTJ",
            "member_tier": "premium",
            "cam_calibration": null
        })
    }

    fn sut(base_url: &str) -> ProfileStoreClientImpl {
        ProfileStoreClientImpl::new(base_url, "anon-key")
    }

    fn user_id() -> UserId {
        UserId::parse(USER_ID).unwrap()
    }

    fn token() -> AccessToken {
        AccessToken::new("user-token").unwrap()
    }

    #[tokio::test]
    async fn test_idでフィルタしてプロフィールを取得する() {
        let seen = Arc::new(Mutex::new(None::<(HashMap<String, String>, Option<String>)>));
        let seen_clone = seen.clone();
        let app = Router::new().route(
            "/rest/v1/profiles",
            get(
                move |Query(q): Query<HashMap<String, String>>, headers: HeaderMap| {
                    let seen = seen_clone.clone();
                    async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        *seen.lock().unwrap() = Some((q, auth));
                        Json(json!([row()]))
                    }
                },
            ),
        );
        let base_url = spawn_server(app).await;

        let profile = sut(&base_url).get_profile(&user_id(), &token()).await.unwrap();

        assert_eq!(profile.id, user_id());
        assert_eq!(profile.mbti, Some(Mbti::Intj));
        assert_eq!(profile.member_tier, MemberTier::Premium);
        let (query, auth) = seen.lock().unwrap().clone().unwrap();
        assert_eq!(query.get("id").map(String::as_str), Some(format!("eq.{USER_ID}").as_str()));
        assert_eq!(auth.as_deref(), Some("Bearer user-token"));
    }

    #[tokio::test]
    async fn test_空配列はnot_found() {
        let app = Router::new().route("/rest/v1/profiles", get(|| async { Json(json!([])) }));
        let base_url = spawn_server(app).await;

        let result = sut(&base_url).get_profile(&user_id(), &token()).await;

        assert_eq!(result, Err(ProfileStoreError::NotFound));
    }

    #[tokio::test]
    async fn test_更新は指定フィールドのみ送り更新後の行を返す() {
        let seen = Arc::new(Mutex::new(None::<(Option<String>, Value)>));
        let seen_clone = seen.clone();
        let app = Router::new().route(
            "/rest/v1/profiles",
            axum::routing::patch(move |headers: HeaderMap, Json(body): Json<Value>| {
                let seen = seen_clone.clone();
                async move {
                    let prefer = headers
                        .get("prefer")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    *seen.lock().unwrap() = Some((prefer, body));
                    let mut updated = row();
                    updated["name"] = json!("Hanako");
                    Json(json!([updated]))
                }
            }),
        );
        let base_url = spawn_server(app).await;
        let update = ProfileUpdate {
            name: Some(UserName::new("Hanako").unwrap()),
            ..Default::default()
        };

        let profile = sut(&base_url)
            .update_profile(&user_id(), &token(), &update)
            .await
            .unwrap();

        assert_eq!(profile.name.as_deref(), Some("Hanako"));
        let (prefer, body) = seen.lock().unwrap().clone().unwrap();
        assert_eq!(prefer.as_deref(), Some("return=representation"));
        assert_eq!(body, json!({"name": "Hanako"}));
    }

    #[tokio::test]
    async fn test_401はunauthorized() {
        let app = Router::new().route(
            "/rest/v1/profiles",
            get(|| async { AxumStatus::UNAUTHORIZED }),
        );
        let base_url = spawn_server(app).await;

        let result = sut(&base_url).get_profile(&user_id(), &token()).await;

        assert_eq!(result, Err(ProfileStoreError::Unauthorized));
    }
}
