//! テスト用のスタブとヘルパー

use std::sync::{
   Arc,
   atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use axum::Router;
use chrono::{DateTime, Duration, TimeZone, Utc};
use wingman_domain::{
   session::{AccessToken, RefreshToken, Session},
   user::{Email, ProfileUpdate, UserId, UserProfile},
};
use wingman_infra::{
   InfraError,
   session_store::{HandoffGrant, SessionStore},
};

use crate::client::{
   AuthServiceClient,
   AuthServiceError,
   AuthUser,
   BackendClient,
   BackendError,
   ProfileStoreClient,
   ProfileStoreError,
   SignUpOutcome,
   VerifyOutcome,
   VerifyPayload,
};

pub const TEST_USER_ID: &str = "0b5a7c8e-1111-4a4a-9c9c-123456789abc";

pub fn test_now() -> DateTime<Utc> {
   Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap()
}

/// 期限まで 1 時間あるセッション
pub fn test_session() -> Session {
   Session::new(
      UserId::parse(TEST_USER_ID).unwrap(),
      Email::new("user@example.com").unwrap(),
      AccessToken::new("access-token").unwrap(),
      Some(RefreshToken::new("refresh-token").unwrap()),
      test_now() + Duration::hours(1),
   )
}

/// ルーターを空きポートで起動し、ベース URL を返す
pub async fn spawn_server(app: Router) -> String {
   let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
   let addr = listener.local_addr().unwrap();
   tokio::spawn(async move {
      axum::serve(listener, app).await.unwrap();
   });
   format!("http://{addr}")
}

// --- 認証サービス ---

/// 呼び出し回数を数える認証サービススタブ
pub struct StubAuthServiceClient {
   pub session_result: Result<Session, AuthServiceError>,
   pub user_result:    Result<AuthUser, AuthServiceError>,
   pub sign_up_result: Result<SignUpOutcome, AuthServiceError>,
   calls:              AtomicUsize,
}

impl StubAuthServiceClient {
   pub fn success() -> Self {
      let session = test_session();
      Self {
         user_result:    Ok(AuthUser {
            id:    session.user_id.clone(),
            email: Some(session.email.to_string()),
         }),
         sign_up_result: Ok(SignUpOutcome::Session(session.clone())),
         session_result: Ok(session),
         calls:          AtomicUsize::new(0),
      }
   }

   pub fn invalid_token() -> Self {
      Self::failing(AuthServiceError::InvalidToken)
   }

   pub fn unavailable() -> Self {
      Self::failing(AuthServiceError::ServiceUnavailable)
   }

   pub fn failing(error: AuthServiceError) -> Self {
      Self {
         session_result: Err(error.clone()),
         user_result:    Err(error.clone()),
         sign_up_result: Err(error),
         calls:          AtomicUsize::new(0),
      }
   }

   pub fn with_user(mut self, user: AuthUser) -> Self {
      self.user_result = Ok(user);
      self
   }

   /// 通信を伴う操作の呼び出し回数
   pub fn calls(&self) -> usize {
      self.calls.load(Ordering::SeqCst)
   }

   fn record(&self) {
      self.calls.fetch_add(1, Ordering::SeqCst);
   }
}

#[async_trait]
impl AuthServiceClient for StubAuthServiceClient {
   fn sign_in_url(
      &self,
      provider: &str,
      redirect_to: &str,
      code_challenge: &str,
   ) -> Result<String, AuthServiceError> {
      Ok(format!(
         "https://auth.example.com/auth/v1/authorize?provider={provider}&redirect_to={}&code_challenge={code_challenge}",
         urlencoding::encode(redirect_to)
      ))
   }

   async fn sign_in_with_password(&self, _: &str, _: &str) -> Result<Session, AuthServiceError> {
      self.record();
      self.session_result.clone()
   }

   async fn sign_up(&self, _: &str, _: &str) -> Result<SignUpOutcome, AuthServiceError> {
      self.record();
      self.sign_up_result.clone()
   }

   async fn exchange_code(&self, _: &str, _: &str) -> Result<Session, AuthServiceError> {
      self.record();
      self.session_result.clone()
   }

   async fn refresh_session(&self, _: &RefreshToken) -> Result<Session, AuthServiceError> {
      self.record();
      self.session_result.clone()
   }

   async fn get_user(&self, _: &AccessToken) -> Result<AuthUser, AuthServiceError> {
      self.record();
      self.user_result.clone()
   }

   async fn sign_out(&self, _: &AccessToken) -> Result<(), AuthServiceError> {
      self.record();
      Ok(())
   }

   async fn health(&self) -> Result<(), AuthServiceError> {
      self.user_result.clone().map(|_| ())
   }
}

// --- 外部バックエンド ---

pub struct StubBackendClient {
   pub verify_result: Result<VerifyOutcome, BackendError>,
   pub health_result: Result<(), BackendError>,
   pub calls:         Arc<AtomicUsize>,
}

impl StubBackendClient {
   pub fn verified() -> Self {
      Self {
         verify_result: Ok(VerifyOutcome::Verified),
         health_result: Ok(()),
         calls:         Arc::new(AtomicUsize::new(0)),
      }
   }

   pub fn unverified(status: u16) -> Self {
      Self {
         verify_result: Ok(VerifyOutcome::Unverified { status }),
         ..Self::verified()
      }
   }

   pub fn unreachable() -> Self {
      Self {
         verify_result: Err(BackendError::ServiceUnavailable),
         health_result: Err(BackendError::ServiceUnavailable),
         ..Self::verified()
      }
   }
}

#[async_trait]
impl BackendClient for StubBackendClient {
   async fn health(&self) -> Result<(), BackendError> {
      self.health_result.clone()
   }

   async fn verify(&self, _: &VerifyPayload<'_>) -> Result<VerifyOutcome, BackendError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      self.verify_result.clone()
   }
}

// --- プロフィール ---

pub struct StubProfileStoreClient {
   pub result: Result<UserProfile, ProfileStoreError>,
}

impl StubProfileStoreClient {
   pub fn with_profile(profile: UserProfile) -> Self {
      Self {
         result: Ok(profile),
      }
   }
}

#[async_trait]
impl ProfileStoreClient for StubProfileStoreClient {
   async fn get_profile(
      &self,
      _: &UserId,
      _: &AccessToken,
   ) -> Result<UserProfile, ProfileStoreError> {
      self.result.clone()
   }

   /// 更新内容を反映した行を返す
   async fn update_profile(
      &self,
      _: &UserId,
      _: &AccessToken,
      update: &ProfileUpdate,
   ) -> Result<UserProfile, ProfileStoreError> {
      let mut profile = self.result.clone()?;
      if let Some(name) = &update.name {
         profile.name = Some(name.to_string());
      }
      if let Some(mbti) = update.mbti {
         profile.mbti = Some(mbti);
      }
      if let Some(calibration) = &update.cam_calibration {
         profile.cam_calibration = Some(calibration.clone());
      }
      Ok(profile)
   }
}

// --- セッションストア ---

/// 全操作が失敗するセッションストア
pub struct FailingSessionStore;

#[async_trait]
impl SessionStore for FailingSessionStore {
   async fn create(&self, _: &Session) -> Result<String, InfraError> {
      Err(InfraError::unexpected("store down"))
   }

   async fn get(&self, _: &str) -> Result<Option<Session>, InfraError> {
      Err(InfraError::unexpected("store down"))
   }

   async fn replace(&self, _: &str, _: &Session) -> Result<(), InfraError> {
      Err(InfraError::unexpected("store down"))
   }

   async fn delete(&self, _: &str) -> Result<(), InfraError> {
      Err(InfraError::unexpected("store down"))
   }

   async fn create_handoff_code(&self, _: &HandoffGrant) -> Result<String, InfraError> {
      Err(InfraError::unexpected("store down"))
   }

   async fn take_handoff_code(&self, _: &str) -> Result<Option<HandoffGrant>, InfraError> {
      Err(InfraError::unexpected("store down"))
   }

   async fn ping(&self) -> Result<(), InfraError> {
      Err(InfraError::unexpected("store down"))
   }
}
