//! セッション復元ユースケース
//!
//! 外部からのリダイレクトで `token` / `user_id` / `email` がクエリパラメータとして
//! 渡された場合に、トークンを認証サービスで検証してセッションを作り直す。

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use wingman_domain::{
   clock::Clock,
   session::{AccessToken, RefreshToken, Session},
   user::{Email, UserId},
};
use wingman_infra::{InfraError, session_store::SessionStore};
use wingman_shared::{
   event_log::{error, event},
   log_business_event,
};

use crate::client::AuthServiceClient;

/// 復元の入力（ページ URL のクエリパラメータ）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RestoreParams {
   pub token:         Option<String>,
   pub user_id:       Option<String>,
   pub email:         Option<String>,
   pub refresh_token: Option<String>,
}

/// 復元に成功したセッション
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredSession {
   pub session_id: String,
   pub session:    Session,
}

#[derive(Debug, Error)]
pub enum RestoreError {
   /// 復元したセッションを保存できなかった
   #[error("セッションの保存に失敗しました: {0}")]
   Store(#[from] InfraError),
}

pub struct SessionRestorer {
   auth_client:   Arc<dyn AuthServiceClient>,
   session_store: Arc<dyn SessionStore>,
   clock:         Arc<dyn Clock>,
}

impl SessionRestorer {
   pub fn new(
      auth_client: Arc<dyn AuthServiceClient>,
      session_store: Arc<dyn SessionStore>,
      clock: Arc<dyn Clock>,
   ) -> Self {
      Self {
         auth_client,
         session_store,
         clock,
      }
   }

   /// クエリパラメータからセッションを復元する
   ///
   /// 1. 必須の 3 パラメータがそろわなければ、通信せずに `None`
   /// 2. `user_id` / `email` の形式不正は不一致と同じく `None`
   /// 3. トークンを認証サービスで検証（失敗は `None`）
   /// 4. 検証で得た ID と `user_id` が一致しなければ `None`
   /// 5. セッションを作成してストアに保存
   ///
   /// ストアへの保存失敗だけをエラーとして返す。
   pub async fn restore(
      &self,
      params: &RestoreParams,
   ) -> Result<Option<RestoredSession>, RestoreError> {
      let (Some(token), Some(user_id), Some(email)) = (
         non_blank(params.token.as_deref()),
         non_blank(params.user_id.as_deref()),
         non_blank(params.email.as_deref()),
      ) else {
         return Ok(None);
      };

      let (Ok(user_id), Ok(email), Ok(access_token)) = (
         UserId::parse(user_id),
         Email::new(email),
         AccessToken::new(token),
      ) else {
         tracing::warn!("復元パラメータの形式が不正なため復元しない");
         log_rejected("malformed_params");
         return Ok(None);
      };

      let resolved = match self.auth_client.get_user(&access_token).await {
         Ok(user) => user,
         Err(e) => {
            tracing::warn!(
               error.category = error::category::EXTERNAL_SERVICE,
               error.kind = error::kind::TOKEN_VALIDATION,
               "復元トークンの検証に失敗: {}",
               e
            );
            return Ok(None);
         }
      };

      if resolved.id != user_id {
         tracing::warn!(
            expected = %user_id,
            actual = %resolved.id,
            "トークンのユーザーと user_id が一致しないため復元しない"
         );
         log_rejected("user_id_mismatch");
         return Ok(None);
      }

      // 不正なリフレッシュトークンは捨て、アクセストークンだけで復元する
      let refresh_token =
         non_blank(params.refresh_token.as_deref()).and_then(|t| RefreshToken::new(t).ok());
      let expires_at = access_token.expires_at_or_default(self.clock.now());
      let session = Session::new(user_id, email, access_token, refresh_token, expires_at);

      let session_id = self.session_store.create(&session).await?;

      log_business_event!(
         event.category = event::category::AUTH,
         event.action = event::action::SESSION_RESTORED,
         event.entity_type = event::entity_type::USER,
         event.entity_id = %session.user_id,
         event.result = event::result::SUCCESS,
         "URL パラメータからセッションを復元"
      );

      Ok(Some(RestoredSession {
         session_id,
         session,
      }))
   }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
   value.map(str::trim).filter(|v| !v.is_empty())
}

fn log_rejected(reason: &str) {
   log_business_event!(
      event.category = event::category::AUTH,
      event.action = event::action::RESTORE_REJECTED,
      event.entity_type = event::entity_type::SESSION,
      event.result = event::result::FAILURE,
      event.reason = reason,
      "セッション復元を拒否"
   );
}

#[cfg(test)]
mod tests {
   use pretty_assertions::assert_eq;
   use rstest::rstest;
   use wingman_domain::clock::FixedClock;
   use wingman_infra::session_store::InMemorySessionStore;

   use super::*;
   use crate::{
      client::AuthUser,
      test_utils::{FailingSessionStore, StubAuthServiceClient, TEST_USER_ID, test_now},
   };

   const OTHER_USER_ID: &str = "7f1e2d3c-2222-4b4b-8d8d-abcdefabcdef";

   fn params(token: Option<&str>, user_id: Option<&str>, email: Option<&str>) -> RestoreParams {
      RestoreParams {
         token:         token.map(str::to_string),
         user_id:       user_id.map(str::to_string),
         email:         email.map(str::to_string),
         refresh_token: None,
      }
   }

   fn valid_params() -> RestoreParams {
      params(Some("access-token"), Some(TEST_USER_ID), Some("user@example.com"))
   }

   fn sut(auth: Arc<StubAuthServiceClient>, store: Arc<dyn SessionStore>) -> SessionRestorer {
      SessionRestorer::new(auth, store, Arc::new(FixedClock::new(test_now())))
   }

   fn memory_store() -> Arc<InMemorySessionStore> {
      Arc::new(InMemorySessionStore::new(Arc::new(FixedClock::new(test_now()))))
   }

   #[tokio::test]
   async fn test_一致するトークンからセッションを復元する() {
      let auth = Arc::new(StubAuthServiceClient::success());
      let store = memory_store();

      let restored = sut(auth.clone(), store.clone())
         .restore(&valid_params())
         .await
         .unwrap()
         .expect("復元されること");

      assert_eq!(restored.session.user_id.to_string(), TEST_USER_ID);
      assert_eq!(restored.session.email.as_str(), "user@example.com");
      assert_eq!(restored.session.refresh_token, None);
      assert_eq!(auth.calls(), 1);
      assert_eq!(
         store.get(&restored.session_id).await.unwrap(),
         Some(restored.session)
      );
   }

   #[rstest]
   #[case::token欠落(params(None, Some(TEST_USER_ID), Some("user@example.com")))]
   #[case::user_id欠落(params(Some("access-token"), None, Some("user@example.com")))]
   #[case::email欠落(params(Some("access-token"), Some(TEST_USER_ID), None))]
   #[case::空白のみ(params(Some("  "), Some(TEST_USER_ID), Some("user@example.com")))]
   #[case::全て欠落(params(None, None, None))]
   #[tokio::test]
   async fn test_パラメータが欠けていれば通信せずにnone(#[case] input: RestoreParams) {
      let auth = Arc::new(StubAuthServiceClient::success());

      let restored = sut(auth.clone(), memory_store()).restore(&input).await.unwrap();

      assert_eq!(restored, None);
      assert_eq!(auth.calls(), 0);
   }

   #[tokio::test]
   async fn test_user_idが一致しなければnone() {
      let auth = Arc::new(StubAuthServiceClient::success());
      let input = params(Some("access-token"), Some(OTHER_USER_ID), Some("user@example.com"));

      let restored = sut(auth.clone(), memory_store()).restore(&input).await.unwrap();

      assert_eq!(restored, None);
      assert_eq!(auth.calls(), 1);
   }

   #[tokio::test]
   async fn test_形式不正のuser_idは通信せずにnone() {
      let auth = Arc::new(StubAuthServiceClient::success());
      let input = params(Some("access-token"), Some("not-a-uuid"), Some("user@example.com"));

      let restored = sut(auth.clone(), memory_store()).restore(&input).await.unwrap();

      assert_eq!(restored, None);
      assert_eq!(auth.calls(), 0);
   }

   #[tokio::test]
   async fn test_トークン検証に失敗したらnone() {
      let auth = Arc::new(StubAuthServiceClient::invalid_token());

      let restored = sut(auth, memory_store()).restore(&valid_params()).await.unwrap();

      assert_eq!(restored, None);
   }

   #[tokio::test]
   async fn test_リフレッシュトークンを引き継ぐ() {
      let auth = Arc::new(StubAuthServiceClient::success().with_user(AuthUser {
         id:    UserId::parse(TEST_USER_ID).unwrap(),
         email: None,
      }));
      let mut input = valid_params();
      input.refresh_token = Some("refresh-token".to_string());

      let restored = sut(auth, memory_store())
         .restore(&input)
         .await
         .unwrap()
         .unwrap();

      assert_eq!(
         restored.session.refresh_token,
         Some(RefreshToken::new("refresh-token").unwrap())
      );
   }

   #[tokio::test]
   async fn test_ストアへの保存失敗はエラー() {
      let auth = Arc::new(StubAuthServiceClient::success());

      let result = sut(auth, Arc::new(FailingSessionStore))
         .restore(&valid_params())
         .await;

      assert!(matches!(result, Err(RestoreError::Store(_))));
   }
}
