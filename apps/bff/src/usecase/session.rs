//! セッション読み込みユースケース

use std::sync::Arc;

use wingman_domain::{clock::Clock, session::Session};
use wingman_infra::{InfraError, session_store::SessionStore};
use wingman_shared::{
   event_log::{error, event},
   log_business_event,
};

use crate::client::{AuthServiceClient, AuthServiceError};

/// セッション読み込みの結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionLookup {
   /// 有効なセッション（必要ならリフレッシュ済み）
   Valid(Session),
   /// ストアに存在しない
   Absent,
   /// 期限切れで継続できないため破棄した
   Revoked,
   /// 認証サービスに到達できずリフレッシュできなかった。ストアには残っている
   Unavailable,
}

impl SessionLookup {
   pub fn into_session(self) -> Option<Session> {
      match self {
         Self::Valid(session) => Some(session),
         Self::Absent | Self::Revoked | Self::Unavailable => None,
      }
   }

   /// ブラウザの Cookie を消すべきか
   ///
   /// `Unavailable` ではストアにセッションが残るので、再試行できるよう Cookie を残す。
   pub fn should_clear_cookie(&self) -> bool {
      matches!(self, Self::Absent | Self::Revoked)
   }
}

/// Cookie のセッション ID からセッションを読み込む
pub struct SessionLoader {
   auth_client:   Arc<dyn AuthServiceClient>,
   session_store: Arc<dyn SessionStore>,
   clock:         Arc<dyn Clock>,
}

impl SessionLoader {
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

   /// セッションを読み込む
   ///
   /// 1. ストアにない → `Absent`
   /// 2. 期限内 → `Valid`
   /// 3. 期限切れでリフレッシュトークンあり → 1 回だけリフレッシュし、ストアを置き換えて `Valid`
   /// 4. リフレッシュトークンなし、またはトークンが拒否された → ストアから削除して `Revoked`
   /// 5. 認証サービスに到達できない → セッションを残したまま `Unavailable`
   ///
   /// ストアのエラーだけを `Err` として返す。
   pub async fn load(&self, session_id: &str) -> Result<SessionLookup, InfraError> {
      let Some(session) = self.session_store.get(session_id).await? else {
         return Ok(SessionLookup::Absent);
      };

      if !session.is_expired(self.clock.now()) {
         return Ok(SessionLookup::Valid(session));
      }

      let Some(refresh_token) = session.refresh_token.as_ref() else {
         self.session_store.delete(session_id).await?;
         return Ok(SessionLookup::Revoked);
      };

      match self.auth_client.refresh_session(refresh_token).await {
         Ok(refreshed) => {
            self.session_store.replace(session_id, &refreshed).await?;
            log_business_event!(
               event.category = event::category::AUTH,
               event.action = event::action::SESSION_REFRESHED,
               event.entity_type = event::entity_type::USER,
               event.entity_id = %refreshed.user_id,
               event.result = event::result::SUCCESS,
               "セッションをリフレッシュ"
            );
            Ok(SessionLookup::Valid(refreshed))
         }
         Err(AuthServiceError::InvalidToken | AuthServiceError::InvalidCredentials) => {
            tracing::info!(user_id = %session.user_id, "リフレッシュトークンが拒否されたためセッションを破棄");
            self.session_store.delete(session_id).await?;
            Ok(SessionLookup::Revoked)
         }
         Err(e) => {
            tracing::warn!(
               error.category = error::category::EXTERNAL_SERVICE,
               error.kind = error::kind::TOKEN_REFRESH,
               "セッションのリフレッシュに失敗: {}",
               e
            );
            Ok(SessionLookup::Unavailable)
         }
      }
   }
}
