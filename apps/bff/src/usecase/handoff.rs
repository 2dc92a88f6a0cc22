//! ハンドオフユースケース
//!
//! 認証済みの身元を外部バックエンドへ渡し、iframe の URL を組み立てる。
//!
//! ## 方式
//!
//! | 方式 | iframe URL | 身元の受け渡し |
//! |------|-----------|---------------|
//! | [`HandoffMode::Exchange`]（既定） | `?handoff_code=<code>` | バックエンドが `POST /api/v1/handoff/redeem` で引き換える |
//! | [`HandoffMode::Query`] | `?user_id=..&email=..&token=..` | URL に直接載せる |
//!
//! どちらの方式でも、URL を返す前に `POST /auth/verify` で本人確認を行う。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use wingman_domain::session::Session;
use wingman_infra::{
   InfraError,
   session_store::{HandoffGrant, SessionStore},
};
use wingman_shared::{
   event_log::{error, event},
   log_business_event,
};

use crate::client::{BackendClient, BackendError, VerifyOutcome, VerifyPayload};

/// 身元の受け渡し方式（`HANDOFF_MODE`）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::EnumString, strum::Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum HandoffMode {
   /// 使い捨てコードを URL に載せる
   #[default]
   Exchange,
   /// 身元とトークンをクエリパラメータに載せる
   Query,
}

/// iframe の埋め込み先
#[derive(
   Debug,
   Clone,
   Copy,
   PartialEq,
   Eq,
   Serialize,
   Deserialize,
   ToSchema,
   strum::EnumString,
   strum::Display,
   strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IframeTarget {
   Studio,
   Webcam,
}

impl IframeTarget {
   /// バックエンド上のパス
   pub fn path(self) -> &'static str {
      self.into()
   }
}

/// 本人確認の扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Verification {
   /// セッションがないため確認していない
   Skipped,
   Verified,
   /// バックエンドが拒否した（未認証の URL にフォールバック）
   Unverified,
}

/// iframe に渡す URL と本人確認の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IframeHandoff {
   pub url:             String,
   pub verification:    Verification,
   pub upstream_status: Option<u16>,
}

#[derive(Debug, Error)]
pub enum HandoffError {
   /// バックエンドに到達できない
   #[error("バックエンドに到達できません: {0}")]
   BackendUnreachable(String),

   #[error("{0} が設定されていません")]
   NotConfigured(&'static str),

   /// ハンドオフコードの保存・引き換えに失敗
   #[error("セッションストアのエラー: {0}")]
   Store(#[from] InfraError),
}

impl From<BackendError> for HandoffError {
   fn from(err: BackendError) -> Self {
      match err {
         BackendError::NotConfigured(variable) => HandoffError::NotConfigured(variable),
         e @ (BackendError::ServiceUnavailable | BackendError::Network(_)) => {
            HandoffError::BackendUnreachable(e.to_string())
         }
      }
   }
}

/// `base` と `path` をちょうど 1 つの `/` で連結する
pub fn join_url(base: &str, path: &str) -> String {
   format!(
      "{}/{}",
      base.trim_end_matches('/'),
      path.trim_start_matches('/')
   )
}

/// クエリ方式の iframe URL
///
/// セッションがなければ `${base}/${path}` をそのまま返す。
/// セッションがあれば `user_id` / `email` / `token` の 3 つだけを付与する。
pub fn iframe_url(base: &str, path: &str, session: Option<&Session>) -> String {
   let url = join_url(base, path);
   match session {
      None => url,
      Some(session) => format!(
         "{url}?user_id={}&email={}&token={}",
         urlencoding::encode(&session.user_id.to_string()),
         urlencoding::encode(session.email.as_str()),
         urlencoding::encode(session.access_token.as_str()),
      ),
   }
}

/// 引き換え方式の iframe URL
pub fn exchange_url(base: &str, path: &str, code: &str) -> String {
   format!(
      "{}?handoff_code={}",
      join_url(base, path),
      urlencoding::encode(code)
   )
}

pub struct HandoffService {
   backend_client: Arc<dyn BackendClient>,
   session_store:  Arc<dyn SessionStore>,
   backend_url:    Option<String>,
   mode:           HandoffMode,
}

impl HandoffService {
   pub fn new(
      backend_client: Arc<dyn BackendClient>,
      session_store: Arc<dyn SessionStore>,
      backend_url: Option<String>,
      mode: HandoffMode,
   ) -> Self {
      Self {
         backend_client,
         session_store,
         backend_url,
         mode,
      }
   }

   /// バックエンドで本人確認を行う
   ///
   /// 2xx は `Verified`、非 2xx は `Unverified`。到達できない場合だけがエラー。
   pub async fn verify(&self, session: &Session) -> Result<VerifyOutcome, HandoffError> {
      Ok(self
         .backend_client
         .verify(&VerifyPayload::from_session(session))
         .await?)
   }

   /// iframe の URL を組み立てる
   pub async fn prepare_iframe(
      &self,
      target: IframeTarget,
      session: Option<&Session>,
   ) -> Result<IframeHandoff, HandoffError> {
      let base = self
         .backend_url
         .as_deref()
         .ok_or(HandoffError::NotConfigured("BACKEND_URL"))?;
      let path = target.path();

      let Some(session) = session else {
         return Ok(IframeHandoff {
            url:             iframe_url(base, path, None),
            verification:    Verification::Skipped,
            upstream_status: None,
         });
      };

      match self.verify(session).await? {
         VerifyOutcome::Verified => {
            let url = match self.mode {
               HandoffMode::Query => iframe_url(base, path, Some(session)),
               HandoffMode::Exchange => {
                  let code = self
                     .session_store
                     .create_handoff_code(&HandoffGrant::from_session(session))
                     .await?;
                  exchange_url(base, path, &code)
               }
            };

            log_business_event!(
               event.category = event::category::HANDOFF,
               event.action = event::action::HANDOFF_VERIFIED,
               event.entity_type = event::entity_type::USER,
               event.entity_id = %session.user_id,
               event.result = event::result::SUCCESS,
               handoff.mode = %self.mode,
               handoff.target = %target,
               "バックエンドの本人確認に成功"
            );

            Ok(IframeHandoff {
               url,
               verification: Verification::Verified,
               upstream_status: None,
            })
         }
         VerifyOutcome::Unverified { status } => {
            tracing::warn!(
               error.category = error::category::EXTERNAL_SERVICE,
               error.kind = error::kind::BACKEND_VERIFY,
               upstream_status = status,
               "バックエンドが本人確認を拒否したため未認証の URL にフォールバック"
            );
            log_business_event!(
               event.category = event::category::HANDOFF,
               event.action = event::action::HANDOFF_UNVERIFIED,
               event.entity_type = event::entity_type::USER,
               event.entity_id = %session.user_id,
               event.result = event::result::FAILURE,
               handoff.target = %target,
               "バックエンドの本人確認に失敗"
            );

            Ok(IframeHandoff {
               url:             iframe_url(base, path, None),
               verification:    Verification::Unverified,
               upstream_status: Some(status),
            })
         }
      }
   }

   /// ハンドオフコードを引き換える（1 回限り）
   ///
   /// 未知・期限切れのコードは `None`。
   pub async fn redeem(&self, code: &str) -> Result<Option<HandoffGrant>, HandoffError> {
      let code = code.trim();
      if code.is_empty() {
         return Ok(None);
      }

      let grant = self.session_store.take_handoff_code(code).await?;

      if let Some(grant) = &grant {
         log_business_event!(
            event.category = event::category::HANDOFF,
            event.action = event::action::HANDOFF_REDEEMED,
            event.entity_type = event::entity_type::HANDOFF_CODE,
            event.entity_id = %grant.user_id,
            event.result = event::result::SUCCESS,
            "ハンドオフコードを引き換え"
         );
      }

      Ok(grant)
   }
}
