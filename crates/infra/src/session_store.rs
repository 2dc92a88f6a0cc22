//! # セッションストア
//!
//! 認証済みセッションとハンドオフコードをサーバー側に保存する。
//! ブラウザには不透明なセッション ID だけを Cookie で渡す。
//!
//! ## キー設計
//!
//! | キー | 値 | TTL |
//! |-----|-----|-----|
//! | `session:{session_id}` | StoredSession (JSON) | リフレッシュトークンあり: 7 日 / なし: トークンの残り寿命 |
//! | `handoff:{code}` | StoredGrant (JSON) | 60 秒 |
//!
//! `REDIS_URL` が未設定の環境では [`InMemorySessionStore`] を使う。

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use redis::{AsyncCommands, aio::ConnectionManager};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;
use wingman_domain::{
   clock::Clock,
   session::{AccessToken, RefreshToken, Session},
   user::{Email, UserId},
};

use crate::InfraError;

/// リフレッシュトークンを持つセッションの保持期間（秒）
///
/// アクセストークンの期限切れ後もリフレッシュできるよう、トークン寿命より長く保持する。
pub const SESSION_TTL_SECONDS: u64 = 7 * 24 * 60 * 60;

/// ハンドオフコードの有効期間（秒）
pub const HANDOFF_CODE_TTL_SECONDS: u64 = 60;

/// ハンドオフコードのエントロピー（バイト）
const HANDOFF_CODE_BYTES: usize = 32;

/// ハンドオフコードと引き換えに外部バックエンドへ渡す身元情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffGrant {
   pub user_id:      UserId,
   pub email:        Email,
   pub access_token: AccessToken,
}

impl HandoffGrant {
   pub fn from_session(session: &Session) -> Self {
      Self {
         user_id:      session.user_id.clone(),
         email:        session.email.clone(),
         access_token: session.access_token.clone(),
      }
   }
}

/// セッションストアトレイト
#[async_trait]
pub trait SessionStore: Send + Sync {
   /// セッションを保存し、新しいセッション ID を返す
   async fn create(&self, session: &Session) -> Result<String, InfraError>;

   /// セッションを取得する（存在しなければ `None`）
   async fn get(&self, session_id: &str) -> Result<Option<Session>, InfraError>;

   /// 既存のセッション ID のままセッションを置き換える（リフレッシュ時）
   async fn replace(&self, session_id: &str, session: &Session) -> Result<(), InfraError>;

   /// セッションを削除する（存在しなくても成功）
   async fn delete(&self, session_id: &str) -> Result<(), InfraError>;

   /// 単回使用のハンドオフコードを発行する
   async fn create_handoff_code(&self, grant: &HandoffGrant) -> Result<String, InfraError>;

   /// ハンドオフコードを引き換える
   ///
   /// 取得と削除をアトミックに行うため、同じコードは 2 度引き換えられない。
   async fn take_handoff_code(&self, code: &str) -> Result<Option<HandoffGrant>, InfraError>;

   /// 疎通確認（readiness 用）
   async fn ping(&self) -> Result<(), InfraError>;
}

/// 推測不可能なハンドオフコードを生成する（256 bit、URL セーフ）
pub fn generate_handoff_code() -> String {
   let mut bytes = [0u8; HANDOFF_CODE_BYTES];
   rand::rng().fill_bytes(&mut bytes);
   URL_SAFE_NO_PAD.encode(bytes)
}

fn generate_session_id() -> String {
   Uuid::new_v4().to_string()
}

/// セッションの保存期間を決める
///
/// リフレッシュできないセッションはアクセストークンの期限で消す。
fn session_ttl_seconds(session: &Session, now: DateTime<Utc>) -> u64 {
   if session.refresh_token.is_some() {
      return SESSION_TTL_SECONDS;
   }
   session.remaining_ttl(now).num_seconds().max(1) as u64
}

// ===== 保存形式 =====

#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
   user_id:       UserId,
   email:         String,
   access_token:  String,
   refresh_token: Option<String>,
   expires_at:    DateTime<Utc>,
}

impl From<&Session> for StoredSession {
   fn from(session: &Session) -> Self {
      Self {
         user_id:       session.user_id.clone(),
         email:         session.email.as_str().to_string(),
         access_token:  session.access_token.as_str().to_string(),
         refresh_token: session
            .refresh_token
            .as_ref()
            .map(|t| t.as_str().to_string()),
         expires_at:    session.expires_at,
      }
   }
}

impl TryFrom<StoredSession> for Session {
   type Error = InfraError;

   fn try_from(stored: StoredSession) -> Result<Self, Self::Error> {
      let email = Email::new(stored.email).map_err(|e| InfraError::corrupted_data(e.to_string()))?;
      let access_token =
         AccessToken::new(stored.access_token).map_err(|e| InfraError::corrupted_data(e.to_string()))?;
      let refresh_token = stored
         .refresh_token
         .map(RefreshToken::new)
         .transpose()
         .map_err(|e| InfraError::corrupted_data(e.to_string()))?;

      Ok(Session::new(
         stored.user_id,
         email,
         access_token,
         refresh_token,
         stored.expires_at,
      ))
   }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredGrant {
   user_id:      UserId,
   email:        String,
   access_token: String,
}

impl From<&HandoffGrant> for StoredGrant {
   fn from(grant: &HandoffGrant) -> Self {
      Self {
         user_id:      grant.user_id.clone(),
         email:        grant.email.as_str().to_string(),
         access_token: grant.access_token.as_str().to_string(),
      }
   }
}

impl TryFrom<StoredGrant> for HandoffGrant {
   type Error = InfraError;

   fn try_from(stored: StoredGrant) -> Result<Self, Self::Error> {
      Ok(Self {
         user_id:      stored.user_id,
         email:        Email::new(stored.email).map_err(|e| InfraError::corrupted_data(e.to_string()))?,
         access_token: AccessToken::new(stored.access_token)
            .map_err(|e| InfraError::corrupted_data(e.to_string()))?,
      })
   }
}

// ===== Redis 実装 =====

/// Redis を使用したセッションストア
pub struct RedisSessionStore {
   conn:  ConnectionManager,
   clock: Arc<dyn Clock>,
}

impl RedisSessionStore {
   /// # 引数
   ///
   /// - `redis_url`: Redis 接続 URL（例: `redis://localhost:6379`）
   pub async fn new(redis_url: &str, clock: Arc<dyn Clock>) -> Result<Self, InfraError> {
      let client = redis::Client::open(redis_url)?;
      let conn = ConnectionManager::new(client).await?;
      Ok(Self { conn, clock })
   }

   fn session_key(session_id: &str) -> String {
      format!("session:{session_id}")
   }

   fn handoff_key(code: &str) -> String {
      format!("handoff:{code}")
   }

   async fn write_session(&self, session_id: &str, session: &Session) -> Result<(), InfraError> {
      let key = Self::session_key(session_id);
      let json = serde_json::to_string(&StoredSession::from(session))?;
      let ttl = session_ttl_seconds(session, self.clock.now());

      let mut conn = self.conn.clone();
      let _: () = conn.set_ex(&key, json, ttl).await?;
      Ok(())
   }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
   async fn create(&self, session: &Session) -> Result<String, InfraError> {
      let session_id = generate_session_id();
      self.write_session(&session_id, session).await?;
      Ok(session_id)
   }

   async fn get(&self, session_id: &str) -> Result<Option<Session>, InfraError> {
      let key = Self::session_key(session_id);
      let mut conn = self.conn.clone();

      let result: Option<String> = conn.get(&key).await?;

      match result {
         Some(json) => {
            let stored: StoredSession = serde_json::from_str(&json)?;
            Ok(Some(stored.try_into()?))
         }
         None => Ok(None),
      }
   }

   async fn replace(&self, session_id: &str, session: &Session) -> Result<(), InfraError> {
      self.write_session(session_id, session).await
   }

   async fn delete(&self, session_id: &str) -> Result<(), InfraError> {
      let key = Self::session_key(session_id);
      let mut conn = self.conn.clone();
      let _: () = conn.del(&key).await?;
      Ok(())
   }

   async fn create_handoff_code(&self, grant: &HandoffGrant) -> Result<String, InfraError> {
      let code = generate_handoff_code();
      let key = Self::handoff_key(&code);
      let json = serde_json::to_string(&StoredGrant::from(grant))?;

      let mut conn = self.conn.clone();
      let _: () = conn.set_ex(&key, json, HANDOFF_CODE_TTL_SECONDS).await?;

      Ok(code)
   }

   async fn take_handoff_code(&self, code: &str) -> Result<Option<HandoffGrant>, InfraError> {
      let key = Self::handoff_key(code);
      let mut conn = self.conn.clone();

      let result: Option<String> = redis::cmd("GETDEL").arg(&key).query_async(&mut conn).await?;

      match result {
         Some(json) => {
            let stored: StoredGrant = serde_json::from_str(&json)?;
            Ok(Some(stored.try_into()?))
         }
         None => Ok(None),
      }
   }

   async fn ping(&self) -> Result<(), InfraError> {
      let mut conn = self.conn.clone();
      let _: String = redis::cmd("PING").query_async(&mut conn).await?;
      Ok(())
   }
}

// ===== インメモリ実装 =====

struct Entry<T> {
   value:      T,
   expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct Entries {
   sessions: HashMap<String, Entry<Session>>,
   handoffs: HashMap<String, Entry<HandoffGrant>>,
}

impl Entries {
   /// 期限切れのセッションとハンドオフコードを捨てる
   fn sweep_expired(&mut self, now: DateTime<Utc>) {
      self.sessions.retain(|_, entry| entry.expires_at > now);
      self.handoffs.retain(|_, entry| entry.expires_at > now);
   }
}

/// プロセス内に保持するセッションストア
///
/// 単一インスタンスでの開発・テスト用。
/// 期限切れのエントリは参照時と、新しいエントリを書き込むたびに掃除する。
pub struct InMemorySessionStore {
   entries: Mutex<Entries>,
   clock:   Arc<dyn Clock>,
}

impl InMemorySessionStore {
   pub fn new(clock: Arc<dyn Clock>) -> Self {
      Self {
         entries: Mutex::new(Entries::default()),
         clock,
      }
   }

   fn session_entry(&self, session: &Session) -> Entry<Session> {
      let now = self.clock.now();
      let ttl = session_ttl_seconds(session, now) as i64;
      Entry {
         value:      session.clone(),
         expires_at: now + Duration::seconds(ttl),
      }
   }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
   async fn create(&self, session: &Session) -> Result<String, InfraError> {
      let session_id = generate_session_id();
      let entry = self.session_entry(session);
      let mut entries = self.entries.lock().await;
      entries.sweep_expired(self.clock.now());
      entries.sessions.insert(session_id.clone(), entry);
      Ok(session_id)
   }

   async fn get(&self, session_id: &str) -> Result<Option<Session>, InfraError> {
      let now = self.clock.now();
      let mut entries = self.entries.lock().await;

      match entries.sessions.get(session_id) {
         Some(entry) if entry.expires_at > now => Ok(Some(entry.value.clone())),
         Some(_) => {
            entries.sessions.remove(session_id);
            Ok(None)
         }
         None => Ok(None),
      }
   }

   async fn replace(&self, session_id: &str, session: &Session) -> Result<(), InfraError> {
      let entry = self.session_entry(session);
      self.entries
         .lock()
         .await
         .sessions
         .insert(session_id.to_string(), entry);
      Ok(())
   }

   async fn delete(&self, session_id: &str) -> Result<(), InfraError> {
      self.entries.lock().await.sessions.remove(session_id);
      Ok(())
   }

   async fn create_handoff_code(&self, grant: &HandoffGrant) -> Result<String, InfraError> {
      let code = generate_handoff_code();
      let now = self.clock.now();
      let entry = Entry {
         value:      grant.clone(),
         expires_at: now + Duration::seconds(HANDOFF_CODE_TTL_SECONDS as i64),
      };
      let mut entries = self.entries.lock().await;
      entries.sweep_expired(now);
      entries.handoffs.insert(code.clone(), entry);
      Ok(code)
   }

   async fn take_handoff_code(&self, code: &str) -> Result<Option<HandoffGrant>, InfraError> {
      let now = self.clock.now();
      let entry = self.entries.lock().await.handoffs.remove(code);

      Ok(entry
         .filter(|entry| entry.expires_at > now)
         .map(|entry| entry.value))
   }

   async fn ping(&self) -> Result<(), InfraError> {
      Ok(())
   }
}
