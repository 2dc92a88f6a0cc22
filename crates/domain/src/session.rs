//! # セッション
//!
//! 認証サービスが発行したトークンと、それに紐づくユーザーの識別情報。
//!
//! サーバー側のセッションストアにのみ保持し、ブラウザには
//! 不透明なセッション ID（HttpOnly Cookie）だけを渡す。

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::user::{Email, UserId};

/// 有効期限が分からないトークンに割り当てる寿命（秒）
pub const DEFAULT_SESSION_LIFETIME_SECS: i64 = 3600;

define_validated_string! {
    /// アクセストークン（認証サービスが発行する JWT）
    ///
    /// `Debug` 出力はマスクされ、`Serialize` は実装しない。
    pub struct AccessToken {
        label: "アクセストークン",
        max_length: 8192,
        secret: true,
    }
}

define_validated_string! {
    /// リフレッシュトークン
    pub struct RefreshToken {
        label: "リフレッシュトークン",
        max_length: 1024,
        secret: true,
    }
}

#[derive(Deserialize)]
struct ExpClaim {
    exp: Option<i64>,
}

impl AccessToken {
    /// JWT ペイロードの `exp` クレームを読み取る
    ///
    /// 署名は検証しない。トークンの正当性は認証サービスへの問い合わせで確認済みである前提。
    pub fn expiry_claim(&self) -> Option<DateTime<Utc>> {
        let payload = self.as_str().split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .ok()?;
        let claim: ExpClaim = serde_json::from_slice(&bytes).ok()?;
        DateTime::from_timestamp(claim.exp?, 0)
    }

    /// `exp` クレーム、なければ `now` + 既定の寿命を有効期限とする
    pub fn expires_at_or_default(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.expiry_claim()
            .unwrap_or_else(|| now + Duration::seconds(DEFAULT_SESSION_LIFETIME_SECS))
    }
}

/// 認証済みセッション
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id:       UserId,
    pub email:         Email,
    pub access_token:  AccessToken,
    pub refresh_token: Option<RefreshToken>,
    pub expires_at:    DateTime<Utc>,
}

impl Session {
    pub fn new(
        user_id: UserId,
        email: Email,
        access_token: AccessToken,
        refresh_token: Option<RefreshToken>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            email,
            access_token,
            refresh_token,
            expires_at,
        }
    }

    /// 期限切れかどうか（`now >= expires_at`）
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// 期限までの残り時間（期限切れの場合はゼロ）
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }
}
