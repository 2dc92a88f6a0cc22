//! # BFF 設定
//!
//! 環境変数から BFF サーバーの設定を読み込む。
//!
//! 外部サービスの URL やキーが未設定でもプロセスは起動する。
//! 依存するエンドポイントだけが 503（not-configured）を返す。

use std::env;

use thiserror::Error;

use crate::usecase::handoff::HandoffMode;

/// デフォルトのバインドアドレス
const DEFAULT_HOST: &str = "0.0.0.0";

/// デフォルトのポート番号
const DEFAULT_PORT: u16 = 13000;

/// OAuth リダイレクト先のデフォルト
const DEFAULT_PUBLIC_URL: &str = "http://localhost:3000";

/// 設定エラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{variable} の値が不正です: {value:?}")]
    Invalid {
        variable: &'static str,
        value: String,
    },
}

/// BFF サーバーの設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BffConfig {
    /// バインドアドレス
    pub host: String,
    /// ポート番号
    pub port: u16,
    /// 外部バックエンドのオリジン
    pub backend_url: Option<String>,
    /// 認証・データベースサービスのオリジン
    pub auth_url: Option<String>,
    /// 認証サービスの公開キー（`apikey` ヘッダー）
    pub auth_anon_key: Option<String>,
    /// OAuth サインイン後のデフォルトリダイレクト先
    pub public_url: String,
    /// Redis 接続 URL（未設定ならインメモリのセッションストア）
    pub redis_url: Option<String>,
    /// iframe へのハンドオフ方式
    pub handoff_mode: HandoffMode,
    /// Cookie に Secure 属性を付けるか（`ENV=production`）
    pub secure_cookies: bool,
}

impl BffConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 任意のキー検索関数から設定を読み込む
    ///
    /// テストでプロセスの環境変数を書き換えずに済むよう、読み取り元を差し替え可能にしている。
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            host: non_empty(lookup("BFF_HOST")).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_port(lookup("BFF_PORT").as_deref())?,
            backend_url: parse_optional_url(lookup("BACKEND_URL")),
            auth_url: parse_optional_url(lookup("AUTH_URL")),
            auth_anon_key: non_empty(lookup("AUTH_ANON_KEY")),
            public_url: parse_optional_url(lookup("PUBLIC_URL"))
                .unwrap_or_else(|| DEFAULT_PUBLIC_URL.to_string()),
            redis_url: non_empty(lookup("REDIS_URL")),
            handoff_mode: parse_handoff_mode(lookup("HANDOFF_MODE").as_deref())?,
            secure_cookies: is_production(lookup("ENV").as_deref()),
        })
    }

    /// 未設定の外部サービス変数名を列挙する（起動時の警告用）
    pub fn missing_variables(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.backend_url.is_none() {
            missing.push("BACKEND_URL");
        }
        if self.auth_url.is_none() {
            missing.push("AUTH_URL");
        }
        if self.auth_anon_key.is_none() {
            missing.push("AUTH_ANON_KEY");
        }
        missing
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_port(value: Option<&str>) -> Result<u16, ConfigError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(DEFAULT_PORT),
        Some(v) => v.parse().map_err(|_| ConfigError::Invalid {
            variable: "BFF_PORT",
            value: v.to_string(),
        }),
    }
}

/// 末尾のスラッシュを取り除いた URL を返す（空なら未設定扱い）
fn parse_optional_url(value: Option<String>) -> Option<String> {
    non_empty(value)
        .map(|v| v.trim_end_matches('/').to_string())
        .filter(|v| !v.is_empty())
}

fn parse_handoff_mode(value: Option<&str>) -> Result<HandoffMode, ConfigError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(HandoffMode::default()),
        Some(v) => v.parse().map_err(|_| ConfigError::Invalid {
            variable: "HANDOFF_MODE",
            value: v.to_string(),
        }),
    }
}

fn is_production(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.trim() == "production")
}
