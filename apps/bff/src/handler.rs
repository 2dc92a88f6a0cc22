//! # HTTP リクエストハンドラ
//!
//! axum のルートに対応するハンドラ関数を定義する。
//!
//! - 各ハンドラはサブモジュールに配置し、親モジュールで re-export する
//! - ハンドラは薄く保ち、判断はユースケース（[`crate::usecase`]）に委譲する
//!
//! ## ハンドラ一覧
//!
//! - `health`: ヘルスチェック
//! - `auth`: サインイン・サインアウト・セッション取得・セッション復元
//! - `handoff`: iframe URL の発行とハンドオフコードの引き換え
//! - `persona`: ペルソナカタログ
//! - `profile`: 自分のプロフィール
//! - `proxy`: 外部バックエンド・認証サービスへの転送

pub mod auth;
pub mod handoff;
pub mod health;
pub mod persona;
pub mod profile;
pub mod proxy;

pub use auth::{AuthState, callback, login, logout, restore, session, signin, signup};
pub use handoff::{HandoffState, iframe, redeem};
pub use health::{ReadinessState, health_check, readiness_check};
pub use persona::{PersonaState, get_persona, list_personas};
pub use profile::{ProfileState, get_profile, update_profile};
pub use proxy::{ProxyState, auth_proxy, backend_proxy};
