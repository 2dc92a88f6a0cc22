//! # Wingman ドメイン層
//!
//! セッション、ユーザープロフィール、ペルソナカタログといった
//! ドメインモデルを定義する。
//!
//! ## 依存関係の方向
//!
//! ```text
//! bff → infra → domain
//! ```
//!
//! ドメイン層は外部サービス（認証サービス、Redis、外部バックエンド）に
//! 一切依存しない。
//!
//! ## モジュール構成
//!
//! - [`error`] - ドメイン層で発生するエラーの定義
//! - [`session`] - 認証済みセッションとトークン
//! - [`user`] - ユーザー ID、メールアドレス、プロフィール
//! - [`persona`] - 会話相手として選択できるペルソナの静的カタログ
//! - [`clock`] - 時刻プロバイダ
//!
//! ## 使用例
//!
//! ```rust
//! use wingman_domain::{DomainError, user::Email};
//!
//! let email = Email::new("user@example.com").unwrap();
//! assert_eq!(email.as_str(), "user@example.com");
//!
//! let err = Email::new("invalid").unwrap_err();
//! assert!(matches!(err, DomainError::Validation(_)));
//! ```

#[macro_use]
mod macros;

pub mod clock;
pub mod error;
pub mod persona;
pub mod session;
pub mod user;

pub use error::DomainError;
