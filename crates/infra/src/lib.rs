//! # Wingman インフラ層
//!
//! 外部システムとの接続を担当するインフラストラクチャ層。
//!
//! ## 責務
//!
//! - **セッションストア**: サーバー側セッションとハンドオフコードの保存（Redis / インメモリ）
//!
//! ## 依存関係
//!
//! ```text
//! bff → infra → domain
//! ```
//!
//! ## モジュール構成
//!
//! - [`error`] - インフラ層エラー定義
//! - [`session_store`] - セッションストア
//!
//! ## 使用例
//!
//! ```rust,ignore
//! use wingman_infra::session_store::{RedisSessionStore, SessionStore};
//!
//! async fn setup() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = RedisSessionStore::new("redis://localhost:6379", clock).await?;
//!     store.ping().await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod session_store;

pub use error::{InfraError, InfraErrorKind};
