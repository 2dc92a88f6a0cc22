//! # ユースケース層
//!
//! セッション・ハンドオフに関する BFF のロジックを実装する。
//!
//! - **依存性注入**: クライアントとセッションストアを `Arc<dyn Trait>` で外部から注入
//! - **薄いハンドラ**: ハンドラは HTTP との変換だけを担い、判断はユースケースに置く
//!
//! ## モジュール構成
//!
//! - `session`: Cookie のセッション ID からセッションを読み込む（期限切れならリフレッシュ）
//! - `restore`: URL のクエリパラメータからセッションを復元する
//! - `handoff`: 外部バックエンドへの身元の受け渡し（iframe URL・本人確認・コード引き換え）

pub mod handoff;
pub mod restore;
pub mod session;

pub use handoff::{HandoffError, HandoffMode, HandoffService, IframeHandoff, IframeTarget, Verification};
pub use restore::{RestoreError, RestoreParams, RestoredSession, SessionRestorer};
pub use session::{SessionLoader, SessionLookup};
