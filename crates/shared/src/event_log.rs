//! # ビジネスイベントログとエラーコンテキストの構造化ヘルパー
//!
//! `jq` で調査しやすいよう、ログフィールドの命名規約とヘルパーマクロを提供する。
//!
//! ## ビジネスイベント
//!
//! [`log_business_event!`] マクロで出力する。`event.kind = "business_event"` マーカーが
//! 自動付与され、`jq 'select(.["event.kind"] == "business_event")'` でフィルタできる。
//!
//! ## エラーコンテキスト
//!
//! `tracing::error!` / `tracing::warn!` に `error.category` + `error.kind` を付ける。
//! 定数は [`error`] モジュールで提供。
//!
//! トークン・パスワードはどのフィールドにも出力しないこと。

/// ビジネスイベントを構造化ログとして出力する。
///
/// `event.kind = "business_event"` マーカーを自動付与し、
/// `tracing::info!` レベルで出力する。
///
/// ## 必須フィールド（慣例）
///
/// - `event.category`: [`event::category`] の定数
/// - `event.action`: [`event::action`] の定数
/// - `event.result`: [`event::result`] の定数
///
/// ## 推奨フィールド
///
/// - `event.entity_type` / `event.entity_id`
/// - `event.actor_id`: 操作者（ユーザー ID）
#[macro_export]
macro_rules! log_business_event {
    ($($args:tt)*) => {
        ::tracing::info!(
            event.kind = "business_event",
            $($args)*
        )
    };
}

/// イベントフィールドの定数
pub mod event {
    /// イベントカテゴリ
    pub mod category {
        pub const AUTH: &str = "auth";
        pub const HANDOFF: &str = "handoff";
        pub const PROFILE: &str = "profile";
    }

    /// イベントアクション
    pub mod action {
        // 認証
        pub const LOGIN_SUCCESS: &str = "auth.login_success";
        pub const LOGIN_FAILURE: &str = "auth.login_failure";
        pub const SIGNUP: &str = "auth.signup";
        pub const LOGOUT: &str = "auth.logout";
        pub const SESSION_REFRESHED: &str = "auth.session_refreshed";
        pub const SESSION_RESTORED: &str = "auth.session_restored";
        pub const RESTORE_REJECTED: &str = "auth.restore_rejected";

        // バックエンドへの引き渡し
        pub const HANDOFF_VERIFIED: &str = "handoff.verified";
        pub const HANDOFF_UNVERIFIED: &str = "handoff.unverified";
        pub const HANDOFF_REDEEMED: &str = "handoff.redeemed";

        // プロフィール
        pub const PROFILE_UPDATED: &str = "profile.updated";
    }

    /// エンティティ種別
    pub mod entity_type {
        pub const USER: &str = "user";
        pub const SESSION: &str = "session";
        pub const HANDOFF_CODE: &str = "handoff_code";
    }

    /// イベント結果
    pub mod result {
        pub const SUCCESS: &str = "success";
        pub const FAILURE: &str = "failure";
    }
}

/// エラーコンテキストフィールドの定数
pub mod error {
    /// エラーカテゴリ
    pub mod category {
        /// インフラストラクチャ（セッションストア）
        pub const INFRASTRUCTURE: &str = "infrastructure";
        /// 外部サービス呼び出し（Auth Service、外部バックエンド）
        pub const EXTERNAL_SERVICE: &str = "external_service";
        /// 設定不足
        pub const CONFIGURATION: &str = "configuration";
    }

    /// エラー種別
    pub mod kind {
        pub const SESSION: &str = "session";
        pub const TOKEN_VALIDATION: &str = "token_validation";
        pub const TOKEN_REFRESH: &str = "token_refresh";
        pub const SIGN_IN: &str = "sign_in";
        pub const SIGN_OUT: &str = "sign_out";
        pub const PROFILE: &str = "profile";
        pub const BACKEND_VERIFY: &str = "backend_verify";
        pub const PROXY: &str = "proxy";
        pub const MISSING_ENV: &str = "missing_env";
    }
}
