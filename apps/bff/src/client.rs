//! # 外部サービスクライアント
//!
//! BFF から外部サービスへの通信を担当する。
//!
//! - [`auth_service`]: 認証サービス（`/auth/v1/*`）
//! - [`profile_store`]: プロフィールテーブル（`/rest/v1/profiles`）
//! - [`backend`]: 外部 AI バックエンド（`/health`, `/auth/verify`）
//!
//! 各クライアントはトレイトで定義し、テストではスタブに差し替える。
//! 必要な環境変数が未設定の場合は `Unconfigured*` 実装を注入し、
//! 全操作が `NotConfigured` エラーを返す。

pub mod auth_service;
pub mod backend;
pub mod profile_store;

pub use auth_service::{
    AuthServiceClient,
    AuthServiceClientImpl,
    AuthServiceError,
    AuthUser,
    SignUpOutcome,
    UnconfiguredAuthServiceClient,
};
pub use backend::{
    BackendClient,
    BackendClientImpl,
    BackendError,
    UnconfiguredBackendClient,
    VerifyOutcome,
    VerifyPayload,
};
pub use profile_store::{
    ProfileStoreClient,
    ProfileStoreClientImpl,
    ProfileStoreError,
    UnconfiguredProfileStoreClient,
};
