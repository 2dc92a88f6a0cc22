//! # Wingman BFF (Backend for Frontend) ライブラリ
//!
//! ブラウザ UI 専用の API サーバーのコアモジュール。
//!
//! ## モジュール構成
//!
//! - `config`: 環境変数からの設定読み込み
//! - `client`: 外部サービスクライアント（認証サービス、プロフィールテーブル、外部バックエンド）
//! - `usecase`: セッション読み込み・復元、バックエンドへのハンドオフ
//! - `handler`: HTTP ハンドラ
//! - `middleware`: ミドルウェア（Request ID、キャッシュ制御）
//! - `app_builder`: DI とルーター構築

pub mod app_builder;
pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod openapi;
pub mod usecase;

#[cfg(test)]
pub(crate) mod test_utils;
