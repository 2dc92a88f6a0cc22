//! # ドメイン層エラー定義
//!
//! | エラー種別 | HTTP ステータス | 用途 |
//! |-----------|----------------|------|
//! | `Validation` | 400 Bad Request | 入力値の検証失敗、カタログの不整合 |
//! 
use thiserror::Error;

/// ドメイン層で発生するエラー
#[derive(Debug, Error)]
pub enum DomainError {
    /// バリデーションエラー
    ///
    /// 必須項目の欠落、文字数超過、不正なフォーマットなど。
    #[error("バリデーションエラー: {0}")]
    Validation(String),
}
