//! # API レスポンスエンベロープ
//!
//! 公開 API の統一レスポンス形式 `{ "data": T }` を提供する。

use serde::{Deserialize, Serialize};

/// 公開 API の統一レスポンス型
///
/// BFF のすべての JSON エンドポイント（プロキシを除く）は `{ "data": T }` 形式で返す。
/// セッション未確立を表す場合は `ApiResponse<Option<T>>` で `{ "data": null }` を返す。
///
/// ## 使用例
///
/// ```
/// use wingman_shared::ApiResponse;
///
/// let response = ApiResponse::new("hello");
/// assert_eq!(response.data, "hello");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiResponse<T> {
    pub data: T,
}

impl<T> ApiResponse<T> {
    /// 新しい `ApiResponse` を作成する
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

impl<T> ApiResponse<Option<T>> {
    /// `{ "data": null }` を作成する
    pub fn none() -> Self {
        Self { data: None }
    }
}
