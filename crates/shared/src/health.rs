//! # ヘルスチェック共通型
//!
//! BFF の `/health`（Liveness）と `/health/ready`（Readiness）で使用するレスポンス型。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// ヘルスチェックレスポンス
///
/// ```
/// use wingman_shared::HealthResponse;
///
/// let response = HealthResponse {
///     status:  "healthy".to_string(),
///     version: "0.1.0".to_string(),
/// };
/// assert_eq!(response.status, "healthy");
/// ```
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthResponse {
    /// 稼働状態（`"healthy"` または `"unhealthy"`）
    pub status:  String,
    /// アプリケーションバージョン（Cargo.toml から取得）
    pub version: String,
}

/// 個別チェックの結果ステータス
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum CheckStatus {
    /// チェック成功
    Ok,
    /// チェック失敗
    Error,
    /// 依存先が未設定のためチェックしていない
    NotConfigured,
}

/// Readiness 全体のステータス
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum ReadinessStatus {
    Ready,
    NotReady,
}

/// Readiness Check レスポンス
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ReadinessResponse {
    /// 全体のステータス
    pub status: ReadinessStatus,
    /// 個別チェック結果（キー: チェック名、値: ステータス）
    pub checks: HashMap<String, CheckStatus>,
}

impl ReadinessResponse {
    /// 個別チェック結果から全体ステータスを決定する
    ///
    /// `Error` が 1 つでもあれば `NotReady`。`NotConfigured` は失敗扱いにしない
    /// （設定不足は各エンドポイントが 503 で明示する）。
    pub fn from_checks(checks: HashMap<String, CheckStatus>) -> Self {
        let status = if checks.values().any(|s| matches!(s, CheckStatus::Error)) {
            ReadinessStatus::NotReady
        } else {
            ReadinessStatus::Ready
        };
        Self { status, checks }
    }

    pub fn is_ready(&self) -> bool {
        self.status == ReadinessStatus::Ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checks(entries: &[(&str, CheckStatus)]) -> HashMap<String, CheckStatus> {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_health_responseのserializeで正しいjson形状にする() {
        let response = HealthResponse {
            status:  "healthy".to_string(),
            version: "0.1.0".to_string(),
        };
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "status": "healthy",
                "version": "0.1.0"
            })
        );
    }

    #[test]
    fn test_check_statusのserialize結果() {
        assert_eq!(serde_json::to_value(CheckStatus::Ok).unwrap(), "ok");
        assert_eq!(serde_json::to_value(CheckStatus::Error).unwrap(), "error");
        assert_eq!(
            serde_json::to_value(CheckStatus::NotConfigured).unwrap(),
            "not_configured"
        );
    }

    #[test]
    fn test_from_checks_全てokならready() {
        let response = ReadinessResponse::from_checks(checks(&[
            ("backend", CheckStatus::Ok),
            ("auth_service", CheckStatus::Ok),
        ]));

        assert!(response.is_ready());
    }

    #[test]
    fn test_from_checks_未設定はreadyを妨げない() {
        let response = ReadinessResponse::from_checks(checks(&[
            ("backend", CheckStatus::NotConfigured),
            ("session_store", CheckStatus::Ok),
        ]));

        assert!(response.is_ready());
    }

    #[test]
    fn test_from_checks_errorが1つでもあればnot_ready() {
        let response = ReadinessResponse::from_checks(checks(&[
            ("backend", CheckStatus::Error),
            ("session_store", CheckStatus::Ok),
        ]));

        assert_eq!(response.status, ReadinessStatus::NotReady);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "not_ready");
        assert_eq!(json["checks"]["backend"], "error");
    }
}
