//! # OpenAPI 仕様定義
//!
//! utoipa を使用して BFF の OpenAPI 仕様を Rust の型から自動生成する。
//! `ApiDoc::openapi()` で OpenAPI ドキュメントを取得できる。
//!
//! プロキシ（`/api/proxy/*`, `/api/auth-proxy/*`）は上流の API をそのまま中継するため含めない。

use utoipa::{
    Modify,
    OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::handler::{auth, handoff, health, persona, profile};

#[derive(OpenApi)]
#[openapi(
   info(
      title = "Wingman API",
      version = "0.1.0",
      description = "デート会話練習アプリ Wingman の BFF API"
   ),
   paths(
      // health
      health::health_check,
      health::readiness_check,
      // auth
      auth::signin,
      auth::callback,
      auth::login,
      auth::signup,
      auth::logout,
      auth::session,
      auth::restore,
      // handoff
      handoff::iframe,
      handoff::redeem,
      // personas
      persona::list_personas,
      persona::get_persona,
      // profile
      profile::get_profile,
      profile::update_profile,
   ),
   components(schemas(
      wingman_shared::ErrorResponse,
   )),
   tags(
      (name = "health", description = "ヘルスチェック"),
      (name = "auth", description = "認証・セッション"),
      (name = "handoff", description = "外部バックエンドへの身元の受け渡し"),
      (name = "personas", description = "ペルソナカタログ"),
      (name = "profile", description = "プロフィール"),
   ),
   modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// セキュリティスキーム定義
///
/// Cookie ベースのセッション認証を追加する。
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_default();
        components.add_security_scheme(
            "session_auth",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("session_id"))),
        );
    }
}
