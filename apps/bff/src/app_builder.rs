//! # BFF アプリケーション構築
//!
//! DI（クライアント・State）の初期化とルーター構築を担当する。
//! `main.rs` はインフラ初期化とサーバー起動に集中する。

use std::sync::Arc;

use axum::{
    Router,
    middleware::from_fn,
    routing::{get, post},
};
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use wingman_domain::{clock::Clock, persona::PersonaCatalog};
use wingman_infra::session_store::SessionStore;
use wingman_shared::{
    canonical_log::CanonicalLogLineLayer,
    observability::{MakeRequestUuidV7, make_request_span},
};

use crate::{
    client::{
        AuthServiceClient,
        AuthServiceClientImpl,
        BackendClient,
        BackendClientImpl,
        ProfileStoreClient,
        ProfileStoreClientImpl,
        UnconfiguredAuthServiceClient,
        UnconfiguredBackendClient,
        UnconfiguredProfileStoreClient,
    },
    config::BffConfig,
    handler::{
        AuthState,
        HandoffState,
        PersonaState,
        ProfileState,
        ProxyState,
        ReadinessState,
        auth_proxy,
        backend_proxy,
        callback,
        get_persona,
        get_profile,
        health_check,
        iframe,
        list_personas,
        login,
        logout,
        readiness_check,
        redeem,
        restore,
        session,
        signin,
        signup,
        update_profile,
    },
    middleware::{no_cache, store_request_id},
    usecase::{HandoffService, SessionLoader, SessionRestorer},
};

/// 外部サービスとの境界にある依存一式
///
/// テストではスタブに差し替える。
pub struct AppDependencies {
    pub auth_client:     Arc<dyn AuthServiceClient>,
    pub profile_client:  Arc<dyn ProfileStoreClient>,
    pub backend_client:  Arc<dyn BackendClient>,
    pub session_store:   Arc<dyn SessionStore>,
    pub clock:           Arc<dyn Clock>,
    pub persona_catalog: Arc<PersonaCatalog>,
}

impl AppDependencies {
    /// 設定からクライアントを組み立てる
    ///
    /// URL やキーが未設定のクライアントは、呼ばれると not-configured を返す実装になる。
    pub fn from_config(
        config: &BffConfig,
        session_store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
        persona_catalog: Arc<PersonaCatalog>,
    ) -> Self {
        let (auth_client, profile_client): (Arc<dyn AuthServiceClient>, Arc<dyn ProfileStoreClient>) =
            match (config.auth_url.as_deref(), config.auth_anon_key.as_deref()) {
                (Some(url), Some(key)) => (
                    Arc::new(AuthServiceClientImpl::new(url, key, clock.clone())),
                    Arc::new(ProfileStoreClientImpl::new(url, key)),
                ),
                (None, _) => (
                    Arc::new(UnconfiguredAuthServiceClient::new("AUTH_URL")),
                    Arc::new(UnconfiguredProfileStoreClient::new("AUTH_URL")),
                ),
                (Some(_), None) => (
                    Arc::new(UnconfiguredAuthServiceClient::new("AUTH_ANON_KEY")),
                    Arc::new(UnconfiguredProfileStoreClient::new("AUTH_ANON_KEY")),
                ),
            };

        let backend_client: Arc<dyn BackendClient> = match config.backend_url.as_deref() {
            Some(url) => Arc::new(BackendClientImpl::new(url)),
            None => Arc::new(UnconfiguredBackendClient),
        };

        Self {
            auth_client,
            profile_client,
            backend_client,
            session_store,
            clock,
            persona_catalog,
        }
    }
}

/// DI コンテナの構築とルーター定義を行う
///
/// クライアント → ユースケース → State → Router の順に組み立てる。
pub fn build_app(config: &BffConfig, deps: AppDependencies) -> Router {
    let AppDependencies {
        auth_client,
        profile_client,
        backend_client,
        session_store,
        clock,
        persona_catalog,
    } = deps;

    // セッション読み込みは認証・プロフィール・ハンドオフで共有する
    let session_loader = Arc::new(SessionLoader::new(
        auth_client.clone(),
        session_store.clone(),
        clock.clone(),
    ));

    let readiness_state = Arc::new(ReadinessState {
        backend_client: backend_client.clone(),
        auth_client:    auth_client.clone(),
        session_store:  session_store.clone(),
    });

    let auth_state = Arc::new(AuthState {
        auth_client:    auth_client.clone(),
        session_store:  session_store.clone(),
        session_loader: session_loader.clone(),
        restorer:       SessionRestorer::new(auth_client, session_store.clone(), clock),
        public_url:     config.public_url.clone(),
        secure_cookies: config.secure_cookies,
    });

    let handoff_state = Arc::new(HandoffState {
        session_loader: session_loader.clone(),
        handoff:        HandoffService::new(
            backend_client,
            session_store,
            config.backend_url.clone(),
            config.handoff_mode,
        ),
    });

    let persona_state = Arc::new(PersonaState {
        catalog: persona_catalog,
    });

    let profile_state = Arc::new(ProfileState {
        session_loader,
        profile_client,
    });

    let proxy_state = Arc::new(ProxyState {
        http_client:   reqwest::Client::new(),
        backend_url:   config.backend_url.clone(),
        auth_url:      config.auth_url.clone(),
        auth_anon_key: config.auth_anon_key.clone(),
    });

    Router::new()
        .route("/health", get(health_check))
        .merge(
            Router::new()
                .route("/health/ready", get(readiness_check))
                .with_state(readiness_state),
        )
        // 認証 API
        .merge(
            Router::new()
                .route("/api/v1/auth/signin", get(signin))
                .route("/api/v1/auth/callback", get(callback))
                .route("/api/v1/auth/login", post(login))
                .route("/api/v1/auth/signup", post(signup))
                .route("/api/v1/auth/logout", post(logout))
                .route("/api/v1/auth/session", get(session))
                .route("/api/v1/auth/restore", get(restore))
                .with_state(auth_state),
        )
        // ハンドオフ API
        .merge(
            Router::new()
                .route("/api/v1/handoff/iframe", get(iframe))
                .route("/api/v1/handoff/redeem", post(redeem))
                .with_state(handoff_state),
        )
        // ペルソナ API
        .merge(
            Router::new()
                .route("/api/v1/personas", get(list_personas))
                .route("/api/v1/personas/{id}", get(get_persona))
                .with_state(persona_state),
        )
        // プロフィール API
        .merge(
            Router::new()
                .route("/api/v1/profile", get(get_profile).patch(update_profile))
                .with_state(profile_state),
        )
        // 外部サービスへの中継
        .merge(
            Router::new()
                .route(
                    "/api/proxy/{*path}",
                    get(backend_proxy).post(backend_proxy).options(backend_proxy),
                )
                .route(
                    "/api/auth-proxy/{*path}",
                    get(auth_proxy).post(auth_proxy).options(auth_proxy),
                )
                .with_state(proxy_state),
        )
        // キャッシュ制御: 動的 API レスポンスがブラウザにキャッシュされないようにする
        .layer(from_fn(no_cache))
        // Request ID レイヤー（レイヤー順序が重要: 下に書いたものが外側）
        // 1. SetRequestIdLayer（最外）: リクエスト受信時に UUID v7 を生成（またはクライアント提供値を使用）
        // 2. TraceLayer: カスタムスパンに request_id を含め、全ログに自動注入
        // 3. CanonicalLogLineLayer: リクエスト完了時に1行サマリログを出力（スパン内）
        // 4. PropagateRequestIdLayer: レスポンスヘッダーに X-Request-Id をコピー
        // 5. store_request_id: task-local に保存し、外部サービスへのヘッダー伝播に使用
        .layer(from_fn(store_request_id))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(CanonicalLogLineLayer)
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
}
