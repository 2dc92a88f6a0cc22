//! # Wingman BFF (Backend for Frontend) サーバー
//!
//! ブラウザ UI 専用の API サーバー。
//!
//! ## 役割
//!
//! BFF はブラウザと外部サービス（認証・データベースサービス、会話練習バックエンド）の
//! 間に位置し、以下の責務を担う:
//!
//! - **認証・セッション管理**: HTTPOnly Cookie によるセッション管理（トークンはサーバー側だけで保持）
//! - **セッション復元**: 外部サービスから戻ってきたときの URL パラメータによる再ログイン
//! - **ハンドオフ**: 本人確認済みの身元を iframe 経由でバックエンドへ渡す
//! - **中継**: ブラウザから直接呼べない外部サービスへのプロキシ
//!
//! ## アーキテクチャ
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────────┐
//! │   Browser    │────▶│     BFF      │────▶│  Auth / DB       │
//! │              │     │  port: 13000 │     │  (AUTH_URL)      │
//! └──────────────┘     └──────────────┘     └──────────────────┘
//!        │                    │   │
//!        │ iframe             │   └────────▶┌──────────────────┐
//!        └────────────────────┼────────────▶│  Backend         │
//!                             ▼             │  (BACKEND_URL)   │
//!                      ┌──────────────┐     └──────────────────┘
//!                      │    Redis     │
//!                      │  (Session)   │
//!                      └──────────────┘
//! ```
//!
//! ## 環境変数
//!
//! | 変数名 | 必須 | 説明 |
//! |--------|------|------|
//! | `BFF_HOST` | No | バインドアドレス（デフォルト: `0.0.0.0`） |
//! | `BFF_PORT` | No | ポート番号（デフォルト: `13000`） |
//! | `BACKEND_URL` | No | 外部バックエンドの URL（未設定ならハンドオフ・プロキシが 503） |
//! | `AUTH_URL` | No | 認証・データベースサービスの URL（未設定なら認証系が 503） |
//! | `AUTH_ANON_KEY` | No | 認証サービスの公開キー |
//! | `PUBLIC_URL` | No | OAuth サインイン後に戻る UI のオリジン |
//! | `REDIS_URL` | No | Redis 接続 URL（未設定ならインメモリ） |
//! | `HANDOFF_MODE` | No | `exchange`（デフォルト）または `query` |
//! | `ENV` | No | `production` で Cookie に Secure 属性を付与 |
//! | `LOG_FORMAT` | No | `json` または `pretty` |
//!
//! ## 起動方法
//!
//! ```bash
//! # 開発環境（.env ファイルを使用）
//! cargo run -p wingman-bff
//!
//! # 本番環境（環境変数を直接指定）
//! BFF_PORT=3000 REDIS_URL=redis://... cargo run -p wingman-bff --release
//! ```

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context as _;
use tokio::net::TcpListener;
use wingman_bff::{
    app_builder::{AppDependencies, build_app},
    config::BffConfig,
};
use wingman_domain::{
    clock::{Clock, SystemClock},
    persona::PersonaCatalog,
};
use wingman_infra::session_store::{InMemorySessionStore, RedisSessionStore, SessionStore};
use wingman_shared::{
    event_log::error,
    observability::{TracingConfig, init_tracing},
};

/// BFF サーバーのエントリーポイント
///
/// 以下の順序で初期化を行う:
///
/// 1. 環境変数の読み込み（.env ファイル）
/// 2. トレーシングの初期化
/// 3. アプリケーション設定の読み込み
/// 4. セッションストア・ペルソナカタログの初期化
/// 5. ルーターの構築
/// 6. HTTP サーバーの起動
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env ファイルを読み込む（存在する場合）
    // 本番環境では .env ファイルは使用せず、環境変数を直接設定する
    dotenvy::dotenv().ok();

    let tracing_config = TracingConfig::from_env("bff");
    init_tracing(tracing_config);
    let _tracing_guard = tracing::info_span!("app", service = "bff").entered();

    let config = BffConfig::from_env().context("設定の読み込みに失敗しました")?;

    tracing::info!("BFF サーバーを起動します: {}:{}", config.host, config.port);

    // 未設定の依存は起動を止めず、該当エンドポイントが 503 を返す
    for variable in config.missing_variables() {
        tracing::warn!(
            error.category = error::category::CONFIGURATION,
            error.kind = error::kind::MISSING_ENV,
            variable,
            "{} が未設定のため、依存するエンドポイントは 503 を返します",
            variable
        );
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let session_store: Arc<dyn SessionStore> = match config.redis_url.as_deref() {
        Some(redis_url) => Arc::new(
            RedisSessionStore::new(redis_url, clock.clone())
                .await
                .context("Redis への接続に失敗しました")?,
        ),
        None => {
            tracing::warn!("REDIS_URL が未設定のため、インメモリのセッションストアを使用します");
            Arc::new(InMemorySessionStore::new(clock.clone()))
        }
    };

    let persona_catalog =
        Arc::new(PersonaCatalog::bundled().context("ペルソナカタログの読み込みに失敗しました")?);

    let deps = AppDependencies::from_config(&config, session_store, clock, persona_catalog);
    let app = build_app(&config, deps);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("アドレスのパースに失敗しました")?;

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("BFF サーバーが起動しました: {}", addr);

    // Graceful shutdown は axum::serve が自動的に処理する
    axum::serve(listener, app).await?;

    Ok(())
}
