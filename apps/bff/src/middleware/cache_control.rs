//! # キャッシュ制御ミドルウェア
//!
//! `/api/` 配下のレスポンスに `Cache-Control: no-store` を付与する。
//! セッション状態やプロフィールがブラウザや中間プロキシに残らないようにする。

use axum::{
    extract::Request,
    http::{HeaderValue, header},
    middleware::Next,
    response::Response,
};

pub async fn no_cache(request: Request, next: Next) -> Response {
    let is_api = request.uri().path().starts_with("/api/");
    let mut response = next.run(request).await;
    if is_api {
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    }
    response
}

#[cfg(test)]
mod tests {
    use axum::{Router, body::Body, middleware::from_fn, routing::get};
    use tower::ServiceExt;

    use super::*;

    fn app() -> Router {
        Router::new()
            .route("/api/v1/auth/session", get(|| async { "ok" }))
            .route("/health", get(|| async { "ok" }))
            .layer(from_fn(no_cache))
    }

    async fn cache_control(path: &str) -> Option<String> {
        let response = app()
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        response
            .headers()
            .get(header::CACHE_CONTROL)
            .map(|v| v.to_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn test_apiパスにはno_storeを付与する() {
        assert_eq!(
            cache_control("/api/v1/auth/session").await.as_deref(),
            Some("no-store")
        );
    }

    #[tokio::test]
    async fn test_api以外には付与しない() {
        assert_eq!(cache_control("/health").await, None);
    }
}
