//! Republishing the item operations as an MCP endpoint.

pub mod filter;
pub mod server;

use std::sync::Arc;

use axum::{middleware, Router};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use tokio_util::sync::CancellationToken;

use crate::auth::{bearer_middleware, TokenStore};

pub use filter::OperationFilter;
pub use server::{ExposureOptions, ItemsMcpServer};

/// Serve `server` over streamable HTTP at `path` on top of `router`.
///
/// Every session gets a clone of `server`, so they share its tools and store.
/// With `auth` set, the endpoint requires a bearer token; the rest of
/// `router` is left open.
pub fn mount(
    router: Router,
    path: &str,
    server: ItemsMcpServer,
    auth: Option<Arc<TokenStore>>,
    cancel: CancellationToken,
) -> Router {
    let config = StreamableHttpServerConfig {
        cancellation_token: cancel,
        ..Default::default()
    };
    let name = server.name().to_string();
    let service = StreamableHttpService::new(
        move || Ok(server.clone()),
        Arc::new(LocalSessionManager::default()),
        config,
    );

    let mut endpoint = Router::new().route_service(path, service);
    if let Some(store) = auth {
        endpoint = endpoint.layer(middleware::from_fn_with_state(store, bearer_middleware));
    }
    tracing::info!(server = %name, path = %path, "MCP endpoint mounted");
    router.merge(endpoint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::ItemStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use tower::ServiceExt;

    fn items_server() -> ItemsMcpServer {
        ItemsMcpServer::new("items", ItemStore::seeded(), &ExposureOptions::default()).unwrap()
    }

    #[tokio::test]
    async fn test_auth_guards_only_the_mcp_path() {
        let base = Router::new().route("/health", get(|| async { "ok" }));
        let app = mount(
            base,
            "/mcp",
            items_server(),
            Some(Arc::new(TokenStore::default())),
            CancellationToken::new(),
        );

        let open = Request::builder().uri("/health").body(Body::empty()).unwrap();
        assert_eq!(app.clone().oneshot(open).await.unwrap().status(), StatusCode::OK);

        let guarded = Request::builder()
            .method("POST")
            .uri("/mcp")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            app.oneshot(guarded).await.unwrap().status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_unmounted_path_is_404() {
        let app = mount(
            Router::new(),
            "/mcp",
            items_server(),
            None,
            CancellationToken::new(),
        );
        let req = Request::builder().uri("/other").body(Body::empty()).unwrap();
        assert_eq!(app.oneshot(req).await.unwrap().status(), StatusCode::NOT_FOUND);
    }
}
