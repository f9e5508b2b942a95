//! Bearer-token gate for mounted MCP endpoints.
//!
//! With no configured tokens any `Bearer` credential is accepted, so the gate
//! only enforces that the caller passes a token through. With tokens
//! configured the credential must also be one of them.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};

/// Accepted bearer tokens.
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    valid_tokens: Vec<String>,
}

impl TokenStore {
    pub fn new(tokens: Vec<String>) -> Self {
        Self {
            valid_tokens: tokens,
        }
    }

    /// Build from the comma-separated `CASCADE_AUTH_TOKENS` variable.
    /// Unset or blank means "any bearer token".
    pub fn from_env() -> Self {
        let tokens = std::env::var("CASCADE_AUTH_TOKENS")
            .map(|s| {
                s.split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        Self::new(tokens)
    }

    pub fn is_valid(&self, token: &str) -> bool {
        if token.is_empty() {
            return false;
        }
        self.valid_tokens.is_empty() || self.valid_tokens.iter().any(|t| t == token)
    }
}

/// Extract the credential from an `Authorization: Bearer <token>` header.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer ").map(String::from))
}

/// Reject requests without an acceptable bearer token.
pub async fn bearer_middleware(
    State(token_store): State<Arc<TokenStore>>,
    headers: HeaderMap,
    request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    match extract_bearer_token(&headers) {
        Some(token) if token_store.is_valid(&token) => Ok(next.run(request).await),
        _ => {
            tracing::debug!(path = %request.uri().path(), "rejecting request without valid bearer token");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// `GET /private`: echoes the presented credential back to an authorized caller.
pub fn private_router(token_store: Arc<TokenStore>) -> Router {
    Router::new()
        .route("/private", get(private))
        .layer(axum::middleware::from_fn_with_state(
            token_store,
            bearer_middleware,
        ))
}

async fn private(headers: HeaderMap) -> Result<Json<String>, StatusCode> {
    extract_bearer_token(&headers)
        .map(Json)
        .ok_or(StatusCode::UNAUTHORIZED)
}
