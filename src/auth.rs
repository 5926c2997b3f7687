//! HTTP Basic Authentication for the admin panel and host connections

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, Response, StatusCode},
    middleware::Next,
    response::IntoResponse,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::Arc;

/// Authentication configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Username for the admin panel (None = auth disabled)
    pub username: Option<String>,
    /// Password for the admin panel
    pub password: Option<String>,
}

impl AuthConfig {
    /// Load auth config from environment variables.
    /// QUIZDECK_ADMIN_USERNAME and QUIZDECK_ADMIN_PASSWORD must both be set
    /// to enable auth.
    pub fn from_env() -> Self {
        let username = std::env::var("QUIZDECK_ADMIN_USERNAME")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let password = std::env::var("QUIZDECK_ADMIN_PASSWORD")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        // Both must be set to enable auth
        if username.is_some() && password.is_some() {
            tracing::info!("Admin authentication enabled");
            Self { username, password }
        } else {
            if username.is_some() || password.is_some() {
                tracing::warn!(
                    "QUIZDECK_ADMIN_USERNAME and QUIZDECK_ADMIN_PASSWORD must both be set to enable authentication"
                );
            }
            tracing::warn!("Admin credentials not set; the admin surface is disabled");
            Self {
                username: None,
                password: None,
            }
        }
    }

    /// Check if authentication is enabled
    pub fn is_enabled(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    /// Validate credentials
    pub fn validate(&self, username: &str, password: &str) -> bool {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => {
                // Constant-time comparison to prevent timing attacks
                constant_time_eq(u.as_bytes(), username.as_bytes())
                    && constant_time_eq(p.as_bytes(), password.as_bytes())
            }
            // No credentials configured, so nothing validates.
            _ => false,
        }
    }
}

/// Constant-time byte comparison to prevent timing attacks
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Whether the request carries Basic credentials the config accepts.
fn authorized(auth_config: &AuthConfig, request: &Request<Body>) -> bool {
    let Some(auth_header) = request.headers().get(header::AUTHORIZATION) else {
        return false;
    };
    let Ok(auth_str) = auth_header.to_str() else {
        return false;
    };
    let Some(credentials) = auth_str.strip_prefix("Basic ") else {
        return false;
    };
    let Ok(decoded) = STANDARD.decode(credentials) else {
        return false;
    };
    let Ok(decoded_str) = String::from_utf8(decoded) else {
        return false;
    };
    let Some((username, password)) = decoded_str.split_once(':') else {
        return false;
    };
    auth_config.validate(username, password)
}

fn unauthorized(realm: &str) -> Response<Body> {
    Response::builder()
        .status(StatusCode::UNAUTHORIZED)
        .header(
            header::WWW_AUTHENTICATE,
            format!("Basic realm=\"{}\"", realm),
        )
        .body(Body::from("Unauthorized"))
        .unwrap()
}

/// Middleware for HTTP Basic Authentication on admin routes.
///
/// Unset credentials close the admin surface entirely.
pub async fn admin_auth_middleware(
    State(auth_config): State<Arc<AuthConfig>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    if !auth_config.is_enabled() {
        return admin_disabled();
    }

    if authorized(&auth_config, &request) {
        return next.run(request).await;
    }
    unauthorized("QuizDeck Admin")
}

fn admin_disabled() -> Response<Body> {
    Response::builder()
        .status(StatusCode::SERVICE_UNAVAILABLE)
        .body(Body::from(
            "Admin surface disabled; set QUIZDECK_ADMIN_USERNAME and QUIZDECK_ADMIN_PASSWORD",
        ))
        .unwrap()
}

fn query_param_equals(request: &Request<Body>, key: &str, expected: &str) -> bool {
    let Some(query) = request.uri().query() else {
        return false;
    };
    for pair in query.split('&') {
        let Some((k, v)) = pair.split_once('=') else {
            continue;
        };
        if k == key && v == expected {
            return true;
        }
    }
    false
}

/// Middleware to require HTTP Basic Auth for host WebSocket connections.
///
/// This prevents clients from taking over a game by connecting to
/// `/ws?role=host`.
pub async fn host_ws_auth_middleware(
    State(auth_config): State<Arc<AuthConfig>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let is_host_ws = request.uri().path() == "/ws" && query_param_equals(&request, "role", "host");

    if !is_host_ws {
        return next.run(request).await;
    }

    // If admin auth is disabled, keep dev behavior (allow) but log loudly.
    if !auth_config.is_enabled() {
        tracing::warn!(
            "Host WebSocket requested but authentication is DISABLED; set QUIZDECK_ADMIN_USERNAME and QUIZDECK_ADMIN_PASSWORD to prevent host takeover"
        );
        return next.run(request).await;
    }

    if authorized(&auth_config, &request) {
        return next.run(request).await;
    }
    unauthorized("QuizDeck Host (WebSocket)")
}

/// Handler to serve admin.html (used with auth middleware)
pub async fn serve_admin() -> impl IntoResponse {
    serve_page("static/admin.html", "Admin page not found").await
}

/// Handler to serve beamer.html
pub async fn serve_beamer() -> impl IntoResponse {
    serve_page("static/beamer.html", "Beamer page not found").await
}

/// Handler to serve player.html
pub async fn serve_player() -> impl IntoResponse {
    serve_page("static/player.html", "Player page not found").await
}

async fn serve_page(path: &str, missing: &'static str) -> Response<Body> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
            .body(Body::from(content))
            .unwrap(),
        Err(_) => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::from(missing))
            .unwrap(),
    }
}
