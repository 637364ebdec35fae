//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, compression, rate
//! limiting and all endpoint handlers.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use ecobot_core::config::EcobotConfig;
use ecobot_core::error::EcobotError;

use crate::handlers;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::state::AppState;

/// Browser origins allowed to call the API: the local server and the site
/// hosting the widget.
fn allowed_origins(config: &EcobotConfig) -> Vec<HeaderValue> {
    let port = config.server.port;
    let site = config.provider.site_url.trim().trim_end_matches('/').to_string();

    [
        format!("http://127.0.0.1:{}", port),
        format!("http://localhost:{}", port),
        site,
    ]
    .into_iter()
    .filter(|origin| !origin.is_empty())
    .filter_map(|origin| origin.parse::<HeaderValue>().ok())
    .collect()
}

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins(&state.config)))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let limiter = RateLimiter::new(state.config.server.requests_per_sec);

    let chat_routes = Router::new()
        .route("/chat/sessions", post(handlers::create_session))
        .route(
            "/chat/sessions/{id}",
            axum::routing::delete(handlers::delete_session),
        )
        .route(
            "/chat/sessions/{id}/messages",
            get(handlers::get_messages).post(handlers::send_message),
        )
        .route("/chat/sessions/{id}/reset", post(handlers::reset_session))
        .layer(axum::middleware::from_fn(rate_limit_middleware))
        .layer(axum::Extension(limiter));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(chat_routes)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on 127.0.0.1 and the configured port.
pub async fn start_server(state: AppState) -> Result<(), EcobotError> {
    let addr = format!("127.0.0.1:{}", state.config.server.port);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Starting API server on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_origins_include_widget_site() {
        let origins = allowed_origins(&EcobotConfig::default());
        assert_eq!(origins.len(), 3);
        assert_eq!(origins[0], "http://127.0.0.1:3030");
        assert_eq!(origins[2], "https://ecotravel-omega.vercel.app");
    }

    #[test]
    fn test_blank_site_url_is_skipped() {
        let mut config = EcobotConfig::default();
        config.provider.site_url = String::new();
        assert_eq!(allowed_origins(&config).len(), 2);
    }
}
