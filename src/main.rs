use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quizdeck::{api, auth, broadcast, state::AppState, storage, ws};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quizdeck=debug,tower_http=debug,axum=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting QuizDeck...");

    // Initialize authentication config
    let auth_config = Arc::new(auth::AuthConfig::from_env());

    // Initialize the image storage backend
    let storage_config = storage::StorageConfig::from_env();
    let store: Arc<dyn storage::ObjectStore> = match storage_config.build_store() {
        Ok(store) => {
            tracing::info!("Storage backend initialized: {}", store.name());
            store
        }
        Err(e) => {
            tracing::warn!(
                "Failed to initialize storage backend: {}. Falling back to local disk.",
                e
            );
            Arc::new(storage::DiskStore::new("uploads", "/uploads"))
        }
    };

    let state = Arc::new(AppState::new().with_storage(store));

    // Spawn background task that flags idle players
    broadcast::spawn_presence_sweeper(state.clone());

    // Admin question API (with HTTP Basic Auth)
    let admin_api = Router::new()
        .route(
            "/questions",
            get(api::list_questions).post(api::create_question),
        )
        .route(
            "/questions/{id}",
            get(api::get_question)
                .put(api::update_question)
                .delete(api::delete_question),
        )
        .route("/images", post(api::upload_image))
        .route("/uploads", get(api::list_uploads))
        .layer(middleware::from_fn_with_state(
            auth_config.clone(),
            auth::admin_auth_middleware,
        ));

    // Protected admin page (same credentials as the API)
    let admin_pages = Router::new()
        .route("/admin", get(auth::serve_admin))
        .layer(middleware::from_fn_with_state(
            auth_config.clone(),
            auth::admin_auth_middleware,
        ));

    // WebSocket route; host connections must present credentials
    let ws_routes = Router::new()
        .route("/ws", get(ws::ws_handler))
        .layer(middleware::from_fn_with_state(
            auth_config.clone(),
            auth::host_ws_auth_middleware,
        ));

    let app = Router::new()
        .merge(ws_routes)
        .merge(admin_pages)
        .nest("/api/admin", admin_api)
        .route("/play", get(auth::serve_player))
        .route("/beamer", get(auth::serve_beamer))
        .nest_service(
            "/uploads",
            ServeDir::new(storage_config.disk_root.clone()),
        )
        .fallback_service(ServeDir::new("static"))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let port = std::env::var("QUIZDECK_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
