use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use roster_api::middleware::{require_admin, require_auth};
use roster_api::{AppState, AppStateInner, login, users};
use roster_credential::CredentialManager;
use roster_notify::{Notifier, connection};
use roster_types::api::Claims;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roster=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("ROSTER_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("ROSTER_DB_PATH").unwrap_or_else(|_| "roster.db".into());
    let host = std::env::var("ROSTER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("ROSTER_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let credentials = match std::env::var("ROSTER_PBKDF2_ITERATIONS") {
        Ok(raw) => CredentialManager::with_iterations(raw.parse()?),
        Err(_) => CredentialManager::new(),
    };

    // Init database
    let db = roster_db::Database::open(&PathBuf::from(&db_path))?;

    // Shared state
    let notifier = Notifier::new();
    let app_state: AppState = Arc::new(AppStateInner {
        db,
        credentials,
        notifier,
        jwt_secret,
    });

    // Routes
    let public_routes = Router::new()
        .route("/login", post(login::login))
        .route("/ping", get(ping))
        .with_state(app_state.clone());

    // Reads are open to any authenticated user; mutations are admin-only.
    let user_routes = Router::new()
        .route(
            "/api/users",
            get(users::list_users).merge(
                post(users::create_user).route_layer(middleware::from_fn(require_admin)),
            ),
        )
        .route(
            "/api/users/{id}",
            get(users::get_user).merge(
                put(users::update_user)
                    .delete(users::delete_user)
                    .route_layer(middleware::from_fn(require_admin)),
            ),
        )
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ))
        .with_state(app_state.clone());

    let ws_routes = Router::new()
        .route("/api/notifications", get(notifications_upgrade))
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ))
        .with_state(app_state.clone());

    let app = Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .merge(ws_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Roster server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ping() -> impl IntoResponse {
    Json(serde_json::json!({ "ping": "pong" }))
}

async fn notifications_upgrade(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let notifier = state.notifier.clone();
    ws.on_upgrade(move |socket| connection::handle_socket(socket, notifier, claims))
}
