use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Query, State, WebSocketUpgrade},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use parley_api::handlers::{self, ApiState};
use parley_api::middleware::require_auth;
use parley_api::AuthService;
use parley_gateway::{connection, CoordinatorState, Dispatcher, EventRouter};

#[derive(Clone)]
struct ServerState {
    auth: ApiState,
    router: EventRouter,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley=debug,tower_http=debug".into()),
        )
        .init();

    let jwt_secret =
        std::env::var("PARLEY_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let host = std::env::var("PARLEY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("PARLEY_PORT")
        .unwrap_or_else(|_| "6000".into())
        .parse()?;
    let env = std::env::var("PARLEY_ENV").unwrap_or_else(|_| "development".into());

    let auth: ApiState = Arc::new(AuthService::new(jwt_secret));
    if env == "development" {
        auth.seed_dev_account();
    }

    let router = EventRouter::new(CoordinatorState::new(), Dispatcher::new());
    let state = ServerState {
        auth: auth.clone(),
        router,
    };

    let public_routes = Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .with_state(auth.clone());

    let protected_routes = Router::new()
        .route("/auth/me", get(handlers::me))
        .layer(middleware::from_fn_with_state(auth.clone(), require_auth))
        .with_state(auth);

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("parley listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Debug, Deserialize)]
struct GatewayQuery {
    token: Option<String>,
}

/// Admission happens here, before the upgrade: a missing or bad token is
/// refused with 401 and never reaches the event router.
async fn ws_upgrade(
    State(state): State<ServerState>,
    Query(query): Query<GatewayQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(token) = query.token else {
        warn!("gateway admission refused: missing token");
        return StatusCode::UNAUTHORIZED.into_response();
    };

    match state.auth.verify_token(&token) {
        Ok(identity) => ws
            .on_upgrade(move |socket| connection::handle_connection(socket, state.router, identity))
            .into_response(),
        Err(e) => {
            warn!("gateway admission refused: {e}");
            StatusCode::UNAUTHORIZED.into_response()
        }
    }
}
