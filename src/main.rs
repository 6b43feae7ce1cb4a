use crate::api::*;
use crate::auth::{bearer_token, AuthGateway};
use crate::config::Settings;
use crate::db::DB;
use crate::engine::MarketEngine;
use anyhow::{Context, Result};
use axum::extract::{Json, Path, Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use axum_macros::debug_handler;
use chrono::Utc;
use clap::Parser;
use env_logger::{Builder, WriteStyle};
use log::{debug, error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

mod api;
mod auth;
#[cfg(test)]
mod client;
mod config;
mod db;
mod engine;

#[derive(Clone)]
struct AppState {
    engine: Arc<MarketEngine>,
    auth: Arc<AuthGateway>,
}

type HttpResult<T> = Result<T, (StatusCode, String)>;

fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
}
fn authenticate(state: &AppState, headers: &HeaderMap) -> HttpResult<UserId> {
    session_token(headers)
        .and_then(|token| state.auth.resolve_identity(token))
        .ok_or_else(|| map_err_and_code(MarketError::Unauthenticated))
}

#[debug_handler]
async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> HttpResult<Json<UserResponse>> {
    let user = state
        .auth
        .register(
            &request.username,
            &request.email,
            &request.password,
            &request.invite_code,
        )
        .map_err(map_err_and_code)?;
    Ok(Json((&user).into()))
}
async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> HttpResult<Json<LoginResponse>> {
    let (user, session_token) = state
        .auth
        .login(&request.email, &request.password)
        .map_err(map_err_and_code)?;
    Ok(Json(LoginResponse {
        user: (&user).into(),
        session_token,
    }))
}
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> HttpResult<()> {
    authenticate(&state, &headers)?;
    if let Some(token) = session_token(&headers) {
        state.auth.logout(token);
    }
    Ok(())
}
async fn me(State(state): State<AppState>, headers: HeaderMap) -> HttpResult<Json<UserResponse>> {
    let token = session_token(&headers).unwrap_or_default();
    let user = state.auth.current_user(token).map_err(map_err_and_code)?;
    Ok(Json((&user).into()))
}
async fn get_markets(State(state): State<AppState>) -> Json<Vec<Market>> {
    Json(state.engine.get_all_markets())
}
async fn get_market(
    State(state): State<AppState>,
    Path(market): Path<MarketId>,
) -> HttpResult<Json<Market>> {
    let market = state.engine.get_market(&market).map_err(map_err_and_code)?;
    Ok(Json(market))
}
#[debug_handler]
async fn create_market(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateMarketRequest>,
) -> HttpResult<(StatusCode, Json<Market>)> {
    let user = authenticate(&state, &headers)?;
    request.validate(Utc::now()).map_err(map_err_and_code)?;
    let market = state
        .engine
        .create_market(
            request.question,
            request.description,
            request.close_date,
            &user,
        )
        .map_err(map_err_and_code)?;
    Ok((StatusCode::CREATED, Json(market)))
}
#[debug_handler]
async fn resolve_market(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(market): Path<MarketId>,
    Json(request): Json<ResolveMarketRequest>,
) -> HttpResult<Json<Settlement>> {
    let user = authenticate(&state, &headers)?;
    let settlement = state
        .engine
        .resolve_market(&market, &request.resolution, &user)
        .map_err(map_err_and_code)?;
    Ok(Json(settlement))
}
async fn get_market_bets(
    State(state): State<AppState>,
    Path(market): Path<MarketId>,
) -> HttpResult<Json<Vec<Bet>>> {
    let bets = state
        .engine
        .get_market_bets(&market)
        .map_err(map_err_and_code)?;
    Ok(Json(bets))
}
async fn quote(
    State(state): State<AppState>,
    Path(market): Path<MarketId>,
    Query(request): Query<QuoteRequest>,
) -> HttpResult<Json<QuoteResponse>> {
    let quote = state
        .engine
        .quote(&market, &request.position, request.amount)
        .map_err(map_err_and_code)?;
    Ok(Json(quote))
}
#[debug_handler]
async fn place_bet(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<PlaceBetRequest>,
) -> HttpResult<(StatusCode, Json<Bet>)> {
    let user = authenticate(&state, &headers)?;
    let bet = state
        .engine
        .place_bet(&request.market_id, &request.position, request.amount, &user)
        .map_err(map_err_and_code)?;
    Ok((StatusCode::CREATED, Json(bet)))
}
async fn my_bets(State(state): State<AppState>, headers: HeaderMap) -> HttpResult<Json<Vec<Bet>>> {
    let user = authenticate(&state, &headers)?;
    Ok(Json(state.engine.get_user_bets(&user)))
}
async fn validate_invite_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Json<InviteValidationResponse> {
    Json(InviteValidationResponse {
        valid: state.auth.validate_invite_code(&code),
    })
}

#[derive(Parser)]
struct Args {
    /// TOML configuration file, defaults to poolbet.toml if present
    #[arg(short, long)]
    config: Option<String>,
    #[arg(short, long)]
    port: Option<u16>,
    #[arg(long)]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Args::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    if let Some(host) = cli.host {
        settings.server.host = host;
    }
    Builder::default()
        .filter_level(settings.log_level_filter()?)
        .write_style(WriteStyle::Always)
        .init();
    let (_port, handle) = run_server(settings).await?;
    handle.await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
        .route("/api/markets", get(get_markets).post(create_market))
        .route("/api/markets/:id", get(get_market))
        .route("/api/markets/:id/resolve", post(resolve_market))
        .route("/api/markets/:id/bets", get(get_market_bets))
        .route("/api/markets/:id/quote", get(quote))
        .route("/api/bets", post(place_bet))
        .route("/api/bets/my", get(my_bets))
        .route("/api/invite/validate/:code", get(validate_invite_code))
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(state)
}

/// Closes markets past their close date and drops stale sessions.
fn spawn_sweeper(state: AppState, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let now = Utc::now();
            let closed = state.engine.close_expired_markets(now);
            for market in closed {
                info!("Market {} reached its close date", market);
            }
            state.auth.purge_expired_sessions(now);
        }
    })
}

async fn run_server(settings: Settings) -> Result<(u16, JoinHandle<()>)> {
    let db = Arc::new(DB::new());
    let state = AppState {
        engine: Arc::new(MarketEngine::new(db.clone())),
        auth: Arc::new(AuthGateway::new(db, &settings)),
    };
    if settings.market.sweep_interval_secs > 0 {
        spawn_sweeper(
            state.clone(),
            Duration::from_secs(settings.market.sweep_interval_secs),
        );
    }

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}", settings.server.host))?;
    let server = axum::Server::try_bind(&addr)
        .with_context(|| format!("Error binding to {}", addr))?
        .serve(router(state).into_make_service());
    let port = server.local_addr().port();
    info!("Listening on {}", server.local_addr());
    let handle = tokio::spawn(async move {
        if let Err(e) = server.await {
            error!("Server stopped: {}", e);
        }
    });
    debug!("Default invite code is {}", settings.auth.default_invite_code);
    Ok((port, handle))
}
