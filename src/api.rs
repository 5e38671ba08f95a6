use crate::{config::Config, db, error::Error, matches, messages, model, users};
use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub pool: Pool<SqliteConnectionManager>,
    pub config: Config,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self> {
        tokio::fs::create_dir_all(&config.data_dir).await?;
        let db_path = config.data_dir.join("matchmaker.db");
        // run migrations on a throwaway connection, then hand out pooled ones
        db::init_db(&db_path)?;
        let manager = SqliteConnectionManager::file(&db_path).with_init(|c| {
            c.busy_timeout(std::time::Duration::from_secs(5))?;
            c.execute_batch(db::PRAGMAS)
        });
        let pool = Pool::new(manager)?;
        Ok(Self { pool, config })
    }
}

/// Build the HTTP application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/users", post(create_user).get(list_users))
        .route("/api/likes", post(like))
        .route("/api/matches", get(list_matches))
        .route("/api/discover", get(discover))
        .route("/api/matches/:id/messages", post(send_message).get(get_messages))
        .route("/api/messages/:id/read", post(mark_read))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Deserialize)]
struct CreateUserReq {
    username: String,
    display_name: String,
}

async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserReq>,
) -> Result<impl IntoResponse, Error> {
    let conn = state.pool.get()?;
    let user = users::create_user(&conn, &req.username, &req.display_name)?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<model::User>>, Error> {
    let conn = state.pool.get()?;
    Ok(Json(users::list_users(&conn)?))
}

#[derive(Deserialize)]
struct LikeReq {
    actor: Uuid,
    target: Uuid,
}

#[derive(Serialize)]
struct LikeResp {
    matched: bool,
    match_id: Option<Uuid>,
}

async fn like(
    State(state): State<AppState>,
    Json(req): Json<LikeReq>,
) -> Result<Json<LikeResp>, Error> {
    let conn = state.pool.get()?;
    let out = matches::like_user(&conn, req.actor, req.target)?;
    Ok(Json(LikeResp {
        matched: out.matched,
        match_id: out.match_id,
    }))
}

#[derive(Deserialize)]
struct UserQuery {
    user: Uuid,
}

async fn list_matches(
    State(state): State<AppState>,
    Query(q): Query<UserQuery>,
) -> Result<Json<Vec<model::MatchSummary>>, Error> {
    let conn = state.pool.get()?;
    Ok(Json(matches::list_matches_for(&conn, q.user)?))
}

async fn discover(
    State(state): State<AppState>,
    Query(q): Query<UserQuery>,
) -> Result<Json<Vec<model::User>>, Error> {
    let conn = state.pool.get()?;
    Ok(Json(users::discover_candidates(&conn, q.user, 20)?))
}

#[derive(Deserialize)]
struct SendMessageReq {
    sender: Uuid,
    body: String,
}

async fn send_message(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
    Json(req): Json<SendMessageReq>,
) -> Result<impl IntoResponse, Error> {
    let conn = state.pool.get()?;
    let msg = messages::post_message(&conn, match_id, req.sender, &req.body)?;
    Ok((StatusCode::CREATED, Json(msg)))
}

#[derive(Deserialize)]
struct ListMessagesQuery {
    actor: Uuid,
    after_seq: Option<i64>,
    limit: Option<usize>,
}

async fn get_messages(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
    Query(q): Query<ListMessagesQuery>,
) -> Result<Json<Vec<model::Message>>, Error> {
    let conn = state.pool.get()?;
    Ok(Json(messages::list_messages(
        &conn,
        match_id,
        q.actor,
        q.after_seq,
        q.limit,
    )?))
}

#[derive(Deserialize)]
struct MarkReadReq {
    actor: Uuid,
}

async fn mark_read(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Json(req): Json<MarkReadReq>,
) -> Result<Json<model::Message>, Error> {
    let conn = state.pool.get()?;
    Ok(Json(messages::mark_read(&conn, message_id, req.actor)?))
}

/// Run the HTTP server with the provided configuration.
pub async fn run_http_server(config: Config) -> Result<()> {
    let bind = config.bind.clone();
    let state = AppState::new(config).await?;
    let addr: SocketAddr = bind.parse()?;
    tracing::info!(%addr, "listening");
    axum::Server::bind(&addr)
        .serve(build_router(state).into_make_service())
        .await?;
    Ok(())
}

// Integration tests live in tests/ directory
