use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::handlers::non_blank;
use crate::db;
use crate::db::models::{Space, User};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, JsonBody};
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSpaceRequest {
    pub title: Option<String>,
    pub is_public: Option<bool>,
}

/// Creation response; `space_id` duplicates `id` for older clients.
#[derive(Serialize)]
struct CreatedSpace {
    #[serde(flatten)]
    space: Space,
    space_id: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/spaces", get(list_spaces).post(create_space))
        .route("/spaces/{id}", get(get_space).delete(delete_space))
        .route(
            "/spaces/{id}/members",
            post(join_space).delete(leave_space).get(list_members),
        )
        .route("/users/{user}/spaces", get(user_spaces))
}

/// POST /spaces — the creator becomes the first member
async fn create_space(
    State(state): State<AppState>,
    user: CurrentUser,
    JsonBody(req): JsonBody<CreateSpaceRequest>,
) -> AppResult<Response> {
    let title = non_blank(req.title)
        .ok_or_else(|| AppError::BadRequest("Title is required".into()))?;
    let is_public = req.is_public.unwrap_or(true);

    let space_id = db::new_id();
    let mut conn = state.db.get()?;
    let tx = db::write_transaction(&mut conn)?;
    tx.execute(
        "INSERT INTO spaces (id, title, is_public, creator_id) VALUES (?1, ?2, ?3, ?4)",
        params![space_id, title, is_public, user.id],
    )?;
    tx.execute(
        "INSERT INTO space_memberships (user_id, space_id) VALUES (?1, ?2)",
        params![user.id, space_id],
    )?;
    let space = load_space(&tx, &space_id)?;
    tx.commit()?;

    tracing::info!("User {} created space {} ({})", user.id, space.id, space.title);
    Ok((
        StatusCode::CREATED,
        Json(CreatedSpace {
            space_id: space.id.clone(),
            space,
        }),
    )
        .into_response())
}

async fn list_spaces(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    Ok(Json(json!({ "spaces": Space::list(&conn)? })))
}

async fn get_space(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Space>> {
    let conn = state.db.get()?;
    load_space(&conn, &id).map(Json)
}

/// DELETE /spaces/{id} — creator only; takes discussions and members with it
async fn delete_space(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let mut conn = state.db.get()?;
    let tx = db::write_transaction(&mut conn)?;

    let space = load_space(&tx, &id)?;
    if space.creator_id != user.id {
        return Err(AppError::Forbidden(
            "Only the creator can delete this space".into(),
        ));
    }

    tx.execute("DELETE FROM discussion_comments WHERE space_id = ?1", params![id])?;
    tx.execute("DELETE FROM discussions WHERE space_id = ?1", params![id])?;
    tx.execute("DELETE FROM space_memberships WHERE space_id = ?1", params![id])?;
    tx.execute("DELETE FROM spaces WHERE id = ?1", params![id])?;
    tx.commit()?;

    tracing::info!("User {} deleted space {}", user.id, id);
    Ok(Json(json!({ "message": "Space deleted successfully" })))
}

async fn join_space(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<User>>> {
    let conn = state.db.get()?;
    let space = load_space(&conn, &id)?;
    if !space.is_public && space.creator_id != user.id {
        return Err(AppError::Forbidden("This space is private".into()));
    }

    let joined = conn.execute(
        "INSERT OR IGNORE INTO space_memberships (user_id, space_id) VALUES (?1, ?2)",
        params![user.id, id],
    )?;
    if joined > 0 {
        tracing::info!("User {} joined space {}", user.id, id);
    }

    Ok(Json(User::members_of(&conn, &id)?))
}

async fn leave_space(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<User>>> {
    let conn = state.db.get()?;
    let space = load_space(&conn, &id)?;
    if space.creator_id == user.id {
        return Err(AppError::BadRequest(
            "The creator cannot leave their own space".into(),
        ));
    }

    conn.execute(
        "DELETE FROM space_memberships WHERE user_id = ?1 AND space_id = ?2",
        params![user.id, id],
    )?;

    Ok(Json(User::members_of(&conn, &id)?))
}

async fn list_members(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<User>>> {
    let conn = state.db.get()?;
    load_space(&conn, &id)?;
    Ok(Json(User::members_of(&conn, &id)?))
}

async fn user_spaces(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    if User::find_by_id(&conn, &user_id)?.is_none() {
        return Err(AppError::NotFound("User not found".into()));
    }
    Ok(Json(json!({ "spaces": Space::joined_by(&conn, &user_id)? })))
}

pub(crate) fn load_space(conn: &Connection, id: &str) -> AppResult<Space> {
    Space::find_by_id(conn, id)?.ok_or_else(|| AppError::NotFound("Space not found".into()))
}

/// Private spaces are only readable and writable by their members.
pub(crate) fn ensure_can_access(conn: &Connection, space: &Space, user_id: &str) -> AppResult<()> {
    if space.is_public || Space::is_member(conn, &space.id, user_id)? {
        return Ok(());
    }
    Err(AppError::Forbidden(
        "You must be a member of this space".into(),
    ))
}
