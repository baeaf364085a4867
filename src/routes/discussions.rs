use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use rusqlite::{params, Connection};
use serde::Deserialize;
use serde_json::json;

use crate::auth::handlers::non_blank;
use crate::db::models::{Discussion, DiscussionComment};
use crate::db::{self, TIMESTAMP_FORMAT};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, JsonBody};
use crate::routes::spaces::{ensure_can_access, load_space};
use crate::state::AppState;

// --- Requests ---

#[derive(Deserialize)]
pub struct DiscussionRequest {
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Deserialize)]
pub struct DiscussionCommentRequest {
    pub content: Option<String>,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/spaces/{id}/discussions",
            get(list_discussions).post(create_discussion),
        )
        .route(
            "/discussions/{id}",
            get(get_discussion)
                .patch(update_discussion)
                .put(update_discussion)
                .delete(delete_discussion),
        )
        .route(
            "/discussions/{id}/comments",
            get(list_comments).post(create_comment),
        )
}

// --- Handlers ---

async fn create_discussion(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(space_id): Path<String>,
    JsonBody(req): JsonBody<DiscussionRequest>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let space = load_space(&conn, &space_id)?;

    let (Some(title), Some(content)) = (non_blank(req.title), non_blank(req.content)) else {
        return Err(AppError::BadRequest("Title and content are required".into()));
    };

    ensure_can_access(&conn, &space, &user.id)?;

    let discussion_id = db::new_id();
    conn.execute(
        "INSERT INTO discussions (id, user_id, space_id, title, content)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![discussion_id, user.id, space_id, title, content],
    )?;
    let discussion = load_discussion(&conn, &discussion_id)?;

    tracing::info!(
        "User {} started discussion {} in space {}",
        user.id,
        discussion_id,
        space_id
    );
    Ok((StatusCode::CREATED, Json(discussion)).into_response())
}

async fn list_discussions(
    State(state): State<AppState>,
    Path(space_id): Path<String>,
) -> AppResult<Json<Vec<Discussion>>> {
    let conn = state.db.get()?;
    load_space(&conn, &space_id)?;
    Ok(Json(Discussion::in_space(&conn, &space_id)?))
}

async fn get_discussion(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Discussion>> {
    let conn = state.db.get()?;
    load_discussion(&conn, &id).map(Json)
}

/// PATCH|PUT /discussions/{id} — author only
async fn update_discussion(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<DiscussionRequest>,
) -> AppResult<Json<Discussion>> {
    let conn = state.db.get()?;
    let discussion = load_discussion(&conn, &id)?;
    if discussion.user_id != user.id {
        return Err(AppError::Forbidden(
            "You can only edit your own discussions".into(),
        ));
    }

    let blank = |v: &Option<String>| v.as_ref().is_some_and(|s| s.trim().is_empty());
    if blank(&req.title) || blank(&req.content) {
        return Err(AppError::BadRequest("Title and content cannot be empty".into()));
    }

    conn.execute(
        "UPDATE discussions SET
            title = COALESCE(?1, title),
            content = COALESCE(?2, content),
            updated_at = ?3
         WHERE id = ?4",
        params![
            non_blank(req.title),
            non_blank(req.content),
            Utc::now().format(TIMESTAMP_FORMAT).to_string(),
            id
        ],
    )?;

    load_discussion(&conn, &id).map(Json)
}

/// DELETE /discussions/{id} — the author or the space creator
async fn delete_discussion(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let mut conn = state.db.get()?;
    let tx = db::write_transaction(&mut conn)?;

    let discussion = load_discussion(&tx, &id)?;
    if discussion.user_id != user.id {
        let space = load_space(&tx, &discussion.space_id)?;
        if space.creator_id != user.id {
            return Err(AppError::Forbidden(
                "You can only delete your own discussions".into(),
            ));
        }
    }

    tx.execute(
        "DELETE FROM discussion_comments WHERE discussion_id = ?1",
        params![id],
    )?;
    tx.execute("DELETE FROM discussions WHERE id = ?1", params![id])?;
    tx.commit()?;

    tracing::info!("User {} deleted discussion {}", user.id, id);
    Ok(Json(json!({ "message": "Discussion deleted successfully" })))
}

async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<DiscussionComment>>> {
    let conn = state.db.get()?;
    load_discussion(&conn, &id)?;
    Ok(Json(DiscussionComment::for_discussion(&conn, &id)?))
}

/// POST /discussions/{id}/comments — carries the discussion's title and space
async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<DiscussionCommentRequest>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let discussion = load_discussion(&conn, &id)?;

    let content = non_blank(req.content)
        .ok_or_else(|| AppError::BadRequest("Content is required".into()))?;

    let space = load_space(&conn, &discussion.space_id)?;
    ensure_can_access(&conn, &space, &user.id)?;

    let comment_id = db::new_id();
    conn.execute(
        "INSERT INTO discussion_comments (id, user_id, space_id, discussion_id, title, content)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            comment_id,
            user.id,
            discussion.space_id,
            discussion.id,
            discussion.title,
            content
        ],
    )?;

    let comment = DiscussionComment::find_by_id(&conn, &comment_id)?
        .ok_or_else(|| AppError::Internal("Comment not found after insert".into()))?;
    Ok((StatusCode::CREATED, Json(comment)).into_response())
}

fn load_discussion(conn: &Connection, id: &str) -> AppResult<Discussion> {
    Discussion::find_by_id(conn, id)?
        .ok_or_else(|| AppError::NotFound("Discussion not found".into()))
}
