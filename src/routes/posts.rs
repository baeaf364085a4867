use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection};
use serde::Deserialize;
use serde_json::json;

use crate::auth::handlers::non_blank;
use crate::db::models::{Comment, Post, User};
use crate::db::{self, TIMESTAMP_FORMAT};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, FormOrJson};
use crate::state::AppState;
use crate::uploads::{self, MultipartForm};

/// A user's reaction to a post. A user holds at most one of the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    Like,
    Dislike,
}

impl Reaction {
    fn table(self) -> &'static str {
        match self {
            Reaction::Like => "post_likes",
            Reaction::Dislike => "post_dislikes",
        }
    }

    fn opposite(self) -> Self {
        match self {
            Reaction::Like => Reaction::Dislike,
            Reaction::Dislike => Reaction::Like,
        }
    }

    fn already_message(self) -> &'static str {
        match self {
            Reaction::Like => "User already liked the post",
            Reaction::Dislike => "User already disliked the post",
        }
    }

    fn success_message(self) -> &'static str {
        match self {
            Reaction::Like => "Post liked successfully",
            Reaction::Dislike => "Post disliked successfully",
        }
    }
}

// --- Forms ---

#[derive(Deserialize)]
pub struct CommentForm {
    pub content: Option<String>,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route("/posts/{id}", delete(delete_post))
        .route("/delete/{id}", post(delete_post))
        .route("/posts/{id}/like", patch(like_post))
        .route("/posts/{id}/dislike", patch(dislike_post))
        .route("/posts/{id}/comment", post(create_comment))
        .route("/posts/{id}/comments", get(list_comments))
        .route("/users/{user}/posts", get(user_posts))
}

// --- Handlers ---

async fn list_posts(State(state): State<AppState>) -> AppResult<Json<Vec<Post>>> {
    let conn = state.db.get()?;
    Ok(Json(Post::list(&conn, None)?))
}

async fn user_posts(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<Post>>> {
    let conn = state.db.get()?;
    if User::find_by_id(&conn, &user_id)?.is_none() {
        return Err(AppError::NotFound("User not found".into()));
    }
    Ok(Json(Post::list(&conn, Some(&user_id))?))
}

/// POST /posts — multipart: description, picturePath, firstName, lastName, created_at
async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let mut form = MultipartForm::read(&mut multipart, "picturePath").await?;

    let content = form
        .text("description")
        .or_else(|| form.text("content"))
        .ok_or_else(|| AppError::BadRequest("Content is required".into()))?;

    let created_at = match form.text("created_at") {
        Some(raw) => parse_timestamp(&raw)
            .ok_or_else(|| AppError::BadRequest("Invalid created_at timestamp".into()))?,
        None => Utc::now().format(TIMESTAMP_FORMAT).to_string(),
    };

    let picture_path = match form.take_image() {
        Some((file_name, data)) => {
            Some(uploads::save_image(state.config.uploads_path(), &file_name, &data).await?)
        }
        None => None,
    };

    let post_id = db::new_id();
    let conn = state.db.get()?;
    conn.execute(
        "INSERT INTO posts (id, user_id, first_name, last_name, content, picture_path, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            post_id,
            user.id,
            form.text("firstName").unwrap_or(user.first_name),
            form.text("lastName").unwrap_or(user.last_name),
            content,
            picture_path,
            created_at
        ],
    )?;

    tracing::info!("User {} created post {}", user.id, post_id);
    Ok((StatusCode::CREATED, Json(Post::list(&conn, None)?)).into_response())
}

/// POST /delete/{id} and DELETE /posts/{id} — author only
async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<Post>>> {
    let mut conn = state.db.get()?;
    let tx = db::write_transaction(&mut conn)?;

    let owner_id = Post::owner_of(&tx, &id)?
        .ok_or_else(|| AppError::NotFound("Post not found".into()))?;
    if owner_id != user.id {
        return Err(AppError::Forbidden("You can only delete your own posts".into()));
    }

    // Association rows first; foreign keys forbid orphaning them
    tx.execute("DELETE FROM comments WHERE post_id = ?1", params![id])?;
    tx.execute("DELETE FROM post_likes WHERE post_id = ?1", params![id])?;
    tx.execute("DELETE FROM post_dislikes WHERE post_id = ?1", params![id])?;
    tx.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
    tx.commit()?;

    tracing::info!("User {} deleted post {}", user.id, id);
    Ok(Json(Post::list(&conn, None)?))
}

async fn like_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    react(&state, &user, &post_id, Reaction::Like)
}

async fn dislike_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    react(&state, &user, &post_id, Reaction::Dislike)
}

/// POST /posts/{id}/comment — form or JSON `content`
async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<String>,
    FormOrJson(form): FormOrJson<CommentForm>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    if !Post::exists(&conn, &post_id)? {
        return Err(AppError::NotFound("Post not found".into()));
    }

    let content = non_blank(form.content)
        .ok_or_else(|| AppError::BadRequest("Content is required".into()))?;

    let comment_id = db::new_id();
    conn.execute(
        "INSERT INTO comments (id, post_id, user_id, content) VALUES (?1, ?2, ?3, ?4)",
        params![comment_id, post_id, user.id, content],
    )?;

    let comment = Comment::find_by_id(&conn, &comment_id)?
        .ok_or_else(|| AppError::Internal("Comment not found after insert".into()))?;

    tracing::info!("User {} commented on post {}", user.id, post_id);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Comment posted successfully", "comment": comment })),
    )
        .into_response())
}

async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<Json<Vec<Comment>>> {
    let conn = state.db.get()?;
    if !Post::exists(&conn, &post_id)? {
        return Err(AppError::NotFound("Post not found".into()));
    }
    Ok(Json(Comment::for_post(&conn, &post_id)?))
}

// --- Query helpers ---

/// Records `reaction` and clears the opposite one in a single transaction.
fn react(
    state: &AppState,
    user: &CurrentUser,
    post_id: &str,
    reaction: Reaction,
) -> AppResult<Json<serde_json::Value>> {
    let mut conn = state.db.get()?;
    let tx = db::write_transaction(&mut conn)?;

    if !Post::exists(&tx, post_id)? {
        return Err(AppError::NotFound("Post not found".into()));
    }

    if has_reaction(&tx, reaction, &user.id, post_id)? {
        return Err(AppError::BadRequest(reaction.already_message().into()));
    }

    tx.execute(
        &format!(
            "DELETE FROM {} WHERE user_id = ?1 AND post_id = ?2",
            reaction.opposite().table()
        ),
        params![user.id, post_id],
    )?;
    tx.execute(
        &format!(
            "INSERT INTO {} (user_id, post_id) VALUES (?1, ?2)",
            reaction.table()
        ),
        params![user.id, post_id],
    )?;

    let likes = reaction_count(&tx, Reaction::Like, post_id)?;
    let dislikes = reaction_count(&tx, Reaction::Dislike, post_id)?;
    tx.commit()?;

    tracing::debug!("User {} {:?}d post {}", user.id, reaction, post_id);
    Ok(Json(json!({
        "message": reaction.success_message(),
        "likes": likes,
        "dislikes": dislikes,
    })))
}

fn has_reaction(
    conn: &Connection,
    reaction: Reaction,
    user_id: &str,
    post_id: &str,
) -> rusqlite::Result<bool> {
    conn.query_row(
        &format!(
            "SELECT COUNT(*) > 0 FROM {} WHERE user_id = ?1 AND post_id = ?2",
            reaction.table()
        ),
        params![user_id, post_id],
        |r| r.get(0),
    )
}

fn reaction_count(conn: &Connection, reaction: Reaction, post_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        &format!("SELECT COUNT(*) FROM {} WHERE post_id = ?1", reaction.table()),
        params![post_id],
        |r| r.get(0),
    )
}

/// Normalizes a client timestamp (RFC 3339 or `YYYY-MM-DD HH:MM:SS`) to UTC
/// in the storage format.
pub fn parse_timestamp(raw: &str) -> Option<String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).format(TIMESTAMP_FORMAT).to_string());
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
}

// --- Tests ---
