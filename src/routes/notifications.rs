use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Notification categories, in the order they are listed when no filter is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Friends,
    Comments,
    Likes,
    Spaces,
    Occupation,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 5] = [
        NotificationKind::Friends,
        NotificationKind::Comments,
        NotificationKind::Likes,
        NotificationKind::Spaces,
        NotificationKind::Occupation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Friends => "friends",
            NotificationKind::Comments => "comments",
            NotificationKind::Likes => "likes",
            NotificationKind::Spaces => "spaces",
            NotificationKind::Occupation => "occupation",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| AppError::BadRequest("Invalid notification type".into()))
    }
}

/// Computed from live rows; nothing is stored.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Notification {
    fn new(kind: NotificationKind, message: String) -> Self {
        Self {
            kind,
            message,
            user_id: None,
            post_id: None,
            space_id: None,
            comment_id: None,
            created_at: None,
        }
    }
}

#[derive(Deserialize)]
pub struct NotificationQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/notifications/{user}", get(list_notifications))
}

/// GET /notifications/{userId}?type=friends|comments|likes|spaces|occupation
async fn list_notifications(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<NotificationQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let kinds = match query.kind.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
        Some(raw) => vec![raw.parse::<NotificationKind>()?],
        None => NotificationKind::ALL.to_vec(),
    };

    let conn = state.db.get()?;
    let user = User::find_by_id(&conn, &user_id)?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    let mut notifications = Vec::new();
    for kind in kinds {
        notifications.extend(collect(&conn, &user, kind)?);
    }

    Ok(Json(json!({ "notifications": notifications })))
}

pub fn collect(
    conn: &Connection,
    user: &User,
    kind: NotificationKind,
) -> rusqlite::Result<Vec<Notification>> {
    match kind {
        NotificationKind::Friends => friend_notifications(conn, &user.id),
        NotificationKind::Comments => comment_notifications(conn, &user.id),
        NotificationKind::Likes => like_notifications(conn, &user.id),
        NotificationKind::Spaces => space_notifications(conn, &user.id),
        NotificationKind::Occupation => occupation_notifications(conn, user),
    }
}

fn query_all<F>(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
    map: F,
) -> rusqlite::Result<Vec<Notification>>
where
    F: FnMut(&Row) -> rusqlite::Result<Notification>,
{
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, map)?;
    rows.collect()
}

fn friend_notifications(conn: &Connection, user_id: &str) -> rusqlite::Result<Vec<Notification>> {
    query_all(
        conn,
        "SELECT u.id, u.first_name, u.last_name, f.created_at
         FROM friendships f JOIN users u ON u.id = f.friend_id
         WHERE f.user_id = ?1
         ORDER BY f.created_at DESC, f.rowid DESC",
        params![user_id],
        |row| {
            let first: String = row.get(1)?;
            let last: String = row.get(2)?;
            let mut n = Notification::new(
                NotificationKind::Friends,
                format!("{} {} is your friend", first, last),
            );
            n.user_id = Some(row.get(0)?);
            n.created_at = Some(row.get(3)?);
            Ok(n)
        },
    )
}

fn comment_notifications(conn: &Connection, user_id: &str) -> rusqlite::Result<Vec<Notification>> {
    query_all(
        conn,
        "SELECT c.id, c.post_id, u.id, u.first_name, u.last_name, c.created_at
         FROM comments c
         JOIN posts p ON p.id = c.post_id
         JOIN users u ON u.id = c.user_id
         WHERE p.user_id = ?1 AND c.user_id != ?1
         ORDER BY c.created_at DESC, c.rowid DESC",
        params![user_id],
        |row| {
            let first: String = row.get(3)?;
            let last: String = row.get(4)?;
            let mut n = Notification::new(
                NotificationKind::Comments,
                format!("{} {} commented on your post", first, last),
            );
            n.comment_id = Some(row.get(0)?);
            n.post_id = Some(row.get(1)?);
            n.user_id = Some(row.get(2)?);
            n.created_at = Some(row.get(5)?);
            Ok(n)
        },
    )
}

fn like_notifications(conn: &Connection, user_id: &str) -> rusqlite::Result<Vec<Notification>> {
    query_all(
        conn,
        "SELECT l.post_id, u.id, u.first_name, u.last_name, l.created_at
         FROM post_likes l
         JOIN posts p ON p.id = l.post_id
         JOIN users u ON u.id = l.user_id
         WHERE p.user_id = ?1 AND l.user_id != ?1
         ORDER BY l.created_at DESC, l.rowid DESC",
        params![user_id],
        |row| {
            let first: String = row.get(2)?;
            let last: String = row.get(3)?;
            let mut n = Notification::new(
                NotificationKind::Likes,
                format!("{} {} liked your post", first, last),
            );
            n.post_id = Some(row.get(0)?);
            n.user_id = Some(row.get(1)?);
            n.created_at = Some(row.get(4)?);
            Ok(n)
        },
    )
}

fn space_notifications(conn: &Connection, user_id: &str) -> rusqlite::Result<Vec<Notification>> {
    query_all(
        conn,
        "SELECT id, title, created_at FROM spaces
         WHERE creator_id = ?1
         ORDER BY created_at DESC, rowid DESC",
        params![user_id],
        |row| {
            let title: String = row.get(1)?;
            let mut n = Notification::new(
                NotificationKind::Spaces,
                format!("You created the space \"{}\"", title),
            );
            n.space_id = Some(row.get(0)?);
            n.created_at = Some(row.get(2)?);
            Ok(n)
        },
    )
}

fn occupation_notifications(conn: &Connection, user: &User) -> rusqlite::Result<Vec<Notification>> {
    let Some(occupation) = user
        .occupation
        .as_deref()
        .map(str::trim)
        .filter(|o| !o.is_empty())
    else {
        return Ok(Vec::new());
    };

    query_all(
        conn,
        "SELECT id, first_name, last_name FROM users
         WHERE id != ?1 AND TRIM(occupation) = ?2 COLLATE NOCASE
         ORDER BY created_at ASC, rowid ASC",
        params![user.id, occupation],
        |row| {
            let first: String = row.get(1)?;
            let last: String = row.get(2)?;
            let mut n = Notification::new(
                NotificationKind::Occupation,
                format!("{} {} also works as {}", first, last, occupation),
            );
            n.user_id = Some(row.get(0)?);
            Ok(n)
        },
    )
}
