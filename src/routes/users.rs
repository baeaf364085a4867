use axum::extract::{Multipart, Path, State};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use rusqlite::{params, Connection};
use serde::Deserialize;

use crate::auth::handlers::{non_blank, validate_new_password};
use crate::auth::password::{self, PasswordPolicy};
use crate::db::is_constraint_violation;
use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, JsonBody};
use crate::state::AppState;
use crate::uploads::{self, MultipartForm};

// --- Forms ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub occupation: Option<String>,
    pub location: Option<String>,
    pub current_password: Option<String>,
    pub new_password: Option<String>,
    pub confirm_password: Option<String>,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/{user}", get(user_by_email))
        .route("/users/{user}/friends", get(list_friends))
        .route(
            "/users/{user}/{friend}",
            patch(add_friend).delete(remove_friend),
        )
        .route("/additional-details", post(additional_details))
        .route(
            "/update-settings",
            patch(update_settings).put(update_settings),
        )
}

// --- Handlers ---

/// GET /users/{email}
async fn user_by_email(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> AppResult<Json<User>> {
    let conn = state.db.get()?;
    User::find_by_email(&conn, email.trim())?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

async fn list_friends(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<User>>> {
    let conn = state.db.get()?;
    if User::find_by_id(&conn, &user_id)?.is_none() {
        return Err(AppError::NotFound("User not found".into()));
    }
    Ok(Json(User::friends_of(&conn, &user_id)?))
}

/// PATCH /users/{user}/{friend} — adds the one-way edge user -> friend
async fn add_friend(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((user_id, friend_id)): Path<(String, String)>,
) -> AppResult<Json<Vec<User>>> {
    ensure_own_friends(&user, &user_id)?;
    if user_id == friend_id {
        return Err(AppError::BadRequest("Cannot add yourself as a friend".into()));
    }

    let conn = state.db.get()?;
    ensure_both_exist(&conn, &user_id, &friend_id)?;

    let added = conn.execute(
        "INSERT OR IGNORE INTO friendships (user_id, friend_id) VALUES (?1, ?2)",
        params![user_id, friend_id],
    )?;
    if added > 0 {
        tracing::info!("User {} added friend {}", user_id, friend_id);
    }

    Ok(Json(User::friends_of(&conn, &user_id)?))
}

/// DELETE /users/{user}/{friend} — removes the one-way edge user -> friend
async fn remove_friend(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((user_id, friend_id)): Path<(String, String)>,
) -> AppResult<Json<Vec<User>>> {
    ensure_own_friends(&user, &user_id)?;
    let conn = state.db.get()?;
    ensure_both_exist(&conn, &user_id, &friend_id)?;

    let removed = conn.execute(
        "DELETE FROM friendships WHERE user_id = ?1 AND friend_id = ?2",
        params![user_id, friend_id],
    )?;
    if removed > 0 {
        tracing::info!("User {} removed friend {}", user_id, friend_id);
    }

    Ok(Json(User::friends_of(&conn, &user_id)?))
}

/// POST /additional-details — multipart profile completion
async fn additional_details(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> AppResult<Json<User>> {
    let mut form = MultipartForm::read(&mut multipart, "picturePath").await?;

    let picture_path = match form.take_image() {
        Some((file_name, data)) => {
            Some(uploads::save_image(state.config.uploads_path(), &file_name, &data).await?)
        }
        None => None,
    };

    let conn = state.db.get()?;
    conn.execute(
        "UPDATE users SET
            occupation = COALESCE(?1, occupation),
            location = COALESCE(?2, location),
            picture_path = COALESCE(?3, picture_path)
         WHERE id = ?4",
        params![
            form.text("occupation"),
            form.text("location"),
            picture_path,
            user.id
        ],
    )?;

    tracing::info!("Updated profile details for user {}", user.id);
    load_user(&conn, &user.id).map(Json)
}

/// PATCH|PUT /update-settings — profile fields and optional password change
async fn update_settings(
    State(state): State<AppState>,
    user: CurrentUser,
    JsonBody(req): JsonBody<SettingsRequest>,
) -> AppResult<Json<User>> {
    let blank_name = |v: &Option<String>| v.as_ref().is_some_and(|s| s.trim().is_empty());
    if blank_name(&req.first_name) || blank_name(&req.last_name) {
        return Err(AppError::BadRequest(
            "First name and last name are required".into(),
        ));
    }

    let email = match req.email.as_deref().map(str::trim) {
        Some(email) if !password::is_valid_email(email) => {
            return Err(AppError::BadRequest("Please insert a valid email".into()));
        }
        Some(email) => Some(email.to_string()),
        None => None,
    };

    if let Some(ref email) = email {
        let conn = state.db.get()?;
        if User::find_by_email(&conn, email)?.is_some_and(|other| other.id != user.id) {
            return Err(AppError::Conflict("Email is already in use".into()));
        }
    }

    let new_hash = match req.new_password.filter(|p| !p.is_empty()) {
        Some(new_password) => {
            let stored = {
                let conn = state.db.get()?;
                load_user(&conn, &user.id)?.password_hash
            };
            let current = req.current_password.unwrap_or_default();
            if !password::verify_in_background(current, stored).await? {
                tracing::warn!("Password change rejected for user {}", user.id);
                return Err(AppError::Unauthorized);
            }

            let policy = PasswordPolicy::from(&state.config.auth);
            validate_new_password(&policy, &new_password, req.confirm_password.as_deref())?;
            Some(password::hash_in_background(new_password, state.config.auth.bcrypt_cost).await?)
        }
        None => None,
    };

    let conn = state.db.get()?;
    conn.execute(
        "UPDATE users SET
            first_name = COALESCE(?1, first_name),
            last_name = COALESCE(?2, last_name),
            email = COALESCE(?3, email),
            occupation = COALESCE(?4, occupation),
            location = COALESCE(?5, location),
            password_hash = COALESCE(?6, password_hash)
         WHERE id = ?7",
        params![
            non_blank(req.first_name),
            non_blank(req.last_name),
            email,
            non_blank(req.occupation),
            non_blank(req.location),
            new_hash,
            user.id
        ],
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            AppError::Conflict("Email is already in use".into())
        } else {
            AppError::from(e)
        }
    })?;

    tracing::info!("Updated settings for user {}", user.id);
    load_user(&conn, &user.id).map(Json)
}

// --- Query helpers ---

fn load_user(conn: &Connection, id: &str) -> AppResult<User> {
    User::find_by_id(conn, id)?.ok_or_else(|| AppError::NotFound("User not found".into()))
}

fn ensure_own_friends(user: &CurrentUser, user_id: &str) -> AppResult<()> {
    if user.id != user_id {
        return Err(AppError::Forbidden(
            "You can only change your own friends".into(),
        ));
    }
    Ok(())
}

fn ensure_both_exist(conn: &Connection, user_id: &str, friend_id: &str) -> AppResult<()> {
    if User::find_by_id(conn, user_id)?.is_none() || User::find_by_id(conn, friend_id)?.is_none() {
        return Err(AppError::NotFound("User or friend not found".into()));
    }
    Ok(())
}
