use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::password::{self, PasswordPolicy};
use crate::auth::session;
use crate::db::models::User;
use crate::db::{self, is_constraint_violation};
use crate::error::{AppError, AppResult};
use crate::extractors::{session_token, CurrentUser, JsonBody};
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
    pub occupation: Option<String>,
    pub location: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub user: User,
    pub friends: Vec<User>,
}

/// Trimmed, non-blank value.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Checks a new password against the policy and its confirmation.
pub(crate) fn validate_new_password(
    policy: &PasswordPolicy,
    password: &str,
    confirmation: Option<&str>,
) -> AppResult<()> {
    policy
        .check(password)
        .map_err(|rule| AppError::BadRequest(rule.message().to_string()))?;

    if confirmation != Some(password) {
        return Err(AppError::BadRequest("Passwords do not match".into()));
    }
    Ok(())
}

fn with_session_cookie(
    state: &AppState,
    status: StatusCode,
    token: &str,
    body: impl Serialize,
) -> Response {
    let cookie = session::session_cookie(
        &state.config.auth.cookie_name,
        token,
        state.config.auth.session_hours,
    );
    (status, [(header::SET_COOKIE, cookie)], Json(body)).into_response()
}

// -- Handlers --

/// POST /register — create an account and start a session
pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> AppResult<Response> {
    let names = (non_blank(req.first_name), non_blank(req.last_name));
    let (Some(first_name), Some(last_name)) = names else {
        return Err(AppError::BadRequest(
            "First name and last name are required".into(),
        ));
    };

    let email = non_blank(req.email)
        .filter(|e| password::is_valid_email(e))
        .ok_or_else(|| AppError::BadRequest("Please insert a valid email".into()))?;

    let password = req
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::BadRequest("Please enter your password".into()))?;

    let policy = PasswordPolicy::from(&state.config.auth);
    validate_new_password(&policy, &password, req.confirm_password.as_deref())?;

    {
        let conn = state.db.get()?;
        if User::find_by_email(&conn, &email)?.is_some() {
            tracing::debug!("Registration rejected, email taken: {}", email);
            return Err(AppError::Conflict("User already exists".into()));
        }
    }

    let password_hash =
        password::hash_in_background(password, state.config.auth.bcrypt_cost).await?;

    let user_id = db::new_id();
    let (user, token) = {
        let mut conn = state.db.get()?;
        let tx = db::write_transaction(&mut conn)?;

        tx.execute(
            "INSERT INTO users
                (id, first_name, last_name, email, password_hash, occupation, location)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user_id,
                first_name,
                last_name,
                email,
                password_hash,
                non_blank(req.occupation),
                non_blank(req.location)
            ],
        )
        .map_err(|e| {
            // Lost a race with a concurrent registration for the same email
            if is_constraint_violation(&e) {
                AppError::Conflict("User already exists".into())
            } else {
                AppError::from(e)
            }
        })?;

        let token = session::create_session(&tx, &user_id, state.config.auth.session_hours)?;
        let user = User::find_by_id(&tx, &user_id)?
            .ok_or_else(|| AppError::Internal("Registered user not found".into()))?;
        tx.commit()?;
        (user, token)
    };

    tracing::info!("Registered user {} ({})", user.id, user.email);
    Ok(with_session_cookie(&state, StatusCode::CREATED, &token, user))
}

/// POST /login — verify credentials and start a session
pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> AppResult<Response> {
    let email = non_blank(req.email).ok_or(AppError::Unauthorized)?;
    let password = req.password.unwrap_or_default();

    let user = {
        let conn = state.db.get()?;
        User::find_by_email(&conn, &email)?
    };

    let Some(user) = user else {
        tracing::warn!("Login failed, unknown email: {}", email);
        return Err(AppError::Unauthorized);
    };

    if !password::verify_in_background(password, user.password_hash.clone()).await? {
        tracing::warn!("Login failed, bad password for user {}", user.id);
        return Err(AppError::Unauthorized);
    }

    let (token, friends) = {
        let conn = state.db.get()?;
        let token = session::create_session(&conn, &user.id, state.config.auth.session_hours)?;
        (token, User::friends_of(&conn, &user.id)?)
    };

    tracing::info!("User {} logged in", user.id);
    Ok(with_session_cookie(
        &state,
        StatusCode::OK,
        &token,
        LoginResponse { user, friends },
    ))
}

/// POST /logout — end the session referenced by the cookie, if any
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let cookie_name = &state.config.auth.cookie_name;

    if let Some(token) = session_token(&headers, cookie_name) {
        let conn = state.db.get()?;
        session::delete_session(&conn, token)?;
    }

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, session::clear_session_cookie(cookie_name))],
        Json(json!({ "message": "Successfully logged out" })),
    )
        .into_response())
}

/// GET|POST /@me — profile of the session user
pub async fn me(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<User>> {
    let conn = state.db.get()?;
    let profile = User::find_by_id(&conn, &user.id)?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok(Json(profile))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_blank_trims_and_drops_empty() {
        assert_eq!(non_blank(Some("  Ada ".into())), Some("Ada".into()));
        assert_eq!(non_blank(Some("   ".into())), None);
        assert_eq!(non_blank(None), None);
    }

    #[test]
    fn mismatched_confirmation_is_rejected() {
        let policy = PasswordPolicy::default();
        let err = validate_new_password(&policy, "Str0ng!Password", Some("Str0ng!Passw0rd"))
            .unwrap_err();
        assert_eq!(err.to_string(), "Passwords do not match");
        assert!(validate_new_password(&policy, "Str0ng!Password", None).is_err());
        assert!(validate_new_password(&policy, "Str0ng!Password", Some("Str0ng!Password")).is_ok());
    }

    #[test]
    fn policy_failure_comes_before_confirmation() {
        let policy = PasswordPolicy::default();
        let err = validate_new_password(&policy, "weak", Some("other")).unwrap_err();
        assert_eq!(err.to_string(), "Password must be longer than 8 characters");
    }
}
