use axum::{extract::State, Json};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::{
        password,
        roles::{load_roles, Role},
        AuthenticatedUser,
    },
    error::{AppError, AppResult},
    models::User,
    schema::{profiles, users},
    state::AppState,
};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub roles: Vec<Role>,
    pub is_admin: bool,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let mut conn = state.db()?;
    let email = payload.email.trim().to_lowercase();

    let user: User = users::table
        .filter(users::email.eq(&email))
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::unauthorized)?;

    let valid = password::verify_password(&payload.password, &user.password_hash)
        .map_err(|_| AppError::unauthorized())?;
    if !valid {
        tracing::warn!(user_id = %user.id, "login rejected");
        return Err(AppError::unauthorized());
    }

    let access_token = state.jwt.generate_token(user.id, &user.email)?;
    tracing::info!(user_id = %user.id, "user logged in");

    Ok(Json(LoginResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt.expires_in_seconds(),
    }))
}

pub async fn me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<SessionResponse>> {
    let mut conn = state.db()?;

    let display_name: Option<String> = profiles::table
        .find(user.user_id)
        .select(profiles::display_name)
        .first::<Option<String>>(&mut conn)
        .optional()?
        .flatten();
    let roles = load_roles(&mut conn, user.user_id)?;

    Ok(Json(SessionResponse {
        user_id: user.user_id,
        email: user.email,
        display_name,
        is_admin: roles.contains(&Role::Admin),
        roles,
    }))
}
