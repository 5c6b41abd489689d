//! Account management reserved for administrators.
//!
//! Checks run in a fixed order: method, bearer token, admin role, body.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use diesel::{
    prelude::*,
    result::{DatabaseErrorKind, Error as DieselError},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        accounts::{create_account, email_taken, NewAccount},
        password::hash_password,
        roles::{allowed_roles, Role},
        AdminUser,
    },
    error::{AppError, AppResult},
    schema::{profiles, users},
    state::AppState,
};

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub display_name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Serialize)]
pub struct CreateUserResponse {
    pub user_id: Uuid,
    pub email: String,
    pub roles: Vec<Role>,
}

#[derive(Deserialize)]
pub struct DeleteUserRequest {
    #[serde(rename = "userId")]
    pub user_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct DeleteUserResponse {
    pub success: bool,
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        AppError::bad_request(format!("invalid JSON body: {}", rejection.body_text()))
    })
}

pub async fn method_not_allowed() -> AppError {
    AppError::method_not_allowed()
}

pub async fn create_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> AppResult<Json<CreateUserResponse>> {
    let payload = json_body(payload)?;

    let email = payload
        .email
        .as_deref()
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::bad_request("email is required"))?;
    if !email.contains('@') {
        return Err(AppError::bad_request("email must be a valid address"));
    }
    let password = payload
        .password
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::bad_request("password is required"))?;
    if payload.roles.is_empty() {
        return Err(AppError::bad_request("at least one role is required"));
    }
    let roles = allowed_roles(payload.roles.as_slice());
    if roles.is_empty() {
        return Err(AppError::bad_request("none of the requested roles is allowed"));
    }
    let display_name = payload
        .display_name
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    let mut conn = state.db()?;
    if email_taken(&mut conn, &email)? {
        return Err(AppError::bad_request("a user with that email already exists"));
    }

    let password_hash = hash_password(&password).map_err(|err| {
        error!(error = %err, "failed to hash password");
        AppError::internal("failed to hash password")
    })?;

    let account = NewAccount {
        email: &email,
        password_hash,
        display_name,
        roles: &roles,
    };
    let user_id = create_account(&mut conn, account).map_err(|err| match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            AppError::bad_request("a user with that email already exists")
        }
        other => {
            error!(error = %other, "failed to create user");
            AppError::from(other)
        }
    })?;

    info!(admin_id = %admin.user_id, user_id = %user_id, roles = ?roles, "user created");
    Ok(Json(CreateUserResponse {
        user_id,
        email,
        roles,
    }))
}

pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    payload: Result<Json<DeleteUserRequest>, JsonRejection>,
) -> AppResult<Json<DeleteUserResponse>> {
    let payload = json_body(payload)?;
    let user_id = payload
        .user_id
        .ok_or_else(|| AppError::bad_request("userId is required"))?;
    if user_id == admin.user_id {
        warn!(admin_id = %admin.user_id, "refused self deletion");
        return Err(AppError::bad_request("you cannot delete your own account"));
    }

    let mut conn = state.db()?;
    let deleted = conn.transaction(|conn| {
        diesel::delete(profiles::table.find(user_id)).execute(conn)?;
        diesel::delete(users::table.find(user_id)).execute(conn)
    })?;
    if deleted == 0 {
        return Err(AppError::not_found());
    }

    info!(admin_id = %admin.user_id, user_id = %user_id, "user deleted");
    Ok(Json(DeleteUserResponse { success: true }))
}
