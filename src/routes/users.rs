use std::collections::{BTreeSet, HashMap};

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDateTime;
use diesel::{dsl::count_star, pg::Pg, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        roles::{allowed_roles, load_roles, Role},
        AuthenticatedUser,
    },
    error::{AppError, AppResult},
    models::{NewUserRole, Profile},
    pagination::{Page, PageWindow, USERS_PAGE_SIZE},
    schema::{profiles, user_roles},
    state::AppState,
    utils::search::{contains_pattern, non_blank},
};

#[derive(Deserialize)]
pub struct UserListQuery {
    pub page: Option<i64>,
    pub q: Option<String>,
}

#[derive(Deserialize)]
pub struct SetRolesRequest {
    pub roles: Vec<String>,
}

#[derive(Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: NaiveDateTime,
    pub roles: Vec<Role>,
}

#[derive(Serialize)]
pub struct RolesResponse {
    pub user_id: Uuid,
    pub roles: Vec<Role>,
    pub added: Vec<Role>,
    pub removed: Vec<Role>,
}

fn filtered_profiles(term: Option<&str>) -> profiles::BoxedQuery<'static, Pg> {
    let mut query = profiles::table.into_boxed();
    if let Some(term) = term {
        let pattern = contains_pattern(term);
        query = query.filter(
            profiles::email
                .ilike(pattern.clone())
                .or(profiles::display_name.ilike(pattern)),
        );
    }
    query
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<UserListQuery>,
) -> AppResult<Json<Page<UserSummary>>> {
    let term = non_blank(params.q.as_deref());
    let window = PageWindow::new(params.page, USERS_PAGE_SIZE);
    let mut conn = state.db()?;

    let total: i64 = filtered_profiles(term.as_deref())
        .select(count_star())
        .first(&mut conn)?;
    let page_profiles: Vec<Profile> = filtered_profiles(term.as_deref())
        .order(profiles::created_at.desc())
        .offset(window.offset())
        .limit(window.limit())
        .load(&mut conn)?;

    let ids: Vec<Uuid> = page_profiles.iter().map(|profile| profile.id).collect();
    let role_rows: Vec<(Uuid, String)> = user_roles::table
        .filter(user_roles::user_id.eq_any(&ids))
        .select((user_roles::user_id, user_roles::role))
        .load(&mut conn)?;
    let mut roles_by_user: HashMap<Uuid, Vec<String>> = HashMap::new();
    for (user_id, role) in role_rows {
        roles_by_user.entry(user_id).or_default().push(role);
    }

    let rows = page_profiles
        .into_iter()
        .map(|profile| UserSummary {
            roles: roles_by_user
                .get(&profile.id)
                .map(|raw| allowed_roles(raw.as_slice()))
                .unwrap_or_default(),
            id: profile.id,
            email: profile.email,
            display_name: profile.display_name,
            created_at: profile.created_at,
        })
        .collect();

    Ok(Json(window.into_page(rows, total)))
}

/// Difference between the roles a user has and the roles requested.
pub fn role_diff(current: &[Role], requested: &[Role]) -> (Vec<Role>, Vec<Role>) {
    let current: BTreeSet<Role> = current.iter().copied().collect();
    let requested: BTreeSet<Role> = requested.iter().copied().collect();
    let added = requested.difference(&current).copied().collect();
    let removed = current.difference(&requested).copied().collect();
    (added, removed)
}

pub async fn set_roles(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<SetRolesRequest>,
) -> AppResult<Json<RolesResponse>> {
    if let Some(unknown) = payload.roles.iter().find(|raw| Role::parse(raw).is_none()) {
        return Err(AppError::bad_request(format!("unknown role `{unknown}`")));
    }
    let requested = allowed_roles(payload.roles.as_slice());
    if user_id == admin.user_id && !requested.contains(&Role::Admin) {
        warn!(admin_id = %admin.user_id, "refused to drop own admin role");
        return Err(AppError::bad_request("you cannot remove your own admin role"));
    }

    let mut conn = state.db()?;
    profiles::table
        .find(user_id)
        .select(profiles::id)
        .first::<Uuid>(&mut conn)?;

    let (added, removed) = conn.transaction(|conn| {
        let current = load_roles(conn, user_id)?;
        let (added, removed) = role_diff(&current, &requested);

        if !added.is_empty() {
            let rows: Vec<NewUserRole> = added
                .iter()
                .map(|role| NewUserRole {
                    id: Uuid::new_v4(),
                    user_id,
                    role: role.as_str().to_string(),
                })
                .collect();
            diesel::insert_into(user_roles::table)
                .values(&rows)
                .on_conflict_do_nothing()
                .execute(conn)?;
        }
        if !removed.is_empty() {
            let removed_labels: Vec<&str> = removed.iter().map(|role| role.as_str()).collect();
            diesel::delete(
                user_roles::table
                    .filter(user_roles::user_id.eq(user_id))
                    .filter(user_roles::role.eq_any(removed_labels)),
            )
            .execute(conn)?;
        }
        Ok::<_, diesel::result::Error>((added, removed))
    })?;

    info!(
        admin_id = %admin.user_id,
        user_id = %user_id,
        added = ?added,
        removed = ?removed,
        "user roles updated"
    );

    Ok(Json(RolesResponse {
        user_id,
        roles: requested,
        added,
        removed,
    }))
}
