use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDateTime;
use diesel::{
    dsl::count_star,
    pg::Pg,
    prelude::*,
    result::{DatabaseErrorKind, Error as DieselError},
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Area, NewArea, NewManagerAssignment},
    pagination::{Page, PageWindow, AREAS_PAGE_SIZE},
    schema::{areas, jefes},
    state::AppState,
    utils::search::{contains_pattern, non_blank},
};

#[derive(Deserialize)]
pub struct AreaListQuery {
    pub page: Option<i64>,
    pub q: Option<String>,
}

#[derive(Deserialize)]
pub struct AreaRequest {
    pub nombre: String,
}

#[derive(Serialize)]
pub struct AreaResponse {
    pub id: Uuid,
    pub nombre: String,
    pub created_at: NaiveDateTime,
}

impl From<Area> for AreaResponse {
    fn from(area: Area) -> Self {
        Self {
            id: area.id,
            nombre: area.nombre,
            created_at: area.created_at,
        }
    }
}

fn filtered_areas(term: Option<&str>) -> areas::BoxedQuery<'static, Pg> {
    let mut query = areas::table.into_boxed();
    if let Some(term) = term {
        let pattern = contains_pattern(term);
        query = query.filter(
            diesel::dsl::sql::<diesel::sql_types::Text>("areas.id::text")
                .ilike(pattern.clone())
                .or(areas::nombre.ilike(pattern)),
        );
    }
    query
}

fn area_name(raw: &str) -> AppResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::bad_request("nombre must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn map_duplicate_name(err: DieselError) -> AppError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            AppError::bad_request("an area with that nombre already exists")
        }
        other => AppError::from(other),
    }
}

pub async fn list_areas(
    State(state): State<AppState>,
    Query(params): Query<AreaListQuery>,
) -> AppResult<Json<Page<AreaResponse>>> {
    let term = non_blank(params.q.as_deref());
    let window = PageWindow::new(params.page, AREAS_PAGE_SIZE);
    let mut conn = state.db()?;

    let total: i64 = filtered_areas(term.as_deref())
        .select(count_star())
        .first(&mut conn)?;
    let rows: Vec<Area> = filtered_areas(term.as_deref())
        .order(areas::nombre.asc())
        .offset(window.offset())
        .limit(window.limit())
        .load(&mut conn)?;

    Ok(Json(window.into_page(
        rows.into_iter().map(AreaResponse::from).collect(),
        total,
    )))
}

pub async fn create_area(
    State(state): State<AppState>,
    Json(payload): Json<AreaRequest>,
) -> AppResult<(StatusCode, Json<AreaResponse>)> {
    let nombre = area_name(&payload.nombre)?;
    let mut conn = state.db()?;

    let area: Area = conn
        .transaction(|conn| {
            let area: Area = diesel::insert_into(areas::table)
                .values(NewArea {
                    id: Uuid::new_v4(),
                    nombre,
                })
                .get_result(conn)?;
            diesel::insert_into(jefes::table)
                .values(NewManagerAssignment {
                    area_id: area.id,
                    empleado_id: None,
                })
                .execute(conn)?;
            Ok(area)
        })
        .map_err(map_duplicate_name)?;

    info!(area_id = %area.id, "area created");
    Ok((StatusCode::CREATED, Json(area.into())))
}

pub async fn update_area(
    State(state): State<AppState>,
    Path(area_id): Path<Uuid>,
    Json(payload): Json<AreaRequest>,
) -> AppResult<Json<AreaResponse>> {
    let nombre = area_name(&payload.nombre)?;
    let mut conn = state.db()?;

    let area: Area = diesel::update(areas::table.find(area_id))
        .set(areas::nombre.eq(&nombre))
        .get_result(&mut conn)
        .map_err(map_duplicate_name)?;

    info!(area_id = %area_id, "area renamed");
    Ok(Json(area.into()))
}

pub async fn delete_area(
    State(state): State<AppState>,
    Path(area_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;

    let deleted = conn.transaction(|conn| {
        diesel::delete(jefes::table.filter(jefes::area_id.eq(area_id))).execute(conn)?;
        diesel::delete(areas::table.find(area_id)).execute(conn)
    })?;
    if deleted == 0 {
        return Err(AppError::not_found());
    }

    info!(area_id = %area_id, "area deleted");
    Ok(StatusCode::NO_CONTENT)
}
