use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{ManagerAssignment, NewManagerAssignment},
    pagination::{Page, PageWindow, MANAGERS_PAGE_SIZE},
    schema::{areas, empleados, jefes},
    state::AppState,
    utils::search::{contains_ignore_case, non_blank},
};

#[derive(Deserialize)]
pub struct ManagerListQuery {
    pub page: Option<i64>,
    pub q: Option<String>,
}

#[derive(Deserialize)]
pub struct AssignManagerRequest {
    pub empleado_id: Option<Uuid>,
}

#[derive(Serialize, Queryable)]
pub struct ManagerRow {
    pub area_id: Uuid,
    pub area_nombre: String,
    pub empleado_id: Option<Uuid>,
    pub nombres: Option<String>,
    pub apellidos: Option<String>,
    pub correo: Option<String>,
    pub updated_at: NaiveDateTime,
}

impl ManagerRow {
    fn haystack(&self) -> String {
        [
            Some(self.area_nombre.as_str()),
            self.nombres.as_deref(),
            self.apellidos.as_deref(),
            self.correo.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
    }
}

fn load_rows(
    conn: &mut PgConnection,
    only_area: Option<Uuid>,
) -> QueryResult<Vec<ManagerRow>> {
    let mut query = jefes::table
        .inner_join(areas::table)
        .left_join(empleados::table)
        .select((
            jefes::area_id,
            areas::nombre,
            jefes::empleado_id,
            empleados::nombres.nullable(),
            empleados::apellidos.nullable(),
            empleados::correo.nullable(),
            jefes::updated_at,
        ))
        .into_boxed();
    if let Some(area_id) = only_area {
        query = query.filter(jefes::area_id.eq(area_id));
    }
    query.order(areas::nombre.asc()).load(conn)
}

/// Search runs over area name and manager names and email together.
pub async fn list_managers(
    State(state): State<AppState>,
    Query(params): Query<ManagerListQuery>,
) -> AppResult<Json<Page<ManagerRow>>> {
    let window = PageWindow::new(params.page, MANAGERS_PAGE_SIZE);
    let mut conn = state.db()?;
    let mut rows = load_rows(&mut conn, None)?;

    if let Some(term) = non_blank(params.q.as_deref()) {
        rows.retain(|row| contains_ignore_case(&row.haystack(), &term));
    }

    Ok(Json(window.slice(rows)))
}

pub async fn assign_manager(
    State(state): State<AppState>,
    Path(area_id): Path<Uuid>,
    Json(payload): Json<AssignManagerRequest>,
) -> AppResult<Json<ManagerRow>> {
    let mut conn = state.db()?;

    areas::table
        .find(area_id)
        .select(areas::id)
        .first::<Uuid>(&mut conn)?;
    if let Some(empleado_id) = payload.empleado_id {
        empleados::table
            .find(empleado_id)
            .select(empleados::id)
            .first::<Uuid>(&mut conn)?;
    }

    let now = Utc::now().naive_utc();
    let assignment: ManagerAssignment = diesel::insert_into(jefes::table)
        .values(NewManagerAssignment {
            area_id,
            empleado_id: payload.empleado_id,
        })
        .on_conflict(jefes::area_id)
        .do_update()
        .set((
            jefes::empleado_id.eq(payload.empleado_id),
            jefes::updated_at.eq(now),
        ))
        .get_result(&mut conn)?;
    info!(area_id = %area_id, empleado_id = ?assignment.empleado_id, "area manager assigned");

    let row = load_rows(&mut conn, Some(area_id))?
        .pop()
        .ok_or_else(AppError::not_found)?;
    Ok(Json(row))
}
