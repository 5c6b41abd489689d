use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{Days, NaiveDate, Utc};
use diesel::prelude::*;
use serde::Deserialize;

use crate::{
    error::{AppError, AppResult},
    reporting::{self, DashboardSummary, RequestSnapshot, DEFAULT_RANGE_DAYS},
    routes::requests::day_bounds,
    schema::certificaciones_solicitudes as solicitudes,
    state::AppState,
};

const MAX_RANGE_DAYS: i64 = 366;

#[derive(Deserialize)]
pub struct DashboardQuery {
    pub desde: Option<NaiveDate>,
    pub hasta: Option<NaiveDate>,
}

/// Resolves the reporting range, defaulting to the last week ending today.
pub fn resolve_range(
    desde: Option<NaiveDate>,
    hasta: Option<NaiveDate>,
    today: NaiveDate,
) -> AppResult<(NaiveDate, NaiveDate)> {
    let hasta = hasta.unwrap_or(today);
    let desde = match desde {
        Some(desde) => desde,
        None => hasta
            .checked_sub_days(Days::new((DEFAULT_RANGE_DAYS - 1) as u64))
            .unwrap_or(hasta),
    };
    if hasta < desde {
        return Err(AppError::bad_request("hasta must not be before desde"));
    }
    if (hasta - desde).num_days() >= MAX_RANGE_DAYS {
        return Err(AppError::bad_request(format!(
            "the range may span at most {MAX_RANGE_DAYS} days"
        )));
    }
    Ok((desde, hasta))
}

pub async fn dashboard(
    State(state): State<AppState>,
    Query(params): Query<DashboardQuery>,
) -> AppResult<Json<DashboardSummary>> {
    let (desde, hasta) = resolve_range(params.desde, params.hasta, Utc::now().date_naive())?;
    let mut conn = state.db()?;

    let snapshots: Vec<RequestSnapshot> = solicitudes::table
        .filter(solicitudes::fecha_solicitud.ge(day_bounds(desde).0))
        .filter(solicitudes::fecha_solicitud.lt(day_bounds(hasta).1))
        .select((
            solicitudes::fecha_solicitud,
            solicitudes::estado,
            solicitudes::nombre,
            solicitudes::apellido,
            solicitudes::va_dirigida,
        ))
        .load::<(chrono::NaiveDateTime, String, String, String, bool)>(&mut conn)?
        .into_iter()
        .map(
            |(fecha_solicitud, estado, nombre, apellido, va_dirigida)| RequestSnapshot {
                fecha_solicitud,
                estado,
                nombre,
                apellido,
                va_dirigida,
            },
        )
        .collect();

    Ok(Json(reporting::summarize(&snapshots, desde, hasta)))
}
