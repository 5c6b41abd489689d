use axum::{
    body::to_bytes,
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use diesel::{
    dsl::count_star,
    pg::Pg,
    prelude::*,
    result::{DatabaseErrorKind, Error as DieselError},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    employee_csv::{self, CsvImportError, ImportSummary},
    error::{AppError, AppResult},
    jobs::{self, WelcomeNotice, JOB_WELCOME_WEBHOOK},
    models::{Employee, EmployeeDraft},
    pagination::{Page, PageWindow, EMPLOYEES_PAGE_SIZE},
    schema::empleados,
    state::AppState,
    utils::{
        json::nullable_date,
        search::{contains_pattern, non_blank},
    },
};

const OPTIONS_LIMIT: i64 = 10;
const IMPORT_BODY_LIMIT: usize = 10 * 1024 * 1024;

#[derive(Deserialize)]
pub struct EmployeeListQuery {
    pub page: Option<i64>,
    pub nombres: Option<String>,
    pub apellidos: Option<String>,
    pub correo: Option<String>,
    pub telefono: Option<String>,
}

#[derive(Deserialize)]
pub struct EmployeeOptionsQuery {
    pub q: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateEmployeeRequest {
    pub documento: i64,
    #[serde(default)]
    pub nombres: String,
    pub apellidos: String,
    pub correo: String,
    pub telefono: String,
    pub cumpleanos: Option<NaiveDate>,
    pub fecha_ingreso: Option<NaiveDate>,
    #[serde(default)]
    pub dias_vacaciones: i32,
}

#[derive(Deserialize)]
struct UpdateEmployeeFields {
    documento: Option<i64>,
    nombres: Option<String>,
    apellidos: Option<String>,
    correo: Option<String>,
    telefono: Option<String>,
    dias_vacaciones: Option<i32>,
}

#[derive(Serialize)]
pub struct EmployeeResponse {
    pub id: Uuid,
    pub documento: i64,
    pub nombres: String,
    pub apellidos: String,
    pub correo: String,
    pub telefono: String,
    pub cumpleanos: Option<NaiveDate>,
    pub fecha_ingreso: Option<NaiveDate>,
    pub dias_vacaciones: i32,
    pub fecha_creacion: NaiveDateTime,
    pub fecha_edicion: NaiveDateTime,
}

impl From<Employee> for EmployeeResponse {
    fn from(employee: Employee) -> Self {
        Self {
            id: employee.id,
            documento: employee.documento,
            nombres: employee.nombres,
            apellidos: employee.apellidos,
            correo: employee.correo,
            telefono: employee.telefono,
            cumpleanos: employee.cumpleanos,
            fecha_ingreso: employee.fecha_ingreso,
            dias_vacaciones: employee.dias_vacaciones,
            fecha_creacion: employee.fecha_creacion,
            fecha_edicion: employee.fecha_edicion,
        }
    }
}

#[derive(Serialize, Queryable)]
pub struct EmployeeOption {
    pub id: Uuid,
    pub nombres: String,
    pub apellidos: String,
    pub correo: String,
}

fn filtered_employees(params: &EmployeeListQuery) -> empleados::BoxedQuery<'static, Pg> {
    let mut query = empleados::table.into_boxed();
    if let Some(value) = non_blank(params.nombres.as_deref()) {
        query = query.filter(empleados::nombres.ilike(contains_pattern(&value)));
    }
    if let Some(value) = non_blank(params.apellidos.as_deref()) {
        query = query.filter(empleados::apellidos.ilike(contains_pattern(&value)));
    }
    if let Some(value) = non_blank(params.correo.as_deref()) {
        query = query.filter(empleados::correo.ilike(contains_pattern(&value)));
    }
    if let Some(value) = non_blank(params.telefono.as_deref()) {
        query = query.filter(empleados::telefono.ilike(contains_pattern(&value)));
    }
    query
}

pub async fn list_employees(
    State(state): State<AppState>,
    Query(params): Query<EmployeeListQuery>,
) -> AppResult<Json<Page<EmployeeResponse>>> {
    let mut conn = state.db()?;
    let window = PageWindow::new(params.page, EMPLOYEES_PAGE_SIZE);

    let total: i64 = filtered_employees(&params)
        .select(count_star())
        .first(&mut conn)?;
    let rows: Vec<Employee> = filtered_employees(&params)
        .order(empleados::fecha_creacion.desc())
        .offset(window.offset())
        .limit(window.limit())
        .load(&mut conn)?;

    Ok(Json(window.into_page(
        rows.into_iter().map(EmployeeResponse::from).collect(),
        total,
    )))
}

pub async fn employee_options(
    State(state): State<AppState>,
    Query(params): Query<EmployeeOptionsQuery>,
) -> AppResult<Json<Vec<EmployeeOption>>> {
    let mut conn = state.db()?;

    let mut query = empleados::table
        .select((
            empleados::id,
            empleados::nombres,
            empleados::apellidos,
            empleados::correo,
        ))
        .into_boxed();
    if let Some(term) = non_blank(params.q.as_deref()) {
        let pattern = contains_pattern(&term);
        query = query.filter(
            empleados::nombres
                .ilike(pattern.clone())
                .or(empleados::apellidos.ilike(pattern)),
        );
    }

    let options = query
        .order((empleados::nombres.asc(), empleados::apellidos.asc()))
        .limit(OPTIONS_LIMIT)
        .load::<EmployeeOption>(&mut conn)?;
    Ok(Json(options))
}

pub async fn get_employee(
    State(state): State<AppState>,
    Path(employee_id): Path<Uuid>,
) -> AppResult<Json<EmployeeResponse>> {
    let mut conn = state.db()?;
    let employee: Employee = empleados::table.find(employee_id).first(&mut conn)?;
    Ok(Json(employee.into()))
}

pub async fn create_employee(
    State(state): State<AppState>,
    Json(payload): Json<CreateEmployeeRequest>,
) -> AppResult<(StatusCode, Json<EmployeeResponse>)> {
    let draft = EmployeeDraft {
        documento: payload.documento,
        nombres: payload.nombres.trim().to_string(),
        apellidos: payload.apellidos.trim().to_string(),
        correo: payload.correo.trim().to_lowercase(),
        telefono: payload.telefono.trim().to_string(),
        cumpleanos: payload.cumpleanos,
        fecha_ingreso: payload.fecha_ingreso,
        dias_vacaciones: payload.dias_vacaciones,
    };
    draft.validate().map_err(AppError::bad_request)?;

    let mut conn = state.db()?;
    let employee_id = Uuid::new_v4();
    let notice = WelcomeNotice::for_employee(&draft.nombres, &draft.telefono);

    let employee: Employee = diesel::insert_into(empleados::table)
        .values(draft.into_new(employee_id))
        .get_result(&mut conn)
        .map_err(map_unique_email)?;
    info!(employee_id = %employee.id, "employee created");

    if let Some(notice) = notice {
        if let Err(err) = jobs::enqueue(&mut conn, JOB_WELCOME_WEBHOOK, &notice) {
            warn!(employee_id = %employee.id, error = %err, "failed to queue welcome notice");
        }
    }

    Ok((StatusCode::CREATED, Json(employee.into())))
}

pub async fn update_employee(
    State(state): State<AppState>,
    Path(employee_id): Path<Uuid>,
    Json(body): Json<Value>,
) -> AppResult<Json<EmployeeResponse>> {
    if !body.is_object() {
        return Err(AppError::bad_request("expected a JSON object"));
    }
    let fields: UpdateEmployeeFields = serde_json::from_value(body.clone())
        .map_err(|err| AppError::bad_request(format!("invalid employee fields: {err}")))?;
    let cumpleanos = nullable_date(&body, "cumpleanos").map_err(AppError::bad_request)?;
    let fecha_ingreso = nullable_date(&body, "fecha_ingreso").map_err(AppError::bad_request)?;

    let mut conn = state.db()?;
    let existing: Employee = empleados::table.find(employee_id).first(&mut conn)?;

    let draft = EmployeeDraft {
        documento: fields.documento.unwrap_or(existing.documento),
        nombres: fields
            .nombres
            .map(|value| value.trim().to_string())
            .unwrap_or(existing.nombres),
        apellidos: fields
            .apellidos
            .map(|value| value.trim().to_string())
            .unwrap_or(existing.apellidos),
        correo: fields
            .correo
            .map(|value| value.trim().to_lowercase())
            .unwrap_or(existing.correo),
        telefono: fields
            .telefono
            .map(|value| value.trim().to_string())
            .unwrap_or(existing.telefono),
        cumpleanos: cumpleanos.unwrap_or(existing.cumpleanos),
        fecha_ingreso: fecha_ingreso.unwrap_or(existing.fecha_ingreso),
        dias_vacaciones: fields.dias_vacaciones.unwrap_or(existing.dias_vacaciones),
    };
    draft.validate().map_err(AppError::bad_request)?;

    let updated: Employee = diesel::update(empleados::table.find(employee_id))
        .set((&draft, empleados::fecha_edicion.eq(Utc::now().naive_utc())))
        .get_result(&mut conn)
        .map_err(map_unique_email)?;
    info!(employee_id = %employee_id, "employee updated");

    Ok(Json(updated.into()))
}

pub async fn delete_employee(
    State(state): State<AppState>,
    Path(employee_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;

    match diesel::delete(empleados::table.find(employee_id)).execute(&mut conn) {
        Ok(0) => Err(AppError::not_found()),
        Ok(_) => {
            info!(employee_id = %employee_id, "employee deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        Err(DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _)) => {
            warn!(employee_id = %employee_id, "employee still referenced; delete refused");
            Err(AppError::conflict(
                "employee has certificate requests or manages an area and cannot be deleted",
            ))
        }
        Err(err) => Err(AppError::from(err)),
    }
}

pub async fn export_employees(State(state): State<AppState>) -> AppResult<Response> {
    let mut conn = state.db()?;
    let employees: Vec<Employee> = empleados::table
        .order(empleados::fecha_creacion.desc())
        .load(&mut conn)?;
    let bytes = employee_csv::export(&employees)?;

    let filename = format!("empleados-{}.csv", Utc::now().format("%Y-%m-%d"));
    let encoded =
        percent_encoding::utf8_percent_encode(&filename, percent_encoding::NON_ALPHANUMERIC);
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{filename}\"; filename*=UTF-8''{encoded}"
    ))
    .map_err(AppError::internal)?;

    info!(rows = employees.len(), "employee directory exported");
    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/csv; charset=utf-8"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// Accepts either a multipart form with a `file` field or a raw CSV body.
pub async fn import_employees(
    State(state): State<AppState>,
    request: Request,
) -> AppResult<Response> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    let bytes = if is_multipart {
        let mut multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|err| AppError::bad_request(format!("invalid multipart data: {err}")))?;
        let mut file: Option<Vec<u8>> = None;
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|err| AppError::bad_request(format!("invalid multipart data: {err}")))?
        {
            if field.name() == Some("file") {
                let data = field
                    .bytes()
                    .await
                    .map_err(|err| AppError::bad_request(format!("failed to read file: {err}")))?;
                file = Some(data.to_vec());
            }
        }
        file.ok_or_else(|| AppError::bad_request("file field is required"))?
    } else {
        to_bytes(request.into_body(), IMPORT_BODY_LIMIT)
            .await
            .map_err(|err| AppError::bad_request(format!("failed to read body: {err}")))?
            .to_vec()
    };

    let rows = match employee_csv::parse(&bytes) {
        Ok(rows) => rows,
        Err(CsvImportError::InvalidRows(errors)) => {
            warn!(invalid_rows = errors.len(), "employee import rejected");
            let body = json!({
                "error": format!("{} row(s) failed validation", errors.len()),
                "rows": errors,
            });
            return Ok((StatusCode::BAD_REQUEST, Json(body)).into_response());
        }
        Err(err) => return Err(AppError::bad_request(err.to_string())),
    };

    let mut conn = state.db()?;
    let summary: ImportSummary = employee_csv::apply(&mut conn, rows).map_err(|err| match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            AppError::bad_request("import would give two employees the same correo")
        }
        other => {
            error!(error = %other, "employee import failed");
            AppError::from(other)
        }
    })?;

    Ok(Json(summary).into_response())
}

fn map_unique_email(err: DieselError) -> AppError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            AppError::bad_request("an employee with that correo already exists")
        }
        other => AppError::from(other),
    }
}
