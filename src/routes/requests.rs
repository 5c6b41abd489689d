use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Days, NaiveDate, NaiveDateTime, Utc};
use diesel::{dsl::count_star, pg::Pg, prelude::*};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    lifecycle::{self, RequestStatus, StatusChange, TransitionError},
    models::{CertificateRequest, NewCertificateRequest},
    pagination::{Page, PageWindow, REQUESTS_PAGE_SIZE},
    schema::{certificaciones_solicitudes as solicitudes, empleados},
    state::AppState,
    utils::search::{contains_pattern, non_blank},
};

const PDF_CONTENT_TYPE: &str = "application/pdf";

#[derive(Deserialize)]
pub struct RequestListQuery {
    pub page: Option<i64>,
    pub estado: Option<String>,
    pub nombre: Option<String>,
    pub desde: Option<NaiveDate>,
    pub hasta: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct CreateCertificateRequest {
    pub nombre: String,
    pub apellido: String,
    pub correo: String,
    #[serde(default)]
    pub telefono: String,
    #[serde(default)]
    pub va_dirigida: bool,
    pub nombre_destinatario: Option<String>,
    #[serde(default)]
    pub incluir_salario: bool,
    #[serde(default)]
    pub incluir_extras: bool,
    #[serde(default)]
    pub incluir_funciones: bool,
    pub razon: Option<String>,
    pub area: Option<String>,
    pub empleado_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct StatusUpdateRequest {
    pub estado: String,
    pub motivo: Option<String>,
}

#[derive(AsChangeset)]
#[diesel(table_name = solicitudes)]
struct StatusChangeset<'a> {
    estado: &'a str,
    motivo_rechazo: Option<&'a str>,
    ultima_modificacion: NaiveDateTime,
}

#[derive(Serialize)]
pub struct CertificateRequestResponse {
    pub id: Uuid,
    pub nombre: String,
    pub apellido: String,
    pub correo: String,
    pub telefono: String,
    pub fecha_solicitud: NaiveDateTime,
    pub ultima_modificacion: Option<NaiveDateTime>,
    pub va_dirigida: bool,
    pub nombre_destinatario: Option<String>,
    pub incluir_salario: bool,
    pub incluir_extras: bool,
    pub incluir_funciones: bool,
    pub razon: Option<String>,
    pub area: Option<String>,
    pub estado: RequestStatus,
    pub motivo_rechazo: Option<String>,
    pub documento_id: Option<String>,
    pub documento_sha256: Option<String>,
    pub empleado_id: Option<Uuid>,
}

impl From<CertificateRequest> for CertificateRequestResponse {
    fn from(request: CertificateRequest) -> Self {
        Self {
            id: request.id,
            estado: RequestStatus::from_stored(&request.estado),
            nombre: request.nombre,
            apellido: request.apellido,
            correo: request.correo,
            telefono: request.telefono,
            fecha_solicitud: request.fecha_solicitud,
            ultima_modificacion: request.ultima_modificacion,
            va_dirigida: request.va_dirigida,
            nombre_destinatario: request.nombre_destinatario,
            incluir_salario: request.incluir_salario,
            incluir_extras: request.incluir_extras,
            incluir_funciones: request.incluir_funciones,
            razon: request.razon,
            area: request.area,
            motivo_rechazo: request.motivo_rechazo,
            documento_id: request.documento_id,
            documento_sha256: request.documento_sha256,
            empleado_id: request.empleado_id,
        }
    }
}

/// Start of `date` and start of the following day, for inclusive day ranges.
pub(crate) fn day_bounds(date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let start = date.and_time(chrono::NaiveTime::MIN);
    let end = date
        .checked_add_days(Days::new(1))
        .unwrap_or(date)
        .and_time(chrono::NaiveTime::MIN);
    (start, end)
}

fn filtered_requests(
    status: Option<RequestStatus>,
    nombre: Option<String>,
    desde: Option<NaiveDate>,
    hasta: Option<NaiveDate>,
) -> solicitudes::BoxedQuery<'static, Pg> {
    let mut query = solicitudes::table.into_boxed();
    if let Some(status) = status {
        query = query.filter(solicitudes::estado.eq(status.as_str()));
    }
    if let Some(nombre) = nombre {
        let pattern = contains_pattern(&nombre);
        query = query.filter(
            solicitudes::nombre
                .ilike(pattern.clone())
                .or(solicitudes::apellido.ilike(pattern)),
        );
    }
    if let Some(desde) = desde {
        query = query.filter(solicitudes::fecha_solicitud.ge(day_bounds(desde).0));
    }
    if let Some(hasta) = hasta {
        query = query.filter(solicitudes::fecha_solicitud.lt(day_bounds(hasta).1));
    }
    query
}

pub async fn list_requests(
    State(state): State<AppState>,
    Query(params): Query<RequestListQuery>,
) -> AppResult<Json<Page<CertificateRequestResponse>>> {
    let status = match non_blank(params.estado.as_deref()) {
        Some(raw) => Some(
            RequestStatus::parse(&raw)
                .ok_or_else(|| AppError::bad_request(format!("unknown estado `{raw}`")))?,
        ),
        None => None,
    };
    let nombre = non_blank(params.nombre.as_deref());
    let window = PageWindow::new(params.page, REQUESTS_PAGE_SIZE);

    let mut conn = state.db()?;
    let total: i64 = filtered_requests(status, nombre.clone(), params.desde, params.hasta)
        .select(count_star())
        .first(&mut conn)?;
    let rows: Vec<CertificateRequest> =
        filtered_requests(status, nombre, params.desde, params.hasta)
            .order(solicitudes::fecha_solicitud.desc())
            .offset(window.offset())
            .limit(window.limit())
            .load(&mut conn)?;

    Ok(Json(window.into_page(
        rows.into_iter().map(Into::into).collect(),
        total,
    )))
}

pub async fn get_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> AppResult<Json<CertificateRequestResponse>> {
    let mut conn = state.db()?;
    let request: CertificateRequest = solicitudes::table.find(request_id).first(&mut conn)?;
    Ok(Json(request.into()))
}

pub async fn create_request(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateCertificateRequest>,
) -> AppResult<(StatusCode, Json<CertificateRequestResponse>)> {
    let nombre = payload.nombre.trim().to_string();
    let apellido = payload.apellido.trim().to_string();
    let correo = payload.correo.trim().to_lowercase();
    if nombre.is_empty() || apellido.is_empty() {
        return Err(AppError::bad_request("nombre and apellido are required"));
    }
    if !correo.contains('@') {
        return Err(AppError::bad_request("correo must be a valid email"));
    }
    let nombre_destinatario = non_blank(payload.nombre_destinatario.as_deref());
    if payload.va_dirigida && nombre_destinatario.is_none() {
        return Err(AppError::bad_request(
            "nombre_destinatario is required when the certificate is addressed",
        ));
    }

    let mut conn = state.db()?;
    let empleado_id = match payload.empleado_id {
        Some(id) => Some(
            empleados::table
                .find(id)
                .select(empleados::id)
                .first::<Uuid>(&mut conn)
                .optional()?
                .ok_or_else(|| AppError::bad_request("empleado_id does not exist"))?,
        ),
        None => empleados::table
            .filter(empleados::correo.eq(&correo))
            .select(empleados::id)
            .first::<Uuid>(&mut conn)
            .optional()?,
    };

    let new_request = NewCertificateRequest {
        id: Uuid::new_v4(),
        nombre,
        apellido,
        correo,
        telefono: payload.telefono.trim().to_string(),
        va_dirigida: payload.va_dirigida,
        nombre_destinatario: nombre_destinatario.filter(|_| payload.va_dirigida),
        incluir_salario: payload.incluir_salario,
        incluir_extras: payload.incluir_extras,
        incluir_funciones: payload.incluir_funciones,
        razon: non_blank(payload.razon.as_deref()),
        area: non_blank(payload.area.as_deref()),
        estado: RequestStatus::Pending.as_str().to_string(),
        empleado_id,
        user_id: Some(user.user_id),
    };

    let created: CertificateRequest = diesel::insert_into(solicitudes::table)
        .values(&new_request)
        .get_result(&mut conn)?;
    info!(
        request_id = %created.id,
        linked_employee = ?created.empleado_id,
        "certificate request created"
    );

    Ok((StatusCode::CREATED, Json(created.into())))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    Json(payload): Json<StatusUpdateRequest>,
) -> AppResult<Json<CertificateRequestResponse>> {
    let target = RequestStatus::parse(&payload.estado)
        .ok_or_else(|| AppError::bad_request(format!("unknown estado `{}`", payload.estado)))?;

    let mut conn = state.db()?;
    let request: CertificateRequest = solicitudes::table.find(request_id).first(&mut conn)?;
    let current = RequestStatus::from_stored(&request.estado);

    if current.is_terminal() {
        return Err(TransitionError::Locked(current).into());
    }
    let change = StatusChange::requested(target, payload.motivo.as_deref())?;
    let next = lifecycle::apply(current, change)?;
    if next == current {
        return Ok(Json(request.into()));
    }

    let reason = match change {
        StatusChange::Reject { reason } => Some(reason.trim()),
        _ => None,
    };
    let changeset = StatusChangeset {
        estado: next.as_str(),
        motivo_rechazo: reason,
        ultima_modificacion: Utc::now().naive_utc(),
    };

    let updated: Option<CertificateRequest> = diesel::update(
        solicitudes::table
            .find(request_id)
            .filter(solicitudes::estado.eq(&request.estado)),
    )
    .set(&changeset)
    .get_result(&mut conn)
    .optional()?;
    let updated = updated.ok_or_else(|| {
        warn!(request_id = %request_id, "request changed while updating its status");
        AppError::conflict("request was modified concurrently; reload and retry")
    })?;

    info!(request_id = %request_id, from = %current, to = %next, "request status changed");
    Ok(Json(updated.into()))
}

pub fn is_pdf(content_type: Option<&str>, file_name: Option<&str>) -> bool {
    let declared = content_type.is_some_and(|value| {
        value
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .eq_ignore_ascii_case(PDF_CONTENT_TYPE)
    });
    let guessed = file_name
        .and_then(|name| mime_guess::from_path(name).first())
        .is_some_and(|mime| mime.essence_str() == PDF_CONTENT_TYPE);
    declared || guessed
}

/// Name the certificate is stored under: requester email and request date.
pub fn document_name(correo: &str, fecha_solicitud: NaiveDateTime) -> String {
    format!("{} | {}", correo, fecha_solicitud.format("%d-%m-%Y"))
}

pub async fn upload_document(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    mut multipart: Multipart,
) -> AppResult<Json<CertificateRequestResponse>> {
    let request: CertificateRequest = {
        let mut conn = state.db()?;
        solicitudes::table.find(request_id).first(&mut conn)?
    };
    let current = RequestStatus::from_stored(&request.estado);
    lifecycle::apply(current, StatusChange::Complete)?;

    let mut file: Option<(Vec<u8>, Option<String>, Option<String>)> = None;
    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error!(error = %err, "invalid multipart data");
        AppError::bad_request(format!("invalid multipart data: {err}"))
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(|err| {
            error!(error = %err, "failed to read file bytes");
            AppError::bad_request(format!("failed to read file bytes: {err}"))
        })?;
        file = Some((data.to_vec(), file_name, content_type));
    }

    let (bytes, file_name, content_type) =
        file.ok_or_else(|| AppError::bad_request("file field is required"))?;
    if bytes.is_empty() {
        return Err(AppError::bad_request("file field must not be empty"));
    }
    if !is_pdf(content_type.as_deref(), file_name.as_deref()) {
        return Err(AppError::bad_request("only PDF documents are accepted"));
    }

    let checksum = hex::encode(Sha256::digest(&bytes));
    let name = document_name(&request.correo, request.fecha_solicitud);
    let stored = state
        .documents
        .upload(&name, bytes, PDF_CONTENT_TYPE)
        .await
        .map_err(|err| {
            warn!(request_id = %request_id, error = %err, "certificate upload failed");
            AppError::bad_gateway(format!("document upload failed: {err}"))
        })?;
    info!(request_id = %request_id, document_id = %stored.id, "certificate document stored");

    let mut conn = state.db()?;
    let updated: Option<CertificateRequest> = diesel::update(
        solicitudes::table
            .find(request_id)
            .filter(solicitudes::estado.eq(&request.estado)),
    )
    .set((
        solicitudes::estado.eq(RequestStatus::Processed.as_str()),
        solicitudes::documento_id.eq(&stored.id),
        solicitudes::documento_sha256.eq(&checksum),
        solicitudes::ultima_modificacion.eq(Utc::now().naive_utc()),
    ))
    .get_result(&mut conn)
    .optional()
    .map_err(|err| {
        error!(
            request_id = %request_id,
            document_id = %stored.id,
            error = %err,
            "document stored but status update failed"
        );
        AppError::from(err)
    })?;

    let updated = updated.ok_or_else(|| {
        error!(
            request_id = %request_id,
            document_id = %stored.id,
            "document stored but request changed concurrently"
        );
        AppError::conflict("request was modified while the document was uploading")
    })?;

    info!(request_id = %request_id, "request processed");
    Ok(Json(updated.into()))
}
