use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = profiles)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = profiles)]
pub struct NewProfile {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = user_roles)]
pub struct NewUserRole {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = empleados)]
pub struct Employee {
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

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = empleados)]
pub struct NewEmployee {
    pub id: Uuid,
    pub documento: i64,
    pub nombres: String,
    pub apellidos: String,
    pub correo: String,
    pub telefono: String,
    pub cumpleanos: Option<NaiveDate>,
    pub fecha_ingreso: Option<NaiveDate>,
    pub dias_vacaciones: i32,
}

/// Writable employee fields shared by the create endpoint and the CSV import.
#[derive(Debug, Clone, PartialEq, Eq, AsChangeset)]
#[diesel(table_name = empleados, treat_none_as_null = true)]
pub struct EmployeeDraft {
    pub documento: i64,
    pub nombres: String,
    pub apellidos: String,
    pub correo: String,
    pub telefono: String,
    pub cumpleanos: Option<NaiveDate>,
    pub fecha_ingreso: Option<NaiveDate>,
    pub dias_vacaciones: i32,
}

impl EmployeeDraft {
    pub fn validate(&self) -> Result<(), String> {
        if self.documento <= 0 {
            return Err("documento must be a positive number".into());
        }
        if self.apellidos.trim().is_empty() {
            return Err("apellidos is required".into());
        }
        if !self.correo.contains('@') {
            return Err(format!("correo `{}` is not a valid email", self.correo));
        }
        if self.telefono.trim().is_empty() {
            return Err("telefono is required".into());
        }
        if self.dias_vacaciones < 0 {
            return Err("dias_vacaciones cannot be negative".into());
        }
        Ok(())
    }

    pub fn into_new(self, id: Uuid) -> NewEmployee {
        NewEmployee {
            id,
            documento: self.documento,
            nombres: self.nombres,
            apellidos: self.apellidos,
            correo: self.correo,
            telefono: self.telefono,
            cumpleanos: self.cumpleanos,
            fecha_ingreso: self.fecha_ingreso,
            dias_vacaciones: self.dias_vacaciones,
        }
    }
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = areas)]
pub struct Area {
    pub id: Uuid,
    pub nombre: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = areas)]
pub struct NewArea {
    pub id: Uuid,
    pub nombre: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = jefes)]
#[diesel(primary_key(area_id))]
#[diesel(belongs_to(Area))]
pub struct ManagerAssignment {
    pub area_id: Uuid,
    pub empleado_id: Option<Uuid>,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = jefes)]
pub struct NewManagerAssignment {
    pub area_id: Uuid,
    pub empleado_id: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = certificaciones_solicitudes)]
pub struct CertificateRequest {
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
    pub estado: String,
    pub motivo_rechazo: Option<String>,
    pub documento_id: Option<String>,
    pub documento_sha256: Option<String>,
    pub empleado_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = certificaciones_solicitudes)]
pub struct NewCertificateRequest {
    pub id: Uuid,
    pub nombre: String,
    pub apellido: String,
    pub correo: String,
    pub telefono: String,
    pub va_dirigida: bool,
    pub nombre_destinatario: Option<String>,
    pub incluir_salario: bool,
    pub incluir_extras: bool,
    pub incluir_funciones: bool,
    pub razon: Option<String>,
    pub area: Option<String>,
    pub estado: String,
    pub empleado_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = jobs)]
pub struct Job {
    pub id: Uuid,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempts: i32,
    pub run_after: NaiveDateTime,
    pub last_error: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = jobs)]
pub struct NewJob {
    pub id: Uuid,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub run_after: NaiveDateTime,
}
