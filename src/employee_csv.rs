//! CSV export and import of the employee directory.
//!
//! Imports are validated in full before anything is written, so a file with
//! a single bad row changes nothing.

use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, NaiveDateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Employee, EmployeeDraft};
use crate::schema::empleados;

pub const HEADERS: [&str; 11] = [
    "id",
    "documento",
    "nombres",
    "apellidos",
    "correo",
    "telefono",
    "cumpleanos",
    "fecha_ingreso",
    "dias_vacaciones",
    "fecha_creacion",
    "fecha_edicion",
];

const REQUIRED: [&str; 4] = ["documento", "apellidos", "correo", "telefono"];

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    pub line: u64,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum CsvImportError {
    #[error("malformed csv: {0}")]
    Malformed(#[from] csv::Error),
    #[error("csv is missing required column `{0}`")]
    MissingColumn(&'static str),
    #[error("csv contains no rows")]
    Empty,
    #[error("{} row(s) failed validation", .0.len())]
    InvalidRows(Vec<RowError>),
}

/// One validated row, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRow {
    pub line: u64,
    pub id: Option<Uuid>,
    pub draft: EmployeeDraft,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub inserted: usize,
    pub updated: usize,
}

pub fn export(employees: &[Employee]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADERS)?;

    for employee in employees {
        writer.write_record([
            employee.id.to_string(),
            employee.documento.to_string(),
            employee.nombres.clone(),
            employee.apellidos.clone(),
            employee.correo.clone(),
            employee.telefono.clone(),
            format_date(employee.cumpleanos),
            format_date(employee.fecha_ingreso),
            employee.dias_vacaciones.to_string(),
            employee.fecha_creacion.format(TIMESTAMP_FORMAT).to_string(),
            employee.fecha_edicion.format(TIMESTAMP_FORMAT).to_string(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))
}

fn format_date(value: Option<NaiveDate>) -> String {
    value
        .map(|date| date.format(DATE_FORMAT).to_string())
        .unwrap_or_default()
}

/// Parses and validates an import file. Timestamp columns and unknown
/// columns are ignored.
pub fn parse(bytes: &[u8]) -> Result<Vec<ImportRow>, CsvImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(bytes);

    let columns: HashMap<String, usize> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(index, name)| (name.trim_start_matches('\u{feff}').to_lowercase(), index))
        .collect();
    for required in REQUIRED {
        if !columns.contains_key(required) {
            return Err(CsvImportError::MissingColumn(required));
        }
    }

    let mut rows = Vec::new();
    let mut errors = Vec::new();
    let mut seen_ids = HashSet::new();
    let mut seen_emails = HashSet::new();

    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let line = record
            .position()
            .map(|position| position.line())
            .unwrap_or(index as u64 + 2);
        if record.iter().all(str::is_empty) {
            continue;
        }

        let fields = RowFields {
            columns: &columns,
            record: &record,
        };

        match parse_row(&fields) {
            Ok((id, draft)) => {
                let duplicate = match id {
                    Some(id) => !seen_ids.insert(id),
                    None => false,
                } || !seen_emails.insert(draft.correo.to_lowercase());
                if duplicate {
                    errors.push(RowError {
                        line,
                        message: "row repeats an id or correo seen earlier in the file".into(),
                    });
                    continue;
                }
                rows.push(ImportRow { line, id, draft });
            }
            Err(message) => errors.push(RowError { line, message }),
        }
    }

    if !errors.is_empty() {
        return Err(CsvImportError::InvalidRows(errors));
    }
    if rows.is_empty() {
        return Err(CsvImportError::Empty);
    }
    Ok(rows)
}

struct RowFields<'a> {
    columns: &'a HashMap<String, usize>,
    record: &'a csv::StringRecord,
}

impl<'a> RowFields<'a> {
    fn get(&self, name: &str) -> &'a str {
        self.columns
            .get(name)
            .and_then(|&index| self.record.get(index))
            .unwrap_or("")
    }
}

fn parse_row(fields: &RowFields<'_>) -> Result<(Option<Uuid>, EmployeeDraft), String> {
    let field = |name: &str| fields.get(name);

    let id = match field("id") {
        "" => None,
        raw => Some(Uuid::parse_str(raw).map_err(|_| format!("id `{raw}` is not a valid uuid"))?),
    };

    let documento = field("documento")
        .parse::<i64>()
        .map_err(|_| format!("documento `{}` is not a number", field("documento")))?;
    let dias_vacaciones = match field("dias_vacaciones") {
        "" => 0,
        raw => raw
            .parse::<i32>()
            .map_err(|_| format!("dias_vacaciones `{raw}` is not a number"))?,
    };

    let draft = EmployeeDraft {
        documento,
        nombres: field("nombres").to_string(),
        apellidos: field("apellidos").to_string(),
        correo: field("correo").to_lowercase(),
        telefono: field("telefono").to_string(),
        cumpleanos: parse_date("cumpleanos", field("cumpleanos"))?,
        fecha_ingreso: parse_date("fecha_ingreso", field("fecha_ingreso"))?,
        dias_vacaciones,
    };
    draft.validate()?;
    Ok((id, draft))
}

fn parse_date(column: &str, raw: &str) -> Result<Option<NaiveDate>, String> {
    if raw.is_empty() {
        return Ok(None);
    }
    // Full timestamps are accepted and cut to their date.
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|timestamp| timestamp.date())
        .or_else(|_| NaiveDate::parse_from_str(raw, DATE_FORMAT))
        .map(Some)
        .map_err(|_| format!("{column} `{raw}` is not a YYYY-MM-DD date"))
}

/// Writes validated rows in a single transaction. Rows without an id are
/// matched on `correo`; rows with an id update that employee or create it
/// under that id.
pub fn apply(conn: &mut PgConnection, rows: Vec<ImportRow>) -> QueryResult<ImportSummary> {
    conn.transaction(|conn| {
        let now = Utc::now().naive_utc();
        let mut summary = ImportSummary::default();

        for row in rows {
            let existing = match row.id {
                Some(id) => empleados::table
                    .find(id)
                    .select(empleados::id)
                    .first::<Uuid>(conn)
                    .optional()?,
                None => empleados::table
                    .filter(empleados::correo.eq(&row.draft.correo))
                    .select(empleados::id)
                    .first::<Uuid>(conn)
                    .optional()?,
            };

            match existing {
                Some(id) => {
                    diesel::update(empleados::table.find(id))
                        .set((&row.draft, empleados::fecha_edicion.eq(now)))
                        .execute(conn)?;
                    summary.updated += 1;
                }
                None => {
                    let id = row.id.unwrap_or_else(Uuid::new_v4);
                    diesel::insert_into(empleados::table)
                        .values(row.draft.into_new(id))
                        .execute(conn)?;
                    summary.inserted += 1;
                }
            }
        }

        tracing::info!(
            inserted = summary.inserted,
            updated = summary.updated,
            "employee import applied"
        );
        Ok(summary)
    })
}
