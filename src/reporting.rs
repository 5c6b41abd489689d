//! Dashboard aggregation over certificate requests.

use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::lifecycle::RequestStatus;

pub const TOP_REQUESTERS: usize = 5;
pub const DEFAULT_RANGE_DAYS: i64 = 7;
const UNNAMED: &str = "Sin nombre";

/// The columns of a request the dashboard needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSnapshot {
    pub fecha_solicitud: NaiveDateTime,
    pub estado: String,
    pub nombre: String,
    pub apellido: String,
    pub va_dirigida: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayCount {
    pub date: NaiveDate,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub estado: RequestStatus,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequesterCount {
    pub name: String,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DirectedCount {
    pub dirigida: usize,
    pub no_dirigida: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub desde: NaiveDate,
    pub hasta: NaiveDate,
    pub per_day: Vec<DayCount>,
    pub by_status: Vec<StatusCount>,
    pub top_requesters: Vec<RequesterCount>,
    pub directed: DirectedCount,
    pub total: usize,
}

/// Dashboard buckets: anything that is not finished is in progress.
pub fn status_bucket(raw: &str) -> RequestStatus {
    match RequestStatus::from_stored(raw) {
        RequestStatus::Processed => RequestStatus::Processed,
        RequestStatus::Rejected => RequestStatus::Rejected,
        RequestStatus::Pending | RequestStatus::InProgress => RequestStatus::InProgress,
    }
}

/// Aggregates the requests whose date falls in `desde..=hasta`. Requests
/// outside the range are ignored.
pub fn summarize(
    requests: &[RequestSnapshot],
    desde: NaiveDate,
    hasta: NaiveDate,
) -> DashboardSummary {
    let in_range: Vec<&RequestSnapshot> = requests
        .iter()
        .filter(|request| {
            let day = request.fecha_solicitud.date();
            day >= desde && day <= hasta
        })
        .collect();

    let mut per_day: BTreeMap<NaiveDate, usize> = desde
        .iter_days()
        .take_while(|day| *day <= hasta)
        .map(|day| (day, 0))
        .collect();
    let mut statuses: HashMap<RequestStatus, usize> = HashMap::new();
    let mut requesters: HashMap<String, usize> = HashMap::new();
    let mut directed = DirectedCount::default();

    for request in &in_range {
        *per_day.entry(request.fecha_solicitud.date()).or_default() += 1;
        *statuses.entry(status_bucket(&request.estado)).or_default() += 1;
        *requesters.entry(requester_name(request)).or_default() += 1;
        if request.va_dirigida {
            directed.dirigida += 1;
        } else {
            directed.no_dirigida += 1;
        }
    }

    let by_status = [
        RequestStatus::InProgress,
        RequestStatus::Processed,
        RequestStatus::Rejected,
    ]
    .into_iter()
    .map(|estado| StatusCount {
        estado,
        total: statuses.get(&estado).copied().unwrap_or(0),
    })
    .collect();

    let mut top_requesters: Vec<RequesterCount> = requesters
        .into_iter()
        .map(|(name, total)| RequesterCount { name, total })
        .collect();
    top_requesters.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.name.cmp(&b.name)));
    top_requesters.truncate(TOP_REQUESTERS);

    DashboardSummary {
        desde,
        hasta,
        per_day: per_day
            .into_iter()
            .map(|(date, total)| DayCount { date, total })
            .collect(),
        by_status,
        top_requesters,
        directed,
        total: in_range.len(),
    }
}

fn requester_name(request: &RequestSnapshot) -> String {
    let name = format!("{} {}", request.nombre.trim(), request.apellido.trim());
    let name = name.trim();
    if name.is_empty() {
        UNNAMED.to_string()
    } else {
        name.to_string()
    }
}
