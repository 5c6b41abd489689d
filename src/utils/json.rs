use chrono::NaiveDate;
use serde_json::Value;

/// How a nullable field appears in a PATCH body.
#[derive(Debug, PartialEq, Eq)]
pub enum NullableValue {
    Omitted,
    Null,
    String(String),
}

pub fn classify_nullable(optional_value: Option<&Value>) -> Result<NullableValue, String> {
    match optional_value {
        None => Ok(NullableValue::Omitted),
        Some(Value::Null) => Ok(NullableValue::Null),
        Some(Value::String(s)) => Ok(NullableValue::String(s.to_owned())),
        Some(other) => Err(format!("expected string or null, got {other}")),
    }
}

/// Resolves a nullable `YYYY-MM-DD` field: `None` leaves the current value,
/// `Some(None)` clears it. An empty string also clears.
pub fn nullable_date(body: &Value, field: &str) -> Result<Option<Option<NaiveDate>>, String> {
    match classify_nullable(body.get(field)).map_err(|err| format!("{field}: {err}"))? {
        NullableValue::Omitted => Ok(None),
        NullableValue::Null => Ok(Some(None)),
        NullableValue::String(raw) if raw.trim().is_empty() => Ok(Some(None)),
        NullableValue::String(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map(|date| Some(Some(date)))
            .map_err(|_| format!("{field} must be a YYYY-MM-DD date")),
    }
}
