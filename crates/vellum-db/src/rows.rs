//! Helpers shared by the row structs of every repository.

use serde::Serialize;
use serde::de::DeserializeOwned;
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// Row struct for count and sum queries.
#[derive(Debug, SurrealValue)]
pub(crate) struct CountRow {
    pub(crate) total: u64,
}

pub(crate) fn total_of(rows: Vec<CountRow>) -> u64 {
    rows.first().map(|r| r.total).unwrap_or(0)
}

/// First row of a single-record query, or `NotFound`.
pub(crate) fn first<R>(rows: Vec<R>, entity: &str, id: impl ToString) -> Result<R, DbError> {
    rows.into_iter()
        .next()
        .ok_or_else(|| DbError::not_found(entity, id))
}

pub(crate) fn parse_uuid(s: &str, what: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(s).map_err(|e| DbError::Decode(format!("invalid {what} UUID: {e}")))
}

pub(crate) fn parse_opt_uuid(s: Option<String>, what: &str) -> Result<Option<Uuid>, DbError> {
    s.map(|s| parse_uuid(&s, what)).transpose()
}

pub(crate) fn parse_enum<T>(s: &str) -> Result<T, DbError>
where
    T: std::str::FromStr<Err = String>,
{
    s.parse().map_err(DbError::Decode)
}

/// Embedded arrays (shares, versions, reactions) are stored as plain
/// objects with RFC 3339 timestamps and decoded through serde.
pub(crate) fn from_embedded<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, DbError> {
    let value = match value {
        serde_json::Value::Null => serde_json::Value::Array(Vec::new()),
        other => other,
    };
    serde_json::from_value(value).map_err(|e| DbError::Decode(e.to_string()))
}

/// Nested `option<...>` fields accept NONE but not NULL, so null-valued
/// keys are dropped before binding.
pub(crate) fn to_embedded<T: Serialize>(value: &T) -> Result<serde_json::Value, DbError> {
    let mut value = serde_json::to_value(value).map_err(|e| DbError::Decode(e.to_string()))?;
    strip_nulls(&mut value);
    Ok(value)
}

fn strip_nulls(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(strip_nulls);
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(strip_nulls),
        _ => {}
    }
}

/// Lower-cased search needle, or `None` for blank input.
pub(crate) fn needle(search: Option<String>) -> Option<String> {
    search
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
}
