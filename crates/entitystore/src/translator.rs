//! Filter and order translation.
//!
//! Converts a declarative [`Filter`] / [`Order`] into the document backend's
//! query and sort documents, using the entity's attribute types:
//! - `ID` values become native keys, and the identity attribute is renamed to
//!   the primary-key field
//! - `Date` values select the whole local calendar day,
//!   `{ $gte: 00:00:00.000, $lte: 23:59:59.999 }`
//! - everything else is matched by value

use bson::{doc, Bson, Document};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use entitystore_common::StoreError;

use crate::core::{Filter, Order, Value};
use crate::entity::{AttributeType, Entity};
use crate::identity::{self, PRIMARY_KEY};
use crate::mapper::value_to_bson;

/// Backend field name for attribute `name`
#[must_use]
pub fn field_name<'a>(model: &Entity, name: &'a str) -> &'a str {
    if model.is_identity(name) {
        PRIMARY_KEY
    } else {
        name
    }
}

/// Translate a filter into a query document
pub fn translate_filter(model: &Entity, filter: &Filter) -> Result<Document, StoreError> {
    let mut query = Document::new();
    for (name, value) in filter.iter() {
        let condition = match model.attribute_type(name) {
            Some(AttributeType::Id) => id_condition(name, value)?,
            Some(AttributeType::Date) if !value.is_null() => date_condition(name, value)?,
            _ => value_to_bson(value),
        };
        query.insert(field_name(model, name), condition);
    }
    Ok(query)
}

/// Translate an ordering into a sort document
#[must_use]
pub fn translate_order(model: &Entity, order: &Order) -> Document {
    let mut sort = Document::new();
    for (name, direction) in order.iter() {
        sort.insert(field_name(model, name), direction.as_i32());
    }
    sort
}

/// Type-check an id filter value: a string id, or null for "unset".
pub fn id_filter_value<'a>(name: &str, value: &'a Value) -> Result<Option<&'a str>, StoreError> {
    match value {
        Value::Null => Ok(None),
        Value::String(id) => Ok(Some(id)),
        other => Err(StoreError::InvalidFilter(format!(
            "{name} expects an id string, got {}",
            other.type_name()
        ))),
    }
}

fn id_condition(name: &str, value: &Value) -> Result<Bson, StoreError> {
    match id_filter_value(name, value)? {
        Some(id) => Ok(Bson::ObjectId(identity::to_native(id)?)),
        None => Ok(Bson::Null),
    }
}

fn date_condition(name: &str, value: &Value) -> Result<Bson, StoreError> {
    let day = filter_day(name, value)?;
    let (lower, upper) = day_bounds(day)?;
    Ok(Bson::Document(doc! {
        "$gte": bson::DateTime::from_millis(lower.timestamp_millis()),
        "$lte": bson::DateTime::from_millis(upper.timestamp_millis()),
    }))
}

/// The local calendar day a date filter value selects.
///
/// Accepts a date, or a string in `YYYY-MM-DD` or RFC 3339 form.
pub fn filter_day(name: &str, value: &Value) -> Result<NaiveDate, StoreError> {
    match value {
        Value::Date(d) => Ok(d.with_timezone(&Local).date_naive()),
        Value::String(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .or_else(|_| {
                DateTime::parse_from_rfc3339(s).map(|d| d.with_timezone(&Local).date_naive())
            })
            .map_err(|_| StoreError::InvalidFilter(format!("{name}: not a date: {s}"))),
        other => Err(StoreError::InvalidFilter(format!(
            "{name} expects a date, got {}",
            other.type_name()
        ))),
    }
}

/// First and last millisecond of `day` in local time, as UTC instants.
pub fn day_bounds(day: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>), StoreError> {
    let start = NaiveTime::from_hms_milli_opt(0, 0, 0, 0);
    let end = NaiveTime::from_hms_milli_opt(23, 59, 59, 999);
    match (start, end) {
        (Some(start), Some(end)) => Ok((
            local_instant(day.and_time(start), true)?,
            local_instant(day.and_time(end), false)?,
        )),
        _ => Err(StoreError::InvalidFilter(format!("no bounds for {day}"))),
    }
}

// A wall-clock time can be skipped or repeated around DST changes.
fn local_instant(naive: NaiveDateTime, earliest: bool) -> Result<DateTime<Utc>, StoreError> {
    let resolved = Local.from_local_datetime(&naive);
    let picked = if earliest {
        resolved.earliest()
    } else {
        resolved.latest()
    };
    picked
        .or_else(|| Local.from_local_datetime(&(naive + chrono::Duration::hours(1))).earliest())
        .map(|d| d.with_timezone(&Utc))
        .ok_or_else(|| StoreError::InvalidFilter(format!("no local time {naive}")))
}
