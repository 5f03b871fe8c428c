//! Bidirectional mapping between dump documents and the entity model
//!
//! Each entity has a `decode_*` function (external JSON → entity) and an
//! `encode_*` function (entity → external JSON). The structural rules:
//! - `coords {x, y, z}` ↔ three scalar columns
//! - `{name: value}` objects ↔ lists of named rows (compositions,
//!   materials, timestamps, economies, signal counts)
//! - single-entry `{"Star": 0}` parent objects ↔ `(kind, body_id)` rows
//! - `landingPads {large, medium, small}` ↔ three scalar columns
//! - station `controllingFaction` name ↔ faction reference
//! - null or empty optional values are omitted on encode

mod body;
mod faction;
mod station;
mod system;
mod time;

pub use body::{decode_body, encode_body};
pub use faction::{
    decode_controlling_faction, decode_faction_state, decode_thargoid_war, encode_faction_state,
    encode_thargoid_war,
};
pub use station::{decode_station, encode_station};
pub use system::{
    dump_body, dump_station, dump_system, load_body, load_station, load_system, repair,
    Aggregate, BodyAggregate, StationAggregate, SystemAggregate,
};
pub use time::{format_timestamp, parse_timestamp};

use chrono::{DateTime, Utc};
use serde_json::{Map, Number, Value};

use crate::error::{Error, Result};

/// Typed access to the fields of one external JSON object.
///
/// Every error names the entity type and, once known, its natural key.
pub(crate) struct Fields<'a> {
    entity: &'static str,
    key: String,
    map: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    pub fn new(entity: &'static str, value: &'a Value) -> Result<Self> {
        match value.as_object() {
            Some(map) => Ok(Self {
                entity,
                key: String::new(),
                map,
            }),
            None => Err(Error::decode(
                entity,
                "",
                format!("expected an object, found {}", kind_of(value)),
            )),
        }
    }

    /// Attach the natural key used in subsequent error messages
    pub fn keyed(mut self, key: impl ToString) -> Self {
        self.key = key.to_string();
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn error(&self, message: impl Into<String>) -> Error {
        Error::decode(self.entity, &self.key, message)
    }

    /// Present and not null
    pub fn get(&self, field: &str) -> Option<&'a Value> {
        self.map.get(field).filter(|v| !v.is_null())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.map.contains_key(field)
    }

    fn required(&self, field: &str) -> Result<&'a Value> {
        self.get(field)
            .ok_or_else(|| self.error(format!("missing required field '{}'", field)))
    }

    fn mismatch(&self, field: &str, expected: &str, found: &Value) -> Error {
        self.error(format!(
            "field '{}' should be {}, found {}",
            field,
            expected,
            kind_of(found)
        ))
    }

    pub fn req_str(&self, field: &str) -> Result<String> {
        let v = self.required(field)?;
        v.as_str()
            .map(str::to_string)
            .ok_or_else(|| self.mismatch(field, "a string", v))
    }

    pub fn opt_str(&self, field: &str) -> Result<Option<String>> {
        self.get(field)
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| self.mismatch(field, "a string", v))
            })
            .transpose()
    }

    pub fn req_u64(&self, field: &str) -> Result<u64> {
        let v = self.required(field)?;
        v.as_u64()
            .ok_or_else(|| self.mismatch(field, "an unsigned integer", v))
    }

    pub fn opt_u64(&self, field: &str) -> Result<Option<u64>> {
        self.get(field)
            .map(|v| {
                v.as_u64()
                    .ok_or_else(|| self.mismatch(field, "an unsigned integer", v))
            })
            .transpose()
    }

    pub fn req_i64(&self, field: &str) -> Result<i64> {
        let v = self.required(field)?;
        as_whole(v).ok_or_else(|| self.mismatch(field, "an integer", v))
    }

    pub fn opt_i64(&self, field: &str) -> Result<Option<i64>> {
        self.get(field)
            .map(|v| as_whole(v).ok_or_else(|| self.mismatch(field, "an integer", v)))
            .transpose()
    }

    pub fn req_f64(&self, field: &str) -> Result<f64> {
        let v = self.required(field)?;
        v.as_f64().ok_or_else(|| self.mismatch(field, "a number", v))
    }

    pub fn opt_f64(&self, field: &str) -> Result<Option<f64>> {
        self.get(field)
            .map(|v| v.as_f64().ok_or_else(|| self.mismatch(field, "a number", v)))
            .transpose()
    }

    pub fn opt_bool(&self, field: &str) -> Result<Option<bool>> {
        self.get(field)
            .map(|v| v.as_bool().ok_or_else(|| self.mismatch(field, "a boolean", v)))
            .transpose()
    }

    pub fn req_time(&self, field: &str) -> Result<DateTime<Utc>> {
        let v = self.required(field)?;
        self.time_value(field, v)
    }

    fn time_value(&self, field: &str, v: &Value) -> Result<DateTime<Utc>> {
        let s = v
            .as_str()
            .ok_or_else(|| self.mismatch(field, "a date/time string", v))?;
        parse_timestamp(s)
            .ok_or_else(|| self.error(format!("field '{}' has unreadable date/time {:?}", field, s)))
    }

    pub fn opt_object(&self, field: &str) -> Result<Option<&'a Map<String, Value>>> {
        self.get(field)
            .map(|v| v.as_object().ok_or_else(|| self.mismatch(field, "an object", v)))
            .transpose()
    }

    /// An optional array; missing or null reads as empty
    pub fn array(&self, field: &str) -> Result<&'a [Value]> {
        match self.get(field) {
            None => Ok(&[]),
            Some(v) => v
                .as_array()
                .map(Vec::as_slice)
                .ok_or_else(|| self.mismatch(field, "an array", v)),
        }
    }

    /// An optional array of strings; missing or null reads as empty
    pub fn strings(&self, field: &str) -> Result<Vec<String>> {
        self.array(field)?
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| self.mismatch(field, "a list of strings", v))
            })
            .collect()
    }

    /// Collapse a `{name: value}` object into rows; missing reads as empty
    pub fn pairs<T>(
        &self,
        field: &str,
        mut row: impl FnMut(&str, &Value) -> Option<T>,
    ) -> Result<Vec<T>> {
        let Some(map) = self.opt_object(field)? else {
            return Ok(Vec::new());
        };
        map.iter()
            .map(|(name, value)| {
                row(name, value).ok_or_else(|| {
                    self.error(format!(
                        "field '{}' has unexpected value {} for '{}'",
                        field, value, name
                    ))
                })
            })
            .collect()
    }

    pub fn time_pairs(&self, field: &str) -> Result<Vec<(String, DateTime<Utc>)>> {
        let Some(map) = self.opt_object(field)? else {
            return Ok(Vec::new());
        };
        map.iter()
            .map(|(name, v)| Ok((name.clone(), self.time_value(field, v)?)))
            .collect()
    }
}

/// Builder for an external JSON object in the producer's key order.
///
/// The `opt`/`list` setters implement the sparse convention: `None` and
/// empty collections are simply not written.
#[derive(Default)]
pub(crate) struct Out {
    map: Map<String, Value>,
}

impl Out {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        self.map.insert(field.to_string(), value.into());
        self
    }

    pub fn num(&mut self, field: &str, value: f64) -> &mut Self {
        self.map.insert(field.to_string(), number(value));
        self
    }

    pub fn time(&mut self, field: &str, value: &DateTime<Utc>) -> &mut Self {
        self.put(field, format_timestamp(value))
    }

    pub fn opt<T: Into<Value>>(&mut self, field: &str, value: Option<T>) -> &mut Self {
        if let Some(v) = value {
            self.put(field, v);
        }
        self
    }

    pub fn opt_num(&mut self, field: &str, value: Option<f64>) -> &mut Self {
        if let Some(v) = value {
            self.num(field, v);
        }
        self
    }

    pub fn list(&mut self, field: &str, items: Vec<Value>) -> &mut Self {
        if !items.is_empty() {
            self.put(field, Value::Array(items));
        }
        self
    }

    pub fn pairs(&mut self, field: &str, pairs: Map<String, Value>) -> &mut Self {
        if !pairs.is_empty() {
            self.put(field, Value::Object(pairs));
        }
        self
    }

    pub fn build(&mut self) -> Value {
        Value::Object(std::mem::take(&mut self.map))
    }
}

/// Float to JSON number; non-finite values become null
pub(crate) fn number(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}

/// Write whole floats as integers (`0.0` → `0`), as the producer does
/// for distances and weights
pub(crate) fn whole_number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        Value::from(value as i64)
    } else {
        number(value)
    }
}

/// Integer, or a float with no fractional part
fn as_whole(v: &Value) -> Option<i64> {
    v.as_i64().or_else(|| {
        v.as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e18)
            .map(|f| f as i64)
    })
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Remove null and empty-collection values from an encoded object, except
/// for the listed keys which the producer always writes.
pub fn prune(value: &mut Value, keep: &[&str]) {
    if let Value::Object(map) = value {
        map.retain(|k, v| keep.contains(&k.as_str()) || !is_empty(v));
    }
}

fn is_empty(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}
