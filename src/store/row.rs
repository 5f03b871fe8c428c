//! Schema-driven rows and the handful of statements the store needs:
//! point lookup, child lookup, insert, update and delete.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, ErrorCode, ToSql};
use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::mapping::parse_timestamp;
use crate::schema::TableSchema;

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    pub fn bind_to(&self, idx: usize, stmt: &mut rusqlite::Statement) -> rusqlite::Result<()> {
        match self {
            SqlValue::Null => stmt.raw_bind_parameter(idx, rusqlite::types::Null)?,
            SqlValue::Integer(i) => stmt.raw_bind_parameter(idx, i)?,
            SqlValue::Real(f) => stmt.raw_bind_parameter(idx, f)?,
            SqlValue::Text(s) => stmt.raw_bind_parameter(idx, s.as_str())?,
        }
        Ok(())
    }

    fn from_ref(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(i) => SqlValue::Integer(i),
            ValueRef::Real(f) => SqlValue::Real(f),
            ValueRef::Text(t) | ValueRef::Blob(t) => {
                SqlValue::Text(String::from_utf8_lossy(t).into_owned())
            }
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            SqlValue::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            SqlValue::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Integer(i) => write!(f, "{}", i),
            SqlValue::Real(r) => write!(f, "{}", r),
            SqlValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

/// External 64-bit ids keep their bit pattern in SQLite's signed INTEGER
impl From<u64> for SqlValue {
    fn from(v: u64) -> Self {
        SqlValue::Integer(v as i64)
    }
}

impl From<usize> for SqlValue {
    fn from(v: usize) -> Self {
        SqlValue::Integer(v as i64)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Integer(if v { 1 } else { 0 })
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&String> for SqlValue {
    fn from(v: &String) -> Self {
        SqlValue::Text(v.clone())
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Text(v.to_rfc3339_opts(SecondsFormat::Micros, true))
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// One row of a table, keyed by column name
#[derive(Debug, Clone, Default)]
pub struct Row {
    table: &'static str,
    values: HashMap<&'static str, SqlValue>,
}

impl Row {
    pub fn new(schema: &TableSchema) -> Self {
        Self {
            table: schema.name,
            values: HashMap::new(),
        }
    }

    pub fn set(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.values.insert(column, value.into());
        self
    }

    pub fn get(&self, column: &str) -> &SqlValue {
        self.values.get(column).unwrap_or(&SqlValue::Null)
    }

    pub fn is_null(&self, column: &str) -> bool {
        matches!(self.get(column), SqlValue::Null)
    }

    fn invalid(&self, column: &str, expected: &str) -> Error {
        Error::Storage(rusqlite::Error::InvalidColumnName(format!(
            "{}.{} should hold {}, found {:?}",
            self.table,
            column,
            expected,
            self.get(column)
        )))
    }

    pub fn opt_int(&self, column: &str) -> Result<Option<i64>> {
        match self.get(column) {
            SqlValue::Null => Ok(None),
            SqlValue::Integer(i) => Ok(Some(*i)),
            _ => Err(self.invalid(column, "an integer")),
        }
    }

    pub fn int(&self, column: &str) -> Result<i64> {
        self.opt_int(column)?
            .ok_or_else(|| self.invalid(column, "an integer"))
    }

    pub fn opt_id(&self, column: &str) -> Result<Option<u64>> {
        Ok(self.opt_int(column)?.map(|i| i as u64))
    }

    pub fn id(&self, column: &str) -> Result<u64> {
        Ok(self.int(column)? as u64)
    }

    pub fn opt_real(&self, column: &str) -> Result<Option<f64>> {
        match self.get(column) {
            SqlValue::Null => Ok(None),
            SqlValue::Real(f) => Ok(Some(*f)),
            SqlValue::Integer(i) => Ok(Some(*i as f64)),
            _ => Err(self.invalid(column, "a number")),
        }
    }

    pub fn real(&self, column: &str) -> Result<f64> {
        self.opt_real(column)?
            .ok_or_else(|| self.invalid(column, "a number"))
    }

    pub fn opt_bool(&self, column: &str) -> Result<Option<bool>> {
        Ok(self.opt_int(column)?.map(|i| i != 0))
    }

    pub fn opt_text(&self, column: &str) -> Result<Option<String>> {
        match self.get(column) {
            SqlValue::Null => Ok(None),
            SqlValue::Text(s) => Ok(Some(s.clone())),
            _ => Err(self.invalid(column, "text")),
        }
    }

    pub fn text(&self, column: &str) -> Result<String> {
        self.opt_text(column)?
            .ok_or_else(|| self.invalid(column, "text"))
    }

    pub fn opt_time(&self, column: &str) -> Result<Option<DateTime<Utc>>> {
        match self.opt_text(column)? {
            None => Ok(None),
            Some(s) => parse_timestamp(&s)
                .map(Some)
                .ok_or_else(|| self.invalid(column, "a timestamp")),
        }
    }

    pub fn time(&self, column: &str) -> Result<DateTime<Utc>> {
        self.opt_time(column)?
            .ok_or_else(|| self.invalid(column, "a timestamp"))
    }

    fn key_values(&self, schema: &TableSchema) -> Vec<SqlValue> {
        schema
            .primary_key
            .iter()
            .map(|c| self.get(c).clone())
            .collect()
    }

    fn describe_key(&self, schema: &TableSchema) -> String {
        self.key_values(schema)
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("/")
    }
}

fn where_clause(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| format!("{} IS ?", c))
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn read_rows(
    conn: &Connection,
    schema: &TableSchema,
    sql: &str,
    params: &[SqlValue],
) -> Result<Vec<Row>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(params_from_iter(params.iter()), |r| {
        let mut row = Row::new(schema);
        for (idx, column) in schema.columns.iter().enumerate() {
            row.values
                .insert(column.name, SqlValue::from_ref(r.get_ref(idx)?));
        }
        Ok(row)
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn select_sql(schema: &TableSchema, filter: &[&str]) -> String {
    let columns: Vec<_> = schema.column_names().collect();
    format!(
        "SELECT {} FROM {} WHERE {} ORDER BY rowid",
        columns.join(", "),
        schema.name,
        where_clause(filter)
    )
}

/// Point lookup by primary key
pub fn select_one(
    conn: &Connection,
    schema: &TableSchema,
    key: &[SqlValue],
) -> Result<Option<Row>> {
    let sql = select_sql(schema, schema.primary_key);
    Ok(read_rows(conn, schema, &sql, key)?.into_iter().next())
}

/// Rows matching all `column IS value` pairs, in insertion order
pub fn select_where(
    conn: &Connection,
    schema: &TableSchema,
    columns: &[&str],
    values: &[SqlValue],
) -> Result<Vec<Row>> {
    let sql = select_sql(schema, columns);
    read_rows(conn, schema, &sql, values)
}

/// Plain INSERT. A duplicate key is reported as [`Error::Uniqueness`].
pub fn insert(conn: &Connection, schema: &TableSchema, row: &Row) -> Result<()> {
    let columns: Vec<_> = schema.column_names().collect();
    let placeholders: Vec<&str> = columns.iter().map(|_| "?").collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        schema.name,
        columns.join(", "),
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare_cached(&sql)?;
    for (idx, column) in columns.iter().enumerate() {
        row.get(column).bind_to(idx + 1, &mut stmt)?;
    }
    match stmt.raw_execute() {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == ErrorCode::ConstraintViolation
                && matches!(
                    err.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                        | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                ) =>
        {
            Err(Error::Uniqueness {
                table: schema.name,
                key: row.describe_key(schema),
            })
        }
        Err(e) => Err(e.into()),
    }
}

/// UPDATE every non-key column of the row addressed by its primary key
pub fn update(conn: &Connection, schema: &TableSchema, row: &Row) -> Result<usize> {
    let columns: Vec<_> = schema.value_columns().collect();
    let sql = format!(
        "UPDATE {} SET {} WHERE {}",
        schema.name,
        columns
            .iter()
            .map(|c| format!("{} = ?", c))
            .collect::<Vec<_>>()
            .join(", "),
        where_clause(schema.primary_key)
    );

    let params: Vec<SqlValue> = columns
        .iter()
        .map(|c| row.get(c).clone())
        .chain(row.key_values(schema))
        .collect();
    let mut stmt = conn.prepare_cached(&sql)?;
    Ok(stmt.execute(params_from_iter(params.iter()))?)
}

pub fn delete_where(
    conn: &Connection,
    schema: &TableSchema,
    columns: &[&str],
    values: &[SqlValue],
) -> Result<usize> {
    let sql = format!("DELETE FROM {} WHERE {}", schema.name, where_clause(columns));
    let mut stmt = conn.prepare_cached(&sql)?;
    Ok(stmt.execute(params_from_iter(values.iter()))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tables::FACTION;
    use crate::store::schema_gen::generate_create_table;

    fn faction_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(&generate_create_table(&FACTION), []).unwrap();
        conn
    }

    #[test]
    fn test_u64_keeps_bit_pattern() {
        let id = u64::MAX - 5;
        let value = SqlValue::from(id);
        let row = Row::new(&FACTION).set("name", value);
        assert_eq!(row.opt_id("name").unwrap(), Some(id));
    }

    #[test]
    fn test_insert_select_update() {
        let conn = faction_db();
        let row = Row::new(&FACTION)
            .set("name", "Alpha")
            .set("allegiance", Some("Independent"))
            .set("government", None::<String>);
        insert(&conn, &FACTION, &row).unwrap();

        let key = [SqlValue::from("Alpha")];
        let stored = select_one(&conn, &FACTION, &key).unwrap().unwrap();
        assert_eq!(stored.opt_text("allegiance").unwrap().as_deref(), Some("Independent"));
        assert!(stored.is_null("government"));

        let changed = update(&conn, &FACTION, &row.set("government", "Cooperative")).unwrap();
        assert_eq!(changed, 1);
        let stored = select_one(&conn, &FACTION, &key).unwrap().unwrap();
        assert_eq!(stored.text("government").unwrap(), "Cooperative");
    }

    #[test]
    fn test_duplicate_insert_is_a_uniqueness_error() {
        let conn = faction_db();
        let row = Row::new(&FACTION).set("name", "Alpha");
        insert(&conn, &FACTION, &row).unwrap();
        match insert(&conn, &FACTION, &row) {
            Err(Error::Uniqueness { table, key }) => {
                assert_eq!(table, "faction");
                assert_eq!(key, "Alpha");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_select_where_matches_null() {
        let conn = faction_db();
        insert(&conn, &FACTION, &Row::new(&FACTION).set("name", "A")).unwrap();
        insert(
            &conn,
            &FACTION,
            &Row::new(&FACTION).set("name", "B").set("allegiance", "Empire"),
        )
        .unwrap();

        let rows = select_where(&conn, &FACTION, &["allegiance"], &[SqlValue::Null]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text("name").unwrap(), "A");

        let removed = delete_where(&conn, &FACTION, &["allegiance"], &["Empire".into()]).unwrap();
        assert_eq!(removed, 1);
    }

    #[test]
    fn test_timestamps_survive_storage() {
        let t = parse_timestamp("2023-06-12 05:05:24.5+00").unwrap();
        let row = Row::new(&FACTION).set("name", t);
        assert_eq!(row.time("name").unwrap(), t);
    }
}
