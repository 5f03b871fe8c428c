use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::fetch;
use super::save::{Changes, Writer};
use super::schema_gen::{generate_create_table, generate_drop_table, generate_indexes};
use crate::error::{Error, Result};
use crate::mapping::{BodyAggregate, StationAggregate, SystemAggregate};
use crate::schema::{DependencyResolver, TableSchema};

/// SQLite-backed galaxy store. One instance per thread; open several for
/// parallel imports.
pub struct GalaxyStore {
    conn: Connection,
}

impl GalaxyStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        Self::open_with_timeout(db_path, Duration::from_millis(5000))
    }

    /// Open (creating if needed) with the given busy timeout
    pub fn open_with_timeout(db_path: &Path, busy_timeout: Duration) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(busy_timeout)?;
        Self::configure(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::configure(Connection::open_in_memory()?)
    }

    fn configure(conn: Connection) -> Result<Self> {
        // WAL lets import workers read while another one commits
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;",
        )?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Create all tables and FK indexes that do not exist yet
    pub fn create_tables(&self) -> Result<()> {
        let tables = resolve(DependencyResolver::new().creation_order())?;
        debug!(count = tables.len(), "creating tables");

        for schema in tables {
            self.conn.execute(&generate_create_table(schema), [])?;
            for index_sql in generate_indexes(schema) {
                self.conn.execute(&index_sql, [])?;
            }
        }
        Ok(())
    }

    /// Drop every table and create them again. Administrative use only.
    pub fn reset(&self) -> Result<()> {
        let tables = resolve(DependencyResolver::new().drop_order())?;
        info!(count = tables.len(), "dropping tables");
        for schema in tables {
            self.conn.execute(&generate_drop_table(schema), [])?;
        }
        self.create_tables()
    }

    /// Whether the schema has been created
    pub fn is_initialized(&self) -> Result<bool> {
        let found: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'system'",
                [],
                |r| r.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn count_rows(&self, table: &TableSchema) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.name);
        let count: i64 = self.conn.query_row(&sql, [], |r| r.get(0))?;
        Ok(count as u64)
    }

    /// Apply a system aggregate in one transaction
    pub fn apply_system(&mut self, aggregate: &SystemAggregate) -> Result<Changes> {
        self.in_transaction(|writer| writer.save_system(aggregate))
    }

    /// Apply a standalone body in one transaction
    pub fn apply_body(&mut self, aggregate: &BodyAggregate) -> Result<Changes> {
        self.in_transaction(|writer| writer.save_body_document(aggregate))
    }

    /// Apply a standalone station in one transaction
    pub fn apply_station(&mut self, aggregate: &StationAggregate) -> Result<Changes> {
        self.in_transaction(|writer| writer.save_station_document(aggregate))
    }

    /// Like [`Self::apply_system`], but abort and roll back if the
    /// statement work runs past `deadline`.
    pub fn apply_system_within(
        &mut self,
        aggregate: &SystemAggregate,
        deadline: Instant,
        budget: Duration,
    ) -> Result<Changes> {
        self.conn
            .progress_handler(1000, Some(move || Instant::now() >= deadline));
        let result = self.apply_system(aggregate);
        self.conn.progress_handler(0, None::<fn() -> bool>);

        match result {
            Err(Error::Storage(rusqlite::Error::SqliteFailure(err, _)))
                if err.code == rusqlite::ErrorCode::OperationInterrupted =>
            {
                Err(Error::Timeout {
                    key: aggregate.root.key(),
                    budget,
                })
            }
            other => other,
        }
    }

    /// Run `f` inside an immediate transaction: lookups and writes see a
    /// consistent store, and nothing is kept unless `f` succeeds.
    fn in_transaction<F>(&mut self, f: F) -> Result<Changes>
    where
        F: FnOnce(&mut Writer<'_>) -> Result<()>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changes = run(&tx, f)?;
        tx.commit()?;
        Ok(changes)
    }

    pub fn fetch_system(&self, id64: u64) -> Result<Option<SystemAggregate>> {
        fetch::fetch_system(&self.conn, id64)
    }

    pub fn fetch_body(&self, id64: u64) -> Result<Option<BodyAggregate>> {
        fetch::fetch_body(&self.conn, id64)
    }

    pub fn fetch_station(&self, id: u64) -> Result<Option<StationAggregate>> {
        fetch::fetch_station(&self.conn, id)
    }

    pub fn system_ids(&self) -> Result<Vec<u64>> {
        fetch::system_ids(&self.conn)
    }

    /// Finalize the database before closing
    pub fn finalize(self) -> Result<()> {
        self.conn.execute_batch("PRAGMA optimize;")?;
        Ok(())
    }
}

fn run<F>(tx: &Transaction<'_>, f: F) -> Result<Changes>
where
    F: FnOnce(&mut Writer<'_>) -> Result<()>,
{
    let mut writer = Writer::new(tx);
    f(&mut writer)?;
    Ok(writer.into_changes())
}

fn resolve(
    order: std::result::Result<Vec<&'static TableSchema>, String>,
) -> Result<Vec<&'static TableSchema>> {
    order.map_err(Error::Schema)
}
