//! SQLite-backed combination store and capacity ledger.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::warn;

use crate::capacity::{CapacityLedger, CapacitySnapshot};
use crate::metrics::TRANSITIONS;

use super::{
    Combination, CombinationFilter, CombinationKey, CombinationState, CombinationStatus,
    CombinationStore, Mutator, StoreError, TransitionError,
};

/// Row id of the single capacity counter.
const CAPACITY_ID: &str = "capacity_control";

const COLUMNS: &str =
    "enterprise_id, contract_id, version_id, state, retries, registered_at, last_updated, revision";

/// How long a writer waits for another process holding the database lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed combination store.
///
/// Several processes may open the same database file: every write runs in
/// an immediate transaction and is additionally guarded by the record's
/// `revision`, so concurrent schedulers and reconcilers never lose updates
/// or over-admit.
pub struct SqliteCombinationStore {
    conn: Mutex<Connection>,
}

impl SqliteCombinationStore {
    /// Open (or create) the database file and set the capacity ceiling.
    pub fn new(path: &Path, max_concurrent: u32) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::initialize(conn, max_concurrent)
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory(max_concurrent: u32) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize(conn, max_concurrent)
    }

    fn initialize(conn: Connection, max_concurrent: u32) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let _journal_mode: String =
            conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;

        Self::initialize_schema(&conn)?;

        conn.execute(
            "INSERT INTO capacity (id, in_use, max_concurrent) VALUES (?1, 0, ?2)
             ON CONFLICT(id) DO UPDATE SET max_concurrent = excluded.max_concurrent",
            params![CAPACITY_ID, max_concurrent],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS combinations (
                enterprise_id TEXT NOT NULL,
                contract_id TEXT NOT NULL,
                version_id TEXT NOT NULL,
                status TEXT NOT NULL,
                state TEXT NOT NULL,
                retries INTEGER NOT NULL DEFAULT 0,
                registered_at TEXT NOT NULL,
                last_updated TEXT NOT NULL,
                revision INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (enterprise_id, contract_id, version_id)
            );

            CREATE INDEX IF NOT EXISTS idx_combinations_status ON combinations(status);
            CREATE INDEX IF NOT EXISTS idx_combinations_enterprise ON combinations(enterprise_id);

            CREATE TABLE IF NOT EXISTS capacity (
                id TEXT PRIMARY KEY,
                in_use INTEGER NOT NULL DEFAULT 0 CHECK (in_use >= 0),
                max_concurrent INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection mutex poisoned".to_string()))
    }

    fn build_where_clause(filter: &CombinationFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if !filter.statuses.is_empty() {
            let placeholders = vec!["?"; filter.statuses.len()].join(", ");
            conditions.push(format!("status IN ({})", placeholders));
            for status in &filter.statuses {
                params.push(Box::new(status.as_str()));
            }
        }

        if let Some(ref enterprise_id) = filter.enterprise_id {
            conditions.push("enterprise_id = ?".to_string());
            params.push(Box::new(enterprise_id.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_combination(row: &rusqlite::Row) -> rusqlite::Result<(Combination, i64)> {
        let enterprise_id: String = row.get(0)?;
        let contract_id: String = row.get(1)?;
        let version_id: String = row.get(2)?;
        let state_json: String = row.get(3)?;
        let retries: u32 = row.get(4)?;
        let registered_at: String = row.get(5)?;
        let last_updated: String = row.get(6)?;
        let revision: i64 = row.get(7)?;

        let state: CombinationState = serde_json::from_str(&state_json)
            .map_err(|e| conversion_error(3, Box::new(e)))?;

        Ok((
            Combination {
                key: CombinationKey {
                    enterprise_id,
                    contract_id,
                    version_id,
                },
                state,
                retries,
                registered_at: parse_timestamp(5, &registered_at)?,
                last_updated: parse_timestamp(6, &last_updated)?,
            },
            revision,
        ))
    }

    fn select_one(
        conn: &Connection,
        key: &CombinationKey,
    ) -> Result<Option<(Combination, i64)>, StoreError> {
        let sql = format!(
            "SELECT {} FROM combinations WHERE enterprise_id = ?1 AND contract_id = ?2 AND version_id = ?3",
            COLUMNS
        );
        let row = conn
            .query_row(
                &sql,
                params![key.enterprise_id, key.contract_id, key.version_id],
                Self::row_to_combination,
            )
            .optional()?;
        Ok(row)
    }

    fn read_capacity(conn: &Connection) -> Result<CapacitySnapshot, StoreError> {
        let snapshot = conn.query_row(
            "SELECT in_use, max_concurrent FROM capacity WHERE id = ?1",
            params![CAPACITY_ID],
            |row| {
                Ok(CapacitySnapshot {
                    in_use: row.get(0)?,
                    max_concurrent: row.get(1)?,
                })
            },
        )?;
        Ok(snapshot)
    }

    /// Compare-and-increment; a single statement, so atomic on its own.
    fn acquire_slot(conn: &Connection) -> Result<bool, StoreError> {
        let changed = conn.execute(
            "UPDATE capacity SET in_use = in_use + 1 WHERE id = ?1 AND in_use < max_concurrent",
            params![CAPACITY_ID],
        )?;
        Ok(changed == 1)
    }

    fn release_slot(conn: &Connection) -> Result<bool, StoreError> {
        let changed = conn.execute(
            "UPDATE capacity SET in_use = in_use - 1 WHERE id = ?1 AND in_use > 0",
            params![CAPACITY_ID],
        )?;
        Ok(changed == 1)
    }
}

fn conversion_error(
    idx: usize,
    err: Box<dyn std::error::Error + Send + Sync + 'static>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, err)
}

fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, Box::new(e)))
}

fn serialize_state(state: &CombinationState) -> Result<String, StoreError> {
    serde_json::to_string(state).map_err(|e| StoreError::Unavailable(e.to_string()))
}

impl CombinationStore for SqliteCombinationStore {
    fn get(&self, key: &CombinationKey) -> Result<Option<Combination>, StoreError> {
        let conn = self.lock()?;
        Ok(Self::select_one(&conn, key)?.map(|(combination, _)| combination))
    }

    fn insert_if_absent(&self, initial: &Combination) -> Result<bool, StoreError> {
        if initial.holds_capacity() {
            return Err(StoreError::Transition(TransitionError::InvalidTransition {
                from: initial.status(),
                transition: "register",
            }));
        }

        let conn = self.lock()?;
        let changed = conn.execute(
            "INSERT INTO combinations (enterprise_id, contract_id, version_id, status, state, retries, registered_at, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(enterprise_id, contract_id, version_id) DO NOTHING",
            params![
                initial.key.enterprise_id,
                initial.key.contract_id,
                initial.key.version_id,
                initial.status().as_str(),
                serialize_state(&initial.state)?,
                initial.retries,
                initial.registered_at.to_rfc3339(),
                initial.last_updated.to_rfc3339(),
            ],
        )?;

        Ok(changed == 1)
    }

    fn update(
        &self,
        key: &CombinationKey,
        mutate: Mutator<'_>,
    ) -> Result<Combination, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let (current, revision) =
            Self::select_one(&tx, key)?.ok_or_else(|| StoreError::NotFound(key.id()))?;

        let mut next = mutate(&current)?;
        next.key = current.key.clone();

        match (current.holds_capacity(), next.holds_capacity()) {
            (false, true) => {
                if !Self::acquire_slot(&tx)? {
                    let snapshot = Self::read_capacity(&tx)?;
                    return Err(StoreError::CapacityExhausted {
                        in_use: snapshot.in_use,
                        max_concurrent: snapshot.max_concurrent,
                    });
                }
            }
            (true, false) => {
                if !Self::release_slot(&tx)? {
                    warn!(
                        "Capacity already at zero while releasing slot of {}",
                        key
                    );
                }
            }
            _ => {}
        }

        let changed = tx.execute(
            "UPDATE combinations
             SET status = ?1, state = ?2, retries = ?3, last_updated = ?4, revision = revision + 1
             WHERE enterprise_id = ?5 AND contract_id = ?6 AND version_id = ?7 AND revision = ?8",
            params![
                next.status().as_str(),
                serialize_state(&next.state)?,
                next.retries,
                next.last_updated.to_rfc3339(),
                key.enterprise_id,
                key.contract_id,
                key.version_id,
                revision,
            ],
        )?;
        if changed != 1 {
            return Err(StoreError::Conflict(key.id()));
        }

        tx.commit()?;

        if current.status() != next.status() {
            TRANSITIONS
                .with_label_values(&[current.status().as_str(), next.status().as_str()])
                .inc();
        }

        Ok(next)
    }

    fn list(&self, filter: &CombinationFilter) -> Result<Vec<Combination>, StoreError> {
        let conn = self.lock()?;
        let (where_clause, mut params) = Self::build_where_clause(filter);

        let sql = format!(
            "SELECT {} FROM combinations {} ORDER BY rowid ASC LIMIT ? OFFSET ?",
            COLUMNS, where_clause
        );
        params.push(Box::new(filter.limit));
        params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(param_refs.as_slice(), Self::row_to_combination)?;

        let mut combinations = Vec::new();
        for row in rows {
            let (combination, _) = row?;
            combinations.push(combination);
        }
        Ok(combinations)
    }

    fn count(&self, filter: &CombinationFilter) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!("SELECT COUNT(*) FROM combinations {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let count: i64 = conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))?;

        Ok(count as u64)
    }
}

impl CapacityLedger for SqliteCombinationStore {
    fn try_acquire(&self) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        Self::acquire_slot(&conn)
    }

    fn release(&self) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        Self::release_slot(&conn)
    }

    fn snapshot(&self) -> Result<CapacitySnapshot, StoreError> {
        let conn = self.lock()?;
        Self::read_capacity(&conn)
    }

    fn set_max_concurrent(&self, max_concurrent: u32) -> Result<CapacitySnapshot, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE capacity SET max_concurrent = ?1 WHERE id = ?2",
            params![max_concurrent, CAPACITY_ID],
        )?;
        Self::read_capacity(&conn)
    }

    fn recount(&self) -> Result<CapacitySnapshot, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let holding: i64 = tx.query_row(
            "SELECT COUNT(*) FROM combinations WHERE status IN (?1, ?2, ?3)",
            params![
                CombinationStatus::Preprocessing.as_str(),
                CombinationStatus::Preprocessed.as_str(),
                CombinationStatus::Processing.as_str(),
            ],
            |row| row.get(0),
        )?;
        tx.execute(
            "UPDATE capacity SET in_use = ?1 WHERE id = ?2",
            params![holding, CAPACITY_ID],
        )?;
        let snapshot = Self::read_capacity(&tx)?;
        tx.commit()?;

        Ok(snapshot)
    }
}
