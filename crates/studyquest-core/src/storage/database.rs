//! SQLite-based storage.
//!
//! Provides persistent storage for:
//! - The in-flight timer state
//! - Per-category study minutes
//! - Key-value store for the ledger and purchased boosters
//!
//! Several processes may hold connections to the same file. Every
//! read-modify-write goes through an `IMMEDIATE` transaction, so balances
//! are merged rather than overwritten and only one owner can end a session.

use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, warn};
use uuid::Uuid;

use super::data_dir;
use crate::error::{CoreError, DatabaseError, Result};
use crate::inventory::BoosterEffect;
use crate::ledger::Ledger;
use crate::ports::{CategoryLogStore, RewardSink, TimerStateStore, Wallet};
use crate::progress::{CategoryLog, DateRange};
use crate::rewards::RewardEvent;
use crate::timer::TimerState;

const TIMER_KEY: &str = "timer_state";
const LEDGER_KEY: &str = "ledger";
const EFFECTS_KEY: &str = "effects";
const DATE_FORMAT: &str = "%Y-%m-%d";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite database for study data.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `<data dir>/studyquest.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(&data_dir()?.join("studyquest.db"))
    }

    /// Open (or create) a database file at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS category_logs (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                category_id TEXT NOT NULL,
                date        TEXT NOT NULL,
                minutes     INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_category_logs_category_date
                ON category_logs(category_id, date);",
        )?;
        Ok(())
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        read_kv(&self.conn, key)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        write_kv(&self.conn, key, value)
    }

    /// Decode, modify and re-encode one JSON value while holding the write
    /// lock, so concurrent updates from other connections are not lost.
    fn kv_update<T, R>(&mut self, key: &str, f: impl FnOnce(&mut T) -> R) -> Result<R>
    where
        T: Serialize + DeserializeOwned + Default,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut value = match read_kv(&tx, key)? {
            Some(json) => serde_json::from_str(&json)?,
            None => T::default(),
        };
        let out = f(&mut value);
        write_kv(&tx, key, &serde_json::to_string(&value)?)?;
        tx.commit()?;
        Ok(out)
    }

    /// The saved ledger, or an empty one on first run.
    pub fn load_ledger(&self) -> Result<Ledger> {
        match self.kv_get(LEDGER_KEY)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Ledger::default()),
        }
    }

    pub fn save_ledger(&self, ledger: &Ledger) -> Result<()> {
        self.kv_set(LEDGER_KEY, &serde_json::to_string(ledger)?)?;
        Ok(())
    }

    /// Apply `f` to the latest stored ledger atomically.
    pub fn update_ledger<R>(&mut self, f: impl FnOnce(&mut Ledger) -> R) -> Result<R> {
        self.kv_update(LEDGER_KEY, f)
    }

    /// Purchased boosters in registration order.
    pub fn load_effects(&self) -> Result<Vec<BoosterEffect>> {
        match self.kv_get(EFFECTS_KEY)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn save_effects(&self, effects: &[BoosterEffect]) -> Result<()> {
        self.kv_set(EFFECTS_KEY, &serde_json::to_string(effects)?)?;
        Ok(())
    }

    /// Apply `f` to the latest stored boosters atomically.
    pub fn update_effects<R>(&mut self, f: impl FnOnce(&mut Vec<BoosterEffect>) -> R) -> Result<R> {
        self.kv_update(EFFECTS_KEY, f)
    }

    /// Every log entry in `range`, all categories, oldest first.
    pub fn logs_in_range(&self, range: DateRange) -> Result<Vec<CategoryLog>> {
        let mut stmt = self.conn.prepare(
            "SELECT category_id, date, minutes FROM category_logs
             WHERE date >= ?1 AND date < ?2
             ORDER BY date, id",
        )?;
        let rows = stmt.query_map(
            params![
                range.start.format(DATE_FORMAT).to_string(),
                range.end.format(DATE_FORMAT).to_string()
            ],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u32>(2)?,
                ))
            },
        )?;
        collect_logs(rows)
    }
}

fn read_kv(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
        row.get::<_, String>(0)
    })
    .optional()
}

fn write_kv(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
        params![key, value],
    )?;
    Ok(())
}

fn collect_logs(
    rows: impl Iterator<Item = Result<(String, String, u32), rusqlite::Error>>,
) -> Result<Vec<CategoryLog>> {
    let mut logs = Vec::new();
    for row in rows {
        let (category_id, date, minutes) = row?;
        let date = NaiveDate::parse_from_str(&date, DATE_FORMAT).map_err(|e| {
            DatabaseError::QueryFailed(format!("bad date '{date}' in category_logs: {e}"))
        })?;
        logs.push(CategoryLog {
            category_id,
            date,
            minutes,
        });
    }
    Ok(logs)
}

impl TimerStateStore for Database {
    fn load_timer_state(&self) -> Result<Option<TimerState>> {
        match self.kv_get(TIMER_KEY)? {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| CoreError::CorruptPersistedState(e.to_string())),
            None => Ok(None),
        }
    }

    fn save_timer_state(&mut self, state: &TimerState) -> Result<()> {
        self.kv_set(TIMER_KEY, &serde_json::to_string(state)?)?;
        Ok(())
    }

    fn release_session(&mut self, session_id: Uuid) -> Result<bool> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let owned = match read_kv(&tx, TIMER_KEY)? {
            Some(json) => serde_json::from_str::<TimerState>(&json)
                .map_or(true, |state| state.is_running_session(session_id)),
            None => false,
        };
        if owned {
            write_kv(&tx, TIMER_KEY, &serde_json::to_string(&TimerState::idle())?)?;
        }
        tx.commit()?;
        Ok(owned)
    }
}

/// A database connection is itself a ledger: every credit and debit is
/// applied to the stored balances immediately.
impl RewardSink for Database {
    fn on_reward_earned(&mut self, reward: &RewardEvent) {
        if let Err(e) = self.update_ledger(|ledger| ledger.on_reward_earned(reward)) {
            error!(error = %e, xp = reward.final_xp, "failed to credit reward");
        }
    }
}

impl Wallet for Database {
    fn try_spend(&mut self, coins: u64) -> bool {
        self.update_ledger(|ledger| ledger.try_spend(coins))
            .unwrap_or_else(|e| {
                warn!(error = %e, coins, "failed to debit wallet");
                false
            })
    }
}

impl CategoryLogStore for Database {
    fn load_category_logs(&self, category_id: &str, range: DateRange) -> Result<Vec<CategoryLog>> {
        let mut stmt = self.conn.prepare(
            "SELECT category_id, date, minutes FROM category_logs
             WHERE category_id = ?1 AND date >= ?2 AND date < ?3
             ORDER BY date, id",
        )?;
        let rows = stmt.query_map(
            params![
                category_id,
                range.start.format(DATE_FORMAT).to_string(),
                range.end.format(DATE_FORMAT).to_string()
            ],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u32>(2)?,
                ))
            },
        )?;
        collect_logs(rows)
    }

    fn append_category_log(&mut self, entry: CategoryLog) -> Result<()> {
        self.conn.execute(
            "INSERT INTO category_logs (category_id, date, minutes) VALUES (?1, ?2, ?3)",
            params![
                entry.category_id,
                entry.date.format(DATE_FORMAT).to_string(),
                entry.minutes
            ],
        )?;
        Ok(())
    }
}
