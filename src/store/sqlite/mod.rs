mod decimal;
mod schema;

use parking_lot::Mutex;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Type, ValueRef};
use rusqlite::{params, Connection, Row, ToSql, TransactionBehavior};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, Instant};

use super::{AmountUpdate, Consistency, RecordStore, StoreSession, SummaryStore};
use crate::engine::Stage;
use crate::error::{StoreError, SummaryError};
use crate::models::*;

use decimal::DECIMAL_SUM;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

macro_rules! sql_id {
    ($($name:ident),*) => {
        $(
            impl ToSql for $name {
                fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                    Ok(ToSqlOutput::from(self.to_string()))
                }
            }

            impl FromSql for $name {
                fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    value
                        .as_str()?
                        .parse()
                        .map_err(|e| FromSqlError::Other(Box::new(e)))
                }
            }
        )*
    };
}

sql_id!(UserId, CategoryId, ChargeId, CredentialId);

/// Relational backend on SQLite.
///
/// A single connection sits behind a mutex; [`SummaryStore::with_transaction`]
/// holds it for the whole transaction and opens it with `BEGIN IMMEDIATE`, so
/// recomputes for the same user never interleave. Waiting for the mutex and
/// for SQLite's write lock both stop at the caller's deadline.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    busy_timeout: Duration,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::open_with_busy_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    pub fn open_with_busy_timeout(path: &Path, busy_timeout: Duration) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(busy_timeout)?;
        Self::init(conn, busy_timeout)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
        Self::init(conn, DEFAULT_BUSY_TIMEOUT)
    }

    fn init(mut conn: Connection, busy_timeout: Duration) -> Result<Self, StoreError> {
        decimal::register(&conn)?;
        migrate(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            busy_timeout,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> T) -> T {
        f(&*self.conn.lock())
    }
}

fn migrate(conn: &mut Connection) -> Result<(), StoreError> {
    let has_version_table: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !has_version_table {
        let tx = conn.transaction()?;
        tx.execute_batch(schema::SCHEMA)?;
        tx.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            params![schema::CURRENT_VERSION],
        )?;
        tx.commit()?;
        tracing::info!(version = schema::CURRENT_VERSION, "created database schema");
        return Ok(());
    }

    let current: i32 =
        match conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        }) {
            Ok(v) => v,
            Err(rusqlite::Error::QueryReturnedNoRows) => 0,
            Err(e) => return Err(e.into()),
        };

    if current >= schema::CURRENT_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for &(from_version, sql) in schema::MIGRATIONS {
        if current <= from_version {
            tx.execute_batch(sql)?;
        }
    }
    tx.execute("DELETE FROM schema_version", [])?;
    tx.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        params![schema::CURRENT_VERSION],
    )?;
    tx.commit()?;
    tracing::info!(
        from = current,
        to = schema::CURRENT_VERSION,
        "migrated database schema"
    );
    Ok(())
}

fn decimal_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        credential_id: row.get(1)?,
        name: row.get(2)?,
        total_amount: decimal_at(row, 3)?,
        total_allotment: decimal_at(row, 4)?,
    })
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        allotment: decimal_at(row, 3)?,
        amount: decimal_at(row, 4)?,
    })
}

fn charge_from_row(row: &Row<'_>) -> rusqlite::Result<Charge> {
    Ok(Charge {
        id: row.get(0)?,
        user_id: row.get(1)?,
        category_id: row.get(2)?,
        description: row.get(3)?,
        amount: decimal_at(row, 4)?,
        date: row.get(5)?,
    })
}

const USER_COLUMNS: &str = "id, credential_id, name, total_amount, total_allotment";
const CATEGORY_COLUMNS: &str = "id, user_id, title, allotment, amount";
const CHARGE_COLUMNS: &str = "id, user_id, category_id, description, amount, date";

impl SummaryStore for SqliteStore {
    fn consistency(&self) -> Consistency {
        Consistency::Transactional
    }

    fn with_transaction<T, F>(&self, deadline: Option<Instant>, f: F) -> Result<T, SummaryError>
    where
        F: FnOnce(&mut dyn StoreSession) -> Result<T, SummaryError>,
    {
        let mut conn = match deadline {
            Some(deadline) => self.conn.try_lock_until(deadline).ok_or_else(|| {
                tracing::warn!("deadline passed waiting for the database connection");
                SummaryError::DeadlineExceeded(Stage::Start)
            })?,
            None => self.conn.lock(),
        };

        let busy_timeout = match deadline {
            Some(deadline) => self
                .busy_timeout
                .min(deadline.saturating_duration_since(Instant::now())),
            None => self.busy_timeout,
        };
        conn.busy_timeout(busy_timeout).map_err(StoreError::from)?;
        let result = run_transaction(&mut conn, deadline, f);
        if busy_timeout != self.busy_timeout {
            if let Err(e) = conn.busy_timeout(self.busy_timeout) {
                tracing::error!(error = %e, "failed to restore busy timeout");
            }
        }
        result
    }
}

fn run_transaction<T, F>(
    conn: &mut Connection,
    deadline: Option<Instant>,
    f: F,
) -> Result<T, SummaryError>
where
    F: FnOnce(&mut dyn StoreSession) -> Result<T, SummaryError>,
{
    let tx = match conn.transaction_with_behavior(TransactionBehavior::Immediate) {
        Ok(tx) => tx,
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::DatabaseBusy
                && deadline.is_some_and(|d| Instant::now() >= d) =>
        {
            tracing::warn!("deadline passed waiting for the database write lock");
            return Err(SummaryError::DeadlineExceeded(Stage::Start));
        }
        Err(e) => return Err(StoreError::from(e).into()),
    };
    let mut session = SqliteSession { conn: &tx };
    match f(&mut session) {
        Ok(value) => {
            tx.commit().map_err(StoreError::from)?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback() {
                tracing::error!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

struct SqliteSession<'c> {
    conn: &'c Connection,
}

impl StoreSession for SqliteSession<'_> {
    fn sum_charges_by_category(&mut self, user_id: UserId) -> Result<CategoryTotals, StoreError> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT category_id, {DECIMAL_SUM}(amount) FROM charges
             WHERE user_id = ?1
             GROUP BY category_id"
        ))?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok((row.get::<_, CategoryId>(0)?, decimal_at(row, 1)?))
        })?;
        Ok(rows.collect::<Result<CategoryTotals, _>>()?)
    }

    fn category_ids(&mut self, user_id: UserId) -> Result<Vec<CategoryId>, StoreError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT id FROM categories WHERE user_id = ?1 ORDER BY rowid")?;
        let rows = stmt.query_map(params![user_id], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn apply_category_amounts(
        &mut self,
        user_id: UserId,
        updates: &[AmountUpdate],
    ) -> Result<usize, StoreError> {
        let mut stmt = self
            .conn
            .prepare_cached("UPDATE categories SET amount = ?1 WHERE id = ?2 AND user_id = ?3")?;
        let mut matched = 0;
        for update in updates {
            matched += stmt.execute(params![
                update.amount.to_string(),
                update.category_id,
                user_id
            ])?;
        }
        Ok(matched)
    }

    fn sum_category_amounts(&mut self, user_id: UserId) -> Result<Decimal, StoreError> {
        let total = self.conn.query_row(
            &format!("SELECT COALESCE({DECIMAL_SUM}(amount), '0') FROM categories WHERE user_id = ?1"),
            params![user_id],
            |row| decimal_at(row, 0),
        )?;
        Ok(total)
    }

    fn set_user_total(&mut self, user_id: UserId, total: Decimal) -> Result<bool, StoreError> {
        let changed = self.conn.execute(
            "UPDATE users SET total_amount = ?1 WHERE id = ?2",
            params![total.to_string(), user_id],
        )?;
        Ok(changed > 0)
    }

    fn find_user(&mut self, user_id: UserId) -> Result<Option<User>, StoreError> {
        find_user(self.conn, user_id)
    }

    fn list_categories(&mut self, user_id: UserId) -> Result<Vec<Category>, StoreError> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE user_id = ?1 ORDER BY rowid"
        ))?;
        let rows = stmt.query_map(params![user_id], category_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn list_charges(&mut self, user_id: UserId) -> Result<Vec<Charge>, StoreError> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {CHARGE_COLUMNS} FROM charges WHERE user_id = ?1 ORDER BY rowid"
        ))?;
        let rows = stmt.query_map(params![user_id], charge_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn find_user(conn: &Connection, user_id: UserId) -> Result<Option<User>, StoreError> {
    let result = conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![user_id],
        user_from_row,
    );
    match result {
        Ok(u) => Ok(Some(u)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl RecordStore for SqliteStore {
    fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let user = user.into_user();
        self.conn.lock().execute(
            "INSERT INTO users (id, credential_id, name, total_amount, total_allotment)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.id,
                user.credential_id,
                user.name,
                user.total_amount.to_string(),
                user.total_allotment.to_string(),
            ],
        )?;
        Ok(user)
    }

    fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY name"))?;
        let rows = stmt.query_map([], user_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn insert_category(&self, category: NewCategory) -> Result<Category, StoreError> {
        let category = category.into_category();
        self.conn.lock().execute(
            "INSERT INTO categories (id, user_id, title, allotment, amount)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                category.id,
                category.user_id,
                category.title,
                category.allotment.to_string(),
                category.amount.to_string(),
            ],
        )?;
        Ok(category)
    }

    fn insert_charge(&self, charge: &Charge) -> Result<(), StoreError> {
        self.conn.lock().execute(
            "INSERT INTO charges (id, user_id, category_id, description, amount, date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                charge.id,
                charge.user_id,
                charge.category_id,
                charge.description,
                charge.amount.to_string(),
                charge.date,
            ],
        )?;
        Ok(())
    }

    fn update_charge(
        &self,
        user_id: UserId,
        charge_id: ChargeId,
        update: &ChargeUpdate,
    ) -> Result<bool, StoreError> {
        let changed = self.conn.lock().execute(
            "UPDATE charges SET category_id = ?1, description = ?2, amount = ?3, date = ?4
             WHERE id = ?5 AND user_id = ?6",
            params![
                update.category_id,
                update.description,
                update.amount.to_string(),
                update.date,
                charge_id,
                user_id,
            ],
        )?;
        Ok(changed > 0)
    }

    fn delete_charge(&self, user_id: UserId, charge_id: ChargeId) -> Result<bool, StoreError> {
        let changed = self.conn.lock().execute(
            "DELETE FROM charges WHERE id = ?1 AND user_id = ?2",
            params![charge_id, user_id],
        )?;
        Ok(changed > 0)
    }

    fn delete_category(
        &self,
        user_id: UserId,
        category_id: CategoryId,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM charges WHERE category_id = ?1 AND user_id = ?2",
            params![category_id, user_id],
        )?;
        let changed = tx.execute(
            "DELETE FROM categories WHERE id = ?1 AND user_id = ?2",
            params![category_id, user_id],
        )?;
        tx.commit()?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests;
