//! `decimal_sum(x)`: an exact SUM over TEXT-encoded decimals.
//!
//! SQLite's built-in SUM coerces text to REAL, which loses cents. NULLs are
//! skipped and an empty input yields NULL, matching SUM.

use rusqlite::functions::{Aggregate, Context, FunctionFlags};
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::str::FromStr;

pub(crate) const DECIMAL_SUM: &str = "decimal_sum";

struct DecimalSum;

impl Aggregate<Decimal, Option<String>> for DecimalSum {
    fn init(&self, _ctx: &mut Context<'_>) -> rusqlite::Result<Decimal> {
        Ok(Decimal::ZERO)
    }

    fn step(&self, ctx: &mut Context<'_>, total: &mut Decimal) -> rusqlite::Result<()> {
        let value = match ctx.get_raw(0) {
            ValueRef::Null => return Ok(()),
            ValueRef::Integer(i) => Decimal::from(i),
            ValueRef::Text(bytes) => {
                let raw = std::str::from_utf8(bytes).map_err(user_error)?;
                Decimal::from_str(raw.trim()).map_err(user_error)?
            }
            other => {
                return Err(rusqlite::Error::UserFunctionError(
                    format!("{DECIMAL_SUM}: unsupported value type {}", other.data_type()).into(),
                ))
            }
        };
        *total = total.checked_add(value).ok_or_else(|| {
            rusqlite::Error::UserFunctionError(format!("{DECIMAL_SUM}: overflow").into())
        })?;
        Ok(())
    }

    fn finalize(
        &self,
        _ctx: &mut Context<'_>,
        total: Option<Decimal>,
    ) -> rusqlite::Result<Option<String>> {
        Ok(total.map(|d| d.to_string()))
    }
}

fn user_error<E>(err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::UserFunctionError(Box::new(err))
}

pub(crate) fn register(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_aggregate_function(
        DECIMAL_SUM,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        DecimalSum,
    )
}
