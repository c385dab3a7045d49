//! MEDIAN aggregate for SQLite
//!
//! SQLite ships no median. The aggregate is registered on every connection the
//! store opens, so ranking and aggregation stay in SQL like any other
//! aggregate.

use crate::error::StoreResult;
use crate::stats;
use rusqlite::Connection;
use rusqlite::functions::{Aggregate, Context, FunctionFlags};

/// SQL name of the aggregate
pub const MEDIAN: &str = "median";

/// Collects non-NULL numeric arguments, finalizes with [`stats::median`].
pub struct MedianAggregate;

impl Aggregate<Vec<f64>, Option<f64>> for MedianAggregate {
    fn init(&self, _ctx: &mut Context<'_>) -> rusqlite::Result<Vec<f64>> {
        Ok(Vec::new())
    }

    fn step(&self, ctx: &mut Context<'_>, samples: &mut Vec<f64>) -> rusqlite::Result<()> {
        // NULL 값은 건너뜀 (SQL 집계 의미론)
        if let Some(value) = ctx.get::<Option<f64>>(0)? {
            samples.push(value);
        }
        Ok(())
    }

    fn finalize(
        &self,
        _ctx: &mut Context<'_>,
        samples: Option<Vec<f64>>,
    ) -> rusqlite::Result<Option<f64>> {
        Ok(samples.and_then(|mut s| stats::median(&mut s)))
    }
}

/// Register `median(x)` on the connection.
pub fn register(conn: &Connection) -> StoreResult<()> {
    conn.create_aggregate_function(
        MEDIAN,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        MedianAggregate,
    )?;
    Ok(())
}
