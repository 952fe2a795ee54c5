//! Row aggregation.
//!
//! Turns the rows of the seeded `coffee` table into an [`AggregateResult`]:
//! a running total of the integer part of every price, plus the name found
//! at the sentinel row.

use async_trait::async_trait;
use common::errors::{AppError, AppResult};
use common::models::AggregateResult;

/// Fixed aggregation query. Columns: id, name, price.
pub const COFFEE_QUERY: &str = "select * from coffee";

/// One row of the seeded table, normalised across backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoffeeRow {
    pub name: String,
    pub price: String,
}

impl CoffeeRow {
    pub fn new(name: impl Into<String>, price: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            price: price.into(),
        }
    }
}

/// A queryable handle produced by a backend connector.
///
/// The handle is owned by a single request and must be closed before the
/// request returns.
#[async_trait]
pub trait CoffeeSource: Send + Sync {
    /// Runs [`COFFEE_QUERY`] and returns every row.
    async fn fetch_rows(&self) -> AppResult<Vec<CoffeeRow>>;

    /// Releases the underlying connections.
    async fn close(&self);
}

/// Parses the integer part of a price: everything before the first `.`.
///
/// Returns `None` when that part is not a valid integer.
pub fn parse_price(price: &str) -> Option<i64> {
    let whole = price.split('.').next().unwrap_or_default();
    whole.parse().ok()
}

/// Incremental row aggregator.
#[derive(Debug)]
pub struct Aggregator {
    sentinel_index: usize,
    index: usize,
    result: AggregateResult,
}

impl Aggregator {
    /// Creates an aggregator that captures the name at zero-based `sentinel_index`.
    pub fn new(sentinel_index: usize) -> Self {
        Self {
            sentinel_index,
            index: 0,
            result: AggregateResult::default(),
        }
    }

    /// Feeds the next row. Rows with an unparseable price are skipped for the
    /// total but still count towards the row index.
    ///
    /// # Errors
    /// Returns `AppError::QueryFailed` when the running total no longer fits
    /// in an `i64`.
    pub fn push(&mut self, row: &CoffeeRow) -> AppResult<()> {
        if self.index == self.sentinel_index {
            self.result.magic_coffee = row.name.clone();
        }
        match parse_price(&row.price) {
            Some(p) => {
                self.result.total = self.result.total.checked_add(p).ok_or_else(|| {
                    AppError::QueryFailed(format!(
                        "price total overflowed at row {} (price {})",
                        self.index, row.price
                    ))
                })?;
            }
            None => {
                tracing::warn!(row = self.index, price = %row.price, "could not convert price to an integer, skipping");
            }
        }
        self.index += 1;
        Ok(())
    }

    /// Number of rows seen so far.
    pub fn rows(&self) -> usize {
        self.index
    }

    pub fn finish(self) -> AggregateResult {
        self.result
    }
}

/// Aggregates a full row set.
pub fn aggregate<'a, I>(rows: I, sentinel_index: usize) -> AppResult<AggregateResult>
where
    I: IntoIterator<Item = &'a CoffeeRow>,
{
    let mut aggregator = Aggregator::new(sentinel_index);
    for row in rows {
        aggregator.push(row)?;
    }
    tracing::debug!(rows = aggregator.rows(), "aggregation complete");
    Ok(aggregator.finish())
}
