//! Database backends behind one seam: dialect metadata, reads, and single-statement transactions.

mod memory;
mod postgres;
mod spanner;

pub use memory::MemoryDatabase;
pub use postgres::PgDatabase;
pub use spanner::SpannerDatabase;

use crate::error::DbError;
use crate::sql::{Dialect, Statement};
use async_trait::async_trait;

/// One result row, keyed by column name (or alias) in select-list order.
pub type Row = serde_json::Map<String, serde_json::Value>;

#[async_trait]
pub trait Database: Send + Sync {
    /// Reads the dialect from database metadata. Called once at startup.
    async fn dialect(&self) -> Result<Dialect, DbError>;

    /// Runs a read-only statement outside any explicit transaction.
    async fn query(&self, stmt: &Statement) -> Result<Vec<Row>, DbError>;

    /// Acquires a read-write transaction. Dropping it without commit rolls back.
    async fn begin(&self) -> Result<Box<dyn Transaction>, DbError>;

    async fn ping(&self) -> Result<(), DbError>;
}

#[async_trait]
pub trait Transaction: Send {
    /// Executes one DML statement; returns affected row count.
    async fn run_update(&mut self, stmt: &Statement) -> Result<u64, DbError>;

    async fn commit(self: Box<Self>) -> Result<(), DbError>;
}
