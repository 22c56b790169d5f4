//! Single-statement transactions: acquire, run one update, commit.

use crate::db::Database;
use crate::error::DbError;
use crate::sql::Statement;

/// How often a whole transaction may be attempted. Only aborted transactions are replayed.
/// The default is one attempt: no retry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    pub fn none() -> Self {
        RetryPolicy { max_attempts: 1 }
    }

    /// Values below 1 mean a single attempt.
    pub fn bounded(max_attempts: u32) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn allows_retry(&self, attempt: u32, err: &DbError) -> bool {
        err.is_aborted() && attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Per-attempt lifecycle, logged at debug level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxState {
    Start,
    TransactionAcquired,
    StatementExecuted,
    Committed,
    TransactionAcquireFailed,
    StatementFailed,
}

fn transition(state: &mut TxState, next: TxState) {
    tracing::debug!(from = ?*state, to = ?next, "transaction state");
    *state = next;
}

/// Run `stmt` in its own transaction. Rollback is implicit: a transaction dropped on error is never committed.
/// Returns the affected row count.
pub async fn run_single_statement(
    db: &dyn Database,
    stmt: &Statement,
    policy: RetryPolicy,
) -> Result<u64, DbError> {
    let mut attempt = 1;
    loop {
        match attempt_once(db, stmt).await {
            Ok(n) => return Ok(n),
            Err(e) if policy.allows_retry(attempt, &e) => {
                tracing::warn!(attempt, max_attempts = policy.max_attempts(), error = %e, "transaction aborted, retrying");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn attempt_once(db: &dyn Database, stmt: &Statement) -> Result<u64, DbError> {
    let mut state = TxState::Start;

    let mut tx = match db.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            transition(&mut state, TxState::TransactionAcquireFailed);
            return Err(e);
        }
    };
    transition(&mut state, TxState::TransactionAcquired);

    let affected = match tx.run_update(stmt).await {
        Ok(n) => n,
        Err(e) => {
            transition(&mut state, TxState::StatementFailed);
            return Err(e);
        }
    };
    transition(&mut state, TxState::StatementExecuted);

    if let Err(e) = tx.commit().await {
        transition(&mut state, TxState::StatementFailed);
        return Err(e);
    }
    transition(&mut state, TxState::Committed);
    Ok(affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{default_entities, resolve};
    use crate::db::MemoryDatabase;
    use crate::sql::{delete, Dialect, ParamStyle};

    fn setup() -> (MemoryDatabase, Statement) {
        let model = resolve(&default_entities()).unwrap();
        let db = MemoryDatabase::new(Dialect::GoogleStandardSql, &model);
        let stmt = delete(model.entity_by_path("players").unwrap(), ParamStyle::Named, "id-1");
        (db, stmt)
    }

    #[tokio::test]
    async fn no_retry_by_default() {
        let (db, stmt) = setup();
        db.inject_aborts(1);
        let err = run_single_statement(&db, &stmt, RetryPolicy::default()).await.unwrap_err();
        assert!(err.is_aborted());
    }

    #[tokio::test]
    async fn bounded_retry_replays_aborted_transactions() {
        let (db, stmt) = setup();
        db.inject_aborts(2);
        assert_eq!(run_single_statement(&db, &stmt, RetryPolicy::bounded(3)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn retry_budget_is_bounded() {
        let (db, stmt) = setup();
        db.inject_aborts(3);
        let err = run_single_statement(&db, &stmt, RetryPolicy::bounded(3)).await.unwrap_err();
        assert!(err.is_aborted());
    }

    #[tokio::test]
    async fn acquire_failure_is_not_retried() {
        let (db, stmt) = setup();
        db.close();
        let err = run_single_statement(&db, &stmt, RetryPolicy::bounded(5)).await.unwrap_err();
        assert!(matches!(err, DbError::Acquire(_)));
    }

    #[test]
    fn zero_attempts_means_one() {
        assert_eq!(RetryPolicy::bounded(0), RetryPolicy::none());
    }
}
