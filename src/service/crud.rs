//! Generic entity CRUD over the configured database and dialect.

use crate::config::ResolvedEntity;
use crate::db::Database;
use crate::error::AppError;
use crate::service::{run_single_statement, RetryPolicy};
use crate::sql::{delete, insert, select_all, Dialect};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Dialect is resolved once at startup and fixed for the life of the service.
#[derive(Clone)]
pub struct CrudService {
    db: Arc<dyn Database>,
    dialect: Dialect,
    retry: RetryPolicy,
}

impl CrudService {
    pub fn new(db: Arc<dyn Database>, dialect: Dialect, retry: RetryPolicy) -> Self {
        CrudService { db, dialect, retry }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub async fn ping(&self) -> Result<(), AppError> {
        Ok(self.db.ping().await?)
    }

    /// All rows, in whatever order the database returns them.
    pub async fn list(&self, entity: &ResolvedEntity) -> Result<Vec<Value>, AppError> {
        let q = select_all(entity, self.dialect);
        let rows = self.db.query(&q).await?;
        Ok(rows.into_iter().map(Value::Object).collect())
    }

    /// Insert one row under a fresh v4 id. Field values are passed through as received.
    /// Returns the created record keyed by column name.
    pub async fn create(
        &self,
        entity: &ResolvedEntity,
        body: &HashMap<String, Value>,
    ) -> Result<Value, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let q = insert(entity, entity.param_style(self.dialect), &id, body);
        run_single_statement(self.db.as_ref(), &q, self.retry).await?;
        tracing::info!(entity = %entity.path_segment, id = %id, "created");

        let mut record = Map::new();
        record.insert(entity.id_column.clone(), Value::String(id));
        for c in &entity.columns {
            record.insert(c.name.clone(), body.get(&c.field).cloned().unwrap_or(Value::Null));
        }
        Ok(Value::Object(record))
    }

    /// Delete by id. Zero matching rows is not an error.
    pub async fn delete(&self, entity: &ResolvedEntity, id: &str) -> Result<u64, AppError> {
        let q = delete(entity, entity.param_style(self.dialect), id);
        let affected = run_single_statement(self.db.as_ref(), &q, self.retry).await?;
        tracing::info!(entity = %entity.path_segment, id = %id, affected, "deleted");
        Ok(affected)
    }
}
