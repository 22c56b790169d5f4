//! Cloud Spanner backend over gRPC. Serves both dialects: GoogleSQL databases take `@name`
//! parameters, PostgreSQL-dialect databases take `$n` parameters named `p1..pN`.

use crate::config::DatabaseSettings;
use crate::db::{Database, Row, Transaction};
use crate::error::DbError;
use crate::sql::{Dialect, SqlValue, Statement};
use async_trait::async_trait;
use google_cloud_gax::grpc::{Code, Status};
use google_cloud_spanner::client::{Client, ClientConfig, Error};
use google_cloud_spanner::row::Row as SpannerRow;
use google_cloud_spanner::statement::Statement as SpannerStatement;
use google_cloud_spanner::transaction_rw::ReadWriteTransaction;
use serde_json::Value;

const DIALECT_QUERY: &str =
    "SELECT option_value FROM INFORMATION_SCHEMA.DATABASE_OPTIONS WHERE option_name = 'database_dialect'";

#[derive(Clone)]
pub struct SpannerDatabase {
    client: Client,
}

impl SpannerDatabase {
    /// Connect to `projects/{p}/instances/{i}/databases/{d}`. Honors `SPANNER_EMULATOR_HOST`.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, DbError> {
        let config = ClientConfig::default()
            .with_auth()
            .await
            .map_err(|e| DbError::Unavailable(e.to_string()))?;
        let client = Client::new(settings.database_path(), config)
            .await
            .map_err(|e| DbError::Unavailable(detail(&e)))?;
        Ok(SpannerDatabase { client })
    }
}

fn status_detail(status: &Status) -> String {
    status.message().to_string()
}

fn detail(e: &Error) -> String {
    match e {
        Error::GRPC(status) => status_detail(status),
        other => other.to_string(),
    }
}

/// Aborted transactions may be replayed; everything else is a plain statement failure.
fn statement_error(e: &Error) -> DbError {
    match e {
        Error::GRPC(status) if status.code() == Code::Aborted => DbError::Aborted(status_detail(status)),
        other => DbError::Statement(detail(other)),
    }
}

fn to_spanner(stmt: &Statement) -> SpannerStatement {
    let mut s = SpannerStatement::new(stmt.sql.clone());
    for p in &stmt.params {
        match &p.value {
            SqlValue::Null => s.add_param(&p.name, &Option::<String>::None),
            SqlValue::Bool(b) => s.add_param(&p.name, b),
            SqlValue::I64(n) => s.add_param(&p.name, n),
            SqlValue::F64(n) => s.add_param(&p.name, n),
            SqlValue::String(v) => s.add_param(&p.name, v),
        }
    }
    s
}

/// DATE and STRING cells both arrive as string values; they are returned as text.
fn row_to_json(row: &SpannerRow, columns: &[String]) -> Result<Row, DbError> {
    let mut map = Row::new();
    for (i, name) in columns.iter().enumerate() {
        let cell = row
            .column::<Option<String>>(i)
            .map_err(|e| DbError::Statement(e.to_string()))?;
        map.insert(name.clone(), cell.map(Value::String).unwrap_or(Value::Null));
    }
    Ok(map)
}

#[async_trait]
impl Database for SpannerDatabase {
    async fn dialect(&self) -> Result<Dialect, DbError> {
        let mut tx = self
            .client
            .single()
            .await
            .map_err(|e| DbError::Metadata(detail(&e)))?;
        let mut rows = tx
            .query(SpannerStatement::new(DIALECT_QUERY))
            .await
            .map_err(|s| DbError::Metadata(status_detail(&s)))?;
        match rows.next().await.map_err(|s| DbError::Metadata(status_detail(&s)))? {
            Some(row) => {
                let value = row
                    .column::<String>(0)
                    .map_err(|e| DbError::Metadata(e.to_string()))?;
                value.parse::<Dialect>().map_err(|e| DbError::Metadata(e.to_string()))
            }
            // Databases created before dialects existed report nothing; they are GoogleSQL.
            None => Ok(Dialect::GoogleStandardSql),
        }
    }

    async fn query(&self, stmt: &Statement) -> Result<Vec<Row>, DbError> {
        tracing::debug!(sql = %stmt.sql, params = ?stmt.params, "query");
        let mut tx = self
            .client
            .single()
            .await
            .map_err(|e| DbError::Statement(detail(&e)))?;
        let mut rows = tx
            .query(to_spanner(stmt))
            .await
            .map_err(|s| statement_error(&Error::from(s)))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(|s| statement_error(&Error::from(s)))? {
            out.push(row_to_json(&row, &stmt.columns)?);
        }
        Ok(out)
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, DbError> {
        let tx = self
            .client
            .begin_read_write_transaction()
            .await
            .map_err(|e| DbError::Acquire(detail(&e)))?;
        Ok(Box::new(SpannerTransaction { tx }))
    }

    async fn ping(&self) -> Result<(), DbError> {
        let mut tx = self
            .client
            .single()
            .await
            .map_err(|e| DbError::Unavailable(detail(&e)))?;
        let mut rows = tx
            .query(SpannerStatement::new("SELECT 1"))
            .await
            .map_err(|s| DbError::Unavailable(status_detail(&s)))?;
        rows.next()
            .await
            .map(|_| ())
            .map_err(|s| DbError::Unavailable(status_detail(&s)))
    }
}

struct SpannerTransaction {
    tx: ReadWriteTransaction,
}

#[async_trait]
impl Transaction for SpannerTransaction {
    async fn run_update(&mut self, stmt: &Statement) -> Result<u64, DbError> {
        tracing::debug!(sql = %stmt.sql, params = ?stmt.params, "query (tx)");
        match self.tx.update(to_spanner(stmt)).await {
            Ok(n) => Ok(n.max(0) as u64),
            Err(status) => {
                // Ending with the failure rolls the transaction back and hands the error back.
                let ended = self.tx.end(Err::<(), Error>(Error::from(status)), None).await;
                Err(match ended {
                    Err(e) => statement_error(&e),
                    Ok(_) => DbError::Statement(format!("statement failed: {}", stmt.sql)),
                })
            }
        }
    }

    async fn commit(self: Box<Self>) -> Result<(), DbError> {
        let mut tx = self.tx;
        tx.end(Ok::<(), Error>(()), None)
            .await
            .map(|_| ())
            .map_err(|e| statement_error(&e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{default_entities, resolve};
    use crate::sql::{delete, insert, select_all, ParamStyle};
    use std::collections::HashMap;

    // Integration tests require a Spanner database (or the emulator via SPANNER_EMULATOR_HOST)
    // Run with: GOOGLE_CLOUD_PROJECT_ID=... CLOUD_SPANNER_INSTANCE=... CLOUD_SPANNER_DATABASE=... cargo test -- --ignored
    // Expects a GoogleSQL database with:
    //   CREATE TABLE Singers (SingerUuid STRING(36) NOT NULL, FirstName STRING(1024), LastName STRING(1024), BirthDate DATE) PRIMARY KEY (SingerUuid)

    async fn connect() -> SpannerDatabase {
        let settings = crate::config::Settings::from_env().expect("settings");
        SpannerDatabase::connect(&settings.database).await.expect("connect")
    }

    #[test]
    fn aborted_status_is_transient() {
        let aborted = Error::from(Status::new(Code::Aborted, "Transaction was aborted."));
        assert_eq!(statement_error(&aborted), DbError::Aborted("Transaction was aborted.".into()));

        let exists = Error::from(Status::new(Code::AlreadyExists, "Row [x] in table Singers already exists"));
        assert_eq!(
            statement_error(&exists),
            DbError::Statement("Row [x] in table Singers already exists".into())
        );
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn reports_google_standard_sql_dialect() {
        let db = connect().await;
        assert_eq!(db.dialect().await.unwrap(), Dialect::GoogleStandardSql);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn named_insert_select_delete_round() {
        let db = connect().await;
        let model = resolve(&default_entities()).unwrap();
        let singers = model.entity_by_path("singers").unwrap();
        let id = uuid::Uuid::new_v4().to_string();
        let body = HashMap::from([
            ("firstName".to_string(), serde_json::json!("Ada")),
            ("lastName".to_string(), serde_json::json!("Lovelace")),
            ("birthDate".to_string(), serde_json::json!("1815-12-10")),
        ]);

        let mut tx = db.begin().await.unwrap();
        let n = tx.run_update(&insert(singers, ParamStyle::Named, &id, &body)).await.unwrap();
        assert_eq!(n, 1);
        tx.commit().await.unwrap();

        let rows = db.query(&select_all(singers, Dialect::GoogleStandardSql)).await.unwrap();
        let row = rows.iter().find(|r| r["SingerUuid"] == id.as_str()).expect("inserted row");
        assert_eq!(row["BirthDate"], "1815-12-10");

        let mut tx = db.begin().await.unwrap();
        tx.run_update(&delete(singers, ParamStyle::Named, &id)).await.unwrap();
        tx.commit().await.unwrap();
    }
}
