//! PostgreSQL wire-protocol backend (Spanner via PGAdapter, or PostgreSQL).

use crate::config::DatabaseSettings;
use crate::db::{Database, Row, Transaction};
use crate::error::DbError;
use crate::sql::{Dialect, ParamStyle, Statement};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres};

const DIALECT_QUERY: &str =
    "SELECT option_value FROM information_schema.database_options WHERE option_name = 'database_dialect'";

/// SQLSTATE codes for transactions the server aborted and that may be replayed.
const ABORTED_CODES: &[&str] = &["40001", "40P01"];
const UNDEFINED_TABLE: &str = "42P01";

#[derive(Clone)]
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub fn from_pool(pool: PgPool) -> Self {
        PgDatabase { pool }
    }

    /// Connect using `DATABASE_URL`, or PGAdapter host/port with the Spanner database path as dbname.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, DbError> {
        let options = PgPoolOptions::new().max_connections(settings.max_connections);
        let pool = match &settings.url {
            Some(url) => options.connect(url).await,
            None => {
                let connect = PgConnectOptions::new()
                    .host(&settings.pgadapter_host)
                    .port(settings.pgadapter_port)
                    .database(&settings.database_path());
                options.connect_with(connect).await
            }
        }
        .map_err(|e| DbError::Unavailable(detail(&e)))?;
        Ok(PgDatabase { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// The server's own message when there is one; that is what callers surface.
fn detail(e: &sqlx::Error) -> String {
    match e.as_database_error() {
        Some(db) => db.message().to_string(),
        None => e.to_string(),
    }
}

fn sqlstate(e: &sqlx::Error) -> Option<String> {
    e.as_database_error().and_then(|db| db.code()).map(|c| c.into_owned())
}

fn statement_error(e: sqlx::Error) -> DbError {
    match sqlstate(&e) {
        Some(code) if ABORTED_CODES.contains(&code.as_str()) => DbError::Aborted(detail(&e)),
        _ => DbError::Statement(detail(&e)),
    }
}

fn ensure_positional(stmt: &Statement) -> Result<(), DbError> {
    match stmt.style {
        ParamStyle::Positional => Ok(()),
        ParamStyle::Named if stmt.params.is_empty() => Ok(()),
        ParamStyle::Named => Err(DbError::Statement(format!(
            "named query parameters are not supported by the PostgreSQL interface: {}",
            stmt.sql
        ))),
    }
}

fn build_query(stmt: &Statement) -> sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments> {
    let mut query = sqlx::query(&stmt.sql);
    for p in &stmt.params {
        query = query.bind(p.value.clone());
    }
    query
}

#[async_trait]
impl Database for PgDatabase {
    async fn dialect(&self) -> Result<Dialect, DbError> {
        let row: Result<Option<(String,)>, sqlx::Error> =
            sqlx::query_as(DIALECT_QUERY).fetch_optional(&self.pool).await;
        match row {
            Ok(Some((value,))) => value
                .parse::<Dialect>()
                .map_err(|e| DbError::Metadata(e.to_string())),
            Ok(None) => Ok(Dialect::PostgreSql),
            // No Spanner metadata view: a plain PostgreSQL server.
            Err(e) if sqlstate(&e).as_deref() == Some(UNDEFINED_TABLE) => Ok(Dialect::PostgreSql),
            Err(e) => Err(DbError::Metadata(detail(&e))),
        }
    }

    async fn query(&self, stmt: &Statement) -> Result<Vec<Row>, DbError> {
        ensure_positional(stmt)?;
        tracing::debug!(sql = %stmt.sql, params = ?stmt.params, "query");
        let rows = build_query(stmt)
            .fetch_all(&self.pool)
            .await
            .map_err(statement_error)?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, DbError> {
        let tx = self.pool.begin().await.map_err(|e| DbError::Acquire(detail(&e)))?;
        Ok(Box::new(PgTransaction { tx }))
    }

    async fn ping(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| DbError::Unavailable(detail(&e)))
    }
}

struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn run_update(&mut self, stmt: &Statement) -> Result<u64, DbError> {
        ensure_positional(stmt)?;
        tracing::debug!(sql = %stmt.sql, params = ?stmt.params, "query (tx)");
        let result = build_query(stmt)
            .execute(&mut *self.tx)
            .await
            .map_err(statement_error)?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), DbError> {
        self.tx.commit().await.map_err(statement_error)
    }
}

fn row_to_json(row: &PgRow) -> Row {
    use sqlx::Column;
    use sqlx::Row as _;
    let mut map = Row::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    map
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row as _;
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{default_entities, resolve};
    use crate::sql::{delete, insert, select_all};
    use std::collections::HashMap;

    // Integration tests require a real database
    // Run with: DATABASE_URL=postgres://... cargo test -- --ignored
    // Expects: CREATE TABLE Players (PlayerUuid varchar(36) PRIMARY KEY, FirstName text, LastName text, BirthDate date)

    async fn connect() -> PgDatabase {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        PgDatabase::from_pool(PgPoolOptions::new().max_connections(2).connect(&url).await.expect("connect"))
    }

    #[test]
    fn named_statements_are_rejected_before_reaching_the_server() {
        let model = resolve(&default_entities()).unwrap();
        let singers = model.entity_by_path("singers").unwrap();
        let stmt = delete(singers, ParamStyle::Named, "x");
        assert!(matches!(ensure_positional(&stmt), Err(DbError::Statement(_))));
        let select = select_all(singers, Dialect::PostgreSql);
        assert!(ensure_positional(&select).is_ok());
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn reports_postgres_dialect() {
        let db = connect().await;
        assert_eq!(db.dialect().await.unwrap(), Dialect::PostgreSql);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn insert_select_delete_round() {
        let db = connect().await;
        let model = resolve(&default_entities()).unwrap();
        let players = model.entity_by_path("players").unwrap();
        let id = uuid::Uuid::new_v4().to_string();
        let body = HashMap::from([
            ("firstName".to_string(), serde_json::json!("Ada")),
            ("lastName".to_string(), serde_json::json!("Lovelace")),
            ("birthDate".to_string(), serde_json::json!("1815-12-10")),
        ]);

        let mut tx = db.begin().await.unwrap();
        let n = tx.run_update(&insert(players, ParamStyle::Positional, &id, &body)).await.unwrap();
        assert_eq!(n, 1);
        tx.commit().await.unwrap();

        let rows = db.query(&select_all(players, Dialect::PostgreSql)).await.unwrap();
        let row = rows.iter().find(|r| r["PlayerUuid"] == id.as_str()).expect("inserted row");
        assert_eq!(row["BirthDate"], "1815-12-10");

        let mut tx = db.begin().await.unwrap();
        tx.run_update(&delete(players, ParamStyle::Positional, &id)).await.unwrap();
        tx.commit().await.unwrap();
    }
}
