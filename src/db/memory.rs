//! In-process emulator for local runs and tests.
//!
//! Holds one table per resolved entity and interprets exactly the statement shapes the
//! SQL builder emits (`SELECT cols FROM t`, `INSERT INTO t (cols) VALUES (..)`,
//! `DELETE FROM t WHERE col = ..`). Placeholders must match the configured dialect, the
//! way the real engines reject each other's syntax. Writes are buffered per transaction
//! and applied atomically on commit.

use crate::config::{ColumnType, ResolvedModel};
use crate::db::{Database, Row, Transaction};
use crate::error::DbError;
use crate::sql::{Dialect, SqlValue, Statement};
use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

fn insert_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)^\s*INSERT\s+INTO\s+(\w+)\s*\(([^)]*)\)\s*VALUES\s*\(([^)]*)\)\s*;?\s*$")
            .expect("static regex")
    })
}

fn delete_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)^\s*DELETE\s+FROM\s+(\w+)\s+WHERE\s+(\w+)\s*=\s*(\S+?)\s*;?\s*$").expect("static regex")
    })
}

fn select_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)^\s*SELECT\s+(.+?)\s+FROM\s+(\w+)\s*;?\s*$").expect("static regex"))
}

fn select_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)^\s*(\w+|\*)(?:\s+AS\s+"([^"]+)")?\s*$"#).expect("static regex"))
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:\$(\d+)|@(\w+))(?:::(\w+))?$").expect("static regex"))
}

#[derive(Clone, Debug)]
struct Table {
    name: String,
    key: String,
    columns: Vec<(String, ColumnType)>,
    rows: Vec<Row>,
}

impl Table {
    fn column(&self, name: &str) -> Result<&(String, ColumnType), DbError> {
        self.columns
            .iter()
            .find(|(c, _)| c.eq_ignore_ascii_case(name))
            .ok_or_else(|| DbError::Statement(format!("Column not found in table {}: {}", self.name, name)))
    }

    fn contains_key(&self, key: &Value) -> bool {
        self.rows.iter().any(|r| r.get(&self.key) == Some(key))
    }
}

#[derive(Default)]
struct Storage {
    tables: HashMap<String, Table>,
    closed: bool,
    pending_aborts: u32,
}

impl Storage {
    fn table(&self, name: &str) -> Result<&Table, DbError> {
        self.tables
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| DbError::Statement(format!("Table not found: {}", name)))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table, DbError> {
        self.tables
            .get_mut(&name.to_ascii_lowercase())
            .ok_or_else(|| DbError::Statement(format!("Table not found: {}", name)))
    }
}

#[derive(Clone)]
pub struct MemoryDatabase {
    dialect: Dialect,
    storage: Arc<Mutex<Storage>>,
}

impl MemoryDatabase {
    /// Empty database with one table per entity in `model`.
    pub fn new(dialect: Dialect, model: &ResolvedModel) -> Self {
        let mut storage = Storage::default();
        for e in &model.entities {
            let mut columns = vec![(e.id_column.clone(), ColumnType::String)];
            columns.extend(e.columns.iter().map(|c| (c.name.clone(), c.column_type)));
            storage.tables.insert(
                e.table_name.to_ascii_lowercase(),
                Table {
                    name: e.table_name.clone(),
                    key: e.id_column.clone(),
                    columns,
                    rows: Vec::new(),
                },
            );
        }
        MemoryDatabase {
            dialect,
            storage: Arc::new(Mutex::new(storage)),
        }
    }

    /// After this, transactions can no longer be acquired and reads fail.
    pub fn close(&self) {
        self.storage.lock().closed = true;
    }

    /// Make the next `n` commits fail as aborted transactions.
    pub fn inject_aborts(&self, n: u32) {
        self.storage.lock().pending_aborts = n;
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.storage.lock().table(table).map(|t| t.rows.len()).unwrap_or(0)
    }

    fn select(&self, storage: &Storage, stmt: &Statement) -> Result<Vec<Row>, DbError> {
        let caps = select_re()
            .captures(&stmt.sql)
            .ok_or_else(|| DbError::Statement(format!("unsupported statement: {}", stmt.sql)))?;
        let table = storage.table(&caps[2])?;

        // (output name, stored column name)
        let mut projection = Vec::new();
        for item in caps[1].split(',') {
            let item_caps = select_item_re()
                .captures(item)
                .ok_or_else(|| DbError::Statement(format!("unsupported select item: {}", item.trim())))?;
            if &item_caps[1] == "*" {
                projection.extend(table.columns.iter().map(|(c, _)| (self.output_name(c), c.clone())));
                continue;
            }
            let (column, _) = table.column(&item_caps[1])?;
            let output = match item_caps.get(2) {
                Some(alias) => alias.as_str().to_string(),
                None => self.output_name(column),
            };
            projection.push((output, column.clone()));
        }

        Ok(table
            .rows
            .iter()
            .map(|row| {
                projection
                    .iter()
                    .map(|(out, col)| (out.clone(), row.get(col).cloned().unwrap_or(Value::Null)))
                    .collect()
            })
            .collect())
    }

    /// PostgreSQL folds unaliased identifiers to lower case; GoogleSQL keeps the declared name.
    fn output_name(&self, column: &str) -> String {
        match self.dialect {
            Dialect::PostgreSql => column.to_ascii_lowercase(),
            Dialect::GoogleStandardSql => column.to_string(),
        }
    }

    /// Resolve one placeholder token (`$n`, `@name`, optionally `::type`) against the statement params.
    fn bind(&self, token: &str, stmt: &Statement) -> Result<SqlValue, DbError> {
        let caps = placeholder_re()
            .captures(token)
            .ok_or_else(|| DbError::Statement(format!("Syntax error: expected query parameter, got \"{}\"", token)))?;

        let value = if let Some(n) = caps.get(1) {
            if self.dialect != Dialect::PostgreSql {
                return Err(DbError::Statement("Syntax error: Illegal input character \"$\"".into()));
            }
            let idx: usize = n
                .as_str()
                .parse()
                .map_err(|_| DbError::Statement(format!("there is no parameter ${}", n.as_str())))?;
            stmt.params
                .get(idx.wrapping_sub(1))
                .map(|p| p.value.clone())
                .ok_or_else(|| DbError::Statement(format!("there is no parameter ${}", idx)))?
        } else {
            if self.dialect != Dialect::GoogleStandardSql {
                return Err(DbError::Statement("syntax error at or near \"@\"".into()));
            }
            let name = &caps[2];
            stmt.params
                .iter()
                .find(|p| p.name == name)
                .map(|p| p.value.clone())
                .ok_or_else(|| DbError::Statement(format!("No parameter found for binding: {}", name)))?
        };

        match caps.get(3).map(|m| m.as_str().to_ascii_lowercase()) {
            None => Ok(value),
            Some(_) if self.dialect != Dialect::PostgreSql => {
                Err(DbError::Statement("Syntax error: Unexpected \":\"".into()))
            }
            Some(ty) if ty == "date" => cast_date(value),
            Some(ty) if ty == "text" || ty == "varchar" => Ok(value),
            Some(ty) => Err(DbError::Statement(format!("type \"{}\" does not exist", ty))),
        }
    }

    /// Coerce a bound value into a column's storage form.
    fn coerce(&self, table: &Table, column: &str, column_type: ColumnType, value: SqlValue) -> Result<Value, DbError> {
        let invalid = |expected: &str| {
            DbError::Statement(format!(
                "Invalid value for column {} in table {}: Expected {}.",
                column, table.name, expected
            ))
        };
        match (column_type, value) {
            (_, SqlValue::Null) => Ok(Value::Null),
            (ColumnType::Date, SqlValue::String(s)) => chrono::NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
                .map_err(|_| invalid("DATE")),
            (ColumnType::Date, _) => Err(invalid("DATE")),
            (ColumnType::String, SqlValue::String(s)) => Ok(Value::String(s)),
            // PostgreSQL applies an assignment cast to text; GoogleSQL does not.
            (ColumnType::String, other) if self.dialect == Dialect::PostgreSql => match other.to_json() {
                Value::String(s) => Ok(Value::String(s)),
                v => Ok(Value::String(v.to_string())),
            },
            (ColumnType::String, _) => Err(invalid("STRING")),
        }
    }

    fn plan_insert(&self, storage: &Storage, stmt: &Statement) -> Result<(Write, u64), DbError> {
        let caps = insert_re()
            .captures(&stmt.sql)
            .ok_or_else(|| DbError::Statement(format!("unsupported statement: {}", stmt.sql)))?;
        let table = storage.table(&caps[1])?;
        let columns: Vec<&str> = caps[2].split(',').map(str::trim).collect();
        let values: Vec<&str> = caps[3].split(',').map(str::trim).collect();
        if columns.len() != values.len() {
            return Err(DbError::Statement(
                "INSERT has a different number of target columns than values".into(),
            ));
        }

        let mut row = Row::new();
        for (name, _) in &table.columns {
            row.insert(name.clone(), Value::Null);
        }
        for (col, token) in columns.iter().zip(&values) {
            let (name, column_type) = table.column(col)?;
            let value = self.bind(token, stmt)?;
            let stored = self.coerce(table, name, *column_type, value)?;
            row.insert(name.clone(), stored);
        }

        let key = row.get(&table.key).cloned().unwrap_or(Value::Null);
        if key.is_null() {
            return Err(DbError::Statement(format!(
                "Primary key column {} in table {} cannot be NULL",
                table.key, table.name
            )));
        }
        if table.contains_key(&key) {
            return Err(DbError::Statement(format!(
                "Row [{}] in table {} already exists",
                key.as_str().unwrap_or_default(),
                table.name
            )));
        }
        Ok((
            Write::Insert {
                table: table.name.clone(),
                row,
            },
            1,
        ))
    }

    fn plan_delete(&self, storage: &Storage, stmt: &Statement) -> Result<(Write, u64), DbError> {
        let caps = delete_re()
            .captures(&stmt.sql)
            .ok_or_else(|| DbError::Statement(format!("unsupported statement: {}", stmt.sql)))?;
        let table = storage.table(&caps[1])?;
        let (column, _) = table.column(&caps[2])?;
        let value = self.bind(&caps[3], stmt)?.to_json();
        let affected = table.rows.iter().filter(|r| r.get(column) == Some(&value)).count() as u64;
        Ok((
            Write::Delete {
                table: table.name.clone(),
                column: column.clone(),
                value,
            },
            affected,
        ))
    }
}

fn cast_date(value: SqlValue) -> Result<SqlValue, DbError> {
    match value {
        SqlValue::Null => Ok(SqlValue::Null),
        SqlValue::String(s) => chrono::NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(|d| SqlValue::String(d.format("%Y-%m-%d").to_string()))
            .map_err(|_| DbError::Statement(format!("invalid input syntax for type date: \"{}\"", s))),
        other => Err(DbError::Statement(format!(
            "cannot cast {} to date",
            other.to_json()
        ))),
    }
}

#[derive(Clone, Debug)]
enum Write {
    Insert { table: String, row: Row },
    Delete { table: String, column: String, value: Value },
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn dialect(&self) -> Result<Dialect, DbError> {
        if self.storage.lock().closed {
            return Err(DbError::Metadata("database is closed".into()));
        }
        Ok(self.dialect)
    }

    async fn query(&self, stmt: &Statement) -> Result<Vec<Row>, DbError> {
        tracing::debug!(sql = %stmt.sql, params = ?stmt.params, "query");
        let storage = self.storage.lock();
        if storage.closed {
            return Err(DbError::Statement("database is closed".into()));
        }
        self.select(&storage, stmt)
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, DbError> {
        if self.storage.lock().closed {
            return Err(DbError::Acquire("database is closed: no session available".into()));
        }
        Ok(Box::new(MemoryTransaction {
            db: self.clone(),
            writes: Vec::new(),
        }))
    }

    async fn ping(&self) -> Result<(), DbError> {
        if self.storage.lock().closed {
            return Err(DbError::Unavailable("database is closed".into()));
        }
        Ok(())
    }
}

struct MemoryTransaction {
    db: MemoryDatabase,
    writes: Vec<Write>,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn run_update(&mut self, stmt: &Statement) -> Result<u64, DbError> {
        tracing::debug!(sql = %stmt.sql, params = ?stmt.params, "query (tx)");
        let (write, affected) = {
            let storage = self.db.storage.lock();
            let verb = stmt.sql.trim_start().split_whitespace().next().unwrap_or_default();
            if verb.eq_ignore_ascii_case("INSERT") {
                self.db.plan_insert(&storage, stmt)?
            } else if verb.eq_ignore_ascii_case("DELETE") {
                self.db.plan_delete(&storage, stmt)?
            } else {
                return Err(DbError::Statement(format!("unsupported statement: {}", stmt.sql)));
            }
        };
        self.writes.push(write);
        Ok(affected)
    }

    async fn commit(self: Box<Self>) -> Result<(), DbError> {
        let MemoryTransaction { db, writes } = *self;
        let mut storage = db.storage.lock();
        if storage.closed {
            return Err(DbError::Statement("database is closed".into()));
        }
        if storage.pending_aborts > 0 {
            storage.pending_aborts -= 1;
            return Err(DbError::Aborted("Transaction was aborted.".into()));
        }

        // Validate every write before applying any, so a commit is all-or-nothing.
        for w in &writes {
            if let Write::Insert { table, row } = w {
                let t = storage.table(table)?;
                let key = row.get(&t.key).cloned().unwrap_or(Value::Null);
                if t.contains_key(&key) {
                    return Err(DbError::Aborted(format!(
                        "Row [{}] in table {} was inserted concurrently",
                        key.as_str().unwrap_or_default(),
                        table
                    )));
                }
            }
        }
        for w in writes {
            match w {
                Write::Insert { table, row } => storage.table_mut(&table)?.rows.push(row),
                Write::Delete { table, column, value } => {
                    storage.table_mut(&table)?.rows.retain(|r| r.get(&column) != Some(&value))
                }
            }
        }
        Ok(())
    }
}
