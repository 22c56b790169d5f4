//! Builds parameterized SELECT, INSERT and DELETE for a resolved entity, in either placeholder style.

use crate::config::{ColumnType, ResolvedEntity};
use crate::sql::{Dialect, ParamStyle, SqlValue};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    /// `p1..pN` for positional statements, the placeholder name (without `@`) for named ones.
    pub name: String,
    pub value: SqlValue,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Param>,
    pub style: ParamStyle,
    /// Output column names of a SELECT, in select-list order. Empty for DML.
    pub columns: Vec<String>,
}

impl Statement {
    fn new(style: ParamStyle) -> Self {
        Statement {
            sql: String::new(),
            params: Vec::new(),
            style,
            columns: Vec::new(),
        }
    }

    /// Register a parameter and return its placeholder text.
    fn push_param(&mut self, name: &str, column_type: ColumnType, value: SqlValue) -> String {
        match self.style {
            ParamStyle::Named => {
                self.params.push(Param {
                    name: name.to_string(),
                    value,
                });
                format!("@{}", name)
            }
            ParamStyle::Positional => {
                let n = self.params.len() + 1;
                self.params.push(Param {
                    name: format!("p{}", n),
                    value,
                });
                // Values are bound as text; the server parses dates.
                match column_type {
                    ColumnType::Date => format!("${}::date", n),
                    ColumnType::String => format!("${}", n),
                }
            }
        }
    }
}

/// SELECT every column, unordered. PostgreSQL folds unquoted identifiers, so columns are aliased back to their declared case.
pub fn select_all(entity: &ResolvedEntity, dialect: Dialect) -> Statement {
    let mut q = Statement::new(entity.param_style(dialect));
    let cols = entity
        .column_names()
        .map(|c| match dialect {
            Dialect::PostgreSql => format!("{} AS \"{}\"", c, c),
            Dialect::GoogleStandardSql => c.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ");
    q.sql = format!("SELECT {} FROM {}", cols, entity.table_name);
    q.columns = entity.column_names().map(str::to_string).collect();
    q
}

/// INSERT of one row: the generated id plus each column's value looked up by field name in `body`.
/// Missing fields bind NULL.
pub fn insert(
    entity: &ResolvedEntity,
    style: ParamStyle,
    id: &str,
    body: &HashMap<String, Value>,
) -> Statement {
    let mut q = Statement::new(style);
    let mut placeholders = Vec::with_capacity(entity.columns.len() + 1);
    placeholders.push(q.push_param(&entity.id_param, ColumnType::String, SqlValue::String(id.to_string())));
    for c in &entity.columns {
        let value = body.get(&c.field).map(SqlValue::from_json).unwrap_or(SqlValue::Null);
        placeholders.push(q.push_param(&c.field, c.column_type, value));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        entity.table_name,
        entity.column_names().collect::<Vec<_>>().join(", "),
        placeholders.join(", ")
    );
    q
}

/// DELETE by id.
pub fn delete(entity: &ResolvedEntity, style: ParamStyle, id: &str) -> Statement {
    let mut q = Statement::new(style);
    let ph = q.push_param(&entity.id_param, ColumnType::String, SqlValue::String(id.to_string()));
    q.sql = format!("DELETE FROM {} WHERE {} = {}", entity.table_name, entity.id_column, ph);
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{default_entities, resolve};
    use serde_json::json;

    fn players() -> ResolvedEntity {
        resolve(&default_entities()).unwrap().entity_by_path("players").unwrap().clone()
    }

    fn ada() -> HashMap<String, Value> {
        HashMap::from([
            ("firstName".to_string(), json!("Ada")),
            ("lastName".to_string(), json!("Lovelace")),
            ("birthDate".to_string(), json!("1815-12-10")),
        ])
    }

    #[test]
    fn named_insert() {
        let q = insert(&players(), ParamStyle::Named, "u-1", &ada());
        assert_eq!(
            q.sql,
            "INSERT INTO Players (PlayerUuid, FirstName, LastName, BirthDate) \
             VALUES (@playerUuid, @firstName, @lastName, @birthDate)"
        );
        let names: Vec<_> = q.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["playerUuid", "firstName", "lastName", "birthDate"]);
        assert_eq!(q.params[0].value, SqlValue::String("u-1".into()));
        assert_eq!(q.params[3].value, SqlValue::String("1815-12-10".into()));
    }

    #[test]
    fn positional_insert() {
        let q = insert(&players(), ParamStyle::Positional, "u-1", &ada());
        assert_eq!(
            q.sql,
            "INSERT INTO Players (PlayerUuid, FirstName, LastName, BirthDate) VALUES ($1, $2, $3, $4::date)"
        );
        let names: Vec<_> = q.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["p1", "p2", "p3", "p4"]);
        assert_eq!(q.params[1].value, SqlValue::String("Ada".into()));
    }

    #[test]
    fn missing_fields_bind_null() {
        let q = insert(&players(), ParamStyle::Named, "u-1", &HashMap::new());
        assert!(q.params[1..].iter().all(|p| p.value == SqlValue::Null));
    }

    #[test]
    fn delete_in_both_styles() {
        let named = delete(&players(), ParamStyle::Named, "u-1");
        assert_eq!(named.sql, "DELETE FROM Players WHERE PlayerUuid = @playerUuid");
        let positional = delete(&players(), ParamStyle::Positional, "u-1");
        assert_eq!(positional.sql, "DELETE FROM Players WHERE PlayerUuid = $1");
        assert_eq!(positional.params[0].name, "p1");
        assert_eq!(named.params[0].value, positional.params[0].value);
    }

    #[test]
    fn select_aliases_columns_for_postgres() {
        let q = select_all(&players(), Dialect::PostgreSql);
        assert_eq!(
            q.sql,
            r#"SELECT PlayerUuid AS "PlayerUuid", FirstName AS "FirstName", LastName AS "LastName", BirthDate AS "BirthDate" FROM Players"#
        );
        let q = select_all(&players(), Dialect::GoogleStandardSql);
        assert_eq!(q.sql, "SELECT PlayerUuid, FirstName, LastName, BirthDate FROM Players");
        assert!(q.params.is_empty());
        assert_eq!(q.columns, ["PlayerUuid", "FirstName", "LastName", "BirthDate"]);
    }
}
