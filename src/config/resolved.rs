//! Resolved entity model: config validated and flattened for runtime use.

use crate::config::ColumnType;
use crate::sql::{Dialect, ParamStyle};
use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    /// Request body field and named-parameter name (camelCase of `name`).
    pub field: String,
    pub column_type: ColumnType,
}

#[derive(Clone, Debug)]
pub struct ResolvedEntity {
    pub path_segment: String,
    pub table_name: String,
    pub id_column: String,
    /// Named-parameter name for the id column (e.g. "playerUuid").
    pub id_param: String,
    /// Non-key columns in declaration order.
    pub columns: Vec<ColumnInfo>,
    pub postgres_dialect: bool,
}

impl ResolvedEntity {
    /// Parameter style this entity uses against a database of the given dialect.
    pub fn param_style(&self, dialect: Dialect) -> ParamStyle {
        match dialect {
            Dialect::PostgreSql if self.postgres_dialect => ParamStyle::Positional,
            _ => ParamStyle::Named,
        }
    }

    /// Id column followed by the data columns.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.id_column.as_str()).chain(self.columns.iter().map(|c| c.name.as_str()))
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedModel {
    pub entities: Vec<ResolvedEntity>,
    pub entity_by_path: HashMap<String, ResolvedEntity>,
}

impl ResolvedModel {
    pub fn entity_by_path(&self, path: &str) -> Option<&ResolvedEntity> {
        self.entity_by_path.get(path)
    }
}
