//! Raw entity mapping types matching the JSON config (ENTITIES_PATH) format.

use serde::{Deserialize, Serialize};

/// Column value type. Decides placeholder casts and how the emulator checks values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    #[default]
    String,
    Date,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    #[serde(rename = "type", default)]
    pub type_: ColumnType,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityConfig {
    pub path_segment: String,
    pub table: String,
    /// Primary key column; always a server-generated UUID string.
    pub id_column: String,
    pub columns: Vec<ColumnConfig>,
    /// Whether this entity can emit positional (`$n`) SQL for PostgreSQL-dialect databases.
    /// When false, named (`@param`) SQL is emitted regardless of dialect.
    #[serde(default = "default_true")]
    pub postgres_dialect: bool,
}

fn default_true() -> bool {
    true
}

fn person_columns() -> Vec<ColumnConfig> {
    vec![
        ColumnConfig {
            name: "FirstName".into(),
            type_: ColumnType::String,
        },
        ColumnConfig {
            name: "LastName".into(),
            type_: ColumnType::String,
        },
        ColumnConfig {
            name: "BirthDate".into(),
            type_: ColumnType::Date,
        },
    ]
}

/// Built-in mapping: Players and Singers. The singer handlers only ever spoke the named dialect.
pub fn default_entities() -> Vec<EntityConfig> {
    vec![
        EntityConfig {
            path_segment: "players".into(),
            table: "Players".into(),
            id_column: "PlayerUuid".into(),
            columns: person_columns(),
            postgres_dialect: true,
        },
        EntityConfig {
            path_segment: "singers".into(),
            table: "Singers".into(),
            id_column: "SingerUuid".into(),
            columns: person_columns(),
            postgres_dialect: false,
        },
    ]
}
