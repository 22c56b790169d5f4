//! Load the entity mapping (built-in or from a JSON file) and resolve it for runtime use.

use crate::case::to_camel_case;
use crate::config::resolved::{ColumnInfo, ResolvedEntity, ResolvedModel};
use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::Path;

/// Read entity configs from `path`, or the built-in Players/Singers mapping when `None`.
pub async fn load_entities(path: Option<&Path>) -> Result<Vec<EntityConfig>, ConfigError> {
    let Some(path) = path else {
        return Ok(default_entities());
    };
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}

/// Build resolved model from entity configs (validates first).
pub fn resolve(entities: &[EntityConfig]) -> Result<ResolvedModel, ConfigError> {
    validate(entities)?;

    let mut resolved = Vec::with_capacity(entities.len());
    let mut entity_by_path = HashMap::new();
    for e in entities {
        let columns = e
            .columns
            .iter()
            .map(|c| ColumnInfo {
                name: c.name.clone(),
                field: to_camel_case(&c.name),
                column_type: c.type_,
            })
            .collect();
        let entity = ResolvedEntity {
            path_segment: e.path_segment.clone(),
            table_name: e.table.clone(),
            id_column: e.id_column.clone(),
            id_param: to_camel_case(&e.id_column),
            columns,
            postgres_dialect: e.postgres_dialect,
        };
        entity_by_path.insert(entity.path_segment.clone(), entity.clone());
        resolved.push(entity);
    }

    Ok(ResolvedModel {
        entities: resolved,
        entity_by_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn resolves_builtin_mapping() {
        let model = resolve(&default_entities()).unwrap();
        let players = model.entity_by_path("players").unwrap();
        assert_eq!(players.table_name, "Players");
        assert_eq!(players.id_param, "playerUuid");
        assert_eq!(
            players.columns.iter().map(|c| c.field.as_str()).collect::<Vec<_>>(),
            ["firstName", "lastName", "birthDate"]
        );
        assert!(players.postgres_dialect);
        assert!(!model.entity_by_path("singers").unwrap().postgres_dialect);
        assert!(model.entity_by_path("albums").is_none());
    }

    #[tokio::test]
    async fn loads_mapping_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{
                "path_segment": "albums",
                "table": "Albums",
                "id_column": "AlbumUuid",
                "columns": [{{ "name": "Title" }}, {{ "name": "ReleaseDate", "type": "date" }}]
            }}]"#
        )
        .unwrap();

        let entities = load_entities(Some(file.path())).await.unwrap();
        assert_eq!(entities.len(), 1);
        assert!(entities[0].postgres_dialect);
        assert_eq!(entities[0].columns[0].type_, ColumnType::String);
        assert_eq!(entities[0].columns[1].type_, ColumnType::Date);
    }

    #[tokio::test]
    async fn missing_file_is_a_load_error() {
        let err = load_entities(Some(Path::new("/nonexistent/entities.json"))).await.unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }
}
