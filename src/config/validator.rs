//! Config validation: identifiers are interpolated into SQL, so they must be plain names.

use crate::config::EntityConfig;
use crate::error::ConfigError;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex"))
}

fn path_segment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9_-]*$").expect("static regex"))
}

fn check_identifier(kind: &'static str, value: &str) -> Result<(), ConfigError> {
    if identifier_re().is_match(value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier {
            kind,
            value: value.to_string(),
        })
    }
}

pub fn validate(entities: &[EntityConfig]) -> Result<(), ConfigError> {
    if entities.is_empty() {
        return Err(ConfigError::Validation("at least one entity required".into()));
    }

    let mut segments = HashSet::new();
    for e in entities {
        if !path_segment_re().is_match(&e.path_segment) {
            return Err(ConfigError::InvalidIdentifier {
                kind: "path segment",
                value: e.path_segment.clone(),
            });
        }
        if !segments.insert(e.path_segment.as_str()) {
            return Err(ConfigError::DuplicatePathSegment(e.path_segment.clone()));
        }
        check_identifier("table", &e.table)?;
        check_identifier("column", &e.id_column)?;
        if e.columns.is_empty() {
            return Err(ConfigError::Validation(format!(
                "entity '{}' has no columns besides '{}'",
                e.path_segment, e.id_column
            )));
        }

        let mut names = HashSet::new();
        names.insert(e.id_column.to_lowercase());
        for c in &e.columns {
            check_identifier("column", &c.name)?;
            if !names.insert(c.name.to_lowercase()) {
                return Err(ConfigError::Validation(format!(
                    "entity '{}' declares column '{}' twice",
                    e.path_segment, c.name
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_entities;

    #[test]
    fn default_entities_are_valid() {
        validate(&default_entities()).unwrap();
    }

    #[test]
    fn rejects_duplicate_path_segment() {
        let mut entities = default_entities();
        entities[1].path_segment = "players".into();
        assert!(matches!(
            validate(&entities),
            Err(ConfigError::DuplicatePathSegment(s)) if s == "players"
        ));
    }

    #[test]
    fn rejects_injected_table_name() {
        let mut entities = default_entities();
        entities[0].table = "Players; DROP TABLE Singers".into();
        assert!(matches!(
            validate(&entities),
            Err(ConfigError::InvalidIdentifier { kind: "table", .. })
        ));
    }

    #[test]
    fn rejects_id_column_repeated_as_data_column() {
        let mut entities = default_entities();
        entities[0].columns[0].name = "playeruuid".into();
        assert!(matches!(validate(&entities), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn rejects_empty_model() {
        assert!(validate(&[]).is_err());
    }
}
