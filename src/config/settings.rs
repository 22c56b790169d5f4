//! Process settings from the environment (a `.env` file is loaded first by the binary).

use crate::error::ConfigError;
use crate::service::RetryPolicy;
use crate::sql::Dialect;
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_INSTANCE: &str = "hello-instance";
const DEFAULT_DATABASE: &str = "hello-database";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DatabaseBackend {
    /// Cloud Spanner over gRPC, either dialect. Default when a project id is set.
    Spanner,
    /// PostgreSQL wire protocol: Spanner through PGAdapter, or PostgreSQL itself.
    #[default]
    Postgres,
    /// In-process emulator.
    Memory,
}

impl FromStr for DatabaseBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "spanner" => Ok(DatabaseBackend::Spanner),
            "postgres" | "postgresql" | "pg" => Ok(DatabaseBackend::Postgres),
            "memory" | "mem" => Ok(DatabaseBackend::Memory),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DatabaseSettings {
    pub backend: DatabaseBackend,
    pub project_id: Option<String>,
    pub instance: String,
    pub database: String,
    /// Full connection URL; overrides the PGAdapter host/port/database path.
    pub url: Option<String>,
    pub pgadapter_host: String,
    pub pgadapter_port: u16,
    pub max_connections: u32,
    /// Dialect of the memory backend. Real backends report their own.
    pub dialect: Option<Dialect>,
}

impl DatabaseSettings {
    /// Fully qualified database name, or the bare database id when no project is configured.
    pub fn database_path(&self) -> String {
        match &self.project_id {
            Some(project) => format!(
                "projects/{}/instances/{}/databases/{}",
                project, self.instance, self.database
            ),
            None => self.database.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub bind_address: String,
    pub port: u16,
    pub database: DatabaseSettings,
    pub retry: RetryPolicy,
    pub entities_path: Option<PathBuf>,
    pub static_dir: PathBuf,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let project_id = get("GOOGLE_CLOUD_PROJECT_ID");
        let default_backend = match project_id {
            Some(_) => DatabaseBackend::Spanner,
            None => DatabaseBackend::default(),
        };
        let backend = parse_or(&get, "DATABASE_BACKEND", default_backend)?;
        if backend == DatabaseBackend::Spanner && project_id.is_none() {
            return Err(ConfigError::Validation(
                "DATABASE_BACKEND=spanner requires GOOGLE_CLOUD_PROJECT_ID".into(),
            ));
        }
        let dialect = match get("DATABASE_DIALECT") {
            Some(v) => Some(v.parse::<Dialect>().map_err(|_| ConfigError::InvalidEnv {
                var: "DATABASE_DIALECT",
                value: v,
            })?),
            None => None,
        };
        let max_attempts: u32 = parse_or(&get, "TRANSACTION_MAX_ATTEMPTS", 1)?;

        Ok(Settings {
            bind_address: get("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&get, "PORT", DEFAULT_PORT)?,
            database: DatabaseSettings {
                backend,
                project_id,
                instance: get("CLOUD_SPANNER_INSTANCE").unwrap_or_else(|| DEFAULT_INSTANCE.into()),
                database: get("CLOUD_SPANNER_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.into()),
                url: get("DATABASE_URL"),
                pgadapter_host: get("PGADAPTER_HOST").unwrap_or_else(|| "localhost".into()),
                pgadapter_port: parse_or(&get, "PGADAPTER_PORT", 5432)?,
                max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
                dialect,
            },
            retry: RetryPolicy::bounded(max_attempts),
            entities_path: get("ENTITIES_PATH").map(PathBuf::from),
            static_dir: get("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("client/build")),
        })
    }
}

fn parse_or<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(v) => v.trim().parse().map_err(|_| ConfigError::InvalidEnv { var, value: v }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_match_hello_app() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.port, 8080);
        assert_eq!(s.database.instance, "hello-instance");
        assert_eq!(s.database.database, "hello-database");
        assert_eq!(s.database.backend, DatabaseBackend::Postgres);
        assert_eq!(s.database.database_path(), "hello-database");
        assert_eq!(s.retry.max_attempts(), 1);
        assert!(s.entities_path.is_none());
    }

    #[test]
    fn database_path_includes_project_and_instance() {
        let s = settings(&[
            ("GOOGLE_CLOUD_PROJECT_ID", "my-project"),
            ("CLOUD_SPANNER_INSTANCE", "prod"),
            ("CLOUD_SPANNER_DATABASE", "music"),
        ])
        .unwrap();
        assert_eq!(s.database.database_path(), "projects/my-project/instances/prod/databases/music");
        assert_eq!(s.database.backend, DatabaseBackend::Spanner);
    }

    #[test]
    fn explicit_backend_overrides_project_default() {
        let s = settings(&[("GOOGLE_CLOUD_PROJECT_ID", "my-project"), ("DATABASE_BACKEND", "postgres")]).unwrap();
        assert_eq!(s.database.backend, DatabaseBackend::Postgres);
    }

    #[test]
    fn spanner_backend_needs_a_project() {
        let err = settings(&[("DATABASE_BACKEND", "spanner")]).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn parses_backend_dialect_and_retry() {
        let s = settings(&[
            ("DATABASE_BACKEND", "memory"),
            ("DATABASE_DIALECT", "POSTGRESQL"),
            ("TRANSACTION_MAX_ATTEMPTS", "3"),
            ("PORT", "3000"),
        ])
        .unwrap();
        assert_eq!(s.database.backend, DatabaseBackend::Memory);
        assert_eq!(s.database.dialect, Some(Dialect::PostgreSql));
        assert_eq!(s.retry.max_attempts(), 3);
        assert_eq!(s.port, 3000);
    }

    #[test]
    fn malformed_port_is_rejected() {
        let err = settings(&[("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { var: "PORT", .. }));
    }

    #[test]
    fn empty_value_counts_as_unset() {
        let s = settings(&[("CLOUD_SPANNER_INSTANCE", "")]).unwrap();
        assert_eq!(s.database.instance, "hello-instance");
    }
}
