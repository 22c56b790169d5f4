//! hello-app: Players and Singers CRUD over a dialect-aware relational database.

pub mod case;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod service;
pub mod sql;
pub mod state;

pub use config::{load_entities, resolve, EntityConfig, ResolvedEntity, ResolvedModel, Settings};
pub use db::{Database, MemoryDatabase, PgDatabase, SpannerDatabase};
pub use error::{AppError, ConfigError, DbError};
pub use routes::{common_routes, entity_routes};
pub use server::{build_router, init_state, run};
pub use service::{CrudService, RetryPolicy};
pub use sql::Dialect;
pub use state::AppState;
