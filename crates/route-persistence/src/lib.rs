//! route-persistence
//!
//! Backend Postgres (Diesel + r2d2) de los contratos de almacenamiento de
//! `route-core`, con paridad respecto a `InMemoryRouteStore`.
//!
//! Módulos:
//! - `pg`: `PgRouteStore` y construcción del pool.
//! - `migrations`: runner embebido de migraciones Diesel.
//! - `config`: carga de configuración desde .env.
//! - `schema`: tablas Diesel.

pub mod config;
pub mod error;
pub mod migrations;
pub mod pg;
pub mod schema;

pub use config::{init_dotenv, DbConfig};
pub use error::PersistenceError;
pub use pg::{build_dev_pool_from_env, build_pool, ConnectionProvider, PgPool, PgRouteStore, PoolProvider};
