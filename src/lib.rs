//! routeflow
//!
//! Fachada del compilador de rutas de ejecución:
//! - `route_core`: modelo, resolvedor, validador, snapshot, servicio y
//!   backend en memoria.
//! - `route_persistence`: backend Postgres.
//! - `config`: configuración de la aplicación desde el entorno.

pub mod config;

pub use route_core;
pub use route_persistence;

pub use config::{AppConfig, ConfigError};
pub use route_core::{ExecutableRouteVersion, InMemoryRouteStore, RouteError, RouteExecutionService, StoreError,
                     VersionStatus};
pub use route_persistence::{PgRouteStore, PoolProvider};
