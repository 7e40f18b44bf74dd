//! Modelo del compilador de rutas.
//!
//! - `routing`: datos de diseño (rutas, pasos, grupos de estación, specs) que
//!   llegan de colaboradores externos y sólo se leen.
//! - `station`: tipos de estación y mapeo de ingesta tipado.
//! - `config`: overrides de ejecución (`RouteExecutionConfig`) y sus entradas
//!   de alta/modificación.
//! - `version`: versiones ejecutables inmutables y errores de compilación.
pub mod config;
pub mod routing;
pub mod station;
pub mod version;

pub use config::{double_option, ConfigScope, ExecutionConfigCreate, ExecutionConfigPatch, ExecutionConfigUpdate,
                 NewExecutionConfig, RouteExecutionConfig};
pub use routing::{DataCollectionSpec, Routing, RoutingStep, StationGroup};
pub use station::{IngestMapping, StationBinding, StationType};
pub use version::{CompileError, CompileErrorCode, ExecutableRouteVersion, NewRouteVersion, VersionStatus};
