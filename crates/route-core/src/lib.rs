//! route-core: compilador de rutas de ejecución.
//!
//! Convierte una ruta editable (pasos ordenados + overrides de alcance ROUTE
//! y STEP) en una versión ejecutable inmutable, validada y versionada.
//! Flujo en un solo sentido: store → `resolver` → `validator` → `snapshot`
//! → `VersionStore`.
pub mod constants;
pub mod errors;
pub mod hashing;
pub mod model;
pub mod repo;
pub mod resolver;
pub mod service;
pub mod snapshot;
pub mod validator;

pub use errors::{RouteError, StoreError};
pub use model::{CompileError, CompileErrorCode, ConfigScope, DataCollectionSpec, ExecutableRouteVersion,
                ExecutionConfigCreate, ExecutionConfigUpdate, IngestMapping, RouteExecutionConfig, Routing, RoutingStep,
                StationGroup, StationType, VersionStatus};
pub use repo::{ExecutionConfigStore, InMemoryRouteStore, RoutingSource, VersionStore};
pub use resolver::ResolvedStep;
pub use service::RouteExecutionService;
pub use snapshot::{CompiledStep, RouteSnapshot, SnapshotCore};
