//! Errores del compilador.
//!
//! - `StoreError`: fallos de backend, neutrales respecto a la base de datos.
//! - `RouteError`: fallos a nivel de solicitud, con código estable y estado
//!   estilo HTTP. Abortan la operación antes de escribir.
//!
//! Los errores de negocio del validador no están aquí: son datos
//! (`CompileError`) adjuntos a una versión INVALID.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Otra escritura ganó la carrera por `(routing_id, version_no)`.
    #[error("version {version_no} of routing {routing_id} was written concurrently")]
    VersionConflict { routing_id: String, version_no: i32 },
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("routing not found: {0}")]
    RouteNotFound(String),
    #[error("routing {0} has no steps")]
    RoutingEmpty(String),
    #[error("invalid execution config scope: {0}")]
    ScopeTypeInvalid(String),
    #[error("stepNo is required for STEP scope")]
    StepNoRequired,
    #[error("routing step {step_no} not found in {routing_code}")]
    RouteStepNotFound { routing_code: String, step_no: i32 },
    #[error("station group not found: {0}")]
    StationGroupNotFound(String),
    #[error("execution config not found: {0}")]
    ExecutionConfigNotFound(String),
    #[error("execution config {config_id} does not belong to routing {routing_code}")]
    ExecutionConfigScopeMismatch { routing_code: String, config_id: String },
    #[error("route version {version_no} not found for {routing_code}")]
    RouteVersionNotFound { routing_code: String, version_no: i32 },
    #[error("compile of {routing_code} gave up after {attempts} conflicting attempts")]
    CompileContention { routing_code: String, attempts: u32 },
    #[error("snapshot serialization: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl RouteError {
    /// Código estable expuesto a los colaboradores.
    pub fn code(&self) -> &'static str {
        match self {
            RouteError::RouteNotFound(_) => "ROUTE_NOT_FOUND",
            RouteError::RoutingEmpty(_) => "ROUTING_EMPTY",
            RouteError::ScopeTypeInvalid(_) => "SCOPE_TYPE_INVALID",
            RouteError::StepNoRequired => "STEP_NO_REQUIRED",
            RouteError::RouteStepNotFound { .. } => "ROUTE_STEP_NOT_FOUND",
            RouteError::StationGroupNotFound(_) => "STATION_GROUP_NOT_FOUND",
            RouteError::ExecutionConfigNotFound(_) => "EXECUTION_CONFIG_NOT_FOUND",
            RouteError::ExecutionConfigScopeMismatch { .. } => "EXECUTION_CONFIG_SCOPE_MISMATCH",
            RouteError::RouteVersionNotFound { .. } => "ROUTE_VERSION_NOT_FOUND",
            RouteError::CompileContention { .. } => "COMPILE_CONTENTION",
            RouteError::Serialization(_) | RouteError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Estado estilo HTTP sugerido para la capa de transporte.
    pub fn status(&self) -> u16 {
        match self {
            RouteError::RoutingEmpty(_)
            | RouteError::ScopeTypeInvalid(_)
            | RouteError::StepNoRequired
            | RouteError::ExecutionConfigScopeMismatch { .. } => 400,
            RouteError::RouteNotFound(_)
            | RouteError::RouteStepNotFound { .. }
            | RouteError::StationGroupNotFound(_)
            | RouteError::ExecutionConfigNotFound(_)
            | RouteError::RouteVersionNotFound { .. } => 404,
            RouteError::CompileContention { .. } => 409,
            RouteError::Serialization(_) | RouteError::Storage(_) => 500,
        }
    }

    pub(crate) fn is_version_conflict(&self) -> bool {
        matches!(self, RouteError::Storage(StoreError::VersionConflict { .. }))
    }
}
