//! Subcomandos sobre `RouteExecutionService` + `PgRouteStore`. Cada uno
//! devuelve el cuerpo JSON a imprimir.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use route_core::{ExecutionConfigCreate, ExecutionConfigUpdate, RouteError, RouteExecutionService};
use route_persistence::pg::{build_pool, PgRouteStore, PoolProvider};
use route_persistence::PersistenceError;
use routeflow::config::AppConfig;

pub type Service = RouteExecutionService<PgRouteStore<PoolProvider>>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid input: {0}")]
    Input(String),
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("output error: {0}")]
    Output(String),
}

impl CliError {
    pub fn code(&self) -> &'static str {
        match self {
            CliError::Input(_) => "INVALID_INPUT",
            CliError::Route(e) => e.code(),
            CliError::Persistence(_) => "STORAGE_ERROR",
            CliError::Output(_) => "OUTPUT_ERROR",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Input(_) => 3,
            CliError::Route(e) if e.status() < 500 => 4,
            _ => 5,
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, CliError> {
    serde_json::to_value(value).map_err(|e| CliError::Output(e.to_string()))
}

pub fn connect(config: &AppConfig) -> Result<Service, CliError> {
    let pool = build_pool(&config.db.url, config.db.min_connections, config.db.max_connections)?;
    Ok(RouteExecutionService::new(PgRouteStore::from_pool(pool)).with_max_compile_attempts(config.compile_attempts))
}

pub fn compile(svc: &Service, routing: &str) -> Result<Value, CliError> {
    let version = svc.compile(routing)?;
    tracing::info!(routing, version_no = version.version_no, status = %version.status, "compiled");
    to_json(&version)
}

pub fn versions(svc: &Service, routing: &str) -> Result<Value, CliError> {
    to_json(&svc.list_route_versions(routing)?)
}

pub fn version(svc: &Service, routing: &str, version_no: i32) -> Result<Value, CliError> {
    to_json(&svc.get_route_version(routing, version_no)?)
}

pub fn list_configs(svc: &Service, routing: &str) -> Result<Value, CliError> {
    to_json(&svc.list_execution_configs(routing)?)
}

pub fn parse_create(body: &str) -> Result<ExecutionConfigCreate, CliError> {
    serde_json::from_str(body).map_err(|e| CliError::Input(e.to_string()))
}

pub fn parse_update(body: &str) -> Result<ExecutionConfigUpdate, CliError> {
    serde_json::from_str(body).map_err(|e| CliError::Input(e.to_string()))
}

pub fn create_config(svc: &Service, routing: &str, body: &str) -> Result<Value, CliError> {
    let created = svc.create_execution_config(routing, parse_create(body)?)?;
    to_json(&created)
}

pub fn update_config(svc: &Service, routing: &str, config_id: &str, body: &str) -> Result<Value, CliError> {
    let updated = svc.update_execution_config(routing, config_id, parse_update(body)?)?;
    to_json(&updated)
}
