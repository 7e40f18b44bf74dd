//! Versiones ejecutables y errores de compilación.
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VersionStatus {
    Ready,
    Invalid,
}

impl VersionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionStatus::Ready => "READY",
            VersionStatus::Invalid => "INVALID",
        }
    }
}

impl fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VersionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "READY" => Ok(VersionStatus::Ready),
            "INVALID" => Ok(VersionStatus::Invalid),
            other => Err(format!("unknown version status: {other}")),
        }
    }
}

/// Códigos de las reglas del validador, en el orden en que se evalúan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompileErrorCode {
    StationTypeMissing,
    StationConstraintMissing,
    IngestMappingMissing,
    DataSpecNotFound,
    DataSpecOperationMismatch,
}

impl CompileErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompileErrorCode::StationTypeMissing => "STATION_TYPE_MISSING",
            CompileErrorCode::StationConstraintMissing => "STATION_CONSTRAINT_MISSING",
            CompileErrorCode::IngestMappingMissing => "INGEST_MAPPING_MISSING",
            CompileErrorCode::DataSpecNotFound => "DATA_SPEC_NOT_FOUND",
            CompileErrorCode::DataSpecOperationMismatch => "DATA_SPEC_OPERATION_MISMATCH",
        }
    }
}

impl fmt::Display for CompileErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error de negocio de un paso. Es dato, nunca `Err`: se acumula en
/// `errors_json` de una versión INVALID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileError {
    pub step_no: i32,
    pub code: CompileErrorCode,
    pub message: String,
}

impl CompileError {
    pub fn new(step_no: i32, code: CompileErrorCode, message: impl Into<String>) -> Self {
        Self { step_no,
               code,
               message: message.into() }
    }
}

/// Versión ejecutable. Inmutable una vez creada.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutableRouteVersion {
    pub id: String,
    pub routing_id: String,
    pub version_no: i32,
    pub status: VersionStatus,
    /// Contrato JSON estable que consume el runtime de ejecución.
    pub snapshot_json: Value,
    /// Presente sólo si hubo errores.
    pub errors_json: Option<Value>,
    pub compiled_at: DateTime<Utc>,
}

impl ExecutableRouteVersion {
    /// Errores tipados; filas con JSON ilegible devuelven lista vacía.
    pub fn errors(&self) -> Vec<CompileError> {
        self.errors_json
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRouteVersion {
    pub routing_id: String,
    pub version_no: i32,
    pub status: VersionStatus,
    pub snapshot_json: Value,
    pub errors_json: Option<Value>,
    pub compiled_at: DateTime<Utc>,
}
