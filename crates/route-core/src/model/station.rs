//! Tipos de estación y mapeo de ingesta.
//!
//! El mapeo de ingesta es JSON opaco para el compilador, pero sólo se acepta
//! con forma de objeto. `StationBinding` une tipo de estación y mapeo en una
//! unión cerrada: las estaciones AUTO/BATCH/TEST no pueden construirse sin
//! mapeo, de modo que la regla `INGEST_MAPPING_MISSING` es exactamente el
//! fallo de `StationBinding::bind`.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StationType {
    Manual,
    Auto,
    Batch,
    Test,
}

impl StationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StationType::Manual => "MANUAL",
            StationType::Auto => "AUTO",
            StationType::Batch => "BATCH",
            StationType::Test => "TEST",
        }
    }
}

impl fmt::Display for StationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MANUAL" => Ok(StationType::Manual),
            "AUTO" => Ok(StationType::Auto),
            "BATCH" => Ok(StationType::Batch),
            "TEST" => Ok(StationType::Test),
            other => Err(format!("unknown station type: {other}")),
        }
    }
}

/// Mapeo de ingesta: siempre un objeto JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IngestMapping(Map<String, Value>);

impl IngestMapping {
    /// Convierte JSON almacenado; cualquier cosa que no sea objeto cuenta
    /// como "sin mapeo".
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// JSON almacenable del mapeo.
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

/// Tipo de estación resuelto junto con su mapeo, prestado del paso.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StationBinding<'a> {
    Manual(Option<&'a IngestMapping>),
    Auto(&'a IngestMapping),
    Batch(&'a IngestMapping),
    Test(&'a IngestMapping),
}

impl<'a> StationBinding<'a> {
    /// Falla con el tipo de estación cuando éste exige un mapeo ausente.
    pub fn bind(station_type: StationType, mapping: Option<&'a IngestMapping>) -> Result<Self, StationType> {
        match (station_type, mapping) {
            (StationType::Manual, mapping) => Ok(StationBinding::Manual(mapping)),
            (StationType::Auto, Some(m)) => Ok(StationBinding::Auto(m)),
            (StationType::Batch, Some(m)) => Ok(StationBinding::Batch(m)),
            (StationType::Test, Some(m)) => Ok(StationBinding::Test(m)),
            (other, None) => Err(other),
        }
    }
}
