//! Datos de diseño de ruta. Los produce el diseño de rutas o la sincronización
//! con el ERP; el compilador nunca los modifica.
use serde::{Deserialize, Serialize};

use super::StationType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Routing {
    pub id: String,
    /// Código único de la ruta; clave de todas las operaciones públicas.
    pub code: String,
    pub name: String,
    pub source_system: String,
    pub source_key: Option<String>,
}

/// Paso tal como fue diseñado. Sus atributos son el default cuando ningún
/// override aplica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingStep {
    pub id: String,
    pub routing_id: String,
    /// Único dentro de la ruta.
    pub step_no: i32,
    pub operation_id: String,
    pub source_step_key: Option<String>,
    /// Puede faltar en pasos importados del ERP.
    pub station_type: Option<StationType>,
    pub station_group_id: Option<String>,
    #[serde(rename = "requiresFAI")]
    pub requires_fai: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationGroup {
    pub id: String,
    pub code: String,
    pub name: String,
}

/// Spec de recolección de datos; sólo interesa a qué operación pertenece.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataCollectionSpec {
    pub id: String,
    pub operation_id: String,
    pub name: String,
}
