//! Overrides de ejecución (`RouteExecutionConfig`).
//!
//! Las filas forman un historial append-only por objetivo de alcance: en
//! compilación sólo cuenta la más reciente (`updated_at`, desempate por `id`).
//! Los campos `Option` significan "no definido por este override" y dejan
//! pasar el valor del siguiente nivel de precedencia.
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::{IngestMapping, StationType};

/// Alcance de un override. Sólo `Route` y `Step` se crean y se compilan;
/// `Operation` y `SourceStep` son filas heredadas que únicamente cuentan para
/// la verificación de pertenencia.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigScope {
    Route,
    Operation,
    Step,
    SourceStep,
}

impl ConfigScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigScope::Route => "ROUTE",
            ConfigScope::Operation => "OPERATION",
            ConfigScope::Step => "STEP",
            ConfigScope::SourceStep => "SOURCE_STEP",
        }
    }
}

impl fmt::Display for ConfigScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ROUTE" => Ok(ConfigScope::Route),
            "OPERATION" => Ok(ConfigScope::Operation),
            "STEP" => Ok(ConfigScope::Step),
            "SOURCE_STEP" => Ok(ConfigScope::SourceStep),
            other => Err(format!("unknown scope type: {other}")),
        }
    }
}

/// Override almacenado.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteExecutionConfig {
    pub id: String,
    #[serde(rename = "scopeType")]
    pub scope: ConfigScope,
    /// Sólo para alcance ROUTE.
    pub routing_id: Option<String>,
    pub routing_step_id: Option<String>,
    pub source_step_key: Option<String>,
    /// Filas heredadas de alcance OPERATION; cuentan para pertenencia, nunca
    /// para resolución.
    pub operation_id: Option<String>,
    pub station_type: Option<StationType>,
    pub station_group_id: Option<String>,
    pub allowed_station_ids: Option<Vec<String>>,
    #[serde(rename = "requiresFAI")]
    pub requires_fai: Option<bool>,
    pub requires_authorization: Option<bool>,
    pub data_spec_ids: Option<Vec<String>>,
    pub ingest_mapping: Option<IngestMapping>,
    pub meta: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fila nueva ya validada por el servicio; el store asigna `id` y tiempos.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExecutionConfig {
    pub scope: ConfigScope,
    pub routing_id: Option<String>,
    pub routing_step_id: Option<String>,
    pub source_step_key: Option<String>,
    pub station_type: Option<StationType>,
    pub station_group_id: Option<String>,
    pub allowed_station_ids: Option<Vec<String>>,
    pub requires_fai: Option<bool>,
    pub requires_authorization: Option<bool>,
    pub data_spec_ids: Option<Vec<String>>,
    pub ingest_mapping: Option<IngestMapping>,
    pub meta: Option<Value>,
}

/// Modificación parcial a nivel de store. `None` deja el campo intacto;
/// `Some(None)` lo limpia.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionConfigPatch {
    pub station_type: Option<Option<StationType>>,
    pub station_group_id: Option<Option<String>>,
    pub allowed_station_ids: Option<Option<Vec<String>>>,
    pub requires_fai: Option<Option<bool>>,
    pub requires_authorization: Option<Option<bool>>,
    pub data_spec_ids: Option<Option<Vec<String>>>,
    pub ingest_mapping: Option<Option<IngestMapping>>,
    pub meta: Option<Option<Value>>,
}

impl ExecutionConfigPatch {
    /// Aplica sólo los campos presentes. No toca `updated_at`.
    pub fn apply(&self, row: &mut RouteExecutionConfig) {
        if let Some(v) = self.station_type {
            row.station_type = v;
        }
        if let Some(v) = &self.station_group_id {
            row.station_group_id = v.clone();
        }
        if let Some(v) = &self.allowed_station_ids {
            row.allowed_station_ids = v.clone();
        }
        if let Some(v) = self.requires_fai {
            row.requires_fai = v;
        }
        if let Some(v) = self.requires_authorization {
            row.requires_authorization = v;
        }
        if let Some(v) = &self.data_spec_ids {
            row.data_spec_ids = v.clone();
        }
        if let Some(v) = &self.ingest_mapping {
            row.ingest_mapping = v.clone();
        }
        if let Some(v) = &self.meta {
            row.meta = v.clone();
        }
    }
}

/// Distingue campo ausente (`None`) de `null` explícito (`Some(None)`).
pub fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
    where T: Deserialize<'de>,
          D: Deserializer<'de>
{
    Deserialize::deserialize(de).map(Some)
}

/// Entrada de `create_execution_config`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionConfigCreate {
    /// Se valida en el servicio para responder `SCOPE_TYPE_INVALID`.
    pub scope_type: String,
    pub step_no: Option<i32>,
    pub station_type: Option<StationType>,
    #[serde(default, deserialize_with = "double_option")]
    pub station_group_code: Option<Option<String>>,
    pub allowed_station_ids: Option<Vec<String>>,
    #[serde(rename = "requiresFAI")]
    pub requires_fai: Option<bool>,
    pub requires_authorization: Option<bool>,
    pub data_spec_ids: Option<Vec<String>>,
    pub ingest_mapping: Option<IngestMapping>,
    pub meta: Option<Value>,
}

/// Entrada de `update_execution_config`; sólo se escriben los campos presentes.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionConfigUpdate {
    #[serde(default, deserialize_with = "double_option")]
    pub station_type: Option<Option<StationType>>,
    #[serde(default, deserialize_with = "double_option")]
    pub station_group_code: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub allowed_station_ids: Option<Option<Vec<String>>>,
    #[serde(rename = "requiresFAI", default, deserialize_with = "double_option")]
    pub requires_fai: Option<Option<bool>>,
    #[serde(default, deserialize_with = "double_option")]
    pub requires_authorization: Option<Option<bool>>,
    #[serde(default, deserialize_with = "double_option")]
    pub data_spec_ids: Option<Option<Vec<String>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub ingest_mapping: Option<Option<IngestMapping>>,
    #[serde(default, deserialize_with = "double_option")]
    pub meta: Option<Option<Value>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn update_distinguishes_absent_from_null() {
        let upd: ExecutionConfigUpdate =
            serde_json::from_value(json!({"stationGroupCode": null, "dataSpecIds": ["s1"]})).unwrap();
        assert_eq!(upd.station_group_code, Some(None));
        assert_eq!(upd.data_spec_ids, Some(Some(vec!["s1".to_string()])));
        assert_eq!(upd.allowed_station_ids, None);
        assert_eq!(upd.ingest_mapping, None);
        assert_eq!(upd.station_type, None);
    }

    #[test]
    fn update_null_clears_scalar_fields() {
        let upd: ExecutionConfigUpdate = serde_json::from_value(json!({
            "stationType": null,
            "requiresFAI": null,
            "requiresAuthorization": false
        })).unwrap();
        assert_eq!(upd.station_type, Some(None));
        assert_eq!(upd.requires_fai, Some(None));
        assert_eq!(upd.requires_authorization, Some(Some(false)));

        let patch = ExecutionConfigPatch { station_type: upd.station_type,
                                           requires_fai: upd.requires_fai,
                                           requires_authorization: upd.requires_authorization,
                                           ..Default::default() };
        let mut row = RouteExecutionConfig { id: "c1".into(),
                                             scope: ConfigScope::Step,
                                             routing_id: None,
                                             routing_step_id: Some("st-1".into()),
                                             source_step_key: None,
                                             operation_id: None,
                                             station_type: Some(StationType::Auto),
                                             station_group_id: Some("sg-1".into()),
                                             allowed_station_ids: None,
                                             requires_fai: Some(true),
                                             requires_authorization: Some(true),
                                             data_spec_ids: None,
                                             ingest_mapping: None,
                                             meta: None,
                                             created_at: Utc::now(),
                                             updated_at: Utc::now() };
        patch.apply(&mut row);
        assert_eq!(row.station_type, None);
        assert_eq!(row.requires_fai, None);
        assert_eq!(row.requires_authorization, Some(false));
        assert_eq!(row.station_group_id.as_deref(), Some("sg-1"));
    }

    #[test]
    fn create_reads_camel_case_payload() {
        let input: ExecutionConfigCreate = serde_json::from_value(json!({
            "scopeType": "STEP",
            "stepNo": 10,
            "stationType": "AUTO",
            "requiresFAI": true,
            "ingestMapping": {"eventType": "AUTO"}
        })).unwrap();
        assert_eq!(input.scope_type, "STEP");
        assert_eq!(input.step_no, Some(10));
        assert_eq!(input.station_type, Some(StationType::Auto));
        assert_eq!(input.requires_fai, Some(true));
        assert!(input.ingest_mapping.is_some());
        assert_eq!(input.station_group_code, None);
    }

    #[test]
    fn scope_names_are_case_sensitive() {
        assert_eq!("SOURCE_STEP".parse::<ConfigScope>(), Ok(ConfigScope::SourceStep));
        assert_eq!(ConfigScope::SourceStep.to_string(), "SOURCE_STEP");
        assert!("route".parse::<ConfigScope>().is_err());
        assert_eq!(serde_json::to_value(ConfigScope::Operation).unwrap(), json!("OPERATION"));
    }
}
