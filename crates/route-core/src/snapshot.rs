//! Construcción del snapshot y su firma.
//!
//! La firma cubre exactamente `{route, steps}`: nunca `routeVersion`
//! (`versionNo`, `compiledAt`), para que recompilar una entrada sin cambios
//! produzca el mismo hash. Se calcula sobre JSON canónico, por lo que el
//! orden de construcción de los objetos no la altera.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::hashing::hash_value;
use crate::model::{IngestMapping, Routing, StationType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteIdentity {
    pub code: String,
    pub source_system: String,
    pub source_key: Option<String>,
}

impl From<&Routing> for RouteIdentity {
    fn from(r: &Routing) -> Self {
        Self { code: r.code.clone(),
               source_system: r.source_system.clone(),
               source_key: r.source_key.clone() }
    }
}

/// Paso tal como lo consume el runtime de ejecución.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledStep {
    pub step_no: i32,
    pub operation_id: String,
    pub station_type: StationType,
    pub station_group_id: Option<String>,
    pub allowed_station_ids: Vec<String>,
    #[serde(rename = "requiresFAI")]
    pub requires_fai: bool,
    pub requires_authorization: bool,
    pub data_spec_ids: Vec<String>,
    pub ingest_mapping: Option<IngestMapping>,
}

/// Núcleo firmado del snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotCore {
    pub route: RouteIdentity,
    pub steps: Vec<CompiledStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteVersionStamp {
    pub version_no: i32,
    pub compiled_at: DateTime<Utc>,
}

/// Snapshot completo persistido en `snapshot_json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSnapshot {
    pub route: RouteIdentity,
    pub steps: Vec<CompiledStep>,
    pub route_version: RouteVersionStamp,
}

impl SnapshotCore {
    /// Ordena los pasos por `step_no` ascendente.
    pub fn new(route: RouteIdentity, mut steps: Vec<CompiledStep>) -> Self {
        steps.sort_by_key(|s| s.step_no);
        Self { route, steps }
    }

    pub fn signature(&self) -> Result<String, serde_json::Error> {
        Ok(hash_value(&serde_json::to_value(self)?))
    }

    /// Sella el núcleo con los metadatos de versión.
    pub fn into_snapshot(self, version_no: i32, compiled_at: DateTime<Utc>) -> RouteSnapshot {
        RouteSnapshot { route: self.route,
                        steps: self.steps,
                        route_version: RouteVersionStamp { version_no, compiled_at } }
    }
}

/// Firma recalculada desde un `snapshot_json` almacenado. `None` si le falta
/// `route` o `steps`: esa versión nunca se reutiliza.
pub fn stored_signature(snapshot_json: &Value) -> Option<String> {
    let route = snapshot_json.get("route").filter(|v| !v.is_null())?;
    let steps = snapshot_json.get("steps").filter(|v| !v.is_null())?;
    Some(hash_value(&json!({ "route": route, "steps": steps })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn step(no: i32) -> CompiledStep {
        CompiledStep { step_no: no,
                       operation_id: format!("op-{no}"),
                       station_type: StationType::Manual,
                       station_group_id: Some("G1".into()),
                       allowed_station_ids: vec![],
                       requires_fai: false,
                       requires_authorization: false,
                       data_spec_ids: vec![],
                       ingest_mapping: None }
    }

    fn identity() -> RouteIdentity {
        RouteIdentity { code: "R1".into(),
                        source_system: "MES".into(),
                        source_key: None }
    }

    #[test]
    fn snapshot_matches_runtime_contract() {
        let core = SnapshotCore::new(identity(), vec![step(1)]);
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        let v = serde_json::to_value(core.into_snapshot(3, at)).unwrap();
        assert_eq!(v["route"], json!({"code": "R1", "sourceSystem": "MES", "sourceKey": null}));
        assert_eq!(v["steps"][0],
                   json!({
                       "stepNo": 1, "operationId": "op-1", "stationType": "MANUAL",
                       "stationGroupId": "G1", "allowedStationIds": [], "requiresFAI": false,
                       "requiresAuthorization": false, "dataSpecIds": [], "ingestMapping": null
                   }));
        assert_eq!(v["routeVersion"]["versionNo"], json!(3));
        assert!(v["routeVersion"]["compiledAt"].is_string());
    }

    #[test]
    fn stored_signature_ignores_version_metadata() {
        let core = SnapshotCore::new(identity(), vec![step(2), step(1)]);
        let sig = core.signature().unwrap();
        let a = serde_json::to_value(core.clone().into_snapshot(1, Utc::now())).unwrap();
        let b = serde_json::to_value(core.into_snapshot(7, Utc::now())).unwrap();
        assert_eq!(stored_signature(&a), Some(sig.clone()));
        assert_eq!(stored_signature(&b), Some(sig));
    }

    #[test]
    fn signature_is_independent_of_key_construction_order() {
        let core = SnapshotCore::new(identity(), vec![step(1)]);
        let reordered = json!({
            "steps": [{
                "ingestMapping": null, "dataSpecIds": [], "requiresAuthorization": false,
                "requiresFAI": false, "allowedStationIds": [], "stationGroupId": "G1",
                "stationType": "MANUAL", "operationId": "op-1", "stepNo": 1
            }],
            "route": {"sourceKey": null, "sourceSystem": "MES", "code": "R1"}
        });
        assert_eq!(stored_signature(&reordered), Some(core.signature().unwrap()));
    }

    #[test]
    fn stored_snapshot_without_core_has_no_signature() {
        assert_eq!(stored_signature(&json!({"steps": []})), None);
        assert_eq!(stored_signature(&json!({"route": {"code": "R1"}, "steps": null})), None);
    }
}
