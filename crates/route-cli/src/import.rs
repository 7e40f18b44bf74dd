//! Importación de datos de diseño (lo que en producción sincroniza el ERP).
//!
//! Las rutas, grupos y specs se insertan o actualizan por id. Los pasos se
//! reemplazan completos por ruta, sólo para las rutas que traen pasos en el
//! archivo.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Deserialize;
use serde_json::{json, Value};

use route_core::{DataCollectionSpec, Routing, RoutingStep, StationGroup};
use route_persistence::pg::{ConnectionProvider, PgRouteStore};

use crate::commands::CliError;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DesignData {
    pub routings: Vec<Routing>,
    pub steps: Vec<RoutingStep>,
    pub station_groups: Vec<StationGroup>,
    pub data_specs: Vec<DataCollectionSpec>,
}

impl DesignData {
    pub fn parse(text: &str) -> Result<Self, CliError> {
        serde_json::from_str(text).map_err(|e| CliError::Input(e.to_string()))
    }

    /// Pasos agrupados por ruta; `step_no` repetido dentro de una ruta es un
    /// error de entrada.
    pub fn steps_by_routing(&self) -> Result<BTreeMap<&str, Vec<RoutingStep>>, CliError> {
        let mut grouped: BTreeMap<&str, Vec<RoutingStep>> = BTreeMap::new();
        let mut seen = BTreeSet::new();
        for step in &self.steps {
            if !seen.insert((step.routing_id.as_str(), step.step_no)) {
                return Err(CliError::Input(format!("duplicate stepNo {} in routing {}", step.step_no, step.routing_id)));
            }
            grouped.entry(step.routing_id.as_str()).or_default().push(step.clone());
        }
        Ok(grouped)
    }
}

pub fn run<P: ConnectionProvider>(store: &PgRouteStore<P>, path: &Path) -> Result<Value, CliError> {
    let text = std::fs::read_to_string(path).map_err(|e| CliError::Input(format!("{}: {e}", path.display())))?;
    let data = DesignData::parse(&text)?;
    let steps = data.steps_by_routing()?;

    for routing in &data.routings {
        store.upsert_routing(routing)?;
    }
    for group in &data.station_groups {
        store.upsert_station_group(group)?;
    }
    for spec in &data.data_specs {
        store.upsert_data_spec(spec)?;
    }
    for (routing_id, rows) in &steps {
        store.replace_steps(routing_id, rows)?;
    }
    tracing::info!(routings = data.routings.len(), steps = data.steps.len(), "design data imported");

    Ok(json!({
        "routings": data.routings.len(),
        "steps": data.steps.len(),
        "stationGroups": data.station_groups.len(),
        "dataSpecs": data.data_specs.len(),
    }))
}
