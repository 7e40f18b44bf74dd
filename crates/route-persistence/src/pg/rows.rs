//! Filas Diesel y su conversión al modelo del core.
//!
//! Texto libre en columnas enumeradas (`station_type`) se lee con tolerancia:
//! un valor desconocido cuenta como ausente y el validador lo reporta. Un
//! `scope_type` o `status` desconocido es una fila corrupta.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::warn;
use serde_json::Value;

use route_core::model::{ConfigScope, DataCollectionSpec, ExecutableRouteVersion, IngestMapping, NewRouteVersion,
                        RouteExecutionConfig, Routing, RoutingStep, StationGroup, StationType, VersionStatus};

use crate::error::PersistenceError;
use crate::schema::{data_collection_specs, executable_route_versions, route_execution_configs, routing_steps, routings,
                    station_groups};

fn station_type(raw: Option<String>, row_id: &str) -> Option<StationType> {
    raw.and_then(|s| match s.parse() {
           Ok(t) => Some(t),
           Err(e) => {
               warn!("row {row_id}: {e}, treated as unset");
               None
           }
       })
}

#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = routings, treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RoutingRow {
    pub id: String,
    pub code: String,
    pub name: String,
    pub source_system: String,
    pub source_key: Option<String>,
}

impl From<RoutingRow> for Routing {
    fn from(r: RoutingRow) -> Self {
        Routing { id: r.id,
                  code: r.code,
                  name: r.name,
                  source_system: r.source_system,
                  source_key: r.source_key }
    }
}

impl From<&Routing> for RoutingRow {
    fn from(r: &Routing) -> Self {
        RoutingRow { id: r.id.clone(),
                     code: r.code.clone(),
                     name: r.name.clone(),
                     source_system: r.source_system.clone(),
                     source_key: r.source_key.clone() }
    }
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = routing_steps)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RoutingStepRow {
    pub id: String,
    pub routing_id: String,
    pub step_no: i32,
    pub operation_id: String,
    pub source_step_key: Option<String>,
    pub station_type: Option<String>,
    pub station_group_id: Option<String>,
    pub requires_fai: bool,
}

impl From<RoutingStepRow> for RoutingStep {
    fn from(r: RoutingStepRow) -> Self {
        let station_type = station_type(r.station_type, &r.id);
        RoutingStep { id: r.id,
                      routing_id: r.routing_id,
                      step_no: r.step_no,
                      operation_id: r.operation_id,
                      source_step_key: r.source_step_key,
                      station_type,
                      station_group_id: r.station_group_id,
                      requires_fai: r.requires_fai }
    }
}

impl From<&RoutingStep> for RoutingStepRow {
    fn from(s: &RoutingStep) -> Self {
        RoutingStepRow { id: s.id.clone(),
                         routing_id: s.routing_id.clone(),
                         step_no: s.step_no,
                         operation_id: s.operation_id.clone(),
                         source_step_key: s.source_step_key.clone(),
                         station_type: s.station_type.map(|t| t.as_str().to_string()),
                         station_group_id: s.station_group_id.clone(),
                         requires_fai: s.requires_fai }
    }
}

#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = station_groups)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StationGroupRow {
    pub id: String,
    pub code: String,
    pub name: String,
}

impl From<StationGroupRow> for StationGroup {
    fn from(r: StationGroupRow) -> Self {
        StationGroup { id: r.id,
                       code: r.code,
                       name: r.name }
    }
}

impl From<&StationGroup> for StationGroupRow {
    fn from(g: &StationGroup) -> Self {
        StationGroupRow { id: g.id.clone(),
                          code: g.code.clone(),
                          name: g.name.clone() }
    }
}

#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = data_collection_specs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DataSpecRow {
    pub id: String,
    pub operation_id: String,
    pub name: String,
}

impl From<DataSpecRow> for DataCollectionSpec {
    fn from(r: DataSpecRow) -> Self {
        DataCollectionSpec { id: r.id,
                             operation_id: r.operation_id,
                             name: r.name }
    }
}

impl From<&DataCollectionSpec> for DataSpecRow {
    fn from(s: &DataCollectionSpec) -> Self {
        DataSpecRow { id: s.id.clone(),
                      operation_id: s.operation_id.clone(),
                      name: s.name.clone() }
    }
}

/// Fila completa de `route_execution_configs`. Sirve para leer, insertar y,
/// con `treat_none_as_null`, reescribir la fila entera tras aplicar un patch.
#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = route_execution_configs, treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ConfigRow {
    pub id: String,
    pub scope_type: String,
    pub routing_id: Option<String>,
    pub routing_step_id: Option<String>,
    pub source_step_key: Option<String>,
    pub operation_id: Option<String>,
    pub station_type: Option<String>,
    pub station_group_id: Option<String>,
    pub allowed_station_ids: Option<Vec<String>>,
    pub requires_fai: Option<bool>,
    pub requires_authorization: Option<bool>,
    pub data_spec_ids: Option<Vec<String>>,
    pub ingest_mapping: Option<Value>,
    pub meta: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ConfigRow> for RouteExecutionConfig {
    type Error = PersistenceError;

    fn try_from(r: ConfigRow) -> Result<Self, Self::Error> {
        let scope: ConfigScope = r.scope_type
                                  .parse()
                                  .map_err(|e| PersistenceError::CorruptRow(format!("config {}: {e}", r.id)))?;
        let station_type = station_type(r.station_type, &r.id);
        Ok(RouteExecutionConfig { id: r.id,
                                  scope,
                                  routing_id: r.routing_id,
                                  routing_step_id: r.routing_step_id,
                                  source_step_key: r.source_step_key,
                                  operation_id: r.operation_id,
                                  station_type,
                                  station_group_id: r.station_group_id,
                                  allowed_station_ids: r.allowed_station_ids,
                                  requires_fai: r.requires_fai,
                                  requires_authorization: r.requires_authorization,
                                  data_spec_ids: r.data_spec_ids,
                                  ingest_mapping: r.ingest_mapping.and_then(IngestMapping::from_value),
                                  meta: r.meta,
                                  created_at: r.created_at,
                                  updated_at: r.updated_at })
    }
}

impl From<&RouteExecutionConfig> for ConfigRow {
    fn from(c: &RouteExecutionConfig) -> Self {
        ConfigRow { id: c.id.clone(),
                    scope_type: c.scope.as_str().to_string(),
                    routing_id: c.routing_id.clone(),
                    routing_step_id: c.routing_step_id.clone(),
                    source_step_key: c.source_step_key.clone(),
                    operation_id: c.operation_id.clone(),
                    station_type: c.station_type.map(|t| t.as_str().to_string()),
                    station_group_id: c.station_group_id.clone(),
                    allowed_station_ids: c.allowed_station_ids.clone(),
                    requires_fai: c.requires_fai,
                    requires_authorization: c.requires_authorization,
                    data_spec_ids: c.data_spec_ids.clone(),
                    ingest_mapping: c.ingest_mapping.as_ref().map(IngestMapping::to_value),
                    meta: c.meta.clone(),
                    created_at: c.created_at,
                    updated_at: c.updated_at }
    }
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = executable_route_versions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct VersionRow {
    pub id: String,
    pub routing_id: String,
    pub version_no: i32,
    pub status: String,
    pub snapshot_json: Value,
    pub errors_json: Option<Value>,
    pub compiled_at: DateTime<Utc>,
}

impl VersionRow {
    pub fn new(id: String, new: NewRouteVersion) -> Self {
        VersionRow { id,
                     routing_id: new.routing_id,
                     version_no: new.version_no,
                     status: new.status.as_str().to_string(),
                     snapshot_json: new.snapshot_json,
                     errors_json: new.errors_json,
                     compiled_at: new.compiled_at }
    }
}

impl TryFrom<VersionRow> for ExecutableRouteVersion {
    type Error = PersistenceError;

    fn try_from(r: VersionRow) -> Result<Self, Self::Error> {
        let status: VersionStatus = r.status
                                     .parse()
                                     .map_err(|e| PersistenceError::CorruptRow(format!("version {}: {e}", r.id)))?;
        Ok(ExecutableRouteVersion { id: r.id,
                                    routing_id: r.routing_id,
                                    version_no: r.version_no,
                                    status,
                                    snapshot_json: r.snapshot_json,
                                    errors_json: r.errors_json,
                                    compiled_at: r.compiled_at })
    }
}
