//! Backend en memoria: tests, prototipos y referencia de paridad para el
//! backend Postgres.
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use log::debug;
use uuid::Uuid;

use super::types::{sort_most_recent_first, ConfigFilter, ExecutionConfigStore, RoutingSource, VersionStore};
use crate::errors::StoreError;
use crate::model::{DataCollectionSpec, ExecutableRouteVersion, ExecutionConfigPatch, NewExecutionConfig,
                   NewRouteVersion, RouteExecutionConfig, Routing, RoutingStep, StationGroup};

// Un panic en otro hilo no invalida los datos: son vectores append-only.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

#[derive(Default)]
pub struct InMemoryRouteStore {
    routings: RwLock<Vec<Routing>>,
    steps: RwLock<Vec<RoutingStep>>,
    station_groups: RwLock<Vec<StationGroup>>,
    data_specs: RwLock<Vec<DataCollectionSpec>>,
    configs: RwLock<Vec<RouteExecutionConfig>>,
    versions: RwLock<Vec<ExecutableRouteVersion>>,
    last_stamp: Mutex<Option<DateTime<Utc>>>,
}

impl InMemoryRouteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_routing(&self, routing: Routing) {
        write(&self.routings).push(routing);
    }

    pub fn add_step(&self, step: RoutingStep) {
        write(&self.steps).push(step);
    }

    /// Reemplaza los pasos de la ruta, como haría una re-sincronización del ERP.
    pub fn replace_steps(&self, routing_id: &str, steps: Vec<RoutingStep>) {
        let mut guard = write(&self.steps);
        guard.retain(|s| s.routing_id != routing_id);
        guard.extend(steps);
    }

    pub fn add_station_group(&self, group: StationGroup) {
        write(&self.station_groups).push(group);
    }

    pub fn add_data_spec(&self, spec: DataCollectionSpec) {
        write(&self.data_specs).push(spec);
    }

    /// Inserta una fila tal cual (filas heredadas o importadas).
    pub fn add_raw_config(&self, config: RouteExecutionConfig) {
        write(&self.configs).push(config);
    }

    /// Marca de tiempo estrictamente creciente dentro del store.
    fn next_stamp(&self) -> DateTime<Utc> {
        let mut last = self.last_stamp.lock().unwrap_or_else(|e| e.into_inner());
        let now = Utc::now();
        let stamp = match *last {
            Some(prev) if now <= prev => prev + Duration::microseconds(1),
            _ => now,
        };
        *last = Some(stamp);
        stamp
    }
}

impl RoutingSource for InMemoryRouteStore {
    fn find_routing_by_code(&self, code: &str) -> Result<Option<Routing>, StoreError> {
        Ok(read(&self.routings).iter().find(|r| r.code == code).cloned())
    }

    fn list_steps(&self, routing_id: &str) -> Result<Vec<RoutingStep>, StoreError> {
        Ok(read(&self.steps).iter().filter(|s| s.routing_id == routing_id).cloned().collect())
    }

    fn find_station_group_by_code(&self, code: &str) -> Result<Option<StationGroup>, StoreError> {
        Ok(read(&self.station_groups).iter().find(|g| g.code == code).cloned())
    }

    fn find_data_specs(&self, ids: &[String]) -> Result<Vec<DataCollectionSpec>, StoreError> {
        Ok(read(&self.data_specs).iter().filter(|s| ids.contains(&s.id)).cloned().collect())
    }
}

impl ExecutionConfigStore for InMemoryRouteStore {
    fn list_configs(&self, filter: &ConfigFilter) -> Result<Vec<RouteExecutionConfig>, StoreError> {
        let mut items: Vec<RouteExecutionConfig> = read(&self.configs).iter().filter(|c| filter.matches(c)).cloned().collect();
        sort_most_recent_first(&mut items);
        Ok(items)
    }

    fn find_config(&self, id: &str) -> Result<Option<RouteExecutionConfig>, StoreError> {
        Ok(read(&self.configs).iter().find(|c| c.id == id).cloned())
    }

    fn insert_config(&self, new: NewExecutionConfig) -> Result<RouteExecutionConfig, StoreError> {
        let now = self.next_stamp();
        let row = RouteExecutionConfig { id: Uuid::new_v4().to_string(),
                                         scope: new.scope,
                                         routing_id: new.routing_id,
                                         routing_step_id: new.routing_step_id,
                                         source_step_key: new.source_step_key,
                                         operation_id: None,
                                         station_type: new.station_type,
                                         station_group_id: new.station_group_id,
                                         allowed_station_ids: new.allowed_station_ids,
                                         requires_fai: new.requires_fai,
                                         requires_authorization: new.requires_authorization,
                                         data_spec_ids: new.data_spec_ids,
                                         ingest_mapping: new.ingest_mapping,
                                         meta: new.meta,
                                         created_at: now,
                                         updated_at: now };
        debug!("insert_config id={} scope={}", row.id, row.scope);
        write(&self.configs).push(row.clone());
        Ok(row)
    }

    fn update_config(&self, id: &str, patch: &ExecutionConfigPatch) -> Result<Option<RouteExecutionConfig>, StoreError> {
        let stamp = self.next_stamp();
        let mut guard = write(&self.configs);
        let Some(row) = guard.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        patch.apply(row);
        row.updated_at = stamp;
        debug!("update_config id={id}");
        Ok(Some(row.clone()))
    }
}

impl VersionStore for InMemoryRouteStore {
    fn latest_version(&self, routing_id: &str) -> Result<Option<ExecutableRouteVersion>, StoreError> {
        Ok(read(&self.versions).iter()
                               .filter(|v| v.routing_id == routing_id)
                               .max_by_key(|v| v.version_no)
                               .cloned())
    }

    fn list_versions(&self, routing_id: &str) -> Result<Vec<ExecutableRouteVersion>, StoreError> {
        let mut items: Vec<ExecutableRouteVersion> =
            read(&self.versions).iter().filter(|v| v.routing_id == routing_id).cloned().collect();
        items.sort_by(|a, b| b.version_no.cmp(&a.version_no));
        Ok(items)
    }

    fn find_version(&self, routing_id: &str, version_no: i32) -> Result<Option<ExecutableRouteVersion>, StoreError> {
        Ok(read(&self.versions).iter()
                               .find(|v| v.routing_id == routing_id && v.version_no == version_no)
                               .cloned())
    }

    fn insert_version(&self, new: NewRouteVersion, expected_prior: Option<i32>) -> Result<ExecutableRouteVersion, StoreError> {
        // Lectura y escritura bajo el mismo lock de escritura.
        let mut guard = write(&self.versions);
        let latest = guard.iter().filter(|v| v.routing_id == new.routing_id).map(|v| v.version_no).max();
        let taken = guard.iter().any(|v| v.routing_id == new.routing_id && v.version_no == new.version_no);
        if latest != expected_prior || taken {
            debug!("insert_version:conflict routing_id={} version_no={} latest={latest:?}",
                   new.routing_id, new.version_no);
            return Err(StoreError::VersionConflict { routing_id: new.routing_id,
                                                     version_no: new.version_no });
        }
        let row = ExecutableRouteVersion { id: Uuid::new_v4().to_string(),
                                           routing_id: new.routing_id,
                                           version_no: new.version_no,
                                           status: new.status,
                                           snapshot_json: new.snapshot_json,
                                           errors_json: new.errors_json,
                                           compiled_at: new.compiled_at };
        guard.push(row.clone());
        Ok(row)
    }
}
