//! Contratos de almacenamiento del compilador.
//!
//! Tres costuras separadas, como en el flujo de datos del compilador:
//! - `RoutingSource`: datos de diseño externos, sólo lectura.
//! - `ExecutionConfigStore`: tabla de overrides, append-only salvo updates
//!   parciales explícitos.
//! - `VersionStore`: versiones inmutables con inserción comparar-e-insertar.
//!
//! Todos los métodos toman `&self`: un mismo backend se comparte entre el
//! compilador, el CRUD y varios hilos.
use crate::errors::StoreError;
use crate::model::{DataCollectionSpec, ExecutableRouteVersion, ExecutionConfigPatch, NewExecutionConfig,
                   NewRouteVersion, RouteExecutionConfig, Routing, RoutingStep, StationGroup};

pub trait RoutingSource {
    fn find_routing_by_code(&self, code: &str) -> Result<Option<Routing>, StoreError>;
    /// Pasos de la ruta, sin orden garantizado.
    fn list_steps(&self, routing_id: &str) -> Result<Vec<RoutingStep>, StoreError>;
    fn find_station_group_by_code(&self, code: &str) -> Result<Option<StationGroup>, StoreError>;
    /// Specs existentes entre `ids`; los desconocidos simplemente no aparecen.
    fn find_data_specs(&self, ids: &[String]) -> Result<Vec<DataCollectionSpec>, StoreError>;
}

pub trait ExecutionConfigStore {
    /// Overrides que coinciden con el filtro, más recientes primero.
    fn list_configs(&self, filter: &ConfigFilter) -> Result<Vec<RouteExecutionConfig>, StoreError>;
    fn find_config(&self, id: &str) -> Result<Option<RouteExecutionConfig>, StoreError>;
    /// Inserta una fila nueva con `id`, `created_at` y `updated_at` asignados.
    fn insert_config(&self, new: NewExecutionConfig) -> Result<RouteExecutionConfig, StoreError>;
    /// Escribe sólo los campos presentes en `patch` y refresca `updated_at`.
    /// `None` si el id no existe.
    fn update_config(&self, id: &str, patch: &ExecutionConfigPatch) -> Result<Option<RouteExecutionConfig>, StoreError>;
}

pub trait VersionStore {
    /// Versión con mayor `version_no` de la ruta.
    fn latest_version(&self, routing_id: &str) -> Result<Option<ExecutableRouteVersion>, StoreError>;
    /// Todas las versiones, `version_no` descendente.
    fn list_versions(&self, routing_id: &str) -> Result<Vec<ExecutableRouteVersion>, StoreError>;
    fn find_version(&self, routing_id: &str, version_no: i32) -> Result<Option<ExecutableRouteVersion>, StoreError>;
    /// Inserta sólo si la última versión almacenada sigue siendo
    /// `expected_prior`; si no, o si `(routing_id, version_no)` ya existe,
    /// devuelve `StoreError::VersionConflict`. Lectura e inserción son
    /// atómicas respecto a otras llamadas.
    fn insert_version(&self, new: NewRouteVersion, expected_prior: Option<i32>) -> Result<ExecutableRouteVersion, StoreError>;
}

/// Conjunto candidato de overrides de una ruta: por `routing_id`, por id de
/// cualquiera de sus pasos o por `source_step_key` de cualquiera de ellos.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFilter {
    pub routing_id: String,
    pub step_ids: Vec<String>,
    pub source_step_keys: Vec<String>,
}

impl ConfigFilter {
    pub fn for_routing(routing: &Routing, steps: &[RoutingStep]) -> Self {
        Self { routing_id: routing.id.clone(),
               step_ids: steps.iter().map(|s| s.id.clone()).collect(),
               source_step_keys: steps.iter().filter_map(|s| s.source_step_key.clone()).collect() }
    }

    pub fn matches(&self, config: &RouteExecutionConfig) -> bool {
        config.routing_id.as_deref() == Some(self.routing_id.as_str())
        || config.routing_step_id.as_ref().is_some_and(|id| self.step_ids.contains(id))
        || config.source_step_key.as_ref().is_some_and(|k| self.source_step_keys.contains(k))
    }
}

/// `updated_at` descendente, desempate por `id` descendente.
pub fn sort_most_recent_first(configs: &mut [RouteExecutionConfig]) {
    configs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| b.id.cmp(&a.id)));
}
