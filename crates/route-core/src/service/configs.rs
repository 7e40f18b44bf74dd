//! CRUD de overrides de ejecución con verificación de alcance.
//!
//! Las altas siempre insertan una fila nueva (historial). Las modificaciones
//! re-derivan la pertenencia a la ruta contra sus pasos actuales en cada
//! llamada: una fila creada para otra ruta, o cuyo paso ya no existe, se
//! rechaza con `EXECUTION_CONFIG_SCOPE_MISMATCH`.
use log::info;

use super::RouteExecutionService;
use crate::errors::RouteError;
use crate::model::{ConfigScope, ExecutionConfigCreate, ExecutionConfigPatch, ExecutionConfigUpdate, NewExecutionConfig,
                   RouteExecutionConfig, Routing, RoutingStep};
use crate::repo::{sort_most_recent_first, ConfigFilter, ExecutionConfigStore, RoutingSource, VersionStore};

/// Pertenencia de un override a la ruta: por `routing_id`, por id de paso,
/// por operación de algún paso o por `source_step_key` de algún paso.
pub fn belongs_to_routing(config: &RouteExecutionConfig, routing: &Routing, steps: &[RoutingStep]) -> bool {
    config.routing_id.as_deref() == Some(routing.id.as_str())
    || config.routing_step_id.as_ref().is_some_and(|id| steps.iter().any(|s| &s.id == id))
    || config.operation_id.as_ref().is_some_and(|op| steps.iter().any(|s| &s.operation_id == op))
    || config.source_step_key
             .as_ref()
             .is_some_and(|key| steps.iter().any(|s| s.source_step_key.as_ref() == Some(key)))
}

impl<S> RouteExecutionService<S>
    where S: RoutingSource + ExecutionConfigStore + VersionStore
{
    /// Mismo conjunto candidato que usa el resolvedor, más recientes primero.
    pub fn list_execution_configs(&self, routing_code: &str) -> Result<Vec<RouteExecutionConfig>, RouteError> {
        let routing = self.load_routing(routing_code)?;
        let steps = self.store.list_steps(&routing.id)?;
        let mut items = self.store.list_configs(&ConfigFilter::for_routing(&routing, &steps))?;
        sort_most_recent_first(&mut items);
        Ok(items)
    }

    pub fn create_execution_config(&self,
                                   routing_code: &str,
                                   input: ExecutionConfigCreate)
                                   -> Result<RouteExecutionConfig, RouteError> {
        let scope: ConfigScope = input.scope_type
                                      .parse()
                                      .map_err(|_| RouteError::ScopeTypeInvalid(input.scope_type.clone()))?;
        let step_no = match scope {
            ConfigScope::Step => Some(input.step_no.ok_or(RouteError::StepNoRequired)?),
            ConfigScope::Route => None,
            ConfigScope::Operation | ConfigScope::SourceStep => return Err(RouteError::ScopeTypeInvalid(input.scope_type)),
        };

        let routing = self.load_routing(routing_code)?;
        let (routing_id, routing_step_id, source_step_key) = match step_no {
            None => (Some(routing.id.clone()), None, None),
            Some(step_no) => {
                let step = self.store
                               .list_steps(&routing.id)?
                               .into_iter()
                               .find(|s| s.step_no == step_no)
                               .ok_or_else(|| RouteError::RouteStepNotFound { routing_code: routing.code.clone(),
                                                                              step_no })?;
                (None, Some(step.id), step.source_step_key)
            }
        };

        let station_group_id = self.resolve_station_group(input.station_group_code)?.flatten();

        let created = self.store.insert_config(NewExecutionConfig { scope,
                                                                    routing_id,
                                                                    routing_step_id,
                                                                    source_step_key,
                                                                    station_type: input.station_type,
                                                                    station_group_id,
                                                                    allowed_station_ids: input.allowed_station_ids,
                                                                    requires_fai: input.requires_fai,
                                                                    requires_authorization: input.requires_authorization,
                                                                    data_spec_ids: input.data_spec_ids,
                                                                    ingest_mapping: input.ingest_mapping,
                                                                    meta: input.meta })?;
        info!("execution_config:created routing={} id={} scope={}", routing.code, created.id, created.scope);
        Ok(created)
    }

    /// Modificación parcial: los campos omitidos no se tocan.
    pub fn update_execution_config(&self,
                                   routing_code: &str,
                                   config_id: &str,
                                   input: ExecutionConfigUpdate)
                                   -> Result<RouteExecutionConfig, RouteError> {
        let routing = self.load_routing(routing_code)?;
        let steps = self.store.list_steps(&routing.id)?;
        let config = self.store
                         .find_config(config_id)?
                         .ok_or_else(|| RouteError::ExecutionConfigNotFound(config_id.to_string()))?;
        if !belongs_to_routing(&config, &routing, &steps) {
            return Err(RouteError::ExecutionConfigScopeMismatch { routing_code: routing.code,
                                                                  config_id: config_id.to_string() });
        }

        let patch = ExecutionConfigPatch { station_type: input.station_type,
                                           station_group_id: self.resolve_station_group(input.station_group_code)?,
                                           allowed_station_ids: input.allowed_station_ids,
                                           requires_fai: input.requires_fai,
                                           requires_authorization: input.requires_authorization,
                                           data_spec_ids: input.data_spec_ids,
                                           ingest_mapping: input.ingest_mapping,
                                           meta: input.meta };
        let updated = self.store
                          .update_config(config_id, &patch)?
                          .ok_or_else(|| RouteError::ExecutionConfigNotFound(config_id.to_string()))?;
        info!("execution_config:updated routing={} id={}", routing.code, updated.id);
        Ok(updated)
    }

    /// Código de grupo → id, conservando la distinción ausente / `null`.
    fn resolve_station_group(&self, code: Option<Option<String>>) -> Result<Option<Option<String>>, RouteError> {
        match code {
            None => Ok(None),
            Some(None) => Ok(Some(None)),
            Some(Some(code)) => {
                let group = self.store
                                .find_station_group_by_code(&code)?
                                .ok_or(RouteError::StationGroupNotFound(code))?;
                Ok(Some(Some(group.id)))
            }
        }
    }
}
