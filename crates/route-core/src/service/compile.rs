//! Orquestación de `compile`: carga → resolución → validación → firma →
//! decisión de versión.
//!
//! La lectura de la versión previa y la inserción de la nueva no comparten
//! transacción; la carrera se cierra con `VersionStore::insert_version`
//! (comparar-e-insertar) y reintentando el ciclo completo ante conflicto.
use std::collections::BTreeSet;

use chrono::{SubsecRound, Utc};
use log::{debug, info, warn};
use serde_json::Value;

use super::RouteExecutionService;
use crate::constants::FIRST_VERSION_NO;
use crate::errors::RouteError;
use crate::model::{ExecutableRouteVersion, NewRouteVersion, VersionStatus};
use crate::repo::{ConfigFilter, ExecutionConfigStore, RoutingSource, VersionStore};
use crate::resolver::{resolve_routing, ResolvedStep};
use crate::snapshot::{stored_signature, RouteIdentity, SnapshotCore};
use crate::validator::validate_steps;

/// Estado de la última versión respecto a la compilación en curso.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionDecision {
    NoPriorVersion,
    PriorSameSignatureReady,
    PriorSameSignatureInvalidSameErrors,
    Changed,
}

impl VersionDecision {
    pub fn reuses_prior(&self) -> bool {
        matches!(self,
                 VersionDecision::PriorSameSignatureReady | VersionDecision::PriorSameSignatureInvalidSameErrors)
    }
}

/// `errors_json` es `None` cuando la compilación no produjo errores.
pub fn decide(prior: Option<&ExecutableRouteVersion>, signature: &str, errors_json: Option<&Value>) -> VersionDecision {
    let Some(prior) = prior else {
        return VersionDecision::NoPriorVersion;
    };
    if stored_signature(&prior.snapshot_json).as_deref() != Some(signature) {
        return VersionDecision::Changed;
    }
    match (prior.status, errors_json) {
        (VersionStatus::Ready, None) => VersionDecision::PriorSameSignatureReady,
        (VersionStatus::Invalid, Some(errors)) if prior.errors_json.as_ref() == Some(errors) => {
            VersionDecision::PriorSameSignatureInvalidSameErrors
        }
        _ => VersionDecision::Changed,
    }
}

impl<S> RouteExecutionService<S>
    where S: RoutingSource + ExecutionConfigStore + VersionStore
{
    /// Compila la ruta a una versión ejecutable.
    ///
    /// Idempotente: sin cambios en la entrada devuelve la versión previa.
    /// `Ok` significa que existe un artefacto, no que sea usable; revisar
    /// `status`.
    pub fn compile(&self, routing_code: &str) -> Result<ExecutableRouteVersion, RouteError> {
        debug!("compile:start routing={routing_code}");
        for attempt in 1..=self.max_compile_attempts {
            match self.compile_once(routing_code) {
                Err(e) if e.is_version_conflict() => {
                    warn!("compile:conflict routing={routing_code} attempt={attempt}/{}: {e}",
                          self.max_compile_attempts);
                }
                other => return other,
            }
        }
        Err(RouteError::CompileContention { routing_code: routing_code.to_string(),
                                            attempts: self.max_compile_attempts })
    }

    fn compile_once(&self, routing_code: &str) -> Result<ExecutableRouteVersion, RouteError> {
        let routing = self.load_routing(routing_code)?;
        let steps = self.store.list_steps(&routing.id)?;
        if steps.is_empty() {
            return Err(RouteError::RoutingEmpty(routing.code));
        }

        let configs = self.store.list_configs(&ConfigFilter::for_routing(&routing, &steps))?;
        let resolved = resolve_routing(&routing, &steps, &configs);

        let spec_ids: Vec<String> = resolved.iter()
                                            .flat_map(|s| s.data_spec_ids.iter().cloned())
                                            .collect::<BTreeSet<_>>()
                                            .into_iter()
                                            .collect();
        let specs = if spec_ids.is_empty() { Vec::new() } else { self.store.find_data_specs(&spec_ids)? };
        let errors = validate_steps(&resolved, &specs);

        let core = SnapshotCore::new(RouteIdentity::from(&routing), resolved.iter().map(ResolvedStep::compile).collect());
        let signature = core.signature()?;
        let errors_json = if errors.is_empty() { None } else { Some(serde_json::to_value(&errors)?) };

        let prior = self.store.latest_version(&routing.id)?;
        let decision = decide(prior.as_ref(), &signature, errors_json.as_ref());
        debug!("compile:decision routing={} signature={signature} decision={decision:?}", routing.code);
        if let (true, Some(prior)) = (decision.reuses_prior(), prior.as_ref()) {
            info!("compile:reused routing={} version_no={} status={}",
                  routing.code, prior.version_no, prior.status);
            return Ok(prior.clone());
        }

        let prior_no = prior.as_ref().map(|p| p.version_no);
        let version_no = prior_no.map_or(FIRST_VERSION_NO, |n| n + 1);
        let status = if errors.is_empty() { VersionStatus::Ready } else { VersionStatus::Invalid };
        // Precisión de Postgres (µs): el snapshot y la fila guardan el mismo instante.
        let compiled_at = Utc::now().trunc_subsecs(6);
        let snapshot_json = serde_json::to_value(core.into_snapshot(version_no, compiled_at))?;

        let created = self.store.insert_version(NewRouteVersion { routing_id: routing.id.clone(),
                                                                  version_no,
                                                                  status,
                                                                  snapshot_json,
                                                                  errors_json,
                                                                  compiled_at },
                                                prior_no)?;
        info!("compile:created routing={} version_no={} status={} errors={}",
              routing.code, created.version_no, created.status, errors.len());
        Ok(created)
    }

    /// Versiones de la ruta, más recientes primero.
    pub fn list_route_versions(&self, routing_code: &str) -> Result<Vec<ExecutableRouteVersion>, RouteError> {
        let routing = self.load_routing(routing_code)?;
        Ok(self.store.list_versions(&routing.id)?)
    }

    pub fn get_route_version(&self, routing_code: &str, version_no: i32) -> Result<ExecutableRouteVersion, RouteError> {
        let routing = self.load_routing(routing_code)?;
        self.store
            .find_version(&routing.id, version_no)?
            .ok_or_else(|| RouteError::RouteVersionNotFound { routing_code: routing.code.clone(),
                                                              version_no })
    }
}
