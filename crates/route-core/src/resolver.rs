//! Resolución de overrides por paso.
//!
//! Precedencia por campo, independiente para cada campo:
//! override STEP más reciente → override ROUTE más reciente → default del
//! paso → vacío. "Más reciente" es un orden total (`updated_at`, luego `id`),
//! nunca el orden en que la base devolvió las filas.
//!
//! Funciones puras: sin I/O, testeables sin store.
use crate::model::{ConfigScope, IngestMapping, RouteExecutionConfig, Routing, RoutingStep, StationType};
use crate::snapshot::CompiledStep;

/// Paso con todos sus campos resueltos.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStep {
    pub step_no: i32,
    pub operation_id: String,
    pub station_type: Option<StationType>,
    pub station_group_id: Option<String>,
    pub allowed_station_ids: Vec<String>,
    pub requires_fai: bool,
    pub requires_authorization: bool,
    pub data_spec_ids: Vec<String>,
    pub ingest_mapping: Option<IngestMapping>,
}

impl ResolvedStep {
    /// Forma persistida en el snapshot. Un tipo de estación ausente se
    /// registra como MANUAL; la versión queda INVALID por
    /// `STATION_TYPE_MISSING` de todos modos.
    pub fn compile(&self) -> CompiledStep {
        CompiledStep { step_no: self.step_no,
                       operation_id: self.operation_id.clone(),
                       station_type: self.station_type.unwrap_or(StationType::Manual),
                       station_group_id: self.station_group_id.clone(),
                       allowed_station_ids: self.allowed_station_ids.clone(),
                       requires_fai: self.requires_fai,
                       requires_authorization: self.requires_authorization,
                       data_spec_ids: self.data_spec_ids.clone(),
                       ingest_mapping: self.ingest_mapping.clone() }
    }
}

/// El override autoritativo de un conjunto: mayor `updated_at`, y ante
/// empate mayor `id`.
pub fn pick_latest<'a, I>(items: I) -> Option<&'a RouteExecutionConfig>
    where I: IntoIterator<Item = &'a RouteExecutionConfig>
{
    items.into_iter().reduce(|best, candidate| {
                         let newer = candidate.updated_at
                                              .cmp(&best.updated_at)
                                              .then_with(|| candidate.id.cmp(&best.id));
                         if newer.is_gt() { candidate } else { best }
                     })
}

/// Overrides de alcance ROUTE de la ruta.
pub fn route_overrides<'a>(routing: &Routing, configs: &'a [RouteExecutionConfig]) -> Vec<&'a RouteExecutionConfig> {
    configs.iter()
           .filter(|c| c.scope == ConfigScope::Route && c.routing_id.as_deref() == Some(routing.id.as_str()))
           .collect()
}

/// Overrides de alcance STEP que apuntan al paso por id o por `source_step_key`.
pub fn step_overrides<'a>(step: &RoutingStep, configs: &'a [RouteExecutionConfig]) -> Vec<&'a RouteExecutionConfig> {
    configs.iter()
           .filter(|c| c.scope == ConfigScope::Step)
           .filter(|c| {
               let by_id = c.routing_step_id.as_deref() == Some(step.id.as_str());
               let by_key = match (&c.source_step_key, &step.source_step_key) {
                   (Some(a), Some(b)) => a == b,
                   _ => false,
               };
               by_id || by_key
           })
           .collect()
}

/// Resuelve un paso contra sus candidatos STEP y los candidatos ROUTE.
pub fn resolve_step(step: &RoutingStep,
                    step_configs: &[&RouteExecutionConfig],
                    route_configs: &[&RouteExecutionConfig])
                    -> ResolvedStep {
    let s = pick_latest(step_configs.iter().copied());
    let r = pick_latest(route_configs.iter().copied());

    // Primer valor definido en el orden STEP → ROUTE.
    fn first<T: Clone>(s: Option<&RouteExecutionConfig>,
                       r: Option<&RouteExecutionConfig>,
                       field: impl Fn(&RouteExecutionConfig) -> Option<T>)
                       -> Option<T> {
        s.and_then(&field).or_else(|| r.and_then(&field))
    }

    ResolvedStep { step_no: step.step_no,
                   operation_id: step.operation_id.clone(),
                   station_type: first(s, r, |c| c.station_type).or(step.station_type),
                   station_group_id: first(s, r, |c| c.station_group_id.clone()).or_else(|| step.station_group_id.clone()),
                   allowed_station_ids: first(s, r, |c| c.allowed_station_ids.clone()).unwrap_or_default(),
                   requires_fai: first(s, r, |c| c.requires_fai).unwrap_or(step.requires_fai),
                   requires_authorization: first(s, r, |c| c.requires_authorization).unwrap_or(false),
                   data_spec_ids: first(s, r, |c| c.data_spec_ids.clone()).unwrap_or_default(),
                   ingest_mapping: first(s, r, |c| c.ingest_mapping.clone()) }
}

/// Resuelve todos los pasos de la ruta en orden ascendente de `step_no`.
pub fn resolve_routing(routing: &Routing, steps: &[RoutingStep], configs: &[RouteExecutionConfig]) -> Vec<ResolvedStep> {
    let route_configs = route_overrides(routing, configs);
    let mut ordered: Vec<&RoutingStep> = steps.iter().collect();
    ordered.sort_by_key(|s| s.step_no);
    ordered.into_iter()
           .map(|step| resolve_step(step, &step_overrides(step, configs), &route_configs))
           .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn routing() -> Routing {
        Routing { id: "rt-1".into(),
                  code: "R1".into(),
                  name: "Main line".into(),
                  source_system: "MES".into(),
                  source_key: None }
    }

    fn step(no: i32, key: Option<&str>) -> RoutingStep {
        RoutingStep { id: format!("st-{no}"),
                      routing_id: "rt-1".into(),
                      step_no: no,
                      operation_id: format!("op-{no}"),
                      source_step_key: key.map(str::to_string),
                      station_type: Some(StationType::Manual),
                      station_group_id: Some("G1".into()),
                      requires_fai: false }
    }

    fn config(id: &str, scope: ConfigScope, updated: i64) -> RouteExecutionConfig {
        RouteExecutionConfig { id: id.into(),
                               scope,
                               routing_id: None,
                               routing_step_id: None,
                               source_step_key: None,
                               operation_id: None,
                               station_type: None,
                               station_group_id: None,
                               allowed_station_ids: None,
                               requires_fai: None,
                               requires_authorization: None,
                               data_spec_ids: None,
                               ingest_mapping: None,
                               meta: None,
                               created_at: at(0),
                               updated_at: at(updated) }
    }

    #[test]
    fn defaults_flow_through_without_overrides() {
        let resolved = resolve_step(&step(1, None), &[], &[]);
        assert_eq!(resolved.station_type, Some(StationType::Manual));
        assert_eq!(resolved.station_group_id.as_deref(), Some("G1"));
        assert!(resolved.allowed_station_ids.is_empty());
        assert!(resolved.data_spec_ids.is_empty());
        assert!(!resolved.requires_authorization);
        assert_eq!(resolved.ingest_mapping, None);
    }

    #[test]
    fn latest_uses_updated_at_then_id() {
        let a = config("a", ConfigScope::Step, 10);
        let b = config("b", ConfigScope::Step, 20);
        let c = config("c", ConfigScope::Step, 20);
        assert_eq!(pick_latest([&a, &b]).map(|c| c.id.as_str()), Some("b"));
        assert_eq!(pick_latest([&c, &b, &a]).map(|c| c.id.as_str()), Some("c"));
        assert_eq!(pick_latest([&b, &c]).map(|c| c.id.as_str()), Some("c"));
        assert!(pick_latest(std::iter::empty()).is_none());
    }

    #[test]
    fn fields_resolve_independently() {
        let mut s = config("s", ConfigScope::Step, 1);
        s.station_type = Some(StationType::Auto);
        let mut r = config("r", ConfigScope::Route, 50);
        r.station_type = Some(StationType::Batch);
        r.data_spec_ids = Some(vec!["spec-1".into()]);
        r.requires_authorization = Some(true);

        let resolved = resolve_step(&step(1, None), &[&s], &[&r]);
        // STEP gana aunque el ROUTE sea más reciente.
        assert_eq!(resolved.station_type, Some(StationType::Auto));
        assert_eq!(resolved.data_spec_ids, vec!["spec-1".to_string()]);
        assert!(resolved.requires_authorization);
        assert_eq!(resolved.station_group_id.as_deref(), Some("G1"));
    }

    #[test]
    fn older_step_override_is_shadowed_even_if_it_sets_the_field() {
        let mut old = config("old", ConfigScope::Step, 1);
        old.requires_fai = Some(true);
        let newer = config("new", ConfigScope::Step, 2);
        let resolved = resolve_step(&step(1, None), &[&old, &newer], &[]);
        // El más reciente no define el campo: se cae al default del paso, no al override viejo.
        assert!(!resolved.requires_fai);
    }

    #[test]
    fn step_overrides_match_by_id_or_source_key() {
        let mut by_id = config("x", ConfigScope::Step, 1);
        by_id.routing_step_id = Some("st-1".into());
        let mut by_key = config("y", ConfigScope::Step, 2);
        by_key.source_step_key = Some("K-1".into());
        let mut other = config("z", ConfigScope::Step, 3);
        other.source_step_key = Some("K-2".into());
        let mut route = config("w", ConfigScope::Route, 4);
        route.routing_step_id = Some("st-1".into());
        let configs = vec![by_id, by_key, other, route];

        let ids: Vec<&str> = step_overrides(&step(1, Some("K-1")), &configs).iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y"]);
        let ids: Vec<&str> = step_overrides(&step(1, None), &configs).iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["x"]);
    }

    #[test]
    fn routing_resolution_orders_by_step_no() {
        let mut route = config("r", ConfigScope::Route, 1);
        route.routing_id = Some("rt-1".into());
        route.ingest_mapping = IngestMapping::from_value(json!({"eventType": "AUTO"}));
        let mut foreign = config("f", ConfigScope::Route, 2);
        foreign.routing_id = Some("rt-2".into());
        foreign.requires_authorization = Some(true);

        let steps = vec![step(20, None), step(10, None)];
        let resolved = resolve_routing(&routing(), &steps, &[route, foreign]);
        assert_eq!(resolved.iter().map(|s| s.step_no).collect::<Vec<_>>(), vec![10, 20]);
        assert!(resolved.iter().all(|s| s.ingest_mapping.is_some()));
        assert!(resolved.iter().all(|s| !s.requires_authorization));
    }
}
