#![allow(dead_code)]
//! Fixtures compartidas de los tests de integración del core.

use route_core::{DataCollectionSpec, ExecutionConfigCreate, ExecutionConfigUpdate, InMemoryRouteStore,
                 RouteExecutionService, Routing, RoutingStep, StationGroup, StationType};
use serde_json::Value;

pub fn routing(code: &str) -> Routing {
    Routing { id: format!("rt-{code}"),
              code: code.to_string(),
              name: format!("Routing {code}"),
              source_system: "MES".into(),
              source_key: None }
}

pub fn step(routing: &Routing, no: i32, station_type: Option<StationType>, group: Option<&str>) -> RoutingStep {
    RoutingStep { id: format!("{}-st-{no}", routing.id),
                  routing_id: routing.id.clone(),
                  step_no: no,
                  operation_id: format!("op-{no}"),
                  source_step_key: None,
                  station_type,
                  station_group_id: group.map(str::to_string),
                  requires_fai: false }
}

pub fn manual_step(routing: &Routing, no: i32) -> RoutingStep {
    step(routing, no, Some(StationType::Manual), Some("G1"))
}

/// Servicio en memoria con una ruta, sus pasos y un grupo de estación `LINE-A`.
pub fn service_with(routing: Routing, steps: Vec<RoutingStep>) -> RouteExecutionService<InMemoryRouteStore> {
    let store = InMemoryRouteStore::new();
    store.add_routing(routing);
    for s in steps {
        store.add_step(s);
    }
    store.add_station_group(StationGroup { id: "sg-line-a".into(),
                                           code: "LINE-A".into(),
                                           name: "Line A".into() });
    RouteExecutionService::new(store)
}

pub fn spec(id: &str, operation_id: &str) -> DataCollectionSpec {
    DataCollectionSpec { id: id.into(),
                         operation_id: operation_id.into(),
                         name: format!("spec {id}") }
}

pub fn create_input(v: Value) -> ExecutionConfigCreate {
    serde_json::from_value(v).expect("valid create payload")
}

pub fn update_input(v: Value) -> ExecutionConfigUpdate {
    serde_json::from_value(v).expect("valid update payload")
}
