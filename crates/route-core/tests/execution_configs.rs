//! CRUD de overrides: validaciones de alta, updates parciales y verificación
//! de pertenencia a la ruta.
mod common;

use common::{create_input, manual_step, routing, service_with, update_input};
use route_core::{ConfigScope, InMemoryRouteStore, RouteError, RouteExecutionConfig, RouteExecutionService, StationType,
                 VersionStatus};
use serde_json::json;

fn two_routings() -> RouteExecutionService<InMemoryRouteStore> {
    let r1 = routing("R1");
    let r2 = routing("R2");
    let svc = service_with(r1.clone(), vec![manual_step(&r1, 1), manual_step(&r1, 2)]);
    svc.store().add_routing(r2.clone());
    svc.store().add_step(manual_step(&r2, 1));
    svc
}

#[test]
fn create_rejects_bad_input() {
    let svc = two_routings();
    let cases = [(json!({"scopeType": "OPERATION"}), "SCOPE_TYPE_INVALID", 400),
                 (json!({"scopeType": "step", "stepNo": 1}), "SCOPE_TYPE_INVALID", 400),
                 (json!({"scopeType": "STEP"}), "STEP_NO_REQUIRED", 400),
                 (json!({"scopeType": "STEP", "stepNo": 99}), "ROUTE_STEP_NOT_FOUND", 404),
                 (json!({"scopeType": "ROUTE", "stationGroupCode": "NOPE"}), "STATION_GROUP_NOT_FOUND", 404)];
    for (payload, code, status) in cases {
        let err = svc.create_execution_config("R1", create_input(payload.clone())).unwrap_err();
        assert_eq!(err.code(), code, "payload {payload}");
        assert_eq!(err.status(), status, "payload {payload}");
    }
    assert_eq!(svc.create_execution_config("NOPE", create_input(json!({"scopeType": "ROUTE"})))
                  .unwrap_err()
                  .code(),
               "ROUTE_NOT_FOUND");
    assert!(svc.list_execution_configs("R1").unwrap().is_empty(), "failed creates must not insert rows");
}

#[test]
fn create_step_override_targets_the_step() {
    let r = routing("R1");
    let mut s = manual_step(&r, 1);
    s.source_step_key = Some("ERP-0010".into());
    let svc = service_with(r.clone(), vec![s.clone()]);

    let cfg = svc.create_execution_config("R1",
                                          create_input(json!({"scopeType": "STEP", "stepNo": 1,
                                                              "stationType": "AUTO", "stationGroupCode": "LINE-A"})))
                 .unwrap();
    assert_eq!(cfg.scope, ConfigScope::Step);
    assert_eq!(cfg.routing_step_id.as_deref(), Some(s.id.as_str()));
    assert_eq!(cfg.source_step_key.as_deref(), Some("ERP-0010"));
    assert_eq!(cfg.routing_id, None);
    assert_eq!(cfg.station_type, Some(StationType::Auto));
    assert_eq!(cfg.station_group_id.as_deref(), Some("sg-line-a"));
    assert_eq!(cfg.created_at, cfg.updated_at);

    let route = svc.create_execution_config("R1", create_input(json!({"scopeType": "ROUTE"}))).unwrap();
    assert_eq!(route.routing_id.as_deref(), Some(r.id.as_str()));
    assert_eq!(route.routing_step_id, None);
}

#[test]
fn update_is_partial_and_tri_state() {
    let svc = two_routings();
    let cfg = svc.create_execution_config("R1",
                                          create_input(json!({"scopeType": "STEP", "stepNo": 2,
                                                              "requiresFAI": true, "stationGroupCode": "LINE-A",
                                                              "allowedStationIds": ["ST-1"], "meta": {"by": "qa"}})))
                 .unwrap();

    let upd = svc.update_execution_config("R1", &cfg.id, update_input(json!({"requiresAuthorization": true})))
                 .unwrap();
    assert_eq!(upd.requires_authorization, Some(true));
    assert_eq!(upd.requires_fai, Some(true));
    assert_eq!(upd.station_group_id.as_deref(), Some("sg-line-a"));
    assert_eq!(upd.allowed_station_ids, Some(vec!["ST-1".to_string()]));
    assert_eq!(upd.meta, Some(json!({"by": "qa"})));
    assert_eq!(upd.created_at, cfg.created_at);
    assert!(upd.updated_at > cfg.updated_at);

    // `null` limpia; ausente conserva.
    let cleared = svc.update_execution_config("R1",
                                              &cfg.id,
                                              update_input(json!({"stationGroupCode": null, "allowedStationIds": null})))
                     .unwrap();
    assert_eq!(cleared.station_group_id, None);
    assert_eq!(cleared.allowed_station_ids, None);
    assert_eq!(cleared.requires_fai, Some(true));

    let err = svc.update_execution_config("R1", &cfg.id, update_input(json!({"stationGroupCode": "NOPE"})))
                 .unwrap_err();
    assert!(matches!(err, RouteError::StationGroupNotFound(_)));
}

#[test]
fn null_update_clears_scalar_overrides() {
    let svc = two_routings();
    let cfg = svc.create_execution_config("R1",
                                          create_input(json!({"scopeType": "STEP", "stepNo": 2,
                                                              "stationType": "AUTO", "requiresFAI": true,
                                                              "requiresAuthorization": true})))
                 .unwrap();
    let v1 = svc.compile("R1").unwrap();
    assert_eq!(v1.status, VersionStatus::Invalid);

    let cleared = svc.update_execution_config("R1",
                                              &cfg.id,
                                              update_input(json!({"stationType": null, "requiresFAI": null,
                                                                  "requiresAuthorization": null})))
                     .unwrap();
    assert_eq!(cleared.station_type, None);
    assert_eq!(cleared.requires_fai, None);
    assert_eq!(cleared.requires_authorization, None);

    // Sin override, cada campo vuelve al valor por defecto del paso.
    let v2 = svc.compile("R1").unwrap();
    assert_eq!(v2.version_no, 2);
    assert_eq!(v2.status, VersionStatus::Ready);
    let step = &v2.snapshot_json["steps"][1];
    assert_eq!(step["stepNo"], json!(2));
    assert_eq!(step["stationType"], json!("MANUAL"));
    assert_eq!(step["requiresFAI"], json!(false));
    assert_eq!(step["requiresAuthorization"], json!(false));
}

#[test]
fn update_checks_existence_and_ownership() {
    let svc = two_routings();
    let err = svc.update_execution_config("R1", "missing", update_input(json!({}))).unwrap_err();
    assert_eq!(err.code(), "EXECUTION_CONFIG_NOT_FOUND");
    assert_eq!(err.status(), 404);

    let step_cfg = svc.create_execution_config("R1", create_input(json!({"scopeType": "STEP", "stepNo": 1})))
                      .unwrap();
    let route_cfg = svc.create_execution_config("R1", create_input(json!({"scopeType": "ROUTE"}))).unwrap();
    for id in [&step_cfg.id, &route_cfg.id] {
        let err = svc.update_execution_config("R2", id, update_input(json!({"requiresFAI": true})))
                     .unwrap_err();
        assert_eq!(err.code(), "EXECUTION_CONFIG_SCOPE_MISMATCH");
        assert_eq!(err.status(), 400);
    }

    // Re-sincronización: el paso 1 cambia de id y el override queda huérfano.
    let r1 = routing("R1");
    let mut resynced = manual_step(&r1, 1);
    resynced.id = "rt-R1-st-1-v2".into();
    svc.store().replace_steps(&r1.id, vec![resynced, manual_step(&r1, 2)]);
    let err = svc.update_execution_config("R1", &step_cfg.id, update_input(json!({"requiresFAI": true})))
                 .unwrap_err();
    assert_eq!(err.code(), "EXECUTION_CONFIG_SCOPE_MISMATCH");
    assert!(svc.update_execution_config("R1", &route_cfg.id, update_input(json!({"requiresFAI": true})))
               .is_ok());
}

#[test]
fn list_is_most_recent_first_and_scoped_to_routing() {
    let svc = two_routings();
    let a = svc.create_execution_config("R1", create_input(json!({"scopeType": "ROUTE"}))).unwrap();
    let b = svc.create_execution_config("R1", create_input(json!({"scopeType": "STEP", "stepNo": 1}))).unwrap();
    let c = svc.create_execution_config("R1", create_input(json!({"scopeType": "STEP", "stepNo": 2}))).unwrap();
    svc.create_execution_config("R2", create_input(json!({"scopeType": "ROUTE"}))).unwrap();

    let ids = |svc: &RouteExecutionService<InMemoryRouteStore>| {
        svc.list_execution_configs("R1").unwrap().into_iter().map(|c| c.id).collect::<Vec<_>>()
    };
    assert_eq!(ids(&svc), vec![c.id.clone(), b.id.clone(), a.id.clone()]);

    svc.update_execution_config("R1", &a.id, update_input(json!({"meta": {"touched": true}})))
       .unwrap();
    assert_eq!(ids(&svc), vec![a.id, c.id, b.id]);
    assert_eq!(svc.list_execution_configs("R2").unwrap().len(), 1);
}

#[test]
fn crud_never_creates_versions() {
    let svc = two_routings();
    svc.create_execution_config("R1", create_input(json!({"scopeType": "ROUTE", "requiresFAI": true})))
       .unwrap();
    assert!(svc.list_route_versions("R1").unwrap().is_empty());
}

#[test]
fn legacy_operation_rows_are_owned_but_not_compiled() {
    let svc = two_routings();
    let now = chrono::Utc::now();
    svc.store().add_raw_config(RouteExecutionConfig { id: "legacy-op".into(),
                                                      scope: ConfigScope::Operation,
                                                      routing_id: None,
                                                      routing_step_id: None,
                                                      source_step_key: None,
                                                      operation_id: Some("op-2".into()),
                                                      station_type: Some(StationType::Auto),
                                                      station_group_id: None,
                                                      allowed_station_ids: None,
                                                      requires_fai: Some(true),
                                                      requires_authorization: None,
                                                      data_spec_ids: None,
                                                      ingest_mapping: None,
                                                      meta: None,
                                                      created_at: now,
                                                      updated_at: now });

    let upd = svc.update_execution_config("R1", "legacy-op", update_input(json!({"requiresFAI": false})))
                 .unwrap();
    assert_eq!(upd.scope, ConfigScope::Operation);

    let v = svc.compile("R1").unwrap();
    assert_eq!(v.snapshot_json["steps"][1]["stationType"], json!("MANUAL"));
}
