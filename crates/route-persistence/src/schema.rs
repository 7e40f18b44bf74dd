//! Esquema Diesel, a mano. Reemplazable con `diesel print-schema`.

diesel::table! {
    routings (id) {
        id -> Text,
        code -> Text,
        name -> Text,
        source_system -> Text,
        source_key -> Nullable<Text>,
    }
}

diesel::table! {
    routing_steps (id) {
        id -> Text,
        routing_id -> Text,
        step_no -> Int4,
        operation_id -> Text,
        source_step_key -> Nullable<Text>,
        station_type -> Nullable<Text>,
        station_group_id -> Nullable<Text>,
        requires_fai -> Bool,
    }
}

diesel::table! {
    station_groups (id) {
        id -> Text,
        code -> Text,
        name -> Text,
    }
}

diesel::table! {
    data_collection_specs (id) {
        id -> Text,
        operation_id -> Text,
        name -> Text,
    }
}

diesel::table! {
    route_execution_configs (id) {
        id -> Text,
        scope_type -> Text,
        routing_id -> Nullable<Text>,
        routing_step_id -> Nullable<Text>,
        source_step_key -> Nullable<Text>,
        operation_id -> Nullable<Text>,
        station_type -> Nullable<Text>,
        station_group_id -> Nullable<Text>,
        allowed_station_ids -> Nullable<Array<Text>>,
        requires_fai -> Nullable<Bool>,
        requires_authorization -> Nullable<Bool>,
        data_spec_ids -> Nullable<Array<Text>>,
        ingest_mapping -> Nullable<Jsonb>,
        meta -> Nullable<Jsonb>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    executable_route_versions (id) {
        id -> Text,
        routing_id -> Text,
        version_no -> Int4,
        status -> Text,
        snapshot_json -> Jsonb,
        errors_json -> Nullable<Jsonb>,
        compiled_at -> Timestamptz,
    }
}

diesel::joinable!(routing_steps -> routings (routing_id));
diesel::joinable!(executable_route_versions -> routings (routing_id));

diesel::allow_tables_to_appear_in_same_query!(
    routings,
    routing_steps,
    station_groups,
    data_collection_specs,
    route_execution_configs,
    executable_route_versions,
);
