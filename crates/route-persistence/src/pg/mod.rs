//! Implementación Postgres (Diesel) de los contratos de almacenamiento del
//! core.
//!
//! - Paridad 1:1 con `InMemoryRouteStore`: mismos órdenes de listado, mismos
//!   conflictos de versión, mismas marcas `updated_at` estrictamente
//!   crecientes por fila.
//! - `insert_version` corre en una transacción `SERIALIZABLE` que relee
//!   `max(version_no)`; la restricción `UNIQUE (routing_id, version_no)`
//!   cierra el resto. Ambos fallos se reportan como `VersionConflict` y el
//!   orquestador repite el ciclo completo.
//! - Lecturas y escrituras simples reintentan fallos transitorios con un
//!   backoff corto; `insert_version` nunca reintenta por su cuenta.

mod rows;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use diesel::dsl::max;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use log::{debug, info, warn};
use uuid::Uuid;

use route_core::errors::StoreError;
use route_core::model::{DataCollectionSpec, ExecutableRouteVersion, ExecutionConfigPatch, NewExecutionConfig,
                        NewRouteVersion, RouteExecutionConfig, Routing, RoutingStep, StationGroup};
use route_core::repo::{sort_most_recent_first, ConfigFilter, ExecutionConfigStore, RoutingSource, VersionStore};

pub use rows::{ConfigRow, DataSpecRow, RoutingRow, RoutingStepRow, StationGroupRow, VersionRow};

use crate::config::DbConfig;
use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;
use crate::schema::{data_collection_specs, executable_route_versions, route_execution_configs, routing_steps, routings,
                    station_groups};

/// Pool r2d2 de conexiones Postgres, ya migrado al construirse.
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;
pub type PgPooledConnection = r2d2::PooledConnection<ConnectionManager<PgConnection>>;

/// Proveedor abstracto de conexiones.
///
/// Contrato: devolver una conexión válida o `PersistenceError::TransientIo`.
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<PgPooledConnection, PersistenceError>;
}

/// `ConnectionProvider` respaldado por un `PgPool`.
#[derive(Clone)]
pub struct PoolProvider {
    pub pool: PgPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<PgPooledConnection, PersistenceError> {
        self.pool
            .get()
            .map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

/// Errores transitorios (recomendado reintentar con backoff).
fn is_retryable(e: &PersistenceError) -> bool {
    match e {
        PersistenceError::SerializationConflict => true,
        PersistenceError::TransientIo(_) => true,
        // Algunos drivers entregan la desconexión como texto libre.
        PersistenceError::Unknown(msg) => {
            let m = msg.to_lowercase();
            m.contains("deadlock detected")
            || m.contains("terminating connection due to administrator command")
            || m.contains("connection closed")
            || m.contains("connection refused")
            || m.contains("timeout")
        }
        _ => false,
    }
}

/// Retry simple con backoff lineal (hasta 3 reintentos: 15ms, 30ms, 45ms).
fn with_retry<F, T>(mut f: F) -> Result<T, PersistenceError>
    where F: FnMut() -> Result<T, PersistenceError>
{
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if is_retryable(&e) && attempts < 3 => {
                let delay_ms = 15 * ((attempts + 1) as u64);
                warn!("retryable error (attempt {}): {:?} -> sleeping {}ms", attempts + 1, e, delay_ms);
                std::thread::sleep(std::time::Duration::from_millis(delay_ms));
                attempts += 1;
            }
            r => return r,
        }
    }
}

/// Marca de tiempo a precisión de Postgres, estrictamente mayor que `prev`.
fn next_stamp(prev: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now().trunc_subsecs(6);
    match prev {
        Some(prev) if now <= prev => prev + Duration::microseconds(1),
        _ => now,
    }
}

/// Backend Postgres de `RoutingSource`, `ExecutionConfigStore` y
/// `VersionStore`.
pub struct PgRouteStore<P: ConnectionProvider> {
    provider: P,
}

impl<P: ConnectionProvider> PgRouteStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Conexión + unidad de trabajo, con retry ante fallos transitorios.
    fn run<T, F>(&self, mut f: F) -> Result<T, PersistenceError>
        where F: FnMut(&mut PgConnection) -> Result<T, PersistenceError>
    {
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            f(&mut *conn)
        })
    }

    // Sincronización de datos de diseño (ERP → tablas de sólo lectura del
    // compilador). Las usan la importación de la CLI y los tests.

    pub fn upsert_routing(&self, routing: &Routing) -> Result<(), PersistenceError> {
        let row = RoutingRow::from(routing);
        self.run(|conn| {
                diesel::insert_into(routings::table).values(&row)
                                                    .on_conflict(routings::id)
                                                    .do_update()
                                                    .set(&row)
                                                    .execute(conn)
                                                    .map_err(PersistenceError::from)
            })?;
        debug!("upsert_routing code={}", routing.code);
        Ok(())
    }

    /// Reemplaza todos los pasos de la ruta en una transacción.
    pub fn replace_steps(&self, routing_id: &str, steps: &[RoutingStep]) -> Result<(), PersistenceError> {
        let rows: Vec<RoutingStepRow> = steps.iter().map(RoutingStepRow::from).collect();
        self.run(|conn| {
                conn.build_transaction().read_write().run::<_, PersistenceError, _>(|tx| {
                    diesel::delete(routing_steps::table.filter(routing_steps::routing_id.eq(routing_id))).execute(tx)?;
                    diesel::insert_into(routing_steps::table).values(&rows).execute(tx)?;
                    Ok(())
                })
            })?;
        debug!("replace_steps routing_id={routing_id} count={}", rows.len());
        Ok(())
    }

    pub fn upsert_station_group(&self, group: &StationGroup) -> Result<(), PersistenceError> {
        let row = StationGroupRow::from(group);
        self.run(|conn| {
                diesel::insert_into(station_groups::table).values(&row)
                                                          .on_conflict(station_groups::id)
                                                          .do_update()
                                                          .set(&row)
                                                          .execute(conn)
                                                          .map_err(PersistenceError::from)
            })?;
        Ok(())
    }

    pub fn upsert_data_spec(&self, spec: &DataCollectionSpec) -> Result<(), PersistenceError> {
        let row = DataSpecRow::from(spec);
        self.run(|conn| {
                diesel::insert_into(data_collection_specs::table).values(&row)
                                                                 .on_conflict(data_collection_specs::id)
                                                                 .do_update()
                                                                 .set(&row)
                                                                 .execute(conn)
                                                                 .map_err(PersistenceError::from)
            })?;
        Ok(())
    }
}

impl PgRouteStore<PoolProvider> {
    pub fn from_pool(pool: PgPool) -> Self {
        Self::new(PoolProvider { pool })
    }
}

impl<P: ConnectionProvider> RoutingSource for PgRouteStore<P> {
    fn find_routing_by_code(&self, code: &str) -> Result<Option<Routing>, StoreError> {
        let row = self.run(|conn| {
                          routings::table.filter(routings::code.eq(code))
                                         .select(RoutingRow::as_select())
                                         .first(conn)
                                         .optional()
                                         .map_err(PersistenceError::from)
                      })?;
        Ok(row.map(Routing::from))
    }

    fn list_steps(&self, routing_id: &str) -> Result<Vec<RoutingStep>, StoreError> {
        let rows = self.run(|conn| {
                           routing_steps::table.filter(routing_steps::routing_id.eq(routing_id))
                                               .order(routing_steps::step_no.asc())
                                               .select(RoutingStepRow::as_select())
                                               .load(conn)
                                               .map_err(PersistenceError::from)
                       })?;
        Ok(rows.into_iter().map(RoutingStep::from).collect())
    }

    fn find_station_group_by_code(&self, code: &str) -> Result<Option<StationGroup>, StoreError> {
        let row = self.run(|conn| {
                          station_groups::table.filter(station_groups::code.eq(code))
                                               .select(StationGroupRow::as_select())
                                               .first(conn)
                                               .optional()
                                               .map_err(PersistenceError::from)
                      })?;
        Ok(row.map(StationGroup::from))
    }

    fn find_data_specs(&self, ids: &[String]) -> Result<Vec<DataCollectionSpec>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self.run(|conn| {
                           data_collection_specs::table.filter(data_collection_specs::id.eq_any(ids.to_vec()))
                                                       .select(DataSpecRow::as_select())
                                                       .load(conn)
                                                       .map_err(PersistenceError::from)
                       })?;
        Ok(rows.into_iter().map(DataCollectionSpec::from).collect())
    }
}

impl<P: ConnectionProvider> ExecutionConfigStore for PgRouteStore<P> {
    fn list_configs(&self, filter: &ConfigFilter) -> Result<Vec<RouteExecutionConfig>, StoreError> {
        debug!("list_configs:start routing_id={}", filter.routing_id);
        let rows = self.run(|conn| {
                           use crate::schema::route_execution_configs::dsl as rec;
                           rec::route_execution_configs.filter(rec::routing_id.eq(filter.routing_id.as_str())
                                                                              .or(rec::routing_step_id.eq_any(filter.step_ids.clone()))
                                                                              .or(rec::source_step_key.eq_any(filter.source_step_keys.clone())))
                                                       .order((rec::updated_at.desc(), rec::id.desc()))
                                                       .select(ConfigRow::as_select())
                                                       .load(conn)
                                                       .map_err(PersistenceError::from)
                       })?;
        let mut items = rows.into_iter()
                            .map(RouteExecutionConfig::try_from)
                            .collect::<Result<Vec<_>, _>>()?;
        // Mismo desempate por `id` que el backend en memoria (bytes, sin collation).
        sort_most_recent_first(&mut items);
        debug!("list_configs:done routing_id={} count={}", filter.routing_id, items.len());
        Ok(items)
    }

    fn find_config(&self, id: &str) -> Result<Option<RouteExecutionConfig>, StoreError> {
        let row = self.run(|conn| {
                          route_execution_configs::table.find(id)
                                                        .select(ConfigRow::as_select())
                                                        .first(conn)
                                                        .optional()
                                                        .map_err(PersistenceError::from)
                      })?;
        Ok(row.map(RouteExecutionConfig::try_from).transpose()?)
    }

    fn insert_config(&self, new: NewExecutionConfig) -> Result<RouteExecutionConfig, StoreError> {
        let now = next_stamp(None);
        let row = ConfigRow::from(&RouteExecutionConfig { id: Uuid::new_v4().to_string(),
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
                                                          updated_at: now });
        let saved = self.run(|conn| {
                            diesel::insert_into(route_execution_configs::table).values(&row)
                                                                               .returning(ConfigRow::as_returning())
                                                                               .get_result(conn)
                                                                               .map_err(PersistenceError::from)
                        })?;
        debug!("insert_config id={} scope={}", saved.id, saved.scope_type);
        Ok(RouteExecutionConfig::try_from(saved)?)
    }

    fn update_config(&self, id: &str, patch: &ExecutionConfigPatch) -> Result<Option<RouteExecutionConfig>, StoreError> {
        // Leer con lock de fila, aplicar el patch en memoria y reescribir la
        // fila completa: misma semántica que `ExecutionConfigPatch::apply`.
        let saved = self.run(|conn| {
                            conn.build_transaction().read_write().run::<_, PersistenceError, _>(|tx| {
                                let Some(current) = route_execution_configs::table.find(id)
                                                                                  .select(ConfigRow::as_select())
                                                                                  .for_update()
                                                                                  .first(tx)
                                                                                  .optional()?
                                else {
                                    return Ok(None);
                                };
                                let mut config = RouteExecutionConfig::try_from(current)?;
                                patch.apply(&mut config);
                                config.updated_at = next_stamp(Some(config.updated_at));
                                let row = ConfigRow::from(&config);
                                let saved = diesel::update(route_execution_configs::table.find(id))
                                    .set(&row)
                                    .returning(ConfigRow::as_returning())
                                    .get_result(tx)?;
                                Ok(Some(saved))
                            })
                        })?;
        debug!("update_config id={id} found={}", saved.is_some());
        Ok(saved.map(RouteExecutionConfig::try_from).transpose()?)
    }
}

impl<P: ConnectionProvider> VersionStore for PgRouteStore<P> {
    fn latest_version(&self, routing_id: &str) -> Result<Option<ExecutableRouteVersion>, StoreError> {
        let row = self.run(|conn| {
                          executable_route_versions::table.filter(executable_route_versions::routing_id.eq(routing_id))
                                                          .order(executable_route_versions::version_no.desc())
                                                          .select(VersionRow::as_select())
                                                          .first(conn)
                                                          .optional()
                                                          .map_err(PersistenceError::from)
                      })?;
        Ok(row.map(ExecutableRouteVersion::try_from).transpose()?)
    }

    fn list_versions(&self, routing_id: &str) -> Result<Vec<ExecutableRouteVersion>, StoreError> {
        let rows = self.run(|conn| {
                           executable_route_versions::table.filter(executable_route_versions::routing_id.eq(routing_id))
                                                           .order(executable_route_versions::version_no.desc())
                                                           .select(VersionRow::as_select())
                                                           .load(conn)
                                                           .map_err(PersistenceError::from)
                       })?;
        Ok(rows.into_iter()
               .map(ExecutableRouteVersion::try_from)
               .collect::<Result<Vec<_>, _>>()?)
    }

    fn find_version(&self, routing_id: &str, version_no: i32) -> Result<Option<ExecutableRouteVersion>, StoreError> {
        let row = self.run(|conn| {
                          executable_route_versions::table.filter(executable_route_versions::routing_id.eq(routing_id))
                                                          .filter(executable_route_versions::version_no.eq(version_no))
                                                          .select(VersionRow::as_select())
                                                          .first(conn)
                                                          .optional()
                                                          .map_err(PersistenceError::from)
                      })?;
        Ok(row.map(ExecutableRouteVersion::try_from).transpose()?)
    }

    fn insert_version(&self, new: NewRouteVersion, expected_prior: Option<i32>) -> Result<ExecutableRouteVersion, StoreError> {
        let conflict = StoreError::VersionConflict { routing_id: new.routing_id.clone(),
                                                     version_no: new.version_no };
        debug!("insert_version:start routing_id={} version_no={} expected_prior={expected_prior:?}",
               new.routing_id, new.version_no);
        let row = VersionRow::new(Uuid::new_v4().to_string(), new);
        let mut conn = with_retry(|| self.provider.connection())?;
        let outcome = conn.build_transaction()
                          .serializable()
                          .read_write()
                          .run::<_, PersistenceError, _>(|tx| {
                              let latest: Option<i32> =
                                  executable_route_versions::table.filter(executable_route_versions::routing_id.eq(row.routing_id.as_str()))
                                                                  .select(max(executable_route_versions::version_no))
                                                                  .get_result(tx)?;
                              if latest != expected_prior {
                                  return Ok(None);
                              }
                              let saved = diesel::insert_into(executable_route_versions::table)
                                  .values(&row)
                                  .returning(VersionRow::as_returning())
                                  .get_result(tx)?;
                              Ok(Some(saved))
                          });
        match outcome {
            Ok(Some(saved)) => {
                info!("insert_version:done routing_id={} version_no={}", saved.routing_id, saved.version_no);
                Ok(ExecutableRouteVersion::try_from(saved)?)
            }
            Ok(None) | Err(PersistenceError::UniqueViolation(_)) | Err(PersistenceError::SerializationConflict) => {
                debug!("insert_version:conflict {conflict}");
                Err(conflict)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Construye un pool Postgres r2d2 y ejecuta las migraciones pendientes.
///
/// Si `min_size > max_size` se usa `min_size = max_size`; un tamaño 0 se
/// eleva a 1.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let validated_min = min_size.max(1);
    let validated_max = max_size.max(1);
    if validated_min > validated_max {
        warn!("min_size > max_size ({validated_min} > {validated_max}), using min=max");
    }
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder().min_idle(Some(validated_min.min(validated_max)))
                                    .max_size(validated_max)
                                    .build(manager)
                                    .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))?;
    {
        let mut conn = pool.get()
                           .map_err(|e| PersistenceError::TransientIo(format!("pool get for migrations: {e}")))?;
        run_pending_migrations(&mut conn)?;
    }
    info!("pool ready (min_idle={}, max_size={validated_max})", validated_min.min(validated_max));
    Ok(pool)
}

/// Carga `.env`, lee `DbConfig` y construye un pool ya migrado.
pub fn build_dev_pool_from_env() -> Result<PgPool, PersistenceError> {
    let cfg = DbConfig::from_env()?;
    build_pool(&cfg.url, cfg.min_connections, cfg.max_connections)
}
