//! Wrapper para correr migraciones embebidas (`migrations/` de este crate).
//! Se ejecutan una vez al construir el pool.

use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::warn;

use crate::error::PersistenceError;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

pub fn run_pending_migrations(conn: &mut PgConnection) -> Result<(), PersistenceError> {
    // Sin permisos para extensiones la migración igual declara la suya.
    if let Err(e) = conn.batch_execute("CREATE EXTENSION IF NOT EXISTS pgcrypto;") {
        warn!("pgcrypto not created up front: {e}");
    }
    conn.run_pending_migrations(MIGRATIONS)
        .map(|_| ())
        .map_err(|e| PersistenceError::Unknown(format!("migration error: {e}")))
}
