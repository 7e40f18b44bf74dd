//! Carga de configuración de conexión desde variables de entorno.
//! Usa convención `DATABASE_URL` y parámetros opcionales de pool.

use std::env;

use dotenvy::dotenv;
use once_cell::sync::Lazy;

use crate::error::PersistenceError;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

pub const DEFAULT_MIN_CONNECTIONS: u32 = 2;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub url: String,
    pub min_connections: u32,
    pub max_connections: u32,
}

impl DbConfig {
    pub fn from_env() -> Result<Self, PersistenceError> {
        Lazy::force(&DOTENV_LOADED);
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Igual que `from_env` pero leyendo de `lookup`. Tamaños no numéricos
    /// caen al default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PersistenceError>
        where F: Fn(&str) -> Option<String>
    {
        let url = lookup("DATABASE_URL").ok_or_else(|| PersistenceError::Config("DATABASE_URL not set".into()))?;
        let size = |key: &str, default: u32| lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default);
        Ok(Self { url,
                  min_connections: size("DATABASE_MIN_CONNECTIONS", DEFAULT_MIN_CONNECTIONS),
                  max_connections: size("DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS) })
    }
}

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}
