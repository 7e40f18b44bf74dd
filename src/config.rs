//! Configuración central de la aplicación.
//! Agrega la configuración de base de datos (`DbConfig`) con los parámetros
//! propios del compilador. Todo se lee de variables de entorno (.env
//! incluido).
use std::env;

use thiserror::Error;

use route_core::constants::MAX_COMPILE_ATTEMPTS;
use route_persistence::config::{init_dotenv, DbConfig};
use route_persistence::PersistenceError;

pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Database(#[from] PersistenceError),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Configuración global de la aplicación.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub db: DbConfig,
    /// Filtro de logging cuando `RUST_LOG` no está definido (`ROUTEFLOW_LOG`).
    pub log_filter: String,
    /// Intentos de `compile` ante conflictos de versión
    /// (`ROUTEFLOW_COMPILE_ATTEMPTS`).
    pub compile_attempts: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        init_dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
        where F: Fn(&str) -> Option<String>
    {
        let db = DbConfig::from_lookup(&lookup)?;
        let compile_attempts = match lookup("ROUTEFLOW_COMPILE_ATTEMPTS") {
            None => MAX_COMPILE_ATTEMPTS,
            Some(raw) => match raw.parse::<u32>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err(ConfigError::Invalid { key: "ROUTEFLOW_COMPILE_ATTEMPTS",
                                                      value: raw })
                }
            },
        };
        Ok(Self { db,
                  log_filter: lookup("ROUTEFLOW_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
                  compile_attempts })
    }
}

/// Filtro de logging sin requerir el resto de la configuración: el logging
/// se inicializa antes de validar `DATABASE_URL`.
pub fn log_filter_from_env() -> String {
    init_dotenv();
    env::var("ROUTEFLOW_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string())
}
