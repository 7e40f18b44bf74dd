//! Servicio del compilador de rutas.
//!
//! `RouteExecutionService` es el punto de entrada para los colaboradores:
//! - `compile` y consultas de versiones (`compile.rs`).
//! - CRUD de overrides de ejecución (`configs.rs`).
//!
//! El CRUD sólo toca la tabla de overrides; una versión nace únicamente de un
//! `compile` explícito.
mod compile;
mod configs;

pub use compile::{decide, VersionDecision};
pub use configs::belongs_to_routing;

use crate::constants::MAX_COMPILE_ATTEMPTS;
use crate::errors::RouteError;
use crate::model::Routing;
use crate::repo::{ExecutionConfigStore, RoutingSource, VersionStore};

pub struct RouteExecutionService<S> {
    store: S,
    max_compile_attempts: u32,
}

impl<S> RouteExecutionService<S>
    where S: RoutingSource + ExecutionConfigStore + VersionStore
{
    pub fn new(store: S) -> Self {
        Self { store,
               max_compile_attempts: MAX_COMPILE_ATTEMPTS }
    }

    /// Intentos ante conflictos de versión concurrentes (mínimo 1).
    pub fn with_max_compile_attempts(mut self, attempts: u32) -> Self {
        self.max_compile_attempts = attempts.max(1);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn load_routing(&self, routing_code: &str) -> Result<Routing, RouteError> {
        self.store
            .find_routing_by_code(routing_code)?
            .ok_or_else(|| RouteError::RouteNotFound(routing_code.to_string()))
    }
}
