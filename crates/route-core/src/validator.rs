//! Validación de pasos resueltos.
//!
//! Cada regla es independiente y agrega cero o más errores; ningún paso
//! detiene la evaluación de los demás, así una compilación devuelve el
//! reporte completo en una pasada. Orden de los errores: `step_no`, luego
//! número de regla, luego posición del id dentro de `data_spec_ids`.
use std::collections::HashMap;

use crate::model::{CompileError, CompileErrorCode, DataCollectionSpec, StationBinding};
use crate::resolver::ResolvedStep;

/// Specs precargados, indexados por id.
pub struct SpecIndex<'a> {
    by_id: HashMap<&'a str, &'a DataCollectionSpec>,
}

impl<'a> SpecIndex<'a> {
    pub fn new(specs: &'a [DataCollectionSpec]) -> Self {
        Self { by_id: specs.iter().map(|s| (s.id.as_str(), s)).collect() }
    }

    pub fn get(&self, id: &str) -> Option<&'a DataCollectionSpec> {
        self.by_id.get(id).copied()
    }
}

pub fn validate_step(step: &ResolvedStep, specs: &SpecIndex<'_>, errors: &mut Vec<CompileError>) {
    let no = step.step_no;

    // 1. tipo de estación
    if step.station_type.is_none() {
        errors.push(CompileError::new(no, CompileErrorCode::StationTypeMissing, "Station type is required"));
    }

    // 2. restricción de estación
    if step.station_group_id.is_none() && step.allowed_station_ids.is_empty() {
        errors.push(CompileError::new(no,
                                      CompileErrorCode::StationConstraintMissing,
                                      "Station group or allowed stations required"));
    }

    // 3. mapeo de ingesta
    if let Some(station_type) = step.station_type {
        if let Err(unbound) = StationBinding::bind(station_type, step.ingest_mapping.as_ref()) {
            errors.push(CompileError::new(no,
                                          CompileErrorCode::IngestMappingMissing,
                                          format!("Ingest mapping is required for {unbound} stations")));
        }
    }

    // 4 y 5. specs de recolección
    let mut mismatched = Vec::new();
    for id in &step.data_spec_ids {
        match specs.get(id) {
            None => errors.push(CompileError::new(no,
                                                  CompileErrorCode::DataSpecNotFound,
                                                  format!("Data collection spec {id} not found"))),
            Some(spec) if spec.operation_id != step.operation_id => mismatched.push(spec),
            Some(_) => {}
        }
    }
    for spec in mismatched {
        errors.push(CompileError::new(no,
                                      CompileErrorCode::DataSpecOperationMismatch,
                                      format!("Data collection spec {} belongs to operation {}, step uses {}",
                                              spec.id, spec.operation_id, step.operation_id)));
    }
}

/// Valida todos los pasos, sin cortar ante el primer fallo.
pub fn validate_steps(steps: &[ResolvedStep], specs: &[DataCollectionSpec]) -> Vec<CompileError> {
    let index = SpecIndex::new(specs);
    let mut errors = Vec::new();
    for step in steps {
        validate_step(step, &index, &mut errors);
    }
    errors
}
