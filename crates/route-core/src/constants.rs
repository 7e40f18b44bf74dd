//! Constantes del compilador.

/// Intentos máximos de un `compile` cuando otra compilación concurrente de
/// la misma ruta inserta una versión entre la lectura y la escritura.
pub const MAX_COMPILE_ATTEMPTS: u32 = 5;

/// Primer número de versión de una ruta.
pub const FIRST_VERSION_NO: i32 = 1;
