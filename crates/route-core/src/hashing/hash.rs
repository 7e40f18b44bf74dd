//! Hash helpers – abstracción para permitir cambiar de algoritmo sin tocar el
//! resto del compilador.

use blake3::Hasher;
use serde_json::Value;

use super::to_canonical_json;

/// Hashea un string y devuelve hex (64 caracteres).
pub fn hash_str(input: &str) -> String {
    let mut h = Hasher::new();
    h.update(input.as_bytes());
    h.finalize().to_hex().to_string()
}

/// Hash de un `Value` sobre su forma canónica: el orden de inserción de las
/// claves no altera el resultado.
pub fn hash_value(value: &Value) -> String {
    hash_str(&to_canonical_json(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hash_value_ignores_key_order() {
        let a = hash_value(&json!({"b": 2, "a": {"y": 1, "x": [1, 2]}}));
        let b = hash_value(&json!({"a": {"x": [1, 2], "y": 1}, "b": 2}));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn hash_value_is_sensitive_to_array_order() {
        assert_ne!(hash_value(&json!([1, 2])), hash_value(&json!([2, 1])));
    }
}
