//! Conversión elemento ↔ string corta para persistencia, hashing y ruteo.
//!
//! Contrato:
//! - `to_str` y `from_str` deben ser biyectivas y estables entre versiones:
//!   el log temporal guarda la forma string, por lo que un cambio de
//!   representación corrompería el replay.
//! - La forma string es también la entrada del hash de ruteo, así que dos
//!   procesos con el mismo stringifier rutean igual.

use crate::error::DomainError;

/// Codifica y decodifica un elemento del dominio como string única.
pub trait ElementStringifier<T>: Send + Sync {
    /// Forma string estable del elemento.
    fn to_str(&self, value: &T) -> String;

    /// Reconstruye el elemento desde su forma string.
    fn from_str(&self, input: &str) -> Result<T, DomainError>;
}

/// Stringifier identidad para elementos que ya son `String`.
#[derive(Clone, Copy, Debug, Default)]
pub struct StringStringifier;

impl ElementStringifier<String> for StringStringifier {
    fn to_str(&self, value: &String) -> String {
        value.clone()
    }

    fn from_str(&self, input: &str) -> Result<String, DomainError> {
        Ok(input.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_stringifier_is_bijective() {
        let s = StringStringifier;
        let original = "grupo-admins".to_string();
        let encoded = s.to_str(&original);
        let decoded = s.from_str(&encoded).unwrap();
        assert_eq!(original, decoded);
    }
}
