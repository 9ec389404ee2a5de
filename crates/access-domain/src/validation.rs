//! Validación de nombres de tipos de entidad y entidades.
//!
//! Reglas:
//! - Longitud 1..=450 caracteres (límite heredado del esquema de
//!   almacenamiento, que indexa la forma string).
//! - Sin espacios en blanco al inicio o al final (romperían la biyección del
//!   stringifier al viajar por rutas REST).

use crate::error::DomainError;

/// Longitud máxima de nombres de tipo de entidad y de entidad.
pub const ENTITY_NAME_MAX_LEN: usize = 450;

fn validate_name(kind: &str, name: &str) -> Result<(), DomainError> {
    if name.is_empty() {
        return Err(DomainError::ValidationError(format!("{kind} no puede estar vacío")));
    }
    if name.chars().count() > ENTITY_NAME_MAX_LEN {
        return Err(DomainError::ValidationError(format!("{kind} excede {ENTITY_NAME_MAX_LEN} caracteres")));
    }
    if name.trim() != name {
        return Err(DomainError::ValidationError(format!("{kind} no puede empezar ni terminar con espacios")));
    }
    Ok(())
}

/// Valida el nombre de un tipo de entidad.
pub fn validate_entity_type_name(name: &str) -> Result<(), DomainError> {
    validate_name("el tipo de entidad", name)
}

/// Valida el nombre de una entidad.
pub fn validate_entity_name(name: &str) -> Result<(), DomainError> {
    validate_name("la entidad", name)
}
