// error.rs
use thiserror::Error;

/// Errores del dominio: validación de nombres y conversión de elementos.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Error de validación: {0}")]
    ValidationError(String),

    #[error("no se pudo reconstruir el elemento desde \"{input}\": {reason}")]
    StringifyError { input: String, reason: String },
}

impl From<serde_json::Error> for DomainError {
    fn from(e: serde_json::Error) -> Self {
        DomainError::ValidationError(e.to_string())
    }
}
