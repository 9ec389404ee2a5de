//! Errores semánticos del grafo y del buffer.
//!
//! Los tipos de error son contrato estable: el manager dependency-free
//! distingue `IdempotentAdd`/`IdempotentRemove` (recuperables localmente) de
//! `NotFound`/`CycleDetected` (propagables al llamador), y las capas de
//! persistencia y distribución clasifican fallas en transitorias o
//! permanentes para decidir reintentos.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraphError {
    #[error("{kind} \"{id}\" does not exist")]
    NotFound { kind: String, id: String },
    #[error("{kind} \"{id}\" already exists")]
    AlreadyExists { kind: String, id: String },
    #[error("mapping {from} -> {to} would close a cycle")]
    CycleDetected { from: String, to: String },
    #[error("idempotent add: {kind} \"{id}\" already present")]
    IdempotentAdd { kind: String, id: String },
    #[error("idempotent remove: {kind} \"{id}\" not present")]
    IdempotentRemove { kind: String, id: String },
}

impl GraphError {
    /// `true` si el error es de los que el manager dependency-free absorbe.
    pub fn is_idempotent(&self) -> bool {
        matches!(self, GraphError::IdempotentAdd { .. } | GraphError::IdempotentRemove { .. })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BufferError {
    #[error("validation failed on {field}: {reason}")]
    ValidationFailed { field: String, reason: String },
    #[error("persist failed for {kind}: {cause}")]
    PersistFailed { kind: String, cause: String },
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Clasificación gruesa de errores para decidir reintentos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Vale la pena reintentar (IO, timeouts, contención).
    Transient,
    /// Reintentar no cambia el resultado (validación, ciclos, no-existe).
    Permanent,
}

/// Clasifica un error del buffer. Los fallos de persistencia se consideran
/// transitorios (el flush los reintenta con backoff); el resto es permanente.
pub fn classify_buffer_error(error: &BufferError) -> ErrorClass {
    match error {
        BufferError::PersistFailed { .. } => ErrorClass::Transient,
        BufferError::ValidationFailed { .. } | BufferError::Graph(_) => ErrorClass::Permanent,
    }
}
