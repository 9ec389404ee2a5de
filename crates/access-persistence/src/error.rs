//! Errores de persistencia.
//! Mapea errores de Diesel / conexión a variantes semánticas de la capa de
//! persistencia, más los errores propios del log temporal.

use thiserror::Error;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

use access_domain::DomainError;

#[derive(Debug, Error)]
pub enum PersistenceError {
    /// El log no contiene ningún evento que satisfaga el cutoff pedido.
    #[error("persistent storage is empty")]
    Empty,
    /// El lote viola el orden estrictamente ascendente de secuencias.
    #[error("sequence order violation: {0}")]
    SequenceOrder(String),
    /// Un cutoff por id referenció un evento que no está en el log.
    #[error("event {0} not found in the temporal log")]
    EventNotFound(uuid::Uuid),
    /// Un campo persistido no pudo reconstruirse con el stringifier actual.
    #[error("corrupt stored event: {0}")]
    CorruptEvent(String),
    #[error("unique violation: {0}")]
    UniqueViolation(String),
    #[error("check violation: {0}")]
    CheckViolation(String),
    #[error("foreign key violation: {0}")]
    ForeignKeyViolation(String),
    #[error("not found")]
    NotFound,
    #[error("serialization conflict (retryable)")]
    SerializationConflict,
    #[error("transient IO / connection pool error: {0}")]
    TransientIo(String),
    #[error("unknown database error: {0}")]
    Unknown(String),
}

impl PersistenceError {
    /// `true` si reintentar con backoff puede resolverlo.
    pub fn is_transient(&self) -> bool {
        matches!(self, PersistenceError::TransientIo(_) | PersistenceError::SerializationConflict)
    }
}

impl From<DomainError> for PersistenceError {
    fn from(e: DomainError) -> Self {
        PersistenceError::CorruptEvent(e.to_string())
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(e: serde_json::Error) -> Self {
        PersistenceError::CorruptEvent(format!("payload: {e}"))
    }
}

impl From<DieselError> for PersistenceError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => Self::NotFound,
            DieselError::DatabaseError(kind, info) => match kind {
                DatabaseErrorKind::UniqueViolation => Self::UniqueViolation(info.message().to_string()),
                DatabaseErrorKind::CheckViolation => Self::CheckViolation(info.message().to_string()),
                DatabaseErrorKind::ForeignKeyViolation => Self::ForeignKeyViolation(info.message().to_string()),
                DatabaseErrorKind::SerializationFailure => Self::SerializationConflict,
                other => Self::Unknown(format!("db error kind {:?}: {}", other, info.message())),
            },
            DieselError::DeserializationError(e) => Self::Unknown(format!("deser: {e}")),
            DieselError::SerializationError(e) => Self::Unknown(format!("ser: {e}")),
            DieselError::BrokenTransactionManager => Self::TransientIo("broken transaction manager".into()),
            other => Self::Unknown(format!("unhandled diesel error: {other:?}")),
        }
    }
}
