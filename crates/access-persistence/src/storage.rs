//! Contrato del driver de almacenamiento y driver en memoria de referencia.
//!
//! El contrato es mínimo a propósito: `append` durable y atómico por lote,
//! `read_range` en orden ascendente de `sequence`, y dos búsquedas puntuales
//! para los cutoffs del load temporal. Cualquier backend con esas garantías
//! sirve (relacional, blob, memoria).

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use access_core::StoredEvent;

use crate::error::PersistenceError;

pub trait StorageDriver: Send + Sync {
    /// Agrega un lote completo, todo-o-nada. Las secuencias del lote deben
    /// ser estrictamente mayores que la última almacenada.
    fn append(&self, batch: &[StoredEvent]) -> Result<(), PersistenceError>;

    /// Eventos con `from_seq <= sequence <= to_seq`, ascendente por secuencia.
    fn read_range(&self, from_seq: i64, to_seq: i64) -> Result<Vec<StoredEvent>, PersistenceError>;

    /// Evento con el id dado, si está en el log.
    fn find_by_id(&self, event_id: Uuid) -> Result<Option<StoredEvent>, PersistenceError>;

    /// El evento de mayor secuencia con `occurred_at <= at`.
    fn find_at_or_before(&self, at: DateTime<Utc>) -> Result<Option<StoredEvent>, PersistenceError>;

    /// El último evento del log (mayor secuencia).
    fn last(&self) -> Result<Option<StoredEvent>, PersistenceError>;
}

// Un driver compartido sigue siendo un driver: permite que dos instancias
// del log (p.ej. un nodo reiniciado) hablen con el mismo almacenamiento.
impl<D: StorageDriver + ?Sized> StorageDriver for Arc<D> {
    fn append(&self, batch: &[StoredEvent]) -> Result<(), PersistenceError> {
        (**self).append(batch)
    }

    fn read_range(&self, from_seq: i64, to_seq: i64) -> Result<Vec<StoredEvent>, PersistenceError> {
        (**self).read_range(from_seq, to_seq)
    }

    fn find_by_id(&self, event_id: Uuid) -> Result<Option<StoredEvent>, PersistenceError> {
        (**self).find_by_id(event_id)
    }

    fn find_at_or_before(&self, at: DateTime<Utc>) -> Result<Option<StoredEvent>, PersistenceError> {
        (**self).find_at_or_before(at)
    }

    fn last(&self) -> Result<Option<StoredEvent>, PersistenceError> {
        (**self).last()
    }
}

/// Driver en memoria: referencia del contrato y soporte de tests.
///
/// Volátil; sincronizado con un `Mutex` porque el flush y las lecturas de
/// replay pueden llegar desde tareas distintas.
pub struct InMemoryStorageDriver {
    events: Mutex<Vec<StoredEvent>>,
}

impl InMemoryStorageDriver {
    pub fn new() -> Self {
        InMemoryStorageDriver { events: Mutex::new(Vec::new()) }
    }

    pub fn len(&self) -> usize {
        self.events.lock().expect("storage lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryStorageDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageDriver for InMemoryStorageDriver {
    fn append(&self, batch: &[StoredEvent]) -> Result<(), PersistenceError> {
        let mut events = self.events.lock().expect("storage lock poisoned");
        let mut last_seq = events.last().map(|e| e.header.sequence);
        for event in batch {
            if last_seq.is_some_and(|last| event.header.sequence <= last) {
                return Err(PersistenceError::SequenceOrder(format!("sequence {} after {:?}",
                                                                   event.header.sequence, last_seq)));
            }
            last_seq = Some(event.header.sequence);
        }
        events.extend(batch.iter().cloned());
        Ok(())
    }

    fn read_range(&self, from_seq: i64, to_seq: i64) -> Result<Vec<StoredEvent>, PersistenceError> {
        let events = self.events.lock().expect("storage lock poisoned");
        Ok(events.iter()
                 .filter(|e| e.header.sequence >= from_seq && e.header.sequence <= to_seq)
                 .cloned()
                 .collect())
    }

    fn find_by_id(&self, event_id: Uuid) -> Result<Option<StoredEvent>, PersistenceError> {
        let events = self.events.lock().expect("storage lock poisoned");
        Ok(events.iter().find(|e| e.header.event_id == event_id).cloned())
    }

    fn find_at_or_before(&self, at: DateTime<Utc>) -> Result<Option<StoredEvent>, PersistenceError> {
        let events = self.events.lock().expect("storage lock poisoned");
        Ok(events.iter().rev().find(|e| e.header.occurred_at <= at).cloned())
    }

    fn last(&self) -> Result<Option<StoredEvent>, PersistenceError> {
        let events = self.events.lock().expect("storage lock poisoned");
        Ok(events.last().cloned())
    }
}
