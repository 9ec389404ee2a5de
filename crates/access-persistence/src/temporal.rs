//! Log temporal: persistencia ordenada y recarga point-in-time.
//!
//! Semántica de load:
//! - `Now` selecciona el último evento del log.
//! - `Time(T)` selecciona el evento de mayor secuencia con
//!   `occurred_at <= T`.
//! - `Event(id)` selecciona exactamente ese evento.
//!
//! El replay aplica `[primer evento ..= seleccionado]` en orden de secuencia
//! sobre un manager dependency-free provisto por el llamador, y devuelve el
//! `StateDigest` del punto alcanzado. Por el invariante de replay, el grafo
//! resultante es idéntico arista por arista al que estaba vivo en ese punto.

use chrono::{DateTime, Utc};
use log::debug;
use uuid::Uuid;

use access_core::{AccessEvent, DependencyFreeAccessManager, StoredEvent, Stringifiers};
use access_domain::Element;

use crate::error::PersistenceError;
use crate::storage::StorageDriver;

/// Punto del log alcanzado por un load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateDigest {
    pub event_id: Uuid,
    pub sequence: i64,
}

/// Cutoff de la recarga.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadCutoff {
    Now,
    Time(DateTime<Utc>),
    Event(Uuid),
}

pub struct TemporalEventLog<D: StorageDriver> {
    driver: D,
}

impl<D: StorageDriver> TemporalEventLog<D> {
    pub fn new(driver: D) -> Self {
        TemporalEventLog { driver }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Persiste un lote ya ordenado. Valida el orden estrictamente
    /// ascendente antes de delegar en el driver (que además lo exige contra
    /// lo ya almacenado).
    pub fn persist(&self, batch: &[StoredEvent]) -> Result<(), PersistenceError> {
        if batch.is_empty() {
            return Ok(());
        }
        for window in batch.windows(2) {
            if window[1].header.sequence <= window[0].header.sequence {
                return Err(PersistenceError::SequenceOrder(format!("batch not ascending at sequence {}",
                                                                   window[1].header.sequence)));
            }
        }
        self.driver.append(batch)?;
        debug!("persisted {} events up to sequence {}",
               batch.len(),
               batch.last().expect("non-empty batch").header.sequence);
        Ok(())
    }

    /// Reconstruye estado hasta el cutoff sobre el manager provisto.
    pub fn load<U, G, K, A>(&self,
                            cutoff: LoadCutoff,
                            manager: &mut DependencyFreeAccessManager<U, G, K, A>,
                            strs: &Stringifiers<U, G, K, A>)
                            -> Result<StateDigest, PersistenceError>
        where U: Element,
              G: Element,
              K: Element,
              A: Element
    {
        let target = match cutoff {
            LoadCutoff::Now => self.driver.last()?,
            LoadCutoff::Time(at) => self.driver.find_at_or_before(at)?,
            LoadCutoff::Event(id) => {
                let found = self.driver.find_by_id(id)?;
                if found.is_none() {
                    return Err(PersistenceError::EventNotFound(id));
                }
                found
            }
        };
        let target = target.ok_or(PersistenceError::Empty)?;
        let events = self.driver.read_range(i64::MIN, target.header.sequence)?;
        for stored in &events {
            let typed = AccessEvent::from_stored(stored, strs)?;
            manager.apply_event(typed.header.action, &typed.kind)
                   .map_err(|e| PersistenceError::CorruptEvent(format!("replay of sequence {}: {e}",
                                                                       stored.header.sequence)))?;
        }
        debug!("replayed {} events up to sequence {}", events.len(), target.header.sequence);
        Ok(StateDigest { event_id: target.header.event_id, sequence: target.header.sequence })
    }

    /// Eventos posteriores a una secuencia, para que un suscriptor del cache
    /// se ponga al día contra almacenamiento durable.
    pub fn events_after(&self, sequence: i64) -> Result<Vec<StoredEvent>, PersistenceError> {
        match sequence.checked_add(1) {
            Some(from) => self.driver.read_range(from, i64::MAX),
            None => Ok(Vec::new()),
        }
    }
}

/// Azúcar para los tests y el arranque: un manager nuevo cargado hasta el
/// cutoff.
pub fn load_fresh<D, U, G, K, A>(log: &TemporalEventLog<D>,
                                 cutoff: LoadCutoff,
                                 strs: &Stringifiers<U, G, K, A>)
                                 -> Result<(DependencyFreeAccessManager<U, G, K, A>, StateDigest), PersistenceError>
    where D: StorageDriver,
          U: Element,
          G: Element,
          K: Element,
          A: Element
{
    let mut manager = DependencyFreeAccessManager::new();
    let digest = log.load(cutoff, &mut manager, strs)?;
    Ok((manager, digest))
}
