//! Cache de la cola del log para suscriptores.
//!
//! Mantiene en memoria los últimos N eventos persistidos. Un suscriptor
//! pide "todo lo posterior a la secuencia S"; si S ya salió de la ventana,
//! la respuesta es `None` y el suscriptor debe ponerse al día contra el
//! almacenamiento durable (`TemporalEventLog::events_after`).

use std::collections::VecDeque;
use std::sync::Mutex;

use access_core::StoredEvent;

pub struct EventCache {
    inner: Mutex<VecDeque<StoredEvent>>,
    capacity: usize,
}

impl EventCache {
    pub fn new(capacity: usize) -> Self {
        EventCache { inner: Mutex::new(VecDeque::with_capacity(capacity)), capacity }
    }

    /// Publica un lote recién persistido, descartando lo más viejo si la
    /// ventana se pasa de capacidad.
    pub fn publish(&self, batch: &[StoredEvent]) {
        let mut window = self.inner.lock().expect("cache lock poisoned");
        for event in batch {
            if window.len() == self.capacity {
                window.pop_front();
            }
            window.push_back(event.clone());
        }
    }

    /// Eventos con secuencia estrictamente mayor que `sequence`.
    ///
    /// `None` significa que la ventana ya no alcanza ese punto (overrun):
    /// hay eventos posteriores a `sequence` que el cache descartó.
    pub fn events_after(&self, sequence: i64) -> Option<Vec<StoredEvent>> {
        let window = self.inner.lock().expect("cache lock poisoned");
        let oldest = match window.front() {
            Some(event) => event.header.sequence,
            None => return Some(Vec::new()),
        };
        if oldest > sequence + 1 {
            // Falta historia entre `sequence` y el inicio de la ventana.
            return None;
        }
        Some(window.iter().filter(|e| e.header.sequence > sequence).cloned().collect())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
