//! Buffer de eventos validado: colas por tipo con disciplina de locks.
//!
//! Rol en el flujo:
//! - Toda mutación entra por acá: se bloquean las colas del tipo propio y de
//!   los tipos referenciados (en orden global fijo), se asigna secuencia y
//!   timestamp bajo el lock de secuencia, se valida, se aplica al manager
//!   dependency-free y recién entonces se encola para persistir.
//! - El protocolo de flush toma una foto de `max_sequence`, drena cada cola
//!   por separado y entrega un lote único ordenado por secuencia; si el
//!   persister falla, el lote vuelve al frente de sus colas.

pub mod kind;
pub mod validated;

pub use kind::EventQueueKind;
pub use validated::{DrainedBatch, ValidatedEventBuffer};
