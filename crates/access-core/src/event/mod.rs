//! Modelo de eventos de mutación y estructura `AccessEvent`.
//!
//! Rol en el flujo:
//! - Cada mutación aceptada por el buffer validado se materializa como un
//!   `AccessEvent` con cabecera compartida (id, acción, timestamp, hash de
//!   ruteo, secuencia) y un payload etiquetado por tipo.
//! - El log temporal persiste los eventos en orden total por `sequence`;
//!   el replay reconstruye el grafo aplicándolos vía el manager
//!   dependency-free.
//! - El enum `AccessEventKind` define el contrato observable y estable del
//!   motor: una variante por familia de mutación más la compensación
//!   `Reconcile` de escrituras duales.

pub mod codec;
pub mod pipeline;
pub mod types;

pub use codec::{decode_event, encode_event};
pub use pipeline::{validate_payload, EventStage, EventValidator, MetricLogger};
pub use types::{datetime_from_ticks, datetime_to_ticks, AccessEvent, AccessEventKind, EventAction, EventHeader,
                StoredEvent, StoredEventKind, Stringifiers};
