//! access-core: grafo de autorización y buffer de eventos validado
//!
//! Propósito:
//! - Proveer el grafo de autorización en memoria (usuarios, grupos, jerarquía
//!   de grupos, permisos sobre componentes y entidades) con consultas directas
//!   y transitivas deterministas.
//! - Generar la secuencia de eventos de mutación (Event Sourcing) con orden
//!   total por `sequence`, lista para persistir en el log temporal y capaz de
//!   reconstruir el estado (replay) sin mutar datos históricos.
//!
//! Componentes principales:
//! - `graph`: grafo bidireccional con arena de grupos y detección de ciclos.
//! - `manager`: envoltorio dependency-free que hace toda mutación idempotente
//!   y auto-suficiente (sintetiza prerequisitos).
//! - `event`: modelo de eventos etiquetados, codec binario y pipeline de
//!   etapas (validación → métricas).
//! - `buffer`: colas por tipo con disciplina de locks y protocolo de flush.
//! - `hashing`: hash estable de 32 bits (FNV-1a) compartido con el ruteo.
//! - `errors`: errores semánticos del grafo y del buffer.
//!
//! Re-exports: se exponen símbolos clave para facilitar el uso desde
//! binarios/tests.

pub mod buffer;
pub mod constants;
pub mod errors;
pub mod event;
pub mod graph;
pub mod hashing;
pub mod manager;

// Re-exports públicos principales
pub use buffer::{DrainedBatch, EventQueueKind, ValidatedEventBuffer};
pub use errors::{BufferError, ErrorClass, GraphError};
pub use event::{AccessEvent, AccessEventKind, EventAction, EventHeader, StoredEvent, StoredEventKind, Stringifiers};
pub use graph::AccessGraph;
pub use manager::{DependencyFreeAccessManager, Prerequisite};
