//! access-persistence
//!
//! Persister temporal del log de eventos: almacenamiento append-only con
//! orden total por `sequence` y recarga point-in-time hacia un grafo nuevo.
//! Esta capa aísla por completo el mapeo evento ↔ fila de almacenamiento del
//! `access-core`; el replay reconstruye exactamente el mismo estado que la
//! instancia viva (paridad 1:1 entre drivers).
//!
//! Módulos:
//! - `storage`: contrato `StorageDriver` y driver en memoria de referencia.
//! - `temporal`: `TemporalEventLog` (persist + load con cutoff Now/Time/Id).
//! - `cache`: cola en memoria con la cola del log para suscriptores.
//! - `pg`: driver Postgres (Diesel, append transaccional, reintentos).
//! - `migrations`: runner embebido de migraciones Diesel.
//! - `config`: carga de configuración desde .env.
//! - `schema`: tablas Diesel declaradas para compilar queries.

pub mod cache;
pub mod config;
pub mod error;
pub mod migrations;
pub mod pg;
pub mod schema;
pub mod storage;
pub mod temporal;

pub use cache::EventCache;
pub use config::{init_dotenv, DbConfig};
pub use error::PersistenceError;
pub use pg::{build_pool, ConnectionProvider, PgPool, PgStorageDriver, PoolProvider};
pub use storage::{InMemoryStorageDriver, StorageDriver};
pub use temporal::{LoadCutoff, StateDigest, TemporalEventLog};
