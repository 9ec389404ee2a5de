//! access-distribution: ruteo por shards y coordinador de operaciones
//!
//! Propósito:
//! - Particionar el espacio de claves por rangos de hash (el mismo FNV-1a
//!   de 32 bits que graba `hash_code` en los eventos) y rutear cada evento
//!   o consulta al shard que lo posee.
//! - Fan-out de consultas distribuidas con deadline global, cancelación
//!   cooperativa, reintentos con backoff para errores transitorios y
//!   agregación de resultados.
//! - Escritura dual usuario-grupo con compensación (`Reconcile`) cuando un
//!   solo lado aplica.
//!
//! Componentes:
//! - `shard`: configuración de shards y resolución por rango de hash.
//! - `client`: contrato `ShardClient` y cliente REST concreto.
//! - `pool`: fábrica/pool de clientes por `(base_url, operación)`.
//! - `retry`: política de reintentos con backoff exponencial.
//! - `router`: ruteo de eventos y primitivas de fan-out.
//! - `coordinator`: fachada asíncrona con la superficie completa.

pub mod client;
pub mod coordinator;
pub mod error;
pub mod pool;
pub mod retry;
pub mod router;
pub mod shard;

pub use client::{ClientFactory, RestShardClient, ShardClient};
pub use coordinator::OperationCoordinator;
pub use error::{DistributionError, ErrorDetail, ErrorResponse};
pub use pool::RestClientFactory;
pub use retry::RetryPolicy;
pub use router::{CancellationFlag, ShardRouter};
pub use shard::{DataElement, OperationType, ShardConfig, ShardConfigSet};
