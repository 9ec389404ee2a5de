//! accessmanager-rust: nodo del motor de autorización distribuido
//!
//! Este crate arma las piezas de los miembros del workspace en un nodo
//! ejecutable: grafo + manager dependency-free + buffer validado
//! (`access-core`), estrategia de flush (`access-policies`), log temporal y
//! cache de eventos (`access-persistence`) y, del lado cliente, el router y
//! coordinador de shards (`access-distribution`).
//!
//! Módulos:
//! - `config`: opciones del nodo desde variables de entorno.
//! - `node`: `AccessNode` (arranque con replay, worker de flush, shutdown
//!   con flush final).

pub mod config;
pub mod node;

pub use config::{ConfigError, NodeConfig};
pub use node::AccessNode;
