//! Grafo de autorización en memoria.
//!
//! Rol en el flujo:
//! - `AccessGraph` es el dueño exclusivo de nodos y aristas; los lectores
//!   reciben copias inmutables de los resultados de consulta.
//! - La jerarquía grupo-a-grupo vive en una arena indexada (`GroupArena`)
//!   con adyacencia directa e inversa, que acota la detección de ciclos y
//!   los recorridos transitivos.
//! - Las altas y bajas fallan con errores distinguibles
//!   (`IdempotentAdd`/`IdempotentRemove` vs `NotFound`) para que el manager
//!   dependency-free decida qué absorber.

pub mod arena;
pub mod store;

pub use arena::GroupArena;
pub use store::AccessGraph;
