//! Constantes del motor core.
//!
//! Este módulo agrupa valores estáticos que participan en contratos estables
//! del motor. Cambios aquí afectan la compatibilidad del log temporal y del
//! ruteo por rangos de hash, así que deben tratarse como cambios de formato.

/// Versión lógica del motor. Se persiste junto con el log en los metadatos de
/// despliegue para detectar replays contra motores incompatibles.
pub const ENGINE_VERSION: &str = "A1.0";

/// Secuencia inicial que asigna el buffer en una instancia recién creada.
pub const INITIAL_SEQUENCE: i64 = 0;

/// Cantidad de colas por tipo de evento en el buffer validado.
pub const EVENT_QUEUE_COUNT: usize = 10;
