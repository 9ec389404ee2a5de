//! Cota común para los parámetros de tipo del grafo de autorización.
//!
//! El motor es genérico sobre usuarios (U), grupos (G), componentes (K) y
//! niveles de acceso (A). Todos deben poder usarse como clave de mapa, tener
//! orden total (para recorridos deterministas) y viajar entre hilos.

use std::fmt::Debug;
use std::hash::Hash;

/// Requisitos mínimos de un elemento del grafo.
///
/// El orden total se usa para que los recorridos transitivos visiten los
/// orígenes en un orden estable entre ejecuciones.
pub trait Element: Clone + Debug + Eq + Hash + Ord + Send + Sync + 'static {}

impl<T> Element for T where T: Clone + Debug + Eq + Hash + Ord + Send + Sync + 'static {}
