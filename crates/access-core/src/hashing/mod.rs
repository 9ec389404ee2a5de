//! Hashing estable compartido entre eventos y ruteo.
//!
//! Submódulos:
//! - `fnv`: FNV-1a de 32 bits sobre la forma string de un elemento.

pub mod fnv;

pub use fnv::fnv1a_32;
