//! Manager dependency-free: mutaciones idempotentes y auto-suficientes.

pub mod dependency_free;

pub use dependency_free::{DependencyFreeAccessManager, Prerequisite};
