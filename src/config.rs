//! Opciones del nodo desde variables de entorno.
//!
//! Convención:
//! - `ACCESS_FLUSH_STRATEGY`: `size` | `interval` | `sizeOrInterval` |
//!   `manual` (default `sizeOrInterval`).
//! - `ACCESS_FLUSH_THRESHOLD`: umbral de eventos para las estrategias por
//!   tamaño (default 200).
//! - `ACCESS_FLUSH_PERIOD_MS`: período para las estrategias por intervalo
//!   (default 1000).
//! - `ACCESS_EVENT_CACHE_CAPACITY`: ventana del cache de eventos (default
//!   5000).
//!
//! Una opción con valor inválido corta el arranque con `ConfigError`; un
//! nodo que arranca con opciones mal leídas es peor que uno que no arranca.

use std::env;

use dotenvy::dotenv;
use once_cell::sync::Lazy;
use thiserror::Error;

use access_policies::{FlushStrategyParams, IntervalParams, SizeOrIntervalParams, SizeParams};

static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv();
});

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid option {option}: {reason}")]
    Invalid { option: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub flush: FlushStrategyParams,
    pub event_cache_capacity: usize,
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid { option: name.to_string(),
                                                                  reason: format!("no se pudo parsear \"{raw}\"") }),
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig { flush: FlushStrategyParams::SizeOrInterval(SizeOrIntervalParams { threshold: 200,
                                                                                       period_ms: 1000 }),
                     event_cache_capacity: 5000 }
    }
}

impl NodeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Lazy::force(&DOTENV_LOADED);
        let threshold: u32 = parse_var("ACCESS_FLUSH_THRESHOLD", 200)?;
        let period_ms: u32 = parse_var("ACCESS_FLUSH_PERIOD_MS", 1000)?;
        let strategy = env::var("ACCESS_FLUSH_STRATEGY").unwrap_or_else(|_| "sizeOrInterval".to_string());
        let flush = match strategy.as_str() {
            "size" => FlushStrategyParams::Size(SizeParams { threshold }),
            "interval" => FlushStrategyParams::Interval(IntervalParams { period_ms }),
            "sizeOrInterval" => FlushStrategyParams::SizeOrInterval(SizeOrIntervalParams { threshold, period_ms }),
            "manual" => FlushStrategyParams::Manual,
            other => {
                return Err(ConfigError::Invalid { option: "ACCESS_FLUSH_STRATEGY".to_string(),
                                                  reason: format!("estrategia desconocida \"{other}\"") })
            }
        };
        let event_cache_capacity: usize = parse_var("ACCESS_EVENT_CACHE_CAPACITY", 5000)?;
        if event_cache_capacity == 0 {
            return Err(ConfigError::Invalid { option: "ACCESS_EVENT_CACHE_CAPACITY".to_string(),
                                              reason: "debe ser mayor que 0".to_string() });
        }
        Ok(NodeConfig { flush, event_cache_capacity })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_size_or_interval() {
        let config = NodeConfig::default();
        assert!(matches!(config.flush, FlushStrategyParams::SizeOrInterval(_)));
    }
}
