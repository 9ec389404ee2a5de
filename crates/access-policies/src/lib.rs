//! access-policies – Estrategias de flush del buffer de eventos
//!
//! Provee contratos y las implementaciones reconocidas (Size, Interval,
//! SizeOrInterval, Manual) para decidir cuándo drenar el buffer hacia el
//! persister de manera determinista y configurable.
//!
//! La decisión es pura: recibe el total encolado (que el buffer publica con
//! atómicos lock-free) y el tiempo transcurrido desde el último flush. El
//! worker que la consulta y ejecuta el flush vive en el nodo, no acá.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Parámetros de estrategia soportados.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "strategy", content = "params")]
pub enum FlushStrategyParams {
    Size(SizeParams),
    Interval(IntervalParams),
    SizeOrInterval(SizeOrIntervalParams),
    Manual,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SizeParams {
    pub threshold: u32,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct IntervalParams {
    pub period_ms: u32,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SizeOrIntervalParams {
    pub threshold: u32,
    pub period_ms: u32,
}

/// Contrato de las estrategias de flush.
pub trait FlushDecider: Send + Sync {
    /// Id estático de la estrategia, para logs y configuración.
    fn id(&self) -> &'static str;

    /// `true` si corresponde disparar un flush ahora.
    fn due(&self, buffered_total: usize, elapsed_since_flush: Duration) -> bool;

    /// Período sugerido de consulta para el worker. `None` para estrategias
    /// puramente manuales.
    fn poll_period(&self) -> Option<Duration>;
}

/// Dispara cuando el total encolado alcanza el umbral.
pub struct SizeDecider {
    threshold: usize,
}

impl FlushDecider for SizeDecider {
    fn id(&self) -> &'static str {
        "size"
    }

    fn due(&self, buffered_total: usize, _elapsed: Duration) -> bool {
        buffered_total >= self.threshold
    }

    fn poll_period(&self) -> Option<Duration> {
        Some(Duration::from_millis(50))
    }
}

/// Dispara cuando pasó el período configurado desde el último flush.
pub struct IntervalDecider {
    period: Duration,
}

impl FlushDecider for IntervalDecider {
    fn id(&self) -> &'static str {
        "interval"
    }

    fn due(&self, _buffered_total: usize, elapsed: Duration) -> bool {
        elapsed >= self.period
    }

    fn poll_period(&self) -> Option<Duration> {
        Some(self.period)
    }
}

/// Dispara cuando cualquiera de las dos condiciones se cumple.
pub struct SizeOrIntervalDecider {
    threshold: usize,
    period: Duration,
}

impl FlushDecider for SizeOrIntervalDecider {
    fn id(&self) -> &'static str {
        "sizeOrInterval"
    }

    fn due(&self, buffered_total: usize, elapsed: Duration) -> bool {
        buffered_total >= self.threshold || elapsed >= self.period
    }

    fn poll_period(&self) -> Option<Duration> {
        Some(self.period.min(Duration::from_millis(50)))
    }
}

/// Nunca dispara sola: el flush lo pide el operador o el shutdown.
pub struct ManualDecider;

impl FlushDecider for ManualDecider {
    fn id(&self) -> &'static str {
        "manual"
    }

    fn due(&self, _buffered_total: usize, _elapsed: Duration) -> bool {
        false
    }

    fn poll_period(&self) -> Option<Duration> {
        None
    }
}

/// Construye la estrategia concreta a partir de sus parámetros.
pub fn build_decider(params: &FlushStrategyParams) -> Box<dyn FlushDecider> {
    match params {
        FlushStrategyParams::Size(p) => Box::new(SizeDecider { threshold: p.threshold as usize }),
        FlushStrategyParams::Interval(p) => Box::new(IntervalDecider { period: Duration::from_millis(p.period_ms.into()) }),
        FlushStrategyParams::SizeOrInterval(p) => {
            Box::new(SizeOrIntervalDecider { threshold: p.threshold as usize,
                                             period: Duration::from_millis(p.period_ms.into()) })
        }
        FlushStrategyParams::Manual => Box::new(ManualDecider),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_triggers_on_threshold() {
        let decider = build_decider(&FlushStrategyParams::Size(SizeParams { threshold: 10 }));
        assert!(!decider.due(9, Duration::from_secs(3600)));
        assert!(decider.due(10, Duration::ZERO));
    }

    #[test]
    fn interval_triggers_on_elapsed() {
        let decider = build_decider(&FlushStrategyParams::Interval(IntervalParams { period_ms: 100 }));
        assert!(!decider.due(1_000_000, Duration::from_millis(99)));
        assert!(decider.due(0, Duration::from_millis(100)));
    }

    #[test]
    fn size_or_interval_triggers_on_either() {
        let params = FlushStrategyParams::SizeOrInterval(SizeOrIntervalParams { threshold: 5, period_ms: 200 });
        let decider = build_decider(&params);
        assert!(decider.due(5, Duration::ZERO));
        assert!(decider.due(0, Duration::from_millis(200)));
        assert!(!decider.due(4, Duration::from_millis(199)));
    }

    #[test]
    fn manual_never_triggers() {
        let decider = build_decider(&FlushStrategyParams::Manual);
        assert!(!decider.due(usize::MAX, Duration::from_secs(86_400)));
        assert!(decider.poll_period().is_none());
    }

    #[test]
    fn params_round_trip_as_tagged_json() {
        let params = FlushStrategyParams::SizeOrInterval(SizeOrIntervalParams { threshold: 100, period_ms: 500 });
        let json = serde_json::to_string(&params).unwrap();
        assert!(json.contains("\"strategy\":\"SizeOrInterval\""));
        let back: FlushStrategyParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }
}
