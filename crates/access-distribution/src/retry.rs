//! Política de reintentos con backoff exponencial acotado.
//!
//! Sólo se reintentan errores clasificados como transitorios; los
//! permanentes cortan de inmediato. La cancelación cooperativa se chequea
//! entre intentos (nunca a mitad de una llamada en vuelo).

use std::future::Future;
use std::time::Duration;

use log::warn;

use access_core::ErrorClass;

use crate::error::DistributionError;
use crate::router::CancellationFlag;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy { max_attempts: 3,
                      base_delay: Duration::from_millis(100),
                      multiplier: 2,
                      max_delay: Duration::from_secs(2) }
    }
}

impl RetryPolicy {
    /// Delay del intento `attempt` (1-based): base * multiplier^(attempt-1),
    /// acotado por `max_delay`.
    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Ejecuta `op` con reintentos. `label` identifica la llamada en logs.
    pub async fn run<T, F, Fut>(&self,
                                label: &str,
                                cancel: &CancellationFlag,
                                mut op: F)
                                -> Result<T, DistributionError>
        where F: FnMut() -> Fut,
              Fut: Future<Output = Result<T, DistributionError>>
    {
        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(DistributionError::Cancelled);
            }
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.class() == ErrorClass::Transient && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!("{label}: transient error (attempt {attempt}): {e}; retrying in {delay:?}");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn retries_transient_until_success() {
        let policy = RetryPolicy { base_delay: Duration::from_millis(1), ..RetryPolicy::default() };
        let calls = AtomicU32::new(0);
        let cancel = CancellationFlag::default();
        let result = policy.run("test", &cancel, || {
                                let n = calls.fetch_add(1, Ordering::SeqCst);
                                async move {
                                    if n < 2 {
                                        Err(DistributionError::Transport("flaky".into()))
                                    } else {
                                        Ok(42)
                                    }
                                }
                            })
                           .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_do_not_retry() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let cancel = CancellationFlag::default();
        let result: Result<(), _> = policy.run("test", &cancel, || {
                                                  calls.fetch_add(1, Ordering::SeqCst);
                                                  async {
                                                      Err(DistributionError::Remote { status: 404,
                                                                                      code: "NotFound".into(),
                                                                                      message: String::new(),
                                                                                      target: None })
                                                  }
                                              })
                                          .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_flag_short_circuits() {
        let policy = RetryPolicy::default();
        let cancel = CancellationFlag::default();
        cancel.cancel();
        let result: Result<(), _> = policy.run("test", &cancel, || async { Ok(()) }).await;
        assert!(matches!(result, Err(DistributionError::Cancelled)));
    }
}
