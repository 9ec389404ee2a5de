//! `AccessNode`: wiring de un nodo del motor.
//!
//! Ciclo de vida:
//! - Arranque: replay del log temporal (`load` con cutoff Now) hacia un
//!   manager dependency-free nuevo, que se instala en el buffer junto con
//!   la secuencia siguiente a la del último evento durable. Log vacío
//!   significa nodo nuevo, no error.
//! - Operación: las mutaciones entran por el buffer; el worker de flush
//!   consulta la estrategia con los contadores lock-free y drena hacia el
//!   log cuando corresponde, publicando cada lote en el cache de eventos.
//!   Tras una falla de persistencia el lote vuelve a las colas y el worker
//!   espera con backoff exponencial.
//! - Shutdown: el worker corta su loop y ejecuta un flush final síncrono.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{error, info, warn};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use access_core::{BufferError, StoredEvent, Stringifiers, ValidatedEventBuffer};
use access_persistence::temporal::load_fresh;
use access_persistence::{EventCache, LoadCutoff, PersistenceError, StateDigest, StorageDriver, TemporalEventLog};
use access_policies::{build_decider, FlushDecider};

use crate::config::NodeConfig;

/// Buffer del nodo: elementos en su forma string de protocolo.
pub type NodeBuffer = ValidatedEventBuffer<String, String, String, String>;

const FLUSH_BACKOFF_BASE: Duration = Duration::from_millis(200);
const FLUSH_BACKOFF_MAX: Duration = Duration::from_secs(10);

pub struct AccessNode<D: StorageDriver + 'static> {
    buffer: Arc<NodeBuffer>,
    log: Arc<TemporalEventLog<D>>,
    cache: Arc<EventCache>,
    decider: Arc<dyn FlushDecider>,
    shutdown: Arc<AtomicBool>,
    wake: Arc<Notify>,
    worker: Mutex<Option<JoinHandle<()>>>,
    started_from: Option<StateDigest>,
}

impl<D: StorageDriver + 'static> AccessNode<D> {
    /// Construye el nodo recargando estado desde el log. Debe llamarse
    /// dentro de un runtime tokio si la estrategia requiere worker.
    pub fn start(config: &NodeConfig, driver: D) -> Result<Arc<Self>, PersistenceError> {
        let log = Arc::new(TemporalEventLog::new(driver));
        let buffer = Arc::new(NodeBuffer::new(Stringifiers::for_strings()));
        let strs = Stringifiers::for_strings();

        let started_from = match load_fresh(&log, LoadCutoff::Now, &strs) {
            Ok((manager, digest)) => {
                buffer.install_manager(manager);
                buffer.set_next_sequence(digest.sequence + 1);
                info!("replayed temporal log up to sequence {}", digest.sequence);
                Some(digest)
            }
            Err(PersistenceError::Empty) => {
                info!("temporal log empty, starting fresh");
                None
            }
            Err(e) => return Err(e),
        };

        let node = Arc::new(AccessNode { buffer,
                                         log,
                                         cache: Arc::new(EventCache::new(config.event_cache_capacity)),
                                         decider: Arc::from(build_decider(&config.flush)),
                                         shutdown: Arc::new(AtomicBool::new(false)),
                                         wake: Arc::new(Notify::new()),
                                         worker: Mutex::new(None),
                                         started_from });
        node.spawn_flush_worker();
        Ok(node)
    }

    pub fn buffer(&self) -> &Arc<NodeBuffer> {
        &self.buffer
    }

    pub fn cache(&self) -> &Arc<EventCache> {
        &self.cache
    }

    pub fn temporal_log(&self) -> &Arc<TemporalEventLog<D>> {
        &self.log
    }

    /// Punto del log desde el que arrancó este nodo (`None` = log vacío).
    pub fn started_from(&self) -> Option<StateDigest> {
        self.started_from
    }

    /// Drena el buffer y persiste el lote. Devuelve la cantidad de eventos
    /// persistidos; ante una falla el lote vuelve al frente de sus colas.
    pub fn flush(&self) -> Result<usize, BufferError> {
        let batch = self.buffer.drain();
        if batch.is_empty() {
            return Ok(0);
        }
        let events: &[StoredEvent] = &batch.events;
        match self.log.persist(events) {
            Ok(()) => {
                self.cache.publish(&batch.events);
                Ok(batch.len())
            }
            Err(e) => {
                let cause = e.to_string();
                self.buffer.requeue(batch);
                Err(BufferError::PersistFailed { kind: "flush".to_string(), cause })
            }
        }
    }

    /// Worker cooperativo de la estrategia de flush. Las estrategias
    /// manuales no lo necesitan: el flush lo dispara el operador.
    fn spawn_flush_worker(self: &Arc<Self>) {
        let Some(poll) = self.decider.poll_period() else {
            return;
        };
        let node = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut last_flush = Instant::now();
            let mut failures: u32 = 0;
            loop {
                let wait = if failures == 0 {
                    poll
                } else {
                    (FLUSH_BACKOFF_BASE * 2u32.saturating_pow(failures - 1)).min(FLUSH_BACKOFF_MAX)
                };
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = node.wake.notified() => {}
                }
                if node.shutdown.load(Ordering::Acquire) {
                    break;
                }
                if node.decider.due(node.buffer.buffered_total(), last_flush.elapsed()) {
                    match node.flush() {
                        Ok(_) => {
                            failures = 0;
                            last_flush = Instant::now();
                        }
                        Err(e) => {
                            failures += 1;
                            warn!("flush failed ({failures} consecutive): {e}");
                        }
                    }
                }
            }
            // Flush final síncrono del shutdown.
            if let Err(e) = node.flush() {
                error!("final flush on shutdown failed: {e}");
            }
        });
        *self.worker.lock().expect("worker lock poisoned") = Some(handle);
    }

    /// Corta el worker y ejecuta el flush final. Idempotente.
    pub async fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.wake.notify_waiters();
        let handle = self.worker.lock().expect("worker lock poisoned").take();
        match handle {
            Some(handle) => {
                if let Err(e) = handle.await {
                    error!("flush worker ended abnormally: {e}");
                }
            }
            None => {
                // Estrategia manual: el flush final corre acá.
                if let Err(e) = self.flush() {
                    error!("final flush on shutdown failed: {e}");
                }
            }
        }
    }
}
