//! Router de shards: ruteo de eventos y primitivas de fan-out.
//!
//! Reglas de ruteo:
//! - Eventos que tocan un solo usuario van al shard User/Event de
//!   `hash(usuario)`; los de un solo grupo, al shard Group/Event; los de
//!   grupo-a-grupo, al shard GroupToGroup/Event del `from_group`.
//! - Los mapeos usuario-grupo se escriben en dos shards (User y Group):
//!   éxito sólo si ambos aplican; si aplica uno solo se emite un evento
//!   `Reconcile` compensatorio hacia el lado exitoso y el error original se
//!   propaga.
//! - Tipos de entidad y entidades se difunden a todos los shards
//!   Group/Event (las entidades son globales a los grupos).
//!
//! El mapa de shards es un snapshot copy-on-write: la reconfiguración lo
//! reemplaza atómicamente y las operaciones en vuelo terminan contra el
//! snapshot viejo.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use log::error;
use uuid::Uuid;

use access_core::hashing::fnv1a_32;
use access_core::{AccessEvent, AccessEventKind, EventHeader, StoredEvent};

use crate::client::{ClientFactory, ShardClient};
use crate::error::DistributionError;
use crate::retry::RetryPolicy;
use crate::shard::{DataElement, OperationType, ShardConfig, ShardConfigSet};

/// Token de cancelación cooperativo: se propaga a las tareas hijas de un
/// fan-out y se chequea entre llamadas RPC.
#[derive(Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

pub struct ShardRouter {
    config: RwLock<Arc<ShardConfigSet>>,
    factory: Arc<dyn ClientFactory>,
    retry: RetryPolicy,
    deadline: Duration,
}

impl ShardRouter {
    pub fn new(config: ShardConfigSet, factory: Arc<dyn ClientFactory>, retry: RetryPolicy, deadline: Duration) -> Self {
        ShardRouter { config: RwLock::new(Arc::new(config)), factory, retry, deadline }
    }

    /// Snapshot inmutable del mapa de shards vigente.
    pub fn snapshot(&self) -> Arc<ShardConfigSet> {
        self.config.read().expect("config lock poisoned").clone()
    }

    /// Reemplaza el mapa de shards de forma atómica.
    pub fn reconfigure(&self, config: ShardConfigSet) {
        *self.config.write().expect("config lock poisoned") = Arc::new(config);
    }

    pub fn client(&self, shard: &ShardConfig, operation: OperationType) -> Arc<dyn ShardClient> {
        self.factory.client_for(shard, operation)
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Envío de un evento a un shard concreto, con reintentos y la
    /// descripción del shard anotada en el error.
    async fn send_to(&self,
                     shard: &ShardConfig,
                     event: &StoredEvent,
                     cancel: &CancellationFlag)
                     -> Result<(), DistributionError> {
        let client = self.factory.client_for(shard, OperationType::Event);
        self.retry
            .run("send_event", cancel, || client.send_event(event))
            .await
            .map_err(|e| e.at_shard(shard.describe(true)))
    }

    /// Rutea un evento según su variante. El `hash_code` de la cabecera ya
    /// viene calculado sobre el elemento primario con el hash de ruteo.
    pub async fn route_event(&self, event: &StoredEvent) -> Result<(), DistributionError> {
        let config = self.snapshot();
        let cancel = CancellationFlag::default();
        let hash = event.header.hash_code;
        let routed = async {
            match &event.kind {
                AccessEventKind::User { .. }
                | AccessEventKind::UserToComponent { .. }
                | AccessEventKind::UserToEntity { .. }
                | AccessEventKind::Reconcile { .. } => {
                    let shard = config.shard_for(DataElement::User, OperationType::Event, hash)?;
                    self.send_to(shard, event, &cancel).await
                }
                AccessEventKind::Group { .. }
                | AccessEventKind::GroupToComponent { .. }
                | AccessEventKind::GroupToEntity { .. } => {
                    let shard = config.shard_for(DataElement::Group, OperationType::Event, hash)?;
                    self.send_to(shard, event, &cancel).await
                }
                AccessEventKind::GroupToGroup { .. } => {
                    let shard = config.shard_for(DataElement::GroupToGroup, OperationType::Event, hash)?;
                    self.send_to(shard, event, &cancel).await
                }
                AccessEventKind::UserToGroup { group, .. } => {
                    self.dual_write(&config, event, group, &cancel).await
                }
                AccessEventKind::EntityType { .. } | AccessEventKind::Entity { .. } => {
                    self.broadcast_to_group_shards(&config, event, &cancel).await
                }
            }
        };
        match tokio::time::timeout(self.deadline, routed).await {
            Ok(result) => result,
            Err(_) => {
                cancel.cancel();
                Err(DistributionError::Timeout { shard_id: format!("event {}", event.kind.name()) })
            }
        }
    }

    /// Escritura dual usuario-grupo: dos fases (enviar ambos, esperar
    /// ambos). Si un solo lado falla, el lado exitoso recibe un `Reconcile`
    /// compensatorio en segundo plano y el error del lado fallido se
    /// propaga.
    async fn dual_write(&self,
                        config: &ShardConfigSet,
                        event: &StoredEvent,
                        group: &str,
                        cancel: &CancellationFlag)
                        -> Result<(), DistributionError> {
        let user_shard = config.shard_for(DataElement::User, OperationType::Event, event.header.hash_code)?.clone();
        let group_shard = config.shard_for(DataElement::Group, OperationType::Event, fnv1a_32(group))?.clone();
        let (user_result, group_result) = tokio::join!(self.send_to(&user_shard, event, cancel),
                                                       self.send_to(&group_shard, event, cancel));
        match (user_result, group_result) {
            (Ok(()), Ok(())) => Ok(()),
            (Ok(()), Err(e)) => {
                self.spawn_reconcile(&user_shard, event);
                Err(e)
            }
            (Err(e), Ok(())) => {
                self.spawn_reconcile(&group_shard, event);
                Err(e)
            }
            (Err(e), Err(_)) => Err(e),
        }
    }

    /// Emite la compensación hacia el shard que sí aplicó: el mismo mapeo
    /// usuario-grupo con la acción inversa, como evento `Reconcile`. La
    /// recuperación corre en segundo plano; una falla se reporta por log y
    /// queda para reconciliación externa.
    fn spawn_reconcile(&self, target: &ShardConfig, original: &StoredEvent) {
        let AccessEventKind::UserToGroup { user, group } = &original.kind else {
            return;
        };
        let reconcile: StoredEvent =
            AccessEvent { header: EventHeader { event_id: Uuid::new_v4(),
                                                action: original.header.action.inverse(),
                                                occurred_at: Utc::now(),
                                                hash_code: original.header.hash_code,
                                                sequence: 0 },
                          kind: AccessEventKind::Reconcile { user: user.clone(), group: group.clone() } };
        let client = self.factory.client_for(target, OperationType::Event);
        let shard_id = target.describe(true);
        tokio::spawn(async move {
            if let Err(e) = client.send_event(&reconcile).await {
                error!("reconcile toward {shard_id} failed: {e}");
            }
        });
    }

    async fn broadcast_to_group_shards(&self,
                                       config: &ShardConfigSet,
                                       event: &StoredEvent,
                                       cancel: &CancellationFlag)
                                       -> Result<(), DistributionError> {
        let shards = config.shards(DataElement::Group, OperationType::Event)?;
        let mut pending = FuturesUnordered::new();
        for shard in shards {
            pending.push(self.send_to(shard, event, cancel));
        }
        while let Some(result) = pending.next().await {
            if let Err(e) = result {
                cancel.cancel();
                return Err(e);
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Primitivas de fan-out para consultas distribuidas
    // ------------------------------------------------------------------

    /// Ejecuta las llamadas concurrentemente y junta todos los resultados.
    /// Un error permanente cancela el grupo y se propaga; el deadline
    /// global convierte la espera en `Timeout`.
    pub async fn fan_out_collect<T>(&self,
                                    label: &str,
                                    calls: Vec<BoxFuture<'_, Result<T, DistributionError>>>,
                                    cancel: &CancellationFlag)
                                    -> Result<Vec<T>, DistributionError> {
        let mut pending: FuturesUnordered<_> = calls.into_iter().collect();
        let gather = async {
            let mut results = Vec::new();
            while let Some(result) = pending.next().await {
                match result {
                    Ok(value) => results.push(value),
                    Err(e) => {
                        cancel.cancel();
                        return Err(e);
                    }
                }
            }
            Ok(results)
        };
        match tokio::time::timeout(self.deadline, gather).await {
            Ok(result) => result,
            Err(_) => {
                cancel.cancel();
                Err(DistributionError::Timeout { shard_id: label.to_string() })
            }
        }
    }

    /// Variante corto-circuito: devuelve `true` apenas una llamada lo
    /// responda, cancelando el resto del grupo.
    pub async fn fan_out_any(&self,
                             label: &str,
                             calls: Vec<BoxFuture<'_, Result<bool, DistributionError>>>,
                             cancel: &CancellationFlag)
                             -> Result<bool, DistributionError> {
        let mut pending: FuturesUnordered<_> = calls.into_iter().collect();
        let gather = async {
            while let Some(result) = pending.next().await {
                match result {
                    Ok(true) => {
                        cancel.cancel();
                        return Ok(true);
                    }
                    Ok(false) => {}
                    Err(e) => {
                        cancel.cancel();
                        return Err(e);
                    }
                }
            }
            Ok(false)
        };
        match tokio::time::timeout(self.deadline, gather).await {
            Ok(result) => result,
            Err(_) => {
                cancel.cancel();
                Err(DistributionError::Timeout { shard_id: label.to_string() })
            }
        }
    }
}
