//! `ValidatedEventBuffer`: el punto de entrada de toda mutación.
//!
//! Disciplina de locks (contrato crítico):
//! 1. Un lock por cola más un lock de secuencia.
//! 2. Para encolar un evento se toman los locks de las colas referenciadas
//!    y la propia, en el orden global de `EventQueueKind::ORDER`, y recién
//!    después el lock de secuencia, el tiempo justo para asignar número y
//!    timestamp. Así un evento de arista nunca puede quedar con secuencia
//!    menor que la de un prerequisito encolado concurrentemente.
//! 3. El pre-chequeo (payload y ciclos) corre antes de consumir secuencia,
//!    bajo los mismos locks, para que las secuencias aceptadas sean
//!    contiguas desde 0.
//! 4. `drain` toma la foto de `max_sequence` bajo el lock de secuencia y
//!    luego drena cola por cola; los eventos con secuencia mayor quedan
//!    para el próximo flush.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use access_domain::Element;

use crate::constants::{EVENT_QUEUE_COUNT, INITIAL_SEQUENCE};
use crate::errors::{BufferError, GraphError};
use crate::event::pipeline::validate_payload;
use crate::event::{AccessEvent, AccessEventKind, EventAction, EventHeader, EventStage, EventValidator, MetricLogger,
                   Stringifiers};
use crate::manager::DependencyFreeAccessManager;

use super::kind::EventQueueKind;

/// Lote drenado listo para el persister, ordenado por secuencia.
pub struct DrainedBatch<U, G, K, A> {
    pub max_sequence: i64,
    pub events: Vec<AccessEvent<U, G, K, A>>,
}

impl<U, G, K, A> DrainedBatch<U, G, K, A> {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

pub struct ValidatedEventBuffer<U: Element, G: Element, K: Element, A: Element> {
    manager: RwLock<DependencyFreeAccessManager<U, G, K, A>>,
    queues: [Mutex<VecDeque<AccessEvent<U, G, K, A>>>; EVENT_QUEUE_COUNT],
    counts: [AtomicUsize; EVENT_QUEUE_COUNT],
    sequence: Mutex<i64>,
    stringifiers: Stringifiers<U, G, K, A>,
    stages: Mutex<Vec<Box<dyn EventStage<U, G, K, A>>>>,
}

impl<U: Element, G: Element, K: Element, A: Element> ValidatedEventBuffer<U, G, K, A> {
    pub fn new(stringifiers: Stringifiers<U, G, K, A>) -> Self {
        ValidatedEventBuffer { manager: RwLock::new(DependencyFreeAccessManager::new()),
                               queues: std::array::from_fn(|_| Mutex::new(VecDeque::new())),
                               counts: std::array::from_fn(|_| AtomicUsize::new(0)),
                               sequence: Mutex::new(INITIAL_SEQUENCE),
                               stringifiers,
                               stages: Mutex::new(vec![Box::new(EventValidator::new()), Box::new(MetricLogger::new())]) }
    }

    /// Acceso de lectura al manager para consultas (multi-lector).
    pub fn read_manager(&self) -> RwLockReadGuard<'_, DependencyFreeAccessManager<U, G, K, A>> {
        self.manager.read().expect("manager lock poisoned")
    }

    /// Próxima secuencia a asignar. La usa el arranque para continuar el log
    /// donde lo dejó el replay.
    pub fn next_sequence(&self) -> i64 {
        *self.sequence.lock().expect("sequence lock poisoned")
    }

    /// Fija la próxima secuencia. Sólo tiene sentido en el arranque, antes
    /// de aceptar mutaciones.
    pub fn set_next_sequence(&self, next: i64) {
        *self.sequence.lock().expect("sequence lock poisoned") = next;
    }

    /// Reemplaza el manager completo con el estado reconstruido por replay.
    pub fn install_manager(&self, manager: DependencyFreeAccessManager<U, G, K, A>) {
        *self.manager.write().expect("manager lock poisoned") = manager;
    }

    // ------------------------------------------------------------------
    // Contadores publicados (lock-free) para la estrategia de flush
    // ------------------------------------------------------------------

    pub fn buffered_count(&self, kind: EventQueueKind) -> usize {
        self.counts[kind.index()].load(Ordering::Acquire)
    }

    pub fn buffered_total(&self) -> usize {
        self.counts.iter().map(|c| c.load(Ordering::Acquire)).sum()
    }

    // ------------------------------------------------------------------
    // Encolado
    // ------------------------------------------------------------------

    /// Colas a bloquear para una mutación: los tipos de los prerequisitos
    /// posibles más la cola propia, ya en orden global. Las bajas sólo
    /// bloquean su propia cola.
    fn lock_set(action: EventAction, kind: &AccessEventKind<U, G, K, A>) -> Vec<EventQueueKind> {
        let own = EventQueueKind::for_event(kind);
        if action == EventAction::Remove {
            return vec![own];
        }
        let mut kinds = match kind {
            AccessEventKind::UserToGroup { .. } | AccessEventKind::Reconcile { .. } => {
                vec![EventQueueKind::User, EventQueueKind::Group]
            }
            AccessEventKind::GroupToGroup { .. } => vec![EventQueueKind::Group],
            AccessEventKind::UserToComponent { .. } => vec![EventQueueKind::User],
            AccessEventKind::GroupToComponent { .. } => vec![EventQueueKind::Group],
            AccessEventKind::Entity { .. } => vec![EventQueueKind::EntityType],
            AccessEventKind::UserToEntity { .. } => {
                vec![EventQueueKind::User, EventQueueKind::EntityType, EventQueueKind::Entity]
            }
            AccessEventKind::GroupToEntity { .. } => {
                vec![EventQueueKind::Group, EventQueueKind::EntityType, EventQueueKind::Entity]
            }
            _ => Vec::new(),
        };
        kinds.push(own);
        kinds.sort();
        kinds.dedup();
        kinds
    }

    /// Encola una mutación arbitraria. Devuelve la secuencia asignada al
    /// evento principal (los prerequisitos sintetizados reciben secuencias
    /// menores dentro de la misma sección crítica).
    pub fn enqueue(&self, action: EventAction, kind: AccessEventKind<U, G, K, A>) -> Result<i64, BufferError> {
        let lock_kinds = Self::lock_set(action, &kind);
        debug_assert!(lock_kinds.windows(2).all(|w| w[0] < w[1]), "orden global de locks");
        let mut guards: Vec<(usize, MutexGuard<'_, VecDeque<AccessEvent<U, G, K, A>>>)> =
            lock_kinds.iter()
                      .map(|k| (k.index(), self.queues[k.index()].lock().expect("queue lock poisoned")))
                      .collect();

        // Pre-chequeo bajo locks, antes de consumir secuencia: payload y
        // ciclos. Un rechazo acá no deja rastro en colas ni en el grafo.
        validate_payload(&kind)?;
        let prerequisites = {
            let manager = self.read_manager();
            if action == EventAction::Add {
                if let AccessEventKind::GroupToGroup { from_group, to_group } = &kind {
                    if manager.graph().would_close_cycle(from_group, to_group) {
                        let display = |g: &G| format!("{g:?}").trim_matches('"').to_string();
                        return Err(BufferError::Graph(GraphError::CycleDetected { from: display(from_group),
                                                                                  to: display(to_group) }));
                    }
                }
            }
            manager.missing_prerequisites(action, &kind)
        };

        // Lock de secuencia: asignar números y timestamp, nada más.
        let mut events: Vec<AccessEvent<U, G, K, A>> = Vec::with_capacity(prerequisites.len() + 1);
        {
            let mut sequence = self.sequence.lock().expect("sequence lock poisoned");
            let occurred_at = Utc::now();
            for prerequisite in prerequisites {
                let prereq_kind = prerequisite.into_event_kind();
                events.push(self.make_event(EventAction::Add, prereq_kind, *sequence, occurred_at));
                *sequence += 1;
            }
            events.push(self.make_event(action, kind, *sequence, occurred_at));
            *sequence += 1;
        }

        // Pipeline de etapas: validación → métricas.
        {
            let mut stages = self.stages.lock().expect("stages lock poisoned");
            for event in &events {
                for stage in stages.iter_mut() {
                    stage.process(event)?;
                }
            }
        }

        // Aplicar al manager y encolar. Los prerequisitos van primero, cada
        // uno a su propia cola (cuyo lock ya tenemos).
        let main_sequence = events.last().expect("at least one event").header.sequence;
        let mut manager = self.manager.write().expect("manager lock poisoned");
        for event in events {
            manager.apply_event(event.header.action, &event.kind)?;
            let queue_kind = EventQueueKind::for_event(&event.kind);
            let slot = guards.iter_mut()
                             .find(|(index, _)| *index == queue_kind.index())
                             .expect("cola del evento dentro del lock set");
            slot.1.push_back(event);
            self.counts[queue_kind.index()].store(slot.1.len(), Ordering::Release);
        }
        Ok(main_sequence)
    }

    fn make_event(&self,
                  action: EventAction,
                  kind: AccessEventKind<U, G, K, A>,
                  sequence: i64,
                  occurred_at: DateTime<Utc>)
                  -> AccessEvent<U, G, K, A> {
        let hash_code = self.stringifiers.hash_code(&kind);
        AccessEvent { header: EventHeader { event_id: Uuid::new_v4(), action, occurred_at, hash_code, sequence },
                      kind }
    }

    // ------------------------------------------------------------------
    // Protocolo de flush
    // ------------------------------------------------------------------

    /// Drena todos los eventos con secuencia ≤ a la foto tomada bajo el lock
    /// de secuencia. El lote sale ordenado por secuencia a través de todos
    /// los tipos; los eventos posteriores quedan encolados para el próximo
    /// flush.
    pub fn drain(&self) -> DrainedBatch<U, G, K, A> {
        let max_sequence = {
            let sequence = self.sequence.lock().expect("sequence lock poisoned");
            *sequence - 1
        };
        let mut drained: Vec<AccessEvent<U, G, K, A>> = Vec::new();
        for queue_kind in EventQueueKind::ORDER {
            let mut queue = self.queues[queue_kind.index()].lock().expect("queue lock poisoned");
            let keep_from = queue.iter()
                                 .position(|e| e.header.sequence > max_sequence)
                                 .unwrap_or(queue.len());
            drained.extend(queue.drain(..keep_from));
            self.counts[queue_kind.index()].store(queue.len(), Ordering::Release);
        }
        drained.sort_unstable_by_key(|e| e.header.sequence);
        DrainedBatch { max_sequence, events: drained }
    }

    /// Devuelve un lote al frente de sus colas preservando el orden, tras
    /// una falla del persister.
    pub fn requeue(&self, batch: DrainedBatch<U, G, K, A>) {
        let mut per_kind: [Vec<AccessEvent<U, G, K, A>>; EVENT_QUEUE_COUNT] = std::array::from_fn(|_| Vec::new());
        for event in batch.events {
            per_kind[EventQueueKind::for_event(&event.kind).index()].push(event);
        }
        for (index, events) in per_kind.into_iter().enumerate() {
            if events.is_empty() {
                continue;
            }
            let mut queue = self.queues[index].lock().expect("queue lock poisoned");
            for event in events.into_iter().rev() {
                queue.push_front(event);
            }
            self.counts[index].store(queue.len(), Ordering::Release);
        }
    }

    // ------------------------------------------------------------------
    // Operaciones con la firma del dominio
    // ------------------------------------------------------------------

    pub fn add_user(&self, user: U) -> Result<i64, BufferError> {
        self.enqueue(EventAction::Add, AccessEventKind::User { user })
    }

    pub fn remove_user(&self, user: U) -> Result<i64, BufferError> {
        self.enqueue(EventAction::Remove, AccessEventKind::User { user })
    }

    pub fn add_group(&self, group: G) -> Result<i64, BufferError> {
        self.enqueue(EventAction::Add, AccessEventKind::Group { group })
    }

    pub fn remove_group(&self, group: G) -> Result<i64, BufferError> {
        self.enqueue(EventAction::Remove, AccessEventKind::Group { group })
    }

    pub fn add_user_to_group(&self, user: U, group: G) -> Result<i64, BufferError> {
        self.enqueue(EventAction::Add, AccessEventKind::UserToGroup { user, group })
    }

    pub fn remove_user_to_group(&self, user: U, group: G) -> Result<i64, BufferError> {
        self.enqueue(EventAction::Remove, AccessEventKind::UserToGroup { user, group })
    }

    pub fn add_group_to_group(&self, from_group: G, to_group: G) -> Result<i64, BufferError> {
        self.enqueue(EventAction::Add, AccessEventKind::GroupToGroup { from_group, to_group })
    }

    pub fn remove_group_to_group(&self, from_group: G, to_group: G) -> Result<i64, BufferError> {
        self.enqueue(EventAction::Remove, AccessEventKind::GroupToGroup { from_group, to_group })
    }

    pub fn add_user_to_component(&self, user: U, component: K, access: A) -> Result<i64, BufferError> {
        self.enqueue(EventAction::Add, AccessEventKind::UserToComponent { user, component, access })
    }

    pub fn remove_user_to_component(&self, user: U, component: K, access: A) -> Result<i64, BufferError> {
        self.enqueue(EventAction::Remove, AccessEventKind::UserToComponent { user, component, access })
    }

    pub fn add_group_to_component(&self, group: G, component: K, access: A) -> Result<i64, BufferError> {
        self.enqueue(EventAction::Add, AccessEventKind::GroupToComponent { group, component, access })
    }

    pub fn remove_group_to_component(&self, group: G, component: K, access: A) -> Result<i64, BufferError> {
        self.enqueue(EventAction::Remove, AccessEventKind::GroupToComponent { group, component, access })
    }

    pub fn add_entity_type(&self, entity_type: &str) -> Result<i64, BufferError> {
        self.enqueue(EventAction::Add, AccessEventKind::EntityType { entity_type: entity_type.to_string() })
    }

    pub fn remove_entity_type(&self, entity_type: &str) -> Result<i64, BufferError> {
        self.enqueue(EventAction::Remove, AccessEventKind::EntityType { entity_type: entity_type.to_string() })
    }

    pub fn add_entity(&self, entity_type: &str, entity: &str) -> Result<i64, BufferError> {
        self.enqueue(EventAction::Add,
                     AccessEventKind::Entity { entity_type: entity_type.to_string(), entity: entity.to_string() })
    }

    pub fn remove_entity(&self, entity_type: &str, entity: &str) -> Result<i64, BufferError> {
        self.enqueue(EventAction::Remove,
                     AccessEventKind::Entity { entity_type: entity_type.to_string(), entity: entity.to_string() })
    }

    pub fn add_user_to_entity(&self, user: U, entity_type: &str, entity: &str) -> Result<i64, BufferError> {
        self.enqueue(EventAction::Add,
                     AccessEventKind::UserToEntity { user,
                                                     entity_type: entity_type.to_string(),
                                                     entity: entity.to_string() })
    }

    pub fn remove_user_to_entity(&self, user: U, entity_type: &str, entity: &str) -> Result<i64, BufferError> {
        self.enqueue(EventAction::Remove,
                     AccessEventKind::UserToEntity { user,
                                                     entity_type: entity_type.to_string(),
                                                     entity: entity.to_string() })
    }

    pub fn add_group_to_entity(&self, group: G, entity_type: &str, entity: &str) -> Result<i64, BufferError> {
        self.enqueue(EventAction::Add,
                     AccessEventKind::GroupToEntity { group,
                                                      entity_type: entity_type.to_string(),
                                                      entity: entity.to_string() })
    }

    pub fn remove_group_to_entity(&self, group: G, entity_type: &str, entity: &str) -> Result<i64, BufferError> {
        self.enqueue(EventAction::Remove,
                     AccessEventKind::GroupToEntity { group,
                                                      entity_type: entity_type.to_string(),
                                                      entity: entity.to_string() })
    }
}
