//! Envoltorio del grafo que hace toda mutación idempotente y
//! auto-suficiente.
//!
//! Reglas:
//! - Si una mutación referencia un prerequisito ausente, el manager lo crea
//!   primero (usuario antes que grupo; usuario, tipo de entidad y entidad en
//!   ese orden para permisos sobre entidades).
//! - Toda alta sobre un elemento ya existente se acepta en silencio; toda
//!   baja sobre un elemento ausente también. Este contrato difiere a
//!   propósito del grafo directo, que señala `IdempotentAdd` /
//!   `IdempotentRemove`: los nodos de shard toleran replays y entregas fuera
//!   de orden pasando por el manager, mientras el grafo conserva la señal
//!   para quien la necesite.
//! - `CycleDetected` no es idempotencia y se propaga siempre.
//!
//! El buffer consulta `missing_prerequisites` antes de aplicar para poder
//! encolar los eventos sintetizados con secuencias menores que la del evento
//! dependiente.

use access_domain::Element;

use crate::errors::GraphError;
use crate::event::{AccessEventKind, EventAction};
use crate::graph::AccessGraph;

/// Prerequisito sintetizado por el manager, en orden de creación.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prerequisite<U, G> {
    User(U),
    Group(G),
    EntityType(String),
    Entity(String, String),
}

impl<U, G> Prerequisite<U, G> {
    /// Evento de alta equivalente, para que el buffer lo encole antes del
    /// evento dependiente.
    pub fn into_event_kind<K, A>(self) -> AccessEventKind<U, G, K, A> {
        match self {
            Prerequisite::User(user) => AccessEventKind::User { user },
            Prerequisite::Group(group) => AccessEventKind::Group { group },
            Prerequisite::EntityType(entity_type) => AccessEventKind::EntityType { entity_type },
            Prerequisite::Entity(entity_type, entity) => AccessEventKind::Entity { entity_type, entity },
        }
    }
}

pub struct DependencyFreeAccessManager<U: Element, G: Element, K: Element, A: Element> {
    graph: AccessGraph<U, G, K, A>,
}

impl<U: Element, G: Element, K: Element, A: Element> Default for DependencyFreeAccessManager<U, G, K, A> {
    fn default() -> Self {
        DependencyFreeAccessManager { graph: AccessGraph::new() }
    }
}

fn swallow_add(result: Result<(), GraphError>) -> Result<(), GraphError> {
    match result {
        Err(GraphError::IdempotentAdd { .. }) => Ok(()),
        other => other,
    }
}

fn swallow_remove(result: Result<(), GraphError>) -> Result<(), GraphError> {
    match result {
        Err(GraphError::IdempotentRemove { .. }) => Ok(()),
        other => other,
    }
}

impl<U: Element, G: Element, K: Element, A: Element> DependencyFreeAccessManager<U, G, K, A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Vista de sólo lectura del grafo para consultas.
    pub fn graph(&self) -> &AccessGraph<U, G, K, A> {
        &self.graph
    }

    /// Prerequisitos que `apply_event` sintetizaría para esta mutación, en
    /// el orden en que se crearían. Las bajas nunca sintetizan.
    pub fn missing_prerequisites(&self, action: EventAction, kind: &AccessEventKind<U, G, K, A>) -> Vec<Prerequisite<U, G>> {
        if action == EventAction::Remove {
            return Vec::new();
        }
        let mut missing = Vec::new();
        let need_user = |graph: &AccessGraph<U, G, K, A>, missing: &mut Vec<Prerequisite<U, G>>, user: &U| {
            if !graph.contains_user(user) {
                missing.push(Prerequisite::User(user.clone()));
            }
        };
        let need_group = |graph: &AccessGraph<U, G, K, A>, missing: &mut Vec<Prerequisite<U, G>>, group: &G| {
            if !graph.contains_group(group) {
                missing.push(Prerequisite::Group(group.clone()));
            }
        };
        let need_entity = |graph: &AccessGraph<U, G, K, A>,
                           missing: &mut Vec<Prerequisite<U, G>>,
                           entity_type: &str,
                           entity: &str| {
            if !graph.contains_entity_type(entity_type) {
                missing.push(Prerequisite::EntityType(entity_type.to_string()));
            }
            if !graph.contains_entity(entity_type, entity) {
                missing.push(Prerequisite::Entity(entity_type.to_string(), entity.to_string()));
            }
        };
        match kind {
            AccessEventKind::User { .. }
            | AccessEventKind::Group { .. }
            | AccessEventKind::EntityType { .. } => {}
            AccessEventKind::Entity { entity_type, .. } => {
                if !self.graph.contains_entity_type(entity_type) {
                    missing.push(Prerequisite::EntityType(entity_type.clone()));
                }
            }
            AccessEventKind::UserToGroup { user, group } | AccessEventKind::Reconcile { user, group } => {
                need_user(&self.graph, &mut missing, user);
                need_group(&self.graph, &mut missing, group);
            }
            AccessEventKind::GroupToGroup { from_group, to_group } => {
                need_group(&self.graph, &mut missing, from_group);
                need_group(&self.graph, &mut missing, to_group);
            }
            AccessEventKind::UserToComponent { user, .. } => need_user(&self.graph, &mut missing, user),
            AccessEventKind::GroupToComponent { group, .. } => need_group(&self.graph, &mut missing, group),
            AccessEventKind::UserToEntity { user, entity_type, entity } => {
                need_user(&self.graph, &mut missing, user);
                need_entity(&self.graph, &mut missing, entity_type, entity);
            }
            AccessEventKind::GroupToEntity { group, entity_type, entity } => {
                need_group(&self.graph, &mut missing, group);
                need_entity(&self.graph, &mut missing, entity_type, entity);
            }
        }
        missing
    }

    /// Aplica una mutación en modo dependency-free: crea prerequisitos
    /// ausentes, absorbe los errores idempotentes y propaga el resto.
    pub fn apply_event(&mut self, action: EventAction, kind: &AccessEventKind<U, G, K, A>) -> Result<(), GraphError> {
        if action == EventAction::Add {
            for prerequisite in self.missing_prerequisites(action, kind) {
                match prerequisite {
                    Prerequisite::User(user) => swallow_add(self.graph.add_user(user))?,
                    Prerequisite::Group(group) => swallow_add(self.graph.add_group(group))?,
                    Prerequisite::EntityType(t) => swallow_add(self.graph.add_entity_type(&t))?,
                    Prerequisite::Entity(t, e) => swallow_add(self.graph.add_entity(&t, &e))?,
                }
            }
        }
        match (action, kind) {
            (EventAction::Add, AccessEventKind::User { user }) => swallow_add(self.graph.add_user(user.clone())),
            (EventAction::Remove, AccessEventKind::User { user }) => swallow_remove(self.graph.remove_user(user)),
            (EventAction::Add, AccessEventKind::Group { group }) => swallow_add(self.graph.add_group(group.clone())),
            (EventAction::Remove, AccessEventKind::Group { group }) => swallow_remove(self.graph.remove_group(group)),
            (EventAction::Add, AccessEventKind::UserToGroup { user, group })
            | (EventAction::Add, AccessEventKind::Reconcile { user, group }) => {
                swallow_add(self.graph.add_user_to_group(user, group))
            }
            (EventAction::Remove, AccessEventKind::UserToGroup { user, group })
            | (EventAction::Remove, AccessEventKind::Reconcile { user, group }) => {
                swallow_remove(self.graph.remove_user_to_group(user, group))
            }
            (EventAction::Add, AccessEventKind::GroupToGroup { from_group, to_group }) => {
                swallow_add(self.graph.add_group_to_group(from_group, to_group))
            }
            (EventAction::Remove, AccessEventKind::GroupToGroup { from_group, to_group }) => {
                swallow_remove(self.graph.remove_group_to_group(from_group, to_group))
            }
            (EventAction::Add, AccessEventKind::UserToComponent { user, component, access }) => {
                swallow_add(self.graph.add_user_to_component(user, component, access))
            }
            (EventAction::Remove, AccessEventKind::UserToComponent { user, component, access }) => {
                swallow_remove(self.graph.remove_user_to_component(user, component, access))
            }
            (EventAction::Add, AccessEventKind::GroupToComponent { group, component, access }) => {
                swallow_add(self.graph.add_group_to_component(group, component, access))
            }
            (EventAction::Remove, AccessEventKind::GroupToComponent { group, component, access }) => {
                swallow_remove(self.graph.remove_group_to_component(group, component, access))
            }
            (EventAction::Add, AccessEventKind::EntityType { entity_type }) => {
                swallow_add(self.graph.add_entity_type(entity_type))
            }
            (EventAction::Remove, AccessEventKind::EntityType { entity_type }) => {
                swallow_remove(self.graph.remove_entity_type(entity_type))
            }
            (EventAction::Add, AccessEventKind::Entity { entity_type, entity }) => {
                swallow_add(self.graph.add_entity(entity_type, entity))
            }
            (EventAction::Remove, AccessEventKind::Entity { entity_type, entity }) => {
                swallow_remove(self.graph.remove_entity(entity_type, entity))
            }
            (EventAction::Add, AccessEventKind::UserToEntity { user, entity_type, entity }) => {
                swallow_add(self.graph.add_user_to_entity(user, entity_type, entity))
            }
            (EventAction::Remove, AccessEventKind::UserToEntity { user, entity_type, entity }) => {
                swallow_remove(self.graph.remove_user_to_entity(user, entity_type, entity))
            }
            (EventAction::Add, AccessEventKind::GroupToEntity { group, entity_type, entity }) => {
                swallow_add(self.graph.add_group_to_entity(group, entity_type, entity))
            }
            (EventAction::Remove, AccessEventKind::GroupToEntity { group, entity_type, entity }) => {
                swallow_remove(self.graph.remove_group_to_entity(group, entity_type, entity))
            }
        }
    }

    // ------------------------------------------------------------------
    // Conveniencias con la firma de las operaciones del grafo
    // ------------------------------------------------------------------

    pub fn add_user(&mut self, user: U) -> Result<(), GraphError> {
        self.apply_event(EventAction::Add, &AccessEventKind::User { user })
    }

    pub fn remove_user(&mut self, user: U) -> Result<(), GraphError> {
        self.apply_event(EventAction::Remove, &AccessEventKind::User { user })
    }

    pub fn add_group(&mut self, group: G) -> Result<(), GraphError> {
        self.apply_event(EventAction::Add, &AccessEventKind::Group { group })
    }

    pub fn remove_group(&mut self, group: G) -> Result<(), GraphError> {
        self.apply_event(EventAction::Remove, &AccessEventKind::Group { group })
    }

    pub fn add_user_to_group(&mut self, user: U, group: G) -> Result<(), GraphError> {
        self.apply_event(EventAction::Add, &AccessEventKind::UserToGroup { user, group })
    }

    pub fn remove_user_to_group(&mut self, user: U, group: G) -> Result<(), GraphError> {
        self.apply_event(EventAction::Remove, &AccessEventKind::UserToGroup { user, group })
    }

    pub fn add_group_to_group(&mut self, from_group: G, to_group: G) -> Result<(), GraphError> {
        self.apply_event(EventAction::Add, &AccessEventKind::GroupToGroup { from_group, to_group })
    }

    pub fn remove_group_to_group(&mut self, from_group: G, to_group: G) -> Result<(), GraphError> {
        self.apply_event(EventAction::Remove, &AccessEventKind::GroupToGroup { from_group, to_group })
    }

    pub fn add_user_to_entity(&mut self, user: U, entity_type: &str, entity: &str) -> Result<(), GraphError> {
        self.apply_event(EventAction::Add,
                         &AccessEventKind::UserToEntity { user,
                                                          entity_type: entity_type.to_string(),
                                                          entity: entity.to_string() })
    }

    pub fn remove_user_to_entity(&mut self, user: U, entity_type: &str, entity: &str) -> Result<(), GraphError> {
        self.apply_event(EventAction::Remove,
                         &AccessEventKind::UserToEntity { user,
                                                          entity_type: entity_type.to_string(),
                                                          entity: entity.to_string() })
    }
}
