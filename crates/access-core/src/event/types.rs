//! Tipos de evento y cabecera compartida.
//!
//! Invariantes:
//! - `sequence` es estrictamente creciente por instancia del motor y lo
//!   asigna el buffer bajo el lock de secuencia; un evento existe desde que
//!   tiene secuencia.
//! - `hash_code` se calcula sobre la forma string del elemento primario con
//!   el mismo FNV-1a de 32 bits que usa el ruteo por rangos; grabarlo en el
//!   evento permite re-rutear replays sin re-stringificar.
//! - `occurred_at` se estampa desde la fuente de tiempo bajo el lock de
//!   secuencia, por lo que crece junto con `sequence`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use access_domain::{ElementStringifier, StringStringifier};

use crate::hashing::fnv1a_32;

/// Acción de una mutación: alta o baja del elemento o mapeo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventAction {
    Add,
    Remove,
}

impl EventAction {
    /// Acción inversa, usada por la compensación de escrituras duales.
    pub fn inverse(self) -> Self {
        match self {
            EventAction::Add => EventAction::Remove,
            EventAction::Remove => EventAction::Add,
        }
    }

    /// Discriminador de un byte para el codec binario (0=Add, 1=Remove).
    pub fn as_u8(self) -> u8 {
        match self {
            EventAction::Add => 0,
            EventAction::Remove => 1,
        }
    }
}

/// Cabecera común a todas las variantes de evento.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventHeader {
    pub event_id: Uuid,
    pub action: EventAction,
    pub occurred_at: DateTime<Utc>,
    pub hash_code: i32,
    pub sequence: i64,
}

/// Payload etiquetado: una variante por familia de mutación.
///
/// Las variantes llevan sólo sus campos de payload; la identidad, acción y
/// orden viven en la cabecera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum AccessEventKind<U, G, K, A> {
    User { user: U },
    Group { group: G },
    UserToGroup { user: U, group: G },
    GroupToGroup { from_group: G, to_group: G },
    UserToComponent { user: U, component: K, access: A },
    GroupToComponent { group: G, component: K, access: A },
    EntityType { entity_type: String },
    Entity { entity_type: String, entity: String },
    UserToEntity { user: U, entity_type: String, entity: String },
    GroupToEntity { group: G, entity_type: String, entity: String },
    /// Compensación de una escritura dual parcialmente fallida: revierte (o
    /// re-aplica) el mapeo usuario-grupo en el lado que sí tuvo éxito. La
    /// acción de la cabecera es la inversa de la del evento original.
    Reconcile { user: U, group: G },
}

impl<U, G, K, A> AccessEventKind<U, G, K, A> {
    /// Discriminador corto y estable del tipo, usado por el registro
    /// persistido y las rutas del protocolo.
    pub fn name(&self) -> &'static str {
        match self {
            AccessEventKind::User { .. } => "user",
            AccessEventKind::Group { .. } => "group",
            AccessEventKind::UserToGroup { .. } => "userToGroup",
            AccessEventKind::GroupToGroup { .. } => "groupToGroup",
            AccessEventKind::UserToComponent { .. } => "userToComponent",
            AccessEventKind::GroupToComponent { .. } => "groupToComponent",
            AccessEventKind::EntityType { .. } => "entityType",
            AccessEventKind::Entity { .. } => "entity",
            AccessEventKind::UserToEntity { .. } => "userToEntity",
            AccessEventKind::GroupToEntity { .. } => "groupToEntity",
            AccessEventKind::Reconcile { .. } => "reconcile",
        }
    }
}

/// Evento completo: cabecera + payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEvent<U, G, K, A> {
    pub header: EventHeader,
    #[serde(flatten)]
    pub kind: AccessEventKind<U, G, K, A>,
}

/// Paquete de stringifiers para los cuatro parámetros de tipo del motor.
///
/// El buffer lo usa para calcular `hash_code`; el persister y el codec lo
/// usan para la forma string de cada campo. Debe ser el mismo paquete en
/// escritura y replay (biyección estable).
pub struct Stringifiers<U, G, K, A> {
    pub user: Box<dyn ElementStringifier<U>>,
    pub group: Box<dyn ElementStringifier<G>>,
    pub component: Box<dyn ElementStringifier<K>>,
    pub access: Box<dyn ElementStringifier<A>>,
}

impl Stringifiers<String, String, String, String> {
    /// Paquete identidad para el caso común de elementos `String`.
    pub fn for_strings() -> Self {
        Stringifiers { user: Box::new(StringStringifier),
                       group: Box::new(StringStringifier),
                       component: Box::new(StringStringifier),
                       access: Box::new(StringStringifier) }
    }
}

impl<U, G, K, A> Stringifiers<U, G, K, A> {
    /// Forma string del elemento primario del evento: el usuario para
    /// eventos de usuario, el grupo para eventos de grupo, el `from_group`
    /// para grupo-a-grupo, el tipo de entidad para tipos y entidades.
    pub fn primary_element(&self, kind: &AccessEventKind<U, G, K, A>) -> String {
        match kind {
            AccessEventKind::User { user }
            | AccessEventKind::UserToGroup { user, .. }
            | AccessEventKind::UserToComponent { user, .. }
            | AccessEventKind::UserToEntity { user, .. }
            | AccessEventKind::Reconcile { user, .. } => self.user.to_str(user),
            AccessEventKind::Group { group }
            | AccessEventKind::GroupToComponent { group, .. }
            | AccessEventKind::GroupToEntity { group, .. } => self.group.to_str(group),
            AccessEventKind::GroupToGroup { from_group, .. } => self.group.to_str(from_group),
            AccessEventKind::EntityType { entity_type } | AccessEventKind::Entity { entity_type, .. } => {
                entity_type.clone()
            }
        }
    }

    /// Hash de ruteo del evento: FNV-1a de 32 bits sobre el elemento primario.
    pub fn hash_code(&self, kind: &AccessEventKind<U, G, K, A>) -> i32 {
        fnv1a_32(&self.primary_element(kind))
    }
}

/// Forma de almacenamiento de un evento: todos los campos como strings, tal
/// cual se persisten y viajan por el protocolo.
pub type StoredEventKind = AccessEventKind<String, String, String, String>;
pub type StoredEvent = AccessEvent<String, String, String, String>;

impl<U, G, K, A> AccessEventKind<U, G, K, A> {
    /// Proyección a la forma string vía el paquete de stringifiers.
    pub fn to_stored(&self, strs: &Stringifiers<U, G, K, A>) -> StoredEventKind {
        match self {
            AccessEventKind::User { user } => AccessEventKind::User { user: strs.user.to_str(user) },
            AccessEventKind::Group { group } => AccessEventKind::Group { group: strs.group.to_str(group) },
            AccessEventKind::UserToGroup { user, group } => {
                AccessEventKind::UserToGroup { user: strs.user.to_str(user), group: strs.group.to_str(group) }
            }
            AccessEventKind::GroupToGroup { from_group, to_group } => {
                AccessEventKind::GroupToGroup { from_group: strs.group.to_str(from_group),
                                                to_group: strs.group.to_str(to_group) }
            }
            AccessEventKind::UserToComponent { user, component, access } => {
                AccessEventKind::UserToComponent { user: strs.user.to_str(user),
                                                   component: strs.component.to_str(component),
                                                   access: strs.access.to_str(access) }
            }
            AccessEventKind::GroupToComponent { group, component, access } => {
                AccessEventKind::GroupToComponent { group: strs.group.to_str(group),
                                                    component: strs.component.to_str(component),
                                                    access: strs.access.to_str(access) }
            }
            AccessEventKind::EntityType { entity_type } => {
                AccessEventKind::EntityType { entity_type: entity_type.clone() }
            }
            AccessEventKind::Entity { entity_type, entity } => {
                AccessEventKind::Entity { entity_type: entity_type.clone(), entity: entity.clone() }
            }
            AccessEventKind::UserToEntity { user, entity_type, entity } => {
                AccessEventKind::UserToEntity { user: strs.user.to_str(user),
                                                entity_type: entity_type.clone(),
                                                entity: entity.clone() }
            }
            AccessEventKind::GroupToEntity { group, entity_type, entity } => {
                AccessEventKind::GroupToEntity { group: strs.group.to_str(group),
                                                 entity_type: entity_type.clone(),
                                                 entity: entity.clone() }
            }
            AccessEventKind::Reconcile { user, group } => {
                AccessEventKind::Reconcile { user: strs.user.to_str(user), group: strs.group.to_str(group) }
            }
        }
    }

    /// Reconstrucción desde la forma string. Falla si el stringifier no
    /// reconoce algún campo (log corrupto o paquete incompatible).
    pub fn from_stored(stored: &StoredEventKind,
                       strs: &Stringifiers<U, G, K, A>)
                       -> Result<AccessEventKind<U, G, K, A>, access_domain::DomainError> {
        Ok(match stored {
            AccessEventKind::User { user } => AccessEventKind::User { user: strs.user.from_str(user)? },
            AccessEventKind::Group { group } => AccessEventKind::Group { group: strs.group.from_str(group)? },
            AccessEventKind::UserToGroup { user, group } => {
                AccessEventKind::UserToGroup { user: strs.user.from_str(user)?, group: strs.group.from_str(group)? }
            }
            AccessEventKind::GroupToGroup { from_group, to_group } => {
                AccessEventKind::GroupToGroup { from_group: strs.group.from_str(from_group)?,
                                                to_group: strs.group.from_str(to_group)? }
            }
            AccessEventKind::UserToComponent { user, component, access } => {
                AccessEventKind::UserToComponent { user: strs.user.from_str(user)?,
                                                   component: strs.component.from_str(component)?,
                                                   access: strs.access.from_str(access)? }
            }
            AccessEventKind::GroupToComponent { group, component, access } => {
                AccessEventKind::GroupToComponent { group: strs.group.from_str(group)?,
                                                    component: strs.component.from_str(component)?,
                                                    access: strs.access.from_str(access)? }
            }
            AccessEventKind::EntityType { entity_type } => {
                AccessEventKind::EntityType { entity_type: entity_type.clone() }
            }
            AccessEventKind::Entity { entity_type, entity } => {
                AccessEventKind::Entity { entity_type: entity_type.clone(), entity: entity.clone() }
            }
            AccessEventKind::UserToEntity { user, entity_type, entity } => {
                AccessEventKind::UserToEntity { user: strs.user.from_str(user)?,
                                                entity_type: entity_type.clone(),
                                                entity: entity.clone() }
            }
            AccessEventKind::GroupToEntity { group, entity_type, entity } => {
                AccessEventKind::GroupToEntity { group: strs.group.from_str(group)?,
                                                 entity_type: entity_type.clone(),
                                                 entity: entity.clone() }
            }
            AccessEventKind::Reconcile { user, group } => {
                AccessEventKind::Reconcile { user: strs.user.from_str(user)?, group: strs.group.from_str(group)? }
            }
        })
    }
}

impl<U, G, K, A> AccessEvent<U, G, K, A> {
    /// Evento completo en forma de almacenamiento, cabecera intacta.
    pub fn to_stored(&self, strs: &Stringifiers<U, G, K, A>) -> StoredEvent {
        AccessEvent { header: self.header.clone(), kind: self.kind.to_stored(strs) }
    }

    /// Evento completo desde la forma de almacenamiento.
    pub fn from_stored(stored: &StoredEvent,
                       strs: &Stringifiers<U, G, K, A>)
                       -> Result<AccessEvent<U, G, K, A>, access_domain::DomainError> {
        Ok(AccessEvent { header: stored.header.clone(), kind: AccessEventKind::from_stored(&stored.kind, strs)? })
    }
}

/// Ticks de 100 ns desde la época Unix, la resolución del protocolo binario.
pub fn datetime_to_ticks(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp() * 10_000_000 + i64::from(dt.timestamp_subsec_nanos() / 100)
}

/// Inversa de `datetime_to_ticks`. Ticks fuera de rango colapsan a la época.
pub fn datetime_from_ticks(ticks: i64) -> DateTime<Utc> {
    let secs = ticks.div_euclid(10_000_000);
    let nanos = (ticks.rem_euclid(10_000_000) * 100) as u32;
    DateTime::from_timestamp(secs, nanos).unwrap_or(DateTime::UNIX_EPOCH)
}
