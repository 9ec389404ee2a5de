//! Tipos de cola del buffer y su orden global de adquisición de locks.

use crate::event::AccessEventKind;

/// Una cola por familia de eventos de mutación.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventQueueKind {
    User,
    Group,
    UserToGroup,
    GroupToGroup,
    UserToComponent,
    GroupToComponent,
    EntityType,
    Entity,
    UserToEntity,
    GroupToEntity,
}

impl EventQueueKind {
    /// Orden global de adquisición de locks (siempre de arriba hacia abajo;
    /// el lock de secuencia va después del último de esta lista). Tomar los
    /// locks en cualquier otro orden puede producir deadlock.
    pub const ORDER: [EventQueueKind; 10] = [EventQueueKind::User,
                                             EventQueueKind::Group,
                                             EventQueueKind::UserToGroup,
                                             EventQueueKind::GroupToGroup,
                                             EventQueueKind::UserToComponent,
                                             EventQueueKind::GroupToComponent,
                                             EventQueueKind::EntityType,
                                             EventQueueKind::Entity,
                                             EventQueueKind::UserToEntity,
                                             EventQueueKind::GroupToEntity];

    /// Posición en el orden global; también es el índice de la cola.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            EventQueueKind::User => "user",
            EventQueueKind::Group => "group",
            EventQueueKind::UserToGroup => "userToGroup",
            EventQueueKind::GroupToGroup => "groupToGroup",
            EventQueueKind::UserToComponent => "userToComponent",
            EventQueueKind::GroupToComponent => "groupToComponent",
            EventQueueKind::EntityType => "entityType",
            EventQueueKind::Entity => "entity",
            EventQueueKind::UserToEntity => "userToEntity",
            EventQueueKind::GroupToEntity => "groupToEntity",
        }
    }

    /// Cola que le corresponde a cada variante de evento. La compensación
    /// `Reconcile` viaja por la cola usuario-grupo, que es lo que revierte.
    pub fn for_event<U, G, K, A>(kind: &AccessEventKind<U, G, K, A>) -> EventQueueKind {
        match kind {
            AccessEventKind::User { .. } => EventQueueKind::User,
            AccessEventKind::Group { .. } => EventQueueKind::Group,
            AccessEventKind::UserToGroup { .. } | AccessEventKind::Reconcile { .. } => EventQueueKind::UserToGroup,
            AccessEventKind::GroupToGroup { .. } => EventQueueKind::GroupToGroup,
            AccessEventKind::UserToComponent { .. } => EventQueueKind::UserToComponent,
            AccessEventKind::GroupToComponent { .. } => EventQueueKind::GroupToComponent,
            AccessEventKind::EntityType { .. } => EventQueueKind::EntityType,
            AccessEventKind::Entity { .. } => EventQueueKind::Entity,
            AccessEventKind::UserToEntity { .. } => EventQueueKind::UserToEntity,
            AccessEventKind::GroupToEntity { .. } => EventQueueKind::GroupToEntity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_matches_indices() {
        for (position, kind) in EventQueueKind::ORDER.iter().enumerate() {
            assert_eq!(kind.index(), position);
        }
    }
}
