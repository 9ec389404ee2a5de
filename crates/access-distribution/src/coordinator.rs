//! Coordinador de operaciones: fachada asíncrona de nivel autorización.
//!
//! Traduce cada llamada de la superficie pública a las decisiones de ruteo
//! del router, aplica la política de reintentos y reporta errores anotados
//! con la descripción identificatoria del shard.
//!
//! Consulta distribuida "accesible por usuario":
//! 1. Resolver usuario → grupos directos en el shard User/Query dueño.
//! 2. Particionar la frontera de grupos por rango del shard
//!    GroupToGroup/Query.
//! 3. Fan-out de la expansión transitiva, iterando hasta punto fijo (cada
//!    shard sólo conoce los mapeos cuyos from-group posee).
//! 4. Unión del cierre.
//! 5. Particionar los grupos expandidos por rango del shard Group/Query.
//! 6. Fan-out de las consultas de entidades / componentes por grupos, más
//!    los permisos directos del usuario en su shard.
//! 7. Unión de resultados.
//! Las variantes `has_access_to_*` siguen el mismo camino pero cortan en el
//! primer `true`.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use futures::future::BoxFuture;
use uuid::Uuid;

use access_core::hashing::fnv1a_32;
use access_core::{AccessEvent, AccessEventKind, EventAction, EventHeader, StoredEvent, Stringifiers};

use crate::error::DistributionError;
use crate::router::{CancellationFlag, ShardRouter};
use crate::shard::{DataElement, OperationType, ShardConfigSet};

pub struct OperationCoordinator {
    router: Arc<ShardRouter>,
    strs: Stringifiers<String, String, String, String>,
}

impl OperationCoordinator {
    pub fn new(router: Arc<ShardRouter>) -> Self {
        OperationCoordinator { router, strs: Stringifiers::for_strings() }
    }

    pub fn router(&self) -> &Arc<ShardRouter> {
        &self.router
    }

    /// Evento de salida: el coordinador estampa identidad, acción y hash de
    /// ruteo; la secuencia definitiva la asigna el buffer del nodo receptor.
    fn make_event(&self, action: EventAction, kind: AccessEventKind<String, String, String, String>) -> StoredEvent {
        let hash_code = self.strs.hash_code(&kind);
        AccessEvent { header: EventHeader { event_id: Uuid::new_v4(),
                                            action,
                                            occurred_at: Utc::now(),
                                            hash_code,
                                            sequence: 0 },
                      kind }
    }

    async fn submit(&self, action: EventAction, kind: AccessEventKind<String, String, String, String>)
                    -> Result<(), DistributionError> {
        let event = self.make_event(action, kind);
        self.router.route_event(&event).await
    }

    // ------------------------------------------------------------------
    // Superficie de eventos
    // ------------------------------------------------------------------

    pub async fn add_user(&self, user: &str) -> Result<(), DistributionError> {
        self.submit(EventAction::Add, AccessEventKind::User { user: user.to_string() }).await
    }

    pub async fn remove_user(&self, user: &str) -> Result<(), DistributionError> {
        self.submit(EventAction::Remove, AccessEventKind::User { user: user.to_string() }).await
    }

    pub async fn add_group(&self, group: &str) -> Result<(), DistributionError> {
        self.submit(EventAction::Add, AccessEventKind::Group { group: group.to_string() }).await
    }

    pub async fn remove_group(&self, group: &str) -> Result<(), DistributionError> {
        self.submit(EventAction::Remove, AccessEventKind::Group { group: group.to_string() }).await
    }

    pub async fn add_user_to_group(&self, user: &str, group: &str) -> Result<(), DistributionError> {
        self.submit(EventAction::Add,
                    AccessEventKind::UserToGroup { user: user.to_string(), group: group.to_string() })
            .await
    }

    pub async fn remove_user_to_group(&self, user: &str, group: &str) -> Result<(), DistributionError> {
        self.submit(EventAction::Remove,
                    AccessEventKind::UserToGroup { user: user.to_string(), group: group.to_string() })
            .await
    }

    pub async fn add_group_to_group(&self, from_group: &str, to_group: &str) -> Result<(), DistributionError> {
        self.submit(EventAction::Add,
                    AccessEventKind::GroupToGroup { from_group: from_group.to_string(), to_group: to_group.to_string() })
            .await
    }

    pub async fn remove_group_to_group(&self, from_group: &str, to_group: &str) -> Result<(), DistributionError> {
        self.submit(EventAction::Remove,
                    AccessEventKind::GroupToGroup { from_group: from_group.to_string(), to_group: to_group.to_string() })
            .await
    }

    pub async fn add_user_to_component(&self, user: &str, component: &str, access: &str)
                                       -> Result<(), DistributionError> {
        self.submit(EventAction::Add,
                    AccessEventKind::UserToComponent { user: user.to_string(),
                                                       component: component.to_string(),
                                                       access: access.to_string() })
            .await
    }

    pub async fn remove_user_to_component(&self, user: &str, component: &str, access: &str)
                                          -> Result<(), DistributionError> {
        self.submit(EventAction::Remove,
                    AccessEventKind::UserToComponent { user: user.to_string(),
                                                       component: component.to_string(),
                                                       access: access.to_string() })
            .await
    }

    pub async fn add_group_to_component(&self, group: &str, component: &str, access: &str)
                                        -> Result<(), DistributionError> {
        self.submit(EventAction::Add,
                    AccessEventKind::GroupToComponent { group: group.to_string(),
                                                        component: component.to_string(),
                                                        access: access.to_string() })
            .await
    }

    pub async fn remove_group_to_component(&self, group: &str, component: &str, access: &str)
                                           -> Result<(), DistributionError> {
        self.submit(EventAction::Remove,
                    AccessEventKind::GroupToComponent { group: group.to_string(),
                                                        component: component.to_string(),
                                                        access: access.to_string() })
            .await
    }

    pub async fn add_entity_type(&self, entity_type: &str) -> Result<(), DistributionError> {
        self.submit(EventAction::Add, AccessEventKind::EntityType { entity_type: entity_type.to_string() }).await
    }

    pub async fn remove_entity_type(&self, entity_type: &str) -> Result<(), DistributionError> {
        self.submit(EventAction::Remove, AccessEventKind::EntityType { entity_type: entity_type.to_string() }).await
    }

    pub async fn add_entity(&self, entity_type: &str, entity: &str) -> Result<(), DistributionError> {
        self.submit(EventAction::Add,
                    AccessEventKind::Entity { entity_type: entity_type.to_string(), entity: entity.to_string() })
            .await
    }

    pub async fn remove_entity(&self, entity_type: &str, entity: &str) -> Result<(), DistributionError> {
        self.submit(EventAction::Remove,
                    AccessEventKind::Entity { entity_type: entity_type.to_string(), entity: entity.to_string() })
            .await
    }

    pub async fn add_user_to_entity(&self, user: &str, entity_type: &str, entity: &str)
                                    -> Result<(), DistributionError> {
        self.submit(EventAction::Add,
                    AccessEventKind::UserToEntity { user: user.to_string(),
                                                    entity_type: entity_type.to_string(),
                                                    entity: entity.to_string() })
            .await
    }

    pub async fn remove_user_to_entity(&self, user: &str, entity_type: &str, entity: &str)
                                       -> Result<(), DistributionError> {
        self.submit(EventAction::Remove,
                    AccessEventKind::UserToEntity { user: user.to_string(),
                                                    entity_type: entity_type.to_string(),
                                                    entity: entity.to_string() })
            .await
    }

    pub async fn add_group_to_entity(&self, group: &str, entity_type: &str, entity: &str)
                                     -> Result<(), DistributionError> {
        self.submit(EventAction::Add,
                    AccessEventKind::GroupToEntity { group: group.to_string(),
                                                     entity_type: entity_type.to_string(),
                                                     entity: entity.to_string() })
            .await
    }

    pub async fn remove_group_to_entity(&self, group: &str, entity_type: &str, entity: &str)
                                        -> Result<(), DistributionError> {
        self.submit(EventAction::Remove,
                    AccessEventKind::GroupToEntity { group: group.to_string(),
                                                     entity_type: entity_type.to_string(),
                                                     entity: entity.to_string() })
            .await
    }

    // ------------------------------------------------------------------
    // Superficie de consultas
    // ------------------------------------------------------------------

    /// Grupos directos del usuario; con `include_indirect`, el cierre por
    /// herencia expandido contra los shards grupo-a-grupo.
    pub async fn user_to_groups(&self, user: &str, include_indirect: bool)
                                -> Result<BTreeSet<String>, DistributionError> {
        let config = self.router.snapshot();
        let cancel = CancellationFlag::default();
        let direct = self.direct_groups_of(&config, user, &cancel).await?;
        if !include_indirect {
            return Ok(direct);
        }
        self.expand_groups(&config, direct, &cancel).await
    }

    pub async fn entities_accessible_by_user(&self, user: &str)
                                             -> Result<BTreeSet<(String, String)>, DistributionError> {
        let config = self.router.snapshot();
        let cancel = CancellationFlag::default();

        let direct_groups = self.direct_groups_of(&config, user, &cancel).await?;
        let all_groups = self.expand_groups(&config, direct_groups, &cancel).await?;

        // Permisos directos del usuario en su shard, más los de sus grupos
        // efectivos repartidos por los shards Group/Query dueños.
        let user_shard = config.shard_for(DataElement::User, OperationType::Query, fnv1a_32(user))?;
        let user_client = self.router.client(user_shard, OperationType::Query);
        let user_desc = user_shard.describe(true);

        let mut calls: Vec<BoxFuture<'_, Result<BTreeSet<(String, String)>, DistributionError>>> = Vec::new();
        {
            let retry = *self.router.retry();
            let cancel = cancel.clone();
            let user = user.to_string();
            calls.push(Box::pin(async move {
                           retry.run("entities_accessible_by_user", &cancel, || {
                                    user_client.entities_accessible_by_user(&user)
                                })
                                .await
                                .map_err(|e| e.at_shard(user_desc))
                       }));
        }
        for (shard, subset) in config.partition(DataElement::Group, OperationType::Query, &all_groups)? {
            let client = self.router.client(shard, OperationType::Query);
            let desc = shard.describe(true);
            let retry = *self.router.retry();
            let cancel = cancel.clone();
            calls.push(Box::pin(async move {
                           retry.run("entities_accessible_by_groups", &cancel, || {
                                    client.entities_accessible_by_groups(&subset)
                                })
                                .await
                                .map_err(|e| e.at_shard(desc))
                       }));
        }
        let results = self.router.fan_out_collect("entities_accessible_by_user", calls, &cancel).await?;
        Ok(results.into_iter().flatten().collect())
    }

    pub async fn entities_of_type_accessible_by_user(&self, user: &str, entity_type: &str)
                                                     -> Result<BTreeSet<String>, DistributionError> {
        Ok(self.entities_accessible_by_user(user)
               .await?
               .into_iter()
               .filter(|(t, _)| t == entity_type)
               .map(|(_, e)| e)
               .collect())
    }

    pub async fn components_accessible_by_user(&self, user: &str)
                                               -> Result<BTreeSet<(String, String)>, DistributionError> {
        let config = self.router.snapshot();
        let cancel = CancellationFlag::default();

        let direct_groups = self.direct_groups_of(&config, user, &cancel).await?;
        let all_groups = self.expand_groups(&config, direct_groups, &cancel).await?;

        let user_shard = config.shard_for(DataElement::User, OperationType::Query, fnv1a_32(user))?;
        let user_client = self.router.client(user_shard, OperationType::Query);
        let user_desc = user_shard.describe(true);

        let mut calls: Vec<BoxFuture<'_, Result<BTreeSet<(String, String)>, DistributionError>>> = Vec::new();
        {
            let retry = *self.router.retry();
            let cancel = cancel.clone();
            let user = user.to_string();
            calls.push(Box::pin(async move {
                           retry.run("components_accessible_by_user", &cancel, || {
                                    user_client.components_accessible_by_user(&user)
                                })
                                .await
                                .map_err(|e| e.at_shard(user_desc))
                       }));
        }
        for (shard, subset) in config.partition(DataElement::Group, OperationType::Query, &all_groups)? {
            let client = self.router.client(shard, OperationType::Query);
            let desc = shard.describe(true);
            let retry = *self.router.retry();
            let cancel = cancel.clone();
            calls.push(Box::pin(async move {
                           retry.run("components_accessible_by_groups", &cancel, || {
                                    client.components_accessible_by_groups(&subset)
                                })
                                .await
                                .map_err(|e| e.at_shard(desc))
                       }));
        }
        let results = self.router.fan_out_collect("components_accessible_by_user", calls, &cancel).await?;
        Ok(results.into_iter().flatten().collect())
    }

    pub async fn has_access_to_component(&self, user: &str, component: &str, access: &str)
                                         -> Result<bool, DistributionError> {
        let config = self.router.snapshot();
        let cancel = CancellationFlag::default();

        // Primero el shard del usuario: conoce los permisos directos.
        let user_shard = config.shard_for(DataElement::User, OperationType::Query, fnv1a_32(user))?;
        let user_client = self.router.client(user_shard, OperationType::Query);
        let direct = self.router
                         .retry()
                         .run("has_access_to_component", &cancel, || {
                             user_client.has_access_to_component(user, component, access)
                         })
                         .await
                         .map_err(|e| e.at_shard(user_shard.describe(true)))?;
        if direct {
            return Ok(true);
        }

        let direct_groups = self.direct_groups_of(&config, user, &cancel).await?;
        let all_groups = self.expand_groups(&config, direct_groups, &cancel).await?;

        let mut calls: Vec<BoxFuture<'_, Result<bool, DistributionError>>> = Vec::new();
        for (shard, subset) in config.partition(DataElement::Group, OperationType::Query, &all_groups)? {
            let client = self.router.client(shard, OperationType::Query);
            let desc = shard.describe(true);
            let retry = *self.router.retry();
            let cancel = cancel.clone();
            let component = component.to_string();
            let access = access.to_string();
            calls.push(Box::pin(async move {
                           retry.run("has_access_to_component_by_groups", &cancel, || {
                                    client.has_access_to_component_by_groups(&subset, &component, &access)
                                })
                                .await
                                .map_err(|e| e.at_shard(desc))
                       }));
        }
        self.router.fan_out_any("has_access_to_component", calls, &cancel).await
    }

    pub async fn has_access_to_entity(&self, user: &str, entity_type: &str, entity: &str)
                                      -> Result<bool, DistributionError> {
        let config = self.router.snapshot();
        let cancel = CancellationFlag::default();

        let user_shard = config.shard_for(DataElement::User, OperationType::Query, fnv1a_32(user))?;
        let user_client = self.router.client(user_shard, OperationType::Query);
        let direct = self.router
                         .retry()
                         .run("has_access_to_entity", &cancel, || {
                             user_client.has_access_to_entity(user, entity_type, entity)
                         })
                         .await
                         .map_err(|e| e.at_shard(user_shard.describe(true)))?;
        if direct {
            return Ok(true);
        }

        let direct_groups = self.direct_groups_of(&config, user, &cancel).await?;
        let all_groups = self.expand_groups(&config, direct_groups, &cancel).await?;

        let mut calls: Vec<BoxFuture<'_, Result<bool, DistributionError>>> = Vec::new();
        for (shard, subset) in config.partition(DataElement::Group, OperationType::Query, &all_groups)? {
            let client = self.router.client(shard, OperationType::Query);
            let desc = shard.describe(true);
            let retry = *self.router.retry();
            let cancel = cancel.clone();
            let entity_type = entity_type.to_string();
            let entity = entity.to_string();
            calls.push(Box::pin(async move {
                           retry.run("has_access_to_entity_by_groups", &cancel, || {
                                    client.has_access_to_entity_by_groups(&subset, &entity_type, &entity)
                                })
                                .await
                                .map_err(|e| e.at_shard(desc))
                       }));
        }
        self.router.fan_out_any("has_access_to_entity", calls, &cancel).await
    }

    // ------------------------------------------------------------------
    // Helpers del camino distribuido
    // ------------------------------------------------------------------

    async fn direct_groups_of(&self,
                              config: &ShardConfigSet,
                              user: &str,
                              cancel: &CancellationFlag)
                              -> Result<BTreeSet<String>, DistributionError> {
        let shard = config.shard_for(DataElement::User, OperationType::Query, fnv1a_32(user))?;
        let client = self.router.client(shard, OperationType::Query);
        self.router
            .retry()
            .run("user_to_groups", cancel, || client.user_to_groups(user, false))
            .await
            .map_err(|e| e.at_shard(shard.describe(true)))
    }

    /// Cierre por herencia de un conjunto de grupos, iterando contra los
    /// shards GroupToGroup/Query hasta punto fijo. Devuelve el conjunto
    /// completo (entrada incluida).
    async fn expand_groups(&self,
                           config: &ShardConfigSet,
                           initial: BTreeSet<String>,
                           cancel: &CancellationFlag)
                           -> Result<BTreeSet<String>, DistributionError> {
        let mut all = initial.clone();
        let mut frontier = initial;
        while !frontier.is_empty() {
            let mut calls: Vec<BoxFuture<'_, Result<BTreeSet<String>, DistributionError>>> = Vec::new();
            for (shard, subset) in config.partition(DataElement::GroupToGroup, OperationType::Query, &frontier)? {
                let client = self.router.client(shard, OperationType::Query);
                let desc = shard.describe(true);
                let retry = *self.router.retry();
                let cancel = cancel.clone();
                calls.push(Box::pin(async move {
                               retry.run("groups_to_groups", &cancel, || client.groups_to_groups(&subset))
                                    .await
                                    .map_err(|e| e.at_shard(desc))
                           }));
            }
            let results = self.router.fan_out_collect("expand_groups", calls, cancel).await?;
            let mut next = BTreeSet::new();
            for reached in results {
                for group in reached {
                    if all.insert(group.clone()) {
                        next.insert(group);
                    }
                }
            }
            frontier = next;
        }
        Ok(all)
    }
}
