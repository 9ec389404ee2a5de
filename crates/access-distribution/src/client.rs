//! Contrato de cliente de shard y cliente REST concreto.
//!
//! El contrato cubre exactamente lo que el router y el coordinador piden a
//! un nodo remoto: enviar un evento (el nodo receptor lo re-secuencia en su
//! buffer) y las consultas de la superficie distribuida, incluidas las
//! variantes sobre conjuntos de grupos que usa el fan-out.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::Deserialize;

use access_core::{AccessEventKind, EventAction, StoredEvent};

use crate::error::{DistributionError, ErrorResponse};
use crate::shard::{OperationType, ShardConfig};

#[async_trait]
pub trait ShardClient: Send + Sync {
    /// Envía un evento de mutación al nodo. Idempotente del lado receptor
    /// (manager dependency-free).
    async fn send_event(&self, event: &StoredEvent) -> Result<(), DistributionError>;

    async fn user_to_groups(&self, user: &str, include_indirect: bool) -> Result<BTreeSet<String>, DistributionError>;

    /// Permisos directos del usuario sobre entidades según este nodo.
    async fn entities_accessible_by_user(&self, user: &str)
                                         -> Result<BTreeSet<(String, String)>, DistributionError>;

    async fn components_accessible_by_user(&self, user: &str)
                                           -> Result<BTreeSet<(String, String)>, DistributionError>;

    async fn has_access_to_component(&self, user: &str, component: &str, access: &str)
                                     -> Result<bool, DistributionError>;

    async fn has_access_to_entity(&self, user: &str, entity_type: &str, entity: &str)
                                  -> Result<bool, DistributionError>;

    /// Expansión directa transitiva de un conjunto de grupos según el grafo
    /// grupo-a-grupo local del nodo (no incluye los grupos de entrada).
    async fn groups_to_groups(&self, groups: &BTreeSet<String>) -> Result<BTreeSet<String>, DistributionError>;

    async fn components_accessible_by_groups(&self, groups: &BTreeSet<String>)
                                             -> Result<BTreeSet<(String, String)>, DistributionError>;

    async fn entities_accessible_by_groups(&self, groups: &BTreeSet<String>)
                                           -> Result<BTreeSet<(String, String)>, DistributionError>;

    async fn has_access_to_component_by_groups(&self,
                                               groups: &BTreeSet<String>,
                                               component: &str,
                                               access: &str)
                                               -> Result<bool, DistributionError>;

    async fn has_access_to_entity_by_groups(&self,
                                            groups: &BTreeSet<String>,
                                            entity_type: &str,
                                            entity: &str)
                                            -> Result<bool, DistributionError>;
}

/// Fábrica de clientes: el router resuelve shards y pide acá el cliente
/// concreto. La implementación REST los reusa por `(base_url, operación)`.
pub trait ClientFactory: Send + Sync {
    fn client_for(&self, shard: &ShardConfig, operation: OperationType) -> std::sync::Arc<dyn ShardClient>;
}

// ----------------------------------------------------------------------
// Cliente REST
// ----------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct UserGroupRow {
    #[allow(dead_code)]
    user: String,
    group: String,
}

#[derive(Debug, Deserialize)]
struct EntityRow {
    #[serde(rename = "entityType")]
    entity_type: String,
    entity: String,
}

#[derive(Debug, Deserialize)]
struct ComponentRow {
    #[serde(rename = "applicationComponent")]
    component: String,
    #[serde(rename = "accessLevel")]
    access: String,
}

pub struct RestShardClient {
    http: reqwest::Client,
    base_url: String,
}

fn enc(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

fn groups_query(groups: &BTreeSet<String>) -> String {
    groups.iter().map(|g| format!("group={}", enc(g))).collect::<Vec<_>>().join("&")
}

impl RestShardClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        RestShardClient { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Ruta del recurso de un evento, compartida entre Add (POST) y Remove
    /// (DELETE).
    fn event_path(kind: &AccessEventKind<String, String, String, String>) -> String {
        match kind {
            AccessEventKind::User { user } => format!("/api/v1/users/{}", enc(user)),
            AccessEventKind::Group { group } => format!("/api/v1/groups/{}", enc(group)),
            AccessEventKind::UserToGroup { user, group } | AccessEventKind::Reconcile { user, group } => {
                format!("/api/v1/userToGroupMappings/user/{}/group/{}", enc(user), enc(group))
            }
            AccessEventKind::GroupToGroup { from_group, to_group } => {
                format!("/api/v1/groupToGroupMappings/fromGroup/{}/toGroup/{}", enc(from_group), enc(to_group))
            }
            AccessEventKind::UserToComponent { user, component, access } => {
                format!("/api/v1/userToApplicationComponentAndAccessLevelMappings/user/{}/applicationComponent/{}/accessLevel/{}",
                        enc(user), enc(component), enc(access))
            }
            AccessEventKind::GroupToComponent { group, component, access } => {
                format!("/api/v1/groupToApplicationComponentAndAccessLevelMappings/group/{}/applicationComponent/{}/accessLevel/{}",
                        enc(group), enc(component), enc(access))
            }
            AccessEventKind::EntityType { entity_type } => format!("/api/v1/entityTypes/{}", enc(entity_type)),
            AccessEventKind::Entity { entity_type, entity } => {
                format!("/api/v1/entityTypes/{}/entities/{}", enc(entity_type), enc(entity))
            }
            AccessEventKind::UserToEntity { user, entity_type, entity } => {
                format!("/api/v1/userToEntityMappings/user/{}/entityType/{}/entity/{}",
                        enc(user), enc(entity_type), enc(entity))
            }
            AccessEventKind::GroupToEntity { group, entity_type, entity } => {
                format!("/api/v1/groupToEntityMappings/group/{}/entityType/{}/entity/{}",
                        enc(group), enc(entity_type), enc(entity))
            }
        }
    }

    /// Traduce una respuesta no-2xx al error remoto, preservando el cuerpo
    /// de error del protocolo cuando está presente.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, DistributionError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let parsed: Option<ErrorResponse> = response.json().await.ok();
        match parsed {
            Some(body) => Err(DistributionError::Remote { status: status.as_u16(),
                                                          code: body.error.code,
                                                          message: body.error.message,
                                                          target: body.error.target }),
            None => Err(DistributionError::Remote { status: status.as_u16(),
                                                    code: status.canonical_reason().unwrap_or("Unknown").to_string(),
                                                    message: String::new(),
                                                    target: None }),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, DistributionError> {
        let response = self.http.get(self.url(path)).send().await?;
        let response = Self::check(response).await?;
        response.json::<T>().await.map_err(DistributionError::from)
    }
}

#[async_trait]
impl ShardClient for RestShardClient {
    async fn send_event(&self, event: &StoredEvent) -> Result<(), DistributionError> {
        let path = Self::event_path(&event.kind);
        let request = match event.header.action {
            EventAction::Add => self.http.post(self.url(&path)),
            EventAction::Remove => self.http.delete(self.url(&path)),
        };
        let response = request.send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn user_to_groups(&self, user: &str, include_indirect: bool) -> Result<BTreeSet<String>, DistributionError> {
        let path = format!("/api/v1/userToGroupMappings/user/{}?includeIndirectMappings={include_indirect}", enc(user));
        let rows: Vec<UserGroupRow> = self.get_json(&path).await?;
        Ok(rows.into_iter().map(|r| r.group).collect())
    }

    async fn entities_accessible_by_user(&self, user: &str)
                                         -> Result<BTreeSet<(String, String)>, DistributionError> {
        let rows: Vec<EntityRow> = self.get_json(&format!("/api/v1/entities/accessibleByUser/{}", enc(user))).await?;
        Ok(rows.into_iter().map(|r| (r.entity_type, r.entity)).collect())
    }

    async fn components_accessible_by_user(&self, user: &str)
                                           -> Result<BTreeSet<(String, String)>, DistributionError> {
        let path = format!("/api/v1/applicationComponentsAndAccessLevels/accessibleByUser/{}", enc(user));
        let rows: Vec<ComponentRow> = self.get_json(&path).await?;
        Ok(rows.into_iter().map(|r| (r.component, r.access)).collect())
    }

    async fn has_access_to_component(&self, user: &str, component: &str, access: &str)
                                     -> Result<bool, DistributionError> {
        let path = format!("/api/v1/dataElementAccess/applicationComponent/user/{}/applicationComponent/{}/accessLevel/{}",
                           enc(user), enc(component), enc(access));
        self.get_json(&path).await
    }

    async fn has_access_to_entity(&self, user: &str, entity_type: &str, entity: &str)
                                  -> Result<bool, DistributionError> {
        let path = format!("/api/v1/dataElementAccess/entity/user/{}/entityType/{}/entity/{}",
                           enc(user), enc(entity_type), enc(entity));
        self.get_json(&path).await
    }

    async fn groups_to_groups(&self, groups: &BTreeSet<String>) -> Result<BTreeSet<String>, DistributionError> {
        let path = format!("/api/v1/groupToGroupMappings?transitive=true&{}", groups_query(groups));
        let rows: Vec<String> = self.get_json(&path).await?;
        Ok(rows.into_iter().collect())
    }

    async fn components_accessible_by_groups(&self, groups: &BTreeSet<String>)
                                             -> Result<BTreeSet<(String, String)>, DistributionError> {
        let path = format!("/api/v1/applicationComponentsAndAccessLevels/accessibleByGroups?{}", groups_query(groups));
        let rows: Vec<ComponentRow> = self.get_json(&path).await?;
        Ok(rows.into_iter().map(|r| (r.component, r.access)).collect())
    }

    async fn entities_accessible_by_groups(&self, groups: &BTreeSet<String>)
                                           -> Result<BTreeSet<(String, String)>, DistributionError> {
        let path = format!("/api/v1/entities/accessibleByGroups?{}", groups_query(groups));
        let rows: Vec<EntityRow> = self.get_json(&path).await?;
        Ok(rows.into_iter().map(|r| (r.entity_type, r.entity)).collect())
    }

    async fn has_access_to_component_by_groups(&self,
                                               groups: &BTreeSet<String>,
                                               component: &str,
                                               access: &str)
                                               -> Result<bool, DistributionError> {
        let path = format!("/api/v1/dataElementAccess/applicationComponent/groups?{}&applicationComponent={}&accessLevel={}",
                           groups_query(groups), enc(component), enc(access));
        self.get_json(&path).await
    }

    async fn has_access_to_entity_by_groups(&self,
                                            groups: &BTreeSet<String>,
                                            entity_type: &str,
                                            entity: &str)
                                            -> Result<bool, DistributionError> {
        let path = format!("/api/v1/dataElementAccess/entity/groups?{}&entityType={}&entity={}",
                           groups_query(groups), enc(entity_type), enc(entity));
        self.get_json(&path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_paths_are_stable() {
        let kind: AccessEventKind<String, String, String, String> =
            AccessEventKind::GroupToGroup { from_group: "A".into(), to_group: "B".into() };
        assert_eq!(RestShardClient::event_path(&kind), "/api/v1/groupToGroupMappings/fromGroup/A/toGroup/B");

        let kind: AccessEventKind<String, String, String, String> =
            AccessEventKind::Entity { entity_type: "Client".into(), entity: "Acme Ltd".into() };
        assert_eq!(RestShardClient::event_path(&kind), "/api/v1/entityTypes/Client/entities/Acme%20Ltd");
    }

    #[test]
    fn reconcile_travels_as_user_to_group_resource() {
        let kind: AccessEventKind<String, String, String, String> =
            AccessEventKind::Reconcile { user: "alice".into(), group: "admins".into() };
        assert_eq!(RestShardClient::event_path(&kind), "/api/v1/userToGroupMappings/user/alice/group/admins");
    }
}
