//! `AccessGraph`: grafo bidireccional de autorización con consultas directas
//! y transitivas.
//!
//! Invariantes que mantiene el store:
//! - La jerarquía grupo-a-grupo es acíclica (`add_group_to_group` rechaza
//!   con `CycleDetected` la arista que cerraría un ciclo).
//! - Toda arista usuario-grupo referencia usuario y grupo existentes; toda
//!   entidad referencia un tipo existente.
//! - La baja de un nodo elimina todas sus aristas incidentes, directas e
//!   inversas, y mantiene las tablas de frecuencia de mapeos a entidades.
//!
//! Determinismo: los contenedores son `BTreeMap`/`BTreeSet`, así que los
//! recorridos visitan orígenes en orden estable entre ejecuciones y los
//! resultados de consulta son reproducibles.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;

use access_domain::Element;

use crate::errors::GraphError;

use super::arena::GroupArena;

fn display_id<T: Debug>(value: &T) -> String {
    let formatted = format!("{value:?}");
    formatted.trim_matches('"').to_string()
}

fn not_found<T: Debug>(kind: &str, id: &T) -> GraphError {
    GraphError::NotFound { kind: kind.to_string(), id: display_id(id) }
}

fn idempotent_add<T: Debug>(kind: &str, id: &T) -> GraphError {
    GraphError::IdempotentAdd { kind: kind.to_string(), id: display_id(id) }
}

fn idempotent_remove<T: Debug>(kind: &str, id: &T) -> GraphError {
    GraphError::IdempotentRemove { kind: kind.to_string(), id: display_id(id) }
}

pub struct AccessGraph<U: Element, G: Element, K: Element, A: Element> {
    users: BTreeSet<U>,
    user_to_groups: BTreeMap<U, BTreeSet<G>>,
    group_to_users: BTreeMap<G, BTreeSet<U>>,
    groups: GroupArena<G>,
    user_to_components: BTreeMap<U, BTreeSet<(K, A)>>,
    component_to_users: BTreeMap<(K, A), BTreeSet<U>>,
    group_to_components: BTreeMap<G, BTreeSet<(K, A)>>,
    component_to_groups: BTreeMap<(K, A), BTreeSet<G>>,
    entities: BTreeMap<String, BTreeSet<String>>,
    user_to_entities: BTreeMap<U, BTreeSet<(String, String)>>,
    entity_to_users: BTreeMap<(String, String), BTreeSet<U>>,
    group_to_entities: BTreeMap<G, BTreeSet<(String, String)>>,
    entity_to_groups: BTreeMap<(String, String), BTreeSet<G>>,
    user_entity_counts: BTreeMap<U, usize>,
    group_entity_counts: BTreeMap<G, usize>,
}

impl<U: Element, G: Element, K: Element, A: Element> Default for AccessGraph<U, G, K, A> {
    fn default() -> Self {
        AccessGraph { users: BTreeSet::new(),
                      user_to_groups: BTreeMap::new(),
                      group_to_users: BTreeMap::new(),
                      groups: GroupArena::new(),
                      user_to_components: BTreeMap::new(),
                      component_to_users: BTreeMap::new(),
                      group_to_components: BTreeMap::new(),
                      component_to_groups: BTreeMap::new(),
                      entities: BTreeMap::new(),
                      user_to_entities: BTreeMap::new(),
                      entity_to_users: BTreeMap::new(),
                      group_to_entities: BTreeMap::new(),
                      entity_to_groups: BTreeMap::new(),
                      user_entity_counts: BTreeMap::new(),
                      group_entity_counts: BTreeMap::new() }
    }
}

impl<U: Element, G: Element, K: Element, A: Element> AccessGraph<U, G, K, A> {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Presencia
    // ------------------------------------------------------------------

    pub fn contains_user(&self, user: &U) -> bool {
        self.users.contains(user)
    }

    pub fn contains_group(&self, group: &G) -> bool {
        self.groups.contains(group)
    }

    pub fn contains_entity_type(&self, entity_type: &str) -> bool {
        self.entities.contains_key(entity_type)
    }

    pub fn contains_entity(&self, entity_type: &str, entity: &str) -> bool {
        self.entities.get(entity_type).is_some_and(|set| set.contains(entity))
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    // ------------------------------------------------------------------
    // Altas y bajas de nodos
    // ------------------------------------------------------------------

    pub fn add_user(&mut self, user: U) -> Result<(), GraphError> {
        if !self.users.insert(user.clone()) {
            return Err(idempotent_add("user", &user));
        }
        Ok(())
    }

    pub fn remove_user(&mut self, user: &U) -> Result<(), GraphError> {
        if !self.users.remove(user) {
            return Err(idempotent_remove("user", user));
        }
        if let Some(groups) = self.user_to_groups.remove(user) {
            for g in groups {
                if let Some(users) = self.group_to_users.get_mut(&g) {
                    users.remove(user);
                }
            }
        }
        if let Some(components) = self.user_to_components.remove(user) {
            for ka in components {
                if let Some(users) = self.component_to_users.get_mut(&ka) {
                    users.remove(user);
                }
            }
        }
        if let Some(mapped) = self.user_to_entities.remove(user) {
            for te in mapped {
                if let Some(users) = self.entity_to_users.get_mut(&te) {
                    users.remove(user);
                }
            }
        }
        self.user_entity_counts.remove(user);
        Ok(())
    }

    pub fn add_group(&mut self, group: G) -> Result<(), GraphError> {
        if self.groups.insert(group.clone()).is_none() {
            return Err(idempotent_add("group", &group));
        }
        Ok(())
    }

    pub fn remove_group(&mut self, group: &G) -> Result<(), GraphError> {
        if !self.groups.remove(group) {
            return Err(idempotent_remove("group", group));
        }
        if let Some(users) = self.group_to_users.remove(group) {
            for u in users {
                if let Some(groups) = self.user_to_groups.get_mut(&u) {
                    groups.remove(group);
                }
            }
        }
        if let Some(components) = self.group_to_components.remove(group) {
            for ka in components {
                if let Some(groups) = self.component_to_groups.get_mut(&ka) {
                    groups.remove(group);
                }
            }
        }
        if let Some(mapped) = self.group_to_entities.remove(group) {
            for te in mapped {
                if let Some(groups) = self.entity_to_groups.get_mut(&te) {
                    groups.remove(group);
                }
            }
        }
        self.group_entity_counts.remove(group);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Mapeos usuario-grupo y grupo-grupo
    // ------------------------------------------------------------------

    pub fn add_user_to_group(&mut self, user: &U, group: &G) -> Result<(), GraphError> {
        if !self.contains_user(user) {
            return Err(not_found("user", user));
        }
        if !self.contains_group(group) {
            return Err(not_found("group", group));
        }
        let inserted = self.user_to_groups.entry(user.clone()).or_default().insert(group.clone());
        if !inserted {
            return Err(idempotent_add("user-to-group mapping", &(user, group)));
        }
        self.group_to_users.entry(group.clone()).or_default().insert(user.clone());
        Ok(())
    }

    pub fn remove_user_to_group(&mut self, user: &U, group: &G) -> Result<(), GraphError> {
        let removed = self.user_to_groups.get_mut(user).is_some_and(|set| set.remove(group));
        if !removed {
            return Err(idempotent_remove("user-to-group mapping", &(user, group)));
        }
        if let Some(users) = self.group_to_users.get_mut(group) {
            users.remove(user);
        }
        Ok(())
    }

    /// Agrega `from_group -> to_group` (herencia). Falla con `CycleDetected`
    /// si ya existe un camino `to_group ->* from_group`: la BFS acotada corre
    /// sobre la adyacencia de la arena antes de tocar el grafo, así que un
    /// rechazo lo deja intacto.
    pub fn add_group_to_group(&mut self, from_group: &G, to_group: &G) -> Result<(), GraphError> {
        let from = self.groups.id_of(from_group).ok_or_else(|| not_found("group", from_group))?;
        let to = self.groups.id_of(to_group).ok_or_else(|| not_found("group", to_group))?;
        if self.groups.has_edge(from, to) {
            return Err(idempotent_add("group-to-group mapping", &(from_group, to_group)));
        }
        if self.groups.reaches(to, from) {
            return Err(GraphError::CycleDetected { from: display_id(from_group), to: display_id(to_group) });
        }
        self.groups.add_edge(from, to);
        Ok(())
    }

    /// Chequeo no mutante usado por el buffer antes de asignar secuencia:
    /// `true` si agregar `from_group -> to_group` cerraría un ciclo. Grupos
    /// aún inexistentes sólo pueden ciclar contra sí mismos.
    pub fn would_close_cycle(&self, from_group: &G, to_group: &G) -> bool {
        if from_group == to_group {
            return true;
        }
        match (self.groups.id_of(from_group), self.groups.id_of(to_group)) {
            (Some(from), Some(to)) => self.groups.reaches(to, from),
            _ => false,
        }
    }

    pub fn remove_group_to_group(&mut self, from_group: &G, to_group: &G) -> Result<(), GraphError> {
        let (Some(from), Some(to)) = (self.groups.id_of(from_group), self.groups.id_of(to_group)) else {
            return Err(idempotent_remove("group-to-group mapping", &(from_group, to_group)));
        };
        if !self.groups.remove_edge(from, to) {
            return Err(idempotent_remove("group-to-group mapping", &(from_group, to_group)));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Permisos sobre componentes
    // ------------------------------------------------------------------

    pub fn add_user_to_component(&mut self, user: &U, component: &K, access: &A) -> Result<(), GraphError> {
        if !self.contains_user(user) {
            return Err(not_found("user", user));
        }
        let ka = (component.clone(), access.clone());
        if !self.user_to_components.entry(user.clone()).or_default().insert(ka.clone()) {
            return Err(idempotent_add("user-to-component mapping", &(user, component, access)));
        }
        self.component_to_users.entry(ka).or_default().insert(user.clone());
        Ok(())
    }

    pub fn remove_user_to_component(&mut self, user: &U, component: &K, access: &A) -> Result<(), GraphError> {
        let ka = (component.clone(), access.clone());
        let removed = self.user_to_components.get_mut(user).is_some_and(|set| set.remove(&ka));
        if !removed {
            return Err(idempotent_remove("user-to-component mapping", &(user, component, access)));
        }
        if let Some(users) = self.component_to_users.get_mut(&ka) {
            users.remove(user);
        }
        Ok(())
    }

    pub fn add_group_to_component(&mut self, group: &G, component: &K, access: &A) -> Result<(), GraphError> {
        if !self.contains_group(group) {
            return Err(not_found("group", group));
        }
        let ka = (component.clone(), access.clone());
        if !self.group_to_components.entry(group.clone()).or_default().insert(ka.clone()) {
            return Err(idempotent_add("group-to-component mapping", &(group, component, access)));
        }
        self.component_to_groups.entry(ka).or_default().insert(group.clone());
        Ok(())
    }

    pub fn remove_group_to_component(&mut self, group: &G, component: &K, access: &A) -> Result<(), GraphError> {
        let ka = (component.clone(), access.clone());
        let removed = self.group_to_components.get_mut(group).is_some_and(|set| set.remove(&ka));
        if !removed {
            return Err(idempotent_remove("group-to-component mapping", &(group, component, access)));
        }
        if let Some(groups) = self.component_to_groups.get_mut(&ka) {
            groups.remove(group);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Tipos de entidad y entidades
    // ------------------------------------------------------------------

    pub fn add_entity_type(&mut self, entity_type: &str) -> Result<(), GraphError> {
        if self.entities.contains_key(entity_type) {
            return Err(idempotent_add("entity type", &entity_type));
        }
        self.entities.insert(entity_type.to_string(), BTreeSet::new());
        Ok(())
    }

    pub fn remove_entity_type(&mut self, entity_type: &str) -> Result<(), GraphError> {
        self.remove_entity_type_with_hooks(entity_type, |_, _| {}, || {})
    }

    /// Baja de un tipo de entidad con hooks pre y post eliminación.
    ///
    /// `pre_removal` recibe la cantidad de mapeos usuario-entidad y
    /// grupo-entidad que van a eliminarse; corre antes de tocar el grafo y
    /// `post_removal` corre al terminar, ambos dentro de la misma operación
    /// exclusiva para que el buffer actualice sus tablas sin carreras.
    pub fn remove_entity_type_with_hooks<Pre, Post>(&mut self,
                                                    entity_type: &str,
                                                    pre_removal: Pre,
                                                    post_removal: Post)
                                                    -> Result<(), GraphError>
        where Pre: FnOnce(usize, usize),
              Post: FnOnce()
    {
        if !self.entities.contains_key(entity_type) {
            return Err(idempotent_remove("entity type", &entity_type));
        }
        let members: Vec<String> = self.entities[entity_type].iter().cloned().collect();
        let mut user_mappings = 0;
        let mut group_mappings = 0;
        for entity in &members {
            let te = (entity_type.to_string(), entity.clone());
            user_mappings += self.entity_to_users.get(&te).map_or(0, BTreeSet::len);
            group_mappings += self.entity_to_groups.get(&te).map_or(0, BTreeSet::len);
        }
        pre_removal(user_mappings, group_mappings);
        for entity in &members {
            self.detach_entity(entity_type, entity);
        }
        self.entities.remove(entity_type);
        post_removal();
        Ok(())
    }

    pub fn add_entity(&mut self, entity_type: &str, entity: &str) -> Result<(), GraphError> {
        let members = self.entities.get_mut(entity_type).ok_or_else(|| not_found("entity type", &entity_type))?;
        if !members.insert(entity.to_string()) {
            return Err(idempotent_add("entity", &format_args!("{entity_type}/{entity}")));
        }
        Ok(())
    }

    pub fn remove_entity(&mut self, entity_type: &str, entity: &str) -> Result<(), GraphError> {
        self.remove_entity_with_hooks(entity_type, entity, |_, _| {}, || {})
    }

    /// Baja de una entidad con hooks pre y post eliminación; elimina también
    /// todos los mapeos usuario/grupo hacia ella.
    pub fn remove_entity_with_hooks<Pre, Post>(&mut self,
                                               entity_type: &str,
                                               entity: &str,
                                               pre_removal: Pre,
                                               post_removal: Post)
                                               -> Result<(), GraphError>
        where Pre: FnOnce(usize, usize),
              Post: FnOnce()
    {
        let present = self.entities.get(entity_type).is_some_and(|set| set.contains(entity));
        if !present {
            return Err(idempotent_remove("entity", &format_args!("{entity_type}/{entity}")));
        }
        let te = (entity_type.to_string(), entity.to_string());
        let user_mappings = self.entity_to_users.get(&te).map_or(0, BTreeSet::len);
        let group_mappings = self.entity_to_groups.get(&te).map_or(0, BTreeSet::len);
        pre_removal(user_mappings, group_mappings);
        self.detach_entity(entity_type, entity);
        if let Some(members) = self.entities.get_mut(entity_type) {
            members.remove(entity);
        }
        post_removal();
        Ok(())
    }

    /// Quita los mapeos usuario/grupo de una entidad y ajusta las tablas de
    /// frecuencia. No toca el registro de la entidad en su tipo.
    fn detach_entity(&mut self, entity_type: &str, entity: &str) {
        let te = (entity_type.to_string(), entity.to_string());
        if let Some(users) = self.entity_to_users.remove(&te) {
            for u in users {
                if let Some(mapped) = self.user_to_entities.get_mut(&u) {
                    mapped.remove(&te);
                }
                if let Some(count) = self.user_entity_counts.get_mut(&u) {
                    *count = count.saturating_sub(1);
                }
            }
        }
        if let Some(groups) = self.entity_to_groups.remove(&te) {
            for g in groups {
                if let Some(mapped) = self.group_to_entities.get_mut(&g) {
                    mapped.remove(&te);
                }
                if let Some(count) = self.group_entity_counts.get_mut(&g) {
                    *count = count.saturating_sub(1);
                }
            }
        }
    }

    pub fn add_user_to_entity(&mut self, user: &U, entity_type: &str, entity: &str) -> Result<(), GraphError> {
        if !self.contains_user(user) {
            return Err(not_found("user", user));
        }
        if !self.contains_entity_type(entity_type) {
            return Err(not_found("entity type", &entity_type));
        }
        if !self.contains_entity(entity_type, entity) {
            return Err(not_found("entity", &format_args!("{entity_type}/{entity}")));
        }
        let te = (entity_type.to_string(), entity.to_string());
        if !self.user_to_entities.entry(user.clone()).or_default().insert(te.clone()) {
            return Err(idempotent_add("user-to-entity mapping", &(user, entity_type, entity)));
        }
        self.entity_to_users.entry(te).or_default().insert(user.clone());
        *self.user_entity_counts.entry(user.clone()).or_insert(0) += 1;
        Ok(())
    }

    pub fn remove_user_to_entity(&mut self, user: &U, entity_type: &str, entity: &str) -> Result<(), GraphError> {
        let te = (entity_type.to_string(), entity.to_string());
        let removed = self.user_to_entities.get_mut(user).is_some_and(|set| set.remove(&te));
        if !removed {
            return Err(idempotent_remove("user-to-entity mapping", &(user, entity_type, entity)));
        }
        if let Some(users) = self.entity_to_users.get_mut(&te) {
            users.remove(user);
        }
        if let Some(count) = self.user_entity_counts.get_mut(user) {
            *count = count.saturating_sub(1);
        }
        Ok(())
    }

    pub fn add_group_to_entity(&mut self, group: &G, entity_type: &str, entity: &str) -> Result<(), GraphError> {
        if !self.contains_group(group) {
            return Err(not_found("group", group));
        }
        if !self.contains_entity_type(entity_type) {
            return Err(not_found("entity type", &entity_type));
        }
        if !self.contains_entity(entity_type, entity) {
            return Err(not_found("entity", &format_args!("{entity_type}/{entity}")));
        }
        let te = (entity_type.to_string(), entity.to_string());
        if !self.group_to_entities.entry(group.clone()).or_default().insert(te.clone()) {
            return Err(idempotent_add("group-to-entity mapping", &(group, entity_type, entity)));
        }
        self.entity_to_groups.entry(te).or_default().insert(group.clone());
        *self.group_entity_counts.entry(group.clone()).or_insert(0) += 1;
        Ok(())
    }

    pub fn remove_group_to_entity(&mut self, group: &G, entity_type: &str, entity: &str) -> Result<(), GraphError> {
        let te = (entity_type.to_string(), entity.to_string());
        let removed = self.group_to_entities.get_mut(group).is_some_and(|set| set.remove(&te));
        if !removed {
            return Err(idempotent_remove("group-to-entity mapping", &(group, entity_type, entity)));
        }
        if let Some(groups) = self.entity_to_groups.get_mut(&te) {
            groups.remove(group);
        }
        if let Some(count) = self.group_entity_counts.get_mut(group) {
            *count = count.saturating_sub(1);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Consultas
    // ------------------------------------------------------------------

    fn closure_ids(&self, groups: impl IntoIterator<Item = u32>, use_reverse: bool) -> BTreeSet<G> {
        let sources: Vec<u32> = groups.into_iter().collect();
        self.groups
            .reach(&sources, use_reverse)
            .into_iter()
            .map(|id| self.groups.get(id).clone())
            .collect()
    }

    /// Grupos directos del usuario, más el cierre por herencia si
    /// `transitive`.
    pub fn user_to_groups(&self, user: &U, transitive: bool) -> Result<BTreeSet<G>, GraphError> {
        if !self.contains_user(user) {
            return Err(not_found("user", user));
        }
        let mut result: BTreeSet<G> = self.user_to_groups.get(user).cloned().unwrap_or_default();
        if transitive {
            let ids: Vec<u32> = result.iter().filter_map(|g| self.groups.id_of(g)).collect();
            result.extend(self.closure_ids(ids, false));
        }
        Ok(result)
    }

    /// Usuarios directos del grupo; con `transitive`, también los usuarios
    /// de todo grupo que herede (directa o transitivamente) de éste.
    pub fn group_to_users(&self, group: &G, transitive: bool) -> Result<BTreeSet<U>, GraphError> {
        let id = self.groups.id_of(group).ok_or_else(|| not_found("group", group))?;
        let mut result: BTreeSet<U> = self.group_to_users.get(group).cloned().unwrap_or_default();
        if transitive {
            for g in self.closure_ids([id], true) {
                if let Some(users) = self.group_to_users.get(&g) {
                    result.extend(users.iter().cloned());
                }
            }
        }
        Ok(result)
    }

    /// Grupos de los que `group` hereda: vecinos directos o cierre completo.
    pub fn group_to_groups(&self, group: &G, transitive: bool) -> Result<BTreeSet<G>, GraphError> {
        let id = self.groups.id_of(group).ok_or_else(|| not_found("group", group))?;
        if transitive {
            Ok(self.closure_ids([id], false))
        } else {
            Ok(self.groups.forward_of(id).iter().map(|n| self.groups.get(*n).clone()).collect())
        }
    }

    /// Grupos que heredan de `group` (dirección inversa de la jerarquía).
    pub fn group_reverse_mappings(&self, group: &G, transitive: bool) -> Result<BTreeSet<G>, GraphError> {
        let id = self.groups.id_of(group).ok_or_else(|| not_found("group", group))?;
        if transitive {
            Ok(self.closure_ids([id], true))
        } else {
            Ok(self.groups.reverse_of(id).iter().map(|n| self.groups.get(*n).clone()).collect())
        }
    }

    /// Variante sobre conjunto para el camino distribuido: cierre directo
    /// del conjunto, sin incluir los grupos de entrada.
    pub fn groups_to_groups(&self, groups: &BTreeSet<G>) -> BTreeSet<G> {
        let ids: Vec<u32> = groups.iter().filter_map(|g| self.groups.id_of(g)).collect();
        let mut reached = self.closure_ids(ids, false);
        for g in groups {
            reached.remove(g);
        }
        reached
    }

    /// Variante inversa sobre conjunto, sin incluir los grupos de entrada.
    pub fn groups_reverse_mappings(&self, groups: &BTreeSet<G>) -> BTreeSet<G> {
        let ids: Vec<u32> = groups.iter().filter_map(|g| self.groups.id_of(g)).collect();
        let mut reached = self.closure_ids(ids, true);
        for g in groups {
            reached.remove(g);
        }
        reached
    }

    fn effective_groups(&self, user: &U) -> BTreeSet<G> {
        self.user_to_groups(user, true).unwrap_or_default()
    }

    /// `true` si el usuario tiene el permiso directo o vía alguno de sus
    /// grupos efectivos. Usuario desconocido responde `false`.
    pub fn has_access_to_component(&self, user: &U, component: &K, access: &A) -> bool {
        let ka = (component.clone(), access.clone());
        if self.user_to_components.get(user).is_some_and(|set| set.contains(&ka)) {
            return true;
        }
        self.effective_groups(user)
            .iter()
            .any(|g| self.group_to_components.get(g).is_some_and(|set| set.contains(&ka)))
    }

    /// `true` si el usuario alcanza la entidad directa o transitivamente.
    pub fn has_access_to_entity(&self, user: &U, entity_type: &str, entity: &str) -> bool {
        let te = (entity_type.to_string(), entity.to_string());
        if self.user_to_entities.get(user).is_some_and(|set| set.contains(&te)) {
            return true;
        }
        self.effective_groups(user)
            .iter()
            .any(|g| self.group_to_entities.get(g).is_some_and(|set| set.contains(&te)))
    }

    pub fn components_accessible_by_user(&self, user: &U) -> Result<BTreeSet<(K, A)>, GraphError> {
        if !self.contains_user(user) {
            return Err(not_found("user", user));
        }
        let mut result: BTreeSet<(K, A)> = self.user_to_components.get(user).cloned().unwrap_or_default();
        result.extend(self.components_accessible_by_groups(&self.effective_groups(user)));
        Ok(result)
    }

    pub fn entities_accessible_by_user(&self, user: &U) -> Result<BTreeSet<(String, String)>, GraphError> {
        if !self.contains_user(user) {
            return Err(not_found("user", user));
        }
        let mut result: BTreeSet<(String, String)> = self.user_to_entities.get(user).cloned().unwrap_or_default();
        result.extend(self.entities_accessible_by_groups(&self.effective_groups(user)));
        Ok(result)
    }

    pub fn entities_of_type_accessible_by_user(&self, user: &U, entity_type: &str) -> Result<BTreeSet<String>, GraphError> {
        Ok(self.entities_accessible_by_user(user)?
               .into_iter()
               .filter(|(t, _)| t == entity_type)
               .map(|(_, e)| e)
               .collect())
    }

    /// Permisos directos de un conjunto de grupos (sin expandir herencia:
    /// el llamador distribuye la expansión).
    pub fn components_accessible_by_groups(&self, groups: &BTreeSet<G>) -> BTreeSet<(K, A)> {
        let mut result = BTreeSet::new();
        for g in groups {
            if let Some(set) = self.group_to_components.get(g) {
                result.extend(set.iter().cloned());
            }
        }
        result
    }

    pub fn entities_accessible_by_groups(&self, groups: &BTreeSet<G>) -> BTreeSet<(String, String)> {
        let mut result = BTreeSet::new();
        for g in groups {
            if let Some(set) = self.group_to_entities.get(g) {
                result.extend(set.iter().cloned());
            }
        }
        result
    }

    pub fn has_access_to_component_by_groups(&self, groups: &BTreeSet<G>, component: &K, access: &A) -> bool {
        let ka = (component.clone(), access.clone());
        groups.iter().any(|g| self.group_to_components.get(g).is_some_and(|set| set.contains(&ka)))
    }

    pub fn has_access_to_entity_by_groups(&self, groups: &BTreeSet<G>, entity_type: &str, entity: &str) -> bool {
        let te = (entity_type.to_string(), entity.to_string());
        groups.iter().any(|g| self.group_to_entities.get(g).is_some_and(|set| set.contains(&te)))
    }

    // ------------------------------------------------------------------
    // Tablas de frecuencia
    // ------------------------------------------------------------------

    pub fn entity_mapping_count_for_user(&self, user: &U) -> usize {
        self.user_entity_counts.get(user).copied().unwrap_or(0)
    }

    pub fn entity_mapping_count_for_group(&self, group: &G) -> usize {
        self.group_entity_counts.get(group).copied().unwrap_or(0)
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub fn entities_of_type(&self, entity_type: &str) -> Result<BTreeSet<String>, GraphError> {
        self.entities.get(entity_type).cloned().ok_or_else(|| not_found("entity type", &entity_type))
    }
}

impl<U: Element, G: Element, K: Element, A: Element> PartialEq for AccessGraph<U, G, K, A> {
    /// Igualdad arista-por-arista, independiente de los índices internos de
    /// la arena (el replay puede asignar índices distintos).
    fn eq(&self, other: &Self) -> bool {
        let edges = |graph: &Self| -> BTreeSet<(G, G)> {
            graph.groups
                 .groups()
                 .flat_map(|g| {
                     let id = graph.groups.id_of(g).expect("grupo vivo");
                     graph.groups
                          .forward_of(id)
                          .iter()
                          .map(|to| (g.clone(), graph.groups.get(*to).clone()))
                          .collect::<Vec<_>>()
                 })
                 .collect()
        };
        self.users == other.users
        && self.user_to_groups == other.user_to_groups
        && self.groups.groups().cloned().collect::<BTreeSet<_>>() == other.groups.groups().cloned().collect::<BTreeSet<_>>()
        && edges(self) == edges(other)
        && self.user_to_components == other.user_to_components
        && self.group_to_components == other.group_to_components
        && self.entities == other.entities
        && self.user_to_entities == other.user_to_entities
        && self.group_to_entities == other.group_to_entities
    }
}
