use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use access_core::hashing::fnv1a_32;
use access_core::{AccessEvent, AccessEventKind, DependencyFreeAccessManager, EventAction, EventHeader, StoredEvent,
                  Stringifiers};
use access_distribution::{ClientFactory, DataElement, DistributionError, OperationCoordinator, OperationType,
                          RetryPolicy, ShardClient, ShardConfig, ShardConfigSet, ShardRouter};

type Manager = DependencyFreeAccessManager<String, String, String, String>;

fn s(v: &str) -> String {
    v.to_string()
}

/// Nodo simulado: estado local en un manager dependency-free, contadores de
/// contacto y una llave para forzar fallas permanentes de escritura.
struct MockShard {
    manager: Mutex<Manager>,
    received: Mutex<Vec<StoredEvent>>,
    query_contacts: AtomicUsize,
    fail_sends: bool,
}

impl MockShard {
    fn new() -> Arc<Self> {
        Arc::new(MockShard { manager: Mutex::new(Manager::new()),
                             received: Mutex::new(Vec::new()),
                             query_contacts: AtomicUsize::new(0),
                             fail_sends: false })
    }

    fn failing() -> Arc<Self> {
        Arc::new(MockShard { manager: Mutex::new(Manager::new()),
                             received: Mutex::new(Vec::new()),
                             query_contacts: AtomicUsize::new(0),
                             fail_sends: true })
    }

    fn seed(self: &Arc<Self>, apply: impl FnOnce(&mut Manager)) -> Arc<Self> {
        apply(&mut self.manager.lock().unwrap());
        Arc::clone(self)
    }

    fn received_kinds(&self) -> Vec<String> {
        self.received.lock().unwrap().iter().map(|e| e.kind.name().to_string()).collect()
    }

    fn contacts(&self) -> usize {
        self.query_contacts.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.query_contacts.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ShardClient for MockShard {
    async fn send_event(&self, event: &StoredEvent) -> Result<(), DistributionError> {
        if self.fail_sends {
            return Err(DistributionError::Remote { status: 409,
                                                   code: "CycleDetected".into(),
                                                   message: "rejected".into(),
                                                   target: None });
        }
        self.manager.lock().unwrap().apply_event(event.header.action, &event.kind).map_err(|e| {
            DistributionError::Remote { status: 422, code: "Graph".into(), message: e.to_string(), target: None }
        })?;
        self.received.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn user_to_groups(&self, user: &str, include_indirect: bool) -> Result<BTreeSet<String>, DistributionError> {
        self.touch();
        Ok(self.manager.lock().unwrap().graph().user_to_groups(&s(user), include_indirect).unwrap_or_default())
    }

    async fn entities_accessible_by_user(&self, user: &str)
                                         -> Result<BTreeSet<(String, String)>, DistributionError> {
        self.touch();
        Ok(self.manager.lock().unwrap().graph().entities_accessible_by_user(&s(user)).unwrap_or_default())
    }

    async fn components_accessible_by_user(&self, user: &str)
                                           -> Result<BTreeSet<(String, String)>, DistributionError> {
        self.touch();
        Ok(self.manager.lock().unwrap().graph().components_accessible_by_user(&s(user)).unwrap_or_default())
    }

    async fn has_access_to_component(&self, user: &str, component: &str, access: &str)
                                     -> Result<bool, DistributionError> {
        self.touch();
        Ok(self.manager.lock().unwrap().graph().has_access_to_component(&s(user), &s(component), &s(access)))
    }

    async fn has_access_to_entity(&self, user: &str, entity_type: &str, entity: &str)
                                  -> Result<bool, DistributionError> {
        self.touch();
        Ok(self.manager.lock().unwrap().graph().has_access_to_entity(&s(user), entity_type, entity))
    }

    async fn groups_to_groups(&self, groups: &BTreeSet<String>) -> Result<BTreeSet<String>, DistributionError> {
        self.touch();
        Ok(self.manager.lock().unwrap().graph().groups_to_groups(groups))
    }

    async fn components_accessible_by_groups(&self, groups: &BTreeSet<String>)
                                             -> Result<BTreeSet<(String, String)>, DistributionError> {
        self.touch();
        Ok(self.manager.lock().unwrap().graph().components_accessible_by_groups(groups))
    }

    async fn entities_accessible_by_groups(&self, groups: &BTreeSet<String>)
                                           -> Result<BTreeSet<(String, String)>, DistributionError> {
        self.touch();
        Ok(self.manager.lock().unwrap().graph().entities_accessible_by_groups(groups))
    }

    async fn has_access_to_component_by_groups(&self,
                                               groups: &BTreeSet<String>,
                                               component: &str,
                                               access: &str)
                                               -> Result<bool, DistributionError> {
        self.touch();
        Ok(self.manager.lock().unwrap().graph().has_access_to_component_by_groups(groups, &s(component), &s(access)))
    }

    async fn has_access_to_entity_by_groups(&self,
                                            groups: &BTreeSet<String>,
                                            entity_type: &str,
                                            entity: &str)
                                            -> Result<bool, DistributionError> {
        self.touch();
        Ok(self.manager.lock().unwrap().graph().has_access_to_entity_by_groups(groups, entity_type, entity))
    }
}

struct MockFactory {
    shards: HashMap<String, Arc<MockShard>>,
}

impl ClientFactory for MockFactory {
    fn client_for(&self, shard: &ShardConfig, _operation: OperationType) -> Arc<dyn ShardClient> {
        Arc::clone(&self.shards[&shard.base_url]) as Arc<dyn ShardClient>
    }
}

fn shard_config(start: i32, url: &str) -> ShardConfig {
    ShardConfig { hash_range_start: start, base_url: url.to_string() }
}

fn router(config: ShardConfigSet, shards: HashMap<String, Arc<MockShard>>) -> Arc<ShardRouter> {
    let retry = RetryPolicy { base_delay: Duration::from_millis(1), ..RetryPolicy::default() };
    Arc::new(ShardRouter::new(config, Arc::new(MockFactory { shards }), retry, Duration::from_secs(5)))
}

fn stored_event(action: EventAction, kind: AccessEventKind<String, String, String, String>) -> StoredEvent {
    let strs = Stringifiers::for_strings();
    AccessEvent { header: EventHeader { event_id: uuid::Uuid::new_v4(),
                                        action,
                                        occurred_at: chrono::Utc::now(),
                                        hash_code: strs.hash_code(&kind),
                                        sequence: 0 },
                  kind }
}

/// Configuración mínima: un shard por elemento/operación, todos respaldados
/// por mocks distintos.
fn single_shard_world() -> (Arc<ShardRouter>, HashMap<&'static str, Arc<MockShard>>) {
    let user_events = MockShard::new();
    let group_events = MockShard::new();
    let g2g_events = MockShard::new();
    let mut shards = HashMap::new();
    shards.insert("http://user-events".to_string(), Arc::clone(&user_events));
    shards.insert("http://group-events".to_string(), Arc::clone(&group_events));
    shards.insert("http://g2g-events".to_string(), Arc::clone(&g2g_events));
    let config = ShardConfigSet::from_entries(vec![
        (DataElement::User, OperationType::Event, vec![shard_config(i32::MIN, "http://user-events")]),
        (DataElement::Group, OperationType::Event, vec![shard_config(i32::MIN, "http://group-events")]),
        (DataElement::GroupToGroup, OperationType::Event, vec![shard_config(i32::MIN, "http://g2g-events")]),
    ]).unwrap();
    let router = router(config, shards);
    let mut by_name = HashMap::new();
    by_name.insert("user", user_events);
    by_name.insert("group", group_events);
    by_name.insert("g2g", g2g_events);
    (router, by_name)
}

#[tokio::test]
async fn events_route_to_the_owning_element_shard() {
    let (router, shards) = single_shard_world();

    router.route_event(&stored_event(EventAction::Add, AccessEventKind::User { user: s("alice") })).await.unwrap();
    router.route_event(&stored_event(EventAction::Add, AccessEventKind::Group { group: s("ops") })).await.unwrap();
    router.route_event(&stored_event(EventAction::Add,
                                     AccessEventKind::GroupToGroup { from_group: s("a"), to_group: s("b") }))
          .await
          .unwrap();

    assert_eq!(shards["user"].received_kinds(), vec!["user"]);
    assert_eq!(shards["group"].received_kinds(), vec!["group"]);
    assert_eq!(shards["g2g"].received_kinds(), vec!["groupToGroup"]);
}

#[tokio::test]
async fn user_to_group_is_written_to_both_sides() {
    let (router, shards) = single_shard_world();
    router.route_event(&stored_event(EventAction::Add,
                                     AccessEventKind::UserToGroup { user: s("alice"), group: s("ops") }))
          .await
          .unwrap();
    assert_eq!(shards["user"].received_kinds(), vec!["userToGroup"]);
    assert_eq!(shards["group"].received_kinds(), vec!["userToGroup"]);
}

#[tokio::test]
async fn partial_dual_write_emits_reconcile_to_the_successful_side() {
    let user_events = MockShard::new();
    let group_events = MockShard::failing();
    let mut shards = HashMap::new();
    shards.insert("http://user-events".to_string(), Arc::clone(&user_events));
    shards.insert("http://group-events".to_string(), Arc::clone(&group_events));
    let config = ShardConfigSet::from_entries(vec![
        (DataElement::User, OperationType::Event, vec![shard_config(i32::MIN, "http://user-events")]),
        (DataElement::Group, OperationType::Event, vec![shard_config(i32::MIN, "http://group-events")]),
    ]).unwrap();
    let router = router(config, shards);

    let event = stored_event(EventAction::Add, AccessEventKind::UserToGroup { user: s("alice"), group: s("ops") });
    let err = router.route_event(&event).await.unwrap_err();
    assert!(matches!(err, DistributionError::AtShard { .. }));

    // La compensación corre en segundo plano hacia el lado que aplicó.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let kinds = user_events.received_kinds();
    assert_eq!(kinds, vec!["userToGroup", "reconcile"]);
    let received = user_events.received.lock().unwrap();
    assert_eq!(received[1].header.action, EventAction::Remove);
    // Tras aplicar la compensación el mapeo quedó revertido.
    drop(received);
    let manager = user_events.manager.lock().unwrap();
    assert!(manager.graph().user_to_groups(&s("alice"), false).unwrap().is_empty());
}

#[tokio::test]
async fn entity_events_broadcast_to_all_group_shards() {
    let group_a = MockShard::new();
    let group_b = MockShard::new();
    let mut shards = HashMap::new();
    shards.insert("http://group-a".to_string(), Arc::clone(&group_a));
    shards.insert("http://group-b".to_string(), Arc::clone(&group_b));
    let config = ShardConfigSet::from_entries(vec![
        (DataElement::Group, OperationType::Event,
         vec![shard_config(i32::MIN, "http://group-a"), shard_config(0, "http://group-b")]),
    ]).unwrap();
    let router = router(config, shards);

    router.route_event(&stored_event(EventAction::Add,
                                     AccessEventKind::EntityType { entity_type: s("Client") }))
          .await
          .unwrap();
    router.route_event(&stored_event(EventAction::Add,
                                     AccessEventKind::Entity { entity_type: s("Client"), entity: s("Acme") }))
          .await
          .unwrap();

    assert_eq!(group_a.received_kinds(), vec!["entityType", "entity"]);
    assert_eq!(group_b.received_kinds(), vec!["entityType", "entity"]);
}

// Tres shards de consulta de grupos; los grupos del usuario
// caen en los shards 1 y 3, el 2 no se contacta, y el resultado es la unión.
#[tokio::test]
async fn accessible_entities_fan_out_only_to_owning_shards() {
    let g1 = s("grupo-uno");
    let g2 = s("grupo-dos");
    let (low, high) = {
        let (a, b) = (fnv1a_32(&g1), fnv1a_32(&g2));
        assert_ne!(a, b);
        (a.min(b), a.max(b))
    };
    let (low_group, high_group) = if fnv1a_32(&g1) <= fnv1a_32(&g2) { (g1.clone(), g2.clone()) } else { (g2.clone(), g1.clone()) };

    // Rangos construidos alrededor de los hashes: shard1 posee `low`,
    // shard3 posee `high`, shard2 el hueco entre ambos.
    let shard1 = MockShard::new().seed(|m| {
        m.add_group(low_group.clone()).unwrap();
        m.apply_event(EventAction::Add,
                      &AccessEventKind::GroupToEntity { group: low_group.clone(),
                                                        entity_type: s("Client"),
                                                        entity: s("Acme") })
         .unwrap();
    });
    let shard2 = MockShard::new();
    let shard3 = MockShard::new().seed(|m| {
        m.add_group(high_group.clone()).unwrap();
        m.apply_event(EventAction::Add,
                      &AccessEventKind::GroupToEntity { group: high_group.clone(),
                                                        entity_type: s("Client"),
                                                        entity: s("Globex") })
         .unwrap();
    });
    let user_shard = MockShard::new().seed(|m| {
        m.add_user(s("u")).unwrap();
        m.add_user_to_group(s("u"), g1.clone()).unwrap();
        m.add_user_to_group(s("u"), g2.clone()).unwrap();
    });
    let g2g_shard = MockShard::new();

    let mut shards = HashMap::new();
    shards.insert("http://gq-1".to_string(), Arc::clone(&shard1));
    shards.insert("http://gq-2".to_string(), Arc::clone(&shard2));
    shards.insert("http://gq-3".to_string(), Arc::clone(&shard3));
    shards.insert("http://uq".to_string(), Arc::clone(&user_shard));
    shards.insert("http://g2gq".to_string(), Arc::clone(&g2g_shard));

    let config = ShardConfigSet::from_entries(vec![
        (DataElement::Group, OperationType::Query,
         vec![shard_config(i32::MIN, "http://gq-1"),
              shard_config(low.saturating_add(1), "http://gq-2"),
              shard_config(high, "http://gq-3")]),
        (DataElement::User, OperationType::Query, vec![shard_config(i32::MIN, "http://uq")]),
        (DataElement::GroupToGroup, OperationType::Query, vec![shard_config(i32::MIN, "http://g2gq")]),
    ]).unwrap();
    let router = router(config, shards);
    let coordinator = OperationCoordinator::new(router);

    let entities = coordinator.entities_accessible_by_user("u").await.unwrap();
    let expected: BTreeSet<(String, String)> =
        [(s("Client"), s("Acme")), (s("Client"), s("Globex"))].into_iter().collect();
    assert_eq!(entities, expected);
    assert_eq!(shard2.contacts(), 0, "el shard 2 no posee grupos del usuario");
    assert!(shard1.contacts() > 0);
    assert!(shard3.contacts() > 0);
}

#[tokio::test]
async fn has_access_expands_inheritance_across_shards() {
    // u -> base; base hereda de top (mapeo en el shard g2g); top tiene el
    // permiso. Todo en shards de un solo rango para simplificar.
    let user_shard = MockShard::new().seed(|m| {
        m.add_user(s("u")).unwrap();
        m.add_user_to_group(s("u"), s("base")).unwrap();
    });
    let g2g_shard = MockShard::new().seed(|m| {
        m.add_group_to_group(s("base"), s("top")).unwrap();
    });
    let group_shard = MockShard::new().seed(|m| {
        m.add_group(s("top")).unwrap();
        m.apply_event(EventAction::Add,
                      &AccessEventKind::GroupToComponent { group: s("top"),
                                                           component: s("Settings"),
                                                           access: s("Modify") })
         .unwrap();
    });

    let mut shards = HashMap::new();
    shards.insert("http://uq".to_string(), Arc::clone(&user_shard));
    shards.insert("http://g2gq".to_string(), Arc::clone(&g2g_shard));
    shards.insert("http://gq".to_string(), Arc::clone(&group_shard));
    let config = ShardConfigSet::from_entries(vec![
        (DataElement::User, OperationType::Query, vec![shard_config(i32::MIN, "http://uq")]),
        (DataElement::GroupToGroup, OperationType::Query, vec![shard_config(i32::MIN, "http://g2gq")]),
        (DataElement::Group, OperationType::Query, vec![shard_config(i32::MIN, "http://gq")]),
    ]).unwrap();
    let router = router(config, shards);
    let coordinator = OperationCoordinator::new(router);

    assert!(coordinator.has_access_to_component("u", "Settings", "Modify").await.unwrap());
    assert!(!coordinator.has_access_to_component("u", "Settings", "View").await.unwrap());
    assert_eq!(coordinator.user_to_groups("u", true).await.unwrap(),
               ["base", "top"].iter().map(|g| g.to_string()).collect::<BTreeSet<_>>());
}
