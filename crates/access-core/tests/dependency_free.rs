use access_core::{AccessEventKind, DependencyFreeAccessManager, EventAction, GraphError, Prerequisite};

type Manager = DependencyFreeAccessManager<String, String, String, String>;
type Kind = AccessEventKind<String, String, String, String>;

fn s(v: &str) -> String {
    v.to_string()
}

#[test]
fn missing_prerequisites_are_synthesized_in_order() {
    let manager = Manager::new();
    let kind: Kind = AccessEventKind::UserToEntity { user: s("u"), entity_type: s("Client"), entity: s("Acme") };
    let missing = manager.missing_prerequisites(EventAction::Add, &kind);
    assert_eq!(missing,
               vec![Prerequisite::User(s("u")),
                    Prerequisite::EntityType(s("Client")),
                    Prerequisite::Entity(s("Client"), s("Acme"))]);
}

#[test]
fn prerequisites_shrink_as_the_graph_fills() {
    let mut manager = Manager::new();
    manager.add_user(s("u")).unwrap();
    let kind: Kind = AccessEventKind::UserToEntity { user: s("u"), entity_type: s("Client"), entity: s("Acme") };
    let missing = manager.missing_prerequisites(EventAction::Add, &kind);
    assert_eq!(missing, vec![Prerequisite::EntityType(s("Client")), Prerequisite::Entity(s("Client"), s("Acme"))]);

    manager.apply_event(EventAction::Add, &kind).unwrap();
    assert!(manager.missing_prerequisites(EventAction::Add, &kind).is_empty());
}

#[test]
fn removes_never_synthesize() {
    let manager = Manager::new();
    let kind: Kind = AccessEventKind::UserToGroup { user: s("u"), group: s("g") };
    assert!(manager.missing_prerequisites(EventAction::Remove, &kind).is_empty());
}

// Aplicar cualquier evento dos veces deja el mismo estado que una.
#[test]
fn applying_any_event_twice_is_idempotent() {
    let events: Vec<(EventAction, Kind)> = vec![
        (EventAction::Add, AccessEventKind::User { user: s("alice") }),
        (EventAction::Add, AccessEventKind::Group { group: s("admins") }),
        (EventAction::Add, AccessEventKind::UserToGroup { user: s("alice"), group: s("admins") }),
        (EventAction::Add,
         AccessEventKind::GroupToComponent { group: s("admins"), component: s("Settings"), access: s("Modify") }),
        (EventAction::Add, AccessEventKind::EntityType { entity_type: s("Client") }),
        (EventAction::Add, AccessEventKind::Entity { entity_type: s("Client"), entity: s("Acme") }),
        (EventAction::Add,
         AccessEventKind::UserToEntity { user: s("alice"), entity_type: s("Client"), entity: s("Acme") }),
        (EventAction::Remove, AccessEventKind::Entity { entity_type: s("Client"), entity: s("Acme") }),
        (EventAction::Remove, AccessEventKind::User { user: s("alice") }),
    ];

    let mut once = Manager::new();
    for (action, kind) in &events {
        once.apply_event(*action, kind).unwrap();
    }

    let mut twice = Manager::new();
    for (action, kind) in &events {
        twice.apply_event(*action, kind).unwrap();
        twice.apply_event(*action, kind).unwrap();
    }

    assert!(once.graph() == twice.graph());
}

// El split de semánticas es deliberado: el grafo directo señala
// IdempotentAdd/IdempotentRemove, el manager los absorbe.
#[test]
fn manager_swallows_what_the_graph_reports() {
    let mut manager = Manager::new();
    manager.add_user(s("u")).unwrap();
    manager.add_user(s("u")).unwrap();
    manager.remove_group(s("fantasma")).unwrap();
    manager.remove_user_to_entity(s("u"), "Client", "Acme").unwrap();

    let mut graph: access_core::AccessGraph<String, String, String, String> = access_core::AccessGraph::new();
    graph.add_user(s("u")).unwrap();
    assert!(matches!(graph.add_user(s("u")), Err(GraphError::IdempotentAdd { .. })));
    assert!(matches!(graph.remove_group(&s("fantasma")), Err(GraphError::IdempotentRemove { .. })));
}

#[test]
fn cycles_are_not_swallowed() {
    let mut manager = Manager::new();
    manager.add_group_to_group(s("A"), s("B")).unwrap();
    manager.add_group_to_group(s("B"), s("C")).unwrap();
    let err = manager.add_group_to_group(s("C"), s("A")).unwrap_err();
    assert!(matches!(err, GraphError::CycleDetected { .. }));
}

#[test]
fn reconcile_applies_as_user_to_group_change() {
    let mut manager = Manager::new();
    manager.apply_event(EventAction::Add, &AccessEventKind::Reconcile { user: s("u"), group: s("g") }).unwrap();
    assert!(manager.graph().user_to_groups(&s("u"), false).unwrap().contains(&s("g")));

    manager.apply_event(EventAction::Remove, &AccessEventKind::Reconcile { user: s("u"), group: s("g") }).unwrap();
    assert!(manager.graph().user_to_groups(&s("u"), false).unwrap().is_empty());
}
