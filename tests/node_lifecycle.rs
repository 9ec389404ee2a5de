use std::sync::Arc;
use std::time::Duration;

use accessmanager_rust::{AccessNode, NodeConfig};
use access_core::{DependencyFreeAccessManager, Stringifiers};
use access_persistence::temporal::load_fresh;
use access_persistence::{InMemoryStorageDriver, LoadCutoff};
use access_policies::{FlushStrategyParams, SizeParams};

fn s(v: &str) -> String {
    v.to_string()
}

fn manual_config() -> NodeConfig {
    NodeConfig { flush: FlushStrategyParams::Manual, ..NodeConfig::default() }
}

#[tokio::test]
async fn node_flushes_and_replay_matches_live_state() {
    let node = AccessNode::start(&manual_config(), InMemoryStorageDriver::new()).unwrap();
    let buffer = node.buffer();

    buffer.add_user(s("alice")).unwrap();
    buffer.add_group(s("admins")).unwrap();
    buffer.add_user_to_group(s("alice"), s("admins")).unwrap();
    buffer.add_group_to_component(s("admins"), s("Settings"), s("Modify")).unwrap();
    buffer.add_user_to_entity(s("bob"), "Client", "Acme").unwrap();

    let persisted = node.flush().unwrap();
    assert_eq!(persisted, buffer.next_sequence() as usize);
    assert_eq!(node.cache().len(), persisted);

    let strs = Stringifiers::for_strings();
    let (replayed, digest) = load_fresh(node.temporal_log(), LoadCutoff::Now, &strs).unwrap();
    assert_eq!(digest.sequence, buffer.next_sequence() - 1);
    assert!(replayed.graph() == buffer.read_manager().graph());

    node.shutdown().await;
}

#[tokio::test]
async fn restart_resumes_state_and_sequence() {
    let driver = Arc::new(InMemoryStorageDriver::new());

    let first = AccessNode::start(&manual_config(), Arc::clone(&driver)).unwrap();
    assert!(first.started_from().is_none());
    first.buffer().add_user(s("alice")).unwrap();
    first.buffer().add_user(s("bob")).unwrap();
    first.flush().unwrap();
    first.shutdown().await;

    let second = AccessNode::start(&manual_config(), Arc::clone(&driver)).unwrap();
    let digest = second.started_from().expect("el log ya tiene historia");
    assert_eq!(digest.sequence, 1);
    assert_eq!(second.buffer().next_sequence(), 2);
    assert!(second.buffer().read_manager().graph().contains_user(&s("alice")));

    // Las mutaciones nuevas continúan el log sin pisar secuencias.
    second.buffer().add_user(s("carol")).unwrap();
    second.flush().unwrap();
    let strs = Stringifiers::for_strings();
    let (replayed, digest) = load_fresh(second.temporal_log(), LoadCutoff::Now, &strs).unwrap();
    assert_eq!(digest.sequence, 2);
    assert_eq!(replayed.graph().user_count(), 3);

    second.shutdown().await;
}

#[tokio::test]
async fn size_strategy_worker_flushes_on_threshold() {
    let config = NodeConfig { flush: FlushStrategyParams::Size(SizeParams { threshold: 5 }),
                              ..NodeConfig::default() };
    let node = AccessNode::start(&config, InMemoryStorageDriver::new()).unwrap();
    for i in 0..5 {
        node.buffer().add_user(format!("u{i}")).unwrap();
    }

    // El worker consulta los contadores y drena solo.
    let mut waited = Duration::ZERO;
    while node.buffer().buffered_total() > 0 && waited < Duration::from_secs(2) {
        tokio::time::sleep(Duration::from_millis(20)).await;
        waited += Duration::from_millis(20);
    }
    assert_eq!(node.buffer().buffered_total(), 0, "el worker debió drenar");

    let strs = Stringifiers::for_strings();
    let (replayed, _) = load_fresh(node.temporal_log(), LoadCutoff::Now, &strs).unwrap();
    assert_eq!(replayed.graph().user_count(), 5);

    node.shutdown().await;
}

#[tokio::test]
async fn shutdown_runs_a_final_flush() {
    let node = AccessNode::start(&manual_config(), InMemoryStorageDriver::new()).unwrap();
    node.buffer().add_user(s("alice")).unwrap();
    // Sin flush explícito: el shutdown drena lo pendiente.
    node.shutdown().await;

    let strs = Stringifiers::for_strings();
    let mut manager: DependencyFreeAccessManager<String, String, String, String> =
        DependencyFreeAccessManager::new();
    let digest = node.temporal_log().load(LoadCutoff::Now, &mut manager, &strs).unwrap();
    assert_eq!(digest.sequence, 0);
    assert!(manager.graph().contains_user(&s("alice")));
}
