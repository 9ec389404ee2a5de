use access_core::{DependencyFreeAccessManager, Stringifiers, ValidatedEventBuffer};
use access_persistence::temporal::load_fresh;
use access_persistence::{InMemoryStorageDriver, LoadCutoff, PersistenceError, TemporalEventLog};

type Buffer = ValidatedEventBuffer<String, String, String, String>;
type Manager = DependencyFreeAccessManager<String, String, String, String>;

fn s(v: &str) -> String {
    v.to_string()
}

/// Carga de trabajo determinista con todas las familias de mutación.
fn apply_workload(buffer: &Buffer) {
    for i in 0..5 {
        buffer.add_user(format!("user{i}")).unwrap();
        buffer.add_group(format!("group{i}")).unwrap();
    }
    for i in 0..5 {
        buffer.add_user_to_group(format!("user{i}"), format!("group{i}")).unwrap();
    }
    for i in 0..4 {
        buffer.add_group_to_group(format!("group{i}"), format!("group{}", i + 1)).unwrap();
    }
    buffer.add_group_to_component(s("group4"), s("Settings"), s("Modify")).unwrap();
    buffer.add_user_to_component(s("user0"), s("Reports"), s("View")).unwrap();
    buffer.add_entity_type("Client").unwrap();
    buffer.add_entity("Client", "Acme").unwrap();
    buffer.add_user_to_entity(s("user1"), "Client", "Acme").unwrap();
    buffer.add_group_to_entity(s("group2"), "Client", "Acme").unwrap();
    // Algunas bajas para cubrir el camino inverso.
    buffer.remove_user_to_group(s("user3"), s("group3")).unwrap();
    buffer.remove_user(s("user4")).unwrap();
    buffer.remove_entity("Client", "Acme").unwrap();
    buffer.add_entity("Client", "Globex").unwrap();
    buffer.add_user_to_entity(s("user2"), "Client", "Globex").unwrap();
}

// Invariante central del log: el replay reproduce el grafo vivo, arista
// por arista.
#[test]
fn replay_reproduces_the_live_graph() {
    let buffer = Buffer::new(Stringifiers::for_strings());
    let log = TemporalEventLog::new(InMemoryStorageDriver::new());
    apply_workload(&buffer);

    let batch = buffer.drain();
    log.persist(&batch.events).unwrap();

    let strs = Stringifiers::for_strings();
    let (replayed, digest) = load_fresh(&log, LoadCutoff::Now, &strs).unwrap();
    assert_eq!(digest.sequence, batch.events.last().unwrap().header.sequence);
    assert!(replayed.graph() == buffer.read_manager().graph());
}

// Lo mismo con flushes parciales: persistir en varios lotes no cambia el
// resultado del replay.
#[test]
fn replay_is_batch_boundary_independent() {
    let strs = Stringifiers::for_strings();

    let single = Buffer::new(Stringifiers::for_strings());
    let single_log = TemporalEventLog::new(InMemoryStorageDriver::new());
    apply_workload(&single);
    single_log.persist(&single.drain().events).unwrap();

    let chunked = Buffer::new(Stringifiers::for_strings());
    let chunked_log = TemporalEventLog::new(InMemoryStorageDriver::new());
    for i in 0..5 {
        chunked.add_user(format!("user{i}")).unwrap();
        chunked.add_group(format!("group{i}")).unwrap();
        chunked_log.persist(&chunked.drain().events).unwrap();
    }
    for i in 0..5 {
        chunked.add_user_to_group(format!("user{i}"), format!("group{i}")).unwrap();
    }
    for i in 0..4 {
        chunked.add_group_to_group(format!("group{i}"), format!("group{}", i + 1)).unwrap();
    }
    chunked_log.persist(&chunked.drain().events).unwrap();
    chunked.add_group_to_component(s("group4"), s("Settings"), s("Modify")).unwrap();
    chunked.add_user_to_component(s("user0"), s("Reports"), s("View")).unwrap();
    chunked.add_entity_type("Client").unwrap();
    chunked.add_entity("Client", "Acme").unwrap();
    chunked.add_user_to_entity(s("user1"), "Client", "Acme").unwrap();
    chunked.add_group_to_entity(s("group2"), "Client", "Acme").unwrap();
    chunked.remove_user_to_group(s("user3"), s("group3")).unwrap();
    chunked.remove_user(s("user4")).unwrap();
    chunked.remove_entity("Client", "Acme").unwrap();
    chunked.add_entity("Client", "Globex").unwrap();
    chunked.add_user_to_entity(s("user2"), "Client", "Globex").unwrap();
    chunked_log.persist(&chunked.drain().events).unwrap();

    let (from_single, _) = load_fresh(&single_log, LoadCutoff::Now, &strs).unwrap();
    let (from_chunked, _) = load_fresh(&chunked_log, LoadCutoff::Now, &strs).unwrap();
    assert!(from_single.graph() == from_chunked.graph());
}

// Recargar por event id reproduce el estado exacto de ese punto.
#[test]
fn time_travel_by_event_id() {
    let buffer = Buffer::new(Stringifiers::for_strings());
    let log = TemporalEventLog::new(InMemoryStorageDriver::new());

    for i in 0..10 {
        buffer.add_user(format!("user{i}")).unwrap();
    }
    let checkpoint = buffer.drain();
    let checkpoint_id = checkpoint.events.last().unwrap().header.event_id;
    log.persist(&checkpoint.events).unwrap();

    for i in 10..15 {
        buffer.add_user(format!("user{i}")).unwrap();
    }
    log.persist(&buffer.drain().events).unwrap();

    let strs = Stringifiers::for_strings();
    let mut at_checkpoint = Manager::new();
    let digest = log.load(LoadCutoff::Event(checkpoint_id), &mut at_checkpoint, &strs).unwrap();
    assert_eq!(digest.sequence, 9);
    assert_eq!(at_checkpoint.graph().user_count(), 10);
    assert!(!at_checkpoint.graph().contains_user(&s("user10")));

    let (current, _) = load_fresh(&log, LoadCutoff::Now, &strs).unwrap();
    assert_eq!(current.graph().user_count(), 15);
}

#[test]
fn time_cutoff_selects_greatest_event_at_or_before() {
    let buffer = Buffer::new(Stringifiers::for_strings());
    let log = TemporalEventLog::new(InMemoryStorageDriver::new());

    buffer.add_user(s("early")).unwrap();
    let first = buffer.drain();
    let first_ts = first.events[0].header.occurred_at;
    log.persist(&first.events).unwrap();

    // El timestamp del segundo evento debe quedar estrictamente después.
    std::thread::sleep(std::time::Duration::from_millis(2));
    buffer.add_user(s("late")).unwrap();
    log.persist(&buffer.drain().events).unwrap();

    let strs = Stringifiers::for_strings();
    let mut manager = Manager::new();
    let digest = log.load(LoadCutoff::Time(first_ts), &mut manager, &strs).unwrap();
    assert_eq!(digest.sequence, 0);
    assert!(manager.graph().contains_user(&s("early")));
    assert!(!manager.graph().contains_user(&s("late")));

    // Un instante anterior a todo el log: no hay evento que satisfaga.
    let mut empty = Manager::new();
    let too_early = first_ts - chrono::Duration::seconds(1);
    assert!(matches!(log.load(LoadCutoff::Time(too_early), &mut empty, &strs),
                     Err(PersistenceError::Empty)));
}

#[test]
fn empty_storage_is_a_distinct_condition() {
    let log = TemporalEventLog::new(InMemoryStorageDriver::new());
    let strs = Stringifiers::for_strings();
    assert!(matches!(load_fresh(&log, LoadCutoff::Now, &strs), Err(PersistenceError::Empty)));

    let unknown = uuid::Uuid::new_v4();
    let mut manager = Manager::new();
    assert!(matches!(log.load(LoadCutoff::Event(unknown), &mut manager, &strs),
                     Err(PersistenceError::EventNotFound(_))));
}

// El persister exige orden estrictamente ascendente entre y dentro de lotes.
#[test]
fn out_of_order_batches_are_rejected() {
    let buffer = Buffer::new(Stringifiers::for_strings());
    let log = TemporalEventLog::new(InMemoryStorageDriver::new());
    buffer.add_user(s("a")).unwrap();
    buffer.add_user(s("b")).unwrap();
    let mut batch = buffer.drain();
    batch.events.swap(0, 1);
    assert!(matches!(log.persist(&batch.events), Err(PersistenceError::SequenceOrder(_))));

    // En orden correcto persiste, y re-persistir el mismo lote choca contra
    // la secuencia ya almacenada.
    batch.events.swap(0, 1);
    log.persist(&batch.events).unwrap();
    assert!(matches!(log.persist(&batch.events), Err(PersistenceError::SequenceOrder(_))));
}

#[test]
fn events_after_feeds_catch_up_reads() {
    let buffer = Buffer::new(Stringifiers::for_strings());
    let log = TemporalEventLog::new(InMemoryStorageDriver::new());
    for i in 0..6 {
        buffer.add_user(format!("u{i}")).unwrap();
    }
    log.persist(&buffer.drain().events).unwrap();

    let tail = log.events_after(3).unwrap();
    let sequences: Vec<i64> = tail.iter().map(|e| e.header.sequence).collect();
    assert_eq!(sequences, vec![4, 5]);
    assert!(log.events_after(5).unwrap().is_empty());
}
