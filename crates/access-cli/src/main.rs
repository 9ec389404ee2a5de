//! access-cli: Command Line Interface del motor de autorización
//!
//! Binario simple que demuestra el buffer validado, el log temporal y la
//! recarga point-in-time sin levantar un nodo completo. Para el wiring
//! completo (worker de flush, cache de eventos), ver el binario principal
//! en la raíz.

use access_core::{DependencyFreeAccessManager, Stringifiers, ValidatedEventBuffer};
use access_persistence::{InMemoryStorageDriver, LoadCutoff, TemporalEventLog};

fn main() {
    println!("access-cli");
    println!("==========");

    let buffer: ValidatedEventBuffer<String, String, String, String> =
        ValidatedEventBuffer::new(Stringifiers::for_strings());
    let log = TemporalEventLog::new(InMemoryStorageDriver::new());
    let strs = Stringifiers::for_strings();

    // Diez mutaciones; el mapeo a entidad sintetiza sus prerequisitos.
    buffer.add_user("alice".to_string()).expect("add_user");
    buffer.add_group("admins".to_string()).expect("add_group");
    buffer.add_group("operators".to_string()).expect("add_group");
    buffer.add_user_to_group("alice".to_string(), "admins".to_string()).expect("mapping");
    buffer.add_group_to_group("admins".to_string(), "operators".to_string()).expect("g2g");
    buffer.add_group_to_component("operators".to_string(), "Dashboard".to_string(), "View".to_string())
          .expect("grant");
    buffer.add_user_to_entity("alice".to_string(), "Client", "Acme").expect("entity grant");

    // Punto de control a mitad del log.
    let checkpoint = buffer.drain();
    let checkpoint_id = checkpoint.events.last().expect("hay eventos").header.event_id;
    log.persist(&checkpoint.events).expect("persist");

    buffer.add_user("bob".to_string()).expect("add_user");
    buffer.add_user_to_group("bob".to_string(), "operators".to_string()).expect("mapping");
    let tail = buffer.drain();
    log.persist(&tail.events).expect("persist");

    {
        let manager = buffer.read_manager();
        let graph = manager.graph();
        println!("alice ve Dashboard (vía admins → operators): {}",
                 graph.has_access_to_component(&"alice".to_string(), &"Dashboard".to_string(), &"View".to_string()));
        println!("usuarios totales: {}", graph.user_count());
    }

    // Time-travel: reconstruir el estado exacto del punto de control.
    let mut at_checkpoint: DependencyFreeAccessManager<String, String, String, String> =
        DependencyFreeAccessManager::new();
    let digest = log.load(LoadCutoff::Event(checkpoint_id), &mut at_checkpoint, &strs).expect("load");
    println!("en la secuencia {}: usuarios = {} (bob todavía no existía: {})",
             digest.sequence,
             at_checkpoint.graph().user_count(),
             !at_checkpoint.graph().contains_user(&"bob".to_string()));
}
