// Demo del nodo: arma un AccessNode con driver en memoria, aplica un
// escenario de autorización y muestra consultas directas y transitivas.

use accessmanager_rust::{AccessNode, NodeConfig};
use access_persistence::{InMemoryStorageDriver, LoadCutoff, TemporalEventLog};
use access_core::{DependencyFreeAccessManager, Stringifiers};

#[tokio::main]
async fn main() {
    let config = match NodeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuración inválida: {e}");
            std::process::exit(1);
        }
    };

    let node = AccessNode::start(&config, InMemoryStorageDriver::new()).expect("arranque del nodo");
    let buffer = node.buffer();

    // Escenario: alice administra Settings vía el grupo admins.
    buffer.add_user("alice".to_string()).expect("add_user");
    buffer.add_group("admins".to_string()).expect("add_group");
    buffer.add_user_to_group("alice".to_string(), "admins".to_string()).expect("mapping");
    buffer.add_group_to_component("admins".to_string(), "Settings".to_string(), "Modify".to_string())
          .expect("grant");

    // El mapeo a entidad sintetiza tipo y entidad (modo dependency-free).
    buffer.add_user_to_entity("bob".to_string(), "Client", "Acme").expect("entity mapping");

    {
        let manager = buffer.read_manager();
        let graph = manager.graph();
        println!("alice puede modificar Settings: {}",
                 graph.has_access_to_component(&"alice".to_string(), &"Settings".to_string(), &"Modify".to_string()));
        println!("alice puede ver Settings:       {}",
                 graph.has_access_to_component(&"alice".to_string(), &"Settings".to_string(), &"View".to_string()));
        println!("entidades de bob:               {:?}",
                 graph.entities_accessible_by_user(&"bob".to_string()).expect("bob existe"));
    }

    // Flush manual y verificación de replay contra un manager nuevo.
    let persisted = node.flush().expect("flush");
    println!("eventos persistidos: {persisted}");

    let strs = Stringifiers::for_strings();
    let mut replayed: DependencyFreeAccessManager<String, String, String, String> = DependencyFreeAccessManager::new();
    let log: &TemporalEventLog<_> = node.temporal_log();
    let digest = log.load(LoadCutoff::Now, &mut replayed, &strs).expect("replay");
    println!("replay hasta secuencia {}: grafos iguales = {}",
             digest.sequence,
             replayed.graph() == buffer.read_manager().graph());

    node.shutdown().await;
}
