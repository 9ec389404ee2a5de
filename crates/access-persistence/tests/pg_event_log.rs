use access_core::{Stringifiers, ValidatedEventBuffer};
use access_persistence::config::DbConfig;
use access_persistence::pg::{build_pool, PgStorageDriver, PoolProvider};
use access_persistence::temporal::load_fresh;
use access_persistence::{LoadCutoff, StorageDriver, TemporalEventLog};

// Paridad Postgres ↔ in-memory: mismo contrato de orden y replay. Corre
// sólo con DATABASE_URL definido.
#[test]
fn pg_round_trip_preserves_order_and_state() {
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("skip pg_round_trip_preserves_order_and_state (no DATABASE_URL)");
        return;
    }
    let cfg = DbConfig::from_env();
    // min/max=1 para descartar condiciones de carrera de r2d2 en el test.
    let pool = build_pool(&cfg.url, 1, 1).expect("pool");
    let driver = PgStorageDriver::new(PoolProvider { pool });
    let log = TemporalEventLog::new(driver);

    let buffer: ValidatedEventBuffer<String, String, String, String> =
        ValidatedEventBuffer::new(Stringifiers::for_strings());
    // Arrancar después de lo que haya dejado otra corrida en la tabla.
    if let Ok(Some(last)) = log.driver().last() {
        buffer.set_next_sequence(last.header.sequence + 1);
    }

    let base = buffer.next_sequence();
    buffer.add_user(format!("pg-user-{base}")).unwrap();
    buffer.add_group(format!("pg-group-{base}")).unwrap();
    buffer.add_user_to_group(format!("pg-user-{base}"), format!("pg-group-{base}")).unwrap();
    let batch = buffer.drain();
    log.persist(&batch.events).unwrap();

    let stored = log.driver().read_range(base, base + 2).unwrap();
    assert_eq!(stored.len(), 3);
    for (offset, event) in stored.iter().enumerate() {
        assert_eq!(event.header.sequence, base + offset as i64);
    }

    let strs = Stringifiers::for_strings();
    let (replayed, digest) = load_fresh(&log, LoadCutoff::Now, &strs).unwrap();
    assert!(digest.sequence >= base + 2);
    assert!(replayed.graph().contains_user(&format!("pg-user-{base}")));
    assert!(replayed.graph()
                    .user_to_groups(&format!("pg-user-{base}"), false)
                    .unwrap()
                    .contains(&format!("pg-group-{base}")));
}
