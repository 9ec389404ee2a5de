//! Driver Postgres (Diesel) del log temporal.
//!
//! Objetivo general del módulo:
//! - Proveer una capa de persistencia durable (Postgres) con paridad 1:1
//!   respecto al driver en memoria.
//! - Mantener determinismo del motor: el replay de eventos debe reconstruir
//!   el mismo estado sin importar el backend.
//! - Aislar completamente el mapeo evento ↔ filas de DB del `access-core`.
//!
//! Garantías:
//! - Append transaccional todo-o-nada por lote, sin updates ni deletes, con
//!   `sequence` como PK (la asigna el buffer, no la base).
//! - Lecturas ordenadas por `sequence`, equivalentes al driver in-memory.
//! - Manejo básico de errores transitorios: reintento con backoff en las
//!   operaciones del driver.

use std::thread::sleep;
use std::time::Duration;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use log::{debug, warn};
use serde_json::Value;
use uuid::Uuid;

use access_core::{AccessEvent, EventAction, EventHeader, StoredEvent, StoredEventKind};

use crate::config::DbConfig;
use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;
use crate::schema::event_log;

/// Alias de tipo para el pool r2d2 de conexiones Postgres.
///
/// Notas operativas:
/// - El pool se construye con `min_idle` y `max_size`; el máximo acota las
///   conexiones concurrentes y hace back-pressure sobre los submitters.
/// - Al construirlo se corre automáticamente el set de migraciones
///   pendientes (una sola vez).
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Proveedor abstracto de conexiones.
///
/// Permite inyectar un pool real (producción/tests de integración) o
/// simular en tests unitarios sin acoplar a r2d2.
pub trait ConnectionProvider: Send + Sync + 'static {
    /// Obtiene una conexión lista para ejecutar consultas Diesel.
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError>;
}

/// Implementación de provider a partir de un pool r2d2.
pub struct PoolProvider {
    pub pool: PgPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError> {
        self.pool
            .get()
            .map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

/// Construye el pool y corre migraciones pendientes.
pub fn build_pool(url: &str, min: u32, max: u32) -> Result<PgPool, PersistenceError> {
    let manager = ConnectionManager::<PgConnection>::new(url);
    let pool = r2d2::Pool::builder().min_idle(Some(min))
                                    .max_size(max)
                                    .build(manager)
                                    .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))?;
    let mut conn = pool.get().map_err(|e| PersistenceError::TransientIo(format!("pool get: {e}")))?;
    run_pending_migrations(&mut conn)?;
    Ok(pool)
}

/// Pool de desarrollo desde variables de entorno (`DATABASE_URL`).
pub fn build_dev_pool_from_env() -> Result<PgPool, PersistenceError> {
    let cfg = DbConfig::from_env();
    build_pool(&cfg.url, cfg.min_connections, cfg.max_connections)
}

/// Fila para insertar en `event_log`.
#[derive(Insertable, Debug)]
#[diesel(table_name = event_log)]
struct NewEventRow<'a> {
    sequence: i64,
    event_id: &'a Uuid,
    action: i16,
    occurred_at: DateTime<Utc>,
    hash_code: i32,
    kind: &'a str,
    payload: Value,
}

/// Fila mapeada de `event_log` para lecturas.
///
/// - `sequence`: orden total del log, PK.
/// - `kind`: discriminador corto (pista/constraint de lectura).
/// - `payload`: JSONB con la representación completa del enum de kinds.
#[derive(Queryable, Debug)]
struct EventRow {
    sequence: i64,
    event_id: Uuid,
    action: i16,
    occurred_at: DateTime<Utc>,
    hash_code: i32,
    #[allow(dead_code)]
    kind: String,
    payload: Value,
}

fn row_to_event(row: EventRow) -> Result<StoredEvent, PersistenceError> {
    let kind: StoredEventKind = serde_json::from_value(row.payload)?;
    let action = match row.action {
        0 => EventAction::Add,
        1 => EventAction::Remove,
        other => return Err(PersistenceError::CorruptEvent(format!("action byte {other}"))),
    };
    Ok(AccessEvent { header: EventHeader { event_id: row.event_id,
                                           action,
                                           occurred_at: row.occurred_at,
                                           hash_code: row.hash_code,
                                           sequence: row.sequence },
                     kind })
}

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE_MS: u64 = 50;

/// Driver Postgres del contrato `StorageDriver`.
pub struct PgStorageDriver<P: ConnectionProvider> {
    provider: P,
}

impl<P: ConnectionProvider> PgStorageDriver<P> {
    pub fn new(provider: P) -> Self {
        PgStorageDriver { provider }
    }

    /// Ejecuta una operación con reintentos ante errores transitorios.
    fn with_retries<T>(&self,
                       label: &str,
                       mut op: impl FnMut(&mut PgConnection) -> Result<T, PersistenceError>)
                       -> Result<T, PersistenceError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = self.provider.connection().and_then(|mut conn| op(&mut conn));
            match result {
                Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                    let backoff = Duration::from_millis(BACKOFF_BASE_MS << (attempt - 1));
                    warn!("{label}: transient error (attempt {attempt}): {e}; retrying in {backoff:?}");
                    sleep(backoff);
                }
                other => return other,
            }
        }
    }
}

impl<P: ConnectionProvider> crate::storage::StorageDriver for PgStorageDriver<P> {
    fn append(&self, batch: &[StoredEvent]) -> Result<(), PersistenceError> {
        if batch.is_empty() {
            return Ok(());
        }
        self.with_retries("append", |conn| {
                let payloads: Vec<Value> =
                    batch.iter().map(|e| serde_json::to_value(&e.kind)).collect::<Result<_, _>>()?;
                let rows: Vec<NewEventRow<'_>> =
                    batch.iter()
                         .zip(payloads)
                         .map(|(event, payload)| NewEventRow { sequence: event.header.sequence,
                                                               event_id: &event.header.event_id,
                                                               action: i16::from(event.header.action.as_u8()),
                                                               occurred_at: event.header.occurred_at,
                                                               hash_code: event.header.hash_code,
                                                               kind: event.kind.name(),
                                                               payload })
                         .collect();
                conn.build_transaction().read_write().run(|conn| {
                        diesel::insert_into(event_log::table).values(&rows).execute(conn)?;
                        Ok::<_, PersistenceError>(())
                    })?;
                debug!("append: {} rows", rows.len());
                Ok(())
            })
    }

    fn read_range(&self, from_seq: i64, to_seq: i64) -> Result<Vec<StoredEvent>, PersistenceError> {
        self.with_retries("read_range", |conn| {
                let rows: Vec<EventRow> = event_log::table.filter(event_log::sequence.ge(from_seq))
                                                          .filter(event_log::sequence.le(to_seq))
                                                          .order(event_log::sequence.asc())
                                                          .load(conn)?;
                rows.into_iter().map(row_to_event).collect()
            })
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<StoredEvent>, PersistenceError> {
        self.with_retries("find_by_id", |conn| {
                let row: Option<EventRow> = event_log::table.filter(event_log::event_id.eq(id))
                                                            .first(conn)
                                                            .optional()?;
                row.map(row_to_event).transpose()
            })
    }

    fn find_at_or_before(&self, at: DateTime<Utc>) -> Result<Option<StoredEvent>, PersistenceError> {
        self.with_retries("find_at_or_before", |conn| {
                let row: Option<EventRow> = event_log::table.filter(event_log::occurred_at.le(at))
                                                            .order(event_log::sequence.desc())
                                                            .first(conn)
                                                            .optional()?;
                row.map(row_to_event).transpose()
            })
    }

    fn last(&self) -> Result<Option<StoredEvent>, PersistenceError> {
        self.with_retries("last", |conn| {
                let row: Option<EventRow> = event_log::table.order(event_log::sequence.desc())
                                                            .first(conn)
                                                            .optional()?;
                row.map(row_to_event).transpose()
            })
    }
}
