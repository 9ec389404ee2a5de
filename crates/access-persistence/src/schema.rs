//! Esquema Diesel (generado manualmente). Reemplazable con `diesel
//! print-schema`.
//!
//! Tablas:
//! - `event_log`: log append-only con `sequence` como PK (asignada por el
//!   buffer, no por la base) e índice sobre `occurred_at` para el load
//!   temporal por tiempo.

diesel::table! {
    event_log (sequence) {
        sequence -> BigInt,
        event_id -> Uuid,
        action -> SmallInt,
        occurred_at -> Timestamptz,
        hash_code -> Integer,
        kind -> Text,
        payload -> Jsonb,
    }
}
