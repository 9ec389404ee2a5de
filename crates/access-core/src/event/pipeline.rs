//! Pipeline explícito de etapas por las que pasa todo evento antes de
//! aplicarse al grafo.
//!
//! Cada etapa tiene un contrato de un solo método (`process`); el buffer las
//! compone en orden fijo: `EventValidator → MetricLogger → mutación del
//! grafo`. Una etapa que falla corta el pipeline y el evento no se encola.

use access_domain::{validate_entity_name, validate_entity_type_name};
use log::debug;

use crate::errors::BufferError;

use super::types::{AccessEvent, AccessEventKind};

/// Etapa del pipeline de eventos.
pub trait EventStage<U, G, K, A>: Send {
    fn process(&mut self, event: &AccessEvent<U, G, K, A>) -> Result<(), BufferError>;
}

/// Validación estructural de payloads.
///
/// Verifica lo que puede verificarse sin consultar el grafo: nombres de
/// tipos de entidad y entidades dentro de las reglas del dominio. La
/// validación referencial (existencia de prerequisitos) es responsabilidad
/// del manager dependency-free.
#[derive(Default)]
pub struct EventValidator;

impl EventValidator {
    pub fn new() -> Self {
        EventValidator
    }
}

/// Validación pura del payload, compartida entre la etapa y el pre-chequeo
/// del buffer (que corre antes de consumir número de secuencia).
pub fn validate_payload<U, G, K, A>(kind: &AccessEventKind<U, G, K, A>) -> Result<(), BufferError> {
    let check = |field: &str, result: Result<(), access_domain::DomainError>| {
        result.map_err(|e| BufferError::ValidationFailed { field: field.to_string(), reason: e.to_string() })
    };
    match kind {
        AccessEventKind::EntityType { entity_type } => {
            check("entityType", validate_entity_type_name(entity_type))?;
        }
        AccessEventKind::Entity { entity_type, entity }
        | AccessEventKind::UserToEntity { entity_type, entity, .. }
        | AccessEventKind::GroupToEntity { entity_type, entity, .. } => {
            check("entityType", validate_entity_type_name(entity_type))?;
            check("entity", validate_entity_name(entity))?;
        }
        _ => {}
    }
    Ok(())
}

impl<U, G, K, A> EventStage<U, G, K, A> for EventValidator {
    fn process(&mut self, event: &AccessEvent<U, G, K, A>) -> Result<(), BufferError> {
        validate_payload(&event.kind)
    }
}

/// Etapa de métricas: cuenta eventos por tipo y los publica por el log.
///
/// No altera el evento ni puede fallar; los contadores alimentan los
/// reportes del worker de flush.
#[derive(Default)]
pub struct MetricLogger {
    processed: u64,
}

impl MetricLogger {
    pub fn new() -> Self {
        MetricLogger::default()
    }

    /// Total de eventos que atravesaron la etapa desde el arranque.
    pub fn processed(&self) -> u64 {
        self.processed
    }
}

impl<U, G, K, A> EventStage<U, G, K, A> for MetricLogger {
    fn process(&mut self, event: &AccessEvent<U, G, K, A>) -> Result<(), BufferError> {
        self.processed += 1;
        debug!("event {} seq={} kind={}", event.header.event_id, event.header.sequence, event.kind.name());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use crate::event::{EventAction, EventHeader, Stringifiers};

    use super::*;

    fn event_of(kind: AccessEventKind<String, String, String, String>) -> AccessEvent<String, String, String, String> {
        let strs = Stringifiers::for_strings();
        AccessEvent { header: EventHeader { event_id: Uuid::new_v4(),
                                            action: EventAction::Add,
                                            occurred_at: Utc::now(),
                                            hash_code: strs.hash_code(&kind),
                                            sequence: 0 },
                      kind }
    }

    #[test]
    fn validator_rejects_bad_entity_names() {
        let mut validator = EventValidator::new();
        let bad = event_of(AccessEventKind::Entity { entity_type: "Client".into(), entity: " Acme".into() });
        let err = validator.process(&bad).unwrap_err();
        assert!(matches!(err, BufferError::ValidationFailed { ref field, .. } if field == "entity"));

        let ok = event_of(AccessEventKind::Entity { entity_type: "Client".into(), entity: "Acme".into() });
        assert!(validator.process(&ok).is_ok());
    }

    #[test]
    fn metric_logger_counts() {
        let mut metrics = MetricLogger::new();
        let ev = event_of(AccessEventKind::User { user: "alice".into() });
        <MetricLogger as EventStage<String, String, String, String>>::process(&mut metrics, &ev).unwrap();
        <MetricLogger as EventStage<String, String, String, String>>::process(&mut metrics, &ev).unwrap();
        assert_eq!(metrics.processed(), 2);
    }
}
