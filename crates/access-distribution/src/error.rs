//! Errores de la capa de distribución y cuerpo de error del protocolo.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use access_core::ErrorClass;

#[derive(Debug, Error)]
pub enum DistributionError {
    #[error("shard unavailable: {shard_id}")]
    ShardUnavailable { shard_id: String },
    #[error("shard map was reconfigured during the operation")]
    ShardReconfigured,
    #[error("deadline exceeded contacting {shard_id}")]
    Timeout { shard_id: String },
    #[error("operation cancelled")]
    Cancelled,
    #[error("remote error {code} (status {status}): {message}")]
    Remote { status: u16, code: String, message: String, target: Option<String> },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("no shard configured for {element}/{operation}")]
    NoShardConfigured { element: String, operation: String },
    #[error("invalid shard configuration: {0}")]
    InvalidConfiguration(String),
    #[error("{source} [{shard}]")]
    AtShard { shard: String, #[source] source: Box<DistributionError> },
}

impl DistributionError {
    /// Anota el error con la descripción identificatoria del shard.
    pub fn at_shard(self, shard: String) -> Self {
        match self {
            already @ DistributionError::AtShard { .. } => already,
            source => DistributionError::AtShard { shard, source: Box::new(source) },
        }
    }

    /// Clasificación para la política de reintentos: transporte, timeouts y
    /// 5xx remotos se reintentan; el resto se propaga.
    pub fn class(&self) -> ErrorClass {
        match self {
            DistributionError::Transport(_)
            | DistributionError::Timeout { .. }
            | DistributionError::ShardUnavailable { .. } => ErrorClass::Transient,
            DistributionError::Remote { status, .. } if *status >= 500 => ErrorClass::Transient,
            DistributionError::AtShard { source, .. } => source.class(),
            _ => ErrorClass::Permanent,
        }
    }
}

impl From<reqwest::Error> for DistributionError {
    fn from(e: reqwest::Error) -> Self {
        let shard_id = e.url().map(|u| u.to_string()).unwrap_or_default();
        if e.is_timeout() {
            DistributionError::Timeout { shard_id }
        } else if e.is_connect() {
            DistributionError::ShardUnavailable { shard_id }
        } else {
            DistributionError::Transport(e.to_string())
        }
    }
}

/// Cuerpo de error del protocolo (toda respuesta no-2xx).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<ErrorAttribute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub innererror: Option<Box<ErrorDetail>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorAttribute {
    pub name: String,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_5xx_is_transient_and_4xx_permanent() {
        let transient = DistributionError::Remote { status: 503,
                                                    code: "Unavailable".into(),
                                                    message: "try later".into(),
                                                    target: None };
        assert_eq!(transient.class(), ErrorClass::Transient);
        let permanent = DistributionError::Remote { status: 409,
                                                    code: "CycleDetected".into(),
                                                    message: "cycle".into(),
                                                    target: None };
        assert_eq!(permanent.class(), ErrorClass::Permanent);
    }

    #[test]
    fn error_body_round_trips_with_innererror() {
        let body = ErrorResponse { error: ErrorDetail { code: "NotFound".into(),
                                                        message: "user missing".into(),
                                                        target: Some("alice".into()),
                                                        attributes: vec![ErrorAttribute { name: "kind".into(),
                                                                                          value: "user".into() }],
                                                        innererror: Some(Box::new(ErrorDetail { code: "Inner".into(),
                                                                                                message: "detail".into(),
                                                                                                target: None,
                                                                                                attributes: Vec::new(),
                                                                                                innererror: None })) } };
        let json = serde_json::to_string(&body).unwrap();
        let back: ErrorResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back.error.code, "NotFound");
        assert_eq!(back.error.innererror.unwrap().code, "Inner");
    }
}
