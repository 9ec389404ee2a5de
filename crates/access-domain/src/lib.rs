// access-domain library entry point
pub mod element;
pub mod error;
pub mod stringify;
pub mod validation;
pub use element::Element;
pub use error::DomainError;
pub use stringify::{ElementStringifier, StringStringifier};
pub use validation::{validate_entity_name, validate_entity_type_name, ENTITY_NAME_MAX_LEN};
