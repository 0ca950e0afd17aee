use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// one rejected attribute inside a validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum LedgerError {
    /// the fact or batch violates schema or invariants; the whole batch is
    /// rejected and every failing field is reported
    #[error("validation failed: {}", format_fields(.errors))]
    Validation { errors: Vec<FieldError> },

    #[error("not found: {entity}")]
    NotFound { entity: Uuid },

    #[error("integrity violation on {attribute}: {message}")]
    IntegrityViolation { attribute: String, message: String },

    /// a derivation observed an invariant that earlier validation should
    /// have prevented; never caught inside the core
    #[error("consistency violation for contract {contract:?}: {message}")]
    Consistency {
        contract: Option<Uuid>,
        message: String,
    },

    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl LedgerError {
    pub fn validation(errors: Vec<FieldError>) -> Self {
        LedgerError::Validation { errors }
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        LedgerError::Validation {
            errors: vec![FieldError::new(field, message)],
        }
    }

    pub fn not_found(entity: Uuid) -> Self {
        LedgerError::NotFound { entity }
    }

    pub fn integrity(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        LedgerError::IntegrityViolation {
            attribute: attribute.into(),
            message: message.into(),
        }
    }

    pub fn consistency(contract: Option<Uuid>, message: impl Into<String>) -> Self {
        LedgerError::Consistency {
            contract,
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        LedgerError::Configuration {
            message: message.into(),
        }
    }
}

fn format_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, LedgerError>;
