//! Core error types for Contact Hub
//!
//! Every layer maps its own failures onto `CmError` before they reach the API.

use std::collections::BTreeMap;
use thiserror::Error;

/// Core error type for all Contact Hub operations
#[derive(Error, Debug)]
pub enum CmError {
    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Contract violation: {0}")]
    Contract(#[from] ContractError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("External service error: {service} - {message}")]
    ExternalService { service: String, message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Service unavailable: {message}")]
    Unavailable { message: String },
}

impl CmError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CmError::NotFound {
            entity,
            field: "id",
            value: id.to_string(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        CmError::Forbidden {
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        CmError::Unauthorized {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            CmError::NotFound { .. } => 404,
            CmError::Unauthorized { .. } => 401,
            CmError::Forbidden { .. } => 403,
            CmError::Validation(_) | CmError::Contract(_) => 422,
            CmError::Conflict { .. } => 409,
            CmError::Database(_) | CmError::Internal(_) => 500,
            CmError::Config(_) => 500,
            CmError::ExternalService { .. } => 502,
            CmError::Unavailable { .. } => 503,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            CmError::NotFound { .. } => "not_found",
            CmError::Unauthorized { .. } => "unauthorized",
            CmError::Forbidden { .. } => "forbidden",
            CmError::Validation(_) => "validation_failed",
            CmError::Contract(_) => "contract_violated",
            CmError::Database(_) => "database_error",
            CmError::Internal(_) => "internal_error",
            CmError::Config(_) => "configuration_error",
            CmError::ExternalService { .. } => "external_service_error",
            CmError::Conflict { .. } => "conflict",
            CmError::Unavailable { .. } => "unavailable",
        }
    }
}

/// Validation errors collection, keyed by attribute name
#[derive(Error, Debug, Default, Clone, PartialEq)]
#[error("{}", self.full_messages().join(", "))]
pub struct ValidationErrors {
    /// Field-specific errors: field_name -> Vec<error_messages>
    pub errors: BTreeMap<String, Vec<String>>,
    /// Base errors not tied to a specific field
    pub base_errors: Vec<String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn add_base(&mut self, message: impl Into<String>) {
        self.base_errors.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.base_errors.is_empty()
    }

    /// Check if there are errors for a specific field
    pub fn has_error(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&Vec<String>> {
        self.errors.get(field)
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, messages) in other.errors {
            self.errors.entry(field).or_default().extend(messages);
        }
        self.base_errors.extend(other.base_errors);
    }

    pub fn full_messages(&self) -> Vec<String> {
        let mut messages = self.base_errors.clone();
        for (field, field_messages) in &self.errors {
            for msg in field_messages {
                messages.push(format!("{} {}", field, msg));
            }
        }
        messages
    }

    /// `Ok(())` when empty, otherwise the collected errors
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Contract validation error
#[derive(Error, Debug)]
pub enum ContractError {
    #[error("Attribute {attribute} is invalid: {message}")]
    AttributeInvalid { attribute: String, message: String },

    #[error("Attribute {attribute} is not writable")]
    AttributeNotWritable { attribute: String },

    #[error("Base contract error: {message}")]
    Base { message: String },

    #[error("Multiple contract errors")]
    Multiple { errors: ValidationErrors },
}

impl From<ContractError> for ValidationErrors {
    fn from(err: ContractError) -> Self {
        let mut errors = ValidationErrors::new();
        match err {
            ContractError::AttributeInvalid { attribute, message } => {
                errors.add(attribute, message);
            }
            ContractError::AttributeNotWritable { attribute } => {
                errors.add(attribute, "is not writable");
            }
            ContractError::Base { message } => {
                errors.add_base(message);
            }
            ContractError::Multiple { errors: e } => {
                return e;
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_messages_include_base_first() {
        let mut errors = ValidationErrors::new();
        errors.add("phone", "is invalid");
        errors.add_base("may not be deleted");

        assert_eq!(
            errors.full_messages(),
            vec!["may not be deleted".to_string(), "phone is invalid".to_string()]
        );
        assert!(errors.has_error("phone"));
        assert!(!errors.has_error("company"));
    }

    #[test]
    fn test_merge_and_into_result() {
        let mut a = ValidationErrors::new();
        assert!(a.clone().into_result().is_ok());

        let mut b = ValidationErrors::new();
        b.add("email", "is taken");
        a.merge(b);
        assert_eq!(a.get("email").map(|v| v.len()), Some(1));
        assert!(a.into_result().is_err());
    }

    #[test]
    fn test_contract_error_conversion() {
        let errors: ValidationErrors = ContractError::AttributeNotWritable {
            attribute: "role".into(),
        }
        .into();
        assert_eq!(errors.get("role"), Some(&vec!["is not writable".to_string()]));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(CmError::not_found("Contact", 3).status_code(), 404);
        assert_eq!(CmError::forbidden("no").status_code(), 403);
        assert_eq!(
            CmError::Unavailable {
                message: "db down".into()
            }
            .error_code(),
            "unavailable"
        );
    }
}
