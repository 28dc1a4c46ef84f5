//! Service Result type

use cm_core::error::ValidationErrors;
use cm_core::CmError;
use std::fmt;

/// Outcome of a write service: the written value, or the validation
/// errors that stopped it
#[derive(Debug)]
pub struct ServiceResult<T> {
    success: bool,
    result: Option<T>,
    errors: ValidationErrors,
    message: Option<String>,
}

impl<T> ServiceResult<T> {
    pub fn success(result: T) -> Self {
        Self {
            success: true,
            result: Some(result),
            errors: ValidationErrors::new(),
            message: None,
        }
    }

    pub fn failure(errors: ValidationErrors) -> Self {
        Self {
            success: false,
            result: None,
            errors,
            message: None,
        }
    }

    /// Failure with a single attribute error
    pub fn failure_with_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(field, message);
        Self::failure(errors)
    }

    /// Failure with a base error
    pub fn failure_with_base_error(message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add_base(message);
        Self::failure(errors)
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn is_failure(&self) -> bool {
        !self.success
    }

    pub fn result(&self) -> Option<&T> {
        self.result.as_ref()
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn full_messages(&self) -> Vec<String> {
        self.errors.full_messages()
    }

    /// Map the result if successful
    pub fn map<U, F>(self, f: F) -> ServiceResult<U>
    where
        F: FnOnce(T) -> U,
    {
        ServiceResult {
            success: self.success,
            result: if self.success { self.result.map(f) } else { None },
            errors: self.errors,
            message: self.message,
        }
    }

    /// Validation failures become `CmError::Validation`
    pub fn into_cm_result(self) -> Result<T, CmError> {
        Result::<T, ValidationErrors>::from(self).map_err(CmError::Validation)
    }
}

impl<T> From<Result<T, ValidationErrors>> for ServiceResult<T> {
    fn from(result: Result<T, ValidationErrors>) -> Self {
        match result {
            Ok(value) => ServiceResult::success(value),
            Err(errors) => ServiceResult::failure(errors),
        }
    }
}

impl<T> From<ServiceResult<T>> for Result<T, ValidationErrors> {
    fn from(result: ServiceResult<T>) -> Self {
        if result.success {
            result.result.ok_or_else(|| {
                let mut errors = ValidationErrors::new();
                errors.add_base("Service succeeded but no result was returned");
                errors
            })
        } else {
            Err(result.errors)
        }
    }
}

impl<T: fmt::Display> fmt::Display for ServiceResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.result, self.success) {
            (Some(result), true) => write!(f, "Success: {}", result),
            (None, true) => write!(f, "Success"),
            _ => write!(f, "Failure: {}", self.errors.full_messages().join(", ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_result() {
        let result = ServiceResult::success(42);
        assert!(result.is_success());
        assert_eq!(result.result(), Some(&42));
        assert_eq!(result.to_string(), "Success: 42");
    }

    #[test]
    fn test_failure_result() {
        let result: ServiceResult<i32> = ServiceResult::failure_with_error("phone", "is invalid");
        assert!(result.is_failure());
        assert!(result.result().is_none());
        assert!(result.errors().has_error("phone"));
    }

    #[test]
    fn test_map() {
        assert_eq!(ServiceResult::success(21).map(|n| n * 2).result(), Some(&42));

        let failed: ServiceResult<i32> = ServiceResult::failure_with_base_error("nope");
        assert!(failed.map(|n| n * 2).is_failure());
    }

    #[test]
    fn test_into_cm_result() {
        let failed: ServiceResult<i32> = ServiceResult::failure_with_error("lastName", "can't be blank");
        let err = failed.into_cm_result().unwrap_err();
        assert_eq!(err.status_code(), 422);

        assert_eq!(ServiceResult::success(1).into_cm_result().unwrap(), 1);
    }
}
