//! API error handling
//!
//! Every failure leaves the API as `{ "_type": "Error", "errorIdentifier", "message" }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cm_auth::AuthError;
use cm_core::error::ValidationErrors;
use cm_core::CmError;
use cm_services::ServiceResult;
use serde::Serialize;
use tracing::error;

/// API error types
#[derive(Debug)]
pub enum ApiError {
    NotFound { resource: &'static str, id: String },
    Validation(ValidationErrors),
    Unauthorized(String),
    Forbidden(String),
    BadRequest(String),
    Conflict(String),
    Unavailable(String),
    Internal(String),
}

impl ApiError {
    pub fn not_found(resource: &'static str, id: impl std::fmt::Display) -> Self {
        ApiError::NotFound { resource, id: id.to_string() }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        ApiError::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ApiError::Forbidden(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn identifier(&self) -> &'static str {
        match self {
            ApiError::NotFound { .. } => "NotFound",
            ApiError::Validation(_) => "PropertyConstraintViolation",
            ApiError::Unauthorized(_) => "Unauthenticated",
            ApiError::Forbidden(_) => "MissingPermission",
            ApiError::BadRequest(_) => "InvalidRequestBody",
            ApiError::Conflict(_) => "UpdateConflict",
            ApiError::Unavailable(_) => "DatabaseUnavailable",
            ApiError::Internal(_) => "InternalError",
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::NotFound { resource, id } => format!("{} with id {} not found", resource, id),
            ApiError::Validation(errors) => errors.full_messages().join(", "),
            ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Conflict(msg)
            | ApiError::Unavailable(msg)
            | ApiError::Internal(msg) => msg.clone(),
        }
    }
}

impl From<CmError> for ApiError {
    fn from(err: CmError) -> Self {
        match err {
            CmError::NotFound { entity, value, .. } => ApiError::NotFound { resource: entity, id: value },
            CmError::Unauthorized { message } => ApiError::Unauthorized(message),
            CmError::Forbidden { message } => ApiError::Forbidden(message),
            CmError::Validation(errors) => ApiError::Validation(errors),
            CmError::Contract(e) => {
                let mut errors = ValidationErrors::new();
                errors.add_base(e.to_string());
                ApiError::Validation(errors)
            }
            CmError::Conflict { message } => ApiError::Conflict(message),
            CmError::Unavailable { message } => ApiError::Unavailable(message),
            CmError::ExternalService { service, message } => {
                ApiError::Unavailable(format!("{}: {}", service, message))
            }
            other => {
                error!(error = %other, "Request failed");
                ApiError::Internal("An internal error occurred".into())
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InsufficientPermissions => ApiError::Forbidden(err.to_string()),
            other => ApiError::Unauthorized(other.to_string()),
        }
    }
}

/// Unwrap a service result, turning a failure into a 422
pub fn into_result<T>(result: ServiceResult<T>) -> ApiResult<(T, Option<String>)> {
    let message = result.message().map(str::to_string);
    Result::<T, ValidationErrors>::from(result)
        .map(|value| (value, message))
        .map_err(ApiError::Validation)
}

#[derive(Serialize)]
struct ErrorBody {
    #[serde(rename = "_type")]
    type_name: &'static str,
    #[serde(rename = "errorIdentifier")]
    error_identifier: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let details = match &self {
            ApiError::Validation(errors) => Some(serde_json::json!({
                "base": errors.base_errors,
                "fields": errors.errors,
            })),
            _ => None,
        };
        let body = ErrorBody {
            type_name: "Error",
            error_identifier: format!("urn:contact-hub:api:errors:{}", self.identifier()),
            message: self.message(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_keep_their_status() {
        assert_eq!(
            ApiError::from(CmError::not_found("Contact", 4)).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(CmError::forbidden("no")).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(CmError::Unavailable { message: "down".into() }).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::from(CmError::Database("boom".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_auth_errors() {
        assert_eq!(ApiError::from(AuthError::Required).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::from(AuthError::InsufficientPermissions).status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_failed_service_result_is_unprocessable() {
        let result: ServiceResult<()> = ServiceResult::failure_with_error("email", "is invalid");
        let err = into_result(result).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.message(), "email is invalid");
    }
}
