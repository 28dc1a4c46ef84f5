//! Result type aliases and the RPC envelope

use serde::{Deserialize, Serialize};

use crate::error::CmError;

/// Standard Result type for Contact Hub operations
pub type CmResult<T> = Result<T, CmError>;

/// Response shape returned by the server-side functions.
///
/// ```json
/// { "success": true, "data": [...], "error": null }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// Unsuccessful envelopes and successful ones without data are both errors.
    pub fn into_result(self, service: &str) -> CmResult<T> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (true, None) => Err(CmError::ExternalService {
                service: service.to_string(),
                message: "empty response".to_string(),
            }),
            (false, _) => Err(CmError::ExternalService {
                service: service.to_string(),
                message: self.error.unwrap_or_else(|| "unknown error".to_string()),
            }),
        }
    }
}
