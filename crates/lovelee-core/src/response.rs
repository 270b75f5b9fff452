//! Uniform result shape handed to UI code.

use serde::{Deserialize, Serialize};

use crate::error::{LoveleeError, Result};

/// `{success, data, error, code}`.
///
/// UI callers check `success` instead of relying on error propagation;
/// `code` is the stable reason (e.g. `"InsufficientHearts"`) and `error` the
/// human-readable message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub code: Option<String>,
}

impl<T> ServiceResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            code: None,
        }
    }

    pub fn failure(error: &LoveleeError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            code: Some(error.code().to_string()),
        }
    }
}

impl<T> From<Result<T>> for ServiceResponse<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(error) => Self::failure(&error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_ok() {
        let response: ServiceResponse<i64> = Ok(42).into();
        assert!(response.success);
        assert_eq!(response.data, Some(42));
        assert!(response.error.is_none());
    }

    #[test]
    fn test_from_err_carries_code_and_message() {
        let response: ServiceResponse<()> = Err(LoveleeError::InsufficientHearts {
            required: 10,
            available: 6,
        })
        .into();
        assert!(!response.success);
        assert_eq!(response.code.as_deref(), Some("InsufficientHearts"));
        assert!(response.error.unwrap().contains("10 required"));

        let json = serde_json::to_value(ServiceResponse::<()>::failure(&LoveleeError::SelfPairing))
            .unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "SelfPairing");
    }
}
