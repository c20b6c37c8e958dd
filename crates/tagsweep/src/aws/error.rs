//! AWS error classification and handling
//!
//! Provides typed errors for AWS SDK operations using the `.code()` method
//! instead of string matching on Debug format, and converts SDK results into
//! the [`ApiOutcome`] records mutating steps report on.

use aws_sdk_ec2::error::{ProvideErrorMetadata, SdkError};
use tagsweep_common::{ApiErrorDetail, ApiOutcome};
use thiserror::Error;

/// AWS error categories for existence checks and listing calls
#[derive(Debug, Clone, Error)]
pub enum AwsError {
    /// Resource was not found (already deleted, safe to skip)
    #[error("Resource not found: {message}")]
    NotFound { code: String, message: String },

    /// Rate limit exceeded (retryable with backoff)
    #[error("Rate limit exceeded: {message}")]
    Throttled { code: String, message: String },

    /// Resource has dependent objects (retryable, e.g., SG with attached ENI)
    #[error("Resource has dependent objects: {message}")]
    DependencyViolation { message: String },

    /// Credentials lack permission for the call
    #[error("Access denied: {message}")]
    AccessDenied { code: String, message: String },

    /// Generic AWS SDK error with code and message
    #[error("AWS error: {message}")]
    Sdk {
        code: Option<String>,
        message: String,
        status: Option<u16>,
    },
}

impl AwsError {
    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AwsError::NotFound { .. })
    }

    /// Check if this is a retryable error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AwsError::Throttled { .. } | AwsError::DependencyViolation { .. }
        )
    }

    /// The AWS error code, when the service returned one
    pub fn code(&self) -> Option<&str> {
        match self {
            AwsError::NotFound { code, .. }
            | AwsError::Throttled { code, .. }
            | AwsError::AccessDenied { code, .. } => Some(code),
            AwsError::DependencyViolation { .. } => Some("DependencyViolation"),
            AwsError::Sdk { code, .. } => code.as_deref(),
        }
    }

    fn message(&self) -> &str {
        match self {
            AwsError::NotFound { message, .. }
            | AwsError::Throttled { message, .. }
            | AwsError::DependencyViolation { message }
            | AwsError::AccessDenied { message, .. }
            | AwsError::Sdk { message, .. } => message,
        }
    }

    /// Error detail recorded in failure reports
    pub fn detail(&self) -> ApiErrorDetail {
        ApiErrorDetail::new(self.code().unwrap_or("Unknown"), self.message())
    }
}

/// Known AWS error codes for "not found" conditions
const NOT_FOUND_CODES: &[&str] = &[
    "InvalidInstanceID.NotFound",
    "InvalidGroup.NotFound",
    "InvalidVolume.NotFound",
    "NoSuchBucket",
    "NoSuchKey",
    "NoSuchEntity",
    "NotFound",
    "NotFoundException",
    "ResourceNotFoundException",
    "ParameterNotFound",
];

/// Known AWS error codes for throttling/rate limiting
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "TooManyRequestsException",
];

/// Known AWS error codes for dependency violations (resource still in use)
const DEPENDENCY_CODES: &[&str] = &["DependencyViolation", "DeleteConflict"];

/// Known AWS error codes for authorization failures
const ACCESS_DENIED_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "UnauthorizedOperation",
];

/// Classify an AWS SDK error using the error code.
pub fn classify_aws_error(code: Option<&str>, message: Option<&str>) -> AwsError {
    let message = message.unwrap_or("Unknown error").to_string();

    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => AwsError::NotFound {
            code: c.to_string(),
            message,
        },
        Some(c) if THROTTLING_CODES.contains(&c) => AwsError::Throttled {
            code: c.to_string(),
            message,
        },
        Some(c) if DEPENDENCY_CODES.contains(&c) => AwsError::DependencyViolation { message },
        Some(c) if ACCESS_DENIED_CODES.contains(&c) => AwsError::AccessDenied {
            code: c.to_string(),
            message,
        },
        _ => AwsError::Sdk {
            code: code.map(|s| s.to_string()),
            message,
            status: None,
        },
    }
}

/// HTTP status of the raw response behind an SDK error, if one was received
fn response_status<E>(err: &SdkError<E>) -> Option<u16> {
    err.raw_response().map(|r| r.status().as_u16())
}

/// Classify any SDK operation error.
///
/// A bare 404 without a recognised code (S3 `HeadBucket` returns no body) is
/// treated as not-found.
pub fn classify_sdk_error<E>(err: &SdkError<E>) -> AwsError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let status = response_status(err);
    let message = err
        .message()
        .map(|m| m.to_string())
        .unwrap_or_else(|| err.to_string());

    match classify_aws_error(err.code(), Some(&message)) {
        AwsError::Sdk { code, message, .. } if status == Some(404) => AwsError::NotFound {
            code: code.unwrap_or_else(|| "NotFound".to_string()),
            message,
        },
        AwsError::Sdk { code, message, .. } => AwsError::Sdk {
            code,
            message,
            status,
        },
        other => other,
    }
}

/// Convert a read result into `Ok(None)` when the resource does not exist.
pub fn ignore_not_found<T, E>(result: Result<T, SdkError<E>>) -> Result<Option<T>, AwsError>
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            let classified = classify_sdk_error(&e);
            if classified.is_not_found() {
                Ok(None)
            } else {
                Err(classified)
            }
        }
    }
}

/// Convert a mutating call's result into an [`ApiOutcome`].
///
/// Success maps to 200. Failures carry the response status, or 0 when no
/// error status was received (dispatch or timeout failures).
pub fn outcome_of<T, E>(result: Result<T, SdkError<E>>) -> ApiOutcome
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    match result {
        Ok(_) => ApiOutcome::ok(),
        Err(e) => {
            // A failed call never counts as accepted, whatever status the response carried
            let status = response_status(&e)
                .filter(|s| !(200..300).contains(s))
                .unwrap_or(0);
            ApiOutcome::failed(status, classify_sdk_error(&e).detail())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_codes() {
        for code in NOT_FOUND_CODES {
            let err = classify_aws_error(Some(code), Some("some message"));
            assert!(err.is_not_found(), "Expected NotFound for code: {code}");
        }
    }

    #[test]
    fn throttling_codes() {
        for code in THROTTLING_CODES {
            let err = classify_aws_error(Some(code), Some("msg"));
            assert!(err.is_retryable(), "Expected retryable for code: {code}");
            assert!(matches!(err, AwsError::Throttled { .. }));
        }
    }

    #[test]
    fn dependency_violation() {
        let err = classify_aws_error(Some("DependencyViolation"), Some("ENI attached"));
        assert!(err.is_retryable());
        assert!(matches!(err, AwsError::DependencyViolation { .. }));

        let err = classify_aws_error(Some("DeleteConflict"), Some("must detach policies"));
        assert!(matches!(err, AwsError::DependencyViolation { .. }));
    }

    #[test]
    fn access_denied() {
        let err = classify_aws_error(Some("UnauthorizedOperation"), Some("not allowed"));
        assert!(matches!(err, AwsError::AccessDenied { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn unknown_and_missing_codes() {
        let err = classify_aws_error(Some("SomeNewError"), Some("details"));
        assert!(matches!(err, AwsError::Sdk { .. }));
        assert_eq!(err.code(), Some("SomeNewError"));

        let err2 = classify_aws_error(None, Some("something failed"));
        assert!(matches!(err2, AwsError::Sdk { code: None, .. }));
    }

    #[test]
    fn detail_carries_code_and_message() {
        let err = classify_aws_error(Some("NoSuchEntity"), Some("The role cannot be found"));
        let detail = err.detail();
        assert_eq!(detail.code, "NoSuchEntity");
        assert_eq!(detail.message, "The role cannot be found");

        let err = classify_aws_error(None, None);
        assert_eq!(err.detail().code, "Unknown");
        assert_eq!(err.detail().message, "Unknown error");
    }
}
