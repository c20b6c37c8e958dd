//! Call outcomes and per-step report records
//!
//! Every mutating API call yields an [`ApiOutcome`]. Combined with the
//! [`Action`] it performed, the outcome becomes a [`StepReport`]:
//!
//! ```text
//! {"result": "success", "message": "Successfully deleted bucket with ID my-bucket"}
//! {"result": "failure", "message": "Unable to delete key with ID k1",
//!  "error": {"code": "KMSInvalidStateException", "message": "..."}}
//! ```

use crate::defaults::ACCEPTED_STATUSES;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error code and message returned by a failed API call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiErrorDetail {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ApiErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Status code plus optional error detail of a mutating call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiOutcome {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorDetail>,
}

impl ApiOutcome {
    /// Plain 200 response
    pub fn ok() -> Self {
        Self::with_status(200)
    }

    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            error: None,
        }
    }

    pub fn failed(status: u16, error: ApiErrorDetail) -> Self {
        Self {
            status,
            error: Some(error),
        }
    }

    /// Outcome substituted for a call skipped in dry-run mode
    pub fn dry_run() -> Self {
        Self::ok()
    }

    pub fn is_accepted(&self) -> bool {
        ACCEPTED_STATUSES.contains(&self.status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepResult {
    Success,
    Failure,
}

/// The side effect a step performs, used to phrase its report message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Delete {
        resource_type: String,
        id: String,
    },
    Detach {
        detached_type: String,
        detached_id: String,
        from_type: String,
        from_id: String,
    },
    Disable {
        resource_type: String,
        id: String,
    },
}

impl Action {
    pub fn delete(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Action::Delete {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    pub fn detach(
        detached_type: impl Into<String>,
        detached_id: impl Into<String>,
        from_type: impl Into<String>,
        from_id: impl Into<String>,
    ) -> Self {
        Action::Detach {
            detached_type: detached_type.into(),
            detached_id: detached_id.into(),
            from_type: from_type.into(),
            from_id: from_id.into(),
        }
    }

    pub fn disable(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Action::Disable {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    fn verbs(&self) -> (&'static str, &'static str) {
        match self {
            Action::Delete { .. } => ("deleted", "delete"),
            Action::Detach { .. } => ("detached", "detach"),
            Action::Disable { .. } => ("disabled", "disable"),
        }
    }

    fn subject(&self) -> String {
        match self {
            Action::Delete { resource_type, id } | Action::Disable { resource_type, id } => {
                format!("{resource_type} with ID {id}")
            }
            Action::Detach {
                detached_type,
                detached_id,
                from_type,
                from_id,
            } => format!(
                "{detached_type} with ID {detached_id} from {from_type} with ID {from_id}"
            ),
        }
    }

    /// Message for a successful step
    pub fn success_message(&self) -> String {
        format!("Successfully {} {}", self.verbs().0, self.subject())
    }

    /// Message for a failed step
    pub fn failure_message(&self) -> String {
        format!("Unable to {} {}", self.verbs().1, self.subject())
    }
}

/// Outcome of one side effect performed while tearing down a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    pub result: StepResult,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorDetail>,
}

impl StepReport {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            result: StepResult::Success,
            message: message.into(),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>, error: Option<ApiErrorDetail>) -> Self {
        Self {
            result: StepResult::Failure,
            message: message.into(),
            error,
        }
    }

    /// Classify a call outcome into a success or failure record
    pub fn from_outcome(action: &Action, outcome: &ApiOutcome) -> Self {
        if outcome.is_accepted() {
            Self::success(action.success_message())
        } else {
            let error = outcome.error.clone().unwrap_or_else(|| {
                ApiErrorDetail::new("HttpStatus", format!("unexpected status {}", outcome.status))
            });
            Self::failure(action.failure_message(), Some(error))
        }
    }

    /// Record for an ARN no handler is registered for
    pub fn unsupported(arn: &str) -> Self {
        Self::failure(
            format!(
                "Unable to delete resource with ARN {arn} because \
                 this tool currently doesn't support that resource type."
            ),
            None,
        )
    }

    /// Record for an existence check that failed with something other than not-found
    pub fn query_failed(resource_type: &str, id: &str, error: ApiErrorDetail) -> Self {
        Self::failure(
            format!("Unable to query {resource_type} with ID {id}"),
            Some(error),
        )
    }

    /// Record for a listing call that failed while planning detach steps
    pub fn list_failed(what: &str, owner_type: &str, owner_id: &str, error: ApiErrorDetail) -> Self {
        Self::failure(
            format!("Unable to list {what} of {owner_type} with ID {owner_id}"),
            Some(error),
        )
    }

    pub fn is_success(&self) -> bool {
        self.result == StepResult::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_statuses() {
        for status in [200, 202, 204] {
            assert!(ApiOutcome::with_status(status).is_accepted());
        }
        for status in [0, 201, 400, 404, 409, 500, 503] {
            assert!(!ApiOutcome::with_status(status).is_accepted());
        }
        assert!(ApiOutcome::dry_run().is_accepted());
    }

    #[test]
    fn delete_messages() {
        let action = Action::delete("bucket", "my-bucket");
        let ok = StepReport::from_outcome(&action, &ApiOutcome::with_status(204));
        assert!(ok.is_success());
        assert_eq!(ok.message, "Successfully deleted bucket with ID my-bucket");
        assert!(ok.error.is_none());

        let err = ApiErrorDetail::new("BucketNotEmpty", "The bucket you tried to delete is not empty");
        let failed = StepReport::from_outcome(&action, &ApiOutcome::failed(409, err.clone()));
        assert_eq!(failed.result, StepResult::Failure);
        assert_eq!(failed.message, "Unable to delete bucket with ID my-bucket");
        assert_eq!(failed.error, Some(err));
    }

    #[test]
    fn detach_message_names_both_sides() {
        let action = Action::detach("security-group", "sg-1", "instance", "i-1");
        assert_eq!(
            action.success_message(),
            "Successfully detached security-group with ID sg-1 from instance with ID i-1"
        );
        assert_eq!(
            action.failure_message(),
            "Unable to detach security-group with ID sg-1 from instance with ID i-1"
        );
    }

    #[test]
    fn disable_message() {
        let action = Action::disable("key", "k1");
        assert_eq!(action.success_message(), "Successfully disabled key with ID k1");
    }

    #[test]
    fn failure_without_error_gets_status_detail() {
        let report = StepReport::from_outcome(
            &Action::delete("volume", "vol-1"),
            &ApiOutcome::with_status(500),
        );
        let error = report.error.unwrap();
        assert_eq!(error.code, "HttpStatus");
        assert!(error.message.contains("500"));
    }

    #[test]
    fn unsupported_mentions_arn() {
        let arn = "arn:aws:sqs:us-east-1:123456789012:queue";
        let report = StepReport::unsupported(arn);
        assert_eq!(report.result, StepResult::Failure);
        assert!(report.message.contains(arn));
        assert!(report.error.is_none());
    }

    #[test]
    fn serializes_lowercase_result() {
        let json = serde_json::to_value(StepReport::success("done")).unwrap();
        assert_eq!(json["result"], "success");
        assert_eq!(json["message"], "done");
        assert!(json.get("error").is_none());

        let json = serde_json::to_value(StepReport::failure(
            "nope",
            Some(ApiErrorDetail::new("AccessDenied", "denied")),
        ))
        .unwrap();
        assert_eq!(json["result"], "failure");
        assert_eq!(json["error"]["code"], "AccessDenied");
    }
}
