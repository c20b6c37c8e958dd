//! Fallback for ARNs no handler is registered for

use tagsweep_common::StepReport;
use tracing::warn;

/// One failure report naming the ARN. Makes no API call.
pub fn destroy(arn: &str) -> Vec<StepReport> {
    warn!(arn = %arn, "Unsupported resource type, skipping");
    vec![StepReport::unsupported(arn)]
}
