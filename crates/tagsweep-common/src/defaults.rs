//! Default configuration values
//!
//! Shared by the library defaults and the CLI argument defaults so both
//! agree on retry budgets and windows.

use std::time::Duration;

/// Default number of attempts for each mutating API call
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default fixed delay between attempts, in seconds
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 10;

/// HTTP statuses that count as a successful mutating call
pub const ACCEPTED_STATUSES: [u16; 3] = [200, 202, 204];

/// Default KMS key deletion pending window in days (AWS allows 7-30)
pub const DEFAULT_KMS_PENDING_WINDOW_DAYS: i32 = 30;

/// Default number of ARNs processed concurrently
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Default AWS region
pub const DEFAULT_REGION: &str = "us-east-1";

/// Maximum keys per S3 DeleteObjects request
pub const S3_DELETE_BATCH_SIZE: usize = 1000;

/// How long to wait for an instance to reach `terminated` (10 minutes)
pub const DEFAULT_TERMINATION_TIMEOUT_SECS: u64 = 600;

/// Returns the default retry delay as a [`Duration`]
pub fn default_retry_delay() -> Duration {
    Duration::from_secs(DEFAULT_RETRY_DELAY_SECS)
}
