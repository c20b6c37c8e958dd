//! Configuration types for a teardown run

use crate::handlers::StepContext;
use crate::retry::RetryPolicy;
use crate::router::RegionFilter;
use crate::wait::WaitConfig;
use tagsweep_common::defaults::{DEFAULT_CONCURRENCY, DEFAULT_KMS_PENDING_WINDOW_DAYS, DEFAULT_REGION};
use tokio_util::sync::CancellationToken;

/// What to tear down, and where
#[derive(Debug, Clone)]
pub struct TargetConfig {
    pub tag_key: String,
    pub tag_value: String,
    /// AWS region
    pub region: String,
    /// AWS profile name (overrides default credential resolution)
    pub aws_profile: Option<String>,
}

/// Runtime behavior flags
#[derive(Debug, Clone)]
pub struct RuntimeFlags {
    /// Report intended actions without making mutating calls
    pub dry_run: bool,
    /// Number of ARNs processed at once
    pub concurrency: usize,
    pub region_filter: RegionFilter,
    /// KMS deletion pending window, 7-30 days
    pub kms_pending_window_days: i32,
    /// Output JSON file path
    pub output: Option<String>,
}

impl Default for RuntimeFlags {
    fn default() -> Self {
        Self {
            dry_run: true,
            concurrency: DEFAULT_CONCURRENCY,
            region_filter: RegionFilter::default(),
            kms_pending_window_days: DEFAULT_KMS_PENDING_WINDOW_DAYS,
            output: None,
        }
    }
}

/// Configuration for a teardown run
#[derive(Debug, Clone)]
pub struct TeardownConfig {
    pub target: TargetConfig,
    pub retry: RetryPolicy,
    pub flags: RuntimeFlags,
}

impl TeardownConfig {
    pub fn new(tag_key: impl Into<String>, tag_value: impl Into<String>) -> Self {
        Self {
            target: TargetConfig {
                tag_key: tag_key.into(),
                tag_value: tag_value.into(),
                region: DEFAULT_REGION.to_string(),
                aws_profile: None,
            },
            retry: RetryPolicy::default(),
            flags: RuntimeFlags::default(),
        }
    }

    pub fn region(&self) -> &str {
        &self.target.region
    }

    pub fn dry_run(&self) -> bool {
        self.flags.dry_run
    }

    /// Per-step settings for handlers, sharing `cancel` with the caller
    pub fn step_context(&self, cancel: CancellationToken) -> StepContext {
        StepContext {
            dry_run: self.flags.dry_run,
            retry: self.retry,
            cancel,
            kms_pending_window_days: self.flags.kms_pending_window_days,
            termination_wait: WaitConfig::default(),
            default_region: self.target.region.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_safe() {
        let config = TeardownConfig::new("env", "ci");
        assert!(config.dry_run());
        assert_eq!(config.region(), DEFAULT_REGION);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.flags.region_filter, RegionFilter::Disabled);
    }

    #[test]
    fn step_context_follows_config() {
        let mut config = TeardownConfig::new("env", "ci");
        config.target.region = "eu-west-1".to_string();
        config.flags.dry_run = false;
        config.flags.kms_pending_window_days = 7;

        let cancel = CancellationToken::new();
        let ctx = config.step_context(cancel.clone());
        assert!(!ctx.dry_run);
        assert_eq!(ctx.kms_pending_window_days, 7);
        assert_eq!(ctx.default_region, "eu-west-1");

        cancel.cancel();
        assert!(ctx.cancel.is_cancelled());
    }
}
