//! ARN routing
//!
//! Parses each ARN into a `(service, resource_type)` key and resolves it
//! against the registry. Unparseable ARNs and unknown pairs route to
//! [`ResourceKind::Unsupported`]; routing itself never fails.

use crate::registry;
use serde::Serialize;
use tagsweep_common::{Arn, ResourceKey, ResourceKind};
use tracing::debug;

/// Whether ARNs from other regions are processed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RegionFilter {
    #[default]
    Disabled,
    /// Skip ARNs whose region field is set and differs from the target region
    TargetOnly,
}

impl RegionFilter {
    /// Region-less ARNs (IAM, S3) always pass.
    pub fn admits(self, arn: &str, target_region: &str) -> bool {
        match self {
            RegionFilter::Disabled => true,
            RegionFilter::TargetOnly => match Arn::parse(arn) {
                Ok(parsed) => parsed.region().is_empty() || parsed.region() == target_region,
                Err(_) => true,
            },
        }
    }
}

/// An ARN paired with the kind of handler that will process it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    pub arn: String,
    pub kind: ResourceKind,
}

/// Derive the registry key for an ARN, or `None` if it is malformed.
pub fn parse(arn: &str) -> Option<ResourceKey> {
    Arn::parse(arn).ok().map(|parsed| ResourceKey::from_arn(&parsed))
}

/// Resolve the handler kind for one ARN
pub fn resolve(arn: &str) -> ResourceKind {
    match parse(arn) {
        Some(key) => registry::lookup(&key.service, &key.resource_type),
        None => ResourceKind::Unsupported,
    }
}

/// Route every admitted ARN, preserving input order.
pub fn route(arns: &[String], target_region: &str, filter: RegionFilter) -> Vec<Route> {
    arns.iter()
        .filter(|arn| {
            let admitted = filter.admits(arn, target_region);
            if !admitted {
                debug!(arn = %arn, target_region = %target_region, "Skipping ARN from another region");
            }
            admitted
        })
        .map(|arn| Route {
            arn: arn.clone(),
            kind: resolve(arn),
        })
        .collect()
}
