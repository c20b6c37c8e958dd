//! Destroy orchestration
//!
//! Routes each ARN to its handler, runs the handler's destroy sequence and
//! collects the step reports. Per-resource failures are reports, never
//! errors; only an unobtainable client or a failed discovery aborts the run.
//! An abort skips resources not yet started and lets in-flight ones finish.

use crate::aws::ClientFactory;
use crate::config::TeardownConfig;
use crate::discovery::{self, DiscoveryError};
use crate::handlers::{self, DestroyError, StepContext};
use crate::router::{self, RegionFilter, Route};
use futures::{StreamExt, stream};
use serde::Serialize;
use tagsweep_common::{ResourceKind, StepReport};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum TeardownError {
    #[error("Failed to create client for {kind} in region {region}")]
    ClientUnavailable {
        kind: ResourceKind,
        region: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Discovery failed")]
    Discovery(#[from] DiscoveryError),
}

/// Steps taken for one ARN
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceReport {
    pub arn: String,
    pub kind: ResourceKind,
    pub steps: Vec<StepReport>,
}

impl ResourceReport {
    pub fn succeeded(&self) -> bool {
        self.steps.iter().all(StepReport::is_success)
    }
}

/// Concatenate every resource's steps, keeping order.
pub fn flatten(resources: Vec<ResourceReport>) -> Vec<StepReport> {
    resources.into_iter().flat_map(|r| r.steps).collect()
}

pub struct Orchestrator<'a, F> {
    factory: &'a F,
    ctx: StepContext,
    concurrency: usize,
    region_filter: RegionFilter,
}

impl<'a, F: ClientFactory> Orchestrator<'a, F> {
    pub fn new(factory: &'a F, config: &TeardownConfig, cancel: CancellationToken) -> Self {
        Self {
            factory,
            ctx: config.step_context(cancel),
            concurrency: config.flags.concurrency.max(1),
            region_filter: config.flags.region_filter,
        }
    }

    /// Tear down every ARN and return its reports, in input order.
    ///
    /// Resources that were already gone produce no entry.
    pub async fn process_resources(
        &self,
        arns: &[String],
        region: &str,
    ) -> Result<Vec<ResourceReport>, TeardownError> {
        let routes = router::route(arns, region, self.region_filter);
        let ctx = StepContext {
            default_region: region.to_string(),
            cancel: self.ctx.cancel.child_token(),
            ..self.ctx.clone()
        };

        info!(
            count = routes.len(),
            region = %region,
            dry_run = ctx.dry_run,
            concurrency = self.concurrency,
            "Processing resources"
        );

        let results: Vec<Result<Option<ResourceReport>, TeardownError>> = stream::iter(routes)
            .map(|route| self.process_one(route, &ctx))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut reports = Vec::with_capacity(results.len());
        for result in results {
            if let Some(report) = result? {
                reports.push(report);
            }
        }
        let failed = reports.iter().filter(|r| !r.succeeded()).count();
        info!(resources = reports.len(), failed, "Processing complete");
        Ok(reports)
    }

    /// Flattened step reports for every ARN
    pub async fn process(&self, arns: &[String], region: &str) -> Result<Vec<StepReport>, TeardownError> {
        Ok(flatten(self.process_resources(arns, region).await?))
    }

    /// Discover everything tagged `tag_key=tag_value` in `region` and tear it down.
    pub async fn delete_resources(
        &self,
        tag_key: &str,
        tag_value: &str,
        region: &str,
    ) -> Result<Vec<ResourceReport>, TeardownError> {
        let arns = discovery::discover(self.factory, region, tag_key, tag_value).await?;
        self.process_resources(&arns, region).await
    }

    async fn process_one(
        &self,
        route: Route,
        ctx: &StepContext,
    ) -> Result<Option<ResourceReport>, TeardownError> {
        if ctx.cancel.is_cancelled() {
            warn!(arn = %route.arn, "Cancelled, skipping resource");
            return Ok(None);
        }

        let steps = match handlers::destroy(route.kind, self.factory, &route.arn, ctx).await {
            Ok(steps) => steps,
            Err(DestroyError::Precondition {
                precondition,
                mut reports,
            }) => {
                warn!(arn = %route.arn, error = %precondition, "Precondition failed, stopping resource");
                reports.push(precondition.report());
                reports
            }
            Err(DestroyError::ClientUnavailable {
                kind,
                region,
                source,
            }) => {
                ctx.cancel.cancel();
                return Err(TeardownError::ClientUnavailable {
                    kind,
                    region,
                    source,
                });
            }
        };

        if steps.is_empty() {
            return Ok(None);
        }
        Ok(Some(ResourceReport {
            arn: route.arn,
            kind: route.kind,
            steps,
        }))
    }
}
