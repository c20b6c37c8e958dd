//! Per-resource teardown procedures
//!
//! Each supported [`ResourceKind`] has a unit struct implementing
//! [`ResourceHandler`]. The shared [`destroy_with`] template drives them:
//!
//! 1. resolve a region-scoped client from the [`ClientFactory`]
//! 2. check the resource still exists (absent resources yield no reports)
//! 3. run the handler's detach steps, then its terminal step(s)
//!
//! Every mutating call goes through [`Steps::mutate`], which applies the
//! retry policy (or skips the call in dry-run mode) and appends one
//! [`StepReport`]. Reports are never reordered.

pub mod apigateway;
pub mod ec2;
pub mod iam;
pub mod kms;
pub mod lambda;
pub mod s3;
pub mod ssm;
pub mod unsupported;

use crate::aws::{AwsError, ClientFactory};
use crate::retry::{RetryPolicy, with_retry};
use crate::wait::WaitConfig;
use std::future::Future;
use tagsweep_common::defaults::{DEFAULT_KMS_PENDING_WINDOW_DAYS, DEFAULT_REGION};
use tagsweep_common::{Action, ApiErrorDetail, ApiOutcome, Arn, ResourceKind, StepReport};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Settings shared by every step of a run
#[derive(Debug, Clone)]
pub struct StepContext {
    pub dry_run: bool,
    pub retry: RetryPolicy,
    pub cancel: CancellationToken,
    pub kms_pending_window_days: i32,
    pub termination_wait: WaitConfig,
    /// Region used for ARNs without one (IAM, S3)
    pub default_region: String,
}

impl Default for StepContext {
    fn default() -> Self {
        Self {
            dry_run: true,
            retry: RetryPolicy::default(),
            cancel: CancellationToken::new(),
            kms_pending_window_days: DEFAULT_KMS_PENDING_WINDOW_DAYS,
            termination_wait: WaitConfig::default(),
            default_region: DEFAULT_REGION.to_string(),
        }
    }
}

/// A required condition for a detach step does not hold. Stops the resource.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Precondition {
    #[error(
        "Cannot detach security group {security_group_id} from instance {instance_id}: \
         it is the last group and the VPC has no default security group"
    )]
    NoDefaultSecurityGroup {
        instance_id: String,
        security_group_id: String,
    },
}

impl Precondition {
    /// Failure record for the step the precondition blocked
    pub fn report(&self) -> StepReport {
        match self {
            Precondition::NoDefaultSecurityGroup {
                instance_id,
                security_group_id,
            } => StepReport::failure(
                Action::detach("security-group", security_group_id, "instance", instance_id)
                    .failure_message(),
                Some(ApiErrorDetail::new("NoDefaultSecurityGroup", self.to_string())),
            ),
        }
    }
}

/// Why a resource's teardown could not run to completion
#[derive(Debug, Error)]
pub enum DestroyError {
    /// No client could be built; fatal for the whole batch
    #[error("Failed to create client for {kind} in region {region}")]
    ClientUnavailable {
        kind: ResourceKind,
        region: String,
        #[source]
        source: anyhow::Error,
    },

    /// Teardown stopped early; `reports` holds the steps already taken
    #[error("{precondition}")]
    Precondition {
        #[source]
        precondition: Precondition,
        reports: Vec<StepReport>,
    },
}

/// Ordered step recorder for one resource
#[derive(Debug)]
pub struct Steps<'a> {
    ctx: &'a StepContext,
    arn: &'a str,
    reports: Vec<StepReport>,
}

impl<'a> Steps<'a> {
    pub fn new(ctx: &'a StepContext, arn: &'a str) -> Self {
        Self {
            ctx,
            arn,
            reports: Vec::new(),
        }
    }

    pub fn context(&self) -> &'a StepContext {
        self.ctx
    }

    pub fn is_dry_run(&self) -> bool {
        self.ctx.dry_run
    }

    /// Perform a mutating call without recording it.
    ///
    /// In dry-run mode the call is never made and a synthetic success is
    /// returned.
    pub async fn call<F, Fut>(&self, action: &Action, call: F) -> ApiOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiOutcome>,
    {
        if self.ctx.dry_run {
            info!(arn = %self.arn, "[DRY RUN] {}", action.success_message());
            return ApiOutcome::dry_run();
        }
        let operation = action.success_message();
        with_retry(&self.ctx.retry, &self.ctx.cancel, &operation, call).await
    }

    /// Perform a mutating call and record its report. Returns whether it was accepted.
    pub async fn mutate<F, Fut>(&mut self, action: Action, call: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiOutcome>,
    {
        let outcome = self.call(&action, call).await;
        self.record(StepReport::from_outcome(&action, &outcome));
        outcome.is_accepted()
    }

    /// Unwrap a listing result needed to plan detach steps.
    ///
    /// A failed listing is recorded and planning continues with nothing to detach.
    pub fn listed<T: Default>(
        &mut self,
        result: Result<T, AwsError>,
        what: &str,
        owner_type: &str,
        owner_id: &str,
    ) -> T {
        match result {
            Ok(items) => items,
            Err(e) => {
                self.record(StepReport::list_failed(what, owner_type, owner_id, e.detail()));
                T::default()
            }
        }
    }

    pub fn record(&mut self, report: StepReport) {
        if report.is_success() {
            if !self.ctx.dry_run {
                info!(arn = %self.arn, "{}", report.message);
            }
        } else {
            warn!(arn = %self.arn, error = ?report.error, "{}", report.message);
        }
        self.reports.push(report);
    }

    pub fn into_reports(self) -> Vec<StepReport> {
        self.reports
    }
}

/// Teardown procedure for one resource kind
pub trait ResourceHandler<F: ClientFactory> {
    const KIND: ResourceKind;

    type Client;

    fn client(factory: &F, region: &str) -> anyhow::Result<Self::Client>;

    /// Local identifier used in report messages
    fn resource_id(arn: &Arn) -> String {
        arn.resource_id().to_string()
    }

    /// Whether the resource still exists and is not already being deleted
    fn query(client: &Self::Client, arn: &Arn) -> impl Future<Output = Result<bool, AwsError>>;

    /// Detach steps followed by the terminal step(s)
    fn teardown(
        client: &Self::Client,
        arn: &Arn,
        steps: &mut Steps<'_>,
    ) -> impl Future<Output = Result<(), Precondition>>;
}

/// Shared destroy template
pub async fn destroy_with<H, F>(
    factory: &F,
    arn: &Arn,
    ctx: &StepContext,
) -> Result<Vec<StepReport>, DestroyError>
where
    H: ResourceHandler<F>,
    F: ClientFactory,
{
    let region = match arn.region() {
        "" => ctx.default_region.as_str(),
        region => region,
    };
    let client = H::client(factory, region).map_err(|source| DestroyError::ClientUnavailable {
        kind: H::KIND,
        region: region.to_string(),
        source,
    })?;
    let id = H::resource_id(arn);
    let mut steps = Steps::new(ctx, arn.as_str());

    match H::query(&client, arn).await {
        Ok(true) => {}
        Ok(false) => {
            debug!(arn = %arn, kind = %H::KIND, "Resource already gone, nothing to do");
            return Ok(Vec::new());
        }
        Err(e) => {
            steps.record(StepReport::query_failed(H::KIND.report_name(), &id, e.detail()));
            return Ok(steps.into_reports());
        }
    }

    info!(arn = %arn, kind = %H::KIND, id = %id, dry_run = ctx.dry_run, "Tearing down resource");

    match H::teardown(&client, arn, &mut steps).await {
        Ok(()) => Ok(steps.into_reports()),
        Err(precondition) => Err(DestroyError::Precondition {
            precondition,
            reports: steps.into_reports(),
        }),
    }
}

/// Destroy `arn` with the handler registered for `kind`.
pub async fn destroy<F: ClientFactory>(
    kind: ResourceKind,
    factory: &F,
    arn: &str,
    ctx: &StepContext,
) -> Result<Vec<StepReport>, DestroyError> {
    let parsed = match Arn::parse(arn) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!(error = %e, "Unparseable ARN");
            return Ok(unsupported::destroy(arn));
        }
    };

    match kind {
        ResourceKind::Ec2Instance => destroy_with::<ec2::Instance, F>(factory, &parsed, ctx).await,
        ResourceKind::Ec2SecurityGroup => {
            destroy_with::<ec2::SecurityGroup, F>(factory, &parsed, ctx).await
        }
        ResourceKind::Ec2Volume => destroy_with::<ec2::Volume, F>(factory, &parsed, ctx).await,
        ResourceKind::IamUser => destroy_with::<iam::User, F>(factory, &parsed, ctx).await,
        ResourceKind::IamRole => destroy_with::<iam::Role, F>(factory, &parsed, ctx).await,
        ResourceKind::IamPolicy => destroy_with::<iam::Policy, F>(factory, &parsed, ctx).await,
        ResourceKind::ApiGatewayRestApi => {
            destroy_with::<apigateway::RestApi, F>(factory, &parsed, ctx).await
        }
        ResourceKind::ApiGatewayUsagePlan => {
            destroy_with::<apigateway::UsagePlan, F>(factory, &parsed, ctx).await
        }
        ResourceKind::ApiGatewayStage => {
            destroy_with::<apigateway::Stage, F>(factory, &parsed, ctx).await
        }
        ResourceKind::ApiGatewayApiKey => {
            destroy_with::<apigateway::ApiKey, F>(factory, &parsed, ctx).await
        }
        ResourceKind::KmsKey => destroy_with::<kms::Key, F>(factory, &parsed, ctx).await,
        ResourceKind::LambdaFunction => {
            destroy_with::<lambda::Function, F>(factory, &parsed, ctx).await
        }
        ResourceKind::S3Bucket => destroy_with::<s3::Bucket, F>(factory, &parsed, ctx).await,
        ResourceKind::SsmParameter => {
            destroy_with::<ssm::Parameter, F>(factory, &parsed, ctx).await
        }
        ResourceKind::Unsupported => Ok(unsupported::destroy(arn)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::classify_aws_error;
    use tagsweep_common::StepResult;

    fn live() -> StepContext {
        StepContext {
            dry_run: false,
            ..StepContext::default()
        }
    }

    #[tokio::test]
    async fn dry_run_skips_the_call() {
        let ctx = StepContext::default();
        let mut steps = Steps::new(&ctx, "arn:aws:s3:::b");
        let mut calls = 0;

        let accepted = steps
            .mutate(Action::delete("bucket", "b"), || {
                calls += 1;
                async { ApiOutcome::with_status(500) }
            })
            .await;

        assert!(accepted);
        assert_eq!(calls, 0);
        let reports = steps.into_reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].message, "Successfully deleted bucket with ID b");
    }

    #[tokio::test]
    async fn live_call_records_outcome() {
        let ctx = live();
        let mut steps = Steps::new(&ctx, "arn:aws:lambda:us-east-1:1:function:f");

        steps
            .mutate(Action::delete("function", "f"), || async { ApiOutcome::with_status(204) })
            .await;

        let reports = steps.into_reports();
        assert_eq!(reports[0].result, StepResult::Success);
        assert_eq!(reports[0].message, "Successfully deleted function with ID f");
    }

    #[test]
    fn failed_listing_is_recorded_and_empty() {
        let ctx = live();
        let mut steps = Steps::new(&ctx, "arn:aws:iam::1:user/u");

        let keys: Vec<String> = steps.listed(
            Err(classify_aws_error(Some("AccessDenied"), Some("nope"))),
            "access keys",
            "user",
            "u",
        );

        assert!(keys.is_empty());
        let reports = steps.into_reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].message, "Unable to list access keys of user with ID u");
        assert_eq!(reports[0].error.as_ref().map(|e| e.code.as_str()), Some("AccessDenied"));
    }

    #[test]
    fn precondition_report_names_both_ids() {
        let report = Precondition::NoDefaultSecurityGroup {
            instance_id: "i-1".into(),
            security_group_id: "sg-1".into(),
        }
        .report();

        assert!(!report.is_success());
        assert_eq!(
            report.message,
            "Unable to detach security-group with ID sg-1 from instance with ID i-1"
        );
        assert_eq!(
            report.error.map(|e| e.code),
            Some("NoDefaultSecurityGroup".to_string())
        );
    }
}
