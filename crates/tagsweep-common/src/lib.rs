//! tagsweep-common - Shared types for tagsweep
//!
//! SDK-free types used by the teardown engine and its CLI.
//!
//! ## Modules
//!
//! - [`arn`]: ARN parsing and (service, resource-type) extraction
//! - [`defaults`]: Default configuration values
//! - [`report`]: Call outcomes and per-step report records
//! - [`resource_kind`]: Supported resource kinds

pub mod arn;
pub mod defaults;
pub mod report;
pub mod resource_kind;

pub use arn::{Arn, ArnError, ResourceKey};
pub use report::{Action, ApiErrorDetail, ApiOutcome, StepReport, StepResult};
pub use resource_kind::ResourceKind;
