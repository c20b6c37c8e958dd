//! tagsweep - Tag-driven AWS resource teardown
//!
//! Discovers every resource carrying a given tag, routes each ARN to the
//! handler for its resource kind and runs that handler's ordered destroy
//! sequence, collecting one report per side effect.

pub mod aws;
pub mod config;
pub mod discovery;
pub mod handlers;
pub mod orchestrator;
pub mod registry;
pub mod retry;
pub mod router;
pub mod summary;
pub mod wait;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
