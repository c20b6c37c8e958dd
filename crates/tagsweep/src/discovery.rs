//! Tag discovery
//!
//! The Resource Groups Tagging API indexes most regional resources but not
//! IAM users, roles or policies, so those are found by listing each entity
//! and checking its tags. Results are merged with tagging-API ARNs first,
//! duplicates dropped.

use crate::aws::{AwsError, ClientFactory, IamEntity, IamOperations, Tags, TaggingOperations};
use std::collections::HashSet;
use std::future::Future;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Failed to create {service} client for region {region}")]
    ClientUnavailable {
        service: &'static str,
        region: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to list {what}")]
    Lookup {
        what: &'static str,
        #[source]
        source: AwsError,
    },
}

fn has_tag(tags: &Tags, key: &str, value: &str) -> bool {
    tags.iter().any(|(k, v)| k == key && v == value)
}

/// Entities whose tags include `key=value`. Entities deleted mid-scan are skipped.
async fn tagged_entities<L, T, Fut>(
    what: &'static str,
    listing: L,
    mut tags_of: T,
    key: &str,
    value: &str,
) -> Result<Vec<String>, DiscoveryError>
where
    L: Future<Output = Result<Vec<IamEntity>, AwsError>>,
    T: FnMut(IamEntity) -> Fut,
    Fut: Future<Output = (IamEntity, Result<Tags, AwsError>)>,
{
    let entities = listing
        .await
        .map_err(|source| DiscoveryError::Lookup { what, source })?;
    let total = entities.len();

    let mut matched = Vec::new();
    for entity in entities {
        match tags_of(entity).await {
            (entity, Ok(tags)) if has_tag(&tags, key, value) => matched.push(entity.arn),
            (_, Ok(_)) => {}
            (entity, Err(e)) if e.is_not_found() => {
                debug!(arn = %entity.arn, "Entity disappeared during scan");
            }
            (_, Err(source)) => return Err(DiscoveryError::Lookup { what, source }),
        }
    }

    debug!(what, total, matched = matched.len(), "Scanned IAM entities");
    Ok(matched)
}

/// IAM users, roles and customer-managed policies carrying the tag
pub async fn iam_resources_by_tag<I: IamOperations>(
    iam: &I,
    key: &str,
    value: &str,
) -> Result<Vec<String>, DiscoveryError> {
    let mut arns = tagged_entities(
        "IAM users",
        iam.list_users(),
        |e| async move {
            let tags = iam.user_tags(&e.name).await;
            (e, tags)
        },
        key,
        value,
    )
    .await?;

    arns.extend(
        tagged_entities(
            "IAM roles",
            iam.list_roles(),
            |e| async move {
                let tags = iam.role_tags(&e.name).await;
                (e, tags)
            },
            key,
            value,
        )
        .await?,
    );

    arns.extend(
        tagged_entities(
            "IAM policies",
            iam.list_local_policies(),
            |e| async move {
                let tags = iam.policy_tags(&e.arn).await;
                (e, tags)
            },
            key,
            value,
        )
        .await?,
    );

    Ok(arns)
}

/// Merge ARN lists, keeping the first occurrence of each.
pub fn merge_unique(sources: impl IntoIterator<Item = Vec<String>>) -> Vec<String> {
    let mut seen = HashSet::new();
    sources
        .into_iter()
        .flatten()
        .filter(|arn| seen.insert(arn.clone()))
        .collect()
}

/// Every ARN in `region` (plus global IAM entities) tagged `key=value`.
pub async fn discover<F: ClientFactory>(
    factory: &F,
    region: &str,
    key: &str,
    value: &str,
) -> Result<Vec<String>, DiscoveryError> {
    let client_error = |service: &'static str| {
        move |source| DiscoveryError::ClientUnavailable {
            service,
            region: region.to_string(),
            source,
        }
    };

    let tagging = factory.tagging(region).map_err(client_error("tagging"))?;
    let iam = factory.iam(region).map_err(client_error("iam"))?;

    let tagged = tagging
        .resources_by_tag(key, value)
        .await
        .map_err(|source| DiscoveryError::Lookup {
            what: "tagged resources",
            source,
        })?;
    let iam_tagged = iam_resources_by_tag(&iam, key, value).await?;

    let arns = merge_unique([tagged, iam_tagged]);
    info!(
        tag_key = %key,
        tag_value = %value,
        region = %region,
        count = arns.len(),
        "Discovered tagged resources"
    );
    Ok(arns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_first_occurrence_order() {
        let merged = merge_unique([
            vec!["a".to_string(), "b".to_string(), "a".to_string()],
            vec!["c".to_string(), "b".to_string()],
        ]);
        assert_eq!(merged, ["a", "b", "c"]);
    }

    #[test]
    fn tag_match_needs_key_and_value() {
        let tags = vec![("env".to_string(), "ci".to_string())];
        assert!(has_tag(&tags, "env", "ci"));
        assert!(!has_tag(&tags, "env", "prod"));
        assert!(!has_tag(&tags, "Env", "ci"));
    }
}
