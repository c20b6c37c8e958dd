//! Tag discovery across the tagging API and IAM


use tagsweep::aws::classify_aws_error;
use tagsweep::discovery::{DiscoveryError, discover, iam_resources_by_tag};
use tagsweep::orchestrator::TeardownError;
use tagsweep::testing::{FakeCloud, FakePrincipal, REGION};
use teardown_helpers::*;

fn tagged() -> Vec<(String, String)> {
    vec![(TAG_KEY.to_string(), TAG_VALUE.to_string())]
}

#[tokio::test]
async fn iam_entities_are_matched_by_their_tags() {
    let cloud = FakeCloud::new();
    cloud.add_user("tagged-user", FakePrincipal { tags: tagged(), ..Default::default() });
    cloud.add_user("other-user", FakePrincipal::default());
    cloud.add_role(
        "other-value",
        FakePrincipal {
            tags: vec![(TAG_KEY.to_string(), "y".to_string())],
            ..Default::default()
        },
    );
    cloud.add_role("tagged-role", FakePrincipal { tags: tagged(), ..Default::default() });
    cloud.add_policy(&policy_arn("tagged-policy"), &[], &[(TAG_KEY, TAG_VALUE)]);

    let arns = iam_resources_by_tag(&cloud, TAG_KEY, TAG_VALUE).await.unwrap();

    assert_eq!(
        arns,
        [
            user_arn("tagged-user"),
            role_arn("tagged-role"),
            policy_arn("tagged-policy"),
        ]
    );
}

#[tokio::test]
async fn tagging_results_come_first_without_duplicates() {
    let cloud = FakeCloud::new();
    cloud.add_role("ci-role", FakePrincipal { tags: tagged(), ..Default::default() });
    cloud.tag(&function_arn("f"), TAG_KEY, TAG_VALUE);
    cloud.tag(&role_arn("ci-role"), TAG_KEY, TAG_VALUE);
    cloud.tag(&bucket_arn("logs"), TAG_KEY, "other");

    let arns = discover(&cloud, REGION, TAG_KEY, TAG_VALUE).await.unwrap();

    assert_eq!(arns, [function_arn("f"), role_arn("ci-role")]);
}

#[tokio::test]
async fn listing_failure_aborts_discovery() {
    let cloud = FakeCloud::new();
    cloud.fail_read(
        "list_roles",
        classify_aws_error(Some("AccessDenied"), Some("iam:ListRoles denied")),
    );

    let err = discover(&cloud, REGION, TAG_KEY, TAG_VALUE).await.unwrap_err();
    assert!(matches!(err, DiscoveryError::Lookup { what: "IAM roles", .. }));

    let err = delete_tagged(&cloud, &live_config()).await.unwrap_err();
    assert!(matches!(err, TeardownError::Discovery(_)));
}

#[tokio::test]
async fn entity_deleted_mid_scan_is_skipped() {
    let cloud = FakeCloud::new();
    cloud.add_user("racing", FakePrincipal { tags: tagged(), ..Default::default() });
    cloud.fail_read(
        "user_tags",
        classify_aws_error(Some("NoSuchEntity"), Some("user is gone")),
    );

    let arns = discover(&cloud, REGION, TAG_KEY, TAG_VALUE).await.unwrap();
    assert!(arns.is_empty());
}

#[tokio::test]
async fn unavailable_tagging_client_is_reported() {
    let cloud = FakeCloud::new();
    cloud.make_unavailable("tagging");

    let err = discover(&cloud, REGION, TAG_KEY, TAG_VALUE).await.unwrap_err();
    assert!(matches!(
        err,
        DiscoveryError::ClientUnavailable { service: "tagging", .. }
    ));
}
