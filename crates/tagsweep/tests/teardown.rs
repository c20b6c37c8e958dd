//! End-to-end teardown against the in-memory cloud
//!
//! Drives discovery, routing and every handler through the orchestrator,
//! asserting on the step reports and on the calls that reached the fake.


use tagsweep::orchestrator::{Orchestrator, TeardownError, flatten};
use tagsweep::router::RegionFilter;
use tagsweep::testing::{FakeCloud, FakePrincipal, REGION};
use tagsweep_common::{ApiOutcome, ResourceKind};
use teardown_helpers::*;

#[tokio::test]
async fn instance_with_group_and_volume() {
    let cloud = FakeCloud::new();
    seed_instance(&cloud);

    let reports = delete_tagged(&cloud, &live_config()).await.unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].kind, ResourceKind::Ec2Instance);
    assert_eq!(
        messages(&reports[0].steps),
        [
            "Successfully detached security-group with ID sg-app from instance with ID i-1",
            "Successfully detached volume with ID vol-data from instance with ID i-1",
            "Successfully deleted instance with ID i-1",
        ]
    );
    assert!(reports[0].succeeded());

    // The last group is swapped for the VPC default, never left empty
    assert_eq!(
        cloud.call_log(),
        [
            "set_instance_security_groups i-1 sg-default",
            "detach_volume vol-data i-1",
            "terminate_instance i-1",
        ]
    );
    assert!(cloud.inspect(|s| s.instances["i-1"].is_terminated()));
    assert!(cloud.inspect(|s| s.volumes["vol-data"].is_empty()));
}

#[tokio::test]
async fn role_with_boundary_and_embedded_policies() {
    let cloud = FakeCloud::new();
    cloud.add_role(
        "ci-role",
        FakePrincipal {
            permissions_boundary: Some("arn:aws:iam::aws:policy/Boundary".to_string()),
            inline_policies: vec!["logs".to_string(), "s3".to_string()],
            tags: vec![(TAG_KEY.to_string(), TAG_VALUE.to_string())],
            ..Default::default()
        },
    );

    let reports = delete_tagged(&cloud, &live_config()).await.unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].arn, role_arn("ci-role"));
    assert_eq!(
        messages(&reports[0].steps),
        [
            "Successfully deleted role-permissions-boundary with ID permissions-boundary-ci-role",
            "Successfully deleted embedded-policy with ID logs",
            "Successfully deleted embedded-policy with ID s3",
            "Successfully deleted role with ID ci-role",
        ]
    );
    assert!(cloud.inspect(|s| s.roles.is_empty()));
}

#[tokio::test]
async fn nothing_tagged_yields_no_reports() {
    let cloud = FakeCloud::new();
    cloud.add_function("untagged");

    let reports = delete_tagged(&cloud, &live_config()).await.unwrap();

    assert!(reports.is_empty());
    assert_eq!(cloud.mutation_count(), 0);
}

#[tokio::test]
async fn bucket_objects_are_deleted_in_one_step() {
    let cloud = FakeCloud::new();
    seed_bucket(&cloud);

    let reports = delete_tagged(&cloud, &live_config()).await.unwrap();

    assert_eq!(
        messages(&reports[0].steps),
        [
            "Successfully deleted objects with ID a.txt | b.txt",
            "Successfully deleted bucket with ID logs",
        ]
    );
    assert_eq!(cloud.calls("delete_objects"), 1);
    assert!(cloud.inspect(|s| s.buckets.is_empty()));
}

#[tokio::test]
async fn empty_bucket_skips_object_step() {
    let cloud = FakeCloud::new();
    cloud.add_bucket("empty", &[]);

    let steps = process(&cloud, &live_config(), &[bucket_arn("empty")]).await.unwrap();

    assert_eq!(messages(&steps), ["Successfully deleted bucket with ID empty"]);
    assert_eq!(cloud.calls("delete_objects"), 0);
}

#[tokio::test]
async fn dry_run_plans_without_mutating() {
    let cloud = FakeCloud::new();
    seed_instance(&cloud);
    seed_bucket(&cloud);

    let reports = delete_tagged(&cloud, &dry_run_config()).await.unwrap();
    let steps = flatten(reports);

    assert_eq!(steps.len(), 5);
    assert!(all_succeeded(&steps));
    assert_eq!(cloud.mutation_count(), 0);
    assert!(cloud.inspect(|s| !s.instances["i-1"].is_terminated()));
    assert!(cloud.inspect(|s| s.buckets["logs"].len() == 2));
}

#[tokio::test]
async fn second_run_finds_nothing_to_do() {
    let cloud = FakeCloud::new();
    seed_instance(&cloud);
    seed_bucket(&cloud);
    cloud.add_kms_key("key-1");
    cloud.tag(
        &format!("arn:aws:kms:{REGION}:123456789012:key/key-1"),
        TAG_KEY,
        TAG_VALUE,
    );

    let first = delete_tagged(&cloud, &live_config()).await.unwrap();
    assert_eq!(first.len(), 3);
    let calls = cloud.mutation_count();

    let second = delete_tagged(&cloud, &live_config()).await.unwrap();
    assert!(second.is_empty());
    assert_eq!(cloud.mutation_count(), calls);
}

#[tokio::test]
async fn unsupported_arns_fail_without_calls() {
    let cloud = FakeCloud::new();
    let arns = vec![
        "arn:aws:sns:us-east-1:123456789012:alerts".to_string(),
        "not-an-arn".to_string(),
    ];

    let steps = process(&cloud, &live_config(), &arns).await.unwrap();

    assert_eq!(steps.len(), 2);
    assert!(steps.iter().all(|s| !s.is_success()));
    assert!(steps[0].message.contains("arn:aws:sns:us-east-1:123456789012:alerts"));
    assert!(steps[1].message.contains("not-an-arn"));
    assert_eq!(cloud.mutation_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn rejected_call_is_attempted_three_times() {
    let cloud = FakeCloud::new();
    cloud.add_function("f");
    cloud.fail_op("delete_function", ApiOutcome::with_status(500));

    let mut config = live_config();
    config.retry = Default::default();

    let steps = process(&cloud, &config, &[function_arn("f")]).await.unwrap();

    assert_eq!(messages(&steps), ["Unable to delete function with ID f"]);
    assert_eq!(cloud.calls("delete_function"), 3);
}

#[tokio::test]
async fn failed_step_does_not_stop_later_steps() {
    let cloud = FakeCloud::new();
    cloud.add_user(
        "ci-user",
        FakePrincipal {
            attached_policies: vec![policy_arn("ro")],
            access_keys: vec!["AKIA1".to_string()],
            ..Default::default()
        },
    );
    cloud.fail_op(
        "detach_user_policy",
        ApiOutcome::failed(
            403,
            tagsweep_common::ApiErrorDetail::new("AccessDenied", "not allowed"),
        ),
    );

    let steps = process(&cloud, &live_config(), &[user_arn("ci-user")]).await.unwrap();

    assert_eq!(steps.len(), 3);
    assert!(!steps[0].is_success());
    assert_eq!(steps[0].error.as_ref().unwrap().code, "AccessDenied");
    assert_eq!(steps[1].message, "Successfully deleted access-key with ID AKIA1");
    // The user still has a policy attached, so the delete is refused
    assert!(!steps[2].is_success());
    assert_eq!(steps[2].error.as_ref().unwrap().code, "DeleteConflict");
}

#[tokio::test]
async fn missing_default_group_stops_only_that_instance() {
    let cloud = FakeCloud::new();
    cloud.add_instance("i-2", "vpc-nodefault", &["sg-only"], &[]);
    seed_bucket(&cloud);

    let arns = vec![instance_arn("i-2"), bucket_arn("logs")];
    let reports = Orchestrator::new(&cloud, &live_config(), Default::default())
        .process_resources(&arns, REGION)
        .await
        .unwrap();

    assert_eq!(reports.len(), 2);
    let instance = &reports[0].steps;
    assert_eq!(instance.len(), 1);
    assert_eq!(
        instance[0].message,
        "Unable to detach security-group with ID sg-only from instance with ID i-2"
    );
    assert_eq!(instance[0].error.as_ref().unwrap().code, "NoDefaultSecurityGroup");
    assert_eq!(cloud.calls("terminate_instance"), 0);

    assert!(reports[1].succeeded());
}

#[tokio::test]
async fn dry_run_without_default_group_still_plans_terminate() {
    let cloud = FakeCloud::new();
    cloud.add_instance("i-2", "vpc-nodefault", &["sg-only"], &[]);

    let steps = process(&cloud, &dry_run_config(), &[instance_arn("i-2")])
        .await
        .unwrap();

    assert_eq!(
        messages(&steps),
        [
            "Successfully detached security-group with ID sg-only from instance with ID i-2",
            "Successfully deleted instance with ID i-2",
        ]
    );
    assert!(all_succeeded(&steps));
    assert_eq!(cloud.mutation_count(), 0);
}

#[tokio::test]
async fn unavailable_client_aborts_the_batch() {
    let cloud = FakeCloud::new();
    cloud.add_function("f");
    cloud.make_unavailable("lambda");

    let err = process(&cloud, &live_config(), &[function_arn("f")])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        TeardownError::ClientUnavailable {
            kind: ResourceKind::LambdaFunction,
            ..
        }
    ));
    assert_eq!(cloud.mutation_count(), 0);
}

#[tokio::test]
async fn client_failure_lets_started_resources_finish() {
    let cloud = FakeCloud::new();
    cloud.add_bucket("logs", &[]);
    cloud.add_function("f");
    cloud.add_bucket("later", &[]);
    cloud.make_unavailable("lambda");

    let mut config = live_config();
    config.flags.concurrency = 2;
    let arns = vec![bucket_arn("logs"), function_arn("f"), bucket_arn("later")];
    let err = process(&cloud, &config, &arns).await.unwrap_err();

    assert!(matches!(err, TeardownError::ClientUnavailable { .. }));
    // Started before the failure, so it ran to completion
    assert_eq!(cloud.call_log(), ["delete_bucket logs"]);
    // Not yet started when the batch aborted
    assert!(cloud.inspect(|s| s.buckets.contains_key("later")));
}

#[tokio::test]
async fn query_error_is_reported() {
    let cloud = FakeCloud::new();
    cloud.add_function("f");
    cloud.fail_read(
        "function_exists",
        tagsweep::aws::classify_aws_error(Some("AccessDeniedException"), Some("denied")),
    );

    let steps = process(&cloud, &live_config(), &[function_arn("f")]).await.unwrap();

    assert_eq!(messages(&steps), ["Unable to query function with ID f"]);
    assert_eq!(cloud.mutation_count(), 0);
}

#[tokio::test]
async fn vanished_resource_yields_no_reports() {
    let cloud = FakeCloud::new();

    let steps = process(&cloud, &live_config(), &[function_arn("gone"), bucket_arn("gone")])
        .await
        .unwrap();

    assert!(steps.is_empty());
}

#[tokio::test]
async fn region_filter_skips_other_regions() {
    let cloud = FakeCloud::new();
    cloud.add_function("f");
    cloud.add_bucket("b", &[]);
    let arns = vec![
        "arn:aws:lambda:us-west-2:123456789012:function:f".to_string(),
        bucket_arn("b"),
    ];

    let mut config = live_config();
    config.flags.region_filter = RegionFilter::TargetOnly;
    let reports = Orchestrator::new(&cloud, &config, Default::default())
        .process_resources(&arns, REGION)
        .await
        .unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].kind, ResourceKind::S3Bucket);
    assert_eq!(cloud.calls("delete_function"), 0);

    let reports = Orchestrator::new(&cloud, &live_config(), Default::default())
        .process_resources(&arns[..1], REGION)
        .await
        .unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(cloud.calls("delete_function"), 1);
}

#[tokio::test]
async fn concurrent_processing_keeps_input_order() {
    let cloud = FakeCloud::new();
    let arns: Vec<String> = (0..8)
        .map(|i| {
            let name = format!("fn-{i}");
            cloud.add_function(&name);
            function_arn(&name)
        })
        .collect();

    let mut config = live_config();
    config.flags.concurrency = 4;
    let reports = Orchestrator::new(&cloud, &config, Default::default())
        .process_resources(&arns, REGION)
        .await
        .unwrap();

    let order: Vec<&str> = reports.iter().map(|r| r.arn.as_str()).collect();
    assert_eq!(order, arns.iter().map(String::as_str).collect::<Vec<_>>());
}

#[tokio::test]
async fn cancelled_run_starts_no_resources() {
    let cloud = FakeCloud::new();
    seed_bucket(&cloud);

    let cancel = tokio_util::sync::CancellationToken::new();
    cancel.cancel();
    let reports = Orchestrator::new(&cloud, &live_config(), cancel)
        .delete_resources(TAG_KEY, TAG_VALUE, REGION)
        .await
        .unwrap();

    assert!(reports.is_empty());
    assert_eq!(cloud.mutation_count(), 0);
}

#[tokio::test]
async fn security_group_is_detached_before_delete() {
    let cloud = FakeCloud::new();
    cloud.add_default_group("vpc-1", "sg-default");
    cloud.add_instance("i-a", "vpc-1", &["sg-shared", "sg-web"], &[]);
    cloud.add_instance("i-b", "vpc-1", &["sg-shared"], &[]);

    let steps = process(&cloud, &live_config(), &[security_group_arn("sg-shared")])
        .await
        .unwrap();

    assert!(all_succeeded(&steps));
    assert_eq!(
        cloud.call_log(),
        [
            "set_instance_security_groups i-a sg-web",
            "set_instance_security_groups i-b sg-default",
            "delete_security_group sg-shared",
        ]
    );
}

#[tokio::test]
async fn attached_volume_is_detached_then_deleted() {
    let cloud = FakeCloud::new();
    cloud.add_instance("i-1", "vpc-1", &["sg-app"], &["vol-data"]);

    let steps = process(&cloud, &live_config(), &[volume_arn("vol-data")]).await.unwrap();

    assert_eq!(
        messages(&steps),
        [
            "Successfully detached volume with ID vol-data from instance with ID i-1",
            "Successfully deleted volume with ID vol-data",
        ]
    );
}

#[tokio::test]
async fn policy_is_detached_everywhere_before_delete() {
    let cloud = FakeCloud::new();
    let arn = policy_arn("ci-policy");
    cloud.add_policy(&arn, &["v2"], &[]);
    cloud.add_user(
        "u",
        FakePrincipal {
            attached_policies: vec![arn.clone()],
            ..Default::default()
        },
    );
    cloud.add_role(
        "r",
        FakePrincipal {
            attached_policies: vec![arn.clone()],
            ..Default::default()
        },
    );
    cloud.edit(|s| {
        s.groups.insert("g".to_string(), vec![arn.clone()]);
    });

    let steps = process(&cloud, &live_config(), &[arn.clone()]).await.unwrap();

    assert!(all_succeeded(&steps));
    assert_eq!(steps.len(), 5);
    assert_eq!(steps[3].message, "Successfully deleted policy-version with ID ci-policy-v2");
    assert_eq!(steps[4].message, format!("Successfully deleted policy with ID {arn}"));
    assert!(cloud.inspect(|s| s.policies.is_empty()));
}

#[tokio::test]
async fn user_is_stripped_before_delete() {
    let cloud = FakeCloud::new();
    cloud.add_user(
        "ci-user",
        FakePrincipal {
            permissions_boundary: Some("arn:aws:iam::aws:policy/Boundary".to_string()),
            attached_policies: vec![policy_arn("ro")],
            inline_policies: vec!["inline".to_string()],
            access_keys: vec!["AKIA1".to_string(), "AKIA2".to_string()],
            ..Default::default()
        },
    );

    let steps = process(&cloud, &live_config(), &[user_arn("ci-user")]).await.unwrap();

    assert!(all_succeeded(&steps));
    assert_eq!(steps.len(), 6);
    assert_eq!(
        steps[0].message,
        "Successfully detached permissions-boundary with ID N/A from user with ID ci-user"
    );
    assert_eq!(steps[5].message, "Successfully deleted user with ID ci-user");
}

#[tokio::test]
async fn kms_key_is_disabled_then_scheduled() {
    let cloud = FakeCloud::new();
    cloud.add_kms_key("key-1");
    let arn = format!("arn:aws:kms:{REGION}:123456789012:key/key-1");

    let mut config = live_config();
    config.flags.kms_pending_window_days = 7;
    let steps = process(&cloud, &config, &[arn]).await.unwrap();

    assert_eq!(
        messages(&steps),
        [
            "Successfully disabled key with ID key-1",
            "Successfully deleted key with ID key-1",
        ]
    );
    assert_eq!(
        cloud.call_log(),
        ["disable_key key-1", "schedule_key_deletion key-1 7"]
    );
}

#[tokio::test]
async fn usage_plan_stages_and_mappings_go_first() {
    let cloud = FakeCloud::new();
    cloud.add_rest_api("api1");
    cloud.add_stage("api1", "prod");
    cloud.add_usage_plan("plan1", &[("api1", "prod")]);
    cloud.add_mapping("api.example.com", "v1", "api1", Some("prod"));
    let arn = format!("arn:aws:apigateway:{REGION}::/usageplans/plan1");

    let steps = process(&cloud, &live_config(), &[arn]).await.unwrap();

    assert_eq!(
        messages(&steps),
        [
            "Successfully deleted base-path-mapping with ID v1",
            "Successfully deleted api-stage with ID prod",
            "Successfully deleted usage-plan with ID plan1",
        ]
    );
    assert!(cloud.inspect(|s| s.rest_apis.contains("api1")));
}

#[tokio::test]
async fn rest_api_mappings_are_removed_first() {
    let cloud = FakeCloud::new();
    cloud.add_rest_api("api1");
    cloud.add_mapping("api.example.com", "(none)", "api1", None);
    let arn = format!("arn:aws:apigateway:{REGION}::/restapis/api1");

    let steps = process(&cloud, &live_config(), &[arn]).await.unwrap();

    assert!(all_succeeded(&steps));
    assert_eq!(steps.len(), 2);
    assert!(cloud.inspect(|s| s.rest_apis.is_empty() && s.mappings.is_empty()));
}

#[tokio::test]
async fn hierarchical_parameter_keeps_leading_slash() {
    let cloud = FakeCloud::new();
    cloud.add_parameter("/app/db/password");
    let arn = format!("arn:aws:ssm:{REGION}:123456789012:parameter/app/db/password");

    let steps = process(&cloud, &live_config(), &[arn]).await.unwrap();

    assert_eq!(
        messages(&steps),
        ["Successfully deleted parameter with ID /app/db/password"]
    );
    assert!(cloud.inspect(|s| s.parameters.is_empty()));
}

#[tokio::test]
async fn stage_mappings_go_before_the_stage() {
    let cloud = FakeCloud::new();
    cloud.add_rest_api("api1");
    cloud.add_stage("api1", "prod");
    cloud.add_stage("api1", "dev");
    cloud.add_mapping("api.example.com", "v1", "api1", Some("prod"));
    cloud.add_mapping("api.example.com", "beta", "api1", Some("dev"));
    let arn = format!("arn:aws:apigateway:{REGION}::/restapis/api1/stages/prod");

    let steps = process(&cloud, &live_config(), &[arn]).await.unwrap();

    assert_eq!(
        messages(&steps),
        [
            "Successfully deleted base-path-mapping with ID v1",
            "Successfully deleted api-stage with ID prod",
        ]
    );
    assert_eq!(
        cloud.call_log(),
        [
            "delete_base_path_mapping api.example.com v1",
            "delete_stage api1 prod",
        ]
    );
    // Only the targeted stage and its mapping are gone
    assert!(cloud.inspect(|s| s.stages.contains(&("api1".to_string(), "dev".to_string()))));
    assert!(cloud.inspect(|s| s.mappings.len() == 1 && s.rest_apis.contains("api1")));
}

#[tokio::test]
async fn api_key_is_deleted() {
    let cloud = FakeCloud::new();
    cloud.add_api_key("k1");
    let arn = format!("arn:aws:apigateway:{REGION}::/apikeys/k1");

    let steps = process(&cloud, &live_config(), &[arn]).await.unwrap();

    assert_eq!(messages(&steps), ["Successfully deleted api-key with ID k1"]);
    assert_eq!(cloud.call_log(), ["delete_api_key k1"]);
    assert!(cloud.inspect(|s| s.api_keys.is_empty()));
}

#[tokio::test]
async fn role_leaves_instance_profiles_before_delete() {
    let cloud = FakeCloud::new();
    cloud.add_role(
        "ci-role",
        FakePrincipal {
            instance_profiles: vec!["ci-profile".to_string()],
            ..Default::default()
        },
    );

    let steps = process(&cloud, &live_config(), &[role_arn("ci-role")]).await.unwrap();

    assert_eq!(
        messages(&steps),
        [
            "Successfully detached role with ID ci-role from instance-profile with ID ci-profile",
            "Successfully deleted role with ID ci-role",
        ]
    );
    assert_eq!(
        cloud.call_log(),
        [
            "remove_role_from_instance_profile ci-profile ci-role",
            "delete_role ci-role",
        ]
    );
    assert!(cloud.inspect(|s| s.roles.is_empty()));
}

#[tokio::test]
async fn unattached_volume_and_group_are_deleted_directly() {
    let cloud = FakeCloud::new();
    cloud.add_volume("vol-loose");
    cloud.add_security_group("sg-loose");

    let steps = process(
        &cloud,
        &live_config(),
        &[volume_arn("vol-loose"), security_group_arn("sg-loose")],
    )
    .await
    .unwrap();

    assert_eq!(
        messages(&steps),
        [
            "Successfully deleted volume with ID vol-loose",
            "Successfully deleted security-group with ID sg-loose",
        ]
    );
    assert_eq!(
        cloud.call_log(),
        ["delete_volume vol-loose", "delete_security_group sg-loose"]
    );
}
