//! Unit tests for the resolution steps and their composition.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use rstest::{fixture, rstest};

use super::*;
use crate::cloud::{QueryError, Task};
use crate::retry::RetryPolicy;
use crate::test_support::{
    RecordingSleeper, ScriptedNetwork, ScriptedTasks, interface, task_with_details,
};

const ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 5));

fn policy(attempts: u32) -> RetryPolicy {
    RetryPolicy::new(attempts, Duration::from_secs(30)).expect("valid policy")
}

fn task_set(arns: &[&str]) -> TaskSet {
    TaskSet::new(arns.iter().map(|arn| (*arn).to_owned()).collect()).expect("non-empty")
}

#[fixture]
fn sleeper() -> RecordingSleeper {
    RecordingSleeper::new()
}

#[rstest]
fn locate_retries_empty_listings(sleeper: RecordingSleeper) {
    let tasks = ScriptedTasks::new();
    tasks.push_empty_listing();
    tasks.push_empty_listing();
    tasks.push_listing(["arn:1"]);

    let located = locate_tasks(&tasks, "c1", policy(3), &sleeper).expect("third attempt");

    assert_eq!(located.as_slice(), ["arn:1"]);
    assert_eq!(tasks.list_calls().len(), 3);
    assert_eq!(sleeper.count(), 2);
}

#[rstest]
fn locate_treats_failed_listing_as_not_ready(sleeper: RecordingSleeper) {
    let tasks = ScriptedTasks::new();
    tasks.push_listing_error(QueryError::Parse {
        resource: String::from("list-tasks"),
        message: String::from("eof"),
    });
    tasks.push_listing(["arn:1", "arn:2"]);

    let located = locate_tasks(&tasks, "c1", policy(3), &sleeper).expect("second attempt");

    assert_eq!(located.len(), 2);
    assert_eq!(located.first(), "arn:1");
}

#[rstest]
fn locate_exhausts_on_persistently_empty_cluster(sleeper: RecordingSleeper) {
    let tasks = ScriptedTasks::new();
    for _ in 0..3 {
        tasks.push_empty_listing();
    }

    let err = locate_tasks(&tasks, "c1", policy(3), &sleeper).expect_err("never ready");

    assert_eq!(
        err.not_ready(),
        Some(&NotReady::EmptyTaskList {
            cluster: String::from("c1")
        })
    );
    assert!(err.to_string().starts_with("'get tasks' unsuccessful after 3 attempts"));
    assert_eq!(sleeper.count(), 2);
}

#[rstest]
#[case::no_details(&[], false)]
#[case::single_detail(&[("networkInterfaceId", "eni-1")], false)]
#[case::two_details(&[("subnetId", "subnet-1"), ("networkInterfaceId", "eni-1")], true)]
#[case::three_details(
    &[("subnetId", "subnet-1"), ("networkInterfaceId", "eni-1"), ("macAddress", "0a:00")],
    true
)]
fn attachment_requires_two_details(
    sleeper: RecordingSleeper,
    #[case] details: &[(&str, &str)],
    #[case] ready: bool,
) {
    let tasks = ScriptedTasks::new();
    tasks.push_description(vec![task_with_details("arn:1", details)]);

    let result = resolve_interface_id(&tasks, "c1", &task_set(&["arn:1"]), policy(1), &sleeper);

    if ready {
        assert_eq!(result.expect("ready").as_str(), "eni-1");
    } else {
        let err = result.expect_err("not ready");
        assert_eq!(
            err.not_ready(),
            Some(&NotReady::IncompleteAttachment {
                task: String::from("arn:1"),
                details: details.len(),
            })
        );
    }
}

#[rstest]
fn attachment_prefers_named_detail_over_position(sleeper: RecordingSleeper) {
    let tasks = ScriptedTasks::new();
    tasks.push_description(vec![task_with_details(
        "arn:1",
        &[
            ("networkInterfaceId", "eni-named"),
            ("subnetId", "subnet-1"),
        ],
    )]);

    let id = resolve_interface_id(&tasks, "c1", &task_set(&["arn:1"]), policy(1), &sleeper)
        .expect("named detail present");

    assert_eq!(id, InterfaceId::from("eni-named"));
}

#[rstest]
fn attachment_falls_back_to_second_detail(sleeper: RecordingSleeper) {
    let tasks = ScriptedTasks::new();
    tasks.push_description(vec![task_with_details(
        "arn:1",
        &[("subnetId", "subnet-1"), ("eni", "eni-positional")],
    )]);

    let id = resolve_interface_id(&tasks, "c1", &task_set(&["arn:1"]), policy(1), &sleeper)
        .expect("positional fallback");

    assert_eq!(id.as_str(), "eni-positional");
}

#[rstest]
fn attachment_describes_only_the_first_task(sleeper: RecordingSleeper) {
    let tasks = ScriptedTasks::new();
    tasks.push_description(vec![task_with_details(
        "arn:1",
        &[("subnetId", "subnet-1"), ("networkInterfaceId", "eni-1")],
    )]);

    resolve_interface_id(
        &tasks,
        "c1",
        &task_set(&["arn:1", "arn:2"]),
        policy(1),
        &sleeper,
    )
    .expect("first task resolves");

    assert_eq!(tasks.describe_calls(), vec![vec![String::from("arn:1")]]);
}

#[rstest]
fn attachment_retries_until_task_is_wired(sleeper: RecordingSleeper) {
    let tasks = ScriptedTasks::new();
    tasks.push_description(Vec::new());
    tasks.push_description(vec![Task {
        arn: String::from("arn:1"),
        ..Task::default()
    }]);
    tasks.push_description(vec![task_with_details(
        "arn:1",
        &[("subnetId", "subnet-1"), ("networkInterfaceId", "eni-1")],
    )]);

    let id = resolve_interface_id(&tasks, "c1", &task_set(&["arn:1"]), policy(3), &sleeper)
        .expect("third attempt");

    assert_eq!(id.as_str(), "eni-1");
    assert_eq!(sleeper.count(), 2);
}

#[rstest]
fn attachment_reports_missing_attachments_on_exhaustion(sleeper: RecordingSleeper) {
    let tasks = ScriptedTasks::new();
    tasks.push_description(vec![Task {
        arn: String::from("arn:1"),
        ..Task::default()
    }]);

    let err = resolve_interface_id(&tasks, "c1", &task_set(&["arn:1"]), policy(1), &sleeper)
        .expect_err("no attachments");

    assert_eq!(
        err.not_ready(),
        Some(&NotReady::NoAttachments {
            task: String::from("arn:1")
        })
    );
}

#[rstest]
fn address_rejects_empty_interface_list(sleeper: RecordingSleeper) {
    let network = ScriptedNetwork::new();

    let err = resolve_public_address(&network, &[], policy(3), &sleeper).expect_err("no ids");

    assert!(matches!(err, ResolveError::NoInterfaceIds));
    assert!(network.describe_calls().is_empty());
    assert_eq!(sleeper.count(), 0);
}

#[rstest]
fn address_waits_for_public_association(sleeper: RecordingSleeper) {
    let network = ScriptedNetwork::new();
    network.push_interfaces(Vec::new());
    network.push_interfaces(vec![interface("eni-1", None)]);
    network.push_interfaces(vec![interface("eni-1", Some("203.0.113.5"))]);

    let address = resolve_public_address(
        &network,
        &[InterfaceId::from("eni-1")],
        policy(3),
        &sleeper,
    )
    .expect("third attempt");

    assert_eq!(address, ADDRESS);
    assert_eq!(network.describe_calls().len(), 3);
}

#[rstest]
#[case::missing(None, NotReady::NoPublicAddress { interface: String::from("eni-1") })]
#[case::garbage(
    Some("not-an-ip"),
    NotReady::InvalidAddress {
        interface: String::from("eni-1"),
        address: String::from("not-an-ip"),
    }
)]
fn address_surfaces_final_reason(
    sleeper: RecordingSleeper,
    #[case] public_ip: Option<&str>,
    #[case] expected: NotReady,
) {
    let network = ScriptedNetwork::new();
    network.push_interfaces(vec![interface("eni-1", public_ip)]);
    network.push_interfaces(vec![interface("eni-1", public_ip)]);

    let err = resolve_public_address(
        &network,
        &[InterfaceId::from("eni-1")],
        policy(2),
        &sleeper,
    )
    .expect_err("never ready");

    assert_eq!(err.not_ready(), Some(&expected));
    assert_eq!(sleeper.count(), 1);
}

fn seeded_backend() -> (ScriptedTasks, ScriptedNetwork) {
    let tasks = ScriptedTasks::new();
    let network = ScriptedNetwork::new();
    for _ in 0..2 {
        tasks.push_listing(["t1"]);
        tasks.push_description(vec![task_with_details(
            "t1",
            &[("subnetId", "subnet-1"), ("networkInterfaceId", "eni-1")],
        )]);
        network.push_interfaces(vec![interface("eni-1", Some("203.0.113.5"))]);
    }
    (tasks, network)
}

#[rstest]
fn pipeline_resolves_with_one_call_per_step(sleeper: RecordingSleeper) {
    let (tasks, network) = seeded_backend();
    let pipeline = ResolutionPipeline::new(&tasks, &network, &sleeper);

    let resolution = pipeline
        .resolve(&ResolutionRequest::new("us-west-2", "c1"))
        .expect("resolves on first attempt");

    assert_eq!(resolution.tasks.as_slice(), ["t1"]);
    assert_eq!(resolution.interface_id.as_str(), "eni-1");
    assert_eq!(resolution.address, ADDRESS);
    assert_eq!(tasks.list_calls(), vec![String::from("c1")]);
    assert_eq!(tasks.describe_calls().len(), 1);
    assert_eq!(network.describe_calls(), vec![vec![String::from("eni-1")]]);
    assert_eq!(sleeper.count(), 0);
}

#[rstest]
fn pipeline_is_idempotent_against_unchanged_backend(sleeper: RecordingSleeper) {
    let (tasks, network) = seeded_backend();
    let pipeline = ResolutionPipeline::new(&tasks, &network, &sleeper);
    let request = ResolutionRequest::new("us-west-2", "c1");

    let first = pipeline.resolve(&request).expect("first run");
    let second = pipeline.resolve(&request).expect("second run");

    assert_eq!(first, second);
}

#[rstest]
fn pipeline_short_circuits_on_locate_failure(sleeper: RecordingSleeper) {
    let tasks = ScriptedTasks::new();
    let network = ScriptedNetwork::new();
    tasks.push_empty_listing();
    tasks.push_empty_listing();
    let pipeline = ResolutionPipeline::new(&tasks, &network, &sleeper)
        .with_policy(PipelinePolicy::uniform(policy(2)));

    let err = pipeline
        .resolve(&ResolutionRequest::new("us-west-2", "c1"))
        .expect_err("no tasks");

    assert!(matches!(
        err.not_ready(),
        Some(NotReady::EmptyTaskList { .. })
    ));
    assert!(tasks.describe_calls().is_empty());
    assert!(network.describe_calls().is_empty());
}

#[rstest]
fn pipeline_accepts_clients_bound_to_the_requested_region(sleeper: RecordingSleeper) {
    let (tasks, network) = seeded_backend();
    let tasks = tasks.with_region("us-west-2");
    let network = network.with_region("us-west-2");
    let pipeline = ResolutionPipeline::new(&tasks, &network, &sleeper);

    let resolution = pipeline
        .resolve(&ResolutionRequest::new(" us-west-2 ", "c1"))
        .expect("regions agree");

    assert_eq!(resolution.address, ADDRESS);
}

#[rstest]
#[case("eu-central-1", "us-west-2", "task")]
#[case("us-west-2", "eu-central-1", "network")]
fn pipeline_rejects_client_bound_to_another_region(
    sleeper: RecordingSleeper,
    #[case] task_region: &str,
    #[case] network_region: &str,
    #[case] expected_client: &str,
) {
    let (seeded_tasks, seeded_network) = seeded_backend();
    let tasks = seeded_tasks.with_region(task_region);
    let network = seeded_network.with_region(network_region);
    let pipeline = ResolutionPipeline::new(&tasks, &network, &sleeper);

    let err = pipeline
        .resolve(&ResolutionRequest::new("us-west-2", "c1"))
        .expect_err("regions differ");

    let ResolveError::RegionMismatch {
        requested,
        client,
        bound,
    } = &err
    else {
        panic!("expected region mismatch, got {err:?}");
    };
    assert_eq!(requested, "us-west-2");
    assert_eq!(*client, expected_client);
    assert_eq!(bound, "eu-central-1");
    assert!(err.not_ready().is_none());
    assert!(tasks.list_calls().is_empty());
    assert!(network.describe_calls().is_empty());
}

#[rstest]
fn pipeline_defaults_to_lookup_policy_on_every_step() {
    let tasks = ScriptedTasks::new();
    let network = ScriptedNetwork::new();
    let pipeline = ResolutionPipeline::new(&tasks, &network, RecordingSleeper::new());
    assert_eq!(
        pipeline.policy(),
        PipelinePolicy::uniform(RetryPolicy::LOOKUP)
    );
}
