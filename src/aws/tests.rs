//! Unit tests for the AWS CLI adapter.

use rstest::{fixture, rstest};

use super::*;
use crate::cloud::AttachmentDetail;
use crate::test_support::{
    ScriptedRunner, json_network_interfaces, json_task, json_task_arns, json_zones,
};

#[fixture]
fn runner() -> ScriptedRunner {
    ScriptedRunner::new()
}

fn client(runner: &ScriptedRunner) -> AwsCli<ScriptedRunner> {
    AwsCli::new("aws", "us-west-2", runner.clone()).expect("valid client")
}

#[rstest]
#[case("", "us-west-2", "aws_bin")]
#[case("aws", "  ", "region")]
fn rejects_blank_settings(#[case] bin: &str, #[case] region: &str, #[case] field: &str) {
    let err = AwsCli::new(bin, region, ScriptedRunner::new()).expect_err("blank setting");
    assert_eq!(
        err,
        QueryError::InvalidConfig {
            field: field.to_owned()
        }
    );
}

#[rstest]
fn list_tasks_renders_cluster_and_region(runner: ScriptedRunner) {
    runner.push_output(Some(0), json_task_arns(&["arn:1", "arn:2"]), "");

    let tasks = client(&runner).list_tasks("c1").expect("listing parses");

    assert_eq!(tasks, vec![String::from("arn:1"), String::from("arn:2")]);
    let invocations = runner.invocations();
    let [invocation] = invocations.as_slice() else {
        panic!("expected one invocation, got {invocations:?}");
    };
    assert_eq!(
        invocation.command_string(),
        "aws ecs list-tasks --cluster c1 --region us-west-2 --output json"
    );
}

#[rstest]
fn list_tasks_tolerates_missing_array(runner: ScriptedRunner) {
    runner.push_output(Some(0), "{}", "");
    let tasks = client(&runner).list_tasks("c1").expect("empty listing");
    assert!(tasks.is_empty());
}

#[rstest]
fn describe_tasks_maps_attachments(runner: ScriptedRunner) {
    runner.push_output(
        Some(0),
        json_task(
            "arn:1",
            &[("subnetId", "subnet-1"), ("networkInterfaceId", "eni-1")],
        ),
        "",
    );

    let tasks = client(&runner)
        .describe_tasks("c1", &[String::from("arn:1")])
        .expect("describe parses");

    let [task] = tasks.as_slice() else {
        panic!("expected one task, got {tasks:?}");
    };
    assert_eq!(task.arn, "arn:1");
    assert_eq!(task.last_status.as_deref(), Some("RUNNING"));
    let attachment = task.attachments.first().expect("attachment present");
    assert_eq!(attachment.kind.as_deref(), Some("ElasticNetworkInterface"));
    assert_eq!(
        attachment.details,
        vec![
            AttachmentDetail::new("subnetId", "subnet-1"),
            AttachmentDetail::new("networkInterfaceId", "eni-1"),
        ]
    );
    assert_eq!(
        runner
            .invocations()
            .first()
            .map(crate::test_support::CommandInvocation::command_string),
        Some(String::from(
            "aws ecs describe-tasks --cluster c1 --tasks arn:1 --region us-west-2 --output json"
        ))
    );
}

#[rstest]
fn describe_tasks_skips_call_without_arns(runner: ScriptedRunner) {
    let tasks = client(&runner).describe_tasks("c1", &[]).expect("no-op");
    assert!(tasks.is_empty());
    assert!(runner.invocations().is_empty());
}

#[rstest]
fn execute_command_is_interactive_without_json_output(runner: ScriptedRunner) {
    runner.push_success();
    let request = ExecuteCommandRequest {
        cluster: String::from("c1"),
        task: String::from("t1"),
        command: String::from("ls /"),
        interactive: true,
    };

    client(&runner)
        .execute_command(&request)
        .expect("request accepted");

    let invocation = runner.invocations().pop().expect("one invocation");
    assert_eq!(
        invocation.args,
        os_args([
            "ecs",
            "execute-command",
            "--cluster",
            "c1",
            "--task",
            "t1",
            "--command",
            "ls /",
            "--interactive",
            "--region",
            "us-west-2",
        ])
    );
    assert!(invocation.env.is_empty());
}

#[rstest]
fn execute_command_fails_when_session_plugin_is_missing(runner: ScriptedRunner) {
    runner.push_failure(255, "SessionManagerPlugin is not found.\n");
    let request = ExecuteCommandRequest {
        cluster: String::from("c1"),
        task: String::from("t1"),
        command: String::from("ls /"),
        interactive: true,
    };

    let err = client(&runner)
        .execute_command(&request)
        .expect_err("plugin missing");

    assert!(matches!(
        err,
        QueryError::CommandFailure { status: Some(255), ref stderr, .. }
            if stderr == "execute-command: SessionManagerPlugin is not found."
    ));
}

#[rstest]
fn clients_report_their_bound_region(runner: ScriptedRunner) {
    let aws = client(&runner);

    assert_eq!(TaskQuery::region(&aws), Some("us-west-2"));
    assert_eq!(NetworkQuery::region(&aws), Some("us-west-2"));
    assert_eq!(aws.region(), "us-west-2");
}

#[rstest]
fn describe_network_interfaces_reads_public_ip(runner: ScriptedRunner) {
    runner.push_output(
        Some(0),
        json_network_interfaces(&[("eni-1", Some("203.0.113.5")), ("eni-2", None)]),
        "",
    );

    let interfaces = client(&runner)
        .describe_network_interfaces(&[String::from("eni-1"), String::from("eni-2")])
        .expect("describe parses");

    assert_eq!(
        interfaces,
        vec![
            NetworkInterface {
                id: String::from("eni-1"),
                public_ip: Some(String::from("203.0.113.5")),
            },
            NetworkInterface {
                id: String::from("eni-2"),
                public_ip: None,
            },
        ]
    );
}

#[rstest]
fn availability_zones_keep_listing_order(runner: ScriptedRunner) {
    runner.push_output(
        Some(0),
        json_zones(&["us-west-2a", "us-west-2b", "us-west-2c", "us-west-2d"]),
        "",
    );

    let zones = client(&runner).availability_zones().expect("zones parse");

    assert_eq!(
        zones,
        vec!["us-west-2a", "us-west-2b", "us-west-2c", "us-west-2d"]
    );
    let invocation = runner.invocations().pop().expect("one invocation");
    assert!(
        invocation
            .command_string()
            .contains("--filters Name=state,Values=available")
    );
}

#[rstest]
fn non_zero_exit_maps_to_command_failure(runner: ScriptedRunner) {
    runner.push_failure(255, "An error occurred (ClusterNotFoundException)\n");

    let err = client(&runner).list_tasks("missing").expect_err("failure");

    assert_eq!(
        err,
        QueryError::CommandFailure {
            program: String::from("aws"),
            status: Some(255),
            status_text: String::from("255"),
            stderr: String::from("list-tasks: An error occurred (ClusterNotFoundException)"),
        }
    );
}

#[rstest]
fn malformed_json_maps_to_parse_error(runner: ScriptedRunner) {
    runner.push_output(Some(0), "not json", "");

    let err = client(&runner)
        .describe_network_interfaces(&[String::from("eni-1")])
        .expect_err("parse failure");

    assert!(matches!(
        err,
        QueryError::Parse { ref resource, .. } if resource == "describe-network-interfaces"
    ));
}

#[rstest]
fn spawn_failure_maps_to_runner_error(runner: ScriptedRunner) {
    let err = client(&runner).list_tasks("c1").expect_err("no response queued");
    assert!(matches!(err, QueryError::Runner(_)));
}
