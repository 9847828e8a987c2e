//! Remote command execution through the container service's exec channel.

use thiserror::Error;
use tracing::info;

use crate::cloud::{ExecuteCommandRequest, QueryError, TaskQuery};
use crate::resolve::{ResolveError, locate_tasks, short_task_id};
use crate::retry::{Readiness, RetryError, RetryPolicy, Sleeper, retry};

/// Errors raised while executing a remote command.
#[derive(Debug, Error)]
pub enum ExecError {
    /// Raised when the cluster's task cannot be located.
    #[error("failed to locate task: {0}")]
    Locate(#[from] ResolveError),
    /// Raised when every execute-command request was rejected.
    #[error(transparent)]
    Exhausted(#[from] RetryError<QueryError>),
}

/// Runs `command` interactively in the first task of `cluster`.
///
/// The request is considered successful once the execute-command call is
/// accepted; the command's own output and exit status are not observed.
///
/// # Errors
///
/// Returns [`ExecError::Locate`] when no task becomes visible and
/// [`ExecError::Exhausted`] when every request attempt fails.
pub fn execute_remote_command<Q, S>(
    tasks: &Q,
    cluster: &str,
    command: &str,
    locate_policy: RetryPolicy,
    exec_policy: RetryPolicy,
    sleeper: &S,
) -> Result<ExecuteCommandRequest, ExecError>
where
    Q: TaskQuery + ?Sized,
    S: Sleeper + ?Sized,
{
    let task_set = locate_tasks(tasks, cluster, locate_policy, sleeper)?;
    let request = ExecuteCommandRequest {
        cluster: cluster.to_owned(),
        task: short_task_id(task_set.first()).to_owned(),
        command: command.to_owned(),
        interactive: true,
    };

    let label = format!(
        "execute command on task {} in cluster {}",
        request.task, request.cluster
    );
    retry(&label, exec_policy, sleeper, || {
        Readiness::from(tasks.execute_command(&request))
    })?;
    info!(cluster, task = %request.task, command, "executed command");
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingSleeper, ScriptedTasks};
    use std::time::Duration;

    fn policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_secs(30)).expect("valid policy")
    }

    #[test]
    fn executes_against_short_task_id() {
        let tasks = ScriptedTasks::new();
        tasks.push_listing(["arn:aws:ecs:us-west-2:1:task/svc/abc123"]);
        tasks.push_exec_failure("TargetNotConnectedException");
        tasks.push_exec_success();
        let sleeper = RecordingSleeper::new();

        let request =
            execute_remote_command(&tasks, "svc", "ls /", policy(3), policy(3), &sleeper)
                .expect("exec should succeed on second attempt");

        assert_eq!(request.task, "abc123");
        assert!(request.interactive);
        assert_eq!(tasks.exec_requests(), vec![request.clone(), request]);
        assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(30)]);
    }

    #[test]
    fn surfaces_last_rejection_after_exhaustion() {
        let tasks = ScriptedTasks::new();
        tasks.push_listing(["arn:1/t1"]);
        tasks.push_exec_failure("first");
        tasks.push_exec_failure("second");
        let sleeper = RecordingSleeper::new();

        let err = execute_remote_command(&tasks, "svc", "ls", policy(3), policy(2), &sleeper)
            .expect_err("exec should exhaust");

        let ExecError::Exhausted(retry_err) = err else {
            panic!("expected exhaustion, got {err:?}");
        };
        assert!(retry_err.last().to_string().contains("second"));
        assert_eq!(sleeper.count(), 1);
    }

    #[test]
    fn fails_when_cluster_has_no_tasks() {
        let tasks = ScriptedTasks::new();
        tasks.push_empty_listing();
        let sleeper = RecordingSleeper::new();

        let err = execute_remote_command(&tasks, "svc", "ls", policy(1), policy(1), &sleeper)
            .expect_err("no tasks");
        assert!(matches!(err, ExecError::Locate(_)));
        assert!(tasks.exec_requests().is_empty());
    }
}
