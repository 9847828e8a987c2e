//! Cluster task lookup.

use tracing::info;

use super::{NotReady, ResolveError, TaskSet};
use crate::cloud::TaskQuery;
use crate::retry::{Readiness, RetryPolicy, Sleeper, retry};

/// Lists tasks in `cluster` until at least one is visible.
///
/// An empty listing is not an error from the provider's point of view, but
/// right after a deploy it only means the scheduler has not placed the task
/// yet, so it is retried like a failed call.
///
/// # Errors
///
/// Returns [`ResolveError::Exhausted`] when no task shows up within the
/// policy's attempts.
pub fn locate_tasks<Q, S>(
    tasks: &Q,
    cluster: &str,
    policy: RetryPolicy,
    sleeper: &S,
) -> Result<TaskSet, ResolveError>
where
    Q: TaskQuery + ?Sized,
    S: Sleeper + ?Sized,
{
    let task_set = retry("get tasks", policy, sleeper, || {
        match tasks.list_tasks(cluster) {
            Ok(arns) => TaskSet::new(arns).map_or_else(
                || {
                    Readiness::NotReady(NotReady::EmptyTaskList {
                        cluster: cluster.to_owned(),
                    })
                },
                Readiness::Ready,
            ),
            Err(err) => Readiness::NotReady(err.into()),
        }
    })?;
    info!(cluster, tasks = task_set.len(), "retrieved tasks");
    Ok(task_set)
}
