//! Network attachment lookup for the first task of a set.

use tracing::info;

use super::{InterfaceId, NotReady, ResolveError, TaskSet};
use crate::cloud::{NETWORK_INTERFACE_ID_DETAIL, Task, TaskQuery};
use crate::retry::{Readiness, RetryPolicy, Sleeper, retry};

/// Fewest details an attachment needs before its interface id is trusted.
pub const MIN_ATTACHMENT_DETAILS: usize = 2;

/// Position of the interface id when the details carry no usable name.
pub const INTERFACE_DETAIL_POSITION: usize = 1;

/// Resolves the network interface bound to the first task in `task_set`.
///
/// Additional tasks are ignored. Each attempt describes the task and checks,
/// in order, that it was returned, that it has an attachment, and that the
/// first attachment carries at least [`MIN_ATTACHMENT_DETAILS`] details.
/// The id is read from the `networkInterfaceId` detail, falling back to the
/// detail at [`INTERFACE_DETAIL_POSITION`].
///
/// # Errors
///
/// Returns [`ResolveError::Exhausted`] when the attachment stays incomplete.
pub fn resolve_interface_id<Q, S>(
    tasks: &Q,
    cluster: &str,
    task_set: &TaskSet,
    policy: RetryPolicy,
    sleeper: &S,
) -> Result<InterfaceId, ResolveError>
where
    Q: TaskQuery + ?Sized,
    S: Sleeper + ?Sized,
{
    let first = vec![task_set.first().to_owned()];
    let interface_id = retry(
        "get public elastic network interface",
        policy,
        sleeper,
        || match tasks.describe_tasks(cluster, &first) {
            Ok(described) => described.first().map_or_else(
                || {
                    Readiness::NotReady(NotReady::TaskNotDescribed {
                        task: task_set.first().to_owned(),
                    })
                },
                interface_id_from,
            ),
            Err(err) => Readiness::NotReady(err.into()),
        },
    )?;
    info!(
        cluster,
        task = task_set.first(),
        interface = %interface_id,
        "retrieved public elastic network interface"
    );
    Ok(interface_id)
}

fn interface_id_from(task: &Task) -> Readiness<InterfaceId, NotReady> {
    let Some(attachment) = task.attachments.first() else {
        return Readiness::NotReady(NotReady::NoAttachments {
            task: task.arn.clone(),
        });
    };

    let incomplete = || NotReady::IncompleteAttachment {
        task: task.arn.clone(),
        details: attachment.details.len(),
    };

    if attachment.details.len() < MIN_ATTACHMENT_DETAILS {
        return Readiness::NotReady(incomplete());
    }

    attachment
        .detail(NETWORK_INTERFACE_ID_DETAIL)
        .or_else(|| {
            attachment
                .details
                .get(INTERFACE_DETAIL_POSITION)
                .map(|detail| detail.value.as_str())
        })
        .filter(|value| !value.is_empty())
        .map_or_else(
            || Readiness::NotReady(incomplete()),
            |value| Readiness::Ready(InterfaceId::from(value)),
        )
}
