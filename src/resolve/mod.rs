//! Resolution of a cluster's running task to a reachable public address.
//!
//! The pipeline walks cluster → task → network attachment → public address.
//! Every step is eventually consistent after provisioning, so each one runs
//! under its own [`RetryPolicy`](crate::retry::RetryPolicy) and reports
//! incomplete observations as [`NotReady`] reasons. A step that exhausts
//! its attempts aborts the whole resolution.

mod address;
mod attachment;
mod locate;
mod pipeline;
mod types;

use thiserror::Error;

use crate::cloud::QueryError;
use crate::retry::RetryError;

pub use address::resolve_public_address;
pub use attachment::{INTERFACE_DETAIL_POSITION, MIN_ATTACHMENT_DETAILS, resolve_interface_id};
pub use locate::locate_tasks;
pub use pipeline::{PipelinePolicy, Resolution, ResolutionPipeline, ResolutionRequest};
pub use types::{InterfaceId, TaskSet, short_task_id};

/// Why a single resolution attempt could not produce its value yet.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum NotReady {
    /// The cluster listed no tasks.
    #[error("no tasks listed in cluster {cluster}")]
    EmptyTaskList {
        /// Cluster that was listed.
        cluster: String,
    },
    /// Describing the task returned nothing.
    #[error("describe-tasks returned no tasks for {task}")]
    TaskNotDescribed {
        /// Task ARN that was described.
        task: String,
    },
    /// The task carries no network attachment yet.
    #[error("task {task} has no attachments")]
    NoAttachments {
        /// Task ARN.
        task: String,
    },
    /// The attachment does not yet carry its network interface id.
    #[error("task {task} attachment has {details} detail(s) and no network interface id")]
    IncompleteAttachment {
        /// Task ARN.
        task: String,
        /// Number of details reported.
        details: usize,
    },
    /// The network interface is not visible.
    #[error("no network interface returned for {interface}")]
    InterfaceNotFound {
        /// Interface id that was described.
        interface: String,
    },
    /// The network interface has no public association yet.
    #[error("network interface {interface} has no public address")]
    NoPublicAddress {
        /// Interface id.
        interface: String,
    },
    /// The reported address is not an IP address.
    #[error("network interface {interface} reported unparseable address '{address}'")]
    InvalidAddress {
        /// Interface id.
        interface: String,
        /// Raw value reported by the provider.
        address: String,
    },
    /// The query itself failed; treated as transient.
    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Errors raised by the resolution steps.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Raised when address resolution is asked about no interfaces.
    #[error("no network interface ids supplied")]
    NoInterfaceIds,
    /// Raised when the request names a region other than a client's.
    #[error("request targets region {requested} but the {client} client is bound to {bound}")]
    RegionMismatch {
        /// Region named by the request.
        requested: String,
        /// Client whose region differs (`task` or `network`).
        client: &'static str,
        /// Region the client is bound to.
        bound: String,
    },
    /// Raised when a step stays not ready for its whole attempt budget.
    #[error(transparent)]
    Exhausted(#[from] RetryError<NotReady>),
}

impl ResolveError {
    /// Final not-ready reason when the error came from an exhausted step.
    #[must_use]
    pub const fn not_ready(&self) -> Option<&NotReady> {
        match self {
            Self::NoInterfaceIds | Self::RegionMismatch { .. } => None,
            Self::Exhausted(err) => Some(err.last()),
        }
    }
}

#[cfg(test)]
mod tests;
