//! Query interfaces for the container service and the network layer.
//!
//! The resolution pipeline only needs a handful of read calls (plus the
//! execute-command channel), so they are expressed as two small traits.
//! [`crate::aws::AwsCli`] implements both against the AWS CLI; tests use
//! scripted doubles from [`crate::test_support`].

use thiserror::Error;

use crate::command::CommandError;

/// Detail name under which the container service reports the interface id.
pub const NETWORK_INTERFACE_ID_DETAIL: &str = "networkInterfaceId";

/// A running task as reported by `describe-tasks`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Task {
    /// Fully qualified task ARN.
    pub arn: String,
    /// Last status reported by the scheduler (for example `RUNNING`).
    pub last_status: Option<String>,
    /// Network attachments bound to the task, in reported order.
    pub attachments: Vec<Attachment>,
}

/// Network interface binding associated with a task.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Attachment {
    /// Attachment identifier.
    pub id: Option<String>,
    /// Attachment type, usually `ElasticNetworkInterface`.
    pub kind: Option<String>,
    /// Attachment status (for example `ATTACHED`).
    pub status: Option<String>,
    /// Connection details in reported order.
    pub details: Vec<AttachmentDetail>,
}

impl Attachment {
    /// Looks up a detail value by name.
    #[must_use]
    pub fn detail(&self, name: &str) -> Option<&str> {
        self.details
            .iter()
            .find(|detail| detail.name == name)
            .map(|detail| detail.value.as_str())
    }
}

/// Name/value pair carried by an [`Attachment`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AttachmentDetail {
    /// Detail key, for example `subnetId` or `networkInterfaceId`.
    pub name: String,
    /// Detail value.
    pub value: String,
}

impl AttachmentDetail {
    /// Builds a detail from a name and value.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Network interface as reported by `describe-network-interfaces`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NetworkInterface {
    /// Interface identifier (`eni-…`).
    pub id: String,
    /// Public IPv4 address from the interface association, if any.
    pub public_ip: Option<String>,
}

/// Parameters of an interactive execute-command request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExecuteCommandRequest {
    /// Cluster hosting the task.
    pub cluster: String,
    /// Short task identifier (last segment of the ARN).
    pub task: String,
    /// Command to run inside the container.
    pub command: String,
    /// Whether the session is interactive.
    pub interactive: bool,
}

/// Errors raised by query clients.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum QueryError {
    /// Raised when the client is built with an unusable setting.
    #[error("invalid client configuration: missing {field}")]
    InvalidConfig {
        /// Name of the missing or invalid field.
        field: String,
    },
    /// Raised when the CLI returns a non-zero exit status.
    #[error("{program} exited with status {status_text}: {stderr}")]
    CommandFailure {
        /// Program that failed.
        program: String,
        /// Exit status reported by the OS.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stderr captured from the command, prefixed with the operation.
        stderr: String,
    },
    /// Raised when CLI output cannot be parsed.
    #[error("failed to parse {resource} output: {message}")]
    Parse {
        /// Resource being parsed (for example `tasks`).
        resource: String,
        /// Parser error message.
        message: String,
    },
    /// Raised when the CLI cannot be started.
    #[error(transparent)]
    Runner(#[from] CommandError),
}

/// Read access to tasks of a cluster plus the execute-command channel.
pub trait TaskQuery {
    /// Lists the ARNs of tasks currently known to `cluster`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when the listing call fails.
    fn list_tasks(&self, cluster: &str) -> Result<Vec<String>, QueryError>;

    /// Describes the given tasks.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when the describe call fails.
    fn describe_tasks(&self, cluster: &str, task_arns: &[String]) -> Result<Vec<Task>, QueryError>;

    /// Sends an execute-command request. Success means the request was
    /// accepted, not that the command completed.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when the request is rejected.
    fn execute_command(&self, request: &ExecuteCommandRequest) -> Result<(), QueryError>;

    /// Region this client is bound to, when it is bound to one.
    fn region(&self) -> Option<&str> {
        None
    }
}

/// Read access to network interfaces and zones of a region.
pub trait NetworkQuery {
    /// Describes the given network interfaces.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when the describe call fails.
    fn describe_network_interfaces(
        &self,
        interface_ids: &[String],
    ) -> Result<Vec<NetworkInterface>, QueryError>;

    /// Lists the names of available zones in the region.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when the zone listing fails.
    fn availability_zones(&self) -> Result<Vec<String>, QueryError>;

    /// Region this client is bound to, when it is bound to one.
    fn region(&self) -> Option<&str> {
        None
    }
}

impl<Q: TaskQuery + ?Sized> TaskQuery for &Q {
    fn list_tasks(&self, cluster: &str) -> Result<Vec<String>, QueryError> {
        (**self).list_tasks(cluster)
    }

    fn describe_tasks(&self, cluster: &str, task_arns: &[String]) -> Result<Vec<Task>, QueryError> {
        (**self).describe_tasks(cluster, task_arns)
    }

    fn execute_command(&self, request: &ExecuteCommandRequest) -> Result<(), QueryError> {
        (**self).execute_command(request)
    }

    fn region(&self) -> Option<&str> {
        (**self).region()
    }
}

impl<Q: NetworkQuery + ?Sized> NetworkQuery for &Q {
    fn describe_network_interfaces(
        &self,
        interface_ids: &[String],
    ) -> Result<Vec<NetworkInterface>, QueryError> {
        (**self).describe_network_interfaces(interface_ids)
    }

    fn availability_zones(&self) -> Result<Vec<String>, QueryError> {
        (**self).availability_zones()
    }

    fn region(&self) -> Option<&str> {
        (**self).region()
    }
}
