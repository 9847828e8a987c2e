//! AWS CLI implementation of the cluster and network query interfaces.
//!
//! Each call shells out to `aws <service> <operation> … --region <region>
//! --output json` and parses the JSON printed on stdout. The client is cheap
//! to build and holds no connection state, so callers construct one per
//! region and step as needed.

mod types;

use std::ffi::OsString;

use serde::de::DeserializeOwned;

use crate::cloud::{
    ExecuteCommandRequest, NetworkInterface, NetworkQuery, QueryError, Task, TaskQuery,
};
use crate::command::{CommandOutput, CommandRunner, ProcessCommandRunner, os_args};
use types::{
    DescribeAvailabilityZonesOutput, DescribeNetworkInterfacesOutput, DescribeTasksOutput,
    ListTasksOutput,
};

/// Default AWS CLI binary name.
pub const DEFAULT_AWS_BIN: &str = "aws";

/// Zone state reported for usable availability zones.
const AVAILABLE_ZONE_STATE: &str = "available";

/// Query client backed by the `aws` command-line tool.
#[derive(Clone, Debug)]
pub struct AwsCli<R: CommandRunner> {
    aws_bin: String,
    region: String,
    runner: R,
}

impl AwsCli<ProcessCommandRunner> {
    /// Creates a client wired to the real process runner.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidConfig`] when the binary or region is
    /// blank.
    pub fn with_process_runner(
        aws_bin: impl Into<String>,
        region: impl Into<String>,
    ) -> Result<Self, QueryError> {
        Self::new(aws_bin, region, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> AwsCli<R> {
    /// Creates a client, trimming whitespace from the settings.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidConfig`] when the binary or region is
    /// blank.
    pub fn new(
        aws_bin: impl Into<String>,
        region: impl Into<String>,
        runner: R,
    ) -> Result<Self, QueryError> {
        let trimmed_bin = aws_bin.into().trim().to_owned();
        let trimmed_region = region.into().trim().to_owned();
        if trimmed_bin.is_empty() {
            return Err(QueryError::InvalidConfig {
                field: String::from("aws_bin"),
            });
        }
        if trimmed_region.is_empty() {
            return Err(QueryError::InvalidConfig {
                field: String::from("region"),
            });
        }
        Ok(Self {
            aws_bin: trimmed_bin,
            region: trimmed_region,
            runner,
        })
    }

    /// Region every call is scoped to.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Builds `<service> <operation> <params…> --region <region>` plus an
    /// optional `--output json`.
    fn build_args(
        &self,
        service: &str,
        operation: &str,
        params: Vec<OsString>,
        json_output: bool,
    ) -> Vec<OsString> {
        let mut args = os_args([service, operation]);
        args.extend(params);
        args.push(OsString::from("--region"));
        args.push(OsString::from(&self.region));
        if json_output {
            args.push(OsString::from("--output"));
            args.push(OsString::from("json"));
        }
        args
    }

    /// Checks command output and converts failure to [`QueryError`].
    fn check_output(
        &self,
        output: CommandOutput,
        operation: &str,
    ) -> Result<CommandOutput, QueryError> {
        if output.is_success() {
            return Ok(output);
        }

        Err(QueryError::CommandFailure {
            program: self.aws_bin.clone(),
            status: output.code,
            status_text: output.status_text(),
            stderr: format!("{operation}: {}", output.stderr.trim()),
        })
    }

    fn run_aws(&self, args: &[OsString], operation: &str) -> Result<CommandOutput, QueryError> {
        let output = self.runner.run(&self.aws_bin, args)?;
        self.check_output(output, operation)
    }

    fn run_json<T>(&self, args: &[OsString], resource: &str) -> Result<T, QueryError>
    where
        T: DeserializeOwned,
    {
        let output = self.run_aws(args, resource)?;
        serde_json::from_str::<T>(&output.stdout).map_err(|err| QueryError::Parse {
            resource: resource.to_owned(),
            message: err.to_string(),
        })
    }
}

impl<R: CommandRunner> TaskQuery for AwsCli<R> {
    fn list_tasks(&self, cluster: &str) -> Result<Vec<String>, QueryError> {
        let args = self.build_args("ecs", "list-tasks", os_args(["--cluster", cluster]), true);
        let listing: ListTasksOutput = self.run_json(&args, "list-tasks")?;
        Ok(listing.task_arns)
    }

    fn describe_tasks(&self, cluster: &str, task_arns: &[String]) -> Result<Vec<Task>, QueryError> {
        if task_arns.is_empty() {
            return Ok(Vec::new());
        }
        let mut params = os_args(["--cluster", cluster, "--tasks"]);
        params.extend(task_arns.iter().map(OsString::from));
        let args = self.build_args("ecs", "describe-tasks", params, true);
        let described: DescribeTasksOutput = self.run_json(&args, "describe-tasks")?;
        Ok(described.tasks.into_iter().map(Task::from).collect())
    }

    /// Runs `aws ecs execute-command` as a non-interactive child process.
    ///
    /// The runner captures output and gives the child no stdin, so an
    /// `--interactive` session is handed to `session-manager-plugin` with
    /// nothing to read. The exit status then reflects whether the plugin is
    /// installed and how that session ended, not only whether the request
    /// was accepted.
    fn execute_command(&self, request: &ExecuteCommandRequest) -> Result<(), QueryError> {
        let mut params = os_args([
            "--cluster",
            request.cluster.as_str(),
            "--task",
            request.task.as_str(),
            "--command",
            request.command.as_str(),
        ]);
        if request.interactive {
            params.push(OsString::from("--interactive"));
        }
        let args = self.build_args("ecs", "execute-command", params, false);
        self.run_aws(&args, "execute-command").map(|_| ())
    }

    fn region(&self) -> Option<&str> {
        Some(&self.region)
    }
}

impl<R: CommandRunner> NetworkQuery for AwsCli<R> {
    fn describe_network_interfaces(
        &self,
        interface_ids: &[String],
    ) -> Result<Vec<NetworkInterface>, QueryError> {
        let mut params = os_args(["--network-interface-ids"]);
        params.extend(interface_ids.iter().map(OsString::from));
        let args = self.build_args("ec2", "describe-network-interfaces", params, true);
        let described: DescribeNetworkInterfacesOutput =
            self.run_json(&args, "describe-network-interfaces")?;
        Ok(described
            .network_interfaces
            .into_iter()
            .map(NetworkInterface::from)
            .collect())
    }

    fn availability_zones(&self) -> Result<Vec<String>, QueryError> {
        let args = self.build_args(
            "ec2",
            "describe-availability-zones",
            os_args(["--filters", "Name=state,Values=available"]),
            true,
        );
        let described: DescribeAvailabilityZonesOutput =
            self.run_json(&args, "describe-availability-zones")?;
        Ok(described
            .availability_zones
            .into_iter()
            .filter(|zone| {
                zone.state
                    .as_deref()
                    .is_none_or(|state| state == AVAILABLE_ZONE_STATE)
            })
            .map(|zone| zone.zone_name)
            .collect())
    }

    fn region(&self) -> Option<&str> {
        Some(&self.region)
    }
}

#[cfg(test)]
mod tests;
