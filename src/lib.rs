//! Core library for the `ecsprobe` integration harness.
//!
//! The crate resolves a container-service cluster to the public address of
//! its first running task (cluster → task → network interface → address),
//! probes that address over HTTP, and drives Terraform-provisioned scenarios
//! through an apply → probe → destroy lifecycle. Every lookup that waits on
//! eventually-consistent cloud state runs through the bounded retry executor
//! in [`retry`].

pub mod aws;
pub mod cloud;
pub mod command;
pub mod config;
pub mod exec;
pub mod probe;
pub mod resolve;
pub mod retry;
pub mod scenario;
pub mod telemetry;
pub mod terraform;
pub mod test_support;
pub mod workload;

pub use aws::{AwsCli, DEFAULT_AWS_BIN};
pub use cloud::{
    Attachment, AttachmentDetail, ExecuteCommandRequest, NetworkInterface, NetworkQuery,
    QueryError, Task, TaskQuery,
};
pub use command::{CommandError, CommandOutput, CommandRunner, ProcessCommandRunner};
pub use config::{ConfigError, HarnessConfig};
pub use exec::{ExecError, execute_remote_command};
pub use probe::{
    HttpProbe, HttpResponse, MinTlsVersion, ProbeClient, ProbeError, ProbeExpectation,
    ProbeFailure, ProbeResult, probe_with_retry,
};
pub use resolve::{
    InterfaceId, NotReady, PipelinePolicy, Resolution, ResolutionPipeline, ResolutionRequest,
    ResolveError, TaskSet,
};
pub use retry::{Readiness, RetryError, RetryPolicy, Sleeper, ThreadSleeper, retry};
pub use scenario::{Scenario, ScenarioError, VerificationReport, Verifier};
pub use terraform::{ProvisionError, Provisioner, TerraformCli, TerraformOptions, TfVar};
