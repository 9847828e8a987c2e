//! Command-line interface definitions for the `ecsprobe` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Top-level CLI for the `ecsprobe` binary.
#[derive(Debug, Parser)]
#[command(
    name = "ecsprobe",
    about = "Resolve, probe, and verify containerised services on ECS",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Override the configured AWS region.
    #[arg(long, global = true, value_name = "REGION")]
    pub(crate) region: Option<String>,
    /// Log output format written to stderr.
    #[arg(long, global = true, value_enum, default_value_t = LogFormatArg::Text)]
    pub(crate) log_format: LogFormatArg,
    /// Subcommand to run.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Subcommands of `ecsprobe`.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Resolve a cluster's first task to its public address.
    #[command(name = "resolve", about = "Resolve a cluster's task to its public address")]
    Resolve(ResolveCommand),
    /// Resolve a cluster's task and probe it over HTTP.
    #[command(name = "probe", about = "Resolve a cluster's task and probe it over HTTP")]
    Probe(ProbeCommand),
    /// Run a command inside a cluster's first task.
    #[command(name = "exec", about = "Run a command inside a cluster's first task")]
    Exec(ExecCommand),
    /// Apply a scenario module, probe it, and destroy it.
    #[command(name = "verify", about = "Apply a scenario module, probe it, and destroy it")]
    Verify(VerifyCommand),
}

/// Arguments for the `ecsprobe resolve` subcommand.
#[derive(Args, Debug)]
pub(crate) struct ResolveCommand {
    /// Cluster whose tasks are resolved.
    #[arg(long, value_name = "NAME")]
    pub(crate) cluster: String,
}

/// Arguments for the `ecsprobe probe` subcommand.
#[derive(Args, Debug)]
pub(crate) struct ProbeCommand {
    /// Cluster whose task is probed.
    #[arg(long, value_name = "NAME")]
    pub(crate) cluster: String,
    /// Port to probe; repeat for several ports.
    #[arg(long = "port", value_name = "PORT", default_values_t = [8080_u16, 8081])]
    pub(crate) ports: Vec<u16>,
    /// Status code a healthy endpoint returns.
    #[arg(long, value_name = "STATUS", default_value_t = 200)]
    pub(crate) expect_status: u16,
    /// Substring the response body must contain.
    #[arg(long, value_name = "TEXT", default_value = "Hello, world!")]
    pub(crate) expect_body: String,
    /// Attempts made per port before giving up.
    #[arg(long, value_name = "COUNT", default_value_t = 10)]
    pub(crate) attempts: u32,
    /// Seconds slept between probe attempts.
    #[arg(long, value_name = "SECONDS", default_value_t = 30)]
    pub(crate) interval_secs: u64,
}

/// Arguments for the `ecsprobe exec` subcommand.
#[derive(Args, Debug)]
pub(crate) struct ExecCommand {
    /// Cluster whose first task runs the command.
    #[arg(long, value_name = "NAME")]
    pub(crate) cluster: String,
    /// Command to execute in the task (use -- to separate flags).
    #[arg(required = true, trailing_var_arg = true)]
    pub(crate) command: Vec<String>,
}

/// Arguments for the `ecsprobe verify` subcommand.
#[derive(Args, Debug)]
pub(crate) struct VerifyCommand {
    /// Scenario to verify.
    #[arg(value_enum)]
    pub(crate) scenario: ScenarioArg,
    /// Directory holding the Terraform module tree.
    #[arg(long, value_name = "DIR")]
    pub(crate) module_root: Option<String>,
}

/// Scenario names accepted on the command line.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum ScenarioArg {
    /// Task exposed directly on its public address.
    NoLoadBalancer,
    /// Task behind an application load balancer.
    Alb,
    /// Task behind a network load balancer.
    Nlb,
}

/// Log formats accepted on the command line.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub(crate) enum LogFormatArg {
    /// Human readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}
