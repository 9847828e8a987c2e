//! Binary entry point for the `ecsprobe` CLI.

use std::io::{self, Write};
use std::net::SocketAddr;
use std::process;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use ecsprobe::aws::AwsCli;
use ecsprobe::cloud::QueryError;
use ecsprobe::command::ProcessCommandRunner;
use ecsprobe::config::{ConfigError, HarnessConfig};
use ecsprobe::exec::{ExecError, execute_remote_command};
use ecsprobe::probe::{
    MinTlsVersion, ProbeClient, ProbeError, ProbeExpectation, probe_with_retry,
};
use ecsprobe::resolve::{Resolution, ResolutionPipeline, ResolutionRequest, ResolveError};
use ecsprobe::retry::{RetryPolicy, ThreadSleeper};
use ecsprobe::scenario::{Scenario, ScenarioError, Verifier};
use ecsprobe::telemetry::{self, LogFormat, TelemetryError};
use ecsprobe::terraform::{ProvisionError, TerraformCli};

mod cli;

use cli::{
    Cli, Command, ExecCommand, LogFormatArg, ProbeCommand, ResolveCommand, ScenarioArg,
    VerifyCommand,
};

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("aws client error: {0}")]
    Query(#[from] QueryError),
    #[error("resolution failed: {0}")]
    Resolve(#[from] Box<ResolveError>),
    #[error("probe failed: {0}")]
    Probe(#[from] Box<ProbeError>),
    #[error("exec failed: {0}")]
    Exec(#[from] Box<ExecError>),
    #[error("provisioner error: {0}")]
    Provision(#[from] Box<ProvisionError>),
    #[error("verification failed: {0}")]
    Scenario(#[from] Box<ScenarioError>),
    #[error("invalid command argument: {0}")]
    InvalidCommand(String),
    #[error("invalid retry settings: {0}")]
    InvalidPolicy(String),
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Text => Self::Text,
            LogFormatArg::Json => Self::Json,
        }
    }
}

impl From<ScenarioArg> for Scenario {
    fn from(value: ScenarioArg) -> Self {
        match value {
            ScenarioArg::NoLoadBalancer => Self::NoLoadBalancer,
            ScenarioArg::Alb => Self::Alb,
            ScenarioArg::Nlb => Self::Nlb,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match dispatch(cli) {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn dispatch(cli: Cli) -> Result<(), CliError> {
    telemetry::init(cli.log_format.into())?;

    let mut config = HarnessConfig::load_without_cli_args()?;
    if let Some(region) = cli.region {
        config.region = region;
    }
    if let Command::Verify(VerifyCommand {
        module_root: Some(ref root),
        ..
    }) = cli.command
    {
        config.module_root.clone_from(root);
    }
    config.validate()?;

    match cli.command {
        Command::Resolve(args) => resolve_command(&config, &args),
        Command::Probe(args) => probe_command(&config, &args),
        Command::Exec(args) => exec_command(&config, &args),
        Command::Verify(args) => verify_command(&config, &args),
    }
}

fn aws_client(config: &HarnessConfig) -> Result<AwsCli<ProcessCommandRunner>, CliError> {
    Ok(AwsCli::with_process_runner(&config.aws_bin, &config.region)?)
}

fn resolve(config: &HarnessConfig, cluster: &str) -> Result<Resolution, CliError> {
    let aws = aws_client(config)?;
    let resolution = ResolutionPipeline::new(&aws, &aws, ThreadSleeper)
        .with_policy(config.pipeline_policy()?)
        .resolve(&ResolutionRequest::new(&config.region, cluster))
        .map_err(Box::new)?;
    Ok(resolution)
}

fn resolve_command(config: &HarnessConfig, args: &ResolveCommand) -> Result<(), CliError> {
    let resolution = resolve(config, &args.cluster)?;
    let mut stdout = io::stdout();
    for task in resolution.tasks.as_slice() {
        writeln!(stdout, "task: {task}").ok();
    }
    writeln!(stdout, "interface: {}", resolution.interface_id).ok();
    writeln!(stdout, "address: {}", resolution.address).ok();
    Ok(())
}

fn probe_command(config: &HarnessConfig, args: &ProbeCommand) -> Result<(), CliError> {
    let policy = RetryPolicy::new(args.attempts, Duration::from_secs(args.interval_secs))
        .map_err(|err| CliError::InvalidPolicy(err.to_string()))?;
    let client = ProbeClient::new(Some(MinTlsVersion::Tls13), config.probe_timeout())
        .map_err(Box::new)?;
    let expectation = ProbeExpectation::new(args.expect_status, args.expect_body.as_str());

    let resolution = resolve(config, &args.cluster)?;
    let mut stdout = io::stdout();
    for port in &args.ports {
        let url = format!("http://{}", SocketAddr::new(resolution.address, *port));
        let result = probe_with_retry(&client, &url, &expectation, policy, &ThreadSleeper)
            .map_err(Box::new)?;
        writeln!(stdout, "{url}: {}", result.status).ok();
    }
    Ok(())
}

fn exec_command(config: &HarnessConfig, args: &ExecCommand) -> Result<(), CliError> {
    validate_command_args(&args.command)?;
    let command = args.command.join(" ");
    let aws = aws_client(config)?;
    let policy = config.lookup_policy()?;
    let request =
        execute_remote_command(&aws, &args.cluster, &command, policy, policy, &ThreadSleeper)
            .map_err(Box::new)?;
    writeln!(
        io::stdout(),
        "executed '{}' in task {} of cluster {}",
        request.command,
        request.task,
        request.cluster
    )
    .ok();
    Ok(())
}

fn verify_command(config: &HarnessConfig, args: &VerifyCommand) -> Result<(), CliError> {
    let aws = aws_client(config)?;
    let terraform = TerraformCli::with_process_runner(&config.terraform_bin).map_err(Box::new)?;
    let client = ProbeClient::new(Some(MinTlsVersion::Tls13), config.probe_timeout())
        .map_err(Box::new)?;

    let report = Verifier::new(terraform, &aws, &aws, client, ThreadSleeper)
        .with_lookup_policy(config.pipeline_policy()?)
        .run(
            args.scenario.into(),
            &config.module_root_path(),
            &config.region,
        )
        .map_err(Box::new)?;

    let mut stdout = io::stdout();
    writeln!(
        stdout,
        "scenario {} passed as {}",
        report.scenario, report.service_name
    )
    .ok();
    for (url, result) in report.urls.iter().zip(&report.results) {
        writeln!(stdout, "{url}: {}", result.status).ok();
    }
    Ok(())
}

fn validate_command_args(args: &[String]) -> Result<(), CliError> {
    for arg in args {
        if arg
            .chars()
            .any(|ch| matches!(ch, '\n' | '\r' | '\u{0000}'..='\u{001F}' | '\u{007F}'))
        {
            return Err(CliError::InvalidCommand(String::from(concat!(
                "command arguments must not contain control characters (ASCII ",
                "0x00-0x1F or 0x7F, e.g. newline, carriage return, tab, NUL)"
            ))));
        }
    }
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
