//! Test support utilities shared across unit and integration tests.
//!
//! Every double replays pre-seeded responses in FIFO order and records what
//! it was asked, so tests can assert both outcomes and exact call counts.

use std::cell::RefCell;
use std::collections::{BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::rc::Rc;
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};

use crate::cloud::{
    Attachment, AttachmentDetail, ExecuteCommandRequest, NetworkInterface, NetworkQuery,
    QueryError, Task, TaskQuery,
};
use crate::command::{CommandError, CommandOutput, CommandRunner};
use crate::probe::{HttpProbe, HttpResponse, ProbeFailure};
use crate::retry::Sleeper;
use crate::terraform::{ProvisionError, Provisioner, TerraformOptions};

type Queue<T> = Rc<RefCell<VecDeque<T>>>;

fn exhausted(source: &str) -> QueryError {
    QueryError::Runner(CommandError::Spawn {
        program: source.to_owned(),
        message: String::from("no scripted response available"),
    })
}

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Queue<CommandOutput>,
    invocations: Rc<RefCell<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
    /// Environment overrides passed to the program.
    pub env: Vec<(String, String)>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations.borrow().clone()
    }

    /// Pushes a successful exit status with empty output.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32, stderr: impl Into<String>) {
        self.push_output(Some(code), "", stderr);
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        self.responses.borrow_mut().push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run_with_env(
        &self,
        program: &str,
        args: &[OsString],
        env: &[(String, String)],
    ) -> Result<CommandOutput, CommandError> {
        self.invocations.borrow_mut().push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
            env: env.to_vec(),
        });
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| CommandError::Spawn {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            })
    }
}

/// Sleeper that records requested durations instead of blocking.
#[derive(Clone, Debug, Default)]
pub struct RecordingSleeper {
    sleeps: Rc<RefCell<Vec<Duration>>>,
}

impl RecordingSleeper {
    /// Creates a sleeper with no recorded sleeps.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Durations requested so far, in order.
    #[must_use]
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }

    /// Number of sleeps requested so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.sleeps.borrow().len()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
    }
}

/// Scripted [`TaskQuery`] double.
#[derive(Clone, Debug, Default)]
pub struct ScriptedTasks {
    listings: Queue<Result<Vec<String>, QueryError>>,
    descriptions: Queue<Result<Vec<Task>, QueryError>>,
    executions: Queue<Result<(), QueryError>>,
    list_calls: Rc<RefCell<Vec<String>>>,
    describe_calls: Rc<RefCell<Vec<Vec<String>>>>,
    exec_requests: Rc<RefCell<Vec<ExecuteCommandRequest>>>,
    region: Option<String>,
}

impl ScriptedTasks {
    /// Creates a double with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the double to `region`.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Queues a task listing.
    pub fn push_listing<I, S>(&self, task_arns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.listings
            .borrow_mut()
            .push_back(Ok(task_arns.into_iter().map(Into::into).collect()));
    }

    /// Queues an empty task listing.
    pub fn push_empty_listing(&self) {
        self.listings.borrow_mut().push_back(Ok(Vec::new()));
    }

    /// Queues a failing task listing.
    pub fn push_listing_error(&self, error: QueryError) {
        self.listings.borrow_mut().push_back(Err(error));
    }

    /// Queues a describe-tasks response.
    pub fn push_description(&self, tasks: Vec<Task>) {
        self.descriptions.borrow_mut().push_back(Ok(tasks));
    }

    /// Queues a failing describe-tasks response.
    pub fn push_description_error(&self, error: QueryError) {
        self.descriptions.borrow_mut().push_back(Err(error));
    }

    /// Queues an accepted execute-command request.
    pub fn push_exec_success(&self) {
        self.executions.borrow_mut().push_back(Ok(()));
    }

    /// Queues a rejected execute-command request.
    pub fn push_exec_failure(&self, stderr: impl Into<String>) {
        self.executions
            .borrow_mut()
            .push_back(Err(QueryError::CommandFailure {
                program: String::from("aws"),
                status: Some(254),
                status_text: String::from("254"),
                stderr: stderr.into(),
            }));
    }

    /// Clusters passed to `list_tasks`, one entry per call.
    #[must_use]
    pub fn list_calls(&self) -> Vec<String> {
        self.list_calls.borrow().clone()
    }

    /// Task ARNs passed to `describe_tasks`, one entry per call.
    #[must_use]
    pub fn describe_calls(&self) -> Vec<Vec<String>> {
        self.describe_calls.borrow().clone()
    }

    /// Execute-command requests received so far.
    #[must_use]
    pub fn exec_requests(&self) -> Vec<ExecuteCommandRequest> {
        self.exec_requests.borrow().clone()
    }
}

impl TaskQuery for ScriptedTasks {
    fn list_tasks(&self, cluster: &str) -> Result<Vec<String>, QueryError> {
        self.list_calls.borrow_mut().push(cluster.to_owned());
        self.listings
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(exhausted("list-tasks")))
    }

    fn describe_tasks(&self, _cluster: &str, task_arns: &[String]) -> Result<Vec<Task>, QueryError> {
        self.describe_calls.borrow_mut().push(task_arns.to_vec());
        self.descriptions
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(exhausted("describe-tasks")))
    }

    fn execute_command(&self, request: &ExecuteCommandRequest) -> Result<(), QueryError> {
        self.exec_requests.borrow_mut().push(request.clone());
        self.executions
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(exhausted("execute-command")))
    }

    fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }
}

/// Scripted [`NetworkQuery`] double.
#[derive(Clone, Debug, Default)]
pub struct ScriptedNetwork {
    interfaces: Queue<Result<Vec<NetworkInterface>, QueryError>>,
    zones: Queue<Result<Vec<String>, QueryError>>,
    describe_calls: Rc<RefCell<Vec<Vec<String>>>>,
    region: Option<String>,
}

impl ScriptedNetwork {
    /// Creates a double with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the double to `region`.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Queues a describe-network-interfaces response.
    pub fn push_interfaces(&self, interfaces: Vec<NetworkInterface>) {
        self.interfaces.borrow_mut().push_back(Ok(interfaces));
    }

    /// Queues a failing describe-network-interfaces response.
    pub fn push_interfaces_error(&self, error: QueryError) {
        self.interfaces.borrow_mut().push_back(Err(error));
    }

    /// Queues an availability-zone listing.
    pub fn push_zones<I, S>(&self, zones: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.zones
            .borrow_mut()
            .push_back(Ok(zones.into_iter().map(Into::into).collect()));
    }

    /// Interface ids passed to `describe_network_interfaces`, per call.
    #[must_use]
    pub fn describe_calls(&self) -> Vec<Vec<String>> {
        self.describe_calls.borrow().clone()
    }
}

impl NetworkQuery for ScriptedNetwork {
    fn describe_network_interfaces(
        &self,
        interface_ids: &[String],
    ) -> Result<Vec<NetworkInterface>, QueryError> {
        self.describe_calls.borrow_mut().push(interface_ids.to_vec());
        self.interfaces
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(exhausted("describe-network-interfaces")))
    }

    fn availability_zones(&self) -> Result<Vec<String>, QueryError> {
        self.zones
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(exhausted("describe-availability-zones")))
    }

    fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }
}

/// Scripted [`HttpProbe`] double.
#[derive(Clone, Debug, Default)]
pub struct ScriptedHttp {
    responses: Queue<Result<HttpResponse, ProbeFailure>>,
    urls: Rc<RefCell<Vec<String>>>,
}

impl ScriptedHttp {
    /// Creates a double with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response.
    pub fn push_response(&self, status: u16, body: impl Into<String>) {
        self.responses.borrow_mut().push_back(Ok(HttpResponse {
            status,
            body: body.into(),
        }));
    }

    /// Queues a transport failure.
    pub fn push_transport_error(&self, message: impl Into<String>) {
        self.responses
            .borrow_mut()
            .push_back(Err(ProbeFailure::Transport {
                url: String::new(),
                message: message.into(),
            }));
    }

    /// URLs requested so far, in order.
    #[must_use]
    pub fn urls(&self) -> Vec<String> {
        self.urls.borrow().clone()
    }
}

impl HttpProbe for ScriptedHttp {
    fn get(&self, url: &str) -> Result<HttpResponse, ProbeFailure> {
        self.urls.borrow_mut().push(url.to_owned());
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| {
                Err(ProbeFailure::Transport {
                    url: url.to_owned(),
                    message: String::from("no scripted response available"),
                })
            })
    }
}

/// Scripted [`Provisioner`] double.
///
/// Apply and destroy succeed unless a failure was queued; outputs must be
/// queued explicitly.
#[derive(Clone, Debug, Default)]
pub struct ScriptedProvisioner {
    apply_failures: Queue<ProvisionError>,
    destroy_failures: Queue<ProvisionError>,
    outputs: Queue<String>,
    calls: Rc<RefCell<Vec<String>>>,
    applied: Rc<RefCell<Vec<TerraformOptions>>>,
}

impl ScriptedProvisioner {
    /// Creates a double whose apply and destroy succeed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next apply fail.
    pub fn fail_next_apply(&self, stderr: impl Into<String>) {
        self.apply_failures
            .borrow_mut()
            .push_back(scripted_failure("apply", stderr));
    }

    /// Makes the next destroy fail.
    pub fn fail_next_destroy(&self, stderr: impl Into<String>) {
        self.destroy_failures
            .borrow_mut()
            .push_back(scripted_failure("destroy", stderr));
    }

    /// Queues an output value.
    pub fn push_output(&self, value: impl Into<String>) {
        self.outputs.borrow_mut().push_back(value.into());
    }

    /// Lifecycle calls in order: `apply`, `output <name>`, `destroy`.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Options passed to each apply.
    #[must_use]
    pub fn applied(&self) -> Vec<TerraformOptions> {
        self.applied.borrow().clone()
    }
}

fn scripted_failure(action: &str, stderr: impl Into<String>) -> ProvisionError {
    ProvisionError::CommandFailure {
        action: action.to_owned(),
        dir: camino::Utf8PathBuf::from("scripted"),
        status: Some(1),
        status_text: String::from("1"),
        stderr: stderr.into(),
    }
}

impl Provisioner for ScriptedProvisioner {
    fn init_and_apply(&self, options: &TerraformOptions) -> Result<(), ProvisionError> {
        self.calls.borrow_mut().push(String::from("apply"));
        self.applied.borrow_mut().push(options.clone());
        self.apply_failures
            .borrow_mut()
            .pop_front()
            .map_or(Ok(()), Err)
    }

    fn output(&self, _options: &TerraformOptions, name: &str) -> Result<String, ProvisionError> {
        self.calls.borrow_mut().push(format!("output {name}"));
        self.outputs
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| ProvisionError::EmptyOutput {
                name: name.to_owned(),
            })
    }

    fn destroy(&self, _options: &TerraformOptions) -> Result<(), ProvisionError> {
        self.calls.borrow_mut().push(String::from("destroy"));
        self.destroy_failures
            .borrow_mut()
            .pop_front()
            .map_or(Ok(()), Err)
    }
}

/// Builds a task whose first attachment carries `details`.
#[must_use]
pub fn task_with_details(arn: &str, details: &[(&str, &str)]) -> Task {
    Task {
        arn: arn.to_owned(),
        last_status: Some(String::from("RUNNING")),
        attachments: vec![Attachment {
            id: Some(String::from("attachment-1")),
            kind: Some(String::from("ElasticNetworkInterface")),
            status: Some(String::from("ATTACHED")),
            details: details
                .iter()
                .map(|(name, value)| AttachmentDetail::new(*name, *value))
                .collect(),
        }],
    }
}

/// Builds a network interface with an optional public address.
#[must_use]
pub fn interface(id: &str, public_ip: Option<&str>) -> NetworkInterface {
    NetworkInterface {
        id: id.to_owned(),
        public_ip: public_ip.map(str::to_owned),
    }
}

fn quoted_list(values: &[&str]) -> String {
    values
        .iter()
        .map(|value| format!("\"{value}\""))
        .collect::<Vec<_>>()
        .join(",")
}

/// Produces a payload matching `aws ecs list-tasks --output json`.
#[must_use]
pub fn json_task_arns(task_arns: &[&str]) -> String {
    format!("{{\"taskArns\":[{}]}}", quoted_list(task_arns))
}

/// Produces a payload matching `aws ecs describe-tasks --output json` for a
/// single task with one attachment carrying `details`.
#[must_use]
pub fn json_task(arn: &str, details: &[(&str, &str)]) -> String {
    let details_json = details
        .iter()
        .map(|(name, value)| format!("{{\"name\":\"{name}\",\"value\":\"{value}\"}}"))
        .collect::<Vec<_>>()
        .join(",");
    format!(
        concat!(
            "{{\"tasks\":[{{\"taskArn\":\"{arn}\",\"lastStatus\":\"RUNNING\",",
            "\"attachments\":[{{\"id\":\"attachment-1\",",
            "\"type\":\"ElasticNetworkInterface\",\"status\":\"ATTACHED\",",
            "\"details\":[{details}]}}]}}],\"failures\":[]}}"
        ),
        arn = arn,
        details = details_json
    )
}

/// Produces a payload matching `aws ec2 describe-network-interfaces`.
#[must_use]
pub fn json_network_interfaces(interfaces: &[(&str, Option<&str>)]) -> String {
    let items = interfaces
        .iter()
        .map(|(id, public_ip)| match public_ip {
            Some(ip) => format!(
                "{{\"NetworkInterfaceId\":\"{id}\",\"Association\":{{\"PublicIp\":\"{ip}\"}}}}"
            ),
            None => format!("{{\"NetworkInterfaceId\":\"{id}\"}}"),
        })
        .collect::<Vec<_>>()
        .join(",");
    format!("{{\"NetworkInterfaces\":[{items}]}}")
}

/// Produces a payload matching `aws ec2 describe-availability-zones`.
#[must_use]
pub fn json_zones(zones: &[&str]) -> String {
    let items = zones
        .iter()
        .map(|zone| format!("{{\"ZoneName\":\"{zone}\",\"State\":\"available\"}}"))
        .collect::<Vec<_>>()
        .join(",");
    format!("{{\"AvailabilityZones\":[{items}]}}")
}

/// Global mutex serialising environment mutation across tests.
pub static ENV_LOCK: Mutex<()> = Mutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding [`ENV_LOCK`].
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
