//! Apply → discover → probe → destroy workflow.

use std::fmt::Display;
use std::net::SocketAddr;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{info, info_span, warn};

use super::{Exposure, LB_DNS_OUTPUT, Scenario, ScenarioError, WORKLOAD_PORTS, ZONE_COUNT};
use crate::cloud::{NetworkQuery, TaskQuery};
use crate::probe::{HttpProbe, ProbeError, ProbeExpectation, ProbeResult, probe_with_retry};
use crate::resolve::{PipelinePolicy, ResolutionPipeline, ResolutionRequest, ResolveError};
use crate::retry::{RetryPolicy, Sleeper};
use crate::terraform::{
    ModuleCopy, ProvisionError, Provisioner, TerraformOptions, copy_module_into,
    copy_module_to_temp,
};

/// What a passing verification observed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VerificationReport {
    /// Scenario that was verified.
    pub scenario: Scenario,
    /// Generated service (and cluster) name.
    pub service_name: String,
    /// Probed URLs, in port order.
    pub urls: Vec<String>,
    /// Result of each probe, in port order.
    pub results: Vec<ProbeResult>,
}

/// Failure of one stage between apply and destroy.
enum Stage {
    Provision(ProvisionError),
    Resolve(ResolveError),
    Probe(ProbeError),
}

/// Runs verification scenarios against injected clients.
#[derive(Debug)]
pub struct Verifier<P, T, N, H, S> {
    provisioner: P,
    tasks: T,
    network: N,
    http: H,
    sleeper: S,
    lookup: PipelinePolicy,
    scratch_dir: Option<Utf8PathBuf>,
}

impl<P, T, N, H, S> Verifier<P, T, N, H, S>
where
    P: Provisioner,
    T: TaskQuery,
    N: NetworkQuery,
    H: HttpProbe,
    S: Sleeper,
{
    /// Creates a verifier using the default lookup policies.
    #[must_use]
    pub const fn new(provisioner: P, tasks: T, network: N, http: H, sleeper: S) -> Self {
        Self {
            provisioner,
            tasks,
            network,
            http,
            sleeper,
            lookup: PipelinePolicy::uniform(RetryPolicy::LOOKUP),
            scratch_dir: None,
        }
    }

    /// Overrides the retry policies used to resolve the task address.
    #[must_use]
    pub const fn with_lookup_policy(mut self, policy: PipelinePolicy) -> Self {
        self.lookup = policy;
        self
    }

    /// Places module copies under `dir` instead of the system temp directory.
    #[must_use]
    pub fn with_scratch_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Verifies `scenario` using the module tree under `module_root`.
    ///
    /// Teardown is attempted whenever apply was attempted. A teardown
    /// failure after a failed stage is appended to that stage's message; a
    /// teardown failure after passing checks is returned on its own.
    ///
    /// The module copy is removed once teardown succeeds. When teardown
    /// fails it is kept, with its path logged, so the Terraform state can be
    /// destroyed by hand.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError`] when any stage or the teardown fails.
    pub fn run(
        &self,
        scenario: Scenario,
        module_root: &Utf8Path,
        region: &str,
    ) -> Result<VerificationReport, ScenarioError> {
        let service_name = super::unique_service_name();
        let span = info_span!("verify", scenario = %scenario, service = %service_name, region);
        let _entered = span.enter();

        let copy = self.copy_module(module_root, scenario)?;
        let zones = self.first_zones(region)?;
        let options = scenario.terraform_options(
            copy.module_dir().to_path_buf(),
            &service_name,
            zones,
            region,
        );

        let outcome = self.apply_and_probe(scenario, &options, &service_name, region);
        let teardown = self.provisioner.destroy(&options);
        if let Err(err) = &teardown {
            let kept = copy.keep();
            warn!(path = %kept, error = %err, "kept module copy for manual cleanup");
        }
        match (outcome, teardown) {
            (Ok(urls_and_results), Ok(())) => {
                let (urls, results) = urls_and_results.into_iter().unzip();
                info!("scenario verified and destroyed");
                Ok(VerificationReport {
                    scenario,
                    service_name,
                    urls,
                    results,
                })
            }
            (Ok(_), Err(err)) => Err(ScenarioError::Teardown(Box::new(err))),
            (Err(stage), teardown) => Err(stage_error(stage, teardown.err().as_ref())),
        }
    }

    fn copy_module(
        &self,
        module_root: &Utf8Path,
        scenario: Scenario,
    ) -> Result<ModuleCopy, ScenarioError> {
        let copy = self.scratch_dir.as_deref().map_or_else(
            || copy_module_to_temp(module_root, scenario.module_dir()),
            |parent| copy_module_into(module_root, scenario.module_dir(), parent),
        )?;
        Ok(copy)
    }

    fn first_zones(&self, region: &str) -> Result<Vec<String>, ScenarioError> {
        let mut zones = self
            .network
            .availability_zones()
            .map_err(ScenarioError::Zones)?;
        if zones.len() < ZONE_COUNT {
            return Err(ScenarioError::NotEnoughZones {
                region: region.to_owned(),
                found: zones.len(),
            });
        }
        zones.truncate(ZONE_COUNT);
        Ok(zones)
    }

    fn apply_and_probe(
        &self,
        scenario: Scenario,
        options: &TerraformOptions,
        service_name: &str,
        region: &str,
    ) -> Result<Vec<(String, ProbeResult)>, Stage> {
        self.provisioner
            .init_and_apply(options)
            .map_err(Stage::Provision)?;

        let urls = self.target_urls(scenario, options, service_name, region)?;
        let expectation = ProbeExpectation::default();
        urls.into_iter()
            .map(|url| {
                probe_with_retry(
                    &self.http,
                    &url,
                    &expectation,
                    scenario.probe_policy(),
                    &self.sleeper,
                )
                .map(|result| (url, result))
                .map_err(Stage::Probe)
            })
            .collect()
    }

    fn target_urls(
        &self,
        scenario: Scenario,
        options: &TerraformOptions,
        service_name: &str,
        region: &str,
    ) -> Result<Vec<String>, Stage> {
        match scenario.exposure() {
            Exposure::Direct => {
                let resolution = ResolutionPipeline::new(&self.tasks, &self.network, &self.sleeper)
                    .with_policy(self.lookup)
                    .resolve(&ResolutionRequest::new(region, service_name))
                    .map_err(Stage::Resolve)?;
                Ok(WORKLOAD_PORTS
                    .iter()
                    .map(|port| format!("http://{}", SocketAddr::new(resolution.address, *port)))
                    .collect())
            }
            Exposure::Alb | Exposure::Nlb => {
                let host = self
                    .provisioner
                    .output(options, LB_DNS_OUTPUT)
                    .map_err(Stage::Provision)?;
                Ok(WORKLOAD_PORTS
                    .iter()
                    .map(|port| format!("http://{host}:{port}/"))
                    .collect())
            }
        }
    }
}

fn stage_error(stage: Stage, teardown_error: Option<&ProvisionError>) -> ScenarioError {
    if let Some(teardown) = teardown_error {
        warn!(error = %teardown, "teardown failed after an earlier failure");
    }
    match stage {
        Stage::Provision(source) => ScenarioError::Provision {
            message: append_teardown_note(&source, teardown_error),
            source: Box::new(source),
        },
        Stage::Resolve(source) => ScenarioError::Resolve {
            message: append_teardown_note(&source, teardown_error),
            source: Box::new(source),
        },
        Stage::Probe(source) => ScenarioError::Probe {
            message: append_teardown_note(&source, teardown_error),
            source: Box::new(source),
        },
    }
}

fn append_teardown_note<E: Display>(err: &E, teardown_error: Option<&ProvisionError>) -> String {
    teardown_error.map_or_else(
        || err.to_string(),
        |teardown| format!("{err} (teardown also failed: {teardown})"),
    )
}
