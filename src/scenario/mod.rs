//! End-to-end verification of a deployed service module.
//!
//! A scenario copies the Terraform module to a private directory, applies
//! it under a unique service name, discovers where the workload is exposed,
//! probes every workload port, and always destroys the infrastructure
//! afterwards. The three presets differ only in module directory, exposure
//! and probe patience.

mod verifier;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::cloud::QueryError;
use crate::probe::ProbeError;
use crate::resolve::ResolveError;
use crate::retry::RetryPolicy;
use crate::terraform::{ModuleCopyError, ProvisionError, TerraformOptions};

pub use verifier::{VerificationReport, Verifier};

/// Ports the demo workload listens on.
pub const WORKLOAD_PORTS: [u16; 2] = [8080, 8081];

/// Terraform output carrying the load balancer host name.
pub const LB_DNS_OUTPUT: &str = "lb_dns_name";

/// Prefix of every generated service name.
pub const SERVICE_NAME_PREFIX: &str = "terratest-simple-";

/// Number of availability zones handed to the module.
pub const ZONE_COUNT: usize = 3;

const PROBE_INTERVAL: Duration = Duration::from_secs(30);
const UNIQUE_SUFFIX_LEN: usize = 6;

/// How the workload is reached once deployed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Exposure {
    /// Straight to the task's public address.
    Direct,
    /// Through an application load balancer.
    Alb,
    /// Through a network load balancer.
    Nlb,
}

/// Preset verification scenarios.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Scenario {
    /// Service without a load balancer, probed on the task's address.
    NoLoadBalancer,
    /// Service behind an application load balancer.
    Alb,
    /// Service behind a network load balancer.
    Nlb,
}

impl Scenario {
    /// Every preset, in documentation order.
    pub const ALL: [Self; 3] = [Self::NoLoadBalancer, Self::Alb, Self::Nlb];

    /// Name used on the command line.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NoLoadBalancer => "no-load-balancer",
            Self::Alb => "alb",
            Self::Nlb => "nlb",
        }
    }

    /// Module directory relative to the module root.
    #[must_use]
    pub const fn module_dir(self) -> &'static str {
        match self {
            Self::NoLoadBalancer => "examples/no-load-balancer",
            Self::Alb | Self::Nlb => "examples/load-balancer",
        }
    }

    /// How the deployed workload is reached.
    #[must_use]
    pub const fn exposure(self) -> Exposure {
        match self {
            Self::NoLoadBalancer => Exposure::Direct,
            Self::Alb => Exposure::Alb,
            Self::Nlb => Exposure::Nlb,
        }
    }

    /// Probe retry policy; load balancers take longer to register targets.
    #[must_use]
    pub const fn probe_policy(self) -> RetryPolicy {
        let attempts = match self {
            Self::NoLoadBalancer => 2,
            Self::Alb => 10,
            Self::Nlb => 20,
        };
        RetryPolicy::at_least_once(attempts, PROBE_INTERVAL)
    }

    /// Builds the Terraform inputs for a run of this scenario.
    #[must_use]
    pub fn terraform_options(
        self,
        dir: impl Into<Utf8PathBuf>,
        service_name: &str,
        zones: Vec<String>,
        region: &str,
    ) -> TerraformOptions {
        let options = TerraformOptions::new(dir)
            .var("test_name", service_name)
            .var("vpc_azs", zones)
            .var("region", region)
            .env("AWS_DEFAULT_REGION", region);
        match self.exposure() {
            Exposure::Direct => options,
            Exposure::Alb => options
                .var("associate_alb", true)
                .var("associate_nlb", false),
            Exposure::Nlb => options
                .var("associate_alb", false)
                .var("associate_nlb", true),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = ScenarioError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|scenario| scenario.name() == wanted)
            .ok_or_else(|| ScenarioError::UnknownScenario {
                name: value.to_owned(),
            })
    }
}

/// Generates `terratest-simple-<6 lowercase characters>`.
#[must_use]
pub fn unique_service_name() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    let suffix: String = id.chars().take(UNIQUE_SUFFIX_LEN).collect();
    format!("{SERVICE_NAME_PREFIX}{suffix}")
}

/// Errors raised while verifying a scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// Raised when a scenario name is not one of the presets.
    #[error("unknown scenario '{name}'; expected one of no-load-balancer, alb, nlb")]
    UnknownScenario {
        /// Name that was requested.
        name: String,
    },
    /// Raised when the module cannot be copied.
    #[error(transparent)]
    ModuleCopy(#[from] ModuleCopyError),
    /// Raised when the region's zones cannot be listed.
    #[error("failed to list availability zones: {0}")]
    Zones(#[source] QueryError),
    /// Raised when the region has fewer zones than the module needs.
    #[error("region {region} has {found} available zone(s); {} are required", ZONE_COUNT)]
    NotEnoughZones {
        /// Region that was queried.
        region: String,
        /// Zones found.
        found: usize,
    },
    /// Raised when applying the module or reading its outputs fails.
    #[error("provisioning failed: {message}")]
    Provision {
        /// Failure description, with any teardown note appended.
        message: String,
        /// Provisioner error.
        #[source]
        source: Box<ProvisionError>,
    },
    /// Raised when the deployed task cannot be resolved.
    #[error("task resolution failed: {message}")]
    Resolve {
        /// Failure description, with any teardown note appended.
        message: String,
        /// Resolution error.
        #[source]
        source: Box<ResolveError>,
    },
    /// Raised when a workload port never answers as expected.
    #[error("probe failed: {message}")]
    Probe {
        /// Failure description, with any teardown note appended.
        message: String,
        /// Probe error.
        #[source]
        source: Box<ProbeError>,
    },
    /// Raised when teardown fails after every check passed.
    #[error("failed to destroy infrastructure: {0}")]
    Teardown(#[source] Box<ProvisionError>),
}
