//! Composition of the resolution steps into a single run.

use std::net::IpAddr;

use tracing::info_span;

use super::{
    InterfaceId, ResolveError, TaskSet, locate_tasks, resolve_interface_id,
    resolve_public_address,
};
use crate::cloud::{NetworkQuery, TaskQuery};
use crate::retry::{RetryPolicy, Sleeper};

/// Immutable input of a resolution run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolutionRequest {
    /// Region hosting the cluster. Clients bound to a region must be bound
    /// to this one.
    pub region: String,
    /// Cluster name.
    pub cluster: String,
}

impl ResolutionRequest {
    /// Builds a request for `cluster` in `region`.
    #[must_use]
    pub fn new(region: impl Into<String>, cluster: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            cluster: cluster.into(),
        }
    }
}

/// Retry policy applied to each resolution step.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PipelinePolicy {
    /// Policy for the cluster task listing.
    pub locate: RetryPolicy,
    /// Policy for the network attachment lookup.
    pub attachment: RetryPolicy,
    /// Policy for the public address lookup.
    pub address: RetryPolicy,
}

impl PipelinePolicy {
    /// Applies the same policy to every step.
    #[must_use]
    pub const fn uniform(policy: RetryPolicy) -> Self {
        Self {
            locate: policy,
            attachment: policy,
            address: policy,
        }
    }
}

/// Everything learned about a cluster's first running task.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Resolution {
    /// Tasks observed in the cluster.
    pub tasks: TaskSet,
    /// Network interface bound to the first task.
    pub interface_id: InterfaceId,
    /// Public address of that interface.
    pub address: IpAddr,
}

/// Runs locate → attachment → address against a pair of query clients.
#[derive(Clone, Debug)]
pub struct ResolutionPipeline<T, N, S> {
    tasks: T,
    network: N,
    sleeper: S,
    policy: PipelinePolicy,
}

impl<T, N, S> ResolutionPipeline<T, N, S>
where
    T: TaskQuery,
    N: NetworkQuery,
    S: Sleeper,
{
    /// Creates a pipeline using the default lookup policy for every step.
    #[must_use]
    pub const fn new(tasks: T, network: N, sleeper: S) -> Self {
        Self {
            tasks,
            network,
            sleeper,
            policy: PipelinePolicy::uniform(RetryPolicy::LOOKUP),
        }
    }

    /// Overrides the per-step retry policies.
    #[must_use]
    pub const fn with_policy(mut self, policy: PipelinePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Policies currently applied to each step.
    #[must_use]
    pub const fn policy(&self) -> PipelinePolicy {
        self.policy
    }

    /// Resolves the request's cluster to its first task's public address.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::RegionMismatch`] before any lookup when a
    /// client is bound to a region other than the request's. Otherwise
    /// returns the [`ResolveError`] of the first step that fails; later
    /// steps are not attempted.
    pub fn resolve(&self, request: &ResolutionRequest) -> Result<Resolution, ResolveError> {
        let span = info_span!("resolve", region = %request.region, cluster = %request.cluster);
        let _entered = span.enter();

        check_region(&request.region, "task", self.tasks.region())?;
        check_region(&request.region, "network", self.network.region())?;

        let tasks = locate_tasks(
            &self.tasks,
            &request.cluster,
            self.policy.locate,
            &self.sleeper,
        )?;
        let interface_id = resolve_interface_id(
            &self.tasks,
            &request.cluster,
            &tasks,
            self.policy.attachment,
            &self.sleeper,
        )?;
        let address = resolve_public_address(
            &self.network,
            std::slice::from_ref(&interface_id),
            self.policy.address,
            &self.sleeper,
        )?;

        Ok(Resolution {
            tasks,
            interface_id,
            address,
        })
    }
}

fn check_region(
    requested: &str,
    client: &'static str,
    bound: Option<&str>,
) -> Result<(), ResolveError> {
    match bound {
        Some(region) if region != requested.trim() => Err(ResolveError::RegionMismatch {
            requested: requested.to_owned(),
            client,
            bound: region.to_owned(),
        }),
        _ => Ok(()),
    }
}
