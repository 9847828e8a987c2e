//! Public address lookup for a network interface.

use std::net::IpAddr;
use std::str::FromStr;

use tracing::info;

use super::{InterfaceId, NotReady, ResolveError};
use crate::cloud::{NetworkInterface, NetworkQuery};
use crate::retry::{Readiness, RetryPolicy, Sleeper, retry};

/// Resolves the public address of the first interface in `interface_ids`.
///
/// # Errors
///
/// Returns [`ResolveError::NoInterfaceIds`] without calling the provider
/// when `interface_ids` is empty, and [`ResolveError::Exhausted`] when no
/// public address becomes visible within the policy's attempts.
pub fn resolve_public_address<N, S>(
    network: &N,
    interface_ids: &[InterfaceId],
    policy: RetryPolicy,
    sleeper: &S,
) -> Result<IpAddr, ResolveError>
where
    N: NetworkQuery + ?Sized,
    S: Sleeper + ?Sized,
{
    let Some(primary) = interface_ids.first() else {
        return Err(ResolveError::NoInterfaceIds);
    };
    let ids: Vec<String> = interface_ids.iter().map(ToString::to_string).collect();

    let address = retry("get public address", policy, sleeper, || {
        match network.describe_network_interfaces(&ids) {
            Ok(interfaces) => interfaces.first().map_or_else(
                || {
                    Readiness::NotReady(NotReady::InterfaceNotFound {
                        interface: primary.to_string(),
                    })
                },
                public_address_of,
            ),
            Err(err) => Readiness::NotReady(err.into()),
        }
    })?;
    info!(interface = %primary, %address, "retrieved public address");
    Ok(address)
}

fn public_address_of(interface: &NetworkInterface) -> Readiness<IpAddr, NotReady> {
    let Some(raw) = interface.public_ip.as_deref() else {
        return Readiness::NotReady(NotReady::NoPublicAddress {
            interface: interface.id.clone(),
        });
    };
    IpAddr::from_str(raw.trim()).map_or_else(
        |_| {
            Readiness::NotReady(NotReady::InvalidAddress {
                interface: interface.id.clone(),
                address: raw.to_owned(),
            })
        },
        Readiness::Ready,
    )
}
