//! IPv4 subnet arithmetic.
//!
//! All functions work on the 32-bit integer form of the address so the
//! results do not depend on how the network was parsed (an `Ipv4Network`
//! keeps the host bits of the address it was built from).

use ipnetwork::{IpNetwork, Ipv4Network};
use std::net::Ipv4Addr;

/// Smallest prefix length accepted for an interface network.
pub const MIN_PREFIX: u8 = 16;

/// Compute the network and broadcast addresses of `net`.
pub fn network_and_broadcast(net: &Ipv4Network) -> (Ipv4Addr, Ipv4Addr) {
    let addr = u32::from(net.ip());
    let mask = u32::from(net.mask());
    let network = addr & mask;
    let broadcast = network | !mask;
    (Ipv4Addr::from(network), Ipv4Addr::from(broadcast))
}

/// Returns true if `inner`'s address range lies entirely within `outer`'s.
///
/// Only IPv4 networks can be compared; any IPv6 input yields `false`.
pub fn is_subnet_within(outer: &IpNetwork, inner: &IpNetwork) -> bool {
    let (IpNetwork::V4(outer), IpNetwork::V4(inner)) = (outer, inner) else {
        return false;
    };

    let (outer_start, outer_end) = network_and_broadcast(outer);
    let (inner_start, inner_end) = network_and_broadcast(inner);

    u32::from(inner_start) >= u32::from(outer_start) && u32::from(inner_end) <= u32::from(outer_end)
}

/// Mask the address of `net` down to its network address, keeping the prefix.
pub fn align_to_network(net: &Ipv4Network) -> Ipv4Network {
    let (network, _) = network_and_broadcast(net);
    // The prefix came from a valid network, so this cannot fail.
    Ipv4Network::new(network, net.prefix()).unwrap_or(*net)
}

/// True if the network is wider than a /16.
pub fn is_network_too_large(net: &Ipv4Network) -> bool {
    net.prefix() < MIN_PREFIX
}

/// Every address in `target`, ascending, minus the network and broadcast
/// addresses of both `target` and `interface`.
///
/// Excluding the interface's own network/broadcast guards against probing
/// them when `target` is a narrower slice of the interface network that
/// happens to touch its edges.
pub fn enumerate_hosts(target: &Ipv4Network, interface: &Ipv4Network) -> Vec<Ipv4Addr> {
    hosts(target, interface).collect()
}

/// Lazy form of [`enumerate_hosts`], for ranges too wide to materialize.
pub fn hosts(target: &Ipv4Network, interface: &Ipv4Network) -> impl Iterator<Item = Ipv4Addr> {
    let (network, broadcast) = network_and_broadcast(target);
    let (if_network, if_broadcast) = network_and_broadcast(interface);

    let excluded = [network, broadcast, if_network, if_broadcast].map(u32::from);

    (u32::from(network)..=u32::from(broadcast))
        .filter(move |ip| !excluded.contains(ip))
        .map(Ipv4Addr::from)
}
