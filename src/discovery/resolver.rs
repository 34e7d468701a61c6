//! Broadcast address derivation from local interfaces

use std::collections::BTreeSet;
use std::fmt;
use std::io;
use std::net::Ipv4Addr;
use std::sync::Arc;

/// One IPv4 address assigned to a local interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceV4 {
    /// OS interface name
    pub name: String,
    /// Assigned address
    pub ip: Ipv4Addr,
    /// Subnet mask
    pub netmask: Ipv4Addr,
    /// Whether this is a loopback interface
    pub is_loopback: bool,
}

impl InterfaceV4 {
    /// Directed broadcast address of this interface's subnet
    #[must_use]
    pub fn broadcast(&self) -> Ipv4Addr {
        directed_broadcast(self.ip, self.netmask)
    }
}

/// Source of local IPv4 interfaces
pub trait InterfaceProvider: Send + Sync {
    /// Enumerate IPv4 interfaces
    ///
    /// # Errors
    ///
    /// Returns the OS error if enumeration fails.
    fn interfaces(&self) -> io::Result<Vec<InterfaceV4>>;
}

/// Interfaces reported by the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemInterfaces;

impl InterfaceProvider for SystemInterfaces {
    fn interfaces(&self) -> io::Result<Vec<InterfaceV4>> {
        let interfaces = if_addrs::get_if_addrs()?
            .into_iter()
            .filter_map(|iface| {
                let is_loopback = iface.is_loopback();
                match iface.addr {
                    if_addrs::IfAddr::V4(v4) => Some(InterfaceV4 {
                        name: iface.name,
                        ip: v4.ip,
                        netmask: v4.netmask,
                        is_loopback,
                    }),
                    if_addrs::IfAddr::V6(_) => None,
                }
            })
            .collect();
        Ok(interfaces)
    }
}

/// `ip | !netmask`, octet by octet
#[must_use]
pub fn directed_broadcast(ip: Ipv4Addr, netmask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(ip) | !u32::from(netmask))
}

/// Computes the set of addresses discovery probes are sent to
#[derive(Clone)]
pub struct AddressResolver {
    provider: Arc<dyn InterfaceProvider>,
    extra_targets: Vec<Ipv4Addr>,
}

impl AddressResolver {
    /// Resolver over the OS interface list
    #[must_use]
    pub fn new() -> Self {
        Self::with_provider(SystemInterfaces)
    }

    /// Resolver over a custom interface source
    #[must_use]
    pub fn with_provider(provider: impl InterfaceProvider + 'static) -> Self {
        Self {
            provider: Arc::new(provider),
            extra_targets: Vec::new(),
        }
    }

    /// Also probe `target` directly, e.g. a server on a routed subnet
    #[must_use]
    pub fn with_extra_target(mut self, target: Ipv4Addr) -> Self {
        self.extra_targets.push(target);
        self
    }

    /// Directed broadcast of every non-loopback interface, plus
    /// `255.255.255.255` and any extra targets
    ///
    /// Never fails: if enumeration fails only the limited broadcast and the
    /// extra targets are returned.
    #[must_use]
    pub fn broadcast_addresses(&self) -> BTreeSet<Ipv4Addr> {
        let mut addresses = BTreeSet::from([Ipv4Addr::BROADCAST]);

        match self.provider.interfaces() {
            Ok(interfaces) => addresses.extend(
                interfaces
                    .iter()
                    .filter(|iface| !iface.is_loopback)
                    .map(InterfaceV4::broadcast),
            ),
            Err(e) => tracing::warn!("Failed to enumerate interfaces: {}", e),
        }

        addresses.extend(self.extra_targets.iter().copied());
        addresses
    }
}

impl Default for AddressResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AddressResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressResolver")
            .field("extra_targets", &self.extra_targets)
            .finish_non_exhaustive()
    }
}
