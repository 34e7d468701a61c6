//! Fixed interface lists for address resolution tests

use std::io;
use std::net::Ipv4Addr;

use crate::discovery::{InterfaceProvider, InterfaceV4};

/// Interface provider returning a fixed list
#[derive(Debug, Clone, Default)]
pub struct StaticInterfaces {
    interfaces: Vec<InterfaceV4>,
    fail: bool,
}

impl StaticInterfaces {
    /// Provider with no interfaces
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Provider whose enumeration always fails
    #[must_use]
    pub fn failing() -> Self {
        Self {
            interfaces: Vec::new(),
            fail: true,
        }
    }

    /// Add a non-loopback interface
    #[must_use]
    pub fn with(mut self, name: &str, ip: Ipv4Addr, netmask: Ipv4Addr) -> Self {
        self.interfaces.push(InterfaceV4 {
            name: name.to_string(),
            ip,
            netmask,
            is_loopback: false,
        });
        self
    }

    /// Add a loopback interface
    #[must_use]
    pub fn with_loopback(mut self) -> Self {
        self.interfaces.push(InterfaceV4 {
            name: "lo".to_string(),
            ip: Ipv4Addr::LOCALHOST,
            netmask: Ipv4Addr::new(255, 0, 0, 0),
            is_loopback: true,
        });
        self
    }
}

impl InterfaceProvider for StaticInterfaces {
    fn interfaces(&self) -> io::Result<Vec<InterfaceV4>> {
        if self.fail {
            return Err(io::Error::other("interface enumeration failed"));
        }
        Ok(self.interfaces.clone())
    }
}
