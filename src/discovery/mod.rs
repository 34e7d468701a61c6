//! Server discovery over UDP broadcast
//!
//! [`DiscoveryService`] sends the `SoundDriftDiscovery` probe to every
//! address [`AddressResolver`] yields and turns well-formed announcements
//! into [`DiscoveredServer`](crate::types::DiscoveredServer) items.
//!
//! # Example
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use sounddrift::SoundDriftConfig;
//! use sounddrift::discovery::{AddressResolver, DiscoveryService};
//!
//! # async fn example() -> Result<(), sounddrift::SoundDriftError> {
//! let mut service = DiscoveryService::new(SoundDriftConfig::default(), AddressResolver::new());
//! let mut servers = service.start().await?;
//!
//! while let Some(server) = servers.next().await {
//!     println!("Found: {} at {}", server.device_name, server.address);
//! }
//! # Ok(())
//! # }
//! ```

mod resolver;
mod service;

pub use resolver::{
    AddressResolver, InterfaceProvider, InterfaceV4, SystemInterfaces, directed_broadcast,
};
pub use service::{DiscoveryService, DiscoveryStream};
