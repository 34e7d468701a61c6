//! Core types

mod config;
mod server;


pub use config::{SoundDriftConfig, SoundDriftConfigBuilder};
pub use server::{DeviceInfo, DiscoveredServer};
