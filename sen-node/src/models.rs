//! Data models for API responses

use sen_core::{Address, SensorDescriptor};
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthCheck {
    /// Service status
    pub status: &'static str,

    /// Service version
    pub version: &'static str,
}

/// Sensor bound to this node
#[derive(Debug, Serialize)]
pub struct SensorInfo {
    pub name: &'static str,

    /// Bus address in hex (e.g. "0x77")
    pub address: String,

    pub quantities: Vec<&'static str>,

    pub description: &'static str,
}

impl SensorInfo {
    pub fn new(descriptor: &'static SensorDescriptor, address: Address) -> Self {
        Self {
            name: descriptor.name,
            address: format!("{:#04x}", address),
            quantities: descriptor.quantities.iter().map(|q| q.name()).collect(),
            description: descriptor.description,
        }
    }
}
