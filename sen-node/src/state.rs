//! Shared state handed to every handler

use sen_core::{Address, BroadcastHandle, Measurement, Report, SensorDescriptor};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct AppState {
    pub descriptor: &'static SensorDescriptor,
    pub address: Address,
    pub measurements: BroadcastHandle,
}

impl AppState {
    pub fn new(
        descriptor: &'static SensorDescriptor,
        address: Address,
        measurements: BroadcastHandle,
    ) -> Self {
        Self {
            descriptor,
            address,
            measurements,
        }
    }

    /// Same document `senlib -f json` prints
    pub fn render(&self, measurement: &Measurement) -> Value {
        Report::new(self.descriptor.name, measurement).to_value()
    }
}
