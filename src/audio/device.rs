//! Output endpoint enumeration
//!
//! Used by the probe to show which endpoints exist before a session is opened
//! on the default one.

use cpal::traits::{DeviceTrait, HostTrait};
use serde::Serialize;

/// Common sample rates checked against each endpoint's ranges
const PROBE_RATES: [u32; 6] = [44100, 48000, 88200, 96000, 176400, 192000];

/// Description of one output endpoint
#[derive(Debug, Clone, Serialize)]
pub struct EndpointInfo {
    pub name: String,
    pub is_default: bool,
    pub sample_rates: Vec<u32>,
    pub channels: Vec<u16>,
}

/// List all output endpoints of the default host
pub fn list_output_devices() -> Vec<EndpointInfo> {
    let host = cpal::default_host();
    let mut endpoints = Vec::new();

    let default_name = host
        .default_output_device()
        .and_then(|d| d.name().ok());

    let devices = match host.output_devices() {
        Ok(devices) => devices,
        Err(e) => {
            tracing::warn!("Failed to enumerate output devices: {}", e);
            return endpoints;
        }
    };

    for device in devices {
        if let Ok(name) = device.name() {
            let is_default = default_name.as_ref() == Some(&name);
            let (sample_rates, channels) = output_capabilities(&device);

            endpoints.push(EndpointInfo {
                name,
                is_default,
                sample_rates,
                channels,
            });
        }
    }

    tracing::debug!("Found {} output endpoints", endpoints.len());
    endpoints
}

fn output_capabilities(device: &cpal::Device) -> (Vec<u32>, Vec<u16>) {
    let mut sample_rates = Vec::new();
    let mut channels = Vec::new();

    if let Ok(configs) = device.supported_output_configs() {
        for config in configs {
            for rate_val in PROBE_RATES {
                let rate = cpal::SampleRate(rate_val);
                if rate >= config.min_sample_rate()
                    && rate <= config.max_sample_rate()
                    && !sample_rates.contains(&rate_val)
                {
                    sample_rates.push(rate_val);
                }
            }

            let ch = config.channels();
            if !channels.contains(&ch) {
                channels.push(ch);
            }
        }
    }

    sample_rates.sort();
    channels.sort();

    (sample_rates, channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_is_consistent() {
        // Hosts without audio hardware return an empty list
        let endpoints = list_output_devices();
        for endpoint in &endpoints {
            assert!(endpoint.sample_rates.windows(2).all(|w| w[0] < w[1]));
            assert!(endpoint.channels.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
