//! Output-device sample-rate probe
//!
//! The shared processing context runs at one fixed rate for the lifetime of
//! a page. When the engine config leaves the rate at 0 we ask the default
//! output device via CPAL; headless machines fall back to a safe default.

use cpal::traits::{DeviceTrait, HostTrait};
use tracing::{debug, info, warn};

/// Rate used when no output device can be interrogated
pub const FALLBACK_SAMPLE_RATE: u32 = 48000;

/// Ask the default output device for its preferred sample rate
pub fn probe_output_sample_rate() -> Option<u32> {
    let host = cpal::default_host();
    debug!("Using audio host: {:?}", host.id());

    let device = host.default_output_device()?;
    match device.default_output_config() {
        Ok(config) => {
            let rate = config.sample_rate();
            info!(rate, "Probed default output device");
            Some(rate)
        }
        Err(e) => {
            warn!("Could not query default output config: {}", e);
            None
        }
    }
}

/// Resolve the configured sample rate: a nonzero value wins outright,
/// zero means probe the device, probe failure means the fallback
pub fn resolve_sample_rate(configured: u32) -> u32 {
    if configured != 0 {
        return configured;
    }

    match probe_output_sample_rate() {
        Some(rate) => rate,
        None => {
            warn!(
                fallback = FALLBACK_SAMPLE_RATE,
                "No output device available, using fallback sample rate"
            );
            FALLBACK_SAMPLE_RATE
        }
    }
}
