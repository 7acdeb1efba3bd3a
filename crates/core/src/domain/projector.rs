//! Settings-to-chain parameter projection
//!
//! [`apply`] maps a resolved settings record onto a chain's stage handles.
//! It is deterministic and total: every call overwrites every adjustable
//! parameter, so repeated application with the same settings is idempotent.
//!
//! Policy, evaluated in order:
//! 1. `enabled == false` forces the fixed bypass profile and ignores every
//!    mode flag.
//! 2. `mono` selects an explicit single-channel downmix, otherwise stereo
//!    passthrough.
//! 3. The preamp starts from the user's dB value, +4 dB under smart volume,
//!    else +3 dB under loudness mode (smart volume wins when both are set).
//! 4. `loudness_mode` overrides all band gains with the fixed smile curve.
//! 5. `smart_volume` overrides the compressor with a fixed aggressive
//!    profile.
//!
//! Mode flags are layered overrides, never merged into the persisted manual
//! values, so switching a mode off restores the user's prior settings.

use crate::domain::chain::{ChannelMixMode, CompressorStage, EnhancerChain, MonoStage};
use crate::domain::settings::{EnhancerSettings, BAND_COUNT};
use tracing::trace;

/// Band gains applied when loudness mode is active, in dB ascending.
pub const LOUDNESS_CURVE: [f32; BAND_COUNT] =
    [6.0, 4.0, 2.0, 0.0, -1.0, 0.0, 2.0, 4.0, 5.0, 6.0];

/// Preamp boost added under smart volume, in dB.
pub const SMART_VOLUME_BOOST_DB: f32 = 4.0;

/// Preamp boost added under loudness mode, in dB.
pub const LOUDNESS_BOOST_DB: f32 = 3.0;

/// Compressor profile forced by smart volume.
pub const SMART_VOLUME_COMPRESSOR: CompressorStage = CompressorStage {
    threshold_db: -35.0,
    ratio: 8.0,
    knee_db: 10.0,
    attack_secs: 0.05,
    release_secs: 0.25,
};

/// Compressor profile forced by bypass: 1:1 ratio with the remaining fields
/// at their neutral defaults, keeping the projection total.
pub const BYPASS_COMPRESSOR: CompressorStage = CompressorStage {
    threshold_db: -24.0,
    ratio: 1.0,
    knee_db: 30.0,
    attack_secs: 0.003,
    release_secs: 0.25,
};

/// Convert decibels to a linear gain factor.
pub fn db_to_gain(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Effective preamp level in dB for an enabled chain, including mode boosts.
pub fn effective_preamp_db(settings: &EnhancerSettings) -> f32 {
    let mut db = settings.preamp;
    if settings.smart_volume {
        db += SMART_VOLUME_BOOST_DB;
    } else if settings.loudness_mode {
        db += LOUDNESS_BOOST_DB;
    }
    db
}

/// Band gains for an enabled chain: the loudness curve, or the user's values
/// verbatim.
pub fn band_gains_for(settings: &EnhancerSettings) -> [f32; BAND_COUNT] {
    if settings.loudness_mode {
        LOUDNESS_CURVE
    } else {
        settings.band_gains()
    }
}

/// Compressor parameters for an enabled chain: the smart-volume profile, or
/// the user's manual values verbatim.
pub fn compressor_for(settings: &EnhancerSettings) -> CompressorStage {
    if settings.smart_volume {
        SMART_VOLUME_COMPRESSOR
    } else {
        CompressorStage {
            threshold_db: settings.compression_threshold,
            ratio: settings.compression_ratio,
            knee_db: settings.compression_knee,
            attack_secs: settings.compression_attack,
            release_secs: settings.compression_release,
        }
    }
}

/// Project a settings record onto a chain's stage handles.
pub fn apply(chain: &mut EnhancerChain, settings: &EnhancerSettings) {
    if !settings.enabled {
        chain.mono = MonoStage {
            channel_count: 2,
            mode: ChannelMixMode::Max,
        };
        chain.preamp.gain = 1.0;
        for band in chain.bands.iter_mut() {
            band.gain_db = 0.0;
        }
        chain.compressor = BYPASS_COMPRESSOR;
        trace!("Projected bypass profile");
        return;
    }

    chain.mono = if settings.mono {
        MonoStage {
            channel_count: 1,
            mode: ChannelMixMode::Explicit,
        }
    } else {
        MonoStage {
            channel_count: 2,
            mode: ChannelMixMode::Max,
        }
    };

    chain.preamp.gain = db_to_gain(effective_preamp_db(settings));

    let gains = band_gains_for(settings);
    for (band, gain) in chain.bands.iter_mut().zip(gains.iter()) {
        band.gain_db = *gain;
    }

    chain.compressor = compressor_for(settings);

    trace!(
        preamp_db = effective_preamp_db(settings),
        mono = settings.mono,
        loudness = settings.loudness_mode,
        smart_volume = settings.smart_volume,
        "Projected settings onto chain"
    );
}
