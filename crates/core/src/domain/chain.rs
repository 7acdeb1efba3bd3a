//! Audio chain stage handles and the fixed per-element chain
//!
//! Stages wrap the host audio engine's built-in nodes (gain, biquad filter,
//! dynamics compressor, analyser) and hold their adjustable parameters. The
//! host computes the actual signal math; this module only models the knobs
//! and the fixed connection order:
//!
//! source -> preamp -> mono mix -> ten bands -> compressor -> analyser tap
//! -> context output
//!
//! The first band is a low shelf, the last a high shelf, the middle eight
//! are peaking filters, all with Q = 1.0.

use crate::domain::settings::{BAND_COUNT, BAND_FREQUENCIES};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// STAGE HANDLES
// ============================================================================

/// Filter response shape of a band stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    LowShelf,
    Peaking,
    HighShelf,
}

/// Broadband gain stage ahead of the bands.
///
/// `gain` is a linear factor; unity (1.0) is the structural default.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreampStage {
    pub gain: f32,
}

impl Default for PreampStage {
    fn default() -> Self {
        Self { gain: 1.0 }
    }
}

/// Channel-count interpretation of the mono-mix stage, mirroring the host's
/// channel count modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelMixMode {
    /// Pass channels through unmodified, up to `channel_count`.
    Max,
    /// Force exactly `channel_count` channels, downmixing as needed.
    Explicit,
}

/// Mono-mix stage: a unity gain node used purely for its channel handling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonoStage {
    pub channel_count: u16,
    pub mode: ChannelMixMode,
}

impl Default for MonoStage {
    fn default() -> Self {
        Self {
            channel_count: 2,
            mode: ChannelMixMode::Max,
        }
    }
}

impl MonoStage {
    /// True when the stage forces a single-channel downmix.
    pub fn is_downmixed(&self) -> bool {
        self.channel_count == 1 && self.mode == ChannelMixMode::Explicit
    }
}

/// One fixed-frequency equalizer band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandStage {
    pub kind: FilterKind,
    /// Center (or corner) frequency in Hz, fixed per band.
    pub frequency: f32,
    pub q: f32,
    pub gain_db: f32,
}

impl BandStage {
    fn new(kind: FilterKind, frequency: f32) -> Self {
        Self {
            kind,
            frequency,
            q: 1.0,
            gain_db: 0.0,
        }
    }
}

/// Dynamics compressor stage.
///
/// Structural defaults mirror the host node's own defaults; the projector
/// overwrites every field on each application.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressorStage {
    pub threshold_db: f32,
    pub ratio: f32,
    pub knee_db: f32,
    pub attack_secs: f32,
    pub release_secs: f32,
}

impl Default for CompressorStage {
    fn default() -> Self {
        Self {
            threshold_db: -24.0,
            ratio: 12.0,
            knee_db: 30.0,
            attack_secs: 0.003,
            release_secs: 0.25,
        }
    }
}

// ============================================================================
// SHARED PAGE CONTEXT
// ============================================================================

/// Run state of the shared processing context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextState {
    /// Output path suspended (host autoplay policy); chains stay wired.
    Suspended,
    Running,
}

/// Page-wide spectrum analyser tap.
///
/// The host fills it with frequency-magnitude frames; the engine only
/// configures it and snapshots the most recent frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyserTap {
    fft_size: usize,
    smoothing: f32,
    frame: Vec<u8>,
}

impl AnalyserTap {
    pub const FFT_SIZE: usize = 512;
    pub const SMOOTHING: f32 = 0.8;

    fn new() -> Self {
        Self {
            fft_size: Self::FFT_SIZE,
            smoothing: Self::SMOOTHING,
            frame: vec![0; Self::FFT_SIZE / 2],
        }
    }

    /// Number of frequency bins in a frame (half the transform size).
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn smoothing(&self) -> f32 {
        self.smoothing
    }

    /// Store a host-delivered frame, truncated or zero-padded to the bin
    /// count.
    pub fn ingest_frame(&mut self, data: &[u8]) {
        let bins = self.bin_count();
        self.frame.clear();
        self.frame.extend(data.iter().copied().take(bins));
        self.frame.resize(bins, 0);
    }

    /// The most recent frame (all zeros until the host delivers one).
    pub fn snapshot(&self) -> Vec<u8> {
        self.frame.clone()
    }
}

/// The single shared processing context for one page.
///
/// Created at most once per page, on first attachment, and never recreated
/// while the page lives. Owns the output stage and the analyser tap shared
/// by every chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageContext {
    sample_rate: u32,
    state: ContextState,
    analyser: AnalyserTap,
}

impl PageContext {
    /// Create the shared context.
    ///
    /// Starts suspended: hosts with an autoplay policy keep output silent
    /// until a user gesture, and resuming later never re-runs wiring.
    pub fn new(sample_rate: u32) -> Self {
        debug!(sample_rate, "Creating shared audio context");
        Self {
            sample_rate,
            state: ContextState::Suspended,
            analyser: AnalyserTap::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ContextState::Running
    }

    /// Resume the output path. Safe to call repeatedly.
    pub fn resume(&mut self) {
        if self.state == ContextState::Suspended {
            debug!("Resuming audio context output");
            self.state = ContextState::Running;
        }
    }

    pub fn analyser(&self) -> &AnalyserTap {
        &self.analyser
    }

    pub fn analyser_mut(&mut self) -> &mut AnalyserTap {
        &mut self.analyser
    }

    /// Construct a fresh chain wired through this context.
    ///
    /// Stages are created per chain and never shared. Only structural
    /// defaults are assigned here (filter kind, frequency, Q); gains and
    /// dynamics values are set later by the projector.
    pub fn build_chain(&self) -> EnhancerChain {
        EnhancerChain::new()
    }
}

// ============================================================================
// ENHANCER CHAIN
// ============================================================================

/// The ordered stage handles attached to one media element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnhancerChain {
    pub preamp: PreampStage,
    pub mono: MonoStage,
    pub bands: [BandStage; BAND_COUNT],
    pub compressor: CompressorStage,
}

impl EnhancerChain {
    fn new() -> Self {
        let mut bands = [BandStage::new(FilterKind::Peaking, 0.0); BAND_COUNT];
        for (i, freq) in BAND_FREQUENCIES.iter().enumerate() {
            let kind = if i == 0 {
                FilterKind::LowShelf
            } else if i == BAND_COUNT - 1 {
                FilterKind::HighShelf
            } else {
                FilterKind::Peaking
            };
            bands[i] = BandStage::new(kind, *freq);
        }

        Self {
            preamp: PreampStage::default(),
            mono: MonoStage::default(),
            bands,
            compressor: CompressorStage::default(),
        }
    }

    /// Band gains in ascending frequency order.
    pub fn band_gains(&self) -> [f32; BAND_COUNT] {
        let mut gains = [0.0; BAND_COUNT];
        for (gain, band) in gains.iter_mut().zip(self.bands.iter()) {
            *gain = band.gain_db;
        }
        gains
    }
}
