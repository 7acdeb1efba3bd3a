//! Enhancement settings model and layered resolution
//!
//! This module provides:
//! - The flat settings record with its canonical defaults
//! - A patch type mirroring the record with every field optional
//! - Layered resolution (default -> global -> domain -> tab)
//!
//! Records are persisted and exchanged as camelCase JSON, so a patch written
//! by any control surface round-trips field-for-field.

use serde::{Deserialize, Serialize};

/// Number of fixed equalizer bands.
pub const BAND_COUNT: usize = 10;

/// Center frequencies of the fixed bands, in ascending order (Hz).
pub const BAND_FREQUENCIES: [f32; BAND_COUNT] = [
    32.0, 64.0, 125.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0, 16000.0,
];

/// Complete enhancement settings for one page.
///
/// Every loaded instance is produced by layering partial patches onto
/// [`EnhancerSettings::default`]; no field is ever unset after resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnhancerSettings {
    /// Master bypass switch.
    pub enabled: bool,
    /// Broadband gain ahead of the bands, in dB (typically -10..+10).
    pub preamp: f32,
    // Per-band gains in dB (typically -12..+12), ascending frequency order.
    pub eq32: f32,
    pub eq64: f32,
    pub eq125: f32,
    pub eq250: f32,
    pub eq500: f32,
    pub eq1k: f32,
    pub eq2k: f32,
    pub eq4k: f32,
    pub eq8k: f32,
    pub eq16k: f32,
    /// Compressor threshold in dB (-60..0).
    pub compression_threshold: f32,
    /// Compression ratio (1..20).
    pub compression_ratio: f32,
    /// Compressor knee width in dB (0..40).
    pub compression_knee: f32,
    /// Compressor attack time in seconds.
    pub compression_attack: f32,
    /// Compressor release time in seconds.
    pub compression_release: f32,
    /// Preset compressor+preamp profile for uniform perceived loudness.
    pub smart_volume: bool,
    /// Downmix to a single channel.
    pub mono: bool,
    /// Fixed smile-curve EQ plus a small preamp boost.
    pub loudness_mode: bool,
}

impl Default for EnhancerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            preamp: 0.0,
            eq32: 0.0,
            eq64: 0.0,
            eq125: 0.0,
            eq250: 0.0,
            eq500: 0.0,
            eq1k: 0.0,
            eq2k: 0.0,
            eq4k: 0.0,
            eq8k: 0.0,
            eq16k: 0.0,
            compression_threshold: -24.0,
            compression_ratio: 3.0,
            compression_knee: 30.0,
            compression_attack: 0.003,
            compression_release: 0.25,
            smart_volume: false,
            mono: false,
            loudness_mode: false,
        }
    }
}

impl EnhancerSettings {
    /// Band gains as an array in ascending frequency order.
    pub fn band_gains(&self) -> [f32; BAND_COUNT] {
        [
            self.eq32, self.eq64, self.eq125, self.eq250, self.eq500, self.eq1k, self.eq2k,
            self.eq4k, self.eq8k, self.eq16k,
        ]
    }

    /// Overlay a patch onto this record; absent fields leave values intact.
    pub fn apply_patch(&mut self, patch: &SettingsPatch) {
        if let Some(v) = patch.enabled {
            self.enabled = v;
        }
        if let Some(v) = patch.preamp {
            self.preamp = v;
        }
        if let Some(v) = patch.eq32 {
            self.eq32 = v;
        }
        if let Some(v) = patch.eq64 {
            self.eq64 = v;
        }
        if let Some(v) = patch.eq125 {
            self.eq125 = v;
        }
        if let Some(v) = patch.eq250 {
            self.eq250 = v;
        }
        if let Some(v) = patch.eq500 {
            self.eq500 = v;
        }
        if let Some(v) = patch.eq1k {
            self.eq1k = v;
        }
        if let Some(v) = patch.eq2k {
            self.eq2k = v;
        }
        if let Some(v) = patch.eq4k {
            self.eq4k = v;
        }
        if let Some(v) = patch.eq8k {
            self.eq8k = v;
        }
        if let Some(v) = patch.eq16k {
            self.eq16k = v;
        }
        if let Some(v) = patch.compression_threshold {
            self.compression_threshold = v;
        }
        if let Some(v) = patch.compression_ratio {
            self.compression_ratio = v;
        }
        if let Some(v) = patch.compression_knee {
            self.compression_knee = v;
        }
        if let Some(v) = patch.compression_attack {
            self.compression_attack = v;
        }
        if let Some(v) = patch.compression_release {
            self.compression_release = v;
        }
        if let Some(v) = patch.smart_volume {
            self.smart_volume = v;
        }
        if let Some(v) = patch.mono {
            self.mono = v;
        }
        if let Some(v) = patch.loudness_mode {
            self.loudness_mode = v;
        }
    }

    /// Resolve effective settings by shallow-merging in documented order:
    /// default -> global -> domain override -> tab override.
    ///
    /// An absent layer or an absent field within a layer leaves the previous
    /// layer's value intact. No range validation is performed; the projector
    /// consumes resolved values verbatim.
    pub fn resolve(
        global: Option<&SettingsPatch>,
        domain: Option<&SettingsPatch>,
        tab: Option<&SettingsPatch>,
    ) -> Self {
        let mut settings = Self::default();
        if let Some(patch) = global {
            settings.apply_patch(patch);
        }
        if let Some(patch) = domain {
            settings.apply_patch(patch);
        }
        if let Some(patch) = tab {
            settings.apply_patch(patch);
        }
        settings
    }
}

/// Partial settings record: the unit of persistence-merge and of
/// `updateSettings` messages.
///
/// Serialization skips absent fields, so a stored patch only pins the fields
/// the user actually changed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preamp: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eq32: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eq64: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eq125: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eq250: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eq500: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eq1k: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eq2k: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eq4k: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eq8k: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eq16k: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_threshold: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_ratio: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_knee: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_attack: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_release: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smart_volume: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mono: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loudness_mode: Option<bool>,
}

impl SettingsPatch {
    /// A patch that pins no field at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True if no field is pinned.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// A patch that flips only the master switch.
    pub fn enabled(value: bool) -> Self {
        Self {
            enabled: Some(value),
            ..Self::default()
        }
    }
}

impl From<EnhancerSettings> for SettingsPatch {
    /// A full patch pinning every field, used for whole-record persistence.
    fn from(s: EnhancerSettings) -> Self {
        Self {
            enabled: Some(s.enabled),
            preamp: Some(s.preamp),
            eq32: Some(s.eq32),
            eq64: Some(s.eq64),
            eq125: Some(s.eq125),
            eq250: Some(s.eq250),
            eq500: Some(s.eq500),
            eq1k: Some(s.eq1k),
            eq2k: Some(s.eq2k),
            eq4k: Some(s.eq4k),
            eq8k: Some(s.eq8k),
            eq16k: Some(s.eq16k),
            compression_threshold: Some(s.compression_threshold),
            compression_ratio: Some(s.compression_ratio),
            compression_knee: Some(s.compression_knee),
            compression_attack: Some(s.compression_attack),
            compression_release: Some(s.compression_release),
            smart_volume: Some(s.smart_volume),
            mono: Some(s.mono),
            loudness_mode: Some(s.loudness_mode),
        }
    }
}
