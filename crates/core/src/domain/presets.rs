//! Built-in enhancement presets
//!
//! Presets are partial settings records: applying one overlays only the
//! fields it pins (preamp, band gains, compressor threshold/ratio/knee) and
//! leaves the user's other choices, including the master switch and mode
//! flags, untouched.

use crate::domain::settings::{SettingsPatch, BAND_COUNT};

/// A named built-in preset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preset {
    /// Stable identifier used in storage and on the command line.
    pub id: &'static str,
    /// Human-readable label for control surfaces.
    pub label: &'static str,
    /// The fields this preset pins.
    pub patch: SettingsPatch,
}

/// Identifiers of all built-in presets, in display order.
pub const PRESET_IDS: [&str; 20] = [
    "flat",
    "audiophile",
    "movie",
    "dialogue",
    "music",
    "rock",
    "classical",
    "jazz",
    "electronic",
    "hiphop",
    "metal",
    "acoustic",
    "podcast",
    "gaming",
    "night",
    "bassboost",
    "vocal",
    "cinematic",
    "radio",
    "lofi",
];

fn preset_patch(
    preamp: f32,
    bands: [f32; BAND_COUNT],
    threshold: f32,
    ratio: f32,
    knee: f32,
) -> SettingsPatch {
    SettingsPatch {
        preamp: Some(preamp),
        eq32: Some(bands[0]),
        eq64: Some(bands[1]),
        eq125: Some(bands[2]),
        eq250: Some(bands[3]),
        eq500: Some(bands[4]),
        eq1k: Some(bands[5]),
        eq2k: Some(bands[6]),
        eq4k: Some(bands[7]),
        eq8k: Some(bands[8]),
        eq16k: Some(bands[9]),
        compression_threshold: Some(threshold),
        compression_ratio: Some(ratio),
        compression_knee: Some(knee),
        ..SettingsPatch::default()
    }
}

/// Look up a built-in preset by identifier.
pub fn find(id: &str) -> Option<Preset> {
    let (label, patch) = match id {
        "flat" => ("Flat", preset_patch(0.0, [0.0; BAND_COUNT], -24.0, 1.0, 30.0)),
        "audiophile" => (
            "Audiophile",
            preset_patch(
                0.0,
                [1.0, 1.0, 0.5, 0.0, 0.5, 0.5, 0.5, 1.0, 1.0, 0.5],
                -40.0,
                1.5,
                40.0,
            ),
        ),
        "movie" => (
            "Movie",
            preset_patch(
                2.0,
                [4.0, 4.0, 3.0, 2.0, -2.0, -2.0, 0.0, 2.0, 2.0, 1.0],
                -30.0,
                4.0,
                20.0,
            ),
        ),
        "dialogue" => (
            "Dialogue",
            preset_patch(
                4.0,
                [-3.0, -3.0, -2.0, -1.0, 6.0, 6.0, 5.0, 3.0, 2.0, 1.0],
                -35.0,
                6.0,
                15.0,
            ),
        ),
        "music" => (
            "Music",
            preset_patch(
                1.0,
                [3.0, 3.0, 2.0, 1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 1.0],
                -24.0,
                2.0,
                30.0,
            ),
        ),
        "rock" => (
            "Rock",
            preset_patch(
                2.0,
                [5.0, 5.0, 4.0, 2.0, 2.0, 2.0, 3.0, 4.0, 4.0, 3.0],
                -20.0,
                3.0,
                25.0,
            ),
        ),
        "classical" => (
            "Classical",
            preset_patch(
                0.0,
                [1.0, 1.0, 0.5, 0.0, -1.0, -1.0, -0.5, 0.0, 0.5, 1.0],
                -35.0,
                1.5,
                35.0,
            ),
        ),
        "jazz" => (
            "Jazz",
            preset_patch(
                1.0,
                [2.0, 2.0, 1.5, 1.0, 1.0, 1.0, 1.0, 1.0, 1.5, 1.0],
                -28.0,
                2.0,
                30.0,
            ),
        ),
        "electronic" => (
            "Electronic",
            preset_patch(
                3.0,
                [7.0, 7.0, 5.0, 3.0, -1.0, -1.0, 2.0, 5.0, 6.0, 5.0],
                -18.0,
                4.0,
                20.0,
            ),
        ),
        "hiphop" => (
            "Hip Hop",
            preset_patch(
                2.0,
                [8.0, 8.0, 6.0, 4.0, 0.0, 0.0, 1.0, 2.0, 2.0, 1.0],
                -22.0,
                5.0,
                18.0,
            ),
        ),
        "metal" => (
            "Metal",
            preset_patch(
                3.0,
                [6.0, 6.0, 5.0, 3.0, 3.0, 3.0, 4.0, 6.0, 6.0, 5.0],
                -15.0,
                4.0,
                15.0,
            ),
        ),
        "acoustic" => (
            "Acoustic",
            preset_patch(
                1.0,
                [0.0, 0.0, 1.0, 2.0, 2.0, 2.0, 1.5, 1.0, 1.0, 0.5],
                -30.0,
                2.0,
                35.0,
            ),
        ),
        "podcast" => (
            "Podcast",
            preset_patch(
                3.0,
                [-2.0, -2.0, -1.0, 0.0, 5.0, 5.0, 4.0, 2.0, 1.0, 0.0],
                -32.0,
                5.0,
                18.0,
            ),
        ),
        "gaming" => (
            "Gaming",
            preset_patch(
                3.0,
                [6.0, 6.0, 5.0, 3.0, 0.0, 0.0, 1.0, 3.0, 3.0, 2.0],
                -25.0,
                3.0,
                22.0,
            ),
        ),
        "night" => (
            "Night",
            preset_patch(
                2.0,
                [2.0, 2.0, 2.0, 2.0, 3.0, 3.0, 2.0, 1.0, 1.0, 0.5],
                -38.0,
                8.0,
                12.0,
            ),
        ),
        "bassboost" => (
            "Bass+",
            preset_patch(
                0.0,
                [8.0, 8.0, 7.0, 5.0, -1.0, -1.0, 0.0, 1.0, 1.0, 0.5],
                -24.0,
                3.0,
                30.0,
            ),
        ),
        "vocal" => (
            "Vocal",
            preset_patch(
                3.0,
                [-4.0, -4.0, -3.0, -2.0, 8.0, 8.0, 7.0, 4.0, 3.0, 1.0],
                -32.0,
                6.0,
                16.0,
            ),
        ),
        "cinematic" => (
            "Cinematic",
            preset_patch(
                2.0,
                [5.0, 5.0, 4.0, 2.0, -1.0, -1.0, 1.0, 3.0, 3.0, 2.0],
                -28.0,
                5.0,
                22.0,
            ),
        ),
        "radio" => (
            "Radio",
            preset_patch(
                4.0,
                [-3.0, -3.0, -2.0, 0.0, 7.0, 7.0, 6.0, 3.0, 2.0, 0.0],
                -30.0,
                7.0,
                14.0,
            ),
        ),
        "lofi" => (
            "Lo-Fi",
            preset_patch(
                1.0,
                [4.0, 4.0, 3.0, 2.0, -2.0, -2.0, -1.0, -3.0, -3.0, -4.0],
                -26.0,
                3.0,
                25.0,
            ),
        ),
        _ => return None,
    };

    // The match above only builds presets for ids listed in PRESET_IDS
    let id = PRESET_IDS.iter().copied().find(|p| *p == id)?;
    Some(Preset { id, label, patch })
}

/// All built-in presets in display order.
pub fn all() -> Vec<Preset> {
    PRESET_IDS.iter().filter_map(|id| find(id)).collect()
}
