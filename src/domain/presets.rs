//! Built-in sonification presets.

use serde::Serialize;

use super::controls::ControlParameters;
use super::error::DomainError;

/// Preset used when no name (or a blank one) is supplied.
pub const DEFAULT_PRESET: &str = "Executive Minimal";

const LEGACY_ALIASES: [(&str, &str); 3] = [
    ("state azure", "modART"),
    ("state_azure", "modART"),
    ("state-azure", "modART"),
];

/// Named, immutable bundle of default controls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresetDefinition {
    name: &'static str,
    description: &'static str,
    controls: ControlParameters,
}

impl PresetDefinition {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    pub fn controls(&self) -> ControlParameters {
        self.controls
    }
}

struct PresetSeed {
    name: &'static str,
    description: &'static str,
    // [tempo_min, tempo_max, intensity, glitch, harmonizer, pad, ambient]
    knobs: [f64; 7],
}

const SEEDS: [PresetSeed; 9] = [
    PresetSeed {
        name: "Executive Minimal",
        description: "Sparse, low-transient summary voice for status reviews.",
        knobs: [56.0, 136.0, 0.42, 0.08, 0.30, 0.58, 0.36],
    },
    PresetSeed {
        name: "Risk Tension",
        description: "Darker root and heavier glitching to foreground risk.",
        knobs: [66.0, 146.0, 0.66, 0.42, 0.48, 0.52, 0.40],
    },
    PresetSeed {
        name: "Growth Momentum",
        description: "Bright, wide and driving; suited to upward trends.",
        knobs: [68.0, 148.0, 0.56, 0.18, 0.52, 0.62, 0.46],
    },
    PresetSeed {
        name: "modART",
        description: "Deep pads and wide ambience with a slow pulse.",
        knobs: [54.0, 134.0, 0.54, 0.22, 0.66, 0.90, 0.86],
    },
    PresetSeed {
        name: "Glitch Harmonics",
        description: "Dense transients over stacked harmonies.",
        knobs: [74.0, 154.0, 0.82, 0.76, 0.74, 0.46, 0.40],
    },
    PresetSeed {
        name: "Ambient Boardroom",
        description: "Near-silent bed for background monitoring.",
        knobs: [50.0, 130.0, 0.36, 0.05, 0.56, 0.94, 0.80],
    },
    PresetSeed {
        name: "Incident Grid",
        description: "Fast, aggressive grid for active incidents.",
        knobs: [76.0, 156.0, 0.86, 0.84, 0.64, 0.44, 0.36],
    },
    PresetSeed {
        name: "Clean Harmonics",
        description: "Clear harmonizer lines with almost no glitch.",
        knobs: [58.0, 138.0, 0.44, 0.04, 0.84, 0.82, 0.56],
    },
    PresetSeed {
        name: "Pulse Relay",
        description: "Steady rhythmic relay with moderate grit.",
        knobs: [70.0, 150.0, 0.70, 0.36, 0.58, 0.48, 0.34],
    },
];

/// Lookup table of the presets the backend understands.
#[derive(Debug, Clone)]
pub struct PresetCatalog {
    presets: Vec<PresetDefinition>,
}

impl Default for PresetCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PresetCatalog {
    pub fn builtin() -> Self {
        let presets = SEEDS
            .iter()
            .map(|seed| {
                let [tempo_min, tempo_max, intensity, glitch, harmonizer, pad, ambient] =
                    seed.knobs;
                PresetDefinition {
                    name: seed.name,
                    description: seed.description,
                    controls: ControlParameters::new(
                        tempo_min, tempo_max, intensity, glitch, harmonizer, pad, ambient,
                    ),
                }
            })
            .collect();
        Self { presets }
    }

    pub fn presets(&self) -> &[PresetDefinition] {
        &self.presets
    }

    /// Resolve a user-supplied preset name.
    ///
    /// Matching is exact first, then case-insensitive, then through the
    /// legacy aliases. A blank name selects [`DEFAULT_PRESET`].
    pub fn find(&self, name: &str) -> Result<&PresetDefinition, DomainError> {
        let cleaned = name.trim();
        let wanted = if cleaned.is_empty() {
            DEFAULT_PRESET
        } else {
            cleaned
        };

        if let Some(preset) = self.presets.iter().find(|p| p.name == wanted) {
            return Ok(preset);
        }

        let lowered = wanted.to_lowercase();
        if let Some(preset) = self
            .presets
            .iter()
            .find(|p| p.name.to_lowercase() == lowered)
        {
            return Ok(preset);
        }

        LEGACY_ALIASES
            .iter()
            .find(|(alias, _)| *alias == lowered)
            .and_then(|(_, target)| self.presets.iter().find(|p| p.name == *target))
            .ok_or_else(|| DomainError::unknown_preset(cleaned))
    }

    pub fn default_preset(&self) -> Result<&PresetDefinition, DomainError> {
        self.find(DEFAULT_PRESET)
    }
}
