//! Bounded mapping knobs sent with every render.
//!
//! Each knob lives in a closed range mirroring the backend's own clamping.
//! The tempo pair keeps a fixed margin: moving one bound past the other drags
//! the other along instead of rejecting the edit.

use serde::Serialize;
use sonoscope_api_types::RenderControls;

/// Minimum gap kept between `tempo_min` and `tempo_max`, in BPM.
pub const TEMPO_MARGIN: f64 = 5.0;

/// Closed numeric interval a knob is clamped into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KnobRange {
    pub min: f64,
    pub max: f64,
}

impl KnobRange {
    const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn clamp(self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    pub fn contains(self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Knob {
    TempoMin,
    TempoMax,
    Intensity,
    GlitchDensity,
    HarmonizerMix,
    PadDepth,
    AmbientMix,
}

impl Knob {
    pub const ALL: [Knob; 7] = [
        Knob::TempoMin,
        Knob::TempoMax,
        Knob::Intensity,
        Knob::GlitchDensity,
        Knob::HarmonizerMix,
        Knob::PadDepth,
        Knob::AmbientMix,
    ];

    pub fn range(self) -> KnobRange {
        match self {
            Knob::TempoMin => KnobRange::new(40.0, 180.0),
            Knob::TempoMax => KnobRange::new(50.0, 200.0),
            Knob::Intensity | Knob::PadDepth => KnobRange::new(0.1, 1.0),
            Knob::GlitchDensity | Knob::HarmonizerMix | Knob::AmbientMix => {
                KnobRange::new(0.0, 1.0)
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Knob::TempoMin => "tempo_min",
            Knob::TempoMax => "tempo_max",
            Knob::Intensity => "intensity",
            Knob::GlitchDensity => "glitch_density",
            Knob::HarmonizerMix => "harmonizer_mix",
            Knob::PadDepth => "pad_depth",
            Knob::AmbientMix => "ambient_mix",
        }
    }
}

/// The seven render knobs. Fields are private so every write goes through
/// the clamping setters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ControlParameters {
    tempo_min: f64,
    tempo_max: f64,
    intensity: f64,
    glitch_density: f64,
    harmonizer_mix: f64,
    pad_depth: f64,
    ambient_mix: f64,
}

impl Default for ControlParameters {
    fn default() -> Self {
        Self {
            tempo_min: 60.0,
            tempo_max: 140.0,
            intensity: 0.5,
            glitch_density: 0.1,
            harmonizer_mix: 0.45,
            pad_depth: 0.6,
            ambient_mix: 0.4,
        }
    }
}

impl ControlParameters {
    /// Build a parameter set from raw values, clamping each knob and
    /// restoring the tempo margin by raising the ceiling when needed.
    pub fn new(
        tempo_min: f64,
        tempo_max: f64,
        intensity: f64,
        glitch_density: f64,
        harmonizer_mix: f64,
        pad_depth: f64,
        ambient_mix: f64,
    ) -> Self {
        let mut params = Self::default();
        params
            .set(Knob::TempoMax, tempo_max)
            .set(Knob::TempoMin, tempo_min)
            .set(Knob::Intensity, intensity)
            .set(Knob::GlitchDensity, glitch_density)
            .set(Knob::HarmonizerMix, harmonizer_mix)
            .set(Knob::PadDepth, pad_depth)
            .set(Knob::AmbientMix, ambient_mix);
        params
    }

    pub fn get(&self, knob: Knob) -> f64 {
        match knob {
            Knob::TempoMin => self.tempo_min,
            Knob::TempoMax => self.tempo_max,
            Knob::Intensity => self.intensity,
            Knob::GlitchDensity => self.glitch_density,
            Knob::HarmonizerMix => self.harmonizer_mix,
            Knob::PadDepth => self.pad_depth,
            Knob::AmbientMix => self.ambient_mix,
        }
    }

    /// Clamp `value` into the knob's range and store it. Non-finite values
    /// leave the parameters untouched.
    pub fn set(&mut self, knob: Knob, value: f64) -> &mut Self {
        if !value.is_finite() {
            return self;
        }
        let value = knob.range().clamp(value);
        match knob {
            Knob::TempoMin => {
                self.tempo_min = value;
                if self.tempo_max < value + TEMPO_MARGIN {
                    self.tempo_max = value + TEMPO_MARGIN;
                    // `(v + m) - m` can round below `v`.
                    self.tempo_min = self.tempo_min.min(self.tempo_max - TEMPO_MARGIN);
                }
            }
            Knob::TempoMax => {
                self.tempo_max = value;
                if self.tempo_min > value - TEMPO_MARGIN {
                    self.tempo_min = value - TEMPO_MARGIN;
                }
            }
            Knob::Intensity => self.intensity = value,
            Knob::GlitchDensity => self.glitch_density = value,
            Knob::HarmonizerMix => self.harmonizer_mix = value,
            Knob::PadDepth => self.pad_depth = value,
            Knob::AmbientMix => self.ambient_mix = value,
        }
        self
    }

    pub fn set_tempo_min(&mut self, value: f64) -> &mut Self {
        self.set(Knob::TempoMin, value)
    }

    pub fn set_tempo_max(&mut self, value: f64) -> &mut Self {
        self.set(Knob::TempoMax, value)
    }

    pub fn tempo_min(&self) -> f64 {
        self.tempo_min
    }

    pub fn tempo_max(&self) -> f64 {
        self.tempo_max
    }

    pub fn intensity(&self) -> f64 {
        self.intensity
    }

    pub fn glitch_density(&self) -> f64 {
        self.glitch_density
    }

    pub fn harmonizer_mix(&self) -> f64 {
        self.harmonizer_mix
    }

    pub fn pad_depth(&self) -> f64 {
        self.pad_depth
    }

    pub fn ambient_mix(&self) -> f64 {
        self.ambient_mix
    }

    pub fn to_wire(&self) -> RenderControls {
        RenderControls {
            tempo_min: self.tempo_min,
            tempo_max: self.tempo_max,
            intensity: self.intensity,
            glitch_density: self.glitch_density,
            harmonizer_mix: self.harmonizer_mix,
            pad_depth: self.pad_depth,
            ambient_mix: self.ambient_mix,
        }
    }
}
