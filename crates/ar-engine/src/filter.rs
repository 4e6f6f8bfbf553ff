//! Resonant state-variable filter.
//!
//! Topology-preserving transform SVF with low, band, and high outputs.
//! Two serial stages give the 24 dB/oct slope; the slope control picks
//! one or both. Coefficients update once per control tick.

/// Filter response type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterType {
    LowPass,
    BandPass,
    HighPass,
}

impl FilterType {
    pub fn from_index(index: i32) -> Self {
        match index {
            1 => Self::BandPass,
            2 => Self::HighPass,
            _ => Self::LowPass,
        }
    }
}

/// Decoded per-block filter settings. Cutoff and resonance are the
/// base values; modulation is added per control tick before the
/// coefficient update.
#[derive(Clone, Copy, Debug)]
pub struct FilterSettings {
    pub kind: FilterType,
    /// Base cutoff in Hz.
    pub cutoff: f32,
    /// Resonance in [0, 1].
    pub resonance: f32,
    /// Input gain, 1 to 2.
    pub drive: f32,
    /// Cutoff keyboard tracking in [0, 1].
    pub key_track: f32,
    /// False for 12 dB/oct, true for 24.
    pub four_pole: bool,
}

impl FilterSettings {
    pub const OPEN: Self = Self {
        kind: FilterType::LowPass,
        cutoff: 20000.0,
        resonance: 0.0,
        drive: 1.0,
        key_track: 0.0,
        four_pole: true,
    };
}

/// Coefficients for the current control tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FilterCoeffs {
    g: f32,
    k: f32,
    a1: f32,
    a2: f32,
    a3: f32,
    kind: usize,
    four_pole: bool,
    drive: f32,
}

impl FilterCoeffs {
    /// Compute coefficients for a cutoff already clamped to range.
    pub fn compute(kind: FilterType, cutoff: f32, resonance: f32, drive: f32, four_pole: bool, sample_rate: f32) -> Self {
        let fc = cutoff.clamp(20.0, sample_rate * 0.49);
        let g = libm::tanf(core::f32::consts::PI * fc / sample_rate);
        // Resonance maps to damping; cap short of self-oscillation.
        let k = 2.0 - 1.9 * resonance.clamp(0.0, 1.0);
        let a1 = 1.0 / (1.0 + g * (g + k));
        Self {
            g,
            k,
            a1,
            a2: g * a1,
            a3: g * g * a1,
            kind: match kind {
                FilterType::LowPass => 0,
                FilterType::BandPass => 1,
                FilterType::HighPass => 2,
            },
            four_pole,
            drive,
        }
    }
}

/// One SVF integrator pair.
#[derive(Clone, Copy, Debug, Default)]
struct SvfStage {
    ic1: f32,
    ic2: f32,
}

impl SvfStage {
    fn process(&mut self, c: &FilterCoeffs, input: f32) -> f32 {
        let v3 = input - self.ic2;
        let v1 = c.a1 * self.ic1 + c.a2 * v3;
        let v2 = self.ic2 + c.a2 * self.ic1 + c.a3 * v3;
        self.ic1 = 2.0 * v1 - self.ic1;
        self.ic2 = 2.0 * v2 - self.ic2;
        match c.kind {
            1 => v1,
            2 => input - c.k * v1 - v2,
            _ => v2,
        }
    }

    fn reset(&mut self) {
        self.ic1 = 0.0;
        self.ic2 = 0.0;
    }
}

/// Per-voice stereo filter state: two stages per channel.
#[derive(Clone, Debug, Default)]
pub struct FilterState {
    stages: [[SvfStage; 2]; 2],
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear integrator state for a fresh voice.
    pub fn reset(&mut self) {
        for channel in &mut self.stages {
            for stage in channel {
                stage.reset();
            }
        }
    }

    /// Process one stereo sample.
    pub fn process(&mut self, c: &FilterCoeffs, left: f32, right: f32) -> (f32, f32) {
        (self.process_channel(0, c, left), self.process_channel(1, c, right))
    }

    fn process_channel(&mut self, channel: usize, c: &FilterCoeffs, input: f32) -> f32 {
        let driven = if c.drive > 1.0 {
            libm::tanhf(input * c.drive)
        } else {
            input
        };
        let first = self.stages[channel][0].process(c, driven);
        if c.four_pole {
            self.stages[channel][1].process(c, first)
        } else {
            first
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 44100.0;

    fn run_sine(coeffs: &FilterCoeffs, freq: f32, samples: usize) -> f32 {
        let mut state = FilterState::new();
        let mut peak: f32 = 0.0;
        for n in 0..samples {
            let x = libm::sinf(core::f32::consts::TAU * freq * n as f32 / SR);
            let (l, _) = state.process(coeffs, x, x);
            // Skip the warm-up transient.
            if n > samples / 2 {
                peak = peak.max(l.abs());
            }
        }
        peak
    }

    #[test]
    fn lowpass_passes_low_rejects_high() {
        let c = FilterCoeffs::compute(FilterType::LowPass, 1000.0, 0.0, 1.0, true, SR);
        let low = run_sine(&c, 100.0, 4096);
        let high = run_sine(&c, 8000.0, 4096);
        assert!(low > 0.9, "low band attenuated: {low}");
        assert!(high < 0.05, "high band leaked: {high}");
    }

    #[test]
    fn highpass_rejects_low() {
        let c = FilterCoeffs::compute(FilterType::HighPass, 2000.0, 0.0, 1.0, true, SR);
        let low = run_sine(&c, 100.0, 4096);
        let high = run_sine(&c, 10000.0, 4096);
        assert!(low < 0.05, "low band leaked: {low}");
        assert!(high > 0.8, "high band attenuated: {high}");
    }

    #[test]
    fn bandpass_peaks_near_cutoff() {
        let c = FilterCoeffs::compute(FilterType::BandPass, 1000.0, 0.5, 1.0, false, SR);
        let at = run_sine(&c, 1000.0, 4096);
        let below = run_sine(&c, 100.0, 4096);
        let above = run_sine(&c, 10000.0, 4096);
        assert!(at > below * 2.0);
        assert!(at > above * 2.0);
    }

    #[test]
    fn two_pole_slope_is_shallower() {
        let steep = FilterCoeffs::compute(FilterType::LowPass, 500.0, 0.0, 1.0, true, SR);
        let shallow = FilterCoeffs::compute(FilterType::LowPass, 500.0, 0.0, 1.0, false, SR);
        let steep_out = run_sine(&steep, 4000.0, 4096);
        let shallow_out = run_sine(&shallow, 4000.0, 4096);
        assert!(shallow_out > steep_out * 2.0);
    }

    #[test]
    fn resonance_boosts_cutoff_band() {
        let flat = FilterCoeffs::compute(FilterType::LowPass, 1000.0, 0.0, 1.0, false, SR);
        let peaked = FilterCoeffs::compute(FilterType::LowPass, 1000.0, 0.9, 1.0, false, SR);
        assert!(run_sine(&peaked, 1000.0, 8192) > run_sine(&flat, 1000.0, 8192) * 1.5);
    }

    #[test]
    fn output_is_finite_at_extremes() {
        let c = FilterCoeffs::compute(FilterType::LowPass, 20000.0, 1.0, 2.0, true, SR);
        let mut state = FilterState::new();
        for _ in 0..1000 {
            let (l, r) = state.process(&c, 1.0, -1.0);
            assert!(l.is_finite() && r.is_finite());
        }
    }
}
