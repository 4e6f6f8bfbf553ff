//! DAHDSR envelope generator.
//!
//! Seven stages: idle, delay, attack, hold, decay, sustain, release.
//! All ramps are linear. Stage durations are held in samples; a
//! zero-length stage is crossed instantly, so one advance can walk
//! through several stages.

/// Decoded envelope timing. Durations are in samples at the engine rate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnvParams {
    pub delay: f32,
    pub attack: f32,
    pub hold: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
    /// When false, a new gate continues from the current level instead
    /// of snapping back to zero.
    pub retrigger: bool,
}

impl EnvParams {
    /// An instant-on, instant-off gate. Useful as a neutral default.
    pub const GATE: Self = Self {
        delay: 0.0,
        attack: 0.0,
        hold: 0.0,
        decay: 0.0,
        sustain: 1.0,
        release: 0.0,
        retrigger: true,
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Idle,
    Delay,
    Attack,
    Hold,
    Decay,
    Sustain,
    Release,
}

/// Runtime state for one envelope instance.
#[derive(Clone, Debug)]
pub struct EnvelopeState {
    stage: Stage,
    /// Samples elapsed within the current stage.
    time_in_stage: f32,
    /// Current output level in [0, 1].
    value: f32,
    /// Level at the start of the current ramp (attack or release).
    ramp_from: f32,
}

impl EnvelopeState {
    pub fn new() -> Self {
        Self { stage: Stage::Idle, time_in_stage: 0.0, value: 0.0, ramp_from: 0.0 }
    }

    /// Current output level.
    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn is_idle(&self) -> bool {
        self.stage == Stage::Idle
    }

    pub fn is_releasing(&self) -> bool {
        self.stage == Stage::Release
    }

    /// How far through the release ramp, in [0, 1]. Idle counts as 1;
    /// anything before release counts as 0. Drives steal ordering.
    pub fn release_progress(&self, params: &EnvParams) -> f32 {
        match self.stage {
            Stage::Idle => 1.0,
            Stage::Release => {
                if params.release <= 0.0 {
                    1.0
                } else {
                    (self.time_in_stage / params.release).min(1.0)
                }
            }
            _ => 0.0,
        }
    }

    /// Gate on. Retrigger mode restarts from zero through the delay
    /// stage; continue mode ramps up from wherever the level is now.
    pub fn gate_on(&mut self, params: &EnvParams) {
        if params.retrigger {
            self.value = 0.0;
            self.ramp_from = 0.0;
            self.stage = Stage::Delay;
        } else {
            self.ramp_from = self.value;
            self.stage = Stage::Attack;
        }
        self.time_in_stage = 0.0;
    }

    /// Gate off. Release ramps from the captured current level, so a
    /// note released mid-attack does not jump.
    pub fn gate_off(&mut self) {
        if self.stage == Stage::Idle || self.stage == Stage::Release {
            return;
        }
        self.ramp_from = self.value;
        self.stage = Stage::Release;
        self.time_in_stage = 0.0;
    }

    /// Cut the envelope dead. Used when a voice is stolen.
    pub fn kill(&mut self) {
        self.stage = Stage::Idle;
        self.value = 0.0;
        self.time_in_stage = 0.0;
    }

    /// Advance by `dt` samples.
    pub fn advance(&mut self, params: &EnvParams, dt: f32) {
        if self.stage == Stage::Idle || self.stage == Stage::Sustain {
            if self.stage == Stage::Sustain {
                self.value = params.sustain;
            }
            return;
        }
        self.time_in_stage += dt;
        self.resolve(params);
    }

    /// Walk forward until time_in_stage fits within the current stage.
    fn resolve(&mut self, params: &EnvParams) {
        loop {
            let duration = match self.stage {
                Stage::Idle | Stage::Sustain => return,
                Stage::Delay => params.delay,
                Stage::Attack => params.attack,
                Stage::Hold => params.hold,
                Stage::Decay => params.decay,
                Stage::Release => params.release,
            };

            if self.time_in_stage < duration {
                // Within the stage: interpolate the ramps, hold the holds.
                let t = self.time_in_stage / duration;
                self.value = match self.stage {
                    Stage::Delay => self.ramp_from,
                    Stage::Attack => self.ramp_from + (1.0 - self.ramp_from) * t,
                    Stage::Hold => 1.0,
                    Stage::Decay => 1.0 + (params.sustain - 1.0) * t,
                    Stage::Release => self.ramp_from * (1.0 - t),
                    Stage::Idle | Stage::Sustain => unreachable!(),
                };
                return;
            }

            // Stage complete: carry overshoot into the next one.
            self.time_in_stage -= duration;
            match self.stage {
                Stage::Delay => {
                    self.stage = Stage::Attack;
                }
                Stage::Attack => {
                    self.value = 1.0;
                    self.stage = Stage::Hold;
                }
                Stage::Hold => {
                    self.value = 1.0;
                    self.stage = Stage::Decay;
                }
                Stage::Decay => {
                    self.value = params.sustain;
                    self.stage = Stage::Sustain;
                    return;
                }
                Stage::Release => {
                    self.value = 0.0;
                    self.stage = Stage::Idle;
                    return;
                }
                Stage::Idle | Stage::Sustain => unreachable!(),
            }
        }
    }
}

impl Default for EnvelopeState {
    fn default() -> Self {
        Self::new()
    }
}
