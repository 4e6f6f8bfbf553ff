//! Modulation routing types: sources, targets, and slots.
//!
//! Patches store routing choices as numeric parameter values; these
//! enums give them names. Decoding is total: any out-of-range index
//! becomes `None`, which the matrix skips.

/// Number of generic matrix slots (the `Mod` group).
pub const GENERIC_SLOTS: usize = 8;

/// Number of dedicated slots per source (each LFO, the mod envelope).
pub const SOURCE_SLOTS: usize = 4;

/// What feeds a generic matrix slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModSource {
    None,
    Lfo1,
    Lfo2,
    Lfo3,
    ModEnv,
    PitchBend,
    ModWheel,
    Aftertouch,
    Velocity,
    KeyTrack,
}

impl ModSource {
    /// Decode from a parameter value index.
    pub fn from_index(index: i32) -> Self {
        match index {
            1 => Self::Lfo1,
            2 => Self::Lfo2,
            3 => Self::Lfo3,
            4 => Self::ModEnv,
            5 => Self::PitchBend,
            6 => Self::ModWheel,
            7 => Self::Aftertouch,
            8 => Self::Velocity,
            9 => Self::KeyTrack,
            _ => Self::None,
        }
    }
}

/// A modulatable oscillator quantity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OscDest {
    Pitch,
    Symmetry,
    Fold,
    Drive,
    BitRedux,
    Level,
    Pan,
    Detune,
}

impl OscDest {
    pub const COUNT: usize = 8;

    fn from_offset(offset: i32) -> Option<Self> {
        Some(match offset {
            0 => Self::Pitch,
            1 => Self::Symmetry,
            2 => Self::Fold,
            3 => Self::Drive,
            4 => Self::BitRedux,
            5 => Self::Level,
            6 => Self::Pan,
            7 => Self::Detune,
            _ => return None,
        })
    }
}

/// Where a modulation slot lands.
///
/// Index layout matches the patch schema's target choice lists:
/// 0 none, 1..=8 osc 1, 9..=16 osc 2, 17..=24 both, 25..=26 filter,
/// 27..=38 LFO slot amounts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModTarget {
    None,
    Osc1(OscDest),
    Osc2(OscDest),
    BothOsc(OscDest),
    FilterCutoff,
    FilterRes,
    /// Amount of dedicated slot `slot` (0-based) on LFO `lfo` (0-based).
    LfoAmount { lfo: u8, slot: u8 },
}

impl ModTarget {
    /// Decode from a parameter value index.
    pub fn from_index(index: i32) -> Self {
        match index {
            1..=8 => OscDest::from_offset(index - 1).map_or(Self::None, Self::Osc1),
            9..=16 => OscDest::from_offset(index - 9).map_or(Self::None, Self::Osc2),
            17..=24 => OscDest::from_offset(index - 17).map_or(Self::None, Self::BothOsc),
            25 => Self::FilterCutoff,
            26 => Self::FilterRes,
            27..=38 => {
                let rel = (index - 27) as u8;
                Self::LfoAmount {
                    lfo: rel / SOURCE_SLOTS as u8,
                    slot: rel % SOURCE_SLOTS as u8,
                }
            }
            _ => Self::None,
        }
    }

    pub fn is_none(self) -> bool {
        self == Self::None
    }
}

/// One routing entry: source, target, signed normalized amount.
///
/// `amount` is already scaled to ±1 (patch values are ±100).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModSlot {
    pub source: ModSource,
    pub target: ModTarget,
    pub amount: f32,
}

impl ModSlot {
    pub const OFF: Self = Self {
        source: ModSource::None,
        target: ModTarget::None,
        amount: 0.0,
    };

    /// A slot contributes nothing when either end is unrouted.
    pub fn is_active(&self) -> bool {
        self.source != ModSource::None && !self.target.is_none()
    }
}
