//! Audio frame type.

/// A stereo audio frame (32-bit float).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Frame {
    pub left: f32,
    pub right: f32,
}

impl Frame {
    /// Create a silent frame.
    pub const fn silence() -> Self {
        Self { left: 0.0, right: 0.0 }
    }

    /// Create a mono frame (same value for both channels).
    pub const fn mono(value: f32) -> Self {
        Self { left: value, right: value }
    }

    /// Mix another frame into this one.
    pub fn mix(&mut self, other: Frame) {
        self.left += other.left;
        self.right += other.right;
    }

    /// Scale both channels.
    pub fn scale(&mut self, gain: f32) {
        self.left *= gain;
        self.right *= gain;
    }

    /// Peak absolute amplitude across both channels.
    pub fn peak(&self) -> f32 {
        let l = self.left.abs();
        let r = self.right.abs();
        if l > r { l } else { r }
    }
}
