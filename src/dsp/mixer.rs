//! Channel strips: gain followed by an equal-power stereo panner.

use std::f64::consts::FRAC_PI_2;

/// A gain stage chained to a pan stage, fed by a mono source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelStrip {
    pub gain: f64,
    /// -1 (hard left) .. +1 (hard right).
    pan: f64,
    left: f64,
    right: f64,
}

impl ChannelStrip {
    pub fn new(gain: f64, pan: f64) -> Self {
        let mut strip = ChannelStrip {
            gain,
            pan: 0.0,
            left: 0.0,
            right: 0.0,
        };
        strip.set_pan(pan);
        strip
    }

    pub fn pan(&self) -> f64 {
        self.pan
    }

    pub fn set_pan(&mut self, pan: f64) {
        self.pan = pan.clamp(-1.0, 1.0);
        let (left, right) = equal_power(self.pan);
        self.left = left;
        self.right = right;
    }

    /// Apply gain only. This is where meter taps read.
    #[inline]
    pub fn gained(&self, input: f64) -> f64 {
        input * self.gain
    }

    /// Pan an already-gained mono sample into (left, right).
    #[inline]
    pub fn pan_sample(&self, gained: f64) -> (f64, f64) {
        (gained * self.left, gained * self.right)
    }
}

impl Default for ChannelStrip {
    fn default() -> Self {
        ChannelStrip::new(1.0, 0.0)
    }
}

/// Left/right gains for a mono source, as a stereo panner computes them.
pub fn equal_power(pan: f64) -> (f64, f64) {
    let x = (pan.clamp(-1.0, 1.0) + 1.0) / 2.0;
    ((x * FRAC_PI_2).cos(), (x * FRAC_PI_2).sin())
}

/// UI volume (0-100) to linear gain.
pub fn volume_to_gain(volume: u8) -> f64 {
    volume.min(100) as f64 / 100.0
}

/// UI pan (-50..+50) to panner position (-1..+1).
pub fn ui_pan_to_pan(pan: i8) -> f64 {
    (pan as f64 / 50.0).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_is_equal_power() {
        let (l, r) = equal_power(0.0);
        assert!((l - r).abs() < 1e-12);
        assert!((l * l + r * r - 1.0).abs() < 1e-12, "power should sum to 1");
    }

    #[test]
    fn hard_pans() {
        let (l, r) = equal_power(-1.0);
        assert!((l - 1.0).abs() < 1e-12 && r.abs() < 1e-12);
        let (l, r) = equal_power(1.0);
        assert!(l.abs() < 1e-12 && (r - 1.0).abs() < 1e-12);
    }

    #[test]
    fn strip_applies_gain_then_pan() {
        let strip = ChannelStrip::new(0.5, 1.0);
        let g = strip.gained(0.8);
        assert!((g - 0.4).abs() < 1e-12);
        let (l, r) = strip.pan_sample(g);
        assert!(l.abs() < 1e-12);
        assert!((r - 0.4).abs() < 1e-12);
    }

    #[test]
    fn ui_conversions() {
        assert_eq!(volume_to_gain(80), 0.8);
        assert_eq!(volume_to_gain(250), 1.0);
        assert_eq!(ui_pan_to_pan(-20), -0.4);
        assert_eq!(ui_pan_to_pan(50), 1.0);
        assert_eq!(ui_pan_to_pan(100), 1.0);
    }
}
