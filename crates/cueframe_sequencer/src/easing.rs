// SPDX-License-Identifier: MIT OR Apache-2.0
//! Easing curves used by frame actions.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Named easing curve.
///
/// Serialized with the camelCase names stored in frame annotations
/// (`"easeInCubic"`, `"linear"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Easing {
    /// Constant speed
    Linear,
    /// Quadratic ease in
    EaseInQuad,
    /// Quadratic ease out
    EaseOutQuad,
    /// Quadratic ease in and out
    EaseInOutQuad,
    /// Cubic ease in
    #[default]
    EaseInCubic,
    /// Cubic ease out
    EaseOutCubic,
    /// Cubic ease in and out
    EaseInOutCubic,
    /// Quartic ease in
    EaseInQuart,
    /// Quartic ease out
    EaseOutQuart,
    /// Quartic ease in and out
    EaseInOutQuart,
    /// Quintic ease in
    EaseInQuint,
    /// Quintic ease out
    EaseOutQuint,
    /// Quintic ease in and out
    EaseInOutQuint,
    /// Sine ease in
    EaseInSine,
    /// Sine ease out
    EaseOutSine,
    /// Sine ease in and out
    EaseInOutSine,
    /// Exponential ease in
    EaseInExpo,
    /// Exponential ease out
    EaseOutExpo,
    /// Exponential ease in and out
    EaseInOutExpo,
}

impl Easing {
    /// Every curve, in display order
    pub fn all() -> &'static [Easing] {
        &[
            Easing::Linear,
            Easing::EaseInQuad,
            Easing::EaseOutQuad,
            Easing::EaseInOutQuad,
            Easing::EaseInCubic,
            Easing::EaseOutCubic,
            Easing::EaseInOutCubic,
            Easing::EaseInQuart,
            Easing::EaseOutQuart,
            Easing::EaseInOutQuart,
            Easing::EaseInQuint,
            Easing::EaseOutQuint,
            Easing::EaseInOutQuint,
            Easing::EaseInSine,
            Easing::EaseOutSine,
            Easing::EaseInOutSine,
            Easing::EaseInExpo,
            Easing::EaseOutExpo,
            Easing::EaseInOutExpo,
        ]
    }

    /// Map linear progress `t` (clamped to `0.0..=1.0`) onto the curve.
    pub fn apply(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);

        match self {
            Easing::Linear => t,
            Easing::EaseInQuad => ease_in(t, 2),
            Easing::EaseOutQuad => ease_out(t, 2),
            Easing::EaseInOutQuad => ease_in_out(t, 2),
            Easing::EaseInCubic => ease_in(t, 3),
            Easing::EaseOutCubic => ease_out(t, 3),
            Easing::EaseInOutCubic => ease_in_out(t, 3),
            Easing::EaseInQuart => ease_in(t, 4),
            Easing::EaseOutQuart => ease_out(t, 4),
            Easing::EaseInOutQuart => ease_in_out(t, 4),
            Easing::EaseInQuint => ease_in(t, 5),
            Easing::EaseOutQuint => ease_out(t, 5),
            Easing::EaseInOutQuint => ease_in_out(t, 5),
            Easing::EaseInSine => 1.0 - (t * PI / 2.0).cos(),
            Easing::EaseOutSine => (t * PI / 2.0).sin(),
            Easing::EaseInOutSine => -((PI * t).cos() - 1.0) / 2.0,
            Easing::EaseInExpo => {
                if t == 0.0 {
                    0.0
                } else {
                    2.0_f64.powf(10.0 * t - 10.0)
                }
            }
            Easing::EaseOutExpo => {
                if t == 1.0 {
                    1.0
                } else {
                    1.0 - 2.0_f64.powf(-10.0 * t)
                }
            }
            Easing::EaseInOutExpo => ease_in_out_expo(t),
        }
    }
}

fn ease_in(t: f64, power: i32) -> f64 {
    t.powi(power)
}

fn ease_out(t: f64, power: i32) -> f64 {
    1.0 - (1.0 - t).powi(power)
}

fn ease_in_out(t: f64, power: i32) -> f64 {
    if t < 0.5 {
        2.0_f64.powi(power - 1) * t.powi(power)
    } else {
        1.0 - (-2.0 * t + 2.0).powi(power) / 2.0
    }
}

fn ease_in_out_expo(t: f64) -> f64 {
    if t == 0.0 || t == 1.0 {
        t
    } else if t < 0.5 {
        2.0_f64.powf(20.0 * t - 10.0) / 2.0
    } else {
        (2.0 - 2.0_f64.powf(-20.0 * t + 10.0)) / 2.0
    }
}
