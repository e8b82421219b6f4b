// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralLoupe — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Per-bin phase-difference amplification.
//!
//! Each output bin keeps the current bin's magnitude and rotates its phase
//! by the amplified, wrapped phase delta against the previous frame.  Bins
//! with near-zero energy are passed through untouched so noise never gets
//! amplified, and identical input planes are a per-bin fixed point.

use num_complex::Complex32;

use crate::config::MagnifierConfig;
use crate::spectral::{radial_frequency, smoothstep, wrap_phase};

/// Radial bandpass gate: the product of a rising and a falling smoothstep
/// ramp.  Each ramp's half-width is `cutoff / steepness`, so larger
/// steepness sharpens the transition proportionally to where it sits.
#[derive(Clone, Copy, Debug)]
pub struct BandpassGate {
    pub low: f32,
    pub high: f32,
    pub steepness: f32,
}

impl BandpassGate {
    pub fn from_config(config: &MagnifierConfig) -> Option<Self> {
        config.apply_bandpass.then_some(Self {
            low: config.low_frequency_cutoff,
            high: config.high_frequency_cutoff,
            steepness: config.filter_steepness,
        })
    }

    /// Gate value in `[0, 1]` for a normalized radial frequency.
    pub fn evaluate(&self, f: f32) -> f32 {
        let rise = {
            let w = self.low / self.steepness;
            smoothstep(self.low - w, self.low + w, f)
        };
        let fall = {
            let w = self.high / self.steepness;
            1.0 - smoothstep(self.high - w, self.high + w, f)
        };
        rise * fall
    }
}

/// Parameter snapshot consumed by the per-bin kernel.  Derived from the
/// sanitized session config once per frame.
#[derive(Clone, Copy, Debug)]
pub struct PhaseParams {
    pub phase_scale: f32,
    pub magnitude_threshold: f32,
    pub magnitude_scale: f32,
    pub motion_sensitivity: f32,
    pub edge_enhancement: f32,
    pub gate: Option<BandpassGate>,
}

impl PhaseParams {
    pub fn from_config(config: &MagnifierConfig) -> Self {
        Self {
            phase_scale: config.phase_scale,
            magnitude_threshold: config.magnitude_threshold,
            magnitude_scale: config.magnitude_scale,
            motion_sensitivity: config.motion_sensitivity,
            edge_enhancement: config.edge_gain(),
            gate: BandpassGate::from_config(config),
        }
    }

    /// Band-local variant used by the pyramid path: the mask already
    /// isolated the band, so the radial gate is dropped and the level hook
    /// scales amplification (uniform today, see `level_gain`).
    pub fn for_level(config: &MagnifierConfig, level: usize, total_levels: usize) -> Self {
        Self {
            phase_scale: config.phase_scale * level_gain(level, total_levels),
            gate: None,
            ..Self::from_config(config)
        }
    }
}

/// Level-dependent amplification policy hook.  The kernel always receives
/// the pair, so a non-uniform policy is a one-line change here.
#[inline]
pub fn level_gain(_level: usize, _total_levels: usize) -> f32 {
    1.0
}

/// Amplifies the phase delta of `current` against `previous` into `out`.
/// All three spectra are row-major `width × height` centered spectra.
pub fn amplify(
    current: &[Complex32],
    previous: &[Complex32],
    out: &mut [Complex32],
    width: usize,
    height: usize,
    params: &PhaseParams,
) {
    debug_assert_eq!(current.len(), width * height);
    debug_assert_eq!(previous.len(), current.len());
    debug_assert_eq!(out.len(), current.len());

    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            let cur = current[idx];
            let mag = cur.norm();
            if mag < params.magnitude_threshold {
                out[idx] = cur;
                continue;
            }

            let delta = wrap_phase(cur.arg() - previous[idx].arg());
            let gate = match params.gate {
                Some(gate) => gate.evaluate(radial_frequency(x, y, width, height)),
                None => 1.0,
            };
            let edge = if params.edge_enhancement > 0.0 {
                1.0 + params.edge_enhancement * magnitude_gradient(current, x, y, width, height, mag)
            } else {
                1.0
            };

            let amplified = delta * params.phase_scale * gate * params.motion_sensitivity * edge;
            out[idx] =
                Complex32::from_polar(mag * params.magnitude_scale, cur.arg() + amplified);
        }
    }
}

/// Normalized local spectral magnitude gradient in `[0, 1]`, from clamped
/// central differences.  Feeds the edge-enhancement boost.
fn magnitude_gradient(
    spectrum: &[Complex32],
    x: usize,
    y: usize,
    width: usize,
    height: usize,
    mag: f32,
) -> f32 {
    let at = |xx: usize, yy: usize| spectrum[yy * width + xx].norm();
    let xm = x.saturating_sub(1);
    let xp = (x + 1).min(width - 1);
    let ym = y.saturating_sub(1);
    let yp = (y + 1).min(height - 1);
    let grad = (at(xp, y) - at(xm, y)).abs() + (at(x, yp) - at(x, ym)).abs();
    (grad / (mag + 1e-6)).min(1.0)
}
