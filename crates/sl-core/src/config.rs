// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralLoupe — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use serde::{Deserialize, Serialize};

/// Tunable parameters for a magnification session.
///
/// These are creative controls, not correctness-critical inputs: out-of-range
/// values are clamped by [`MagnifierConfig::sanitized`] rather than rejected.
/// Updates handed to a running session take effect on the next frame
/// boundary, never mid-frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MagnifierConfig {
    /// Master toggle.  When off, frames pass through untouched while the
    /// previous-frame store keeps updating.
    pub apply_magnification: bool,
    /// Process per radial frequency band instead of the whole spectrum.
    pub use_pyramid: bool,
    /// Number of radial bands in pyramid mode.
    pub pyramid_levels: usize,
    /// Lower bound of the pyramid band range (cycles/pixel).
    pub min_frequency: f32,
    /// Upper bound of the pyramid band range (cycles/pixel).
    pub max_frequency: f32,
    /// Phase-delta amplification factor.  Typically 1–50.
    pub phase_scale: f32,
    /// Bins whose magnitude falls below this are left untouched, so
    /// near-zero-energy noise is never amplified.
    pub magnitude_threshold: f32,
    /// Multiplier applied to output bin magnitudes.
    pub magnitude_scale: f32,
    /// Gate the phase delta by radial frequency (whole-spectrum mode only).
    pub apply_bandpass: bool,
    pub low_frequency_cutoff: f32,
    pub high_frequency_cutoff: f32,
    /// Sharpness of the bandpass gate edges.
    pub filter_steepness: f32,
    /// Extra gain on the amplified delta.
    pub motion_sensitivity: f32,
    /// Boost amplification where the spectral magnitude gradient is strong.
    pub enhance_edges: bool,
    pub edge_enhancement: f32,
    /// Debug: render the current spectrum's log magnitude instead of
    /// magnifying.
    pub show_magnitude: bool,
    /// Debug: render the current spectrum's phase instead of magnifying.
    pub show_phase: bool,
}

impl Default for MagnifierConfig {
    fn default() -> Self {
        Self {
            apply_magnification: true,
            use_pyramid: true,
            pyramid_levels: 5,
            min_frequency: 0.05,
            max_frequency: 0.45,
            phase_scale: 10.0,
            magnitude_threshold: 0.01,
            magnitude_scale: 1.0,
            apply_bandpass: true,
            low_frequency_cutoff: 0.05,
            high_frequency_cutoff: 0.4,
            filter_steepness: 3.0,
            motion_sensitivity: 1.5,
            enhance_edges: true,
            edge_enhancement: 0.8,
            show_magnitude: false,
            show_phase: false,
        }
    }
}

impl MagnifierConfig {
    /// Returns a copy with every parameter clamped to its documented range.
    pub fn sanitized(&self) -> Self {
        let mut cfg = self.clone();
        cfg.pyramid_levels = cfg.pyramid_levels.max(1);
        // Each frequency pair stays strictly ordered: the lower bound stops
        // one epsilon short of the ceiling, and the upper bound is raised
        // above it with `max`/`min` rather than `clamp`, whose bounds would
        // cross (and panic) when the lower value sits at the top of its
        // range.
        cfg.min_frequency = cfg.min_frequency.clamp(1e-3, 0.5 - 1e-3);
        cfg.max_frequency = cfg.max_frequency.max(cfg.min_frequency + 1e-3).min(0.5);
        cfg.phase_scale = cfg.phase_scale.max(0.0);
        cfg.magnitude_threshold = cfg.magnitude_threshold.max(0.0);
        cfg.magnitude_scale = cfg.magnitude_scale.max(0.0);
        cfg.low_frequency_cutoff = cfg.low_frequency_cutoff.clamp(0.0, 1.0 - 1e-3);
        cfg.high_frequency_cutoff = cfg
            .high_frequency_cutoff
            .max(cfg.low_frequency_cutoff + 1e-3)
            .min(1.0);
        cfg.filter_steepness = cfg.filter_steepness.clamp(0.5, 10.0);
        cfg.motion_sensitivity = cfg.motion_sensitivity.clamp(0.5, 3.0);
        cfg.edge_enhancement = cfg.edge_enhancement.clamp(0.0, 2.0);
        cfg
    }

    /// Effective edge boost: zero when the toggle is off.
    pub fn edge_gain(&self) -> f32 {
        if self.enhance_edges {
            self.edge_enhancement
        } else {
            0.0
        }
    }
}
