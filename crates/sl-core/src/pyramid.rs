// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralLoupe — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Radial frequency-band decomposition.
//!
//! The filter bank partitions `[min_frequency, max_frequency]` into
//! `levels` radial masks.  Each mask is the difference of two smoothstep
//! edge ramps, so adjacent bands crossfade with complementary weights and
//! the band sum telescopes to `ramp(min) - ramp(max)`: unity gain across
//! the interior of the band range, by construction rather than by tuning.
//! The bank is regenerated only when its parameters change; frame
//! processing never observes a half-built bank.

use num_complex::Complex32;

use crate::canvas::CanvasDims;
use crate::spectral::{radial_frequency, smoothstep};

/// One scalar radial mask per pyramid level, each sized to the canvas.
pub struct FilterBank {
    levels: usize,
    min_frequency: f32,
    max_frequency: f32,
    dims: CanvasDims,
    masks: Vec<Vec<f32>>,
}

impl FilterBank {
    pub fn new(dims: CanvasDims, levels: usize, min_frequency: f32, max_frequency: f32) -> Self {
        let levels = levels.max(1);
        let band_width = (max_frequency - min_frequency) / levels as f32;
        // Crossfade half-width; a quarter band keeps adjacent ramps from
        // overlapping more than pairwise.
        let fade = 0.25 * band_width;

        let edge = |level: usize| min_frequency + band_width * level as f32;
        let masks = (0..levels)
            .map(|level| {
                let lo = edge(level);
                let hi = edge(level + 1);
                let mut mask = vec![0.0f32; dims.len()];
                for y in 0..dims.height() {
                    for x in 0..dims.width() {
                        let f = radial_frequency(x, y, dims.width(), dims.height());
                        let rise = smoothstep(lo - fade, lo + fade, f);
                        let fall = smoothstep(hi - fade, hi + fade, f);
                        mask[y * dims.width() + x] = rise - fall;
                    }
                }
                mask
            })
            .collect();

        Self {
            levels,
            min_frequency,
            max_frequency,
            dims,
            masks,
        }
    }

    /// True when the bank already matches the requested parameters, so the
    /// caller can skip regeneration.
    pub fn matches(&self, levels: usize, min_frequency: f32, max_frequency: f32) -> bool {
        self.levels == levels.max(1)
            && self.min_frequency == min_frequency
            && self.max_frequency == max_frequency
    }

    pub fn levels(&self) -> usize {
        self.levels
    }

    pub fn dims(&self) -> CanvasDims {
        self.dims
    }

    pub fn mask(&self, level: usize) -> &[f32] {
        &self.masks[level]
    }

    /// Sum of all masks at one bin; the unity-gain invariant under test.
    pub fn band_sum(&self, x: usize, y: usize) -> f32 {
        let idx = y * self.dims.width() + x;
        self.masks.iter().map(|m| m[idx]).sum()
    }
}

/// Isolates one band: multiplies every bin by the level's scalar mask.
pub fn apply_mask(spectrum: &[Complex32], mask: &[f32], out: &mut [Complex32]) {
    debug_assert_eq!(spectrum.len(), mask.len());
    for ((s, m), d) in spectrum.iter().zip(mask.iter()).zip(out.iter_mut()) {
        *d = s.scale(*m);
    }
}

pub fn zero_accumulator(acc: &mut [Complex32]) {
    acc.fill(Complex32::default());
}

/// Adds one processed band into the accumulator.  Accumulation order is
/// immaterial; all levels must land before inversion.
pub fn accumulate(acc: &mut [Complex32], band: &[Complex32]) {
    debug_assert_eq!(acc.len(), band.len());
    for (a, b) in acc.iter_mut().zip(band.iter()) {
        *a += b;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_bank() -> FilterBank {
        FilterBank::new(CanvasDims::square(128).unwrap(), 5, 0.05, 0.45)
    }

    #[test]
    fn band_sum_is_unity_across_the_interior() {
        let bank = default_bank();
        let dims = bank.dims();
        let band_width = (0.45 - 0.05) / 5.0;
        let fade = 0.25 * band_width;
        let mut checked = 0usize;
        for y in 0..dims.height() {
            for x in 0..dims.width() {
                let f = radial_frequency(x, y, dims.width(), dims.height());
                if f < 0.05 + fade || f > 0.45 - fade {
                    continue;
                }
                let sum = bank.band_sum(x, y);
                assert!((sum - 1.0).abs() < 1e-4, "f={f} sum={sum}");
                checked += 1;
            }
        }
        assert!(checked > 1000, "interior sample count {checked}");
    }

    #[test]
    fn masks_vanish_outside_the_band_range() {
        let bank = default_bank();
        let dims = bank.dims();
        // DC sits at the canvas center, far below min_frequency.
        let cx = dims.width() / 2;
        let cy = dims.height() / 2;
        assert!(bank.band_sum(cx, cy).abs() < 1e-4);
    }

    #[test]
    fn masks_are_nonnegative() {
        let bank = default_bank();
        for level in 0..bank.levels() {
            for (i, m) in bank.mask(level).iter().enumerate() {
                assert!(*m >= -1e-6, "level {level} bin {i}: {m}");
            }
        }
    }

    #[test]
    fn bank_matches_detects_parameter_change() {
        let bank = default_bank();
        assert!(bank.matches(5, 0.05, 0.45));
        assert!(!bank.matches(4, 0.05, 0.45));
        assert!(!bank.matches(5, 0.1, 0.45));
    }

    #[test]
    fn accumulating_all_bands_rebuilds_a_mid_band_spectrum() {
        let dims = CanvasDims::square(64).unwrap();
        let bank = FilterBank::new(dims, 5, 0.05, 0.45);
        // Energy concentrated where the bank has unity gain.
        let spectrum: Vec<Complex32> = (0..dims.len())
            .map(|i| {
                let (x, y) = (i % 64, i / 64);
                let f = radial_frequency(x, y, 64, 64);
                if f > 0.1 && f < 0.4 {
                    Complex32::new(1.0, -0.5)
                } else {
                    Complex32::default()
                }
            })
            .collect();
        let mut acc = vec![Complex32::default(); dims.len()];
        let mut band = vec![Complex32::default(); dims.len()];
        zero_accumulator(&mut acc);
        for level in 0..bank.levels() {
            apply_mask(&spectrum, bank.mask(level), &mut band);
            accumulate(&mut acc, &band);
        }
        for (i, (a, s)) in acc.iter().zip(spectrum.iter()).enumerate() {
            assert!((a - s).norm() < 1e-3, "bin {i}");
        }
    }
}
