// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralLoupe — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! The compute seam between the orchestrator and a parallel backend.
//!
//! A backend owns every canvas-sized resource a frame needs (FFT tables,
//! ping-pong buffers, the pyramid filter bank) and turns a pair of luma
//! planes into the magnified plane.  [`CpuBackend`] is the reference
//! implementation; `sl-backend-wgpu` provides the GPU rendition behind the
//! same trait and must match it within floating-point tolerance.

use ndarray::Array2;
use num_complex::Complex32;
use tracing::debug;

use crate::canvas::CanvasDims;
use crate::config::MagnifierConfig;
use crate::error::Result;
use crate::fft::Fft2d;
use crate::phase::{self, PhaseParams};
use crate::pyramid::{self, FilterBank};
use crate::spectral;

pub trait MagnifyBackend {
    fn dims(&self) -> CanvasDims;

    /// Runs the full numeric pipeline for one frame: forward transforms of
    /// both planes, phase amplification (whole-spectrum or per-band), and
    /// the inverse transform.  Inputs are canvas-sized, windowed luma
    /// planes; the config is already sanitized.
    fn magnify(
        &mut self,
        current: &Array2<f32>,
        previous: &Array2<f32>,
        config: &MagnifierConfig,
    ) -> Result<Array2<f32>>;

    /// Log-magnitude view of the current frame's spectrum.
    fn magnitude_view(&mut self, current: &Array2<f32>) -> Result<Array2<f32>>;

    /// Phase view of the current frame's spectrum, mapped to `[0, 1]`.
    fn phase_view(&mut self, current: &Array2<f32>) -> Result<Array2<f32>>;
}

pub struct CpuBackend {
    fft: Fft2d,
    bank: Option<FilterBank>,
    band_cur: Vec<Complex32>,
    band_prev: Vec<Complex32>,
    band_out: Vec<Complex32>,
    accumulator: Vec<Complex32>,
}

impl CpuBackend {
    pub fn new(dims: CanvasDims) -> Result<Self> {
        Ok(Self {
            fft: Fft2d::new(dims)?,
            bank: None,
            band_cur: vec![Complex32::default(); dims.len()],
            band_prev: vec![Complex32::default(); dims.len()],
            band_out: vec![Complex32::default(); dims.len()],
            accumulator: vec![Complex32::default(); dims.len()],
        })
    }

    /// Regenerates the filter bank when its parameters changed.  Runs
    /// between frames only, so a frame never reads a half-built bank.
    fn ensure_bank(&mut self, config: &MagnifierConfig) {
        let needs_rebuild = !self
            .bank
            .as_ref()
            .is_some_and(|bank| {
                bank.matches(
                    config.pyramid_levels,
                    config.min_frequency,
                    config.max_frequency,
                )
            });
        if needs_rebuild {
            debug!(
                levels = config.pyramid_levels,
                min = config.min_frequency,
                max = config.max_frequency,
                "regenerating pyramid filter bank"
            );
            self.bank = Some(FilterBank::new(
                self.fft.dims(),
                config.pyramid_levels,
                config.min_frequency,
                config.max_frequency,
            ));
        }
    }

    fn magnify_whole_spectrum(
        &mut self,
        current: &[Complex32],
        previous: &[Complex32],
        config: &MagnifierConfig,
    ) -> Array2<f32> {
        let dims = self.fft.dims();
        let params = PhaseParams::from_config(config);
        phase::amplify(
            current,
            previous,
            &mut self.band_out,
            dims.width(),
            dims.height(),
            &params,
        );
        self.fft.inverse(&self.band_out)
    }

    fn magnify_pyramid(
        &mut self,
        current: &[Complex32],
        previous: &[Complex32],
        config: &MagnifierConfig,
    ) -> Array2<f32> {
        let dims = self.fft.dims();
        self.ensure_bank(config);
        let bank = self.bank.as_ref().expect("bank built above");
        let total = bank.levels();

        pyramid::zero_accumulator(&mut self.accumulator);
        for level in 0..total {
            pyramid::apply_mask(current, bank.mask(level), &mut self.band_cur);
            pyramid::apply_mask(previous, bank.mask(level), &mut self.band_prev);
            let params = PhaseParams::for_level(config, level, total);
            phase::amplify(
                &self.band_cur,
                &self.band_prev,
                &mut self.band_out,
                dims.width(),
                dims.height(),
                &params,
            );
            pyramid::accumulate(&mut self.accumulator, &self.band_out);
        }
        self.fft.inverse(&self.accumulator)
    }
}

impl MagnifyBackend for CpuBackend {
    fn dims(&self) -> CanvasDims {
        self.fft.dims()
    }

    fn magnify(
        &mut self,
        current: &Array2<f32>,
        previous: &Array2<f32>,
        config: &MagnifierConfig,
    ) -> Result<Array2<f32>> {
        let cur_spectrum = self.fft.forward(current);
        let prev_spectrum = self.fft.forward(previous);
        let plane = if config.use_pyramid {
            self.magnify_pyramid(&cur_spectrum, &prev_spectrum, config)
        } else {
            self.magnify_whole_spectrum(&cur_spectrum, &prev_spectrum, config)
        };
        Ok(plane)
    }

    fn magnitude_view(&mut self, current: &Array2<f32>) -> Result<Array2<f32>> {
        let dims = self.fft.dims();
        let spectrum = self.fft.forward(current);
        let mut plane = vec![0.0f32; dims.len()];
        spectral::magnitude_scaled(&spectrum, &mut plane, dims.width(), dims.height());
        Ok(Array2::from_shape_vec((dims.height(), dims.width()), plane)
            .expect("canvas-sized plane"))
    }

    fn phase_view(&mut self, current: &Array2<f32>) -> Result<Array2<f32>> {
        let dims = self.fft.dims();
        let spectrum = self.fft.forward(current);
        let mut plane = vec![0.0f32; dims.len()];
        spectral::phase(&spectrum, &mut plane);
        Ok(Array2::from_shape_vec((dims.height(), dims.width()), plane)
            .expect("canvas-sized plane"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn textured_plane(n: usize) -> Array2<f32> {
        Array2::from_shape_fn((n, n), |(y, x)| {
            0.5 + 0.3 * ((x as f32 * 0.7).sin() * (y as f32 * 0.3).cos())
        })
    }

    #[test]
    fn zero_motion_is_idempotent_whole_spectrum() {
        let dims = CanvasDims::square(64).unwrap();
        let mut backend = CpuBackend::new(dims).unwrap();
        let plane = textured_plane(64);
        let config = MagnifierConfig {
            use_pyramid: false,
            ..MagnifierConfig::default()
        };
        let out = backend.magnify(&plane, &plane, &config).unwrap();
        let max_err = plane
            .iter()
            .zip(out.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max);
        assert!(max_err < 1e-3, "max abs error {max_err}");
    }

    #[test]
    fn pyramid_zero_motion_keeps_in_band_content() {
        // With identical frames the pyramid path reduces to masking and
        // re-summing; the unity band sum must hand back in-band energy
        // unchanged while stripping what lies outside [min, max].
        let dims = CanvasDims::square(64).unwrap();
        let mut backend = CpuBackend::new(dims).unwrap();
        // A pure spatial tone inside the default band range.
        let plane = Array2::from_shape_fn((64, 64), |(_, x)| {
            0.3 * (core::f32::consts::TAU * x as f32 / 8.0).sin()
        });
        let config = MagnifierConfig::default();
        let out = backend.magnify(&plane, &plane, &config).unwrap();
        let max_err = plane
            .iter()
            .zip(out.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max);
        assert!(max_err < 2e-2, "max abs error {max_err}");
    }

    #[test]
    fn magnitude_view_is_canvas_sized_and_finite() {
        let dims = CanvasDims::square(32).unwrap();
        let mut backend = CpuBackend::new(dims).unwrap();
        let view = backend.magnitude_view(&textured_plane(32)).unwrap();
        assert_eq!(view.dim(), (32, 32));
        assert!(view.iter().all(|v| v.is_finite() && *v >= 0.0));
    }
}
