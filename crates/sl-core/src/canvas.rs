// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralLoupe — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Host-boundary geometry and color helpers.
//!
//! The numeric core only ever sees canvas-sized luma planes.  These helpers
//! are the core's side of that boundary: power-of-two canvas sizing,
//! centered pad/crop, the Hann edge taper (a required precondition for the
//! FFT, not an option), YIQ conversion, and the post-inverse anti-alias
//! blur.  Frame acquisition and display stay with the caller.

use ndarray::{Array2, Array3};

use crate::error::{MagnifyError, Result};

/// Square, power-of-two processing canvas.  Fixed for the lifetime of a
/// session; a resolution change requires a new session (new tables, new
/// buffers).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanvasDims {
    width: usize,
    height: usize,
}

impl CanvasDims {
    /// Validates a square power-of-two canvas.
    pub fn square(size: usize) -> Result<Self> {
        if size < 2 || !size.is_power_of_two() {
            return Err(MagnifyError::Canvas {
                width: size,
                height: size,
            });
        }
        Ok(Self {
            width: size,
            height: size,
        })
    }

    /// Canvas for a source frame: the next power of two covering the larger
    /// frame dimension.
    pub fn for_frame(frame_width: usize, frame_height: usize) -> Result<Self> {
        let size = frame_width.max(frame_height).max(2).next_power_of_two();
        Self::square(size)
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Bin count of one canvas-sized plane.
    #[inline]
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Zero-pads a frame-sized plane into the center of the canvas.
pub fn pad_to_canvas(plane: &Array2<f32>, dims: CanvasDims) -> Array2<f32> {
    let (h, w) = plane.dim();
    let top = (dims.height() - h.min(dims.height())) / 2;
    let left = (dims.width() - w.min(dims.width())) / 2;
    let mut padded = Array2::zeros((dims.height(), dims.width()));
    for y in 0..h.min(dims.height()) {
        for x in 0..w.min(dims.width()) {
            padded[[top + y, left + x]] = plane[[y, x]];
        }
    }
    padded
}

/// Recovers the centered frame-sized region from a canvas-sized plane.
pub fn crop_from_canvas(plane: &Array2<f32>, frame_width: usize, frame_height: usize) -> Array2<f32> {
    let (ch, cw) = plane.dim();
    let top = (ch - frame_height.min(ch)) / 2;
    let left = (cw - frame_width.min(cw)) / 2;
    let mut out = Array2::zeros((frame_height.min(ch), frame_width.min(cw)));
    for ((y, x), v) in out.indexed_iter_mut() {
        *v = plane[[top + y, left + x]];
    }
    out
}

/// Separable Hann taper.  Damps the padding boundary so the transform does
/// not smear leakage energy across the whole spectrum.
pub fn apply_window(plane: &mut Array2<f32>) {
    let (h, w) = plane.dim();
    let row = hann(w);
    let col = hann(h);
    for ((y, x), v) in plane.indexed_iter_mut() {
        *v *= row[x] * col[y];
    }
}

fn hann(n: usize) -> Vec<f32> {
    use core::f32::consts::TAU;
    (0..n)
        .map(|i| 0.5 * (1.0 - (TAU * i as f32 / (n as f32 - 1.0)).cos()))
        .collect()
}

/// Two-pass 3-tap binomial blur, the post-inverse anti-alias step.
pub fn anti_alias(plane: &Array2<f32>) -> Array2<f32> {
    let (h, w) = plane.dim();
    let tap = |a: f32, b: f32, c: f32| 0.25 * a + 0.5 * b + 0.25 * c;
    let mut horiz = Array2::zeros((h, w));
    for y in 0..h {
        for x in 0..w {
            let xm = x.saturating_sub(1);
            let xp = (x + 1).min(w - 1);
            horiz[[y, x]] = tap(plane[[y, xm]], plane[[y, x]], plane[[y, xp]]);
        }
    }
    let mut out = Array2::zeros((h, w));
    for y in 0..h {
        let ym = y.saturating_sub(1);
        let yp = (y + 1).min(h - 1);
        for x in 0..w {
            out[[y, x]] = tap(horiz[[ym, x]], horiz[[y, x]], horiz[[yp, x]]);
        }
    }
    out
}

/// NTSC YIQ conversion.  Only the Y plane enters the numeric pipeline; the
/// chroma planes ride along untouched and are recombined afterwards.
#[inline]
pub fn rgb_to_yiq(rgb: [f32; 3]) -> [f32; 3] {
    let [r, g, b] = rgb;
    [
        0.299 * r + 0.587 * g + 0.114 * b,
        0.596 * r - 0.274 * g - 0.322 * b,
        0.211 * r - 0.523 * g + 0.312 * b,
    ]
}

#[inline]
pub fn yiq_to_rgb(yiq: [f32; 3]) -> [f32; 3] {
    let [y, i, q] = yiq;
    [
        y + 0.956 * i + 0.621 * q,
        y - 0.272 * i - 0.647 * q,
        y - 1.106 * i + 1.703 * q,
    ]
}

/// Splits an RGB image (`height × width × 3`) into a luma plane and the
/// passthrough chroma planes.
pub fn extract_luma(rgb: &Array3<f32>) -> (Array2<f32>, Array3<f32>) {
    let (h, w, _) = rgb.dim();
    let mut luma = Array2::zeros((h, w));
    let mut chroma = Array3::zeros((h, w, 2));
    for y in 0..h {
        for x in 0..w {
            let yiq = rgb_to_yiq([rgb[[y, x, 0]], rgb[[y, x, 1]], rgb[[y, x, 2]]]);
            luma[[y, x]] = yiq[0];
            chroma[[y, x, 0]] = yiq[1];
            chroma[[y, x, 1]] = yiq[2];
        }
    }
    (luma, chroma)
}

/// Recombines a processed luma plane with stored chroma, with per-channel
/// output multipliers.
pub fn combine_luma(
    luma: &Array2<f32>,
    chroma: &Array3<f32>,
    multipliers: [f32; 3],
) -> Array3<f32> {
    let (h, w) = luma.dim();
    let mut rgb = Array3::zeros((h, w, 3));
    for y in 0..h {
        for x in 0..w {
            let yiq = [
                luma[[y, x]] * multipliers[0],
                chroma[[y, x, 0]] * multipliers[1],
                chroma[[y, x, 1]] * multipliers[2],
            ];
            let px = yiq_to_rgb(yiq);
            for c in 0..3 {
                rgb[[y, x, c]] = px[c];
            }
        }
    }
    rgb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canvas_rejects_non_power_of_two() {
        assert!(CanvasDims::square(96).is_err());
        assert!(CanvasDims::square(0).is_err());
        assert!(CanvasDims::square(128).is_ok());
    }

    #[test]
    fn canvas_covers_the_larger_frame_dimension() {
        let dims = CanvasDims::for_frame(640, 480).unwrap();
        assert_eq!(dims.width(), 1024);
        assert_eq!(dims.height(), 1024);
    }

    #[test]
    fn pad_then_crop_is_identity() {
        let mut plane = Array2::zeros((5, 7));
        for ((y, x), v) in plane.indexed_iter_mut() {
            *v = (y * 7 + x) as f32;
        }
        let dims = CanvasDims::square(16).unwrap();
        let padded = pad_to_canvas(&plane, dims);
        let cropped = crop_from_canvas(&padded, 7, 5);
        assert_eq!(plane, cropped);
    }

    #[test]
    fn window_tapers_the_boundary() {
        let mut plane = Array2::from_elem((32, 32), 1.0);
        apply_window(&mut plane);
        assert!(plane[[0, 0]].abs() < 1e-6);
        assert!(plane[[16, 16]] > 0.9);
    }

    #[test]
    fn yiq_roundtrip_recovers_rgb() {
        for rgb in [[0.2f32, 0.5, 0.8], [1.0, 0.0, 0.0], [0.3, 0.3, 0.3]] {
            let back = yiq_to_rgb(rgb_to_yiq(rgb));
            for c in 0..3 {
                assert!((back[c] - rgb[c]).abs() < 5e-3, "{rgb:?} -> {back:?}");
            }
        }
    }
}
