// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralLoupe — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Bin-wise spectral primitives shared by both compute backends.
//!
//! Every kernel here is a stateless out-of-place map over a row-major
//! complex buffer, written in the same gather form as the WGSL entry points
//! in `sl-backend-wgpu` so the two renditions stay line-for-line
//! comparable.  The index and twiddle tables are computed once per session
//! and reused by rows, columns, forward and inverse passes alike.

use core::f32::consts::{PI, TAU};

use num_complex::Complex32;

/// Bit-reversal permutation table for a power-of-two length `n`.
///
/// Entry `i` holds `i` with its low `log2(n)` bits reversed.  Panics on a
/// non-power-of-two length; that is a programmer error, not a runtime
/// condition (canvas sizing is validated at session initialization).
pub fn bit_reversal_indices(n: usize) -> Vec<u32> {
    assert!(n.is_power_of_two(), "bit reversal table needs a power of two");
    let bits = n.trailing_zeros();
    (0..n)
        .map(|i| (i.reverse_bits() >> (usize::BITS - bits)) as u32)
        .collect()
}

/// Twiddle table for a length-`n` radix-2 transform: `n/2` unit-magnitude
/// values, entry `k` at angle `-2πk/n`.  The inverse transform reuses the
/// same table through explicit conjugation passes.
pub fn twiddle_factors(n: usize) -> Vec<Complex32> {
    assert!(n.is_power_of_two(), "twiddle table needs a power of two");
    (0..n / 2)
        .map(|k| {
            let angle = -TAU * k as f32 / n as f32;
            Complex32::new(angle.cos(), angle.sin())
        })
        .collect()
}

/// Multiplies the sample at `(x, y)` by `(-1)^(x+y)`, moving the DC bin to
/// the canvas center.  Involution: the inverse path applies it again to
/// undo the shift.
pub fn center(src: &[Complex32], dst: &mut [Complex32], width: usize) {
    for (idx, (s, d)) in src.iter().zip(dst.iter_mut()).enumerate() {
        let parity = (idx % width + idx / width) & 1;
        *d = if parity == 1 { -*s } else { *s };
    }
}

pub fn conjugate(src: &[Complex32], dst: &mut [Complex32]) {
    for (s, d) in src.iter().zip(dst.iter_mut()) {
        *d = s.conj();
    }
}

/// Restores inverse-FFT amplitude after the double-conjugate forward trick.
pub fn scale_by_dimensions(src: &[Complex32], dst: &mut [Complex32], width: usize, height: usize) {
    let scale = 1.0 / (width * height) as f32;
    for (s, d) in src.iter().zip(dst.iter_mut()) {
        *d = s.scale(scale);
    }
}

/// Per-bin magnitude.  Diagnostic only; the numeric path never leaves the
/// complex domain between forward and inverse transforms.
pub fn magnitude(src: &[Complex32], dst: &mut [f32]) {
    for (s, d) in src.iter().zip(dst.iter_mut()) {
        *d = s.norm();
    }
}

/// Per-bin phase mapped from `(-π, π]` to `[0, 1]` for display.
pub fn phase(src: &[Complex32], dst: &mut [f32]) {
    for (s, d) in src.iter().zip(dst.iter_mut()) {
        *d = (s.arg() + PI) / TAU;
    }
}

/// Log-scaled magnitude so the heavy-tailed spectrum is visible when
/// rendered as an image.
pub fn magnitude_scaled(src: &[Complex32], dst: &mut [f32], width: usize, height: usize) {
    let norm = 1.0 / ((width * height) as f32).ln();
    for (s, d) in src.iter().zip(dst.iter_mut()) {
        *d = (1.0 + s.norm()).ln() * norm;
    }
}

/// Normalized radial frequency of bin `(x, y)` in a centered spectrum.
/// Zero at the canvas center, 0.5 at the horizontal/vertical Nyquist edge.
#[inline]
pub fn radial_frequency(x: usize, y: usize, width: usize, height: usize) -> f32 {
    let fx = (x as f32 - width as f32 / 2.0) / width as f32;
    let fy = (y as f32 - height as f32 / 2.0) / height as f32;
    (fx * fx + fy * fy).sqrt()
}

/// Wraps a phase difference into `(-π, π]`.
#[inline]
pub fn wrap_phase(delta: f32) -> f32 {
    let wrapped = delta - TAU * (delta / TAU).round();
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Hermite smoothstep, clamped outside `[edge0, edge1]`.
#[inline]
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_reversal_is_an_involution() {
        for n in [8usize, 64, 256, 1024] {
            let table = bit_reversal_indices(n);
            for i in 0..n {
                assert_eq!(table[table[i] as usize] as usize, i, "n={n} i={i}");
            }
        }
    }

    #[test]
    fn twiddles_have_unit_magnitude_and_fixed_sign() {
        let tw = twiddle_factors(64);
        assert_eq!(tw.len(), 32);
        for (k, t) in tw.iter().enumerate() {
            assert!((t.norm() - 1.0).abs() < 1e-6);
            // Negative angles rotate clockwise: imaginary part <= 0 on the
            // first half turn.
            assert!(t.im <= 1e-6, "k={k}");
        }
    }

    #[test]
    fn center_twice_is_identity() {
        let src: Vec<Complex32> = (0..64)
            .map(|i| Complex32::new(i as f32, -(i as f32)))
            .collect();
        let mut once = vec![Complex32::default(); 64];
        let mut twice = vec![Complex32::default(); 64];
        center(&src, &mut once, 8);
        center(&once, &mut twice, 8);
        assert_eq!(src, twice);
    }

    #[test]
    fn wrap_phase_stays_in_half_open_interval() {
        for raw in [-7.0f32, -PI, -0.1, 0.0, 0.1, PI, 7.0, 100.0] {
            let w = wrap_phase(raw);
            assert!(w > -PI && w <= PI + 1e-6, "raw={raw} wrapped={w}");
        }
        assert!((wrap_phase(TAU + 0.25) - 0.25).abs() < 1e-5);
        assert!((wrap_phase(-TAU - 0.25) + 0.25).abs() < 1e-5);
    }

    #[test]
    fn radial_frequency_is_zero_at_center() {
        assert!(radial_frequency(32, 32, 64, 64).abs() < 1e-6);
        assert!((radial_frequency(0, 32, 64, 64) - 0.5).abs() < 1e-6);
    }
}
