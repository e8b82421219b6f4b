// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralLoupe — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Separable 2D radix-2 FFT over the processing canvas.
//!
//! The plan owns the bit-reversal and twiddle tables plus a pair of
//! ping-pong buffers.  Every pass reads one buffer and writes the other;
//! the parity flips after each pass, so no pass ever aliases its own
//! input — the same dispatch discipline the GPU backend must obey.
//!
//! The inverse transform reuses the forward machinery unchanged:
//! conjugate, forward passes, conjugate, scale by `width*height`, undo the
//! centering shift.  One butterfly implementation serves both directions,
//! at the cost of running the full pass list twice per frame.

use ndarray::Array2;
use num_complex::Complex32;

use crate::canvas::CanvasDims;
use crate::error::Result;
use crate::spectral;

pub struct Fft2d {
    dims: CanvasDims,
    bitrev: Vec<u32>,
    twiddles: Vec<Complex32>,
    ping: Vec<Complex32>,
    pong: Vec<Complex32>,
}

impl Fft2d {
    /// Builds a plan for the given canvas.  Table sizes follow the canvas
    /// side; the canvas is square, so one table pair serves both the row
    /// and the column passes.
    pub fn new(dims: CanvasDims) -> Result<Self> {
        let n = dims.width();
        Ok(Self {
            dims,
            bitrev: spectral::bit_reversal_indices(n),
            twiddles: spectral::twiddle_factors(n),
            ping: vec![Complex32::default(); dims.len()],
            pong: vec![Complex32::default(); dims.len()],
        })
    }

    pub fn dims(&self) -> CanvasDims {
        self.dims
    }

    /// Forward transform of a real canvas-sized plane into a centered
    /// complex spectrum.
    pub fn forward(&mut self, plane: &Array2<f32>) -> Vec<Complex32> {
        debug_assert_eq!(plane.dim(), (self.dims.height(), self.dims.width()));
        for (d, s) in self.ping.iter_mut().zip(plane.iter()) {
            *d = Complex32::new(*s, 0.0);
        }
        spectral::center(&self.ping, &mut self.pong, self.dims.width());
        self.swap();
        self.run_passes();
        self.ping.clone()
    }

    /// Inverse transform of a centered complex spectrum back to a real
    /// plane, via the double-conjugate trick.
    pub fn inverse(&mut self, spectrum: &[Complex32]) -> Array2<f32> {
        debug_assert_eq!(spectrum.len(), self.dims.len());
        spectral::conjugate(spectrum, &mut self.ping);
        self.run_passes();
        spectral::conjugate(&self.ping, &mut self.pong);
        self.swap();
        spectral::scale_by_dimensions(
            &self.ping,
            &mut self.pong,
            self.dims.width(),
            self.dims.height(),
        );
        self.swap();
        spectral::center(&self.ping, &mut self.pong, self.dims.width());
        self.swap();
        let (h, w) = (self.dims.height(), self.dims.width());
        Array2::from_shape_fn((h, w), |(y, x)| self.ping[y * w + x].re)
    }

    /// Row permute, row butterflies, column permute, column butterflies.
    /// Input and output both live in `ping`.
    fn run_passes(&mut self) {
        let w = self.dims.width();
        let h = self.dims.height();

        bitrev_rows(&self.ping, &mut self.pong, &self.bitrev, w, h);
        self.swap();
        let mut stride = 2;
        while stride <= w {
            butterfly_rows(&self.ping, &mut self.pong, &self.twiddles, w, h, stride);
            self.swap();
            stride <<= 1;
        }

        bitrev_cols(&self.ping, &mut self.pong, &self.bitrev, w, h);
        self.swap();
        stride = 2;
        while stride <= h {
            butterfly_cols(&self.ping, &mut self.pong, &self.twiddles, w, h, stride);
            self.swap();
            stride <<= 1;
        }
    }

    #[inline]
    fn swap(&mut self) {
        std::mem::swap(&mut self.ping, &mut self.pong);
    }
}

fn bitrev_rows(src: &[Complex32], dst: &mut [Complex32], bitrev: &[u32], w: usize, h: usize) {
    for y in 0..h {
        let row = y * w;
        for x in 0..w {
            dst[row + x] = src[row + bitrev[x] as usize];
        }
    }
}

fn bitrev_cols(src: &[Complex32], dst: &mut [Complex32], bitrev: &[u32], w: usize, h: usize) {
    for y in 0..h {
        let from = bitrev[y] as usize * w;
        let to = y * w;
        for x in 0..w {
            dst[to + x] = src[from + x];
        }
    }
}

/// One butterfly pass along rows at the given section size.  Gather form:
/// each output bin reads its two inputs from `src`, so the pass
/// parallelizes over all `w*h` bins with no intra-pass ordering.
fn butterfly_rows(
    src: &[Complex32],
    dst: &mut [Complex32],
    twiddles: &[Complex32],
    w: usize,
    h: usize,
    stride: usize,
) {
    let half = stride / 2;
    let tw_step = w / stride;
    for y in 0..h {
        let row = y * w;
        for x in 0..w {
            let k = x & (stride - 1);
            dst[row + x] = if k < half {
                let a = src[row + x];
                let b = src[row + x + half];
                a + twiddles[k * tw_step] * b
            } else {
                let a = src[row + x - half];
                let b = src[row + x];
                a - twiddles[(k - half) * tw_step] * b
            };
        }
    }
}

fn butterfly_cols(
    src: &[Complex32],
    dst: &mut [Complex32],
    twiddles: &[Complex32],
    w: usize,
    h: usize,
    stride: usize,
) {
    let half = stride / 2;
    let tw_step = h / stride;
    for y in 0..h {
        let k = y & (stride - 1);
        for x in 0..w {
            dst[y * w + x] = if k < half {
                let a = src[y * w + x];
                let b = src[(y + half) * w + x];
                a + twiddles[k * tw_step] * b
            } else {
                let a = src[(y - half) * w + x];
                let b = src[y * w + x];
                a - twiddles[(k - half) * tw_step] * b
            };
        }
    }
}
