// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralLoupe — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! SpiralLoupe core: real-time Eulerian phase-based motion magnification.
//!
//! Subtle motion in a video stream — breathing, pulse, vibration — shifts
//! the phase of the frame's frequency-domain representation a little every
//! frame.  This crate transforms each luma plane with a 2D radix-2 FFT,
//! amplifies the per-bin phase delta against the previous frame (over the
//! whole spectrum or per radial frequency band), and re-synthesizes the
//! plane with the motion exaggerated.
//!
//! The numeric pipeline runs on a [`backend::MagnifyBackend`]; the
//! in-crate [`backend::CpuBackend`] is the reference implementation and
//! `sl-backend-wgpu` supplies the GPU rendition.  Hosts feed the session
//! canvas-sized, Hann-windowed luma planes (see [`canvas`]) and composite
//! the result back themselves.

pub mod backend;
pub mod canvas;
pub mod config;
pub mod error;
pub mod fft;
pub mod phase;
pub mod pyramid;
pub mod session;
pub mod spectral;

pub use backend::{CpuBackend, MagnifyBackend};
pub use canvas::CanvasDims;
pub use config::MagnifierConfig;
pub use error::{MagnifyError, Result};
pub use fft::Fft2d;
pub use phase::{BandpassGate, PhaseParams};
pub use pyramid::FilterBank;
pub use session::Magnifier;
