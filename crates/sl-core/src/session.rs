// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralLoupe — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Per-frame orchestration.
//!
//! A [`Magnifier`] owns the backend and all session state: the sanitized
//! config, a pending config update waiting for the next frame boundary,
//! and the previous frame's luma plane.  Frames are strictly sequential;
//! the previous-frame buffer commits only after the current frame's
//! pipeline has fully consumed it.

use ndarray::Array2;
use tracing::{debug, info, warn};

use crate::backend::{CpuBackend, MagnifyBackend};
use crate::canvas::CanvasDims;
use crate::config::MagnifierConfig;
use crate::error::{MagnifyError, Result};

pub struct Magnifier<B: MagnifyBackend> {
    backend: B,
    config: MagnifierConfig,
    pending: Option<MagnifierConfig>,
    previous: Option<Array2<f32>>,
    frame_index: u64,
}

impl Magnifier<CpuBackend> {
    /// Session over the reference CPU backend.
    pub fn with_cpu(dims: CanvasDims, config: MagnifierConfig) -> Result<Self> {
        Ok(Self::new(CpuBackend::new(dims)?, config))
    }
}

impl<B: MagnifyBackend> Magnifier<B> {
    pub fn new(backend: B, config: MagnifierConfig) -> Self {
        let config = config.sanitized();
        info!(
            canvas = backend.dims().width(),
            pyramid = config.use_pyramid,
            "magnification session ready"
        );
        Self {
            backend,
            config,
            pending: None,
            previous: None,
            frame_index: 0,
        }
    }

    pub fn dims(&self) -> CanvasDims {
        self.backend.dims()
    }

    pub fn config(&self) -> &MagnifierConfig {
        &self.config
    }

    /// Stages a config update.  It is clamped and applied at the next frame
    /// boundary, never mid-frame.
    pub fn set_config(&mut self, config: MagnifierConfig) {
        self.pending = Some(config.sanitized());
    }

    /// Processes one canvas-sized, windowed luma plane.
    ///
    /// The first frame seeds the previous-frame store and passes through
    /// unmodified.  A frame that fails is skipped: the input comes back
    /// untouched, the error is logged, and the next frame is attempted
    /// independently.
    pub fn process(&mut self, frame: &Array2<f32>) -> Array2<f32> {
        if let Some(next) = self.pending.take() {
            debug!("applying staged config at frame boundary");
            self.config = next;
        }
        self.frame_index += 1;
        match self.process_inner(frame) {
            Ok(out) => out,
            Err(err) => {
                warn!(frame = self.frame_index, %err, "frame skipped");
                frame.clone()
            }
        }
    }

    fn process_inner(&mut self, frame: &Array2<f32>) -> Result<Array2<f32>> {
        let dims = self.backend.dims();
        let (h, w) = frame.dim();
        if (w, h) != (dims.width(), dims.height()) {
            return Err(MagnifyError::FrameShape {
                got_width: w,
                got_height: h,
                canvas: dims.width(),
            });
        }

        // Debug views replace magnification for the frame but still commit
        // the previous-frame store.  Magnitude wins when both are set; the
        // original's split view was host compositing.
        if self.config.show_magnitude || self.config.show_phase {
            let view = if self.config.show_magnitude {
                self.backend.magnitude_view(frame)?
            } else {
                self.backend.phase_view(frame)?
            };
            self.previous = Some(frame.clone());
            return Ok(view);
        }

        let Some(previous) = self.previous.take() else {
            self.previous = Some(frame.clone());
            return Ok(frame.clone());
        };

        let result = if self.config.apply_magnification {
            self.backend.magnify(frame, &previous, &self.config)
        } else {
            Ok(frame.clone())
        };
        // Commits even when the frame fails: the next frame is magnified
        // against this one, not replayed against an older plane.
        self.previous = Some(frame.clone());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plane(n: usize, seed: f32) -> Array2<f32> {
        Array2::from_shape_fn((n, n), |(y, x)| {
            0.5 + 0.25 * ((x as f32 * 0.4 + seed).sin() * (y as f32 * 0.2).cos())
        })
    }

    #[test]
    fn first_frame_passes_through() {
        let mut session =
            Magnifier::with_cpu(CanvasDims::square(32).unwrap(), MagnifierConfig::default())
                .unwrap();
        let frame = plane(32, 0.0);
        let out = session.process(&frame);
        assert_eq!(out, frame);
    }

    #[test]
    fn mismatched_frame_is_skipped_not_fatal() {
        let mut session =
            Magnifier::with_cpu(CanvasDims::square(32).unwrap(), MagnifierConfig::default())
                .unwrap();
        let bad = plane(16, 0.0);
        let out = session.process(&bad);
        assert_eq!(out, bad);
        // The session keeps working afterwards.
        let good = plane(32, 0.0);
        let out = session.process(&good);
        assert_eq!(out.dim(), (32, 32));
    }

    /// Backend wrapper that fails a requested number of `magnify` calls
    /// before delegating to the CPU reference.
    struct FlakyBackend {
        inner: CpuBackend,
        failures_left: usize,
    }

    impl MagnifyBackend for FlakyBackend {
        fn dims(&self) -> CanvasDims {
            self.inner.dims()
        }

        fn magnify(
            &mut self,
            current: &Array2<f32>,
            previous: &Array2<f32>,
            config: &MagnifierConfig,
        ) -> crate::error::Result<Array2<f32>> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(crate::error::backend("injected failure"));
            }
            self.inner.magnify(current, previous, config)
        }

        fn magnitude_view(&mut self, current: &Array2<f32>) -> crate::error::Result<Array2<f32>> {
            self.inner.magnitude_view(current)
        }

        fn phase_view(&mut self, current: &Array2<f32>) -> crate::error::Result<Array2<f32>> {
            self.inner.phase_view(current)
        }
    }

    #[test]
    fn failed_frame_keeps_the_previous_store() {
        let backend = FlakyBackend {
            inner: CpuBackend::new(CanvasDims::square(32).unwrap()).unwrap(),
            failures_left: 1,
        };
        let mut session = Magnifier::new(backend, MagnifierConfig::default());
        let a = plane(32, 0.0);
        let b = plane(32, 1.0);
        let c = plane(32, 2.0);
        session.process(&a);
        // The injected failure skips this frame but must still commit it.
        let out = session.process(&b);
        assert_eq!(out, b);
        // The next frame magnifies against the skipped one instead of
        // degrading to a first-frame pass-through.
        let out = session.process(&c);
        assert_eq!(out.dim(), (32, 32));
        assert_ne!(out, c);
    }

    #[test]
    fn config_update_lands_on_the_next_frame() {
        let mut session =
            Magnifier::with_cpu(CanvasDims::square(32).unwrap(), MagnifierConfig::default())
                .unwrap();
        session.set_config(MagnifierConfig {
            phase_scale: -5.0,
            ..MagnifierConfig::default()
        });
        assert_eq!(session.config().phase_scale, 10.0);
        session.process(&plane(32, 0.0));
        // Applied and clamped at the boundary.
        assert_eq!(session.config().phase_scale, 0.0);
    }

    #[test]
    fn disabled_magnification_still_tracks_previous_frames() {
        let mut session = Magnifier::with_cpu(
            CanvasDims::square(32).unwrap(),
            MagnifierConfig {
                apply_magnification: false,
                ..MagnifierConfig::default()
            },
        )
        .unwrap();
        let a = plane(32, 0.0);
        let b = plane(32, 1.0);
        session.process(&a);
        let out = session.process(&b);
        assert_eq!(out, b);
        // Re-enabling magnifies against the tracked previous frame.
        session.set_config(MagnifierConfig::default());
        let c = plane(32, 2.0);
        let out = session.process(&c);
        assert_eq!(out.dim(), (32, 32));
        assert_ne!(out, c);
    }

    #[test]
    fn debug_views_take_over_when_enabled() {
        let mut session = Magnifier::with_cpu(
            CanvasDims::square(32).unwrap(),
            MagnifierConfig {
                show_phase: true,
                ..MagnifierConfig::default()
            },
        )
        .unwrap();
        let out = session.process(&plane(32, 0.0));
        assert!(out.iter().all(|v| (0.0..=1.0).contains(v)));
    }
}
