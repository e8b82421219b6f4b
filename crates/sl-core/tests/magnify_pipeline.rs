// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)

//! Pipeline-level scenarios over synthetic luma sequences.

use core::f32::consts::TAU;

use ndarray::Array2;
use sl_core::{canvas, CanvasDims, Magnifier, MagnifierConfig};

const SIZE: usize = 64;
const FRAMES: usize = 14;

/// A horizontal tone (period 8 px) whose position oscillates sub-pixel
/// around rest: the kind of subtle periodic motion the magnifier exists to
/// exaggerate.
fn oscillating_frame(t: usize) -> Array2<f32> {
    let displacement = 0.25 * (TAU * t as f32 / 10.0).sin();
    let mut plane = Array2::from_shape_fn((SIZE, SIZE), |(_, x)| {
        0.5 + 0.2 * (TAU * (x as f32 + displacement) / 8.0).sin()
    });
    canvas::apply_window(&mut plane);
    plane
}

fn run_sequence(config: MagnifierConfig) -> Vec<Array2<f32>> {
    let mut session = Magnifier::with_cpu(CanvasDims::square(SIZE).unwrap(), config).unwrap();
    (0..FRAMES)
        .map(|t| session.process(&oscillating_frame(t)))
        .skip(2)
        .collect()
}

/// Mean over interior pixels of the temporal standard deviation.
fn temporal_oscillation(outputs: &[Array2<f32>]) -> f32 {
    let lo = SIZE / 2 - 8;
    let hi = SIZE / 2 + 8;
    let n = outputs.len() as f32;
    let mut total = 0.0;
    let mut count = 0usize;
    for y in lo..hi {
        for x in lo..hi {
            let mean: f32 = outputs.iter().map(|o| o[[y, x]]).sum::<f32>() / n;
            let var: f32 = outputs
                .iter()
                .map(|o| (o[[y, x]] - mean).powi(2))
                .sum::<f32>()
                / n;
            total += var.sqrt();
            count += 1;
        }
    }
    total / count as f32
}

fn config_with_scale(phase_scale: f32) -> MagnifierConfig {
    MagnifierConfig {
        use_pyramid: false,
        phase_scale,
        motion_sensitivity: 1.0,
        enhance_edges: false,
        ..MagnifierConfig::default()
    }
}

#[test]
fn amplification_grows_monotonically_with_phase_scale() {
    let baseline = temporal_oscillation(&run_sequence(config_with_scale(0.0)));
    let gentle = temporal_oscillation(&run_sequence(config_with_scale(2.0)));
    let strong = temporal_oscillation(&run_sequence(config_with_scale(6.0)));

    assert!(
        gentle > 1.5 * baseline,
        "gentle {gentle} vs baseline {baseline}"
    );
    assert!(strong > gentle, "strong {strong} vs gentle {gentle}");
}

#[test]
fn pyramid_mode_also_amplifies_the_oscillation() {
    let baseline = temporal_oscillation(&run_sequence(config_with_scale(0.0)));
    let pyramid = temporal_oscillation(&run_sequence(MagnifierConfig {
        use_pyramid: true,
        phase_scale: 6.0,
        motion_sensitivity: 1.0,
        enhance_edges: false,
        ..MagnifierConfig::default()
    }));
    assert!(pyramid > 1.5 * baseline, "pyramid {pyramid} vs {baseline}");
}

#[test]
fn zero_motion_sequence_reconstructs_the_input() {
    let mut frame = Array2::from_shape_fn((SIZE, SIZE), |(y, x)| {
        0.5 + 0.3 * ((x as f32 * 0.6).sin() * (y as f32 * 0.35).cos())
    });
    canvas::apply_window(&mut frame);

    let mut session = Magnifier::with_cpu(
        CanvasDims::square(SIZE).unwrap(),
        config_with_scale(10.0),
    )
    .unwrap();
    session.process(&frame);
    let out = session.process(&frame);
    let max_err = frame
        .iter()
        .zip(out.iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0f32, f32::max);
    assert!(max_err < 1e-3, "max abs error {max_err}");
}
