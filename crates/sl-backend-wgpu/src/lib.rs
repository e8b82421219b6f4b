// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralLoupe — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! WGPU compute backend.
//!
//! Implements [`sl_core::MagnifyBackend`] by replaying the CPU pipeline as a
//! sequence of compute dispatches over ping-pong storage buffers: per frame
//! the host builds a dispatch plan (forward transforms, phase amplification,
//! inverse transform), encodes it into one command buffer, and reads the
//! magnified plane back through a staging buffer.  Lookup tables and pyramid
//! masks are computed on the CPU with the `sl-core` primitives and uploaded
//! once, so both backends share the exact same constants.

use std::panic::{catch_unwind, AssertUnwindSafe};

use bytemuck::{cast_slice, Pod, Zeroable};
use ndarray::Array2;
use pollster::block_on;
use thiserror::Error;
use tracing::debug;
use wgpu::util::DeviceExt;

use sl_core::canvas::CanvasDims;
use sl_core::config::MagnifierConfig;
use sl_core::error::{self, MagnifyError};
use sl_core::phase::level_gain;
use sl_core::pyramid::FilterBank;
use sl_core::spectral::{bit_reversal_indices, twiddle_factors};
use sl_core::MagnifyBackend;

const WGSL_SOURCE: &str = include_str!("shaders/magnify.wgsl");
const WORKGROUP: u32 = 16;
const PARAMS_STRIDE: u64 = 256;
const PARAMS_SIZE: u64 = std::mem::size_of::<KernelParams>() as u64;

#[derive(Clone, Debug, Error)]
pub enum GpuError {
    #[error("no compatible WGPU adapter was found")]
    NoAdapter,
    #[error("failed to acquire WGPU device: {0}")]
    RequestDevice(String),
    #[error("failed to compile magnification WGSL shader: {0}")]
    Shader(String),
    #[error("failed to map GPU buffer for readback")]
    Map,
}

impl From<GpuError> for MagnifyError {
    fn from(err: GpuError) -> Self {
        match err {
            GpuError::NoAdapter => error::unavailable("no compatible WGPU adapter was found"),
            other => error::backend(other.to_string()),
        }
    }
}

/// Uniform block shared by every kernel.  Must stay layout-identical to
/// `Params` in `shaders/magnify.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct KernelParams {
    width: u32,
    height: u32,
    stride: u32,
    mask_offset: u32,
    phase_scale: f32,
    magnitude_threshold: f32,
    magnitude_scale: f32,
    motion_sensitivity: f32,
    low_cutoff: f32,
    high_cutoff: f32,
    steepness: f32,
    edge_enhancement: f32,
    apply_bandpass: u32,
    _pad: [u32; 3],
}

impl KernelParams {
    fn for_dims(dims: CanvasDims) -> Self {
        let mut params = Self::zeroed();
        params.width = dims.width() as u32;
        params.height = dims.height() as u32;
        params
    }

    fn phase(dims: CanvasDims, config: &MagnifierConfig, gain: f32, bandpass: bool) -> Self {
        Self {
            phase_scale: config.phase_scale * gain,
            magnitude_threshold: config.magnitude_threshold,
            magnitude_scale: config.magnitude_scale,
            motion_sensitivity: config.motion_sensitivity,
            low_cutoff: config.low_frequency_cutoff,
            high_cutoff: config.high_frequency_cutoff,
            steepness: config.filter_steepness,
            edge_enhancement: config.edge_gain(),
            apply_bandpass: bandpass as u32,
            ..Self::for_dims(dims)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kernel {
    RealToComplex,
    CenterComplex,
    ConjugateComplex,
    ScaleComplex,
    BitrevRows,
    BitrevCols,
    ButterflyRows,
    ButterflyCols,
    PhaseDifference,
    ApplyFilter,
    ZeroComplex,
    Accumulate,
    ComplexToReal,
    ComplexToMagnitude,
    ComplexToPhase,
}

const KERNELS: [(Kernel, &str); 15] = [
    (Kernel::RealToComplex, "real_to_complex"),
    (Kernel::CenterComplex, "center_complex"),
    (Kernel::ConjugateComplex, "conjugate_complex"),
    (Kernel::ScaleComplex, "scale_complex"),
    (Kernel::BitrevRows, "bitrev_rows"),
    (Kernel::BitrevCols, "bitrev_cols"),
    (Kernel::ButterflyRows, "butterfly_rows"),
    (Kernel::ButterflyCols, "butterfly_cols"),
    (Kernel::PhaseDifference, "phase_difference"),
    (Kernel::ApplyFilter, "apply_filter"),
    (Kernel::ZeroComplex, "zero_complex"),
    (Kernel::Accumulate, "accumulate"),
    (Kernel::ComplexToReal, "complex_to_real"),
    (Kernel::ComplexToMagnitude, "complex_to_magnitude"),
    (Kernel::ComplexToPhase, "complex_to_phase"),
];

/// Names for the backend-owned buffers, so a dispatch plan can be built as
/// plain data before any buffer is borrowed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Buf {
    PlaneCur,
    PlanePrev,
    CurA,
    CurB,
    PrevA,
    PrevB,
    BandCur,
    BandPrev,
    BandOut,
    Acc,
    Bitrev,
    Twiddles,
    Masks,
    OutReal,
    DummyRead,
    DummyWrite,
}

/// One compute dispatch: a kernel plus the buffers bound to each slot.
/// Slots a kernel does not touch stay on the dummy buffers.
#[derive(Clone, Copy)]
struct Dispatch {
    kernel: Kernel,
    src_c: Buf,
    dst_c: Buf,
    aux_c: Buf,
    indices: Buf,
    scalars: Buf,
    dst_r: Buf,
    params: KernelParams,
}

impl Dispatch {
    fn new(kernel: Kernel, params: KernelParams) -> Self {
        Self {
            kernel,
            src_c: Buf::DummyRead,
            dst_c: Buf::DummyWrite,
            aux_c: Buf::DummyRead,
            indices: Buf::DummyRead,
            scalars: Buf::DummyRead,
            dst_r: Buf::DummyWrite,
            params,
        }
    }

    fn src(mut self, buf: Buf) -> Self {
        self.src_c = buf;
        self
    }

    fn dst(mut self, buf: Buf) -> Self {
        self.dst_c = buf;
        self
    }

    fn aux(mut self, buf: Buf) -> Self {
        self.aux_c = buf;
        self
    }

    fn indices(mut self, buf: Buf) -> Self {
        self.indices = buf;
        self
    }

    fn scalars(mut self, buf: Buf) -> Self {
        self.scalars = buf;
        self
    }

    fn real(mut self, buf: Buf) -> Self {
        self.dst_r = buf;
        self
    }
}

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    layout: wgpu::BindGroupLayout,
    pipelines: Vec<wgpu::ComputePipeline>,
    dims: CanvasDims,
    plane_cur: wgpu::Buffer,
    plane_prev: wgpu::Buffer,
    cur_a: wgpu::Buffer,
    cur_b: wgpu::Buffer,
    prev_a: wgpu::Buffer,
    prev_b: wgpu::Buffer,
    band_cur: wgpu::Buffer,
    band_prev: wgpu::Buffer,
    band_out: wgpu::Buffer,
    acc: wgpu::Buffer,
    bitrev: wgpu::Buffer,
    twiddles: wgpu::Buffer,
    masks: Option<wgpu::Buffer>,
    mask_key: Option<(usize, f32, f32)>,
    out_real: wgpu::Buffer,
    staging: wgpu::Buffer,
    dummy_read: wgpu::Buffer,
    dummy_write: wgpu::Buffer,
    params_arena: wgpu::Buffer,
    params_capacity: usize,
}

impl WgpuBackend {
    pub fn new(dims: CanvasDims) -> Result<Self, GpuError> {
        let instance = wgpu::Instance::default();
        let adapter = block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))
            .ok_or(GpuError::NoAdapter)?;
        let (device, queue) =
            block_on(adapter.request_device(&wgpu::DeviceDescriptor::default(), None))
                .map_err(|err| GpuError::RequestDevice(err.to_string()))?;

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sl.magnify.layout"),
            entries: &[
                storage_entry(0, true),
                storage_entry(1, false),
                storage_entry(2, true),
                storage_entry(3, true),
                storage_entry(4, true),
                storage_entry(5, false),
                wgpu::BindGroupLayoutEntry {
                    binding: 6,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sl.magnify.pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let shader = catch_unwind(AssertUnwindSafe(|| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("sl.magnify.shader"),
                source: wgpu::ShaderSource::Wgsl(WGSL_SOURCE.into()),
            })
        }))
        .map_err(|payload| GpuError::Shader(panic_payload_to_string(payload)))?;

        let pipelines = KERNELS
            .iter()
            .map(|&(_, entry_point)| {
                device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(entry_point),
                    layout: Some(&pipeline_layout),
                    module: &shader,
                    entry_point,
                    compilation_options: Default::default(),
                })
            })
            .collect();

        let n = dims.len();
        let complex_bytes = (n * 8) as u64;
        let real_bytes = (n * 4) as u64;
        let complex = |label: &str| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: complex_bytes,
                usage: wgpu::BufferUsages::STORAGE,
                mapped_at_creation: false,
            })
        };

        let indices = bit_reversal_indices(dims.width());
        let twiddle_data: Vec<f32> = twiddle_factors(dims.width())
            .iter()
            .flat_map(|tw| [tw.re, tw.im])
            .collect();

        let backend = Self {
            layout,
            pipelines,
            dims,
            plane_cur: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("sl.magnify.plane_cur"),
                size: real_bytes,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
            plane_prev: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("sl.magnify.plane_prev"),
                size: real_bytes,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
            cur_a: complex("sl.magnify.cur_a"),
            cur_b: complex("sl.magnify.cur_b"),
            prev_a: complex("sl.magnify.prev_a"),
            prev_b: complex("sl.magnify.prev_b"),
            band_cur: complex("sl.magnify.band_cur"),
            band_prev: complex("sl.magnify.band_prev"),
            band_out: complex("sl.magnify.band_out"),
            acc: complex("sl.magnify.acc"),
            bitrev: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("sl.magnify.bitrev"),
                contents: cast_slice(&indices),
                usage: wgpu::BufferUsages::STORAGE,
            }),
            twiddles: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("sl.magnify.twiddles"),
                contents: cast_slice(&twiddle_data),
                usage: wgpu::BufferUsages::STORAGE,
            }),
            masks: None,
            mask_key: None,
            out_real: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("sl.magnify.out_real"),
                size: real_bytes,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            }),
            staging: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("sl.magnify.staging"),
                size: real_bytes,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            }),
            dummy_read: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("sl.magnify.dummy_read"),
                size: 16,
                usage: wgpu::BufferUsages::STORAGE,
                mapped_at_creation: false,
            }),
            dummy_write: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("sl.magnify.dummy_write"),
                size: 16,
                usage: wgpu::BufferUsages::STORAGE,
                mapped_at_creation: false,
            }),
            params_arena: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("sl.magnify.params"),
                size: 64 * PARAMS_STRIDE,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
            params_capacity: 64,
            device,
            queue,
        };
        debug!(
            width = dims.width(),
            height = dims.height(),
            "wgpu magnification backend ready"
        );
        Ok(backend)
    }

    fn buffer(&self, buf: Buf) -> &wgpu::Buffer {
        match buf {
            Buf::PlaneCur => &self.plane_cur,
            Buf::PlanePrev => &self.plane_prev,
            Buf::CurA => &self.cur_a,
            Buf::CurB => &self.cur_b,
            Buf::PrevA => &self.prev_a,
            Buf::PrevB => &self.prev_b,
            Buf::BandCur => &self.band_cur,
            Buf::BandPrev => &self.band_prev,
            Buf::BandOut => &self.band_out,
            Buf::Acc => &self.acc,
            Buf::Bitrev => &self.bitrev,
            Buf::Twiddles => &self.twiddles,
            Buf::Masks => self.masks.as_ref().unwrap_or(&self.dummy_read),
            Buf::OutReal => &self.out_real,
            Buf::DummyRead => &self.dummy_read,
            Buf::DummyWrite => &self.dummy_write,
        }
    }

    /// Re-uploads the concatenated pyramid masks when the bank parameters
    /// changed since the previous frame.
    fn ensure_masks(&mut self, config: &MagnifierConfig) {
        let key = (
            config.pyramid_levels,
            config.min_frequency,
            config.max_frequency,
        );
        if self.mask_key == Some(key) {
            return;
        }
        debug!(
            levels = key.0,
            min = key.1,
            max = key.2,
            "uploading pyramid filter bank"
        );
        let bank = FilterBank::new(self.dims, key.0, key.1, key.2);
        let mut data = Vec::with_capacity(self.dims.len() * bank.levels());
        for level in 0..bank.levels() {
            data.extend_from_slice(bank.mask(level));
        }
        self.masks = Some(self.device.create_buffer_init(
            &wgpu::util::BufferInitDescriptor {
                label: Some("sl.magnify.masks"),
                contents: cast_slice(&data),
                usage: wgpu::BufferUsages::STORAGE,
            },
        ));
        self.mask_key = Some(key);
    }

    fn ensure_params_capacity(&mut self, count: usize) {
        if count <= self.params_capacity {
            return;
        }
        let capacity = count.next_power_of_two();
        self.params_arena = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sl.magnify.params"),
            size: capacity as u64 * PARAMS_STRIDE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.params_capacity = capacity;
    }

    /// Forward FFT of a real plane: widen, center, then the row and column
    /// bit-reversal/butterfly passes, ping-ponging between `a` and `b`.
    /// Returns the buffer the spectrum ends up in.
    fn plan_forward(&self, plan: &mut Vec<Dispatch>, plane: Buf, a: Buf, b: Buf) -> Buf {
        let base = KernelParams::for_dims(self.dims);
        plan.push(Dispatch::new(Kernel::RealToComplex, base).scalars(plane).dst(a));
        let (mut src, mut dst) = (a, b);
        plan.push(Dispatch::new(Kernel::CenterComplex, base).src(src).dst(dst));
        std::mem::swap(&mut src, &mut dst);
        self.plan_passes(plan, &mut src, &mut dst);
        src
    }

    /// The shared forward-machinery passes, exactly as the CPU transform
    /// runs them: row permutation, row butterflies with doubling strides,
    /// then the same over columns.
    fn plan_passes(&self, plan: &mut Vec<Dispatch>, src: &mut Buf, dst: &mut Buf) {
        let base = KernelParams::for_dims(self.dims);
        plan.push(
            Dispatch::new(Kernel::BitrevRows, base)
                .src(*src)
                .dst(*dst)
                .indices(Buf::Bitrev),
        );
        std::mem::swap(src, dst);
        let mut stride = 2;
        while stride <= self.dims.width() {
            let params = KernelParams {
                stride: stride as u32,
                ..base
            };
            plan.push(
                Dispatch::new(Kernel::ButterflyRows, params)
                    .src(*src)
                    .dst(*dst)
                    .aux(Buf::Twiddles),
            );
            std::mem::swap(src, dst);
            stride *= 2;
        }
        plan.push(
            Dispatch::new(Kernel::BitrevCols, base)
                .src(*src)
                .dst(*dst)
                .indices(Buf::Bitrev),
        );
        std::mem::swap(src, dst);
        stride = 2;
        while stride <= self.dims.height() {
            let params = KernelParams {
                stride: stride as u32,
                ..base
            };
            plan.push(
                Dispatch::new(Kernel::ButterflyCols, params)
                    .src(*src)
                    .dst(*dst)
                    .aux(Buf::Twiddles),
            );
            std::mem::swap(src, dst);
            stride *= 2;
        }
    }

    /// Inverse FFT via the double-conjugate trick, ending in a real plane
    /// written to `OutReal`.
    fn plan_inverse(&self, plan: &mut Vec<Dispatch>, spectrum: Buf, a: Buf, b: Buf) {
        let base = KernelParams::for_dims(self.dims);
        plan.push(Dispatch::new(Kernel::ConjugateComplex, base).src(spectrum).dst(a));
        let (mut src, mut dst) = (a, b);
        self.plan_passes(plan, &mut src, &mut dst);
        plan.push(Dispatch::new(Kernel::ConjugateComplex, base).src(src).dst(dst));
        std::mem::swap(&mut src, &mut dst);
        plan.push(Dispatch::new(Kernel::ScaleComplex, base).src(src).dst(dst));
        std::mem::swap(&mut src, &mut dst);
        plan.push(Dispatch::new(Kernel::CenterComplex, base).src(src).dst(dst));
        std::mem::swap(&mut src, &mut dst);
        plan.push(Dispatch::new(Kernel::ComplexToReal, base).src(src).real(Buf::OutReal));
    }

    fn plan_magnify(&self, config: &MagnifierConfig) -> Vec<Dispatch> {
        let mut plan = Vec::new();
        let cur = self.plan_forward(&mut plan, Buf::PlaneCur, Buf::CurA, Buf::CurB);
        let prev = self.plan_forward(&mut plan, Buf::PlanePrev, Buf::PrevA, Buf::PrevB);

        let spectrum = if config.use_pyramid {
            let base = KernelParams::for_dims(self.dims);
            let total = config.pyramid_levels;
            plan.push(Dispatch::new(Kernel::ZeroComplex, base).dst(Buf::Acc));
            for level in 0..total {
                let mask = KernelParams {
                    mask_offset: (level * self.dims.len()) as u32,
                    ..base
                };
                plan.push(
                    Dispatch::new(Kernel::ApplyFilter, mask)
                        .src(cur)
                        .dst(Buf::BandCur)
                        .scalars(Buf::Masks),
                );
                plan.push(
                    Dispatch::new(Kernel::ApplyFilter, mask)
                        .src(prev)
                        .dst(Buf::BandPrev)
                        .scalars(Buf::Masks),
                );
                // The mask already isolated the band, so the radial gate is
                // dropped here, matching the CPU per-level parameters.
                let params =
                    KernelParams::phase(self.dims, config, level_gain(level, total), false);
                plan.push(
                    Dispatch::new(Kernel::PhaseDifference, params)
                        .src(Buf::BandCur)
                        .aux(Buf::BandPrev)
                        .dst(Buf::BandOut),
                );
                plan.push(Dispatch::new(Kernel::Accumulate, base).src(Buf::BandOut).dst(Buf::Acc));
            }
            Buf::Acc
        } else {
            let params = KernelParams::phase(self.dims, config, 1.0, config.apply_bandpass);
            plan.push(
                Dispatch::new(Kernel::PhaseDifference, params)
                    .src(cur)
                    .aux(prev)
                    .dst(Buf::BandOut),
            );
            Buf::BandOut
        };

        self.plan_inverse(&mut plan, spectrum, Buf::CurA, Buf::CurB);
        plan
    }

    fn upload_plane(&self, buf: Buf, plane: &Array2<f32>) {
        let data: Vec<f32> = plane.iter().copied().collect();
        self.queue.write_buffer(self.buffer(buf), 0, cast_slice(&data));
    }

    /// Encodes the plan into one command buffer, submits it, and reads the
    /// real output plane back through the staging buffer.
    fn execute(&mut self, plan: &[Dispatch]) -> Result<Vec<f32>, GpuError> {
        self.ensure_params_capacity(plan.len());
        for (i, dispatch) in plan.iter().enumerate() {
            self.queue.write_buffer(
                &self.params_arena,
                i as u64 * PARAMS_STRIDE,
                cast_slice(&[dispatch.params]),
            );
        }

        let bind_groups: Vec<wgpu::BindGroup> = plan
            .iter()
            .enumerate()
            .map(|(i, dispatch)| {
                self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: None,
                    layout: &self.layout,
                    entries: &[
                        bind(0, self.buffer(dispatch.src_c)),
                        bind(1, self.buffer(dispatch.dst_c)),
                        bind(2, self.buffer(dispatch.aux_c)),
                        bind(3, self.buffer(dispatch.indices)),
                        bind(4, self.buffer(dispatch.scalars)),
                        bind(5, self.buffer(dispatch.dst_r)),
                        wgpu::BindGroupEntry {
                            binding: 6,
                            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                                buffer: &self.params_arena,
                                offset: i as u64 * PARAMS_STRIDE,
                                size: wgpu::BufferSize::new(PARAMS_SIZE),
                            }),
                        },
                    ],
                })
            })
            .collect();

        let groups_x = (self.dims.width() as u32).div_ceil(WORKGROUP);
        let groups_y = (self.dims.height() as u32).div_ceil(WORKGROUP);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("sl.magnify.encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("sl.magnify.pass"),
                timestamp_writes: None,
            });
            for (dispatch, bind_group) in plan.iter().zip(bind_groups.iter()) {
                pass.set_pipeline(&self.pipelines[dispatch.kernel as usize]);
                pass.set_bind_group(0, bind_group, &[]);
                pass.dispatch_workgroups(groups_x, groups_y, 1);
            }
        }
        let out_bytes = (self.dims.len() * 4) as u64;
        encoder.copy_buffer_to_buffer(&self.out_real, 0, &self.staging, 0, out_bytes);
        self.queue.submit(Some(encoder.finish()));

        let slice = self.staging.slice(0..out_bytes);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = sender.send(res);
        });
        self.device.poll(wgpu::Maintain::Wait);
        receiver.recv().map_err(|_| GpuError::Map)?.map_err(|_| GpuError::Map)?;
        let data = slice.get_mapped_range();
        let plane: Vec<f32> = cast_slice(&data).to_vec();
        drop(data);
        self.staging.unmap();
        Ok(plane)
    }

    fn readback_to_plane(&mut self, plan: &[Dispatch]) -> Result<Array2<f32>, GpuError> {
        let plane = self.execute(plan)?;
        let dims = self.dims;
        Ok(
            Array2::from_shape_vec((dims.height(), dims.width()), plane)
                .expect("staging buffer is canvas-sized"),
        )
    }

    fn spectrum_view(&mut self, current: &Array2<f32>, kernel: Kernel) -> Result<Array2<f32>, GpuError> {
        self.upload_plane(Buf::PlaneCur, current);
        let mut plan = Vec::new();
        let spectrum = self.plan_forward(&mut plan, Buf::PlaneCur, Buf::CurA, Buf::CurB);
        plan.push(
            Dispatch::new(kernel, KernelParams::for_dims(self.dims))
                .src(spectrum)
                .real(Buf::OutReal),
        );
        self.readback_to_plane(&plan)
    }
}

impl MagnifyBackend for WgpuBackend {
    fn dims(&self) -> CanvasDims {
        self.dims
    }

    fn magnify(
        &mut self,
        current: &Array2<f32>,
        previous: &Array2<f32>,
        config: &MagnifierConfig,
    ) -> sl_core::Result<Array2<f32>> {
        if config.use_pyramid {
            self.ensure_masks(config);
        }
        self.upload_plane(Buf::PlaneCur, current);
        self.upload_plane(Buf::PlanePrev, previous);
        let plan = self.plan_magnify(config);
        Ok(self.readback_to_plane(&plan)?)
    }

    fn magnitude_view(&mut self, current: &Array2<f32>) -> sl_core::Result<Array2<f32>> {
        Ok(self.spectrum_view(current, Kernel::ComplexToMagnitude)?)
    }

    fn phase_view(&mut self, current: &Array2<f32>) -> sl_core::Result<Array2<f32>> {
        Ok(self.spectrum_view(current, Kernel::ComplexToPhase)?)
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn bind(binding: u32, buffer: &wgpu::Buffer) -> wgpu::BindGroupEntry<'_> {
    wgpu::BindGroupEntry {
        binding,
        resource: buffer.as_entire_binding(),
    }
}

fn panic_payload_to_string(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown shader compilation panic".to_string()
    }
}
