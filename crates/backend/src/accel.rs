//! Compute-device execution of the morphology kernels via wgpu.
//!
//! The packed word buffer is uploaded once per call, both front classes are
//! dispatched inside a single command encoder, and the words are read back
//! and swapped into the volume. The shader reproduces the host tile layout
//! bit for bit, so a device pass and a CPU pass are interchangeable.

use std::sync::{mpsc, Arc};

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use porovox_core::volume::{FrontSets, Offset3, PackedVolume};
use porovox_core::{Error, Result};

use crate::MorphologyBackend;

const MORPHOLOGY_SHADER: &str = include_str!("shaders/morphology.wgsl");
const WORKGROUP_SIZE: u32 = 64;
const MAX_GROUPS_PER_DIM: u32 = 65_535;

/// Owns a device/queue pair so several backends can share one adapter.
#[derive(Clone, Debug)]
pub struct WgpuContext {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
}

impl WgpuContext {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self { device, queue }
    }

    /// Request the highest-performance adapter available on this machine.
    pub fn request() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| Error::Accelerator("no compatible compute adapter found".into()))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("porovox.morphology.device"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter.limits(),
            },
            None,
        ))
        .map_err(|err| Error::Accelerator(format!("device request failed: {err}")))?;

        Ok(Self::new(Arc::new(device), Arc::new(queue)))
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}

/// Uniform block shared by both kernel entry points.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct KernelParams {
    width: i32,
    height: i32,
    depth: i32,
    tiles_x: i32,
    tiles_y: i32,
    front_len: u32,
    offset_len: u32,
    pad: u32,
}

/// Morphology backend that dispatches the packed-word kernels on a compute
/// device. Construct it with an explicit [`WgpuContext`] so the caller
/// controls adapter selection and context lifetime.
pub struct WgpuBackend {
    context: Arc<WgpuContext>,
    dilate_pipeline: wgpu::ComputePipeline,
    erode_pipeline: wgpu::ComputePipeline,
}

impl WgpuBackend {
    pub fn new(context: Arc<WgpuContext>) -> Result<Self> {
        let device = context.device();
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("porovox.morphology.shader"),
            source: wgpu::ShaderSource::Wgsl(MORPHOLOGY_SHADER.into()),
        });
        let dilate_pipeline = build_pipeline(device, &module, "dilate_main");
        let erode_pipeline = build_pipeline(device, &module, "erode_main");
        Ok(Self {
            context,
            dilate_pipeline,
            erode_pipeline,
        })
    }

    pub fn context(&self) -> &Arc<WgpuContext> {
        &self.context
    }

    fn run(
        &self,
        pipeline: &wgpu::ComputePipeline,
        volume: &mut PackedVolume,
        passes: [(&[u32], &[Offset3]); 2],
    ) -> Result<()> {
        let live: Vec<&(&[u32], &[Offset3])> = passes
            .iter()
            .filter(|(list, offsets)| !list.is_empty() && !offsets.is_empty())
            .collect();
        if live.is_empty() {
            return Ok(());
        }

        let dims = volume.dims();
        let (tiles_x, tiles_y, _) = dims.tiles();
        let device = self.context.device();
        let word_bytes = std::mem::size_of_val(volume.words()) as u64;

        let words = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("porovox.morphology.words"),
            contents: bytemuck::cast_slice(volume.words()),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        });
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("porovox.morphology.readback"),
            size: word_bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // Bind groups hold the per-pass buffers alive past this loop.
        let mut dispatches = Vec::with_capacity(live.len());
        for (list, offsets) in live {
            let fronts = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("porovox.morphology.fronts"),
                contents: bytemuck::cast_slice(list),
                usage: wgpu::BufferUsages::STORAGE,
            });
            let quads: Vec<[i32; 4]> = offsets.iter().map(|o| [o.dx, o.dy, o.dz, 0]).collect();
            let offsets_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("porovox.morphology.offsets"),
                contents: bytemuck::cast_slice(&quads),
                usage: wgpu::BufferUsages::STORAGE,
            });
            let params = KernelParams {
                width: dims.width,
                height: dims.height,
                depth: dims.depth,
                tiles_x,
                tiles_y,
                front_len: list.len() as u32,
                offset_len: offsets.len() as u32,
                pad: 0,
            };
            let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("porovox.morphology.params"),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM,
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("porovox.morphology.bind"),
                layout: &pipeline.get_bind_group_layout(0),
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: words.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: fronts.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: offsets_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: params_buffer.as_entire_binding(),
                    },
                ],
            });
            dispatches.push((bind_group, dispatch_extent(list.len())));
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("porovox.morphology.encoder"),
        });
        for (bind_group, (gx, gy)) in &dispatches {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("porovox.morphology.pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.dispatch_workgroups(*gx, *gy, 1);
        }
        encoder.copy_buffer_to_buffer(&words, 0, &staging, 0, word_bytes);
        self.context.queue().submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        let _ = device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|_| Error::Accelerator("readback channel closed".into()))?
            .map_err(|err| Error::Accelerator(format!("failed to map readback buffer: {err}")))?;
        let data = slice.get_mapped_range();
        let updated: Vec<u32> = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        staging.unmap();

        volume.set_words(updated)
    }
}

impl MorphologyBackend for WgpuBackend {
    fn dilate(
        &self,
        volume: &mut PackedVolume,
        fronts: &FrontSets,
        surface: &[Offset3],
        corner: &[Offset3],
    ) -> Result<()> {
        self.run(
            &self.dilate_pipeline,
            volume,
            [(&fronts.surface, surface), (&fronts.corner, corner)],
        )
    }

    fn erode(
        &self,
        volume: &mut PackedVolume,
        fronts: &FrontSets,
        surface: &[Offset3],
        corner: &[Offset3],
    ) -> Result<()> {
        self.run(
            &self.erode_pipeline,
            volume,
            [(&fronts.surface, surface), (&fronts.corner, corner)],
        )
    }
}

fn build_pipeline(
    device: &wgpu::Device,
    module: &wgpu::ShaderModule,
    entry_point: &str,
) -> wgpu::ComputePipeline {
    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(entry_point),
        layout: None,
        module,
        entry_point,
        compilation_options: wgpu::PipelineCompilationOptions::default(),
    })
}

/// Split a front list into a dispatch grid that stays inside the per-axis
/// workgroup limit.
fn dispatch_extent(len: usize) -> (u32, u32) {
    let groups = (len as u32).div_ceil(WORKGROUP_SIZE).max(1);
    if groups <= MAX_GROUPS_PER_DIM {
        (groups, 1)
    } else {
        (MAX_GROUPS_PER_DIM, groups.div_ceil(MAX_GROUPS_PER_DIM))
    }
}
