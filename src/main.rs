// src/main.rs

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use log::{debug, info};
use pollster::block_on;
use rand::rngs::StdRng;
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Window, WindowAttributes, WindowId},
};

mod life;
mod tuning;

use life::LifeGrid;
use tuning::GridTuning;

// -----------------------------
// Embedded WGSL shader (no external files)
// -----------------------------
//
// One texel per cell; the fragment shader scales the grid up to the window,
// carves each cell into a rounded square, and mixes the dead/alive colors by
// the faded cell value sampled from the texture.
const CELLS_WGSL: &str = r#"
struct Params {
  grid: vec2<f32>,
  rounding: f32,
  _pad: f32,
  alive_color: vec4<f32>,
  dead_color: vec4<f32>,
};

struct VSOut {
  @builtin(position) pos: vec4<f32>,
  @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vi: u32) -> VSOut {
  var p = array<vec2<f32>, 3>(
    vec2<f32>(-1.0, -3.0),
    vec2<f32>( 3.0,  1.0),
    vec2<f32>(-1.0,  1.0)
  );
  var uv = array<vec2<f32>, 3>(
    vec2<f32>(0.0, 2.0),
    vec2<f32>(2.0, 0.0),
    vec2<f32>(0.0, 0.0)
  );

  var o: VSOut;
  o.pos = vec4<f32>(p[vi], 0.0, 1.0);
  o.uv  = uv[vi];
  return o;
}

@group(0) @binding(0) var samp: sampler;
@group(0) @binding(1) var tex: texture_2d<f32>;
@group(0) @binding(2) var<uniform> params: Params;

@fragment
fn fs_main(i: VSOut) -> @location(0) vec4<f32> {
  let g = i.uv * params.grid;
  let cell = floor(g);
  let value = textureSample(tex, samp, (cell + vec2<f32>(0.5)) / params.grid).r;

  // Rounded-square coverage from the fragment's position inside its cell.
  let p = fract(g) - vec2<f32>(0.5);
  let radius = 0.5 * clamp(params.rounding, 0.0, 1.0);
  let q = abs(p) - (vec2<f32>(0.5) - vec2<f32>(radius));
  let dist = length(max(q, vec2<f32>(0.0))) - radius;
  let mask = 1.0 - smoothstep(-0.03, 0.03, dist);

  let rgb = mix(params.dead_color.rgb, params.alive_color.rgb, value * mask);
  return vec4<f32>(rgb, 1.0);
}
"#;

/// Uniform block for the cell shader. Layout mirrors `Params` in the WGSL.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct ShaderParams {
    grid: [f32; 2],
    rounding: f32,
    _pad: f32,
    alive_color: [f32; 4],
    dead_color: [f32; 4],
}

fn rgb_to_f32(c: [u8; 3]) -> [f32; 4] {
    [
        c[0] as f32 / 255.0,
        c[1] as f32 / 255.0,
        c[2] as f32 / 255.0,
        1.0,
    ]
}

fn shader_params(tuning: &GridTuning, cols: u32, rows: u32) -> ShaderParams {
    ShaderParams {
        grid: [cols as f32, rows as f32],
        rounding: tuning.corner_rounding.clamp(0.0, 1.0),
        _pad: 0.0,
        alive_color: rgb_to_f32(tuning.alive_color),
        dead_color: rgb_to_f32(tuning.dead_color),
    }
}

// -----------------------------
// Rendering (wgpu)
// -----------------------------
//
// The render bridge: owns the surface and the cell texture, uploads the
// grid's pixel buffer when it changed, and draws one fullscreen triangle.
// It never reads simulation state beyond the finished pixel bytes.
struct Gfx {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,

    pipeline: wgpu::RenderPipeline,
    bgl: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    params_buf: wgpu::Buffer,

    cell_tex: wgpu::Texture,
    cell_view: wgpu::TextureView,
    bind: wgpu::BindGroup,
    cell_cols: u32,
    cell_rows: u32,
}

impl Gfx {
    async fn new(window: Arc<Window>, width: u32, height: u32) -> Self {
        use bytemuck::Zeroable;
        use wgpu::util::DeviceExt;

        let instance = wgpu::Instance::default();
        let surface = instance.create_surface(window).unwrap();

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .expect("No suitable GPU adapters found");

        let limits = wgpu::Limits::default();
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("device"),
                required_features: wgpu::Features::empty(),
                required_limits: limits,
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::default(),
            })
            .await
            .expect("request_device failed");

        let caps = surface.get_capabilities(&adapter);
        let format = caps.formats[0];
        let present_mode = if caps.present_modes.contains(&wgpu::PresentMode::Fifo) {
            wgpu::PresentMode::Fifo
        } else {
            caps.present_modes[0]
        };
        let alpha_mode = caps.alpha_modes[0];

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        // Placeholder 1x1 texture until the first grid arrives.
        let (cell_tex, cell_view) = Self::make_cell_texture(&device, 1, 1);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("cell_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let params_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("cell_params"),
            contents: bytemuck::bytes_of(&ShaderParams::zeroed()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("cell_bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let bind = Self::make_bind_group(&device, &bgl, &sampler, &cell_view, &params_buf);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("cell_shader"),
            source: wgpu::ShaderSource::Wgsl(CELLS_WGSL.into()),
        });

        let pl_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("cell_pl_layout"),
            bind_group_layouts: &[&bgl],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("cell_pipeline"),
            layout: Some(&pl_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            surface,
            device,
            queue,
            config,
            pipeline,
            bgl,
            sampler,
            params_buf,
            cell_tex,
            cell_view,
            bind,
            cell_cols: 1,
            cell_rows: 1,
        }
    }

    fn make_cell_texture(
        device: &wgpu::Device,
        cols: u32,
        rows: u32,
    ) -> (wgpu::Texture, wgpu::TextureView) {
        let tex = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("cell_tex"),
            size: wgpu::Extent3d {
                width: cols.max(1),
                height: rows.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = tex.create_view(&wgpu::TextureViewDescriptor::default());
        (tex, view)
    }

    fn make_bind_group(
        device: &wgpu::Device,
        bgl: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        view: &wgpu::TextureView,
        params_buf: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("cell_bind"),
            layout: bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: params_buf.as_entire_binding(),
                },
            ],
        })
    }

    fn resize(&mut self, new_w: u32, new_h: u32) {
        self.config.width = new_w.max(1);
        self.config.height = new_h.max(1);
        self.surface.configure(&self.device, &self.config);
    }

    /// Swaps in a texture matching a freshly-built grid and refreshes the
    /// shader params. The previous texture is dropped here, so a resize
    /// cannot accumulate GPU memory.
    fn set_grid(&mut self, cols: u32, rows: u32, params: ShaderParams) {
        let (tex, view) = Self::make_cell_texture(&self.device, cols, rows);
        self.cell_tex = tex;
        self.cell_view = view;
        self.cell_cols = cols.max(1);
        self.cell_rows = rows.max(1);

        self.queue
            .write_buffer(&self.params_buf, 0, bytemuck::bytes_of(&params));
        self.bind = Self::make_bind_group(
            &self.device,
            &self.bgl,
            &self.sampler,
            &self.cell_view,
            &self.params_buf,
        );
    }

    /// Uploads the grid's tight RGBA buffer, one texel per cell.
    fn upload(&mut self, pixels: &[u8]) {
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.cell_tex,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * self.cell_cols),
                rows_per_image: Some(self.cell_rows),
            },
            wgpu::Extent3d {
                width: self.cell_cols,
                height: self.cell_rows,
                depth_or_array_layers: 1,
            },
        );
    }

    fn render(&mut self) {
        let frame = match self.surface.get_current_texture() {
            Ok(f) => f,
            Err(_) => {
                self.surface.configure(&self.device, &self.config);
                return;
            }
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut enc = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("enc") });

        {
            let mut rp = enc.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("rp"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            rp.set_pipeline(&self.pipeline);
            rp.set_bind_group(0, &self.bind, &[]);
            rp.draw(0..3, 0..1);
        }

        self.queue.submit(Some(enc.finish()));
        frame.present();
    }
}

// -----------------------------
// App
// -----------------------------
struct App {
    debug: bool,
    tuning: GridTuning,

    window: Option<Arc<Window>>,
    gfx: Option<Gfx>,
    grid: Option<LifeGrid>,
    rng: StdRng,

    // Pointer-over-window flag; CursorMoved injects cells only while set.
    hovering: bool,
    running: bool,

    last_frame: Instant,

    last_stat: Instant,
    frames: u64,
    generations: u64,

    sys: System,
}

impl App {
    fn new(debug: bool, tuning: GridTuning) -> Self {
        let mut sys = System::new_with_specifics(
            RefreshKind::nothing()
                .with_cpu(CpuRefreshKind::everything())
                .with_memory(MemoryRefreshKind::everything()),
        );
        sys.refresh_all();

        Self {
            debug,
            rng: tuning.make_rng(),
            tuning,
            window: None,
            gfx: None,
            grid: None,
            hovering: false,
            running: true,
            last_frame: Instant::now(),
            last_stat: Instant::now(),
            frames: 0,
            generations: 0,
            sys,
        }
    }

    /// Window size changed: reconfigure the surface, and if the derived cell
    /// dimensions moved, throw the grid away and start a fresh one. A grid
    /// never resizes in place.
    fn handle_resize(&mut self, sz: PhysicalSize<u32>) {
        if let Some(gfx) = &mut self.gfx {
            gfx.resize(sz.width, sz.height);
        }

        let cell = self.tuning.cell_size_px.max(1);
        let cols = (sz.width / cell).max(1) as usize;
        let rows = (sz.height / cell).max(1) as usize;
        let unchanged = self
            .grid
            .as_ref()
            .is_some_and(|g| g.cols() == cols && g.rows() == rows);
        if unchanged {
            return;
        }

        let grid = LifeGrid::new(sz.width, sz.height, self.tuning, &mut self.rng);
        info!("grid rebuilt: {}x{} cells", grid.cols(), grid.rows());
        if let Some(gfx) = &mut self.gfx {
            gfx.set_grid(
                grid.cols() as u32,
                grid.rows() as u32,
                shader_params(&self.tuning, grid.cols() as u32, grid.rows() as u32),
            );
        }
        self.grid = Some(grid);
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, el: &ActiveEventLoop) {
        let attrs = WindowAttributes::default()
            .with_title("lifewall")
            .with_inner_size(PhysicalSize::new(1280u32, 720u32));
        let win = Arc::new(el.create_window(attrs).expect("create_window"));

        let size = win.inner_size();
        let mut gfx = block_on(Gfx::new(win.clone(), size.width, size.height));

        let grid = LifeGrid::new(size.width, size.height, self.tuning, &mut self.rng);
        info!(
            "grid {}x{} cells at {} px per cell",
            grid.cols(),
            grid.rows(),
            self.tuning.cell_size_px.max(1)
        );
        gfx.set_grid(
            grid.cols() as u32,
            grid.rows() as u32,
            shader_params(&self.tuning, grid.cols() as u32, grid.rows() as u32),
        );

        self.window = Some(win);
        self.gfx = Some(gfx);
        self.grid = Some(grid);

        self.last_frame = Instant::now();
        self.last_stat = Instant::now();
        self.frames = 0;
        self.generations = 0;
    }

    fn window_event(&mut self, el: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => el.exit(),

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed {
                    match event.logical_key {
                        Key::Named(NamedKey::Escape) => el.exit(),

                        Key::Named(NamedKey::Space) => {
                            self.running = !self.running;
                            if let Some(win) = &self.window {
                                win.set_title(if self.running {
                                    "lifewall"
                                } else {
                                    "lifewall (paused)"
                                });
                            }
                        }

                        // Reseed the current grid in place.
                        Key::Character(ref s) if s.as_str().eq_ignore_ascii_case("r") => {
                            if let Some(grid) = self.grid.as_mut() {
                                grid.randomize(&mut self.rng);
                            }
                        }

                        // Debug stats toggle
                        Key::Character(ref s) if s.as_str().eq_ignore_ascii_case("d") => {
                            self.debug = !self.debug;
                        }

                        _ => {}
                    }
                }
            }

            WindowEvent::Resized(sz) => self.handle_resize(sz),

            WindowEvent::CursorEntered { .. } => self.hovering = true,

            WindowEvent::CursorLeft { .. } => self.hovering = false,

            // Every move while hovering wakes exactly one cell; the write
            // lands in the current generation, ahead of this frame's step.
            WindowEvent::CursorMoved { position, .. } => {
                if self.hovering {
                    if let Some(grid) = self.grid.as_mut() {
                        grid.set_cell_alive(position.x as f32, position.y as f32);
                    }
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, el: &ActiveEventLoop) {
        el.set_control_flow(ControlFlow::Poll);

        // ----------------------------
        // Frame timing
        // ----------------------------
        let now = Instant::now();
        let mut dt = (now - self.last_frame).as_secs_f32();
        self.last_frame = now;

        if dt.is_nan() || dt < 0.0 {
            dt = 0.0;
        }
        if dt > 0.25 {
            dt = 0.25;
        }

        let Some(grid) = self.grid.as_mut() else {
            return;
        };

        // ----------------------------
        // Simulation frame: pointer injections already landed during event
        // dispatch; now maybe step, then fade, then sync the pixel buffer.
        // ----------------------------
        if self.running {
            if grid.update(dt) {
                self.generations += 1;
            }
        } else {
            grid.advance(dt);
            grid.sync_pixels();
        }

        // ----------------------------
        // Upload + draw
        // ----------------------------
        if let Some(gfx) = self.gfx.as_mut() {
            if grid.take_dirty() {
                gfx.upload(grid.pixels());
            }
            gfx.render();
        }
        self.frames += 1;

        // ----------------------------
        // Debug stats
        // ----------------------------
        if self.debug && self.last_stat.elapsed() >= Duration::from_secs(1) {
            self.sys.refresh_cpu_all();
            self.sys.refresh_memory();

            let cpu = self.sys.global_cpu_usage();
            let mem_total = self.sys.total_memory();
            let mem_pct = if mem_total > 0 {
                (self.sys.used_memory() as f32 / mem_total as f32) * 100.0
            } else {
                0.0
            };

            debug!(
                "fps {} | gens/s {} | population {} | cpu {:4.1}% | mem {:4.1}%",
                self.frames,
                self.generations,
                grid.population(),
                cpu,
                mem_pct
            );

            self.frames = 0;
            self.generations = 0;
            self.last_stat = Instant::now();
        }
    }
}

// -----------------------------
// CLI parsing
// -----------------------------
fn parse_args(mut tuning: GridTuning) -> (bool, GridTuning) {
    let mut debug = false;

    let mut args = std::env::args().skip(1);
    while let Some(a) = args.next() {
        match a.as_str() {
            "--debug" => debug = true,
            "--seed" => {
                if let Some(v) = args.next().and_then(|s| s.parse::<u64>().ok()) {
                    tuning.rng_seed = Some(v);
                }
            }
            "--cell-size" => {
                if let Some(v) = args.next().and_then(|s| s.parse::<u32>().ok()) {
                    tuning.cell_size_px = v.max(1);
                }
            }
            _ => {}
        }
    }

    (debug, tuning)
}

fn main() -> Result<(), winit::error::EventLoopError> {
    env_logger::init();

    let (debug, tuning) = parse_args(GridTuning::default());

    let event_loop = EventLoop::new()?;
    let mut app = App::new(debug, tuning);
    event_loop.run_app(&mut app)
}
