//! The viewer's renderer facade.
//!
//! Owns every Vulkan object from the instance down to the scene and drives
//! one frame per [`Renderer::render_frame`] call.

use std::sync::Arc;

use ash::vk;
use glam::Vec3;
use tracing::{debug, error, info, warn};

use vista_core::{ShaderConfig, ViewerConfig};
use vista_platform::{Surface, ViewerActions, Window};
use vista_resources::{DefaultTexturePolicy, SceneData};
use vista_rhi::descriptor::BindingSet;
use vista_rhi::device::Device;
use vista_rhi::framebuffer::FramebufferSet;
use vista_rhi::instance::Instance;
use vista_rhi::physical_device::select_physical_device;
use vista_rhi::pipeline::{CullMode, FrontFace, GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use vista_rhi::render_pass::{ColorAttachment, DepthAttachment, RenderPass};
use vista_rhi::shader::{Shader, ShaderStage};
use vista_rhi::swapchain::Swapchain;
use vista_rhi::upload::Uploader;
use vista_rhi::vertex::Vertex;
use vista_rhi::{RhiError, RhiResult};
use vista_scene::{FpsCamera, MoveInput, PointLight, Projection};

use crate::MAX_FRAMES_IN_FLIGHT;
use crate::depth_buffer::{DepthBuffer, DepthRebuild, plan_depth_rebuild};
use crate::error::RenderResult;
use crate::frame::InvalidationReason;
use crate::frame_manager::{FrameContext, FrameManager, FrameOutcome, PresentOutcome};
use crate::gpu_scene::GpuScene;
use crate::ubo::{FrameUniforms, UniformRing};

/// Set 0 bindings shared by every draw.
const UNIFORM_BINDING: u32 = 0;
const GLOBAL_TEXTURE_BINDING: u32 = 1;

/// Everything needed to draw the scene into the window.
///
/// Fields drop top to bottom after [`Drop`] has idled the device: scene and
/// pipeline objects first, then the swapchain, the device, the surface and
/// finally the instance.
pub struct Renderer {
    scene: GpuScene,
    pipeline: Pipeline,
    pipeline_layout: PipelineLayout,
    frame_set: BindingSet,
    uniforms: UniformRing,
    frames: FrameManager,
    framebuffers: FramebufferSet,
    depth_buffer: DepthBuffer,
    render_pass: RenderPass,
    swapchain: Swapchain,
    _uploader: Uploader,
    device: Arc<Device>,
    _surface: Surface,
    _instance: Instance,

    camera: FpsCamera,
    light: PointLight,
    move_speed: f32,
    mouse_sensitivity: f32,
    /// Last framebuffer size reported by the window.
    size: (u32, u32),
}

impl Renderer {
    /// Brings up Vulkan for `window` and uploads the configured scene.
    ///
    /// # Errors
    ///
    /// Every failure here is fatal: no capable GPU, surface creation,
    /// missing shaders or an unreadable scene.
    pub fn new(window: &Window, config: &ViewerConfig) -> RenderResult<Self> {
        let (width, height) = window.framebuffer_size();
        info!("Initializing renderer ({}x{})", width, height);

        let extensions = window.required_extensions()?;
        let instance = Instance::new(config.renderer.validation, &extensions)?;
        let surface = window.create_surface(instance.entry(), instance.handle())?;

        let physical = select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        let device = Device::new(&instance, &physical)?;

        let swapchain = Swapchain::new(&instance, device.clone(), surface.handle(), width, height)?;
        let extent = swapchain.extent();

        let depth_format = device.find_depth_format()?;
        let render_pass = RenderPass::new(
            device.clone(),
            ColorAttachment::new(swapchain.format()).with_clear_color(config.renderer.clear_color),
            DepthAttachment::new(depth_format),
        )?;
        let depth_buffer = DepthBuffer::new(device.clone(), extent, depth_format)?;
        let framebuffers = FramebufferSet::new(
            &device,
            render_pass.handle(),
            swapchain.image_views(),
            depth_buffer.image_view(),
            extent,
        )?;

        let frames = FrameManager::new(device.clone())?;
        let uploader = Uploader::new(device.clone())?;

        let scene_data = SceneData::load(&config.scene.path)?;
        let scene = GpuScene::upload(&uploader, &scene_data, DefaultTexturePolicy::default())?;

        let uniforms = UniformRing::new(&device, MAX_FRAMES_IN_FLIGHT)?;
        let frame_set = create_frame_set(&device, &uniforms, &scene)?;

        let pipeline_layout = PipelineLayout::new(
            device.clone(),
            &[frame_set.layout(), scene.material_layout()],
            &[],
        )?;
        let pipeline = create_pipeline(&device, &config.shaders, &render_pass, &pipeline_layout)?;

        let cam = &config.camera;
        let camera = FpsCamera::new(
            Vec3::from(cam.position),
            cam.yaw,
            cam.pitch,
            Projection {
                fov_y: cam.fov_y_degrees,
                aspect: aspect_ratio(extent),
                near: cam.near,
                far: cam.far,
            },
        );
        let light = PointLight::new(camera.position());

        info!(
            "Renderer initialized: {} swapchain images, {} frames in flight, {} draws, {} material sets",
            swapchain.image_count(),
            MAX_FRAMES_IN_FLIGHT,
            scene.draws().len(),
            scene.material_count()
        );

        Ok(Self {
            scene,
            pipeline,
            pipeline_layout,
            frame_set,
            uniforms,
            frames,
            framebuffers,
            depth_buffer,
            render_pass,
            swapchain,
            _uploader: uploader,
            device,
            _surface: surface,
            _instance: instance,
            camera,
            light,
            move_speed: cam.move_speed,
            mouse_sensitivity: cam.mouse_sensitivity,
            size: (width, height),
        })
    }

    /// Records the new framebuffer size and flags the swapchain.
    ///
    /// Recreation happens at the start of the next rendered frame; a zero
    /// size pauses rendering until the window is restored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if (width, height) == self.size {
            return;
        }
        debug!(
            "Resize: {}x{} -> {}x{}",
            self.size.0, self.size.1, width, height
        );
        self.size = (width, height);
        self.frames.invalidate(InvalidationReason::Resized);
    }

    /// Applies one step of viewer input.
    pub fn update(&mut self, actions: &ViewerActions, dt: f32) {
        let (dx, dy) = actions.look;
        if dx != 0.0 || dy != 0.0 {
            self.camera.process_mouse(dx, dy, self.mouse_sensitivity);
        }

        if actions.is_moving() {
            self.camera.translate(
                MoveInput {
                    forward: actions.forward,
                    strafe: actions.strafe,
                    vertical: actions.vertical,
                },
                self.move_speed,
                dt,
            );
        }

        if actions.update_light {
            self.light.place_at(self.camera.position());
            debug!("Light moved to {:?}", self.camera.position());
        }
    }

    /// Renders and presents one frame.
    ///
    /// Out-of-date and suboptimal swapchains are rebuilt here and the frame
    /// is retried by the caller's next iteration.
    pub fn render_frame(&mut self) -> RhiResult<()> {
        if self.is_paused() {
            return Ok(());
        }
        if self.frames.needs_recreate() {
            self.recreate_swapchain()?;
        }

        let ctx = match self.frames.begin_frame(&self.swapchain)? {
            FrameOutcome::Ready(ctx) => ctx,
            FrameOutcome::Recreate => {
                self.recreate_swapchain()?;
                return Ok(());
            }
        };

        self.uniforms
            .write(ctx.slot, &FrameUniforms::new(&self.camera, &self.light))?;
        self.record(ctx)?;

        match self.frames.end_frame(&self.swapchain, ctx)? {
            PresentOutcome::Presented => {}
            PresentOutcome::Recreate => self.recreate_swapchain()?,
            PresentOutcome::Dropped => warn!("Frame dropped"),
        }
        Ok(())
    }

    fn record(&self, ctx: FrameContext) -> RhiResult<()> {
        let cmd = self.frames.command_buffer(&ctx);
        let extent = self.swapchain.extent();
        let framebuffer = self.framebuffers.get(ctx.image_index).ok_or_else(|| {
            RhiError::InvalidHandle(format!("no framebuffer for image {}", ctx.image_index))
        })?;
        let frame_set = self.frame_set.set(ctx.slot).ok_or(RhiError::BindingOutOfRange {
            index: ctx.slot,
            count: self.frame_set.instance_count(),
        })?;

        cmd.begin_render_pass(&self.render_pass.begin_info(framebuffer, extent));
        cmd.bind_graphics_pipeline(self.pipeline.handle());
        cmd.set_full_viewport(extent);
        cmd.bind_descriptor_sets(self.pipeline_layout.handle(), 0, &[frame_set]);
        self.scene.record_draws(cmd, self.pipeline_layout.handle());
        cmd.end_render_pass();
        Ok(())
    }

    /// Rebuilds the swapchain, the depth attachment and the framebuffers.
    ///
    /// Does nothing while the window is minimized; the request stays pending.
    fn recreate_swapchain(&mut self) -> RhiResult<()> {
        if self.is_paused() {
            debug!("Window minimized, deferring swapchain recreation");
            return Ok(());
        }

        // Framebuffers and depth views are replaced below, so no slot may still use them.
        self.frames.wait_all()?;
        let (width, height) = self.size;
        self.swapchain.recreate(width, height)?;
        let extent = self.swapchain.extent();

        let depth_buffer = match plan_depth_rebuild(self.depth_buffer.extent(), extent) {
            DepthRebuild::Keep => None,
            DepthRebuild::Recreate(depth_extent) => Some(DepthBuffer::new(
                self.device.clone(),
                depth_extent,
                self.depth_buffer.format(),
            )?),
        };
        let framebuffers = FramebufferSet::new(
            &self.device,
            self.render_pass.handle(),
            self.swapchain.image_views(),
            depth_buffer.as_ref().unwrap_or(&self.depth_buffer).image_view(),
            extent,
        )?;
        // Old framebuffers reference the old depth view, so they go first.
        self.framebuffers = framebuffers;
        if let Some(depth_buffer) = depth_buffer {
            self.depth_buffer = depth_buffer;
        }
        debug_assert!(self.depth_buffer.matches(extent));

        self.camera.set_aspect(aspect_ratio(extent));
        self.frames.swapchain_recreated();
        info!("Swapchain recreated at {}x{}", extent.width, extent.height);
        Ok(())
    }

    /// True while the window has a zero-sized framebuffer.
    pub fn is_paused(&self) -> bool {
        self.size.0 == 0 || self.size.1 == 0
    }

    pub fn camera(&self) -> &FpsCamera {
        &self.camera
    }

    pub fn light(&self) -> &PointLight {
        &self.light
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle during teardown: {:?}", e);
        }
        info!("Renderer destroyed");
    }
}

/// Set 0: the per-slot uniform buffer and one sampled texture, one instance
/// per frame slot.
fn create_frame_set(
    device: &Arc<Device>,
    uniforms: &UniformRing,
    scene: &GpuScene,
) -> RhiResult<BindingSet> {
    let mut set = BindingSet::new(device.clone());
    set.add_binding(
        vk::DescriptorType::UNIFORM_BUFFER,
        vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
        UNIFORM_BINDING,
        1,
    )
    .add_binding(
        vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        vk::ShaderStageFlags::FRAGMENT,
        GLOBAL_TEXTURE_BINDING,
        1,
    );
    set.finalize(MAX_FRAMES_IN_FLIGHT as u32)?;

    for slot in 0..MAX_FRAMES_IN_FLIGHT {
        set.write_buffer(UNIFORM_BINDING, slot, uniforms.descriptor_info(slot)?)?;
    }
    set.broadcast_image(GLOBAL_TEXTURE_BINDING, scene.global_texture()?)?;
    Ok(set)
}

fn create_pipeline(
    device: &Arc<Device>,
    shaders: &ShaderConfig,
    render_pass: &RenderPass,
    layout: &PipelineLayout,
) -> RhiResult<Pipeline> {
    let vertex = Shader::from_spirv_file(
        device.clone(),
        &shaders.vertex_path(),
        ShaderStage::Vertex,
        "main",
    )?;
    let fragment = Shader::from_spirv_file(
        device.clone(),
        &shaders.fragment_path(),
        ShaderStage::Fragment,
        "main",
    )?;

    GraphicsPipelineBuilder::new()
        .vertex_shader(&vertex)
        .fragment_shader(&fragment)
        .vertex_bindings(&[Vertex::binding_description()])
        .vertex_attributes(&Vertex::attribute_descriptions())
        .cull_mode(CullMode::Back)
        .front_face(FrontFace::CounterClockwise)
        .render_pass(render_pass.handle(), 0)
        .build(device.clone(), layout)
}

fn aspect_ratio(extent: vk::Extent2D) -> f32 {
    if extent.height == 0 {
        1.0
    } else {
        extent.width as f32 / extent.height as f32
    }
}
