//! Top-level entry point owning the Vulkan instance, device and scheduler.

use std::mem::ManuallyDrop;
use std::sync::Arc;

use tracing::{error, info};

use ringframe_core::PipelineConfig;
use ringframe_platform::{Surface, Window};
use ringframe_rhi::device::Device;
use ringframe_rhi::instance::Instance;
use ringframe_rhi::physical_device::select_physical_device;
use ringframe_scene::{Camera, SceneState};

use crate::error::RenderResult;
use crate::overlay::OverlayHook;
use crate::scheduler::{FrameOutcome, FrameScheduler, FrameStats};

const APP_NAME: &std::ffi::CStr = c"ringframe";

/// GPU-driven renderer for one window.
///
/// # Resource Destruction Order
///
/// 1. Wait for all GPU work to complete
/// 2. Scheduler (swapchain, passes, ring, sync objects)
/// 3. Surface
/// 4. Device, once the last `Arc` is gone
/// 5. Instance
pub struct Renderer {
    scheduler: ManuallyDrop<FrameScheduler>,
    device: ManuallyDrop<Arc<Device>>,
    surface: ManuallyDrop<Surface>,
    instance: ManuallyDrop<Instance>,
    config: PipelineConfig,
}

impl Renderer {
    /// Initializes Vulkan for `window` and uploads `scene`'s geometry.
    ///
    /// # Errors
    ///
    /// Invalid configuration, a missing Vulkan loader, no suitable GPU, or
    /// any object creation failure.
    pub fn new(window: &Window, config: PipelineConfig, scene: &SceneState) -> RenderResult<Self> {
        config.validate()?;
        let extent = window.extent();
        info!(
            "Initializing renderer ({}x{}, {} frames in flight)",
            extent.width, extent.height, config.frames_in_flight
        );

        let extensions = window.surface_extensions()?;
        let instance = Instance::new(APP_NAME, config.enable_validation, &extensions)?;
        let surface = window.create_surface(instance.entry(), instance.handle())?;

        let physical_device =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        let device = Device::new(&instance, &physical_device)?;

        let scheduler = FrameScheduler::new(
            &instance,
            device.clone(),
            surface.handle(),
            extent,
            &config,
            scene,
        )?;

        Ok(Self {
            scheduler: ManuallyDrop::new(scheduler),
            device: ManuallyDrop::new(device),
            surface: ManuallyDrop::new(surface),
            instance: ManuallyDrop::new(instance),
            config,
        })
    }

    /// Queues a swapchain rebuild. Zero sizes (minimized window) are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.scheduler.request_resize(width, height);
    }

    pub fn render_frame(
        &mut self,
        scene: &mut SceneState,
        camera: &Camera,
        overlay: &mut dyn OverlayHook,
    ) -> RenderResult<FrameOutcome> {
        self.scheduler.render_frame(scene, camera, overlay)
    }

    pub fn select_effect(&mut self, name: &str) -> RenderResult<()> {
        self.scheduler.postprocess_mut().select(name)
    }

    /// Loads another `post_<name>.frag` effect.
    pub fn register_effect(&mut self, name: &str) -> RenderResult<()> {
        self.scheduler.postprocess_mut().register(name)
    }

    /// Rebuilds the named effect's pipeline from disk.
    pub fn reload_effect(&mut self, name: &str) -> RenderResult<()> {
        self.scheduler.postprocess_mut().reload(name)
    }

    pub fn selected_effect(&self) -> Option<&str> {
        self.scheduler.postprocess().selected_name()
    }

    pub fn effect_names(&self) -> Vec<String> {
        self.scheduler
            .postprocess()
            .effect_names()
            .map(str::to_string)
            .collect()
    }

    pub fn stats(&self) -> FrameStats {
        self.scheduler.stats()
    }

    pub fn aspect_ratio(&self) -> f32 {
        let extent = self.scheduler.extent();
        extent.width as f32 / extent.height.max(1) as f32
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle during renderer drop: {}", e);
        }

        // SAFETY: each field is dropped exactly once, here, in dependency
        // order, and never touched again.
        unsafe {
            ManuallyDrop::drop(&mut self.scheduler);
            ManuallyDrop::drop(&mut self.surface);
            ManuallyDrop::drop(&mut self.device);
            ManuallyDrop::drop(&mut self.instance);
        }
        info!("Renderer destroyed");
    }
}
