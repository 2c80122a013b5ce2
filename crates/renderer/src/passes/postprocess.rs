//! Fullscreen composite of the offscreen color target onto the swapchain.
//!
//! Every effect is a fragment shader `post_<name>.frag` sharing the fullscreen
//! vertex shader, pipeline layout and descriptor layout. One effect is
//! selected at a time; any registered effect can be rebuilt from disk while
//! the pipeline runs, either by name or when its `.spv` file gets newer.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ash::vk;
use tracing::{Span, debug, info, warn};

use ringframe_rhi::RhiResult;
use ringframe_rhi::command::CommandBuffer;
use ringframe_rhi::descriptor::{self, DescriptorPool, DescriptorSetLayout};
use ringframe_rhi::device::Device;
use ringframe_rhi::image::Sampler;
use ringframe_rhi::pipeline::{CompareOp, CullMode, GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use ringframe_rhi::shader::ShaderStage;

use crate::error::{RenderError, RenderResult};
use crate::overlay::OverlayHook;
use crate::shaders::{self, ShaderStamp};
use crate::targets::OffscreenTargets;

/// Effect selected at startup; always registered.
pub const DEFAULT_EFFECT: &str = "passthrough";

/// Named entries with one of them selected.
#[derive(Debug)]
pub struct EffectTable<T> {
    entries: Vec<(String, T)>,
    selected: usize,
}

impl<T> Default for EffectTable<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            selected: 0,
        }
    }
}

impl<T> EffectTable<T> {
    /// Adds `name`, or replaces its entry. Returns the replaced value.
    pub fn insert(&mut self, name: &str, value: T) -> Option<T> {
        match self.position(name) {
            Some(index) => Some(std::mem::replace(&mut self.entries[index].1, value)),
            None => {
                self.entries.push((name.to_string(), value));
                None
            }
        }
    }

    pub fn select(&mut self, name: &str) -> RenderResult<()> {
        self.selected = self
            .position(name)
            .ok_or_else(|| RenderError::UnknownEffect(name.to_string()))?;
        Ok(())
    }

    pub fn selected(&self) -> Option<(&str, &T)> {
        self.entries
            .get(self.selected)
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut T> {
        self.position(name).map(|index| &mut self.entries[index].1)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut T)> {
        self.entries
            .iter_mut()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(entry, _)| entry == name)
    }
}

struct Effect {
    pipeline: Pipeline,
    fragment: ShaderStamp,
}

pub struct PostprocessPass {
    effects: EffectTable<Effect>,
    sets: Vec<vk::DescriptorSet>,
    pool: DescriptorPool,
    sampler: Sampler,
    layout: PipelineLayout,
    // Referenced by `layout` and the sets; outlives both.
    _set_layout: DescriptorSetLayout,
    output_format: vk::Format,
    shader_dir: PathBuf,
    device: Arc<Device>,
    span: Span,
}

impl PostprocessPass {
    /// Builds the pass with [`DEFAULT_EFFECT`] selected and one descriptor
    /// set per ring slot.
    pub fn new(
        device: Arc<Device>,
        shader_dir: &Path,
        output_format: vk::Format,
        slot_count: usize,
    ) -> RenderResult<Self> {
        let span = tracing::info_span!("postprocess");
        let _enter = span.enter();

        let set_layout =
            DescriptorSetLayout::single_sampled_image(device.clone(), vk::ShaderStageFlags::FRAGMENT)?;
        let layout = PipelineLayout::new(device.clone(), &[set_layout.handle()], &[])?;
        let sampler = Sampler::linear_clamp(device.clone())?;

        let slot_count = slot_count as u32;
        let pool = DescriptorPool::new(
            device.clone(),
            slot_count,
            &[vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: slot_count,
            }],
        )?;
        let layouts = vec![set_layout.handle(); slot_count as usize];
        let sets = pool.allocate(&layouts)?;

        drop(_enter);
        let mut pass = Self {
            effects: EffectTable::default(),
            sets,
            pool,
            sampler,
            layout,
            _set_layout: set_layout,
            output_format,
            shader_dir: shader_dir.to_path_buf(),
            device,
            span,
        };
        pass.register(DEFAULT_EFFECT)?;
        Ok(pass)
    }

    fn build_pipeline(&self, effect: &str) -> RhiResult<Pipeline> {
        let vert = shaders::load(
            self.device.clone(),
            &self.shader_dir,
            shaders::FULLSCREEN_VERT,
            ShaderStage::Vertex,
        )?;
        let frag = shaders::load(
            self.device.clone(),
            &self.shader_dir,
            &shaders::postprocess_fragment(effect),
            ShaderStage::Fragment,
        )?;

        GraphicsPipelineBuilder::new()
            .vertex_shader(&vert)
            .fragment_shader(&frag)
            .cull_mode(CullMode::None)
            .depth(false, false, CompareOp::Always)
            .color_attachment_format(self.output_format)
            .build(self.device.clone(), &self.layout)
    }

    /// Loads `post_<name>.frag` and adds it to the selectable effects.
    ///
    /// Registering an existing name behaves like [`reload`](Self::reload).
    pub fn register(&mut self, name: &str) -> RenderResult<()> {
        if self.effects.contains(name) {
            return self.reload(name);
        }
        let _enter = self.span.enter();
        let fragment = self.fragment_stamp(name);
        let pipeline = self.build_pipeline(name)?;
        self.effects.insert(name, Effect { pipeline, fragment });
        info!("Registered postprocess effect '{}'", name);
        Ok(())
    }

    fn fragment_stamp(&self, effect: &str) -> ShaderStamp {
        ShaderStamp::capture(shaders::spirv_path(
            &self.shader_dir,
            &shaders::postprocess_fragment(effect),
        ))
    }

    pub fn select(&mut self, name: &str) -> RenderResult<()> {
        let _enter = self.span.enter();
        self.effects.select(name)?;
        info!("Selected postprocess effect '{}'", name);
        Ok(())
    }

    /// Rebuilds only the named effect from disk.
    ///
    /// The new pipeline is built first, so a shader that fails to load leaves
    /// the old one in place. The device is idled before the old pipeline is
    /// destroyed.
    pub fn reload(&mut self, name: &str) -> RenderResult<()> {
        let _enter = self.span.enter();
        if !self.effects.contains(name) {
            return Err(RenderError::UnknownEffect(name.to_string()));
        }

        let fragment = self.fragment_stamp(name);
        let pipeline = match self.build_pipeline(name) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                warn!("Reload of '{}' failed, keeping the old pipeline: {}", name, e);
                return Err(e.into());
            }
        };

        self.device.wait_idle()?;
        self.effects.insert(name, Effect { pipeline, fragment });
        info!("Reloaded postprocess effect '{}'", name);
        Ok(())
    }

    /// Rebuilds every effect whose fragment binary is newer than the one its
    /// pipeline was built from, and returns their names.
    ///
    /// A binary that fails to build is logged and not retried until it
    /// changes again; the old pipeline stays. Only a failed device-idle wait
    /// is returned as an error.
    pub fn reload_changed(&mut self) -> RenderResult<Vec<String>> {
        let mut changed = Vec::new();
        for (name, effect) in self.effects.iter_mut() {
            if effect.fragment.changed() {
                effect.fragment.refresh();
                changed.push(name.to_string());
            }
        }
        if changed.is_empty() {
            return Ok(changed);
        }

        let _enter = self.span.enter();
        let mut rebuilt = Vec::with_capacity(changed.len());
        for name in changed {
            match self.build_pipeline(&name) {
                Ok(pipeline) => rebuilt.push((name, pipeline)),
                Err(e) => warn!("'{}' changed but failed to build, keeping the old pipeline: {}", name, e),
            }
        }
        if rebuilt.is_empty() {
            return Ok(Vec::new());
        }

        self.device.wait_idle()?;
        let mut names = Vec::with_capacity(rebuilt.len());
        for (name, pipeline) in rebuilt {
            if let Some(effect) = self.effects.get_mut(&name) {
                effect.pipeline = pipeline;
            }
            info!("Reloaded changed postprocess effect '{}'", name);
            names.push(name);
        }
        Ok(names)
    }

    pub fn selected_name(&self) -> Option<&str> {
        self.effects.selected().map(|(name, _)| name)
    }

    pub fn effect_names(&self) -> impl Iterator<Item = &str> {
        self.effects.names()
    }

    /// Points slot `i`'s descriptor set at slot `i`'s offscreen color.
    ///
    /// Must be called again whenever the targets are recreated.
    pub fn bind_targets(&self, targets: &OffscreenTargets) {
        for (slot, &set) in self.sets.iter().enumerate() {
            descriptor::write_sampled_image(
                &self.device,
                set,
                0,
                self.sampler.handle(),
                targets.slot(slot).color.view(),
            );
        }
        let _enter = self.span.enter();
        debug!("Bound {} offscreen targets (pool of {})", self.sets.len(), self.pool.max_sets());
    }

    /// Draws the composite into `target`, then lets `overlay` record on top
    /// inside the same rendering scope.
    ///
    /// `target` must already be in `COLOR_ATTACHMENT_OPTIMAL`.
    pub fn record(
        &self,
        cmd: &CommandBuffer,
        slot: usize,
        target: vk::ImageView,
        extent: vk::Extent2D,
        overlay: &mut dyn OverlayHook,
    ) {
        let color_attachments = [vk::RenderingAttachmentInfo::default()
            .image_view(target)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::DONT_CARE)
            .store_op(vk::AttachmentStoreOp::STORE)];
        let rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D::default().extent(extent))
            .layer_count(1)
            .color_attachments(&color_attachments);

        cmd.begin_rendering(&rendering_info);

        if let (Some((_, effect)), Some(&set)) = (self.effects.selected(), self.sets.get(slot)) {
            let pipeline = &effect.pipeline;
            cmd.bind_pipeline(pipeline.bind_point(), pipeline.handle());
            cmd.set_viewport_and_scissor(extent);
            cmd.bind_descriptor_sets(pipeline.bind_point(), self.layout.handle(), 0, &[set]);
            cmd.draw(3, 1);
        }

        overlay.record(cmd, extent);
        cmd.end_rendering();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_unknown_effect_keeps_selection() {
        let mut table = EffectTable::default();
        table.insert("passthrough", 1);
        table.insert("vignette", 2);

        let err = table.select("bloom").unwrap_err();
        assert!(matches!(err, RenderError::UnknownEffect(name) if name == "bloom"));
        assert_eq!(table.selected(), Some(("passthrough", &1)));
    }

    #[test]
    fn test_insert_existing_replaces_in_place() {
        let mut table = EffectTable::default();
        assert_eq!(table.insert("a", 1), None);
        table.insert("b", 2);
        table.select("b").unwrap();

        assert_eq!(table.insert("b", 3), Some(2));
        assert_eq!(table.selected(), Some(("b", &3)));
        assert_eq!(table.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_iter_mut_updates_entries() {
        let mut table = EffectTable::default();
        table.insert("a", 1);
        table.insert("b", 2);
        for (_, value) in table.iter_mut() {
            *value *= 10;
        }
        *table.get_mut("b").unwrap() += 1;

        assert_eq!(table.selected(), Some(("a", &10)));
        assert!(table.get_mut("c").is_none());
        table.select("b").unwrap();
        assert_eq!(table.selected(), Some(("b", &21)));
    }

    #[test]
    fn test_empty_table_has_no_selection() {
        let table: EffectTable<u32> = EffectTable::default();
        assert!(table.is_empty());
        assert_eq!(table.selected(), None);
    }
}
