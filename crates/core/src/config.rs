//! Set-once configuration consumed at pipeline initialization.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Number of ring slots (frames in flight).
pub const DEFAULT_FRAMES_IN_FLIGHT: usize = 4;

/// Invocations per compute workgroup for the transform and culling stages.
///
/// Must match `local_size_x` in `transform.comp` and `cull.comp`.
pub const DEFAULT_WORKGROUP_SIZE: u32 = 128;

/// Upper bound on indirect draw commands (one per model group).
pub const DEFAULT_MAX_DRAW_GROUPS: u32 = 1024;

/// Dirty-slot tracking uses 32-bit masks.
pub const MAX_RING_SLOTS: usize = 32;

/// Pipeline configuration.
///
/// Every value is read once when the renderer is created; nothing here is
/// consulted per frame after that.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    /// Number of parallel copies of every per-frame buffer.
    pub frames_in_flight: usize,
    /// Compute workgroup size.
    pub workgroup_size: u32,
    /// Maximum number of model groups (indirect draw commands).
    pub max_draw_groups: u32,
    /// Frame-rate cap applied by the application loop. `None` means uncapped.
    pub target_frame_rate: Option<u32>,
    /// Bound on fence waits. `None` waits indefinitely.
    pub fence_timeout: Option<Duration>,
    /// Request the Khronos validation layer.
    pub enable_validation: bool,
    /// Directory holding the compiled SPIR-V binaries.
    pub shader_dir: PathBuf,
    /// Instance capacity each ring slot is allocated with at startup.
    pub initial_instance_capacity: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: DEFAULT_FRAMES_IN_FLIGHT,
            workgroup_size: DEFAULT_WORKGROUP_SIZE,
            max_draw_groups: DEFAULT_MAX_DRAW_GROUPS,
            target_frame_rate: None,
            fence_timeout: None,
            enable_validation: cfg!(debug_assertions),
            shader_dir: PathBuf::from("shaders/spirv"),
            initial_instance_capacity: 1024,
        }
    }
}

impl PipelineConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of frames in flight.
    pub fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frames_in_flight = frames;
        self
    }

    /// Set the frame-rate cap.
    pub fn with_target_frame_rate(mut self, fps: Option<u32>) -> Self {
        self.target_frame_rate = fps;
        self
    }

    /// Set the fence wait bound.
    pub fn with_fence_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fence_timeout = timeout;
        self
    }

    /// Enable or disable validation layers.
    pub fn with_validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Set the SPIR-V directory.
    pub fn with_shader_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.shader_dir = dir.into();
        self
    }

    /// Set the initial per-slot instance capacity.
    pub fn with_initial_instance_capacity(mut self, capacity: u32) -> Self {
        self.initial_instance_capacity = capacity;
        self
    }

    /// Fence timeout in nanoseconds as Vulkan expects it.
    pub fn fence_timeout_ns(&self) -> u64 {
        self.fence_timeout
            .map_or(u64::MAX, |t| u64::try_from(t.as_nanos()).unwrap_or(u64::MAX))
    }

    /// Number of workgroups needed to cover `items` invocations.
    pub fn workgroup_count(&self, items: u32) -> u32 {
        items.div_ceil(self.workgroup_size)
    }

    /// Checks the configuration for values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.frames_in_flight == 0 || self.frames_in_flight > MAX_RING_SLOTS {
            return Err(Error::Config(format!(
                "frames_in_flight must be in 1..={}, got {}",
                MAX_RING_SLOTS, self.frames_in_flight
            )));
        }
        if self.workgroup_size == 0 || !self.workgroup_size.is_power_of_two() {
            return Err(Error::Config(format!(
                "workgroup_size must be a non-zero power of two, got {}",
                self.workgroup_size
            )));
        }
        if self.max_draw_groups == 0 {
            return Err(Error::Config("max_draw_groups must be non-zero".into()));
        }
        if self.target_frame_rate == Some(0) {
            return Err(Error::Config("target_frame_rate must be non-zero".into()));
        }
        if self.initial_instance_capacity == 0 {
            return Err(Error::Config(
                "initial_instance_capacity must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert_eq!(config.frames_in_flight, 4);
        assert_eq!(config.workgroup_size, 128);
        assert_eq!(config.max_draw_groups, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_ring_size() {
        assert!(PipelineConfig::new().with_frames_in_flight(0).validate().is_err());
        assert!(
            PipelineConfig::new()
                .with_frames_in_flight(MAX_RING_SLOTS + 1)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_rejects_non_power_of_two_workgroup() {
        let config = PipelineConfig {
            workgroup_size: 100,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_zero_frame_rate() {
        let config = PipelineConfig::new().with_target_frame_rate(Some(0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_workgroup_count_rounds_up() {
        let config = PipelineConfig::default();
        assert_eq!(config.workgroup_count(0), 0);
        assert_eq!(config.workgroup_count(1), 1);
        assert_eq!(config.workgroup_count(128), 1);
        assert_eq!(config.workgroup_count(129), 2);
    }

    #[test]
    fn test_fence_timeout_ns() {
        assert_eq!(PipelineConfig::default().fence_timeout_ns(), u64::MAX);
        let bounded = PipelineConfig::new().with_fence_timeout(Some(Duration::from_millis(2)));
        assert_eq!(bounded.fence_timeout_ns(), 2_000_000);
    }
}
