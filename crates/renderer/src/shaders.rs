//! Compiled shader binaries consumed by the frame pipeline.
//!
//! Sources live in `shaders/`; compiled SPIR-V is looked up as
//! `<shader_dir>/<name>.spv`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use ringframe_rhi::RhiResult;
use ringframe_rhi::device::Device;
use ringframe_rhi::shader::{Shader, ShaderStage};

pub const GEOMETRY_VERT: &str = "geometry.vert";
pub const GEOMETRY_FRAG: &str = "geometry.frag";
pub const TRANSFORM_COMP: &str = "transform.comp";
pub const CULL_COMP: &str = "cull.comp";
pub const FULLSCREEN_VERT: &str = "fullscreen.vert";

/// File stem of a postprocess effect's fragment shader.
pub fn postprocess_fragment(effect: &str) -> String {
    format!("post_{effect}.frag")
}

pub fn spirv_path(shader_dir: &Path, name: &str) -> PathBuf {
    shader_dir.join(format!("{name}.spv"))
}

pub fn load(device: Arc<Device>, shader_dir: &Path, name: &str, stage: ShaderStage) -> RhiResult<Shader> {
    Shader::from_spirv_file(device, &spirv_path(shader_dir, name), stage, "main")
}

/// Modification time of a shader binary as last seen by its pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderStamp {
    path: PathBuf,
    modified: Option<SystemTime>,
}

impl ShaderStamp {
    /// Records the file's current modification time; a missing file is
    /// recorded as never modified.
    pub fn capture(path: PathBuf) -> Self {
        let modified = modified_time(&path);
        Self { path, modified }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when the file on disk is newer than the recorded time.
    pub fn changed(&self) -> bool {
        match (modified_time(&self.path), self.modified) {
            (Some(now), Some(seen)) => now > seen,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Marks the current file as seen.
    pub fn refresh(&mut self) {
        self.modified = modified_time(&self.path);
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;

    #[test]
    fn test_paths() {
        assert_eq!(
            spirv_path(Path::new("shaders/spirv"), CULL_COMP),
            Path::new("shaders/spirv/cull.comp.spv")
        );
        assert_eq!(postprocess_fragment("vignette"), "post_vignette.frag");
    }

    #[test]
    fn test_stamp_detects_newer_binary() {
        let dir = tempfile::tempdir().unwrap();
        let path = spirv_path(dir.path(), &postprocess_fragment("vignette"));
        let file = File::create(&path).unwrap();

        let mut stamp = ShaderStamp::capture(path.clone());
        assert!(!stamp.changed());

        file.set_modified(SystemTime::now() + Duration::from_secs(10)).unwrap();
        assert!(stamp.changed());

        stamp.refresh();
        assert!(!stamp.changed());
    }

    #[test]
    fn test_stamp_of_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let path = spirv_path(dir.path(), &postprocess_fragment("bloom"));

        let stamp = ShaderStamp::capture(path.clone());
        assert!(!stamp.changed());

        File::create(&path).unwrap();
        assert!(stamp.changed());

        fs::remove_file(&path).unwrap();
        assert!(!stamp.changed());
    }
}
