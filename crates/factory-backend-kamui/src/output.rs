//! Output directory layout and file naming.

use std::path::{Component, Path, PathBuf};

use crate::error::{KamuiError, KamuiResult};
use crate::request::Modality;

/// Default output root, relative to the working directory.
pub const DEFAULT_OUTPUT_ROOT: &str = "outputs";

/// Per-category subdirectories under the output root.
pub const OUTPUT_SUBDIRS: &[&str] = &["images", "videos", "audio", "3d"];

/// Maps modalities to directories under an output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    /// Creates a layout rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The output root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory artifacts of `modality` are written to.
    pub fn dir_for(&self, modality: Modality) -> PathBuf {
        self.root.join(modality.output_subdir())
    }

    /// Creates every category directory.
    pub fn ensure_dirs(&self) -> KamuiResult<()> {
        for subdir in OUTPUT_SUBDIRS {
            std::fs::create_dir_all(self.root.join(subdir))?;
        }
        Ok(())
    }
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_ROOT)
    }
}

/// Derives `<prefix>_<hash>.<ext>` from `seed_text`.
///
/// The hash is the first 8 hex digits of the BLAKE3 digest, so the same
/// prompt always maps to the same name.
pub fn default_file_name(modality: Modality, seed_text: &str) -> String {
    let digest = blake3::hash(seed_text.as_bytes()).to_hex();
    format!(
        "{}_{}.{}",
        modality.file_prefix(),
        &digest[..8],
        modality.default_extension()
    )
}

/// Rejects names that are not a single normal path component.
pub fn validate_file_name(name: &str) -> KamuiResult<()> {
    if name.trim().is_empty() {
        return Err(KamuiError::invalid_output_name(name, "name is empty"));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(KamuiError::invalid_output_name(
            name,
            "must be a plain file name without directories",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dir_for_modality() {
        let layout = OutputLayout::new("/srv/out");
        assert_eq!(layout.dir_for(Modality::Image), Path::new("/srv/out/images"));
        assert_eq!(layout.dir_for(Modality::Model3d), Path::new("/srv/out/3d"));
    }

    #[test]
    fn test_ensure_dirs_creates_all_categories() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path().join("outputs"));
        layout.ensure_dirs().unwrap();

        for subdir in OUTPUT_SUBDIRS {
            assert!(layout.root().join(subdir).is_dir());
        }

        // Idempotent
        layout.ensure_dirs().unwrap();
    }

    #[test]
    fn test_default_file_name_shape() {
        let name = default_file_name(Modality::Model3d, "a stone golem");
        assert!(name.starts_with("model_"));
        assert!(name.ends_with(".obj"));
        assert_eq!(name.len(), "model_".len() + 8 + ".obj".len());
    }

    #[test]
    fn test_validate_file_name() {
        assert!(validate_file_name("circle.jpg").is_ok());
        assert!(validate_file_name("").is_err());
        assert!(validate_file_name("..").is_err());
        assert!(validate_file_name("a/b.jpg").is_err());
        assert!(validate_file_name("/etc/passwd").is_err());
    }
}
