//! Async model loading.
//!
//! A load is a single operation: check the selected path against the
//! extension filter, read the bytes, and run the rig parse on a blocking
//! worker. Failures never replace a previously loaded rig — the caller only
//! sees a new rig on full success.

use std::path::Path;

use crate::avatar::AvatarRig;
use crate::config::ModelConfig;
use crate::error::AvatarError;

/// Loads [`AvatarRig`]s from user-selected files.
pub struct ModelLoader {
    extension: String,
}

impl ModelLoader {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            extension: config.extension.to_lowercase(),
        }
    }

    /// Load a rig from `path`.
    ///
    /// The file selection dialog lives outside this crate; by the time a path
    /// arrives here it is treated as the user's choice, but the extension
    /// filter and existence are still checked so a bad selection fails before
    /// any bytes are read.
    pub async fn load(&self, path: &Path) -> Result<AvatarRig, AvatarError> {
        let matches_filter = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&self.extension));
        if !matches_filter {
            return Err(AvatarError::BadExtension {
                path: path.display().to_string(),
                expected: self.extension.clone(),
            });
        }

        if !path.exists() {
            return Err(AvatarError::NotFound(path.display().to_string()));
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| AvatarError::Read(format!("{}: {}", path.display(), e)))?;

        tracing::debug!("Read {} bytes from {}", bytes.len(), path.display());

        // The glTF parse is CPU-bound; keep it off the async workers
        let rig = tokio::task::spawn_blocking(move || AvatarRig::parse(&bytes))
            .await
            .map_err(|e| AvatarError::Parse(format!("Parse task failed: {}", e)))??;

        if !rig.has_humanoid() {
            tracing::warn!("Loaded model has no humanoid bone map; tracking will stay inert");
        }

        Ok(rig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatar::test_support::{build_glb, TEST_GLTF_JSON};

    fn loader() -> ModelLoader {
        ModelLoader::new(&ModelConfig::default())
    }

    #[tokio::test]
    async fn test_load_nonexistent_path() {
        let err = loader()
            .load(Path::new("/nonexistent/model.vrm"))
            .await
            .unwrap_err();
        assert!(matches!(err, AvatarError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_load_wrong_extension() {
        let err = loader().load(Path::new("model.png")).await.unwrap_err();
        assert!(matches!(err, AvatarError::BadExtension { .. }));
    }

    #[tokio::test]
    async fn test_load_no_extension() {
        let err = loader().load(Path::new("model")).await.unwrap_err();
        assert!(matches!(err, AvatarError::BadExtension { .. }));
    }

    #[tokio::test]
    async fn test_load_valid_model() {
        let dir = std::env::temp_dir().join("facedriver-loader-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("model.vrm");
        std::fs::write(&path, build_glb(TEST_GLTF_JSON)).unwrap();

        let rig = loader().load(&path).await.unwrap();
        assert!(rig.has_humanoid());
        assert!(rig.bone_local_rotation("head").is_some());

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_load_corrupt_model() {
        let dir = std::env::temp_dir().join("facedriver-loader-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("corrupt.vrm");
        std::fs::write(&path, b"definitely not a glb").unwrap();

        let err = loader().load(&path).await.unwrap_err();
        assert!(matches!(err, AvatarError::Parse(_)));

        std::fs::remove_file(&path).ok();
    }
}
