//! SDK version resolution for `--forcesdk`.

use std::path::Path;

/// SDK version builds are pinned to.
pub const PINNED_SDK_VERSION: &str = "24.10.2230.6.dc";

/// Resolves the build toolchain version for an installer image.
///
/// `None` means no version is known and `--forcesdk` is left off the build
/// command.
pub trait BuildVersionSource {
    fn extract_build_version(&self, installer_image: &Path) -> Option<String>;
}

/// Always reports the same version, regardless of the image.
#[derive(Debug, Clone)]
pub struct PinnedVersion(String);

impl PinnedVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }
}

impl Default for PinnedVersion {
    fn default() -> Self {
        Self::new(PINNED_SDK_VERSION)
    }
}

impl BuildVersionSource for PinnedVersion {
    fn extract_build_version(&self, _installer_image: &Path) -> Option<String> {
        let version = self.0.trim();
        (!version.is_empty()).then(|| version.to_string())
    }
}
