//! Assets - raw source images and their transformed results.
//!
//! A `RawAsset` owns its decoded image until it is released. Releasing
//! twice is reported, never ignored. `AssetLoader` opens every `load`
//! entry and guarantees release on every exit path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbaImage;
use serde::Serialize;

use crate::error::{BuildError, Result};
use crate::license::{License, LicenseSpec};
use crate::logging::PhaseLogger;
use crate::manifest::{AssetManifest, LoadEntry};
use crate::operation::{parse_operations, Operation, OperationKind};
use crate::transform::TransformStep;

#[derive(Debug)]
pub struct RawAsset {
    nickname: String,
    source_path: PathBuf,
    license_spec: LicenseSpec,
    operations: Vec<Operation>,
    image: Option<RgbaImage>,
}

impl RawAsset {
    /// Decode `assets_root/entry.path` and parse its operations.
    pub fn open(nickname: &str, entry: &LoadEntry, assets_root: &Path) -> Result<Self> {
        let operations = parse_operations(nickname, &entry.on_load)?;
        let source_path = assets_root.join(&entry.path);
        let image = image::open(&source_path)
            .map_err(|source| BuildError::ImageDecode {
                path: source_path.clone(),
                source,
            })?
            .to_rgba8();

        Ok(Self::from_image(nickname, source_path, entry.licensing.clone(), operations, image))
    }

    /// `operations` are sorted (stably) by order here.
    pub fn from_image(
        nickname: impl Into<String>,
        source_path: impl Into<PathBuf>,
        license_spec: LicenseSpec,
        mut operations: Vec<Operation>,
        image: RgbaImage,
    ) -> Self {
        crate::operation::sort_operations(&mut operations);
        Self {
            nickname: nickname.into(),
            source_path: source_path.into(),
            license_spec,
            operations,
            image: Some(image),
        }
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn license_spec(&self) -> &LicenseSpec {
        &self.license_spec
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn image(&self) -> Result<&RgbaImage> {
        self.image.as_ref().ok_or_else(|| self.already_released())
    }

    pub fn is_released(&self) -> bool {
        self.image.is_none()
    }

    pub fn release(&mut self) -> Result<()> {
        match self.image.take() {
            Some(_) => Ok(()),
            None => Err(self.already_released()),
        }
    }

    fn already_released(&self) -> BuildError {
        BuildError::AlreadyReleased {
            nickname: self.nickname.clone(),
            path: self.source_path.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AppliedOperation {
    pub order: i64,
    pub kind: OperationKind,
    pub step: TransformStep,
    pub size: (u32, u32),
}

/// Result of running one `RawAsset` through its operations. Immutable.
#[derive(Debug, Clone)]
pub struct TransformedAsset {
    nickname: String,
    source_path: PathBuf,
    license: License,
    image: Arc<RgbaImage>,
    applied: Vec<AppliedOperation>,
}

impl TransformedAsset {
    pub(crate) fn new(
        raw: &RawAsset,
        license: License,
        image: Arc<RgbaImage>,
        applied: Vec<AppliedOperation>,
    ) -> Self {
        Self {
            nickname: raw.nickname.clone(),
            source_path: raw.source_path.clone(),
            license,
            image,
            applied,
        }
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn license(&self) -> &License {
        &self.license
    }

    pub fn image(&self) -> Arc<RgbaImage> {
        Arc::clone(&self.image)
    }

    pub fn applied(&self) -> &[AppliedOperation] {
        &self.applied
    }
}

/// Opens every `load` entry of a manifest, in manifest order.
///
/// Call `dispose()` when done. Dropping an undisposed loader releases
/// whatever is still held without reporting.
pub struct AssetLoader {
    assets: Vec<RawAsset>,
    logger: PhaseLogger,
}

impl AssetLoader {
    pub fn open(manifest: &AssetManifest, assets_root: &Path, logger: PhaseLogger) -> Result<Self> {
        if !assets_root.exists() {
            return Err(BuildError::ManifestNotFound {
                path: assets_root.to_path_buf(),
            });
        }

        let mut loader = Self::from_assets(Vec::with_capacity(manifest.load.len()), logger);
        for (nickname, entry) in manifest.load.iter() {
            let asset = RawAsset::open(nickname, entry, assets_root)?;
            loader.logger.low(format!("Loaded asset {} [{}]", nickname, entry.path));
            loader.assets.push(asset);
        }
        Ok(loader)
    }

    pub fn from_assets(assets: Vec<RawAsset>, logger: PhaseLogger) -> Self {
        Self { assets, logger }
    }

    pub fn assets(&self) -> &[RawAsset] {
        &self.assets
    }

    pub fn assets_mut(&mut self) -> &mut [RawAsset] {
        &mut self.assets
    }

    /// Release every asset. Double releases are logged at MEDIUM and
    /// otherwise ignored.
    pub fn dispose(&mut self) {
        for asset in &mut self.assets {
            if let Err(err) = asset.release() {
                self.logger.medium(format!(
                    "Asset {} attempted to be disposed when already finalised ({}).",
                    asset.nickname(),
                    err
                ));
            }
        }
    }
}

impl Drop for AssetLoader {
    fn drop(&mut self) {
        for asset in &mut self.assets {
            if !asset.is_released() {
                let _ = asset.release();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogPhase, LogTrail, Severity};

    fn raw(nickname: &str) -> RawAsset {
        RawAsset::from_image(
            nickname,
            format!("{}.png", nickname),
            LicenseSpec {
                license: "CC0".into(),
                attribution: String::new(),
                url: String::new(),
            },
            vec![],
            RgbaImage::new(2, 2),
        )
    }

    #[test]
    fn test_release_once_then_report() {
        let mut asset = raw("bg");
        assert!(asset.release().is_ok());
        assert!(asset.is_released());

        let err = asset.release().unwrap_err();
        assert!(matches!(err, BuildError::AlreadyReleased { .. }));
        assert!(asset.is_released());
        assert!(asset.image().is_err());
    }

    #[test]
    fn test_double_dispose_is_reported_not_fatal() {
        let trail = LogTrail::new();
        let mut loader = AssetLoader::from_assets(vec![raw("a"), raw("b")], trail.logger(LogPhase::Load));

        loader.dispose();
        assert_eq!(trail.count_at_least(Severity::Medium), 0);

        loader.dispose();
        assert_eq!(trail.count_at_least(Severity::Medium), 2);
        assert!(loader.assets().iter().all(RawAsset::is_released));
    }

    #[test]
    fn test_missing_assets_root() {
        let manifest = AssetManifest::parse("load: {}\n", Path::new("m.yml")).unwrap();
        let result = AssetLoader::open(&manifest, Path::new("/no/such/root"), LogTrail::new().logger(LogPhase::Load));
        assert!(matches!(result, Err(BuildError::ManifestNotFound { .. })));
    }
}
