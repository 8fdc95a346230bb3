//! Asset Pipeline - Single Entry Point
//!
//! load -> transform -> plan -> build, strictly in sequence. Any fatal
//! error aborts the whole run; nothing is retried and no target is
//! skipped.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::address::Phase;
use crate::asset::{AppliedOperation, AssetLoader, TransformedAsset};
use crate::build::{targets_from_manifest, BuildGraphResolver, BuildPlan, BuildTarget, BuiltOutput};
use crate::error::Result;
use crate::hashing::compute_report_hash;
use crate::license::License;
use crate::logging::{LogPhase, LogTrail};
use crate::manifest::{AssetManifest, BUILDABLE_ASSETS_CONFIG_FILE};
use crate::mod_config::{mod_context, ModConfig};
use crate::registry::{AssetHandle, AssetRegistry};
use crate::transform::TransformPipeline;
use crate::ENGINE_VERSION;

pub const BUILDABLE_ASSETS_PATH: &str = "mod/build/assets/";
pub const BUILT_ASSETS_PATH: &str = "mod/assets/";

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Source images and the asset manifest live here.
    pub assets_root: PathBuf,
    /// Relative to `assets_root`.
    pub manifest_file: PathBuf,
    /// Build output directories are relative to this.
    pub output_root: PathBuf,
    pub mod_config: Option<PathBuf>,
}

impl PipelineSettings {
    pub fn manifest_path(&self) -> PathBuf {
        self.assets_root.join(&self.manifest_file)
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            assets_root: PathBuf::from(BUILDABLE_ASSETS_PATH),
            manifest_file: PathBuf::from(BUILDABLE_ASSETS_CONFIG_FILE),
            output_root: PathBuf::from(BUILT_ASSETS_PATH),
            mod_config: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AssetLicenseEntry {
    pub asset: String,
    pub source_path: PathBuf,
    pub license: License,
    pub applied: Vec<AppliedOperation>,
}

impl AssetLicenseEntry {
    fn from_asset(asset: &TransformedAsset) -> Self {
        Self {
            asset: asset.nickname().to_string(),
            source_path: asset.source_path().to_path_buf(),
            license: asset.license().clone(),
            applied: asset.applied().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub engine_version: String,
    pub outputs: Vec<BuiltOutput>,
    pub licenses: Vec<AssetLicenseEntry>,
    pub report_hash: String,
}

struct Prepared {
    transformed: Vec<TransformedAsset>,
    targets: Vec<BuildTarget>,
}

/// Owns the registry and the log trail for one run.
pub struct AssetPipeline {
    settings: PipelineSettings,
    trail: LogTrail,
    registry: AssetRegistry,
}

impl AssetPipeline {
    pub fn new(settings: PipelineSettings) -> Self {
        let trail = LogTrail::new();
        let registry = AssetRegistry::new(trail.logger(LogPhase::Manager));
        Self {
            settings,
            trail,
            registry,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn trail(&self) -> &LogTrail {
        &self.trail
    }

    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    /// Resolve the build graph without writing anything.
    #[instrument(skip(self))]
    pub fn plan(&mut self) -> Result<BuildPlan> {
        let prepared = self.prepare()?;
        self.resolver().plan(prepared.targets, &self.registry)
    }

    /// Load, transform, and resolve licenses only.
    #[instrument(skip(self))]
    pub fn licenses(&mut self) -> Result<Vec<AssetLicenseEntry>> {
        let prepared = self.prepare()?;
        Ok(prepared.transformed.iter().map(AssetLicenseEntry::from_asset).collect())
    }

    /// The full run.
    #[instrument(skip(self))]
    pub fn build(&mut self) -> Result<BuildReport> {
        let prepared = self.prepare()?;
        let resolver = self.resolver();
        let plan = resolver.plan(prepared.targets, &self.registry)?;
        let outputs = resolver.execute(plan, &mut self.registry)?;
        info!(outputs = outputs.len(), "Build finished");

        let mut report = BuildReport {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            engine_version: ENGINE_VERSION.to_string(),
            outputs,
            licenses: prepared.transformed.iter().map(AssetLicenseEntry::from_asset).collect(),
            report_hash: String::new(),
        };
        report.report_hash = compute_report_hash(&report)?;
        Ok(report)
    }

    fn resolver(&self) -> BuildGraphResolver {
        BuildGraphResolver::new(&self.settings.output_root, self.trail.logger(LogPhase::Output))
    }

    fn prepare(&mut self) -> Result<Prepared> {
        if let Some(path) = self.settings.mod_config.clone() {
            self.load_mod_config(&path)?;
        }

        let manifest = AssetManifest::load(&self.settings.manifest_path())?;
        let targets = targets_from_manifest(&manifest)?;

        // Dropping the loader on an error path releases every handle.
        let mut loader = AssetLoader::open(
            &manifest,
            &self.settings.assets_root,
            self.trail.logger(LogPhase::Load),
        )?;

        let context = mod_context(&self.registry);
        let transformer = TransformPipeline::new(self.trail.logger(LogPhase::Modify));
        let mut transformed = Vec::with_capacity(loader.assets().len());
        for raw in loader.assets() {
            let asset = transformer.run(raw, &context)?;
            self.registry.register(
                Phase::Load,
                asset.nickname(),
                AssetHandle::new(asset.nickname(), asset.image()),
            );
            transformed.push(asset);
        }
        loader.dispose();

        Ok(Prepared { transformed, targets })
    }

    fn load_mod_config(&mut self, path: &Path) -> Result<()> {
        let config = ModConfig::load(path)?;
        config.register(&mut self.registry);
        self.trail
            .logger(LogPhase::Config)
            .low(format!("Loaded mod config {:?}", path));
        Ok(())
    }
}
