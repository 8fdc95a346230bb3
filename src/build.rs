//! Build Graph - targets, jobs, planning and execution
//!
//! Targets run in manifest order. A target may use `load.*` assets and
//! the outputs of earlier targets (`build.*`). The whole graph is planned
//! before anything is written; execution only starts from a complete
//! `BuildPlan`.

use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{DynamicImage, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;
use tracing::instrument;

use crate::address::{AssetAddress, Phase};
use crate::composite;
use crate::error::{BuildError, Result};
use crate::hashing::sha256_hex;
use crate::logging::PhaseLogger;
use crate::manifest::{AssetManifest, BuildEntry};
use crate::mod_config::{BUILD_INFO_CONTEXT, MOD_INFO_CONTEXT};
use crate::naming::{self, NameTemplate};
use crate::registry::{AssetHandle, AssetRegistry, SubstitutionContext};

pub const COMPOSITE_JOB: &str = "composite-with";
pub const COMPOSITE_TARGET: &str = "$composite-target$";
pub const MASK_TARGET: &str = "$mask-target$";
const NO_MASK: &str = "none";

#[derive(Debug, Clone, Deserialize)]
struct CompositeSpec {
    asset: String,
    #[serde(default = "no_mask")]
    mask: String,
}

fn no_mask() -> String {
    NO_MASK.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeJob {
    pub asset: AssetAddress,
    pub mask: Option<AssetAddress>,
}

impl CompositeJob {
    fn from_spec(spec: &CompositeSpec) -> Result<Self> {
        let mask = match spec.mask.trim() {
            NO_MASK => None,
            address => Some(address.parse()?),
        };
        Ok(Self {
            asset: spec.asset.parse()?,
            mask,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    Composite(CompositeJob),
}

impl Job {
    pub fn class(&self) -> &'static str {
        match self {
            Job::Composite(_) => COMPOSITE_JOB,
        }
    }

    /// A raw job is a single-key mapping: `{<job class>: <body>}`.
    pub fn from_raw(target: &str, index: usize, raw: &Mapping) -> Result<Self> {
        let malformed = |reason: String| BuildError::MalformedJob {
            target: target.to_string(),
            index,
            reason,
        };

        let mut entries = raw.iter();
        let (Some((class, body)), None) = (entries.next(), entries.next()) else {
            return Err(malformed(format!("expected exactly one job class, found {}", raw.len())));
        };

        match class.as_str() {
            Some(COMPOSITE_JOB) => {
                let spec: CompositeSpec =
                    serde_yaml::from_value(body.clone()).map_err(|e| malformed(e.to_string()))?;
                Ok(Job::Composite(CompositeJob::from_spec(&spec)?))
            }
            other => Err(BuildError::UnrecognisedJobClass {
                target: target.to_string(),
                job: other.map_or_else(|| format!("{:?}", class), str::to_string),
            }),
        }
    }

    /// Placeholders this job contributes to its naming context.
    pub fn substitutions(&self) -> Vec<(String, String)> {
        match self {
            Job::Composite(job) => {
                let mut subs = vec![(COMPOSITE_TARGET.to_string(), job.asset.nickname.clone())];
                if let Some(mask) = &job.mask {
                    subs.push((MASK_TARGET.to_string(), mask.nickname.clone()));
                }
                subs
            }
        }
    }

    fn addresses(&self) -> Vec<&AssetAddress> {
        match self {
            Job::Composite(job) => std::iter::once(&job.asset).chain(job.mask.as_ref()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuildTarget {
    pub reference: String,
    pub output_type: String,
    pub format: ImageFormat,
    pub output_dir: PathBuf,
    pub name: NameTemplate,
    pub base: AssetAddress,
    pub jobs: Vec<Job>,
}

impl BuildTarget {
    pub fn from_entry(reference: &str, entry: &BuildEntry) -> Result<Self> {
        // Substitution contexts are keyed by target name; these two hold mod metadata.
        if reference == MOD_INFO_CONTEXT || reference == BUILD_INFO_CONTEXT {
            return Err(BuildError::ReservedTargetName {
                target: reference.to_string(),
            });
        }

        let output_type = entry.outputs.filetype.trim().to_string();
        let format = ImageFormat::from_extension(&output_type)
            .filter(ImageFormat::writing_enabled)
            .ok_or_else(|| BuildError::UnsupportedOutputType {
                target: reference.to_string(),
                filetype: output_type.clone(),
            })?;

        let jobs = entry
            .jobs
            .iter()
            .enumerate()
            .map(|(index, raw)| Job::from_raw(reference, index, raw))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            reference: reference.to_string(),
            output_type,
            format,
            output_dir: PathBuf::from(&entry.outputs.dir),
            name: NameTemplate::new(entry.outputs.name.clone()),
            base: entry.base.parse()?,
            jobs,
        })
    }

    pub fn context(&self, index: usize) -> SubstitutionContext {
        SubstitutionContext::new(index, self.reference.clone())
    }

    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("img")
    }

    pub fn output_path(&self, output_root: &Path, name: &str) -> PathBuf {
        output_root
            .join(&self.output_dir)
            .join(format!("{}.{}", name, self.extension()))
    }
}

pub fn targets_from_manifest(manifest: &AssetManifest) -> Result<Vec<BuildTarget>> {
    manifest
        .build
        .iter()
        .map(|(reference, entry)| BuildTarget::from_entry(reference, entry))
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedJob {
    pub target: String,
    pub index: usize,
    pub class: &'static str,
    pub output_name: String,
    pub output_path: PathBuf,
    pub size: (u32, u32),
    #[serde(skip)]
    pub job: Job,
}

#[derive(Debug, Clone)]
pub struct PlannedTarget {
    pub target: BuildTarget,
    pub jobs: Vec<PlannedJob>,
}

/// A fully resolved build graph.
#[derive(Debug, Clone, Default)]
pub struct BuildPlan {
    pub targets: Vec<PlannedTarget>,
}

impl BuildPlan {
    pub fn outputs(&self) -> impl Iterator<Item = &PlannedJob> {
        self.targets.iter().flat_map(|t| t.jobs.iter())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltOutput {
    pub target: String,
    pub index: usize,
    pub name: String,
    pub path: PathBuf,
    pub size: [u32; 2],
    pub hash: String,
}

pub struct BuildGraphResolver {
    output_root: PathBuf,
    logger: PhaseLogger,
}

impl BuildGraphResolver {
    pub fn new(output_root: impl Into<PathBuf>, logger: PhaseLogger) -> Self {
        Self {
            output_root: output_root.into(),
            logger,
        }
    }

    /// Resolve every address of every target without writing anything.
    ///
    /// `build.*` addresses may name outputs of earlier targets in this
    /// same plan. Those take precedence over stale registry entries. A
    /// target's own outputs only become addressable once all its jobs ran.
    #[instrument(skip_all)]
    pub fn plan(&self, targets: Vec<BuildTarget>, registry: &AssetRegistry) -> Result<BuildPlan> {
        let mut planned_sizes: HashMap<String, (u32, u32)> = HashMap::new();
        let mut plan = BuildPlan::default();

        let size_of = |address: &AssetAddress, planned: &HashMap<String, (u32, u32)>| -> Result<(u32, u32)> {
            if address.phase == Phase::Build {
                if let Some(size) = planned.get(&address.nickname) {
                    return Ok(*size);
                }
            }
            registry.resolve(address).map(AssetHandle::dimensions)
        };

        for target in targets {
            let base_size = size_of(&target.base, &planned_sizes)?;
            let mut jobs = Vec::with_capacity(target.jobs.len());
            let mut produced: Vec<String> = Vec::with_capacity(target.jobs.len());

            for (index, job) in target.jobs.iter().enumerate() {
                for address in job.addresses() {
                    let size = size_of(address, &planned_sizes)?;
                    if size != base_size {
                        return Err(BuildError::CompositeSizeMismatch {
                            base: target.base.to_string(),
                            base_size,
                            other: address.to_string(),
                            other_size: size,
                        });
                    }
                }

                let output_name = target.name.render(&job.substitutions());
                let unresolved = naming::placeholders(&output_name);
                if !unresolved.is_empty() {
                    self.logger.medium(format!(
                        "Output name '{}' for {}-{} keeps unresolved placeholders {:?}",
                        output_name, target.reference, index, unresolved
                    ));
                }
                if planned_sizes.contains_key(&output_name) || produced.contains(&output_name) {
                    self.logger.medium(format!(
                        "Output build.{} is produced more than once; the last one wins",
                        output_name
                    ));
                }
                produced.push(output_name.clone());

                jobs.push(PlannedJob {
                    target: target.reference.clone(),
                    index,
                    class: job.class(),
                    output_path: target.output_path(&self.output_root, &output_name),
                    output_name,
                    size: base_size,
                    job: job.clone(),
                });
            }

            for name in produced {
                planned_sizes.insert(name, base_size);
            }
            self.logger.low(format!("Planned {} with {} job(s)", target.reference, jobs.len()));
            plan.targets.push(PlannedTarget { target, jobs });
        }

        Ok(plan)
    }

    /// Run a plan: composite, name from the registered substitutions,
    /// write, and register each output under `build`.
    #[instrument(skip_all)]
    pub fn execute(&self, plan: BuildPlan, registry: &mut AssetRegistry) -> Result<Vec<BuiltOutput>> {
        let mut outputs = vec![];

        for PlannedTarget { target, jobs } in plan.targets {
            self.logger.low(format!("Building {}", target.reference));
            let base = registry.resolve(&target.base)?.clone();

            let mut composited = Vec::with_capacity(jobs.len());
            for planned in &jobs {
                let image = self.run_job(&target, planned, &base, registry)?;
                let context = target.context(planned.index);
                for (placeholder, value) in planned.job.substitutions() {
                    registry.register_substitution(&context, &placeholder, &value);
                }
                composited.push((context, image));
            }

            let dir = self.output_root.join(&target.output_dir);
            fs::create_dir_all(&dir).map_err(|e| BuildError::io(&dir, e))?;

            for (context, image) in composited {
                let name = target.name.render(&registry.substitutions_for(&context)?);
                let path = target.output_path(&self.output_root, &name);
                let hash = write_image(&image, target.format, &path)?;
                let size = [image.width(), image.height()];

                registry.register(Phase::Build, &name, AssetHandle::new(name.clone(), Arc::new(image)));
                self.logger.low(format!("Wrote {:?}", path));

                outputs.push(BuiltOutput {
                    target: target.reference.clone(),
                    index: context.index,
                    name,
                    path,
                    size,
                    hash,
                });
            }
        }

        Ok(outputs)
    }

    pub fn build(&self, targets: Vec<BuildTarget>, registry: &mut AssetRegistry) -> Result<Vec<BuiltOutput>> {
        let plan = self.plan(targets, registry)?;
        self.execute(plan, registry)
    }

    fn run_job(
        &self,
        target: &BuildTarget,
        planned: &PlannedJob,
        base: &AssetHandle,
        registry: &AssetRegistry,
    ) -> Result<RgbaImage> {
        let image = match &planned.job {
            Job::Composite(job) => {
                let other = registry.resolve(&job.asset)?;
                check_same_size(&target.base, base, &job.asset, other)?;
                self.logger.low(format!(
                    "Running {} job {}-{} with {}",
                    COMPOSITE_JOB, target.reference, planned.index, job.asset
                ));

                match &job.mask {
                    Some(mask_address) => {
                        let mask = registry.resolve(mask_address)?;
                        check_same_size(&target.base, base, mask_address, mask)?;
                        composite::mask_composite(base.image(), other.image(), mask.image())
                    }
                    None => composite::alpha_composite(base.image(), other.image()),
                }
            }
        };

        if image.width() == 0 || image.height() == 0 {
            return Err(BuildError::UnrecognisedJobClass {
                target: target.reference.clone(),
                job: format!("{} #{} produced no image", planned.job.class(), planned.index),
            });
        }
        Ok(image)
    }
}

fn check_same_size(
    base_address: &AssetAddress,
    base: &AssetHandle,
    other_address: &AssetAddress,
    other: &AssetHandle,
) -> Result<()> {
    if base.dimensions() == other.dimensions() {
        return Ok(());
    }
    Err(BuildError::CompositeSizeMismatch {
        base: base_address.to_string(),
        base_size: base.dimensions(),
        other: other_address.to_string(),
        other_size: other.dimensions(),
    })
}

/// Encode, write, and return the SHA-256 of the bytes on disk.
fn write_image(image: &RgbaImage, format: ImageFormat, path: &Path) -> Result<String> {
    let dynamic = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(image.clone()).to_rgb8()),
        _ => DynamicImage::ImageRgba8(image.clone()),
    };

    let mut bytes = Vec::new();
    dynamic
        .write_to(&mut Cursor::new(&mut bytes), format)
        .map_err(|source| BuildError::ImageEncode {
            path: path.to_path_buf(),
            source,
        })?;
    fs::write(path, &bytes).map_err(|e| BuildError::io(path, e))?;
    Ok(sha256_hex(&bytes))
}
