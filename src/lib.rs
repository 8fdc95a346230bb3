//! Mod Asset Builder - manifest-driven image asset pipeline
//!
//! # Guarantees
//! 1. Addresses resolve through the registry, never through object graphs
//! 2. Operations run in `order`, ties in declaration order
//! 3. The build graph resolves completely before any file is written
//! 4. SEVERE and CRITICAL events abort the run
//! 5. Every opened image is released exactly once

pub mod error;
pub mod logging;
pub mod address;
pub mod registry;
pub mod naming;
pub mod license;
pub mod mod_config;
pub mod manifest;
pub mod operation;
pub mod transform;
pub mod asset;
pub mod composite;
pub mod build;
pub mod hashing;
pub mod pipeline;

pub use error::{BuildError, ErrorCategory, Result};
pub use logging::{LogEvent, LogPhase, LogTrail, PhaseLogger, Severity};
pub use address::{AssetAddress, Phase};
pub use registry::{AssetHandle, AssetRegistry, SubstitutionContext};
pub use naming::{render, NameTemplate};
pub use license::{License, LicenseSpec, LicenseType};
pub use operation::{Amount, EffectResolution, Operation, OperationKind, PixelBox};
pub use transform::{TransformPipeline, TransformStep};
pub use asset::{AssetLoader, RawAsset, TransformedAsset};
pub use build::{BuildGraphResolver, BuildPlan, BuildTarget, BuiltOutput, Job};
pub use pipeline::{AssetPipeline, BuildReport, PipelineSettings};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
