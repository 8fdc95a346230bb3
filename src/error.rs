//! Error System - One Enum, Classified
//!
//! Every fatal condition in the pipeline is a `BuildError`. Categories
//! decide how the driver treats them; only resource-lifecycle errors are
//! ever swallowed.

use std::path::PathBuf;
use serde::Serialize;
use thiserror::Error;

use crate::logging::Severity;

pub type Result<T> = std::result::Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    // Configuration
    #[error("Manifest not found: {path:?}")]
    ManifestNotFound { path: PathBuf },

    #[error("Manifest parse error in {path:?}: {reason}")]
    ManifestParse { path: PathBuf, reason: String },

    #[error("Malformed operation spec for {asset}: {reason}")]
    MalformedOperation { asset: String, reason: String },

    #[error("Unrecognised operation '{operation}' on {asset}")]
    UnrecognisedOperation { asset: String, operation: String },

    #[error("Unrecognised job class '{job}' in build target {target}")]
    UnrecognisedJobClass { target: String, job: String },

    #[error("Malformed job #{index} in build target {target}: {reason}")]
    MalformedJob { target: String, index: usize, reason: String },

    #[error("Unrecognized license '{license}'")]
    UnrecognizedLicense { license: String },

    #[error("Build target name '{target}' is reserved for mod metadata")]
    ReservedTargetName { target: String },

    #[error("Unsupported output type '{filetype}' in build target {target}")]
    UnsupportedOutputType { target: String, filetype: String },

    #[error("Invalid mod version '{version}': {reason}")]
    InvalidModVersion { version: String, reason: String },

    #[error("Cannot composite {base} ({base_size:?}) with {other} ({other_size:?}): sizes differ")]
    CompositeSizeMismatch {
        base: String,
        base_size: (u32, u32),
        other: String,
        other_size: (u32, u32),
    },

    // Lookup
    #[error("Could not find address {address} in registry")]
    AddressNotFound { address: String },

    #[error("No substitutions registered for context {target}-{index}")]
    ContextNotFound { target: String, index: usize },

    // Resource lifecycle
    #[error("Asset {nickname} [{path:?}] already released")]
    AlreadyReleased { nickname: String, path: PathBuf },

    // Escalation
    #[error("Unrecoverable state after {severity:?} event: {message}")]
    UnrecoverableState { severity: Severity, message: String },

    // I/O and codecs
    #[error("Failed to decode image {path:?}: {source}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to write image {path:?}: {source}")]
    ImageEncode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Configuration,
    Lookup,
    ResourceLifecycle,
    Escalation,
    Io,
}

impl BuildError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            BuildError::ManifestNotFound { .. }
            | BuildError::ManifestParse { .. }
            | BuildError::MalformedOperation { .. }
            | BuildError::UnrecognisedOperation { .. }
            | BuildError::UnrecognisedJobClass { .. }
            | BuildError::MalformedJob { .. }
            | BuildError::UnrecognizedLicense { .. }
            | BuildError::UnsupportedOutputType { .. }
            | BuildError::ReservedTargetName { .. }
            | BuildError::InvalidModVersion { .. }
            | BuildError::CompositeSizeMismatch { .. } => ErrorCategory::Configuration,
            BuildError::AddressNotFound { .. } | BuildError::ContextNotFound { .. } => {
                ErrorCategory::Lookup
            }
            BuildError::AlreadyReleased { .. } => ErrorCategory::ResourceLifecycle,
            BuildError::UnrecoverableState { .. } => ErrorCategory::Escalation,
            BuildError::ImageDecode { .. }
            | BuildError::ImageEncode { .. }
            | BuildError::Io { .. }
            | BuildError::Serialization(_) => ErrorCategory::Io,
        }
    }

    /// Everything except a double release aborts the run.
    pub fn is_fatal(&self) -> bool {
        self.category() != ErrorCategory::ResourceLifecycle
    }

    pub(crate) fn malformed(asset: &str, reason: impl Into<String>) -> Self {
        BuildError::MalformedOperation {
            asset: asset.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }
}
