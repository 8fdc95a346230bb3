//! Asset addresses
//!
//! Manifests refer to assets as `"phase.nickname"`. Inside the crate that
//! string is parsed once into an `AssetAddress`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BuildError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Load,
    Build,
    Base,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Load, Phase::Build, Phase::Base];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Load => "load",
            Phase::Build => "build",
            Phase::Base => "base",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL.into_iter().find(|p| p.as_str() == s).ok_or(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AssetAddress {
    pub phase: Phase,
    pub nickname: String,
}

impl AssetAddress {
    pub fn new(phase: Phase, nickname: impl Into<String>) -> Self {
        Self {
            phase,
            nickname: nickname.into(),
        }
    }
}

impl fmt::Display for AssetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.phase, self.nickname)
    }
}

/// A malformed address can never resolve, so it is reported the same way
/// as a missing one.
impl FromStr for AssetAddress {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let not_found = || BuildError::AddressNotFound { address: s.to_string() };

        let (phase, nickname) = s.split_once('.').ok_or_else(not_found)?;
        let phase: Phase = phase.parse().map_err(|_| not_found())?;
        if nickname.is_empty() {
            return Err(not_found());
        }
        Ok(AssetAddress::new(phase, nickname))
    }
}
