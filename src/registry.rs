//! Asset Registry - Phase-Keyed Lookup
//!
//! One authoritative table of every asset produced so far, keyed by
//! `(phase, nickname)`, plus the substitution contexts used for naming.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use image::RgbaImage;

use crate::address::{AssetAddress, Phase};
use crate::error::{BuildError, Result};
use crate::logging::{LogPhase, LogTrail, PhaseLogger};

/// Shared, read-only view of a registered image.
#[derive(Clone)]
pub struct AssetHandle {
    nickname: String,
    image: Arc<RgbaImage>,
}

impl AssetHandle {
    pub fn new(nickname: impl Into<String>, image: Arc<RgbaImage>) -> Self {
        Self {
            nickname: nickname.into(),
            image,
        }
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn same_image(&self, other: &AssetHandle) -> bool {
        Arc::ptr_eq(&self.image, &other.image)
    }
}

impl fmt::Debug for AssetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetHandle")
            .field("nickname", &self.nickname)
            .field("dimensions", &self.image.dimensions())
            .finish()
    }
}

/// `(job index, build target reference)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubstitutionContext {
    pub index: usize,
    pub target: String,
}

impl SubstitutionContext {
    pub fn new(index: usize, target: impl Into<String>) -> Self {
        Self {
            index,
            target: target.into(),
        }
    }
}

impl fmt::Display for SubstitutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.target, self.index)
    }
}

pub struct AssetRegistry {
    assets: HashMap<Phase, HashMap<String, AssetHandle>>,
    substitutions: HashMap<String, BTreeMap<usize, Vec<(String, String)>>>,
    logger: PhaseLogger,
}

impl AssetRegistry {
    pub fn new(logger: PhaseLogger) -> Self {
        let assets = Phase::ALL.into_iter().map(|p| (p, HashMap::new())).collect();
        Self {
            assets,
            substitutions: HashMap::new(),
            logger,
        }
    }

    /// Last write wins for a repeated `(phase, nickname)`.
    pub fn register(&mut self, phase: Phase, nickname: &str, handle: AssetHandle) {
        let previous = self
            .assets
            .entry(phase)
            .or_default()
            .insert(nickname.to_string(), handle);
        let verb = if previous.is_some() { "Re-registered" } else { "Registered" };
        self.logger.low(format!("{} asset: {}.{}", verb, phase, nickname));
    }

    pub fn resolve(&self, address: &AssetAddress) -> Result<&AssetHandle> {
        self.assets
            .get(&address.phase)
            .and_then(|table| table.get(&address.nickname))
            .ok_or_else(|| BuildError::AddressNotFound {
                address: address.to_string(),
            })
    }

    /// Resolve a `"phase.nickname"` string.
    pub fn get(&self, address: &str) -> Result<&AssetHandle> {
        let address: AssetAddress = address.parse()?;
        self.resolve(&address)
    }

    pub fn contains(&self, address: &AssetAddress) -> bool {
        self.resolve(address).is_ok()
    }

    pub fn nicknames(&self, phase: Phase) -> Vec<&str> {
        let mut names: Vec<_> = self
            .assets
            .get(&phase)
            .map(|t| t.keys().map(String::as_str).collect())
            .unwrap_or_default();
        names.sort_unstable();
        names
    }

    /// Adds or overwrites one placeholder; other placeholders in the same
    /// context are left alone. Insertion order is kept for rendering.
    pub fn register_substitution(
        &mut self,
        context: &SubstitutionContext,
        placeholder: &str,
        value: &str,
    ) {
        let entries = self
            .substitutions
            .entry(context.target.clone())
            .or_default()
            .entry(context.index)
            .or_default();

        match entries.iter_mut().find(|(p, _)| p == placeholder) {
            Some(entry) => entry.1 = value.to_string(),
            None => entries.push((placeholder.to_string(), value.to_string())),
        }
        self.logger.low(format!(
            "Registered substitution in context {}: {} -> {}.",
            context, placeholder, value
        ));
    }

    pub fn substitutions_for(&self, context: &SubstitutionContext) -> Result<Vec<(String, String)>> {
        self.substitutions
            .get(&context.target)
            .and_then(|by_index| by_index.get(&context.index))
            .cloned()
            .ok_or_else(|| BuildError::ContextNotFound {
                target: context.target.clone(),
                index: context.index,
            })
    }
}

impl Default for AssetRegistry {
    fn default() -> Self {
        Self::new(LogTrail::new().logger(LogPhase::Manager))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(nickname: &str, w: u32, h: u32) -> AssetHandle {
        AssetHandle::new(nickname, Arc::new(RgbaImage::new(w, h)))
    }

    #[test]
    fn test_get_after_register() {
        let mut registry = AssetRegistry::default();
        let x = handle("foo", 2, 2);
        registry.register(Phase::Load, "foo", x.clone());

        let found = registry.get("load.foo").unwrap();
        assert!(found.same_image(&x));
    }

    #[test]
    fn test_other_phase_is_not_found() {
        let mut registry = AssetRegistry::default();
        registry.register(Phase::Load, "foo", handle("foo", 1, 1));

        let err = registry.get("build.foo").unwrap_err();
        assert!(matches!(err, BuildError::AddressNotFound { ref address } if address == "build.foo"));
    }

    #[test]
    fn test_malformed_address_is_not_found() {
        let registry = AssetRegistry::default();
        assert!(matches!(registry.get("foo"), Err(BuildError::AddressNotFound { .. })));
        assert!(matches!(registry.get("nowhere.foo"), Err(BuildError::AddressNotFound { .. })));
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = AssetRegistry::default();
        registry.register(Phase::Build, "icon", handle("icon", 1, 1));
        let second = handle("icon", 4, 4);
        registry.register(Phase::Build, "icon", second.clone());

        assert!(registry.get("build.icon").unwrap().same_image(&second));
        assert_eq!(registry.nicknames(Phase::Build), vec!["icon"]);
    }

    #[test]
    fn test_substitutions_keep_order_and_overwrite_by_key() {
        let mut registry = AssetRegistry::default();
        let ctx = SubstitutionContext::new(0, "icon");
        registry.register_substitution(&ctx, "$composite-target$", "bg");
        registry.register_substitution(&ctx, "$mask-target$", "mask");
        registry.register_substitution(&ctx, "$composite-target$", "fg");

        let subs = registry.substitutions_for(&ctx).unwrap();
        assert_eq!(
            subs,
            vec![
                ("$composite-target$".to_string(), "fg".to_string()),
                ("$mask-target$".to_string(), "mask".to_string()),
            ]
        );
    }

    #[test]
    fn test_contexts_are_independent() {
        let mut registry = AssetRegistry::default();
        registry.register_substitution(&SubstitutionContext::new(0, "icon"), "$a$", "1");

        let err = registry
            .substitutions_for(&SubstitutionContext::new(1, "icon"))
            .unwrap_err();
        assert!(matches!(err, BuildError::ContextNotFound { index: 1, .. }));
        assert!(registry
            .substitutions_for(&SubstitutionContext::new(0, "banner"))
            .is_err());
    }
}
