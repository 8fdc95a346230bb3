//! Mod metadata (`mod-config.yml`) and the global substitution context
//! it provides to licenses and names.

use std::path::Path;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::error::{BuildError, Result};
use crate::registry::{AssetRegistry, SubstitutionContext};

pub const MOD_CONFIG_FILENAME: &str = "mod-config.yml";
pub const DEFAULT_CONTEXT_INSTANCE: usize = 0;
pub const MOD_INFO_CONTEXT: &str = "mod-info";
pub const BUILD_INFO_CONTEXT: &str = "build-info";

#[derive(Debug, Clone, Deserialize)]
pub struct ModConfig {
    #[serde(default)]
    pub info: Mapping,
    #[serde(default)]
    pub build: Option<BuildInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildInfo {
    #[serde(default)]
    pub path_format: Value,
    #[serde(default)]
    pub zip_options: ZipOptions,
    #[serde(default)]
    pub factorio_dirs: FactorioDirs,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ZipOptions {
    #[serde(default)]
    pub store_only: Value,
    #[serde(default)]
    pub refresh_only: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FactorioDirs {
    #[serde(default)]
    pub game_path: Value,
    #[serde(default)]
    pub mods_path: Value,
}

impl ModConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BuildError::ManifestNotFound { path: path.to_path_buf() });
        }
        let content = std::fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
        Self::parse(&content, path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let config: ModConfig =
            serde_yaml::from_str(content).map_err(|e| BuildError::ManifestParse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        config.check_version()?;
        Ok(config)
    }

    fn check_version(&self) -> Result<()> {
        if let Some(version) = self.info.get("version") {
            let version = scalar_to_string(version);
            semver::Version::parse(&version).map_err(|e| BuildError::InvalidModVersion {
                version: version.clone(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// `$mod.<field>$` for every info field except `dependencies`.
    pub fn info_substitutions(&self) -> Vec<(String, String)> {
        self.info
            .iter()
            .filter_map(|(key, value)| {
                let key = key.as_str()?;
                (key != "dependencies").then(|| (format!("$mod.{}$", key), scalar_to_string(value)))
            })
            .collect()
    }

    pub fn build_substitutions(&self) -> Vec<(String, String)> {
        let Some(build) = &self.build else {
            return vec![];
        };
        vec![
            ("$build.path_format$".into(), scalar_to_string(&build.path_format)),
            ("$build.zip_options.store_only$".into(), scalar_to_string(&build.zip_options.store_only)),
            ("$build.zip_options.refresh_only$".into(), scalar_to_string(&build.zip_options.refresh_only)),
            ("$build.factorio_dirs.game_path$".into(), scalar_to_string(&build.factorio_dirs.game_path)),
            ("$build.factorio_dirs.mods_path$".into(), scalar_to_string(&build.factorio_dirs.mods_path)),
        ]
    }

    pub fn register(&self, registry: &mut AssetRegistry) {
        let info_ctx = SubstitutionContext::new(DEFAULT_CONTEXT_INSTANCE, MOD_INFO_CONTEXT);
        for (placeholder, value) in self.info_substitutions() {
            registry.register_substitution(&info_ctx, &placeholder, &value);
        }
        let build_ctx = SubstitutionContext::new(DEFAULT_CONTEXT_INSTANCE, BUILD_INFO_CONTEXT);
        for (placeholder, value) in self.build_substitutions() {
            registry.register_substitution(&build_ctx, &placeholder, &value);
        }
    }
}

/// The global mod-metadata context: mod info first, then build info.
/// Either half may be absent.
pub fn mod_context(registry: &AssetRegistry) -> Vec<(String, String)> {
    [MOD_INFO_CONTEXT, BUILD_INFO_CONTEXT]
        .into_iter()
        .filter_map(|target| {
            registry
                .substitutions_for(&SubstitutionContext::new(DEFAULT_CONTEXT_INSTANCE, target))
                .ok()
        })
        .flatten()
        .collect()
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
info:
  name: rail-skins
  version: 0.3.1
  author: someone
  dependencies:
    - base >= 1.1
build:
  path_format: "$mod.name$_$mod.version$"
  zip_options:
    store_only: false
    refresh_only: true
  factorio_dirs:
    game_path: /opt/factorio
    mods_path: /opt/factorio/mods
"#;

    #[test]
    fn test_info_substitutions_skip_dependencies() {
        let config = ModConfig::parse(SAMPLE, Path::new("mod-config.yml")).unwrap();
        let subs = config.info_substitutions();
        assert_eq!(subs[0], ("$mod.name$".to_string(), "rail-skins".to_string()));
        assert_eq!(subs[1], ("$mod.version$".to_string(), "0.3.1".to_string()));
        assert!(subs.iter().all(|(p, _)| p != "$mod.dependencies$"));
    }

    #[test]
    fn test_build_values_are_stringified() {
        let config = ModConfig::parse(SAMPLE, Path::new("mod-config.yml")).unwrap();
        let subs = config.build_substitutions();
        assert!(subs.contains(&("$build.zip_options.store_only$".into(), "false".into())));
        assert!(subs.contains(&("$build.factorio_dirs.mods_path$".into(), "/opt/factorio/mods".into())));
    }

    #[test]
    fn test_register_populates_mod_context() {
        let config = ModConfig::parse(SAMPLE, Path::new("mod-config.yml")).unwrap();
        let mut registry = AssetRegistry::default();
        config.register(&mut registry);

        let ctx = mod_context(&registry);
        assert_eq!(ctx.first().map(|(p, _)| p.as_str()), Some("$mod.name$"));
        assert!(ctx.iter().any(|(p, v)| p == "$build.path_format$" && v == "$mod.name$_$mod.version$"));
    }

    #[test]
    fn test_empty_registry_has_empty_context() {
        assert!(mod_context(&AssetRegistry::default()).is_empty());
    }

    #[test]
    fn test_invalid_version_rejected() {
        let err = ModConfig::parse("info:\n  version: not-a-version\n", Path::new("m.yml")).unwrap_err();
        assert!(matches!(err, BuildError::InvalidModVersion { .. }));
    }
}
