//! Asset manifest (`assets-config.yml`)
//!
//! Mapping order is meaningful everywhere in this file: assets load in
//! declaration order, build targets run in declaration order, and
//! operations with equal `order` keep declaration order.

use std::fmt;
use std::marker::PhantomData;
use std::path::Path;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_yaml::Mapping;

use crate::error::{BuildError, Result};
use crate::license::LicenseSpec;

pub const BUILDABLE_ASSETS_CONFIG_FILE: &str = "assets-config.yml";

/// A YAML mapping kept in document order. `null` reads as empty.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<T>(Vec<(String, T)>);

impl<T> OrderedMap<T> {
    pub fn iter(&self) -> impl Iterator<Item = &(String, T)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

impl<T> Default for OrderedMap<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T> From<Vec<(String, T)>> for OrderedMap<T> {
    fn from(entries: Vec<(String, T)>) -> Self {
        Self(entries)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for OrderedMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct OrderedVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for OrderedVisitor<T> {
            type Value = OrderedMap<T>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping")
            }

            fn visit_unit<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
                Ok(OrderedMap::default())
            }

            fn visit_none<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
                Ok(OrderedMap::default())
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, T>()? {
                    entries.push((key, value));
                }
                Ok(OrderedMap(entries))
            }
        }

        deserializer.deserialize_any(OrderedVisitor(PhantomData))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetManifest {
    #[serde(default)]
    pub load: OrderedMap<LoadEntry>,
    #[serde(default)]
    pub build: OrderedMap<BuildEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoadEntry {
    pub path: String,
    pub licensing: LicenseSpec,
    #[serde(default)]
    pub on_load: OrderedMap<OperationSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationSpec {
    pub order: i64,
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub amount: AmountSpec,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountSpec {
    UntilResolution(ResolutionLiteral),
    ByValue(Vec<i64>),
}

/// `until_resolution: 64` is as valid as `until_resolution: "64"`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ResolutionLiteral {
    Number(u32),
    Text(String),
}

impl ResolutionLiteral {
    pub fn as_text(&self) -> String {
        match self {
            ResolutionLiteral::Number(n) => n.to_string(),
            ResolutionLiteral::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildEntry {
    pub outputs: OutputSpec,
    #[serde(rename = "use")]
    pub base: String,
    /// Each job is a single-key mapping naming the job class.
    #[serde(default)]
    pub jobs: Vec<Mapping>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputSpec {
    pub filetype: String,
    #[serde(default)]
    pub dir: String,
    pub name: String,
}

impl AssetManifest {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BuildError::ManifestNotFound { path: path.to_path_buf() });
        }
        let content = std::fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
        Self::parse(&content, path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| BuildError::ManifestParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
load:
  zeta:
    path: zeta.png
    licensing: {license: CC0, attribution: me, url: "https://example.test"}
    on_load:
      tile: {order: 1, amount: {by_value: [2, 2]}}
      scale: {order: 0, amount: {until_resolution: "128x128"}}
  alpha:
    path: alpha.png
    licensing: {license: MIT, attribution: me, url: ""}
build:
  icon:
    outputs: {filetype: png, dir: out/, name: "$composite-target$-icon"}
    use: load.zeta
    jobs:
      - composite-with: {asset: load.alpha, mask: none}
"#;

    #[test]
    fn test_document_order_is_kept() {
        let manifest = AssetManifest::parse(SAMPLE, Path::new("assets-config.yml")).unwrap();
        let names: Vec<_> = manifest.load.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);

        let zeta = manifest.load.get("zeta").unwrap();
        let ops: Vec<_> = zeta.on_load.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(ops, vec!["tile", "scale"]);
        assert_eq!(
            zeta.on_load.get("scale").unwrap().amount,
            AmountSpec::UntilResolution(ResolutionLiteral::Text("128x128".into()))
        );
    }

    #[test]
    fn test_missing_on_load_is_empty() {
        let manifest = AssetManifest::parse(SAMPLE, Path::new("assets-config.yml")).unwrap();
        assert!(manifest.load.get("alpha").unwrap().on_load.is_empty());
    }

    #[test]
    fn test_build_entry_shape() {
        let manifest = AssetManifest::parse(SAMPLE, Path::new("assets-config.yml")).unwrap();
        let icon = manifest.build.get("icon").unwrap();
        assert_eq!(icon.base, "load.zeta");
        assert_eq!(icon.outputs.name, "$composite-target$-icon");
        assert_eq!(icon.jobs.len(), 1);
    }

    #[test]
    fn test_numeric_resolution_literal() {
        let spec: OperationSpec =
            serde_yaml::from_str("{order: 0, amount: {until_resolution: 64}}").unwrap();
        assert_eq!(spec.amount, AmountSpec::UntilResolution(ResolutionLiteral::Number(64)));
    }

    #[test]
    fn test_missing_file() {
        let err = AssetManifest::load(Path::new("/definitely/not/here.yml")).unwrap_err();
        assert!(matches!(err, BuildError::ManifestNotFound { .. }));
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = AssetManifest::parse("load: [1, 2", Path::new("bad.yml")).unwrap_err();
        assert!(matches!(err, BuildError::ManifestParse { .. }));
    }
}
