//! Licensing - per-asset license records.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::BuildError;
use crate::naming;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseType {
    Cc0,
    Cc1,
    CcBy,
    CcBySa,
    CcByNc,
    CcByNcSa,
    CcByNd,
    CcByNcNd,
    Apache2,
    Mit,
    GnuGplLong,
    GnuGpl,
    GnuLgplLong,
    GnuLgpl,
}

impl LicenseType {
    pub const ALL: [LicenseType; 14] = [
        LicenseType::Cc0,
        LicenseType::Cc1,
        LicenseType::CcBy,
        LicenseType::CcBySa,
        LicenseType::CcByNc,
        LicenseType::CcByNcSa,
        LicenseType::CcByNd,
        LicenseType::CcByNcNd,
        LicenseType::Apache2,
        LicenseType::Mit,
        LicenseType::GnuGplLong,
        LicenseType::GnuGpl,
        LicenseType::GnuLgplLong,
        LicenseType::GnuLgpl,
    ];

    pub fn identifier(&self) -> &'static str {
        match self {
            LicenseType::Cc0 => "CC0",
            LicenseType::Cc1 => "CC 1.0",
            LicenseType::CcBy => "CC BY",
            LicenseType::CcBySa => "CC BY-SA",
            LicenseType::CcByNc => "CC BY-NC",
            LicenseType::CcByNcSa => "CC BY-NC-SA",
            LicenseType::CcByNd => "CC BY-ND",
            LicenseType::CcByNcNd => "CC BY-NC-ND",
            LicenseType::Apache2 => "Apache 2.0",
            LicenseType::Mit => "MIT",
            LicenseType::GnuGplLong => "GNU General Public License",
            LicenseType::GnuGpl => "GNU GPL",
            LicenseType::GnuLgplLong => "GNU Lesser General Public License",
            LicenseType::GnuLgpl => "GNU LGPL",
        }
    }
}

impl fmt::Display for LicenseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

impl FromStr for LicenseType {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        LicenseType::ALL
            .into_iter()
            .find(|t| t.identifier().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| BuildError::UnrecognizedLicense {
                license: s.to_string(),
            })
    }
}

impl Serialize for LicenseType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.identifier())
    }
}

/// `licensing:` block of a load entry, as written in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseSpec {
    pub license: String,
    #[serde(default)]
    pub attribution: String,
    #[serde(default)]
    pub url: String,
}

/// Resolved license. The URL is substituted once against the mod
/// metadata context on construction and never touched again.
#[derive(Debug, Clone, Serialize)]
pub struct License {
    license_type: LicenseType,
    attribution: String,
    url: String,
}

impl License {
    pub fn new<P, V>(spec: &LicenseSpec, mod_context: &[(P, V)]) -> Result<Self, BuildError>
    where
        P: AsRef<str>,
        V: AsRef<str>,
    {
        Ok(Self {
            license_type: spec.license.parse()?,
            attribution: spec.attribution.clone(),
            url: naming::render(&spec.url, mod_context),
        })
    }

    pub fn license_type(&self) -> LicenseType {
        self.license_type
    }

    pub fn attribution(&self) -> &str {
        &self.attribution
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(license: &str, url: &str) -> LicenseSpec {
        LicenseSpec {
            license: license.into(),
            attribution: "someone".into(),
            url: url.into(),
        }
    }

    #[test]
    fn test_case_insensitive_match() {
        assert_eq!("cc by-sa".parse::<LicenseType>().unwrap(), LicenseType::CcBySa);
        assert_eq!("apache 2.0".parse::<LicenseType>().unwrap(), LicenseType::Apache2);
        assert_eq!("MIT".parse::<LicenseType>().unwrap(), LicenseType::Mit);
    }

    #[test]
    fn test_unrecognized_license() {
        let err = License::new(&spec("WTFPL", ""), &[] as &[(&str, &str)]).unwrap_err();
        assert!(matches!(err, BuildError::UnrecognizedLicense { ref license } if license == "WTFPL"));
    }

    #[test]
    fn test_url_substituted_against_mod_context() {
        let ctx = [("$mod.name$", "my-mod"), ("$mod.version$", "1.2.0")];
        let license = License::new(&spec("CC0", "https://x.test/$mod.name$/$mod.version$/$mod.other$"), &ctx).unwrap();
        assert_eq!(license.url(), "https://x.test/my-mod/1.2.0/$mod.other$");
        assert_eq!(license.license_type(), LicenseType::Cc0);
        assert_eq!(license.attribution(), "someone");
    }

    #[test]
    fn test_serializes_identifier() {
        let license = License::new(&spec("gnu gpl", ""), &[] as &[(&str, &str)]).unwrap();
        let json = serde_json::to_value(&license).unwrap();
        assert_eq!(json["license_type"], "GNU GPL");
    }
}
