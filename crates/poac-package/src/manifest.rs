//! Project manifest (poac.toml) model and parser.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;
use thiserror::Error;

pub const MANIFEST_FILE: &str = "poac.toml";

/// C++ standards a package may require. 3 is the legacy alias for C++03.
const SUPPORTED_CPP: [u16; 6] = [98, 3, 11, 14, 17, 20];

fn default_cpp() -> u16 {
    17
}

/// Manifest errors
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("poac.toml does not exist; run `poac init` or `poac new $PROJNAME`")]
    Missing,

    #[error("failed to read poac.toml: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse poac.toml: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize poac.toml: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("`cpp` must be one of [98, 3, 11, 14, 17, 20], found {0}")]
    UnsupportedCpp(u16),
}

/// The project manifest. Dependency tables map qualified names to interval
/// strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    pub package: Package,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,
    #[serde(
        default,
        rename = "dev-dependencies",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub dev_dependencies: BTreeMap<String, String>,
    #[serde(
        default,
        rename = "build-dependencies",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub build_dependencies: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<Build>,
}

/// The `[package]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Package {
    pub name: String,
    pub version: semver::Version,
    #[serde(default = "default_cpp")]
    pub cpp: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(rename = "license-file", skip_serializing_if = "Option::is_none")]
    pub license_file: Option<String>,
}

/// The `[build]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Build {
    #[serde(default)]
    pub system: BuildSystem,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bin: Vec<Bin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Properties>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BuildSystem {
    #[default]
    Poac,
    CMake,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bin {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Properties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definitions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub libraries: Option<Vec<String>>,
}

impl Manifest {
    /// Parse a manifest from TOML text. Type mismatches fail with the line of
    /// the offending value; absent optional fields stay absent.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = toml::from_str(content)?;
        if !SUPPORTED_CPP.contains(&manifest.package.cpp) {
            return Err(ManifestError::UnsupportedCpp(manifest.package.cpp));
        }
        Ok(manifest)
    }

    /// Load the manifest from `base`, or `None` when no poac.toml exists.
    pub fn load(base: &Path) -> Result<Option<Self>, ManifestError> {
        let path = base.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(Self::from_str(&content)?))
    }

    /// Write the manifest back to `base`.
    pub fn store(&self, base: &Path) -> Result<(), ManifestError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(base.join(MANIFEST_FILE), content)?;
        Ok(())
    }

    /// Last-modified time of the manifest, rendered as a string. Used as the
    /// correlation key between manifest and lockfile.
    pub fn timestamp(base: &Path) -> Result<String, ManifestError> {
        let path = base.join(MANIFEST_FILE);
        if !path.exists() {
            return Err(ManifestError::Missing);
        }
        let modified = fs::metadata(&path)?.modified()?;
        let nanos = modified
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        Ok(nanos.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let manifest = Manifest::from_str(
            r#"
                [package]
                name = "hello"
                version = "0.1.0"
            "#,
        )
        .unwrap();
        assert_eq!(manifest.package.name, "hello");
        assert_eq!(manifest.package.cpp, 17);
        assert!(manifest.dependencies.is_empty());
        assert!(manifest.build.is_none());
    }

    #[test]
    fn test_parse_dependencies() {
        let manifest = Manifest::from_str(
            r#"
                [package]
                name = "hello"
                version = "0.1.0"

                [dependencies]
                "boost/optional" = "=1.66.0"
                "github/foo/bar" = ">=0.1.0 and <0.2.0"

                [dev-dependencies]
                "boost/test" = "latest"
            "#,
        )
        .unwrap();
        assert_eq!(manifest.dependencies.len(), 2);
        assert_eq!(manifest.dependencies["boost/optional"], "=1.66.0");
        assert_eq!(manifest.dev_dependencies.len(), 1);
    }

    #[test]
    fn test_cpp_values() {
        for cpp in [98, 3, 11, 14, 17, 20] {
            let manifest = Manifest::from_str(&format!(
                "[package]\nname = \"x\"\nversion = \"0.1.0\"\ncpp = {cpp}\n"
            ))
            .unwrap();
            assert_eq!(manifest.package.cpp, cpp);
        }
        let err = Manifest::from_str("[package]\nname = \"x\"\nversion = \"0.1.0\"\ncpp = 15\n")
            .unwrap_err();
        assert!(matches!(err, ManifestError::UnsupportedCpp(15)));
    }

    #[test]
    fn test_type_mismatch_is_an_error() {
        // A wrong-typed value is a parse error, not an absent field.
        let err = Manifest::from_str(
            "[package]\nname = \"x\"\nversion = \"0.1.0\"\ndescription = 42\n",
        )
        .unwrap_err();
        assert!(matches!(err, ManifestError::Parse(_)));
    }

    #[test]
    fn test_build_system() {
        let manifest = Manifest::from_str(
            "[package]\nname = \"x\"\nversion = \"0.1.0\"\n\n[build]\nsystem = \"cmake\"\n",
        )
        .unwrap();
        assert_eq!(manifest.build.unwrap().system, BuildSystem::CMake);

        let manifest = Manifest::from_str(
            "[package]\nname = \"x\"\nversion = \"0.1.0\"\n\n[build]\n",
        )
        .unwrap();
        assert_eq!(manifest.build.unwrap().system, BuildSystem::Poac);

        assert!(Manifest::from_str(
            "[package]\nname = \"x\"\nversion = \"0.1.0\"\n\n[build]\nsystem = \"meson\"\n",
        )
        .is_err());
    }

    #[test]
    fn test_build_bins_and_properties() {
        let manifest = Manifest::from_str(
            r#"
                [package]
                name = "x"
                version = "0.1.0"

                [build]
                system = "poac"

                [[build.bin]]
                path = "src/main.cpp"
                name = "x"

                [build.properties]
                definitions = ["NDEBUG"]
                libraries = ["pthread"]
            "#,
        )
        .unwrap();
        let build = manifest.build.unwrap();
        assert_eq!(build.bin.len(), 1);
        assert_eq!(build.bin[0].path.as_deref(), Some("src/main.cpp"));
        let properties = build.properties.unwrap();
        assert_eq!(properties.definitions.unwrap(), vec!["NDEBUG"]);
        assert!(properties.options.is_none());
    }

    #[test]
    fn test_missing_package_table() {
        assert!(Manifest::from_str("[dependencies]\nfoo = \"latest\"\n").is_err());
    }

    #[test]
    fn test_store_round_trip() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut manifest = Manifest::from_str(
            "[package]\nname = \"x\"\nversion = \"0.1.0\"\n",
        )
        .unwrap();
        manifest
            .dependencies
            .insert("boost/variant".into(), ">=1.71.0 and <2.0.0".into());
        manifest.store(temp.path()).unwrap();

        let loaded = Manifest::load(temp.path()).unwrap().unwrap();
        assert_eq!(loaded, manifest);
    }

    #[test]
    fn test_load_absent_is_none() {
        let temp = tempfile::TempDir::new().unwrap();
        assert!(Manifest::load(temp.path()).unwrap().is_none());
        assert!(matches!(
            Manifest::timestamp(temp.path()),
            Err(ManifestError::Missing)
        ));
    }
}
