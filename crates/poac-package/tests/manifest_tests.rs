use poac_package::{Manifest, ManifestError};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_parse_manifest_with_all_fields() {
    let toml = r#"
        [package]
        name = "demo"
        version = "1.2.3"
        cpp = 20
        authors = ["Alice <alice@example.com>", "Bob <bob@example.com>"]
        build = "build.py"
        links = "z"
        description = "A demo package"
        documentation = "https://docs.example.com"
        homepage = "https://example.com"
        repository = "https://github.com/example/demo"
        readme = "README.md"
        license = "MIT"
        license-file = "LICENSE"

        [dependencies]
        "boost/optional" = "=1.66.0"

        [dev-dependencies]
        "boost/test" = ">=1.60.0 and <2.0.0"

        [build-dependencies]
        cmake = "latest"

        [build]
        system = "cmake"

        [[build.bin]]
        path = "src/main.cpp"
        name = "demo"
        link = "static"

        [build.properties]
        definitions = ["NDEBUG"]
        options = ["-O2"]
        libraries = ["pthread"]
    "#;

    let manifest = Manifest::from_str(toml).unwrap();
    assert_eq!(manifest.package.name, "demo");
    assert_eq!(manifest.package.version.to_string(), "1.2.3");
    assert_eq!(manifest.package.cpp, 20);
    assert_eq!(manifest.package.authors.as_ref().unwrap().len(), 2);
    assert_eq!(manifest.package.license.as_deref(), Some("MIT"));
    assert_eq!(manifest.package.license_file.as_deref(), Some("LICENSE"));
    assert_eq!(manifest.dependencies.len(), 1);
    assert_eq!(manifest.dev_dependencies.len(), 1);
    assert_eq!(manifest.build_dependencies.len(), 1);
    let build = manifest.build.as_ref().unwrap();
    assert_eq!(build.bin.len(), 1);
    assert_eq!(build.bin[0].link.as_deref(), Some("static"));
}

#[test]
fn test_absent_fields_stay_absent() {
    let manifest = Manifest::from_str(
        "[package]\nname = \"demo\"\nversion = \"0.1.0\"\n",
    )
    .unwrap();
    assert!(manifest.package.authors.is_none());
    assert!(manifest.package.description.is_none());
    assert!(manifest.package.license.is_none());
    assert!(manifest.build.is_none());
}

#[test]
fn test_required_fields() {
    assert!(Manifest::from_str("[package]\nname = \"demo\"\n").is_err());
    assert!(Manifest::from_str("[package]\nversion = \"0.1.0\"\n").is_err());
}

#[test]
fn test_version_must_be_semver() {
    let err = Manifest::from_str("[package]\nname = \"demo\"\nversion = \"one\"\n").unwrap_err();
    assert!(matches!(err, ManifestError::Parse(_)));
}

#[test]
fn test_timestamp_changes_on_rewrite() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("poac.toml"),
        "[package]\nname = \"demo\"\nversion = \"0.1.0\"\n",
    )
    .unwrap();

    let before = Manifest::timestamp(temp.path()).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(20));

    let mut manifest = Manifest::load(temp.path()).unwrap().unwrap();
    manifest
        .dependencies
        .insert("boost/variant".into(), ">=1.71.0 and <2.0.0".into());
    manifest.store(temp.path()).unwrap();

    let after = Manifest::timestamp(temp.path()).unwrap();
    assert_ne!(before, after);
}

#[test]
fn test_rewrite_preserves_package_table() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("poac.toml"),
        "[package]\nname = \"demo\"\nversion = \"0.1.0\"\ncpp = 17\n\
         description = \"kept\"\n\n[dependencies]\n\"boost/variant\" = \"latest\"\n",
    )
    .unwrap();

    let mut manifest = Manifest::load(temp.path()).unwrap().unwrap();
    manifest
        .dependencies
        .insert("boost/variant".into(), ">=1.71.0 and <2.0.0".into());
    manifest.store(temp.path()).unwrap();

    let reloaded = Manifest::load(temp.path()).unwrap().unwrap();
    assert_eq!(reloaded.package.description.as_deref(), Some("kept"));
    assert_eq!(
        reloaded.dependencies["boost/variant"],
        ">=1.71.0 and <2.0.0"
    );
}
