// tests/integration/error_handling.rs

use std::io::Write;
use std::path::PathBuf;

use tempfile::NamedTempFile;

use incbuild::build_info::BuildInfoCodec;
use incbuild::config::load_and_validate;
use incbuild::errors::IncbuildError;
use incbuild::program::{BuilderOptions, BuilderProgram};
use incbuild::types::BuildInfoStorageMode;
use incbuild_test_utils::{ConfigFileBuilder, FakeCompilerHost, FakeUnit};

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn test_empty_include_list_returns_config_error() {
    let file = config_file(
        r#"
[units]
include = []
"#,
    );

    match load_and_validate(file.path()) {
        Err(IncbuildError::ConfigError(msg)) => {
            assert!(msg.contains("[units].include"));
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_invalid_glob_returns_config_error() {
    let file = config_file(
        r#"
[units]
include = ["src/**/*.unit"]
exclude = ["src/[unclosed"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(IncbuildError::ConfigError(msg)) => {
            assert!(msg.contains("invalid glob in [units].exclude"));
            assert!(msg.contains("src/[unclosed"));
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_empty_out_dir_returns_config_error() {
    let file = config_file(
        r#"
[config]
out_dir = ""
"#,
    );

    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, IncbuildError::ConfigError(msg) if msg.contains("out_dir")));
}

#[test]
fn test_malformed_toml_returns_toml_error() {
    let file = config_file("[config\ndependency_tracking = true\n");

    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, IncbuildError::TomlError(_)));
}

#[test]
fn test_unknown_storage_mode_is_rejected() {
    let file = config_file(
        r#"
[config]
build_info_storage = "cloud"
"#,
    );

    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, IncbuildError::TomlError(_)));
}

#[test]
fn test_missing_config_file_returns_io_error() {
    let err = load_and_validate("/definitely/not/here/Incbuild.toml").unwrap_err();
    assert!(matches!(err, IncbuildError::IoError(_)));
}

#[test]
fn test_empty_config_file_uses_defaults() {
    let file = config_file("");

    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.units.include, vec!["src/**/*.unit"]);
    assert!(cfg.units.exclude.is_empty());
    assert_eq!(cfg.config.out_dir, PathBuf::from("out"));
    assert_eq!(cfg.config.build_info, PathBuf::from(".incbuild/buildinfo.json"));
    assert_eq!(cfg.config.build_info_storage, BuildInfoStorageMode::File);
    assert_eq!(cfg.builder_options(), BuilderOptions::default());
}

#[test]
fn test_builder_options_follow_config() {
    let cfg = ConfigFileBuilder::new()
        .dependency_tracking(false)
        .persist_diagnostics(false)
        .memory_build_info()
        .build();

    let options = cfg.builder_options();
    assert!(!options.dependency_tracking);
    assert!(options.emit_declarations);
    assert!(!options.persist_diagnostics);
    assert_eq!(cfg.config.build_info_storage, BuildInfoStorageMode::Memory);
}

#[test]
fn test_raw_config_with_blank_include_fails_conversion() {
    let raw = ConfigFileBuilder::new().include("   ").raw();

    let err = incbuild::config::ConfigFile::try_from(raw).unwrap_err();
    assert!(matches!(err, IncbuildError::ConfigError(_)));
}

#[test]
fn test_unknown_unit_is_reported_by_name() {
    let host = FakeCompilerHost::new().with_unit("a.ts", FakeUnit::new("a"));
    let mut program = BuilderProgram::new(host, BuilderOptions::default()).unwrap();

    let err = program.get_all_dependencies_of("nope.ts").unwrap_err();
    match err {
        IncbuildError::UnknownUnit(unit) => assert_eq!(unit, "nope.ts"),
        e => panic!("Expected UnknownUnit, got: {:?}", e),
    }
    assert!(matches!(
        program.semantic_diagnostics("./nope.ts"),
        Err(IncbuildError::UnknownUnit(_))
    ));
}

#[test]
fn test_version_mismatch_error_names_both_versions() {
    let document = r#"{"toolVersion": "0.0.1+buildinfo.0", "units": []}"#;

    let err = BuildInfoCodec::with_tool_version("9.9.9+buildinfo.1")
        .deserialize_str(document)
        .unwrap_err();

    let msg = err.to_string();
    assert!(msg.contains("0.0.1+buildinfo.0"));
    assert!(msg.contains("9.9.9+buildinfo.1"));
}
