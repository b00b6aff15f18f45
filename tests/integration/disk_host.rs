// tests/integration/disk_host.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use incbuild::config::ConfigFile;
use incbuild::diagnostics::{DiagnosticCategory, HOST_FAILURE_CODE};
use incbuild::fs::FileSystem;
use incbuild::fs::mock::MockFileSystem;
use incbuild::program::{BuilderProgram, CompilerHost};
use incbuild::project::DiskCompilerHost;
use incbuild::project::disk_host::{
    CODE_DUPLICATE_EXPORT, CODE_ERROR_DIRECTIVE, CODE_NO_EXPORTED_MEMBER, CODE_NOT_IMPORTED,
    CODE_UNRESOLVED_IMPORT, CODE_WARN_DIRECTIVE,
};
use incbuild::project::UnitMatcher;
use incbuild::watch::changed_units;
use incbuild_test_utils::{ConfigFileBuilder, MockProjectBuilder, init_tracing};

fn program_for(root: &Path, fs: &Arc<MockFileSystem>, cfg: &ConfigFile) -> BuilderProgram<DiskCompilerHost> {
    let host = DiskCompilerHost::from_config(fs.clone(), root, cfg).unwrap();
    BuilderProgram::new(host, cfg.builder_options()).unwrap()
}

fn checked_units(program: &mut BuilderProgram<DiskCompilerHost>) -> Vec<String> {
    program
        .check_all_affected()
        .unwrap()
        .into_iter()
        .map(|d| d.unit)
        .collect()
}

fn util_and_main() -> MockProjectBuilder {
    MockProjectBuilder::new("/proj")
        .unit(
            "src/util.unit",
            &["export fn trim (s: str) -> str", "fn helper() = 1"],
        )
        .unit(
            "src/main.unit",
            &["import \"src/util.unit\"", "let x = use \"src/util.unit\".trim"],
        )
        .file("README.md", "not a unit")
}

#[test]
fn test_clean_project_checks_and_emits() {
    init_tracing();
    let (root, fs) = util_and_main().build();
    let cfg = ConfigFileBuilder::new().build();
    let mut program = program_for(&root, &fs, &cfg);

    let checked = program.check_all_affected().unwrap();
    let units: Vec<&str> = checked.iter().map(|c| c.unit.as_str()).collect();
    assert_eq!(units, vec!["src/main.unit", "src/util.unit"]);
    assert!(checked.iter().all(|c| c.diagnostics.is_empty()));

    let emitted = program.emit_all_affected().unwrap();
    assert_eq!(emitted.len(), 2);

    let js = fs.contents("/proj/out/src/main.unit.js").unwrap();
    assert!(js.starts_with("// generated from src/main.unit"));
    let decls = fs.contents("/proj/out/src/util.unit.d").unwrap();
    assert_eq!(decls, "export fn trim (s: str) -> str\n");
}

#[test]
fn test_checker_reports_each_problem_with_its_code() {
    init_tracing();
    let (root, fs) = MockProjectBuilder::new("/proj")
        .unit("src/a.unit", &["export fn f (x: int) -> int"])
        .unit(
            "src/b.unit",
            &[
                "import \"src/missing.unit\"",
                "import \"src/a.unit\"",
                "export type T = int",
                "export type T = str",
                "let y = use \"src/c.unit\".g",
                "let z = use \"src/a.unit\".nope",
                "!error boom",
                "!warn careful",
            ],
        )
        .unit("src/c.unit", &["export fn g () -> int"])
        .build();
    let cfg = ConfigFileBuilder::new().build();
    let mut program = program_for(&root, &fs, &cfg);
    program.check_all_affected().unwrap();

    let diagnostics = program.semantic_diagnostics("src/b.unit").unwrap();
    let found: Vec<(u32, Option<u32>)> = diagnostics.iter().map(|d| (d.code, d.line)).collect();
    assert_eq!(
        found,
        vec![
            (CODE_UNRESOLVED_IMPORT, Some(1)),
            (CODE_DUPLICATE_EXPORT, Some(4)),
            (CODE_NOT_IMPORTED, Some(5)),
            (CODE_NO_EXPORTED_MEMBER, Some(6)),
            (CODE_ERROR_DIRECTIVE, Some(7)),
            (CODE_WARN_DIRECTIVE, Some(8)),
        ]
    );
    assert_eq!(diagnostics[5].category, DiagnosticCategory::Warning);
    assert_eq!(diagnostics[4].message, "boom");
}

#[test]
fn test_body_edit_on_disk_rechecks_only_that_unit() {
    init_tracing();
    let (root, fs) = util_and_main().build();
    let cfg = ConfigFileBuilder::new().build();
    let mut program = program_for(&root, &fs, &cfg);
    program.check_all_affected().unwrap();
    program.emit_all_affected().unwrap();

    fs.add_file(
        "/proj/src/util.unit",
        "export fn trim (s: str) -> str\nfn helper() = 2\n",
    );
    program.report_changed(["src/util.unit"]).unwrap();

    assert_eq!(checked_units(&mut program), vec!["src/util.unit"]);
}

#[test]
fn test_formatting_only_shape_edit_keeps_the_signature() {
    init_tracing();
    let (root, fs) = util_and_main().build();
    let cfg = ConfigFileBuilder::new().build();
    let mut program = program_for(&root, &fs, &cfg);
    program.check_all_affected().unwrap();

    fs.add_file(
        "/proj/src/util.unit",
        "export fn trim   (s: str)   -> str\nfn helper() = 1\n",
    );
    program.report_changed(["src/util.unit"]).unwrap();

    assert_eq!(checked_units(&mut program), vec!["src/util.unit"]);
}

#[test]
fn test_shape_edit_on_disk_rechecks_importers() {
    init_tracing();
    let (root, fs) = util_and_main().build();
    let cfg = ConfigFileBuilder::new().build();
    let mut program = program_for(&root, &fs, &cfg);
    program.check_all_affected().unwrap();

    // Renaming the export breaks main.unit's use site.
    fs.add_file("/proj/src/util.unit", "export fn strip (s: str) -> str\n");
    program.report_changed(["src/util.unit"]).unwrap();

    let checked = program.check_all_affected().unwrap();
    let units: Vec<&str> = checked.iter().map(|c| c.unit.as_str()).collect();
    assert_eq!(units, vec!["src/util.unit", "src/main.unit"]);
    assert_eq!(checked[1].diagnostics[0].code, CODE_NO_EXPORTED_MEMBER);
}

#[test]
fn test_new_file_on_disk_joins_the_program() {
    init_tracing();
    let (root, fs) = util_and_main().build();
    let cfg = ConfigFileBuilder::new().build();
    let mut program = program_for(&root, &fs, &cfg);
    program.check_all_affected().unwrap();

    fs.add_file("/proj/src/extra.unit", "import \"src/util.unit\"\n");
    program.report_changed(["src/extra.unit"]).unwrap();

    assert_eq!(checked_units(&mut program), vec!["src/extra.unit"]);
    assert_eq!(program.state().len(), 3);
}

#[test]
fn test_reexporter_gets_declaration_only_emit() {
    init_tracing();
    let (root, fs) = MockProjectBuilder::new("/proj")
        .unit("src/a.unit", &["export type Id = int"])
        .unit("src/api.unit", &["export * from \"src/a.unit\""])
        .build();
    let cfg = ConfigFileBuilder::new().build();
    let mut program = program_for(&root, &fs, &cfg);
    program.check_all_affected().unwrap();
    program.emit_all_affected().unwrap();
    let api_js = fs.contents("/proj/out/src/api.unit.js").unwrap();

    fs.add_file("/proj/src/a.unit", "export type Id = str\n");
    program.report_changed(["src/a.unit"]).unwrap();
    let emitted = program.emit_all_affected().unwrap();

    let api = emitted.iter().find(|e| e.unit == "src/api.unit").unwrap();
    assert_eq!(api.written_files, vec![PathBuf::from("/proj/out/src/api.unit.d")]);
    assert_eq!(
        fs.contents("/proj/out/src/api.unit.d").unwrap(),
        "export type Id = str\n"
    );
    assert_eq!(fs.contents("/proj/out/src/api.unit.js").unwrap(), api_js);
}

fn inferred_project() -> (PathBuf, Arc<MockFileSystem>) {
    MockProjectBuilder::new("/proj")
        .unit("src/a.unit", &["export fn f (x: int) -> int"])
        .unit("src/b.unit", &["export let g = \"src/a.unit\".f"])
        .unit("src/c.unit", &["import \"src/b.unit\""])
        .build()
}

#[test]
fn test_inferred_exports_count_toward_signature_by_default() {
    init_tracing();
    let (root, fs) = inferred_project();
    let cfg = ConfigFileBuilder::new().build();
    let mut program = program_for(&root, &fs, &cfg);
    program.check_all_affected().unwrap();

    fs.add_file("/proj/src/a.unit", "export fn f (x: str) -> int\n");
    program.report_changed(["src/a.unit"]).unwrap();

    assert_eq!(
        checked_units(&mut program),
        vec!["src/a.unit", "src/b.unit", "src/c.unit"]
    );
}

#[test]
fn test_inferred_exports_can_be_left_out_of_signature() {
    init_tracing();
    let (root, fs) = inferred_project();
    let cfg = ConfigFileBuilder::new().include_inferred_types(false).build();
    let mut program = program_for(&root, &fs, &cfg);
    program.check_all_affected().unwrap();

    fs.add_file("/proj/src/a.unit", "export fn f (x: str) -> int\n");
    program.report_changed(["src/a.unit"]).unwrap();

    // b.unit is rechecked because it reads a.unit, but its written shape did
    // not move, so c.unit is left alone.
    assert_eq!(checked_units(&mut program), vec!["src/a.unit", "src/b.unit"]);
}

#[test]
fn test_policy_key_reflects_inferred_setting() {
    let fs: Arc<dyn FileSystem> = Arc::new(MockFileSystem::new());
    let matcher = UnitMatcher::new(&["src/**/*.unit".to_string()], &[]).unwrap();
    let on = DiskCompilerHost::new(fs.clone(), "/proj", matcher.clone(), "out", true).unwrap();
    let off = DiskCompilerHost::new(fs, "/proj", matcher, "out", false).unwrap();

    assert_ne!(on.policy_key(), off.policy_key());
}

#[test]
fn test_excluded_units_are_not_part_of_the_program() {
    init_tracing();
    let (root, fs) = util_and_main()
        .unit("src/scratch/tmp.unit", &["!error ignore me"])
        .build();
    let cfg = ConfigFileBuilder::new().exclude("src/scratch/**").build();
    let mut program = program_for(&root, &fs, &cfg);

    assert_eq!(checked_units(&mut program).len(), 2);
    assert!(program.state().info_by_path("src/scratch/tmp.unit").is_none());
}

#[test]
fn test_watch_events_map_to_matching_units() {
    let root = PathBuf::from("/proj");
    let matcher = UnitMatcher::new(&["src/**/*.unit".to_string()], &[]).unwrap();
    let events = vec![
        root.join("src/a.unit"),
        root.join("out/src/a.unit.js"),
        PathBuf::from("/elsewhere/src/b.unit"),
        root.join("src/a.unit"),
        root.join("src/nested/c.unit"),
    ];

    assert_eq!(
        changed_units(&root, &events, &matcher),
        vec!["src/a.unit", "src/nested/c.unit"]
    );
}

#[test]
fn test_unreadable_unit_is_reported_not_fatal() {
    init_tracing();
    let (root, fs) = util_and_main().build();
    let cfg = ConfigFileBuilder::new().build();
    let mut program = program_for(&root, &fs, &cfg);
    program.check_all_affected().unwrap();

    fs.add_file("/proj/src/util.unit", vec![0xff, 0xfe, b'\n']);
    program.report_changed(["src/util.unit"]).unwrap();

    let checked = program.check_all_affected().unwrap();
    let units: Vec<&str> = checked.iter().map(|c| c.unit.as_str()).collect();
    assert_eq!(units, vec!["src/util.unit", "src/main.unit"]);
    assert_eq!(checked[0].diagnostics.len(), 1);
    assert_eq!(checked[0].diagnostics[0].code, HOST_FAILURE_CODE);
    assert_eq!(program.state().len(), 2);

    // Once the file is readable again the unit checks clean.
    fs.add_file("/proj/src/util.unit", "export fn trim (s: str) -> str\n");
    program.report_changed(["src/util.unit"]).unwrap();

    let checked = program.check_all_affected().unwrap();
    assert_eq!(checked[0].unit, "src/util.unit");
    assert!(checked.iter().all(|c| c.diagnostics.is_empty()));
}
