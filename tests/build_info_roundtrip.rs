mod common;

use std::sync::Arc;

use common::{built, built_with, drain_checked, import_chain, init_tracing};
use incbuild::build_info::{BuildInfoCodec, BuildInfoStore, FileBuildInfoStore, PendingCheckRecord};
use incbuild::errors::IncbuildError;
use incbuild::fs::RealFileSystem;
use incbuild::program::{BuilderOptions, BuilderProgram};
use incbuild_test_utils::{FakeCompilerHost, FakeUnit};
use tempfile::tempdir;

fn project() -> FakeCompilerHost {
    import_chain().with_unit("z.ts", FakeUnit::new("z").error("z is broken"))
}

#[test]
fn test_restart_from_persisted_state_has_nothing_to_do() {
    init_tracing();
    let dir = tempdir().unwrap();
    let path = dir.path().join(".incbuild").join("buildinfo.json");
    let mut store = FileBuildInfoStore::new(&path, Arc::new(RealFileSystem));

    let program = built(project());
    store.save(&program.build_info_json().unwrap()).unwrap();
    assert!(path.is_file());

    let document = store.load().unwrap();
    let mut restarted =
        BuilderProgram::from_build_info(project(), BuilderOptions::default(), document.as_deref()).unwrap();
    restarted.report_changed(Vec::<&str>::new()).unwrap();

    assert!(drain_checked(&mut restarted).is_empty());
    assert!(restarted.emit_all_affected().unwrap().is_empty());

    // Diagnostics come back from the document, without asking the checker.
    let z = restarted.semantic_diagnostics("z.ts").unwrap();
    assert_eq!(z.len(), 1);
    assert_eq!(z[0].message, "z is broken");
    assert!(restarted.host().checks().is_empty());
}

#[test]
fn test_restart_sees_edits_made_while_stopped() {
    init_tracing();
    let program = built(project());
    let document = program.build_info_json().unwrap();

    let mut host = project();
    host.edit_export("a.ts", "f", "(x: string) => number");
    let mut restarted =
        BuilderProgram::from_build_info(host, BuilderOptions::default(), Some(&document)).unwrap();

    assert_eq!(drain_checked(&mut restarted), vec!["a.ts", "b.ts"]);
}

#[test]
fn test_signatures_survive_restart() {
    init_tracing();
    let program = built(project());
    let document = program.build_info_json().unwrap();

    // Body-only edit: if the stored signature were lost, a.ts would look
    // like it moved and b.ts would be rechecked too.
    let mut host = project();
    host.edit_body("a.ts", "a body v2");
    let mut restarted =
        BuilderProgram::from_build_info(host, BuilderOptions::default(), Some(&document)).unwrap();

    assert_eq!(drain_checked(&mut restarted), vec!["a.ts"]);
}

#[test]
fn test_version_mismatch_is_rejected() {
    init_tracing();
    let program = built(project());
    let mut document = program.build_info();
    document.tool_version = "0.0.1+buildinfo.0".to_string();
    let json = BuildInfoCodec::to_json(&document).unwrap();

    let err = BuildInfoCodec::new().deserialize_str(&json).unwrap_err();
    assert!(matches!(err, IncbuildError::BuildInfoVersionMismatch { .. }));

    // The builder treats an incompatible document as absent.
    let mut restarted =
        BuilderProgram::from_build_info(project(), BuilderOptions::default(), Some(&json)).unwrap();
    assert_eq!(drain_checked(&mut restarted).len(), 4);
}

#[test]
fn test_codec_with_matching_custom_version_accepts_document() {
    init_tracing();
    let codec = BuildInfoCodec::with_tool_version("test+1");
    let program = built(project());
    let mut document = program.build_info();
    document.tool_version = codec.tool_version().to_string();

    let decoded = codec.deserialize(document).unwrap();
    assert_eq!(decoded.state.len(), 4);
    assert!(decoded.pending_check.is_empty());
}

#[test]
fn test_out_of_range_indices_are_malformed() {
    init_tracing();
    let program = built(project());
    let mut document = program.build_info();
    document.pending_check = vec![PendingCheckRecord {
        unit_idx: 99,
        global: false,
    }];

    let err = BuildInfoCodec::new().deserialize(document).unwrap_err();
    assert!(matches!(err, IncbuildError::BuildInfoMalformed(_)));
}

#[test]
fn test_garbage_document_starts_fresh() {
    init_tracing();
    let mut program =
        BuilderProgram::from_build_info(project(), BuilderOptions::default(), Some("{not json")).unwrap();

    assert_eq!(drain_checked(&mut program).len(), 4);
}

#[test]
fn test_options_change_across_restart_rechecks_everything() {
    init_tracing();
    let program = built(project());
    let document = program.build_info_json().unwrap();

    let options = BuilderOptions {
        emit_declarations: false,
        ..BuilderOptions::default()
    };
    let mut restarted = BuilderProgram::from_build_info(project(), options, Some(&document)).unwrap();

    assert_eq!(drain_checked(&mut restarted).len(), 4);
}

#[test]
fn test_host_policy_change_across_restart_rechecks_everything() {
    init_tracing();
    let program = built(project());
    let document = program.build_info_json().unwrap();

    let host = project().with_inferred_types(false);
    let mut restarted =
        BuilderProgram::from_build_info(host, BuilderOptions::default(), Some(&document)).unwrap();

    assert_eq!(drain_checked(&mut restarted).len(), 4);
}

#[test]
fn test_diagnostics_are_left_out_when_not_persisted() {
    init_tracing();
    let options = BuilderOptions {
        persist_diagnostics: false,
        ..BuilderOptions::default()
    };
    let program = built_with(project(), options);
    let document = program.build_info();
    assert!(document.diagnostics.is_none());

    let json = BuildInfoCodec::to_json(&document).unwrap();
    let mut restarted = BuilderProgram::from_build_info(project(), options, Some(&json)).unwrap();

    assert!(drain_checked(&mut restarted).is_empty());
    restarted.semantic_diagnostics("z.ts").unwrap();
    assert_eq!(restarted.host().checks(), &["z.ts"]);
}

#[test]
fn test_document_layout_uses_indices() {
    init_tracing();
    let program = built(import_chain());
    let document = program.build_info();

    let paths: Vec<&str> = document.units.iter().map(|u| u.path.as_str()).collect();
    assert_eq!(paths, vec!["a.ts", "b.ts", "c.ts"]);
    assert!(document.units.iter().all(|u| u.signature.is_some()));
    assert_eq!(document.dependency_edges, vec![(1, 0), (2, 1)]);
    assert!(document.export_edges.is_empty());

    let json = BuildInfoCodec::to_json(&document).unwrap();
    assert!(json.contains("\"toolVersion\""));
    assert!(json.contains("\"pendingEmitCursor\""));
}
