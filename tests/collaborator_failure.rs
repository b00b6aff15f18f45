mod common;

use common::{built, drain_checked, import_chain, init_tracing, reexport_chain};
use incbuild::diagnostics::HOST_FAILURE_CODE;
use incbuild::signature::Signature;
use incbuild::types::EmitKind;

#[test]
fn test_checker_failure_becomes_a_diagnostic() {
    init_tracing();
    let mut program = built(import_chain());

    program.host_mut().edit("c.ts", |u| u.fail_check = true);
    program.report_changed(["c.ts"]).unwrap();

    let next = program.get_next_affected_file_diagnostics().unwrap().unwrap();
    assert_eq!(next.unit, "c.ts");
    assert_eq!(next.diagnostics.len(), 1);
    assert_eq!(next.diagnostics[0].code, HOST_FAILURE_CODE);
    assert!(next.diagnostics[0].is_error());
    assert!(next.diagnostics[0].message.contains("checker crashed"));

    let state = program.state();
    assert_eq!(state.info_by_path("c.ts").unwrap().signature, Signature::Unsignatured);
}

#[test]
fn test_checker_failure_propagates_conservatively() {
    init_tracing();
    let mut program = built(import_chain());

    // a.ts fails to check: its signature is unknown, which counts as a
    // change, so b.ts must be rechecked even though nothing visible moved.
    program.host_mut().edit("a.ts", |u| u.fail_check = true);
    program.report_changed(["a.ts"]).unwrap();

    assert_eq!(drain_checked(&mut program), vec!["a.ts", "b.ts"]);
}

#[test]
fn test_interface_failure_keeps_checker_diagnostics() {
    init_tracing();
    let mut program = built(reexport_chain());

    program.host_mut().edit("a.ts", |u| {
        u.fail_interface = true;
        u.errors.push("real problem".to_string());
    });
    program.report_changed(["a.ts"]).unwrap();

    let next = program.get_next_affected_file_diagnostics().unwrap().unwrap();
    let codes: Vec<u32> = next.diagnostics.iter().map(|d| d.code).collect();
    assert_eq!(codes.len(), 2);
    assert!(codes.contains(&HOST_FAILURE_CODE));
    assert_eq!(next.diagnostics[0].message, "real problem");

    assert_eq!(drain_checked(&mut program), vec!["b.ts", "c.ts"]);
}

#[test]
fn test_emit_failure_is_reported_and_retried_next_round() {
    init_tracing();
    let mut program = built(import_chain());

    program.host_mut().edit("b.ts", |u| u.fail_emit = true);
    program.report_changed(["b.ts"]).unwrap();
    drain_checked(&mut program);

    let emitted = program.emit_all_affected().unwrap();
    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0].unit, "b.ts");
    assert!(emitted[0].written_files.is_empty());
    assert_eq!(emitted[0].diagnostics[0].code, HOST_FAILURE_CODE);

    // Still owed: persisted, and requeued once the next round starts.
    let document = program.build_info();
    let owed = &document.pending_emit[document.pending_emit_cursor..];
    assert_eq!(owed.len(), 1);
    assert_eq!(owed[0].kind, EmitKind::Full);

    program.host_mut().edit("b.ts", |u| u.fail_emit = false);
    program.report_changed(["b.ts"]).unwrap();
    let kinds: Vec<EmitKind> = program
        .pending_emit()
        .remaining()
        .iter()
        .filter(|e| e.unit == "b.ts")
        .map(|e| e.kind)
        .collect();
    assert_eq!(kinds, vec![EmitKind::Full]);
}
