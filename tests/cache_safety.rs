mod common;

use common::{built, drain_checked, init_tracing, reexport_chain};
use incbuild_test_utils::FakeUnit;

#[test]
fn test_changed_unit_cache_is_dropped_before_first_pull() {
    init_tracing();
    let mut program = built(reexport_chain());
    assert!(program.cached_diagnostics("a.ts").is_some());

    program.host_mut().edit_body("a.ts", "a body v2");
    program.report_changed(["a.ts"]).unwrap();

    assert!(program.cached_diagnostics("a.ts").is_none());
    assert!(program.cached_diagnostics("b.ts").is_some());
}

#[test]
fn test_dependent_cache_is_dropped_when_it_is_enqueued() {
    init_tracing();
    let mut program = built(reexport_chain());

    program.host_mut().edit_export("a.ts", "f", "(x: bigint) => number");
    program.report_changed(["a.ts"]).unwrap();

    let first = program.get_next_affected_file_diagnostics().unwrap().unwrap();
    assert_eq!(first.unit, "a.ts");

    // a.ts moved, so b.ts was enqueued and its entry dropped in the same step.
    // c.ts is only enqueued once b.ts has been re-signed.
    assert!(program.cached_diagnostics("a.ts").is_some());
    assert!(program.cached_diagnostics("b.ts").is_none());
    assert!(program.cached_diagnostics("c.ts").is_some());

    let second = program.get_next_affected_file_diagnostics().unwrap().unwrap();
    assert_eq!(second.unit, "b.ts");
    assert!(program.cached_diagnostics("c.ts").is_none());
}

#[test]
fn test_unaffected_units_are_served_from_cache() {
    init_tracing();
    let mut program = built(reexport_chain().with_unit("z.ts", FakeUnit::new("z").error("old problem")));
    program.host_mut().clear_logs();

    program.host_mut().edit_body("a.ts", "a body v2");
    program.report_changed(["a.ts"]).unwrap();
    drain_checked(&mut program);

    let z = program.semantic_diagnostics("z.ts").unwrap();
    assert_eq!(z.len(), 1);
    assert_eq!(z[0].message, "old problem");
    assert_eq!(program.host().checks(), &["a.ts"]);
}

#[test]
fn test_on_demand_diagnostics_check_uncached_units() {
    init_tracing();
    let mut program = built(reexport_chain());

    program.host_mut().edit("b.ts", |u| u.errors.push("new problem".to_string()));
    program.report_changed(["b.ts"]).unwrap();

    // Not pulled yet: the cache has nothing current, so the host is asked.
    let b = program.semantic_diagnostics("b.ts").unwrap();
    assert_eq!(b.len(), 1);
    assert_eq!(program.host().checks(), &["b.ts"]);

    // A second request is served from the cache.
    program.semantic_diagnostics("b.ts").unwrap();
    assert_eq!(program.host().checks(), &["b.ts"]);
}

#[test]
fn test_diagnostics_of_yielded_units_are_current() {
    init_tracing();
    let mut program = built(reexport_chain());

    program.host_mut().edit("a.ts", |u| {
        u.errors.push("bad a".to_string());
        u.exports[0].1 = "(x: string) => number".to_string();
    });
    program.report_changed(["a.ts"]).unwrap();

    let first = program.get_next_affected_file_diagnostics().unwrap().unwrap();
    assert_eq!(first.unit, "a.ts");
    assert_eq!(first.diagnostics.len(), 1);
    assert_eq!(first.diagnostics[0].message, "bad a");
    assert_eq!(
        program.cached_diagnostics("a.ts").unwrap().as_ref(),
        first.diagnostics.as_ref()
    );
}

#[test]
fn test_all_diagnostics_checks_only_what_is_missing() {
    init_tracing();
    let mut program = built(
        reexport_chain()
            .with_unit("y.ts", FakeUnit::new("y").error("first"))
            .with_unit("z.ts", FakeUnit::new("z").error("second")),
    );
    program.host_mut().edit_body("a.ts", "a body v2");
    program.report_changed(["a.ts"]).unwrap();
    program.host_mut().clear_logs();

    let all = program.all_diagnostics().unwrap();

    let messages: Vec<&str> = all.iter().map(|d| d.message.as_str()).collect();
    assert_eq!(messages, vec!["first", "second"]);
    assert_eq!(program.host().checks(), &["a.ts"]);
}
