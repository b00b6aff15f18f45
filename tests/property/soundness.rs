use std::collections::{BTreeMap, BTreeSet, HashSet};

use proptest::prelude::*;

use incbuild::build_info::BuildInfoCodec;
use incbuild::program::{BuilderOptions, BuilderProgram};
use incbuild::signature::Signature;
use incbuild_test_utils::{FakeCompilerHost, FakeUnit};

#[derive(Debug, Clone)]
struct UnitSpec {
    imports: BTreeSet<usize>,
    reexports: BTreeSet<usize>,
    shape: u8,
    global: bool,
}

// Random programs of up to 8 units. Edges are unconstrained, so import and
// re-export cycles are common.
fn project_strategy() -> impl Strategy<Value = Vec<UnitSpec>> {
    (2..8usize).prop_flat_map(|n| {
        proptest::collection::vec(
            (
                proptest::collection::btree_set(0..n, 0..3),
                proptest::collection::btree_set(0..n, 0..2),
                0..3u8,
                proptest::bool::weighted(0.1),
            )
                .prop_map(|(imports, reexports, shape, global)| UnitSpec {
                    imports,
                    reexports,
                    shape,
                    global,
                }),
            n,
        )
    })
}

fn path(i: usize) -> String {
    format!("u{i}.ts")
}

fn host_for(specs: &[UnitSpec]) -> FakeCompilerHost {
    let mut host = FakeCompilerHost::new();
    for (i, spec) in specs.iter().enumerate() {
        let mut unit = FakeUnit::new(&format!("body {i}")).export("v", &format!("shape {}", spec.shape));
        for &dep in spec.imports.iter().filter(|&&d| d != i) {
            unit = unit.import(&path(dep));
        }
        for &dep in spec.reexports.iter().filter(|&&d| d != i) {
            unit = unit.reexport(&path(dep));
        }
        if spec.global {
            unit = unit.global();
        }
        host = host.with_unit(&path(i), unit);
    }
    host
}

fn apply_edit(host: &mut FakeCompilerHost, unit: &str, kind: u8, step: usize) {
    match kind {
        0 => host.edit_body(unit, &format!("body edited at {step}")),
        1 => host.edit_export(unit, "v", &format!("shape edited at {step}")),
        _ => host.edit(unit, |u| u.errors.push(format!("error at {step}"))),
    }
}

fn signatures<H: incbuild::program::CompilerHost>(program: &BuilderProgram<H>) -> BTreeMap<String, Signature> {
    program
        .state()
        .entries()
        .map(|(path, info)| (path.to_string(), info.signature.clone()))
        .collect()
}

fn versions<H: incbuild::program::CompilerHost>(program: &BuilderProgram<H>) -> BTreeMap<String, String> {
    program
        .state()
        .entries()
        .map(|(path, info)| (path.to_string(), info.version.clone()))
        .collect()
}

fn fresh_build(host: FakeCompilerHost, options: BuilderOptions) -> BuilderProgram<FakeCompilerHost> {
    let mut program = BuilderProgram::new(host, options).unwrap();
    program.check_all_affected().unwrap();
    program.emit_all_affected().unwrap();
    program
}

proptest! {
    #[test]
    fn test_incremental_round_matches_fresh_build(
        specs in project_strategy(),
        edits in proptest::collection::vec((0..8usize, 0..3u8), 1..4),
        tracking in any::<bool>(),
    ) {
        let options = BuilderOptions {
            dependency_tracking: tracking,
            ..BuilderOptions::default()
        };
        let mut program = fresh_build(host_for(&specs), options);
        let signatures_before = signatures(&program);
        let versions_before = versions(&program);

        let mut reported = Vec::new();
        for (step, (idx, kind)) in edits.into_iter().enumerate() {
            let unit = path(idx % specs.len());
            apply_edit(program.host_mut(), &unit, kind, step);
            reported.push(unit);
        }
        let edited = program.host().clone();
        program.report_changed(&reported).unwrap();

        let checked: Vec<String> = program
            .check_all_affected()
            .unwrap()
            .into_iter()
            .map(|d| d.unit)
            .collect();

        // No unit is rechecked twice in a round.
        let unique: HashSet<&String> = checked.iter().collect();
        prop_assert_eq!(unique.len(), checked.len());

        let mut fresh = fresh_build(edited, options);
        let signatures_after = signatures(&fresh);
        prop_assert_eq!(&signatures(&program), &signatures_after);

        // Every unit whose text changed was rechecked.
        for (unit, version) in versions(&program) {
            if versions_before.get(&unit) != Some(&version) {
                prop_assert!(checked.contains(&unit), "edited {} not rechecked", unit);
            }
        }

        // Every direct dependent of a unit whose shape moved was rechecked.
        let graph = program.state().graph();
        for (from, to) in graph.dependency_edges() {
            let to = graph.path_of(to);
            if signatures_before.get(to) != signatures_after.get(to) {
                let from = graph.path_of(from).to_string();
                prop_assert!(checked.contains(&from), "dependent {} of {} not rechecked", from, to);
            }
        }

        // Nothing stale is served from the cache.
        for unit in graph.paths().to_vec() {
            let cached = program.cached_diagnostics(&unit);
            prop_assert!(cached.is_some(), "no cached diagnostics for {}", unit);
            let expected = fresh.semantic_diagnostics(&unit).unwrap();
            let cached = cached.unwrap();
            prop_assert_eq!(cached.as_ref(), expected.as_ref());
        }
    }

    #[test]
    fn test_build_info_round_trip_preserves_state(specs in project_strategy()) {
        let program = fresh_build(host_for(&specs), BuilderOptions::default());
        let codec = BuildInfoCodec::new();

        let decoded = codec.deserialize(program.build_info()).unwrap();

        let original = program.state();
        prop_assert_eq!(decoded.state.len(), original.len());
        for ((path, info), (decoded_path, decoded_info)) in original.entries().zip(decoded.state.entries()) {
            prop_assert_eq!(path, decoded_path);
            prop_assert_eq!(info, decoded_info);
        }
        prop_assert_eq!(decoded.state.graph().dependency_edges(), original.graph().dependency_edges());
        prop_assert_eq!(decoded.state.graph().export_edges(), original.graph().export_edges());
        prop_assert!(decoded.pending_check.is_empty());
    }
}
