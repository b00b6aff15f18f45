#![allow(dead_code)]

use incbuild::program::{BuilderOptions, BuilderProgram, CompilerHost};
use incbuild_test_utils::{FakeCompilerHost, FakeUnit};

pub use incbuild_test_utils::init_tracing;

/// `a.ts` <- `b.ts` <- `c.ts`, where every edge is a plain import.
pub fn import_chain() -> FakeCompilerHost {
    FakeCompilerHost::new()
        .with_unit("a.ts", FakeUnit::new("a body").export("f", "(x: number) => number"))
        .with_unit(
            "b.ts",
            FakeUnit::new("b body").import("a.ts").export("g", "() => void"),
        )
        .with_unit("c.ts", FakeUnit::new("c body").import("b.ts"))
}

/// `a.ts` <- `b.ts` <- `c.ts`, where `b.ts` re-exports `a.ts` so its public
/// shape follows `a.ts`.
pub fn reexport_chain() -> FakeCompilerHost {
    FakeCompilerHost::new()
        .with_unit("a.ts", FakeUnit::new("a body").export("f", "(x: number) => number"))
        .with_unit(
            "b.ts",
            FakeUnit::new("b body").reexport("a.ts").export("g", "() => void"),
        )
        .with_unit("c.ts", FakeUnit::new("c body").import("b.ts"))
}

/// Build a program and drain its initial round, leaving a clean host log.
pub fn built(host: FakeCompilerHost) -> BuilderProgram<FakeCompilerHost> {
    built_with(host, BuilderOptions::default())
}

pub fn built_with(host: FakeCompilerHost, options: BuilderOptions) -> BuilderProgram<FakeCompilerHost> {
    let mut program = BuilderProgram::new(host, options).unwrap();
    program.check_all_affected().unwrap();
    program.emit_all_affected().unwrap();
    program.host_mut().clear_logs();
    program
}

/// Units yielded by draining the affected-file iterator.
pub fn drain_checked<H: CompilerHost>(program: &mut BuilderProgram<H>) -> Vec<String> {
    program
        .check_all_affected()
        .unwrap()
        .into_iter()
        .map(|d| d.unit)
        .collect()
}

pub fn sorted(mut units: Vec<String>) -> Vec<String> {
    units.sort();
    units
}
