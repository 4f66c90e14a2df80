use super::args::CliArgs;
use super::driver::{lower_manifest, resolve_inputs, run};
use crate::unit::parse_manifest;
use clap::Parser;
use ilc_lowering::LoweringOptions;
use std::path::{Path, PathBuf};

const UNIT: &str = r#"{
  "package": "pkg",
  "interfaces": [
    { "name": "host.Comparable", "members": [
      { "name": "compareTo", "params": ["Any?"], "returns": "Int32" }
    ] }
  ],
  "wrappers": [
    {
      "name": "ICPrimitive",
      "carrier": "Int32",
      "implements": ["host.Comparable"],
      "members": [
        { "name": "compareTo", "params": ["Any?"], "returns": "Int32", "overrides": "host.Comparable" }
      ]
    },
    { "name": "ICOther", "carrier": "Int32" },
    { "name": "Name", "carrier": "String" }
  ],
  "declarations": [
    { "name": "compute", "params": ["Int32"] },
    { "name": "compute", "params": ["ICPrimitive"] },
    { "name": "compute", "params": ["ICOther"] },
    { "name": "greet", "params": ["String"] }
  ],
  "useSites": [
    { "kind": "parameter", "formal": "ICPrimitive", "actual": "ICPrimitive" },
    { "kind": "parameter", "formal": "Any?", "actual": "ICPrimitive" },
    { "kind": "return", "formal": "Name", "actual": "Any" },
    { "kind": "genericArgument", "formal": "T", "actual": "Name", "generic": true }
  ],
  "typeParameters": [{ "name": "T" }]
}"#;

const BROKEN: &str = r#"{
  "package": "bad",
  "wrappers": [
    { "name": "A", "carrier": "B" },
    { "name": "B", "carrier": "A" },
    { "name": "Ok", "carrier": "Int64" }
  ],
  "declarations": [{ "name": "take", "params": ["A"] }],
  "useSites": [
    { "kind": "parameter", "formal": "Ok", "actual": "Ok" },
    { "kind": "varargElement", "formal": "Ok", "actual": "Ok", "span": { "start": 4, "end": 9 } }
  ]
}"#;

fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("failed to write test file");
    path
}

fn args(argv: &[&str]) -> CliArgs {
    let mut full = vec!["ilc"];
    full.extend_from_slice(argv);
    CliArgs::try_parse_from(full).expect("args should parse")
}

#[test]
fn lowers_a_clean_unit() {
    let manifest = parse_manifest(UNIT).expect("manifest");
    let report = lower_manifest("unit.json", &manifest, LoweringOptions::default()).expect("lowers");

    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
    assert_eq!(report.package, "pkg");
    assert_eq!(report.abi_units.len(), 3);

    let primitive = &report.abi_units[0];
    assert_eq!(primitive.wrapper, "pkg.ICPrimitive");
    assert_eq!(primitive.representation, "I");
    assert_eq!(primitive.nullable_representation, "Lpkg/ICPrimitive;");
    assert!(primitive.members.iter().any(|m| m.signature == "box-impl(I)Lpkg/ICPrimitive;"));
    assert!(
        primitive
            .members
            .iter()
            .any(|m| m.symbol == "compareTo" && m.delegates_to.as_deref() == Some("compareTo-impl"))
    );

    // Erasure-colliding overloads all get distinct hashed names.
    let computes: Vec<&str> = report.symbols[..3]
        .iter()
        .map(|s| s.symbol.as_deref().expect("lowered"))
        .collect();
    assert!(report.symbols[..3].iter().all(|s| s.mangled));
    assert_ne!(computes[0], computes[1]);
    assert_ne!(computes[1], computes[2]);
    assert_eq!(report.symbols[3].symbol.as_deref(), Some("greet"));
    assert_eq!(report.symbols[1].declaration, "pkg.compute(pkg.ICPrimitive): Unit");

    let decisions: Vec<&str> = report.conversions.iter().map(|c| c.decision).collect();
    assert_eq!(decisions, vec!["unboxed", "box", "unbox", "box"]);
    assert_eq!(
        report.conversions[1].accessor.as_deref(),
        Some("pkg.ICPrimitive.box-impl")
    );
    assert_eq!(report.conversions[2].wrapper.as_deref(), Some("pkg.Name"));
}

#[test]
fn reports_declaration_and_use_site_errors() {
    let manifest = parse_manifest(BROKEN).expect("manifest");
    let report = lower_manifest("broken.json", &manifest, LoweringOptions::default()).expect("lowers");

    let codes: Vec<u32> = report.diagnostics.iter().map(|d| d.code).collect();
    assert_eq!(
        codes,
        vec![
            ilc_common::diagnostic_codes::SELF_REFERENTIAL_CARRIER,
            ilc_common::diagnostic_codes::VARARG_OF_WRAPPER,
        ]
    );
    assert!(report.diagnostics.iter().all(|d| d.file == "broken.json"));
    assert_eq!(report.diagnostics[1].start, 4);
    assert_eq!(report.diagnostics[1].length, 5);

    // A failing use site halts the unit's conversions.
    assert!(report.conversions.is_empty());
    assert_eq!(report.symbols[0].symbol, None);
    assert_eq!(report.abi_units.len(), 1);
}

#[test]
fn run_reads_units_from_config() {
    let temp = tempfile::tempdir().expect("temp dir");
    write_file(temp.path(), "unit.json", UNIT);
    write_file(
        temp.path(),
        "ilc.json",
        r#"{ "loweringOptions": { "hashLength": 10 }, "units": ["unit.json"] }"#,
    );

    let run = run(&args(&[]), temp.path()).expect("runs");
    assert_eq!(run.options.hash_length, 10);
    assert_eq!(run.units.len(), 1);
    assert!(!run.has_errors());

    let mangled = run.units[0].symbols[1].symbol.clone().expect("mangled");
    let suffix = mangled.strip_prefix("compute-").expect("suffix");
    assert_eq!(suffix.len(), 10, "{mangled}");
}

#[test]
fn cli_flags_override_config() {
    let temp = tempfile::tempdir().expect("temp dir");
    write_file(
        temp.path(),
        "ilc.json",
        r#"{ "loweringOptions": { "hashLength": 10, "parallel": true }, "units": ["a.json"] }"#,
    );

    let (options, units) = resolve_inputs(
        &args(&["--hash-length", "5", "--no-parallel", "b.json"]),
        temp.path(),
    )
    .expect("resolves");
    assert_eq!(options.hash_length, 5);
    assert!(!options.parallel);
    assert_eq!(units, vec![temp.path().join("b.json")]);

    let err = resolve_inputs(&args(&["--hash-length", "2"]), temp.path()).expect_err("invalid");
    assert!(err.to_string().contains("hashLength"));
}

#[test]
fn run_without_units_fails() {
    let temp = tempfile::tempdir().expect("temp dir");
    let err = run(&args(&[]), temp.path()).expect_err("nothing to lower");
    assert!(err.to_string().contains("no unit manifests"));
}

#[test]
fn run_surfaces_manifest_errors_with_context() {
    let temp = tempfile::tempdir().expect("temp dir");
    let path = write_file(
        temp.path(),
        "bad.json",
        r#"{ "package": "p", "declarations": [{ "name": "f", "params": ["Nope"] }] }"#,
    );

    let err = run(&args(&[path.to_str().expect("utf-8 path")]), temp.path()).expect_err("bad type");
    let chain = format!("{err:#}");
    assert!(chain.contains("failed to lower unit"), "{chain}");
    assert!(chain.contains("unknown type 'Nope'"), "{chain}");
}

#[test]
fn json_report_shape() {
    let manifest = parse_manifest(UNIT).expect("manifest");
    let report = lower_manifest("unit.json", &manifest, LoweringOptions::default()).expect("lowers");
    let json = serde_json::to_value(&report).expect("serializes");

    assert_eq!(json["package"], "pkg");
    assert_eq!(json["abiUnits"][0]["nullableRepresentation"], "Lpkg/ICPrimitive;");
    assert_eq!(json["abiUnits"][0]["members"][0]["visibility"], "Private");
    assert_eq!(json["conversions"][1]["decision"], "box");
    assert_eq!(json["conversions"][1]["kind"], "Parameter");
    assert!(json["stats"]["cacheMisses"].as_u64().is_some());
}
