use super::config::{
    LoweringOptionsConfig, find_config, load_config, parse_config, resolve_config,
    resolve_lowering_options,
};
use ilc_lowering::LoweringOptions;
use std::path::{Path, PathBuf};

fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("failed to create test directory");
    }
    std::fs::write(&path, contents).expect("failed to write test file");
    path
}

#[test]
fn parses_jsonc_with_trailing_commas() {
    let input = r#"
    {
      // comment
      "loweringOptions": {
        "hashLength": 9, /* inline */
        "parallel": "off",
      },
      "units": ["a.json",],
    }
    "#;

    let config = parse_config(input).expect("should parse JSONC");
    let options = config.lowering_options.expect("loweringOptions missing");

    assert_eq!(options.hash_length, Some(9));
    assert_eq!(options.parallel, Some(false));
    assert_eq!(config.units, Some(vec!["a.json".to_string()]));
}

#[test]
fn parallel_accepts_bool_or_string() {
    let opts: LoweringOptionsConfig = serde_json::from_str(r#"{"parallel": true}"#).expect("bool");
    assert_eq!(opts.parallel, Some(true));
    let opts: LoweringOptionsConfig = serde_json::from_str(r#"{"parallel": "Yes"}"#).expect("string");
    assert_eq!(opts.parallel, Some(true));
    let result: Result<LoweringOptionsConfig, _> = serde_json::from_str(r#"{"parallel": "maybe"}"#);
    assert!(result.is_err());
}

#[test]
fn resolves_defaults_and_validates_ranges() {
    assert_eq!(resolve_lowering_options(None).expect("defaults"), LoweringOptions::default());

    let options = resolve_lowering_options(Some(&LoweringOptionsConfig {
        hash_length: Some(12),
        max_carrier_depth: Some(16),
        parallel: Some(false),
    }))
    .expect("valid options");
    assert_eq!(
        options,
        LoweringOptions {
            hash_length: 12,
            max_carrier_depth: 16,
            parallel: false,
        }
    );

    let too_long = LoweringOptionsConfig {
        hash_length: Some(17),
        ..LoweringOptionsConfig::default()
    };
    let err = resolve_lowering_options(Some(&too_long)).expect_err("out of range");
    assert!(err.to_string().contains("hashLength must be between 4 and 16"));

    let zero_depth = LoweringOptionsConfig {
        max_carrier_depth: Some(0),
        ..LoweringOptionsConfig::default()
    };
    assert!(resolve_lowering_options(Some(&zero_depth)).is_err());
}

#[test]
fn load_config_merges_extends_and_resolves_units() {
    let temp = tempfile::tempdir().expect("temp dir");
    let base = temp.path();
    write_file(
        base,
        "base/ilc.json",
        r#"{ "loweringOptions": { "hashLength": 8, "parallel": false }, "units": ["shared.json"] }"#,
    );
    let child = write_file(
        base,
        "project/ilc.json",
        r#"{ "extends": "../base/ilc", "loweringOptions": { "hashLength": 11 } }"#,
    );

    let config = load_config(&child).expect("should load");
    let options = config.lowering_options.expect("merged options");
    assert_eq!(options.hash_length, Some(11));
    assert_eq!(options.parallel, Some(false));

    // Inherited units stay relative to the file that declared them.
    let units = config.units.expect("inherited units");
    assert_eq!(units.len(), 1);
    assert!(Path::new(&units[0]).ends_with("base/shared.json"), "{units:?}");
}

#[test]
fn load_config_detects_extends_cycles() {
    let temp = tempfile::tempdir().expect("temp dir");
    let a = write_file(temp.path(), "a.json", r#"{ "extends": "./b.json" }"#);
    write_file(temp.path(), "b.json", r#"{ "extends": "./a.json" }"#);

    let err = load_config(&a).expect_err("cycle");
    assert!(format!("{err:#}").contains("extends cycle"));
}

#[test]
fn find_config_prefers_project_flag() {
    let temp = tempfile::tempdir().expect("temp dir");
    let cwd = temp.path();
    assert_eq!(find_config(None, cwd), None);

    let default_path = write_file(cwd, "ilc.json", "{}");
    assert_eq!(find_config(None, cwd), Some(default_path.clone()));

    std::fs::create_dir_all(cwd.join("nested")).expect("dir");
    assert_eq!(
        find_config(Some(Path::new("nested")), cwd),
        Some(cwd.join("nested").join("ilc.json"))
    );
    assert_eq!(
        find_config(Some(Path::new("other.json")), cwd),
        Some(cwd.join("other.json"))
    );
}

#[test]
fn resolve_config_reads_units() {
    let temp = tempfile::tempdir().expect("temp dir");
    let path = write_file(
        temp.path(),
        "ilc.json",
        r#"{ "loweringOptions": { "maxCarrierDepth": 4 }, "units": ["u.json"] }"#,
    );

    let resolved = resolve_config(Some(&path)).expect("resolves");
    assert_eq!(resolved.options.max_carrier_depth, 4);
    assert_eq!(resolved.units, vec![temp.path().join("u.json")]);

    let missing = resolve_config(Some(&temp.path().join("missing.json"))).expect_err("missing file");
    assert!(format!("{missing:#}").contains("failed to read ilc.json"));
}
