use super::{UnitManifest, parse_manifest};
use ilc_lowering::{DeclKind, DeclarationFlags, TypeId, UseSiteKind};

const MANIFEST: &str = r#"{
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
        { "name": "length", "returns": "Int32" },
        { "name": "compareTo", "params": ["Any?"], "returns": "Int32", "overrides": "host.Comparable" },
        { "name": "equals", "params": ["ICPrimitive"], "returns": "Bool" }
      ]
    },
    { "name": "Name", "carrier": "String", "carrierName": "raw", "span": { "start": 10, "end": 14 } },
    { "name": "Open", "carrier": "Int64", "final": false }
  ],
  "declarations": [
    { "name": "compute", "params": ["Int32"] },
    { "name": "compute", "params": ["ICPrimitive"] },
    { "name": "size", "kind": "getter", "receiver": "Name", "returns": "Int32" },
    { "name": "all", "scope": "pkg.util", "params": ["List<Name?>"], "returns": "Array<T : Name>" }
  ],
  "useSites": [
    { "kind": "parameter", "formal": "Any?", "actual": "ICPrimitive" },
    { "kind": "genericArgument", "formal": "Name", "actual": "Name", "span": { "start": 3, "end": 7 } },
    { "kind": "return", "formal": "Name", "actual": "Name", "nested": true }
  ]
}"#;

fn manifest() -> UnitManifest {
    parse_manifest(MANIFEST).expect("manifest should parse")
}

#[test]
fn parses_manifest_defaults() {
    let manifest = manifest();
    assert_eq!(manifest.package, "pkg");
    assert_eq!(manifest.wrappers.len(), 3);
    assert!(manifest.wrappers[0].is_final);
    assert!(manifest.wrappers[0].public_constructor);
    assert!(!manifest.wrappers[2].is_final);
    assert_eq!(manifest.declarations[0].returns, "Unit");
    assert!(manifest.type_parameters.is_empty());
}

#[test]
fn builds_wrappers_with_qualified_names() {
    let unit = manifest().build(0).expect("manifest should build");
    let types = &unit.types;
    let id = unit
        .wrappers
        .lookup(types.intern_string("pkg.ICPrimitive"))
        .expect("qualified wrapper");
    let decl = unit.wrappers.get(id).expect("defined");

    assert_eq!(decl.carrier, TypeId::INT32);
    assert_eq!(decl.members.len(), 3);
    assert!(decl.flags.contains(DeclarationFlags::TYPED_EQUALS));
    assert_eq!(decl.interfaces.len(), 1);
    assert!(decl.members[1].overrides.is_some());

    let name = unit
        .wrappers
        .lookup(types.intern_string("pkg.Name"))
        .and_then(|id| unit.wrappers.get(id))
        .expect("Name");
    assert_eq!(&*types.resolve_atom(name.carrier_name), "raw");
    assert_eq!(name.span, ilc_common::Span::new(0, 10, 14));
    assert!(!name.flags.contains(DeclarationFlags::TYPED_EQUALS));

    let open = unit
        .wrappers
        .lookup(types.intern_string("pkg.Open"))
        .and_then(|id| unit.wrappers.get(id))
        .expect("Open");
    assert!(!open.flags.contains(DeclarationFlags::FINAL));
}

#[test]
fn builds_declarations_and_use_sites() {
    let unit = manifest().build(2).expect("manifest should build");
    let types = &unit.types;

    assert_eq!(unit.declarations.len(), 4);
    let getter = &unit.declarations[2];
    assert_eq!(getter.kind, DeclKind::Getter);
    assert!(getter.receiver.is_some_and(|r| types.is_wrapper(r)));
    assert_eq!(&*types.resolve_atom(unit.declarations[3].scope), "pkg.util");
    assert_eq!(&*types.resolve_atom(unit.declarations[0].scope), "pkg");

    let ret = unit.declarations[3].ret;
    assert_eq!(
        types.display(ret, &unit.wrappers),
        "Array<T>",
        "bounded parameters display by name"
    );

    assert_eq!(unit.use_sites.len(), 3);
    assert_eq!(unit.use_sites[0].kind, UseSiteKind::Parameter);
    assert!(types.is_nullable(unit.use_sites[0].formal));
    assert!(unit.use_sites[1].is_generic_position);
    assert_eq!(unit.use_sites[1].span, ilc_common::Span::new(2, 3, 7));
    assert!(!unit.use_sites[2].is_top_level_signature_position);
}

#[test]
fn rejects_unknown_types() {
    let mut manifest = manifest();
    manifest.declarations[0].params = vec!["Missing".to_string()];
    let err = manifest.build(0).err().expect("unknown type");
    let chain = format!("{err:#}");
    assert!(chain.contains("in declaration 'compute'"), "{chain}");
    assert!(chain.contains("unknown type 'Missing'"), "{chain}");
}

#[test]
fn qualified_unknown_names_are_host_references() {
    let mut manifest = manifest();
    manifest.declarations[0].params = vec!["host.Thread".to_string()];
    let unit = manifest.build(0).expect("host references resolve");
    assert_eq!(
        unit.types.display(unit.declarations[0].params[0], &unit.wrappers),
        "host.Thread"
    );
}

#[test]
fn rejects_duplicate_wrappers_and_unknown_interfaces() {
    let mut duplicate = manifest();
    let copy = duplicate.wrappers[1].clone();
    duplicate.wrappers.push(copy);
    let err = duplicate.build(0).err().expect("duplicate");
    assert!(format!("{err:#}").contains("declared more than once"));

    let mut unknown = manifest();
    unknown.wrappers[1].implements = vec!["Hashable".to_string()];
    let err = unknown.build(0).err().expect("unknown interface");
    assert!(format!("{err:#}").contains("unknown interface 'Hashable'"));

    let mut stray = manifest();
    stray.wrappers[0].implements.clear();
    let err = stray.build(0).err().expect("override without implements");
    assert!(format!("{err:#}").contains("does not implement"));
}

#[test]
fn wrappers_may_reference_each_other_in_any_order() {
    let source = r#"{
      "package": "p",
      "typeParameters": [{ "name": "T", "bound": "Inner" }],
      "wrappers": [
        { "name": "Outer", "carrier": "Inner?" },
        { "name": "Inner", "carrier": "Float64" },
        { "name": "Boxed", "carrier": "T" }
      ]
    }"#;
    let unit = parse_manifest(source)
        .and_then(|m| m.build(0))
        .expect("forward references resolve");
    let outer = unit
        .wrappers
        .lookup(unit.types.intern_string("p.Outer"))
        .and_then(|id| unit.wrappers.get(id))
        .expect("Outer");
    assert!(unit.types.is_nullable(outer.carrier));
    assert!(unit.types.as_wrapper(outer.carrier).is_some());
    assert_eq!(unit.wrappers.len(), 3);
}

#[test]
fn rejects_malformed_json_and_empty_package() {
    assert!(parse_manifest("{").is_err());
    assert!(parse_manifest(r#"{"package": "p", "wrappers": [{"name": "A"}]}"#).is_err());

    let empty = UnitManifest::default();
    assert!(empty.build(0).is_err());
}
