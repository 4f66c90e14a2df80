use super::*;
use crate::types::TypeInterner;

#[test]
fn test_reserve_then_define() {
    let types = TypeInterner::new();
    let mut store = WrapperStore::new();
    let name = types.intern_string("pkg.Loop");

    let id = store.reserve(name);
    assert_eq!(store.reserve(name), id);
    assert!(store.get(id).is_none());
    assert_eq!(store.name_of(id), Some(name));

    let carrier = types.wrapper(id);
    assert!(store.define(id, WrapperDecl::new(name, carrier)));
    assert_eq!(store.get(id).map(|d| d.carrier), Some(carrier));
    assert!(!store.define(WrapperId(7), WrapperDecl::new(name, carrier)));
}

#[test]
fn test_register_and_lookup() {
    let types = TypeInterner::new();
    let mut store = WrapperStore::new();
    let a = store.register(WrapperDecl::new(types.intern_string("pkg.A"), TypeId::INT32));
    let b = store.register(WrapperDecl::new(types.intern_string("pkg.B"), TypeId::STRING));

    assert_eq!(store.len(), 2);
    assert_eq!(store.lookup(types.intern_string("pkg.B")), Some(b));
    assert_eq!(store.ids().collect::<Vec<_>>(), vec![a, b]);
    assert_eq!(store.iter().map(|(id, _)| id).collect::<Vec<_>>(), vec![a, b]);
}

#[test]
fn test_default_flags_are_well_formed() {
    let flags = DeclarationFlags::default();
    assert!(flags.contains(DeclarationFlags::FINAL));
    assert!(flags.contains(DeclarationFlags::TOP_LEVEL));
    assert!(flags.contains(DeclarationFlags::PUBLIC_CONSTRUCTOR));
    assert!(!flags.contains(DeclarationFlags::HAS_VALIDATION));
    assert!(!flags.contains(DeclarationFlags::TYPED_EQUALS));
}

#[test]
fn test_member_to_declaration() {
    let types = TypeInterner::new();
    let mut store = WrapperStore::new();
    let owner_name = types.intern_string("pkg.Meters");
    let id = store.register(WrapperDecl::new(owner_name, TypeId::FLOAT64));
    let owner_type = types.wrapper(id);

    let member = WrapperMember::new(types.intern_string("plus"), &[owner_type], owner_type);
    let decl = member.to_declaration(id, owner_name, owner_type);

    assert_eq!(decl.kind, DeclKind::Function);
    assert_eq!(decl.scope, owner_name);
    assert_eq!(decl.owner, Some(id));
    assert_eq!(decl.receiver, Some(owner_type));
    assert_eq!(
        decl.top_level_positions().collect::<Vec<_>>(),
        vec![owner_type, owner_type, owner_type]
    );
}

#[test]
fn test_interface_member_lookup() {
    let types = TypeInterner::new();
    let compare = types.intern_string("compareTo");
    let iface = InterfaceDecl::new(types.intern_string("host.Comparable"))
        .with_member(compare, &[TypeId::ANY], TypeId::INT32);

    let member = iface.member(compare).expect("member exists");
    assert_eq!(member.ret, TypeId::INT32);
    assert!(iface.member(types.intern_string("equals")).is_none());
}
