use super::*;
use crate::boxing::UseSiteKind;
use crate::test_fixtures::TestContext;

/// `ICPrimitive(Int32)` with a `length()` member, and `Name(String)`.
fn context() -> (TestContext, WrapperId, TypeId, WrapperId, TypeId) {
    let mut ctx = TestContext::new();
    let length = ctx.member("length", &[], TypeId::INT32);
    let decl = crate::def::WrapperDecl::new(ctx.atom("pkg.ICPrimitive"), TypeId::INT32)
        .with_carrier_name(ctx.atom("value"))
        .with_member(length);
    let (int_id, int_ty) = ctx.register(decl);
    let (name_id, name_ty) = ctx.wrapper("pkg.Name", TypeId::STRING);
    (ctx, int_id, int_ty, name_id, name_ty)
}

#[test]
fn test_clean_scope_seals_without_errors() {
    let (ctx, int_id, int_ty, name_id, _) = context();
    let mut scope = ctx.scope();
    let compute = scope.add_declaration(ctx.function("pkg", "compute", &[int_ty], TypeId::VOID));
    let sealed = scope.seal();

    assert!(sealed.is_ok(), "{:?}", sealed.errors());
    assert_eq!(
        sealed.abi_units().iter().map(|u| u.wrapper).collect::<Vec<_>>(),
        vec![int_id, name_id]
    );
    assert!(sealed.symbol_of(compute).is_some_and(MangledSymbol::is_mangled));
    assert_eq!(
        sealed.resolve(int_ty, false),
        Ok(Representation::Primitive(crate::types::PrimitiveKind::Int32))
    );
}

#[test]
fn test_wrapper_members_join_the_symbol_table() {
    let (ctx, _, _, _, _) = context();
    let mut scope = ctx.scope();
    let plain = scope.add_declaration(ctx.function("pkg", "main", &[], TypeId::VOID));
    let sealed = scope.seal();

    let symbols: Vec<String> = sealed
        .symbol_table()
        .filter_map(|(_, symbol)| symbol.map(ToString::to_string))
        .collect();
    assert_eq!(symbols, vec!["main".to_string(), "length-impl".to_string()]);

    // Member declarations are not addressable as user declarations.
    assert!(sealed.declaration(plain).is_some());
    assert!(sealed.declaration(DeclId(1)).is_none());
    assert_eq!(sealed.symbol_of(DeclId(1)), None);
}

#[test]
fn test_erasure_colliding_overloads_end_to_end() {
    let mut ctx = TestContext::new();
    let (_, prim) = ctx.wrapper("pkg.ICPrimitive", TypeId::INT32);
    let (_, other) = ctx.wrapper("pkg.ICOther", TypeId::INT32);
    let mut scope = ctx.scope();
    let ids = [
        scope.add_declaration(ctx.function("pkg", "compute", &[TypeId::INT32], TypeId::VOID)),
        scope.add_declaration(ctx.function("pkg", "compute", &[prim], TypeId::VOID)),
        scope.add_declaration(ctx.function("pkg", "compute", &[other], TypeId::VOID)),
    ];
    let sealed = scope.seal();

    assert!(sealed.is_ok(), "{:?}", sealed.errors());
    let names: Vec<String> = ids
        .iter()
        .map(|id| sealed.symbol_of(*id).expect("mangled").to_string())
        .collect();
    assert!(names.iter().all(|n| n.starts_with("compute-")));
    assert_ne!(names[0], names[1]);
    assert_ne!(names[1], names[2]);
    assert_ne!(names[0], names[2]);
}

#[test]
fn test_poisoned_wrapper_errors_are_reported_once() {
    let mut ctx = TestContext::new();
    let (a, ta) = ctx.reserve("pkg.A");
    let (b, tb) = ctx.reserve("pkg.B");
    ctx.define(a, tb);
    ctx.define(b, ta);
    let (_, ok_ty) = ctx.wrapper("pkg.Ok", TypeId::INT64);

    let mut scope = ctx.scope();
    let uses_a = scope.add_declaration(ctx.function("pkg", "take", &[ta], TypeId::VOID));
    let uses_ok = scope.add_declaration(ctx.function("pkg", "take", &[ok_ty], TypeId::VOID));
    let sealed = scope.seal();

    let cycles = sealed
        .errors()
        .iter()
        .filter(|e| matches!(e, LoweringError::SelfReferentialCarrier { .. }))
        .count();
    assert_eq!(cycles, 1, "{:?}", sealed.errors());
    assert_eq!(sealed.errors().len(), 1);
    assert!(sealed.abi_unit(a).is_none());
    assert!(sealed.abi_unit(b).is_none());
    assert_eq!(sealed.abi_units().len(), 1);

    assert_eq!(sealed.symbol_of(uses_a), None);
    assert!(sealed.symbol_of(uses_ok).is_some());

    let diagnostics = sealed.diagnostics(&[]);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].code, ilc_common::diagnostic_codes::SELF_REFERENTIAL_CARRIER);
}

#[test]
fn test_depth_limit_comes_from_options() {
    // Outermost first, so sequential resolution walks the whole chain at once.
    let mut ctx = TestContext::new();
    let (l2, _) = ctx.reserve("pkg.L2");
    let (l1, t1) = ctx.reserve("pkg.L1");
    let (l0, t0) = ctx.reserve("pkg.L0");
    ctx.define(l0, TypeId::INT32);
    ctx.define(l1, t0);
    ctx.define(l2, t1);

    let shallow = ctx
        .scope_with(LoweringOptions {
            max_carrier_depth: 2,
            parallel: false,
            ..LoweringOptions::default()
        })
        .seal();
    match shallow.errors() {
        [LoweringError::CarrierChainTooDeep { wrapper, limit, .. }] => {
            assert_eq!(wrapper, "pkg.L2");
            assert_eq!(*limit, 2);
        }
        other => panic!("expected one depth error, got {other:?}"),
    }
    assert!(shallow.abi_unit(l2).is_none());
    assert!(shallow.abi_unit(l1).is_some());
    assert!(ctx.scope().seal().is_ok());
}

#[test]
fn test_use_sites_are_lowered_after_sealing() {
    let (ctx, int_id, int_ty, _, name_ty) = context();
    let sealed = ctx.scope().seal();

    let sites = [
        UseSite::new(UseSiteKind::Parameter, int_ty, int_ty),
        UseSite::new(UseSiteKind::Parameter, TypeId::ANY, int_ty),
        UseSite::new(UseSiteKind::Return, int_ty, TypeId::ANY),
    ];
    let markers = sealed.lower_use_sites(&sites).expect("lowered");
    assert_eq!(
        markers.iter().map(|m| m.decision).collect::<Vec<_>>(),
        vec![
            BoxingDecision::Unboxed,
            BoxingDecision::Box(int_id),
            BoxingDecision::Unbox(int_id),
        ]
    );
    assert_eq!(markers.iter().map(|m| m.index).collect::<Vec<_>>(), vec![0, 1, 2]);

    let bad = [
        UseSite::new(UseSiteKind::Parameter, int_ty, int_ty),
        UseSite::new(UseSiteKind::Parameter, int_ty, name_ty),
        UseSite::new(UseSiteKind::VarargElement, name_ty, name_ty),
    ];
    let errors = sealed.lower_use_sites(&bad).expect_err("rejected");
    assert_eq!(errors.len(), 2);
    assert!(matches!(errors[0], LoweringError::UnrelatedWrapperConversion { .. }));
    assert!(matches!(errors[1], LoweringError::VarargOfWrapper { .. }));
}

#[test]
fn test_equality_and_identity_on_sealed_scope() {
    let (ctx, int_id, int_ty, _, name_ty) = context();
    let sealed = ctx.scope().seal();

    assert_eq!(
        sealed.decide_equality(int_ty, int_ty),
        Ok(EqualityPlan::Specialized { wrapper: int_id })
    );
    assert!(
        sealed
            .check_identity_comparison(name_ty, name_ty, Span::UNKNOWN)
            .is_err()
    );
}

#[test]
fn test_parallel_and_sequential_sealing_agree() {
    let mut ctx = TestContext::new();
    let mut previous = TypeId::INT32;
    for i in 0..16 {
        let (_, ty) = ctx.wrapper(&format!("pkg.W{i}"), previous);
        previous = if i % 3 == 0 { ctx.nullable(ty) } else { ty };
    }
    let declarations: Vec<Declaration> = (0..16)
        .map(|i| {
            let ty = ctx.types.wrapper(WrapperId(i));
            ctx.function("pkg", "use", &[ty], TypeId::VOID)
        })
        .collect();

    let seal = |parallel: bool| {
        let mut scope = ctx.scope_with(LoweringOptions {
            parallel,
            ..LoweringOptions::default()
        });
        for decl in &declarations {
            scope.add_declaration(decl.clone());
        }
        let sealed = scope.seal();
        assert!(sealed.is_ok(), "{:?}", sealed.errors());
        let symbols: Vec<String> = sealed
            .symbol_table()
            .map(|(_, s)| s.map(ToString::to_string).unwrap_or_default())
            .collect();
        (sealed.abi_units().to_vec(), symbols)
    };
    assert_eq!(seal(true), seal(false));
}

#[test]
fn test_options_are_normalized() {
    let (ctx, _, _, _, _) = context();
    let scope = ctx.scope_with(LoweringOptions {
        hash_length: 64,
        max_carrier_depth: 0,
        parallel: false,
    });
    assert_eq!(
        scope.options(),
        LoweringOptions {
            hash_length: 16,
            max_carrier_depth: 1,
            parallel: false,
        }
    );
}

#[test]
fn test_cycle_behind_many_dependents_is_reported_once() {
    let mut ctx = TestContext::new();
    let (a, ta) = ctx.reserve("pkg.A");
    let (b, tb) = ctx.reserve("pkg.B");
    ctx.define(a, tb);
    ctx.define(b, ta);
    let dependents: Vec<TypeId> = (0..32)
        .map(|i| ctx.wrapper(&format!("pkg.Over{i}"), ta).1)
        .collect();

    let mut scope = ctx.scope();
    for ty in &dependents {
        scope.add_declaration(ctx.function("pkg", "take", &[*ty], TypeId::VOID));
    }
    let sealed = scope.seal();

    let cycles = sealed
        .errors()
        .iter()
        .filter(|e| matches!(e, LoweringError::SelfReferentialCarrier { .. }))
        .count();
    assert_eq!(cycles, 1, "{:?}", sealed.errors());
}

#[test]
fn test_declared_root_members_seal_cleanly() {
    let mut ctx = TestContext::new();
    let any = ctx.nullable(TypeId::ANY);
    let decl = crate::def::WrapperDecl::new(ctx.atom("pkg.Name"), TypeId::STRING)
        .with_carrier_name(ctx.atom("value"))
        .with_member(ctx.member("toString", &[], TypeId::STRING))
        .with_member(ctx.member("hashCode", &[], TypeId::INT32))
        .with_member(ctx.member("equals", &[any], TypeId::BOOL));
    let (id, _) = ctx.register(decl);
    let sealed = ctx.scope().seal();

    assert!(sealed.is_ok(), "{:?}", sealed.errors());
    let unit = sealed.abi_unit(id).expect("synthesized");
    let to_string = unit
        .members
        .iter()
        .filter(|m| m.symbol == crate::abi::TO_STRING_IMPL)
        .count();
    assert_eq!(to_string, 1);
}
