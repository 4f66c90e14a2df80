use super::*;
use crate::test_fixtures::TestContext;

struct Fixture {
    ctx: TestContext,
    int_id: WrapperId,
    int_ty: TypeId,
    name_id: WrapperId,
    name_ty: TypeId,
}

/// `ICPrimitive(Int32)` and `Name(String)`.
fn fixture() -> Fixture {
    let mut ctx = TestContext::new();
    let (int_id, int_ty) = ctx.wrapper("pkg.ICPrimitive", TypeId::INT32);
    let (name_id, name_ty) = ctx.wrapper("pkg.Name", TypeId::STRING);
    Fixture {
        ctx,
        int_id,
        int_ty,
        name_id,
        name_ty,
    }
}

fn decide(f: &Fixture, site: UseSite) -> Result<BoxingDecision, LoweringError> {
    let resolver = f.ctx.resolver();
    BoxingEngine::new(&resolver).decide(&site)
}

#[test]
fn test_same_wrapper_stays_unboxed() {
    let f = fixture();
    let site = UseSite::new(UseSiteKind::Parameter, f.int_ty, f.int_ty);
    assert_eq!(decide(&f, site), Ok(BoxingDecision::Unboxed));

    let site = UseSite::new(UseSiteKind::Receiver, f.name_ty, f.name_ty);
    assert_eq!(decide(&f, site), Ok(BoxingDecision::Unboxed));
}

#[test]
fn test_erosion_to_supertype_boxes() {
    let f = fixture();
    let any = f.ctx.nullable(TypeId::ANY);
    let iface = f.ctx.types.interface("host.Comparable");

    let site = UseSite::new(UseSiteKind::Parameter, any, f.int_ty);
    assert_eq!(decide(&f, site), Ok(BoxingDecision::Box(f.int_id)));
    let site = UseSite::new(UseSiteKind::Return, iface, f.name_ty);
    assert_eq!(decide(&f, site), Ok(BoxingDecision::Box(f.name_id)));
}

#[test]
fn test_type_variable_formal_boxes() {
    let f = fixture();
    let t = f.ctx.types.type_param("T", None, false);
    let site = UseSite::new(UseSiteKind::Parameter, t, f.name_ty);
    assert_eq!(decide(&f, site), Ok(BoxingDecision::Box(f.name_id)));
}

#[test]
fn test_nullability_alone_never_boxes() {
    let f = fixture();
    let nullable_name = f.ctx.nullable(f.name_ty);
    let site = UseSite::new(UseSiteKind::Parameter, nullable_name, f.name_ty);
    assert_eq!(decide(&f, site), Ok(BoxingDecision::Unboxed));
    let site = UseSite::new(UseSiteKind::Parameter, f.name_ty, nullable_name);
    assert_eq!(decide(&f, site), Ok(BoxingDecision::Unboxed));
}

#[test]
fn test_nullable_primitive_wrapper_is_held_boxed() {
    let f = fixture();
    let nullable_int = f.ctx.nullable(f.int_ty);

    // The erasure of `ICPrimitive?` is its own box.
    let site = UseSite::new(UseSiteKind::Parameter, nullable_int, f.int_ty);
    assert_eq!(decide(&f, site), Ok(BoxingDecision::Box(f.int_id)));
    let site = UseSite::new(UseSiteKind::Parameter, f.int_ty, nullable_int);
    assert_eq!(decide(&f, site), Ok(BoxingDecision::Unbox(f.int_id)));
    let site = UseSite::new(UseSiteKind::Parameter, TypeId::ANY, nullable_int);
    assert_eq!(decide(&f, site), Ok(BoxingDecision::NoOp));
    let site = UseSite::new(UseSiteKind::Parameter, nullable_int, nullable_int);
    assert_eq!(decide(&f, site), Ok(BoxingDecision::NoOp));
}

#[test]
fn test_downcast_unboxes() {
    let f = fixture();
    let site = UseSite::new(UseSiteKind::Parameter, f.int_ty, TypeId::ANY);
    assert_eq!(decide(&f, site), Ok(BoxingDecision::Unbox(f.int_id)));
}

#[test]
fn test_generic_position_always_boxes() {
    let f = fixture();
    let site = UseSite::new(UseSiteKind::GenericArgument, f.int_ty, f.int_ty);
    assert!(site.is_generic_position);
    assert_eq!(decide(&f, site), Ok(BoxingDecision::Box(f.int_id)));

    let site = UseSite::new(UseSiteKind::Parameter, f.name_ty, f.name_ty).generic();
    assert_eq!(decide(&f, site), Ok(BoxingDecision::Box(f.name_id)));

    let nullable_int = f.ctx.nullable(f.int_ty);
    let site = UseSite::new(UseSiteKind::GenericArgument, nullable_int, nullable_int);
    assert_eq!(decide(&f, site), Ok(BoxingDecision::NoOp));
}

#[test]
fn test_ordinary_values_are_untouched() {
    let f = fixture();
    let site = UseSite::new(UseSiteKind::Field, TypeId::ANY, TypeId::STRING);
    assert_eq!(decide(&f, site), Ok(BoxingDecision::NoOp));
    let site = UseSite::new(UseSiteKind::GenericArgument, TypeId::ANY, TypeId::INT32);
    assert_eq!(decide(&f, site), Ok(BoxingDecision::NoOp));
}

#[test]
fn test_unrelated_wrappers_are_rejected() {
    let f = fixture();
    let site = UseSite::new(UseSiteKind::Parameter, f.int_ty, f.name_ty);
    assert_eq!(
        decide(&f, site),
        Err(LoweringError::UnrelatedWrapperConversion {
            actual: "pkg.Name".to_string(),
            formal: "pkg.ICPrimitive".to_string(),
            span: Span::UNKNOWN,
        })
    );
}

#[test]
fn test_vararg_of_wrapper_is_rejected() {
    let f = fixture();
    let span = Span::new(0, 10, 14);
    let site = UseSite::new(UseSiteKind::VarargElement, f.int_ty, f.int_ty).with_span(span);
    assert_eq!(
        decide(&f, site),
        Err(LoweringError::VarargOfWrapper {
            wrapper: "pkg.ICPrimitive".to_string(),
            span,
        })
    );

    let site = UseSite::new(UseSiteKind::VarargElement, TypeId::INT32, TypeId::INT32);
    assert_eq!(decide(&f, site), Ok(BoxingDecision::NoOp));
}

#[test]
fn test_generic_array_of_wrapper_is_ambiguous() {
    let f = fixture();
    let t = f.ctx.types.type_param("T", Some(f.int_ty), false);
    let array = f.ctx.types.array(t);
    let site = UseSite::new(UseSiteKind::Parameter, array, array);

    match decide(&f, site) {
        Err(LoweringError::AmbiguousGenericArray {
            array, parameter, bound, ..
        }) => {
            assert_eq!(array, "Array<T>");
            assert_eq!(parameter, "T");
            assert_eq!(bound, "pkg.ICPrimitive");
        }
        other => panic!("expected an ambiguous array error, got {other:?}"),
    }

    // Concrete wrapper arrays are distinct declared types and fine.
    let concrete = f.ctx.types.array(f.int_ty);
    let site = UseSite::new(UseSiteKind::Parameter, concrete, concrete);
    assert_eq!(decide(&f, site), Ok(BoxingDecision::NoOp));
}

#[test]
fn test_equality_plans() {
    let f = fixture();
    let resolver = f.ctx.resolver();
    let engine = BoxingEngine::new(&resolver);
    let nullable_int = f.ctx.nullable(f.int_ty);

    assert_eq!(
        engine.decide_equality(f.int_ty, f.int_ty),
        Ok(EqualityPlan::Specialized { wrapper: f.int_id })
    );
    assert_eq!(
        engine.decide_equality(f.int_ty, TypeId::ANY),
        Ok(EqualityPlan::Erased {
            wrapper: f.int_id,
            lhs: BoxingDecision::Unboxed,
            rhs: BoxingDecision::NoOp,
        })
    );
    assert_eq!(
        engine.decide_equality(nullable_int, f.int_ty),
        Ok(EqualityPlan::Erased {
            wrapper: f.int_id,
            lhs: BoxingDecision::Unbox(f.int_id),
            rhs: BoxingDecision::Box(f.int_id),
        })
    );
    assert_eq!(
        engine.decide_equality(TypeId::ANY, f.name_ty),
        Ok(EqualityPlan::Ordinary {
            rhs: BoxingDecision::Box(f.name_id)
        })
    );
    assert_eq!(
        engine.decide_equality(TypeId::STRING, TypeId::STRING),
        Ok(EqualityPlan::Ordinary {
            rhs: BoxingDecision::NoOp
        })
    );
}

#[test]
fn test_identity_comparison() {
    let f = fixture();
    let resolver = f.ctx.resolver();
    let engine = BoxingEngine::new(&resolver);

    assert_eq!(
        engine.check_identity_comparison(TypeId::STRING, TypeId::ANY, Span::UNKNOWN),
        Ok(())
    );
    assert_eq!(
        engine.check_identity_comparison(TypeId::ANY, f.ctx.nullable(f.name_ty), Span::UNKNOWN),
        Err(LoweringError::IdentityComparisonOnWrapper {
            wrapper: "pkg.Name?".to_string(),
            span: Span::UNKNOWN,
        })
    );
}

#[test]
fn test_marker_names_the_accessor() {
    let f = fixture();
    let resolver = f.ctx.resolver();
    let engine = BoxingEngine::new(&resolver);
    let site = UseSite::new(UseSiteKind::Return, TypeId::ANY, f.int_ty);

    let marker = engine.marker(3, &site).expect("decided");
    assert_eq!(marker.index, 3);
    assert_eq!(marker.decision, BoxingDecision::Box(f.int_id));
    assert_eq!(marker.accessor.as_deref(), Some("pkg.ICPrimitive.box-impl"));

    let site = UseSite::new(UseSiteKind::Return, f.int_ty, f.int_ty);
    assert_eq!(engine.marker(0, &site).expect("decided").accessor, None);
}

#[test]
fn test_use_site_flags() {
    let site = UseSite::new(UseSiteKind::Parameter, TypeId::INT32, TypeId::INT32);
    assert!(site.is_top_level_signature_position);
    assert!(!site.is_generic_position);
    assert!(!site.nested().is_top_level_signature_position);
    assert!(!UseSite::new(UseSiteKind::Field, TypeId::INT32, TypeId::INT32).is_top_level_signature_position);
    assert_eq!(
        BoxingDecision::Unbox(WrapperId(0)).accessor(),
        Some(crate::abi::UNBOX_IMPL)
    );
}
