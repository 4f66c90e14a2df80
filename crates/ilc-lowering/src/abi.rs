//! ABI synthesis.
//!
//! Each wrapper declaration gets one [`AbiUnit`]: the synthetic linkable
//! members that realize "erased by default, boxed on demand" at the binary
//! level.
//!
//! | Symbol             | Kind                       | Shape                          |
//! |--------------------|----------------------------|--------------------------------|
//! | `<init>`           | private erased constructor | box instance, `(E)V`, private  |
//! | `constructor-impl` | public factory             | static `(C)E`, runs validation |
//! | `box-impl`         | boxing accessor            | static `(E)Box`                |
//! | `unbox-impl`       | unboxing accessor          | box instance `()E`             |
//! | `equals-impl`      | erased equals              | static `(E, Any?)Z`            |
//! | `equals-impl0`     | specialized equals         | static `(E, E)Z`               |
//! | `hashCode-impl`    | erased hashCode            | static `(E)I`                  |
//! | `toString-impl`    | erased toString            | static `(E)String`             |
//!
//! `E` is the wrapper's erased representation and `C` its carrier. Every user
//! member becomes a static-shaped method with the erased receiver first, and
//! every interface member (plus the host root `equals`/`hashCode`/`toString`)
//! gets a bridge on the box that unboxes and delegates.
//!
//! A declared `toString()`, `hashCode()` or `equals(Any?)` is not emitted a
//! second time: it becomes the body of the matching erased member. Interface
//! bridges take the symbol of the interface's own contract, mangled like any
//! other declaration in the interface's scope.

use crate::def::{Declaration, DeclarationFlags, WrapperDecl, WrapperId, WrapperMember};
use crate::diagnostics::LoweringError;
use crate::mangle::SymbolMangler;
use crate::representation::{Representation, RepresentationResolver};
use crate::types::TypeId;
use crate::validate::wrapper_display_name;
use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::{debug, trace};

pub const INIT: &str = "<init>";
pub const CONSTRUCTOR_IMPL: &str = "constructor-impl";
pub const BOX_IMPL: &str = "box-impl";
pub const UNBOX_IMPL: &str = "unbox-impl";
pub const EQUALS_IMPL: &str = "equals-impl";
pub const EQUALS_IMPL0: &str = "equals-impl0";
pub const HASH_CODE_IMPL: &str = "hashCode-impl";
pub const TO_STRING_IMPL: &str = "toString-impl";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum SyntheticKind {
    PrivateErasedConstructor,
    PublicFactory,
    BoxingAccessor,
    UnboxingAccessor,
    ErasedEquals,
    ErasedHashCode,
    ErasedToString,
    SpecializedEquals,
    InterfaceBridge,
    /// Erased-level implementation of a user member.
    StaticShapedMethod,
}

/// A formal parameter or return type at the binary surface.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "of")]
pub enum AbiType {
    /// A wrapper value in its erased representation.
    Erased {
        wrapper: WrapperId,
        representation: Representation,
    },
    /// The wrapper's synthetic reference (box) type.
    SyntheticBox(WrapperId),
    Host(TypeId),
}

impl AbiType {
    pub fn descriptor(&self, resolver: &RepresentationResolver<'_>) -> Result<String, LoweringError> {
        match *self {
            Self::Erased { representation, .. } => resolver.descriptor(representation),
            Self::SyntheticBox(w) => resolver.descriptor(Representation::BoxedSelf(w)),
            Self::Host(ty) => resolver.type_descriptor(ty),
        }
    }

    fn carries(&self, wrapper: WrapperId) -> bool {
        match *self {
            Self::Erased { wrapper: w, .. } | Self::SyntheticBox(w) => w == wrapper,
            Self::Host(_) => false,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Visibility {
    Public,
    Private,
}

/// Static members live on the wrapper's facade; instance members on its box.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Dispatch {
    Static,
    Instance,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntheticMember {
    pub kind: SyntheticKind,
    pub symbol: String,
    pub params: Vec<AbiType>,
    pub ret: AbiType,
    pub visibility: Visibility,
    pub dispatch: Dispatch,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegates_to: Option<String>,
    /// The body is a member the wrapper declares, not a synthesized default.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub declared: bool,
    /// The wrapper's validation block runs in this member.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub runs_validation: bool,
}

impl SyntheticMember {
    fn new(kind: SyntheticKind, symbol: impl Into<String>, params: Vec<AbiType>, ret: AbiType) -> Self {
        Self {
            kind,
            symbol: symbol.into(),
            params,
            ret,
            visibility: Visibility::Public,
            dispatch: Dispatch::Static,
            delegates_to: None,
            declared: false,
            runs_validation: false,
        }
    }

    fn private(mut self) -> Self {
        self.visibility = Visibility::Private;
        self
    }

    fn instance(mut self) -> Self {
        self.dispatch = Dispatch::Instance;
        self
    }

    fn delegating(mut self, target: impl Into<String>) -> Self {
        self.delegates_to = Some(target.into());
        self
    }

    fn declared(mut self) -> Self {
        self.declared = true;
        self.delegates_to = None;
        self
    }

    /// `symbol(params)ret` with binary descriptors.
    pub fn signature(&self, resolver: &RepresentationResolver<'_>) -> Result<String, LoweringError> {
        let mut out = format!("{}(", self.symbol);
        for param in &self.params {
            out.push_str(&param.descriptor(resolver)?);
        }
        out.push(')');
        out.push_str(&self.ret.descriptor(resolver)?);
        Ok(out)
    }
}

/// The emitted binary surface of one wrapper.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbiUnit {
    pub wrapper: WrapperId,
    pub name: String,
    /// Representation of non-null uses.
    pub representation: Representation,
    /// Representation of nullable uses.
    pub nullable_representation: Representation,
    pub members: Vec<SyntheticMember>,
}

impl AbiUnit {
    pub fn member(&self, symbol: &str) -> Option<&SyntheticMember> {
        self.members.iter().find(|m| m.symbol == symbol)
    }

    pub fn members_of(&self, kind: SyntheticKind) -> impl Iterator<Item = &SyntheticMember> {
        self.members.iter().filter(move |m| m.kind == kind)
    }
}

// =============================================================================
// AbiSynthesizer
// =============================================================================

pub struct AbiSynthesizer<'m, 'r, 'a> {
    resolver: &'r RepresentationResolver<'a>,
    mangler: &'m SymbolMangler<'r, 'a>,
}

impl<'m, 'r, 'a> AbiSynthesizer<'m, 'r, 'a> {
    pub fn new(resolver: &'r RepresentationResolver<'a>, mangler: &'m SymbolMangler<'r, 'a>) -> Self {
        Self { resolver, mangler }
    }

    #[tracing::instrument(level = "debug", skip_all, fields(wrapper = id.0))]
    pub fn synthesize(&self, id: WrapperId) -> Result<AbiUnit, LoweringError> {
        let decl = self
            .resolver
            .wrappers()
            .get(id)
            .ok_or(LoweringError::UnknownWrapper { id: id.0 })?;
        let representation = self.resolver.resolve_wrapper(id, false)?.representation;
        let nullable_representation = self.resolver.resolve_wrapper(id, true)?.representation;

        let erased = AbiType::Erased {
            wrapper: id,
            representation,
        };
        let carrier = self.abi_type(decl.carrier)?;
        let bool_ty = AbiType::Host(TypeId::BOOL);
        let any_ty = AbiType::Host(self.resolver.types().nullable(TypeId::ANY));

        let mut factory =
            SyntheticMember::new(SyntheticKind::PublicFactory, CONSTRUCTOR_IMPL, vec![carrier], erased);
        factory.runs_validation = decl.flags.contains(DeclarationFlags::HAS_VALIDATION);

        let mut members = vec![
            SyntheticMember::new(
                SyntheticKind::PrivateErasedConstructor,
                INIT,
                vec![erased],
                AbiType::Host(TypeId::VOID),
            )
            .private()
            .instance(),
            factory,
            SyntheticMember::new(
                SyntheticKind::BoxingAccessor,
                BOX_IMPL,
                vec![erased],
                AbiType::SyntheticBox(id),
            )
            .delegating(INIT),
            SyntheticMember::new(SyntheticKind::UnboxingAccessor, UNBOX_IMPL, Vec::new(), erased)
                .instance(),
        ];

        // User members, erased receiver first.
        let owner_type = self.resolver.types().wrapper(id);
        let mut member_symbols = Vec::with_capacity(decl.members.len());
        let mut declared_root = FxHashSet::default();
        for member in &decl.members {
            let declaration = member.to_declaration(id, decl.name, owner_type);
            let symbol = self.mangler.mangle(&declaration)?.to_string();
            if let Some(kind) = self.root_override(member) {
                trace!(symbol = %symbol, kind = ?kind, "declared member replaces erased default");
                declared_root.insert(kind);
                member_symbols.push(symbol);
                continue;
            }
            let mut params = Vec::with_capacity(member.params.len() + 1);
            params.push(erased);
            for ty in &member.params {
                params.push(self.abi_type(*ty)?);
            }
            members.push(SyntheticMember::new(
                SyntheticKind::StaticShapedMethod,
                symbol.clone(),
                params,
                self.abi_type(member.ret)?,
            ));
            member_symbols.push(symbol);
        }

        let typed_equals = self.typed_equals_symbol(decl, id, &member_symbols);
        let specialized = SyntheticMember::new(
            SyntheticKind::SpecializedEquals,
            EQUALS_IMPL0,
            vec![erased, erased],
            bool_ty,
        );
        members.push(match typed_equals {
            Some(symbol) => specialized.delegating(symbol),
            None => specialized,
        });
        let erased_root = [
            SyntheticMember::new(SyntheticKind::ErasedEquals, EQUALS_IMPL, vec![erased, any_ty], bool_ty)
                .delegating(EQUALS_IMPL0),
            SyntheticMember::new(
                SyntheticKind::ErasedHashCode,
                HASH_CODE_IMPL,
                vec![erased],
                AbiType::Host(TypeId::INT32),
            ),
            SyntheticMember::new(
                SyntheticKind::ErasedToString,
                TO_STRING_IMPL,
                vec![erased],
                AbiType::Host(TypeId::STRING),
            ),
        ];
        members.extend(erased_root.into_iter().map(|member| {
            if declared_root.contains(&member.kind) {
                member.declared()
            } else {
                member
            }
        }));

        // Host root contract on the box.
        members.extend([
            SyntheticMember::new(SyntheticKind::InterfaceBridge, "equals", vec![any_ty], bool_ty)
                .instance()
                .delegating(EQUALS_IMPL),
            SyntheticMember::new(
                SyntheticKind::InterfaceBridge,
                "hashCode",
                Vec::new(),
                AbiType::Host(TypeId::INT32),
            )
            .instance()
            .delegating(HASH_CODE_IMPL),
            SyntheticMember::new(
                SyntheticKind::InterfaceBridge,
                "toString",
                Vec::new(),
                AbiType::Host(TypeId::STRING),
            )
            .instance()
            .delegating(TO_STRING_IMPL),
        ]);

        // Interface members implemented by the wrapper.
        for (member, symbol) in decl.members.iter().zip(&member_symbols) {
            let Some(interface) = member.overrides else {
                continue;
            };
            let contract = self
                .resolver
                .wrappers()
                .interface(interface)
                .and_then(|i| i.member(member.name));
            let (params, ret) = match contract {
                Some(contract) => (&contract.params[..], contract.ret),
                None => (&member.params[..], member.ret),
            };
            let slot = Declaration::function(interface, member.name, params, ret);
            let bridge = SyntheticMember::new(
                SyntheticKind::InterfaceBridge,
                self.mangler.mangle(&slot)?.to_string(),
                params
                    .iter()
                    .map(|ty| self.abi_type(*ty))
                    .collect::<Result<Vec<_>, _>>()?,
                self.abi_type(ret)?,
            )
            .instance()
            .delegating(symbol.clone());

            // The host root bridges already cover a re-declared root contract.
            let covered = members.iter().any(|m| {
                m.kind == SyntheticKind::InterfaceBridge
                    && m.symbol == bridge.symbol
                    && m.params == bridge.params
            });
            if !covered {
                members.push(bridge);
            }
        }

        let unit = AbiUnit {
            wrapper: id,
            name: wrapper_display_name(self.resolver.wrappers(), self.resolver.types(), id),
            representation,
            nullable_representation,
            members,
        };
        debug!(wrapper = %unit.name, members = unit.members.len(), "abi synthesized");
        Ok(unit)
    }

    /// Binary-surface type of a source type.
    ///
    /// Wrapper positions stay erased even when the erasure is the wrapper's
    /// own box (a nullable primitive-backed wrapper): only `box-impl` is typed
    /// as returning the box.
    fn abi_type(&self, ty: TypeId) -> Result<AbiType, LoweringError> {
        match self.resolver.types().as_wrapper(ty) {
            Some(wrapper) => Ok(AbiType::Erased {
                wrapper,
                representation: self.resolver.resolve_type(ty)?,
            }),
            None => Ok(AbiType::Host(ty)),
        }
    }

    /// Erased root member a declared member supplies the body of:
    /// `toString(): String`, `hashCode(): Int32` or `equals(Any?): Bool`.
    fn root_override(&self, member: &WrapperMember) -> Option<SyntheticKind> {
        let types = self.resolver.types();
        let name = types.resolve_atom(member.name);
        match (&*name, member.params.as_slice()) {
            ("toString", []) if types.non_null(member.ret) == TypeId::STRING => {
                Some(SyntheticKind::ErasedToString)
            }
            ("hashCode", []) if member.ret == TypeId::INT32 => Some(SyntheticKind::ErasedHashCode),
            ("equals", [other]) if types.non_null(*other) == TypeId::ANY && member.ret == TypeId::BOOL => {
                Some(SyntheticKind::ErasedEquals)
            }
            _ => None,
        }
    }

    /// Symbol of the declared `equals(other: Self)` override, if any.
    fn typed_equals_symbol(&self, decl: &WrapperDecl, id: WrapperId, symbols: &[String]) -> Option<String> {
        if !decl.flags.contains(DeclarationFlags::TYPED_EQUALS) {
            return None;
        }
        let types = self.resolver.types();
        decl.members
            .iter()
            .zip(symbols)
            .find(|(member, _)| {
                &*types.resolve_atom(member.name) == "equals"
                    && member.params.len() == 1
                    && types.as_wrapper(member.params[0]) == Some(id)
            })
            .map(|(_, symbol)| symbol.clone())
    }
}

/// Check that no emitted member yields a wrapper value without passing
/// through the public factory or the boxing accessor.
///
/// * The erased constructor is private.
/// * `box-impl` is the only member returning the box type.
/// * A member returning the wrapper's erased value from no wrapper input
///   (neither a wrapper-typed parameter nor a box receiver) must be the
///   public factory.
/// * Only the public factory runs the validation block.
pub fn verify_initialization_paths(unit: &AbiUnit) -> Result<(), LoweringError> {
    let violation = |member: &SyntheticMember| LoweringError::InitializationPathViolation {
        member: member.symbol.clone(),
        wrapper: unit.name.clone(),
    };

    for member in &unit.members {
        if member.kind == SyntheticKind::PrivateErasedConstructor
            && member.visibility != Visibility::Private
        {
            return Err(violation(member));
        }
        if matches!(member.ret, AbiType::SyntheticBox(_)) && member.kind != SyntheticKind::BoxingAccessor {
            return Err(violation(member));
        }
        let produces = member.ret.carries(unit.wrapper);
        let consumes = member.dispatch == Dispatch::Instance
            || member.params.iter().any(|p| p.carries(unit.wrapper));
        if produces && !consumes && member.kind != SyntheticKind::PublicFactory {
            return Err(violation(member));
        }
        if member.runs_validation && member.kind != SyntheticKind::PublicFactory {
            return Err(violation(member));
        }
    }
    Ok(())
}

/// Check that no two members of `unit` share symbol and descriptor.
pub fn verify_unique_members(
    unit: &AbiUnit,
    resolver: &RepresentationResolver<'_>,
) -> Result<(), LoweringError> {
    let mut seen = FxHashSet::default();
    for member in &unit.members {
        let signature = member.signature(resolver)?;
        if !seen.insert(signature.clone()) {
            return Err(LoweringError::DuplicateAbiMember {
                signature,
                wrapper: unit.name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "../tests/abi_tests.rs"]
mod tests;
