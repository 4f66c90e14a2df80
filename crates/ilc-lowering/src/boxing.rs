//! Boxing decisions at use sites.
//!
//! A wrapper value is *erased* when it is held in its erased representation
//! and *boxed* when it is held as its synthetic reference type. The decision
//! at a use site depends on the states of the actual and formal types:
//!
//! | actual \ formal   | same wrapper, erased | same wrapper, boxed | ordinary / generic |
//! |-------------------|----------------------|---------------------|--------------------|
//! | wrapper, erased   | `Unboxed`            | `Box`               | `Box`              |
//! | wrapper, boxed    | `Unbox`              | `NoOp`              | `NoOp`             |
//! | ordinary          | `Unbox`              | `NoOp`              | `NoOp`             |
//!
//! Nullability alone never causes a box. It only matters through the
//! representation: a nullable wrapper resolved to `BoxedSelf` of itself is
//! already held as its box.
//!
//! Generic argument positions always see the box, whatever the formal says.

use crate::def::WrapperId;
use crate::diagnostics::LoweringError;
use crate::representation::{Representation, RepresentationResolver};
use crate::types::{OrdinaryType, TypeId, TypeShape};
use crate::validate::wrapper_display_name;
use ilc_common::Span;
use serde::Serialize;
use tracing::trace;

// =============================================================================
// Use sites
// =============================================================================

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum UseSiteKind {
    Parameter,
    Return,
    Field,
    GenericArgument,
    VarargElement,
    Receiver,
    EqualityOperand,
}

impl UseSiteKind {
    pub const fn is_top_level_signature_position(self) -> bool {
        matches!(self, Self::Parameter | Self::Return | Self::Receiver)
    }
}

/// A position where a value of `actual` static type flows into `formal`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct UseSite {
    pub kind: UseSiteKind,
    pub formal: TypeId,
    pub actual: TypeId,
    pub is_generic_position: bool,
    pub is_top_level_signature_position: bool,
    pub span: Span,
}

impl UseSite {
    pub fn new(kind: UseSiteKind, formal: TypeId, actual: TypeId) -> Self {
        Self {
            kind,
            formal,
            actual,
            is_generic_position: kind == UseSiteKind::GenericArgument,
            is_top_level_signature_position: kind.is_top_level_signature_position(),
            span: Span::UNKNOWN,
        }
    }

    /// Mark the position as a generic type argument position.
    pub fn generic(mut self) -> Self {
        self.is_generic_position = true;
        self
    }

    /// Mark the position as nested inside a generic argument.
    pub fn nested(mut self) -> Self {
        self.is_top_level_signature_position = false;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

// =============================================================================
// Decisions
// =============================================================================

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "decision", content = "wrapper")]
pub enum BoxingDecision {
    /// The value stays in its erased representation.
    Unboxed,
    /// Call the wrapper's `box-impl`.
    Box(WrapperId),
    /// Call the wrapper's `unbox-impl`.
    Unbox(WrapperId),
    NoOp,
}

impl BoxingDecision {
    pub const fn is_conversion(self) -> bool {
        matches!(self, Self::Box(_) | Self::Unbox(_))
    }

    pub const fn wrapper(self) -> Option<WrapperId> {
        match self {
            Self::Box(w) | Self::Unbox(w) => Some(w),
            Self::Unboxed | Self::NoOp => None,
        }
    }

    /// Synthetic accessor performing the conversion.
    pub const fn accessor(self) -> Option<&'static str> {
        match self {
            Self::Box(_) => Some(crate::abi::BOX_IMPL),
            Self::Unbox(_) => Some(crate::abi::UNBOX_IMPL),
            Self::Unboxed | Self::NoOp => None,
        }
    }
}

/// A decision handed to the general code generator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConversionMarker {
    /// Index of the use site in the lowered batch.
    pub index: usize,
    pub kind: UseSiteKind,
    pub span: Span,
    pub decision: BoxingDecision,
    /// `pkg.Name.box-impl` / `pkg.Name.unbox-impl` for conversions.
    pub accessor: Option<String>,
}

/// How an `==` between two operands is lowered.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "plan")]
pub enum EqualityPlan {
    /// Both operands are erased values of the same wrapper: `equals-impl0`.
    Specialized { wrapper: WrapperId },
    /// The left operand is a wrapper: `equals-impl` with the right operand boxed.
    Erased {
        wrapper: WrapperId,
        lhs: BoxingDecision,
        rhs: BoxingDecision,
    },
    /// Host equality; a wrapper right operand is boxed first.
    Ordinary { rhs: BoxingDecision },
}

/// How a value of some static type is currently held.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ValueState {
    Erased(WrapperId),
    Boxed(WrapperId),
    Ordinary,
}

// =============================================================================
// BoxingEngine
// =============================================================================

/// Decides conversions over a fully resolved scope.
///
/// Only constructed by [`crate::SealedScope`], after every wrapper of the
/// scope has been resolved and every declaration mangled.
pub struct BoxingEngine<'r, 'a> {
    resolver: &'r RepresentationResolver<'a>,
}

impl<'r, 'a> BoxingEngine<'r, 'a> {
    pub(crate) fn new(resolver: &'r RepresentationResolver<'a>) -> Self {
        Self { resolver }
    }

    pub fn decide(&self, site: &UseSite) -> Result<BoxingDecision, LoweringError> {
        self.check_position(site)?;

        let actual = self.state_of(site.actual)?;
        let decision = if site.is_generic_position {
            match actual {
                ValueState::Erased(w) => BoxingDecision::Box(w),
                ValueState::Boxed(_) | ValueState::Ordinary => BoxingDecision::NoOp,
            }
        } else {
            let formal = self.state_of(site.formal)?;
            self.convert(actual, formal, site)?
        };

        trace!(
            kind = ?site.kind,
            formal = site.formal.0,
            actual = site.actual.0,
            decision = ?decision,
            "boxing decision"
        );
        Ok(decision)
    }

    /// Build the marker for the `index`-th site of a batch.
    pub fn marker(&self, index: usize, site: &UseSite) -> Result<ConversionMarker, LoweringError> {
        let decision = self.decide(site)?;
        let accessor = match (decision.wrapper(), decision.accessor()) {
            (Some(w), Some(accessor)) => Some(format!(
                "{}.{accessor}",
                wrapper_display_name(self.resolver.wrappers(), self.resolver.types(), w)
            )),
            _ => None,
        };
        Ok(ConversionMarker {
            index,
            kind: site.kind,
            span: site.span,
            decision,
            accessor,
        })
    }

    pub fn decide_equality(&self, lhs: TypeId, rhs: TypeId) -> Result<EqualityPlan, LoweringError> {
        let left = self.state_of(lhs)?;
        let right = self.state_of(rhs)?;

        let rhs_boxed = match right {
            ValueState::Erased(w) => BoxingDecision::Box(w),
            ValueState::Boxed(_) | ValueState::Ordinary => BoxingDecision::NoOp,
        };
        let plan = match left {
            ValueState::Erased(w) if right == ValueState::Erased(w) => {
                EqualityPlan::Specialized { wrapper: w }
            }
            ValueState::Erased(w) => EqualityPlan::Erased {
                wrapper: w,
                lhs: BoxingDecision::Unboxed,
                rhs: rhs_boxed,
            },
            ValueState::Boxed(w) => EqualityPlan::Erased {
                wrapper: w,
                lhs: BoxingDecision::Unbox(w),
                rhs: rhs_boxed,
            },
            ValueState::Ordinary => EqualityPlan::Ordinary { rhs: rhs_boxed },
        };
        trace!(lhs = lhs.0, rhs = rhs.0, plan = ?plan, "equality plan");
        Ok(plan)
    }

    /// Reject `===` on wrapper-typed operands; wrapper values have no identity.
    pub fn check_identity_comparison(
        &self,
        lhs: TypeId,
        rhs: TypeId,
        span: Span,
    ) -> Result<(), LoweringError> {
        let types = self.resolver.types();
        for operand in [lhs, rhs] {
            if types.is_wrapper(operand) {
                return Err(LoweringError::IdentityComparisonOnWrapper {
                    wrapper: types.display(operand, self.resolver.wrappers()),
                    span,
                });
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    fn state_of(&self, ty: TypeId) -> Result<ValueState, LoweringError> {
        let Some(w) = self.resolver.types().as_wrapper(ty) else {
            return Ok(ValueState::Ordinary);
        };
        Ok(match self.resolver.resolve_type(ty)? {
            Representation::BoxedSelf(own) if own == w => ValueState::Boxed(w),
            _ => ValueState::Erased(w),
        })
    }

    fn convert(
        &self,
        actual: ValueState,
        formal: ValueState,
        site: &UseSite,
    ) -> Result<BoxingDecision, LoweringError> {
        use ValueState::{Boxed, Erased, Ordinary};

        Ok(match (actual, formal) {
            (Erased(a) | Boxed(a), Erased(f) | Boxed(f)) if a != f => {
                let types = self.resolver.types();
                let wrappers = self.resolver.wrappers();
                return Err(LoweringError::UnrelatedWrapperConversion {
                    actual: types.display(site.actual, wrappers),
                    formal: types.display(site.formal, wrappers),
                    span: site.span,
                });
            }
            (Erased(_), Erased(_)) => BoxingDecision::Unboxed,
            (Erased(w), Boxed(_) | Ordinary) => BoxingDecision::Box(w),
            (Boxed(w), Erased(_)) | (Ordinary, Erased(w)) => BoxingDecision::Unbox(w),
            (Boxed(_), Boxed(_) | Ordinary) | (Ordinary, Boxed(_) | Ordinary) => {
                BoxingDecision::NoOp
            }
        })
    }

    /// Position-level rejections, before any state is computed.
    fn check_position(&self, site: &UseSite) -> Result<(), LoweringError> {
        let types = self.resolver.types();
        let wrappers = self.resolver.wrappers();

        if site.kind == UseSiteKind::VarargElement {
            for ty in [site.formal, site.actual] {
                if types.is_wrapper(ty) {
                    return Err(LoweringError::VarargOfWrapper {
                        wrapper: types.display(ty, wrappers),
                        span: site.span,
                    });
                }
            }
        }

        for ty in [site.formal, site.actual] {
            if let Some((parameter, bound)) = self.generic_array_of_wrapper(ty) {
                return Err(LoweringError::AmbiguousGenericArray {
                    array: types.display(ty, wrappers),
                    parameter,
                    bound: wrapper_display_name(wrappers, types, bound),
                    span: site.span,
                });
            }
        }
        Ok(())
    }

    /// `Array<T>` where `T` is bounded (possibly transitively) by a wrapper.
    fn generic_array_of_wrapper(&self, ty: TypeId) -> Option<(String, WrapperId)> {
        let types = self.resolver.types();
        let TypeShape::Ordinary(OrdinaryType::Array(element)) = types.lookup(ty)?.shape else {
            return None;
        };
        let param = types.as_type_param(element)?;
        let mut bound = param.bound;
        for _ in 0..crate::recursion::RecursionProfile::TypeParameterBounds.max_depth() {
            let current = bound?;
            if let Some(w) = types.as_wrapper(current) {
                return Some((types.resolve_atom(param.name).to_string(), w));
            }
            bound = types.as_type_param(current)?.bound;
        }
        None
    }
}

#[cfg(test)]
#[path = "../tests/boxing_tests.rs"]
mod tests;
