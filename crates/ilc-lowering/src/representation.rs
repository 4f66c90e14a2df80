//! Representation resolution.
//!
//! For a type and a nullability context, computes the erased runtime
//! representation:
//!
//! | Input                          | Representation                |
//! |--------------------------------|-------------------------------|
//! | `Int32`                        | `Primitive(Int32)`            |
//! | `Int32?`                       | `HostReference(host.Int)`     |
//! | `String` / `String?`           | `HostReference(host.String)`  |
//! | `W(C)`                         | representation of `C`         |
//! | `W(Int32)?`                    | `BoxedSelf(W)`                |
//! | `W(String?)?`                  | `BoxedSelf(W)`                |
//! | `W(String)?`                   | `HostReference(host.String)`  |
//!
//! A nullable wrapper needs its own box exactly when the absent-value marker of
//! the inner representation is unavailable: either the inner representation is
//! a primitive (no marker at all) or some inner level already spent the marker
//! on its own absence ([`Resolution::absence_reserved`]). The promotion happens
//! at the outermost nullable level; inner boxes become part of that box's
//! payload and never surface as the result.
//!
//! Resolution is a pure function of `(wrapper, nullable)`. Completed results
//! are memoized in a concurrent map; each top-level call walks the carrier
//! chain with its own [`RecursionGuard`], so a cycle is always reported as
//! [`LoweringError::SelfReferentialCarrier`] and never observed half-computed
//! by another thread.

use crate::def::{WrapperId, WrapperStore};
use crate::diagnostics::LoweringError;
use crate::recursion::{RecursionGuard, RecursionProfile, RecursionResult};
use crate::types::{OrdinaryType, PrimitiveKind, TypeId, TypeInterner, TypeParamInfo, TypeShape};
use crate::validate::wrapper_display_name;
use dashmap::DashMap;
use ilc_common::limits::MAX_RESOLUTION_ITERATIONS;
use rayon::prelude::*;
use rustc_hash::FxBuildHasher;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

// =============================================================================
// Representation
// =============================================================================

/// Erased runtime representation of a type in a nullability context.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "of")]
pub enum Representation {
    Primitive(PrimitiveKind),
    /// A host reference type (non-null id); the absent marker is `null`.
    HostReference(TypeId),
    /// The wrapper keeps its own synthetic reference type.
    BoxedSelf(WrapperId),
}

impl Representation {
    #[inline]
    pub const fn is_primitive(self) -> bool {
        matches!(self, Self::Primitive(_))
    }

    #[inline]
    pub const fn is_boxed_self(self) -> bool {
        matches!(self, Self::BoxedSelf(_))
    }

    /// Host-level type carrying this representation.
    pub const fn host_type(self) -> Option<TypeId> {
        match self {
            Self::Primitive(kind) => Some(TypeId::primitive(kind)),
            Self::HostReference(ty) => Some(ty),
            Self::BoxedSelf(_) => None,
        }
    }
}

/// A representation plus whether its absent-value marker is already in use.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub representation: Representation,
    /// `true` when `null` in this representation already means "absent" at
    /// some level of the chain, so an enclosing nullable wrapper cannot reuse it.
    pub absence_reserved: bool,
}

impl Resolution {
    const fn new(representation: Representation, absence_reserved: bool) -> Self {
        Self {
            representation,
            absence_reserved,
        }
    }
}

/// Cache counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ResolverStats {
    pub hits: u64,
    pub misses: u64,
    pub cached: usize,
}

// =============================================================================
// RepresentationResolver
// =============================================================================

pub struct RepresentationResolver<'a> {
    types: &'a TypeInterner,
    wrappers: &'a WrapperStore,
    cache: DashMap<(WrapperId, bool), Resolution, FxBuildHasher>,
    poisoned: DashMap<WrapperId, LoweringError, FxBuildHasher>,
    max_depth: u32,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<'a> RepresentationResolver<'a> {
    pub fn new(types: &'a TypeInterner, wrappers: &'a WrapperStore) -> Self {
        Self::with_max_depth(types, wrappers, RecursionProfile::CarrierChain.max_depth())
    }

    pub fn with_max_depth(types: &'a TypeInterner, wrappers: &'a WrapperStore, max_depth: u32) -> Self {
        Self {
            types,
            wrappers,
            cache: DashMap::with_hasher(FxBuildHasher),
            poisoned: DashMap::with_hasher(FxBuildHasher),
            max_depth,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn types(&self) -> &'a TypeInterner {
        self.types
    }

    #[inline]
    pub fn wrappers(&self) -> &'a WrapperStore {
        self.wrappers
    }

    /// Refuse to resolve `id`; every resolution reaching it returns `error`.
    pub fn poison(&self, id: WrapperId, error: LoweringError) {
        self.poisoned.insert(id, error);
    }

    pub fn is_poisoned(&self, id: WrapperId) -> bool {
        self.poisoned.contains_key(&id)
    }

    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            cached: self.cache.len(),
        }
    }

    // -------------------------------------------------------------------------
    // Entry points
    // -------------------------------------------------------------------------

    /// Representation of `ty` in nullability context `nullable`.
    ///
    /// `nullable` overrides whatever nullability is recorded on `ty`.
    pub fn resolve(&self, ty: TypeId, nullable: bool) -> Result<Representation, LoweringError> {
        self.resolve_detailed(ty, nullable)
            .map(|resolution| resolution.representation)
    }

    /// Representation of `ty` using its own nullability.
    pub fn resolve_type(&self, ty: TypeId) -> Result<Representation, LoweringError> {
        let nullable = self.types.is_nullable(ty);
        self.resolve(ty, nullable)
    }

    pub fn resolve_detailed(&self, ty: TypeId, nullable: bool) -> Result<Resolution, LoweringError> {
        let mut guard = self.new_guard();
        let result = self.resolve_in(ty, nullable, &mut guard);
        debug_assert_eq!(guard.depth(), 0);
        result
    }

    /// Representation of wrapper `id` used with nullability `nullable`.
    pub fn resolve_wrapper(&self, id: WrapperId, nullable: bool) -> Result<Resolution, LoweringError> {
        let mut guard = self.new_guard();
        self.resolve_wrapper_in(id, nullable, &mut guard)
    }

    /// Resolve every wrapper of the store at both nullabilities.
    ///
    /// Results are in wrapper order regardless of `parallel`.
    pub fn resolve_all(
        &self,
        parallel: bool,
    ) -> Vec<(WrapperId, Result<Resolution, LoweringError>, Result<Resolution, LoweringError>)> {
        let ids: Vec<WrapperId> = self.wrappers.ids().collect();
        let resolve_one = |id: &WrapperId| {
            (
                *id,
                self.resolve_wrapper(*id, false),
                self.resolve_wrapper(*id, true),
            )
        };
        if parallel {
            ids.par_iter().map(resolve_one).collect()
        } else {
            ids.iter().map(resolve_one).collect()
        }
    }

    // -------------------------------------------------------------------------
    // Resolution
    // -------------------------------------------------------------------------

    fn new_guard(&self) -> RecursionGuard<WrapperId> {
        RecursionGuard::with_profile(RecursionProfile::Custom {
            max_depth: self.max_depth,
            max_iterations: MAX_RESOLUTION_ITERATIONS,
        })
    }

    fn resolve_in(
        &self,
        ty: TypeId,
        nullable: bool,
        guard: &mut RecursionGuard<WrapperId>,
    ) -> Result<Resolution, LoweringError> {
        let data = self
            .types
            .lookup(ty)
            .ok_or(LoweringError::UnknownType { id: ty.0 })?;
        match data.shape {
            TypeShape::Wrapper(id) => self.resolve_wrapper_in(id, nullable, guard),
            TypeShape::Ordinary(ordinary) => Ok(self.resolve_ordinary(ty, ordinary, nullable)),
        }
    }

    fn resolve_ordinary(&self, ty: TypeId, ordinary: OrdinaryType, nullable: bool) -> Resolution {
        match ordinary {
            OrdinaryType::Primitive(kind) if !nullable => {
                Resolution::new(Representation::Primitive(kind), false)
            }
            OrdinaryType::Primitive(kind) => {
                Resolution::new(Representation::HostReference(TypeId::boxed(kind)), true)
            }
            OrdinaryType::TypeParameter(info) => {
                Resolution::new(self.erase_type_parameter(info), nullable)
            }
            OrdinaryType::BoxedPrimitive(_)
            | OrdinaryType::Reference(_)
            | OrdinaryType::Interface(_)
            | OrdinaryType::Array(_)
            | OrdinaryType::Application { .. } => Resolution::new(
                Representation::HostReference(self.types.non_null(ty)),
                nullable,
            ),
        }
    }

    /// A type parameter erases to its bound, following parameter-to-parameter
    /// bounds; a wrapper bound keeps the wrapper boxed.
    fn erase_type_parameter(&self, info: TypeParamInfo) -> Representation {
        let mut bound = info.bound;
        let mut steps = RecursionProfile::TypeParameterBounds.max_depth();
        while let Some(current) = bound {
            if steps == 0 {
                break;
            }
            steps -= 1;
            let Some(data) = self.types.lookup(current) else {
                break;
            };
            match data.shape {
                TypeShape::Wrapper(id) => return Representation::BoxedSelf(id),
                TypeShape::Ordinary(OrdinaryType::TypeParameter(next)) => bound = next.bound,
                TypeShape::Ordinary(OrdinaryType::Primitive(kind)) => {
                    return Representation::HostReference(TypeId::boxed(kind));
                }
                TypeShape::Ordinary(_) => {
                    return Representation::HostReference(self.types.non_null(current));
                }
            }
        }
        Representation::HostReference(TypeId::ANY)
    }

    fn resolve_wrapper_in(
        &self,
        id: WrapperId,
        nullable: bool,
        guard: &mut RecursionGuard<WrapperId>,
    ) -> Result<Resolution, LoweringError> {
        if let Some(error) = self.poisoned.get(&id) {
            return Err(error.clone());
        }
        if let Some(hit) = self.cache.get(&(id, nullable)) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(*hit);
        }

        match guard.enter(id) {
            RecursionResult::Entered => {}
            RecursionResult::Cycle => return Err(self.cycle_error(id, guard)),
            RecursionResult::DepthExceeded | RecursionResult::IterationExceeded => {
                let outermost = guard.path().first().copied().unwrap_or(id);
                return Err(LoweringError::CarrierChainTooDeep {
                    wrapper: wrapper_display_name(self.wrappers, self.types, outermost),
                    limit: self.max_depth,
                    span: self
                        .wrappers
                        .get(outermost)
                        .map(|d| d.span)
                        .unwrap_or_default(),
                });
            }
        }
        let result = self.compute_wrapper(id, nullable, guard);
        guard.leave(id);

        let resolution = result?;
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.cache.insert((id, nullable), resolution);
        trace!(
            wrapper = id.0,
            nullable,
            representation = ?resolution.representation,
            absence_reserved = resolution.absence_reserved,
            "wrapper resolved"
        );
        Ok(resolution)
    }

    fn compute_wrapper(
        &self,
        id: WrapperId,
        nullable: bool,
        guard: &mut RecursionGuard<WrapperId>,
    ) -> Result<Resolution, LoweringError> {
        let decl = self
            .wrappers
            .get(id)
            .ok_or(LoweringError::UnknownWrapper { id: id.0 })?;
        let carrier_nullable = self.types.is_nullable(decl.carrier);
        let inner = self.resolve_in(decl.carrier, carrier_nullable, guard)?;

        if !nullable {
            return Ok(inner);
        }
        let needs_box = inner.representation.is_primitive()
            || inner.representation.is_boxed_self()
            || inner.absence_reserved;
        if needs_box {
            Ok(Resolution::new(Representation::BoxedSelf(id), true))
        } else {
            Ok(Resolution::new(inner.representation, true))
        }
    }

    fn cycle_error(&self, id: WrapperId, guard: &RecursionGuard<WrapperId>) -> LoweringError {
        let trace = guard.cycle_through(id);
        LoweringError::SelfReferentialCarrier {
            wrapper: wrapper_display_name(self.wrappers, self.types, id),
            trace: trace
                .iter()
                .map(|&w| wrapper_display_name(self.wrappers, self.types, w))
                .collect(),
            span: self.wrappers.get(id).map(|d| d.span).unwrap_or_default(),
        }
    }

    // -------------------------------------------------------------------------
    // Descriptors
    // -------------------------------------------------------------------------

    /// Binary descriptor of a representation (`I`, `Lhost/String;`, `[I`).
    pub fn descriptor(&self, repr: Representation) -> Result<String, LoweringError> {
        match repr {
            Representation::Primitive(kind) => Ok(kind.descriptor().to_string()),
            Representation::BoxedSelf(id) => Ok(class_descriptor(&wrapper_display_name(
                self.wrappers,
                self.types,
                id,
            ))),
            Representation::HostReference(ty) => self.host_descriptor(ty),
        }
    }

    /// Descriptor of the erasure of `ty` with its own nullability.
    pub fn type_descriptor(&self, ty: TypeId) -> Result<String, LoweringError> {
        let repr = self.resolve_type(ty)?;
        self.descriptor(repr)
    }

    fn host_descriptor(&self, ty: TypeId) -> Result<String, LoweringError> {
        let data = self
            .types
            .lookup(ty)
            .ok_or(LoweringError::UnknownType { id: ty.0 })?;
        let ordinary = match data.shape {
            TypeShape::Ordinary(ordinary) => ordinary,
            TypeShape::Wrapper(id) => return self.descriptor(Representation::BoxedSelf(id)),
        };
        Ok(match ordinary {
            OrdinaryType::Primitive(kind) => kind.descriptor().to_string(),
            OrdinaryType::BoxedPrimitive(kind) => class_descriptor(kind.boxed_class_name()),
            OrdinaryType::Reference(name)
            | OrdinaryType::Interface(name)
            | OrdinaryType::Application { base: name, .. } => {
                class_descriptor(&self.types.resolve_atom(name))
            }
            OrdinaryType::TypeParameter(info) => {
                return self.descriptor(self.erase_type_parameter(info));
            }
            OrdinaryType::Array(element) => format!("[{}", self.type_descriptor(element)?),
        })
    }
}

/// `a.b.C` -> `La/b/C;`
pub(crate) fn class_descriptor(qualified_name: &str) -> String {
    format!("L{};", qualified_name.replace('.', "/"))
}

#[cfg(test)]
#[path = "../tests/representation_tests.rs"]
mod tests;
