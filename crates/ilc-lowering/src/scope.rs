//! Per-linking-scope lowering context.
//!
//! A [`LinkingScope`] collects every declaration visible in one linking unit.
//! [`LinkingScope::seal`] runs the whole declaration-side pipeline:
//!
//! 1. declaration validation (rejected wrappers are poisoned),
//! 2. representation resolution of every wrapper,
//! 3. mangling of every declaration with scope-wide collision checks,
//! 4. ABI synthesis, initialization-path and member uniqueness verification.
//!
//! Boxing decisions are only available on the resulting [`SealedScope`], so no
//! use site can be decided before the scope's erased signatures are complete.
//! Nothing here outlives the scope; there is no process-wide symbol table.

use crate::abi::{AbiSynthesizer, AbiUnit, verify_initialization_paths, verify_unique_members};
use crate::boxing::{BoxingDecision, BoxingEngine, ConversionMarker, EqualityPlan, UseSite};
use crate::def::{Declaration, WrapperId, WrapperStore};
use crate::diagnostics::LoweringError;
use crate::mangle::{MangledSymbol, SymbolMangler};
use crate::representation::{Representation, RepresentationResolver, ResolverStats};
use crate::types::{TypeId, TypeInterner};
use crate::validate::validate_declarations;
use ilc_common::limits::{
    DEFAULT_MANGLE_HASH_LENGTH, MAX_CARRIER_CHAIN_DEPTH, MAX_MANGLE_HASH_LENGTH,
    MIN_MANGLE_HASH_LENGTH, SYMBOL_TABLE_INITIAL_CAPACITY,
};
use ilc_common::{Diagnostic, Span};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::{debug, info_span};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoweringOptions {
    /// Characters of the signature digest kept in mangled names.
    pub hash_length: usize,
    pub max_carrier_depth: u32,
    /// Resolve and synthesize wrappers on the rayon pool.
    pub parallel: bool,
}

impl Default for LoweringOptions {
    fn default() -> Self {
        Self {
            hash_length: DEFAULT_MANGLE_HASH_LENGTH,
            max_carrier_depth: MAX_CARRIER_CHAIN_DEPTH,
            parallel: true,
        }
    }
}

impl LoweringOptions {
    /// Clamp every option into its supported range.
    pub fn normalized(self) -> Self {
        Self {
            hash_length: self
                .hash_length
                .clamp(MIN_MANGLE_HASH_LENGTH, MAX_MANGLE_HASH_LENGTH),
            max_carrier_depth: self.max_carrier_depth.clamp(1, MAX_CARRIER_CHAIN_DEPTH),
            parallel: self.parallel,
        }
    }
}

/// Index of a declaration added to a scope.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DeclId(pub u32);

// =============================================================================
// LinkingScope
// =============================================================================

pub struct LinkingScope<'a> {
    types: &'a TypeInterner,
    wrappers: &'a WrapperStore,
    options: LoweringOptions,
    declarations: Vec<Declaration>,
}

impl<'a> LinkingScope<'a> {
    pub fn new(types: &'a TypeInterner, wrappers: &'a WrapperStore, options: LoweringOptions) -> Self {
        Self {
            types,
            wrappers,
            options: options.normalized(),
            declarations: Vec::with_capacity(SYMBOL_TABLE_INITIAL_CAPACITY),
        }
    }

    pub fn options(&self) -> LoweringOptions {
        self.options
    }

    pub fn add_declaration(&mut self, decl: Declaration) -> DeclId {
        let id = DeclId(self.declarations.len() as u32);
        self.declarations.push(decl);
        id
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    /// Run declaration-side lowering for the whole scope.
    ///
    /// Errors do not abort sealing: every wrapper and declaration that can be
    /// lowered is, and the errors are collected on the sealed scope.
    pub fn seal(self) -> SealedScope<'a> {
        let _span = info_span!("seal", declarations = self.declarations.len()).entered();
        let Self {
            types,
            wrappers,
            options,
            mut declarations,
        } = self;

        let report = validate_declarations(wrappers, types);
        let resolver = RepresentationResolver::with_max_depth(types, wrappers, options.max_carrier_depth);
        for (id, error) in &report.poisoned {
            resolver.poison(*id, error.clone());
        }
        let mut errors = report.errors;

        let mut resolved = Vec::new();
        for (id, plain, nullable) in resolver.resolve_all(options.parallel) {
            if resolver.is_poisoned(id) {
                continue;
            }
            match (plain, nullable) {
                (Ok(_), Ok(_)) => resolved.push(id),
                (Err(error), _) | (_, Err(error)) => errors.push(error),
            }
        }

        // Wrapper members share the scope's symbol table.
        let user_declarations = declarations.len();
        for &id in &resolved {
            let Some(decl) = wrappers.get(id) else { continue };
            let owner_type = types.wrapper(id);
            declarations.extend(
                decl.members
                    .iter()
                    .map(|member| member.to_declaration(id, decl.name, owner_type)),
            );
        }

        let mangler = SymbolMangler::with_hash_length(&resolver, options.hash_length);
        let (symbols, mangle_errors) = mangler.mangle_scope(&declarations);
        errors.extend(mangle_errors);

        let synthesizer = AbiSynthesizer::new(&resolver, &mangler);
        let synthesize = |id: &WrapperId| {
            synthesizer
                .synthesize(*id)
                .and_then(|unit| verify_initialization_paths(&unit).map(|()| unit))
                .and_then(|unit| verify_unique_members(&unit, &resolver).map(|()| unit))
        };
        let results: Vec<Result<AbiUnit, LoweringError>> = if options.parallel {
            resolved.par_iter().map(synthesize).collect()
        } else {
            resolved.iter().map(synthesize).collect()
        };
        let mut units = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(unit) => units.push(unit),
                Err(error) => errors.push(error),
            }
        }

        // A poisoned carrier can surface again through every dependent wrapper.
        let mut seen = FxHashSet::default();
        let mut unique = errors;
        unique.retain(|error| seen.insert(error.clone()));

        let stats = resolver.stats();
        debug!(
            wrappers = wrappers.len(),
            units = units.len(),
            declarations = declarations.len(),
            errors = unique.len(),
            cache_hits = stats.hits,
            cache_misses = stats.misses,
            "scope sealed"
        );

        SealedScope {
            resolver,
            options,
            declarations,
            user_declarations,
            symbols,
            units,
            errors: unique,
        }
    }
}

// =============================================================================
// SealedScope
// =============================================================================

/// A scope whose wrappers are resolved, declarations mangled and ABI units
/// synthesized. Boxing decisions run here.
pub struct SealedScope<'a> {
    resolver: RepresentationResolver<'a>,
    options: LoweringOptions,
    /// User declarations first, then wrapper members.
    declarations: Vec<Declaration>,
    user_declarations: usize,
    symbols: Vec<Option<MangledSymbol>>,
    units: Vec<AbiUnit>,
    errors: Vec<LoweringError>,
}

impl<'a> SealedScope<'a> {
    pub fn options(&self) -> LoweringOptions {
        self.options
    }

    pub fn types(&self) -> &'a TypeInterner {
        self.resolver.types()
    }

    pub fn wrappers(&self) -> &'a WrapperStore {
        self.resolver.wrappers()
    }

    pub fn resolver(&self) -> &RepresentationResolver<'a> {
        &self.resolver
    }

    pub fn stats(&self) -> ResolverStats {
        self.resolver.stats()
    }

    /// Declaration-side errors, in discovery order.
    pub fn errors(&self) -> &[LoweringError] {
        &self.errors
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn diagnostics(&self, files: &[String]) -> Vec<Diagnostic> {
        self.errors.iter().map(|e| e.to_diagnostic(files)).collect()
    }

    pub fn resolve(&self, ty: TypeId, nullable: bool) -> Result<Representation, LoweringError> {
        self.resolver.resolve(ty, nullable)
    }

    // -------------------------------------------------------------------------
    // Symbols
    // -------------------------------------------------------------------------

    pub fn declaration(&self, id: DeclId) -> Option<&Declaration> {
        self.declarations[..self.user_declarations].get(id.0 as usize)
    }

    /// Final symbol of a user declaration; `None` if it could not be mangled.
    pub fn symbol_of(&self, id: DeclId) -> Option<&MangledSymbol> {
        if id.0 as usize >= self.user_declarations {
            return None;
        }
        self.symbols.get(id.0 as usize)?.as_ref()
    }

    /// Every declaration of the scope (wrapper members included) with its symbol.
    pub fn symbol_table(&self) -> impl Iterator<Item = (&Declaration, Option<&MangledSymbol>)> {
        self.declarations
            .iter()
            .zip(self.symbols.iter().map(Option::as_ref))
    }

    // -------------------------------------------------------------------------
    // ABI
    // -------------------------------------------------------------------------

    /// Units of every successfully lowered wrapper, in wrapper order.
    pub fn abi_units(&self) -> &[AbiUnit] {
        &self.units
    }

    pub fn abi_unit(&self, wrapper: WrapperId) -> Option<&AbiUnit> {
        self.units.iter().find(|unit| unit.wrapper == wrapper)
    }

    // -------------------------------------------------------------------------
    // Use sites
    // -------------------------------------------------------------------------

    fn engine(&self) -> BoxingEngine<'_, 'a> {
        BoxingEngine::new(&self.resolver)
    }

    pub fn decide(&self, site: &UseSite) -> Result<BoxingDecision, LoweringError> {
        self.engine().decide(site)
    }

    pub fn decide_equality(&self, lhs: TypeId, rhs: TypeId) -> Result<EqualityPlan, LoweringError> {
        self.engine().decide_equality(lhs, rhs)
    }

    pub fn check_identity_comparison(
        &self,
        lhs: TypeId,
        rhs: TypeId,
        span: Span,
    ) -> Result<(), LoweringError> {
        self.engine().check_identity_comparison(lhs, rhs, span)
    }

    /// Decide every site of a unit.
    ///
    /// Any use-site error halts the unit: all errors are returned and no
    /// markers are produced.
    pub fn lower_use_sites(&self, sites: &[UseSite]) -> Result<Vec<ConversionMarker>, Vec<LoweringError>> {
        let engine = self.engine();
        let mut markers = Vec::with_capacity(sites.len());
        let mut errors = Vec::new();
        for (index, site) in sites.iter().enumerate() {
            match engine.marker(index, site) {
                Ok(marker) => markers.push(marker),
                Err(error) => errors.push(error),
            }
        }
        debug!(
            sites = sites.len(),
            conversions = markers.iter().filter(|m| m.decision.is_conversion()).count(),
            errors = errors.len(),
            "use sites lowered"
        );
        if errors.is_empty() {
            Ok(markers)
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
#[path = "../tests/scope_tests.rs"]
mod tests;
