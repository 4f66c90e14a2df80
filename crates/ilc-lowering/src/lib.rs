//! Inline class lowering.
//!
//! Wrapper types ("inline classes") are distinct nominal types at compile time
//! that erase to their carrier's representation at the binary level. This
//! crate decides, deterministically and without runtime cost:
//!
//! - **Representation**: what a wrapper type (possibly nested, possibly
//!   nullable) erases to ([`RepresentationResolver`])
//! - **Boxing**: where a value must be boxed or unboxed at a use site
//!   ([`BoxingEngine`])
//! - **Mangling**: which linkable symbols need collision-resistant names
//!   ([`SymbolMangler`])
//! - **ABI**: the synthetic members every wrapper emits ([`AbiSynthesizer`])
//!
//! All four run inside a [`LinkingScope`]: declarations are collected, the scope
//! is sealed (validation, resolution, mangling, collision check, synthesis),
//! and only the resulting [`SealedScope`] answers boxing questions.

pub mod abi;
pub mod boxing;
pub mod carrier_graph;
pub mod def;
mod diagnostics;
pub mod mangle;
pub mod recursion;
pub mod representation;
pub mod scope;
pub mod types;
pub mod validate;

pub use abi::{
    AbiSynthesizer, AbiType, AbiUnit, Dispatch, SyntheticKind, SyntheticMember, Visibility,
    verify_initialization_paths, verify_unique_members,
};
pub use boxing::{
    BoxingDecision, BoxingEngine, ConversionMarker, EqualityPlan, UseSite, UseSiteKind,
};
pub use carrier_graph::{CarrierCycle, CarrierGraph};
pub use def::{
    DeclKind, Declaration, DeclarationFlags, InterfaceDecl, InterfaceMember, WrapperDecl,
    WrapperId, WrapperMember, WrapperStore,
};
pub use diagnostics::{ErrorKind, LoweringError};
pub use mangle::{MEMBER_MARKER, MangledSymbol, SEPARATOR, SymbolMangler};
pub use representation::{Representation, RepresentationResolver, Resolution, ResolverStats};
pub use scope::{DeclId, LinkingScope, LoweringOptions, SealedScope};
pub use types::{OrdinaryType, PrimitiveKind, TypeData, TypeId, TypeInterner, TypeListId, TypeParamInfo, TypeShape};
pub use validate::{ValidationReport, validate_declarations};

#[cfg(test)]
#[path = "../tests/test_fixtures.rs"]
mod test_fixtures;
