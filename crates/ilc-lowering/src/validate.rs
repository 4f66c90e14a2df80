//! Declaration validation.
//!
//! Lowering refuses to resolve a wrapper whose declaration is malformed. The
//! checks here run before any representation is computed; every wrapper they
//! reject is *poisoned* and the resolver hands back the recorded error instead
//! of walking its carrier.

use crate::carrier_graph::CarrierGraph;
use crate::def::{DeclarationFlags, WrapperId, WrapperStore};
use crate::diagnostics::LoweringError;
use crate::types::TypeInterner;
use rustc_hash::FxHashMap;
use tracing::debug;

#[derive(Default, Debug)]
pub struct ValidationReport {
    /// Every declaration error, in wrapper order (cycles first).
    pub errors: Vec<LoweringError>,
    /// First error recorded for each rejected wrapper.
    pub poisoned: FxHashMap<WrapperId, LoweringError>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn is_poisoned(&self, id: WrapperId) -> bool {
        self.poisoned.contains_key(&id)
    }

    fn reject(&mut self, id: WrapperId, error: LoweringError) {
        self.poisoned.entry(id).or_insert_with(|| error.clone());
        self.errors.push(error);
    }
}

pub(crate) fn wrapper_display_name(
    store: &WrapperStore,
    types: &TypeInterner,
    id: WrapperId,
) -> String {
    store
        .name_of(id)
        .map(|atom| types.resolve_atom(atom).to_string())
        .unwrap_or_else(|| format!("<wrapper {}>", id.0))
}

/// Validate every wrapper declaration of `store`.
pub fn validate_declarations(store: &WrapperStore, types: &TypeInterner) -> ValidationReport {
    let mut report = ValidationReport::default();

    for id in store.ids() {
        if store.get(id).is_none() {
            report.reject(id, LoweringError::UnknownWrapper { id: id.0 });
        }
    }

    let graph = CarrierGraph::build(store, types);
    for cycle in graph.find_cycles() {
        let head = cycle.trace[0];
        let error = LoweringError::SelfReferentialCarrier {
            wrapper: wrapper_display_name(store, types, head),
            trace: cycle
                .trace
                .iter()
                .map(|&w| wrapper_display_name(store, types, w))
                .collect(),
            span: store.get(head).map(|d| d.span).unwrap_or_default(),
        };
        for &member in &cycle.members {
            report.poisoned.entry(member).or_insert_with(|| error.clone());
        }
        report.errors.push(error);
    }

    for (id, decl) in store.iter() {
        let wrapper = wrapper_display_name(store, types, id);
        let span = decl.span;

        if !decl.flags.contains(DeclarationFlags::FINAL) {
            report.reject(
                id,
                LoweringError::NonFinalWrapper {
                    wrapper: wrapper.clone(),
                    span,
                },
            );
        }
        if !decl.flags.contains(DeclarationFlags::TOP_LEVEL) {
            report.reject(
                id,
                LoweringError::NestedWrapper {
                    wrapper: wrapper.clone(),
                    span,
                },
            );
        }
        if decl.flags.contains(DeclarationFlags::HAS_VALIDATION)
            && !decl.flags.contains(DeclarationFlags::PUBLIC_CONSTRUCTOR)
        {
            report.reject(
                id,
                LoweringError::ValidationWithoutPublicConstructor {
                    wrapper: wrapper.clone(),
                    span,
                },
            );
        }
        if let Some(param) = types.as_type_param(decl.carrier) {
            if param.bound.is_none() {
                report.reject(
                    id,
                    LoweringError::UnconstrainedGenericCarrier {
                        wrapper,
                        parameter: types.resolve_atom(param.name).to_string(),
                        span,
                    },
                );
            }
        }
    }

    debug!(
        wrappers = store.len(),
        errors = report.errors.len(),
        poisoned = report.poisoned.len(),
        "declarations validated"
    );
    report
}

#[cfg(test)]
#[path = "../tests/validate_tests.rs"]
mod tests;
