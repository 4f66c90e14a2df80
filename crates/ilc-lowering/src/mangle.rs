//! Symbol mangling.
//!
//! A declaration with a wrapper-typed top-level position (receiver,
//! parameter, return) is renamed to `base-suffix`. The `-` separator is not a
//! valid identifier character for host consumers, so a mangled symbol can only
//! be reached through this compiler's own call resolution.
//!
//! The suffix is a prefix of the base64url SHA-256 of the declaring scope and
//! the *source* signature. Wrapper positions contribute their fully-qualified
//! name (and `?` when nullable), ordinary positions their erased descriptor.
//! Two declarations with the same erased signature but different source
//! identity therefore hash differently, and the same declaration always hashes
//! the same way across recompilations.
//!
//! Members declared inside a wrapper are always renamed. Without a
//! wrapper-typed parameter they get the fixed [`MEMBER_MARKER`] instead of a
//! hash.

use crate::def::{DeclKind, Declaration};
use crate::diagnostics::LoweringError;
use crate::representation::RepresentationResolver;
use crate::types::TypeId;
use base64::prelude::*;
use ilc_common::limits::{DEFAULT_MANGLE_HASH_LENGTH, MAX_MANGLE_HASH_LENGTH, MIN_MANGLE_HASH_LENGTH};
use ilc_common::Atom;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::{debug, trace};

pub const SEPARATOR: char = '-';

/// Suffix of wrapper members that need no hash.
pub const MEMBER_MARKER: &str = "impl";

/// Base name of a wrapper's public factory.
pub const CONSTRUCTOR_BASE: &str = "constructor";

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MangledSymbol {
    pub base_name: String,
    pub hash_suffix: Option<String>,
}

impl MangledSymbol {
    pub fn plain(base_name: impl Into<String>) -> Self {
        Self {
            base_name: base_name.into(),
            hash_suffix: None,
        }
    }

    pub fn with_suffix(base_name: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            base_name: base_name.into(),
            hash_suffix: Some(suffix.into()),
        }
    }

    pub fn is_mangled(&self) -> bool {
        self.hash_suffix.is_some()
    }
}

impl fmt::Display for MangledSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.hash_suffix {
            Some(suffix) => write!(f, "{}{SEPARATOR}{suffix}", self.base_name),
            None => f.write_str(&self.base_name),
        }
    }
}

// =============================================================================
// SymbolMangler
// =============================================================================

pub struct SymbolMangler<'r, 'a> {
    resolver: &'r RepresentationResolver<'a>,
    hash_length: usize,
}

impl<'r, 'a> SymbolMangler<'r, 'a> {
    pub fn new(resolver: &'r RepresentationResolver<'a>) -> Self {
        Self::with_hash_length(resolver, DEFAULT_MANGLE_HASH_LENGTH)
    }

    pub fn with_hash_length(resolver: &'r RepresentationResolver<'a>, hash_length: usize) -> Self {
        Self {
            resolver,
            hash_length: hash_length.clamp(MIN_MANGLE_HASH_LENGTH, MAX_MANGLE_HASH_LENGTH),
        }
    }

    pub fn hash_length(&self) -> usize {
        self.hash_length
    }

    /// Does some top-level position of `decl` mention a wrapper type?
    pub fn has_wrapper_position(&self, decl: &Declaration) -> bool {
        let types = self.resolver.types();
        decl.top_level_positions().any(|ty| types.is_wrapper(ty))
    }

    /// Does `decl` get a suffix at all, before scope-level collision checks?
    pub fn needs_mangling(&self, decl: &Declaration) -> bool {
        decl.owner.is_some() || self.has_wrapper_position(decl)
    }

    /// `(erased receiver and params)erased return`, e.g. `(ILhost/String;)V`.
    pub fn erased_signature(&self, decl: &Declaration) -> Result<String, LoweringError> {
        let mut out = String::from("(");
        for ty in decl.receiver.iter().chain(decl.params.iter()) {
            out.push_str(&self.resolver.type_descriptor(*ty)?);
        }
        out.push(')');
        out.push_str(&self.resolver.type_descriptor(decl.ret)?);
        Ok(out)
    }

    /// Hash input identifying the declaration by source-level types.
    pub fn source_signature(&self, decl: &Declaration) -> Result<String, LoweringError> {
        let mut out = String::new();
        if let Some(receiver) = decl.receiver {
            out.push('R');
            out.push_str(&self.position_descriptor(receiver)?);
        }
        out.push('(');
        for ty in &decl.params {
            out.push_str(&self.position_descriptor(*ty)?);
        }
        out.push(')');
        out.push_str(&self.position_descriptor(decl.ret)?);
        Ok(out)
    }

    fn position_descriptor(&self, ty: TypeId) -> Result<String, LoweringError> {
        let types = self.resolver.types();
        match types.as_wrapper(ty) {
            Some(w) => {
                let name = crate::validate::wrapper_display_name(self.resolver.wrappers(), types, w);
                let mut out = crate::representation::class_descriptor(&name);
                if types.is_nullable(ty) {
                    out.push('?');
                }
                Ok(out)
            }
            None => self.resolver.type_descriptor(ty),
        }
    }

    /// First `hash_length` base64url characters of SHA-256(`scope|signature`).
    pub fn hash_suffix(&self, scope: &str, source_signature: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(scope.as_bytes());
        hasher.update(b"|");
        hasher.update(source_signature.as_bytes());
        let digest = hasher.finalize();
        let mut encoded = BASE64_URL_SAFE_NO_PAD.encode(digest);
        encoded.truncate(self.hash_length);
        encoded
    }

    /// Symbol of a single declaration.
    pub fn mangle(&self, decl: &Declaration) -> Result<MangledSymbol, LoweringError> {
        let base = self.base_name(decl);

        let symbol = if decl.owner.is_some() && decl.kind == DeclKind::Constructor {
            MangledSymbol::with_suffix(CONSTRUCTOR_BASE, MEMBER_MARKER)
        } else if decl.owner.is_some() {
            let types = self.resolver.types();
            if decl.params.iter().any(|ty| types.is_wrapper(*ty)) {
                MangledSymbol::with_suffix(base, self.hash_of(decl)?)
            } else {
                MangledSymbol::with_suffix(base, MEMBER_MARKER)
            }
        } else if self.has_wrapper_position(decl) {
            MangledSymbol::with_suffix(base, self.hash_of(decl)?)
        } else {
            MangledSymbol::plain(base)
        };

        trace!(
            name = %self.resolver.types().resolve_atom(decl.name),
            symbol = %symbol,
            "mangled"
        );
        Ok(symbol)
    }

    /// Symbol with a hash suffix regardless of the declaration's positions.
    pub fn mangle_forced(&self, decl: &Declaration) -> Result<MangledSymbol, LoweringError> {
        Ok(MangledSymbol::with_suffix(self.base_name(decl), self.hash_of(decl)?))
    }

    /// Mangle every declaration of one linking scope.
    ///
    /// A plain declaration whose erased signature equals that of a
    /// wrapper-bearing declaration of the same name and scope is hashed too,
    /// so neither can be mistaken for the other by the host linker. Any two
    /// declarations that still end with the same symbol and erased signature
    /// are reported as [`LoweringError::ManglingCollision`].
    pub fn mangle_scope(&self, decls: &[Declaration]) -> (Vec<Option<MangledSymbol>>, Vec<LoweringError>) {
        let mut errors = Vec::new();
        let mut erased: Vec<Option<String>> = Vec::with_capacity(decls.len());
        for decl in decls {
            match self.erased_signature(decl) {
                Ok(sig) => erased.push(Some(sig)),
                Err(error) => {
                    erased.push(None);
                    errors.push(error);
                }
            }
        }

        // (scope, base, erased) groups that contain a wrapper-bearing member.
        let mut shadowed: FxHashSet<(Atom, String, &str)> = FxHashSet::default();
        for (decl, sig) in decls.iter().zip(&erased) {
            let Some(sig) = sig else { continue };
            if decl.owner.is_none() && self.has_wrapper_position(decl) {
                shadowed.insert((decl.scope, self.base_name(decl), sig.as_str()));
            }
        }

        let mut symbols = Vec::with_capacity(decls.len());
        for (decl, sig) in decls.iter().zip(&erased) {
            let Some(sig) = sig else {
                symbols.push(None);
                continue;
            };
            let forced = decl.owner.is_none()
                && !self.has_wrapper_position(decl)
                && shadowed.contains(&(decl.scope, self.base_name(decl), sig.as_str()));
            let result = if forced {
                debug!(
                    name = %self.resolver.types().resolve_atom(decl.name),
                    "erasure shared with a wrapper overload; forcing hash"
                );
                self.mangle_forced(decl)
            } else {
                self.mangle(decl)
            };
            match result {
                Ok(symbol) => symbols.push(Some(symbol)),
                Err(error) => {
                    symbols.push(None);
                    errors.push(error);
                }
            }
        }

        errors.extend(self.find_collisions(decls, &symbols, &erased));
        (symbols, errors)
    }

    fn find_collisions(
        &self,
        decls: &[Declaration],
        symbols: &[Option<MangledSymbol>],
        erased: &[Option<String>],
    ) -> Vec<LoweringError> {
        let types = self.resolver.types();
        let wrappers = self.resolver.wrappers();
        let describe = |decl: &Declaration| {
            let params: Vec<String> = decl.params.iter().map(|ty| types.display(*ty, wrappers)).collect();
            format!(
                "{}.{}({})",
                types.resolve_atom(decl.scope),
                types.resolve_atom(decl.name),
                params.join(", ")
            )
        };

        let mut seen: FxHashMap<(Atom, String, &str), usize> = FxHashMap::default();
        let mut errors = Vec::new();
        for (index, (symbol, sig)) in symbols.iter().zip(erased).enumerate() {
            let (Some(symbol), Some(sig)) = (symbol, sig) else {
                continue;
            };
            let key = (decls[index].scope, symbol.to_string(), sig.as_str());
            if let Some(&first) = seen.get(&key) {
                errors.push(LoweringError::ManglingCollision {
                    symbol: symbol.to_string(),
                    first: describe(&decls[first]),
                    second: describe(&decls[index]),
                    span: decls[index].span,
                });
            } else {
                seen.insert(key, index);
            }
        }
        errors
    }

    fn hash_of(&self, decl: &Declaration) -> Result<String, LoweringError> {
        let scope = self.resolver.types().resolve_atom(decl.scope);
        let signature = self.source_signature(decl)?;
        Ok(self.hash_suffix(&scope, &signature))
    }

    fn base_name(&self, decl: &Declaration) -> String {
        let name = self.resolver.types().resolve_atom(decl.name);
        match decl.kind {
            DeclKind::Function => name.to_string(),
            DeclKind::Getter => accessor_name("get", &name),
            DeclKind::Setter => accessor_name("set", &name),
            DeclKind::Constructor if decl.owner.is_some() => CONSTRUCTOR_BASE.to_string(),
            DeclKind::Constructor => "<init>".to_string(),
        }
    }
}

/// `get` + `value` -> `getValue`.
fn accessor_name(prefix: &str, property: &str) -> String {
    let mut chars = property.chars();
    match chars.next() {
        Some(first) => format!("{prefix}{}{}", first.to_uppercase(), chars.as_str()),
        None => prefix.to_string(),
    }
}

#[cfg(test)]
#[path = "../tests/mangle_tests.rs"]
mod tests;
