//! Interned types.
//!
//! Every resolved type the front end hands to lowering is interned into a
//! [`TypeInterner`] and referred to by a [`TypeId`]. Type equality is id
//! equality.
//!
//! The shape of a type is the closed variant [`TypeShape`]: either a wrapper
//! type or an ordinary type. Nullability is carried alongside the shape so that
//! `Name` and `Name?` share a shape and differ only in the flag.

use crate::def::{WrapperId, WrapperStore};
use dashmap::DashMap;
use ilc_common::interner::{Atom, ShardedInterner};
use rustc_hash::FxBuildHasher;
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};

// =============================================================================
// TypeId
// =============================================================================

/// Interned type handle.
///
/// The first ids are reserved: every primitive, every boxed primitive, the
/// host root reference type and the host string type are interned at these
/// indices by [`TypeInterner::new`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TypeId(pub u32);

impl TypeId {
    pub const VOID: TypeId = TypeId(0);
    pub const BOOL: TypeId = TypeId(1);
    pub const INT8: TypeId = TypeId(2);
    pub const INT16: TypeId = TypeId(3);
    pub const CHAR16: TypeId = TypeId(4);
    pub const INT32: TypeId = TypeId(5);
    pub const INT64: TypeId = TypeId(6);
    pub const FLOAT32: TypeId = TypeId(7);
    pub const FLOAT64: TypeId = TypeId(8);

    /// First boxed primitive; boxed forms follow in [`PrimitiveKind::ALL`] order.
    const FIRST_BOXED: u32 = 9;

    /// Host root reference type (`host.Any`).
    pub const ANY: TypeId = TypeId(18);
    /// Host string type (`host.String`).
    pub const STRING: TypeId = TypeId(19);

    /// First non-reserved id.
    pub const FIRST_DYNAMIC: u32 = 20;

    /// The reserved id of a primitive.
    #[inline]
    pub const fn primitive(kind: PrimitiveKind) -> TypeId {
        TypeId(kind as u32)
    }

    /// The reserved id of a primitive's boxed host reference form.
    #[inline]
    pub const fn boxed(kind: PrimitiveKind) -> TypeId {
        TypeId(Self::FIRST_BOXED + kind as u32)
    }
}

/// Interned list of type ids (generic arguments).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct TypeListId(pub u32);

// =============================================================================
// PrimitiveKind
// =============================================================================

/// Host primitive kinds.
///
/// `Void` only appears in return position.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum PrimitiveKind {
    Void = 0,
    Bool = 1,
    Int8 = 2,
    Int16 = 3,
    Char16 = 4,
    Int32 = 5,
    Int64 = 6,
    Float32 = 7,
    Float64 = 8,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 9] = [
        Self::Void,
        Self::Bool,
        Self::Int8,
        Self::Int16,
        Self::Char16,
        Self::Int32,
        Self::Int64,
        Self::Float32,
        Self::Float64,
    ];

    /// One-letter binary descriptor.
    pub const fn descriptor(self) -> char {
        match self {
            Self::Void => 'V',
            Self::Bool => 'Z',
            Self::Int8 => 'B',
            Self::Int16 => 'S',
            Self::Char16 => 'C',
            Self::Int32 => 'I',
            Self::Int64 => 'J',
            Self::Float32 => 'F',
            Self::Float64 => 'D',
        }
    }

    /// Host reference class a nullable primitive is promoted to.
    pub const fn boxed_class_name(self) -> &'static str {
        match self {
            Self::Void => "host.Unit",
            Self::Bool => "host.Boolean",
            Self::Int8 => "host.Byte",
            Self::Int16 => "host.Short",
            Self::Char16 => "host.Char",
            Self::Int32 => "host.Int",
            Self::Int64 => "host.Long",
            Self::Float32 => "host.Float",
            Self::Float64 => "host.Double",
        }
    }

    /// Source-level name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Void => "Unit",
            Self::Bool => "Bool",
            Self::Int8 => "Int8",
            Self::Int16 => "Int16",
            Self::Char16 => "Char16",
            Self::Int32 => "Int32",
            Self::Int64 => "Int64",
            Self::Float32 => "Float32",
            Self::Float64 => "Float64",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Unit" | "Void" => Some(Self::Void),
            _ => Self::ALL
                .into_iter()
                .find(|kind| *kind != Self::Void && kind.name() == name),
        }
    }
}

// =============================================================================
// TypeData
// =============================================================================

/// A type parameter as seen at a use site or as a carrier.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeParamInfo {
    pub name: Atom,
    /// Upper bound; `None` is unconstrained.
    pub bound: Option<TypeId>,
    /// Compile-time-resolved (`reified`) parameter.
    pub reified: bool,
}

/// Non-wrapper types.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum OrdinaryType {
    Primitive(PrimitiveKind),
    /// Host reference form of a primitive (`host.Int`).
    BoxedPrimitive(PrimitiveKind),
    /// Host class by fully-qualified name.
    Reference(Atom),
    Interface(Atom),
    TypeParameter(TypeParamInfo),
    Array(TypeId),
    Application { base: Atom, args: TypeListId },
}

/// The closed "is this a wrapper" variant every resolved type carries.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeShape {
    Wrapper(WrapperId),
    Ordinary(OrdinaryType),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeData {
    pub shape: TypeShape,
    pub nullable: bool,
}

impl TypeData {
    pub const fn new(shape: TypeShape) -> Self {
        Self {
            shape,
            nullable: false,
        }
    }

    pub const fn ordinary(ty: OrdinaryType) -> Self {
        Self::new(TypeShape::Ordinary(ty))
    }

    pub const fn with_nullable(self, nullable: bool) -> Self {
        Self {
            shape: self.shape,
            nullable,
        }
    }

    /// The wrapper this type is (ignoring nullability), if any.
    pub const fn wrapper(self) -> Option<WrapperId> {
        match self.shape {
            TypeShape::Wrapper(id) => Some(id),
            TypeShape::Ordinary(_) => None,
        }
    }
}

// =============================================================================
// TypeInterner
// =============================================================================

/// Concurrent type interner.
///
/// Interning takes the map entry first and the table lock second; lookups only
/// take the table lock. Ids are never reused.
pub struct TypeInterner {
    names: ShardedInterner,
    types: RwLock<Vec<TypeData>>,
    map: DashMap<TypeData, TypeId, FxBuildHasher>,
    lists: RwLock<Vec<Arc<[TypeId]>>>,
    list_map: DashMap<Arc<[TypeId]>, TypeListId, FxBuildHasher>,
}

impl Default for TypeInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeInterner {
    pub fn new() -> Self {
        let interner = Self {
            names: ShardedInterner::with_common(),
            types: RwLock::new(Vec::with_capacity(256)),
            map: DashMap::with_hasher(FxBuildHasher),
            lists: RwLock::new(Vec::new()),
            list_map: DashMap::with_hasher(FxBuildHasher),
        };

        for kind in PrimitiveKind::ALL {
            interner.intern(TypeData::ordinary(OrdinaryType::Primitive(kind)));
        }
        for kind in PrimitiveKind::ALL {
            interner.intern(TypeData::ordinary(OrdinaryType::BoxedPrimitive(kind)));
        }
        let any = interner.names.intern("host.Any");
        interner.intern(TypeData::ordinary(OrdinaryType::Reference(any)));
        let string = interner.names.intern("host.String");
        interner.intern(TypeData::ordinary(OrdinaryType::Reference(string)));

        debug_assert_eq!(interner.len() as u32, TypeId::FIRST_DYNAMIC);
        interner
    }

    // -------------------------------------------------------------------------
    // Names
    // -------------------------------------------------------------------------

    #[inline]
    pub fn intern_string(&self, s: &str) -> Atom {
        self.names.intern(s)
    }

    #[inline]
    pub fn resolve_atom(&self, atom: Atom) -> Arc<str> {
        self.names.resolve(atom)
    }

    // -------------------------------------------------------------------------
    // Interning
    // -------------------------------------------------------------------------

    pub fn intern(&self, data: TypeData) -> TypeId {
        if let Some(existing) = self.map.get(&data) {
            return *existing;
        }
        *self.map.entry(data).or_insert_with(|| {
            let mut types = self.types.write().unwrap_or_else(PoisonError::into_inner);
            let id = TypeId(types.len() as u32);
            types.push(data);
            id
        })
    }

    pub fn lookup(&self, id: TypeId) -> Option<TypeData> {
        let types = self.types.read().unwrap_or_else(PoisonError::into_inner);
        types.get(id.0 as usize).copied()
    }

    pub fn intern_list(&self, ids: &[TypeId]) -> TypeListId {
        if let Some(existing) = self.list_map.get(ids) {
            return *existing;
        }
        let key: Arc<[TypeId]> = Arc::from(ids);
        *self.list_map.entry(key.clone()).or_insert_with(|| {
            let mut lists = self.lists.write().unwrap_or_else(PoisonError::into_inner);
            let id = TypeListId(lists.len() as u32);
            lists.push(key);
            id
        })
    }

    pub fn list(&self, id: TypeListId) -> Arc<[TypeId]> {
        let lists = self.lists.read().unwrap_or_else(PoisonError::into_inner);
        lists
            .get(id.0 as usize)
            .cloned()
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    pub fn len(&self) -> usize {
        self.types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // -------------------------------------------------------------------------
    // Constructors
    // -------------------------------------------------------------------------

    pub fn reference(&self, qualified_name: &str) -> TypeId {
        let name = self.names.intern(qualified_name);
        self.intern(TypeData::ordinary(OrdinaryType::Reference(name)))
    }

    pub fn interface(&self, qualified_name: &str) -> TypeId {
        let name = self.names.intern(qualified_name);
        self.intern(TypeData::ordinary(OrdinaryType::Interface(name)))
    }

    pub fn type_param(&self, name: &str, bound: Option<TypeId>, reified: bool) -> TypeId {
        let name = self.names.intern(name);
        self.intern(TypeData::ordinary(OrdinaryType::TypeParameter(
            TypeParamInfo {
                name,
                bound,
                reified,
            },
        )))
    }

    pub fn array(&self, element: TypeId) -> TypeId {
        self.intern(TypeData::ordinary(OrdinaryType::Array(element)))
    }

    pub fn application(&self, base: &str, args: &[TypeId]) -> TypeId {
        let base = self.names.intern(base);
        let args = self.intern_list(args);
        self.intern(TypeData::ordinary(OrdinaryType::Application { base, args }))
    }

    pub fn wrapper(&self, id: WrapperId) -> TypeId {
        self.intern(TypeData::new(TypeShape::Wrapper(id)))
    }

    /// The nullable form of `id`. Idempotent.
    pub fn nullable(&self, id: TypeId) -> TypeId {
        match self.lookup(id) {
            Some(data) if !data.nullable => self.intern(data.with_nullable(true)),
            _ => id,
        }
    }

    /// The non-null form of `id`. Idempotent.
    pub fn non_null(&self, id: TypeId) -> TypeId {
        match self.lookup(id) {
            Some(data) if data.nullable => self.intern(data.with_nullable(false)),
            _ => id,
        }
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn is_nullable(&self, id: TypeId) -> bool {
        self.lookup(id).is_some_and(|data| data.nullable)
    }

    /// The wrapper `id` is an (optionally nullable) use of.
    pub fn as_wrapper(&self, id: TypeId) -> Option<WrapperId> {
        self.lookup(id).and_then(TypeData::wrapper)
    }

    #[inline]
    pub fn is_wrapper(&self, id: TypeId) -> bool {
        self.as_wrapper(id).is_some()
    }

    pub fn as_type_param(&self, id: TypeId) -> Option<TypeParamInfo> {
        match self.lookup(id)?.shape {
            TypeShape::Ordinary(OrdinaryType::TypeParameter(info)) => Some(info),
            _ => None,
        }
    }

    /// Source-level rendering for diagnostics and listings.
    pub fn display(&self, id: TypeId, wrappers: &WrapperStore) -> String {
        let Some(data) = self.lookup(id) else {
            return format!("<unknown type {}>", id.0);
        };
        let mut out = match data.shape {
            TypeShape::Wrapper(w) => wrappers
                .name_of(w)
                .map(|atom| self.resolve_atom(atom).to_string())
                .unwrap_or_else(|| format!("<wrapper {}>", w.0)),
            TypeShape::Ordinary(ordinary) => match ordinary {
                OrdinaryType::Primitive(kind) => kind.name().to_string(),
                OrdinaryType::BoxedPrimitive(kind) => kind.boxed_class_name().to_string(),
                OrdinaryType::Reference(name) | OrdinaryType::Interface(name) => {
                    self.resolve_atom(name).to_string()
                }
                OrdinaryType::TypeParameter(info) => self.resolve_atom(info.name).to_string(),
                OrdinaryType::Array(element) => {
                    format!("Array<{}>", self.display(element, wrappers))
                }
                OrdinaryType::Application { base, args } => {
                    let args: Vec<String> = self
                        .list(args)
                        .iter()
                        .map(|arg| self.display(*arg, wrappers))
                        .collect();
                    format!("{}<{}>", self.resolve_atom(base), args.join(", "))
                }
            },
        };
        if data.nullable {
            out.push('?');
        }
        out
    }
}

#[cfg(test)]
#[path = "../tests/types_tests.rs"]
mod tests;
