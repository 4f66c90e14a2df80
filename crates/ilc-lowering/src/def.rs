//! Wrapper declarations and the linkable declarations lowering mangles.
//!
//! The front end registers every wrapper type in a [`WrapperStore`]: an arena
//! indexed by [`WrapperId`]. Carriers refer to other wrappers through interned
//! types, so the store forms an explicit dependency graph with index-based
//! edges (see [`crate::carrier_graph`]).
//!
//! A wrapper can mention itself in its own carrier (that is exactly the error
//! validation looks for), so registration is two-phase: [`WrapperStore::reserve`]
//! hands out the id, [`WrapperStore::define`] fills in the declaration.
//!
//! The store is append-only during registration and immutable once handed to
//! a [`crate::LinkingScope`].

use crate::types::TypeId;
use bitflags::bitflags;
use ilc_common::Span;
use ilc_common::interner::Atom;
use rustc_hash::FxHashMap;
use serde::Serialize;
use smallvec::SmallVec;

// =============================================================================
// WrapperId
// =============================================================================

/// Arena index of a wrapper declaration.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct WrapperId(pub u32);

impl WrapperId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

bitflags! {
    /// Declaration-shape facts the front end already established.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct DeclarationFlags: u8 {
        const FINAL = 1 << 0;
        const TOP_LEVEL = 1 << 1;
        const PUBLIC_CONSTRUCTOR = 1 << 2;
        /// The primary constructor carries a validation block.
        const HAS_VALIDATION = 1 << 3;
        /// A typed `equals(other: Self)` override is declared.
        const TYPED_EQUALS = 1 << 4;
    }
}

impl DeclarationFlags {
    /// Final, top-level, public constructor, no validation.
    pub const WELL_FORMED: Self = Self::FINAL
        .union(Self::TOP_LEVEL)
        .union(Self::PUBLIC_CONSTRUCTOR);
}

impl Default for DeclarationFlags {
    fn default() -> Self {
        Self::WELL_FORMED
    }
}

// =============================================================================
// Interfaces
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterfaceMember {
    pub name: Atom,
    pub params: SmallVec<[TypeId; 4]>,
    pub ret: TypeId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterfaceDecl {
    pub name: Atom,
    pub members: Vec<InterfaceMember>,
}

impl InterfaceDecl {
    pub fn new(name: Atom) -> Self {
        Self {
            name,
            members: Vec::new(),
        }
    }

    pub fn with_member(mut self, name: Atom, params: &[TypeId], ret: TypeId) -> Self {
        self.members.push(InterfaceMember {
            name,
            params: SmallVec::from_slice(params),
            ret,
        });
        self
    }

    pub fn member(&self, name: Atom) -> Option<&InterfaceMember> {
        self.members.iter().find(|m| m.name == name)
    }
}

// =============================================================================
// WrapperDecl
// =============================================================================

/// A member declared in a wrapper body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WrapperMember {
    pub name: Atom,
    pub params: SmallVec<[TypeId; 4]>,
    pub ret: TypeId,
    /// Interface whose member this implements.
    pub overrides: Option<Atom>,
    pub span: Span,
}

impl WrapperMember {
    pub fn new(name: Atom, params: &[TypeId], ret: TypeId) -> Self {
        Self {
            name,
            params: SmallVec::from_slice(params),
            ret,
            overrides: None,
            span: Span::UNKNOWN,
        }
    }

    pub fn overriding(mut self, interface: Atom) -> Self {
        self.overrides = Some(interface);
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// The linkable declaration of this member's erased-level implementation.
    pub fn to_declaration(&self, owner: WrapperId, owner_name: Atom, owner_type: TypeId) -> Declaration {
        Declaration {
            name: self.name,
            scope: owner_name,
            kind: DeclKind::Function,
            receiver: Some(owner_type),
            params: self.params.clone(),
            ret: self.ret,
            owner: Some(owner),
            span: self.span,
        }
    }
}

/// A wrapper type declaration: one carrier, interfaces only, no superclass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WrapperDecl {
    /// Fully-qualified name.
    pub name: Atom,
    /// Carrier type; its own nullability is the carrier-declared nullability.
    pub carrier: TypeId,
    /// Carrier property name (`value` unless declared otherwise).
    pub carrier_name: Atom,
    pub flags: DeclarationFlags,
    pub members: Vec<WrapperMember>,
    pub interfaces: Vec<Atom>,
    pub span: Span,
}

impl WrapperDecl {
    pub fn new(name: Atom, carrier: TypeId) -> Self {
        Self {
            name,
            carrier,
            carrier_name: Atom::NONE,
            flags: DeclarationFlags::WELL_FORMED,
            members: Vec::new(),
            interfaces: Vec::new(),
            span: Span::UNKNOWN,
        }
    }

    pub fn with_flags(mut self, flags: DeclarationFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_carrier_name(mut self, name: Atom) -> Self {
        self.carrier_name = name;
        self
    }

    pub fn with_member(mut self, member: WrapperMember) -> Self {
        self.members.push(member);
        self
    }

    pub fn with_interface(mut self, interface: Atom) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

// =============================================================================
// Declaration
// =============================================================================

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum DeclKind {
    Function,
    Constructor,
    Getter,
    Setter,
}

/// A linkable declaration whose symbol may need mangling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    pub name: Atom,
    /// Fully-qualified declaring scope.
    pub scope: Atom,
    pub kind: DeclKind,
    pub receiver: Option<TypeId>,
    pub params: SmallVec<[TypeId; 4]>,
    pub ret: TypeId,
    /// Set when declared inside a wrapper body.
    pub owner: Option<WrapperId>,
    pub span: Span,
}

impl Declaration {
    pub fn function(scope: Atom, name: Atom, params: &[TypeId], ret: TypeId) -> Self {
        Self {
            name,
            scope,
            kind: DeclKind::Function,
            receiver: None,
            params: SmallVec::from_slice(params),
            ret,
            owner: None,
            span: Span::UNKNOWN,
        }
    }

    pub fn with_kind(mut self, kind: DeclKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_receiver(mut self, receiver: TypeId) -> Self {
        self.receiver = Some(receiver);
        self
    }

    pub fn with_owner(mut self, owner: WrapperId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Top-level signature positions in order: receiver, parameters, return.
    pub fn top_level_positions(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.receiver
            .into_iter()
            .chain(self.params.iter().copied())
            .chain(std::iter::once(self.ret))
    }
}

// =============================================================================
// WrapperStore
// =============================================================================

/// Arena of wrapper declarations plus the interfaces they implement.
#[derive(Default)]
pub struct WrapperStore {
    names: Vec<Atom>,
    slots: Vec<Option<WrapperDecl>>,
    by_name: FxHashMap<Atom, WrapperId>,
    interfaces: FxHashMap<Atom, InterfaceDecl>,
}

impl WrapperStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id for `name` before its declaration is known.
    /// Reserving the same name twice returns the same id.
    pub fn reserve(&mut self, name: Atom) -> WrapperId {
        if let Some(&id) = self.by_name.get(&name) {
            return id;
        }
        let id = WrapperId(self.slots.len() as u32);
        self.names.push(name);
        self.slots.push(None);
        self.by_name.insert(name, id);
        id
    }

    /// Fill in a reserved slot. Returns `false` if `id` was never reserved.
    pub fn define(&mut self, id: WrapperId, decl: WrapperDecl) -> bool {
        match self.slots.get_mut(id.index()) {
            Some(slot) => {
                *slot = Some(decl);
                true
            }
            None => false,
        }
    }

    /// Reserve and define in one step (carrier must not mention the new wrapper).
    pub fn register(&mut self, decl: WrapperDecl) -> WrapperId {
        let id = self.reserve(decl.name);
        self.define(id, decl);
        id
    }

    pub fn add_interface(&mut self, interface: InterfaceDecl) {
        self.interfaces.insert(interface.name, interface);
    }

    pub fn get(&self, id: WrapperId) -> Option<&WrapperDecl> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    pub fn name_of(&self, id: WrapperId) -> Option<Atom> {
        self.names.get(id.index()).copied()
    }

    pub fn lookup(&self, name: Atom) -> Option<WrapperId> {
        self.by_name.get(&name).copied()
    }

    pub fn interface(&self, name: Atom) -> Option<&InterfaceDecl> {
        self.interfaces.get(&name)
    }

    /// Ids in registration order.
    pub fn ids(&self) -> impl Iterator<Item = WrapperId> + '_ {
        (0..self.slots.len() as u32).map(WrapperId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (WrapperId, &WrapperDecl)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|decl| (WrapperId(i as u32), decl)))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
#[path = "../tests/def_tests.rs"]
mod tests;
