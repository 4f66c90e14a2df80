//! Unit manifests.
//!
//! A manifest describes one linking unit the way a front end would hand it to
//! lowering: declared interfaces and wrappers, the unit's linkable
//! declarations, and the use sites whose boxing must be decided. Types are
//! written as [`TypeExpr`]s and resolved against the manifest's own
//! declarations.

pub mod type_expr;

pub use type_expr::{TypeExpr, TypeExprError};

use anyhow::{Context, Result, anyhow, bail};
use ilc_common::Span;
use ilc_lowering::{
    DeclKind, Declaration, DeclarationFlags, InterfaceDecl, PrimitiveKind, TypeId, TypeInterner,
    UseSite, UseSiteKind, WrapperDecl, WrapperMember, WrapperStore,
};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

fn default_true() -> bool {
    true
}

fn default_return() -> String {
    PrimitiveKind::Void.name().to_string()
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
pub struct SpanSpec {
    pub start: u32,
    pub end: u32,
}

impl SpanSpec {
    fn to_span(self, file: u32) -> Span {
        Span::new(file, self.start, self.end)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeParameterSpec {
    pub name: String,
    #[serde(default)]
    pub bound: Option<String>,
    #[serde(default)]
    pub reified: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureSpec {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default = "default_return")]
    pub returns: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceSpec {
    pub name: String,
    #[serde(default)]
    pub members: Vec<SignatureSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberSpec {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default = "default_return")]
    pub returns: String,
    /// Interface whose member this implements.
    #[serde(default)]
    pub overrides: Option<String>,
    #[serde(default)]
    pub span: Option<SpanSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrapperSpec {
    pub name: String,
    pub carrier: String,
    #[serde(default)]
    pub carrier_name: Option<String>,
    #[serde(default)]
    pub implements: Vec<String>,
    #[serde(default)]
    pub members: Vec<MemberSpec>,
    #[serde(default = "default_true", rename = "final")]
    pub is_final: bool,
    #[serde(default = "default_true")]
    pub top_level: bool,
    #[serde(default = "default_true")]
    pub public_constructor: bool,
    /// The primary constructor has a validation block.
    #[serde(default)]
    pub validation: bool,
    #[serde(default)]
    pub span: Option<SpanSpec>,
}

impl WrapperSpec {
    fn flags(&self) -> DeclarationFlags {
        let mut flags = DeclarationFlags::empty();
        flags.set(DeclarationFlags::FINAL, self.is_final);
        flags.set(DeclarationFlags::TOP_LEVEL, self.top_level);
        flags.set(DeclarationFlags::PUBLIC_CONSTRUCTOR, self.public_constructor);
        flags.set(DeclarationFlags::HAS_VALIDATION, self.validation);
        flags
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DeclKindSpec {
    #[default]
    Function,
    Constructor,
    Getter,
    Setter,
}

impl From<DeclKindSpec> for DeclKind {
    fn from(kind: DeclKindSpec) -> Self {
        match kind {
            DeclKindSpec::Function => DeclKind::Function,
            DeclKindSpec::Constructor => DeclKind::Constructor,
            DeclKindSpec::Getter => DeclKind::Getter,
            DeclKindSpec::Setter => DeclKind::Setter,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarationSpec {
    pub name: String,
    /// Declaring scope; defaults to the manifest package.
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub kind: DeclKindSpec,
    #[serde(default)]
    pub receiver: Option<String>,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default = "default_return")]
    pub returns: String,
    #[serde(default)]
    pub span: Option<SpanSpec>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum UseSiteKindSpec {
    Parameter,
    Return,
    Field,
    GenericArgument,
    VarargElement,
    Receiver,
    EqualityOperand,
}

impl From<UseSiteKindSpec> for UseSiteKind {
    fn from(kind: UseSiteKindSpec) -> Self {
        match kind {
            UseSiteKindSpec::Parameter => UseSiteKind::Parameter,
            UseSiteKindSpec::Return => UseSiteKind::Return,
            UseSiteKindSpec::Field => UseSiteKind::Field,
            UseSiteKindSpec::GenericArgument => UseSiteKind::GenericArgument,
            UseSiteKindSpec::VarargElement => UseSiteKind::VarargElement,
            UseSiteKindSpec::Receiver => UseSiteKind::Receiver,
            UseSiteKindSpec::EqualityOperand => UseSiteKind::EqualityOperand,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UseSiteSpec {
    pub kind: UseSiteKindSpec,
    pub formal: String,
    pub actual: String,
    /// The value is passed through a type-variable position.
    #[serde(default)]
    pub generic: bool,
    /// Nested inside a signature rather than at its top level.
    #[serde(default)]
    pub nested: bool,
    #[serde(default)]
    pub span: Option<SpanSpec>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UnitManifest {
    pub package: String,
    #[serde(default)]
    pub type_parameters: Vec<TypeParameterSpec>,
    #[serde(default)]
    pub interfaces: Vec<InterfaceSpec>,
    #[serde(default)]
    pub wrappers: Vec<WrapperSpec>,
    #[serde(default)]
    pub declarations: Vec<DeclarationSpec>,
    #[serde(default)]
    pub use_sites: Vec<UseSiteSpec>,
}

pub fn parse_manifest(source: &str) -> Result<UnitManifest> {
    serde_json::from_str(source).context("failed to parse unit manifest JSON")
}

pub fn load_manifest(path: &Path) -> Result<UnitManifest> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read unit manifest: {}", path.display()))?;
    parse_manifest(&source).with_context(|| format!("failed to load unit manifest: {}", path.display()))
}

/// A manifest resolved into lowering inputs.
pub struct LoweringUnit {
    pub package: String,
    pub types: TypeInterner,
    pub wrappers: WrapperStore,
    pub declarations: Vec<Declaration>,
    pub use_sites: Vec<UseSite>,
}

impl UnitManifest {
    /// Resolve every type expression and build the unit's declarations.
    ///
    /// `file` is the index spans are attributed to.
    pub fn build(&self, file: u32) -> Result<LoweringUnit> {
        if self.package.trim().is_empty() {
            bail!("unit manifest has an empty package name");
        }
        let types = TypeInterner::new();
        let mut wrappers = WrapperStore::new();
        let mut resolver = NameResolver::new(&self.package, &types);

        // Reserve first so carriers may name any wrapper of the unit.
        let mut reserved = Vec::with_capacity(self.wrappers.len());
        for spec in &self.wrappers {
            let qualified = resolver.qualify(&spec.name);
            if wrappers.lookup(types.intern_string(&qualified)).is_some() {
                bail!("wrapper '{qualified}' is declared more than once");
            }
            reserved.push(wrappers.reserve(types.intern_string(&qualified)));
        }
        for spec in &self.interfaces {
            let qualified = resolver.qualify(&spec.name);
            resolver.interfaces.insert(qualified);
        }
        for param in &self.type_parameters {
            let bound = param
                .bound
                .as_deref()
                .map(|b| resolver.resolve_str(b, &wrappers))
                .transpose()
                .with_context(|| format!("in bound of type parameter '{}'", param.name))?;
            let id = types.type_param(&param.name, bound, param.reified);
            resolver.parameters.insert(param.name.clone(), id);
        }

        for spec in &self.interfaces {
            let name = types.intern_string(&resolver.qualify(&spec.name));
            let mut decl = InterfaceDecl::new(name);
            for member in &spec.members {
                let (params, ret) = resolver
                    .signature(&member.params, &member.returns, &wrappers)
                    .with_context(|| format!("in interface member '{}.{}'", spec.name, member.name))?;
                decl = decl.with_member(types.intern_string(&member.name), &params, ret);
            }
            wrappers.add_interface(decl);
        }

        for (spec, id) in self.wrappers.iter().zip(reserved) {
            let decl = wrapper_decl(spec, &resolver, &wrappers, file)
                .with_context(|| format!("in wrapper '{}'", spec.name))?;
            if !wrappers.define(id, decl) {
                bail!("wrapper '{}' is declared more than once", spec.name);
            }
        }

        let mut declarations = Vec::with_capacity(self.declarations.len());
        for spec in &self.declarations {
            let decl = declaration(spec, &resolver, &wrappers, file)
                .with_context(|| format!("in declaration '{}'", spec.name))?;
            declarations.push(decl);
        }

        let mut use_sites = Vec::with_capacity(self.use_sites.len());
        for (index, spec) in self.use_sites.iter().enumerate() {
            let formal = resolver
                .resolve_str(&spec.formal, &wrappers)
                .with_context(|| format!("in use site #{index}"))?;
            let actual = resolver
                .resolve_str(&spec.actual, &wrappers)
                .with_context(|| format!("in use site #{index}"))?;
            let mut site = UseSite::new(spec.kind.into(), formal, actual);
            if spec.generic {
                site = site.generic();
            }
            if spec.nested {
                site = site.nested();
            }
            if let Some(span) = spec.span {
                site = site.with_span(span.to_span(file));
            }
            use_sites.push(site);
        }

        debug!(
            package = %self.package,
            wrappers = wrappers.len(),
            declarations = declarations.len(),
            use_sites = use_sites.len(),
            "unit manifest built"
        );
        Ok(LoweringUnit {
            package: self.package.clone(),
            types,
            wrappers,
            declarations,
            use_sites,
        })
    }
}

fn wrapper_decl(
    spec: &WrapperSpec,
    resolver: &NameResolver<'_>,
    wrappers: &WrapperStore,
    file: u32,
) -> Result<WrapperDecl> {
    let types = resolver.types;
    let carrier = resolver.resolve_str(&spec.carrier, wrappers).context("in carrier")?;
    let self_type = types.wrapper(
        wrappers
            .lookup(types.intern_string(&resolver.qualify(&spec.name)))
            .ok_or_else(|| anyhow!("wrapper '{}' was not reserved", spec.name))?,
    );

    let mut flags = spec.flags();
    let mut decl = WrapperDecl::new(types.intern_string(&resolver.qualify(&spec.name)), carrier)
        .with_carrier_name(types.intern_string(spec.carrier_name.as_deref().unwrap_or("value")));
    for interface in &spec.implements {
        let qualified = resolver.qualify_interface(interface);
        if !resolver.interfaces.contains(&qualified) {
            bail!("implements unknown interface '{interface}'");
        }
        decl = decl.with_interface(types.intern_string(&qualified));
    }

    for member in &spec.members {
        let (params, ret) = resolver
            .signature(&member.params, &member.returns, wrappers)
            .with_context(|| format!("in member '{}'", member.name))?;
        if member.name == "equals" && params.len() == 1 && params[0] == self_type {
            flags |= DeclarationFlags::TYPED_EQUALS;
        }
        let mut lowered = WrapperMember::new(types.intern_string(&member.name), &params, ret);
        if let Some(interface) = &member.overrides {
            let qualified = resolver.qualify_interface(interface);
            if !spec.implements.iter().any(|i| resolver.qualify_interface(i) == qualified) {
                bail!(
                    "member '{}' overrides '{interface}', which the wrapper does not implement",
                    member.name
                );
            }
            lowered = lowered.overriding(types.intern_string(&qualified));
        }
        if let Some(span) = member.span {
            lowered = lowered.with_span(span.to_span(file));
        }
        decl = decl.with_member(lowered);
    }

    decl = decl.with_flags(flags);
    if let Some(span) = spec.span {
        decl = decl.with_span(span.to_span(file));
    }
    Ok(decl)
}

fn declaration(
    spec: &DeclarationSpec,
    resolver: &NameResolver<'_>,
    wrappers: &WrapperStore,
    file: u32,
) -> Result<Declaration> {
    let types = resolver.types;
    let (params, ret) = resolver.signature(&spec.params, &spec.returns, wrappers)?;
    let scope = spec.scope.as_deref().unwrap_or(resolver.package);
    let mut decl = Declaration::function(
        types.intern_string(scope),
        types.intern_string(&spec.name),
        &params,
        ret,
    )
    .with_kind(spec.kind.into());
    if let Some(receiver) = &spec.receiver {
        decl = decl.with_receiver(resolver.resolve_str(receiver, wrappers).context("in receiver")?);
    }
    if let Some(span) = spec.span {
        decl = decl.with_span(span.to_span(file));
    }
    Ok(decl)
}

// =============================================================================
// Name resolution
// =============================================================================

struct NameResolver<'a> {
    package: &'a str,
    types: &'a TypeInterner,
    interfaces: FxHashSet<String>,
    parameters: FxHashMap<String, TypeId>,
}

impl<'a> NameResolver<'a> {
    fn new(package: &'a str, types: &'a TypeInterner) -> Self {
        Self {
            package,
            types,
            interfaces: FxHashSet::default(),
            parameters: FxHashMap::default(),
        }
    }

    /// Unqualified names belong to the manifest package.
    fn qualify(&self, name: &str) -> String {
        if name.contains('.') {
            name.to_string()
        } else {
            format!("{}.{name}", self.package)
        }
    }

    fn qualify_interface(&self, name: &str) -> String {
        if self.interfaces.contains(name) {
            name.to_string()
        } else {
            self.qualify(name)
        }
    }

    fn signature(&self, params: &[String], ret: &str, wrappers: &WrapperStore) -> Result<(Vec<TypeId>, TypeId)> {
        let params = params
            .iter()
            .map(|p| self.resolve_str(p, wrappers))
            .collect::<Result<Vec<_>>>()?;
        Ok((params, self.resolve_str(ret, wrappers)?))
    }

    fn resolve_str(&self, source: &str, wrappers: &WrapperStore) -> Result<TypeId> {
        let expr: TypeExpr = source.parse()?;
        self.resolve(&expr, wrappers)
            .with_context(|| format!("in type '{source}'"))
    }

    fn resolve(&self, expr: &TypeExpr, wrappers: &WrapperStore) -> Result<TypeId> {
        let types = self.types;
        match expr {
            TypeExpr::Nullable(inner) => Ok(types.nullable(self.resolve(inner, wrappers)?)),
            TypeExpr::Parameter {
                name,
                bound,
                reified,
            } => {
                let bound = bound
                    .as_deref()
                    .map(|b| self.resolve(b, wrappers))
                    .transpose()?;
                Ok(types.type_param(name, bound, *reified))
            }
            TypeExpr::Named { name, args } if !args.is_empty() => {
                let args = args
                    .iter()
                    .map(|a| self.resolve(a, wrappers))
                    .collect::<Result<Vec<_>>>()?;
                if name == "Array" {
                    match args.as_slice() {
                        [element] => Ok(types.array(*element)),
                        _ => bail!("Array takes exactly one type argument, found {}", args.len()),
                    }
                } else {
                    Ok(types.application(name, &args))
                }
            }
            TypeExpr::Named { name, .. } => self.resolve_name(name, wrappers),
        }
    }

    fn resolve_name(&self, name: &str, wrappers: &WrapperStore) -> Result<TypeId> {
        let types = self.types;
        if let Some(&id) = self.parameters.get(name) {
            return Ok(id);
        }
        match name {
            "Any" => return Ok(TypeId::ANY),
            "String" => return Ok(TypeId::STRING),
            _ => {}
        }
        if let Some(kind) = PrimitiveKind::from_name(name) {
            return Ok(TypeId::primitive(kind));
        }
        for candidate in [name.to_string(), self.qualify(name)] {
            if let Some(id) = wrappers.lookup(types.intern_string(&candidate)) {
                return Ok(types.wrapper(id));
            }
            if self.interfaces.contains(&candidate) {
                return Ok(types.interface(&candidate));
            }
        }
        if name.contains('.') {
            return Ok(types.reference(name));
        }
        bail!("unknown type '{name}'")
    }
}

#[cfg(test)]
#[path = "tests/type_expr_tests.rs"]
mod type_expr_tests;
#[cfg(test)]
#[path = "tests/manifest_tests.rs"]
mod manifest_tests;
