//! Lowering driver: config + manifests in, per-unit reports out.

use anyhow::{Context, Result, bail};
use ilc_common::Diagnostic;
use ilc_lowering::{
    AbiUnit, BoxingDecision, ConversionMarker, Declaration, Dispatch, LinkingScope,
    LoweringOptions, ResolverStats, SealedScope, SyntheticKind, TypeInterner, UseSiteKind,
    Visibility, WrapperStore,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info_span};

use crate::cli::args::CliArgs;
use crate::cli::config::{find_config, resolve_config, validate_carrier_depth, validate_hash_length};
use crate::unit::{UnitManifest, load_manifest};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberEntry {
    pub symbol: String,
    pub kind: SyntheticKind,
    pub signature: String,
    pub visibility: Visibility,
    pub dispatch: Dispatch,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegates_to: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub declared: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub runs_validation: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbiUnitReport {
    pub wrapper: String,
    /// Descriptor of non-null uses.
    pub representation: String,
    /// Descriptor of nullable uses.
    pub nullable_representation: String,
    pub members: Vec<MemberEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolEntry {
    pub declaration: String,
    /// `None` when the declaration could not be lowered.
    pub symbol: Option<String>,
    pub mangled: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionEntry {
    pub index: usize,
    pub kind: UseSiteKind,
    pub decision: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrapper: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accessor: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsEntry {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cached: usize,
}

impl From<ResolverStats> for StatsEntry {
    fn from(stats: ResolverStats) -> Self {
        Self {
            cache_hits: stats.hits,
            cache_misses: stats.misses,
            cached: stats.cached,
        }
    }
}

/// Everything lowering produced for one unit manifest.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitReport {
    pub file: String,
    pub package: String,
    pub abi_units: Vec<AbiUnitReport>,
    pub symbols: Vec<SymbolEntry>,
    pub conversions: Vec<ConversionEntry>,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: StatsEntry,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoweringRun {
    pub options: LoweringOptions,
    pub units: Vec<UnitReport>,
}

impl LoweringRun {
    pub fn diagnostic_count(&self) -> usize {
        self.units.iter().map(|u| u.diagnostics.len()).sum()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostic_count() > 0
    }
}

/// Effective options and unit list: config file first, CLI flags on top.
pub fn resolve_inputs(args: &CliArgs, cwd: &Path) -> Result<(LoweringOptions, Vec<PathBuf>)> {
    let config_path = find_config(args.project.as_deref(), cwd);
    let config = resolve_config(config_path.as_deref())?;
    let mut options = config.options;
    apply_cli_overrides(&mut options, args)?;

    let units = if args.units.is_empty() {
        config.units
    } else {
        args.units
            .iter()
            .map(|unit| if unit.is_absolute() { unit.clone() } else { cwd.join(unit) })
            .collect()
    };
    Ok((options, units))
}

pub fn apply_cli_overrides(options: &mut LoweringOptions, args: &CliArgs) -> Result<()> {
    if let Some(hash_length) = args.hash_length {
        options.hash_length = validate_hash_length(hash_length)?;
    }
    if let Some(depth) = args.max_carrier_depth {
        options.max_carrier_depth = validate_carrier_depth(depth)?;
    }
    if args.no_parallel {
        options.parallel = false;
    }
    Ok(())
}

pub fn run(args: &CliArgs, cwd: &Path) -> Result<LoweringRun> {
    let (options, units) = resolve_inputs(args, cwd)?;
    if units.is_empty() {
        bail!("no unit manifests given; pass UNITS or list them under \"units\" in ilc.json");
    }

    let mut reports = Vec::with_capacity(units.len());
    for path in &units {
        reports.push(lower_file(path, options)?);
    }
    debug!(
        units = reports.len(),
        diagnostics = reports.iter().map(|r| r.diagnostics.len()).sum::<usize>(),
        "lowering finished"
    );
    Ok(LoweringRun {
        options,
        units: reports,
    })
}

pub fn lower_file(path: &Path, options: LoweringOptions) -> Result<UnitReport> {
    let manifest = load_manifest(path)?;
    lower_manifest(&path.display().to_string(), &manifest, options)
        .with_context(|| format!("failed to lower unit: {}", path.display()))
}

/// Lower one manifest as one linking scope.
pub fn lower_manifest(file: &str, manifest: &UnitManifest, options: LoweringOptions) -> Result<UnitReport> {
    let _span = info_span!("unit", file).entered();
    let unit = manifest.build(0)?;
    let files = vec![file.to_string()];

    let mut scope = LinkingScope::new(&unit.types, &unit.wrappers, options);
    let ids: Vec<_> = unit
        .declarations
        .iter()
        .map(|decl| scope.add_declaration(decl.clone()))
        .collect();
    let sealed = scope.seal();
    let mut diagnostics = sealed.diagnostics(&files);

    let symbols = ids
        .iter()
        .zip(&unit.declarations)
        .map(|(id, decl)| {
            let symbol = sealed.symbol_of(*id);
            SymbolEntry {
                declaration: describe_declaration(decl, &unit.types, &unit.wrappers),
                symbol: symbol.map(ToString::to_string),
                mangled: symbol.is_some_and(|s| s.is_mangled()),
            }
        })
        .collect();

    let conversions = match sealed.lower_use_sites(&unit.use_sites) {
        Ok(markers) => markers
            .iter()
            .map(|marker| conversion_entry(marker, &sealed))
            .collect(),
        Err(errors) => {
            diagnostics.extend(errors.iter().map(|e| e.to_diagnostic(&files)));
            Vec::new()
        }
    };

    let abi_units = sealed
        .abi_units()
        .iter()
        .map(|abi| abi_unit_report(abi, &sealed))
        .collect::<Result<Vec<_>>>()?;

    Ok(UnitReport {
        file: file.to_string(),
        package: unit.package.clone(),
        abi_units,
        symbols,
        conversions,
        diagnostics,
        stats: sealed.stats().into(),
    })
}

fn abi_unit_report(abi: &AbiUnit, sealed: &SealedScope<'_>) -> Result<AbiUnitReport> {
    let resolver = sealed.resolver();
    let members = abi
        .members
        .iter()
        .map(|member| {
            Ok(MemberEntry {
                symbol: member.symbol.clone(),
                kind: member.kind,
                signature: member.signature(resolver)?,
                visibility: member.visibility,
                dispatch: member.dispatch,
                delegates_to: member.delegates_to.clone(),
                declared: member.declared,
                runs_validation: member.runs_validation,
            })
        })
        .collect::<Result<Vec<_>, ilc_lowering::LoweringError>>()?;
    Ok(AbiUnitReport {
        wrapper: abi.name.clone(),
        representation: resolver.descriptor(abi.representation)?,
        nullable_representation: resolver.descriptor(abi.nullable_representation)?,
        members,
    })
}

fn conversion_entry(marker: &ConversionMarker, sealed: &SealedScope<'_>) -> ConversionEntry {
    let decision = match marker.decision {
        BoxingDecision::Unboxed => "unboxed",
        BoxingDecision::Box(_) => "box",
        BoxingDecision::Unbox(_) => "unbox",
        BoxingDecision::NoOp => "none",
    };
    ConversionEntry {
        index: marker.index,
        kind: marker.kind,
        decision,
        wrapper: marker
            .decision
            .wrapper()
            .and_then(|w| sealed.wrappers().name_of(w))
            .map(|atom| sealed.types().resolve_atom(atom).to_string()),
        accessor: marker.accessor.clone(),
    }
}

/// `scope.name(params): ret`, with the receiver as `scope.Receiver.name`.
pub fn describe_declaration(decl: &Declaration, types: &TypeInterner, wrappers: &WrapperStore) -> String {
    let params: Vec<String> = decl.params.iter().map(|p| types.display(*p, wrappers)).collect();
    let receiver = decl
        .receiver
        .map(|r| format!("{}.", types.display(r, wrappers)))
        .unwrap_or_default();
    format!(
        "{}.{}{}({}): {}",
        types.resolve_atom(decl.scope),
        receiver,
        types.resolve_atom(decl.name),
        params.join(", "),
        types.display(decl.ret, wrappers)
    )
}
