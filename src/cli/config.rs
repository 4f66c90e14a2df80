use anyhow::{Context, Result, anyhow, bail};
use ilc_common::limits::{MAX_CARRIER_CHAIN_DEPTH, MAX_MANGLE_HASH_LENGTH, MIN_MANGLE_HASH_LENGTH};
use ilc_lowering::LoweringOptions;
use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "ilc.json";

/// Accept both `true` and `"true"` for boolean options.
fn deserialize_bool_or_string<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        String(String),
    }

    match Option::<BoolOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(BoolOrString::Bool(b)) => Ok(Some(b)),
        Some(BoolOrString::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" => Ok(Some(false)),
            _ => Err(Error::custom(format!(
                "invalid boolean value: '{s}'. Expected true, false, 'true', or 'false'"
            ))),
        },
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct IlcConfig {
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub lowering_options: Option<LoweringOptionsConfig>,
    /// Unit manifests, relative to the config file.
    #[serde(default)]
    pub units: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoweringOptionsConfig {
    #[serde(default)]
    pub hash_length: Option<usize>,
    #[serde(default)]
    pub max_carrier_depth: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_bool_or_string")]
    pub parallel: Option<bool>,
}

/// A loaded config plus the directory its relative paths resolve against.
#[derive(Debug, Clone, Default)]
pub struct ResolvedConfig {
    pub options: LoweringOptions,
    pub units: Vec<PathBuf>,
}

pub fn parse_config(source: &str) -> Result<IlcConfig> {
    let stripped = strip_jsonc(source);
    let normalized = remove_trailing_commas(&stripped);
    let config = serde_json::from_str(&normalized).context("failed to parse ilc.json JSON")?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<IlcConfig> {
    let mut visited = HashSet::new();
    load_config_inner(path, &mut visited)
}

fn load_config_inner(path: &Path, visited: &mut HashSet<PathBuf>) -> Result<IlcConfig> {
    let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical.clone()) {
        bail!("ilc.json extends cycle detected at {}", canonical.display());
    }

    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read ilc.json: {}", path.display()))?;
    let mut config =
        parse_config(&source).with_context(|| format!("failed to parse ilc.json: {}", path.display()))?;

    // Units are relative to the file that lists them.
    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    if let Some(units) = config.units.as_mut() {
        for unit in units.iter_mut() {
            *unit = base_dir.join(&*unit).to_string_lossy().into_owned();
        }
    }

    if let Some(extends_path) = config.extends.take() {
        let base_path = resolve_extends_path(path, &extends_path)?;
        let base_config = load_config_inner(&base_path, visited)?;
        config = merge_configs(base_config, config);
    }

    visited.remove(&canonical);
    Ok(config)
}

fn resolve_extends_path(current_path: &Path, extends: &str) -> Result<PathBuf> {
    let base_dir = current_path
        .parent()
        .ok_or_else(|| anyhow!("ilc.json has no parent directory"))?;
    let mut candidate = PathBuf::from(extends);
    if candidate.extension().is_none() {
        candidate.set_extension("json");
    }

    if candidate.is_absolute() {
        Ok(candidate)
    } else {
        Ok(base_dir.join(candidate))
    }
}

fn merge_configs(base: IlcConfig, child: IlcConfig) -> IlcConfig {
    let lowering_options = match (base.lowering_options, child.lowering_options) {
        (Some(base), Some(child)) => Some(LoweringOptionsConfig {
            hash_length: child.hash_length.or(base.hash_length),
            max_carrier_depth: child.max_carrier_depth.or(base.max_carrier_depth),
            parallel: child.parallel.or(base.parallel),
        }),
        (base, child) => child.or(base),
    };

    IlcConfig {
        extends: None,
        lowering_options,
        units: child.units.or(base.units),
    }
}

/// Turn the config file's options into validated lowering options.
pub fn resolve_lowering_options(options: Option<&LoweringOptionsConfig>) -> Result<LoweringOptions> {
    let mut resolved = LoweringOptions::default();
    let Some(options) = options else {
        return Ok(resolved);
    };

    if let Some(hash_length) = options.hash_length {
        resolved.hash_length = validate_hash_length(hash_length)?;
    }
    if let Some(depth) = options.max_carrier_depth {
        resolved.max_carrier_depth = validate_carrier_depth(depth)?;
    }
    if let Some(parallel) = options.parallel {
        resolved.parallel = parallel;
    }
    Ok(resolved)
}

pub fn validate_hash_length(hash_length: usize) -> Result<usize> {
    if !(MIN_MANGLE_HASH_LENGTH..=MAX_MANGLE_HASH_LENGTH).contains(&hash_length) {
        bail!(
            "hashLength must be between {MIN_MANGLE_HASH_LENGTH} and {MAX_MANGLE_HASH_LENGTH}, got {hash_length}"
        );
    }
    Ok(hash_length)
}

pub fn validate_carrier_depth(depth: u32) -> Result<u32> {
    if depth == 0 || depth > MAX_CARRIER_CHAIN_DEPTH {
        bail!("maxCarrierDepth must be between 1 and {MAX_CARRIER_CHAIN_DEPTH}, got {depth}");
    }
    Ok(depth)
}

/// Locate the project config: `--project` (file or directory), else
/// `ilc.json` in `cwd` when present.
pub fn find_config(project: Option<&Path>, cwd: &Path) -> Option<PathBuf> {
    match project {
        Some(path) => {
            let path = if path.is_absolute() {
                path.to_path_buf()
            } else {
                cwd.join(path)
            };
            Some(if path.is_dir() {
                path.join(CONFIG_FILE_NAME)
            } else {
                path
            })
        }
        None => {
            let default_path = cwd.join(CONFIG_FILE_NAME);
            default_path.exists().then_some(default_path)
        }
    }
}

pub fn resolve_config(path: Option<&Path>) -> Result<ResolvedConfig> {
    let Some(path) = path else {
        return Ok(ResolvedConfig::default());
    };
    let config = load_config(path)?;
    Ok(ResolvedConfig {
        options: resolve_lowering_options(config.lowering_options.as_ref())?,
        units: config
            .units
            .unwrap_or_default()
            .into_iter()
            .map(PathBuf::from)
            .collect(),
    })
}

fn strip_jsonc(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escape = false;
    let mut in_line_comment = false;
    let mut in_block_comment = false;

    while let Some(ch) = chars.next() {
        if in_line_comment {
            if ch == '\n' {
                in_line_comment = false;
                out.push(ch);
            }
            continue;
        }

        if in_block_comment {
            if ch == '*' {
                if let Some('/') = chars.peek().copied() {
                    chars.next();
                    in_block_comment = false;
                }
            } else if ch == '\n' {
                out.push(ch);
            }
            continue;
        }

        if in_string {
            out.push(ch);
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        if ch == '"' {
            in_string = true;
            out.push(ch);
            continue;
        }

        if ch == '/'
            && let Some(&next) = chars.peek()
        {
            if next == '/' {
                chars.next();
                in_line_comment = true;
                continue;
            }
            if next == '*' {
                chars.next();
                in_block_comment = true;
                continue;
            }
        }

        out.push(ch);
    }

    out
}

fn remove_trailing_commas(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escape = false;

    while let Some(ch) = chars.next() {
        if in_string {
            out.push(ch);
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        if ch == '"' {
            in_string = true;
            out.push(ch);
            continue;
        }

        if ch == ',' {
            let mut lookahead = chars.clone();
            while lookahead.peek().is_some_and(|c| c.is_whitespace()) {
                lookahead.next();
            }
            if lookahead.peek().is_some_and(|&c| c == '}' || c == ']') {
                continue;
            }
        }

        out.push(ch);
    }

    out
}
