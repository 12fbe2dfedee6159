//! Configuration for extraction, ranking and I/O limits.
//!
//! Configuration is YAML with `${VAR}` / `${VAR:default}` placeholders that
//! are expanded from the environment before parsing, so placeholders may
//! stand in for numbers and booleans as well as strings. Every field has a
//! default; a missing file yields [`RevgraphConfig::default`].

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::analysis::elf_plt::DEFAULT_PLT_ENTRY_SIZE;
use crate::disasm::BackendKind;
use crate::error::{Result, RevgraphError};
use crate::io::IoLimits;

/// File names probed in each search directory, in order
pub const CONFIG_FILE_NAMES: [&str; 4] = [
    "revgraph.yaml",
    "revgraph.yml",
    ".revgraph.yaml",
    ".revgraph.yml",
];

static ENV_VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{(\w+)(?::([^}]*))?\}").expect("static regex"));

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RevgraphConfig {
    pub extraction: ExtractionConfig,
    pub bbr: BbrConfig,
    pub io: IoLimits,
}

/// Knobs for the extraction pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Data sections scanned for printable strings
    pub string_sections: Vec<String>,
    /// Minimum printable run length for scanned strings
    pub min_string_length: usize,
    /// Distance between PLT stubs
    pub plt_entry_size: u64,
    /// Function-name prefixes treated as startup/compiler scaffolding
    pub skip_prefixes: Vec<String>,
    /// Minimum length of a string reached through a RIP-relative `lea`
    pub min_ref_length: usize,
    /// Bytes read when following a RIP-relative `lea` into `.rodata`
    pub max_ref_length: usize,
    /// Per-function decode budget
    pub max_instructions_per_function: usize,
    /// Keep a formatted instruction listing on each function
    pub emit_assembly: bool,
    pub decoder: BackendKind,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            string_sections: vec![".rodata".to_string(), ".data".to_string()],
            min_string_length: 4,
            plt_entry_size: DEFAULT_PLT_ENTRY_SIZE,
            skip_prefixes: ["_", "deregister_", "register_", "frame_", "__"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            min_ref_length: 2,
            max_ref_length: 256,
            max_instructions_per_function: 65_536,
            emit_assembly: false,
            decoder: BackendKind::Iced,
        }
    }
}

impl ExtractionConfig {
    /// Whether a function name marks startup or compiler-generated code
    pub fn is_skipped(&self, name: &str) -> bool {
        self.skip_prefixes.iter().any(|p| name.starts_with(p.as_str()))
    }
}

/// Basic-Block-Rank parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BbrConfig {
    pub iterations: usize,
    #[serde(alias = "damping_factor")]
    pub damping: f64,
    /// Scores per upsert call during write-back
    pub write_batch_size: usize,
    /// Largest node count accepted before the dense matrix is allocated
    pub max_nodes: usize,
}

impl Default for BbrConfig {
    fn default() -> Self {
        Self {
            iterations: 20,
            damping: 0.85,
            write_batch_size: 500,
            max_nodes: 8192,
        }
    }
}

impl RevgraphConfig {
    /// Load from an explicit path, else from the first file found on the search path
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match find_config_file(explicit) {
            Some(path) => Self::from_file(&path),
            None => {
                debug!("no configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse a configuration file; `.json` files are read as JSON, anything else as YAML
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let config = if is_json {
            let expanded = interpolate_env(&raw);
            let config = serde_json::from_str::<Self>(&expanded)
                .map_err(|e| RevgraphError::Config(format!("{}: {}", path.display(), e)))?;
            config.validate()?;
            config
        } else {
            Self::from_yaml_str(&raw)
                .map_err(|e| RevgraphError::Config(format!("{}: {}", path.display(), e)))?
        };
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Parse YAML text after environment interpolation
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let expanded = interpolate_env(raw);
        if expanded.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(RevgraphError::Config(msg));
        if !(0.0..=1.0).contains(&self.bbr.damping) {
            return bad(format!("bbr.damping must be within [0, 1], got {}", self.bbr.damping));
        }
        if self.bbr.write_batch_size == 0 {
            return bad("bbr.write_batch_size must be positive".to_string());
        }
        if self.extraction.plt_entry_size == 0 {
            return bad("extraction.plt_entry_size must be positive".to_string());
        }
        if self.extraction.min_string_length == 0 {
            return bad("extraction.min_string_length must be positive".to_string());
        }
        Ok(())
    }
}

/// Replace `${VAR}` and `${VAR:default}` with environment values.
///
/// An unset variable without a default expands to the empty string.
pub fn interpolate_env(value: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(value, |caps: &Captures<'_>| {
            std::env::var(&caps[1])
                .ok()
                .or_else(|| caps.get(2).map(|d| d.as_str().to_string()))
                .unwrap_or_default()
        })
        .into_owned()
}

/// Directories searched for configuration files, in order
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd);
    }
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config").join("revgraph"));
        paths.push(home);
    }
    paths
}

/// Locate a configuration file, returning the first found or None
pub fn find_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        warn!(path = %path.display(), "configuration file not found, using defaults");
        return None;
    }
    find_in(&search_paths())
}

fn find_in(dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}
