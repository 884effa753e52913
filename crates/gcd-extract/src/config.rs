//! Extraction run configuration

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use gcd_core::ParquetCompression;
use serde::Deserialize;

use crate::schema::SchemaProfile;

/// Which encoding the run produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Search index directory (optionally archived afterwards)
    Index,
    /// Snapshot-partitioned Parquet files
    Parquet,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "index" | "flamdex" => Ok(Self::Index),
            "parquet" => Ok(Self::Parquet),
            other => Err(format!("unknown output format '{other}' (expected index or parquet)")),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index => f.write_str("index"),
            Self::Parquet => f.write_str("parquet"),
        }
    }
}

/// Database engine behind the GCD dump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    Mysql,
    Sqlite,
    Duckdb,
}

/// Connection settings for the GCD source database
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub kind: DatabaseKind,
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub password: Option<String>,
    /// MySQL database name
    pub name: String,
    /// Dump file for sqlite / duckdb
    pub path: Option<PathBuf>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            kind: DatabaseKind::Mysql,
            host: "localhost".to_string(),
            port: 3306,
            user: "gcd".to_string(),
            password: None,
            name: "gcd".to_string(),
            path: None,
        }
    }
}

impl DatabaseConfig {
    /// Short description safe for logs (no password)
    pub fn describe(&self) -> String {
        match self.kind {
            DatabaseKind::Mysql => format!("mysql://{}@{}:{}/{}", self.user, self.host, self.port, self.name),
            DatabaseKind::Sqlite | DatabaseKind::Duckdb => format!(
                "{:?} file {}",
                self.kind,
                self.path.as_ref().map(|p| p.display().to_string()).unwrap_or_default()
            ),
        }
    }
}

/// Search-index writer tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Documents between buffered-progress log lines
    pub doc_buffer_size: usize,
    /// Documents between durable commits; the memory budget sizes segments
    pub commit_interval: usize,
    /// Segments per level before they are merged
    pub merge_factor: usize,
    /// Writer heap, bytes
    pub memory_budget_bytes: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            doc_buffer_size: 2000,
            commit_interval: 1_000_000,
            merge_factor: 1000,
            memory_budget_bytes: 50_000_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionKind {
    Snappy,
    Zstd,
}

/// Partitioned Parquet output tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ParquetConfig {
    /// Documents per partition file before rolling over
    pub rows_per_part: usize,
    pub compression: CompressionKind,
    /// Only used with `compression = "zstd"`
    pub zstd_level: i32,
}

impl Default for ParquetConfig {
    fn default() -> Self {
        Self {
            rows_per_part: 2_000_000,
            compression: CompressionKind::Snappy,
            zstd_level: 3,
        }
    }
}

impl ParquetConfig {
    pub fn codec(&self) -> ParquetCompression {
        match self.compression {
            CompressionKind::Snappy => ParquetCompression::Snappy,
            CompressionKind::Zstd => ParquetCompression::Zstd(self.zstd_level),
        }
    }
}

/// Everything one extraction run needs
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Snapshot date, `YYYY-MM-DD`
    pub snapshot_date: String,
    /// Output name: index directory / parquet dataset directory
    pub name: String,
    pub output_dir: PathBuf,
    pub format: OutputFormat,
    pub database: DatabaseConfig,
    pub schema: SchemaProfile,
    pub index: IndexConfig,
    pub parquet: ParquetConfig,
    /// Log a progress line every N documents
    pub log_interval: usize,
    /// Package the index directory into `{name}.sqar` when done
    pub archive: bool,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            snapshot_date: String::new(),
            name: "gcd".to_string(),
            output_dir: PathBuf::from("."),
            format: OutputFormat::Index,
            database: DatabaseConfig::default(),
            schema: SchemaProfile::default(),
            index: IndexConfig::default(),
            parquet: ParquetConfig::default(),
            log_interval: 10_000,
            archive: true,
        }
    }
}

/// Check that an output name is one plain path component.
///
/// Outputs land at `{output_dir}/{name}`, so `""`, `.`, `..` or anything
/// with a separator would point outside that directory or at it.
pub fn validate_output_name(name: &str) -> Result<&str, String> {
    let mut components = Path::new(name).components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !single || name.contains(['/', '\\']) {
        return Err(format!(
            "invalid output name '{name}' (expected a single directory name)"
        ));
    }
    Ok(name)
}

/// Deserialize a string that may be an environment reference like `${VAR}`
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand `${VAR}` to the variable's value; other strings pass through
pub fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}
