//! Pipeline configuration
//!
//! Loaded once from a TOML file with `STAGEPORT_*` environment overrides and
//! validated into an immutable [`ImportConfig`] that is injected into the
//! orchestrator.
//!
//! ```toml
//! submission_mode = "combined"   # or "per_file"
//! completeness = "strict"        # or "lenient"
//!
//! [batches]
//! 1 = ["test0", "test1"]
//!
//! [[schemas.test0]]
//! columnName = "Key_Number"
//! columnObjectTypeId = "0-8"
//! propertyName = "key_number"
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use super::discovery::{StagingLayout, RUN_DELIMITER};
use super::error::{ImportError, ImportResult};
use super::schema::{ColumnMapping, SchemaRegistry};

// ============================================================================
// Pipeline Configuration Constants
// ============================================================================

/// Default object-key prefix of the staging area.
pub const DEFAULT_STAGING_PREFIX: &str = "uploads/";

/// Default suffix of staged files.
pub const DEFAULT_FILE_SUFFIX: &str = ".txt";

/// Default bulk-import endpoint.
pub const DEFAULT_IMPORT_ENDPOINT: &str = "https://api.hubapi.com/crm/v3/imports/files";

/// Default transport timeout in seconds.
pub const DEFAULT_TRANSPORT_TIMEOUT_SECS: u64 = 300;

/// Environment variable holding the bulk-import bearer token.
pub const API_KEY_ENV: &str = "HUBSPOT_API_KEY";

/// How a batch's files are turned into bulk-import jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionMode {
    /// One job referencing every file of the batch
    Combined,
    /// One job per file, submitted in order, stopping at the first failure
    PerFile,
}

/// What to do when some source types have no staged files yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletenessPolicy {
    /// Wait until every source type has at least one file
    Strict,
    /// Proceed with whatever was found
    Lenient,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Never read from the file; see [`API_KEY_ENV`]
    #[serde(skip)]
    pub api_key: Option<String>,
}

fn default_endpoint() -> String {
    DEFAULT_IMPORT_ENDPOINT.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TRANSPORT_TIMEOUT_SECS
}

fn default_staging_prefix() -> String {
    DEFAULT_STAGING_PREFIX.to_string()
}

fn default_file_suffix() -> String {
    DEFAULT_FILE_SUFFIX.to_string()
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            api_key: None,
        }
    }
}

/// Raw shape of the pipeline file, before validation
#[derive(Debug, Deserialize)]
struct PipelineFile {
    #[serde(default = "default_staging_prefix")]
    staging_prefix: String,
    #[serde(default = "default_file_suffix")]
    file_suffix: String,
    submission_mode: SubmissionMode,
    completeness: CompletenessPolicy,
    #[serde(default)]
    record_failures: bool,
    #[serde(default)]
    transport: TransportConfig,
    batches: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    schemas: BTreeMap<String, Vec<ColumnMapping>>,
}

/// Batch number -> ordered source types
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchCatalog {
    batches: BTreeMap<u32, Vec<String>>,
}

impl BatchCatalog {
    pub fn new(batches: BTreeMap<u32, Vec<String>>) -> ImportResult<Self> {
        for (batch_num, source_types) in &batches {
            if source_types.is_empty() {
                return Err(ImportError::config(format!(
                    "batch {} has no source types",
                    batch_num
                )));
            }

            let mut seen = BTreeSet::new();
            for source_type in source_types {
                if source_type.is_empty() || source_type.contains(RUN_DELIMITER) {
                    return Err(ImportError::config(format!(
                        "batch {}: invalid source type '{}'",
                        batch_num, source_type
                    )));
                }
                if !seen.insert(source_type.as_str()) {
                    return Err(ImportError::config(format!(
                        "batch {} lists source type '{}' twice",
                        batch_num, source_type
                    )));
                }
            }
        }

        Ok(Self { batches })
    }

    /// Source types of a batch, in configured order
    pub fn source_types(&self, batch_num: u32) -> ImportResult<&[String]> {
        self.batches
            .get(&batch_num)
            .map(Vec::as_slice)
            .ok_or(ImportError::UnknownBatch(batch_num))
    }

    pub fn contains(&self, batch_num: u32) -> bool {
        self.batches.contains_key(&batch_num)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &[String])> {
        self.batches.iter().map(|(n, types)| (*n, types.as_slice()))
    }
}

/// Validated, immutable pipeline configuration
#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub staging: StagingLayout,
    pub submission_mode: SubmissionMode,
    pub completeness: CompletenessPolicy,
    /// Mark a batch `failed` when submission fails instead of leaving it `pending`
    pub record_failures: bool,
    pub transport: TransportConfig,
    pub batches: BatchCatalog,
    pub schemas: SchemaRegistry,
}

impl ImportConfig {
    /// Load from a TOML file, then `STAGEPORT_*` overrides, then the API key
    ///
    /// Nested keys use a double underscore, e.g. `STAGEPORT_TRANSPORT__ENDPOINT`.
    pub fn load(path: impl AsRef<Path>) -> ImportResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ImportError::config(format!(
                "pipeline configuration '{}' not found",
                path.display()
            )));
        }

        let figment = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("STAGEPORT_").split("__"));

        let mut config = Self::from_figment(figment)?;
        config.transport.api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());
        Ok(config)
    }

    /// Parse a TOML document without consulting the environment
    pub fn from_toml_str(toml: &str) -> ImportResult<Self> {
        Self::from_figment(Figment::from(Toml::string(toml)))
    }

    fn from_figment(figment: Figment) -> ImportResult<Self> {
        let raw: PipelineFile = figment
            .extract()
            .map_err(|e| ImportError::config(e.to_string()))?;
        Self::validate(raw)
    }

    fn validate(raw: PipelineFile) -> ImportResult<Self> {
        if raw.file_suffix.is_empty() {
            return Err(ImportError::config("file_suffix must not be empty"));
        }

        let mut batches = BTreeMap::new();
        for (key, source_types) in raw.batches {
            let batch_num: u32 = key
                .trim()
                .parse()
                .map_err(|_| ImportError::config(format!("batch key '{}' is not a number", key)))?;
            batches.insert(batch_num, source_types);
        }
        if batches.is_empty() {
            return Err(ImportError::config("no batches configured"));
        }

        let batches = BatchCatalog::new(batches)?;
        let schemas = SchemaRegistry::new(raw.schemas)?;

        for (batch_num, source_types) in batches.iter() {
            for source_type in source_types {
                if !schemas.contains(source_type) {
                    return Err(ImportError::config(format!(
                        "batch {} references source type '{}' without a schema",
                        batch_num, source_type
                    )));
                }
            }
        }

        if raw.transport.timeout_secs == 0 {
            return Err(ImportError::config("transport.timeout_secs must be greater than 0"));
        }

        Ok(Self {
            staging: StagingLayout::new(raw.staging_prefix, raw.file_suffix),
            submission_mode: raw.submission_mode,
            completeness: raw.completeness,
            record_failures: raw.record_failures,
            transport: raw.transport,
            batches,
            schemas,
        })
    }
}
