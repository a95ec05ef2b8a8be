//! Staged-file discovery
//!
//! Staged files follow `{sourceType}____{runId}[___part{N}].txt` under the
//! staging prefix. Discovery lists the prefix once, assigns every name to the
//! source types whose `{sourceType}____{runId}` it starts with, and reports
//! the source types that have nothing staged yet.

use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::config::BatchCatalog;
use super::error::{ImportError, ImportResult};
use crate::storage::ObjectStore;

/// Separates the source type from the run id in a staged file name.
pub const RUN_DELIMITER: &str = "____";

/// Where staged files live and how they end
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingLayout {
    pub prefix: String,
    pub suffix: String,
}

impl StagingLayout {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    /// Object key of a staged file name
    pub fn object_key(&self, file_name: &str) -> String {
        format!("{}{}", self.prefix, file_name)
    }

    /// File name of an object key; keys outside the prefix are returned as-is
    pub fn file_name<'a>(&self, object_key: &'a str) -> &'a str {
        object_key.strip_prefix(self.prefix.as_str()).unwrap_or(object_key)
    }

    /// Whether `file_name` belongs to `source_type` for `run_id`
    pub fn matches(&self, file_name: &str, source_type: &str, run_id: &str) -> bool {
        file_name
            .strip_prefix(source_type)
            .and_then(|rest| rest.strip_prefix(RUN_DELIMITER))
            .is_some_and(|rest| rest.starts_with(run_id))
            && file_name.ends_with(self.suffix.as_str())
    }
}

/// Outcome of one discovery pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredFiles {
    /// Groups concatenated in configured order; listing order within a group
    pub resolved_files: Vec<String>,
    /// In configured order
    pub missing_source_types: Vec<String>,
}

impl DiscoveredFiles {
    pub fn is_complete(&self) -> bool {
        self.missing_source_types.is_empty()
    }
}

/// Group listed object keys by source type for one run
///
/// Pure function of its inputs; the group of a source type keeps the order in
/// which the keys were listed.
pub fn group_staged_files(
    object_keys: &[String],
    source_types: &[String],
    run_id: &str,
    layout: &StagingLayout,
) -> DiscoveredFiles {
    let mut groups: Vec<Vec<String>> = vec![Vec::new(); source_types.len()];

    for key in object_keys {
        let name = layout.file_name(key);
        for (group, source_type) in groups.iter_mut().zip(source_types) {
            if layout.matches(name, source_type, run_id) {
                group.push(name.to_string());
            }
        }
    }

    let missing_source_types = source_types
        .iter()
        .zip(&groups)
        .filter(|(_, group)| group.is_empty())
        .map(|(source_type, _)| source_type.clone())
        .collect();

    DiscoveredFiles {
        resolved_files: groups.into_iter().flatten().collect(),
        missing_source_types,
    }
}

/// Lists the staging area and evaluates batch completeness
pub struct FileDiscovery {
    store: Arc<dyn ObjectStore>,
    batches: BatchCatalog,
    layout: StagingLayout,
}

impl FileDiscovery {
    pub fn new(store: Arc<dyn ObjectStore>, batches: BatchCatalog, layout: StagingLayout) -> Self {
        Self {
            store,
            batches,
            layout,
        }
    }

    #[instrument(skip(self))]
    pub async fn discover(&self, batch_num: u32, run_id: &str) -> ImportResult<DiscoveredFiles> {
        let source_types = self.batches.source_types(batch_num)?;

        let keys = self
            .store
            .list_objects(&self.layout.prefix)
            .await
            .map_err(ImportError::storage)?;
        debug!(listed = keys.len(), prefix = %self.layout.prefix, "Listed staging area");

        let discovered = group_staged_files(&keys, source_types, run_id, &self.layout);
        info!(
            files = discovered.resolved_files.len(),
            missing = ?discovered.missing_source_types,
            "Discovered batch files"
        );

        Ok(discovered)
    }
}
