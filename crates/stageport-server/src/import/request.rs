//! Import-job descriptors
//!
//! A descriptor is the JSON `importRequest` part of a bulk-import submission:
//! a job name plus, per file, its format and column mappings.

use serde::Serialize;

use super::config::SubmissionMode;
use super::discovery::RUN_DELIMITER;
use super::error::{ImportError, ImportResult};
use super::schema::{ColumnMapping, SchemaRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileFormat {
    /// Delimited text
    Csv,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileImportPage {
    pub has_header: bool,
    pub column_mappings: Vec<ColumnMapping>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileImportSpec {
    pub file_name: String,
    pub file_format: FileFormat,
    pub file_import_page: FileImportPage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportJobDescriptor {
    pub name: String,
    pub files: Vec<FileImportSpec>,
}

impl ImportJobDescriptor {
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.file_name.as_str())
    }
}

/// Source type of a staged file name: everything before the first delimiter
pub fn source_type_of(file_name: &str) -> &str {
    file_name
        .split_once(RUN_DELIMITER)
        .map_or(file_name, |(source_type, _)| source_type)
}

pub struct ImportRequestBuilder<'a> {
    schemas: &'a SchemaRegistry,
}

impl<'a> ImportRequestBuilder<'a> {
    pub fn new(schemas: &'a SchemaRegistry) -> Self {
        Self { schemas }
    }

    /// Build the descriptors for a batch's files
    ///
    /// Combined mode yields one descriptor for all files, per-file mode one
    /// descriptor per file in the given order. No files, no descriptors.
    pub fn build(
        &self,
        run_id: &str,
        batch_num: u32,
        files: &[String],
        mode: SubmissionMode,
    ) -> ImportResult<Vec<ImportJobDescriptor>> {
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let specs = files
            .iter()
            .map(|file| self.file_spec(file))
            .collect::<ImportResult<Vec<_>>>()?;

        let descriptors = match mode {
            SubmissionMode::Combined => vec![ImportJobDescriptor {
                name: format!("Import {} - batch{}", run_id, batch_num),
                files: specs,
            }],
            SubmissionMode::PerFile => specs
                .into_iter()
                .map(|spec| ImportJobDescriptor {
                    name: format!("Import {} - batch{} - {}", run_id, batch_num, spec.file_name),
                    files: vec![spec],
                })
                .collect(),
        };

        Ok(descriptors)
    }

    fn file_spec(&self, file_name: &str) -> ImportResult<FileImportSpec> {
        let source_type = source_type_of(file_name);
        let mappings = self.schemas.get(source_type).map_err(|_| {
            ImportError::UnknownSourceType {
                source_type: source_type.to_string(),
                file_name: Some(file_name.to_string()),
            }
        })?;

        Ok(FileImportSpec {
            file_name: file_name.to_string(),
            file_format: FileFormat::Csv,
            file_import_page: FileImportPage {
                has_header: true,
                column_mappings: mappings.to_vec(),
            },
        })
    }
}
