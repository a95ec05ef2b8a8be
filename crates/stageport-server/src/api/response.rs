//! Response bodies

use serde::{Deserialize, Serialize};

use crate::import::SubmittedBatch;

/// `200` body of a submitted batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartImportResponse {
    pub run_id: String,
    /// Batch key, e.g. `batch2`
    pub batch: String,
    pub import_id: String,
    pub import_ids: Vec<String>,
    pub files: Vec<String>,
}

impl From<SubmittedBatch> for StartImportResponse {
    fn from(submitted: SubmittedBatch) -> Self {
        Self {
            run_id: submitted.run_id,
            batch: submitted.batch_key,
            import_id: submitted.import_id,
            import_ids: submitted.import_ids,
            files: submitted.files,
        }
    }
}

/// `202` body while files are missing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

/// Body of every 4xx/5xx response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_start_import_shape() {
        let body = StartImportResponse::from(SubmittedBatch {
            run_id: "2025-05-22".to_string(),
            batch_key: "batch1".to_string(),
            import_id: "42".to_string(),
            import_ids: vec!["42".to_string()],
            files: vec!["test0____2025-05-22.txt".to_string()],
        });

        assert_eq!(
            serde_json::to_value(body).unwrap(),
            json!({
                "runId": "2025-05-22",
                "batch": "batch1",
                "importId": "42",
                "importIds": ["42"],
                "files": ["test0____2025-05-22.txt"]
            })
        );
    }
}
