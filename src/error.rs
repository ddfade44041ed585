// Error taxonomy for the dashboard pipeline
// Load-time failures abort a refresh; field-level parse failures never land here

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DashboardError {
    /// The dataset could not be fetched or its table could not be read
    #[error("Failed to load dataset `{source_name}`: {message}")]
    DatasetLoad {
        source_name: String,
        message: String,
    },

    /// The dataset loaded but holds no records, so every mean is undefined
    #[error("Dataset contains no records")]
    EmptyDataset,

    #[error("Invalid bin thresholds: {0}")]
    InvalidThresholds(String),
}

impl DashboardError {
    pub fn dataset_load(source_name: impl Into<String>, message: impl ToString) -> Self {
        DashboardError::DatasetLoad {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }

    /// Short machine-readable code, used by the HTTP API
    pub fn code(&self) -> &'static str {
        match self {
            DashboardError::DatasetLoad { .. } => "dataset_load",
            DashboardError::EmptyDataset => "empty_dataset",
            DashboardError::InvalidThresholds(_) => "invalid_thresholds",
        }
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;
