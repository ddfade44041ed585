// Insurance Charges Dashboard - Core Library
// Exposes the data pipeline for the TUI, the web server, and tests

pub mod binning;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod grouping;
pub mod loader;
pub mod metrics;
pub mod record;

// Re-export commonly used types
pub use binning::{bin_by_age, bin_mean_by, AgeBinning, Bin};
pub use config::{DashboardConfig, AGE_THRESHOLDS, DEFAULT_DATASET_PATH};
pub use dashboard::{build_view, Dashboard, DashboardView, DatasetSnapshot};
pub use error::{DashboardError, Result};
pub use grouping::{group_by_region, group_mean_by, GroupSummary};
pub use loader::{load_rows, load_rows_from_reader, DatasetSource, FileSource, InMemorySource};
pub use metrics::{aggregate, MetricsSnapshot};
pub use record::{parse_rows, parse_rows_with_warnings, FieldWarning, ParsedRecords, RawRow, Record};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
