// Aggregator
// Summary metrics shown in the dashboard header

use crate::error::{DashboardError, Result};
use crate::record::Record;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_count: usize,
    pub mean_charge: f64,
    pub mean_bmi: f64,
    /// Share of smokers, 0-100
    pub smoker_percent: f64,
}

impl MetricsSnapshot {
    pub fn summary(&self) -> String {
        format!(
            "Records: {}, Mean charge: {:.2}, Mean BMI: {:.2}, Smokers: {:.1}%",
            self.total_count, self.mean_charge, self.mean_bmi, self.smoker_percent
        )
    }
}

/// Arithmetic mean; NaN values propagate. Caller guarantees `len > 0`.
pub(crate) fn mean<I: Iterator<Item = f64>>(values: I, len: usize) -> f64 {
    values.sum::<f64>() / len as f64
}

/// Compute the header metrics over a non-empty record set
pub fn aggregate(records: &[Record]) -> Result<MetricsSnapshot> {
    if records.is_empty() {
        return Err(DashboardError::EmptyDataset);
    }

    let total_count = records.len();
    let smokers = records.iter().filter(|r| r.is_smoker).count();

    Ok(MetricsSnapshot {
        total_count,
        mean_charge: mean(records.iter().map(|r| r.charges), total_count),
        mean_bmi: mean(records.iter().map(|r| r.bmi), total_count),
        smoker_percent: 100.0 * smokers as f64 / total_count as f64,
    })
}
