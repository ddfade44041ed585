// Binner
// Fixed age bands with mean charges per band, feeding the area chart
//
// Bin i spans [t[i], t[i+1]); the last bin also includes its upper bound.
// Ages outside [t[0], t[last]] (and NaN ages) fall into no bin.

use crate::error::{DashboardError, Result};
use crate::record::Record;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    pub lower_bound: f64,
    pub upper_bound: f64,
    /// Mean charges of the bin; 0 when the bin is empty
    pub mean_value: f64,
    pub count: usize,
}

impl Bin {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Axis label such as "18-25"
    pub fn label(&self) -> String {
        format!("{}-{}", self.lower_bound, self.upper_bound)
    }
}

/// Bins plus the number of records that landed in none of them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeBinning {
    pub bins: Vec<Bin>,
    pub excluded: usize,
}

impl AgeBinning {
    pub fn binned_count(&self) -> usize {
        self.bins.iter().map(|b| b.count).sum()
    }
}

fn validate_thresholds(thresholds: &[f64]) -> Result<()> {
    if thresholds.len() < 2 {
        return Err(DashboardError::InvalidThresholds(format!(
            "need at least 2 boundaries, got {}",
            thresholds.len()
        )));
    }

    if thresholds.iter().any(|t| !t.is_finite()) {
        return Err(DashboardError::InvalidThresholds(
            "boundaries must be finite".to_string(),
        ));
    }

    if thresholds.windows(2).any(|w| w[0] >= w[1]) {
        return Err(DashboardError::InvalidThresholds(
            "boundaries must be strictly increasing".to_string(),
        ));
    }

    Ok(())
}

/// Index of the bin holding `value`, if any
fn bin_index(thresholds: &[f64], value: f64) -> Option<usize> {
    let last = thresholds.len() - 1;

    if value.is_nan() || value < thresholds[0] || value > thresholds[last] {
        return None;
    }
    if value == thresholds[last] {
        return Some(last - 1);
    }

    // First boundary strictly above value, minus one
    let upper = thresholds.partition_point(|t| *t <= value);
    Some(upper - 1)
}

/// Partition records into `thresholds.len() - 1` bins by `key_of`, averaging `value_of`
pub fn bin_mean_by<K, V>(
    records: &[Record],
    thresholds: &[f64],
    key_of: K,
    value_of: V,
) -> Result<AgeBinning>
where
    K: Fn(&Record) -> f64,
    V: Fn(&Record) -> f64,
{
    validate_thresholds(thresholds)?;

    let mut sums = vec![0.0; thresholds.len() - 1];
    let mut counts = vec![0usize; thresholds.len() - 1];
    let mut excluded = 0;

    for record in records {
        match bin_index(thresholds, key_of(record)) {
            Some(i) => {
                sums[i] += value_of(record);
                counts[i] += 1;
            }
            None => excluded += 1,
        }
    }

    let bins = thresholds
        .windows(2)
        .zip(sums.into_iter().zip(counts))
        .map(|(bounds, (sum, count))| Bin {
            lower_bound: bounds[0],
            upper_bound: bounds[1],
            mean_value: if count == 0 { 0.0 } else { sum / count as f64 },
            count,
        })
        .collect();

    Ok(AgeBinning { bins, excluded })
}

/// Mean charges per age band
pub fn bin_by_age(records: &[Record], thresholds: &[f64]) -> Result<AgeBinning> {
    let binning = bin_mean_by(records, thresholds, |r| r.age, |r| r.charges)?;

    tracing::debug!(
        "Binned {} records into {} age bands ({} excluded)",
        binning.binned_count(),
        binning.bins.len(),
        binning.excluded
    );

    Ok(binning)
}
