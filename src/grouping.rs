// Grouper
// Per-category mean of a numeric field, feeding the region bar chart

use crate::error::{DashboardError, Result};
use crate::record::Record;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub key: String,
    pub mean_value: f64,
    pub count: usize,
}

/// Group records by `key_of` and average `value_of` inside each group
///
/// Output is sorted by `mean_value` descending. The sort is stable, so ties
/// keep the order in which their groups were first seen.
pub fn group_mean_by<K, V>(records: &[Record], key_of: K, value_of: V) -> Result<Vec<GroupSummary>>
where
    K: Fn(&Record) -> &str,
    V: Fn(&Record) -> f64,
{
    if records.is_empty() {
        return Err(DashboardError::EmptyDataset);
    }

    // (key, sum, count) in first-seen order
    let mut groups: Vec<(String, f64, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in records {
        let key = key_of(record);
        let slot = match index.get(key) {
            Some(&i) => i,
            None => {
                index.insert(key.to_string(), groups.len());
                groups.push((key.to_string(), 0.0, 0));
                groups.len() - 1
            }
        };
        groups[slot].1 += value_of(record);
        groups[slot].2 += 1;
    }

    let mut result: Vec<GroupSummary> = groups
        .into_iter()
        .map(|(key, sum, count)| GroupSummary {
            key,
            mean_value: sum / count as f64,
            count,
        })
        .collect();

    // total_cmp keeps the order total when a group mean is NaN
    result.sort_by(|a, b| b.mean_value.total_cmp(&a.mean_value));

    tracing::debug!("Grouped {} records into {} groups", records.len(), result.len());

    Ok(result)
}

/// Mean charges per region, highest first
pub fn group_by_region(records: &[Record]) -> Result<Vec<GroupSummary>> {
    group_mean_by(records, |r| r.region.as_str(), |r| r.charges)
}
