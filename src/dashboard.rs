// Snapshot & Controller
// load -> compute -> hand off to presentation
//
// A DatasetSnapshot is immutable once built. Every refresh builds a new one
// and derives a fresh DashboardView from it; a failed refresh keeps the old view.

use crate::binning::{bin_by_age, AgeBinning};
use crate::config::DashboardConfig;
use crate::error::{DashboardError, Result};
use crate::grouping::{group_by_region, GroupSummary};
use crate::loader::{load_rows_from_reader, DatasetSource};
use crate::metrics::{aggregate, MetricsSnapshot};
use crate::record::{parse_rows_with_warnings, FieldWarning, Record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// The loaded dataset, as of one fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSnapshot {
    /// Identity of this load (changes on every refresh)
    pub id: String,
    pub source_name: String,
    pub loaded_at: DateTime<Utc>,
    /// SHA-256 of the source text (same data -> same fingerprint)
    pub fingerprint: String,
    pub records: Vec<Record>,
    pub warnings: Vec<FieldWarning>,
}

impl DatasetSnapshot {
    /// Parse dataset text into a snapshot
    pub fn from_text(source_name: &str, text: &str) -> Result<Self> {
        let rows = load_rows_from_reader(text.as_bytes(), source_name)?;
        let parsed = parse_rows_with_warnings(&rows);

        let snapshot = DatasetSnapshot {
            id: uuid::Uuid::new_v4().to_string(),
            source_name: source_name.to_string(),
            loaded_at: Utc::now(),
            fingerprint: compute_fingerprint(text),
            records: parsed.records,
            warnings: parsed.warnings,
        };

        let short_fingerprint = &snapshot.fingerprint[..12];
        tracing::info!(
            source = %snapshot.source_name,
            records = snapshot.records.len(),
            warnings = snapshot.warnings.len(),
            fingerprint = %short_fingerprint,
            "Loaded dataset"
        );

        Ok(snapshot)
    }

    /// Fetch from a source and parse
    pub fn load(source: &dyn DatasetSource) -> Result<Self> {
        let text = source.fetch()?;
        Self::from_text(&source.name(), &text)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn compute_fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Everything a presentation layer draws
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardView {
    pub snapshot: Arc<DatasetSnapshot>,
    pub metrics: MetricsSnapshot,
    pub groups: Vec<GroupSummary>,
    pub age_bins: AgeBinning,
}

impl DashboardView {
    /// Derive every table from a snapshot. Pure: same snapshot, same tables.
    pub fn compute(snapshot: Arc<DatasetSnapshot>, thresholds: &[f64]) -> Result<Self> {
        if snapshot.is_empty() {
            return Err(DashboardError::EmptyDataset);
        }

        let metrics = aggregate(&snapshot.records)?;
        let groups = group_by_region(&snapshot.records)?;
        let age_bins = bin_by_age(&snapshot.records, thresholds)?;

        Ok(DashboardView {
            snapshot,
            metrics,
            groups,
            age_bins,
        })
    }

    pub fn records(&self) -> &[Record] {
        &self.snapshot.records
    }

    /// Records belonging to one region, in dataset order
    pub fn records_in_region<'a>(&'a self, region: &'a str) -> impl Iterator<Item = &'a Record> + 'a {
        self.snapshot.records.iter().filter(move |r| r.region == region)
    }
}

/// Owns the current view and sequences refreshes
pub struct Dashboard {
    config: DashboardConfig,
    view: Option<Arc<DashboardView>>,
    refresh_count: u64,
}

impl Dashboard {
    pub fn new(config: DashboardConfig) -> Self {
        Dashboard {
            config,
            view: None,
            refresh_count: 0,
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Current view, if any refresh has succeeded yet
    pub fn view(&self) -> Option<&Arc<DashboardView>> {
        self.view.as_ref()
    }

    /// Number of successful refreshes
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count
    }

    /// Run the full pipeline against `source`
    ///
    /// On failure the previous view is left as it was.
    pub fn refresh(&mut self, source: &dyn DatasetSource) -> Result<Arc<DashboardView>> {
        match build_view(source, &self.config.age_thresholds) {
            Ok(view) => Ok(self.install(view)),
            Err(e) => {
                tracing::error!("Refresh from {} failed: {}", source.name(), e);
                Err(e)
            }
        }
    }

    /// Make a view built elsewhere (see `build_view`) the current one
    pub fn install(&mut self, view: DashboardView) -> Arc<DashboardView> {
        let view = Arc::new(view);
        self.view = Some(Arc::clone(&view));
        self.refresh_count += 1;
        view
    }
}

/// Fetch, parse and derive, without touching any shared state
pub fn build_view(source: &dyn DatasetSource, thresholds: &[f64]) -> Result<DashboardView> {
    let snapshot = DatasetSnapshot::load(source)?;
    DashboardView::compute(Arc::new(snapshot), thresholds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AGE_THRESHOLDS;
    use crate::loader::InMemorySource;

    const HEADER: &str = "age,sex,bmi,children,smoker,region,charges\n";

    fn dataset(rows: &[&str]) -> String {
        let mut text = HEADER.to_string();
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        text
    }

    struct FailingSource;

    impl DatasetSource for FailingSource {
        fn name(&self) -> String {
            "unreachable".to_string()
        }

        fn fetch(&self) -> Result<String> {
            Err(DashboardError::dataset_load("unreachable", "connection refused"))
        }
    }

    #[test]
    fn test_compute_view() {
        let text = dataset(&[
            "22,female,25,0,no,north,2000",
            "40,male,30,2,yes,south,8000",
            "70,male,28,1,no,north,4000",
        ]);
        let snapshot = DatasetSnapshot::from_text("test", &text).unwrap();

        let view = DashboardView::compute(Arc::new(snapshot), &AGE_THRESHOLDS).unwrap();

        assert_eq!(view.metrics.total_count, 3);
        assert_eq!(view.groups[0].key, "south");
        assert_eq!(view.groups[1].key, "north");
        assert_eq!(view.groups[1].mean_value, 3000.0);
        assert_eq!(view.age_bins.excluded, 1);
        assert_eq!(view.records_in_region("north").count(), 2);
    }

    #[test]
    fn test_empty_dataset_is_distinct_error() {
        let snapshot = DatasetSnapshot::from_text("empty", HEADER).unwrap();

        let err = DashboardView::compute(Arc::new(snapshot), &AGE_THRESHOLDS).unwrap_err();

        assert_eq!(err, DashboardError::EmptyDataset);
    }

    #[test]
    fn test_bad_row_keeps_record_count() {
        let text = dataset(&[
            "22,female,abc,0,no,north,2000",
            "40,male,30,2,yes,south,8000",
        ]);
        let snapshot = DatasetSnapshot::from_text("test", &text).unwrap();

        assert_eq!(snapshot.records.len(), 2);
        assert_eq!(snapshot.warnings.len(), 1);

        let view = DashboardView::compute(Arc::new(snapshot), &AGE_THRESHOLDS).unwrap();
        assert_eq!(view.metrics.total_count, 2);
        assert!(view.metrics.mean_bmi.is_nan());
    }

    #[test]
    fn test_compute_is_idempotent() {
        let text = dataset(&[
            "19,female,27.9,0,yes,southwest,16884.924",
            "18,male,33.77,1,no,southeast,1725.5523",
            "28,male,33,3,no,southeast,4449.462",
        ]);
        let snapshot = Arc::new(DatasetSnapshot::from_text("test", &text).unwrap());

        let a = DashboardView::compute(Arc::clone(&snapshot), &AGE_THRESHOLDS).unwrap();
        let b = DashboardView::compute(Arc::clone(&snapshot), &AGE_THRESHOLDS).unwrap();

        assert_eq!(a.metrics, b.metrics);
        assert_eq!(a.groups, b.groups);
        assert_eq!(a.age_bins, b.age_bins);
    }

    #[test]
    fn test_same_text_same_fingerprint() {
        let text = dataset(&["22,female,25,0,no,north,2000"]);

        let a = DatasetSnapshot::from_text("a", &text).unwrap();
        let b = DatasetSnapshot::from_text("b", &text).unwrap();

        assert_eq!(a.fingerprint, b.fingerprint);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_refresh_failure_keeps_previous_view() {
        let mut dashboard = Dashboard::new(DashboardConfig::default());
        let good = InMemorySource::new("good", dataset(&["22,female,25,0,no,north,2000"]));

        let first = dashboard.refresh(&good).unwrap();
        assert_eq!(dashboard.refresh_count(), 1);

        let err = dashboard.refresh(&FailingSource).unwrap_err();
        assert_eq!(err.code(), "dataset_load");

        let current = dashboard.view().unwrap();
        assert!(Arc::ptr_eq(current, &first));
        assert_eq!(dashboard.refresh_count(), 1);
    }

    #[test]
    fn test_refresh_empty_dataset_keeps_previous_view() {
        let mut dashboard = Dashboard::new(DashboardConfig::default());
        let good = InMemorySource::new("good", dataset(&["22,female,25,0,no,north,2000"]));
        let empty = InMemorySource::new("empty", HEADER);

        dashboard.refresh(&good).unwrap();
        let err = dashboard.refresh(&empty).unwrap_err();

        assert_eq!(err, DashboardError::EmptyDataset);
        assert_eq!(dashboard.view().unwrap().metrics.total_count, 1);
    }

    #[test]
    fn test_install_replaces_view() {
        let mut dashboard = Dashboard::new(DashboardConfig::default());
        let source = InMemorySource::new("good", dataset(&["22,female,25,0,no,north,2000"]));
        let view = build_view(&source, &dashboard.config().age_thresholds).unwrap();

        let installed = dashboard.install(view);

        assert!(Arc::ptr_eq(dashboard.view().unwrap(), &installed));
        assert_eq!(dashboard.refresh_count(), 1);
    }

    #[test]
    fn test_no_view_before_first_refresh() {
        let mut dashboard = Dashboard::new(DashboardConfig::default());

        assert!(dashboard.view().is_none());
        assert!(dashboard.refresh(&FailingSource).is_err());
        assert!(dashboard.view().is_none());
    }
}
