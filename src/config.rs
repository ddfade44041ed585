// Compiled-in dashboard settings
// The dataset lives at a fixed, well-known location; nothing here is read from env or flags

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default dataset location, relative to the working directory
pub const DEFAULT_DATASET_PATH: &str = "data/insurance.csv";

/// Default HTTP bind address for the web dashboard
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Directory holding the web dashboard's static assets
pub const DEFAULT_WEB_DIR: &str = "web";

/// Age band boundaries for the area chart
pub const AGE_THRESHOLDS: [f64; 6] = [18.0, 25.0, 35.0, 45.0, 55.0, 65.0];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub dataset_path: PathBuf,
    pub bind_addr: String,
    pub web_dir: PathBuf,
    pub age_thresholds: Vec<f64>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            dataset_path: PathBuf::from(DEFAULT_DATASET_PATH),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            web_dir: PathBuf::from(DEFAULT_WEB_DIR),
            age_thresholds: AGE_THRESHOLDS.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DashboardConfig::default();

        assert_eq!(config.dataset_path, PathBuf::from("data/insurance.csv"));
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.age_thresholds, vec![18.0, 25.0, 35.0, 45.0, 55.0, 65.0]);
    }
}
