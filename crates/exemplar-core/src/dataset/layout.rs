//! On-disk layout of a category directory.
//!
//! ```text
//! <category>/
//!   class_mapping.json
//!   2.support-set/shot_<N>/<class>/<image>
//!   6.preprocessed/<class>/<image>
//!   7.results/<model>/shot_<N>/threshold_<T>/predictions.csv
//!   7.results/<model>/summary.csv
//! ```

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const SUPPORT_DIR: &str = "2.support-set";
pub const QUERY_DIR: &str = "6.preprocessed";
pub const RESULTS_DIR: &str = "7.results";
pub const MAPPING_FILE: &str = "class_mapping.json";

const POOL_PREFIX: &str = "shot_";

/// Paths for one category.
#[derive(Debug, Clone)]
pub struct CategoryLayout {
    root: PathBuf,
}

impl CategoryLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Category name (last path component).
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.display().to_string())
    }

    pub fn support_root(&self) -> PathBuf {
        self.root.join(SUPPORT_DIR)
    }

    pub fn query_root(&self) -> PathBuf {
        self.root.join(QUERY_DIR)
    }

    pub fn mapping_path(&self) -> PathBuf {
        self.root.join(MAPPING_FILE)
    }

    pub fn results_root(&self, model: &str) -> PathBuf {
        self.root.join(RESULTS_DIR).join(model)
    }

    pub fn cell_dir(&self, model: &str, shot_count: usize, threshold: f32) -> PathBuf {
        self.results_root(model)
            .join(format!("{POOL_PREFIX}{shot_count}"))
            .join(format!("threshold_{}", threshold_label(threshold)))
    }

    pub fn summary_csv(&self, model: &str) -> PathBuf {
        self.results_root(model).join("summary.csv")
    }

    pub fn summary_json(&self, model: &str) -> PathBuf {
        self.results_root(model).join("summary.json")
    }

    /// Fail fast when the category, support or query directories are missing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (what, path) in [
            ("category", self.root.clone()),
            ("support set", self.support_root()),
            ("query corpus", self.query_root()),
        ] {
            if !path.is_dir() {
                return Err(ConfigError::MissingDirectory { what, path });
            }
        }
        Ok(())
    }

    /// All `shot_<N>` sampling pools, sorted by N.
    pub fn pools(&self) -> Vec<(usize, PathBuf)> {
        let Ok(entries) = std::fs::read_dir(self.support_root()) else {
            return vec![];
        };
        let mut pools: Vec<(usize, PathBuf)> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().into_owned();
                let n = name.strip_prefix(POOL_PREFIX)?.parse::<usize>().ok()?;
                Some((n, e.path()))
            })
            .collect();
        pools.sort_by_key(|(n, _)| *n);
        pools
    }

    /// Pick the sampling pool for shot-count `k`.
    ///
    /// Exact `shot_<k>` first, then the smallest pool larger than `k`, then the
    /// largest pool available (classes sampled from it will be degraded).
    pub fn resolve_pool(&self, k: usize) -> Option<(usize, PathBuf)> {
        let pools = self.pools();
        if let Some(exact) = pools.iter().find(|(n, _)| *n == k) {
            return Some(exact.clone());
        }
        if let Some(larger) = pools.iter().find(|(n, _)| *n > k) {
            return Some(larger.clone());
        }
        pools.last().cloned()
    }
}

/// Directory label for a threshold: shortest round-trip decimal form.
pub fn threshold_label(threshold: f32) -> String {
    format!("{threshold}")
}
