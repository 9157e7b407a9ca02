//! Per-cell artifact writing: `predictions.csv` and optional `vis/` copies.

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::PersistenceError;
use crate::types::{PredictionRecord, QueryImage};

pub const PREDICTIONS_FILE: &str = "predictions.csv";
pub const VIS_DIR: &str = "vis";

const TMP_SUFFIX: &str = ".tmp";

const PREDICTION_COLUMNS: [&str; 7] = [
    "image_id",
    "true_class",
    "predicted_class",
    "is_unknown",
    "best_score",
    "per_class_scores",
    "error",
];

/// Format a score with six decimals; NaN (failed records) becomes empty.
pub fn format_score(score: f32) -> String {
    if score.is_finite() {
        format!("{score:.6}")
    } else {
        String::new()
    }
}

/// Format an optional ratio with six decimals.
pub fn format_ratio(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.6}")).unwrap_or_default()
}

/// Encode per-class scores as a JSON object with six-decimal values.
///
/// Keys come out in sorted order, so identical scores always produce
/// identical text.
pub fn scores_json(record: &PredictionRecord) -> String {
    let body: Vec<String> = record
        .scores
        .iter()
        .map(|(class, score)| {
            let key = serde_json::Value::String(class.clone()).to_string();
            format!("{key}:{score:.6}")
        })
        .collect();
    format!("{{{}}}", body.join(","))
}

/// Streams prediction records for one cell to disk.
///
/// Rows go to `predictions.csv.tmp`, renamed into place by [`finish`]. A writer
/// dropped before `finish` removes the temporary file, so an interrupted cell
/// never leaves a `predictions.csv` behind.
///
/// [`finish`]: PredictionWriter::finish
pub struct PredictionWriter {
    cell_dir: PathBuf,
    path: PathBuf,
    tmp_path: PathBuf,
    writer: Option<csv::Writer<File>>,
    visualize: bool,
    rows: usize,
}

impl PredictionWriter {
    /// Create the cell directory and open the temporary table with its header.
    pub fn create(cell_dir: &Path, visualize: bool) -> Result<Self, PersistenceError> {
        std::fs::create_dir_all(cell_dir).map_err(|source| PersistenceError::Write {
            path: cell_dir.to_path_buf(),
            source,
        })?;

        let path = cell_dir.join(PREDICTIONS_FILE);
        let tmp_path = cell_dir.join(format!("{PREDICTIONS_FILE}{TMP_SUFFIX}"));
        let mut writer =
            csv::Writer::from_path(&tmp_path).map_err(|source| PersistenceError::Csv {
                path: tmp_path.clone(),
                source,
            })?;
        let header = writer.write_record(PREDICTION_COLUMNS);

        let this = Self {
            cell_dir: cell_dir.to_path_buf(),
            path,
            tmp_path,
            writer: Some(writer),
            visualize,
            rows: 0,
        };
        header.map_err(|source| PersistenceError::Csv {
            path: this.tmp_path.clone(),
            source,
        })?;
        Ok(this)
    }

    /// Append one record, copying the query image under `vis/` when enabled.
    pub fn write(
        &mut self,
        query: &QueryImage,
        record: &PredictionRecord,
    ) -> Result<(), PersistenceError> {
        let row = [
            record.image_id.clone(),
            record.true_class.clone().unwrap_or_default(),
            record.predicted_class.clone(),
            record.is_unknown.to_string(),
            format_score(record.best_score),
            scores_json(record),
            record.error.clone().unwrap_or_default(),
        ];
        let Some(writer) = self.writer.as_mut() else {
            return Err(self.closed_error());
        };
        writer
            .write_record(&row)
            .map_err(|source| PersistenceError::Csv {
                path: self.tmp_path.clone(),
                source,
            })?;
        self.rows += 1;

        if self.visualize && record.is_valid() {
            self.copy_to_vis(query, &record.predicted_class)?;
        }
        Ok(())
    }

    fn copy_to_vis(&self, query: &QueryImage, predicted: &str) -> Result<(), PersistenceError> {
        let dir = self.cell_dir.join(VIS_DIR).join(predicted);
        std::fs::create_dir_all(&dir).map_err(|source| PersistenceError::Write {
            path: dir.clone(),
            source,
        })?;

        // Flatten the id so images from different folders cannot collide.
        let target = dir.join(query.image_id.replace('/', "__"));
        std::fs::copy(&query.path, &target).map_err(|source| PersistenceError::Write {
            path: target,
            source,
        })?;
        Ok(())
    }

    /// Flush, close and move the table to `predictions.csv`, returning its path.
    pub fn finish(mut self) -> Result<PathBuf, PersistenceError> {
        let Some(mut writer) = self.writer.take() else {
            return Err(self.closed_error());
        };
        writer.flush().map_err(|source| PersistenceError::Write {
            path: self.tmp_path.clone(),
            source,
        })?;
        drop(writer);

        std::fs::rename(&self.tmp_path, &self.path).map_err(|source| {
            PersistenceError::Write {
                path: self.path.clone(),
                source,
            }
        })?;
        tracing::debug!("Wrote {} prediction(s) to {:?}", self.rows, self.path);
        Ok(self.path.clone())
    }

    fn closed_error(&self) -> PersistenceError {
        PersistenceError::Write {
            path: self.tmp_path.clone(),
            source: std::io::Error::other("prediction table already closed"),
        }
    }
}

impl Drop for PredictionWriter {
    fn drop(&mut self) {
        // Close the file before removing it.
        drop(self.writer.take());
        if self.tmp_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.tmp_path) {
                tracing::warn!("Could not remove {:?}: {e}", self.tmp_path);
            } else {
                tracing::debug!("Removed unfinished {:?}", self.tmp_path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn record(id: &str, predicted: &str) -> PredictionRecord {
        let mut scores = BTreeMap::new();
        scores.insert("wren".to_string(), 0.25f32);
        scores.insert("finch".to_string(), 0.8123456f32);
        PredictionRecord {
            image_id: id.into(),
            true_class: Some("finch".into()),
            reported_class: Some("finch".into()),
            predicted_class: predicted.into(),
            best_class: Some("finch".into()),
            best_score: 0.8123456,
            scores,
            is_unknown: false,
            error: None,
        }
    }

    fn query(dir: &Path, id: &str) -> QueryImage {
        let path = dir.join(id.replace('/', "_"));
        std::fs::write(&path, b"bytes").unwrap();
        QueryImage {
            image_id: id.into(),
            path,
            true_class: Some("finch".into()),
        }
    }

    #[test]
    fn test_scores_json_sorted_six_decimals() {
        let json = scores_json(&record("a", "finch"));
        assert_eq!(json, r#"{"finch":0.812346,"wren":0.250000}"#);
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(parsed["wren"].is_number());
    }

    #[test]
    fn test_format_score_nan_is_empty() {
        assert_eq!(format_score(f32::NAN), "");
        assert_eq!(format_score(1.0), "1.000000");
    }

    #[test]
    fn test_writer_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let cell = dir.path().join("shot_1/threshold_0.5");
        let q = query(dir.path(), "finch/a.png");

        let mut writer = PredictionWriter::create(&cell, false).unwrap();
        writer.write(&q, &record("finch/a.png", "finch")).unwrap();
        let mut failed = PredictionRecord::failed(&q, "decode failed".into(), true);
        failed.image_id = "finch/b.png".into();
        writer.write(&q, &failed).unwrap();
        let path = writer.finish().unwrap();

        let content = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            "image_id,true_class,predicted_class,is_unknown,best_score,per_class_scores,error"
        );
        assert!(lines[1].starts_with("finch/a.png,finch,finch,false,0.812346,"));
        assert!(lines[2].ends_with(",unknown,false,,{},decode failed"));
        assert!(!cell.join(VIS_DIR).exists());
    }

    #[test]
    fn test_visualize_copies_by_predicted_class() {
        let dir = tempfile::tempdir().unwrap();
        let cell = dir.path().join("cell");
        let q = query(dir.path(), "finch/a.png");

        let mut writer = PredictionWriter::create(&cell, true).unwrap();
        writer.write(&q, &record("finch/a.png", "wren")).unwrap();
        writer.finish().unwrap();

        assert!(cell.join("vis/wren/finch__a.png").exists());
    }

    #[test]
    fn test_failed_write_leaves_no_table() {
        let dir = tempfile::tempdir().unwrap();
        let cell = dir.path().join("cell");
        let q = query(dir.path(), "finch/a.png");
        let gone = QueryImage {
            path: dir.path().join("deleted.png"),
            ..q.clone()
        };

        let mut writer = PredictionWriter::create(&cell, true).unwrap();
        writer.write(&q, &record("finch/a.png", "finch")).unwrap();
        assert!(cell.join("predictions.csv.tmp").exists());
        let err = writer.write(&gone, &record("finch/b.png", "finch")).unwrap_err();
        assert!(matches!(err, PersistenceError::Write { .. }));
        drop(writer);

        assert!(!cell.join(PREDICTIONS_FILE).exists());
        assert!(!cell.join("predictions.csv.tmp").exists());
    }

    #[test]
    fn test_finish_renames_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let cell = dir.path().join("cell");
        let q = query(dir.path(), "finch/a.png");

        let mut writer = PredictionWriter::create(&cell, false).unwrap();
        writer.write(&q, &record("finch/a.png", "finch")).unwrap();
        let path = writer.finish().unwrap();

        assert_eq!(path, cell.join(PREDICTIONS_FILE));
        assert!(path.exists());
        assert!(!cell.join("predictions.csv.tmp").exists());
    }
}
