//! ONNX Runtime session wrapper for a frozen visual encoder.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ndarray::Array4;
use ort::session::Session;
use ort::value::Value;

use crate::error::ExtractionError;

/// A loaded visual encoder session.
///
/// `Session::run` needs `&mut self`, so the session sits behind a `Mutex`: the
/// backbone is a single non-reentrant resource shared by all embedding workers.
pub struct EncoderSession {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    model_path: PathBuf,
}

impl EncoderSession {
    /// Load an encoder from an ONNX file.
    pub fn load(model_path: &Path, output_name: &str) -> Result<Self, ExtractionError> {
        let session = Session::builder()
            .map_err(|e| {
                ExtractionError::BackboneUnavailable(format!(
                    "failed to create ONNX session builder: {e}"
                ))
            })?
            .commit_from_file(model_path)
            .map_err(|e| {
                ExtractionError::BackboneUnavailable(format!(
                    "failed to load {}: {e}",
                    model_path.display()
                ))
            })?;

        let input_name = session
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .unwrap_or_else(|| "pixel_values".to_string());

        tracing::debug!(
            "Loaded encoder from {:?} (input: {:?}, output: {:?})",
            model_path,
            input_name,
            output_name
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name: output_name.to_string(),
            model_path: model_path.to_path_buf(),
        })
    }

    /// Run the encoder on one `[1, 3, H, W]` tensor and return the raw pooled vector.
    pub fn run(&self, tensor: &Array4<f32>, path: &Path) -> Result<Vec<f32>, ExtractionError> {
        let backbone_err = |message: String| ExtractionError::Backbone {
            path: path.to_path_buf(),
            message,
        };

        let shape: Vec<i64> = tensor.shape().iter().map(|&d| d as i64).collect();
        let flat: Vec<f32> = tensor.iter().copied().collect();
        let input = Value::from_array((shape, flat))
            .map_err(|e| backbone_err(format!("failed to create input tensor: {e}")))?;

        let inputs = ort::inputs![self.input_name.as_str() => input];

        let mut session = self
            .session
            .lock()
            .map_err(|e| backbone_err(format!("session lock poisoned: {e}")))?;

        let outputs = session
            .run(inputs)
            .map_err(|e| backbone_err(format!("inference failed: {e}")))?;

        let pooled = outputs
            .iter()
            .find(|(name, _)| *name == self.output_name)
            .ok_or_else(|| {
                backbone_err(format!(
                    "{} did not produce output {:?}",
                    self.model_path.display(),
                    self.output_name
                ))
            })?;

        let (shape, data) = pooled
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e| backbone_err(format!("failed to extract output tensor: {e}")))?;

        match shape.len() {
            1 => Ok(data.to_vec()),
            2 => {
                let dim = shape[1] as usize;
                Ok(data[..dim].to_vec())
            }
            _ => Err(backbone_err(format!(
                "unexpected output shape: {:?}",
                shape
            ))),
        }
    }
}
