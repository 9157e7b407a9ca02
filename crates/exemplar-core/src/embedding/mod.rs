//! Embedding backbones.
//!
//! The classification core only depends on the [`EmbeddingProvider`] trait. The
//! shipped implementation, [`EmbeddingEngine`], runs a frozen SigLIP-style visual
//! encoder exported to ONNX.
//!
//! ```rust,ignore
//! use exemplar_core::{Config, EmbeddingEngine};
//!
//! let config = Config::default();
//! let engine = EmbeddingEngine::load(&config.embedding, &config.model_dir())?;
//! let vector = engine.embed(&image, path)?; // raw vector, normalized by the extractor
//! ```

pub(crate) mod onnx;
pub(crate) mod preprocess;

use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::config::EmbeddingConfig;
use crate::error::ExtractionError;

use self::onnx::EncoderSession;
use self::preprocess::{preprocess, Normalization};

/// The visual encoder ONNX model filename.
const VISUAL_MODEL_FILENAME: &str = "visual.onnx";

/// A frozen image embedding backbone.
///
/// Implementations must be deterministic for identical pixels. They may return
/// unnormalized vectors; the feature extractor L2-normalizes every output.
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier of the backbone and its version, used in logs.
    fn model_id(&self) -> &str;

    /// Embed one decoded image.
    fn embed(&self, image: &DynamicImage, path: &Path) -> Result<Vec<f32>, ExtractionError>;
}

/// ONNX visual encoder backbone.
pub struct EmbeddingEngine {
    session: EncoderSession,
    model_id: String,
    image_size: u32,
    norm: Normalization,
}

impl EmbeddingEngine {
    /// Load the visual encoder from `{model_dir}/{model}/visual.onnx`.
    pub fn load(config: &EmbeddingConfig, model_dir: &Path) -> Result<Self, ExtractionError> {
        let model_path = Self::model_path(config, model_dir);

        if !model_path.exists() {
            return Err(ExtractionError::BackboneUnavailable(format!(
                "model not found at {}",
                model_path.display()
            )));
        }

        tracing::info!("Loading visual encoder from {:?}", model_path);
        let session = EncoderSession::load(&model_path, &config.output_name)?;
        tracing::info!("Visual encoder loaded successfully");

        Ok(Self {
            session,
            model_id: config.model.clone(),
            image_size: config.image_size,
            norm: Normalization {
                mean: config.norm_mean,
                std: config.norm_std,
            },
        })
    }

    /// Check whether the model file exists on disk.
    pub fn model_exists(config: &EmbeddingConfig, model_dir: &Path) -> bool {
        Self::model_path(config, model_dir).exists()
    }

    /// Get the expected model file path.
    pub fn model_path(config: &EmbeddingConfig, model_dir: &Path) -> PathBuf {
        model_dir.join(&config.model).join(VISUAL_MODEL_FILENAME)
    }
}

impl EmbeddingProvider for EmbeddingEngine {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn embed(&self, image: &DynamicImage, path: &Path) -> Result<Vec<f32>, ExtractionError> {
        let tensor =
            preprocess(image, self.image_size, self.norm).map_err(|e| ExtractionError::Backbone {
                path: path.to_path_buf(),
                message: format!("failed to build input tensor: {e}"),
            })?;
        self.session.run(&tensor, path)
    }
}
