//! Run setup: config loading, CLI overrides, backbone loading.

use exemplar_core::config::EmbeddingConfig;
use exemplar_core::{Config, EmbeddingEngine};

use super::types::Quality;
use super::RunArgs;

/// Load the config file named on the command line, or the default one.
pub fn load_config(args: &RunArgs) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    apply_overrides(&mut config, args);
    config.validate()?;
    Ok(config)
}

/// Apply command-line flags on top of the loaded configuration.
pub fn apply_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(shots) = &args.shots {
        config.experiment.shot_counts = shots.clone();
    }
    if let Some(thresholds) = &args.thresholds {
        config.experiment.thresholds = thresholds.clone();
    }
    if let Some(seed) = args.seed {
        config.experiment.seed = seed;
    }
    if args.group_unknown {
        config.experiment.group_unknown = true;
    }
    if args.no_group_unknown {
        config.experiment.group_unknown = false;
    }
    if let Some(parallel) = args.parallel {
        config.processing.parallel_workers = parallel;
    }
    if args.visualize {
        config.experiment.visualize = true;
    }
    if let Some(label) = &args.model_label {
        config.output.model_label = Some(label.clone());
    }
}

/// Switch to the preset's model when it is installed.
pub fn apply_quality(config: &mut Config, quality: Quality) {
    let Some(model) = quality.model_name() else {
        return;
    };
    let candidate = EmbeddingConfig {
        model: model.to_string(),
        image_size: EmbeddingConfig::image_size_for_model(model),
        ..config.embedding.clone()
    };
    if EmbeddingEngine::model_exists(&candidate, &config.model_dir()) {
        config.embedding = candidate;
    } else {
        tracing::warn!(
            "Model {model} not found under {:?}. Falling back to {}.",
            config.model_dir(),
            config.embedding.model
        );
    }
}

/// Load the ONNX visual encoder named by the config.
pub fn load_engine(config: &Config) -> anyhow::Result<EmbeddingEngine> {
    let model_dir = config.model_dir();
    if !EmbeddingEngine::model_exists(&config.embedding, &model_dir) {
        anyhow::bail!(
            "Visual encoder not found at {:?}\n\n  \
             Hint: export the {} vision tower to ONNX and place it there, \
             or point [general] model_dir at an existing model directory.",
            EmbeddingEngine::model_path(&config.embedding, &model_dir),
            config.embedding.model
        );
    }
    Ok(EmbeddingEngine::load(&config.embedding, &model_dir)?)
}
