//! CLI enum types for the run command.

use clap::ValueEnum;

/// Backbone resolution preset.
#[derive(Clone, Copy, Debug, ValueEnum, Default, PartialEq, Eq)]
pub enum Quality {
    /// Base 224 model (default)
    #[default]
    Fast,
    /// Base 384 model, falls back to 224 when not installed
    High,
}

impl Quality {
    /// Model name for presets that replace the configured one.
    pub fn model_name(&self) -> Option<&'static str> {
        match self {
            Quality::Fast => None,
            Quality::High => Some("siglip-base-patch16-384"),
        }
    }
}
