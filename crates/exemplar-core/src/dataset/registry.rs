//! Validated class registry, loaded once per grid run.
//!
//! Classes come from `class_mapping.json` (folder name → display name). Without
//! a mapping file, the registry is the identity mapping over the folder names
//! found in the support pools and the query corpus, plus the canonical open-set
//! buckets. Malformed folder names are rejected in both cases.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::ConfigError;
use crate::types::{is_open_set, UNKNOWN_LABEL};

use super::discovery::class_dirs;
use super::layout::CategoryLayout;

/// Open-set buckets registered when no mapping file exists.
pub const CANONICAL_UNKNOWN_BUCKETS: [&str; 4] = [
    "unknown_object",
    "unknown_background",
    "unknown_occluded",
    "unknown_other",
];

const MAX_NAME_LEN: usize = 128;

/// A registered class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassLabel {
    /// Folder name, the canonical identifier
    pub name: String,

    /// Human-readable name from the mapping file
    pub display_name: String,

    /// Open-set negative (`unknown_*`): ground truth only, never a match target
    pub open_set: bool,
}

impl ClassLabel {
    pub fn new(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        let name = name.into();
        let open_set = is_open_set(&name);
        Self {
            name,
            display_name: display_name.into(),
            open_set,
        }
    }
}

/// Whether a name is safe to use as a single path component.
///
/// Letters and digits of any script, `_`, `-`, `.` and spaces. No leading dot
/// or space, no trailing space, no separators or control characters.
pub fn is_safe_component(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && !name.starts_with('.')
        && !name.starts_with(' ')
        && !name.ends_with(' ')
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ' '))
}

/// Whether a folder name may be used as a class.
///
/// A safe path component other than the reserved prediction label `"unknown"`.
pub fn is_valid_class_name(name: &str) -> bool {
    is_safe_component(name) && name != UNKNOWN_LABEL
}

/// The set of classes an experiment may use.
#[derive(Debug, Clone)]
pub struct ClassRegistry {
    labels: BTreeMap<String, ClassLabel>,
}

impl ClassRegistry {
    /// Load the registry for a category.
    pub fn load(layout: &CategoryLayout) -> Result<Self, ConfigError> {
        let mapping_path = layout.mapping_path();
        let registry = if mapping_path.exists() {
            let content = std::fs::read_to_string(&mapping_path)?;
            Self::from_mapping_json(&content).map_err(|message| ConfigError::MalformedMapping {
                path: mapping_path.clone(),
                message,
            })?
        } else {
            tracing::info!(
                "No {:?}; using identity mapping over discovered folders",
                mapping_path
            );
            Self::discover(layout)
        };

        if registry.known_classes().is_empty() {
            return Err(ConfigError::EmptyClassList(layout.root().to_path_buf()));
        }

        tracing::info!(
            "Class registry: {} known, {} open-set",
            registry.known_classes().len(),
            registry.open_set_classes().len()
        );
        Ok(registry)
    }

    /// Parse a `{ "folder": "Display Name" }` JSON object.
    pub fn from_mapping_json(content: &str) -> Result<Self, String> {
        let mapping: BTreeMap<String, String> =
            serde_json::from_str(content).map_err(|e| e.to_string())?;

        let mut labels = BTreeMap::new();
        for (name, display) in mapping {
            if !is_valid_class_name(&name) {
                return Err(format!("invalid class folder name {name:?}"));
            }
            let display = if display.trim().is_empty() {
                name.clone()
            } else {
                display
            };
            labels.insert(name.clone(), ClassLabel::new(name, display));
        }
        Ok(Self { labels })
    }

    /// Identity mapping over support-pool and query folder names.
    fn discover(layout: &CategoryLayout) -> Self {
        let mut labels = BTreeMap::new();
        for name in CANONICAL_UNKNOWN_BUCKETS {
            labels.insert(name.to_string(), ClassLabel::new(name, name));
        }

        let mut dirs: Vec<String> = layout
            .pools()
            .iter()
            .flat_map(|(_, pool)| class_dirs(pool))
            .chain(class_dirs(&layout.query_root()))
            .map(|(name, _)| name)
            .collect();
        dirs.sort();
        dirs.dedup();

        for name in dirs {
            if is_valid_class_name(&name) {
                labels
                    .entry(name.clone())
                    .or_insert_with(|| ClassLabel::new(name.clone(), name));
            } else {
                tracing::warn!("Rejecting malformed class folder name {:?}", name);
            }
        }
        Self { labels }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.labels.contains_key(name)
    }

    /// Matchable classes, sorted.
    pub fn known_classes(&self) -> Vec<String> {
        self.labels
            .values()
            .filter(|l| !l.open_set)
            .map(|l| l.name.clone())
            .collect()
    }

    /// Open-set negative classes, sorted.
    pub fn open_set_classes(&self) -> Vec<String> {
        self.labels
            .values()
            .filter(|l| l.open_set)
            .map(|l| l.name.clone())
            .collect()
    }

    pub fn labels(&self) -> impl Iterator<Item = &ClassLabel> {
        self.labels.values()
    }
}
