use std::path::{Path, PathBuf};

use crate::core::types::{Dimension, FuzzyKind};

/// Default directory names inside a knowledge-base root
pub const DISEASES_DIR: &str = "diseases";
pub const ONTOLOGY_FILE: &str = "features/feature_ontology.json";
pub const FUZZY_RULES_DIR: &str = "fuzzy_rules";
pub const SCORING_WEIGHTS_FILE: &str = "config/scoring_weights.json";

/// Where the knowledge lives and how strictly it is validated
#[derive(Debug, Clone)]
pub struct KnowledgeBaseConfig {
    /// Directory holding one JSON file per disease
    pub diseases_dir: PathBuf,

    /// Feature ontology file
    pub ontology_path: PathBuf,

    /// Directory holding the five fuzzy rule files
    pub fuzzy_rules_dir: PathBuf,

    /// Tier-weight and completeness-factor configuration
    pub scoring_weights_path: PathBuf,

    /// Reject (rather than warn about) weight-sum violations
    pub strict_weights: bool,

    /// Dimensions routed through the fuzzy engine; everything else is exact-only
    pub fuzzy_dimensions: Vec<Dimension>,
}

impl KnowledgeBaseConfig {
    /// Standard layout below a knowledge-base root
    pub fn from_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            diseases_dir: root.join(DISEASES_DIR),
            ontology_path: root.join(ONTOLOGY_FILE),
            fuzzy_rules_dir: root.join(FUZZY_RULES_DIR),
            scoring_weights_path: root.join(SCORING_WEIGHTS_FILE),
            strict_weights: true,
            fuzzy_dimensions: default_fuzzy_dimensions(),
        }
    }

    #[must_use]
    pub fn with_strict_weights(mut self, strict: bool) -> Self {
        self.strict_weights = strict;
        self
    }

    #[must_use]
    pub fn with_fuzzy_rules_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fuzzy_rules_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_scoring_weights(mut self, path: impl Into<PathBuf>) -> Self {
        self.scoring_weights_path = path.into();
        self
    }

    #[must_use]
    pub fn with_fuzzy_dimensions(mut self, dimensions: Vec<Dimension>) -> Self {
        self.fuzzy_dimensions = dimensions;
        self
    }

    /// Path of the rule file for one fuzzy dimension family
    #[must_use]
    pub fn rules_path(&self, kind: FuzzyKind) -> PathBuf {
        self.fuzzy_rules_dir.join(kind.rules_file_name())
    }
}

/// Dimensions compared with fuzzy rules by default: colors, size and symptom type.
/// Location and distribution are exact-only unless opted in.
#[must_use]
pub fn default_fuzzy_dimensions() -> Vec<Dimension> {
    vec![
        Dimension::ColorCenter,
        Dimension::ColorBorder,
        Dimension::Size,
        Dimension::SymptomType,
    ]
}
