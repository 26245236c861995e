//! Typed fuzzy-rule tables.
//!
//! Each dimension family has its own rule file. Files are deserialized into
//! the structures below, validated, and then [`RuleTable::rebuild_indexes`]
//! precomputes the normalized lookup maps used at match time.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::core::ontology::FeatureOntology;
use crate::core::types::normalize_value;

/// Behaviour shared by the five rule tables
pub trait RuleTable {
    /// Version tag from the rule file
    fn version(&self) -> &str;

    /// Check scores and tables are usable.
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found.
    fn validate(&self) -> Result<(), String>;

    /// Precompute normalized lookups; call after deserializing or editing
    fn rebuild_indexes(&mut self);
}

/// Index: member -> names of every group containing it
type Membership = HashMap<String, Vec<String>>;

/// Build a membership index from `group -> members`.
/// With `include_key` the group name is itself a member (alias/synonym groups).
fn membership(groups: &BTreeMap<String, Vec<String>>, include_key: bool) -> Membership {
    let mut index: Membership = HashMap::new();
    for (name, members) in groups {
        let key = normalize_value(name);
        let keyed = include_key.then(|| name.as_str());
        for member in keyed.into_iter().chain(members.iter().map(String::as_str)) {
            let groups_of = index.entry(normalize_value(member)).or_default();
            if !groups_of.contains(&key) {
                groups_of.push(key.clone());
            }
        }
    }
    index
}

/// Normalize a symmetric `value -> related values` table
fn relation(table: &BTreeMap<String, Vec<String>>) -> HashMap<String, Vec<String>> {
    let mut index: HashMap<String, Vec<String>> = HashMap::new();
    for (value, related) in table {
        let entry = index.entry(normalize_value(value)).or_default();
        entry.extend(related.iter().map(|r| normalize_value(r)));
    }
    index
}

/// First group shared by two values, if any
fn shared_group<'a>(index: &'a Membership, a: &str, b: &str) -> Option<&'a str> {
    let groups_a = index.get(a)?;
    let groups_b = index.get(b)?;
    groups_a
        .iter()
        .find(|g| groups_b.contains(g))
        .map(String::as_str)
}

/// Whether `a` and `b` are related in either direction
fn related(index: &HashMap<String, Vec<String>>, a: &str, b: &str) -> bool {
    index.get(a).is_some_and(|r| r.iter().any(|v| v == b))
        || index.get(b).is_some_and(|r| r.iter().any(|v| v == a))
}

/// Check `exact` is 1.0 and fuzzy tiers lie strictly in (0, 1) and never
/// increase down the precedence order.
fn check_scores(exact: f64, tiers: &[(&str, f64)]) -> Result<(), String> {
    if (exact - 1.0).abs() > f64::EPSILON {
        return Err(format!("exact score must be 1.0, found {exact}"));
    }
    let mut previous = exact;
    for (name, score) in tiers {
        if !(score.is_finite() && *score > 0.0 && *score < 1.0) {
            return Err(format!(
                "'{name}' score must lie strictly between 0 and 1, found {score}"
            ));
        }
        if *score > previous {
            return Err(format!(
                "'{name}' score {score} exceeds a higher-precedence score {previous}"
            ));
        }
        previous = *score;
    }
    Ok(())
}

// === Color ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorScores {
    pub exact: f64,
    pub alias: f64,
    pub similar: f64,
    pub group: f64,
}

impl Default for ColorScores {
    fn default() -> Self {
        Self {
            exact: 1.0,
            alias: 0.9,
            similar: 0.7,
            group: 0.6,
        }
    }
}

/// Color comparison rules: alias groups, similar colors, broad color groups
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColorRules {
    pub version: String,

    /// canonical color -> aliases
    #[serde(default)]
    pub color_aliases: BTreeMap<String, Vec<String>>,

    /// color -> visually similar colors
    #[serde(default)]
    pub similar_colors: BTreeMap<String, Vec<String>>,

    /// broad family -> member colors
    #[serde(default)]
    pub color_groups: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub similarity_scores: ColorScores,

    #[serde(skip)]
    alias_index: Membership,

    #[serde(skip)]
    similar_index: HashMap<String, Vec<String>>,

    #[serde(skip)]
    group_index: Membership,
}

impl ColorRules {
    /// Alias group shared by two normalized colors
    #[must_use]
    pub fn alias_group(&self, a: &str, b: &str) -> Option<&str> {
        shared_group(&self.alias_index, a, b)
    }

    #[must_use]
    pub fn are_similar(&self, a: &str, b: &str) -> bool {
        related(&self.similar_index, a, b)
    }

    /// Broad color group shared by two normalized colors
    #[must_use]
    pub fn color_group(&self, a: &str, b: &str) -> Option<&str> {
        shared_group(&self.group_index, a, b)
    }
}

impl RuleTable for ColorRules {
    fn version(&self) -> &str {
        &self.version
    }

    fn validate(&self) -> Result<(), String> {
        let s = &self.similarity_scores;
        check_scores(
            s.exact,
            &[("alias", s.alias), ("similar", s.similar), ("group", s.group)],
        )
    }

    fn rebuild_indexes(&mut self) {
        self.alias_index = membership(&self.color_aliases, true);
        self.similar_index = relation(&self.similar_colors);
        self.group_index = membership(&self.color_groups, false);
    }
}

// === Size ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeScores {
    pub exact: f64,
    pub distance_1: f64,
    pub distance_2: f64,
}

impl Default for SizeScores {
    fn default() -> Self {
        Self {
            exact: 1.0,
            distance_1: 0.8,
            distance_2: 0.6,
        }
    }
}

/// Largest scale distance a size table may tolerate
pub const MAX_SIZE_TOLERANCE: usize = 2;

/// Size comparison rules: an ordered scale with a distance tolerance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SizeRules {
    pub version: String,

    /// Sizes from smallest to largest
    pub size_order: Vec<String>,

    /// Largest scale distance still counted as a match
    #[serde(default = "default_size_tolerance")]
    pub tolerance: usize,

    #[serde(default)]
    pub similarity_scores: SizeScores,

    #[serde(skip)]
    positions: HashMap<String, usize>,
}

fn default_size_tolerance() -> usize {
    1
}

impl SizeRules {
    /// Position of a normalized size on the scale
    #[must_use]
    pub fn position(&self, size: &str) -> Option<usize> {
        self.positions.get(size).copied()
    }

    /// Scale distance between two normalized sizes
    #[must_use]
    pub fn distance(&self, a: &str, b: &str) -> Option<usize> {
        Some(self.position(a)?.abs_diff(self.position(b)?))
    }

    /// Score for a scale distance, None when beyond tolerance
    #[must_use]
    pub fn score_for_distance(&self, distance: usize) -> Option<f64> {
        if distance > self.tolerance {
            return None;
        }
        match distance {
            0 => Some(self.similarity_scores.exact),
            1 => Some(self.similarity_scores.distance_1),
            2 => Some(self.similarity_scores.distance_2),
            _ => None,
        }
    }
}

impl RuleTable for SizeRules {
    fn version(&self) -> &str {
        &self.version
    }

    fn validate(&self) -> Result<(), String> {
        if self.size_order.is_empty() {
            return Err("size_order is empty".to_string());
        }
        if self.tolerance > MAX_SIZE_TOLERANCE {
            return Err(format!(
                "tolerance {} exceeds the supported maximum of {MAX_SIZE_TOLERANCE}",
                self.tolerance
            ));
        }
        let mut seen = Vec::new();
        for size in &self.size_order {
            let size = normalize_value(size);
            if seen.contains(&size) {
                return Err(format!("size '{size}' appears twice in size_order"));
            }
            seen.push(size);
        }
        let s = &self.similarity_scores;
        check_scores(
            s.exact,
            &[("distance_1", s.distance_1), ("distance_2", s.distance_2)],
        )
    }

    fn rebuild_indexes(&mut self) {
        self.positions = self
            .size_order
            .iter()
            .enumerate()
            .map(|(i, s)| (normalize_value(s), i))
            .collect();
    }
}

// === Symptom type ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomScores {
    pub exact: f64,
    pub synonym: f64,
}

impl Default for SymptomScores {
    fn default() -> Self {
        Self {
            exact: 1.0,
            synonym: 0.9,
        }
    }
}

/// Symptom comparison rules: synonym groups
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymptomRules {
    pub version: String,

    /// canonical symptom -> synonyms
    #[serde(default)]
    pub synonym_groups: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub similarity_scores: SymptomScores,

    #[serde(skip)]
    synonym_index: Membership,
}

impl SymptomRules {
    #[must_use]
    pub fn synonym_group(&self, a: &str, b: &str) -> Option<&str> {
        shared_group(&self.synonym_index, a, b)
    }
}

impl RuleTable for SymptomRules {
    fn version(&self) -> &str {
        &self.version
    }

    fn validate(&self) -> Result<(), String> {
        let s = &self.similarity_scores;
        check_scores(s.exact, &[("synonym", s.synonym)])
    }

    fn rebuild_indexes(&mut self) {
        self.synonym_index = membership(&self.synonym_groups, true);
    }
}

// === Location ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationScores {
    pub exact: f64,
    pub same_group: f64,
    pub adjacent: f64,
}

impl Default for LocationScores {
    fn default() -> Self {
        Self {
            exact: 1.0,
            same_group: 0.7,
            adjacent: 0.6,
        }
    }
}

/// Location comparison rules: anatomical groups and adjacency
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationRules {
    pub version: String,

    /// region -> member locations
    #[serde(default)]
    pub location_groups: BTreeMap<String, Vec<String>>,

    /// location -> neighbouring locations
    #[serde(default)]
    pub adjacent_locations: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub similarity_scores: LocationScores,

    #[serde(skip)]
    group_index: Membership,

    #[serde(skip)]
    adjacency_index: HashMap<String, Vec<String>>,
}

impl LocationRules {
    #[must_use]
    pub fn location_group(&self, a: &str, b: &str) -> Option<&str> {
        shared_group(&self.group_index, a, b)
    }

    #[must_use]
    pub fn are_adjacent(&self, a: &str, b: &str) -> bool {
        related(&self.adjacency_index, a, b)
    }
}

impl RuleTable for LocationRules {
    fn version(&self) -> &str {
        &self.version
    }

    fn validate(&self) -> Result<(), String> {
        let s = &self.similarity_scores;
        check_scores(
            s.exact,
            &[("same_group", s.same_group), ("adjacent", s.adjacent)],
        )
    }

    fn rebuild_indexes(&mut self) {
        self.group_index = membership(&self.location_groups, false);
        self.adjacency_index = relation(&self.adjacent_locations);
    }
}

// === Distribution ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionScores {
    pub exact: f64,
    pub same_group: f64,
    pub similar: f64,
}

impl Default for DistributionScores {
    fn default() -> Self {
        Self {
            exact: 1.0,
            same_group: 0.8,
            similar: 0.75,
        }
    }
}

/// Distribution-pattern comparison rules
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DistributionRules {
    pub version: String,

    /// pattern family -> member patterns
    #[serde(default)]
    pub distribution_groups: BTreeMap<String, Vec<String>>,

    /// pattern -> similar patterns
    #[serde(default)]
    pub similar_patterns: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub similarity_scores: DistributionScores,

    #[serde(skip)]
    group_index: Membership,

    #[serde(skip)]
    similar_index: HashMap<String, Vec<String>>,
}

impl DistributionRules {
    #[must_use]
    pub fn distribution_group(&self, a: &str, b: &str) -> Option<&str> {
        shared_group(&self.group_index, a, b)
    }

    #[must_use]
    pub fn are_similar(&self, a: &str, b: &str) -> bool {
        related(&self.similar_index, a, b)
    }
}

impl RuleTable for DistributionRules {
    fn version(&self) -> &str {
        &self.version
    }

    fn validate(&self) -> Result<(), String> {
        let s = &self.similarity_scores;
        check_scores(
            s.exact,
            &[("same_group", s.same_group), ("similar", s.similar)],
        )
    }

    fn rebuild_indexes(&mut self) {
        self.group_index = membership(&self.distribution_groups, false);
        self.similar_index = relation(&self.similar_patterns);
    }
}

// === Ontology-derived tables ===

impl ColorRules {
    /// Alias-only color table from the ontology's fuzzy bundle
    #[must_use]
    pub fn from_ontology(ontology: &FeatureOntology) -> Option<Self> {
        if ontology.color_aliases().is_empty() {
            return None;
        }
        let mut rules = Self {
            version: ontology.version().to_string(),
            color_aliases: ontology.color_aliases().clone(),
            ..Self::default()
        };
        rules.rebuild_indexes();
        Some(rules)
    }
}

impl SizeRules {
    /// Size scale from the ontology's fuzzy bundle
    #[must_use]
    pub fn from_ontology(ontology: &FeatureOntology) -> Option<Self> {
        if ontology.size_order().is_empty() {
            return None;
        }
        let mut rules = Self {
            version: ontology.version().to_string(),
            size_order: ontology.size_order().to_vec(),
            tolerance: ontology.size_tolerance().min(MAX_SIZE_TOLERANCE),
            ..Self::default()
        };
        rules.rebuild_indexes();
        Some(rules)
    }
}

impl SymptomRules {
    /// Synonym table from the ontology's fuzzy bundle
    #[must_use]
    pub fn from_ontology(ontology: &FeatureOntology) -> Option<Self> {
        if ontology.synonym_mapping().is_empty() {
            return None;
        }
        let mut rules = Self {
            version: ontology.version().to_string(),
            synonym_groups: ontology.synonym_mapping().clone(),
            ..Self::default()
        };
        rules.rebuild_indexes();
        Some(rules)
    }
}
