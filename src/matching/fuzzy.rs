use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::ontology::FeatureOntology;
use crate::core::types::{normalize_value, Dimension, FuzzyKind, MatchKind};
use crate::knowledge::error::KnowledgeError;
use crate::knowledge::loader::read_typed;
use crate::matching::rules::{
    ColorRules, DistributionRules, LocationRules, RuleTable, SizeRules, SymptomRules,
};

/// Which rule justified a match
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum FuzzyRule {
    Exact,
    ColorAlias { group: String },
    SimilarColor,
    ColorGroup { group: String },
    SizeDistance { distance: usize },
    Synonym { group: String },
    LocationGroup { group: String },
    AdjacentLocation,
    DistributionGroup { group: String },
    SimilarPattern,
}

/// Outcome of comparing one observed value with expected value(s)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuzzyMatch {
    pub kind: MatchKind,

    /// Match confidence in `[0, 1]`; 1.0 only for exact matches
    pub score: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<FuzzyRule>,

    /// The expected value that produced this outcome
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_value: Option<String>,

    /// Human-readable explanation
    pub reason: String,
}

impl FuzzyMatch {
    fn exact(value: &str) -> Self {
        Self {
            kind: MatchKind::Exact,
            score: 1.0,
            rule: Some(FuzzyRule::Exact),
            matched_value: Some(value.to_string()),
            reason: format!("'{value}' matches exactly"),
        }
    }

    fn fuzzy(expected: &str, score: f64, rule: FuzzyRule, reason: String) -> Self {
        Self {
            kind: MatchKind::Fuzzy,
            score,
            rule: Some(rule),
            matched_value: Some(expected.to_string()),
            reason,
        }
    }

    fn none(reason: String) -> Self {
        Self {
            kind: MatchKind::None,
            score: 0.0,
            rule: None,
            matched_value: None,
            reason,
        }
    }

    #[must_use]
    pub fn is_match(&self) -> bool {
        self.kind.is_match()
    }
}

/// One immutable set of the five rule tables.
///
/// A missing table degrades its dimension family to exact-match only.
#[derive(Debug, Clone, Default)]
pub struct FuzzyRuleSet {
    pub color: Option<ColorRules>,
    pub size: Option<SizeRules>,
    pub symptom: Option<SymptomRules>,
    pub location: Option<LocationRules>,
    pub distribution: Option<DistributionRules>,
}

impl FuzzyRuleSet {
    /// No rules at all: every comparison is exact-only
    #[must_use]
    pub fn exact_only() -> Self {
        Self::default()
    }

    /// Color, size and symptom tables from the ontology's embedded bundle
    #[must_use]
    pub fn from_ontology(ontology: &FeatureOntology) -> Self {
        Self {
            color: ColorRules::from_ontology(ontology),
            size: SizeRules::from_ontology(ontology),
            symptom: SymptomRules::from_ontology(ontology),
            location: None,
            distribution: None,
        }
    }

    /// Load all five rule files from a directory.
    ///
    /// # Errors
    ///
    /// A present but unreadable, malformed or invalid file fails the whole load.
    /// Missing files are not errors.
    pub fn load_from_dir(dir: &Path) -> Result<Self, KnowledgeError> {
        let rules = Self {
            color: load_table(dir, FuzzyKind::Color)?,
            size: load_table(dir, FuzzyKind::Size)?,
            symptom: load_table(dir, FuzzyKind::Symptom)?,
            location: load_table(dir, FuzzyKind::Location)?,
            distribution: load_table(dir, FuzzyKind::Distribution)?,
        };
        info!(
            dir = %dir.display(),
            tables = FuzzyKind::ALL.iter().filter(|k| rules.has_rules(**k)).count(),
            "Loaded fuzzy rules"
        );
        Ok(rules)
    }

    #[must_use]
    pub fn has_rules(&self, kind: FuzzyKind) -> bool {
        self.version(kind).is_some()
    }

    /// Version tag of one table, None when the family is exact-only
    #[must_use]
    pub fn version(&self, kind: FuzzyKind) -> Option<&str> {
        match kind {
            FuzzyKind::Color => self.color.as_ref().map(RuleTable::version),
            FuzzyKind::Size => self.size.as_ref().map(RuleTable::version),
            FuzzyKind::Symptom => self.symptom.as_ref().map(RuleTable::version),
            FuzzyKind::Location => self.location.as_ref().map(RuleTable::version),
            FuzzyKind::Distribution => self.distribution.as_ref().map(RuleTable::version),
        }
    }

    /// Compare one observed value with one expected value using the rules of
    /// `kind`, or exact comparison when `kind` is None.
    #[must_use]
    pub fn compare(&self, kind: Option<FuzzyKind>, observed: &str, expected: &str) -> FuzzyMatch {
        let o = normalize_value(observed);
        let e = normalize_value(expected);

        if !o.is_empty() && o == e {
            return FuzzyMatch::exact(&e);
        }

        let fuzzy = match kind {
            Some(FuzzyKind::Color) => self.compare_color(&o, &e),
            Some(FuzzyKind::Size) => self.compare_size(&o, &e),
            Some(FuzzyKind::Symptom) => self.compare_symptom(&o, &e),
            Some(FuzzyKind::Location) => self.compare_location(&o, &e),
            Some(FuzzyKind::Distribution) => self.compare_distribution(&o, &e),
            None => None,
        };

        fuzzy.unwrap_or_else(|| FuzzyMatch::none(format!("'{o}' does not match '{e}'")))
    }

    /// Compare an observed value against several expected values.
    ///
    /// Exact matches win outright; otherwise the highest fuzzy score wins and
    /// ties keep the earlier expected value.
    #[must_use]
    pub fn best_match<S: AsRef<str>>(
        &self,
        kind: Option<FuzzyKind>,
        observed: &str,
        expected: &[S],
    ) -> FuzzyMatch {
        let mut best: Option<FuzzyMatch> = None;

        for candidate in expected {
            let outcome = self.compare(kind, observed, candidate.as_ref());
            if outcome.kind == MatchKind::Exact {
                return outcome;
            }
            if outcome.is_match() && best.as_ref().map_or(true, |b| outcome.score > b.score) {
                best = Some(outcome);
            }
        }

        best.unwrap_or_else(|| {
            let listed: Vec<String> = expected.iter().map(|e| normalize_value(e.as_ref())).collect();
            FuzzyMatch::none(format!(
                "'{}' matches none of [{}]",
                normalize_value(observed),
                listed.join(", ")
            ))
        })
    }

    fn compare_color(&self, o: &str, e: &str) -> Option<FuzzyMatch> {
        let rules = self.color.as_ref()?;
        let scores = &rules.similarity_scores;

        if let Some(group) = rules.alias_group(o, e) {
            return Some(FuzzyMatch::fuzzy(
                e,
                scores.alias,
                FuzzyRule::ColorAlias {
                    group: group.to_string(),
                },
                format!("'{o}' and '{e}' are aliases in color group '{group}'"),
            ));
        }
        if rules.are_similar(o, e) {
            return Some(FuzzyMatch::fuzzy(
                e,
                scores.similar,
                FuzzyRule::SimilarColor,
                format!("'{o}' is listed as similar to '{e}'"),
            ));
        }
        if let Some(group) = rules.color_group(o, e) {
            return Some(FuzzyMatch::fuzzy(
                e,
                scores.group,
                FuzzyRule::ColorGroup {
                    group: group.to_string(),
                },
                format!("'{o}' and '{e}' share the color family '{group}'"),
            ));
        }
        None
    }

    fn compare_size(&self, o: &str, e: &str) -> Option<FuzzyMatch> {
        let rules = self.size.as_ref()?;
        let Some(distance) = rules.distance(o, e) else {
            return Some(FuzzyMatch::none(format!(
                "'{o}' or '{e}' is not on the size scale"
            )));
        };
        match rules.score_for_distance(distance) {
            Some(score) => Some(FuzzyMatch::fuzzy(
                e,
                score,
                FuzzyRule::SizeDistance { distance },
                format!("'{o}' is {distance} step(s) from '{e}' on the size scale"),
            )),
            None => Some(FuzzyMatch::none(format!(
                "'{o}' is {distance} steps from '{e}', beyond tolerance {}",
                rules.tolerance
            ))),
        }
    }

    fn compare_symptom(&self, o: &str, e: &str) -> Option<FuzzyMatch> {
        let rules = self.symptom.as_ref()?;
        let group = rules.synonym_group(o, e)?;
        Some(FuzzyMatch::fuzzy(
            e,
            rules.similarity_scores.synonym,
            FuzzyRule::Synonym {
                group: group.to_string(),
            },
            format!("'{o}' and '{e}' are synonyms of '{group}'"),
        ))
    }

    fn compare_location(&self, o: &str, e: &str) -> Option<FuzzyMatch> {
        let rules = self.location.as_ref()?;
        let scores = &rules.similarity_scores;

        if let Some(group) = rules.location_group(o, e) {
            return Some(FuzzyMatch::fuzzy(
                e,
                scores.same_group,
                FuzzyRule::LocationGroup {
                    group: group.to_string(),
                },
                format!("'{o}' and '{e}' are both in the '{group}' region"),
            ));
        }
        if rules.are_adjacent(o, e) {
            return Some(FuzzyMatch::fuzzy(
                e,
                scores.adjacent,
                FuzzyRule::AdjacentLocation,
                format!("'{o}' is adjacent to '{e}'"),
            ));
        }
        None
    }

    fn compare_distribution(&self, o: &str, e: &str) -> Option<FuzzyMatch> {
        let rules = self.distribution.as_ref()?;
        let scores = &rules.similarity_scores;

        if let Some(group) = rules.distribution_group(o, e) {
            return Some(FuzzyMatch::fuzzy(
                e,
                scores.same_group,
                FuzzyRule::DistributionGroup {
                    group: group.to_string(),
                },
                format!("'{o}' and '{e}' are both '{group}' patterns"),
            ));
        }
        if rules.are_similar(o, e) {
            return Some(FuzzyMatch::fuzzy(
                e,
                scores.similar,
                FuzzyRule::SimilarPattern,
                format!("'{o}' is listed as similar to '{e}'"),
            ));
        }
        None
    }
}

fn load_table<T: RuleTable + DeserializeOwned>(
    dir: &Path,
    kind: FuzzyKind,
) -> Result<Option<T>, KnowledgeError> {
    let path = dir.join(kind.rules_file_name());
    match read_typed::<T>(&path, &format!("{kind} rules")) {
        Ok((mut table, _digest)) => {
            table.validate().map_err(|message| {
                KnowledgeError::validation(format!("{kind} rules {}", path.display()), message)
            })?;
            table.rebuild_indexes();
            Ok(Some(table))
        }
        Err(KnowledgeError::NotFound { .. }) => {
            warn!(
                path = %path.display(),
                "No {kind} rules found; {kind} comparisons are exact-only"
            );
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Fuzzy matching engine with hot-swappable rule tables.
///
/// Each comparison captures the current [`FuzzyRuleSet`] once, so a concurrent
/// [`reload_rules`](Self::reload_rules) never mixes old and new tables.
#[derive(Debug)]
pub struct FuzzyMatchingEngine {
    rules: RwLock<Arc<FuzzyRuleSet>>,
    source: Option<PathBuf>,
}

impl FuzzyMatchingEngine {
    /// Engine over fixed tables; `reload_rules` keeps them
    #[must_use]
    pub fn new(rules: FuzzyRuleSet) -> Self {
        Self {
            rules: RwLock::new(Arc::new(rules)),
            source: None,
        }
    }

    /// Engine backed by a rule directory
    ///
    /// # Errors
    ///
    /// See [`FuzzyRuleSet::load_from_dir`].
    pub fn from_dir(dir: impl Into<PathBuf>) -> Result<Self, KnowledgeError> {
        let dir = dir.into();
        let rules = FuzzyRuleSet::load_from_dir(&dir)?;
        Ok(Self {
            rules: RwLock::new(Arc::new(rules)),
            source: Some(dir),
        })
    }

    /// The rule set new comparisons will use
    #[must_use]
    pub fn rules(&self) -> Arc<FuzzyRuleSet> {
        Arc::clone(&self.rules.read())
    }

    /// Compare two values of one dimension family
    #[must_use]
    pub fn compare(&self, kind: FuzzyKind, observed: &str, expected: &str) -> FuzzyMatch {
        self.rules().compare(Some(kind), observed, expected)
    }

    /// Compare an observed value for `dimension` against expected values,
    /// using that dimension's fuzzy family if it has one
    #[must_use]
    pub fn match_dimension<S: AsRef<str>>(
        &self,
        dimension: &Dimension,
        observed: &str,
        expected: &[S],
    ) -> FuzzyMatch {
        self.rules()
            .best_match(dimension.fuzzy_kind(), observed, expected)
    }

    /// Re-read all five tables and swap them in as one unit.
    ///
    /// # Errors
    ///
    /// On any load error the current tables stay in place.
    pub fn reload_rules(&self) -> Result<Arc<FuzzyRuleSet>, KnowledgeError> {
        let Some(dir) = &self.source else {
            return Ok(self.rules());
        };
        let fresh = Arc::new(FuzzyRuleSet::load_from_dir(dir)?);
        *self.rules.write() = Arc::clone(&fresh);
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rules(size_tolerance: usize) -> FuzzyRuleSet {
        let mut color: ColorRules = serde_json::from_value(serde_json::json!({
            "version": "1.0",
            "color_aliases": {"black": ["deep_black", "dark_black"], "yellow": ["light_yellow"]},
            "similar_colors": {"brown": ["dark_brown", "reddish_brown"]},
            "color_groups": {"dark": ["black", "dark_brown", "gray"]}
        }))
        .unwrap();
        color.rebuild_indexes();

        let mut size: SizeRules = serde_json::from_value(serde_json::json!({
            "version": "1.0",
            "size_order": ["pinpoint", "small", "medium", "large", "very_large"],
            "tolerance": size_tolerance
        }))
        .unwrap();
        size.rebuild_indexes();

        let mut symptom: SymptomRules = serde_json::from_value(serde_json::json!({
            "version": "1.0",
            "synonym_groups": {"necrosis_spot": ["necrotic_spot", "dead_spot"]}
        }))
        .unwrap();
        symptom.rebuild_indexes();

        let mut location: LocationRules = serde_json::from_value(serde_json::json!({
            "version": "1.0",
            "location_groups": {"leaf": ["leaf_upper", "leaf_lower", "leaf_margin"]},
            "adjacent_locations": {"leaf_margin": ["petiole"]}
        }))
        .unwrap();
        location.rebuild_indexes();

        let mut distribution: DistributionRules = serde_json::from_value(serde_json::json!({
            "version": "1.0",
            "distribution_groups": {"clustered": ["clustered", "concentric_rings"]},
            "similar_patterns": {"scattered": ["random"]}
        }))
        .unwrap();
        distribution.rebuild_indexes();

        FuzzyRuleSet {
            color: Some(color),
            size: Some(size),
            symptom: Some(symptom),
            location: Some(location),
            distribution: Some(distribution),
        }
    }

    #[test]
    fn test_color_precedence() {
        let rules = sample_rules(1);
        let c = Some(FuzzyKind::Color);

        let exact = rules.compare(c, "Black", "black");
        assert_eq!(exact.kind, MatchKind::Exact);
        assert!((exact.score - 1.0).abs() < 1e-9);

        let alias = rules.compare(c, "deep_black", "black");
        assert_eq!(alias.kind, MatchKind::Fuzzy);
        assert!((alias.score - 0.9).abs() < 1e-9);
        assert!(alias.reason.contains("color group 'black'"));

        let similar = rules.compare(c, "dark_brown", "brown");
        assert!((similar.score - 0.7).abs() < 1e-9);

        // black/dark_brown share only the broad family
        let group = rules.compare(c, "dark_brown", "black");
        assert!((group.score - 0.6).abs() < 1e-9);
        assert_eq!(
            group.rule,
            Some(FuzzyRule::ColorGroup {
                group: "dark".to_string()
            })
        );

        let none = rules.compare(c, "white", "black");
        assert_eq!(none.kind, MatchKind::None);
        assert_eq!(none.score, 0.0);
    }

    #[test]
    fn test_size_tolerance_monotonic() {
        let rules = sample_rules(2);
        let s = Some(FuzzyKind::Size);
        let d1 = rules.compare(s, "small", "medium").score;
        let d2 = rules.compare(s, "small", "large").score;
        let d3 = rules.compare(s, "small", "very_large").score;
        assert!(d1 > d2);
        assert!(d2 > d3);
        assert_eq!(d3, 0.0);
        assert!((d1 - 0.8).abs() < 1e-9);
        assert!((d2 - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_size_beyond_tolerance() {
        let rules = sample_rules(1);
        let outcome = rules.compare(Some(FuzzyKind::Size), "medium", "pinpoint");
        assert_eq!(outcome.kind, MatchKind::None);
        assert!(outcome.reason.contains("beyond tolerance 1"));

        let off_scale = rules.compare(Some(FuzzyKind::Size), "huge", "small");
        assert_eq!(off_scale.kind, MatchKind::None);
    }

    #[test]
    fn test_symptom_location_distribution() {
        let rules = sample_rules(1);

        let synonym = rules.compare(Some(FuzzyKind::Symptom), "dead_spot", "necrosis_spot");
        assert!((synonym.score - 0.9).abs() < 1e-9);
        assert!(synonym.reason.contains("necrosis_spot"));

        let loc = Some(FuzzyKind::Location);
        assert!((rules.compare(loc, "leaf_upper", "leaf_lower").score - 0.7).abs() < 1e-9);
        assert!((rules.compare(loc, "petiole", "leaf_margin").score - 0.6).abs() < 1e-9);
        assert!(!rules.compare(loc, "stem", "leaf_upper").is_match());

        let dist = Some(FuzzyKind::Distribution);
        assert!((rules.compare(dist, "concentric_rings", "clustered").score - 0.8).abs() < 1e-9);
        assert!((rules.compare(dist, "random", "scattered").score - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_fuzzy_scores_strictly_between_zero_and_one() {
        let rules = sample_rules(2);
        let cases = [
            (FuzzyKind::Color, "deep_black", "black"),
            (FuzzyKind::Color, "reddish_brown", "brown"),
            (FuzzyKind::Color, "gray", "black"),
            (FuzzyKind::Size, "small", "medium"),
            (FuzzyKind::Size, "small", "large"),
            (FuzzyKind::Symptom, "necrotic_spot", "necrosis_spot"),
            (FuzzyKind::Location, "leaf_upper", "leaf_margin"),
            (FuzzyKind::Location, "petiole", "leaf_margin"),
            (FuzzyKind::Distribution, "clustered", "concentric_rings"),
            (FuzzyKind::Distribution, "scattered", "random"),
        ];
        for (kind, o, e) in cases {
            let outcome = rules.compare(Some(kind), o, e);
            assert_eq!(outcome.kind, MatchKind::Fuzzy, "{kind}: {o} vs {e}");
            assert!(outcome.score > 0.0 && outcome.score < 1.0);
            assert!((rules.compare(Some(kind), e, e).score - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_missing_table_is_exact_only() {
        let rules = FuzzyRuleSet::exact_only();
        assert!(!rules.has_rules(FuzzyKind::Color));
        assert!(!rules.compare(Some(FuzzyKind::Color), "deep_black", "black").is_match());
        assert!(rules.compare(Some(FuzzyKind::Color), "black", "black").is_match());
    }

    #[test]
    fn test_best_match_prefers_exact_then_highest() {
        let rules = sample_rules(2);
        let c = Some(FuzzyKind::Color);

        let outcome = rules.best_match(c, "black", &["deep_black", "black"]);
        assert_eq!(outcome.kind, MatchKind::Exact);

        // Group (0.6) listed before alias (0.9): alias wins
        let outcome = rules.best_match(c, "deep_black", &["gray", "black"]);
        assert_eq!(outcome.matched_value.as_deref(), Some("black"));
        assert!((outcome.score - 0.9).abs() < 1e-9);

        let outcome = rules.best_match(c, "white", &["black", "yellow"]);
        assert_eq!(outcome.kind, MatchKind::None);
        assert!(outcome.reason.contains("black, yellow"));
    }

    #[test]
    fn test_engine_dimension_dispatch() {
        let engine = FuzzyMatchingEngine::new(sample_rules(1));
        let outcome = engine.match_dimension(&Dimension::ColorCenter, "deep_black", &["black"]);
        assert_eq!(outcome.kind, MatchKind::Fuzzy);

        // Organ has no fuzzy family
        let outcome = engine.match_dimension(&Dimension::Organ, "leaf", &["leaves"]);
        assert_eq!(outcome.kind, MatchKind::None);

        assert_eq!(engine.compare(FuzzyKind::Size, "small", "medium").kind, MatchKind::Fuzzy);
    }

    #[test]
    fn test_from_ontology() {
        let ontology: FeatureOntology = serde_json::from_value(serde_json::json!({
            "version": "3.0",
            "dimensions": {"color_center": {"type": "text"}},
            "fuzzy_matching": {
                "color_aliases": {"black": ["deep_black"]},
                "size_order": ["small", "medium"],
                "size_tolerance": 1,
                "synonym_mapping": {}
            }
        }))
        .unwrap();
        let rules = FuzzyRuleSet::from_ontology(&ontology);
        assert_eq!(rules.version(FuzzyKind::Color), Some("3.0"));
        assert!(rules.has_rules(FuzzyKind::Size));
        assert!(!rules.has_rules(FuzzyKind::Symptom));
        assert!(rules.compare(Some(FuzzyKind::Color), "deep_black", "black").is_match());
    }

    #[test]
    fn test_reload_rules_swaps_atomically() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("color_rules.json"),
            r#"{"version": "1", "color_aliases": {"black": ["deep_black"]}}"#,
        )
        .unwrap();

        let engine = FuzzyMatchingEngine::from_dir(dir.path()).unwrap();
        let before = engine.rules();
        assert_eq!(before.version(FuzzyKind::Color), Some("1"));
        assert!(!before.has_rules(FuzzyKind::Size));

        std::fs::write(
            dir.path().join("color_rules.json"),
            r#"{"version": "2", "color_aliases": {}}"#,
        )
        .unwrap();
        engine.reload_rules().unwrap();

        // The captured set is unchanged; new calls see version 2
        assert_eq!(before.version(FuzzyKind::Color), Some("1"));
        assert!(before.compare(Some(FuzzyKind::Color), "deep_black", "black").is_match());
        assert_eq!(engine.rules().version(FuzzyKind::Color), Some("2"));
        assert!(!engine.compare(FuzzyKind::Color, "deep_black", "black").is_match());

        // A broken file leaves version 2 live
        std::fs::write(dir.path().join("size_rules.json"), "{ nope").unwrap();
        assert!(engine.reload_rules().is_err());
        assert_eq!(engine.rules().version(FuzzyKind::Color), Some("2"));
    }
}
