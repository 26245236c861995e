use parking_lot::RwLock;
use rayon::prelude::*;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::core::disease::DiseaseDefinition;
use crate::core::observation::FeatureVector;
use crate::core::types::{Completeness, ConfidenceTier, ImportanceTier};
use crate::knowledge::config::KnowledgeBaseConfig;
use crate::knowledge::error::KnowledgeError;
use crate::knowledge::loader::read_typed;
use crate::matching::features::{FeatureMatcher, MatcherConfig};
use crate::matching::fuzzy::{FuzzyMatchingEngine, FuzzyRuleSet};
use crate::matching::reasoning::Reasoning;
use crate::utils::validation::{check_unit_interval, check_weight_sum};

/// Minimum corrected score for a confirmed diagnosis
pub const CONFIRMED_THRESHOLD: f64 = 0.85;

/// Minimum corrected score for a suspected diagnosis
pub const SUSPECTED_THRESHOLD: f64 = 0.60;

/// Default group weight of each importance tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierWeights {
    pub major: f64,
    pub minor: f64,
    pub optional: f64,
}

impl Default for TierWeights {
    fn default() -> Self {
        Self {
            major: 0.80,    // 80%
            minor: 0.15,    // 15%
            optional: 0.05, // 5%
        }
    }
}

impl TierWeights {
    #[must_use]
    pub fn get(&self, tier: ImportanceTier) -> f64 {
        match tier {
            ImportanceTier::Major => self.major,
            ImportanceTier::Minor => self.minor,
            ImportanceTier::Optional => self.optional,
        }
    }

    fn sum(&self) -> f64 {
        self.major + self.minor + self.optional
    }
}

/// Score multiplier per observation completeness
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompletenessFactors {
    pub complete: f64,
    pub partial: f64,
    pub close_up: f64,
}

impl Default for CompletenessFactors {
    fn default() -> Self {
        Self {
            complete: 1.0,
            partial: 0.8,
            close_up: 0.6,
        }
    }
}

impl CompletenessFactors {
    /// Factor for a completeness level; unrecognised levels are not corrected
    #[must_use]
    pub fn factor(&self, completeness: Completeness) -> f64 {
        match completeness {
            Completeness::Complete => self.complete,
            Completeness::Partial => self.partial,
            Completeness::CloseUp => self.close_up,
            Completeness::Unknown => 1.0,
        }
    }
}

fn builtin_version() -> String {
    "builtin".to_string()
}

/// Tier-weight and completeness-factor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    #[serde(default = "builtin_version")]
    pub version: String,

    #[serde(default)]
    pub tier_weights: TierWeights,

    #[serde(default)]
    pub completeness_factors: CompletenessFactors,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            version: builtin_version(),
            tier_weights: TierWeights::default(),
            completeness_factors: CompletenessFactors::default(),
        }
    }
}

impl ScoringWeights {
    /// Every weight-invariant violation, empty when the configuration is sound
    #[must_use]
    pub fn violations(&self) -> Vec<String> {
        let mut issues = Vec::new();

        for tier in ImportanceTier::ALL {
            let w = self.tier_weights.get(tier);
            if let Some(issue) = check_unit_interval(w, &format!("{tier} tier weight")) {
                issues.push(issue);
            }
        }
        if let Some(issue) = check_weight_sum(self.tier_weights.sum(), 1.0, "tier weights") {
            issues.push(issue);
        }

        let factors = &self.completeness_factors;
        for (name, value) in [
            ("complete", factors.complete),
            ("partial", factors.partial),
            ("close_up", factors.close_up),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                issues.push(format!(
                    "completeness factor '{name}' is {value}, expected a value in (0, 1]"
                ));
            }
        }

        issues
    }

    /// Read the configuration file; a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Load errors for unreadable or malformed files. Weight violations are
    /// validation errors when `strict` and warnings otherwise.
    pub fn load(path: &Path, strict: bool) -> Result<Self, KnowledgeError> {
        let weights = match read_typed::<Self>(path, "scoring weights") {
            Ok((weights, _digest)) => weights,
            Err(KnowledgeError::NotFound { .. }) => {
                debug!(path = %path.display(), "No scoring weights file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e),
        };

        let issues = weights.violations();
        if let Some(first) = issues.first() {
            if strict {
                return Err(KnowledgeError::validation(
                    format!("scoring weights {}", path.display()),
                    first.clone(),
                ));
            }
            for issue in &issues {
                warn!(path = %path.display(), "{issue}");
            }
        }

        Ok(weights)
    }
}

/// Classify a diagnosis from its corrected score and major-feature coverage.
///
/// Confirmed needs every major feature; suspected needs at least half of them
/// (rounded up).
#[must_use]
pub fn classify(score: f64, major_matched: usize, major_total: usize) -> ConfidenceTier {
    if score >= CONFIRMED_THRESHOLD && major_matched >= major_total {
        ConfidenceTier::Confirmed
    } else if score >= SUSPECTED_THRESHOLD && major_matched >= major_total.div_ceil(2) {
        ConfidenceTier::Suspected
    } else {
        ConfidenceTier::Unlikely
    }
}

/// Final score of one disease for one observation.
///
/// The confidence tier is derived on demand from the stored inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiagnosisScore {
    total: f64,
    major: f64,
    minor: f64,
    optional: f64,
    major_matched: usize,
    major_total: usize,
}

impl DiagnosisScore {
    /// Build a score; `total` is clamped to `[0, 1]`
    #[must_use]
    pub fn new(
        total: f64,
        tier_scores: [f64; 3],
        major_matched: usize,
        major_total: usize,
    ) -> Self {
        let [major, minor, optional] = tier_scores;
        Self {
            total: total.clamp(0.0, 1.0),
            major,
            minor,
            optional,
            major_matched,
            major_total,
        }
    }

    /// Completeness-corrected total in `[0, 1]`
    #[must_use]
    pub fn total(&self) -> f64 {
        self.total
    }

    #[must_use]
    pub fn tier_score(&self, tier: ImportanceTier) -> f64 {
        match tier {
            ImportanceTier::Major => self.major,
            ImportanceTier::Minor => self.minor,
            ImportanceTier::Optional => self.optional,
        }
    }

    #[must_use]
    pub fn major_matched(&self) -> usize {
        self.major_matched
    }

    #[must_use]
    pub fn major_total(&self) -> usize {
        self.major_total
    }

    #[must_use]
    pub fn confidence(&self) -> ConfidenceTier {
        classify(self.total, self.major_matched, self.major_total)
    }
}

impl Serialize for DiagnosisScore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("DiagnosisScore", 7)?;
        s.serialize_field("total", &self.total)?;
        s.serialize_field("major", &self.major)?;
        s.serialize_field("minor", &self.minor)?;
        s.serialize_field("optional", &self.optional)?;
        s.serialize_field("major_matched", &self.major_matched)?;
        s.serialize_field("major_total", &self.major_total)?;
        s.serialize_field("confidence", &self.confidence())?;
        s.end()
    }
}

/// One ranked candidate
#[derive(Debug, Clone, Serialize)]
pub struct ScoredCandidate {
    #[serde(skip)]
    pub disease: Arc<DiseaseDefinition>,
    pub score: DiagnosisScore,
    pub reasoning: Reasoning,
}

/// Score a disease with explicit tables; pure with respect to its inputs
#[must_use]
pub fn score_with(
    matcher: &FeatureMatcher,
    rules: &FuzzyRuleSet,
    weights: &ScoringWeights,
    observed: &FeatureVector,
    disease: &DiseaseDefinition,
) -> (DiagnosisScore, Reasoning) {
    let outcome = matcher.match_disease(observed, disease, rules, &weights.tier_weights);

    let completeness = observed.completeness();
    let factor = weights.completeness_factors.factor(completeness);
    let corrected = (outcome.raw_total * factor).min(1.0);

    let score = DiagnosisScore::new(
        corrected,
        [
            outcome.tier_score(ImportanceTier::Major),
            outcome.tier_score(ImportanceTier::Minor),
            outcome.tier_score(ImportanceTier::Optional),
        ],
        outcome.major_matched,
        outcome.major_total,
    );

    let reasoning = Reasoning {
        disease_id: disease.disease_id.clone(),
        disease_name: disease.disease_name.clone(),
        tiers: outcome.tiers,
        details: outcome.details,
        raw_score: outcome.raw_total,
        completeness,
        completeness_factor: factor,
        final_score: score.total(),
    };

    (score, reasoning)
}

/// Weighted diagnosis scorer with hot-swappable weights.
///
/// Rule tables and weights are captured once per call, so a whole candidate
/// batch is scored against one consistent configuration.
#[derive(Debug)]
pub struct WeightedScorer {
    engine: Arc<FuzzyMatchingEngine>,
    matcher: FeatureMatcher,
    weights: RwLock<Arc<ScoringWeights>>,
    weights_path: Option<PathBuf>,
    strict_weights: bool,
}

impl WeightedScorer {
    /// Scorer over fixed weights; `reload_weights` keeps them
    #[must_use]
    pub fn new(
        engine: Arc<FuzzyMatchingEngine>,
        matcher: FeatureMatcher,
        weights: ScoringWeights,
    ) -> Self {
        Self {
            engine,
            matcher,
            weights: RwLock::new(Arc::new(weights)),
            weights_path: None,
            strict_weights: true,
        }
    }

    /// Scorer reading its weights and rule tables from a knowledge base layout
    ///
    /// # Errors
    ///
    /// Propagates rule-table and weight-file load errors.
    pub fn from_config(config: &KnowledgeBaseConfig) -> Result<Self, KnowledgeError> {
        let engine = Arc::new(FuzzyMatchingEngine::from_dir(&config.fuzzy_rules_dir)?);
        let weights = ScoringWeights::load(&config.scoring_weights_path, config.strict_weights)?;
        let matcher = FeatureMatcher::new(MatcherConfig {
            fuzzy_dimensions: config.fuzzy_dimensions.clone(),
        });

        Ok(Self {
            engine,
            matcher,
            weights: RwLock::new(Arc::new(weights)),
            weights_path: Some(config.scoring_weights_path.clone()),
            strict_weights: config.strict_weights,
        })
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<FuzzyMatchingEngine> {
        &self.engine
    }

    #[must_use]
    pub fn matcher(&self) -> &FeatureMatcher {
        &self.matcher
    }

    /// Weights new calls will use
    #[must_use]
    pub fn weights(&self) -> Arc<ScoringWeights> {
        Arc::clone(&self.weights.read())
    }

    /// Score one disease against an observation
    #[must_use]
    pub fn score_disease(
        &self,
        observed: &FeatureVector,
        disease: &DiseaseDefinition,
    ) -> (DiagnosisScore, Reasoning) {
        let rules = self.engine.rules();
        let weights = self.weights();
        score_with(&self.matcher, &rules, &weights, observed, disease)
    }

    /// Score every candidate independently and rank them.
    ///
    /// Sorted by total score, then by matched major features, both descending.
    /// The sort is stable, so equal candidates keep their input order.
    #[must_use]
    pub fn score_candidates(
        &self,
        observed: &FeatureVector,
        candidates: &[Arc<DiseaseDefinition>],
    ) -> Vec<ScoredCandidate> {
        let rules = self.engine.rules();
        let weights = self.weights();

        let mut scored: Vec<ScoredCandidate> = candidates
            .par_iter()
            .map(|disease| {
                let (score, reasoning) =
                    score_with(&self.matcher, &rules, &weights, observed, disease);
                debug!(
                    disease = %disease.disease_id,
                    score = score.total(),
                    confidence = %score.confidence(),
                    "Scored candidate"
                );
                ScoredCandidate {
                    disease: Arc::clone(disease),
                    score,
                    reasoning,
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .total()
                .total_cmp(&a.score.total())
                .then_with(|| b.score.major_matched().cmp(&a.score.major_matched()))
        });

        scored
    }

    /// Re-read the weight file and swap it in.
    ///
    /// # Errors
    ///
    /// On any load error the current weights stay in place.
    pub fn reload_weights(&self) -> Result<Arc<ScoringWeights>, KnowledgeError> {
        let Some(path) = &self.weights_path else {
            return Ok(self.weights());
        };
        let fresh = Arc::new(ScoringWeights::load(path, self.strict_weights)?);
        *self.weights.write() = Arc::clone(&fresh);
        info!(version = %fresh.version, "Reloaded scoring weights");
        Ok(fresh)
    }
}
