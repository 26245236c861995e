use serde::Serialize;

use crate::core::disease::{DiseaseDefinition, FeatureExpectation};
use crate::core::observation::FeatureVector;
use crate::core::types::{normalize_value, Dimension, FuzzyKind, ImportanceTier, MatchKind};
use crate::knowledge::config::default_fuzzy_dimensions;
use crate::matching::fuzzy::FuzzyRuleSet;
use crate::matching::reasoning::{MatchDetail, TierScore};
use crate::matching::scoring::TierWeights;

/// Safely convert usize to f64 for averaging
#[inline]
fn count_to_f64(count: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    {
        count as f64
    }
}

/// Which dimensions are compared with fuzzy rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatcherConfig {
    pub fuzzy_dimensions: Vec<Dimension>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            fuzzy_dimensions: default_fuzzy_dimensions(),
        }
    }
}

impl MatcherConfig {
    /// Rule family used for `dimension`; None means exact comparison
    #[must_use]
    pub fn fuzzy_kind(&self, dimension: &Dimension) -> Option<FuzzyKind> {
        if self.fuzzy_dimensions.contains(dimension) {
            dimension.fuzzy_kind()
        } else {
            None
        }
    }
}

/// Result of matching one observation against one disease, before the
/// completeness correction
#[derive(Debug, Clone, Serialize)]
pub struct FeatureMatchOutcome {
    pub tiers: Vec<TierScore>,

    /// Tiers combined by group weight and clamped to 1.0
    pub raw_total: f64,

    pub major_matched: usize,
    pub major_total: usize,
    pub details: Vec<MatchDetail>,
}

impl FeatureMatchOutcome {
    /// Score of one tier, 0.0 when the tier is empty
    #[must_use]
    pub fn tier_score(&self, tier: ImportanceTier) -> f64 {
        self.tiers
            .iter()
            .find(|t| t.tier == tier)
            .map_or(0.0, |t| t.score)
    }
}

/// Per-feature matcher: walks a disease's importance tiers and compares each
/// expected feature with the observation.
#[derive(Debug, Clone, Default)]
pub struct FeatureMatcher {
    config: MatcherConfig,
}

impl FeatureMatcher {
    #[must_use]
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Match an observation against a disease.
    ///
    /// A dimension the observation does not carry is a no-match with score 0.
    #[must_use]
    pub fn match_disease(
        &self,
        observed: &FeatureVector,
        disease: &DiseaseDefinition,
        rules: &FuzzyRuleSet,
        tier_weights: &TierWeights,
    ) -> FeatureMatchOutcome {
        let mut tiers = Vec::with_capacity(ImportanceTier::ALL.len());
        let mut details = Vec::new();

        for (tier, group) in disease.feature_importance.tiers() {
            let mut tier_score = TierScore {
                tier,
                score: 0.0,
                group_weight: group.weight.unwrap_or_else(|| tier_weights.get(tier)),
                matched: 0,
                total: group.features.len(),
            };

            for feature in &group.features {
                let detail = self.match_feature(tier, feature, observed, rules);
                tier_score.score += detail.contribution;
                if detail.match_kind.is_match() {
                    tier_score.matched += 1;
                }
                details.push(detail);
            }

            tiers.push(tier_score);
        }

        let (major_matched, major_total) = tiers
            .iter()
            .find(|t| t.tier == ImportanceTier::Major)
            .map_or((0, 0), |t| (t.matched, t.total));

        FeatureMatchOutcome {
            raw_total: combine_tiers(&tiers),
            tiers,
            major_matched,
            major_total,
            details,
        }
    }

    fn match_feature(
        &self,
        tier: ImportanceTier,
        feature: &FeatureExpectation,
        observed: &FeatureVector,
        rules: &FuzzyRuleSet,
    ) -> MatchDetail {
        let mut expected: Vec<String> = Vec::new();
        for value in feature.expected_values.iter() {
            let normalized = normalize_value(value);
            if !normalized.is_empty() && !expected.contains(&normalized) {
                expected.push(normalized);
            }
        }

        let Some(value) = observed.get(&feature.dimension) else {
            return MatchDetail {
                tier,
                dimension: feature.dimension.clone(),
                observed: None,
                expected,
                matched_value: None,
                match_kind: MatchKind::None,
                match_score: 0.0,
                weight: feature.weight,
                contribution: 0.0,
                rule: None,
                explanation: format!("no observed value for '{}'", feature.dimension),
            };
        };

        let kind = self.config.fuzzy_kind(&feature.dimension);
        let outcome = rules.best_match(kind, value, &expected);

        MatchDetail {
            tier,
            dimension: feature.dimension.clone(),
            observed: Some(normalize_value(value)),
            expected,
            matched_value: outcome.matched_value,
            match_kind: outcome.kind,
            match_score: outcome.score,
            weight: feature.weight,
            contribution: outcome.score * feature.weight,
            rule: outcome.rule,
            explanation: outcome.reason,
        }
    }
}

/// Combine tier scores into the raw total.
///
/// The total is the group-weighted sum of the tier scores. The group weight
/// of an empty tier is handed to the tiers with features in proportion to
/// their own weights, so an empty tier is neither a miss nor a free pass.
/// When every tier has features nothing is rescaled. The result is clamped
/// to `[0, 1]`.
#[must_use]
pub fn combine_tiers(tiers: &[TierScore]) -> f64 {
    let (active, empty): (Vec<&TierScore>, Vec<&TierScore>) =
        tiers.iter().partition(|t| !t.is_empty());
    if active.is_empty() {
        return 0.0;
    }

    let active_weight: f64 = active.iter().map(|t| t.group_weight).sum();
    let spare_weight: f64 = empty.iter().map(|t| t.group_weight).sum();
    let weighted: f64 = active.iter().map(|t| t.group_weight * t.score).sum();

    let combined = if spare_weight <= 0.0 {
        weighted
    } else if active_weight > 0.0 {
        weighted * (active_weight + spare_weight) / active_weight
    } else {
        // Active tiers carry no weight of their own: split the spare evenly
        spare_weight * active.iter().map(|t| t.score).sum::<f64>() / count_to_f64(active.len())
    };

    combined.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::rules::{ColorRules, RuleTable, SizeRules};

    fn black_spot() -> DiseaseDefinition {
        serde_json::from_value(serde_json::json!({
            "version": "1.0",
            "disease_id": "rose_black_spot",
            "disease_name": "Rose black spot",
            "feature_importance": {
                "major_features": {
                    "features": [
                        {"dimension": "symptom_type", "expected_values": ["necrosis_spot"], "weight": 0.5},
                        {"dimension": "color_border", "expected_values": ["yellow", "light_yellow"], "weight": 0.5}
                    ]
                },
                "minor_features": {
                    "features": [
                        {"dimension": "color_center", "expected_values": ["black"], "weight": 0.6},
                        {"dimension": "location", "expected_values": ["leaf_upper"], "weight": 0.4}
                    ]
                }
            },
            "host_plants": ["Rosa"]
        }))
        .unwrap()
    }

    fn rules() -> FuzzyRuleSet {
        let mut color: ColorRules = serde_json::from_value(serde_json::json!({
            "version": "1.0",
            "color_aliases": {"black": ["deep_black"]}
        }))
        .unwrap();
        color.rebuild_indexes();
        let mut size: SizeRules = serde_json::from_value(serde_json::json!({
            "version": "1.0",
            "size_order": ["pinpoint", "small", "medium", "large"],
            "tolerance": 1
        }))
        .unwrap();
        size.rebuild_indexes();
        FuzzyRuleSet {
            color: Some(color),
            size: Some(size),
            ..FuzzyRuleSet::default()
        }
    }

    fn observation(center: &str) -> FeatureVector {
        serde_json::from_value(serde_json::json!({
            "symptom_type": "necrosis_spot",
            "color_center": center,
            "color_border": "yellow",
            "completeness": "complete"
        }))
        .unwrap()
    }

    #[test]
    fn test_all_major_features_match() {
        let outcome = FeatureMatcher::default().match_disease(
            &observation("black"),
            &black_spot(),
            &rules(),
            &TierWeights::default(),
        );
        assert_eq!(outcome.major_matched, 2);
        assert_eq!(outcome.major_total, 2);
        assert!((outcome.tier_score(ImportanceTier::Major) - 1.0).abs() < 0.001);
        // Minor: center color matches (0.6), location missing
        assert!((outcome.tier_score(ImportanceTier::Minor) - 0.6).abs() < 0.001);
        // Optional is empty: (0.8 * 1.0 + 0.15 * 0.6) / 0.95
        assert!((outcome.raw_total - 0.89 / 0.95).abs() < 0.001);
    }

    #[test]
    fn test_alias_contributes_weighted_fuzzy_score() {
        let outcome = FeatureMatcher::default().match_disease(
            &observation("deep_black"),
            &black_spot(),
            &rules(),
            &TierWeights::default(),
        );
        let center = outcome
            .details
            .iter()
            .find(|d| d.dimension == Dimension::ColorCenter)
            .unwrap();
        assert_eq!(center.match_kind, MatchKind::Fuzzy);
        assert!((center.contribution - 0.9 * 0.6).abs() < 0.001);
        assert!(center.explanation.contains("alias"));
    }

    #[test]
    fn test_missing_dimension_is_no_match() {
        let outcome = FeatureMatcher::default().match_disease(
            &observation("black"),
            &black_spot(),
            &rules(),
            &TierWeights::default(),
        );
        let location = outcome
            .details
            .iter()
            .find(|d| d.dimension == Dimension::Location)
            .unwrap();
        assert_eq!(location.match_kind, MatchKind::None);
        assert_eq!(location.contribution, 0.0);
        assert!(location.observed.is_none());
    }

    #[test]
    fn test_non_fuzzy_dimension_is_exact_only() {
        // Location is not routed through the fuzzy engine by default
        let matcher = FeatureMatcher::default();
        assert_eq!(matcher.config().fuzzy_kind(&Dimension::Location), None);
        assert_eq!(
            matcher.config().fuzzy_kind(&Dimension::ColorCenter),
            Some(FuzzyKind::Color)
        );

        let opted_in = FeatureMatcher::new(MatcherConfig {
            fuzzy_dimensions: vec![Dimension::Location],
        });
        assert_eq!(
            opted_in.config().fuzzy_kind(&Dimension::Location),
            Some(FuzzyKind::Location)
        );
        assert_eq!(opted_in.config().fuzzy_kind(&Dimension::ColorCenter), None);
    }

    #[test]
    fn test_group_weight_override() {
        let mut disease = black_spot();
        disease.feature_importance.minor_features.weight = Some(0.0);
        let outcome = FeatureMatcher::default().match_disease(
            &observation("black"),
            &disease,
            &rules(),
            &TierWeights::default(),
        );
        // Minor tier carries no weight; the empty optional tier's 0.05 moves to major
        assert!((outcome.raw_total - 0.85).abs() < 0.001);
    }

    #[test]
    fn test_combine_tiers() {
        let tier = |tier, score, group_weight, total| TierScore {
            tier,
            score,
            group_weight,
            matched: 0,
            total,
        };

        assert_eq!(combine_tiers(&[]), 0.0);

        let all = [
            tier(ImportanceTier::Major, 1.0, 0.8, 2),
            tier(ImportanceTier::Minor, 0.5, 0.15, 2),
            tier(ImportanceTier::Optional, 0.0, 0.05, 1),
        ];
        assert!((combine_tiers(&all) - 0.875).abs() < 0.001);

        // Over-weighted configuration is clamped
        let heavy = [
            tier(ImportanceTier::Major, 1.5, 1.0, 2),
            tier(ImportanceTier::Minor, 1.0, 0.0, 0),
        ];
        assert!((combine_tiers(&heavy) - 1.0).abs() < 0.001);

        let zero = [
            tier(ImportanceTier::Major, 0.8, 0.0, 1),
            tier(ImportanceTier::Minor, 0.4, 0.0, 1),
            tier(ImportanceTier::Optional, 0.0, 1.0, 0),
        ];
        assert!((combine_tiers(&zero) - 0.6).abs() < 0.001);
    }

    #[test]
    fn test_combine_tiers_without_empty_tiers_is_weighted_sum() {
        let tier = |tier, score, group_weight| TierScore {
            tier,
            score,
            group_weight,
            matched: 0,
            total: 1,
        };

        // Weights summing to 1.1 are not renormalized
        let partial_override = [
            tier(ImportanceTier::Major, 1.0, 0.9),
            tier(ImportanceTier::Minor, 0.0, 0.15),
            tier(ImportanceTier::Optional, 0.0, 0.05),
        ];
        assert!((combine_tiers(&partial_override) - 0.9).abs() < 0.001);

        let lenient = [
            tier(ImportanceTier::Major, 1.0, 0.9),
            tier(ImportanceTier::Minor, 0.0, 0.3),
            tier(ImportanceTier::Optional, 0.0, 0.1),
        ];
        assert!((combine_tiers(&lenient) - 0.9).abs() < 0.001);

        let over = [
            tier(ImportanceTier::Major, 1.0, 0.9),
            tier(ImportanceTier::Minor, 1.0, 0.3),
            tier(ImportanceTier::Optional, 0.0, 0.1),
        ];
        assert!((combine_tiers(&over) - 1.0).abs() < 0.001);
    }
}
