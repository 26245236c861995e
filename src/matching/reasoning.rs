use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;
use std::fmt;

use crate::core::types::{Completeness, ConfidenceTier, DiseaseId, Dimension, ImportanceTier, MatchKind};
use crate::matching::fuzzy::FuzzyRule;
use crate::matching::scoring::classify;

/// How one expected feature fared against the observation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchDetail {
    pub tier: ImportanceTier,
    pub dimension: Dimension,

    /// Observed value, normalized; None when the observation is silent
    pub observed: Option<String>,

    /// Expected values, normalized, in definition order
    pub expected: Vec<String>,

    /// Expected value that produced the match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_value: Option<String>,

    pub match_kind: MatchKind,

    /// Score returned by the comparison, before weighting
    pub match_score: f64,

    /// Feature weight inside its tier
    pub weight: f64,

    /// `match_score * weight`
    pub contribution: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<FuzzyRule>,

    pub explanation: String,
}

/// Score of one importance tier before tiers are combined
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TierScore {
    pub tier: ImportanceTier,

    /// Sum of weighted contributions (not re-normalized)
    pub score: f64,

    /// Group weight used when combining tiers
    pub group_weight: f64,

    pub matched: usize,
    pub total: usize,
}

impl TierScore {
    /// A tier without features takes no part in the combination
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Audit trail for one disease scored against one observation.
///
/// The confidence tier is derived from `final_score` and the major tier's
/// coverage whenever it is asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct Reasoning {
    pub disease_id: DiseaseId,
    pub disease_name: String,
    pub tiers: Vec<TierScore>,
    pub details: Vec<MatchDetail>,
    pub raw_score: f64,
    pub completeness: Completeness,
    pub completeness_factor: f64,
    pub final_score: f64,
}

impl Reasoning {
    /// Matched and total features of the major tier
    #[must_use]
    pub fn major_coverage(&self) -> (usize, usize) {
        self.tiers
            .iter()
            .find(|t| t.tier == ImportanceTier::Major)
            .map_or((0, 0), |t| (t.matched, t.total))
    }

    #[must_use]
    pub fn confidence(&self) -> ConfidenceTier {
        let (matched, total) = self.major_coverage();
        classify(self.final_score, matched, total)
    }

    /// Details of one tier, in definition order
    pub fn details_for(&self, tier: ImportanceTier) -> impl Iterator<Item = &MatchDetail> {
        self.details.iter().filter(move |d| d.tier == tier)
    }

    /// One-line verdict
    #[must_use]
    pub fn summary(&self) -> String {
        let (matched, total) = self.major_coverage();
        format!(
            "{} ({}): {} at {:.1}% with {matched}/{total} major features",
            self.disease_name,
            self.disease_id,
            self.confidence(),
            self.final_score * 100.0
        )
    }
}

impl Serialize for Reasoning {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Reasoning", 9)?;
        s.serialize_field("disease_id", &self.disease_id)?;
        s.serialize_field("disease_name", &self.disease_name)?;
        s.serialize_field("tiers", &self.tiers)?;
        s.serialize_field("details", &self.details)?;
        s.serialize_field("raw_score", &self.raw_score)?;
        s.serialize_field("completeness", &self.completeness)?;
        s.serialize_field("completeness_factor", &self.completeness_factor)?;
        s.serialize_field("final_score", &self.final_score)?;
        s.serialize_field("confidence", &self.confidence())?;
        s.end()
    }
}

impl fmt::Display for Reasoning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary())?;

        for tier in &self.tiers {
            if tier.is_empty() {
                continue;
            }
            writeln!(
                f,
                "  {} features ({}/{} matched, tier score {:.3}, weight {:.2})",
                tier.tier, tier.matched, tier.total, tier.score, tier.group_weight
            )?;
            for detail in self.details_for(tier.tier) {
                let marker = match detail.match_kind {
                    MatchKind::Exact => "=",
                    MatchKind::Fuzzy => "~",
                    MatchKind::None => "x",
                };
                writeln!(
                    f,
                    "    [{marker}] {}: +{:.3} ({})",
                    detail.dimension, detail.contribution, detail.explanation
                )?;
            }
        }

        write!(f, "  raw {:.3}", self.raw_score)?;
        if (self.completeness_factor - 1.0).abs() > f64::EPSILON {
            write!(
                f,
                " x {:.2} ({} view)",
                self.completeness_factor, self.completeness
            )?;
        }
        writeln!(f, " = {:.3}", self.final_score)
    }
}
