use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::disease::DiseaseDefinition;
use crate::core::observation::FeatureVector;
use crate::core::ontology::{DimensionSpec, FeatureOntology};
use crate::core::types::{Dimension, FuzzyKind};
use crate::knowledge::config::KnowledgeBaseConfig;
use crate::knowledge::error::KnowledgeError;
use crate::knowledge::index::{DiseaseIndex, IndexStatistics};
use crate::knowledge::loader::KnowledgeLoader;
use crate::matching::fuzzy::FuzzyRuleSet;
use crate::matching::reasoning::Reasoning;
use crate::matching::scoring::{DiagnosisScore, ScoredCandidate, ScoringWeights, WeightedScorer};

/// Everything built from one load, replaced as a unit on reload
#[derive(Debug)]
pub struct KnowledgeSnapshot {
    pub index: DiseaseIndex,
    pub ontology: Arc<FeatureOntology>,
    pub scorer: WeightedScorer,

    /// MD5 over the sorted per-file digests of the disease and ontology files
    pub fingerprint: String,

    /// Non-fatal findings from the load
    pub warnings: Vec<String>,

    pub loaded_at: DateTime<Utc>,
}

/// Monitoring view of the live snapshot
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeStatistics {
    #[serde(flatten)]
    pub index: IndexStatistics,
    pub ontology_version: String,

    /// Rule-table version per dimension family; None when exact-only
    pub rule_versions: BTreeMap<String, Option<String>>,

    pub scoring_weights_version: String,
    pub fingerprint: String,
    pub loaded_at: String,
    pub reload_count: u64,
    pub warning_count: usize,
}

/// Facade over the knowledge base.
///
/// Holds one reference to the current [`KnowledgeSnapshot`]. Every query
/// captures that reference once, so it sees either the old or the new
/// snapshot in full. [`reload`](Self::reload) builds a complete new snapshot
/// before publishing it; a failed reload leaves the old one serving.
#[derive(Debug)]
pub struct KnowledgeBaseManager {
    loader: KnowledgeLoader,
    current: RwLock<Arc<KnowledgeSnapshot>>,
    reload_lock: Mutex<()>,
    reload_count: AtomicU64,
}

impl KnowledgeBaseManager {
    /// Load the knowledge base and build the first snapshot.
    ///
    /// # Errors
    ///
    /// Any load error aborts construction.
    pub fn open(config: KnowledgeBaseConfig) -> Result<Self, KnowledgeError> {
        let loader = KnowledgeLoader::new(config);
        let snapshot = build_snapshot(&loader)?;
        Ok(Self {
            loader,
            current: RwLock::new(Arc::new(snapshot)),
            reload_lock: Mutex::new(()),
            reload_count: AtomicU64::new(0),
        })
    }

    #[must_use]
    pub fn config(&self) -> &KnowledgeBaseConfig {
        self.loader.config()
    }

    /// The live snapshot; hold on to it for a consistent multi-step query
    #[must_use]
    pub fn snapshot(&self) -> Arc<KnowledgeSnapshot> {
        Arc::clone(&self.current.read())
    }

    #[must_use]
    pub fn get_disease_by_id(&self, id: &str) -> Option<Arc<DiseaseDefinition>> {
        self.snapshot().index.get(id).cloned()
    }

    #[must_use]
    pub fn get_diseases_by_host(&self, genus: &str) -> Vec<Arc<DiseaseDefinition>> {
        self.snapshot().index.by_host(genus)
    }

    /// Union over several genera, first occurrence wins
    #[must_use]
    pub fn get_diseases_by_hosts<S: AsRef<str>>(&self, genera: &[S]) -> Vec<Arc<DiseaseDefinition>> {
        self.snapshot().index.by_hosts(genera)
    }

    #[must_use]
    pub fn diseases_by_symptom(
        &self,
        symptom_type: &str,
        center_color: Option<&str>,
    ) -> Vec<Arc<DiseaseDefinition>> {
        self.snapshot().index.by_symptom(symptom_type, center_color)
    }

    /// All diseases in load order
    #[must_use]
    pub fn all_diseases(&self) -> Vec<Arc<DiseaseDefinition>> {
        self.snapshot().index.diseases().to_vec()
    }

    #[must_use]
    pub fn match_disease(
        &self,
        observed: &FeatureVector,
        disease: &DiseaseDefinition,
    ) -> (DiagnosisScore, Reasoning) {
        self.snapshot().scorer.score_disease(observed, disease)
    }

    /// Score and rank the given candidates
    #[must_use]
    pub fn match_all_candidates(
        &self,
        observed: &FeatureVector,
        candidates: &[Arc<DiseaseDefinition>],
    ) -> Vec<ScoredCandidate> {
        self.snapshot().scorer.score_candidates(observed, candidates)
    }

    /// Candidate diseases for an observation.
    ///
    /// Tries the host genus first, then symptom type with center color, then
    /// symptom type alone; falls back to every disease.
    #[must_use]
    pub fn candidates_for(&self, observed: &FeatureVector) -> Vec<Arc<DiseaseDefinition>> {
        candidates_in(&self.snapshot(), observed)
    }

    /// Pre-filter and rank against one snapshot
    #[must_use]
    pub fn diagnose(&self, observed: &FeatureVector) -> Vec<ScoredCandidate> {
        let snapshot = self.snapshot();
        let candidates = candidates_in(&snapshot, observed);
        snapshot.scorer.score_candidates(observed, &candidates)
    }

    #[must_use]
    pub fn ontology(&self) -> Arc<FeatureOntology> {
        Arc::clone(&self.snapshot().ontology)
    }

    /// Ontology entry for a dimension id
    #[must_use]
    pub fn dimension(&self, id: &str) -> Option<DimensionSpec> {
        self.snapshot()
            .ontology
            .dimension(&Dimension::parse(id))
            .cloned()
    }

    /// Rebuild the whole snapshot from disk and publish it.
    ///
    /// # Errors
    ///
    /// `ReloadInProgress` when another reload holds the lock; otherwise any
    /// load error. The previous snapshot stays live on every error.
    pub fn reload(&self) -> Result<Arc<KnowledgeSnapshot>, KnowledgeError> {
        let Some(_guard) = self.reload_lock.try_lock() else {
            return Err(KnowledgeError::ReloadInProgress);
        };

        let snapshot = match build_snapshot(&self.loader) {
            Ok(snapshot) => Arc::new(snapshot),
            Err(e) => {
                warn!(error = %e, "Reload failed, keeping current knowledge base");
                return Err(e);
            }
        };

        *self.current.write() = Arc::clone(&snapshot);
        let count = self.reload_count.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            reload = count,
            diseases = snapshot.index.len(),
            fingerprint = %snapshot.fingerprint,
            "Knowledge base reloaded"
        );
        Ok(snapshot)
    }

    /// Re-read the fuzzy rule tables of the live snapshot
    ///
    /// # Errors
    ///
    /// `ReloadInProgress` or a rule load error; current tables stay in place.
    pub fn reload_rules(&self) -> Result<Arc<FuzzyRuleSet>, KnowledgeError> {
        let Some(_guard) = self.reload_lock.try_lock() else {
            return Err(KnowledgeError::ReloadInProgress);
        };
        self.snapshot().scorer.engine().reload_rules()
    }

    /// Re-read the scoring weights of the live snapshot
    ///
    /// # Errors
    ///
    /// `ReloadInProgress` or a weight load error; current weights stay in place.
    pub fn reload_weights(&self) -> Result<Arc<ScoringWeights>, KnowledgeError> {
        let Some(_guard) = self.reload_lock.try_lock() else {
            return Err(KnowledgeError::ReloadInProgress);
        };
        self.snapshot().scorer.reload_weights()
    }

    #[must_use]
    pub fn statistics(&self) -> KnowledgeStatistics {
        let snapshot = self.snapshot();
        let rules = snapshot.scorer.engine().rules();

        KnowledgeStatistics {
            index: snapshot.index.statistics(),
            ontology_version: snapshot.ontology.version().to_string(),
            rule_versions: FuzzyKind::ALL
                .iter()
                .map(|kind| (kind.to_string(), rules.version(*kind).map(str::to_string)))
                .collect(),
            scoring_weights_version: snapshot.scorer.weights().version.clone(),
            fingerprint: snapshot.fingerprint.clone(),
            loaded_at: snapshot
                .loaded_at
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            reload_count: self.reload_count.load(Ordering::Relaxed),
            warning_count: snapshot.warnings.len(),
        }
    }
}

fn build_snapshot(loader: &KnowledgeLoader) -> Result<KnowledgeSnapshot, KnowledgeError> {
    let loaded = Arc::new(loader.load_fresh()?);
    let scorer = WeightedScorer::from_config(loader.config())?;
    let index = DiseaseIndex::build(loaded.diseases.clone());
    loader.set_last_good(Arc::clone(&loaded));

    Ok(KnowledgeSnapshot {
        index,
        ontology: Arc::clone(&loaded.ontology),
        scorer,
        fingerprint: loaded.fingerprint.clone(),
        warnings: loaded.warnings.clone(),
        loaded_at: Utc::now(),
    })
}

fn candidates_in(
    snapshot: &KnowledgeSnapshot,
    observed: &FeatureVector,
) -> Vec<Arc<DiseaseDefinition>> {
    if let Some(genus) = observed.get(&Dimension::HostGenus) {
        let by_host = snapshot.index.by_host(genus);
        if !by_host.is_empty() {
            return by_host;
        }
    }

    if let Some(symptom) = observed.get(&Dimension::SymptomType) {
        let color = observed.get(&Dimension::ColorCenter);
        let by_symptom = snapshot.index.by_symptom(symptom, color);
        if !by_symptom.is_empty() {
            return by_symptom;
        }
        if color.is_some() {
            let by_symptom = snapshot.index.by_symptom(symptom, None);
            if !by_symptom.is_empty() {
                return by_symptom;
            }
        }
    }

    snapshot.index.diseases().to_vec()
}
