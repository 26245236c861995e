use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::core::disease::DiseaseDefinition;
use crate::core::ontology::FeatureOntology;
use crate::core::types::{normalize_value, DiseaseId};
use crate::knowledge::config::KnowledgeBaseConfig;
use crate::knowledge::error::KnowledgeError;
use crate::matching::scoring::{ScoringWeights, TierWeights};
use crate::utils::validation::{check_file_size, compute_fingerprint, content_digest};

/// Everything one successful load produced
#[derive(Debug)]
pub struct LoadedKnowledge {
    /// Diseases in file-name order
    pub diseases: Vec<Arc<DiseaseDefinition>>,

    pub ontology: Arc<FeatureOntology>,

    /// MD5 over the sorted digests of every file that was read
    pub fingerprint: String,

    /// Non-fatal findings (lenient weight checks, ontology mismatches)
    pub warnings: Vec<String>,
}

/// Result of reading the diseases directory
struct DiseaseBatch {
    diseases: Vec<DiseaseDefinition>,
    digests: Vec<String>,
    warnings: Vec<String>,
}

/// Reads disease definitions and the feature ontology from disk.
///
/// The loader remembers the last successful [`reload`](Self::reload); a failed
/// reload never clears it.
#[derive(Debug)]
pub struct KnowledgeLoader {
    config: KnowledgeBaseConfig,
    last_good: RwLock<Option<Arc<LoadedKnowledge>>>,
}

impl KnowledgeLoader {
    #[must_use]
    pub fn new(config: KnowledgeBaseConfig) -> Self {
        Self {
            config,
            last_good: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn config(&self) -> &KnowledgeBaseConfig {
        &self.config
    }

    /// The last successfully loaded knowledge, if any
    #[must_use]
    pub fn last_good(&self) -> Option<Arc<LoadedKnowledge>> {
        self.last_good.read().clone()
    }

    /// Load every disease definition.
    ///
    /// Fails as a whole on the first bad file; nothing is cached.
    ///
    /// # Errors
    ///
    /// `NotFound` if the diseases directory is missing or holds no JSON files,
    /// `Io`/`Parse` if a file cannot be read or is not JSON, `Validation` if a
    /// file does not describe a valid disease or two files share an id.
    pub fn load_all_diseases(&self) -> Result<Vec<DiseaseDefinition>, KnowledgeError> {
        Ok(self.read_diseases()?.diseases)
    }

    /// Load the feature ontology.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`load_all_diseases`](Self::load_all_diseases).
    pub fn load_feature_ontology(&self) -> Result<FeatureOntology, KnowledgeError> {
        Ok(self.read_ontology()?.0)
    }

    /// Find one disease by id.
    ///
    /// Served from the last good load when there is one, otherwise the
    /// diseases directory is scanned.
    ///
    /// # Errors
    ///
    /// Propagates load errors when scanning the directory.
    pub fn load_disease_by_id(
        &self,
        id: &str,
    ) -> Result<Option<Arc<DiseaseDefinition>>, KnowledgeError> {
        if let Some(loaded) = self.last_good() {
            return Ok(loaded
                .diseases
                .iter()
                .find(|d| d.disease_id.as_str() == id)
                .cloned());
        }

        for path in list_json_files(&self.config.diseases_dir)? {
            let (disease, _) = read_typed::<DiseaseDefinition>(&path, "disease file")?;
            if disease.disease_id.as_str() == id {
                return Ok(Some(Arc::new(disease)));
            }
        }
        Ok(None)
    }

    /// Ids of the diseases listing `genus` as a host, from the last good load
    #[must_use]
    pub fn diseases_for_host(&self, genus: &str) -> Vec<DiseaseId> {
        let genus = normalize_value(genus);
        self.last_good()
            .map(|loaded| {
                loaded
                    .diseases
                    .iter()
                    .filter(|d| d.host_plants.iter().any(|h| normalize_value(h) == genus))
                    .map(|d| d.disease_id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Re-read diseases and ontology as one unit.
    ///
    /// On success the result becomes the last good value. On failure the
    /// previous value is kept untouched.
    ///
    /// # Errors
    ///
    /// Any error from the individual load stages.
    pub fn reload(&self) -> Result<Arc<LoadedKnowledge>, KnowledgeError> {
        let loaded = Arc::new(self.load_fresh()?);
        self.set_last_good(Arc::clone(&loaded));
        Ok(loaded)
    }

    /// Record a load as the last good value once everything built from it
    /// has succeeded
    pub(crate) fn set_last_good(&self, loaded: Arc<LoadedKnowledge>) {
        *self.last_good.write() = Some(loaded);
    }

    /// Read everything without touching the last good value
    pub(crate) fn load_fresh(&self) -> Result<LoadedKnowledge, KnowledgeError> {
        let (ontology, ontology_digest) = self.read_ontology()?;
        let batch = self.read_diseases()?;

        let mut warnings = batch.warnings;
        for disease in &batch.diseases {
            warnings.extend(ontology.cross_check(disease));
        }
        for warning in &warnings {
            warn!("{warning}");
        }

        let mut digests = batch.digests;
        digests.push(ontology_digest);
        let fingerprint = compute_fingerprint(&digests);

        info!(
            diseases = batch.diseases.len(),
            ontology_version = %ontology.version,
            fingerprint = %fingerprint,
            "Loaded knowledge base"
        );

        Ok(LoadedKnowledge {
            diseases: batch.diseases.into_iter().map(Arc::new).collect(),
            ontology: Arc::new(ontology),
            fingerprint,
            warnings,
        })
    }

    fn read_ontology(&self) -> Result<(FeatureOntology, String), KnowledgeError> {
        let path = &self.config.ontology_path;
        let (ontology, digest) = read_typed::<FeatureOntology>(path, "feature ontology")?;
        ontology.validate().map_err(|message| {
            KnowledgeError::validation(format!("feature ontology {}", path.display()), message)
        })?;
        Ok((ontology, digest))
    }

    fn read_diseases(&self) -> Result<DiseaseBatch, KnowledgeError> {
        let files = list_json_files(&self.config.diseases_dir)?;
        let group_defaults = self.default_group_weights()?;

        let mut diseases = Vec::with_capacity(files.len());
        let mut digests = Vec::with_capacity(files.len());
        let mut warnings = Vec::new();
        let mut seen: HashSet<DiseaseId> = HashSet::new();

        for path in files {
            let context = format!("disease file {}", path.display());
            let (disease, digest) = read_typed::<DiseaseDefinition>(&path, "disease file")?;

            let file_warnings = disease
                .validate(self.config.strict_weights, &group_defaults)
                .map_err(|message| KnowledgeError::validation(&context, message))?;
            warnings.extend(file_warnings);

            if !seen.insert(disease.disease_id.clone()) {
                return Err(KnowledgeError::validation(
                    context,
                    format!("duplicate disease_id '{}'", disease.disease_id),
                ));
            }

            debug!(disease = %disease.disease_id, path = %path.display(), "Read disease");
            diseases.push(disease);
            digests.push(digest);
        }

        Ok(DiseaseBatch {
            diseases,
            digests,
            warnings,
        })
    }

    /// Tier weights a disease falls back to when it does not override them.
    ///
    /// Only the shape of the weights file matters here; its own invariants
    /// are enforced when the scorer loads it.
    fn default_group_weights(&self) -> Result<TierWeights, KnowledgeError> {
        match read_typed::<ScoringWeights>(&self.config.scoring_weights_path, "scoring weights") {
            Ok((weights, _digest)) => Ok(weights.tier_weights),
            Err(KnowledgeError::NotFound { .. }) => Ok(TierWeights::default()),
            Err(e) => Err(e),
        }
    }
}

/// JSON files in a directory, sorted by path, hidden files skipped.
///
/// # Errors
///
/// `NotFound` when the directory is missing or contains no JSON files.
pub(crate) fn list_json_files(dir: &Path) -> Result<Vec<PathBuf>, KnowledgeError> {
    if !dir.is_dir() {
        return Err(KnowledgeError::NotFound {
            path: dir.to_path_buf(),
        });
    }

    let entries = std::fs::read_dir(dir).map_err(|source| KnowledgeError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| KnowledgeError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let is_hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if path.is_file() && is_json && !is_hidden {
            files.push(path);
        }
    }

    if files.is_empty() {
        return Err(KnowledgeError::NotFound {
            path: dir.to_path_buf(),
        });
    }

    files.sort();
    Ok(files)
}

/// Read a JSON file and return the parsed value with the file's digest.
///
/// # Errors
///
/// `NotFound` if the file is missing, `Io` if it cannot be read, `Parse`
/// if it is not JSON, `Validation` if it is too large.
pub(crate) fn read_json(path: &Path) -> Result<(serde_json::Value, String), KnowledgeError> {
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(KnowledgeError::NotFound {
                path: path.to_path_buf(),
            })
        }
        Err(source) => {
            return Err(KnowledgeError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if let Some(message) = check_file_size(metadata.len()) {
        return Err(KnowledgeError::validation(
            format!("file {}", path.display()),
            message,
        ));
    }

    let bytes = std::fs::read(path).map_err(|source| KnowledgeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let digest = content_digest(&bytes);
    let value = serde_json::from_slice(&bytes).map_err(|source| KnowledgeError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok((value, digest))
}

/// Read a JSON file into a typed structure.
///
/// Syntax errors are load errors; shape errors (missing or mistyped keys)
/// are validation errors.
pub(crate) fn read_typed<T: DeserializeOwned>(
    path: &Path,
    what: &str,
) -> Result<(T, String), KnowledgeError> {
    let (value, digest) = read_json(path)?;
    let typed = serde_json::from_value(value).map_err(|e| {
        KnowledgeError::validation(format!("{what} {}", path.display()), e.to_string())
    })?;
    Ok((typed, digest))
}
