//! Filesystem store for versioned model artifacts.
//!
//! Layout under the store root:
//!
//! ```text
//! model_metadata.json          {"latest_version": N, "production_version": M}
//! classifier_v{N}.json         trained classifier with its feature-name record
//! preprocessor_v{N}.json       fitted Preprocessor state
//! feature_columns_v{N}.json    ordered expected feature list
//! ```
//!
//! A version's files are staged under hidden temp names and renamed into place
//! once all three are written, so a failed save leaves nothing behind. They are
//! never modified afterwards. Promotion only swaps the
//! production pointer in the metadata file. Concurrent writers of the metadata
//! file (two trainings finishing at once, or a training racing a promotion) are
//! not coordinated here; callers must serialize them.
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScoringError};
use crate::models::{Classifier, ClassifierModel};
use crate::preprocessing::Preprocessor;
use crate::schema::FeatureSchema;

pub const METADATA_FILE: &str = "model_metadata.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub latest_version: u32,
    pub production_version: u32,
}

/// The three artifacts that make up one model version.
#[derive(Debug)]
pub struct ArtifactSet {
    pub classifier: Classifier,
    pub preprocessor: Preprocessor,
    pub expected_features: FeatureSchema,
}

#[derive(Debug, Clone)]
pub struct VersionedArtifactStore {
    root: PathBuf,
}

impl VersionedArtifactStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        VersionedArtifactStore {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Open a store, creating its directory when needed (training side).
    pub fn create<P: AsRef<Path>>(root: P) -> Result<Self> {
        fs::create_dir_all(root.as_ref())?;
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }

    pub fn classifier_path(&self, version: u32) -> PathBuf {
        self.root.join(format!("classifier_v{}.json", version))
    }

    pub fn preprocessor_path(&self, version: u32) -> PathBuf {
        self.root.join(format!("preprocessor_v{}.json", version))
    }

    pub fn feature_list_path(&self, version: u32) -> PathBuf {
        self.root.join(format!("feature_columns_v{}.json", version))
    }

    fn artifact_paths(&self, version: u32) -> [(&'static str, PathBuf); 3] {
        [
            ("classifier", self.classifier_path(version)),
            ("preprocessor", self.preprocessor_path(version)),
            ("feature list", self.feature_list_path(version)),
        ]
    }

    /// Metadata, or `None` when the store has never been written to.
    pub fn metadata(&self) -> Result<Option<ModelMetadata>> {
        let path = self.metadata_path();
        if !path.exists() {
            return Ok(None);
        }
        read_json("metadata", &path).map(Some)
    }

    fn require_metadata(&self) -> Result<ModelMetadata> {
        self.metadata()?.ok_or_else(|| ScoringError::ArtifactMissing {
            artifact: "metadata",
            path: self.metadata_path(),
            reason: "no model has been trained into this store".to_string(),
        })
    }

    pub fn latest_version(&self) -> Result<Option<u32>> {
        Ok(self.metadata()?.map(|m| m.latest_version))
    }

    pub fn production_version(&self) -> Result<u32> {
        Ok(self.require_metadata()?.production_version)
    }

    /// Version number the next training run should publish under: one past both
    /// the metadata's latest version and any version number found on disk.
    pub fn next_version(&self) -> Result<u32> {
        let latest = self.latest_version()?.unwrap_or(0);
        let on_disk = self.versions_on_disk()?.into_iter().max().unwrap_or(0);
        Ok(latest.max(on_disk) + 1)
    }

    /// Every version number named by an artifact file, complete or not.
    fn versions_on_disk(&self) -> Result<Vec<u32>> {
        let mut versions = Vec::new();
        if !self.root.exists() {
            return Ok(versions);
        }
        for entry in fs::read_dir(&self.root)? {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(v) = artifact_version(name) {
                versions.push(v);
            }
        }
        Ok(versions)
    }

    /// True when all three artifacts of `version` exist on disk.
    pub fn has_version(&self, version: u32) -> bool {
        self.artifact_paths(version).iter().all(|(_, p)| p.exists())
    }

    /// Versions with a complete artifact set, ascending.
    pub fn versions(&self) -> Result<Vec<u32>> {
        let mut versions = Vec::new();
        if !self.root.exists() {
            return Ok(versions);
        }
        for entry in fs::read_dir(&self.root)? {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            let version = name
                .strip_prefix("classifier_v")
                .and_then(|s| s.strip_suffix(".json"))
                .and_then(|s| s.parse::<u32>().ok());
            if let Some(v) = version.filter(|&v| self.has_version(v)) {
                versions.push(v);
            }
        }
        versions.sort_unstable();
        Ok(versions)
    }

    /// Write a new version. Existing versions are never overwritten. The first
    /// version saved into an empty store also becomes production.
    pub fn save(&self, version: u32, artifacts: &ArtifactSet) -> Result<()> {
        if version == 0 {
            return Err(ScoringError::Precondition(
                "model versions start at 1".to_string(),
            ));
        }
        if self
            .artifact_paths(version)
            .iter()
            .any(|(_, p)| p.exists())
        {
            return Err(ScoringError::ArtifactExists { version });
        }
        if !artifacts.preprocessor.is_fitted() {
            return Err(ScoringError::Precondition(
                "refusing to save an unfitted preprocessor".to_string(),
            ));
        }
        if artifacts.classifier.feature_names().is_none() {
            return Err(ScoringError::Precondition(
                "refusing to save an unfitted classifier".to_string(),
            ));
        }

        fs::create_dir_all(&self.root)?;
        let targets = [
            self.feature_list_path(version),
            self.preprocessor_path(version),
            self.classifier_path(version),
        ];
        let staged: Vec<PathBuf> = targets.iter().map(|p| staging_path(p)).collect();
        let written = write_staged(&staged[0], &artifacts.expected_features, true)
            .and_then(|_| write_staged(&staged[1], &artifacts.preprocessor, false))
            .and_then(|_| write_staged(&staged[2], &artifacts.classifier, false));
        if let Err(e) = written {
            remove_all(&staged);
            warn!("Failed to write artifacts for v{}: {}", version, e);
            return Err(e);
        }
        publish(&staged, &targets)?;

        let metadata = match self.metadata()? {
            Some(m) => ModelMetadata {
                latest_version: m.latest_version.max(version),
                production_version: m.production_version,
            },
            None => ModelMetadata {
                latest_version: version,
                production_version: version,
            },
        };
        self.write_metadata(&metadata)?;
        info!("Saved model artifacts v{} to {}", version, self.root.display());
        Ok(())
    }

    /// Load the artifact set of `version`. Any absent or unreadable file is an
    /// `ArtifactMissing` error.
    pub fn load(&self, version: u32) -> Result<ArtifactSet> {
        let expected_features: FeatureSchema =
            read_json("feature list", &self.feature_list_path(version))?;
        let preprocessor: Preprocessor =
            read_json("preprocessor", &self.preprocessor_path(version))?;
        let classifier: Classifier = read_json("classifier", &self.classifier_path(version))?;
        Ok(ArtifactSet {
            classifier,
            preprocessor,
            expected_features,
        })
    }

    /// Point production at an existing version. Only the metadata file changes.
    pub fn promote(&self, version: u32) -> Result<ModelMetadata> {
        for (artifact, path) in self.artifact_paths(version) {
            if !path.exists() {
                return Err(ScoringError::ArtifactMissing {
                    artifact,
                    path,
                    reason: format!("cannot promote v{} without a complete artifact set", version),
                });
            }
        }
        let current = self.require_metadata()?;
        let metadata = ModelMetadata {
            latest_version: current.latest_version.max(version),
            production_version: version,
        };
        self.write_metadata(&metadata)?;
        info!(
            "Promoted model v{} to production (was v{})",
            version, current.production_version
        );
        Ok(metadata)
    }

    /// Replace the metadata file atomically (write temp file, then rename).
    fn write_metadata(&self, metadata: &ModelMetadata) -> Result<()> {
        let tmp = self.root.join(format!("{}.tmp", METADATA_FILE));
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut writer, metadata)?;
            writer.flush()?;
        }
        fs::rename(&tmp, self.metadata_path())?;
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(artifact: &'static str, path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| ScoringError::ArtifactMissing {
        artifact,
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| ScoringError::ArtifactMissing {
        artifact,
        path: path.to_path_buf(),
        reason: format!("unreadable: {}", e),
    })
}

fn artifact_version(file_name: &str) -> Option<u32> {
    let stem = file_name.strip_suffix(".json")?;
    ["classifier_v", "preprocessor_v", "feature_columns_v"]
        .iter()
        .find_map(|prefix| stem.strip_prefix(prefix))
        .and_then(|s| s.parse::<u32>().ok())
}

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", name))
}

/// Write to a temp file, replacing leftovers of an earlier failed save.
fn write_staged<T: Serialize>(path: &Path, value: &T, pretty: bool) -> Result<()> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    let mut writer = BufWriter::new(file);
    if pretty {
        serde_json::to_writer_pretty(&mut writer, value)?;
    } else {
        serde_json::to_writer(&mut writer, value)?;
    }
    writer.flush()?;
    Ok(())
}

/// Rename staged files into place. On failure every file this call created,
/// staged or published, is removed again.
fn publish(staged: &[PathBuf], targets: &[PathBuf]) -> Result<()> {
    for (i, (from, to)) in staged.iter().zip(targets).enumerate() {
        if let Err(e) = fs::rename(from, to) {
            remove_all(&targets[..i]);
            remove_all(&staged[i..]);
            return Err(e.into());
        }
    }
    Ok(())
}

fn remove_all(paths: &[PathBuf]) {
    for path in paths {
        if path.exists() {
            let _ = fs::remove_file(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_file_names_carry_their_version() {
        assert_eq!(artifact_version("classifier_v3.json"), Some(3));
        assert_eq!(artifact_version("feature_columns_v12.json"), Some(12));
        assert_eq!(artifact_version("preprocessor_v1.json"), Some(1));
        assert_eq!(artifact_version(".classifier_v3.json.tmp"), None);
        assert_eq!(artifact_version("model_metadata.json"), None);
    }

    #[test]
    fn stray_files_push_the_next_version_past_them() {
        let dir = tempfile::tempdir().unwrap();
        let store = VersionedArtifactStore::new(dir.path());
        assert_eq!(store.next_version().unwrap(), 1);

        std::fs::write(store.feature_list_path(2), "[]").unwrap();
        assert_eq!(store.next_version().unwrap(), 3);
        // incomplete sets are not listed as versions
        assert!(store.versions().unwrap().is_empty());
    }

    #[test]
    fn staging_names_are_hidden_temp_files() {
        let staged = staging_path(Path::new("/models/classifier_v2.json"));
        assert_eq!(staged, PathBuf::from("/models/.classifier_v2.json.tmp"));
    }
}
