//! `fraudgate versions` and `fraudgate promote`.
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use fraudgate_scoring::artifacts::{ModelMetadata, VersionedArtifactStore};

#[derive(Debug, Serialize)]
pub struct VersionListing {
    pub latest_version: Option<u32>,
    pub production_version: Option<u32>,
    pub versions: Vec<u32>,
}

pub fn list_versions(model_dir: &Path) -> Result<VersionListing> {
    let store = VersionedArtifactStore::new(model_dir);
    let metadata = store
        .metadata()
        .with_context(|| format!("Failed to read metadata in {}", model_dir.display()))?;
    let listing = VersionListing {
        latest_version: metadata.map(|m| m.latest_version),
        production_version: metadata.map(|m| m.production_version),
        versions: store.versions()?,
    };
    println!("{}", serde_json::to_string_pretty(&listing)?);
    Ok(listing)
}

pub fn promote(model_dir: &Path, version: u32) -> Result<ModelMetadata> {
    let store = VersionedArtifactStore::new(model_dir);
    let metadata = store
        .promote(version)
        .with_context(|| format!("Failed to promote v{}", version))?;
    println!("{}", serde_json::to_string_pretty(&metadata)?);
    Ok(metadata)
}
