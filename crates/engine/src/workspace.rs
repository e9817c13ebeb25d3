//! Repository locations and their reload lifecycle.
//!
//! Each location keeps the last repository that loaded successfully. A
//! failed reload records the error but keeps serving that repository, so
//! readers never observe definitions older than the last good reload.

use std::collections::BTreeMap;
use std::sync::Arc;

use flowgate_core::definition::{PipelineDef, RepositoryDef};
use flowgate_core::types::Timestamp;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::error::EngineError;
use crate::location::LocationSource;

/// Result of reloading one location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// New definitions are active.
    Reloaded,
    /// The definitions are identical to the active ones; nothing changed.
    Unchanged,
    /// Loading failed; the previous definitions stay active.
    Failed(String),
}

/// Point-in-time view of a location.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationInfo {
    pub name: String,
    pub repository_name: Option<String>,
    pub pipeline_names: Vec<String>,
    pub content_hash: Option<String>,
    pub load_error: Option<String>,
    pub updated_at: Timestamp,
}

struct LocationEntry {
    source: Arc<dyn LocationSource>,
    repository: Option<Arc<RepositoryDef>>,
    content_hash: Option<String>,
    load_error: Option<String>,
    updated_at: Timestamp,
}

impl LocationEntry {
    fn info(&self) -> LocationInfo {
        LocationInfo {
            name: self.source.name().to_string(),
            repository_name: self.repository.as_ref().map(|r| r.name.clone()),
            pipeline_names: self
                .repository
                .as_ref()
                .map(|r| r.pipelines.iter().map(|p| p.name.clone()).collect())
                .unwrap_or_default(),
            content_hash: self.content_hash.clone(),
            load_error: self.load_error.clone(),
            updated_at: self.updated_at,
        }
    }
}

/// A pipeline found in the workspace together with where it lives.
#[derive(Debug, Clone)]
pub struct LocatedPipeline {
    pub location_name: String,
    pub pipeline: PipelineDef,
}

#[derive(Default)]
pub struct Workspace {
    locations: RwLock<BTreeMap<String, LocationEntry>>,
}

fn content_hash(repository: &RepositoryDef) -> String {
    let canonical = serde_json::to_vec(repository).unwrap_or_default();
    format!("{:x}", Sha256::digest(&canonical))
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a location and load it. A load failure is recorded on the
    /// location rather than returned.
    pub async fn add_location(&self, source: Arc<dyn LocationSource>) -> LocationInfo {
        let name = source.name().to_string();
        let mut entry = LocationEntry {
            source,
            repository: None,
            content_hash: None,
            load_error: None,
            updated_at: chrono::Utc::now(),
        };

        match entry.source.load().await {
            Ok(repository) => {
                entry.content_hash = Some(content_hash(&repository));
                entry.repository = Some(Arc::new(repository));
                tracing::info!(location = %name, "Repository location loaded");
            }
            Err(e) => {
                tracing::warn!(location = %name, error = %e, "Repository location failed to load");
                entry.load_error = Some(e.to_string());
            }
        }

        let info = entry.info();
        self.locations.write().await.insert(name, entry);
        info
    }

    /// Reload a location from its source.
    pub async fn reload(&self, name: &str) -> Result<(ReloadOutcome, LocationInfo), EngineError> {
        let source = {
            let locations = self.locations.read().await;
            let entry = locations.get(name).ok_or_else(|| EngineError::LocationNotFound {
                location_name: name.to_string(),
            })?;
            Arc::clone(&entry.source)
        };

        // Load outside the lock; readers keep using the active definitions.
        let loaded = source.load().await;

        let mut locations = self.locations.write().await;
        let entry = locations.get_mut(name).ok_or_else(|| EngineError::LocationNotFound {
            location_name: name.to_string(),
        })?;

        let outcome = match loaded {
            Ok(repository) => {
                let hash = content_hash(&repository);
                if entry.content_hash.as_deref() == Some(hash.as_str())
                    && entry.load_error.is_none()
                {
                    ReloadOutcome::Unchanged
                } else {
                    entry.repository = Some(Arc::new(repository));
                    entry.content_hash = Some(hash);
                    entry.load_error = None;
                    entry.updated_at = chrono::Utc::now();
                    ReloadOutcome::Reloaded
                }
            }
            Err(e) => {
                let message = e.to_string();
                entry.load_error = Some(message.clone());
                entry.updated_at = chrono::Utc::now();
                ReloadOutcome::Failed(message)
            }
        };

        match &outcome {
            ReloadOutcome::Reloaded => tracing::info!(location = %name, "Repository location reloaded"),
            ReloadOutcome::Unchanged => tracing::debug!(location = %name, "Repository location unchanged, reload skipped"),
            ReloadOutcome::Failed(error) => tracing::warn!(location = %name, %error, "Repository location reload failed"),
        }

        Ok((outcome, entry.info()))
    }

    pub async fn locations(&self) -> Vec<LocationInfo> {
        self.locations
            .read()
            .await
            .values()
            .map(LocationEntry::info)
            .collect()
    }

    /// Find a pipeline by name, optionally restricted to one location.
    ///
    /// Without a location the first location (by name) defining the
    /// pipeline wins.
    pub async fn find_pipeline(
        &self,
        pipeline_name: &str,
        location_name: Option<&str>,
    ) -> Result<LocatedPipeline, EngineError> {
        let locations = self.locations.read().await;

        if let Some(location_name) = location_name {
            if !locations.contains_key(location_name) {
                return Err(EngineError::LocationNotFound {
                    location_name: location_name.to_string(),
                });
            }
        }

        locations
            .iter()
            .filter(|(name, _)| location_name.map_or(true, |wanted| wanted == name.as_str()))
            .find_map(|(name, entry)| {
                entry
                    .repository
                    .as_ref()
                    .and_then(|r| r.pipeline(pipeline_name))
                    .map(|pipeline| LocatedPipeline {
                        location_name: name.clone(),
                        pipeline: pipeline.clone(),
                    })
            })
            .ok_or_else(|| EngineError::PipelineNotFound {
                pipeline_name: pipeline_name.to_string(),
                location_name: location_name.map(str::to_string),
            })
    }

    /// Every pipeline currently served, with its location name.
    pub async fn all_pipelines(&self) -> Vec<LocatedPipeline> {
        self.locations
            .read()
            .await
            .iter()
            .flat_map(|(name, entry)| {
                entry
                    .repository
                    .iter()
                    .flat_map(|r| r.pipelines.iter())
                    .map(|pipeline| LocatedPipeline {
                        location_name: name.clone(),
                        pipeline: pipeline.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}
