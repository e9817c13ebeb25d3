//! Where repository definitions come from.

use std::path::PathBuf;

use async_trait::async_trait;
use flowgate_core::definition::RepositoryDef;
use flowgate_core::error::DefinitionError;

/// A reloadable source of one repository's definitions.
#[async_trait]
pub trait LocationSource: Send + Sync {
    /// Location name, unique within a workspace.
    fn name(&self) -> &str;

    /// Load and validate the current definitions.
    async fn load(&self) -> Result<RepositoryDef, DefinitionError>;
}

/// Definitions stored as a JSON file on disk, re-read on every load.
pub struct FileLocationSource {
    name: String,
    path: PathBuf,
}

impl FileLocationSource {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Parse a `name=path` location spec.
    pub fn from_spec(spec: &str) -> Option<Self> {
        let (name, path) = spec.split_once('=')?;
        let (name, path) = (name.trim(), path.trim());
        if name.is_empty() || path.is_empty() {
            return None;
        }
        Some(Self::new(name, path))
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl LocationSource for FileLocationSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self) -> Result<RepositoryDef, DefinitionError> {
        let text = tokio::fs::read_to_string(&self.path).await?;
        RepositoryDef::from_json(&text)
    }
}

/// Fixed in-memory definitions.
pub struct StaticLocationSource {
    name: String,
    repository: RepositoryDef,
}

impl StaticLocationSource {
    pub fn new(name: impl Into<String>, repository: RepositoryDef) -> Self {
        Self {
            name: name.into(),
            repository,
        }
    }
}

#[async_trait]
impl LocationSource for StaticLocationSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self) -> Result<RepositoryDef, DefinitionError> {
        self.repository.validate()?;
        Ok(self.repository.clone())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parses_location_specs() {
        let source = FileLocationSource::from_spec(" analytics = defs/analytics.json ").unwrap();
        assert_eq!(source.name(), "analytics");
        assert_eq!(source.path(), std::path::Path::new("defs/analytics.json"));
        assert!(FileLocationSource::from_spec("no-separator").is_none());
        assert!(FileLocationSource::from_spec("=path").is_none());
    }

    #[tokio::test]
    async fn file_source_reads_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repo.json");
        std::fs::write(&path, r#"{"name": "repo", "pipelines": [{"name": "p"}]}"#).unwrap();

        let source = FileLocationSource::new("loc", &path);
        let repository = source.load().await.unwrap();
        assert_eq!(repository.pipelines[0].name, "p");

        std::fs::write(&path, "{ not json").unwrap();
        assert_matches!(source.load().await, Err(DefinitionError::Parse(_)));
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let source = FileLocationSource::new("loc", "/definitely/not/here.json");
        assert_matches!(source.load().await, Err(DefinitionError::Io(_)));
    }
}
