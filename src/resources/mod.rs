//! Resource loading
//!
//! Template files and declarative dialog files are read through
//! [`ResourceProvider`]. Two providers ship with the crate: a folder scanner
//! backed by `tokio::fs` and an in-memory map for tests and embedded content.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::errors::{DialogError, DialogResult};

/// A named text resource
#[async_trait]
pub trait Resource: Send + Sync {
    /// File name including extension, e.g. `main.en-us.lg`
    fn id(&self) -> &str;

    async fn read_text(&self) -> DialogResult<String>;
}

/// Looks resources up by id or extension
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    async fn get_resource(&self, id: &str) -> DialogResult<Option<Arc<dyn Resource>>>;

    /// Every resource whose id ends with `.{extension}`
    async fn get_resources(&self, extension: &str) -> DialogResult<Vec<Arc<dyn Resource>>>;
}

/// A resource read from disk on demand
#[derive(Debug, Clone)]
pub struct FileResource {
    id: String,
    path: PathBuf,
}

impl FileResource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let id = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { id, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Resource for FileResource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn read_text(&self) -> DialogResult<String> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| DialogError::Resource(format!("{}: {e}", self.path.display())))
    }
}

/// A resource held in memory
#[derive(Debug, Clone)]
pub struct MemoryResource {
    id: String,
    text: String,
}

impl MemoryResource {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

#[async_trait]
impl Resource for MemoryResource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn read_text(&self) -> DialogResult<String> {
        Ok(self.text.clone())
    }
}

/// Provider over the files of one directory tree
#[derive(Debug, Clone)]
pub struct FolderResourceProvider {
    root: PathBuf,
}

impl FolderResourceProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn scan(&self) -> DialogResult<Vec<FileResource>> {
        let mut found = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| DialogError::Resource(format!("{}: {e}", dir.display())))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| DialogError::Resource(e.to_string()))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| DialogError::Resource(e.to_string()))?;
                if file_type.is_dir() {
                    pending.push(path);
                } else {
                    found.push(FileResource::new(path));
                }
            }
        }
        debug!(root = %self.root.display(), count = found.len(), "scanned resource folder");
        Ok(found)
    }
}

#[async_trait]
impl ResourceProvider for FolderResourceProvider {
    async fn get_resource(&self, id: &str) -> DialogResult<Option<Arc<dyn Resource>>> {
        Ok(self
            .scan()
            .await?
            .into_iter()
            .find(|resource| resource.id() == id)
            .map(|resource| Arc::new(resource) as Arc<dyn Resource>))
    }

    async fn get_resources(&self, extension: &str) -> DialogResult<Vec<Arc<dyn Resource>>> {
        let suffix = format!(".{extension}");
        Ok(self
            .scan()
            .await?
            .into_iter()
            .filter(|resource| resource.id().ends_with(&suffix))
            .map(|resource| Arc::new(resource) as Arc<dyn Resource>)
            .collect())
    }
}

/// Provider over resources registered at runtime
#[derive(Default, Clone)]
pub struct MemoryResourceProvider {
    resources: Arc<RwLock<HashMap<String, Arc<dyn Resource>>>>,
}

impl MemoryResourceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a resource
    pub async fn insert(&self, id: impl Into<String>, text: impl Into<String>) {
        let id = id.into();
        let resource = Arc::new(MemoryResource::new(id.clone(), text));
        self.resources.write().await.insert(id, resource);
    }
}

#[async_trait]
impl ResourceProvider for MemoryResourceProvider {
    async fn get_resource(&self, id: &str) -> DialogResult<Option<Arc<dyn Resource>>> {
        Ok(self.resources.read().await.get(id).cloned())
    }

    async fn get_resources(&self, extension: &str) -> DialogResult<Vec<Arc<dyn Resource>>> {
        let suffix = format!(".{extension}");
        let resources = self.resources.read().await;
        let mut matching: Vec<Arc<dyn Resource>> = resources
            .values()
            .filter(|resource| resource.id().ends_with(&suffix))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_provider_filters_by_extension() {
        let provider = MemoryResourceProvider::new();
        provider.insert("main.lg", "# Hi\n- hello").await;
        provider.insert("main.en-us.lg", "# Hi\n- hello there").await;
        provider.insert("root.dialog", "{}").await;

        let lg = provider.get_resources("lg").await.unwrap();
        assert_eq!(lg.len(), 2);
        let resource = provider.get_resource("root.dialog").await.unwrap().unwrap();
        assert_eq!(resource.read_text().await.unwrap(), "{}");
        assert!(provider.get_resource("missing.lg").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_folder_provider_reads_files() {
        let dir = std::env::temp_dir().join(format!("adaptive-dialog-res-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(dir.join("nested")).await.unwrap();
        tokio::fs::write(dir.join("nested").join("main.lg"), "# A\n- a").await.unwrap();
        tokio::fs::write(dir.join("notes.txt"), "ignored").await.unwrap();

        let provider = FolderResourceProvider::new(&dir);
        let lg = provider.get_resources("lg").await.unwrap();
        assert_eq!(lg.len(), 1);
        assert_eq!(lg[0].id(), "main.lg");
        assert_eq!(lg[0].read_text().await.unwrap(), "# A\n- a");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
