use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use crate::Result;

/// Assembled output of a completed export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub mime: String,
    pub data: Vec<u8>,
}

/// Temporary handle created while saving an artifact. Released by the export
/// driver after the configured delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempResource {
    pub id: String,
}

/// Save mechanism for finished exports.
pub trait ArtifactStore {
    /// Hands the artifact off. A returned resource must stay valid until
    /// [`ArtifactStore::release`] is called for it.
    fn save(&mut self, artifact: ExportArtifact) -> Result<Option<TempResource>>;

    fn release(&mut self, resource: TempResource);
}

/// Writes artifacts into a directory.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    dir: PathBuf,
}

impl DirectoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ArtifactStore for DirectoryStore {
    fn save(&mut self, artifact: ExportArtifact) -> Result<Option<TempResource>> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(&artifact.file_name);
        std::fs::write(&path, &artifact.data)?;
        tracing::info!(path = %path.display(), bytes = artifact.data.len(), mime = %artifact.mime, "artifact written");
        Ok(None)
    }

    fn release(&mut self, _resource: TempResource) {}
}

#[derive(Debug, Default)]
struct MemoryStoreState {
    saved: Vec<ExportArtifact>,
    live: Vec<TempResource>,
    released: Vec<TempResource>,
}

/// Keeps saved artifacts in memory and hands out a temporary resource per
/// save, mimicking a download link. Clones share state.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    state: Rc<RefCell<MemoryStoreState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved(&self) -> Vec<ExportArtifact> {
        self.state.borrow().saved.clone()
    }

    pub fn live_resources(&self) -> Vec<TempResource> {
        self.state.borrow().live.clone()
    }

    pub fn released(&self) -> Vec<TempResource> {
        self.state.borrow().released.clone()
    }
}

impl ArtifactStore for MemoryStore {
    fn save(&mut self, artifact: ExportArtifact) -> Result<Option<TempResource>> {
        let mut state = self.state.borrow_mut();
        let resource = TempResource {
            id: format!("blob:{}/{}", state.saved.len(), artifact.file_name),
        };
        state.saved.push(artifact);
        state.live.push(resource.clone());
        Ok(Some(resource))
    }

    fn release(&mut self, resource: TempResource) {
        let mut state = self.state.borrow_mut();
        state.live.retain(|live| live != &resource);
        state.released.push(resource);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(name: &str) -> ExportArtifact {
        ExportArtifact {
            file_name: name.to_string(),
            mime: "video/webm".to_string(),
            data: b"frames".to_vec(),
        }
    }

    #[test]
    fn memory_store_tracks_resources() {
        let store = MemoryStore::new();
        let mut handle = store.clone();

        let resource = handle.save(artifact("render.webm")).unwrap().unwrap();
        assert_eq!(store.saved().len(), 1);
        assert_eq!(store.live_resources(), vec![resource.clone()]);

        handle.release(resource.clone());
        assert!(store.live_resources().is_empty());
        assert_eq!(store.released(), vec![resource]);
    }

    #[test]
    fn directory_store_writes_file() {
        let dir = std::env::temp_dir().join(format!("whitney-store-{}", std::process::id()));
        let mut store = DirectoryStore::new(&dir);

        let resource = store.save(artifact("out.webm")).unwrap();
        assert!(resource.is_none());
        assert_eq!(std::fs::read(dir.join("out.webm")).unwrap(), b"frames");

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
