use super::{Document, DocumentStore, StoreError};
use async_trait::async_trait;
use std::{io::ErrorKind, marker::PhantomData, path::PathBuf};
use tokio::sync::Mutex;

/// Whole collection kept as one JSON array on disk.
pub struct JsonFileStore<T> {
    path: PathBuf,
    lock: Mutex<()>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Document> JsonFileStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
            _marker: PhantomData,
        }
    }

    async fn read_all(&self) -> Result<Vec<T>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn write_all(&self, docs: &[T]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(docs)?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl<T: Document> DocumentStore<T> for JsonFileStore<T> {
    async fn list(&self) -> Result<Vec<T>, StoreError> {
        let _guard = self.lock.lock().await;
        self.read_all().await
    }

    async fn get(&self, id: &str) -> Result<Option<T>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.into_iter().find(|doc| doc.id() == id))
    }

    async fn upsert(&self, doc: T) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut docs = self.read_all().await?;
        match docs.iter_mut().find(|existing| existing.id() == doc.id()) {
            Some(existing) => *existing = doc,
            None => docs.push(doc),
        }
        self.write_all(&docs).await
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;
        let mut docs = self.read_all().await?;
        let before = docs.len();
        docs.retain(|doc| doc.id() != id);
        if docs.len() == before {
            return Ok(false);
        }
        self.write_all(&docs).await?;
        Ok(true)
    }
}
