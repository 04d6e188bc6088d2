//! Collection persistence.
//!
//! Each collection is a single JSON array document, rewritten in full on
//! every mutation (write to a temporary file, then rename over the old one).

use crate::error::StoreError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::PathBuf;

/// One persisted collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Document {
    Users,
    Channels,
    Publications,
    Messages,
}

impl Document {
    /// File name inside the data directory.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Users => "usuarios.json",
            Self::Channels => "canais.json",
            Self::Publications => "publicacoes.json",
            Self::Messages => "mensagens.json",
        }
    }
}

/// Reads and writes collection documents under one directory.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    dir: PathBuf,
}

impl DocumentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, doc: Document) -> PathBuf {
        self.dir.join(doc.file_name())
    }

    /// Create the data directory if needed.
    pub async fn ensure_dir(&self) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StoreError::Io {
                path: self.dir.display().to_string(),
                source,
            })
    }

    /// Load a collection. A missing or empty document is an empty collection.
    pub async fn load<T: DeserializeOwned>(&self, doc: Document) -> Result<Vec<T>, StoreError> {
        let path = self.path(doc);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.display().to_string(),
                    source,
                });
            }
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&raw).map_err(|source| StoreError::Json {
            path: path.display().to_string(),
            source,
        })
    }

    /// Replace a collection document with `items`.
    pub async fn save<T: Serialize>(&self, doc: Document, items: &[T]) -> Result<(), StoreError> {
        let path = self.path(doc);
        let body = serde_json::to_vec_pretty(items).map_err(|source| StoreError::Json {
            path: path.display().to_string(),
            source,
        })?;

        let tmp = path.with_extension("json.tmp");
        let io_err = |source| StoreError::Io {
            path: path.display().to_string(),
            source,
        };
        tokio::fs::write(&tmp, body).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &path).await.map_err(io_err)
    }
}
