//! Replicated state store.
//!
//! Four in-memory collections backed by persisted documents. Mutations
//! check their constraint in memory, apply, then rewrite the affected
//! document. A periodic reload replaces the in-memory view with what is on
//! disk.
//!
//! Persistence failures never reach callers: they are logged in
//! one place and the in-memory mutation stands.

use super::persistence::{Document, DocumentStore};
use crate::error::{ServiceError, StoreError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A registered user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user: String,
    #[serde(default)]
    pub timestamp: Option<f64>,
}

/// A created channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub channel: String,
    #[serde(default)]
    pub timestamp: Option<f64>,
}

/// A message published to a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicationRecord {
    #[serde(default)]
    pub user: Option<String>,
    pub channel: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub timestamp: Option<f64>,
}

/// A private message between two users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    #[serde(default)]
    pub src: Option<String>,
    pub dst: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub timestamp: Option<f64>,
}

#[derive(Debug, Default)]
struct Collections {
    users: Vec<UserRecord>,
    channels: Vec<ChannelRecord>,
    publications: Vec<PublicationRecord>,
    messages: Vec<MessageRecord>,
}

impl Collections {
    fn has_user(&self, name: &str) -> bool {
        self.users.iter().any(|u| u.user == name)
    }

    fn has_channel(&self, name: &str) -> bool {
        self.channels.iter().any(|c| c.channel == name)
    }
}

/// Per-node collections and their documents.
pub struct Store {
    collections: RwLock<Collections>,
    documents: DocumentStore,
    /// Serializes disk access so a reload never interleaves with a
    /// mutation's write-back.
    io: tokio::sync::Mutex<()>,
}

impl Store {
    /// Open the store under `dir`, creating it and loading existing documents.
    ///
    /// An unreadable document starts as an empty collection.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self {
            collections: RwLock::new(Collections::default()),
            documents: DocumentStore::new(dir),
            io: tokio::sync::Mutex::new(()),
        };
        store.documents.ensure_dir().await?;
        if let Err(e) = store.reload().await {
            warn!(error = %e, "Unreadable document, starting with an empty collection");
        }
        Ok(store)
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    // ------------------------------------------------------------------
    // Client-facing mutations
    // ------------------------------------------------------------------

    /// Register a user; fails if the name is taken.
    pub async fn add_user(&self, user: &str, timestamp: Option<f64>) -> Result<(), ServiceError> {
        let _io = self.io.lock().await;
        {
            let mut c = self.collections.write();
            if c.has_user(user) {
                return Err(ServiceError::UserExists(user.to_string()));
            }
            c.users.push(UserRecord {
                user: user.to_string(),
                timestamp,
            });
        }
        self.flush(Document::Users).await;
        Ok(())
    }

    /// Create a channel; fails if it already exists.
    pub async fn add_channel(
        &self,
        channel: &str,
        timestamp: Option<f64>,
    ) -> Result<(), ServiceError> {
        let _io = self.io.lock().await;
        {
            let mut c = self.collections.write();
            if c.has_channel(channel) {
                return Err(ServiceError::ChannelExists(channel.to_string()));
            }
            c.channels.push(ChannelRecord {
                channel: channel.to_string(),
                timestamp,
            });
        }
        self.flush(Document::Channels).await;
        Ok(())
    }

    /// Append a publication; the channel must exist.
    pub async fn add_publication(&self, record: PublicationRecord) -> Result<(), ServiceError> {
        let _io = self.io.lock().await;
        {
            let mut c = self.collections.write();
            if !c.has_channel(&record.channel) {
                return Err(ServiceError::NoSuchChannel(record.channel));
            }
            c.publications.push(record);
        }
        self.flush(Document::Publications).await;
        Ok(())
    }

    /// Append a private message; the recipient must be a registered user.
    pub async fn add_message(&self, record: MessageRecord) -> Result<(), ServiceError> {
        let _io = self.io.lock().await;
        {
            let mut c = self.collections.write();
            if !c.has_user(&record.dst) {
                return Err(ServiceError::NoSuchUser(record.dst));
            }
            c.messages.push(record);
        }
        self.flush(Document::Messages).await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Replicated writes (idempotent for users and channels)
    // ------------------------------------------------------------------

    /// Insert a user unless present. Returns whether it was inserted.
    pub async fn insert_user_if_absent(&self, user: &str, timestamp: Option<f64>) -> bool {
        let _io = self.io.lock().await;
        {
            let mut c = self.collections.write();
            if c.has_user(user) {
                return false;
            }
            c.users.push(UserRecord {
                user: user.to_string(),
                timestamp,
            });
        }
        self.flush(Document::Users).await;
        true
    }

    /// Insert a channel unless present. Returns whether it was inserted.
    pub async fn insert_channel_if_absent(&self, channel: &str, timestamp: Option<f64>) -> bool {
        let _io = self.io.lock().await;
        {
            let mut c = self.collections.write();
            if c.has_channel(channel) {
                return false;
            }
            c.channels.push(ChannelRecord {
                channel: channel.to_string(),
                timestamp,
            });
        }
        self.flush(Document::Channels).await;
        true
    }

    /// Append a publication without any referential check.
    pub async fn append_publication(&self, record: PublicationRecord) {
        let _io = self.io.lock().await;
        self.collections.write().publications.push(record);
        self.flush(Document::Publications).await;
    }

    /// Append a private message without any referential check.
    pub async fn append_message(&self, record: MessageRecord) {
        let _io = self.io.lock().await;
        self.collections.write().messages.push(record);
        self.flush(Document::Messages).await;
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn user_names(&self) -> Vec<String> {
        self.collections
            .read()
            .users
            .iter()
            .map(|u| u.user.clone())
            .collect()
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.collections
            .read()
            .channels
            .iter()
            .map(|c| c.channel.clone())
            .collect()
    }

    pub fn publications(&self) -> Vec<PublicationRecord> {
        self.collections.read().publications.clone()
    }

    pub fn messages(&self) -> Vec<MessageRecord> {
        self.collections.read().messages.clone()
    }

    // ------------------------------------------------------------------
    // Disk
    // ------------------------------------------------------------------

    /// Write one collection back to disk, logging any failure.
    ///
    /// Callers must hold the io lock.
    async fn flush(&self, doc: Document) {
        let saved = match doc {
            Document::Users => {
                let items = self.collections.read().users.clone();
                self.documents.save(doc, &items).await
            }
            Document::Channels => {
                let items = self.collections.read().channels.clone();
                self.documents.save(doc, &items).await
            }
            Document::Publications => {
                let items = self.collections.read().publications.clone();
                self.documents.save(doc, &items).await
            }
            Document::Messages => {
                let items = self.collections.read().messages.clone();
                self.documents.save(doc, &items).await
            }
        };
        if let Err(e) = saved {
            warn!(document = doc.file_name(), error = %e, "Failed to persist collection");
        }
    }

    /// Replace every collection with its persisted document.
    ///
    /// A collection whose document fails to load keeps its in-memory view.
    pub async fn reload(&self) -> Result<(), StoreError> {
        let _io = self.io.lock().await;
        let users = self.documents.load::<UserRecord>(Document::Users).await;
        let channels = self.documents.load::<ChannelRecord>(Document::Channels).await;
        let publications = self
            .documents
            .load::<PublicationRecord>(Document::Publications)
            .await;
        let messages = self.documents.load::<MessageRecord>(Document::Messages).await;

        let mut first_error = None;
        let mut c = self.collections.write();
        match users {
            Ok(v) => c.users = v,
            Err(e) => first_error = first_error.or(Some(e)),
        }
        match channels {
            Ok(v) => c.channels = v,
            Err(e) => first_error = first_error.or(Some(e)),
        }
        match publications {
            Ok(v) => c.publications = v,
            Err(e) => first_error = first_error.or(Some(e)),
        }
        match messages {
            Ok(v) => c.messages = v,
            Err(e) => first_error = first_error.or(Some(e)),
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Reload from disk every `interval` for the lifetime of the process.
    pub fn spawn_reload(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match self.reload().await {
                    Ok(()) => debug!("Reloaded collections"),
                    Err(e) => warn!(error = %e, "Failed to reload collections"),
                }
            }
        })
    }
}
