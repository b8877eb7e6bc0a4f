mod layout;
mod memory;
mod records;

pub use layout::{LinkRefs, RoomLayout};
pub use memory::MemoryStore;
pub use records::{
    candidate_fields, join_fields, link_answer_fields, link_offer_fields, parse_candidate,
    parse_link, parse_member, room_fields,
};

use async_trait::async_trait;
use meshwork_core::StoreError;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Top-level fields of a stored document.
pub type Fields = Map<String, Value>;

/// Callback invoked for every change a subscription observes.
pub type ChangeHandler = Box<dyn Fn(DocChange) + Send + Sync>;

/// Reference to a collection: an odd number of path segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionRef {
    segments: Vec<String>,
}

impl CollectionRef {
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            segments: vec![name.into()],
        }
    }

    pub fn doc(&self, id: impl Into<String>) -> DocumentRef {
        let mut segments = self.segments.clone();
        segments.push(id.into());
        DocumentRef { segments }
    }

    pub fn path(&self) -> String {
        self.segments.join("/")
    }
}

impl fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Reference to a document: an even number of path segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentRef {
    segments: Vec<String>,
}

impl DocumentRef {
    pub fn id(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    pub fn parent(&self) -> CollectionRef {
        CollectionRef {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        }
    }

    pub fn collection(&self, name: impl Into<String>) -> CollectionRef {
        let mut segments = self.segments.clone();
        segments.push(name.into());
        CollectionRef { segments }
    }

    pub fn path(&self) -> String {
        self.segments.join("/")
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub reference: DocumentRef,
    pub fields: Fields,
}

impl Document {
    pub fn id(&self) -> &str {
        self.reference.id()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocChange {
    pub kind: ChangeKind,
    pub document: Document,
}

/// Live subscription; dropping it stops delivery.
#[derive(Debug)]
pub struct Subscription {
    active: Arc<AtomicBool>,
}

impl Subscription {
    pub fn new(active: Arc<AtomicBool>) -> Self {
        Self { active }
    }

    pub fn cancel(self) {
        drop(self)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}

/// Asynchronous document store used as the out-of-band signaling channel.
///
/// Subscriptions first report the current contents as `Added` changes, then every later
/// change in write order. Handlers must not block; they are typically a channel send.
#[async_trait]
pub trait SignalingStore: Send + Sync {
    /// Allocate a fresh document id under `collection` without writing anything.
    async fn create(&self, collection: &CollectionRef) -> Result<DocumentRef, StoreError>;

    async fn get(&self, doc: &DocumentRef) -> Result<Option<Document>, StoreError>;

    /// Replace the document's fields, creating it if needed.
    async fn set(&self, doc: &DocumentRef, fields: Fields) -> Result<(), StoreError>;

    /// Merge top-level fields into an existing document.
    async fn update(&self, doc: &DocumentRef, fields: Fields) -> Result<(), StoreError>;

    /// Add a document with a generated id.
    async fn append(
        &self,
        collection: &CollectionRef,
        fields: Fields,
    ) -> Result<DocumentRef, StoreError>;

    /// Documents of a collection in creation order.
    async fn list(&self, collection: &CollectionRef) -> Result<Vec<Document>, StoreError>;

    async fn subscribe_document(
        &self,
        doc: &DocumentRef,
        on_change: ChangeHandler,
    ) -> Result<Subscription, StoreError>;

    async fn subscribe_collection(
        &self,
        collection: &CollectionRef,
        on_change: ChangeHandler,
    ) -> Result<Subscription, StoreError>;
}
