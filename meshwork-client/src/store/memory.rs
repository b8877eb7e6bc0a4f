use super::{
    ChangeHandler, ChangeKind, CollectionRef, DocChange, Document, DocumentRef, Fields,
    SignalingStore, Subscription,
};
use async_trait::async_trait;
use meshwork_core::StoreError;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::trace;
use uuid::Uuid;

struct StoredDoc {
    reference: DocumentRef,
    fields: Fields,
    created: u64,
}

impl StoredDoc {
    fn snapshot(&self) -> Document {
        Document {
            reference: self.reference.clone(),
            fields: self.fields.clone(),
        }
    }
}

enum Target {
    Document(DocumentRef),
    Collection(CollectionRef),
}

impl Target {
    fn matches(&self, doc: &DocumentRef) -> bool {
        match self {
            Target::Document(target) => target == doc,
            Target::Collection(target) => &doc.parent() == target,
        }
    }
}

struct Listener {
    target: Target,
    active: Arc<AtomicBool>,
    handler: ChangeHandler,
}

#[derive(Default)]
struct StoreInner {
    docs: HashMap<DocumentRef, StoredDoc>,
    listeners: Vec<Listener>,
    next_created: u64,
}

impl StoreInner {
    fn write(&mut self, doc: &DocumentRef, fields: Fields) {
        let kind = match self.docs.get_mut(doc) {
            Some(stored) => {
                stored.fields = fields;
                ChangeKind::Modified
            }
            None => {
                self.next_created += 1;
                self.docs.insert(
                    doc.clone(),
                    StoredDoc {
                        reference: doc.clone(),
                        fields,
                        created: self.next_created,
                    },
                );
                ChangeKind::Added
            }
        };

        trace!("[MemoryStore] {:?} {}", kind, doc);

        let Some(stored) = self.docs.get(doc) else {
            return;
        };
        let change = DocChange {
            kind,
            document: stored.snapshot(),
        };

        self.listeners
            .retain(|l| l.active.load(Ordering::Acquire));
        for listener in &self.listeners {
            if listener.target.matches(doc) {
                (listener.handler)(change.clone());
            }
        }
    }

    fn collection(&self, collection: &CollectionRef) -> Vec<Document> {
        let mut docs: Vec<&StoredDoc> = self
            .docs
            .values()
            .filter(|d| &d.reference.parent() == collection)
            .collect();
        docs.sort_by_key(|d| d.created);
        docs.into_iter().map(StoredDoc::snapshot).collect()
    }

    fn listen(&mut self, target: Target, handler: ChangeHandler) -> Subscription {
        let active = Arc::new(AtomicBool::new(true));
        self.listeners.push(Listener {
            target,
            active: active.clone(),
            handler,
        });
        Subscription::new(active)
    }
}

/// In-process signaling store with the same observable semantics as the hosted one:
/// generated ids, merge updates, creation-ordered collections and snapshot-then-changes
/// subscriptions. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn generate_id() -> String {
        Uuid::new_v4().simple().to_string()
    }
}

#[async_trait]
impl SignalingStore for MemoryStore {
    async fn create(&self, collection: &CollectionRef) -> Result<DocumentRef, StoreError> {
        Ok(collection.doc(Self::generate_id()))
    }

    async fn get(&self, doc: &DocumentRef) -> Result<Option<Document>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.docs.get(doc).map(StoredDoc::snapshot))
    }

    async fn set(&self, doc: &DocumentRef, fields: Fields) -> Result<(), StoreError> {
        self.inner.lock().await.write(doc, fields);
        Ok(())
    }

    async fn update(&self, doc: &DocumentRef, fields: Fields) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(stored) = inner.docs.get(doc) else {
            return Err(StoreError::NotFound(doc.path()));
        };

        let mut merged = stored.fields.clone();
        merged.extend(fields);
        inner.write(doc, merged);
        Ok(())
    }

    async fn append(
        &self,
        collection: &CollectionRef,
        fields: Fields,
    ) -> Result<DocumentRef, StoreError> {
        let doc = collection.doc(Self::generate_id());
        self.inner.lock().await.write(&doc, fields);
        Ok(doc)
    }

    async fn list(&self, collection: &CollectionRef) -> Result<Vec<Document>, StoreError> {
        Ok(self.inner.lock().await.collection(collection))
    }

    async fn subscribe_document(
        &self,
        doc: &DocumentRef,
        on_change: ChangeHandler,
    ) -> Result<Subscription, StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(stored) = inner.docs.get(doc) {
            on_change(DocChange {
                kind: ChangeKind::Added,
                document: stored.snapshot(),
            });
        }
        Ok(inner.listen(Target::Document(doc.clone()), on_change))
    }

    async fn subscribe_collection(
        &self,
        collection: &CollectionRef,
        on_change: ChangeHandler,
    ) -> Result<Subscription, StoreError> {
        let mut inner = self.inner.lock().await;
        for document in inner.collection(collection) {
            on_change(DocChange {
                kind: ChangeKind::Added,
                document,
            });
        }
        Ok(inner.listen(Target::Collection(collection.clone()), on_change))
    }
}
