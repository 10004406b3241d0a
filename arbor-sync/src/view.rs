//! View controller: loads, edits and searches the current document.
//!
//! Every load runs two independent requests, the rendered markup and the
//! structured tree. Each response is delivered to the [`ViewSink`] only if
//! the document and path it was issued for are still the ones on screen when
//! it arrives; anything older is dropped.
//!
//! Mutations that fail leave the selection untouched. Mutations that succeed
//! reload the affected view, unless the user switched documents while the
//! request was in flight; the selection is never changed by a reload.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;

use crate::current::CurrentDocument;
use crate::error::{SyncError, ValidationError};
use crate::protocol::{DocumentId, Path};
use crate::service::{DocumentService, InsertPayload};

/// Receives load results for display.
pub trait ViewSink: Send + Sync {
    fn rendered(&self, doc_id: &DocumentId, path: &Path, result: Result<String, SyncError>);

    fn structured(&self, doc_id: &DocumentId, path: &Path, result: Result<Value, SyncError>);
}

/// What happened to one half of a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Shown,
    Failed,
    /// The response arrived after the user moved on and was discarded.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOutcome {
    pub rendered: Delivery,
    pub structured: Delivery,
}

impl LoadOutcome {
    pub fn stale() -> Self {
        Self {
            rendered: Delivery::Stale,
            structured: Delivery::Stale,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.rendered == Delivery::Stale && self.structured == Delivery::Stale
    }
}

/// Result of a successful edit to the current document.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    /// Service response body.
    pub response: Value,
    pub reload: LoadOutcome,
}

pub struct DocumentView<S> {
    service: Arc<S>,
    current: CurrentDocument,
    sink: Arc<dyn ViewSink>,
    view_path: Arc<RwLock<Path>>,
}

impl<S> Clone for DocumentView<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            current: self.current.clone(),
            sink: Arc::clone(&self.sink),
            view_path: Arc::clone(&self.view_path),
        }
    }
}

impl<S: DocumentService> DocumentView<S> {
    pub fn new(service: Arc<S>, current: CurrentDocument, sink: Arc<dyn ViewSink>) -> Self {
        Self {
            service,
            current,
            sink,
            view_path: Arc::new(RwLock::new(Path::root())),
        }
    }

    pub fn current(&self) -> Option<DocumentId> {
        self.current.get()
    }

    pub fn current_document(&self) -> &CurrentDocument {
        &self.current
    }

    /// Path of the subtree on screen.
    pub async fn view_path(&self) -> Path {
        self.view_path.read().await.clone()
    }

    /// Make `doc_id` current and show the subtree at `path`.
    pub async fn load(&self, doc_id: DocumentId, path: Path) -> LoadOutcome {
        if self.current.select(doc_id.clone()) {
            log::info!("Switched to document {doc_id}");
        }
        *self.view_path.write().await = path.clone();
        self.fetch_view(doc_id, path).await
    }

    /// Reload the subtree on screen. `None` when no document is selected.
    pub async fn refresh(&self) -> Option<LoadOutcome> {
        let doc_id = self.current.get()?;
        let path = self.view_path().await;
        Some(self.fetch_view(doc_id, path).await)
    }

    /// Reload `doc_id` after an edit, at `path` or at the path on screen.
    async fn reload(&self, doc_id: DocumentId, path: Option<Path>) -> LoadOutcome {
        if !self.current.is(&doc_id) {
            log::debug!("Skipping reload of {doc_id}: no longer current");
            return LoadOutcome::stale();
        }
        let path = match path {
            Some(path) => {
                *self.view_path.write().await = path.clone();
                path
            }
            None => self.view_path().await,
        };
        self.fetch_view(doc_id, path).await
    }

    async fn fetch_view(&self, doc_id: DocumentId, path: Path) -> LoadOutcome {
        let rendered = async {
            let result = self.service.render(&doc_id, &path).await;
            if !self.still_viewing(&doc_id, &path).await {
                log::debug!("Discarding stale render of {doc_id} at {path:?}");
                return Delivery::Stale;
            }
            let delivery = delivery_of(&result);
            self.sink.rendered(&doc_id, &path, result);
            delivery
        };
        let structured = async {
            let result = self.service.fetch(&doc_id, &path).await;
            if !self.still_viewing(&doc_id, &path).await {
                log::debug!("Discarding stale tree of {doc_id} at {path:?}");
                return Delivery::Stale;
            }
            let delivery = delivery_of(&result);
            self.sink.structured(&doc_id, &path, result);
            delivery
        };

        let (rendered, structured) = tokio::join!(rendered, structured);
        LoadOutcome { rendered, structured }
    }

    async fn still_viewing(&self, doc_id: &DocumentId, path: &Path) -> bool {
        self.current.is(doc_id) && *self.view_path.read().await == *path
    }

    fn require_document(&self) -> Result<DocumentId, SyncError> {
        self.current
            .get()
            .ok_or_else(|| ValidationError::NoDocumentSelected.into())
    }

    /// Insert under the node at `path`, then show that node.
    ///
    /// The root cannot be an insertion target.
    pub async fn insert(
        &self,
        path: Path,
        payload: impl Into<InsertPayload>,
    ) -> Result<Mutation, SyncError> {
        let doc_id = self.require_document()?;
        if path.is_root() {
            return Err(ValidationError::InvalidPath(String::new()).into());
        }
        let payload = payload.into();

        let response = self.service.insert(&doc_id, &path, &payload).await?;
        log::info!("Inserted into {doc_id} at {path}");
        let reload = self.reload(doc_id, Some(path)).await;
        Ok(Mutation { response, reload })
    }

    /// Embed document `other` under the node at `path`, then show that node.
    pub async fn insert_document(
        &self,
        path: Path,
        other: DocumentId,
    ) -> Result<Mutation, SyncError> {
        let doc_id = self.require_document()?;
        if path.is_root() {
            return Err(ValidationError::InvalidPath(String::new()).into());
        }
        if other == doc_id {
            let reason = format!("cannot embed {doc_id} in itself");
            return Err(ValidationError::InvalidPayload(reason).into());
        }

        let response = self.service.insert_document(&doc_id, &path, &other).await?;
        log::info!("Embedded {other} into {doc_id} at {path}");
        let reload = self.reload(doc_id, Some(path)).await;
        Ok(Mutation { response, reload })
    }

    /// Insert a structural element if `raw` names one, plain text otherwise.
    pub async fn quick_insert(&self, path: Path, raw: &str) -> Result<Mutation, SyncError> {
        self.insert(path, InsertPayload::classify(raw)).await
    }

    /// Delete the node at `path` (the whole tree for the root) and reload
    /// the view.
    pub async fn delete(&self, path: Path) -> Result<Mutation, SyncError> {
        let doc_id = self.require_document()?;

        let response = self.service.delete(&doc_id, &path).await?;
        log::info!("Deleted {path:?} from {doc_id}");
        let reload = self.reload(doc_id, None).await;
        Ok(Mutation { response, reload })
    }

    /// Remove the current document from the service and deselect it.
    pub async fn delete_document(&self) -> Result<Value, SyncError> {
        let doc_id = self.require_document()?;

        let response = self.service.delete_document(&doc_id).await?;
        log::info!("Deleted document {doc_id}");
        if self.current.is(&doc_id) {
            self.current.clear();
            *self.view_path.write().await = Path::root();
        }
        Ok(response)
    }

    /// Node embedding the current document.
    pub async fn parent(&self) -> Result<Value, SyncError> {
        let doc_id = self.require_document()?;
        self.service.parent(&doc_id).await
    }

    /// Full-text search within the current document.
    pub async fn search(&self, query: &str) -> Result<Vec<Value>, SyncError> {
        let doc_id = self.require_document()?;
        let query = query.trim();
        if query.is_empty() {
            return Err(ValidationError::EmptyQuery.into());
        }
        self.service.search(&doc_id, query).await
    }

    pub async fn documents(&self) -> Result<Vec<DocumentId>, SyncError> {
        self.service.list().await
    }

    /// Create an empty document and open its root.
    pub async fn create(&self) -> Result<DocumentId, SyncError> {
        let doc_id = self.service.create().await?;
        log::info!("Created document {doc_id}");
        self.load(doc_id.clone(), Path::root()).await;
        Ok(doc_id)
    }

    /// Import a structured tree as a new document and open its root.
    pub async fn import(&self, tree: &Value) -> Result<DocumentId, SyncError> {
        let doc_id = self.service.import(tree).await?;
        log::info!("Imported document {doc_id}");
        self.load(doc_id.clone(), Path::root()).await;
        Ok(doc_id)
    }

    /// [`Self::import`] from JSON text.
    pub async fn import_str(&self, raw: &str) -> Result<DocumentId, SyncError> {
        let tree: Value = serde_json::from_str(raw)
            .map_err(|e| ValidationError::InvalidPayload(format!("Invalid JSON syntax: {e}")))?;
        self.import(&tree).await
    }
}

fn delivery_of<T>(result: &Result<T, SyncError>) -> Delivery {
    match result {
        Ok(_) => Delivery::Shown,
        Err(_) => Delivery::Failed,
    }
}
