//! The document the user is viewing, shared between the view controller and
//! the sync driver.
//!
//! Writers are the view controller (selection, create, import). The driver
//! watches the cell and turns changes into subscription traffic. Selecting
//! the document that is already current is not a change.

use std::sync::Arc;

use tokio::sync::watch;

use crate::protocol::DocumentId;

#[derive(Debug, Clone)]
pub struct CurrentDocument {
    tx: Arc<watch::Sender<Option<DocumentId>>>,
}

impl CurrentDocument {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn get(&self) -> Option<DocumentId> {
        self.tx.borrow().clone()
    }

    /// Whether `doc_id` is still the current document.
    pub fn is(&self, doc_id: &DocumentId) -> bool {
        self.tx.borrow().as_ref() == Some(doc_id)
    }

    /// Make `doc_id` current. Returns `true` if the selection changed.
    pub fn select(&self, doc_id: DocumentId) -> bool {
        self.tx.send_if_modified(|current| {
            if current.as_ref() == Some(&doc_id) {
                false
            } else {
                *current = Some(doc_id);
                true
            }
        })
    }

    /// Clear the selection. Returns `true` if something was selected.
    pub fn clear(&self) -> bool {
        self.tx.send_if_modified(|current| current.take().is_some())
    }

    /// Receiver that wakes on every selection change.
    pub fn watch(&self) -> watch::Receiver<Option<DocumentId>> {
        self.tx.subscribe()
    }
}

impl Default for CurrentDocument {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_and_clear() {
        let current = CurrentDocument::new();
        assert_eq!(current.get(), None);

        assert!(current.select("a".into()));
        assert!(current.is(&"a".into()));
        assert!(!current.select("a".into()));
        assert!(current.select("b".into()));
        assert!(!current.is(&"a".into()));

        assert!(current.clear());
        assert!(!current.clear());
        assert_eq!(current.get(), None);
    }

    #[test]
    fn test_clones_share_state() {
        let current = CurrentDocument::new();
        let other = current.clone();
        current.select("a".into());
        assert_eq!(other.get(), Some("a".into()));
    }

    #[tokio::test]
    async fn test_watchers_see_changes_not_repeats() {
        let current = CurrentDocument::new();
        let mut rx = current.watch();

        current.select("a".into());
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().clone(), Some("a".into()));

        current.select("a".into());
        assert!(!rx.has_changed().unwrap());
    }
}
