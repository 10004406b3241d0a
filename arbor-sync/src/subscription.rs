//! Reconciles the document the user is viewing with the document the server
//! is asked to notify about.
//!
//! The tracker only decides which control messages to send; the caller puts
//! them on the wire in the returned order.

use crate::protocol::{ControlMessage, DocumentId};

#[derive(Debug, Default)]
pub struct SubscriptionTracker {
    /// Document the user is viewing. Survives reconnects.
    current: Option<DocumentId>,
    /// Document the server has on record for this connection.
    subscribed: Option<DocumentId>,
}

impl SubscriptionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&DocumentId> {
        self.current.as_ref()
    }

    pub fn subscribed(&self) -> Option<&DocumentId> {
        self.subscribed.as_ref()
    }

    /// Record a document selection.
    ///
    /// While the channel is not open the selection is only recorded; the
    /// subscribe is deferred to [`Self::on_open`].
    pub fn set_current_document(&mut self, doc_id: DocumentId, open: bool) -> Vec<ControlMessage> {
        self.current = Some(doc_id.clone());
        if !open {
            return Vec::new();
        }

        let mut messages = Vec::with_capacity(2);
        if let Some(previous) = self.subscribed.take() {
            if previous != doc_id {
                messages.push(ControlMessage::unsubscribe(previous));
            }
        }
        messages.push(ControlMessage::subscribe(doc_id.clone()));
        self.subscribed = Some(doc_id);
        messages
    }

    /// Drop the current selection, unsubscribing if the channel is open.
    pub fn clear_current_document(&mut self, open: bool) -> Vec<ControlMessage> {
        self.current = None;
        match self.subscribed.take() {
            Some(previous) if open => vec![ControlMessage::unsubscribe(previous)],
            _ => Vec::new(),
        }
    }

    /// The channel reached `Open`: the server has forgotten every previous
    /// subscription, so re-issue interest in the current document.
    pub fn on_open(&mut self) -> Option<ControlMessage> {
        let doc_id = self.current.clone()?;
        self.subscribed = Some(doc_id.clone());
        Some(ControlMessage::subscribe(doc_id))
    }

    /// The channel left `Open`.
    pub fn on_disconnect(&mut self) {
        self.subscribed = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str) -> DocumentId {
        DocumentId::from(id)
    }

    #[test]
    fn test_first_selection_subscribes() {
        let mut tracker = SubscriptionTracker::new();
        let msgs = tracker.set_current_document(doc("a"), true);
        assert_eq!(msgs, vec![ControlMessage::subscribe(doc("a"))]);
        assert_eq!(tracker.subscribed(), Some(&doc("a")));
        assert_eq!(tracker.current(), Some(&doc("a")));
    }

    #[test]
    fn test_switch_unsubscribes_previous_first() {
        let mut tracker = SubscriptionTracker::new();
        tracker.set_current_document(doc("a"), true);
        let msgs = tracker.set_current_document(doc("b"), true);
        assert_eq!(
            msgs,
            vec![
                ControlMessage::unsubscribe(doc("a")),
                ControlMessage::subscribe(doc("b")),
            ]
        );
        assert_eq!(tracker.subscribed(), Some(&doc("b")));
    }

    #[test]
    fn test_reselecting_same_document_resubscribes_without_unsubscribe() {
        let mut tracker = SubscriptionTracker::new();
        tracker.set_current_document(doc("a"), true);
        let msgs = tracker.set_current_document(doc("a"), true);
        assert_eq!(msgs, vec![ControlMessage::subscribe(doc("a"))]);
    }

    #[test]
    fn test_selection_while_closed_is_deferred() {
        let mut tracker = SubscriptionTracker::new();
        assert!(tracker.set_current_document(doc("a"), false).is_empty());
        assert_eq!(tracker.current(), Some(&doc("a")));
        assert_eq!(tracker.subscribed(), None);

        assert_eq!(tracker.on_open(), Some(ControlMessage::subscribe(doc("a"))));
        assert_eq!(tracker.subscribed(), Some(&doc("a")));
    }

    #[test]
    fn test_disconnect_forgets_subscription_but_not_selection() {
        let mut tracker = SubscriptionTracker::new();
        tracker.set_current_document(doc("doc-42"), true);
        tracker.on_disconnect();
        assert_eq!(tracker.subscribed(), None);
        assert_eq!(tracker.current(), Some(&doc("doc-42")));

        // After reconnect only the current document is subscribed, and no
        // unsubscribe is needed for the forgotten one.
        assert_eq!(tracker.on_open(), Some(ControlMessage::subscribe(doc("doc-42"))));
        let msgs = tracker.set_current_document(doc("b"), true);
        assert_eq!(msgs[0], ControlMessage::unsubscribe(doc("doc-42")));
    }

    #[test]
    fn test_open_without_selection_sends_nothing() {
        let mut tracker = SubscriptionTracker::new();
        assert_eq!(tracker.on_open(), None);
    }

    #[test]
    fn test_clear_current_document() {
        let mut tracker = SubscriptionTracker::new();
        tracker.set_current_document(doc("a"), true);
        assert_eq!(
            tracker.clear_current_document(true),
            vec![ControlMessage::unsubscribe(doc("a"))]
        );
        assert_eq!(tracker.current(), None);
        assert!(tracker.clear_current_document(true).is_empty());
    }

    #[test]
    fn test_subscription_converges_to_last_selection() {
        let sequence = ["a", "b", "b", "c", "a", "d", "d", "e"];
        let mut tracker = SubscriptionTracker::new();
        let mut sent = Vec::new();
        for id in sequence {
            sent.extend(tracker.set_current_document(doc(id), true));
        }
        assert_eq!(tracker.subscribed(), Some(&doc("e")));

        // Replay the wire: every unsubscribe names the live subscription,
        // and a live subscription is replaced only after its unsubscribe.
        let mut live: Option<DocumentId> = None;
        for msg in sent {
            match msg {
                ControlMessage::Unsubscribe { doc_id } => {
                    assert_eq!(live.take(), Some(doc_id));
                }
                ControlMessage::Subscribe { doc_id } => {
                    if let Some(ref prev) = live {
                        assert_eq!(prev, &doc_id);
                    }
                    live = Some(doc_id);
                }
            }
        }
        assert_eq!(live, Some(doc("e")));
    }
}
