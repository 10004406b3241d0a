//! JSON wire protocol for the notification channel.
//!
//! Client → server control messages:
//! ```text
//! {"action": "subscribe",   "doc_id": "…"}
//! {"action": "unsubscribe", "doc_id": "…"}
//! ```
//!
//! Server → client notifications:
//! ```text
//! {"type": "subscribed",      "doc_id": "…"}
//! {"type": "unsubscribed",    "doc_id": "…"}
//! {"type": "error",           "message": "…"}
//! {"type": "document_update", "doc_id": "…", "action": "insert"}
//! ```
//!
//! Older servers announce updates as
//! `{"status": "success", "value": {"obj": "<doc_id>", "method": "update"}}`;
//! [`Notification::decode`] accepts that envelope too.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Opaque, server-assigned document identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ───────────────────────────────────────────────────────────────────
// Path
// ───────────────────────────────────────────────────────────────────

/// Address of a node inside a document tree.
///
/// Serialized as `/`-joined child indices (`0/1`). The empty path is the
/// document root. The final segment may name an attribute of the addressed
/// node instead of a child (`0/1/content`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path {
    indices: Vec<usize>,
    attribute: Option<String>,
}

impl Path {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn new(indices: impl IntoIterator<Item = usize>) -> Self {
        Self {
            indices: indices.into_iter().collect(),
            attribute: None,
        }
    }

    /// Address an attribute of the node at this path.
    pub fn with_attribute(mut self, name: impl Into<String>) -> Self {
        self.attribute = Some(name.into());
        self
    }

    /// Path of the `index`-th child of this node.
    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.indices.clone();
        indices.push(index);
        Self {
            indices,
            attribute: None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.indices.is_empty() && self.attribute.is_none()
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn attribute(&self) -> Option<&str> {
        self.attribute.as_deref()
    }
}

impl FromStr for Path {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }

        let segments: Vec<&str> = trimmed.split('/').collect();
        let last = segments.len() - 1;
        let mut path = Self::root();

        for (i, segment) in segments.iter().enumerate() {
            if let Ok(index) = segment.parse::<usize>() {
                path.indices.push(index);
                continue;
            }
            let is_name = !segment.is_empty()
                && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if i == last && is_name {
                path.attribute = Some((*segment).to_owned());
            } else {
                return Err(ValidationError::InvalidPath(raw.to_owned()));
            }
        }

        Ok(path)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for index in &self.indices {
            if !first {
                f.write_str("/")?;
            }
            write!(f, "{index}")?;
            first = false;
        }
        if let Some(ref attribute) = self.attribute {
            if !first {
                f.write_str("/")?;
            }
            f.write_str(attribute)?;
        }
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────────
// Messages
// ───────────────────────────────────────────────────────────────────

/// Control message sent by the client over the notification channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ControlMessage {
    Subscribe { doc_id: DocumentId },
    Unsubscribe { doc_id: DocumentId },
}

impl ControlMessage {
    pub fn subscribe(doc_id: DocumentId) -> Self {
        Self::Subscribe { doc_id }
    }

    pub fn unsubscribe(doc_id: DocumentId) -> Self {
        Self::Unsubscribe { doc_id }
    }

    pub fn doc_id(&self) -> &DocumentId {
        match self {
            Self::Subscribe { doc_id } | Self::Unsubscribe { doc_id } => doc_id,
        }
    }

    /// Serialize to a JSON text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }
}

/// Notification pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    Subscribed {
        doc_id: DocumentId,
    },
    Unsubscribed {
        doc_id: DocumentId,
    },
    Error {
        message: String,
    },
    DocumentUpdate {
        doc_id: DocumentId,
        #[serde(default = "default_action")]
        action: String,
    },
}

fn default_action() -> String {
    "update".to_owned()
}

#[derive(Deserialize)]
struct LegacyEnvelope {
    value: LegacyUpdate,
}

#[derive(Deserialize)]
struct LegacyUpdate {
    obj: DocumentId,
    #[serde(default = "default_action")]
    method: String,
}

impl Notification {
    /// Parse a text frame.
    pub fn decode(raw: &str) -> Result<Self, ProtocolError> {
        match serde_json::from_str::<Self>(raw) {
            Ok(notification) => Ok(notification),
            Err(e) => match serde_json::from_str::<LegacyEnvelope>(raw) {
                Ok(legacy) => Ok(Self::DocumentUpdate {
                    doc_id: legacy.value.obj,
                    action: legacy.value.method,
                }),
                Err(_) => Err(ProtocolError::Malformed(e.to_string())),
            },
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Document this notification is about, if any.
    pub fn doc_id(&self) -> Option<&DocumentId> {
        match self {
            Self::Subscribed { doc_id }
            | Self::Unsubscribed { doc_id }
            | Self::DocumentUpdate { doc_id, .. } => Some(doc_id),
            Self::Error { .. } => None,
        }
    }
}

/// Protocol errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Unexpected binary frame ({0} bytes)")]
    BinaryFrame(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_parse_indices() {
        let path: Path = "0/1".parse().unwrap();
        assert_eq!(path.indices(), &[0, 1]);
        assert!(path.attribute().is_none());
        assert_eq!(path.to_string(), "0/1");
    }

    #[test]
    fn test_path_empty_is_root() {
        assert!("".parse::<Path>().unwrap().is_root());
        assert!("  ".parse::<Path>().unwrap().is_root());
        assert!("/".parse::<Path>().unwrap().is_root());
        assert_eq!(Path::root().to_string(), "");
    }

    #[test]
    fn test_path_attribute_leaf() {
        let path: Path = "0/1/content".parse().unwrap();
        assert_eq!(path.indices(), &[0, 1]);
        assert_eq!(path.attribute(), Some("content"));
        assert_eq!(path.to_string(), "0/1/content");

        let bare: Path = "text".parse().unwrap();
        assert!(bare.indices().is_empty());
        assert_eq!(bare.to_string(), "text");
    }

    #[test]
    fn test_path_rejects_inner_names_and_gaps() {
        assert!(matches!(
            "0/content/1".parse::<Path>(),
            Err(ValidationError::InvalidPath(_))
        ));
        assert!("0//1".parse::<Path>().is_err());
        assert!("-1".parse::<Path>().is_err());
        assert!("0/a b".parse::<Path>().is_err());
    }

    #[test]
    fn test_path_child() {
        let path = Path::new([2]).child(0);
        assert_eq!(path.to_string(), "2/0");
        assert_eq!(Path::root().child(3).to_string(), "3");
    }

    #[test]
    fn test_control_message_wire_format() {
        let msg = ControlMessage::subscribe("doc-42".into());
        let json: serde_json::Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({"action": "subscribe", "doc_id": "doc-42"}));

        let msg = ControlMessage::unsubscribe("doc-7".into());
        let json: serde_json::Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({"action": "unsubscribe", "doc_id": "doc-7"}));
    }

    #[test]
    fn test_decode_all_notification_kinds() {
        assert_eq!(
            Notification::decode(r#"{"type":"subscribed","doc_id":"a"}"#).unwrap(),
            Notification::Subscribed { doc_id: "a".into() }
        );
        assert_eq!(
            Notification::decode(r#"{"type":"unsubscribed","doc_id":"a"}"#).unwrap(),
            Notification::Unsubscribed { doc_id: "a".into() }
        );
        assert_eq!(
            Notification::decode(r#"{"type":"error","message":"Invalid JSON"}"#).unwrap(),
            Notification::Error { message: "Invalid JSON".into() }
        );
        assert_eq!(
            Notification::decode(r#"{"type":"document_update","doc_id":"a","action":"delete"}"#)
                .unwrap(),
            Notification::DocumentUpdate {
                doc_id: "a".into(),
                action: "delete".into()
            }
        );
    }

    #[test]
    fn test_document_update_default_action() {
        let n = Notification::decode(r#"{"type":"document_update","doc_id":"a"}"#).unwrap();
        assert_eq!(
            n,
            Notification::DocumentUpdate {
                doc_id: "a".into(),
                action: "update".into()
            }
        );
    }

    #[test]
    fn test_decode_legacy_envelope() {
        let raw = r#"{"status":"success","value":{"obj":"doc-1","method":"insert"}}"#;
        let n = Notification::decode(raw).unwrap();
        assert_eq!(n.doc_id(), Some(&DocumentId::from("doc-1")));
        assert!(matches!(n, Notification::DocumentUpdate { ref action, .. } if action == "insert"));
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(
            Notification::decode("not json"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(Notification::decode(r#"{"type":"kicked"}"#).is_err());
        assert!(Notification::decode(r#"{"type":"document_update"}"#).is_err());
    }
}
