//! Request/response boundary to the document service.
//!
//! The service owns storage, path resolution and rendering. This crate only
//! needs the operations below; [`crate::http::HttpDocumentService`] is the
//! production implementation.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::SyncError;
use crate::protocol::{DocumentId, Path};

#[async_trait]
pub trait DocumentService: Send + Sync {
    /// `GET /documents`
    async fn list(&self) -> Result<Vec<DocumentId>, SyncError>;

    /// `POST /documents`
    async fn create(&self) -> Result<DocumentId, SyncError>;

    /// `POST /documents/import`
    async fn import(&self, payload: &Value) -> Result<DocumentId, SyncError>;

    /// `GET /documents/{id}/render?path=P`
    async fn render(&self, doc_id: &DocumentId, path: &Path) -> Result<String, SyncError>;

    /// `GET /documents/{id}?path=P`
    async fn fetch(&self, doc_id: &DocumentId, path: &Path) -> Result<Value, SyncError>;

    /// `POST /documents/{id}/insert?path=P`
    async fn insert(
        &self,
        doc_id: &DocumentId,
        path: &Path,
        payload: &InsertPayload,
    ) -> Result<Value, SyncError>;

    /// `POST /documents/{id}/insert/{other}?path=P`: embed another document.
    async fn insert_document(
        &self,
        doc_id: &DocumentId,
        path: &Path,
        other: &DocumentId,
    ) -> Result<Value, SyncError>;

    /// `DELETE /documents/{id}/delete?path=P`
    async fn delete(&self, doc_id: &DocumentId, path: &Path) -> Result<Value, SyncError>;

    /// `DELETE /documents/{id}/delete`: remove the document itself.
    async fn delete_document(&self, doc_id: &DocumentId) -> Result<Value, SyncError>;

    /// `GET /documents/{id}/parent`: `{"id", "markup", ...attributes}` of the
    /// document embedding this one.
    async fn parent(&self, doc_id: &DocumentId) -> Result<Value, SyncError>;

    /// `GET /documents/{id}/search?q=Q`
    async fn search(&self, doc_id: &DocumentId, query: &str) -> Result<Vec<Value>, SyncError>;
}

// ───────────────────────────────────────────────────────────────────
// Structural elements
// ───────────────────────────────────────────────────────────────────

/// Node kinds the service can create from a bare name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Document,
    Paragraph,
    Strong,
    Text,
    List,
    Item,
    Table,
    Row,
    Cell,
    Image,
}

impl ElementKind {
    pub const ALL: [ElementKind; 10] = [
        Self::Document,
        Self::Paragraph,
        Self::Strong,
        Self::Text,
        Self::List,
        Self::Item,
        Self::Table,
        Self::Row,
        Self::Cell,
        Self::Image,
    ];

    /// Markup name on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Paragraph => "paragraph",
            Self::Strong => "strong",
            Self::Text => "text",
            Self::List => "list",
            Self::Item => "item",
            Self::Table => "table",
            Self::Row => "row",
            Self::Cell => "cell",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Matching is case-insensitive and ignores surrounding whitespace.
impl FromStr for ElementKind {
    type Err = ();

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(raw))
            .ok_or(())
    }
}

// ───────────────────────────────────────────────────────────────────
// Insert payloads
// ───────────────────────────────────────────────────────────────────

/// Body of an insert request.
///
/// | Variant | Wire body |
/// |---------|-----------|
/// | `Structured(v)` | `v` as given |
/// | `Element(k)` | `"paragraph"` (a bare JSON string) |
/// | `Value(s)` | `{"value": s}` |
#[derive(Debug, Clone, PartialEq)]
pub enum InsertPayload {
    Structured(Value),
    Element(ElementKind),
    Value(String),
}

impl InsertPayload {
    /// Interpret free-text input: a JSON object or array is sent as-is,
    /// anything else is wrapped as a plain value.
    pub fn parse_input(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(value @ (Value::Object(_) | Value::Array(_))) => Self::Structured(value),
            _ => Self::Value(raw.to_owned()),
        }
    }

    /// Structural element if `raw` names one, plain value otherwise.
    pub fn classify(raw: &str) -> Self {
        match raw.parse::<ElementKind>() {
            Ok(kind) => Self::Element(kind),
            Err(()) => Self::Value(raw.to_owned()),
        }
    }

    pub fn to_body(&self) -> Value {
        match self {
            Self::Structured(value) => value.clone(),
            Self::Element(kind) => Value::String(kind.as_str().to_owned()),
            Self::Value(text) => serde_json::json!({ "value": text }),
        }
    }
}

impl From<Value> for InsertPayload {
    fn from(value: Value) -> Self {
        Self::Structured(value)
    }
}

impl From<String> for InsertPayload {
    fn from(text: String) -> Self {
        Self::Value(text)
    }
}

impl From<&str> for InsertPayload {
    fn from(text: &str) -> Self {
        Self::Value(text.to_owned())
    }
}

impl From<ElementKind> for InsertPayload {
    fn from(kind: ElementKind) -> Self {
        Self::Element(kind)
    }
}
