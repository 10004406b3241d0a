//! reqwest implementation of [`DocumentService`].
//!
//! JSON endpoints answer with an envelope:
//! ```text
//! {"result": "success", "value": …}
//! {"result": "error",   "reason": "Path not found"}
//! ```
//! The render endpoint answers with the rendered markup as plain text.

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::SyncError;
use crate::protocol::{DocumentId, Path, ProtocolError};
use crate::service::{DocumentService, InsertPayload};

#[derive(Debug, Clone)]
pub struct HttpDocumentService {
    client: reqwest::Client,
    base: Url,
}

impl HttpDocumentService {
    pub fn new(config: &ClientConfig) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Self::with_client(client, &config.api_base)
    }

    /// Wrap an existing reqwest client.
    pub fn with_client(client: reqwest::Client, api_base: &str) -> Result<Self, SyncError> {
        let base = Url::parse(api_base)
            .map_err(|e| SyncError::Config(format!("api base {api_base:?}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(SyncError::Config(format!("api base {api_base:?} cannot be a base URL")));
        }
        Ok(Self { client, base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// `{base}/documents/{segments...}`, each segment percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, SyncError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::Config(format!("api base {} cannot be a base URL", self.base)))?
            .pop_if_empty()
            .push("documents")
            .extend(segments);
        Ok(url)
    }

    fn scoped(request: reqwest::RequestBuilder, path: &Path) -> reqwest::RequestBuilder {
        if path.is_root() {
            request
        } else {
            request.query(&[("path", path.to_string())])
        }
    }

    async fn send_json(&self, request: reqwest::RequestBuilder) -> Result<Value, SyncError> {
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        unwrap_envelope(status, &body)
    }
}

fn transport(e: reqwest::Error) -> SyncError {
    SyncError::Transport(e.to_string())
}

/// Interpret a JSON response body.
///
/// A non-2xx status or `"result": "error"` is a rejection carrying the
/// service's `reason`, falling back to the raw body and then the status text.
pub fn unwrap_envelope(status: StatusCode, body: &str) -> Result<Value, SyncError> {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let is_error = parsed
        .as_ref()
        .and_then(|v| v.get("result"))
        .and_then(Value::as_str)
        == Some("error");

    if !status.is_success() || is_error {
        return Err(rejection(status, body));
    }

    match parsed {
        Some(Value::Object(mut map)) if map.contains_key("result") => {
            Ok(map.remove("value").unwrap_or(Value::Null))
        }
        Some(value) => Ok(value),
        None => Err(ProtocolError::Malformed(format!("response is not JSON: {body:.64}")).into()),
    }
}

fn rejection(status: StatusCode, body: &str) -> SyncError {
    let reason = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("reason").and_then(Value::as_str).map(str::to_owned))
        .or_else(|| Some(body.trim().to_owned()).filter(|b| !b.is_empty()))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_owned());
    SyncError::rejected(Some(status.as_u16()), reason)
}

/// Accepts `["id", …]` and the row form `[["id"], …]`. Empty ids are skipped.
pub fn parse_document_ids(value: Value) -> Result<Vec<DocumentId>, SyncError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Null => return Ok(Vec::new()),
        other => {
            let reason = format!("expected a document list, got {other}");
            return Err(ProtocolError::Malformed(reason).into());
        }
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(id) => Some(id),
            Value::Array(row) => row.into_iter().next().and_then(|v| v.as_str().map(str::to_owned)),
            _ => None,
        })
        .filter(|id| !id.is_empty())
        .map(DocumentId::from)
        .collect())
}

fn parse_document_id(value: Value) -> Result<DocumentId, SyncError> {
    match value {
        Value::String(id) if !id.is_empty() => Ok(DocumentId::from(id)),
        other => {
            Err(ProtocolError::Malformed(format!("expected a document id, got {other}")).into())
        }
    }
}

#[async_trait]
impl DocumentService for HttpDocumentService {
    async fn list(&self) -> Result<Vec<DocumentId>, SyncError> {
        let url = self.endpoint(&[])?;
        parse_document_ids(self.send_json(self.client.get(url)).await?)
    }

    async fn create(&self) -> Result<DocumentId, SyncError> {
        let url = self.endpoint(&[])?;
        parse_document_id(self.send_json(self.client.post(url)).await?)
    }

    async fn import(&self, payload: &Value) -> Result<DocumentId, SyncError> {
        let url = self.endpoint(&["import"])?;
        parse_document_id(self.send_json(self.client.post(url).json(payload)).await?)
    }

    async fn render(&self, doc_id: &DocumentId, path: &Path) -> Result<String, SyncError> {
        let url = self.endpoint(&[doc_id.as_str(), "render"])?;
        let response = Self::scoped(self.client.get(url), path)
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(rejection(status, &body))
        }
    }

    async fn fetch(&self, doc_id: &DocumentId, path: &Path) -> Result<Value, SyncError> {
        let url = self.endpoint(&[doc_id.as_str()])?;
        self.send_json(Self::scoped(self.client.get(url), path)).await
    }

    async fn insert(
        &self,
        doc_id: &DocumentId,
        path: &Path,
        payload: &InsertPayload,
    ) -> Result<Value, SyncError> {
        let url = self.endpoint(&[doc_id.as_str(), "insert"])?;
        let request = Self::scoped(self.client.post(url), path).json(&payload.to_body());
        self.send_json(request).await
    }

    async fn insert_document(
        &self,
        doc_id: &DocumentId,
        path: &Path,
        other: &DocumentId,
    ) -> Result<Value, SyncError> {
        let url = self.endpoint(&[doc_id.as_str(), "insert", other.as_str()])?;
        self.send_json(Self::scoped(self.client.post(url), path)).await
    }

    async fn delete(&self, doc_id: &DocumentId, path: &Path) -> Result<Value, SyncError> {
        let url = self.endpoint(&[doc_id.as_str(), "delete"])?;
        self.send_json(Self::scoped(self.client.delete(url), path)).await
    }

    async fn delete_document(&self, doc_id: &DocumentId) -> Result<Value, SyncError> {
        let url = self.endpoint(&[doc_id.as_str(), "delete"])?;
        self.send_json(self.client.delete(url)).await
    }

    async fn parent(&self, doc_id: &DocumentId) -> Result<Value, SyncError> {
        let url = self.endpoint(&[doc_id.as_str(), "parent"])?;
        self.send_json(self.client.get(url)).await
    }

    async fn search(&self, doc_id: &DocumentId, query: &str) -> Result<Vec<Value>, SyncError> {
        let url = self.endpoint(&[doc_id.as_str(), "search"])?;
        let value = self
            .send_json(self.client.get(url).query(&[("q", query)]))
            .await?;
        match value {
            Value::Array(results) => Ok(results),
            Value::Null => Ok(Vec::new()),
            other => {
                let reason = format!("expected search results, got {other}");
                Err(ProtocolError::Malformed(reason).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BASE: &str = "http://localhost:8000/api";

    fn service() -> HttpDocumentService {
        HttpDocumentService::with_client(reqwest::Client::new(), BASE).unwrap()
    }

    #[test]
    fn test_endpoints() {
        let service = service();
        assert_eq!(
            service.endpoint(&[]).unwrap().as_str(),
            "http://localhost:8000/api/documents"
        );
        assert_eq!(
            service.endpoint(&["abc", "render"]).unwrap().as_str(),
            "http://localhost:8000/api/documents/abc/render"
        );
        assert_eq!(
            service.endpoint(&["import"]).unwrap().as_str(),
            "http://localhost:8000/api/documents/import"
        );
    }

    #[test]
    fn test_document_scoped_routes() {
        let service = service();
        let url = |request: reqwest::RequestBuilder| request.build().unwrap().url().to_string();

        let embed = service.endpoint(&["a", "insert", "b"]).unwrap();
        let path: Path = "0/1".parse().unwrap();
        assert_eq!(
            url(HttpDocumentService::scoped(service.client.post(embed), &path)),
            "http://localhost:8000/api/documents/a/insert/b?path=0%2F1"
        );

        let parent = service.endpoint(&["a", "parent"]).unwrap();
        assert_eq!(
            url(service.client.get(parent)),
            "http://localhost:8000/api/documents/a/parent"
        );

        // Deleting at the root sends no path, which removes the document.
        let delete = service.endpoint(&["a", "delete"]).unwrap();
        assert_eq!(
            url(HttpDocumentService::scoped(service.client.delete(delete), &Path::root())),
            "http://localhost:8000/api/documents/a/delete"
        );
    }

    #[test]
    fn test_parent_rejection_with_success_status() {
        let body = r#"{"result":"error","reason":"Document does not have a parent"}"#;
        let err = unwrap_envelope(StatusCode::OK, body).unwrap_err();
        assert!(matches!(
            err,
            SyncError::Rejected { status: Some(200), ref reason }
                if reason == "Document does not have a parent"
        ));
    }

    #[test]
    fn test_trailing_slash_base() {
        let base = format!("{BASE}/");
        let service = HttpDocumentService::with_client(reqwest::Client::new(), &base).unwrap();
        assert_eq!(
            service.endpoint(&["a"]).unwrap().as_str(),
            "http://localhost:8000/api/documents/a"
        );
    }

    #[test]
    fn test_ids_are_percent_encoded() {
        let url = service().endpoint(&["a/b c"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/documents/a%2Fb%20c");
    }

    #[test]
    fn test_invalid_base() {
        assert!(matches!(
            HttpDocumentService::with_client(reqwest::Client::new(), "not a url"),
            Err(SyncError::Config(_))
        ));
        assert!(HttpDocumentService::with_client(reqwest::Client::new(), "mailto:x@y").is_err());
    }

    #[test]
    fn test_envelope_success() {
        let body = r#"{"result":"success","value":{"markup":"document"}}"#;
        let value = unwrap_envelope(StatusCode::OK, body).unwrap();
        assert_eq!(value, json!({"markup": "document"}));

        let value = unwrap_envelope(StatusCode::CREATED, r#"{"result":"success"}"#).unwrap();
        assert_eq!(value, Value::Null);

        // Bodies without an envelope are taken as the value itself.
        assert_eq!(unwrap_envelope(StatusCode::OK, "[1,2]").unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_envelope_rejections() {
        let body = r#"{"result":"error","reason":"Path not found"}"#;
        let err = unwrap_envelope(StatusCode::NOT_FOUND, body).unwrap_err();
        assert!(matches!(
            err,
            SyncError::Rejected { status: Some(404), ref reason } if reason == "Path not found"
        ));

        // Error result with a success status is still a rejection.
        let body = r#"{"result":"error","reason":"Invalid UUID"}"#;
        let err = unwrap_envelope(StatusCode::OK, body).unwrap_err();
        assert_eq!(err.to_string(), "Service rejected request: Invalid UUID");

        let body = "Error resolving path: bad";
        let err = unwrap_envelope(StatusCode::BAD_REQUEST, body).unwrap_err();
        assert!(matches!(err, SyncError::Rejected { ref reason, .. } if reason == body));

        let err = unwrap_envelope(StatusCode::BAD_GATEWAY, "").unwrap_err();
        assert!(matches!(err, SyncError::Rejected { ref reason, .. } if reason == "Bad Gateway"));
    }

    #[test]
    fn test_envelope_malformed_success() {
        let err = unwrap_envelope(StatusCode::OK, "<html>").unwrap_err();
        assert!(matches!(err, SyncError::Protocol(ProtocolError::Malformed(_))));
    }

    #[test]
    fn test_parse_document_ids_shapes() {
        let ids = parse_document_ids(json!([["4e16"], ["9a2b", "extra"], [], [""]])).unwrap();
        assert_eq!(ids, vec![DocumentId::from("4e16"), DocumentId::from("9a2b")]);

        let ids = parse_document_ids(json!(["a", "b", 3])).unwrap();
        assert_eq!(ids, vec![DocumentId::from("a"), DocumentId::from("b")]);

        assert!(parse_document_ids(Value::Null).unwrap().is_empty());
        assert!(parse_document_ids(json!({"a": 1})).is_err());
    }

    #[test]
    fn test_parse_document_id() {
        assert_eq!(parse_document_id(json!("abc")).unwrap(), DocumentId::from("abc"));
        assert!(parse_document_id(json!("")).is_err());
        assert!(parse_document_id(json!(5)).is_err());
    }
}
