//! Remote HTTP object store backend.
//!
//! Objects live at `{base_url}/{path}`. Reads are `GET`, writes are a single
//! `PUT` of the whole document. An optional bearer token authorizes both.
//! One attempt is made per call, with no retry and no explicit timeout.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE, PRAGMA};
use reqwest::StatusCode;
use tracing::{debug, instrument};

use super::backend::BlobBackend;
use crate::error::{Error, Result};

/// Blob backend speaking plain HTTP `GET`/`PUT`.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    auth_bearer: Option<String>,
    client: reqwest::Client,
}

impl HttpBackend {
    /// Create a backend for the object store at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, auth_bearer: Option<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            auth_bearer: auth_bearer.filter(|t| !t.is_empty()),
            client: reqwest::Client::new(),
        }
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn auth_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.auth_bearer {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| Error::internal(format!("invalid auth header: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }
}

#[async_trait]
impl BlobBackend for HttpBackend {
    fn backend_tag(&self) -> &'static str {
        "http"
    }

    fn describe(&self, path: &str) -> String {
        self.object_url(path)
    }

    #[instrument(name = "http_backend_get", skip(self))]
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let url = self.object_url(path);
        let mut headers = self.auth_headers()?;
        headers.insert(
            CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        );
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

        let resp = self
            .client
            .get(&url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| Error::storage_read(&url, e.to_string()))?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let bytes = resp
                    .bytes()
                    .await
                    .map_err(|e| Error::storage_read(&url, format!("read body failed: {e}")))?;
                debug!(%url, bytes = bytes.len(), "fetched blob");
                Ok(Some(bytes.to_vec()))
            }
            status => Err(Error::storage_read(&url, format!("status {status}"))),
        }
    }

    #[instrument(name = "http_backend_put", skip(self, body), fields(bytes = body.len()))]
    async fn put(&self, path: &str, body: Vec<u8>) -> Result<()> {
        let url = self.object_url(path);
        let mut headers = self.auth_headers()?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let resp = self
            .client
            .put(&url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::storage_write(&url, e.to_string()))?;

        if resp.status().is_success() {
            debug!(%url, "stored blob");
            Ok(())
        } else {
            Err(Error::storage_write(&url, format!("status {}", resp.status())))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use axum::body::Bytes;
    use axum::extract::{Path, State};
    use axum::http::{HeaderMap as AxumHeaders, StatusCode as AxumStatus};
    use axum::routing::get;
    use axum::Router;
    use tokio::sync::Mutex;

    use super::*;

    type Objects = Arc<Mutex<HashMap<String, Vec<u8>>>>;

    fn authorized(headers: &AxumHeaders) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == "Bearer t0ken")
    }

    async fn get_object(
        State(objects): State<Objects>,
        Path(key): Path<String>,
        headers: AxumHeaders,
    ) -> std::result::Result<Vec<u8>, AxumStatus> {
        if !authorized(&headers) {
            return Err(AxumStatus::UNAUTHORIZED);
        }
        if key.ends_with("broken.json") {
            return Err(AxumStatus::SERVICE_UNAVAILABLE);
        }
        objects
            .lock()
            .await
            .get(&key)
            .cloned()
            .ok_or(AxumStatus::NOT_FOUND)
    }

    async fn put_object(
        State(objects): State<Objects>,
        Path(key): Path<String>,
        headers: AxumHeaders,
        body: Bytes,
    ) -> AxumStatus {
        if !authorized(&headers) {
            return AxumStatus::UNAUTHORIZED;
        }
        objects.lock().await.insert(key, body.to_vec());
        AxumStatus::OK
    }

    async fn spawn_object_store() -> String {
        let objects: Objects = Arc::default();
        let app = Router::new()
            .route("/*key", get(get_object).put(put_object))
            .with_state(objects);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn test_object_url_joins_cleanly() {
        let backend = HttpBackend::new("https://blob.example.com/", None);
        assert_eq!(
            backend.object_url("/labels/entries.json"),
            "https://blob.example.com/labels/entries.json"
        );
        assert_eq!(backend.backend_tag(), "http");
    }

    #[test]
    fn test_empty_token_is_ignored() {
        let backend = HttpBackend::new("https://blob.example.com", Some(String::new()));
        assert!(backend.auth_headers().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_roundtrip_against_object_store() {
        let base = spawn_object_store().await;
        let backend = HttpBackend::new(base, Some("t0ken".to_string()));

        assert!(backend.get("labels/entries.json").await.unwrap().is_none());
        backend
            .put("labels/entries.json", b"[]".to_vec())
            .await
            .unwrap();
        assert_eq!(
            backend.get("labels/entries.json").await.unwrap().unwrap(),
            b"[]"
        );
    }

    #[tokio::test]
    async fn test_rejected_token_is_a_storage_error() {
        let base = spawn_object_store().await;
        let backend = HttpBackend::new(base, Some("wrong".to_string()));

        let read = backend.get("labels/entries.json").await.unwrap_err();
        assert!(matches!(read, Error::StorageRead { .. }));

        let write = backend
            .put("labels/entries.json", b"[]".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(write, Error::StorageWrite { .. }));
    }

    #[tokio::test]
    async fn test_server_error_is_not_treated_as_missing() {
        let base = spawn_object_store().await;
        let backend = HttpBackend::new(base, Some("t0ken".to_string()));

        let err = backend.get("labels/broken.json").await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }
}
