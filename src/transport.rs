//! HTTP transport bound to the backend base host.
//!
//! Each call performs exactly one HTTP request: no retries, and no timeout beyond what the
//! underlying `reqwest` client applies. Failures are returned to the caller as
//! [`TransportError`] without interpretation; turning them into user-facing errors is the
//! job of the query/mutation layer.
//!
//! # Example
//!
//! ```rust,no_run
//! use recipebook::config::ClientConfig;
//! use recipebook::transport::{Params, Transport};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Transport::new(&ClientConfig::parse("http://localhost:8080")?);
//! let params = Params::flat([("searchType", "all"), ("searchKeyword", "")]);
//! let recipes: serde_json::Value = transport.get("/api/v1/recipe/list", Some(&params)).await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod payload;
mod progress;

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;

pub use error::{HttpErrorInfo, TransportError};
pub use payload::{ContentType, FilePart, MultipartForm, PageParams, Params, Payload};
pub use progress::{ProgressFn, UploadProgress};

use progress::ProgressTracker;

/// An HTTP client bound to one backend.
#[derive(Debug, Clone)]
pub struct Transport {
    http: reqwest::Client,
    base: Url,
}

impl Transport {
    /// Creates a transport with a default `reqwest` client.
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Creates a transport that sends requests through `http`.
    #[must_use]
    pub fn with_client(http: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            http,
            base: config.backend_host.clone(),
        }
    }

    /// Returns the base host.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base
    }

    /// Resolves an endpoint path against the base host.
    ///
    /// Paths are appended to the base, so a base host with a path prefix keeps it.
    pub fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        let joined = format!(
            "{}/{}",
            self.base.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| TransportError::Endpoint(format!("{joined}: {e}")))
    }

    /// Issues a GET request and decodes the JSON response body.
    pub async fn get<T>(&self, path: &str, params: Option<&Params>) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
    {
        let bytes = self.get_bytes(path, params).await?;
        decode(&bytes)
    }

    /// Issues a GET request and returns the raw response body.
    pub async fn get_bytes(
        &self,
        path: &str,
        params: Option<&Params>,
    ) -> Result<Bytes, TransportError> {
        let mut request = self.request(Method::GET, path)?;
        if let Some(params) = params {
            request = request.query(&params.pairs());
        }
        self.send(request).await
    }

    /// Issues a POST request.
    ///
    /// `on_progress` is invoked while the body is handed to the connection, with a
    /// strictly increasing byte count.
    pub async fn post<T>(
        &self,
        path: &str,
        payload: Payload,
        on_progress: Option<ProgressFn>,
    ) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
    {
        self.send_payload(Method::POST, path, payload, on_progress)
            .await
    }

    /// Issues a PUT request. Same contract as [`Transport::post`].
    pub async fn put<T>(
        &self,
        path: &str,
        payload: Payload,
        on_progress: Option<ProgressFn>,
    ) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
    {
        self.send_payload(Method::PUT, path, payload, on_progress)
            .await
    }

    /// Issues a DELETE request carrying the deletion key(s) as query parameters.
    pub async fn delete<T, P>(&self, path: &str, params: &P) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        let request = self.request(Method::DELETE, path)?.query(params);
        let bytes = self.send(request).await?;
        decode(&bytes)
    }

    async fn send_payload<T>(
        &self,
        method: Method,
        path: &str,
        payload: Payload,
        on_progress: Option<ProgressFn>,
    ) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
    {
        let request = self.request(method, path)?;
        let request = match payload {
            Payload::Json(value) => {
                let body = serde_json::to_vec(&value)
                    .map(Bytes::from)
                    .map_err(|e| TransportError::Encode(e.to_string()))?;
                let request = request.header(CONTENT_TYPE, ContentType::Json.as_str());
                match on_progress {
                    Some(f) => {
                        let tracker = ProgressTracker::new(body.len() as u64, f);
                        request.body(tracker.body(body))
                    }
                    None => request.body(body),
                }
            }
            // reqwest sets the multipart content type together with its boundary.
            Payload::Multipart(form) => request.multipart(form.into_form(on_progress)?),
        };

        let bytes = self.send(request).await?;
        decode(&bytes)
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, TransportError> {
        let url = self.endpoint(path)?;
        debug!(%method, %url, "sending request");
        Ok(self.http.request(method, url))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Bytes, TransportError> {
        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            debug!(status = status.as_u16(), "request failed");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        Ok(bytes)
    }
}

/// Decodes a JSON body. An empty body reads as an empty object.
fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, TransportError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_slice(b"{}")?);
    }
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn transport(host: &str) -> Transport {
        Transport::new(&ClientConfig::parse(host).expect("valid host"))
    }

    #[test]
    fn test_endpoint_join() {
        let transport = transport("http://localhost:8080");
        let url = transport
            .endpoint("/api/v1/recipe/list")
            .expect("endpoint");
        assert_eq!(url.as_str(), "http://localhost:8080/api/v1/recipe/list");
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let transport = transport("http://localhost:8080/backend/");
        let url = transport
            .endpoint("api/v1/recipe/info")
            .expect("endpoint");
        assert_eq!(url.as_str(), "http://localhost:8080/backend/api/v1/recipe/info");
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Empty {}

    #[test]
    fn test_decode_empty_body() {
        let empty: Empty = decode(b"").expect("empty body");
        assert_eq!(empty, Empty {});

        let empty: Empty = decode(b" \n").expect("whitespace body");
        assert_eq!(empty, Empty {});
    }

    #[test]
    fn test_decode_invalid_body() {
        let result: Result<Vec<u32>, _> = decode(b"<html>");
        assert!(matches!(result, Err(TransportError::Decode(_))));
    }
}
