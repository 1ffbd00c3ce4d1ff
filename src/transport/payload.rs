use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

use super::error::TransportError;
use super::progress::{ProgressFn, ProgressTracker};

/// Page descriptor sent as `page` and `size` query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageParams {
    /// Page number.
    pub page: u32,
    /// Page size.
    pub size: u32,
}

/// Query parameters for a read.
///
/// Parameters are part of a query's cache identity, so they keep a stable order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Params {
    /// Flat string-keyed parameters.
    Flat(BTreeMap<String, String>),
    /// A page descriptor.
    Page(PageParams),
}

impl Params {
    /// Builds flat parameters from key/value pairs.
    pub fn flat<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::Flat(
            pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    /// Returns the parameters as query string pairs.
    #[must_use]
    pub fn pairs(&self) -> Vec<(String, String)> {
        match self {
            Self::Flat(map) => map
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            Self::Page(page) => vec![
                ("page".to_string(), page.page.to_string()),
                ("size".to_string(), page.size.to_string()),
            ],
        }
    }
}

impl From<PageParams> for Params {
    fn from(page: PageParams) -> Self {
        Self::Page(page)
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded: Vec<String> = self
            .pairs()
            .into_iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        f.write_str(&encoded.join("&"))
    }
}

/// Content type of a request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentType {
    #[default]
    Json,
    Multipart,
}

impl ContentType {
    /// Returns the MIME type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Multipart => "multipart/form-data",
        }
    }
}

/// A file uploaded as one part of a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    /// Form field name.
    pub name: String,
    /// File name reported to the backend.
    pub file_name: String,
    /// MIME type, when known.
    pub mime: Option<String>,
    /// File contents.
    pub bytes: Bytes,
}

/// A multipart form made of text fields and files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    fields: Vec<(String, String)>,
    files: Vec<FilePart>,
}

impl MultipartForm {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a text field.
    #[must_use]
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Adds a file.
    #[must_use]
    pub fn file(mut self, part: FilePart) -> Self {
        self.files.push(part);
        self
    }

    /// Returns the text fields in insertion order.
    #[must_use]
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Returns the files in insertion order.
    #[must_use]
    pub fn files(&self) -> &[FilePart] {
        &self.files
    }

    /// Total file bytes, which is what upload progress is measured against.
    #[must_use]
    pub fn upload_len(&self) -> u64 {
        self.files.iter().map(|file| file.bytes.len() as u64).sum()
    }

    pub(crate) fn into_form(
        self,
        on_progress: Option<ProgressFn>,
    ) -> Result<Form, TransportError> {
        let tracker = on_progress.map(|f| ProgressTracker::new(self.upload_len(), f));

        let mut form = Form::new();
        for (name, value) in self.fields {
            form = form.text(name, value);
        }

        for file in self.files {
            let len = file.bytes.len() as u64;
            let part = match &tracker {
                Some(tracker) => Part::stream_with_length(tracker.body(file.bytes), len),
                None => Part::stream_with_length(file.bytes, len),
            };
            let mut part = part.file_name(file.file_name);
            if let Some(mime) = &file.mime {
                part = part
                    .mime_str(mime)
                    .map_err(|e| TransportError::Encode(e.to_string()))?;
            }
            form = form.part(file.name, part);
        }

        Ok(form)
    }
}

/// A request body together with its content type.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A JSON document.
    Json(serde_json::Value),
    /// A multipart form.
    Multipart(MultipartForm),
}

impl Payload {
    /// Serializes `value` into a JSON payload.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, TransportError> {
        serde_json::to_value(value)
            .map(Self::Json)
            .map_err(|e| TransportError::Encode(e.to_string()))
    }

    /// Returns the content type this payload is sent with.
    #[must_use]
    pub const fn content_type(&self) -> ContentType {
        match self {
            Self::Json(_) => ContentType::Json,
            Self::Multipart(_) => ContentType::Multipart,
        }
    }
}

impl From<MultipartForm> for Payload {
    fn from(form: MultipartForm) -> Self {
        Self::Multipart(form)
    }
}
