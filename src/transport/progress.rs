use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use futures::StreamExt;
use futures::stream;

/// Bytes handed to the connection per progress event.
const CHUNK_SIZE: usize = 16 * 1024;

/// An upload progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    /// Bytes sent so far.
    pub loaded: u64,
    /// Total bytes to send, when known.
    pub total: Option<u64>,
}

impl UploadProgress {
    /// Percentage of the upload that has been sent, rounded down.
    ///
    /// Returns `None` when the total is unknown or zero.
    ///
    /// ```
    /// use recipebook::transport::UploadProgress;
    ///
    /// let progress = UploadProgress { loaded: 1, total: Some(3) };
    /// assert_eq!(progress.percent(), Some(33));
    /// ```
    #[must_use]
    pub fn percent(&self) -> Option<u8> {
        let total = self.total.filter(|total| *total > 0)?;
        let percent = self.loaded.min(total) * 100 / total;
        Some(u8::try_from(percent).unwrap_or(100))
    }
}

/// Callback receiving upload progress events.
pub type ProgressFn = Arc<dyn Fn(UploadProgress) + Send + Sync>;

/// Counts bytes across every streamed part of one request body.
#[derive(Clone)]
pub(crate) struct ProgressTracker {
    loaded: Arc<AtomicU64>,
    total: u64,
    on_progress: ProgressFn,
}

impl ProgressTracker {
    pub(crate) fn new(total: u64, on_progress: ProgressFn) -> Self {
        Self {
            loaded: Arc::new(AtomicU64::new(0)),
            total,
            on_progress,
        }
    }

    fn advance(&self, sent: u64) {
        let loaded = self.loaded.fetch_add(sent, Ordering::SeqCst) + sent;
        (self.on_progress)(UploadProgress {
            loaded,
            total: Some(self.total),
        });
    }

    /// Wraps `bytes` in a streaming body that reports each chunk as it is pulled.
    pub(crate) fn body(&self, bytes: Bytes) -> reqwest::Body {
        let tracker = self.clone();
        let stream = stream::iter(chunks(bytes)).map(move |chunk| {
            tracker.advance(chunk.len() as u64);
            Ok::<_, io::Error>(chunk)
        });
        reqwest::Body::wrap_stream(stream)
    }
}

fn chunks(bytes: Bytes) -> Vec<Bytes> {
    (0..bytes.len())
        .step_by(CHUNK_SIZE)
        .map(|start| bytes.slice(start..bytes.len().min(start + CHUNK_SIZE)))
        .collect()
}
