//! Streamed downloads with progress reporting.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::Response;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SonarError};

/// How much of a download has arrived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownloadProgress {
    /// Bytes received so far.
    pub loaded: u64,
    /// Expected size from `Content-Length`, if the server sent one.
    pub total: Option<u64>,
    /// `loaded / total` as a percentage; `None` when `total` is unknown.
    pub percentage: Option<f64>,
}

impl DownloadProgress {
    #[must_use]
    pub fn new(loaded: u64, total: Option<u64>) -> Self {
        let percentage = total.map(|t| {
            if t == 0 {
                100.0
            } else {
                (loaded as f64 / t as f64 * 100.0).min(100.0)
            }
        });
        Self {
            loaded,
            total,
            percentage,
        }
    }
}

/// One chunk of a streamed body plus the running progress after it.
#[derive(Debug, Clone)]
pub struct DownloadChunk {
    pub bytes: Vec<u8>,
    pub progress: DownloadProgress,
}

/// A response body consumed incrementally.
///
/// Yields chunks as they arrive. A fired cancellation token ends the stream
/// with a [`SonarError::Timeout`]; a broken connection ends it with
/// [`SonarError::Network`]. Nothing is yielded after an error.
pub struct DownloadStream {
    inner: BoxStream<'static, Result<DownloadChunk>>,
    total: Option<u64>,
}

struct StreamState {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    loaded: u64,
    total: Option<u64>,
    cancel: Option<CancellationToken>,
    done: bool,
}

impl DownloadStream {
    pub(crate) fn new(response: Response, cancel: Option<CancellationToken>) -> Self {
        let total = response.content_length().or_else(|| {
            response
                .headers()
                .get(reqwest::header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
        });
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()))
            .boxed();
        Self::from_parts(body, total, cancel)
    }

    fn from_parts(
        body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
        total: Option<u64>,
        cancel: Option<CancellationToken>,
    ) -> Self {
        let state = StreamState {
            body,
            loaded: 0,
            total,
            cancel,
            done: false,
        };

        let inner = stream::unfold(state, |mut st| async move {
            if st.done {
                return None;
            }

            let next = match &st.cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => Some(Err(SonarError::timeout("download cancelled"))),
                    chunk = st.body.next() => chunk.map(|c| c.map_err(|e| SonarError::from_transport(&e))),
                },
                None => st
                    .body
                    .next()
                    .await
                    .map(|c| c.map_err(|e| SonarError::from_transport(&e))),
            };

            match next {
                None => None,
                Some(Err(e)) => {
                    st.done = true;
                    Some((Err(e), st))
                }
                Some(Ok(bytes)) => {
                    st.loaded += bytes.len() as u64;
                    let progress = DownloadProgress::new(st.loaded, st.total);
                    Some((Ok(DownloadChunk { bytes, progress }), st))
                }
            }
        })
        .boxed();

        Self { inner, total }
    }

    /// `Content-Length` of the response, if known.
    pub fn content_length(&self) -> Option<u64> {
        self.total
    }

    /// Drain the stream into memory, reporting progress after every chunk.
    ///
    /// # Errors
    ///
    /// Returns the first error the stream yields.
    pub async fn collect_with_progress<F>(mut self, mut on_progress: F) -> Result<Vec<u8>>
    where
        F: FnMut(&DownloadProgress),
    {
        let mut buf = Vec::with_capacity(self.total.unwrap_or(0).min(16 * 1024 * 1024) as usize);
        while let Some(chunk) = self.next().await {
            let chunk = chunk?;
            buf.extend_from_slice(&chunk.bytes);
            on_progress(&chunk.progress);
        }
        Ok(buf)
    }
}

impl Stream for DownloadStream {
    type Item = Result<DownloadChunk>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl std::fmt::Debug for DownloadStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadStream")
            .field("total", &self.total)
            .finish_non_exhaustive()
    }
}
