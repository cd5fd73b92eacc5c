//! Byte retrieval for asset sources.
//!
//! Every built-in adapter reads its bytes through a [`Transport`]. The loader
//! only cares whether a source resolves into a successful [`Response`]; where
//! the bytes actually come from is up to the implementation.

use std::collections::HashMap;
use std::future::ready;
use std::sync::Arc;

use base64::Engine as _;
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use futures::future::BoxFuture;
use tracing::Instrument as _;

use crate::error::{FetchError, TransportError};

/// A response to a fetch, carrying an HTTP-like status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// `200 OK` with the given body.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, body)
    }

    /// `404 Not Found` with an empty body.
    pub fn not_found() -> Self {
        Self::new(404, Vec::new())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns the body if the status signals success.
    pub fn into_body(self, locator: &str) -> Result<Vec<u8>, FetchError> {
        if !self.is_success() {
            return Err(FetchError::Status {
                locator: locator.to_owned(),
                status: self.status,
            });
        }

        Ok(self.body)
    }
}

/// Abstract source for raw asset data.
pub trait Transport: Send + Sync + 'static {
    /// Fetch the data behind `source`.
    ///
    /// Returns `Ok` with a non-success status when the source is reachable
    /// but has nothing to offer, and `Err` when the transport itself failed.
    fn fetch(&self, source: &str) -> BoxFuture<'static, Result<Response, TransportError>>;
}

/// Loads sources from the local file system, relative to a root directory,
/// and decodes inline [data URLs](https://tools.ietf.org/html/rfc2397).
#[derive(Debug, Clone)]
pub struct LocalTransport {
    root: Utf8PathBuf,
}

impl LocalTransport {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Maps `source` to a path under the root. Query and fragment are
    /// dropped, parent components are refused.
    fn resolve(&self, source: &str) -> Result<Utf8PathBuf, TransportError> {
        let path = source.split(['?', '#']).next().unwrap_or(source);
        let relative = Utf8Path::new(path.trim_start_matches('/'));

        let escapes = relative
            .components()
            .any(|c| matches!(c, Utf8Component::ParentDir | Utf8Component::Prefix(_)));

        if escapes {
            return Err(TransportError::OutsideRoot(source.to_owned()));
        }

        Ok(self.root.join(relative))
    }
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::new(".")
    }
}

impl Transport for LocalTransport {
    fn fetch(&self, source: &str) -> BoxFuture<'static, Result<Response, TransportError>> {
        if let Some(rest) = source.strip_prefix("data:") {
            return Box::pin(ready(decode_data_url(rest).map(Response::ok)));
        }

        let path = match self.resolve(source) {
            Ok(path) => path,
            Err(err) => return Box::pin(ready(Err(err))),
        };

        let span = tracing::debug_span!("fetch", source = %source);

        Box::pin(
            async move {
                match tokio::fs::read(&path).await {
                    Ok(bytes) => Ok(Response::ok(bytes)),
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                        tracing::debug!(%path, "Not found");
                        Ok(Response::not_found())
                    }
                    Err(err) => Err(err.into()),
                }
            }
            .instrument(span),
        )
    }
}

/// Decodes the part of a data URL following the `data:` scheme.
fn decode_data_url(rest: &str) -> Result<Vec<u8>, TransportError> {
    let (head, data) = rest
        .split_once(',')
        .ok_or(TransportError::DataUrl("url head is not followed by the data"))?;

    if head.ends_with(";base64") {
        return Ok(base64::engine::general_purpose::STANDARD.decode(data)?);
    }

    Ok(percent_encoding::percent_decode_str(data).collect())
}

/// Serves canned responses from memory.
///
/// Unknown sources answer `404 Not Found`. Useful for embedding assets in the
/// binary and for exercising loaders without touching the file system.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    responses: Arc<HashMap<String, Response>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a response for `source`, builder style.
    pub fn with(mut self, source: impl Into<String>, response: Response) -> Self {
        Arc::make_mut(&mut self.responses).insert(source.into(), response);
        self
    }
}

impl Transport for MemoryTransport {
    fn fetch(&self, source: &str) -> BoxFuture<'static, Result<Response, TransportError>> {
        let response = self
            .responses
            .get(source)
            .cloned()
            .unwrap_or_else(Response::not_found);

        Box::pin(ready(Ok(response)))
    }
}
