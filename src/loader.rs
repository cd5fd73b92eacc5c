//! Load adapters and the dispatcher which picks one per asset kind.

pub mod css;
pub mod image;
pub mod js;
pub mod json;
pub mod media;

pub use self::css::{CssAdapter, Stylesheet};
pub use self::image::{Image, ImageAdapter, ImageFormat};
pub use self::js::{Script, ScriptAdapter};
pub use self::json::JsonAdapter;
pub use self::media::{Container, Media, MediaAdapter, MediaKind};

use std::any::Any;
use std::collections::HashMap;
use std::future::{Future, ready};
use std::sync::Arc;

use futures::TryFutureExt as _;
use futures::future::BoxFuture;

use crate::core::Dynamic;
use crate::document::{Attached, Document, Element, Head};
use crate::error::{DocumentError, FetchError};
use crate::manifest::{AssetKind, AssetRequest};
use crate::transport::{LocalTransport, Transport};

/// A resolved resource handle.
///
/// Handles are reference counted, cloning one is cheap.
#[derive(Debug, Clone)]
pub enum Resource {
    Image(Arc<Image>),
    Video(Arc<Media>),
    Audio(Arc<Media>),
    Json(Arc<serde_json::Value>),
    Stylesheet(Arc<Stylesheet>),
    Script(Arc<Script>),
    /// Anything produced by a custom adapter.
    Other(Dynamic),
}

impl Resource {
    /// Wraps a value produced by a custom adapter.
    pub fn other<T: Any + Send + Sync>(value: T) -> Self {
        Resource::Other(Arc::new(value))
    }

    pub fn as_image(&self) -> Option<&Image> {
        match self {
            Resource::Image(image) => Some(&**image),
            _ => None,
        }
    }

    pub fn as_media(&self) -> Option<&Media> {
        match self {
            Resource::Video(media) | Resource::Audio(media) => Some(&**media),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Resource::Json(value) => Some(&**value),
            _ => None,
        }
    }

    pub fn as_stylesheet(&self) -> Option<&Stylesheet> {
        match self {
            Resource::Stylesheet(style) => Some(&**style),
            _ => None,
        }
    }

    pub fn as_script(&self) -> Option<&Script> {
        match self {
            Resource::Script(script) => Some(&**script),
            _ => None,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Resource::Other(value) => value.downcast_ref::<T>(),
            _ => None,
        }
    }
}

/// The settled result of loading one asset.
#[derive(Debug, Clone)]
pub enum Outcome {
    Loaded(Resource),
    /// The asset failed to load, or its kind is not supported.
    Absent,
}

impl Outcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Outcome::Loaded(_))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Outcome::Absent)
    }

    pub fn resource(&self) -> Option<&Resource> {
        match self {
            Outcome::Loaded(resource) => Some(resource),
            Outcome::Absent => None,
        }
    }

    pub fn into_resource(self) -> Option<Resource> {
        match self {
            Outcome::Loaded(resource) => Some(resource),
            Outcome::Absent => None,
        }
    }
}

impl From<Option<Resource>> for Outcome {
    fn from(value: Option<Resource>) -> Self {
        value.map_or(Outcome::Absent, Outcome::Loaded)
    }
}

/// Collaborators shared by every adapter in a batch.
#[derive(Clone)]
pub struct LoadContext {
    transport: Arc<dyn Transport>,
    document: Arc<dyn Document>,
}

impl LoadContext {
    pub fn new(transport: Arc<dyn Transport>, document: Arc<dyn Document>) -> Self {
        Self {
            transport,
            document,
        }
    }

    /// Fetches `source` and returns its body, failing on a non-success status.
    pub fn fetch(&self, source: &str) -> BoxFuture<'static, Result<Vec<u8>, FetchError>> {
        let locator = source.to_owned();
        let response = self.transport.fetch(source);

        Box::pin(async move { response.await?.into_body(&locator) })
    }

    /// Injects an element into the document.
    pub fn append(&self, element: Element) -> BoxFuture<'static, Result<Attached, DocumentError>> {
        self.document.append(element)
    }
}

impl Default for LoadContext {
    fn default() -> Self {
        Self::new(Arc::new(LocalTransport::default()), Arc::new(Head::new()))
    }
}

/// Produces one resource handle from one asset request.
///
/// Implemented for the built-in adapters and for any
/// `Fn(AssetRequest, LoadContext) -> impl Future<Output = anyhow::Result<Resource>>`.
pub trait LoadAdapter: Send + Sync + 'static {
    fn load(
        &self,
        request: &AssetRequest,
        ctx: &LoadContext,
    ) -> BoxFuture<'static, anyhow::Result<Resource>>;
}

impl<F, Fut> LoadAdapter for F
where
    F: Fn(AssetRequest, LoadContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Resource>> + Send + 'static,
{
    fn load(
        &self,
        request: &AssetRequest,
        ctx: &LoadContext,
    ) -> BoxFuture<'static, anyhow::Result<Resource>> {
        Box::pin(self(request.clone(), ctx.clone()))
    }
}

/// Maps asset kinds to the adapters that load them.
#[derive(Clone, Default)]
pub struct Dispatcher {
    adapters: HashMap<AssetKind, Arc<dyn LoadAdapter>>,
}

impl Dispatcher {
    /// An empty dispatcher, every kind is unknown.
    pub fn new() -> Self {
        Self::default()
    }

    /// A dispatcher with the built-in adapters registered.
    pub fn with_defaults() -> Self {
        let mut dispatcher = Self::new();
        dispatcher.register(AssetKind::Image, ImageAdapter);
        dispatcher.register(AssetKind::Video, MediaAdapter::new(MediaKind::Video));
        dispatcher.register(AssetKind::Audio, MediaAdapter::new(MediaKind::Audio));
        dispatcher.register(AssetKind::Json, JsonAdapter);
        dispatcher.register(AssetKind::Css, CssAdapter);
        dispatcher.register(AssetKind::Script, ScriptAdapter);
        dispatcher
    }

    /// Registers `adapter` for `kind`, replacing any previous one.
    pub fn register(&mut self, kind: impl Into<AssetKind>, adapter: impl LoadAdapter) {
        self.adapters.insert(kind.into(), Arc::new(adapter));
    }

    pub fn supports(&self, kind: &AssetKind) -> bool {
        self.adapters.contains_key(kind)
    }

    /// Starts loading `request` with the adapter registered for its kind.
    ///
    /// An unknown kind is not an error: it is logged and resolves straight
    /// away to [`Outcome::Absent`].
    pub fn dispatch(
        &self,
        request: &AssetRequest,
        ctx: &LoadContext,
    ) -> BoxFuture<'static, anyhow::Result<Outcome>> {
        match self.adapters.get(&request.kind) {
            Some(adapter) => Box::pin(adapter.load(request, ctx).map_ok(Outcome::Loaded)),
            None => {
                tracing::warn!(
                    asset = %request.name,
                    kind = %request.kind,
                    "Unknown asset type: {}",
                    request.kind
                );
                Box::pin(ready(Ok(Outcome::Absent)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MemoryTransport, Response};

    fn ctx(transport: MemoryTransport) -> LoadContext {
        LoadContext::new(Arc::new(transport), Arc::new(Head::new()))
    }

    #[tokio::test]
    async fn test_dispatch_unknown_kind() {
        let dispatcher = Dispatcher::with_defaults();
        let request = AssetRequest::new("x", "unsupported", "x.bin");

        assert!(!dispatcher.supports(&request.kind));

        let outcome = dispatcher
            .dispatch(&request, &ctx(MemoryTransport::new()))
            .await
            .unwrap();
        assert!(outcome.is_absent());
    }

    #[tokio::test]
    async fn test_dispatch_custom_kind() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register("font", |request: AssetRequest, ctx: LoadContext| async move {
            let bytes = ctx.fetch(&request.source).await?;
            Ok::<_, anyhow::Error>(Resource::other(bytes.len()))
        });

        let transport = MemoryTransport::new().with("f.woff2", Response::ok(vec![0u8; 12]));
        let request = AssetRequest::new("f", "font", "f.woff2");

        let outcome = dispatcher.dispatch(&request, &ctx(transport)).await.unwrap();
        let size = outcome.resource().and_then(|r| r.downcast_ref::<usize>());
        assert_eq!(size, Some(&12));
    }

    #[tokio::test]
    async fn test_dispatch_propagates_adapter_error() {
        let dispatcher = Dispatcher::with_defaults();
        let request = AssetRequest::new("a", "json", "missing.json");

        let result = dispatcher
            .dispatch(&request, &ctx(MemoryTransport::new()))
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_outcome_from_option() {
        assert!(Outcome::from(None).is_absent());

        let outcome = Outcome::from(Some(Resource::Json(Arc::new(serde_json::json!(1)))));
        assert_eq!(
            outcome.resource().and_then(Resource::as_json),
            Some(&serde_json::json!(1))
        );
    }
}
