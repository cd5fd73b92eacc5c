mod assets;
mod runner;

use std::sync::Arc;

use camino::Utf8PathBuf;

use crate::document::{Document, Head};
use crate::error::HakobiError;
use crate::loader::{Dispatcher, LoadAdapter, LoadContext, Outcome};
use crate::manifest::{AssetKind, Manifest};
use crate::transport::{LocalTransport, Transport};

pub use assets::{Assets, Progress};
pub use runner::{AssetExecution, Diagnostics, Status};

/// What to do when two manifest entries share a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Load both, the entry committed last wins. A warning is logged.
    #[default]
    Overwrite,
    /// Refuse the whole manifest before anything is loaded.
    Reject,
}

/// Loads batches of assets.
///
/// A `Loader` holds the adapters and collaborators shared by every batch; it
/// keeps no state between batches and can be reused or cloned freely.
///
/// # Example
///
/// ```rust,no_run
/// use hakobi::{Loader, Manifest};
///
/// # async fn run() -> Result<(), hakobi::HakobiError> {
/// let loader = Loader::builder().root("public").build();
///
/// let manifest = Manifest::new()
///     .with("logo", "image", "img/logo.png")
///     .with("levels", "json", "data/levels.json");
///
/// loader
///     .load_all(
///         manifest,
///         |progress, name, _| println!("{name}: {:.0}%", progress.fraction() * 100.0),
///         |assets| println!("{} assets ready", assets.len()),
///     )
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Loader {
    dispatcher: Arc<Dispatcher>,
    ctx: LoadContext,
    duplicates: DuplicatePolicy,
    progress_bar: bool,
}

impl Loader {
    /// A loader with the built-in adapters, reading from the working
    /// directory.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> LoaderBuilder {
        LoaderBuilder::new()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Loads every asset in `manifest` concurrently.
    ///
    /// `on_progress` is called once per asset, right after its outcome has
    /// been committed, with the updated progress and the committed outcome.
    /// `on_complete` is called exactly once, after the last commit, with all
    /// outcomes. An empty manifest completes straight away without any
    /// progress calls.
    ///
    /// A failing or panicking adapter only affects its own asset, which is
    /// committed as [`Outcome::Absent`]. The returned error is reserved for a
    /// malformed manifest, in which case neither callback runs.
    pub async fn load_all<P, C>(
        &self,
        manifest: impl Into<Manifest>,
        on_progress: P,
        on_complete: C,
    ) -> Result<Diagnostics, HakobiError>
    where
        P: FnMut(Progress, &str, &Outcome),
        C: FnOnce(Assets),
    {
        runner::run_batch(self, manifest.into(), on_progress, on_complete).await
    }

    /// Loads every asset in `manifest` and returns the outcomes.
    pub async fn load(&self, manifest: impl Into<Manifest>) -> Result<Assets, HakobiError> {
        let mut result = None;
        self.load_all(manifest, |_, _, _| {}, |assets| result = Some(assets))
            .await?;

        Ok(result.unwrap_or_default())
    }

    /// Like [`Loader::load_all`], driving the batch to completion on a fresh
    /// current-thread runtime.
    ///
    /// Must not be called from within an async runtime.
    pub fn load_blocking<P, C>(
        &self,
        manifest: impl Into<Manifest>,
        on_progress: P,
        on_complete: C,
    ) -> Result<Diagnostics, HakobiError>
    where
        P: FnMut(Progress, &str, &Outcome),
        C: FnOnce(Assets),
    {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        runtime.block_on(self.load_all(manifest, on_progress, on_complete))
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// Configures a [`Loader`].
///
/// Starts out with the built-in adapters, a [`LocalTransport`] rooted at the
/// working directory and an empty [`Head`].
pub struct LoaderBuilder {
    dispatcher: Dispatcher,
    root: Option<Utf8PathBuf>,
    transport: Option<Arc<dyn Transport>>,
    document: Option<Arc<dyn Document>>,
    duplicates: DuplicatePolicy,
    progress_bar: bool,
}

impl LoaderBuilder {
    pub fn new() -> Self {
        Self {
            dispatcher: Dispatcher::with_defaults(),
            root: None,
            transport: None,
            document: None,
            duplicates: DuplicatePolicy::default(),
            progress_bar: false,
        }
    }

    /// Directory the default transport resolves sources against.
    ///
    /// Ignored when a custom transport is set.
    pub fn root(mut self, root: impl Into<Utf8PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Document that stylesheets and modules are injected into.
    ///
    /// Taken as an `Arc` so the caller can keep a handle to inspect it.
    pub fn document<D: Document>(mut self, document: Arc<D>) -> Self {
        self.document = Some(document);
        self
    }

    /// Registers `adapter` for `kind`, replacing the built-in one if any.
    pub fn adapter(mut self, kind: impl Into<AssetKind>, adapter: impl LoadAdapter) -> Self {
        self.dispatcher.register(kind, adapter);
        self
    }

    /// Replaces the whole dispatcher, including the built-in adapters.
    pub fn dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn duplicates(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicates = policy;
        self
    }

    /// Render batch progress through `tracing-indicatif`.
    pub fn progress_bar(mut self, enabled: bool) -> Self {
        self.progress_bar = enabled;
        self
    }

    pub fn build(self) -> Loader {
        let transport = self.transport.unwrap_or_else(|| {
            let root = self.root.unwrap_or_else(|| Utf8PathBuf::from("."));
            Arc::new(LocalTransport::new(root))
        });

        let document = self
            .document
            .unwrap_or_else(|| Arc::new(Head::new()) as Arc<dyn Document>);

        Loader {
            dispatcher: Arc::new(self.dispatcher),
            ctx: LoadContext::new(transport, document),
            duplicates: self.duplicates,
            progress_bar: self.progress_bar,
        }
    }
}

impl Default for LoaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}
