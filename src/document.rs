//! The execution environment stylesheets and scripts are injected into.

use std::future::ready;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;

use crate::core::{Hash32, ImportMap};
use crate::error::DocumentError;

/// What an injected element is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Stylesheet,
    Module,
}

impl ElementKind {
    fn extension(self) -> &'static str {
        match self {
            ElementKind::Stylesheet => "css",
            ElementKind::Module => "js",
        }
    }
}

/// An element handed to a [`Document`] for insertion.
#[derive(Debug, Clone)]
pub struct Element {
    pub kind: ElementKind,
    /// Name of the asset this element was created for.
    pub name: String,
    pub text: Arc<str>,
}

/// Receipt for an element the document accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attached {
    /// Where the document serves the element from.
    pub href: String,
}

/// An execution environment that accepts stylesheets and modules.
///
/// The returned future resolving to `Ok` is the environment's load signal;
/// resolving to `Err` is its error signal.
pub trait Document: Send + Sync + 'static {
    fn append(&self, element: Element) -> BoxFuture<'static, Result<Attached, DocumentError>>;
}

#[derive(Debug, Default)]
struct HeadState {
    /// `(href, text)` in insertion order.
    stylesheets: Vec<(String, Arc<str>)>,
    modules: Vec<(String, Arc<str>)>,
    importmap: ImportMap,
}

/// An in-memory document head.
///
/// Stylesheets become `<link>` entries, modules are registered in an
/// [`ImportMap`] under their asset name. Content is addressed by hash, so the
/// same text injected twice is only stored once. Appending a module under a
/// name that is already bound rebinds the name to the new module.
#[derive(Debug, Default)]
pub struct Head {
    state: Mutex<HeadState>,
}

impl Head {
    pub fn new() -> Self {
        Self::default()
    }

    fn attach(&self, element: Element) -> Result<Attached, DocumentError> {
        if element.text.trim().is_empty() {
            return Err(DocumentError::Empty(element.name));
        }

        let hash = Hash32::hash(element.text.as_bytes()).to_hex();
        let href = format!("/hash/{hash}.{}", element.kind.extension());

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        match element.kind {
            ElementKind::Stylesheet => {
                if !state.stylesheets.iter().any(|(h, _)| *h == href) {
                    state.stylesheets.push((href.clone(), element.text));
                }
            }
            ElementKind::Module => {
                let previous = state.importmap.get(&element.name).map(str::to_owned);
                state.importmap.register(element.name, href.clone());

                if !state.modules.iter().any(|(h, _)| *h == href) {
                    state.modules.push((href.clone(), element.text));
                }

                // A rebound specifier drops the module it pointed at, unless
                // another specifier still imports it.
                if let Some(previous) = previous.filter(|prev| *prev != href) {
                    let HeadState {
                        modules, importmap, ..
                    } = &mut *state;

                    if !importmap.iter().any(|(_, path)| path == previous) {
                        modules.retain(|(h, _)| *h != previous);
                    }
                }
            }
        }

        Ok(Attached { href })
    }

    /// Hrefs of attached stylesheets, in insertion order.
    pub fn stylesheets(&self) -> Vec<String> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.stylesheets.iter().map(|(href, _)| href.clone()).collect()
    }

    pub fn importmap(&self) -> ImportMap {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.importmap.clone()
    }

    /// Text of the stylesheet or module served at `href`.
    pub fn get(&self, href: &str) -> Option<Arc<str>> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .stylesheets
            .iter()
            .chain(state.modules.iter())
            .find(|(h, _)| h == href)
            .map(|(_, text)| text.clone())
    }

    /// Renders the head: stylesheet links, the import map and module tags.
    pub fn to_html(&self) -> serde_json::Result<String> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let mut html = String::new();

        for (href, _) in &state.stylesheets {
            html.push_str(&format!(r#"<link rel="stylesheet" href="{href}">"#));
        }

        if !state.importmap.is_empty() {
            html.push_str(&state.importmap.to_html()?);
        }

        for (href, _) in &state.modules {
            html.push_str(&format!(r#"<script type="module" src="{href}"></script>"#));
        }

        Ok(html)
    }
}

impl Document for Head {
    fn append(&self, element: Element) -> BoxFuture<'static, Result<Attached, DocumentError>> {
        Box::pin(ready(self.attach(element)))
    }
}
