use std::sync::Arc;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::document::{Element, ElementKind};
use crate::loader::{LoadAdapter, LoadContext, Resource};
use crate::manifest::AssetRequest;

/// Errors that can occur when preparing stylesheets.
#[derive(Debug, Error)]
pub enum StyleError {
    /// The stylesheet is not valid UTF-8.
    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// A Sass compilation error occurred.
    #[cfg(feature = "grass")]
    #[error("Sass compilation error: {0}")]
    Sass(#[from] Box<grass::Error>),

    /// Sass sources need the `grass` feature.
    #[cfg(not(feature = "grass"))]
    #[error("Sass sources are not supported without the `grass` feature")]
    SassUnsupported,
}

/// A stylesheet attached to the document.
#[derive(Debug, Clone)]
pub struct Stylesheet {
    /// Where the document serves the stylesheet from.
    pub href: String,
    /// Compiled CSS.
    pub text: Arc<str>,
}

/// Loads `css` assets and attaches them to the document.
///
/// Sources ending in `.scss` or `.sass` are compiled to CSS first.
#[derive(Debug, Clone, Copy, Default)]
pub struct CssAdapter;

impl LoadAdapter for CssAdapter {
    fn load(
        &self,
        request: &AssetRequest,
        ctx: &LoadContext,
    ) -> BoxFuture<'static, anyhow::Result<Resource>> {
        Box::pin(load_stylesheet(ctx.clone(), request.clone()))
    }
}

async fn load_stylesheet(ctx: LoadContext, request: AssetRequest) -> anyhow::Result<Resource> {
    let bytes = ctx.fetch(&request.source).await?;
    let text = String::from_utf8(bytes).map_err(StyleError::from)?;

    let text: Arc<str> = match Dialect::of(&request.source) {
        Some(dialect) => compile_sass(&text, dialect)?.into(),
        None => text.into(),
    };

    let element = Element {
        kind: ElementKind::Stylesheet,
        name: request.name,
        text: text.clone(),
    };

    let attached = ctx.append(element).await?;

    Ok(Resource::Stylesheet(Arc::new(Stylesheet {
        href: attached.href,
        text,
    })))
}

/// Sass dialect of a source, judged by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Scss,
    /// The indented `.sass` syntax.
    Indented,
}

impl Dialect {
    fn of(source: &str) -> Option<Self> {
        let path = source.split(['?', '#']).next().unwrap_or(source);

        if path.ends_with(".scss") {
            Some(Dialect::Scss)
        } else if path.ends_with(".sass") {
            Some(Dialect::Indented)
        } else {
            None
        }
    }
}

#[cfg(feature = "grass")]
fn compile_sass(text: &str, dialect: Dialect) -> Result<String, StyleError> {
    let syntax = match dialect {
        Dialect::Scss => grass::InputSyntax::Scss,
        Dialect::Indented => grass::InputSyntax::Sass,
    };

    let opts = grass::Options::default()
        .style(grass::OutputStyle::Compressed)
        .input_syntax(syntax);

    Ok(grass::from_string(text.to_owned(), &opts)?)
}

#[cfg(not(feature = "grass"))]
fn compile_sass(_: &str, _: Dialect) -> Result<String, StyleError> {
    Err(StyleError::SassUnsupported)
}
