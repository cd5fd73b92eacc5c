use std::sync::Arc;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::document::{Element, ElementKind};
use crate::loader::{LoadAdapter, LoadContext, Resource};
use crate::manifest::AssetRequest;

/// Errors that can occur when preparing scripts.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The module is not valid UTF-8.
    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// An ES module registered with the document.
#[derive(Debug, Clone)]
pub struct Script {
    /// Import map specifier, the asset name.
    pub specifier: String,
    /// Where the document serves the module from.
    pub src: String,
    pub text: Arc<str>,
}

/// Loads `js` assets as ES modules.
///
/// Each module is registered in the document's import map under the name of
/// its asset, so other modules can `import` it by that name.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptAdapter;

impl LoadAdapter for ScriptAdapter {
    fn load(
        &self,
        request: &AssetRequest,
        ctx: &LoadContext,
    ) -> BoxFuture<'static, anyhow::Result<Resource>> {
        Box::pin(load_script(ctx.clone(), request.clone()))
    }
}

async fn load_script(ctx: LoadContext, request: AssetRequest) -> anyhow::Result<Resource> {
    let bytes = ctx.fetch(&request.source).await?;
    let text: Arc<str> = String::from_utf8(bytes).map_err(ScriptError::from)?.into();

    let element = Element {
        kind: ElementKind::Module,
        name: request.name.clone(),
        text: text.clone(),
    };

    let attached = ctx.append(element).await?;

    Ok(Resource::Script(Arc::new(Script {
        specifier: request.name,
        src: attached.href,
        text,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Head;
    use crate::error::FetchError;
    use crate::transport::{MemoryTransport, Response};

    fn ctx(head: Arc<Head>) -> LoadContext {
        let transport = MemoryTransport::new()
            .with("app.js", Response::ok("export const answer = 42;"))
            .with("gone.js", Response::new(404, "Not Found"));

        LoadContext::new(Arc::new(transport), head)
    }

    #[tokio::test]
    async fn test_load_script() {
        let head = Arc::new(Head::new());
        let request = AssetRequest::new("app", "js", "app.js");

        let resource = ScriptAdapter.load(&request, &ctx(head.clone())).await.unwrap();
        let script = resource.as_script().unwrap();

        assert_eq!(script.specifier, "app");
        assert!(script.src.ends_with(".js"));
        assert_eq!(head.importmap().get("app"), Some(script.src.as_str()));
        assert_eq!(head.get(&script.src).as_deref(), Some("export const answer = 42;"));
    }

    #[tokio::test]
    async fn test_load_script_missing() {
        let head = Arc::new(Head::new());
        let request = AssetRequest::new("gone", "js", "gone.js");

        let err = ScriptAdapter.load(&request, &ctx(head.clone())).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FetchError>(),
            Some(FetchError::Status { status: 404, .. })
        ));
        assert!(head.importmap().is_empty());
    }
}
