use std::sync::Arc;

use anyhow::Context as _;
use futures::future::BoxFuture;

use crate::loader::{LoadAdapter, LoadContext, Resource};
use crate::manifest::AssetRequest;

/// Loads `json` assets as a [`serde_json::Value`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonAdapter;

impl LoadAdapter for JsonAdapter {
    fn load(
        &self,
        request: &AssetRequest,
        ctx: &LoadContext,
    ) -> BoxFuture<'static, anyhow::Result<Resource>> {
        Box::pin(load_json(ctx.clone(), request.source.clone()))
    }
}

async fn load_json(ctx: LoadContext, source: String) -> anyhow::Result<Resource> {
    let bytes = ctx.fetch(&source).await?;
    let value: serde_json::Value = serde_json::from_slice(&bytes)
        .with_context(|| format!("Malformed JSON in '{source}'"))?;

    Ok(Resource::Json(Arc::new(value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Head;
    use crate::error::FetchError;
    use crate::transport::{MemoryTransport, Response};

    fn ctx() -> LoadContext {
        let transport = MemoryTransport::new()
            .with("ok.json", Response::ok(r#"{"x":1}"#))
            .with("bad.json", Response::new(500, "Internal Server Error"))
            .with("broken.json", Response::ok("{x:"));

        LoadContext::new(Arc::new(transport), Arc::new(Head::new()))
    }

    #[tokio::test]
    async fn test_load_json() {
        let request = AssetRequest::new("a", "json", "ok.json");
        let resource = JsonAdapter.load(&request, &ctx()).await.unwrap();
        assert_eq!(resource.as_json(), Some(&serde_json::json!({"x": 1})));
    }

    #[tokio::test]
    async fn test_load_json_bad_status() {
        let request = AssetRequest::new("b", "json", "bad.json");
        let err = JsonAdapter.load(&request, &ctx()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FetchError>(),
            Some(FetchError::Status { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_load_json_parse_error() {
        let request = AssetRequest::new("c", "json", "broken.json");
        let err = JsonAdapter.load(&request, &ctx()).await.unwrap_err();
        assert!(err.to_string().contains("broken.json"));
        assert!(err.downcast_ref::<serde_json::Error>().is_some());
    }
}
