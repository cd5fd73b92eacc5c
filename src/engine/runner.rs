mod diagnostics;

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt as _};
use futures::stream::{FuturesUnordered, StreamExt as _};
use indicatif::ProgressStyle;
use tracing::{Instrument as _, Level};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::engine::{Assets, Loader, Progress};
use crate::error::HakobiError;
use crate::loader::{Dispatcher, LoadContext, Outcome};
use crate::manifest::{AssetRequest, Manifest};

pub use diagnostics::{AssetExecution, Diagnostics, Status};

/// A load task after its adapter has settled, waiting to be committed.
struct Settled {
    request: AssetRequest,
    outcome: Outcome,
    status: Status,
    start: Instant,
    duration: Duration,
}

/// Loads every asset of `manifest` concurrently on the current task.
///
/// All load futures are created up front and polled together through a
/// [`FuturesUnordered`]. The loop below is the only place that touches the
/// result map and the progress counter, so each commit (write, increment,
/// notify) runs to completion before the next one starts.
pub(crate) async fn run_batch<P, C>(
    loader: &Loader,
    manifest: Manifest,
    mut on_progress: P,
    on_complete: C,
) -> Result<Diagnostics, HakobiError>
where
    P: FnMut(Progress, &str, &Outcome),
    C: FnOnce(Assets),
{
    for name in manifest.validate(loader.duplicates)? {
        tracing::warn!(asset = name, "Duplicate asset name, the later result wins");
    }

    let total = manifest.len();

    if total == 0 {
        tracing::debug!("Empty manifest, nothing to load");
        on_complete(Assets::default());
        return Ok(Diagnostics::default());
    }

    let root_span = tracing::span!(Level::INFO, "load_batch", total);
    let mut pb_style = None;

    if loader.progress_bar {
        root_span.pb_set_length(total as u64);
        if let Ok(style) = crate::utils::get_style_batch() {
            root_span.pb_set_style(&style);
        }
        root_span.pb_set_message("Loading assets...");
        pb_style = crate::utils::get_style_task().ok();
    }

    let start_time = Instant::now();

    // Fan out: every adapter is started before any outcome is awaited.
    let mut pending: FuturesUnordered<_> = root_span.in_scope(|| {
        manifest
            .into_iter()
            .map(|request| start(&loader.dispatcher, &loader.ctx, request, pb_style.clone()))
            .collect()
    });

    let mut assets = Assets::with_capacity(total);
    let mut progress = Progress::new(total);
    let mut executions = Vec::with_capacity(total);

    // Fan in: commit outcomes in the order they settle.
    while let Some(settled) = pending.next().instrument(root_span.clone()).await {
        let Settled {
            request,
            outcome,
            status,
            start,
            duration,
        } = settled;

        if assets.contains(&request.name) {
            tracing::debug!(asset = %request.name, "Overwriting earlier result");
        }

        let committed = assets.commit(request.name.clone(), outcome);
        progress.advance();
        root_span.pb_inc(1);

        on_progress(progress, &request.name, committed);

        executions.push(AssetExecution {
            name: request.name,
            kind: request.kind,
            status,
            start,
            duration,
        });
    }

    let diagnostics = Diagnostics {
        executions,
        elapsed: start_time.elapsed(),
    };

    root_span.in_scope(|| {
        tracing::info!(
            failed = diagnostics.failures().count(),
            "Loaded {total} assets in {:.2?}",
            diagnostics.elapsed
        );
    });

    on_complete(assets);

    Ok(diagnostics)
}

/// Dispatches `request` and wraps the pending load into a task that always
/// settles.
fn start(
    dispatcher: &Dispatcher,
    ctx: &LoadContext,
    request: AssetRequest,
    pb_style: Option<ProgressStyle>,
) -> impl Future<Output = Settled> + use<> {
    let span = tracing::span!(
        Level::INFO,
        "asset",
        name = %request.name,
        kind = %request.kind
    );

    if let Some(style) = pb_style {
        span.pb_set_style(&style);
        span.pb_set_message(&format!("Loading {}", request.name));
    }

    let supported = dispatcher.supports(&request.kind);

    let load = span.in_scope(|| {
        match std::panic::catch_unwind(AssertUnwindSafe(|| dispatcher.dispatch(&request, ctx))) {
            Ok(load) => load,
            // Replayed inside the task, where it is caught like any other panic.
            Err(panic) => replay_panic(panic),
        }
    });

    settle(request, supported, load).instrument(span)
}

fn replay_panic(
    panic: Box<dyn Any + Send>,
) -> BoxFuture<'static, anyhow::Result<Outcome>> {
    Box::pin(futures::future::lazy(move |_| -> anyhow::Result<Outcome> {
        std::panic::resume_unwind(panic)
    }))
}

async fn settle(
    request: AssetRequest,
    supported: bool,
    load: BoxFuture<'static, anyhow::Result<Outcome>>,
) -> Settled {
    let start = Instant::now();

    let (outcome, status) = match AssertUnwindSafe(load).catch_unwind().await {
        Ok(Ok(outcome)) if supported => (outcome, Status::Loaded),
        Ok(Ok(outcome)) => (outcome, Status::Unsupported),
        Ok(Err(err)) => {
            tracing::warn!("Failed to load asset '{}': {err:#}", request.name);
            (Outcome::Absent, Status::Failed)
        }
        Err(panic) => {
            tracing::warn!(
                "Failed to load asset '{}': {}",
                request.name,
                panic_message(&*panic)
            );
            (Outcome::Absent, Status::Panicked)
        }
    };

    tracing::debug!(status = ?status, "Settled");

    Settled {
        request,
        outcome,
        status,
        start,
        duration: start.elapsed(),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("Task panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("Task panicked: {s}")
    } else {
        String::from("Task panicked with unknown payload")
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::sync::Arc;

    use super::*;
    use crate::document::Head;
    use crate::engine::DuplicatePolicy;
    use crate::error::ManifestError;
    use crate::loader::{LoadContext, Resource};
    use crate::transport::{MemoryTransport, Response};

    fn transport() -> MemoryTransport {
        MemoryTransport::new()
            .with("ok.json", Response::ok(r#"{"x":1}"#))
            .with("bad.json", Response::new(500, "Internal Server Error"))
            .with("other.json", Response::ok("[1, 2, 3]"))
    }

    fn loader() -> Loader {
        Loader::builder().transport(transport()).build()
    }

    type Load = BoxFuture<'static, anyhow::Result<Resource>>;

    /// Resolves to a JSON number after `millis` milliseconds.
    fn delayed(millis: u64) -> impl Fn(AssetRequest, LoadContext) -> Load + Send + Sync + 'static {
        move |_, _| -> Load {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(millis)).await;
                Ok(Resource::Json(Arc::new(serde_json::json!(millis))))
            })
        }
    }

    #[tokio::test]
    async fn test_json_scenario() {
        let manifest = Manifest::new()
            .with("a", "json", "ok.json")
            .with("b", "json", "bad.json");

        let completed = Cell::new(0);
        let mut result = None;

        let diagnostics = loader()
            .load_all(
                manifest,
                |_, _, _| {},
                |assets| {
                    completed.set(completed.get() + 1);
                    result = Some(assets);
                },
            )
            .await
            .unwrap();

        assert_eq!(completed.get(), 1);

        let assets = result.unwrap();
        assert_eq!(assets.len(), 2);
        assert_eq!(
            assets.resource("a").and_then(Resource::as_json),
            Some(&serde_json::json!({"x": 1}))
        );
        assert!(assets.get("b").unwrap().is_absent());

        let failed: Vec<_> = diagnostics.failures().map(|e| e.name.as_str()).collect();
        assert_eq!(failed, ["b"]);
    }

    #[tokio::test]
    async fn test_unsupported_kind() {
        let manifest = Manifest::new().with("mystery", "unsupported", "mystery.bin");
        let events = RefCell::new(Vec::new());

        let diagnostics = loader()
            .load_all(
                manifest,
                |progress, name, outcome| {
                    events.borrow_mut().push(format!(
                        "progress {} {} {}",
                        progress.fraction(),
                        name,
                        outcome.is_absent()
                    ));
                },
                |assets| {
                    events
                        .borrow_mut()
                        .push(format!("complete {}", assets.get("mystery").unwrap().is_absent()));
                },
            )
            .await
            .unwrap();

        assert_eq!(
            events.into_inner(),
            ["progress 1 mystery true", "complete true"]
        );
        assert_eq!(diagnostics.executions[0].status, Status::Unsupported);
    }

    #[tokio::test]
    async fn test_empty_manifest() {
        let progressed = Cell::new(0);
        let completed = Cell::new(0);

        let diagnostics = loader()
            .load_all(
                Manifest::new(),
                |_, _, _| progressed.set(progressed.get() + 1),
                |assets| {
                    assert!(assets.is_empty());
                    completed.set(completed.get() + 1);
                },
            )
            .await
            .unwrap();

        assert_eq!(progressed.get(), 0);
        assert_eq!(completed.get(), 1);
        assert!(diagnostics.executions.is_empty());
    }

    #[tokio::test]
    async fn test_progress_sequence() {
        let loader = Loader::builder()
            .transport(transport())
            .adapter("slow", delayed(60))
            .adapter("medium", delayed(30))
            .adapter("fast", delayed(0))
            .build();

        let manifest = Manifest::new()
            .with("s", "slow", "-")
            .with("m", "medium", "-")
            .with("f", "fast", "-")
            .with("a", "json", "ok.json")
            .with("b", "json", "bad.json");

        let fractions = RefCell::new(Vec::new());
        let counted = RefCell::new(Vec::new());

        let diagnostics = loader
            .load_all(
                manifest,
                |progress, _, _| {
                    fractions.borrow_mut().push(progress.fraction());
                    counted.borrow_mut().push(progress.completed);
                },
                |_| {},
            )
            .await
            .unwrap();

        assert_eq!(counted.into_inner(), [1, 2, 3, 4, 5]);
        assert_eq!(fractions.into_inner(), [0.2, 0.4, 0.6, 0.8, 1.0]);

        // Completion order follows latency, not the manifest
        let order: Vec<_> = diagnostics.commit_order().collect();
        assert_eq!(order.len(), 5);
        assert_eq!(&order[order.len() - 2..], ["m", "s"]);
    }

    #[tokio::test]
    async fn test_failure_isolation() {
        let loader = Loader::builder()
            .transport(transport())
            .adapter("broken", |_: AssetRequest, _: LoadContext| async {
                Err::<Resource, _>(anyhow::anyhow!("decoder exploded"))
            })
            .adapter("slow", delayed(20))
            .build();

        let manifest = Manifest::new()
            .with("x", "broken", "-")
            .with("y", "slow", "-")
            .with("z", "json", "other.json");

        let assets = loader.load(manifest).await.unwrap();

        assert_eq!(assets.len(), 3);
        assert!(assets.get("x").unwrap().is_absent());
        assert!(assets.get("y").unwrap().is_loaded());
        assert_eq!(
            assets.resource("z").and_then(Resource::as_json),
            Some(&serde_json::json!([1, 2, 3]))
        );
    }

    #[tokio::test]
    async fn test_panicking_adapter() {
        let loader = Loader::builder()
            .transport(transport())
            .adapter("panics", |_: AssetRequest, _: LoadContext| async {
                if true {
                    panic!("adapter bug");
                }
                Ok::<_, anyhow::Error>(Resource::other(()))
            })
            .adapter(
                "panics-early",
                |_: AssetRequest, _: LoadContext| -> Load { panic!("adapter bug before the future") },
            )
            .build();

        let manifest = Manifest::new()
            .with("p", "panics", "-")
            .with("q", "panics-early", "-")
            .with("a", "json", "ok.json");

        let diagnostics = loader
            .load_all(manifest, |_, _, _| {}, |assets| {
                assert!(assets.get("p").unwrap().is_absent());
                assert!(assets.get("q").unwrap().is_absent());
                assert!(assets.get("a").unwrap().is_loaded());
            })
            .await
            .unwrap();

        let panicked = diagnostics
            .executions
            .iter()
            .filter(|e| e.status == Status::Panicked)
            .count();
        assert_eq!(panicked, 2);
    }

    #[tokio::test]
    async fn test_duplicate_names() {
        let manifest = Manifest::new()
            .with("a", "json", "ok.json")
            .with("a", "json", "other.json");

        let commits = Cell::new(0);
        let mut result = None;

        loader()
            .load_all(
                manifest.clone(),
                |_, _, _| commits.set(commits.get() + 1),
                |assets| result = Some(assets),
            )
            .await
            .unwrap();

        // Two commits, one key
        assert_eq!(commits.get(), 2);
        let assets = result.unwrap();
        assert_eq!(assets.len(), 1);
        assert!(assets.get("a").unwrap().is_loaded());

        let strict = Loader::builder()
            .transport(transport())
            .duplicates(DuplicatePolicy::Reject)
            .build();

        let completed = Cell::new(false);
        let result = strict
            .load_all(manifest, |_, _, _| {}, |_| completed.set(true))
            .await;

        assert!(matches!(
            result,
            Err(HakobiError::Manifest(ManifestError::Duplicate(name))) if name == "a"
        ));
        assert!(!completed.get());
    }

    #[tokio::test]
    async fn test_duplicate_scripts() {
        let head = Arc::new(Head::new());
        let transport = MemoryTransport::new()
            .with("v1.js", Response::ok("export const version = 1;"))
            .with("v2.js", Response::ok("export const version = 2;"));

        let loader = Loader::builder()
            .transport(transport)
            .document(head.clone())
            .build();

        let manifest = Manifest::new()
            .with("app", "js", "v1.js")
            .with("app", "js", "v2.js");

        let commits = RefCell::new(Vec::new());
        let mut result = None;

        loader
            .load_all(
                manifest,
                |_, name, outcome| commits.borrow_mut().push((name.to_owned(), outcome.is_loaded())),
                |assets| result = Some(assets),
            )
            .await
            .unwrap();

        assert_eq!(
            commits.into_inner(),
            [("app".to_owned(), true), ("app".to_owned(), true)]
        );

        let assets = result.unwrap();
        let script = assets.resource("app").and_then(Resource::as_script).unwrap();
        assert_eq!(head.importmap().get("app"), Some(script.src.as_str()));
        assert_eq!(head.get(&script.src).as_deref(), Some(&*script.text));
    }

    #[tokio::test]
    async fn test_malformed_manifest() {
        let manifest = Manifest::new()
            .with("a", "json", "ok.json")
            .with("", "json", "other.json");

        let called = Cell::new(false);
        let result = loader()
            .load_all(manifest, |_, _, _| called.set(true), |_| called.set(true))
            .await;

        assert!(matches!(
            result,
            Err(HakobiError::Manifest(ManifestError::EmptyName(1)))
        ));
        assert!(!called.get());
    }

    #[tokio::test]
    async fn test_loader_reuse() {
        let loader = loader();

        let first = loader
            .load(Manifest::new().with("a", "json", "ok.json"))
            .await
            .unwrap();
        let second = loader
            .load(Manifest::new().with("b", "json", "bad.json"))
            .await
            .unwrap();

        assert_eq!(first.len(), 1);
        assert!(first.contains("a"));
        assert_eq!(second.len(), 1);
        assert!(!second.contains("a"));
        assert!(second.get("b").unwrap().is_absent());
    }

    #[test]
    fn test_load_blocking() {
        let completed = Cell::new(0);

        let diagnostics = loader()
            .load_blocking(
                vec![AssetRequest::new("a", "json", "ok.json")],
                |progress, name, _| {
                    assert!(progress.is_done());
                    assert_eq!(name, "a");
                },
                |assets| {
                    assert!(assets.get("a").unwrap().is_loaded());
                    completed.set(completed.get() + 1);
                },
            )
            .unwrap();

        assert_eq!(completed.get(), 1);
        assert_eq!(diagnostics.executions.len(), 1);
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(&"boom"), "Task panicked: boom");
        assert_eq!(
            panic_message(&String::from("boom")),
            "Task panicked: boom"
        );
        assert_eq!(panic_message(&42), "Task panicked with unknown payload");
    }
}
