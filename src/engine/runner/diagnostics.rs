use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant};

use console::style;

use crate::manifest::AssetKind;

/// How an asset settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Loaded,
    /// The adapter returned an error.
    Failed,
    /// No adapter is registered for the asset kind.
    Unsupported,
    /// The adapter panicked.
    Panicked,
}

/// Timing and result of loading a single asset.
#[derive(Debug, Clone)]
pub struct AssetExecution {
    pub name: String,
    pub kind: AssetKind,
    pub status: Status,
    pub start: Instant,
    pub duration: Duration,
}

/// Batch diagnostics and performance metrics.
///
/// Returned by [`Loader::load_all`](crate::Loader::load_all). Executions are
/// listed in the order the assets were committed, which is the order they
/// settled in, not the manifest order.
#[derive(Debug, Default)]
pub struct Diagnostics {
    pub executions: Vec<AssetExecution>,
    /// Wall time from the first load starting to the last commit.
    pub elapsed: Duration,
}

impl Diagnostics {
    /// Asset names in commit order.
    pub fn commit_order(&self) -> impl Iterator<Item = &str> {
        self.executions.iter().map(|exec| exec.name.as_str())
    }

    /// Executions which did not produce a resource.
    pub fn failures(&self) -> impl Iterator<Item = &AssetExecution> {
        self.executions
            .iter()
            .filter(|exec| exec.status != Status::Loaded)
    }

    pub fn slowest(&self) -> Option<&AssetExecution> {
        self.executions.iter().max_by_key(|exec| exec.duration)
    }
}

impl Display for Diagnostics {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let loaded = self
            .executions
            .iter()
            .filter(|exec| exec.status == Status::Loaded)
            .count();

        writeln!(
            f,
            "Loaded {}/{} assets in {:.2?}",
            loaded,
            self.executions.len(),
            self.elapsed
        )?;

        for exec in &self.executions {
            let status = match exec.status {
                Status::Loaded => style("ok").green(),
                Status::Failed => style("failed").red(),
                Status::Unsupported => style("unsupported").yellow(),
                Status::Panicked => style("panicked").red().bold(),
            };

            writeln!(
                f,
                "  {:<11} {:>10.2?}  {} ({})",
                status, exec.duration, exec.name, exec.kind
            )?;
        }

        Ok(())
    }
}
