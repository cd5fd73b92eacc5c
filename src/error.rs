use thiserror::Error;

/// Errors surfaced by [`Loader`](crate::Loader) itself.
///
/// Failures of individual assets never show up here; they are committed as
/// [`Outcome::Absent`](crate::Outcome::Absent) and logged.
#[derive(Debug, Error)]
pub enum HakobiError {
    #[error("Malformed manifest:\n{0}")]
    Manifest(#[from] ManifestError),

    #[error("Failed to build runtime")]
    RuntimeBuild(#[from] std::io::Error),

    #[cfg(feature = "logging")]
    #[error("Failed to install logging:\n{0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),
}

/// The manifest handed to the loader was not well-formed.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Couldn't parse manifest.\n{0}")]
    Parse(#[from] serde_json::Error),

    #[error("Asset #{0} has an empty name")]
    EmptyName(usize),

    #[error("Asset '{0}' has an empty source")]
    EmptySource(String),

    #[error("Asset name '{0}' appears more than once")]
    Duplicate(String),
}

/// The transport could not produce a response at all.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source '{0}' escapes the root directory")]
    OutsideRoot(String),

    #[error("Malformed data URL: {0}")]
    DataUrl(&'static str),

    #[error("Failed to decode from base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Fetching a source failed, either in transport or with a non-success status.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Fetching '{locator}' failed with status {status}")]
    Status { locator: String, status: u16 },
}

/// The execution environment signalled an error for an injected element.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Element '{0}' has no content")]
    Empty(String),
}
