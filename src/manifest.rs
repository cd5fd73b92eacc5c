use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::engine::DuplicatePolicy;
use crate::error::ManifestError;

/// The declared kind of an asset, used to pick a load adapter.
///
/// Tags which don't name a built-in kind are kept verbatim in
/// [`AssetKind::Unknown`], so that custom adapters can be registered for
/// them and so that diagnostics can report what was asked for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AssetKind {
    Image,
    Video,
    Audio,
    Json,
    Css,
    Script,
    Unknown(Box<str>),
}

impl AssetKind {
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "image" => AssetKind::Image,
            "video" => AssetKind::Video,
            "audio" => AssetKind::Audio,
            "json" => AssetKind::Json,
            "css" => AssetKind::Css,
            "js" | "script" | "module" => AssetKind::Script,
            _ => AssetKind::Unknown(tag.into()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            AssetKind::Image => "image",
            AssetKind::Video => "video",
            AssetKind::Audio => "audio",
            AssetKind::Json => "json",
            AssetKind::Css => "css",
            AssetKind::Script => "js",
            AssetKind::Unknown(tag) => tag,
        }
    }
}

impl Display for AssetKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(AssetKind::parse(s))
    }
}

impl From<&str> for AssetKind {
    fn from(value: &str) -> Self {
        AssetKind::parse(value)
    }
}

impl From<String> for AssetKind {
    fn from(value: String) -> Self {
        AssetKind::parse(&value)
    }
}

impl From<AssetKind> for String {
    fn from(value: AssetKind) -> Self {
        value.as_str().to_owned()
    }
}

/// A single named asset to load.
///
/// In JSON the kind is spelled `type` and the locator `src`; `kind` and
/// `source` are accepted as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRequest {
    /// Key of the asset in the resulting [`Assets`](crate::Assets).
    pub name: String,
    #[serde(rename = "type", alias = "kind")]
    pub kind: AssetKind,
    /// Locator handed to the transport: a path, URL or `data:` URL.
    #[serde(rename = "src", alias = "source")]
    pub source: String,
}

impl AssetRequest {
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<AssetKind>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            source: source.into(),
        }
    }
}

/// An ordered list of assets requested for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    requests: Vec<AssetRequest>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a manifest from a JSON array of `{ "name", "type", "src" }`
    /// objects.
    ///
    /// ```rust
    /// # use hakobi::{AssetKind, Manifest};
    /// let manifest = Manifest::from_json(r#"[
    ///     { "name": "logo", "type": "image", "src": "img/logo.png" },
    ///     { "name": "level", "type": "json", "src": "data/level1.json" }
    /// ]"#).unwrap();
    ///
    /// assert_eq!(manifest.len(), 2);
    /// assert_eq!(manifest.iter().next().unwrap().kind, AssetKind::Image);
    /// ```
    pub fn from_json(text: &str) -> Result<Self, ManifestError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Appends a request, builder style.
    pub fn with(
        mut self,
        name: impl Into<String>,
        kind: impl Into<AssetKind>,
        source: impl Into<String>,
    ) -> Self {
        self.push(AssetRequest::new(name, kind, source));
        self
    }

    pub fn push(&mut self, request: AssetRequest) {
        self.requests.push(request);
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AssetRequest> {
        self.requests.iter()
    }

    /// Checks the manifest for caller errors and returns the names which
    /// appear more than once.
    ///
    /// Under [`DuplicatePolicy::Reject`] the first repeated name is an error.
    pub(crate) fn validate(&self, policy: DuplicatePolicy) -> Result<Vec<&str>, ManifestError> {
        let mut seen = HashSet::with_capacity(self.requests.len());
        let mut duplicates = Vec::new();

        for (index, request) in self.requests.iter().enumerate() {
            if request.name.trim().is_empty() {
                return Err(ManifestError::EmptyName(index));
            }

            if request.source.trim().is_empty() {
                return Err(ManifestError::EmptySource(request.name.clone()));
            }

            if !seen.insert(request.name.as_str()) {
                if policy == DuplicatePolicy::Reject {
                    return Err(ManifestError::Duplicate(request.name.clone()));
                }
                duplicates.push(request.name.as_str());
            }
        }

        Ok(duplicates)
    }
}

impl From<Vec<AssetRequest>> for Manifest {
    fn from(requests: Vec<AssetRequest>) -> Self {
        Self { requests }
    }
}

impl FromIterator<AssetRequest> for Manifest {
    fn from_iter<I: IntoIterator<Item = AssetRequest>>(iter: I) -> Self {
        Self {
            requests: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Manifest {
    type Item = AssetRequest;
    type IntoIter = std::vec::IntoIter<AssetRequest>;

    fn into_iter(self) -> Self::IntoIter {
        self.requests.into_iter()
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a AssetRequest;
    type IntoIter = std::slice::Iter<'a, AssetRequest>;

    fn into_iter(self) -> Self::IntoIter {
        self.requests.iter()
    }
}
