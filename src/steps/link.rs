//! Links: opaque tokens for artifacts that steps produce and consume.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An artifact a step creates or requires (e.g. `images-ready`,
/// `cluster:e2e`).
///
/// Two links are the same artifact when their identifiers are equal.
/// Nothing else about the identifier is interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Link(String);

impl Link {
    /// Create a link from its identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The link's identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Link {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Link {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Build a `Vec<Link>` from anything string-like.
///
/// ```
/// use stepgraph::steps::{links, Link};
///
/// assert_eq!(links(["src", "bin"]), vec![Link::new("src"), Link::new("bin")]);
/// ```
pub fn links<I, S>(ids: I) -> Vec<Link>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    ids.into_iter().map(Link::new).collect()
}
