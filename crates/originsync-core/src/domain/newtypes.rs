//! Identifier newtypes
//!
//! Origins, remote ids, changestamps, content hashes and origin-relative
//! urls. Constructors validate, so a value of any of these types is always
//! well formed.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// Origin
// ============================================================================

/// Identifier of one synchronized scope (one per installed extension)
///
/// Origins have the form `scheme://host`, e.g. `ext://abcdefghijklmnop`.
/// A trailing `/` is accepted and stripped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Origin(String);

impl Origin {
    /// Create a new Origin
    ///
    /// # Errors
    /// Returns error if the value is not of the form `scheme://host`
    pub fn new(origin: String) -> Result<Self, DomainError> {
        let trimmed = origin.trim_end_matches('/');

        let (scheme, host) = trimmed.split_once("://").ok_or_else(|| {
            DomainError::InvalidOrigin(format!("Origin must be of the form scheme://host: {origin}"))
        })?;

        if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(DomainError::InvalidOrigin(format!(
                "Origin has an invalid scheme: {origin}"
            )));
        }

        if host.is_empty() || host.contains('/') || host.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidOrigin(format!(
                "Origin has an invalid host: {origin}"
            )));
        }

        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The scheme part (`ext` in `ext://abc`)
    #[must_use]
    pub fn scheme(&self) -> &str {
        self.0.split_once("://").map_or("", |(scheme, _)| scheme)
    }

    /// The host part (`abc` in `ext://abc`)
    #[must_use]
    pub fn host(&self) -> &str {
        self.0.split_once("://").map_or("", |(_, host)| host)
    }

    /// Title of the remote directory that backs this origin
    #[must_use]
    pub fn directory_title(&self) -> &str {
        self.host()
    }
}

impl Display for Origin {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Origin {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for Origin {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Origin> for String {
    fn from(origin: Origin) -> Self {
        origin.0
    }
}

// ============================================================================
// Remote store types
// ============================================================================

/// Remote resource identifier (files and directories)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceId(String);

impl ResourceId {
    /// Create a new ResourceId
    ///
    /// # Errors
    /// Returns error if the ID is empty or contains whitespace
    pub fn new(id: String) -> Result<Self, DomainError> {
        if id.is_empty() {
            return Err(DomainError::InvalidResourceId(
                "Resource ID cannot be empty".to_string(),
            ));
        }

        if id.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidResourceId(format!(
                "Resource ID contains whitespace: {id}"
            )));
        }

        Ok(Self(id))
    }

    /// The opaque id as given by the remote service
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ResourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ResourceId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for ResourceId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.0
    }
}

/// Position in the remote account's change history
///
/// Changestamps increase strictly with every remote mutation of the account.
/// `Changestamp::ZERO` means "nothing observed yet".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Changestamp(u64);

impl Changestamp {
    /// The changestamp before any remote change
    pub const ZERO: Changestamp = Changestamp(0);

    /// Wrap a raw changestamp value
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw value
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// The changestamp immediately after this one
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl Display for Changestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Changestamp {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Remote content checksum (opaque to the core, compared for equality only)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Create a new ContentHash
    ///
    /// # Errors
    /// Returns error if the hash is empty or contains whitespace
    pub fn new(hash: String) -> Result<Self, DomainError> {
        if hash.is_empty() {
            return Err(DomainError::InvalidHash("Hash cannot be empty".to_string()));
        }

        if hash.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidHash(format!(
                "Hash contains whitespace: {hash}"
            )));
        }

        Ok(Self(hash))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContentHash {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for ContentHash {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

// ============================================================================
// SyncUrl
// ============================================================================

/// Location of one file inside an origin's sandboxed file store
///
/// Combines the origin with a relative path such as `docs/notes.txt`.
/// The path must be non-empty, relative, and free of `.`/`..` components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SyncUrl {
    origin: Origin,
    path: String,
}

impl SyncUrl {
    /// Create a new SyncUrl
    ///
    /// # Errors
    /// Returns error if the path is empty, absolute, or contains
    /// empty, `.` or `..` components
    pub fn new(origin: Origin, path: impl Into<String>) -> Result<Self, DomainError> {
        let path = path.into();

        if path.is_empty() {
            return Err(DomainError::InvalidPath("Path cannot be empty".to_string()));
        }

        if path.starts_with('/') {
            return Err(DomainError::InvalidPath(format!(
                "Path must be relative to the origin: {path}"
            )));
        }

        if path
            .split('/')
            .any(|component| component.is_empty() || component == "." || component == "..")
        {
            return Err(DomainError::InvalidPath(format!(
                "Path contains an invalid component: {path}"
            )));
        }

        Ok(Self { origin, path })
    }

    /// The origin this file belongs to
    #[must_use]
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Origin-relative path
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Display for SyncUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.origin, self.path)
    }
}
