//! Pending remote change
//!
//! A [`PendingChange`] is a remote mutation observed for one file that has
//! not been applied locally yet. The sync core keeps at most one per
//! [`SyncUrl`]; newer observations replace older ones.

use serde::{Deserialize, Serialize};

use super::newtypes::{Changestamp, ContentHash, ResourceId, SyncUrl};

/// Kind of a remote or local entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    /// Regular file
    File,
    /// Directory / folder
    Folder,
    /// Kind not known (e.g. the entry does not exist locally)
    #[default]
    Unknown,
}

impl FileType {
    /// Returns true for folder entries
    pub fn is_folder(&self) -> bool {
        matches!(self, FileType::Folder)
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileType::File => write!(f, "file"),
            FileType::Folder => write!(f, "folder"),
            FileType::Unknown => write!(f, "unknown"),
        }
    }
}

/// A queued, not-yet-applied remote mutation for one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChange {
    url: SyncUrl,
    changestamp: Changestamp,
    resource_id: ResourceId,
    is_deleted: bool,
    content_hash: Option<ContentHash>,
    file_type: FileType,
}

impl PendingChange {
    /// Creates a change for a file that was added or updated remotely
    pub fn file(
        url: SyncUrl,
        changestamp: Changestamp,
        resource_id: ResourceId,
        content_hash: Option<ContentHash>,
    ) -> Self {
        Self {
            url,
            changestamp,
            resource_id,
            is_deleted: false,
            content_hash,
            file_type: FileType::File,
        }
    }

    /// Creates a change for a file that was deleted remotely
    pub fn deletion(
        url: SyncUrl,
        changestamp: Changestamp,
        resource_id: ResourceId,
        content_hash: Option<ContentHash>,
    ) -> Self {
        Self {
            is_deleted: true,
            ..Self::file(url, changestamp, resource_id, content_hash)
        }
    }

    /// Overrides the entry kind
    #[must_use]
    pub fn with_file_type(mut self, file_type: FileType) -> Self {
        self.file_type = file_type;
        self
    }

    /// Target location of the change
    pub fn url(&self) -> &SyncUrl {
        &self.url
    }

    /// Remote changestamp at which the change was observed
    pub fn changestamp(&self) -> Changestamp {
        self.changestamp
    }

    /// Remote resource id of the changed file
    pub fn resource_id(&self) -> &ResourceId {
        &self.resource_id
    }

    /// Whether the file was deleted remotely
    pub fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    /// Remote content checksum, when known
    pub fn content_hash(&self) -> Option<&ContentHash> {
        self.content_hash.as_ref()
    }

    /// Kind of the remote entry
    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    /// Returns true if both changes describe the same remote content:
    /// same resource, same checksum, same deletion flag.
    pub fn has_same_content_as(&self, other: &PendingChange) -> bool {
        self.resource_id == other.resource_id
            && self.content_hash == other.content_hash
            && self.is_deleted == other.is_deleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::newtypes::Origin;

    fn url() -> SyncUrl {
        let origin: Origin = "ext://example".parse().unwrap();
        SyncUrl::new(origin, "File 1.mp3").unwrap()
    }

    fn rid(id: &str) -> ResourceId {
        ResourceId::new(id.to_string()).unwrap()
    }

    fn hash(h: &str) -> Option<ContentHash> {
        Some(ContentHash::new(h.to_string()).unwrap())
    }

    #[test]
    fn test_file_change() {
        let change = PendingChange::file(url(), Changestamp::new(3), rid("file:1"), hash("md5"));
        assert!(!change.is_deleted());
        assert_eq!(change.file_type(), FileType::File);
        assert_eq!(change.changestamp(), Changestamp::new(3));
        assert_eq!(change.content_hash().map(|h| h.as_str()), Some("md5"));
    }

    #[test]
    fn test_deletion_change() {
        let change = PendingChange::deletion(url(), Changestamp::new(4), rid("file:1"), None);
        assert!(change.is_deleted());
        assert!(change.content_hash().is_none());
    }

    #[test]
    fn test_with_file_type() {
        let change = PendingChange::file(url(), Changestamp::new(1), rid("folder:1"), None)
            .with_file_type(FileType::Folder);
        assert!(change.file_type().is_folder());
    }

    #[test]
    fn test_same_content_ignores_changestamp() {
        let a = PendingChange::file(url(), Changestamp::new(1), rid("file:1"), hash("x"));
        let b = PendingChange::file(url(), Changestamp::new(9), rid("file:1"), hash("x"));
        assert!(a.has_same_content_as(&b));
    }

    #[test]
    fn test_same_content_detects_differences() {
        let base = PendingChange::file(url(), Changestamp::new(1), rid("file:1"), hash("x"));

        let other_hash = PendingChange::file(url(), Changestamp::new(2), rid("file:1"), hash("y"));
        let other_id = PendingChange::file(url(), Changestamp::new(2), rid("file:2"), hash("x"));
        let deleted = PendingChange::deletion(url(), Changestamp::new(2), rid("file:1"), hash("x"));

        assert!(!base.has_same_content_as(&other_hash));
        assert!(!base.has_same_content_as(&other_id));
        assert!(!base.has_same_content_as(&deleted));
    }
}
