//! Change events delivered to watch subscriptions

use crate::fs::memory::NormalizedPath;
use crate::fs::FileType;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Created,
    Changed,
    Deleted,
    Renamed,
}

/// A single change, as seen by a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub path: PathBuf,
    /// Previous location, set for [`ChangeKind::Renamed`] only
    pub old_path: Option<PathBuf>,
    pub file_type: FileType,
}

/// Set of event kinds a subscription wants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventKinds {
    pub created: bool,
    pub changed: bool,
    pub deleted: bool,
    pub renamed: bool,
}

impl Default for EventKinds {
    fn default() -> Self {
        Self::all()
    }
}

impl EventKinds {
    pub fn all() -> Self {
        Self {
            created: true,
            changed: true,
            deleted: true,
            renamed: true,
        }
    }

    pub fn none() -> Self {
        Self {
            created: false,
            changed: false,
            deleted: false,
            renamed: false,
        }
    }

    pub fn only(kind: ChangeKind) -> Self {
        Self::none().with(kind)
    }

    pub fn with(mut self, kind: ChangeKind) -> Self {
        match kind {
            ChangeKind::Created => self.created = true,
            ChangeKind::Changed => self.changed = true,
            ChangeKind::Deleted => self.deleted = true,
            ChangeKind::Renamed => self.renamed = true,
        }
        self
    }

    pub fn contains(&self, kind: ChangeKind) -> bool {
        match kind {
            ChangeKind::Created => self.created,
            ChangeKind::Changed => self.changed,
            ChangeKind::Deleted => self.deleted,
            ChangeKind::Renamed => self.renamed,
        }
    }
}

/// Mutation record produced by the node store, still in normalized form so
/// scope checks can use comparison keys.
#[derive(Debug, Clone)]
pub(crate) struct Change {
    pub kind: ChangeKind,
    pub path: NormalizedPath,
    pub old_path: Option<NormalizedPath>,
    pub file_type: FileType,
}

impl Change {
    pub fn created(path: NormalizedPath, file_type: FileType) -> Self {
        Self {
            kind: ChangeKind::Created,
            path,
            old_path: None,
            file_type,
        }
    }

    pub fn changed(path: NormalizedPath, file_type: FileType) -> Self {
        Self {
            kind: ChangeKind::Changed,
            path,
            old_path: None,
            file_type,
        }
    }

    pub fn deleted(path: NormalizedPath, file_type: FileType) -> Self {
        Self {
            kind: ChangeKind::Deleted,
            path,
            old_path: None,
            file_type,
        }
    }

    pub fn renamed(old: NormalizedPath, new: NormalizedPath, file_type: FileType) -> Self {
        Self {
            kind: ChangeKind::Renamed,
            path: new,
            old_path: Some(old),
            file_type,
        }
    }

    pub fn to_event(&self) -> ChangeEvent {
        ChangeEvent {
            kind: self.kind,
            path: self.path.to_path_buf(),
            old_path: self.old_path.as_ref().map(NormalizedPath::to_path_buf),
            file_type: self.file_type,
        }
    }
}
