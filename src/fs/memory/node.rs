use super::path::NormalizedPath;
use crate::fs::types::{Attributes, DirEntry, FileMetadata, FileTimes, FileType};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamps {
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub accessed: DateTime<Utc>,
}

impl Timestamps {
    pub fn at(t: DateTime<Utc>) -> Self {
        Self {
            created: t,
            modified: t,
            accessed: t,
        }
    }

    pub fn apply(&mut self, times: &FileTimes) {
        if let Some(t) = times.created {
            self.created = t;
        }
        if let Some(t) = times.modified {
            self.modified = t;
        }
        if let Some(t) = times.accessed {
            self.accessed = t;
        }
    }
}

/// One file or directory in the tree.
#[derive(Debug, Clone)]
pub struct Node {
    pub path: NormalizedPath,
    pub kind: FileType,
    pub content: Vec<u8>,
    pub times: Timestamps,
    pub attributes: Attributes,
    /// Opaque access-control blob carried for callers that round-trip it.
    pub security: Option<String>,
}

impl Node {
    pub fn file(path: NormalizedPath, content: Vec<u8>, now: DateTime<Utc>) -> Self {
        Self {
            path,
            kind: FileType::File,
            content,
            times: Timestamps::at(now),
            attributes: Attributes::new_file(),
            security: None,
        }
    }

    pub fn directory(path: NormalizedPath, now: DateTime<Utc>) -> Self {
        Self {
            path,
            kind: FileType::Directory,
            content: Vec::new(),
            times: Timestamps::at(now),
            attributes: Attributes::normal(),
            security: None,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileType::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileType::File
    }

    pub fn is_readonly(&self) -> bool {
        self.attributes.readonly
    }

    pub fn touch_write(&mut self, now: DateTime<Utc>) {
        self.times.modified = now;
        self.times.accessed = now;
    }

    pub fn touch_access(&mut self, now: DateTime<Utc>) {
        self.times.accessed = now;
    }

    pub fn metadata(&self) -> FileMetadata {
        FileMetadata {
            size: self.content.len() as u64,
            file_type: self.kind,
            created: self.times.created,
            modified: self.times.modified,
            accessed: self.times.accessed,
            attributes: self.attributes,
        }
    }

    pub fn dir_entry(&self) -> DirEntry {
        DirEntry {
            path: self.path.to_path_buf(),
            name: self
                .path
                .file_name()
                .unwrap_or_else(|| self.path.as_str())
                .to_string(),
            file_type: self.kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_new_file_metadata() {
        let node = Node::file(NormalizedPath::root().child("a.txt", Default::default()), b"hi".to_vec(), t0());
        let meta = node.metadata();
        assert!(meta.is_file());
        assert_eq!(meta.len(), 2);
        assert_eq!(meta.created, t0());
        assert!(meta.attributes.archive);
        assert_eq!(node.dir_entry().name, "a.txt");
    }

    #[test]
    fn test_touch_write_keeps_creation_time() {
        let mut node = Node::file(NormalizedPath::root().child("a", Default::default()), Vec::new(), t0());
        let later = t0() + Duration::minutes(5);
        node.touch_write(later);
        assert_eq!(node.times.created, t0());
        assert_eq!(node.times.modified, later);
        assert_eq!(node.times.accessed, later);
    }

    #[test]
    fn test_apply_partial_times() {
        let mut times = Timestamps::at(t0());
        let later = t0() + Duration::days(1);
        times.apply(&FileTimes::new().set_modified(later));
        assert_eq!(times.created, t0());
        assert_eq!(times.modified, later);
        assert_eq!(times.accessed, t0());
    }

    #[test]
    fn test_root_dir_entry_name() {
        let node = Node::directory(NormalizedPath::root(), t0());
        assert_eq!(node.dir_entry().name, "/");
        assert!(node.is_dir());
    }
}
