//! Data types shared by the file system capability traits

use super::pattern::NamePattern;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Type of file system entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    File,
    Directory,
    Symlink,
}

/// Attribute flags carried by every node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attributes {
    #[serde(default)]
    pub readonly: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub system: bool,
    #[serde(default)]
    pub archive: bool,
}

impl Attributes {
    pub fn normal() -> Self {
        Self::default()
    }

    /// Flags a freshly created file carries.
    pub fn new_file() -> Self {
        Self {
            archive: true,
            ..Self::default()
        }
    }

    pub fn with_readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn with_system(mut self, system: bool) -> Self {
        self.system = system;
        self
    }

    pub fn with_archive(mut self, archive: bool) -> Self {
        self.archive = archive;
        self
    }
}

/// Metadata about a file or directory
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub size: u64,
    pub file_type: FileType,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub accessed: DateTime<Utc>,
    pub attributes: Attributes,
}

impl FileMetadata {
    pub fn is_file(&self) -> bool {
        self.file_type == FileType::File
    }

    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }

    pub fn len(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn is_readonly(&self) -> bool {
        self.attributes.readonly
    }
}

/// A directory entry returned by `read_dir` and `enumerate`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub path: PathBuf,
    pub name: String,
    pub file_type: FileType,
}

impl DirEntry {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.name
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }
}

/// Explicit timestamps to apply with `set_times`; unset fields are left alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileTimes {
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub accessed: Option<DateTime<Utc>>,
}

impl FileTimes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_created(mut self, t: DateTime<Utc>) -> Self {
        self.created = Some(t);
        self
    }

    pub fn set_modified(mut self, t: DateTime<Utc>) -> Self {
        self.modified = Some(t);
        self
    }

    pub fn set_accessed(mut self, t: DateTime<Utc>) -> Self {
        self.accessed = Some(t);
        self
    }
}

/// Options for `open`, with the same meaning as `std::fs::OpenOptions`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenOptions {
    pub(crate) read: bool,
    pub(crate) write: bool,
    pub(crate) append: bool,
    pub(crate) truncate: bool,
    pub(crate) create: bool,
    pub(crate) create_new: bool,
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(mut self, read: bool) -> Self {
        self.read = read;
        self
    }

    pub fn write(mut self, write: bool) -> Self {
        self.write = write;
        self
    }

    pub fn append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    pub fn truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    pub fn create_new(mut self, create_new: bool) -> Self {
        self.create_new = create_new;
        self
    }

    /// Whether the handle may modify the file.
    pub fn is_writable(&self) -> bool {
        self.write || self.append
    }

    pub fn to_std(&self) -> std::fs::OpenOptions {
        let mut opts = std::fs::OpenOptions::new();
        opts.read(self.read)
            .write(self.write)
            .append(self.append)
            .truncate(self.truncate)
            .create(self.create)
            .create_new(self.create_new);
        opts
    }
}

/// Which entry kinds an enumeration yields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EntryFilter {
    Files,
    Directories,
    #[default]
    All,
}

impl EntryFilter {
    pub fn accepts(&self, file_type: FileType) -> bool {
        match self {
            EntryFilter::Files => file_type == FileType::File,
            EntryFilter::Directories => file_type == FileType::Directory,
            EntryFilter::All => true,
        }
    }
}

/// Search settings for `enumerate`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerateOptions {
    pub pattern: String,
    pub recursive: bool,
    pub filter: EntryFilter,
}

impl Default for EnumerateOptions {
    fn default() -> Self {
        Self {
            pattern: "*".to_string(),
            recursive: false,
            filter: EntryFilter::All,
        }
    }
}

impl EnumerateOptions {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            ..Self::default()
        }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn filter(mut self, filter: EntryFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn files_only(self) -> Self {
        self.filter(EntryFilter::Files)
    }

    pub fn directories_only(self) -> Self {
        self.filter(EntryFilter::Directories)
    }
}

/// Result of `enumerate`.
///
/// Holds a consistent snapshot of the candidate entries taken when the
/// enumeration was requested; name matching runs as the iterator advances.
/// Cloning or calling [`Entries::rewind`] restarts from the first entry.
#[derive(Debug, Clone)]
pub struct Entries {
    candidates: Arc<[DirEntry]>,
    pattern: NamePattern,
    filter: EntryFilter,
    pos: usize,
}

impl Entries {
    pub(crate) fn new(candidates: Vec<DirEntry>, pattern: NamePattern, filter: EntryFilter) -> Self {
        Self {
            candidates: candidates.into(),
            pattern,
            filter,
            pos: 0,
        }
    }

    pub fn rewind(&mut self) {
        self.pos = 0;
    }
}

impl Iterator for Entries {
    type Item = DirEntry;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(entry) = self.candidates.get(self.pos) {
            self.pos += 1;
            if self.filter.accepts(entry.file_type) && self.pattern.matches(&entry.name) {
                return Some(entry.clone());
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.candidates.len().saturating_sub(self.pos)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, file_type: FileType) -> DirEntry {
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        DirEntry {
            path: PathBuf::from(path),
            name,
            file_type,
        }
    }

    #[test]
    fn test_file_metadata_is_file() {
        let now = Utc::now();
        let meta = FileMetadata {
            size: 100,
            file_type: FileType::File,
            created: now,
            modified: now,
            accessed: now,
            attributes: Attributes::new_file(),
        };
        assert!(meta.is_file());
        assert!(!meta.is_dir());
        assert!(!meta.is_readonly());
        assert_eq!(meta.len(), 100);
    }

    #[test]
    fn test_dir_entry() {
        let entry = entry("/test/file.txt", FileType::File);
        assert_eq!(entry.path(), Path::new("/test/file.txt"));
        assert_eq!(entry.file_name(), "file.txt");
        assert_eq!(entry.file_type(), FileType::File);
    }

    #[test]
    fn test_open_options_writable() {
        assert!(!OpenOptions::new().read(true).is_writable());
        assert!(OpenOptions::new().append(true).is_writable());
        assert!(OpenOptions::new().write(true).create(true).is_writable());
    }

    #[test]
    fn test_entries_filter_lazily_and_rewind() {
        let pattern = NamePattern::new("*.txt", true).unwrap();
        let mut entries = Entries::new(
            vec![
                entry("/a/one.txt", FileType::File),
                entry("/a/two.rs", FileType::File),
                entry("/a/dir.txt", FileType::Directory),
            ],
            pattern,
            EntryFilter::Files,
        );

        let names: Vec<String> = entries.by_ref().map(|e| e.name).collect();
        assert_eq!(names, vec!["one.txt"]);
        assert!(entries.next().is_none());

        entries.rewind();
        assert_eq!(entries.count(), 1);
    }
}
