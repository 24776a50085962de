//! Capability traits implemented by every file system backend

use super::types::{
    Attributes, DirEntry, EnumerateOptions, Entries, FileMetadata, FileTimes, OpenOptions,
};
use crate::error::{FsError, Result};
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};

/// An open file handle.
pub trait FileStream: Read + Write + Seek + Send {}

impl<T: Read + Write + Seek + Send> FileStream for T {}

/// File-level operations
pub trait FileOps: Send + Sync {
    /// Check if a path exists
    fn exists(&self, path: &Path) -> bool;

    /// Check if path is a directory
    fn is_dir(&self, path: &Path) -> bool;

    /// Check if path is a file
    fn is_file(&self, path: &Path) -> bool;

    /// Get file/directory metadata
    fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// Read the whole file
    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Read file contents as string
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes).map_err(|e| FsError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })
    }

    /// Read first N bytes of file (for binary detection)
    fn read_bytes(&self, path: &Path, max_bytes: usize) -> Result<Vec<u8>> {
        let mut bytes = self.read(path)?;
        bytes.truncate(max_bytes);
        Ok(bytes)
    }

    /// Create or replace a file with `contents`
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;

    /// Append to a file, creating it when missing
    fn append(&self, path: &Path, contents: &[u8]) -> Result<()>;

    /// Shrink or zero-extend an existing file to `len` bytes
    fn truncate(&self, path: &Path, len: u64) -> Result<()>;

    /// Open a streaming handle
    fn open(&self, path: &Path, options: &OpenOptions) -> Result<Box<dyn FileStream>>;

    /// Copy a file, returning the number of bytes copied
    fn copy_file(&self, from: &Path, to: &Path, overwrite: bool) -> Result<u64>;

    /// Move a file
    fn rename_file(&self, from: &Path, to: &Path, overwrite: bool) -> Result<()>;

    fn remove_file(&self, path: &Path) -> Result<()>;

    fn attributes(&self, path: &Path) -> Result<Attributes> {
        Ok(self.metadata(path)?.attributes)
    }

    fn set_attributes(&self, path: &Path, attributes: Attributes) -> Result<()>;

    fn set_readonly(&self, path: &Path, readonly: bool) -> Result<()> {
        let attributes = self.attributes(path)?.with_readonly(readonly);
        self.set_attributes(path, attributes)
    }

    fn set_times(&self, path: &Path, times: FileTimes) -> Result<()>;
}

/// Directory-level operations
pub trait DirectoryOps: Send + Sync {
    /// Create one directory; the parent must exist
    fn create_dir(&self, path: &Path) -> Result<()>;

    /// Create a directory and any missing ancestors; succeeds if it already exists
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Remove a directory, and everything under it when `recursive` is set
    fn remove_dir(&self, path: &Path, recursive: bool) -> Result<()>;

    /// Move a directory with its whole subtree
    fn move_dir(&self, from: &Path, to: &Path) -> Result<()>;

    /// Copy a directory tree, returning the number of files copied
    fn copy_dir(&self, from: &Path, to: &Path, overwrite: bool) -> Result<u64>;

    /// List directory contents
    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>>;

    /// Search a directory by file-name pattern
    fn enumerate(&self, path: &Path, options: &EnumerateOptions) -> Result<Entries>;

    fn current_dir(&self) -> PathBuf;

    fn set_current_dir(&self, path: &Path) -> Result<()>;

    fn temp_dir(&self) -> PathBuf;

    /// Top-level roots (`/`, drive roots)
    fn roots(&self) -> Vec<PathBuf>;
}

/// Path manipulation
pub trait PathOps: Send + Sync {
    fn separator(&self) -> char;

    /// Join `path` onto `base`; a rooted `path` replaces `base`
    fn join(&self, base: &Path, path: &str) -> PathBuf;

    fn combine(&self, parts: &[&str]) -> PathBuf {
        parts
            .iter()
            .fold(PathBuf::new(), |acc, part| self.join(&acc, part))
    }

    /// Segments of the path, root first
    fn split(&self, path: &Path) -> Vec<String>;

    fn file_name(&self, path: &Path) -> Option<String>;

    fn file_stem(&self, path: &Path) -> Option<String>;

    fn extension(&self, path: &Path) -> Option<String>;

    fn has_extension(&self, path: &Path) -> bool {
        self.extension(path).is_some()
    }

    fn change_extension(&self, path: &Path, extension: Option<&str>) -> PathBuf;

    fn parent(&self, path: &Path) -> Option<PathBuf>;

    fn root(&self, path: &Path) -> Option<PathBuf>;

    fn is_rooted(&self, path: &Path) -> bool;

    /// Absolute, normalized form of `path`, resolved against the current directory
    fn full_path(&self, path: &Path) -> Result<PathBuf>;

    fn random_file_name(&self) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        format!("{}.{}", &id[..8], &id[8..11])
    }
}

/// Complete file system surface; consumers hold `Arc<dyn FileSystem>`
pub trait FileSystem: FileOps + DirectoryOps + PathOps {}

impl<T: FileOps + DirectoryOps + PathOps> FileSystem for T {}
