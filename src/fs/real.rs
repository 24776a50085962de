use super::pattern::NamePattern;
use super::r#trait::{DirectoryOps, FileOps, FileStream, PathOps};
use super::types::{
    Attributes, DirEntry, EnumerateOptions, Entries, FileMetadata, FileTimes, FileType,
    OpenOptions,
};
use crate::error::{FsError, Result};
use chrono::{DateTime, Utc};
use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};
use std::sync::RwLock;
use std::time::SystemTime;
use tracing::trace;
use walkdir::WalkDir;

/// Forwards every operation to the host file system.
///
/// Relative paths resolve against the instance's own current directory, so
/// changing it never affects the process. Only the read-only attribute maps
/// onto the host; `hidden` reports dot-files and the other flags are ignored.
/// Creation times cannot be set.
#[derive(Debug)]
pub struct DiskFileSystem {
    current_dir: RwLock<PathBuf>,
}

impl DiskFileSystem {
    pub fn new() -> Self {
        let cwd = env::current_dir().unwrap_or_else(|_| env::temp_dir());
        Self::with_current_dir(cwd)
    }

    pub fn with_current_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            current_dir: RwLock::new(dir.into()),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.current_dir
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .join(path)
        }
    }

    fn case_sensitive() -> bool {
        !cfg!(windows) && !cfg!(target_os = "macos")
    }

    fn require_dir(path: &Path) -> Result<()> {
        let meta = fs::metadata(path).map_err(|e| FsError::from_io(path, e))?;
        if meta.is_dir() {
            Ok(())
        } else {
            Err(FsError::NotADirectory(path.to_path_buf()))
        }
    }

    fn require_file(path: &Path) -> Result<()> {
        let meta = fs::metadata(path).map_err(|e| FsError::from_io(path, e))?;
        if meta.is_dir() {
            Err(FsError::NotAFile(path.to_path_buf()))
        } else {
            Ok(())
        }
    }

    fn entry(path: PathBuf, file_type: fs::FileType) -> DirEntry {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        DirEntry {
            path,
            name,
            file_type: map_file_type(file_type),
        }
    }

    fn candidates(root: &Path, recursive: bool) -> Result<Vec<DirEntry>> {
        let walker = WalkDir::new(root)
            .min_depth(1)
            .max_depth(if recursive { usize::MAX } else { 1 })
            .sort_by_file_name();
        let mut entries = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(root).to_path_buf();
                match e.into_io_error() {
                    Some(err) => FsError::from_io(path, err),
                    None => FsError::invalid_path(path.display().to_string(), "file system loop"),
                }
            })?;
            let file_type = entry.file_type();
            entries.push(Self::entry(entry.into_path(), file_type));
        }
        Ok(entries)
    }
}

impl Default for DiskFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

fn map_file_type(ft: fs::FileType) -> FileType {
    if ft.is_file() {
        FileType::File
    } else if ft.is_dir() {
        FileType::Directory
    } else {
        FileType::Symlink
    }
}

fn to_utc(t: io::Result<SystemTime>) -> Option<DateTime<Utc>> {
    t.ok().map(DateTime::<Utc>::from)
}

impl FileOps for DiskFileSystem {
    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.resolve(path).is_dir()
    }

    fn is_file(&self, path: &Path) -> bool {
        self.resolve(path).is_file()
    }

    fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        let path = self.resolve(path);
        let meta = fs::metadata(&path).map_err(|e| FsError::from_io(&path, e))?;

        let modified = to_utc(meta.modified()).unwrap_or_else(Utc::now);
        let hidden = path
            .file_name()
            .map(|n| n.to_string_lossy().starts_with('.'))
            .unwrap_or(false);

        Ok(FileMetadata {
            size: if meta.is_file() { meta.len() } else { 0 },
            file_type: map_file_type(meta.file_type()),
            created: to_utc(meta.created()).unwrap_or(modified),
            modified,
            accessed: to_utc(meta.accessed()).unwrap_or(modified),
            attributes: Attributes::normal()
                .with_readonly(meta.permissions().readonly())
                .with_hidden(hidden),
        })
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let path = self.resolve(path);
        Self::require_file(&path)?;
        fs::read(&path).map_err(|e| FsError::from_io(&path, e))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let path = self.resolve(path);
        if path.is_dir() {
            return Err(FsError::NotAFile(path));
        }
        fs::write(&path, contents).map_err(|e| FsError::from_io(&path, e))
    }

    fn append(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let path = self.resolve(path);
        if path.is_dir() {
            return Err(FsError::NotAFile(path));
        }
        let mut file = fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .map_err(|e| FsError::from_io(&path, e))?;
        file.write_all(contents)
            .map_err(|e| FsError::from_io(&path, e))
    }

    fn truncate(&self, path: &Path, len: u64) -> Result<()> {
        let path = self.resolve(path);
        Self::require_file(&path)?;
        let file = fs::OpenOptions::new()
            .write(true)
            .open(&path)
            .map_err(|e| FsError::from_io(&path, e))?;
        file.set_len(len).map_err(|e| FsError::from_io(&path, e))
    }

    fn open(&self, path: &Path, options: &OpenOptions) -> Result<Box<dyn FileStream>> {
        let path = self.resolve(path);
        if path.is_dir() {
            return Err(FsError::NotAFile(path));
        }
        let file = options
            .to_std()
            .open(&path)
            .map_err(|e| FsError::from_io(&path, e))?;
        Ok(Box::new(file))
    }

    fn copy_file(&self, from: &Path, to: &Path, overwrite: bool) -> Result<u64> {
        let from = self.resolve(from);
        let to = self.resolve(to);
        Self::require_file(&from)?;
        if to.is_dir() || (!overwrite && to.exists()) {
            return Err(FsError::AlreadyExists(to));
        }
        fs::copy(&from, &to).map_err(|e| FsError::from_io(&to, e))
    }

    fn rename_file(&self, from: &Path, to: &Path, overwrite: bool) -> Result<()> {
        let from = self.resolve(from);
        let to = self.resolve(to);
        Self::require_file(&from)?;
        if to.is_dir() || (!overwrite && to.exists()) {
            return Err(FsError::AlreadyExists(to));
        }
        fs::rename(&from, &to).map_err(|e| FsError::from_io(&from, e))
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let path = self.resolve(path);
        Self::require_file(&path)?;
        fs::remove_file(&path).map_err(|e| FsError::from_io(&path, e))
    }

    fn set_attributes(&self, path: &Path, attributes: Attributes) -> Result<()> {
        let path = self.resolve(path);
        let meta = fs::metadata(&path).map_err(|e| FsError::from_io(&path, e))?;
        let mut perms = meta.permissions();
        if perms.readonly() != attributes.readonly {
            perms.set_readonly(attributes.readonly);
            fs::set_permissions(&path, perms).map_err(|e| FsError::from_io(&path, e))?;
        }
        trace!(path = %path.display(), "Only the read-only attribute is applied on disk");
        Ok(())
    }

    fn set_times(&self, path: &Path, times: FileTimes) -> Result<()> {
        let path = self.resolve(path);
        let file = fs::File::open(&path).map_err(|e| FsError::from_io(&path, e))?;
        let mut std_times = fs::FileTimes::new();
        if let Some(t) = times.modified {
            std_times = std_times.set_modified(SystemTime::from(t));
        }
        if let Some(t) = times.accessed {
            std_times = std_times.set_accessed(SystemTime::from(t));
        }
        file.set_times(std_times)
            .map_err(|e| FsError::from_io(&path, e))
    }
}

impl DirectoryOps for DiskFileSystem {
    fn create_dir(&self, path: &Path) -> Result<()> {
        let path = self.resolve(path);
        fs::create_dir(&path).map_err(|e| FsError::from_io(&path, e))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let path = self.resolve(path);
        if path.is_file() {
            return Err(FsError::NotADirectory(path));
        }
        fs::create_dir_all(&path).map_err(|e| FsError::from_io(&path, e))
    }

    fn remove_dir(&self, path: &Path, recursive: bool) -> Result<()> {
        let path = self.resolve(path);
        Self::require_dir(&path)?;
        if recursive {
            return fs::remove_dir_all(&path).map_err(|e| FsError::from_io(&path, e));
        }
        let mut entries = fs::read_dir(&path).map_err(|e| FsError::from_io(&path, e))?;
        if entries.next().is_some() {
            return Err(FsError::DirectoryNotEmpty(path));
        }
        fs::remove_dir(&path).map_err(|e| FsError::from_io(&path, e))
    }

    fn move_dir(&self, from: &Path, to: &Path) -> Result<()> {
        let from = self.resolve(from);
        let to = self.resolve(to);
        Self::require_dir(&from)?;
        if to.exists() {
            return Err(FsError::AlreadyExists(to));
        }
        if to.starts_with(&from) {
            return Err(FsError::invalid_path(
                to.display().to_string(),
                "cannot move a directory into itself",
            ));
        }
        fs::rename(&from, &to).map_err(|e| FsError::from_io(&from, e))
    }

    fn copy_dir(&self, from: &Path, to: &Path, overwrite: bool) -> Result<u64> {
        let from = self.resolve(from);
        let to = self.resolve(to);
        Self::require_dir(&from)?;
        if to.starts_with(&from) {
            return Err(FsError::invalid_path(
                to.display().to_string(),
                "cannot copy a directory into itself",
            ));
        }

        let mut plan = vec![(from.clone(), to.clone(), FileType::Directory)];
        for entry in Self::candidates(&from, true)? {
            let rel = entry.path.strip_prefix(&from).unwrap_or(&entry.path);
            plan.push((entry.path.clone(), to.join(rel), entry.file_type));
        }
        for (_, target, kind) in &plan {
            match (kind, target.is_dir(), target.exists()) {
                (_, _, false) => {}
                (FileType::Directory, true, _) => {}
                (FileType::Directory, false, _) => {
                    return Err(FsError::NotADirectory(target.clone()))
                }
                (_, true, _) => return Err(FsError::NotAFile(target.clone())),
                _ if !overwrite => return Err(FsError::AlreadyExists(target.clone())),
                _ => {}
            }
        }

        let mut files = 0;
        for (source, target, kind) in plan {
            if kind == FileType::Directory {
                fs::create_dir_all(&target).map_err(|e| FsError::from_io(&target, e))?;
            } else {
                fs::copy(&source, &target).map_err(|e| FsError::from_io(&target, e))?;
                files += 1;
            }
        }
        Ok(files)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let path = self.resolve(path);
        Self::require_dir(&path)?;
        Self::candidates(&path, false)
    }

    fn enumerate(&self, path: &Path, options: &EnumerateOptions) -> Result<Entries> {
        let pattern = NamePattern::new(&options.pattern, Self::case_sensitive())?;
        let path = self.resolve(path);
        Self::require_dir(&path)?;
        let candidates = Self::candidates(&path, options.recursive)?;
        Ok(Entries::new(candidates, pattern, options.filter))
    }

    fn current_dir(&self) -> PathBuf {
        self.current_dir
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn set_current_dir(&self, path: &Path) -> Result<()> {
        let path = self.resolve(path);
        Self::require_dir(&path)?;
        *self.current_dir.write().unwrap_or_else(|e| e.into_inner()) = path;
        Ok(())
    }

    fn temp_dir(&self) -> PathBuf {
        env::temp_dir()
    }

    fn roots(&self) -> Vec<PathBuf> {
        if cfg!(windows) {
            (b'A'..=b'Z')
                .map(|d| PathBuf::from(format!("{}:\\", d as char)))
                .filter(|p| p.exists())
                .collect()
        } else {
            vec![PathBuf::from("/")]
        }
    }
}

impl PathOps for DiskFileSystem {
    fn separator(&self) -> char {
        MAIN_SEPARATOR
    }

    fn join(&self, base: &Path, path: &str) -> PathBuf {
        base.join(path)
    }

    fn split(&self, path: &Path) -> Vec<String> {
        path.components()
            .filter(|c| !matches!(c, Component::CurDir))
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect()
    }

    fn file_name(&self, path: &Path) -> Option<String> {
        path.file_name().map(|n| n.to_string_lossy().to_string())
    }

    fn file_stem(&self, path: &Path) -> Option<String> {
        path.file_stem().map(|n| n.to_string_lossy().to_string())
    }

    fn extension(&self, path: &Path) -> Option<String> {
        path.extension().map(|n| n.to_string_lossy().to_string())
    }

    fn change_extension(&self, path: &Path, extension: Option<&str>) -> PathBuf {
        let ext = extension.map(|e| e.trim_start_matches('.')).unwrap_or("");
        path.with_extension(ext)
    }

    fn parent(&self, path: &Path) -> Option<PathBuf> {
        path.parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
    }

    fn root(&self, path: &Path) -> Option<PathBuf> {
        let root: PathBuf = path
            .components()
            .take_while(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
            .collect();
        path.has_root().then_some(root)
    }

    fn is_rooted(&self, path: &Path) -> bool {
        path.has_root()
    }

    fn full_path(&self, path: &Path) -> Result<PathBuf> {
        if path.as_os_str().is_empty() {
            return Err(FsError::invalid_path("", "path is empty"));
        }
        let mut out = PathBuf::new();
        for component in self.resolve(path).components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    if out.parent().is_some() {
                        out.pop();
                    }
                }
                other => out.push(other.as_os_str()),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Read;
    use tempfile::TempDir;

    fn create_test_dir() -> (TempDir, DiskFileSystem) {
        let dir = TempDir::new().unwrap();
        let base = dir.path();

        fs::create_dir(base.join("subdir")).unwrap();
        fs::write(base.join("test.txt"), b"hello world").unwrap();
        fs::write(base.join("subdir/nested.txt"), b"nested content").unwrap();

        let disk = DiskFileSystem::with_current_dir(base);
        (dir, disk)
    }

    #[test]
    fn test_exists_relative_to_own_current_dir() {
        let (_dir, disk) = create_test_dir();
        assert!(disk.exists(Path::new("test.txt")));
        assert!(disk.is_dir(Path::new("subdir")));
        assert!(!disk.exists(Path::new("nonexistent")));
    }

    #[test]
    fn test_metadata() {
        let (_dir, disk) = create_test_dir();
        let meta = disk.metadata(Path::new("test.txt")).unwrap();
        assert!(meta.is_file());
        assert_eq!(meta.size, 11);
        assert!(!meta.is_readonly());
    }

    #[test]
    fn test_write_append_truncate() {
        let (_dir, disk) = create_test_dir();
        disk.write(Path::new("out.txt"), b"abc").unwrap();
        disk.append(Path::new("out.txt"), b"def").unwrap();
        assert_eq!(disk.read(Path::new("out.txt")).unwrap(), b"abcdef");
        disk.truncate(Path::new("out.txt"), 2).unwrap();
        assert_eq!(disk.read_to_string(Path::new("out.txt")).unwrap(), "ab");
    }

    #[test]
    fn test_error_mapping() {
        let (_dir, disk) = create_test_dir();
        assert_eq!(
            disk.read(Path::new("missing.txt")).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            disk.read(Path::new("subdir")).unwrap_err().kind(),
            ErrorKind::NotAFile
        );
        assert_eq!(
            disk.remove_dir(Path::new("subdir"), false).unwrap_err().kind(),
            ErrorKind::DirectoryNotEmpty
        );
        assert_eq!(
            disk.copy_file(Path::new("test.txt"), Path::new("subdir/nested.txt"), false)
                .unwrap_err()
                .kind(),
            ErrorKind::AlreadyExists
        );
    }

    #[test]
    fn test_enumerate_with_pattern() {
        let (_dir, disk) = create_test_dir();
        let names: Vec<String> = disk
            .enumerate(Path::new("."), &EnumerateOptions::new("*.txt").recursive(true))
            .unwrap()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["nested.txt", "test.txt"]);
    }

    #[test]
    fn test_copy_and_move_dir() {
        let (_dir, disk) = create_test_dir();
        let copied = disk
            .copy_dir(Path::new("subdir"), Path::new("copy"), false)
            .unwrap();
        assert_eq!(copied, 1);
        assert_eq!(
            disk.read_to_string(Path::new("copy/nested.txt")).unwrap(),
            "nested content"
        );

        disk.move_dir(Path::new("copy"), Path::new("moved")).unwrap();
        assert!(!disk.exists(Path::new("copy")));
        assert!(disk.is_file(Path::new("moved/nested.txt")));
    }

    #[test]
    fn test_open_stream() {
        let (_dir, disk) = create_test_dir();
        let mut file = disk
            .open(Path::new("test.txt"), &OpenOptions::new().read(true))
            .unwrap();
        let mut s = String::new();
        file.read_to_string(&mut s).unwrap();
        assert_eq!(s, "hello world");
    }

    #[test]
    fn test_set_current_dir_is_local() {
        let (dir, disk) = create_test_dir();
        let before = env::current_dir().unwrap();
        disk.set_current_dir(Path::new("subdir")).unwrap();
        assert_eq!(disk.current_dir(), dir.path().join("subdir"));
        assert_eq!(env::current_dir().unwrap(), before);
        assert!(disk.exists(Path::new("nested.txt")));
    }

    #[cfg(unix)]
    #[test]
    fn test_full_path_resolves_dots() {
        let disk = DiskFileSystem::with_current_dir("/work/project");
        assert_eq!(
            disk.full_path(Path::new("../other/./file.txt")).unwrap(),
            PathBuf::from("/work/other/file.txt")
        );
    }
}
