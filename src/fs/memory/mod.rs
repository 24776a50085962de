//! In-memory file system
//!
//! [`MemoryFileSystem`] keeps a whole directory tree in process memory and
//! implements the same capability traits as the disk backend. All state sits
//! behind one reader/writer lock: reads run concurrently, every mutation is
//! applied atomically, and the change records of a mutation are queued for
//! watchers before the lock is released.

mod node;
mod path;
mod seed;
mod store;
mod stream;

pub use path::{
    lexical_change_extension, lexical_extension, lexical_file_name, lexical_file_stem,
    lexical_join, lexical_parent, lexical_root, lexical_split, CaseSensitivity, NormalizedPath,
    PathNormalizer, SEPARATOR,
};
pub use seed::{SeedEntry, SeedKind, SeedManifest, SeedNode};
pub use stream::MemoryFile;

use crate::config::{ConfigError, EmulatorConfig};
use crate::error::{FsError, Result};
use crate::fs::clock::{Clock, SystemClock};
use crate::fs::pattern::NamePattern;
use crate::fs::r#trait::{DirectoryOps, FileOps, FileStream, PathOps};
use crate::fs::types::{
    Attributes, DirEntry, EnumerateOptions, Entries, FileMetadata, FileTimes, FileType,
    OpenOptions,
};
use crate::watch::{
    Change, ChangeNotifier, WatchOps, WatchOptions, WatchScope, WatchSink, WatchSubscription,
};
use chrono::{DateTime, Utc};
use node::Node;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use store::NodeStore;
use tracing::{debug, trace};
use uuid::Uuid;

struct State {
    store: NodeStore,
    cwd: NormalizedPath,
}

fn too_large(path: &NormalizedPath) -> FsError {
    FsError::Io {
        path: path.to_path_buf(),
        source: io::Error::new(
            io::ErrorKind::OutOfMemory,
            "file length exceeds addressable memory",
        ),
    }
}

/// Grows or shrinks `buf` to `len` bytes, zero-filling, without aborting on
/// lengths the process cannot hold.
fn resize_content(buf: &mut Vec<u8>, len: u64, path: &NormalizedPath) -> Result<()> {
    let len = usize::try_from(len).map_err(|_| too_large(path))?;
    if len > buf.len() {
        buf.try_reserve_exact(len - buf.len())
            .map_err(|_| too_large(path))?;
    }
    buf.resize(len, 0);
    Ok(())
}

/// Overwrites `buf` with `data` at `offset`, zero-filling any gap past the
/// current end.
fn splice_content(
    buf: &mut Vec<u8>,
    offset: u64,
    data: &[u8],
    path: &NormalizedPath,
) -> Result<()> {
    let start = usize::try_from(offset).map_err(|_| too_large(path))?;
    let end = start.checked_add(data.len()).ok_or_else(|| too_large(path))?;
    if end > buf.len() {
        resize_content(buf, end as u64, path)?;
    }
    buf[start..end].copy_from_slice(data);
    Ok(())
}

pub(crate) struct Shared {
    state: RwLock<State>,
    notifier: ChangeNotifier,
    clock: Arc<dyn Clock>,
    normalizer: PathNormalizer,
    implicit_directories: bool,
    track_access_time: bool,
    temp_dir: NormalizedPath,
}

impl Shared {
    // Mutations validate before writing, so a poisoned lock still guards a
    // consistent tree.
    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn case(&self) -> CaseSensitivity {
        self.normalizer.case()
    }

    fn resolve(&self, state: &State, path: &Path) -> Result<NormalizedPath> {
        self.normalizer.normalize_path(path, &state.cwd)
    }

    /// Applies one mutation under the write lock and queues its change
    /// records before the lock is released.
    fn mutate<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&Self, &mut State, DateTime<Utc>) -> Result<(T, Vec<Change>)>,
    ) -> Result<T> {
        let mut state = self.write();
        let now = self.clock.now();
        let (out, changes) = f(self, &mut *state, now)?;
        trace!(op, changes = changes.len(), "Applied mutation");
        self.notifier.publish(&changes);
        Ok(out)
    }

    fn touch_access(&self, path: &NormalizedPath) {
        if !self.track_access_time {
            return;
        }
        let mut state = self.write();
        let now = self.clock.now();
        if let Some(node) = state.store.get_mut(path) {
            node.touch_access(now);
        }
    }

    /// Writes file content in place, or creates the file when it is missing
    /// and `create` is set. A failing `edit` leaves the tree untouched.
    fn put(
        &self,
        state: &mut State,
        target: &NormalizedPath,
        create: bool,
        now: DateTime<Utc>,
        edit: impl FnOnce(&mut Vec<u8>) -> Result<()>,
    ) -> Result<Vec<Change>> {
        if state.store.contains(target) {
            let node = state.store.lookup_mut(target)?;
            if node.is_dir() {
                return Err(FsError::NotAFile(node.path.to_path_buf()));
            }
            if node.is_readonly() {
                return Err(FsError::AccessDenied(node.path.to_path_buf()));
            }
            edit(&mut node.content)?;
            node.touch_write(now);
            return Ok(vec![Change::changed(node.path.clone(), FileType::File)]);
        }
        if !create {
            return Err(state.store.lookup(target).err().unwrap_or_else(|| {
                FsError::NotFound(target.to_path_buf())
            }));
        }

        let name = target
            .file_name()
            .ok_or_else(|| FsError::NotAFile(target.to_path_buf()))?
            .to_string();
        let mut content = Vec::new();
        edit(&mut content)?;
        let (parent, mut changes) =
            state
                .store
                .ensure_parent(target, self.implicit_directories, now)?;
        let stored = parent.child(&name, self.case());
        state
            .store
            .insert(Node::file(stored.clone(), content, now), false)?;
        state.store.touch_parent(&stored, now);
        changes.push(Change::created(stored, FileType::File));
        Ok(changes)
    }

    fn file<'a>(state: &'a State, path: &NormalizedPath) -> Result<&'a Node> {
        let node = state.store.lookup(path)?;
        if node.is_dir() {
            return Err(FsError::NotAFile(node.path.to_path_buf()));
        }
        Ok(node)
    }

    /// Copies bytes of the live content at `offset` into `buf`.
    pub(crate) fn read_at(
        &self,
        path: &NormalizedPath,
        offset: u64,
        buf: &mut [u8],
    ) -> Result<usize> {
        let n = {
            let state = self.read();
            let content = &Self::file(&state, path)?.content;
            let start = usize::try_from(offset)
                .unwrap_or(usize::MAX)
                .min(content.len());
            let n = buf.len().min(content.len() - start);
            buf[..n].copy_from_slice(&content[start..start + n]);
            n
        };
        self.touch_access(path);
        Ok(n)
    }

    pub(crate) fn file_len(&self, path: &NormalizedPath) -> Result<u64> {
        let state = self.read();
        Ok(Self::file(&state, path)?.content.len() as u64)
    }

    /// Writes `data` into the live content at `offset`, or at the current
    /// end when `offset` is `None`. Returns the offset just past the write.
    pub(crate) fn write_at(
        &self,
        path: &NormalizedPath,
        offset: Option<u64>,
        data: &[u8],
    ) -> Result<u64> {
        self.mutate("write_at", |shared, state, now| {
            let mut end = 0;
            let changes = shared.put(state, path, false, now, |buf| {
                let at = offset.unwrap_or(buf.len() as u64);
                splice_content(buf, at, data, path)?;
                end = at + data.len() as u64;
                Ok(())
            })?;
            Ok((end, changes))
        })
    }

    pub(crate) fn set_len(&self, path: &NormalizedPath, len: u64) -> Result<()> {
        self.mutate("set_len", |shared, state, now| {
            let changes =
                shared.put(state, path, false, now, |buf| resize_content(buf, len, path))?;
            Ok(((), changes))
        })
    }

    /// Creates `dir` and its missing ancestors.
    fn make_dirs(state: &mut State, dir: &NormalizedPath, now: DateTime<Utc>) -> Result<Vec<Change>> {
        let missing = state.store.missing_chain(dir)?;
        Ok(state.store.create_chain(missing, now))
    }

    /// Materializes one manifest entry, creating ancestors as needed.
    fn seed(
        &self,
        state: &mut State,
        raw: &str,
        entry: &SeedEntry,
        now: DateTime<Utc>,
    ) -> Result<Vec<Change>> {
        let target = self.normalizer.normalize(raw, &state.cwd)?;
        let changes = match entry.kind() {
            SeedKind::Directory => Self::make_dirs(state, &target, now)?,
            SeedKind::File => {
                let name = target
                    .file_name()
                    .ok_or_else(|| FsError::NotAFile(target.to_path_buf()))?
                    .to_string();
                let (parent, mut changes) = state.store.ensure_parent(&target, true, now)?;
                let stored = parent.child(&name, self.case());
                if state.store.get(&stored).map(Node::is_dir).unwrap_or(false) {
                    return Err(FsError::NotAFile(stored.to_path_buf()));
                }
                let existed = state.store.contains(&stored);
                let node = Node::file(stored.clone(), entry.content_bytes(), now);
                state.store.insert(node, true)?;
                state.store.touch_parent(&stored, now);
                changes.push(if existed {
                    Change::changed(stored, FileType::File)
                } else {
                    Change::created(stored, FileType::File)
                });
                changes
            }
        };

        let stored = state.store.canonical(&target);
        if let Some(node) = state.store.get_mut(&stored) {
            node.attributes.readonly |= entry.readonly();
            node.attributes.hidden |= entry.hidden();
            if let Some(modified) = entry.modified() {
                node.times.modified = modified;
            }
        }
        Ok(changes)
    }
}

/// Thread-safe in-memory file system.
///
/// Clones share the same tree.
#[derive(Clone)]
pub struct MemoryFileSystem {
    shared: Arc<Shared>,
}

impl MemoryFileSystem {
    /// Empty tree with the default configuration.
    pub fn new() -> Self {
        Self::build_default()
    }

    fn build_default() -> Self {
        let config = EmulatorConfig::default();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let normalizer = PathNormalizer::new(config.case_sensitivity);
        let now = clock.now();
        let root = NormalizedPath::root();
        let mut state = State {
            store: NodeStore::new(config.case_sensitivity, now),
            cwd: root.clone(),
        };
        // The default temp dir is a fixed, valid absolute path.
        let temp_dir = normalizer
            .normalize(&config.temp_dir, &root)
            .unwrap_or_else(|_| root.clone());
        if let Ok(missing) = state.store.missing_chain(&temp_dir) {
            state.store.create_chain(missing, now);
        }
        let temp_dir = state.store.canonical(&temp_dir);
        Self::assemble(state, config, clock, normalizer, temp_dir)
    }

    fn assemble(
        state: State,
        config: EmulatorConfig,
        clock: Arc<dyn Clock>,
        normalizer: PathNormalizer,
        temp_dir: NormalizedPath,
    ) -> Self {
        debug!(
            nodes = state.store.len(),
            cwd = %state.cwd,
            case = ?config.case_sensitivity,
            "In-memory file system ready"
        );
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(state),
                notifier: ChangeNotifier::new(config.case_sensitivity),
                clock,
                normalizer,
                implicit_directories: config.implicit_directories,
                track_access_time: config.track_access_time,
                temp_dir,
            }),
        }
    }

    pub fn with_config(config: EmulatorConfig) -> std::result::Result<Self, ConfigError> {
        Self::builder().config(config).build()
    }

    pub fn builder() -> MemoryFileSystemBuilder {
        MemoryFileSystemBuilder::default()
    }

    pub fn case_sensitivity(&self) -> CaseSensitivity {
        self.shared.case()
    }

    /// Number of nodes in the tree, roots included.
    pub fn node_count(&self) -> usize {
        self.shared.read().store.len()
    }

    /// Number of live watch subscriptions.
    pub fn watcher_count(&self) -> usize {
        self.shared.notifier.len()
    }

    /// Adds or replaces a file, creating missing parent directories.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl AsRef<[u8]>) -> Result<()> {
        let raw = path_str(path.as_ref())?;
        let entry = SeedEntry::binary(content.as_ref().to_vec());
        self.shared.mutate("add_file", |shared, state, now| {
            Ok(((), shared.seed(state, &raw, &entry, now)?))
        })
    }

    /// Adds a directory and any missing ancestors.
    pub fn add_dir(&self, path: impl AsRef<Path>) -> Result<()> {
        let raw = path_str(path.as_ref())?;
        self.shared.mutate("add_dir", |shared, state, now| {
            Ok(((), shared.seed(state, &raw, &SeedEntry::directory(), now)?))
        })
    }

    /// Applies every entry of `manifest` to the live tree.
    pub fn load_manifest(&self, manifest: &SeedManifest) -> std::result::Result<(), ConfigError> {
        for (raw, entry) in &manifest.entries {
            self.shared
                .mutate("load_manifest", |shared, state, now| {
                    Ok(((), shared.seed(state, raw, entry, now)?))
                })
                .map_err(|source| ConfigError::Seed {
                    path: raw.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Exports the tree as a manifest: every file, plus directories that
    /// have no children or are marked readonly or hidden.
    ///
    /// The manifest format has no room for the system and archive flags,
    /// creation and access times, or security descriptors, so those are not
    /// carried over. Directory modification times are not kept either.
    pub fn snapshot(&self) -> SeedManifest {
        let state = self.shared.read();
        let mut manifest = SeedManifest {
            current_dir: Some(state.cwd.as_str().to_string()),
            case_sensitive: Some(self.shared.case().is_sensitive()),
            ..SeedManifest::default()
        };
        for node in state.store.nodes() {
            let entry = if node.is_file() {
                let text = std::str::from_utf8(&node.content).ok();
                SeedEntry::Detailed(SeedNode {
                    kind: SeedKind::File,
                    content: text.map(str::to_string),
                    bytes: text.is_none().then(|| node.content.clone()),
                    readonly: node.attributes.readonly,
                    hidden: node.attributes.hidden,
                    modified: Some(node.times.modified),
                })
            } else if node.path.is_root()
                || (state.store.has_children(&node.path)
                    && !node.attributes.readonly
                    && !node.attributes.hidden)
            {
                continue;
            } else {
                SeedEntry::Detailed(SeedNode {
                    kind: SeedKind::Directory,
                    readonly: node.attributes.readonly,
                    hidden: node.attributes.hidden,
                    ..SeedNode::default()
                })
            };
            manifest
                .entries
                .insert(node.path.as_str().to_string(), entry);
        }
        manifest
    }

    /// Creates an empty, uniquely named file in the temp directory.
    pub fn create_temp_file(&self) -> Result<PathBuf> {
        let name = format!("tmp{}.tmp", &Uuid::new_v4().simple().to_string()[..8]);
        let target = self.shared.temp_dir.child(&name, self.shared.case());
        self.shared.mutate("create_temp_file", |shared, state, now| {
            let mut changes = Shared::make_dirs(state, &shared.temp_dir, now)?;
            changes.extend(shared.put(state, &target, true, now, |_| Ok(()))?);
            Ok((target.to_path_buf(), changes))
        })
    }

    /// Opaque access-control blob attached to a node.
    pub fn security(&self, path: &Path) -> Result<Option<String>> {
        let state = self.shared.read();
        let target = self.shared.resolve(&state, path)?;
        Ok(state.store.lookup(&target)?.security.clone())
    }

    pub fn set_security(&self, path: &Path, security: Option<String>) -> Result<()> {
        self.shared.mutate("set_security", |shared, state, _| {
            let target = shared.resolve(state, path)?;
            let node = state.store.lookup_mut(&target)?;
            node.security = security;
            Ok(((), Vec::new()))
        })
    }

    fn lookup_dir(state: &State, target: &NormalizedPath) -> Result<NormalizedPath> {
        let node = state.store.lookup(target)?;
        if !node.is_dir() {
            return Err(FsError::NotADirectory(node.path.to_path_buf()));
        }
        Ok(node.path.clone())
    }

    fn file_type_of(&self, path: &Path) -> Option<FileType> {
        let state = self.shared.read();
        let target = self.shared.resolve(&state, path).ok()?;
        state.store.get(&target).map(|n| n.kind)
    }
}

impl Default for MemoryFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryFileSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.read();
        f.debug_struct("MemoryFileSystem")
            .field("nodes", &state.store.len())
            .field("cwd", &state.cwd.as_str())
            .field("case", &self.shared.case())
            .finish()
    }
}

fn path_str(path: &Path) -> Result<String> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| FsError::invalid_path(path.to_string_lossy(), "not valid UTF-8"))
}

/// Builds a [`MemoryFileSystem`] from configuration and seed data.
#[derive(Default)]
pub struct MemoryFileSystemBuilder {
    config: Option<EmulatorConfig>,
    clock: Option<Arc<dyn Clock>>,
    manifests: Vec<SeedManifest>,
    entries: Vec<(String, SeedEntry)>,
}

impl MemoryFileSystemBuilder {
    pub fn config(mut self, config: EmulatorConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Seeds from a manifest; its `current_dir` and `case_sensitive`
    /// settings override the configuration.
    pub fn manifest(mut self, manifest: SeedManifest) -> Self {
        self.manifests.push(manifest);
        self
    }

    pub fn file(mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.entries
            .push((path.into(), SeedEntry::binary(content.into())));
        self
    }

    pub fn dir(mut self, path: impl Into<String>) -> Self {
        self.entries.push((path.into(), SeedEntry::directory()));
        self
    }

    pub fn build(self) -> std::result::Result<MemoryFileSystem, ConfigError> {
        let mut config = self.config.unwrap_or_default();
        for manifest in &self.manifests {
            if let Some(dir) = &manifest.current_dir {
                config.current_dir = dir.clone();
            }
            if let Some(sensitive) = manifest.case_sensitive {
                config = config.case_sensitive(sensitive);
            }
        }
        config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let normalizer = PathNormalizer::new(config.case_sensitivity);
        let now = clock.now();
        let root = NormalizedPath::root();
        let invalid = |setting: &str, e: FsError| {
            ConfigError::ValidationFailed(format!("{}: {}", setting, e))
        };

        let mut state = State {
            store: NodeStore::new(config.case_sensitivity, now),
            cwd: root.clone(),
        };
        let cwd = normalizer
            .normalize(&config.current_dir, &root)
            .map_err(|e| invalid("current_dir", e))?;
        let temp_dir = normalizer
            .normalize(&config.temp_dir, &root)
            .map_err(|e| invalid("temp_dir", e))?;
        for dir in [&cwd, &temp_dir] {
            Shared::make_dirs(&mut state, dir, now).map_err(|e| invalid("directory", e))?;
        }
        state.cwd = state.store.canonical(&cwd);
        let temp_dir = state.store.canonical(&temp_dir);

        let fs = MemoryFileSystem::assemble(state, config, clock, normalizer, temp_dir);
        for manifest in &self.manifests {
            fs.load_manifest(manifest)?;
        }
        for (raw, entry) in &self.entries {
            fs.shared
                .mutate("seed", |shared, state, now| {
                    Ok(((), shared.seed(state, raw, entry, now)?))
                })
                .map_err(|source| ConfigError::Seed {
                    path: raw.clone(),
                    source,
                })?;
        }
        Ok(fs)
    }
}

impl FileOps for MemoryFileSystem {
    fn exists(&self, path: &Path) -> bool {
        self.file_type_of(path).is_some()
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.file_type_of(path) == Some(FileType::Directory)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.file_type_of(path) == Some(FileType::File)
    }

    fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        let state = self.shared.read();
        let target = self.shared.resolve(&state, path)?;
        Ok(state.store.lookup(&target)?.metadata())
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let (stored, content) = {
            let state = self.shared.read();
            let target = self.shared.resolve(&state, path)?;
            let node = state.store.lookup(&target)?;
            if !node.is_file() {
                return Err(FsError::NotAFile(node.path.to_path_buf()));
            }
            (node.path.clone(), node.content.clone())
        };
        self.shared.touch_access(&stored);
        Ok(content)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.shared.mutate("write", |shared, state, now| {
            let target = shared.resolve(state, path)?;
            let changes = shared.put(state, &target, true, now, |buf| {
                buf.clear();
                buf.try_reserve_exact(contents.len())
                    .map_err(|_| too_large(&target))?;
                buf.extend_from_slice(contents);
                Ok(())
            })?;
            Ok(((), changes))
        })
    }

    fn append(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.shared.mutate("append", |shared, state, now| {
            let target = shared.resolve(state, path)?;
            let changes = shared.put(state, &target, true, now, |buf| {
                buf.try_reserve(contents.len())
                    .map_err(|_| too_large(&target))?;
                buf.extend_from_slice(contents);
                Ok(())
            })?;
            Ok(((), changes))
        })
    }

    fn truncate(&self, path: &Path, len: u64) -> Result<()> {
        self.shared.mutate("truncate", |shared, state, now| {
            let target = shared.resolve(state, path)?;
            let changes =
                shared.put(state, &target, false, now, |buf| resize_content(buf, len, &target))?;
            Ok(((), changes))
        })
    }

    fn open(&self, path: &Path, options: &OpenOptions) -> Result<Box<dyn FileStream>> {
        let writable = options.is_writable();
        let stored = self.shared.mutate("open", |shared, state, now| {
            let target = shared.resolve(state, path)?;
            if let Some(node) = state.store.get_mut(&target) {
                if node.is_dir() {
                    return Err(FsError::NotAFile(node.path.to_path_buf()));
                }
                if options.create_new {
                    return Err(FsError::AlreadyExists(node.path.to_path_buf()));
                }
                if writable && node.is_readonly() {
                    return Err(FsError::AccessDenied(node.path.to_path_buf()));
                }
                let stored = node.path.clone();
                if writable && options.truncate && !options.append && !node.content.is_empty() {
                    node.content.clear();
                    node.touch_write(now);
                    let changes = vec![Change::changed(stored.clone(), FileType::File)];
                    return Ok((stored, changes));
                }
                if shared.track_access_time {
                    node.touch_access(now);
                }
                return Ok((stored, Vec::new()));
            }

            if !writable || !(options.create || options.create_new) {
                return Err(FsError::NotFound(target.to_path_buf()));
            }
            let changes = shared.put(state, &target, true, now, |_| Ok(()))?;
            let stored = state.store.canonical(&target);
            Ok((stored, changes))
        })?;
        let file = MemoryFile::new(self.shared.clone(), stored, options)?;
        Ok(Box::new(file))
    }

    fn copy_file(&self, from: &Path, to: &Path, overwrite: bool) -> Result<u64> {
        self.shared.mutate("copy_file", |shared, state, now| {
            let src = shared.resolve(state, from)?;
            let dst = shared.resolve(state, to)?;
            if !state.store.lookup(&src)?.is_file() {
                return Err(FsError::NotAFile(src.to_path_buf()));
            }
            let name = dst
                .file_name()
                .ok_or_else(|| FsError::AlreadyExists(dst.to_path_buf()))?
                .to_string();
            let (parent, mut changes) =
                state
                    .store
                    .ensure_parent(&dst, shared.implicit_directories, now)?;
            let stored = parent.child(&name, shared.case());
            let (len, copied) = state.store.copy_file(&src, &stored, overwrite, now)?;
            changes.extend(copied);
            Ok((len, changes))
        })
    }

    fn rename_file(&self, from: &Path, to: &Path, overwrite: bool) -> Result<()> {
        self.shared.mutate("rename_file", |shared, state, now| {
            let src = shared.resolve(state, from)?;
            let dst = shared.resolve(state, to)?;
            let node = state.store.lookup(&src)?;
            if !node.is_file() {
                return Err(FsError::NotAFile(node.path.to_path_buf()));
            }
            if node.is_readonly() {
                return Err(FsError::AccessDenied(node.path.to_path_buf()));
            }
            let name = dst
                .file_name()
                .ok_or_else(|| FsError::AlreadyExists(dst.to_path_buf()))?
                .to_string();
            let (parent, mut changes) =
                state
                    .store
                    .ensure_parent(&dst, shared.implicit_directories, now)?;
            let stored = parent.child(&name, shared.case());
            changes.extend(state.store.relocate(&src, &stored, overwrite, now)?);
            Ok(((), changes))
        })
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.shared.mutate("remove_file", |shared, state, now| {
            let target = shared.resolve(state, path)?;
            let node = state.store.lookup(&target)?;
            if !node.is_file() {
                return Err(FsError::NotAFile(node.path.to_path_buf()));
            }
            Ok(((), state.store.remove(&target, false, now)?))
        })
    }

    fn set_attributes(&self, path: &Path, attributes: Attributes) -> Result<()> {
        self.shared.mutate("set_attributes", |shared, state, _| {
            let target = shared.resolve(state, path)?;
            let node = state.store.lookup_mut(&target)?;
            if node.attributes == attributes {
                return Ok(((), Vec::new()));
            }
            node.attributes = attributes;
            Ok(((), vec![Change::changed(node.path.clone(), node.kind)]))
        })
    }

    fn set_times(&self, path: &Path, times: FileTimes) -> Result<()> {
        self.shared.mutate("set_times", |shared, state, _| {
            let target = shared.resolve(state, path)?;
            let node = state.store.lookup_mut(&target)?;
            if node.is_readonly() {
                return Err(FsError::AccessDenied(node.path.to_path_buf()));
            }
            node.times.apply(&times);
            Ok(((), vec![Change::changed(node.path.clone(), node.kind)]))
        })
    }
}

impl DirectoryOps for MemoryFileSystem {
    fn create_dir(&self, path: &Path) -> Result<()> {
        self.shared.mutate("create_dir", |shared, state, now| {
            let target = shared.resolve(state, path)?;
            if let Some(existing) = state.store.get(&target) {
                return Err(FsError::AlreadyExists(existing.path.to_path_buf()));
            }
            let Some(name) = target.file_name().map(str::to_string) else {
                return Ok(((), Shared::make_dirs(state, &target, now)?));
            };
            let (parent, mut changes) =
                state
                    .store
                    .ensure_parent(&target, shared.implicit_directories, now)?;
            let stored = parent.child(&name, shared.case());
            state
                .store
                .insert(Node::directory(stored.clone(), now), false)?;
            state.store.touch_parent(&stored, now);
            changes.push(Change::created(stored, FileType::Directory));
            Ok(((), changes))
        })
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.shared.mutate("create_dir_all", |shared, state, now| {
            let target = shared.resolve(state, path)?;
            Ok(((), Shared::make_dirs(state, &target, now)?))
        })
    }

    fn remove_dir(&self, path: &Path, recursive: bool) -> Result<()> {
        self.shared.mutate("remove_dir", |shared, state, now| {
            let target = shared.resolve(state, path)?;
            let stored = Self::lookup_dir(state, &target)?;
            Ok(((), state.store.remove(&stored, recursive, now)?))
        })
    }

    fn move_dir(&self, from: &Path, to: &Path) -> Result<()> {
        self.shared.mutate("move_dir", |shared, state, now| {
            let src = shared.resolve(state, from)?;
            let dst = shared.resolve(state, to)?;
            let src_stored = Self::lookup_dir(state, &src)?;
            if src_stored.is_root() || state.store.lookup(&src_stored)?.is_readonly() {
                return Err(FsError::AccessDenied(src_stored.to_path_buf()));
            }
            if dst.is_descendant_of(&src_stored) {
                return Err(FsError::invalid_path(
                    dst.as_str(),
                    "cannot move a directory into itself",
                ));
            }
            if dst.key() != src_stored.key() {
                if let Some(existing) = state.store.get(&dst) {
                    return Err(FsError::AlreadyExists(existing.path.to_path_buf()));
                }
            }
            let name = dst
                .file_name()
                .ok_or_else(|| FsError::AlreadyExists(dst.to_path_buf()))?
                .to_string();
            let (parent, mut changes) =
                state
                    .store
                    .ensure_parent(&dst, shared.implicit_directories, now)?;
            let stored = parent.child(&name, shared.case());
            changes.extend(state.store.relocate(&src_stored, &stored, false, now)?);
            Ok(((), changes))
        })
    }

    fn copy_dir(&self, from: &Path, to: &Path, overwrite: bool) -> Result<u64> {
        self.shared.mutate("copy_dir", |shared, state, now| {
            let src = shared.resolve(state, from)?;
            let dst = shared.resolve(state, to)?;
            let src_stored = Self::lookup_dir(state, &src)?;
            if dst.key() == src_stored.key() || dst.is_descendant_of(&src_stored) {
                return Err(FsError::invalid_path(
                    dst.as_str(),
                    "cannot copy a directory into itself",
                ));
            }
            let mut changes = Vec::new();
            if !dst.is_root() {
                let (_, created) =
                    state
                        .store
                        .ensure_parent(&dst, shared.implicit_directories, now)?;
                changes = created;
            }
            let stored = state.store.canonical(&dst);
            let (files, copied) = state.store.copy_tree(&src_stored, &stored, overwrite, now)?;
            changes.extend(copied);
            Ok((files, changes))
        })
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let state = self.shared.read();
        let target = self.shared.resolve(&state, path)?;
        let stored = Self::lookup_dir(&state, &target)?;
        Ok(state.store.entries(&stored, false))
    }

    fn enumerate(&self, path: &Path, options: &EnumerateOptions) -> Result<Entries> {
        let pattern = NamePattern::new(&options.pattern, self.shared.case().is_sensitive())?;
        let state = self.shared.read();
        let target = self.shared.resolve(&state, path)?;
        let stored = Self::lookup_dir(&state, &target)?;
        let candidates = state.store.entries(&stored, options.recursive);
        Ok(Entries::new(candidates, pattern, options.filter))
    }

    fn current_dir(&self) -> PathBuf {
        self.shared.read().cwd.to_path_buf()
    }

    fn set_current_dir(&self, path: &Path) -> Result<()> {
        let mut state = self.shared.write();
        let target = self.shared.resolve(&state, path)?;
        let stored = Self::lookup_dir(&state, &target)?;
        debug!(from = %state.cwd, to = %stored, "Changed current directory");
        state.cwd = stored;
        Ok(())
    }

    fn temp_dir(&self) -> PathBuf {
        self.shared.temp_dir.to_path_buf()
    }

    fn roots(&self) -> Vec<PathBuf> {
        self.shared
            .read()
            .store
            .roots()
            .into_iter()
            .map(|n| n.path.to_path_buf())
            .collect()
    }
}

impl PathOps for MemoryFileSystem {
    fn separator(&self) -> char {
        SEPARATOR
    }

    fn join(&self, base: &Path, path: &str) -> PathBuf {
        lexical_join(base, path)
    }

    fn split(&self, path: &Path) -> Vec<String> {
        lexical_split(path)
    }

    fn file_name(&self, path: &Path) -> Option<String> {
        lexical_file_name(path)
    }

    fn file_stem(&self, path: &Path) -> Option<String> {
        lexical_file_stem(path)
    }

    fn extension(&self, path: &Path) -> Option<String> {
        lexical_extension(path)
    }

    fn change_extension(&self, path: &Path, extension: Option<&str>) -> PathBuf {
        lexical_change_extension(path, extension)
    }

    fn parent(&self, path: &Path) -> Option<PathBuf> {
        lexical_parent(path)
    }

    fn root(&self, path: &Path) -> Option<PathBuf> {
        lexical_root(path).map(PathBuf::from)
    }

    fn is_rooted(&self, path: &Path) -> bool {
        lexical_root(path).is_some()
    }

    fn full_path(&self, path: &Path) -> Result<PathBuf> {
        let state = self.shared.read();
        Ok(self.shared.resolve(&state, path)?.to_path_buf())
    }
}

impl WatchOps for MemoryFileSystem {
    fn subscribe(
        &self,
        options: WatchOptions,
        sink: Arc<dyn WatchSink>,
    ) -> Result<WatchSubscription> {
        let pattern = NamePattern::new(&options.pattern, self.shared.case().is_sensitive())?;
        // Registration holds the read lock so no mutation is half-observed.
        let state = self.shared.read();
        let target = self.shared.resolve(&state, &options.path)?;
        let stored = Self::lookup_dir(&state, &target)?;
        let scope = WatchScope {
            path: stored,
            pattern,
            recursive: options.recursive,
            kinds: options.kinds,
        };
        Ok(self.shared.notifier.subscribe(scope, sink))
    }

    fn unsubscribe(&self, id: Uuid) -> bool {
        self.shared.notifier.unsubscribe(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::fs::clock::ManualClock;
    use std::io::{Read, Seek, SeekFrom, Write};

    fn fs() -> MemoryFileSystem {
        MemoryFileSystem::new()
    }

    #[test]
    fn test_default_tree_has_root_and_temp() {
        let fs = fs();
        assert!(fs.is_dir(Path::new("/")));
        assert!(fs.is_dir(Path::new("/tmp")));
        assert_eq!(fs.current_dir(), PathBuf::from("/"));
        assert_eq!(fs.roots(), vec![PathBuf::from("/")]);
    }

    #[test]
    fn test_write_requires_parent_by_default() {
        let fs = fs();
        let err = fs.write(Path::new("/missing/a.txt"), b"x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!fs.exists(Path::new("/missing")));
    }

    #[test]
    fn test_implicit_directories_policy() {
        let fs = MemoryFileSystem::with_config(EmulatorConfig::default().implicit_directories(true))
            .unwrap();
        fs.write(Path::new("/a/b/c.txt"), b"x").unwrap();
        assert!(fs.is_dir(Path::new("/a/b")));
    }

    #[test]
    fn test_write_under_file_is_not_a_directory() {
        let fs = fs();
        fs.write(Path::new("/a.txt"), b"x").unwrap();
        let err = fs.write(Path::new("/a.txt/b.txt"), b"y").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotADirectory);
    }

    #[test]
    fn test_append_and_truncate() {
        let fs = fs();
        fs.append(Path::new("/log.txt"), b"one").unwrap();
        fs.append(Path::new("/log.txt"), b"two").unwrap();
        assert_eq!(fs.read(Path::new("/log.txt")).unwrap(), b"onetwo");

        fs.truncate(Path::new("/log.txt"), 3).unwrap();
        assert_eq!(fs.read(Path::new("/log.txt")).unwrap(), b"one");
        fs.truncate(Path::new("/log.txt"), 5).unwrap();
        assert_eq!(fs.read(Path::new("/log.txt")).unwrap(), b"one\0\0");

        let err = fs.truncate(Path::new("/nope.txt"), 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_read_directory_is_not_a_file() {
        let fs = fs();
        let err = fs.read(Path::new("/tmp")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAFile);
    }

    #[test]
    fn test_timestamps_follow_clock() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let fs = MemoryFileSystem::builder()
            .clock(clock.clone())
            .build()
            .unwrap();
        fs.write(Path::new("/a.txt"), b"1").unwrap();
        let first = fs.metadata(Path::new("/a.txt")).unwrap();

        clock.advance(chrono::Duration::seconds(30));
        fs.write(Path::new("/a.txt"), b"2").unwrap();
        let second = fs.metadata(Path::new("/a.txt")).unwrap();

        assert_eq!(second.created, first.created);
        assert_eq!(second.modified - first.modified, chrono::Duration::seconds(30));
    }

    #[test]
    fn test_read_touches_access_time() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let fs = MemoryFileSystem::builder()
            .clock(clock.clone())
            .build()
            .unwrap();
        fs.write(Path::new("/a.txt"), b"1").unwrap();
        clock.advance(chrono::Duration::seconds(5));
        fs.read(Path::new("/a.txt")).unwrap();

        let meta = fs.metadata(Path::new("/a.txt")).unwrap();
        assert_eq!(meta.accessed - meta.modified, chrono::Duration::seconds(5));
    }

    #[test]
    fn test_stream_write_then_read() {
        let fs = fs();
        {
            let mut file = fs
                .open(
                    Path::new("/s.txt"),
                    &OpenOptions::new().read(true).write(true).create(true),
                )
                .unwrap();
            file.write_all(b"hello world").unwrap();
            file.seek(SeekFrom::Start(6)).unwrap();
            let mut rest = String::new();
            file.read_to_string(&mut rest).unwrap();
            assert_eq!(rest, "world");
        }
        assert_eq!(fs.read_to_string(Path::new("/s.txt")).unwrap(), "hello world");
    }

    #[test]
    fn test_open_rules() {
        let fs = fs();
        let err = fs
            .open(Path::new("/none.txt"), &OpenOptions::new().read(true))
            .err()
            .expect("open should fail");
        assert_eq!(err.kind(), ErrorKind::NotFound);

        fs.write(Path::new("/x.txt"), b"abc").unwrap();
        let err = fs
            .open(
                Path::new("/x.txt"),
                &OpenOptions::new().write(true).create_new(true),
            )
            .err()
            .expect("open should fail");
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);

        fs.set_readonly(Path::new("/x.txt"), true).unwrap();
        let err = fs
            .open(Path::new("/x.txt"), &OpenOptions::new().write(true))
            .err()
            .expect("open should fail");
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
    }

    #[test]
    fn test_open_truncate_clears_content() {
        let fs = fs();
        fs.write(Path::new("/t.txt"), b"abcdef").unwrap();
        let file = fs
            .open(
                Path::new("/t.txt"),
                &OpenOptions::new().write(true).truncate(true),
            )
            .unwrap();
        drop(file);
        assert!(fs.read(Path::new("/t.txt")).unwrap().is_empty());
    }

    fn handle(fs: &MemoryFileSystem, path: &str, options: &OpenOptions) -> MemoryFile {
        let cwd = fs.shared.read().cwd.clone();
        let path = fs.shared.normalizer.normalize(path, &cwd).unwrap();
        MemoryFile::new(fs.shared.clone(), path, options).unwrap()
    }

    #[test]
    fn test_append_handle_keeps_interleaved_appends() {
        let fs = fs();
        fs.write(Path::new("/log.txt"), b"a").unwrap();
        let mut file = fs
            .open(Path::new("/log.txt"), &OpenOptions::new().append(true))
            .unwrap();
        fs.append(Path::new("/log.txt"), b"b").unwrap();
        file.write_all(b"c").unwrap();
        drop(file);
        assert_eq!(fs.read_to_string(Path::new("/log.txt")).unwrap(), "abc");
    }

    #[test]
    fn test_positional_write_splices_live_content() {
        let fs = fs();
        fs.write(Path::new("/p.txt"), b"0123").unwrap();
        let mut file = fs
            .open(Path::new("/p.txt"), &OpenOptions::new().write(true))
            .unwrap();
        fs.append(Path::new("/p.txt"), b"4567").unwrap();
        file.seek(SeekFrom::Start(2)).unwrap();
        file.write_all(b"xy").unwrap();
        file.seek(SeekFrom::End(2)).unwrap();
        file.write_all(b"!").unwrap();
        drop(file);
        assert_eq!(
            fs.read(Path::new("/p.txt")).unwrap(),
            b"01xy4567\0\0!".to_vec()
        );
    }

    #[test]
    fn test_reader_handle_sees_later_writes() {
        let fs = fs();
        fs.write(Path::new("/r.txt"), b"old").unwrap();
        let mut file = fs
            .open(Path::new("/r.txt"), &OpenOptions::new().read(true))
            .unwrap();
        fs.write(Path::new("/r.txt"), b"new!").unwrap();
        let mut text = String::new();
        file.read_to_string(&mut text).unwrap();
        assert_eq!(text, "new!");
    }

    #[test]
    fn test_seek_before_start_fails() {
        let fs = fs();
        fs.write(Path::new("/s.txt"), b"abc").unwrap();
        let mut file = fs
            .open(Path::new("/s.txt"), &OpenOptions::new().read(true))
            .unwrap();
        let err = file.seek(SeekFrom::End(-4)).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
        assert_eq!(file.seek(SeekFrom::Current(1)).unwrap(), 1);
    }

    #[test]
    fn test_truncate_to_unaddressable_length_fails() {
        let fs = fs();
        fs.write(Path::new("/t.txt"), b"abc").unwrap();
        let err = fs.truncate(Path::new("/t.txt"), u64::MAX).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(fs.read(Path::new("/t.txt")).unwrap(), b"abc");
    }

    #[test]
    fn test_handle_set_len() {
        let fs = fs();
        fs.write(Path::new("/t.txt"), b"abcdef").unwrap();
        let mut file = handle(&fs, "/t.txt", &OpenOptions::new().write(true));

        file.set_len(2).unwrap();
        assert_eq!(file.len().unwrap(), 2);
        let err = file.set_len(u64::MAX).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::OutOfMemory);
        assert_eq!(fs.read(Path::new("/t.txt")).unwrap(), b"ab");

        let mut reader = handle(&fs, "/t.txt", &OpenOptions::new().read(true));
        assert_eq!(
            reader.set_len(0).unwrap_err().kind(),
            std::io::ErrorKind::PermissionDenied
        );
    }

    #[test]
    fn test_lookup_under_file_is_not_a_directory() {
        let fs = fs();
        fs.write(Path::new("/a.txt"), b"a").unwrap();
        let err = fs.read(Path::new("/a.txt/b")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotADirectory);
        let err = fs.metadata(Path::new("/a.txt/b/c")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotADirectory);
        assert!(!fs.exists(Path::new("/a.txt/b")));
    }

    #[test]
    fn test_snapshot_lists_files_and_empty_dirs() {
        let fs = fs();
        fs.add_file("/a/b.txt", "b").unwrap();
        fs.add_dir("/empty").unwrap();
        let manifest = fs.snapshot();

        assert!(manifest.entries.contains_key("/a/b.txt"));
        assert!(manifest.entries.contains_key("/empty"));
        assert!(!manifest.entries.contains_key("/a"));

        let copy = MemoryFileSystem::builder().manifest(manifest).build().unwrap();
        assert_eq!(copy.read(Path::new("/a/b.txt")).unwrap(), b"b");
        assert!(copy.is_dir(Path::new("/empty")));
    }

    #[test]
    fn test_snapshot_keeps_marked_parent_dirs() {
        let fs = fs();
        fs.add_file("/cfg/app.toml", "x").unwrap();
        fs.add_file("/plain/a.txt", "a").unwrap();
        fs.set_attributes(
            Path::new("/cfg"),
            Attributes::normal().with_hidden(true).with_readonly(true),
        )
        .unwrap();
        let manifest = fs.snapshot();

        assert!(manifest.entries.contains_key("/cfg"));
        assert!(!manifest.entries.contains_key("/plain"));

        let copy = MemoryFileSystem::builder().manifest(manifest).build().unwrap();
        let meta = copy.metadata(Path::new("/cfg")).unwrap();
        assert!(meta.is_dir());
        assert!(meta.attributes.hidden);
        assert!(meta.is_readonly());
        assert_eq!(copy.read(Path::new("/cfg/app.toml")).unwrap(), b"x");
    }

    #[test]
    fn test_builder_applies_manifest_settings() {
        let manifest = SeedManifest::new()
            .with_file("/repo/README.md", "# hi")
            .with_entry(
                "/repo/locked.txt",
                SeedEntry::Detailed(SeedNode {
                    content: Some("x".into()),
                    readonly: true,
                    ..SeedNode::default()
                }),
            );
        let manifest = SeedManifest {
            current_dir: Some("/repo".into()),
            case_sensitive: Some(true),
            ..manifest
        };
        let fs = MemoryFileSystem::builder().manifest(manifest).build().unwrap();

        assert_eq!(fs.case_sensitivity(), CaseSensitivity::Sensitive);
        assert_eq!(fs.current_dir(), PathBuf::from("/repo"));
        assert!(fs.exists(Path::new("README.md")));
        assert!(!fs.exists(Path::new("readme.md")));
        assert!(fs.metadata(Path::new("locked.txt")).unwrap().is_readonly());
    }

    #[test]
    fn test_builder_rejects_relative_current_dir() {
        let err = MemoryFileSystem::builder()
            .config(EmulatorConfig::default().current_dir("rel"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationFailed(_)));
    }

    #[test]
    fn test_create_temp_file_is_unique() {
        let fs = fs();
        let a = fs.create_temp_file().unwrap();
        let b = fs.create_temp_file().unwrap();
        assert_ne!(a, b);
        assert!(fs.is_file(&a));
        assert!(a.starts_with("/tmp"));
    }

    #[test]
    fn test_security_blob_round_trips() {
        let fs = fs();
        fs.add_file("/a.txt", "").unwrap();
        fs.set_security(Path::new("/a.txt"), Some("O:BAG:BA".into())).unwrap();
        assert_eq!(
            fs.security(Path::new("/A.TXT")).unwrap().as_deref(),
            Some("O:BAG:BA")
        );
    }
}
