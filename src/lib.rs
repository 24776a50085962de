//! fsdouble - an in-memory file system for tests
//!
//! Code that touches the disk takes a `&dyn FileSystem` (or
//! `Arc<dyn FileSystem>`); production wires in [`DiskFileSystem`], tests wire
//! in a [`MemoryFileSystem`] seeded with exactly the tree they need. Both
//! report failures through the same [`FsError`] categories.
//!
//! # Core Concepts
//!
//! - **Capability traits**: [`FileOps`], [`DirectoryOps`] and [`PathOps`],
//!   combined into [`FileSystem`]
//! - **Normalized paths**: `/` and `\` separators, drive roots, `.`/`..`
//!   resolution and a per-instance case policy
//! - **Watching**: [`WatchOps`] subscriptions deliver [`ChangeEvent`]s on a
//!   dedicated thread per subscriber
//! - **Seeding**: [`SeedManifest`] files (YAML or JSON) describe initial trees
//!
//! # Example Usage
//!
//! ```
//! use fsdouble::{FileOps, DirectoryOps, MemoryFileSystem, ErrorKind};
//! use std::path::Path;
//!
//! let fs = MemoryFileSystem::builder()
//!     .file("/repo/Cargo.toml", "[package]")
//!     .build()
//!     .unwrap();
//!
//! assert!(fs.is_dir(Path::new("/REPO")));
//! fs.write(Path::new("/repo/src.rs"), b"fn main() {}").unwrap();
//!
//! let err = fs.remove_dir(Path::new("/repo"), false).unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::DirectoryNotEmpty);
//! ```
//!
//! # Project Structure
//!
//! - [`fs`]: capability traits, the in-memory and disk backends
//! - [`watch`]: change events, sinks and subscriptions
//! - [`config`]: emulator configuration and its environment overrides

pub mod cli;
pub mod config;
pub mod error;
pub mod fs;
pub mod util;
pub mod watch;

pub use config::{ConfigError, EmulatorConfig};
pub use error::{ErrorKind, FsError, Result};
pub use fs::{
    Attributes, CaseSensitivity, Clock, DirEntry, DirectoryOps, DiskFileSystem, EntryFilter,
    EnumerateOptions, Entries, FileMetadata, FileOps, FileStream, FileSystem, FileTimes,
    FileType, ManualClock, MemoryFileSystem, MemoryFileSystemBuilder, OpenOptions, PathOps,
    SeedEntry, SeedManifest, SystemClock,
};
pub use util::{init_default, init_from_env, init_logging, LoggingConfig};
pub use watch::{
    ChangeEvent, ChangeKind, EventKinds, LoggingSink, RecordingSink, WatchOps, WatchOptions,
    WatchSink, WatchSubscription,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
