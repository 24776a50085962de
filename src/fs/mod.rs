//! File system abstraction with an in-memory double and a disk backend

pub mod clock;
pub mod memory;
pub mod pattern;
mod real;
mod r#trait;
mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use memory::{
    CaseSensitivity, MemoryFile, MemoryFileSystem, MemoryFileSystemBuilder, SeedEntry, SeedKind,
    SeedManifest, SeedNode,
};
pub use pattern::NamePattern;
pub use r#trait::{DirectoryOps, FileOps, FileStream, FileSystem, PathOps};
pub use real::DiskFileSystem;
pub use types::{
    Attributes, DirEntry, EntryFilter, EnumerateOptions, Entries, FileMetadata, FileTimes,
    FileType, OpenOptions,
};
