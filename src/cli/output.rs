//! Text rendering for CLI output

use crate::config::ConfigError;
use crate::error::Result;
use crate::fs::{DirEntry, FileSystem, FileType, SeedManifest};
use std::path::Path;

/// Manifest serialization format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Yaml,
    Json,
}

pub fn format_manifest(
    manifest: &SeedManifest,
    format: OutputFormat,
) -> std::result::Result<String, ConfigError> {
    match format {
        OutputFormat::Yaml => manifest.to_yaml(),
        OutputFormat::Json => manifest.to_json(),
    }
}

/// Renders the subtree at `root` with box-drawing guides.
pub fn render_tree(fs: &dyn FileSystem, root: &Path) -> Result<String> {
    let mut out = format!("{}\n", root.display());
    render_children(fs, root, "", &mut out)?;
    Ok(out)
}

fn render_children(fs: &dyn FileSystem, dir: &Path, prefix: &str, out: &mut String) -> Result<()> {
    let entries = fs.read_dir(dir)?;
    let count = entries.len();
    for (i, entry) in entries.iter().enumerate() {
        let last = i + 1 == count;
        let (branch, indent) = if last {
            ("└── ", "    ")
        } else {
            ("├── ", "│   ")
        };
        out.push_str(prefix);
        out.push_str(branch);
        out.push_str(&describe(fs, entry));
        out.push('\n');
        if entry.file_type == FileType::Directory {
            render_children(fs, &entry.path, &format!("{}{}", prefix, indent), out)?;
        }
    }
    Ok(())
}

fn describe(fs: &dyn FileSystem, entry: &DirEntry) -> String {
    match entry.file_type {
        FileType::Directory => format!("{}/", entry.name),
        _ => match fs.metadata(&entry.path) {
            Ok(meta) => format!("{} ({} B)", entry.name, meta.size),
            Err(_) => entry.name.clone(),
        },
    }
}

/// One line per entry, as printed by `ls`.
pub fn format_listing(entries: impl IntoIterator<Item = DirEntry>) -> String {
    entries
        .into_iter()
        .map(|e| match e.file_type {
            FileType::Directory => format!("{}/\n", e.path.display()),
            _ => format!("{}\n", e.path.display()),
        })
        .collect()
}
