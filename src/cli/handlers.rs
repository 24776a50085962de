use super::commands::{CaptureArgs, CatArgs, LsArgs, ManifestFormatArg, TreeArgs};
use super::output::{format_listing, format_manifest, render_tree, OutputFormat};
use crate::config::EmulatorConfig;
use crate::fs::{
    DirectoryOps, DiskFileSystem, EntryFilter, EnumerateOptions, FileOps, FileType,
    MemoryFileSystem, NamePattern, PathOps, SeedEntry, SeedManifest,
};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

fn load(manifest: &Path) -> Result<MemoryFileSystem> {
    let seed = SeedManifest::from_file(manifest)?;
    debug!(entries = seed.entries.len(), "Loaded manifest {}", manifest.display());
    let fs = MemoryFileSystem::builder()
        .config(EmulatorConfig::from_env())
        .manifest(seed)
        .build()
        .with_context(|| format!("Failed to seed from {}", manifest.display()))?;
    Ok(fs)
}

fn exit_code(result: Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    }
}

pub fn handle_tree(args: &TreeArgs) -> i32 {
    exit_code(run_tree(args))
}

fn run_tree(args: &TreeArgs) -> Result<()> {
    let fs = load(&args.manifest)?;
    let root = PathBuf::from(args.path.as_deref().unwrap_or("/"));
    let root = fs.full_path(&root)?;
    print!("{}", render_tree(&fs, &root)?);
    Ok(())
}

pub fn handle_ls(args: &LsArgs) -> i32 {
    exit_code(run_ls(args))
}

fn run_ls(args: &LsArgs) -> Result<()> {
    let fs = load(&args.manifest)?;
    let dir = args
        .path
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(|| fs.current_dir());
    let filter = if args.files {
        EntryFilter::Files
    } else if args.dirs {
        EntryFilter::Directories
    } else {
        EntryFilter::All
    };
    let options = EnumerateOptions::new(args.pattern.clone())
        .recursive(args.recursive)
        .filter(filter);
    let entries = fs
        .enumerate(&dir, &options)
        .with_context(|| format!("Failed to list {}", dir.display()))?;
    print!("{}", format_listing(entries));
    Ok(())
}

pub fn handle_cat(args: &CatArgs) -> i32 {
    exit_code(run_cat(args))
}

fn run_cat(args: &CatArgs) -> Result<()> {
    let fs = load(&args.manifest)?;
    let content = fs
        .read(Path::new(&args.path))
        .with_context(|| format!("Failed to read {}", args.path))?;
    std::io::stdout()
        .write_all(&content)
        .context("Failed to write to stdout")?;
    Ok(())
}

pub fn handle_capture(args: &CaptureArgs, quiet: bool) -> i32 {
    exit_code(run_capture(args, quiet))
}

/// Builds a manifest from the directory tree under `root`: every matching
/// file, plus directories that end up with no captured children.
pub fn capture_manifest(root: &Path, pattern: &str) -> Result<SeedManifest> {
    let disk = DiskFileSystem::new();
    let entries: Vec<_> = disk
        .enumerate(root, &EnumerateOptions::new("*").recursive(true))
        .with_context(|| format!("Failed to walk {}", root.display()))?
        .collect();
    let filter = NamePattern::new(pattern, true)?;

    let to_key = |path: &Path| -> String {
        let rel = path.strip_prefix(root).unwrap_or(path);
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        format!("/{}", parts.join("/"))
    };

    let mut manifest = SeedManifest::new();
    let mut occupied = HashSet::new();
    for entry in entries.iter().filter(|e| e.file_type == FileType::File) {
        if !filter.matches(&entry.name) {
            continue;
        }
        let bytes = disk
            .read(&entry.path)
            .with_context(|| format!("Failed to read {}", entry.path.display()))?;
        let seed = match String::from_utf8(bytes) {
            Ok(text) => SeedEntry::file(text),
            Err(e) => SeedEntry::binary(e.into_bytes()),
        };
        let mut parent = entry.path.parent();
        while let Some(p) = parent {
            if !occupied.insert(p.to_path_buf()) {
                break;
            }
            parent = p.parent();
        }
        manifest.entries.insert(to_key(&entry.path), seed);
    }
    for entry in entries.iter().filter(|e| e.file_type == FileType::Directory) {
        if !occupied.contains(&entry.path) {
            manifest
                .entries
                .insert(to_key(&entry.path), SeedEntry::directory());
        }
    }
    Ok(manifest)
}

fn run_capture(args: &CaptureArgs, quiet: bool) -> Result<()> {
    let root = match &args.directory {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    let manifest = capture_manifest(&root, &args.pattern)?;
    let format = match args.format {
        ManifestFormatArg::Yaml => OutputFormat::Yaml,
        ManifestFormatArg::Json => OutputFormat::Json,
    };
    let rendered = format_manifest(&manifest, format)?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !quiet {
                info!(
                    entries = manifest.entries.len(),
                    "Captured {} into {}",
                    root.display(),
                    path.display()
                );
            }
        }
        None => print!("{}", rendered),
    }
    Ok(())
}
