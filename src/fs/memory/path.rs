//! Path canonicalization for the in-memory tree
//!
//! Every path handed to [`MemoryFileSystem`](super::MemoryFileSystem) is
//! turned into a [`NormalizedPath`] before it touches the node store:
//!
//! - `\` and `/` are both accepted; `/` is the stored separator
//! - roots are `/` or a drive root such as `C:/`
//! - `.` segments vanish, `..` pops a segment and stops at the root
//! - relative paths resolve against the caller-supplied current directory
//! - the lookup key is case-folded under [`CaseSensitivity::Insensitive`],
//!   while the display form keeps the caller's spelling

use crate::error::{FsError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const SEPARATOR: char = '/';
const ALT_SEPARATOR: char = '\\';
const INVALID_CHARS: &[char] = &['\0', '<', '>', '|', '"', '*', '?'];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseSensitivity {
    #[default]
    Insensitive,
    Sensitive,
}

impl CaseSensitivity {
    pub fn is_sensitive(&self) -> bool {
        matches!(self, CaseSensitivity::Sensitive)
    }

    pub fn fold(&self, s: &str) -> String {
        match self {
            CaseSensitivity::Sensitive => s.to_string(),
            CaseSensitivity::Insensitive => s.to_lowercase(),
        }
    }
}

/// Canonical absolute path: display spelling plus comparison key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedPath {
    display: String,
    key: String,
    root_len: usize,
}

impl NormalizedPath {
    fn new(display: String, root_len: usize, case: CaseSensitivity) -> Self {
        let key = case.fold(&display);
        Self {
            display,
            key,
            root_len,
        }
    }

    pub fn root() -> Self {
        Self {
            display: "/".to_string(),
            key: "/".to_string(),
            root_len: 1,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.display
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn to_path_buf(&self) -> PathBuf {
        PathBuf::from(&self.display)
    }

    pub fn is_root(&self) -> bool {
        self.display.len() == self.root_len
    }

    pub fn root_str(&self) -> &str {
        &self.display[..self.root_len]
    }

    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        self.display.rsplit(SEPARATOR).next()
    }

    pub fn parent(&self, case: CaseSensitivity) -> Option<NormalizedPath> {
        if self.is_root() {
            return None;
        }
        let cut = self.display.rfind(SEPARATOR)?;
        let end = if cut < self.root_len { self.root_len } else { cut };
        Some(Self::new(self.display[..end].to_string(), self.root_len, case))
    }

    /// Child of this path named `name` (a single segment).
    pub fn child(&self, name: &str, case: CaseSensitivity) -> NormalizedPath {
        let display = if self.is_root() {
            format!("{}{}", self.display, name)
        } else {
            format!("{}{}{}", self.display, SEPARATOR, name)
        };
        Self::new(display, self.root_len, case)
    }

    /// All ancestors from the root down to the direct parent.
    pub fn ancestors(&self, case: CaseSensitivity) -> Vec<NormalizedPath> {
        let mut out = Vec::new();
        let mut current = self.parent(case);
        while let Some(p) = current {
            current = p.parent(case);
            out.push(p);
        }
        out.reverse();
        out
    }

    /// Key prefix shared by every strict descendant.
    pub fn descendant_prefix(&self) -> String {
        if self.is_root() {
            self.key.clone()
        } else {
            format!("{}{}", self.key, SEPARATOR)
        }
    }

    pub fn is_descendant_of(&self, other: &NormalizedPath) -> bool {
        self.key != other.key && self.key.starts_with(&other.descendant_prefix())
    }

    /// Re-bases this path from `from` onto `to`; `self` must be `from` or below it.
    pub fn rebase(
        &self,
        from: &NormalizedPath,
        to: &NormalizedPath,
        case: CaseSensitivity,
    ) -> NormalizedPath {
        if self.key == from.key {
            return to.clone();
        }
        let rest = self.display[self.root_len..]
            .split(SEPARATOR)
            .skip(from.depth())
            .collect::<Vec<_>>()
            .join("/");
        let display = if to.is_root() {
            format!("{}{}", to.display, rest)
        } else {
            format!("{}{}{}", to.display, SEPARATOR, rest)
        };
        Self::new(display, to.root_len, case)
    }

    /// Number of segments below the root.
    pub fn depth(&self) -> usize {
        if self.is_root() {
            0
        } else {
            self.display[self.root_len..].split(SEPARATOR).count()
        }
    }
}

impl fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

/// Turns raw path strings into [`NormalizedPath`]s under one case policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathNormalizer {
    case: CaseSensitivity,
}

impl PathNormalizer {
    pub fn new(case: CaseSensitivity) -> Self {
        Self { case }
    }

    pub fn case(&self) -> CaseSensitivity {
        self.case
    }

    pub fn normalize_path(&self, path: &Path, cwd: &NormalizedPath) -> Result<NormalizedPath> {
        let s = path
            .to_str()
            .ok_or_else(|| FsError::invalid_path(path.to_string_lossy(), "not valid UTF-8"))?;
        self.normalize(s, cwd)
    }

    /// Canonicalizes `input`, resolving relative paths against `cwd`.
    pub fn normalize(&self, input: &str, cwd: &NormalizedPath) -> Result<NormalizedPath> {
        if input.trim().is_empty() {
            return Err(FsError::invalid_path(input, "path is empty"));
        }
        if let Some(c) = input.chars().find(|c| INVALID_CHARS.contains(c)) {
            return Err(FsError::invalid_path(
                input,
                format!("illegal character {:?}", c),
            ));
        }

        let unified = input.replace(ALT_SEPARATOR, "/");
        let (root, rest, mut segments) = match split_root(&unified) {
            Some((root, rest)) => (root, rest, Vec::new()),
            None => {
                let base: Vec<String> = cwd.display[cwd.root_len..]
                    .split(SEPARATOR)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
                (cwd.root_str().to_string(), unified.as_str(), base)
            }
        };

        for segment in rest.split(SEPARATOR) {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                s if s.contains(':') => {
                    return Err(FsError::invalid_path(
                        input,
                        "':' is only allowed after a drive letter",
                    ));
                }
                s => segments.push(s.to_string()),
            }
        }

        let root_len = root.len();
        let display = format!("{}{}", root, segments.join("/"));
        Ok(NormalizedPath::new(display, root_len, self.case))
    }

    pub fn key(&self, display: &str) -> String {
        self.case.fold(display)
    }
}

/// Splits a `/`-separated path into its root and the remainder.
fn split_root(s: &str) -> Option<(String, &str)> {
    let bytes = s.as_bytes();
    if bytes.first() == Some(&b'/') {
        return Some(("/".to_string(), &s[1..]));
    }
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        let drive = (bytes[0] as char).to_ascii_uppercase();
        return Some((format!("{}:/", drive), &s[2..]));
    }
    None
}

fn unify(path: &Path) -> String {
    path.to_string_lossy().replace(ALT_SEPARATOR, "/")
}

/// Lexical root of a raw path, if it is rooted.
pub fn lexical_root(path: &Path) -> Option<String> {
    split_root(&unify(path)).map(|(root, _)| root)
}

/// Root (if any) followed by the raw segments, without resolving `.`/`..`.
pub fn lexical_split(path: &Path) -> Vec<String> {
    let unified = unify(path);
    let (root, rest) = match split_root(&unified) {
        Some((root, rest)) => (Some(root), rest.to_string()),
        None => (None, unified.clone()),
    };
    root.into_iter()
        .chain(
            rest.split(SEPARATOR)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        )
        .collect()
}

pub fn lexical_file_name(path: &Path) -> Option<String> {
    let unified = unify(path);
    let trimmed = match split_root(&unified) {
        Some((_, rest)) => rest.trim_end_matches(SEPARATOR),
        None => unified.trim_end_matches(SEPARATOR),
    };
    match trimmed.rsplit(SEPARATOR).next() {
        Some("") | Some("..") | Some(".") | None => None,
        Some(name) => Some(name.to_string()),
    }
}

pub fn lexical_extension(path: &Path) -> Option<String> {
    let name = lexical_file_name(path)?;
    match name.rfind('.') {
        Some(0) | None => None,
        Some(i) if i + 1 == name.len() => None,
        Some(i) => Some(name[i + 1..].to_string()),
    }
}

pub fn lexical_file_stem(path: &Path) -> Option<String> {
    let name = lexical_file_name(path)?;
    match name.rfind('.') {
        Some(0) | None => Some(name),
        Some(i) => Some(name[..i].to_string()),
    }
}

pub fn lexical_parent(path: &Path) -> Option<PathBuf> {
    let unified = unify(path);
    let (root, rest) = match split_root(&unified) {
        Some((root, rest)) => (root, rest.trim_end_matches(SEPARATOR).to_string()),
        None => (String::new(), unified.trim_end_matches(SEPARATOR).to_string()),
    };
    if rest.is_empty() {
        return None;
    }
    match rest.rfind(SEPARATOR) {
        Some(i) => Some(PathBuf::from(format!("{}{}", root, &rest[..i]))),
        None if !root.is_empty() => Some(PathBuf::from(root)),
        None => None,
    }
}

pub fn lexical_join(base: &Path, part: &str) -> PathBuf {
    let part = part.replace(ALT_SEPARATOR, "/");
    if split_root(&part).is_some() {
        return PathBuf::from(part);
    }
    let base = unify(base);
    if base.is_empty() {
        PathBuf::from(part)
    } else if base.ends_with(SEPARATOR) {
        PathBuf::from(format!("{}{}", base, part))
    } else {
        PathBuf::from(format!("{}{}{}", base, SEPARATOR, part))
    }
}

pub fn lexical_change_extension(path: &Path, extension: Option<&str>) -> PathBuf {
    let unified = unify(path);
    let name_start = unified.rfind(SEPARATOR).map(|i| i + 1).unwrap_or(0);
    let name = &unified[name_start..];
    let stem_end = match name.rfind('.') {
        Some(i) if i > 0 => name_start + i,
        _ => unified.len(),
    };
    let stem = &unified[..stem_end];
    match extension.map(|e| e.trim_start_matches('.')) {
        Some(ext) if !ext.is_empty() => PathBuf::from(format!("{}.{}", stem, ext)),
        _ => PathBuf::from(stem),
    }
}
