//! Node store: the tree of files and directories keyed by normalized path
//!
//! Keys are comparison keys, so a `BTreeMap` keeps every subtree contiguous
//! and gives a stable iteration order. Operations that touch more than one
//! node validate the whole plan before mutating anything.

use super::node::Node;
use super::path::{CaseSensitivity, NormalizedPath};
use crate::error::{FsError, Result};
use crate::fs::types::{DirEntry, FileType};
use crate::watch::Change;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct NodeStore {
    nodes: BTreeMap<String, Node>,
    case: CaseSensitivity,
}

impl NodeStore {
    pub fn new(case: CaseSensitivity, now: DateTime<Utc>) -> Self {
        let root = Node::directory(NormalizedPath::root(), now);
        let mut nodes = BTreeMap::new();
        nodes.insert(root.path.key().to_string(), root);
        Self { nodes, case }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn get(&self, path: &NormalizedPath) -> Option<&Node> {
        self.nodes.get(path.key())
    }

    pub fn get_mut(&mut self, path: &NormalizedPath) -> Option<&mut Node> {
        self.nodes.get_mut(path.key())
    }

    pub fn contains(&self, path: &NormalizedPath) -> bool {
        self.nodes.contains_key(path.key())
    }

    /// The node at `path`. A miss is `NotADirectory` when some ancestor is a
    /// file, `NotFound` otherwise.
    pub fn lookup(&self, path: &NormalizedPath) -> Result<&Node> {
        self.get(path).ok_or_else(|| self.miss(path))
    }

    pub fn lookup_mut(&mut self, path: &NormalizedPath) -> Result<&mut Node> {
        if !self.contains(path) {
            return Err(self.miss(path));
        }
        self.get_mut(path)
            .ok_or_else(|| FsError::NotFound(path.to_path_buf()))
    }

    fn miss(&self, path: &NormalizedPath) -> FsError {
        let blocker = path
            .ancestors(self.case)
            .into_iter()
            .filter_map(|a| self.get(&a))
            .find(|n| !n.is_dir());
        match blocker {
            Some(file) => FsError::NotADirectory(file.path.to_path_buf()),
            None => FsError::NotFound(path.to_path_buf()),
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn roots(&self) -> Vec<&Node> {
        self.nodes.values().filter(|n| n.path.is_root()).collect()
    }

    /// `path` spelled the way the tree already spells its existing prefix.
    pub fn canonical(&self, path: &NormalizedPath) -> NormalizedPath {
        if let Some(node) = self.get(path) {
            return node.path.clone();
        }
        let ancestors = path.ancestors(self.case);
        for ancestor in ancestors.iter().rev() {
            if let Some(node) = self.get(ancestor) {
                return path.rebase(ancestor, &node.path, self.case);
            }
        }
        path.clone()
    }

    fn descendant_keys(&self, dir: &NormalizedPath) -> Vec<String> {
        let prefix = dir.descendant_prefix();
        self.nodes
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter(|(k, _)| k.as_str() != dir.key())
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Every node strictly below `dir`, in key order.
    pub fn descendants(&self, dir: &NormalizedPath) -> Vec<&Node> {
        let prefix = dir.descendant_prefix();
        self.nodes
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter(|(k, _)| k.as_str() != dir.key())
            .map(|(_, n)| n)
            .collect()
    }

    pub fn children(&self, dir: &NormalizedPath) -> Vec<&Node> {
        let depth = dir.depth() + 1;
        self.descendants(dir)
            .into_iter()
            .filter(|n| n.path.depth() == depth)
            .collect()
    }

    pub fn has_children(&self, dir: &NormalizedPath) -> bool {
        let prefix = dir.descendant_prefix();
        self.nodes
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .any(|(k, _)| k.as_str() != dir.key())
    }

    /// Entries below `dir` for enumeration, direct children unless `recursive`.
    pub fn entries(&self, dir: &NormalizedPath, recursive: bool) -> Vec<DirEntry> {
        let nodes = if recursive {
            self.descendants(dir)
        } else {
            self.children(dir)
        };
        nodes.into_iter().map(Node::dir_entry).collect()
    }

    /// Directories along `dir` (roots included) that do not exist yet, top
    /// down. Fails if an existing element of the chain is a file.
    pub fn missing_chain(&self, dir: &NormalizedPath) -> Result<Vec<NormalizedPath>> {
        let mut chain = dir.ancestors(self.case);
        chain.push(dir.clone());

        let mut missing = Vec::new();
        for p in chain {
            match self.get(&p) {
                Some(node) if !node.is_dir() => {
                    return Err(FsError::NotADirectory(node.path.to_path_buf()))
                }
                Some(_) => {}
                None => missing.push(p),
            }
        }
        Ok(missing)
    }

    /// Materializes the directories returned by [`missing_chain`](Self::missing_chain).
    pub fn create_chain(&mut self, missing: Vec<NormalizedPath>, now: DateTime<Utc>) -> Vec<Change> {
        let mut changes = Vec::with_capacity(missing.len());
        for p in missing {
            let stored = self.canonical(&p);
            let node = Node::directory(stored.clone(), now);
            self.nodes.insert(stored.key().to_string(), node);
            self.touch_parent(&stored, now);
            changes.push(Change::created(stored, FileType::Directory));
        }
        changes
    }

    /// Makes sure the parent directory of `path` exists, creating missing
    /// ancestors when `implicit` is set. Returns the parent's stored path.
    pub fn ensure_parent(
        &mut self,
        path: &NormalizedPath,
        implicit: bool,
        now: DateTime<Utc>,
    ) -> Result<(NormalizedPath, Vec<Change>)> {
        let parent = path
            .parent(self.case)
            .ok_or_else(|| FsError::invalid_path(path.as_str(), "a root has no parent"))?;
        let missing = self.missing_chain(&parent)?;
        if !missing.is_empty() && !implicit {
            return Err(FsError::NotFound(parent.to_path_buf()));
        }
        let changes = self.create_chain(missing, now);
        Ok((self.canonical(&parent), changes))
    }

    /// Inserts `node`; an existing node at the same key is replaced only when
    /// `overwrite` is set.
    pub fn insert(&mut self, node: Node, overwrite: bool) -> Result<Option<Node>> {
        let key = node.path.key().to_string();
        if let Some(existing) = self.nodes.get(&key) {
            if !overwrite {
                return Err(FsError::AlreadyExists(existing.path.to_path_buf()));
            }
        }
        Ok(self.nodes.insert(key, node))
    }

    pub fn touch_parent(&mut self, path: &NormalizedPath, now: DateTime<Utc>) {
        if let Some(parent) = path.parent(self.case) {
            if let Some(node) = self.nodes.get_mut(parent.key()) {
                node.touch_write(now);
            }
        }
    }

    /// Removes a node, and its whole subtree when `recursive` is set.
    ///
    /// Deletion records are produced descendants first.
    pub fn remove(
        &mut self,
        path: &NormalizedPath,
        recursive: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<Change>> {
        let node = self.lookup(path)?;
        let target = node.path.clone();
        if target.is_root() || node.is_readonly() {
            return Err(FsError::AccessDenied(target.to_path_buf()));
        }

        let keys = if node.is_dir() {
            self.descendant_keys(&target)
        } else {
            Vec::new()
        };
        if !keys.is_empty() && !recursive {
            return Err(FsError::DirectoryNotEmpty(target.to_path_buf()));
        }
        if let Some(locked) = keys
            .iter()
            .filter_map(|k| self.nodes.get(k))
            .find(|n| n.is_readonly())
        {
            return Err(FsError::AccessDenied(locked.path.to_path_buf()));
        }

        let target_key = target.key().to_string();
        let mut changes = Vec::with_capacity(keys.len() + 1);
        for key in keys.iter().rev().chain(std::iter::once(&target_key)) {
            if let Some(removed) = self.nodes.remove(key) {
                changes.push(Change::deleted(removed.path, removed.kind));
            }
        }
        self.touch_parent(&target, now);
        Ok(changes)
    }

    /// Moves a node and its subtree to `to`, whose parent must already exist.
    ///
    /// Moving onto an existing file is allowed only for a file source with
    /// `overwrite` set. A change of spelling alone (same key) renames in place.
    pub fn relocate(
        &mut self,
        from: &NormalizedPath,
        to: &NormalizedPath,
        overwrite: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<Change>> {
        let src = self.lookup(from)?;
        let src_path = src.path.clone();
        let src_kind = src.kind;
        if src_path.is_root() || src.is_readonly() {
            return Err(FsError::AccessDenied(src_path.to_path_buf()));
        }
        if to.is_descendant_of(&src_path) {
            return Err(FsError::invalid_path(
                to.as_str(),
                "cannot move a directory into itself",
            ));
        }

        let same_key = to.key() == src_path.key();
        if same_key && to.as_str() == src_path.as_str() {
            return Ok(Vec::new());
        }
        let mut replaces = false;
        if !same_key {
            if let Some(dst) = self.get(to) {
                if !overwrite || dst.is_dir() || src_kind == FileType::Directory {
                    return Err(FsError::AlreadyExists(dst.path.to_path_buf()));
                }
                if dst.is_readonly() {
                    return Err(FsError::AccessDenied(dst.path.to_path_buf()));
                }
                replaces = true;
            }
        }

        let mut keys = vec![src_path.key().to_string()];
        keys.extend(self.descendant_keys(&src_path));
        let moved: Vec<Node> = keys.iter().filter_map(|k| self.nodes.remove(k)).collect();
        if replaces {
            self.nodes.remove(to.key());
        }
        for mut node in moved {
            node.path = node.path.rebase(&src_path, to, self.case);
            self.nodes.insert(node.path.key().to_string(), node);
        }

        self.touch_parent(&src_path, now);
        self.touch_parent(to, now);
        Ok(vec![Change::renamed(src_path, to.clone(), src_kind)])
    }

    /// Copies one file onto `to`, whose parent must already exist.
    pub fn copy_file(
        &mut self,
        from: &NormalizedPath,
        to: &NormalizedPath,
        overwrite: bool,
        now: DateTime<Utc>,
    ) -> Result<(u64, Vec<Change>)> {
        let src = self.lookup(from)?;
        if !src.is_file() {
            return Err(FsError::NotAFile(src.path.to_path_buf()));
        }
        let content = src.content.clone();
        let attributes = src.attributes;
        let modified = src.times.modified;

        if to.key() == from.key() {
            return Err(FsError::AlreadyExists(to.to_path_buf()));
        }
        let change = match self.get(to) {
            Some(dst) if dst.is_dir() => {
                return Err(FsError::AlreadyExists(dst.path.to_path_buf()))
            }
            Some(dst) if !overwrite => {
                return Err(FsError::AlreadyExists(dst.path.to_path_buf()))
            }
            Some(dst) if dst.is_readonly() => {
                return Err(FsError::AccessDenied(dst.path.to_path_buf()))
            }
            Some(dst) => Change::changed(dst.path.clone(), FileType::File),
            None => Change::created(to.clone(), FileType::File),
        };

        let len = content.len() as u64;
        let mut node = Node::file(change.path.clone(), content, now);
        node.attributes = attributes;
        node.times.modified = modified;
        self.nodes.insert(node.path.key().to_string(), node);
        self.touch_parent(to, now);
        Ok((len, vec![change]))
    }

    /// Copies the directory tree at `from` into `to`, merging into existing
    /// directories. Returns the number of files written.
    pub fn copy_tree(
        &mut self,
        from: &NormalizedPath,
        to: &NormalizedPath,
        overwrite: bool,
        now: DateTime<Utc>,
    ) -> Result<(u64, Vec<Change>)> {
        let src = self.lookup(from)?;
        if !src.is_dir() {
            return Err(FsError::NotADirectory(src.path.to_path_buf()));
        }
        let src_path = src.path.clone();
        if to.key() == src_path.key() || to.is_descendant_of(&src_path) {
            return Err(FsError::invalid_path(
                to.as_str(),
                "cannot copy a directory into itself",
            ));
        }

        let mut plan: Vec<(Node, NormalizedPath)> = vec![(src.clone(), to.clone())];
        for node in self.descendants(&src_path) {
            let target = node.path.rebase(&src_path, to, self.case);
            plan.push((node.clone(), target));
        }

        for (node, target) in &plan {
            let Some(existing) = self.get(target) else {
                continue;
            };
            match (node.kind, existing.kind) {
                (FileType::Directory, FileType::Directory) => {}
                (FileType::Directory, _) => {
                    return Err(FsError::NotADirectory(existing.path.to_path_buf()))
                }
                (_, FileType::Directory) => {
                    return Err(FsError::NotAFile(existing.path.to_path_buf()))
                }
                _ if !overwrite => {
                    return Err(FsError::AlreadyExists(existing.path.to_path_buf()))
                }
                _ if existing.is_readonly() => {
                    return Err(FsError::AccessDenied(existing.path.to_path_buf()))
                }
                _ => {}
            }
        }

        let mut files = 0;
        let mut changes = Vec::with_capacity(plan.len());
        for (source, target) in plan {
            let stored = self.canonical(&target);
            let existed = self.contains(&stored);
            if source.is_dir() {
                if existed {
                    continue;
                }
                let mut node = Node::directory(stored.clone(), now);
                node.attributes = source.attributes;
                self.nodes.insert(stored.key().to_string(), node);
            } else {
                let mut node = Node::file(stored.clone(), source.content, now);
                node.attributes = source.attributes;
                node.times.modified = source.times.modified;
                self.nodes.insert(stored.key().to_string(), node);
                files += 1;
            }
            self.touch_parent(&stored, now);
            changes.push(if existed {
                Change::changed(stored, source.kind)
            } else {
                Change::created(stored, source.kind)
            });
        }
        Ok((files, changes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::path::PathNormalizer;
    use crate::error::ErrorKind;
    use crate::watch::ChangeKind;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn p(s: &str) -> NormalizedPath {
        PathNormalizer::default()
            .normalize(s, &NormalizedPath::root())
            .unwrap()
    }

    fn store() -> NodeStore {
        NodeStore::new(CaseSensitivity::Insensitive, now())
    }

    fn add_dir(store: &mut NodeStore, s: &str) {
        let missing = store.missing_chain(&p(s)).unwrap();
        store.create_chain(missing, now());
    }

    fn add_file(store: &mut NodeStore, s: &str, content: &[u8]) {
        let path = p(s);
        let (parent, _) = store.ensure_parent(&path, true, now()).unwrap();
        let name = path.file_name().unwrap().to_string();
        let node = Node::file(parent.child(&name, store.case), content.to_vec(), now());
        store.insert(node, true).unwrap();
    }

    #[test]
    fn test_root_exists() {
        let s = store();
        assert!(s.lookup(&NormalizedPath::root()).unwrap().is_dir());
        assert_eq!(s.roots().len(), 1);
    }

    #[test]
    fn test_insert_rejects_duplicate() {
        let mut s = store();
        add_file(&mut s, "/a.txt", b"x");
        let dup = Node::file(p("/A.TXT"), Vec::new(), now());
        assert_eq!(s.insert(dup, false).unwrap_err().kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_lookup_missing() {
        let s = store();
        assert_eq!(s.lookup(&p("/nope")).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_ensure_parent_policies() {
        let mut s = store();
        let err = s.ensure_parent(&p("/x/y/z.txt"), false, now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!s.contains(&p("/x")));

        let (parent, changes) = s.ensure_parent(&p("/x/y/z.txt"), true, now()).unwrap();
        assert_eq!(parent.as_str(), "/x/y");
        assert_eq!(changes.len(), 2);
        assert!(s.lookup(&p("/x")).unwrap().is_dir());
    }

    #[test]
    fn test_file_in_path_is_not_a_directory() {
        let mut s = store();
        add_file(&mut s, "/a/b.txt", b"x");
        let err = s.ensure_parent(&p("/a/b.txt/c"), true, now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotADirectory);

        let err = s.lookup(&p("/a/b.txt/c/d")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotADirectory);
        let err = s.lookup_mut(&p("/a/b.txt/c")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotADirectory);
        assert_eq!(s.lookup(&p("/a/missing/c")).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_canonical_keeps_existing_spelling() {
        let mut s = store();
        add_dir(&mut s, "/Docs/Api");
        assert_eq!(s.canonical(&p("/docs/api/new.md")).as_str(), "/Docs/Api/new.md");
    }

    #[test]
    fn test_children_and_descendants() {
        let mut s = store();
        add_file(&mut s, "/a/1.txt", b"");
        add_file(&mut s, "/a/sub/2.txt", b"");
        add_file(&mut s, "/ab/3.txt", b"");

        let children: Vec<&str> = s
            .children(&p("/a"))
            .iter()
            .map(|n| n.path.as_str())
            .collect();
        assert_eq!(children, vec!["/a/1.txt", "/a/sub"]);
        assert_eq!(s.descendants(&p("/a")).len(), 3);
        assert!(s.has_children(&p("/a/sub")));
        assert!(!s.has_children(&p("/a/1.txt")));
    }

    #[test]
    fn test_remove_non_recursive_fails_on_populated() {
        let mut s = store();
        add_file(&mut s, "/a/b.txt", b"x");
        let err = s.remove(&p("/a"), false, now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DirectoryNotEmpty);
        assert!(s.contains(&p("/a/b.txt")));
    }

    #[test]
    fn test_remove_recursive_orders_children_first() {
        let mut s = store();
        add_file(&mut s, "/a/b/c.txt", b"x");
        let changes = s.remove(&p("/a"), true, now()).unwrap();
        let order: Vec<&str> = changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(order, vec!["/a/b/c.txt", "/a/b", "/a"]);
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_remove_blocked_by_readonly_descendant_is_atomic() {
        let mut s = store();
        add_file(&mut s, "/a/keep.txt", b"x");
        add_file(&mut s, "/a/other.txt", b"y");
        s.get_mut(&p("/a/keep.txt")).unwrap().attributes.readonly = true;

        let err = s.remove(&p("/a"), true, now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
        assert!(s.contains(&p("/a/other.txt")));
        assert!(s.contains(&p("/a/keep.txt")));
    }

    #[test]
    fn test_remove_root_denied() {
        let mut s = store();
        let err = s.remove(&NormalizedPath::root(), true, now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
    }

    #[test]
    fn test_relocate_moves_subtree() {
        let mut s = store();
        add_file(&mut s, "/a/b/c.txt", b"c");
        add_file(&mut s, "/a/d.txt", b"d");
        add_dir(&mut s, "/z");

        let changes = s.relocate(&p("/a"), &p("/z/a2"), false, now()).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Renamed);

        assert!(!s.contains(&p("/a")));
        assert!(s.descendants(&NormalizedPath::root()).iter().all(|n| !n.path.as_str().starts_with("/a/")));
        assert_eq!(s.lookup(&p("/z/a2/b/c.txt")).unwrap().content, b"c");
        assert_eq!(s.lookup(&p("/z/a2/d.txt")).unwrap().content, b"d");
    }

    #[test]
    fn test_relocate_conflicts() {
        let mut s = store();
        add_file(&mut s, "/a.txt", b"a");
        add_file(&mut s, "/b.txt", b"b");
        add_dir(&mut s, "/d");

        let err = s.relocate(&p("/a.txt"), &p("/b.txt"), false, now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);

        let err = s.relocate(&p("/d"), &p("/d/inner"), false, now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPath);

        s.relocate(&p("/a.txt"), &p("/b.txt"), true, now()).unwrap();
        assert_eq!(s.lookup(&p("/b.txt")).unwrap().content, b"a");
        assert!(!s.contains(&p("/a.txt")));
    }

    #[test]
    fn test_relocate_case_only_rename() {
        let mut s = store();
        add_file(&mut s, "/readme.md", b"");
        s.relocate(&p("/readme.md"), &p("/README.md"), false, now()).unwrap();
        assert_eq!(s.lookup(&p("/readme.md")).unwrap().path.as_str(), "/README.md");
    }

    #[test]
    fn test_copy_file_overwrite_rules() {
        let mut s = store();
        add_file(&mut s, "/a.txt", b"a");
        add_file(&mut s, "/b.txt", b"b");

        let err = s.copy_file(&p("/a.txt"), &p("/b.txt"), false, now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(s.lookup(&p("/b.txt")).unwrap().content, b"b");

        let (n, changes) = s.copy_file(&p("/a.txt"), &p("/b.txt"), true, now()).unwrap();
        assert_eq!(n, 1);
        assert_eq!(changes[0].kind, ChangeKind::Changed);
        assert_eq!(s.lookup(&p("/b.txt")).unwrap().content, b"a");
    }

    #[test]
    fn test_copy_tree_validates_before_writing() {
        let mut s = store();
        add_file(&mut s, "/src/one.txt", b"1");
        add_file(&mut s, "/src/two.txt", b"2");
        add_file(&mut s, "/dst/two.txt", b"old");

        let err = s.copy_tree(&p("/src"), &p("/dst"), false, now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert!(!s.contains(&p("/dst/one.txt")));

        let (files, _) = s.copy_tree(&p("/src"), &p("/dst"), true, now()).unwrap();
        assert_eq!(files, 2);
        assert_eq!(s.lookup(&p("/dst/two.txt")).unwrap().content, b"2");
        assert_eq!(s.lookup(&p("/src/one.txt")).unwrap().content, b"1");
    }
}
