//! Inode numbers for tree paths

use std::collections::{HashMap, HashSet};

pub const ROOT_INO: u64 = fuser::FUSE_ROOT_ID;

/// Join a directory path and an entry name.
pub fn child_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Parent directory of an absolute path; the root is its own parent.
pub fn parent_path(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(pos) => &path[..pos],
    }
}

/// Stable path ↔ inode assignment. Numbers are handed out on first sight
/// and dropped when the path is removed.
pub struct InodeTable {
    paths: HashMap<u64, String>,
    inodes: HashMap<String, u64>,
    next_ino: u64,
}

impl InodeTable {
    pub fn new() -> Self {
        let mut table = Self {
            paths: HashMap::new(),
            inodes: HashMap::new(),
            next_ino: ROOT_INO + 1,
        };
        table.paths.insert(ROOT_INO, "/".to_string());
        table.inodes.insert("/".to_string(), ROOT_INO);
        table
    }

    pub fn path(&self, ino: u64) -> Option<&str> {
        self.paths.get(&ino).map(String::as_str)
    }

    pub fn ino(&mut self, path: &str) -> u64 {
        if let Some(ino) = self.inodes.get(path) {
            return *ino;
        }
        let ino = self.next_ino;
        self.next_ino += 1;
        self.paths.insert(ino, path.to_string());
        self.inodes.insert(path.to_string(), ino);
        ino
    }

    /// Forget `path` and everything below it.
    pub fn forget_path(&mut self, path: &str) {
        let prefix = format!("{}/", path);
        let removed: Vec<String> = self
            .inodes
            .keys()
            .filter(|candidate| *candidate == path || candidate.starts_with(&prefix))
            .cloned()
            .collect();
        for candidate in removed {
            if let Some(ino) = self.inodes.remove(&candidate) {
                self.paths.remove(&ino);
            }
        }
    }

    /// Forget every child of `dir` (with its subtree) not named in `listed`.
    pub fn forget_unlisted_children(&mut self, dir: &str, listed: &HashSet<&str>) {
        let stale: Vec<String> = self
            .inodes
            .keys()
            .filter(|candidate| {
                candidate.as_str() != "/"
                    && parent_path(candidate) == dir
                    && candidate
                        .rsplit('/')
                        .next()
                        .is_some_and(|name| !listed.contains(name))
            })
            .cloned()
            .collect();
        for path in stale {
            self.forget_path(&path);
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}
