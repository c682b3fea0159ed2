//! Node attributes as kernel file attributes

use crate::vfs::{NodeAttr, NodeType};
use fuser::{FileAttr, FileType};
use std::time::SystemTime;

pub struct AttributeManager;

impl AttributeManager {
    pub fn file_type(kind: NodeType) -> FileType {
        match kind {
            NodeType::Directory => FileType::Directory,
            NodeType::File => FileType::RegularFile,
            NodeType::Symlink => FileType::Symlink,
        }
    }

    /// Ownership is always the mounting user.
    pub fn node_to_file_attr(ino: u64, attr: &NodeAttr) -> FileAttr {
        let now = SystemTime::now();
        // SAFETY: getuid and getgid cannot fail and touch no memory.
        let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };

        FileAttr {
            ino,
            size: attr.size,
            blocks: attr.size.div_ceil(512),
            atime: now,
            mtime: attr.created,
            ctime: attr.created,
            crtime: attr.created,
            kind: Self::file_type(attr.kind),
            perm: attr.perm,
            nlink: if attr.kind == NodeType::Directory { 2 } else { 1 },
            uid,
            gid,
            rdev: 0,
            flags: 0,
            blksize: 512,
        }
    }
}
