//! Kernel callbacks forwarded to the dispatcher

use crate::fuse::attributes::AttributeManager;
use crate::fuse::filesystem::{ATTR_TTL, IotFuse};
use crate::fuse::inodes::{child_path, parent_path};
use fuser::consts::FOPEN_DIRECT_IO;
use fuser::{
    FileType, Filesystem, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory, ReplyEmpty,
    ReplyEntry, ReplyOpen, ReplyWrite, Request, TimeOrNow,
};
use log::debug;
use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::Path;
use std::time::SystemTime;

macro_rules! try_reply {
    ($reply:expr, $result:expr) => {
        match $result {
            Ok(value) => value,
            Err(errno) => {
                $reply.error(errno);
                return;
            }
        }
    };
}

impl IotFuse {
    /// Reply with the entry at `path` once an operation created it.
    fn reply_new_entry(&mut self, path: &str, reply: ReplyEntry) {
        match self.attr_of(path) {
            Ok(attr) => reply.entry(&ATTR_TTL, &attr, 0),
            Err(errno) => reply.error(errno),
        }
    }
}

impl Filesystem for IotFuse {
    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        debug!("LOOKUP: parent={}, name={}", parent, name.to_string_lossy());
        let path = try_reply!(reply, self.entry_path(parent, name));
        match self.attr_of(&path) {
            Ok(attr) => reply.entry(&ATTR_TTL, &attr, 0),
            Err(errno) => reply.error(errno),
        }
    }

    fn forget(&mut self, _req: &Request, ino: u64, _nlookup: u64) {
        debug!("FORGET: ino={}", ino);
    }

    fn getattr(&mut self, _req: &Request, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        debug!("GETATTR: ino={}", ino);
        let path = try_reply!(reply, self.path_of(ino));
        match self.attr_of(&path) {
            Ok(attr) => reply.attr(&ATTR_TTL, &attr),
            Err(errno) => reply.error(errno),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        debug!("SETATTR: ino={}, size={:?}", ino, size);
        let path = try_reply!(reply, self.path_of(ino));
        if let Some(size) = size {
            try_reply!(
                reply,
                self.dispatcher().truncate(&path, size).map_err(|e| e.errno())
            );
        }
        match self.attr_of(&path) {
            Ok(attr) => reply.attr(&ATTR_TTL, &attr),
            Err(errno) => reply.error(errno),
        }
    }

    fn readlink(&mut self, _req: &Request, ino: u64, reply: ReplyData) {
        debug!("READLINK: ino={}", ino);
        let path = try_reply!(reply, self.path_of(ino));
        match self.dispatcher().readlink(&path) {
            Ok(target) => reply.data(target.as_bytes()),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        debug!("MKDIR: parent={}, name={}", parent, name.to_string_lossy());
        let path = try_reply!(reply, self.entry_path(parent, name));
        try_reply!(reply, self.dispatcher().mkdir(&path).map_err(|e| e.errno()));
        self.reply_new_entry(&path, reply);
    }

    fn unlink(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        debug!("UNLINK: parent={}, name={}", parent, name.to_string_lossy());
        let path = try_reply!(reply, self.entry_path(parent, name));
        match self.dispatcher().unlink(&path) {
            Ok(()) => {
                self.inodes().forget_path(&path);
                reply.ok();
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn rmdir(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        debug!("RMDIR: parent={}, name={}", parent, name.to_string_lossy());
        let path = try_reply!(reply, self.entry_path(parent, name));
        match self.dispatcher().rmdir(&path) {
            Ok(()) => {
                self.inodes().forget_path(&path);
                reply.ok();
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn symlink(
        &mut self,
        _req: &Request,
        parent: u64,
        link_name: &OsStr,
        target: &Path,
        reply: ReplyEntry,
    ) {
        debug!(
            "SYMLINK: parent={}, name={}, target={}",
            parent,
            link_name.to_string_lossy(),
            target.display()
        );
        let path = try_reply!(reply, self.entry_path(parent, link_name));
        let target = target.to_string_lossy();
        try_reply!(
            reply,
            self.dispatcher().symlink(&target, &path).map_err(|e| e.errno())
        );
        self.reply_new_entry(&path, reply);
    }

    fn open(&mut self, _req: &Request, ino: u64, _flags: i32, reply: ReplyOpen) {
        debug!("OPEN: ino={}", ino);
        let path = try_reply!(reply, self.path_of(ino));
        match self.dispatcher().open(&path) {
            // Sizes of remote documents are unknown until read.
            Ok(()) => reply.opened(0, FOPEN_DIRECT_IO),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        debug!("READ: ino={}, offset={}, size={}", ino, offset, size);
        let path = try_reply!(reply, self.path_of(ino));
        let offset = offset.max(0) as u64;
        match self.dispatcher().read(&path, offset, size as usize) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn write(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        debug!("WRITE: ino={}, offset={}, len={}", ino, offset, data.len());
        let path = try_reply!(reply, self.path_of(ino));
        let offset = offset.max(0) as u64;
        match self.dispatcher().write(&path, offset, data) {
            Ok(written) => reply.written(written as u32),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn release(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        debug!("RELEASE: ino={}", ino);
        let path = try_reply!(reply, self.path_of(ino));
        match self.dispatcher().release(&path) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        debug!("READDIR: ino={}, offset={}", ino, offset);
        let path = try_reply!(reply, self.path_of(ino));
        let children = match self.dispatcher().readdir(&path) {
            Ok(children) => children,
            Err(e) => {
                reply.error(e.errno());
                return;
            }
        };

        let listed: HashSet<&str> = children.iter().map(|(name, _)| name.as_str()).collect();
        self.inodes().forget_unlisted_children(&path, &listed);

        let parent_ino = self.inodes().ino(parent_path(&path));
        let mut entries = vec![
            (ino, FileType::Directory, ".".to_string()),
            (parent_ino, FileType::Directory, "..".to_string()),
        ];
        for (name, kind) in children {
            let child_ino = self.inodes().ino(&child_path(&path, &name));
            entries.push((child_ino, AttributeManager::file_type(kind), name));
        }

        for (i, (entry_ino, kind, name)) in entries.into_iter().enumerate().skip(offset as usize) {
            if reply.add(entry_ino, (i + 1) as i64, kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn create(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        debug!("CREATE: parent={}, name={}", parent, name.to_string_lossy());
        let path = try_reply!(reply, self.entry_path(parent, name));
        try_reply!(reply, self.dispatcher().create(&path).map_err(|e| e.errno()));
        // Directories that take no new files accept the call but leave
        // nothing behind; the lookup error is reported then.
        match self.attr_of(&path) {
            Ok(attr) if attr.kind == FileType::RegularFile => {
                reply.created(&ATTR_TTL, &attr, 0, 0, FOPEN_DIRECT_IO)
            }
            Ok(_) => reply.error(libc::EISDIR),
            Err(errno) => reply.error(errno),
        }
    }
}
