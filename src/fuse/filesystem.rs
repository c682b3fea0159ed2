//! Filesystem state shared by the kernel callbacks

use crate::dispatcher::Dispatcher;
use crate::error::FsError;
use crate::fuse::attributes::AttributeManager;
use crate::fuse::inodes::{InodeTable, child_path};
use anyhow::{Context, Result};
use fuser::{FileAttr, MountOption};
use libc::c_int;
use log::info;
use std::ffi::OsStr;
use std::time::Duration;

/// How long the kernel may cache attributes and entries.
pub(crate) const ATTR_TTL: Duration = Duration::from_secs(1);

pub struct IotFuse {
    dispatcher: Dispatcher,
    inodes: InodeTable,
}

impl IotFuse {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            inodes: InodeTable::new(),
        }
    }

    pub(crate) fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub(crate) fn inodes(&mut self) -> &mut InodeTable {
        &mut self.inodes
    }

    pub(crate) fn path_of(&self, ino: u64) -> Result<String, c_int> {
        self.inodes
            .path(ino)
            .map(str::to_string)
            .ok_or(libc::ENOENT)
    }

    pub(crate) fn entry_path(&self, parent: u64, name: &OsStr) -> Result<String, c_int> {
        let parent = self.path_of(parent)?;
        Ok(child_path(&parent, &name.to_string_lossy()))
    }

    /// Attributes of `path`, assigning it an inode if it has none yet.
    pub(crate) fn attr_of(&mut self, path: &str) -> Result<FileAttr, c_int> {
        let attr = self.dispatcher.getattr(path).map_err(|e: FsError| e.errno())?;
        let ino = self.inodes.ino(path);
        Ok(AttributeManager::node_to_file_attr(ino, &attr))
    }
}

/// Mount `fs` at `mountpoint`, blocking until it is unmounted.
pub fn mount(fs: IotFuse, mountpoint: &str) -> Result<()> {
    let options = vec![
        MountOption::RW,
        MountOption::FSName("iot-fuse".to_string()),
        MountOption::NoSuid,
        MountOption::NoDev,
        MountOption::NoExec,
        MountOption::NoAtime,
    ];

    info!("Mounting IoT filesystem at: {}", mountpoint);
    fuser::mount2(fs, mountpoint, &options)
        .with_context(|| format!("Failed to mount filesystem at {}", mountpoint))?;
    Ok(())
}
