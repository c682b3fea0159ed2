//! AWS IoT catalog exposed as a file tree
//!
//! Things, policies, certificates, rules and topics appear as directories;
//! their attributes and documents as files; relationships between them as
//! symbolic links whose creation and removal attach and detach remotely.

pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod fuse;
pub mod transport;
pub mod vfs;
