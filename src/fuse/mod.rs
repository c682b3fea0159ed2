//! Filesystem driver binding
//!
//! Translates inode-based kernel callbacks into path-based dispatcher calls.

pub mod attributes;
pub mod filesystem;
pub mod inodes;
pub mod operations;

pub use filesystem::{IotFuse, mount};
