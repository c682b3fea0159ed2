//! In-memory node tree mirroring the resource catalog

pub mod cache;
pub mod directories;
pub mod leaves;
pub mod links;
pub mod node;
pub mod remote;
pub mod resolver;
pub mod tree;

pub use cache::{CachePolicy, Freshness};
pub use directories::DirRole;
pub use leaves::{DocumentSource, Leaf};
pub use node::{Lineage, Node, NodeAttr, NodeKind, NodeType, reconcile_children};
pub use remote::Remote;
pub use resolver::{MAX_DEPTH, resolve};
pub use tree::{IotTree, TreeContext, TreeOptions};
