pub mod build;
pub mod node;

pub use build::build;
pub use node::{Bvh, BvhInternal, BvhLeaf, NodeRef};
