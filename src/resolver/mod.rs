//! Build-order resolution.
//!
//! [`sort`] turns a template graph into a [`BuildOrder`] where every
//! dependency precedes its dependents, and rejects graphs that are not
//! acyclic. [`hierarchy`] derives the nested view used by `soldeploy tree`.

mod build_order;
mod hierarchy;

pub use build_order::{BuildOrder, sort};
pub use hierarchy::{HierarchyNode, hierarchy, render_tree};
