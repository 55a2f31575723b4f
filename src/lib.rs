//! Batched LBVH spatial queries and tetrahedral ray marching.
//!
//! Three operations, executed per batch element over a `rayon` parallel
//! iterator standing in for the GPU SIMT workers the algorithms below were
//! designed for:
//!
//! - Nearest-surface query over a triangle mesh (`orchestrator::QueryOrchestrator::query_points`).
//! - Ray-mesh intersection, nearest hit (`orchestrator::QueryOrchestrator::query_rays`).
//! - Tetrahedral ray marching over a volumetric mesh (`orchestrator::QueryOrchestrator::march_rays`).
//!
//! Construction and traversal use a `rayon` + `rdst` + `AtomicU32`
//! lockless-construction idiom: a batched Karras-radix-tree LBVH with a
//! fixed-capacity stack or best-first traversal, plus a tetrahedral ray
//! marcher over face-adjacency topology.

pub mod capacity;
pub mod error;
pub mod geometry;
pub mod lbvh;
pub mod morton;
pub mod orchestrator;
pub mod query_result;
pub mod tetra;
pub mod traversal;

pub use capacity::TraversalCapacity;
pub use error::CoreError;
pub use geometry::{vec3, Aabb, Triangle, Vec3};
pub use lbvh::{build, Bvh, BvhInternal, BvhLeaf, NodeRef};
pub use orchestrator::{BuildConfig, QueryOrchestrator, Ray, TraversalVariant};
pub use query_result::QueryResult;
pub use tetra::{march, MarchConfig, MarchSample, TetraTopology, Tetrahedron};
