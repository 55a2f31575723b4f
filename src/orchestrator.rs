//! Query orchestrator: per-batch-element buffer lifecycle, optional
//! Morton-based query reordering, and dispatch into traversal.

use rayon::prelude::*;

use crate::capacity::TraversalCapacity;
use crate::error::CoreError;
use crate::geometry::{Triangle, Vec3};
use crate::lbvh::{self, Bvh};
use crate::morton;
use crate::query_result::QueryResult;
use crate::tetra::march::{self, MarchConfig, MarchSample};
use crate::tetra::topology::{TetraTopology, Tetrahedron};
use crate::traversal::{best_first, stack};

fn finite_vec3(v: Vec3) -> bool {
    v.0.is_finite() && v.1.is_finite() && v.2.is_finite()
}

fn check_triangles(triangles: &[Triangle]) -> Result<(), CoreError> {
    let ok = triangles.iter().all(|t| finite_vec3(t.v0) && finite_vec3(t.v1) && finite_vec3(t.v2));
    if ok {
        Ok(())
    } else {
        Err(CoreError::NonFiniteInput("mesh triangles"))
    }
}

fn check_points(points: &[Vec3]) -> Result<(), CoreError> {
    if points.iter().all(|&p| finite_vec3(p)) {
        Ok(())
    } else {
        Err(CoreError::NonFiniteInput("query points"))
    }
}

fn check_rays(rays: &[Ray]) -> Result<(), CoreError> {
    let ok = rays
        .iter()
        .all(|r| finite_vec3(r.origin) && finite_vec3(r.direction) && r.direction.length_squared() > 0.0);
    if ok {
        Ok(())
    } else {
        Err(CoreError::NonFiniteInput("rays"))
    }
}

/// Runtime knobs that would otherwise be compile-time environment flags.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuildConfig {
    /// Validate inputs (finite coordinates, non-zero ray directions)
    /// before dispatching a query batch.
    pub error_checking: bool,
    /// Emit `log::debug!` stage-boundary messages from the orchestrator.
    pub profiling: bool,
    /// Minimum chunk size handed to a single `rayon` worker before a
    /// query batch is split further, standing in for a GPU thread block's
    /// cooperative width.
    pub thread_block_width: u32,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self { error_checking: true, profiling: false, thread_block_width: 256 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalVariant {
    Stack,
    BestFirst,
}

/// Expands to a `match` over `TraversalCapacity` binding a `const CAP:
/// usize` so callers can index into the const-generic traversal functions
/// without hand-writing all six arms at every call site.
macro_rules! dispatch_capacity {
    ($capacity:expr, $cap_const:ident, $body:block) => {
        match $capacity {
            TraversalCapacity::C32 => {
                const $cap_const: usize = 32;
                $body
            }
            TraversalCapacity::C64 => {
                const $cap_const: usize = 64;
                $body
            }
            TraversalCapacity::C128 => {
                const $cap_const: usize = 128;
                $body
            }
            TraversalCapacity::C256 => {
                const $cap_const: usize = 256;
                $body
            }
            TraversalCapacity::C512 => {
                const $cap_const: usize = 512;
                $body
            }
            TraversalCapacity::C1024 => {
                const $cap_const: usize = 1024;
                $body
            }
        }
    };
}

/// One ray: origin + direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

pub struct QueryOrchestrator {
    pub capacity: TraversalCapacity,
    pub variant: TraversalVariant,
    /// Morton-reorder queries for warp coherence before traversal, then
    /// scatter results back. Pure performance knob — must never change
    /// results (tested below).
    pub reorder_queries: bool,
    pub config: BuildConfig,
}

impl QueryOrchestrator {
    pub fn new(capacity: TraversalCapacity, variant: TraversalVariant, reorder_queries: bool, config: BuildConfig) -> Self {
        Self { capacity, variant, reorder_queries, config }
    }

    /// Minimum chunk size for splitting a query batch across `rayon`
    /// workers; see `BuildConfig::thread_block_width`.
    fn block_width(&self) -> usize {
        self.config.thread_block_width.max(1) as usize
    }

    fn nearest_point(&self, bvh: &Bvh, triangles: &[Triangle], point: Vec3) -> QueryResult {
        dispatch_capacity!(self.capacity, CAP, {
            match self.variant {
                TraversalVariant::Stack => stack::nearest_point::<CAP>(bvh, triangles, point),
                TraversalVariant::BestFirst => best_first::nearest_point::<CAP>(bvh, triangles, point),
            }
        })
    }

    fn nearest_ray_hit(&self, bvh: &Bvh, triangles: &[Triangle], origin: Vec3, direction: Vec3) -> QueryResult {
        dispatch_capacity!(self.capacity, CAP, {
            match self.variant {
                TraversalVariant::Stack => stack::nearest_ray_hit::<CAP>(bvh, triangles, origin, direction),
                TraversalVariant::BestFirst => best_first::nearest_ray_hit::<CAP>(bvh, triangles, origin, direction),
            }
        })
    }

    /// Nearest-surface query, one batch element at a time. `triangles` and
    /// `points` must have the same outer (batch) length.
    pub fn query_points(&self, triangles: &[Vec<Triangle>], points: &[Vec<Vec3>]) -> Result<Vec<Vec<QueryResult>>, CoreError> {
        if triangles.len() != points.len() {
            return Err(CoreError::BufferLengthMismatch { expected: triangles.len(), actual: points.len() });
        }
        triangles
            .par_iter()
            .zip(points.par_iter())
            .map(|(tris, pts)| self.query_points_one(tris, pts))
            .collect()
    }

    fn query_points_one(&self, triangles: &[Triangle], points: &[Vec3]) -> Result<Vec<QueryResult>, CoreError> {
        if self.config.error_checking {
            check_triangles(triangles)?;
            check_points(points)?;
        }

        let bvh = lbvh::build(triangles)?;
        if self.config.profiling {
            log::debug!("orchestrator: built lbvh over {} triangles for point query batch element", triangles.len());
        }

        if !self.reorder_queries {
            return Ok(points
                .par_iter()
                .with_min_len(self.block_width())
                .map(|&p| self.nearest_point(&bvh, triangles, p))
                .collect());
        }

        let mut order: Vec<usize> = (0..points.len()).collect();
        order.sort_by_key(|&i| morton::encode_query_point(points[i]));

        let computed: Vec<(usize, QueryResult)> = order
            .into_par_iter()
            .with_min_len(self.block_width())
            .map(|i| (i, self.nearest_point(&bvh, triangles, points[i])))
            .collect();

        let mut results = vec![QueryResult::miss(); points.len()];
        for (original_idx, result) in computed {
            results[original_idx] = result;
        }
        Ok(results)
    }

    /// Nearest ray hit.
    pub fn query_rays(&self, triangles: &[Vec<Triangle>], rays: &[Vec<Ray>]) -> Result<Vec<Vec<QueryResult>>, CoreError> {
        if triangles.len() != rays.len() {
            return Err(CoreError::BufferLengthMismatch { expected: triangles.len(), actual: rays.len() });
        }
        triangles
            .par_iter()
            .zip(rays.par_iter())
            .map(|(tris, batch_rays)| self.query_rays_one(tris, batch_rays))
            .collect()
    }

    fn query_rays_one(&self, triangles: &[Triangle], rays: &[Ray]) -> Result<Vec<QueryResult>, CoreError> {
        if self.config.error_checking {
            check_triangles(triangles)?;
            check_rays(rays)?;
        }

        let bvh = lbvh::build(triangles)?;
        if self.config.profiling {
            log::debug!("orchestrator: built lbvh over {} triangles for ray query batch element", triangles.len());
        }

        if !self.reorder_queries {
            return Ok(rays
                .par_iter()
                .with_min_len(self.block_width())
                .map(|r| self.nearest_ray_hit(&bvh, triangles, r.origin, r.direction))
                .collect());
        }

        // Rays carry no natural [-1,1]^3 bound the way query points do;
        // reordering keys on the origin, which is where warp divergence in
        // the traversal actually originates.
        let mut order: Vec<usize> = (0..rays.len()).collect();
        order.sort_by_key(|&i| morton::encode_query_point(rays[i].origin));

        let computed: Vec<(usize, QueryResult)> = order
            .into_par_iter()
            .with_min_len(self.block_width())
            .map(|i| {
                let r = rays[i];
                (i, self.nearest_ray_hit(&bvh, triangles, r.origin, r.direction))
            })
            .collect();

        let mut results = vec![QueryResult::miss(); rays.len()];
        for (original_idx, result) in computed {
            results[original_idx] = result;
        }
        Ok(results)
    }

    /// Tetrahedral ray marching, batched the same way as the surface
    /// queries. No LBVH is built here — the marcher walks face adjacency
    /// directly.
    pub fn march_rays(
        &self,
        tetras: &[Vec<Tetrahedron>],
        topology: &[Vec<TetraTopology>],
        rays: &[Vec<Ray>],
        start_tet: &[Vec<u32>],
        start_t: &[Vec<f32>],
        march_config: &MarchConfig,
    ) -> Result<Vec<Vec<Vec<MarchSample>>>, CoreError> {
        let b = tetras.len();
        if topology.len() != b || rays.len() != b || start_tet.len() != b || start_t.len() != b {
            return Err(CoreError::BufferLengthMismatch { expected: b, actual: topology.len().min(rays.len()).min(start_tet.len()).min(start_t.len()) });
        }

        (0..b)
            .into_par_iter()
            .map(|i| {
                let element_tetras = &tetras[i];
                let element_topology = &topology[i];
                let element_rays = &rays[i];
                let element_start_tet = &start_tet[i];
                let element_start_t = &start_t[i];

                if element_rays.len() != element_start_tet.len() || element_rays.len() != element_start_t.len() {
                    return Err(CoreError::BufferLengthMismatch { expected: element_rays.len(), actual: element_start_tet.len() });
                }
                if self.config.error_checking {
                    check_rays(element_rays)?;
                }

                let per_ray: Vec<Vec<MarchSample>> = element_rays
                    .par_iter()
                    .with_min_len(self.block_width())
                    .enumerate()
                    .map(|(q, ray)| {
                        march::march(
                            element_tetras,
                            element_topology,
                            ray.origin,
                            ray.direction,
                            element_start_tet[q],
                            element_start_t[q],
                            march_config,
                        )
                    })
                    .collect();

                if self.config.profiling {
                    log::debug!("orchestrator: marched {} rays through {} tetrahedra", element_rays.len(), element_tetras.len());
                }
                Ok(per_ray)
            })
            .collect()
    }
}
