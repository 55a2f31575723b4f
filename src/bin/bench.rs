//! Benchmark binary: LBVH construction and traversal timings over
//! synthetic meshes of increasing size.
//!
//! `Instant`-based per-phase timing struct with `AddAssign`/`DivAssign`
//! for averaging over repeated runs and a `.display()` pretty-printer,
//! fed by `rand_pcg`-seeded synthetic triangle soups since this crate has
//! no mesh-loading stage of its own.

use std::ops::{AddAssign, DivAssign};
use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

use lbvh_query::geometry::vec3;
use lbvh_query::{build, Triangle};

fn synthetic_mesh(n: usize, seed: u64) -> Vec<Triangle> {
    let mut rng = Pcg64::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let base = vec3(rng.gen_range(-50.0..50.0), rng.gen_range(-50.0..50.0), rng.gen_range(-50.0..50.0));
            Triangle::new(base, base + vec3(1.0, 0.0, 0.0), base + vec3(0.0, 1.0, 0.0))
        })
        .collect()
}

#[derive(Debug, Copy, Clone, Default)]
struct BvhBenchTiming {
    build: Duration,
    query_stack: Duration,
    query_best_first: Duration,
}

impl BvhBenchTiming {
    fn total(&self) -> Duration {
        self.build + self.query_stack + self.query_best_first
    }

    fn display(&self, text: &str) -> Self {
        println!("{text}");
        println!("  build:       {:?}", self.build);
        println!("  stack:       {:?}", self.query_stack);
        println!("  best_first:  {:?}", self.query_best_first);
        println!("  total:       {:?}", self.total());
        *self
    }
}

impl AddAssign<BvhBenchTiming> for BvhBenchTiming {
    fn add_assign(&mut self, rhs: Self) {
        self.build += rhs.build;
        self.query_stack += rhs.query_stack;
        self.query_best_first += rhs.query_best_first;
    }
}

impl DivAssign<u32> for BvhBenchTiming {
    fn div_assign(&mut self, rhs: u32) {
        self.build /= rhs;
        self.query_stack /= rhs;
        self.query_best_first /= rhs;
    }
}

fn run(triangle_count: usize, query_count: usize, runs: u32) -> BvhBenchTiming {
    use lbvh_query::traversal::{best_first, stack};

    let mesh = synthetic_mesh(triangle_count, 42);
    let queries: Vec<_> = synthetic_mesh(query_count, 7).iter().map(Triangle::centroid).collect();

    let mut total = BvhBenchTiming::default();
    for _ in 0..runs {
        let timer = Instant::now();
        let bvh = build(&mesh).expect("build should not fail for a non-empty mesh");
        let build_time = timer.elapsed();

        let timer = Instant::now();
        for &q in &queries {
            let _ = stack::nearest_point::<64>(&bvh, &mesh, q);
        }
        let stack_time = timer.elapsed();

        let timer = Instant::now();
        for &q in &queries {
            let _ = best_first::nearest_point::<64>(&bvh, &mesh, q);
        }
        let best_first_time = timer.elapsed();

        total += BvhBenchTiming { build: build_time, query_stack: stack_time, query_best_first: best_first_time };
    }
    total /= runs;
    total
}

fn main() {
    env_logger::init();

    let runs = 20;
    println!("Benchmarking with {runs} samples.\n");

    run(1_000, 500, runs).display("LBVH: 1,000 triangles, 500 queries");
    run(10_000, 500, runs).display("LBVH: 10,000 triangles, 500 queries");
    run(100_000, 500, runs).display("LBVH: 100,000 triangles, 500 queries");

    println!("\nAll done.");
}
