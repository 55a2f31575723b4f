pub mod bbox;
pub mod triangle;
pub mod vector;

pub use bbox::Aabb;
pub use triangle::Triangle;
pub use vector::{vec3, Vec3};
