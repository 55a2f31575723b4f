pub mod march;
pub mod topology;

pub use march::{march, MarchConfig, MarchSample};
pub use topology::{TetraTopology, Tetrahedron};
