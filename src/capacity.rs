//! Fixed traversal stack/queue capacity. Chosen to live in fast
//! per-worker memory on the GPU target this core is modeled after; values
//! outside {32, 64, 128, 256, 512, 1024} are a caller error.

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalCapacity {
    C32,
    C64,
    C128,
    C256,
    C512,
    C1024,
}

impl TraversalCapacity {
    pub fn as_usize(self) -> usize {
        match self {
            TraversalCapacity::C32 => 32,
            TraversalCapacity::C64 => 64,
            TraversalCapacity::C128 => 128,
            TraversalCapacity::C256 => 256,
            TraversalCapacity::C512 => 512,
            TraversalCapacity::C1024 => 1024,
        }
    }
}

impl TryFrom<usize> for TraversalCapacity {
    type Error = CoreError;

    fn try_from(value: usize) -> Result<Self, CoreError> {
        match value {
            32 => Ok(TraversalCapacity::C32),
            64 => Ok(TraversalCapacity::C64),
            128 => Ok(TraversalCapacity::C128),
            256 => Ok(TraversalCapacity::C256),
            512 => Ok(TraversalCapacity::C512),
            1024 => Ok(TraversalCapacity::C1024),
            other => Err(CoreError::InvalidCapacity(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_values_outside_the_allowed_set() {
        assert_eq!(TraversalCapacity::try_from(100), Err(CoreError::InvalidCapacity(100)));
    }

    #[test]
    fn accepts_every_allowed_value() {
        for &v in &[32, 64, 128, 256, 512, 1024] {
            assert_eq!(TraversalCapacity::try_from(v).unwrap().as_usize(), v);
        }
    }
}
