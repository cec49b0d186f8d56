pub mod ssa;

pub use ssa::StaticSingleAssignment;
