// Adapters layer: concrete implementations of the collaborator ports.

pub mod audit;
pub mod memory;
