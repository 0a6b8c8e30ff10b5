// Domain layer: enrollment models and collaborator ports. No dependencies
// on the concurrency or adapter layers.

pub mod model;
pub mod ports;
