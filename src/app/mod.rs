pub mod scenario;

pub use scenario::{OperationResult, ScenarioRunner};
