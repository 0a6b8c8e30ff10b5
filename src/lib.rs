pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use app::ScenarioRunner;
pub use config::{EngineSettings, ScenarioConfig};
pub use core::{engine::EnrollmentEngine, roster::RosterQueries};
pub use utils::error::{RegistrarError, Result};
