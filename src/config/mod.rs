#[cfg(feature = "cli")]
pub mod cli;
pub mod scenario;
pub mod settings;

#[cfg(feature = "cli")]
pub use cli::CliConfig;
pub use scenario::{OperationSpec, ScenarioConfig};
pub use settings::EngineSettings;
