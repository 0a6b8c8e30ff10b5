use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "section-registrar")]
#[command(about = "Section-capacity enrollment engine with a TOML scenario runner")]
pub struct CliConfig {
    #[arg(long, help = "Scenario TOML file; runs the built-in sample when omitted")]
    pub scenario: Option<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log system resource usage while running")]
    pub monitor: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        if let Some(path) = &self.scenario {
            validation::validate_path("scenario", path)?;
            validation::validate_file_extensions("scenario", &[path.clone()], &["toml"])?;
        }
        Ok(())
    }
}
