use clap::Parser;
use section_registrar::app::scenario::OperationResult;
use section_registrar::utils::{logger, validation::Validate};
use section_registrar::{CliConfig, ScenarioConfig, ScenarioRunner};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::parse();

    // 初始化日誌
    if config.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("🚀 Starting section registrar CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    // 驗證命令列參數
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    // 載入情境設定，沒有指定檔案時使用內建示範情境
    let scenario = match &config.scenario {
        Some(path) => {
            tracing::info!("📁 Loading scenario from: {}", path);
            match ScenarioConfig::from_file(path) {
                Ok(scenario) => scenario,
                Err(e) => {
                    eprintln!("❌ Failed to load scenario file '{}': {}", path, e);
                    eprintln!("💡 Make sure the file exists and is valid TOML format");
                    std::process::exit(1);
                }
            }
        }
        None => {
            tracing::info!("📋 No scenario file given, running the built-in sample");
            ScenarioConfig::sample()
        }
    };

    // 驗證情境內容
    if let Err(e) = scenario.validate() {
        tracing::error!("❌ Scenario validation failed: {}", e);
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }

    tracing::info!("✅ Scenario loaded and validated successfully");

    // 生成執行 ID
    let execution_id = format!("run_{}", chrono::Utc::now().format("%Y%m%d_%H%M%S"));

    display_scenario_summary(&scenario, &execution_id);

    // 決定監控設定
    let monitor_enabled = config.monitor || scenario.monitoring_enabled();
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    // 建立執行器並執行
    let mut runner = ScenarioRunner::from_config(&scenario, execution_id.clone())
        .await
        .with_monitoring(monitor_enabled);

    match runner.execute_all().await {
        Ok(results) => {
            display_execution_results(&results, &execution_id);

            let report = runner.section_report().await?;
            display_section_report(&report);

            let rejected = results.iter().filter(|r| !r.succeeded()).count();
            if rejected > 0 {
                println!(
                    "⚠️ {} of {} operations were rejected by the engine",
                    rejected,
                    results.len()
                );
            }
            println!("✅ Scenario completed!");
            println!("🆔 Execution ID: {}", execution_id);
        }
        Err(e) => {
            // 記錄詳細錯誤信息
            tracing::error!(
                "❌ Scenario execution failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            // 輸出用戶友好的錯誤信息
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
            let exit_code = match e.severity() {
                section_registrar::utils::error::ErrorSeverity::Low => 0, // 警告，但成功
                section_registrar::utils::error::ErrorSeverity::Medium => 2, // 重試錯誤
                section_registrar::utils::error::ErrorSeverity::High => 1, // 處理錯誤
                section_registrar::utils::error::ErrorSeverity::Critical => 3, // 系統錯誤
            };

            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn display_scenario_summary(scenario: &ScenarioConfig, execution_id: &str) {
    println!("📋 Scenario Summary:");
    println!(
        "  Name: {} v{}",
        scenario.scenario.name, scenario.scenario.version
    );
    println!("  Description: {}", scenario.scenario.description);
    println!("  Execution ID: {}", execution_id);
    println!("  Students: {}", scenario.students.len());
    println!("  Sections: {}", scenario.sections.len());
    println!();
    println!("📝 Operations:");
    for (index, operation) in scenario.operations.iter().enumerate() {
        println!("  {}. {}", index + 1, operation.label());
    }
    println!();
}

fn display_execution_results(results: &[OperationResult], execution_id: &str) {
    let succeeded = results.iter().filter(|r| r.succeeded()).count();
    let total_duration: std::time::Duration = results.iter().map(|r| r.duration).sum();

    println!();
    println!("📊 Execution Results Summary:");
    println!("  Execution ID: {}", execution_id);
    println!("  Total Operations: {}", results.len());
    println!("  Succeeded: {}", succeeded);
    println!("  Rejected: {}", results.len() - succeeded);
    println!("  Total Execution Time: {:?}", total_duration);
    println!();

    println!("📝 Operation Details:");
    for (index, result) in results.iter().enumerate() {
        let status = if result.succeeded() { "✅" } else { "❌" };
        println!(
            "  {}. {} {} ({:?})",
            index + 1,
            status,
            result.label,
            result.duration
        );
        if let Some(error) = &result.error {
            println!("     Rejected: {}", error);
        }
    }
    println!();
}

fn display_section_report(report: &[serde_json::Value]) {
    println!("🏫 Final Section State:");
    for entry in report {
        let section = entry["section"].as_str().unwrap_or("?");
        let roster: Vec<&str> = entry["roster"]
            .as_array()
            .map(|list| list.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default();
        println!("  {} - {} enrolled", section, roster.len());
        if !roster.is_empty() {
            println!("     Roster: {}", roster.join(", "));
        }
        if let Some(waitlist) = entry["waitlist"].as_array() {
            for waiting in waitlist {
                println!(
                    "     Waitlist #{}: {}",
                    waiting["position"],
                    waiting["student"].as_str().unwrap_or("?")
                );
            }
        }
    }
    println!();
}
