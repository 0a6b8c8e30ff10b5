use crate::adapters::audit::TracingAuditSink;
use crate::adapters::memory::{
    InMemoryEnrollmentStore, InMemorySectionCatalog, InMemoryStudentDirectory,
};
use crate::config::{OperationSpec, ScenarioConfig};
use crate::core::engine::EnrollmentEngine;
use crate::core::roster::RosterQueries;
use crate::domain::model::{SectionId, Student, StudentId};
use crate::utils::error::{ErrorSeverity, Result};
use crate::utils::monitor::SystemMonitor;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// 單一操作的執行結果
#[derive(Debug, Clone)]
pub struct OperationResult {
    pub label: String,
    pub outcome: serde_json::Value,
    pub duration: std::time::Duration,
    pub error: Option<String>,
}

impl OperationResult {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// 情境執行器，依序把設定檔裡的操作送進註冊引擎
///
/// 個別操作失敗（額滿、重複選課等）會被記錄下來並繼續執行，
/// 讓一份情境檔可以同時演示成功與被拒絕的流程。
pub struct ScenarioRunner {
    execution_id: String,
    operations: Vec<OperationSpec>,
    section_ids: Vec<SectionId>,
    engine: EnrollmentEngine<
        InMemoryStudentDirectory,
        InMemorySectionCatalog,
        InMemoryEnrollmentStore,
        TracingAuditSink,
    >,
    roster: RosterQueries<InMemorySectionCatalog, InMemoryEnrollmentStore>,
    monitor: Option<SystemMonitor>,
    monitor_enabled: bool,
}

impl ScenarioRunner {
    /// 依設定檔建立執行器並植入學生與開課資料
    pub async fn from_config(config: &ScenarioConfig, execution_id: String) -> Self {
        let directory = InMemoryStudentDirectory::new();
        let catalog = InMemorySectionCatalog::new();
        let store = InMemoryEnrollmentStore::new();

        for seed in &config.students {
            directory
                .add_student(Student {
                    id: StudentId::new(seed.id.as_str()),
                    name: seed.name.clone(),
                    active: seed.active.unwrap_or(true),
                })
                .await;
        }

        let mut section_ids = Vec::with_capacity(config.sections.len());
        for seed in &config.sections {
            let section = crate::domain::model::Section::new(
                seed.id.as_str(),
                seed.course.as_str(),
                seed.max_capacity,
            );
            section_ids.push(section.id.clone());
            catalog.add_section(section).await;
        }

        let engine = EnrollmentEngine::new(
            directory,
            catalog.clone(),
            store.clone(),
            TracingAuditSink::new(),
        )
        .with_settings(config.engine_settings());

        Self {
            execution_id,
            operations: config.operations.clone(),
            section_ids,
            engine,
            roster: RosterQueries::new(catalog, store),
            monitor: None,
            monitor_enabled: false,
        }
    }

    /// 啟用或禁用系統監控
    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitor_enabled = enabled;
        if enabled {
            self.monitor = Some(SystemMonitor::new(enabled));
        }
        self
    }

    /// 依序執行所有操作
    ///
    /// 被引擎拒絕的操作（額滿、重複選課等）進入 `error` 欄位而不中斷整批；
    /// 儲存層故障會中止剩下的操作並回傳錯誤。
    pub async fn execute_all(&mut self) -> Result<Vec<OperationResult>> {
        let mut results = Vec::with_capacity(self.operations.len());

        if self.monitor_enabled {
            if let Some(monitor) = &self.monitor {
                monitor.log_stats("Scenario execution started.");
            }
        }

        tracing::info!(
            "🎬 Executing scenario {} ({} operations)",
            self.execution_id,
            self.operations.len()
        );

        for spec in &self.operations {
            let label = spec.label();
            let start_time = Instant::now();

            let result = match self.execute_operation(spec).await {
                Ok(outcome) => {
                    let duration = start_time.elapsed();
                    tracing::info!("✅ Operation completed: {} ({:?})", label, duration);
                    OperationResult {
                        label,
                        outcome,
                        duration,
                        error: None,
                    }
                }
                Err(e) if e.severity() == ErrorSeverity::Critical => {
                    tracing::error!("❌ Scenario aborted at '{}': {}", label, e);
                    return Err(e);
                }
                Err(e) => {
                    let duration = start_time.elapsed();
                    tracing::error!("❌ Operation failed: {} ({})", label, e);
                    OperationResult {
                        label,
                        outcome: serde_json::Value::Null,
                        duration,
                        error: Some(e.to_string()),
                    }
                }
            };
            results.push(result);
        }

        if self.monitor_enabled {
            if let Some(monitor) = &self.monitor {
                monitor.log_stats("Scenario execution completed.");
                monitor.log_final_stats();
            }
        }

        Ok(results)
    }

    async fn execute_operation(&self, spec: &OperationSpec) -> Result<serde_json::Value> {
        match spec {
            OperationSpec::Enroll { student, section } => {
                let enrollment = self
                    .engine
                    .enroll(StudentId::new(student.as_str()), SectionId::new(section.as_str()))
                    .await?;
                Ok(serde_json::to_value(&enrollment)?)
            }
            OperationSpec::Drop { student, section } => {
                let outcome = self
                    .engine
                    .drop_enrollment(
                        StudentId::new(student.as_str()),
                        SectionId::new(section.as_str()),
                    )
                    .await?;
                Ok(serde_json::to_value(&outcome)?)
            }
            OperationSpec::LeaveWaitlist { student, section } => {
                let departed = self
                    .engine
                    .leave_waitlist(
                        StudentId::new(student.as_str()),
                        SectionId::new(section.as_str()),
                    )
                    .await?;
                Ok(serde_json::to_value(&departed)?)
            }
            OperationSpec::Transfer { student, from, to } => {
                let outcome = self
                    .engine
                    .transfer(
                        StudentId::new(student.as_str()),
                        SectionId::new(from.as_str()),
                        SectionId::new(to.as_str()),
                    )
                    .await?;
                Ok(serde_json::to_value(&outcome)?)
            }
            OperationSpec::BulkEnroll {
                section,
                students,
                deadline_ms,
            } => {
                let ids = students
                    .iter()
                    .map(|id| StudentId::new(id.as_str()))
                    .collect();
                let report = self
                    .engine
                    .bulk_enroll(
                        SectionId::new(section.as_str()),
                        ids,
                        deadline_ms.map(Duration::from_millis),
                    )
                    .await;
                Ok(serde_json::to_value(&report)?)
            }
            OperationSpec::Promote { section } => {
                let promoted = self
                    .engine
                    .promote_next(SectionId::new(section.as_str()))
                    .await?;
                Ok(serde_json::to_value(&promoted)?)
            }
            OperationSpec::Validate { student, section } => {
                let report = self
                    .engine
                    .validate(
                        StudentId::new(student.as_str()),
                        SectionId::new(section.as_str()),
                    )
                    .await?;
                Ok(serde_json::to_value(&report)?)
            }
        }
    }

    /// 獲取執行摘要
    pub fn execution_summary(results: &[OperationResult]) -> HashMap<String, serde_json::Value> {
        let mut summary = HashMap::new();

        let total_operations = results.len();
        let succeeded = results.iter().filter(|r| r.succeeded()).count();
        let failed = total_operations - succeeded;
        let total_duration: std::time::Duration = results.iter().map(|r| r.duration).sum();

        summary.insert(
            "total_operations".to_string(),
            serde_json::Value::Number(total_operations.into()),
        );
        summary.insert(
            "succeeded".to_string(),
            serde_json::Value::Number(succeeded.into()),
        );
        summary.insert(
            "failed".to_string(),
            serde_json::Value::Number(failed.into()),
        );
        summary.insert(
            "total_duration_ms".to_string(),
            serde_json::Value::Number((total_duration.as_millis() as u64).into()),
        );

        let labels: Vec<serde_json::Value> = results
            .iter()
            .map(|r| serde_json::Value::String(r.label.clone()))
            .collect();
        summary.insert(
            "executed_operations".to_string(),
            serde_json::Value::Array(labels),
        );

        summary
    }

    /// 每個開課班次的期末狀態：名單、候補與剩餘座位
    pub async fn section_report(&self) -> Result<Vec<serde_json::Value>> {
        let mut report = Vec::with_capacity(self.section_ids.len());

        for section_id in &self.section_ids {
            let sections = self.roster.get_roster(section_id).await?;
            let waitlist = self.roster.get_waitlist(section_id).await?;

            let roster: Vec<serde_json::Value> = sections
                .iter()
                .map(|e| serde_json::Value::String(e.student_id.to_string()))
                .collect();
            let waiting: Vec<serde_json::Value> = waitlist
                .iter()
                .map(|e| {
                    let mut entry = serde_json::Map::new();
                    entry.insert(
                        "student".to_string(),
                        serde_json::Value::String(e.student_id.to_string()),
                    );
                    entry.insert(
                        "position".to_string(),
                        serde_json::Value::Number(e.waitlist_position.unwrap_or(0).into()),
                    );
                    serde_json::Value::Object(entry)
                })
                .collect();

            let mut entry = serde_json::Map::new();
            entry.insert(
                "section".to_string(),
                serde_json::Value::String(section_id.to_string()),
            );
            entry.insert("roster".to_string(), serde_json::Value::Array(roster));
            entry.insert("waitlist".to_string(), serde_json::Value::Array(waiting));
            report.push(serde_json::Value::Object(entry));
        }

        Ok(report)
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }
}
