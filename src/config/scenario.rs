use crate::config::settings::EngineSettings;
use crate::utils::error::{RegistrarError, Result};
use crate::utils::validation::Validate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub scenario: ScenarioInfo,
    pub engine: Option<EngineSettings>,
    pub students: Vec<StudentSeed>,
    pub sections: Vec<SectionSeed>,
    pub operations: Vec<OperationSpec>,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioInfo {
    pub name: String,
    pub description: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentSeed {
    pub id: String,
    pub name: String,
    pub active: Option<bool>, // 預設為在學
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionSeed {
    pub id: String,
    pub course: String,
    pub max_capacity: u32,
}

/// 情境中的單一操作，依 kind 欄位區分
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum OperationSpec {
    Enroll {
        student: String,
        section: String,
    },
    Drop {
        student: String,
        section: String,
    },
    LeaveWaitlist {
        student: String,
        section: String,
    },
    Transfer {
        student: String,
        from: String,
        to: String,
    },
    BulkEnroll {
        section: String,
        students: Vec<String>,
        deadline_ms: Option<u64>,
    },
    Promote {
        section: String,
    },
    Validate {
        student: String,
        section: String,
    },
}

impl OperationSpec {
    /// 操作的簡短描述，用於日誌與結果摘要
    pub fn label(&self) -> String {
        match self {
            Self::Enroll { student, section } => format!("enroll {} -> {}", student, section),
            Self::Drop { student, section } => format!("drop {} from {}", student, section),
            Self::LeaveWaitlist { student, section } => {
                format!("leave-waitlist {} from {}", student, section)
            }
            Self::Transfer { student, from, to } => {
                format!("transfer {} from {} to {}", student, from, to)
            }
            Self::BulkEnroll {
                section, students, ..
            } => format!("bulk-enroll {} students -> {}", students.len(), section),
            Self::Promote { section } => format!("promote {}", section),
            Self::Validate { student, section } => format!("validate {} -> {}", student, section),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub log_level: Option<String>,
}

impl ScenarioConfig {
    /// 從 TOML 檔案載入情境
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(RegistrarError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析情境
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| RegistrarError::ConfigError {
            message: format!("Scenario TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${TERM_NAME})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").unwrap();

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 取得引擎設定（未指定時採用預設值）
    pub fn engine_settings(&self) -> EngineSettings {
        self.engine.clone().unwrap_or_default()
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn get_section(&self, id: &str) -> Option<&SectionSeed> {
        self.sections.iter().find(|s| s.id == id)
    }

    pub fn get_student(&self, id: &str) -> Option<&StudentSeed> {
        self.students.iter().find(|s| s.id == id)
    }

    /// 驗證情境配置
    pub fn validate_config(&self) -> Result<()> {
        crate::utils::validation::validate_non_empty_string("scenario.name", &self.scenario.name)?;

        // 學生與區段代號不得重複
        let mut student_ids = HashSet::new();
        for student in &self.students {
            crate::utils::validation::validate_non_empty_string("students.id", &student.id)?;
            if !student_ids.insert(student.id.clone()) {
                return Err(RegistrarError::InvalidConfigValueError {
                    field: "students.id".to_string(),
                    value: student.id.clone(),
                    reason: "Duplicate student id".to_string(),
                });
            }
        }

        let mut section_ids = HashSet::new();
        for section in &self.sections {
            crate::utils::validation::validate_non_empty_string("sections.id", &section.id)?;
            crate::utils::validation::validate_non_empty_string(
                "sections.course",
                &section.course,
            )?;
            crate::utils::validation::validate_range(
                "sections.max_capacity",
                section.max_capacity,
                1,
                10_000,
            )?;
            if !section_ids.insert(section.id.clone()) {
                return Err(RegistrarError::InvalidConfigValueError {
                    field: "sections.id".to_string(),
                    value: section.id.clone(),
                    reason: "Duplicate section id".to_string(),
                });
            }
        }

        if let Some(engine) = &self.engine {
            engine.validate()?;
        }

        // 操作引用的學生與區段必須已在情境中定義
        for (index, operation) in self.operations.iter().enumerate() {
            self.validate_operation(index, operation, &student_ids, &section_ids)?;
        }

        Ok(())
    }

    fn validate_operation(
        &self,
        index: usize,
        operation: &OperationSpec,
        student_ids: &HashSet<String>,
        section_ids: &HashSet<String>,
    ) -> Result<()> {
        let field = format!("operations[{}]", index);

        let check_student = |id: &str| -> Result<()> {
            if !student_ids.contains(id) {
                return Err(RegistrarError::InvalidConfigValueError {
                    field: field.clone(),
                    value: id.to_string(),
                    reason: "Unknown student id".to_string(),
                });
            }
            Ok(())
        };
        let check_section = |id: &str| -> Result<()> {
            if !section_ids.contains(id) {
                return Err(RegistrarError::InvalidConfigValueError {
                    field: field.clone(),
                    value: id.to_string(),
                    reason: "Unknown section id".to_string(),
                });
            }
            Ok(())
        };

        match operation {
            OperationSpec::Enroll { student, section }
            | OperationSpec::Drop { student, section }
            | OperationSpec::LeaveWaitlist { student, section }
            | OperationSpec::Validate { student, section } => {
                check_student(student)?;
                check_section(section)?;
            }
            OperationSpec::Transfer { student, from, to } => {
                check_student(student)?;
                check_section(from)?;
                check_section(to)?;
            }
            OperationSpec::BulkEnroll {
                section, students, ..
            } => {
                check_section(section)?;
                for student in students {
                    check_student(student)?;
                }
            }
            OperationSpec::Promote { section } => {
                check_section(section)?;
            }
        }

        Ok(())
    }

    /// 內建示範情境：兩人滿班、一人候補，之後退選觸發遞補
    pub fn sample() -> Self {
        let enroll = |student: &str| OperationSpec::Enroll {
            student: student.to_string(),
            section: "CS101-A".to_string(),
        };
        Self {
            scenario: ScenarioInfo {
                name: "sample-registration".to_string(),
                description:
                    "Capacity-2 section with one waitlisted student promoted after a drop"
                        .to_string(),
                version: "1.0.0".to_string(),
            },
            engine: Some(EngineSettings::default()),
            students: [("S-1", "Alice"), ("S-2", "Bob"), ("S-3", "Carol")]
                .iter()
                .map(|(id, name)| StudentSeed {
                    id: id.to_string(),
                    name: name.to_string(),
                    active: None,
                })
                .collect(),
            sections: vec![SectionSeed {
                id: "CS101-A".to_string(),
                course: "CS101".to_string(),
                max_capacity: 2,
            }],
            operations: vec![
                enroll("S-1"),
                enroll("S-2"),
                enroll("S-3"),
                OperationSpec::Validate {
                    student: "S-3".to_string(),
                    section: "CS101-A".to_string(),
                },
                OperationSpec::Drop {
                    student: "S-1".to_string(),
                    section: "CS101-A".to_string(),
                },
            ],
            monitoring: None,
        }
    }
}

impl Validate for ScenarioConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
