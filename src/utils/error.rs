use crate::domain::model::{CompensationOutcome, CourseId, EnrollmentStatus, SectionId, StudentId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistrarError {
    #[error("Student not found: {student_id}")]
    StudentNotFound { student_id: StudentId },

    #[error("Student is not active: {student_id}")]
    StudentInactive { student_id: StudentId },

    #[error("Section not found: {section_id}")]
    SectionNotFound { section_id: SectionId },

    #[error("Student {student_id} already has a {status} enrollment in course {course_id}")]
    AlreadyEnrolled {
        student_id: StudentId,
        course_id: CourseId,
        status: EnrollmentStatus,
    },

    #[error("No matching enrollment for student {student_id} in course {course_id}")]
    EnrollmentNotFound {
        student_id: StudentId,
        course_id: CourseId,
    },

    #[error("Section {section_id} is full and waitlisting is unavailable")]
    SectionFull { section_id: SectionId },

    #[error("Section {section_id} is busy: capacity guard not acquired within {waited_ms}ms")]
    SectionBusy {
        section_id: SectionId,
        waited_ms: u64,
    },

    #[error("Transfer failed: {source} (compensation: {compensation})")]
    TransferFailed {
        #[source]
        source: Box<RegistrarError>,
        compensation: CompensationOutcome,
    },

    #[error("Enrollment storage unavailable: {detail}")]
    StorageUnavailable { detail: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, RegistrarError>;

// The CLI maps severities onto process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Conflict,
    Concurrency,
    Storage,
    Configuration,
}

impl RegistrarError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // The request is already satisfied in spirit; nothing is broken.
            Self::AlreadyEnrolled { .. } => ErrorSeverity::Low,
            Self::SectionBusy { .. } => ErrorSeverity::Medium,
            Self::StudentNotFound { .. }
            | Self::StudentInactive { .. }
            | Self::SectionNotFound { .. }
            | Self::EnrollmentNotFound { .. }
            | Self::SectionFull { .. }
            | Self::TransferFailed { .. }
            | Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. } => ErrorSeverity::High,
            Self::StorageUnavailable { .. }
            | Self::IoError(_)
            | Self::SerializationError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::StudentNotFound { .. }
            | Self::StudentInactive { .. }
            | Self::SectionNotFound { .. } => ErrorCategory::Validation,
            Self::AlreadyEnrolled { .. }
            | Self::EnrollmentNotFound { .. }
            | Self::SectionFull { .. }
            | Self::TransferFailed { .. } => ErrorCategory::Conflict,
            Self::SectionBusy { .. } => ErrorCategory::Concurrency,
            Self::StorageUnavailable { .. }
            | Self::IoError(_)
            | Self::SerializationError(_) => ErrorCategory::Storage,
            Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::SectionBusy { .. } | Self::StorageUnavailable { .. } | Self::IoError(_) => true,
            // A failed compensation needs an operator before any retry.
            Self::TransferFailed {
                source,
                compensation,
            } => {
                !matches!(compensation, CompensationOutcome::Failed { .. })
                    && source.is_retryable()
            }
            _ => false,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::StudentNotFound { .. } => {
                "Check the student id against the student directory"
            }
            Self::StudentInactive { .. } => {
                "Reactivate the student in the directory before enrolling"
            }
            Self::SectionNotFound { .. } => {
                "Check the section id against the section catalog"
            }
            Self::AlreadyEnrolled { .. } => {
                "Drop or transfer the existing enrollment first"
            }
            Self::EnrollmentNotFound { .. } => {
                "Verify the student currently holds an enrollment in this section"
            }
            Self::SectionFull { .. } => {
                "Pick another section, or enable waitlisting for this one"
            }
            Self::SectionBusy { .. } => {
                "Retry shortly; the section is being updated by another request"
            }
            Self::TransferFailed { .. } => {
                "Inspect the compensation outcome before retrying the transfer"
            }
            Self::StorageUnavailable { .. } => {
                "Check the enrollment store backend and retry"
            }
            Self::IoError(_) => "Check file paths and permissions",
            Self::SerializationError(_) => "Check that the data is well-formed",
            Self::ConfigError { .. } | Self::InvalidConfigValueError { .. } => {
                "Fix the configuration file and run again"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::StudentNotFound { student_id } => {
                format!("We could not find student '{}'.", student_id)
            }
            Self::StudentInactive { student_id } => {
                format!("Student '{}' is not active and cannot enroll.", student_id)
            }
            Self::SectionNotFound { section_id } => {
                format!("We could not find section '{}'.", section_id)
            }
            Self::AlreadyEnrolled {
                student_id,
                course_id,
                status,
            } => format!(
                "Student '{}' is already {} in course '{}'.",
                student_id, status, course_id
            ),
            Self::EnrollmentNotFound {
                student_id,
                course_id,
            } => format!(
                "Student '{}' has no enrollment to change in course '{}'.",
                student_id, course_id
            ),
            Self::SectionFull { section_id } => {
                format!("Section '{}' has no seats left.", section_id)
            }
            Self::SectionBusy { section_id, .. } => format!(
                "Section '{}' is busy right now; please try again.",
                section_id
            ),
            Self::TransferFailed { compensation, .. } => format!(
                "The transfer could not be completed ({}).",
                compensation
            ),
            Self::StorageUnavailable { .. } => {
                "The enrollment system is temporarily unavailable.".to_string()
            }
            Self::IoError(_) | Self::SerializationError(_) => {
                "A system error occurred while processing data.".to_string()
            }
            Self::ConfigError { message } => {
                format!("The configuration is invalid: {}", message)
            }
            Self::InvalidConfigValueError { field, reason, .. } => {
                format!("Configuration field '{}' is invalid: {}", field, reason)
            }
        }
    }
}
