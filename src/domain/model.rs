use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionId(String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseId(String);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(StudentId);
string_id!(SectionId);
string_id!(CourseId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnrollmentId(Uuid);

impl EnrollmentId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for EnrollmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Records are never deleted; DROPPED is terminal for a given record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    Active,
    Waitlisted,
    Dropped,
}

impl EnrollmentStatus {
    // ACTIVE and WAITLISTED both count against the one-per-course rule.
    pub fn is_current(self) -> bool {
        matches!(self, Self::Active | Self::Waitlisted)
    }

    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn is_waitlisted(self) -> bool {
        matches!(self, Self::Waitlisted)
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Active => "ACTIVE",
            Self::Waitlisted => "WAITLISTED",
            Self::Dropped => "DROPPED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub active: bool,
}

/// The core is the sole mutator of `active_count` and `waitlist_count`;
/// everything else on a section belongs to the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub course_id: CourseId,
    pub max_capacity: u32,
    pub active_count: u32,
    pub waitlist_count: u32,
}

impl Section {
    pub fn new(id: impl Into<SectionId>, course_id: impl Into<CourseId>, max_capacity: u32) -> Self {
        Self {
            id: id.into(),
            course_id: course_id.into(),
            max_capacity,
            active_count: 0,
            waitlist_count: 0,
        }
    }

    pub fn has_open_seat(&self) -> bool {
        self.active_count < self.max_capacity
    }

    pub fn available_seats(&self) -> u32 {
        self.max_capacity.saturating_sub(self.active_count)
    }
}

/// A record carries both the section it was created through and that
/// section's course: seats, queues and positions are per section, while
/// the one-current-enrollment rule is per (student, course).
/// `waitlist_position` is set only while WAITLISTED; positions within a
/// section stay gap-free (1..n) in promotion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub student_id: StudentId,
    pub section_id: SectionId,
    pub course_id: CourseId,
    pub status: EnrollmentStatus,
    pub enrolled_at: DateTime<Utc>,
    pub waitlist_position: Option<u32>,
}

impl Enrollment {
    pub fn active(student_id: StudentId, section_id: SectionId, course_id: CourseId) -> Self {
        Self {
            id: EnrollmentId::generate(),
            student_id,
            section_id,
            course_id,
            status: EnrollmentStatus::Active,
            enrolled_at: Utc::now(),
            waitlist_position: None,
        }
    }

    pub fn waitlisted(
        student_id: StudentId,
        section_id: SectionId,
        course_id: CourseId,
        position: u32,
    ) -> Self {
        Self {
            id: EnrollmentId::generate(),
            student_id,
            section_id,
            course_id,
            status: EnrollmentStatus::Waitlisted,
            enrolled_at: Utc::now(),
            waitlist_position: Some(position),
        }
    }

    pub fn is_current(&self) -> bool {
        self.status.is_current()
    }
}

/// What happened to the student's original seat after a failed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompensationOutcome {
    /// Drop(from) never completed, so there was nothing to compensate.
    NotRequired,
    /// The student is ACTIVE in the original section again.
    RestoredActive,
    /// The original seat was gone; the student landed on the waitlist.
    RestoredWaitlisted { position: u32 },
    /// Compensation itself failed; the student holds no current enrollment.
    Failed { detail: String },
}

impl fmt::Display for CompensationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRequired => write!(f, "not required"),
            Self::RestoredActive => write!(f, "restored to active seat"),
            Self::RestoredWaitlisted { position } => {
                write!(f, "restored onto waitlist at position {}", position)
            }
            Self::Failed { detail } => write!(f, "compensation failed: {}", detail),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub kind: AuditEventKind,
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub detail: String,
    pub at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        kind: AuditEventKind,
        student_id: StudentId,
        course_id: CourseId,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            student_id,
            course_id,
            detail: detail.into(),
            at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventKind {
    Enrolled,
    Waitlisted,
    Dropped,
    LeftWaitlist,
    Promoted,
    TransferCompleted,
    TransferCompensated,
}
