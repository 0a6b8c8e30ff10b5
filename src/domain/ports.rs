use crate::domain::model::{
    AuditEvent, CourseId, Enrollment, EnrollmentId, Section, SectionId, Student, StudentId,
};
use crate::utils::error::Result;
use async_trait::async_trait;

/// External student directory. The core only reads it.
#[async_trait]
pub trait StudentDirectory: Send + Sync {
    async fn find_student(&self, id: &StudentId) -> Result<Option<Student>>;
}

/// External section catalog. The core reads sections and writes back the
/// two counters it owns via `save_section`.
#[async_trait]
pub trait SectionCatalog: Send + Sync {
    async fn find_section(&self, id: &SectionId) -> Result<Option<Section>>;

    async fn save_section(&self, section: &Section) -> Result<()>;
}

/// Source of truth for enrollment records.
///
/// `insert` must atomically reject a second current record for the same
/// (student, course) with `AlreadyEnrolled`; the engine's section guard
/// cannot see racing enrolls into different sections of one course.
#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    async fn insert(&self, enrollment: Enrollment) -> Result<()>;

    async fn update(&self, enrollment: Enrollment) -> Result<()>;

    /// Only used to unwind an `insert` whose enclosing operation failed
    /// before the guard was released; committed records are never deleted.
    async fn remove(&self, id: &EnrollmentId) -> Result<()>;

    async fn find_current(
        &self,
        student_id: &StudentId,
        course_id: &CourseId,
    ) -> Result<Option<Enrollment>>;

    /// ACTIVE enrollments created through the section, ordered by enrolled-at.
    async fn active_by_section(&self, section_id: &SectionId) -> Result<Vec<Enrollment>>;

    /// WAITLISTED enrollments for the section, ordered by waitlist position.
    async fn waitlisted_by_section(&self, section_id: &SectionId) -> Result<Vec<Enrollment>>;

    async fn active_sections_for_student(&self, student_id: &StudentId) -> Result<Vec<SectionId>>;
}

/// Fire-and-forget audit recording. Failures must never fail the
/// enrollment operation; the engine logs and moves on.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record_event(&self, event: AuditEvent) -> Result<()>;
}
