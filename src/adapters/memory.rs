use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::model::{
    CourseId, Enrollment, EnrollmentId, Section, SectionId, Student, StudentId,
};
use crate::domain::ports::{EnrollmentStore, SectionCatalog, StudentDirectory};
use crate::utils::error::{RegistrarError, Result};

/// Student directory backed by a map seeded up front.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStudentDirectory {
    students: Arc<RwLock<HashMap<StudentId, Student>>>,
}

impl InMemoryStudentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_student(&self, student: Student) {
        let mut students = self.students.write().await;
        students.insert(student.id.clone(), student);
    }
}

#[async_trait]
impl StudentDirectory for InMemoryStudentDirectory {
    async fn find_student(&self, id: &StudentId) -> Result<Option<Student>> {
        let students = self.students.read().await;
        Ok(students.get(id).cloned())
    }
}

/// Section catalog backed by a map. `save_section` upserts, which also
/// covers seeding.
#[derive(Debug, Clone, Default)]
pub struct InMemorySectionCatalog {
    sections: Arc<RwLock<HashMap<SectionId, Section>>>,
}

impl InMemorySectionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_section(&self, section: Section) {
        let mut sections = self.sections.write().await;
        sections.insert(section.id.clone(), section);
    }
}

#[async_trait]
impl SectionCatalog for InMemorySectionCatalog {
    async fn find_section(&self, id: &SectionId) -> Result<Option<Section>> {
        let sections = self.sections.read().await;
        Ok(sections.get(id).cloned())
    }

    async fn save_section(&self, section: &Section) -> Result<()> {
        let mut sections = self.sections.write().await;
        sections.insert(section.id.clone(), section.clone());
        Ok(())
    }
}

/// Enrollment store keyed by record id.
///
/// `insert` is the uniqueness backstop: it scans for a current record for
/// the same student and course under the write lock, so two racing inserts
/// cannot both land.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEnrollmentStore {
    records: Arc<RwLock<HashMap<EnrollmentId, Enrollment>>>,
}

impl InMemoryEnrollmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record in the store, in no particular order.
    pub async fn snapshot(&self) -> Vec<Enrollment> {
        let records = self.records.read().await;
        records.values().cloned().collect()
    }
}

#[async_trait]
impl EnrollmentStore for InMemoryEnrollmentStore {
    async fn insert(&self, enrollment: Enrollment) -> Result<()> {
        let mut records = self.records.write().await;
        if let Some(existing) = records
            .values()
            .find(|e| e.student_id == enrollment.student_id && e.course_id == enrollment.course_id && e.is_current())
        {
            return Err(RegistrarError::AlreadyEnrolled {
                student_id: existing.student_id.clone(),
                course_id: existing.course_id.clone(),
                status: existing.status,
            });
        }
        records.insert(enrollment.id, enrollment);
        Ok(())
    }

    async fn update(&self, enrollment: Enrollment) -> Result<()> {
        let mut records = self.records.write().await;
        if !records.contains_key(&enrollment.id) {
            return Err(RegistrarError::StorageUnavailable {
                detail: format!("update of unknown enrollment record {}", enrollment.id),
            });
        }
        records.insert(enrollment.id, enrollment);
        Ok(())
    }

    async fn remove(&self, id: &EnrollmentId) -> Result<()> {
        let mut records = self.records.write().await;
        if records.remove(id).is_none() {
            return Err(RegistrarError::StorageUnavailable {
                detail: format!("removal of unknown enrollment record {}", id),
            });
        }
        Ok(())
    }

    async fn find_current(
        &self,
        student_id: &StudentId,
        course_id: &CourseId,
    ) -> Result<Option<Enrollment>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|e| &e.student_id == student_id && &e.course_id == course_id && e.is_current())
            .cloned())
    }

    async fn active_by_section(&self, section_id: &SectionId) -> Result<Vec<Enrollment>> {
        let records = self.records.read().await;
        let mut active: Vec<Enrollment> = records
            .values()
            .filter(|e| &e.section_id == section_id && e.status.is_active())
            .cloned()
            .collect();
        active.sort_by(|a, b| {
            a.enrolled_at
                .cmp(&b.enrolled_at)
                .then_with(|| a.student_id.cmp(&b.student_id))
        });
        Ok(active)
    }

    async fn waitlisted_by_section(&self, section_id: &SectionId) -> Result<Vec<Enrollment>> {
        let records = self.records.read().await;
        let mut waiting: Vec<Enrollment> = records
            .values()
            .filter(|e| &e.section_id == section_id && e.status.is_waitlisted())
            .cloned()
            .collect();
        waiting.sort_by(|a, b| {
            let pa = a.waitlist_position.unwrap_or(u32::MAX);
            let pb = b.waitlist_position.unwrap_or(u32::MAX);
            pa.cmp(&pb).then_with(|| a.enrolled_at.cmp(&b.enrolled_at))
        });
        Ok(waiting)
    }

    async fn active_sections_for_student(&self, student_id: &StudentId) -> Result<Vec<SectionId>> {
        let records = self.records.read().await;
        let mut sections: Vec<SectionId> = records
            .values()
            .filter(|e| &e.student_id == student_id && e.status.is_active())
            .map(|e| e.section_id.clone())
            .collect();
        sections.sort();
        Ok(sections)
    }
}
